/*
 * registry.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! A host adapter backed by an explicit type registry.
//!
//! Embedders register their native Rust model types with named fields,
//! (overloaded) methods, static members, constructors, and an optional
//! iteration view. The registry then implements [`HostAdapter`] for any
//! [`Value::Object`] holding one of the registered types.
//!
//! Overload selection picks the applicable signature with the fewest
//! numeric widening steps across all arguments. Two applicable signatures
//! at the same minimal cost are reported as ambiguous rather than resolved
//! by registration order.

use crate::adapter::{AdapterError, AdapterResult, HostAdapter};
use crate::value::{TypeDesc, Value};
use std::any::Any;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::rc::Rc;

/// Formal parameter types for registered methods and constructors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamType {
    Bool,
    Byte,
    Short,
    Char,
    Int,
    Long,
    Float,
    Double,
    Str,
    List,
    /// Accepts any value; least specific.
    Any,
    /// A registered reference type, by name. Accepts null.
    Named(String),
}

/// Position in the numeric widening chain byte → short → int → long →
/// float → double. `char` widens to int and beyond but never to short.
fn numeric_rank(value: &Value) -> Option<u32> {
    match value {
        Value::Byte(_) => Some(0),
        Value::Short(_) | Value::Char(_) => Some(1),
        Value::Int(_) => Some(2),
        Value::Long(_) => Some(3),
        Value::Float(_) => Some(4),
        Value::Double(_) => Some(5),
        _ => None,
    }
}

impl ParamType {
    fn param_rank(&self) -> Option<u32> {
        match self {
            ParamType::Byte => Some(0),
            ParamType::Short => Some(1),
            ParamType::Int => Some(2),
            ParamType::Long => Some(3),
            ParamType::Float => Some(4),
            ParamType::Double => Some(5),
            _ => None,
        }
    }

    /// Conversion cost from `arg` to this parameter, or `None` when the
    /// argument is not applicable.
    fn cost(&self, arg: &Value, registry: &TypeRegistry) -> Option<u32> {
        const ANY_COST: u32 = 10;
        match self {
            ParamType::Bool => matches!(arg, Value::Bool(_)).then_some(0),
            ParamType::Char => matches!(arg, Value::Char(_)).then_some(0),
            ParamType::Str => match arg {
                Value::Str(_) | Value::Null => Some(0),
                _ => None,
            },
            ParamType::List => match arg {
                Value::List(_) | Value::Null => Some(0),
                _ => None,
            },
            ParamType::Any => Some(ANY_COST),
            ParamType::Named(name) => match arg {
                Value::Null => Some(0),
                Value::Object(rc) => {
                    let entry = registry.types.get(name)?;
                    (entry.matches)(rc.as_ref()).then_some(0)
                }
                _ => None,
            },
            _ => {
                // Numeric parameter: widening only.
                if matches!(arg, Value::Char(_)) && *self == ParamType::Short {
                    return None;
                }
                let param = self.param_rank().expect("numeric parameter");
                let arg_rank = numeric_rank(arg)?;
                param.checked_sub(arg_rank)
            }
        }
    }
}

/// Widen an applicable argument to the parameter's exact type, so method
/// bodies can match on the declared type directly.
fn widen(param: &ParamType, arg: &Value) -> Value {
    fn as_i64(v: &Value) -> i64 {
        match v {
            Value::Byte(b) => i64::from(*b),
            Value::Short(s) => i64::from(*s),
            Value::Char(c) => i64::from(*c as u32),
            Value::Int(i) => i64::from(*i),
            Value::Long(l) => *l,
            Value::Float(f) => *f as i64,
            Value::Double(d) => *d as i64,
            _ => 0,
        }
    }
    fn as_f64(v: &Value) -> f64 {
        match v {
            Value::Float(f) => f64::from(*f),
            Value::Double(d) => *d,
            integral => as_i64(integral) as f64,
        }
    }
    match param {
        ParamType::Short => Value::Short(as_i64(arg) as i16),
        ParamType::Int => Value::Int(as_i64(arg) as i32),
        ParamType::Long => Value::Long(as_i64(arg)),
        ParamType::Float => Value::Float(as_f64(arg) as f32),
        ParamType::Double => Value::Double(as_f64(arg)),
        _ => arg.clone(),
    }
}

fn widen_args(params: &[ParamType], args: &[Value]) -> Vec<Value> {
    params.iter().zip(args).map(|(p, a)| widen(p, a)).collect()
}

type FieldFn = Box<dyn Fn(&dyn Any) -> Option<Value>>;
type MethodFn = Box<dyn Fn(&dyn Any, &[Value]) -> AdapterResult<Value>>;
type StaticFn = Box<dyn Fn(&[Value]) -> AdapterResult<Value>>;
type IterateFn = Box<dyn Fn(&dyn Any) -> Option<Vec<Value>>>;

struct MethodImpl {
    params: Vec<ParamType>,
    run: MethodFn,
}

struct StaticImpl {
    params: Vec<ParamType>,
    run: StaticFn,
}

struct TypeEntry {
    name: String,
    matches: Box<dyn Fn(&dyn Any) -> bool>,
    fields: HashMap<String, FieldFn>,
    methods: HashMap<String, Vec<MethodImpl>>,
    static_fields: HashMap<String, Value>,
    static_methods: HashMap<String, Vec<StaticImpl>>,
    constructors: Vec<StaticImpl>,
    iterate: Option<IterateFn>,
}

/// Builder for one registered type. `T` is the native Rust type stored in
/// [`Value::Object`].
pub struct TypeBuilder<T: 'static> {
    entry: TypeEntry,
    _marker: PhantomData<T>,
}

impl<T: 'static> TypeBuilder<T> {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            entry: TypeEntry {
                name,
                matches: Box::new(|any| any.is::<T>()),
                fields: HashMap::new(),
                methods: HashMap::new(),
                static_fields: HashMap::new(),
                static_methods: HashMap::new(),
                constructors: Vec::new(),
                iterate: None,
            },
            _marker: PhantomData,
        }
    }

    pub fn field(mut self, name: impl Into<String>, get: impl Fn(&T) -> Value + 'static) -> Self {
        self.entry.fields.insert(
            name.into(),
            Box::new(move |any| any.downcast_ref::<T>().map(&get)),
        );
        self
    }

    pub fn method(
        mut self,
        name: impl Into<String>,
        params: Vec<ParamType>,
        run: impl Fn(&T, &[Value]) -> AdapterResult<Value> + 'static,
    ) -> Self {
        let type_name = self.entry.name.clone();
        self.entry
            .methods
            .entry(name.into())
            .or_default()
            .push(MethodImpl {
                params,
                run: Box::new(move |any, args| {
                    let target = any.downcast_ref::<T>().ok_or_else(|| {
                        AdapterError::unsupported(format!("value is not a {type_name}"))
                    })?;
                    run(target, args)
                }),
            });
        self
    }

    pub fn static_field(mut self, name: impl Into<String>, value: Value) -> Self {
        self.entry.static_fields.insert(name.into(), value);
        self
    }

    pub fn static_method(
        mut self,
        name: impl Into<String>,
        params: Vec<ParamType>,
        run: impl Fn(&[Value]) -> AdapterResult<Value> + 'static,
    ) -> Self {
        self.entry
            .static_methods
            .entry(name.into())
            .or_default()
            .push(StaticImpl {
                params,
                run: Box::new(run),
            });
        self
    }

    pub fn constructor(
        mut self,
        params: Vec<ParamType>,
        run: impl Fn(&[Value]) -> AdapterResult<Value> + 'static,
    ) -> Self {
        self.entry.constructors.push(StaticImpl {
            params,
            run: Box::new(run),
        });
        self
    }

    /// Expose the type to `ForEach` iteration.
    pub fn iterable(mut self, elements: impl Fn(&T) -> Vec<Value> + 'static) -> Self {
        self.entry.iterate = Some(Box::new(move |any| {
            any.downcast_ref::<T>().map(&elements)
        }));
        self
    }
}

/// The registry itself; implements [`HostAdapter`].
#[derive(Default)]
pub struct TypeRegistry {
    types: HashMap<String, TypeEntry>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<T: 'static>(&mut self, builder: TypeBuilder<T>) -> &mut Self {
        self.types.insert(builder.entry.name.clone(), builder.entry);
        self
    }

    fn entry_for(&self, obj: &Value) -> Option<(&TypeEntry, Rc<dyn Any>)> {
        match obj {
            Value::Object(rc) => self
                .types
                .values()
                .find(|entry| (entry.matches)(rc.as_ref()))
                .map(|entry| (entry, rc.clone())),
            _ => None,
        }
    }

    fn entry_named(&self, type_name: &str) -> AdapterResult<&TypeEntry> {
        self.types
            .get(type_name)
            .ok_or_else(|| AdapterError::UnknownType {
                name: type_name.to_string(),
            })
    }

    /// Pick the applicable signature with the lowest total widening cost.
    fn select<'a, S>(
        &self,
        name: &str,
        overloads: &'a [S],
        params_of: impl Fn(&S) -> &[ParamType],
        args: &[Value],
    ) -> AdapterResult<&'a S> {
        let mut best: Option<(u32, &S)> = None;
        let mut tied = false;
        for overload in overloads {
            let params = params_of(overload);
            if params.len() != args.len() {
                continue;
            }
            let mut total = 0u32;
            let mut applicable = true;
            for (param, arg) in params.iter().zip(args) {
                match param.cost(arg, self) {
                    Some(cost) => total += cost,
                    None => {
                        applicable = false;
                        break;
                    }
                }
            }
            if !applicable {
                continue;
            }
            match &best {
                Some((cost, _)) if total > *cost => {}
                Some((cost, _)) if total == *cost => tied = true,
                _ => {
                    best = Some((total, overload));
                    tied = false;
                }
            }
        }
        if tied {
            return Err(AdapterError::Ambiguous {
                name: name.to_string(),
            });
        }
        best.map(|(_, overload)| overload)
            .ok_or_else(|| AdapterError::UnknownMember {
                name: name.to_string(),
                target: "registered type".to_string(),
            })
    }
}

impl HostAdapter for TypeRegistry {
    fn get_field(&self, obj: &Value, name: &str) -> AdapterResult<Value> {
        let (entry, rc) = self
            .entry_for(obj)
            .ok_or_else(|| AdapterError::unknown_member(name, obj))?;
        let get = entry
            .fields
            .get(name)
            .ok_or_else(|| AdapterError::unknown_member(name, obj))?;
        get(rc.as_ref()).ok_or_else(|| AdapterError::unknown_member(name, obj))
    }

    fn call_method(&self, obj: &Value, name: &str, args: &[Value]) -> AdapterResult<Value> {
        let (entry, rc) = self
            .entry_for(obj)
            .ok_or_else(|| AdapterError::unknown_member(name, obj))?;
        let overloads = entry
            .methods
            .get(name)
            .ok_or_else(|| AdapterError::unknown_member(name, obj))?;
        let chosen = self.select(name, overloads, |m| &m.params, args)?;
        (chosen.run)(rc.as_ref(), &widen_args(&chosen.params, args))
    }

    fn array_get(&self, obj: &Value, index: i32) -> AdapterResult<Value> {
        Err(AdapterError::unsupported(format!(
            "{} is not an array (index {index})",
            obj.kind_name()
        )))
    }

    fn is_instance(&self, value: &Value, ty: &TypeDesc) -> AdapterResult<bool> {
        match ty {
            TypeDesc::Primitive(p) => Ok(value.kind_name() == p.name()),
            TypeDesc::Array(_) => Ok(matches!(value, Value::List(_))),
            TypeDesc::Reference(name) => match value {
                Value::Object(rc) => {
                    let entry = self.entry_named(name)?;
                    Ok((entry.matches)(rc.as_ref()))
                }
                _ => {
                    // Unknown names still error; known names simply do not
                    // match non-object values.
                    self.entry_named(name)?;
                    Ok(false)
                }
            },
        }
    }

    fn resolve_type(&self, name: &str) -> AdapterResult<TypeDesc> {
        self.entry_named(name)
            .map(|entry| TypeDesc::Reference(entry.name.clone()))
    }

    fn resolve_static_field(&self, type_name: &str, name: &str) -> AdapterResult<Value> {
        let entry = self.entry_named(type_name)?;
        entry
            .static_fields
            .get(name)
            .cloned()
            .ok_or_else(|| AdapterError::UnknownMember {
                name: name.to_string(),
                target: type_name.to_string(),
            })
    }

    fn resolve_static_method(
        &self,
        type_name: &str,
        name: &str,
        args: &[Value],
    ) -> AdapterResult<Value> {
        let entry = self.entry_named(type_name)?;
        let overloads = entry
            .static_methods
            .get(name)
            .ok_or_else(|| AdapterError::UnknownMember {
                name: name.to_string(),
                target: type_name.to_string(),
            })?;
        let chosen = self.select(name, overloads, |m| &m.params, args)?;
        (chosen.run)(&widen_args(&chosen.params, args))
    }

    fn new_instance(&self, type_name: &str, args: &[Value]) -> AdapterResult<Value> {
        let entry = self.entry_named(type_name)?;
        let chosen = self.select(type_name, &entry.constructors, |c| &c.params, args)?;
        (chosen.run)(&widen_args(&chosen.params, args))
    }

    fn iterate(&self, value: &Value) -> AdapterResult<Vec<Value>> {
        let (entry, rc) = self.entry_for(value).ok_or_else(|| {
            AdapterError::unsupported(format!("{} is not iterable", value.kind_name()))
        })?;
        match &entry.iterate {
            Some(elements) => elements(rc.as_ref()).ok_or_else(|| {
                AdapterError::unsupported(format!("{} is not iterable", value.kind_name()))
            }),
            None => Err(AdapterError::unsupported(format!(
                "{} is not iterable",
                entry.name
            ))),
        }
    }
}

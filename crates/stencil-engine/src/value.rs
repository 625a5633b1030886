/*
 * value.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Runtime values produced by expression evaluation.
//!
//! [`Value`] is a closed sum over the primitive kinds the evaluator
//! promotes between, strings, type descriptors, shared lists (the view the
//! engine takes of host arrays and collections), loop counters, and opaque
//! host objects. Host objects are `Rc<dyn Any>`; only a host adapter can
//! look inside one, and equality on them is reference identity.

use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::rc::Rc;

/// The primitive type kinds, named after their host-language counterparts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrimitiveType {
    Boolean,
    Byte,
    Short,
    Char,
    Int,
    Long,
    Float,
    Double,
}

impl PrimitiveType {
    pub fn name(self) -> &'static str {
        match self {
            PrimitiveType::Boolean => "boolean",
            PrimitiveType::Byte => "byte",
            PrimitiveType::Short => "short",
            PrimitiveType::Char => "char",
            PrimitiveType::Int => "int",
            PrimitiveType::Long => "long",
            PrimitiveType::Float => "float",
            PrimitiveType::Double => "double",
        }
    }

    /// One-letter descriptor used inside array type names.
    fn descriptor(self) -> &'static str {
        match self {
            PrimitiveType::Boolean => "Z",
            PrimitiveType::Byte => "B",
            PrimitiveType::Short => "S",
            PrimitiveType::Char => "C",
            PrimitiveType::Int => "I",
            PrimitiveType::Long => "J",
            PrimitiveType::Float => "F",
            PrimitiveType::Double => "D",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "boolean" => Some(PrimitiveType::Boolean),
            "byte" => Some(PrimitiveType::Byte),
            "short" => Some(PrimitiveType::Short),
            "char" => Some(PrimitiveType::Char),
            "int" => Some(PrimitiveType::Int),
            "long" => Some(PrimitiveType::Long),
            "float" => Some(PrimitiveType::Float),
            "double" => Some(PrimitiveType::Double),
            _ => None,
        }
    }
}

/// A type descriptor, as produced by class literals and consumed by casts
/// and `instanceof`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeDesc {
    Primitive(PrimitiveType),
    Reference(String),
    Array(Box<TypeDesc>),
}

impl TypeDesc {
    /// Wrap a descriptor in `dims` array dimensions.
    pub fn array_of(element: TypeDesc, dims: u32) -> TypeDesc {
        let mut ty = element;
        for _ in 0..dims {
            ty = TypeDesc::Array(Box::new(ty));
        }
        ty
    }

    /// The printable type name, following the JVM convention: `int`,
    /// `java.lang.String`, `[I`, `[[I`, `[Ljava.lang.String;`.
    pub fn name(&self) -> String {
        match self {
            TypeDesc::Primitive(p) => p.name().to_string(),
            TypeDesc::Reference(name) => name.clone(),
            TypeDesc::Array(element) => format!("[{}", element.element_descriptor()),
        }
    }

    fn element_descriptor(&self) -> String {
        match self {
            TypeDesc::Primitive(p) => p.descriptor().to_string(),
            TypeDesc::Reference(name) => format!("L{name};"),
            TypeDesc::Array(element) => format!("[{}", element.element_descriptor()),
        }
    }
}

impl fmt::Display for TypeDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Loop counter state, created fresh for each `ForEach` iteration.
///
/// Rendered as its zero-based index; `first`/`last`/`even`/`odd` are
/// available through field and method access in expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterState {
    pub index: usize,
    pub first: bool,
    pub last: bool,
}

impl CounterState {
    pub fn even(&self) -> bool {
        self.index % 2 == 0
    }

    pub fn odd(&self) -> bool {
        self.index % 2 == 1
    }
}

/// A runtime value.
#[derive(Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Byte(i8),
    Short(i16),
    Char(char),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Str(String),
    Type(TypeDesc),
    List(Rc<Vec<Value>>),
    Counter(Rc<CounterState>),
    Object(Rc<dyn Any>),
}

impl Value {
    pub fn list(items: Vec<Value>) -> Value {
        Value::List(Rc::new(items))
    }

    pub fn object<T: Any>(value: T) -> Value {
        Value::Object(Rc::new(value))
    }

    pub fn string(s: impl Into<String>) -> Value {
        Value::Str(s.into())
    }

    /// Short kind name used in diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Byte(_) => "byte",
            Value::Short(_) => "short",
            Value::Char(_) => "char",
            Value::Int(_) => "int",
            Value::Long(_) => "long",
            Value::Float(_) => "float",
            Value::Double(_) => "double",
            Value::Str(_) => "string",
            Value::Type(_) => "type",
            Value::List(_) => "list",
            Value::Counter(_) => "counter",
            Value::Object(_) => "object",
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            Value::Byte(_)
                | Value::Short(_)
                | Value::Char(_)
                | Value::Int(_)
                | Value::Long(_)
                | Value::Float(_)
                | Value::Double(_)
        )
    }

    /// Render the value as output text.
    ///
    /// Whole floating-point values keep one fractional digit (`1.0`, not
    /// `1`), matching the host language's default formatting.
    pub fn render(&self) -> String {
        match self {
            Value::Null => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Byte(v) => v.to_string(),
            Value::Short(v) => v.to_string(),
            Value::Char(c) => c.to_string(),
            Value::Int(v) => v.to_string(),
            Value::Long(v) => v.to_string(),
            Value::Float(v) => render_f32(*v),
            Value::Double(v) => render_f64(*v),
            Value::Str(s) => s.clone(),
            Value::Type(ty) => match ty {
                TypeDesc::Primitive(p) => p.name().to_string(),
                _ => format!("class {}", ty.name()),
            },
            Value::List(items) => {
                let parts: Vec<String> = items.iter().map(Value::render).collect();
                format!("[{}]", parts.join(", "))
            }
            Value::Counter(c) => c.index.to_string(),
            Value::Object(_) => "<object>".to_string(),
        }
    }
}

fn render_f64(v: f64) -> String {
    if v.is_finite() && v == v.trunc() && v.abs() < 1e16 {
        format!("{v:.1}")
    } else {
        v.to_string()
    }
}

// Formatted in f32 precision; widening to f64 first would leak
// double-precision digits into values like 3.1f.
fn render_f32(v: f32) -> String {
    if v.is_finite() && v == v.trunc() && v.abs() < 1e16 {
        format!("{v:.1}")
    } else {
        v.to_string()
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Byte(a), Value::Byte(b)) => a == b,
            (Value::Short(a), Value::Short(b)) => a == b,
            (Value::Char(a), Value::Char(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Long(a), Value::Long(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Double(a), Value::Double(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Type(a), Value::Type(b)) => a == b,
            (Value::List(a), Value::List(b)) => Rc::ptr_eq(a, b),
            (Value::Counter(a), Value::Counter(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "Null"),
            Value::Bool(v) => write!(f, "Bool({v})"),
            Value::Byte(v) => write!(f, "Byte({v})"),
            Value::Short(v) => write!(f, "Short({v})"),
            Value::Char(v) => write!(f, "Char({v:?})"),
            Value::Int(v) => write!(f, "Int({v})"),
            Value::Long(v) => write!(f, "Long({v})"),
            Value::Float(v) => write!(f, "Float({v})"),
            Value::Double(v) => write!(f, "Double({v})"),
            Value::Str(v) => write!(f, "Str({v:?})"),
            Value::Type(ty) => write!(f, "Type({})", ty.name()),
            Value::List(items) => f.debug_tuple("List").field(items).finish(),
            Value::Counter(c) => write!(f, "Counter({})", c.index),
            Value::Object(_) => write!(f, "Object(..)"),
        }
    }
}

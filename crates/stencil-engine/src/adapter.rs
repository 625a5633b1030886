/*
 * adapter.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! The host-object adapter seam.
//!
//! The evaluator never inspects a [`Value::Object`] itself; every field,
//! method, type, and construction request goes through a [`HostAdapter`].
//! The embedding application supplies the adapter that bridges the
//! evaluator to whatever object/type system is available at runtime.
//!
//! Two adapters ship with the engine: [`NullAdapter`] (rejects
//! everything, for templates that only use literals and locals) and
//! [`JsonAdapter`] (models are `serde_json` documents; used by the CLI).
//! [`crate::registry::TypeRegistry`] is the third, a programmatic type
//! registry for native Rust models.

use crate::value::{TypeDesc, Value};
use std::rc::Rc;
use thiserror::Error;

/// Failures reported by a host adapter. The evaluator attaches the source
/// position of the offending expression when converting these into
/// [`crate::error::EngineError`].
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("no member '{name}' on {target}")]
    UnknownMember { name: String, target: String },

    #[error("ambiguous call to '{name}'")]
    Ambiguous { name: String },

    #[error("unknown type '{name}'")]
    UnknownType { name: String },

    #[error("index {index} out of bounds for length {len}")]
    IndexOutOfBounds { index: i32, len: usize },

    #[error("{message}")]
    Unsupported { message: String },
}

impl AdapterError {
    pub fn unsupported(message: impl Into<String>) -> Self {
        AdapterError::Unsupported {
            message: message.into(),
        }
    }

    pub fn unknown_member(name: impl Into<String>, target: &Value) -> Self {
        AdapterError::UnknownMember {
            name: name.into(),
            target: target.kind_name().to_string(),
        }
    }
}

pub type AdapterResult<T> = Result<T, AdapterError>;

/// Capability interface bridging the evaluator to the host object system.
pub trait HostAdapter {
    /// Read an instance field.
    fn get_field(&self, obj: &Value, name: &str) -> AdapterResult<Value>;

    /// Invoke an instance method. Overload selection over the host's
    /// declared parameter types is the adapter's responsibility; a tie
    /// must surface as [`AdapterError::Ambiguous`].
    fn call_method(&self, obj: &Value, name: &str, args: &[Value]) -> AdapterResult<Value>;

    /// Index into a host array-like object. Lists are handled natively by
    /// the evaluator and never reach the adapter.
    fn array_get(&self, obj: &Value, index: i32) -> AdapterResult<Value>;

    /// Dynamic type test. `value` is never `Null` here; the evaluator
    /// answers `false` for null itself.
    fn is_instance(&self, value: &Value, ty: &TypeDesc) -> AdapterResult<bool>;

    /// Resolve a qualified type name to a descriptor. Primitive names are
    /// handled by the evaluator and never reach the adapter.
    fn resolve_type(&self, name: &str) -> AdapterResult<TypeDesc>;

    /// Read a static field, qualified by type name.
    fn resolve_static_field(&self, type_name: &str, name: &str) -> AdapterResult<Value>;

    /// Invoke a static method, qualified by type name.
    fn resolve_static_method(
        &self,
        type_name: &str,
        name: &str,
        args: &[Value],
    ) -> AdapterResult<Value>;

    /// Construct a host instance.
    fn new_instance(&self, type_name: &str, args: &[Value]) -> AdapterResult<Value>;

    /// Produce the elements of a host iterable, in iteration order. Lists
    /// are handled natively by the generator and never reach the adapter.
    fn iterate(&self, value: &Value) -> AdapterResult<Vec<Value>>;
}

/// An adapter that rejects every host operation. Useful for templates
/// that only touch literals and local bindings.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullAdapter;

impl HostAdapter for NullAdapter {
    fn get_field(&self, obj: &Value, name: &str) -> AdapterResult<Value> {
        Err(AdapterError::unknown_member(name, obj))
    }

    fn call_method(&self, obj: &Value, name: &str, _args: &[Value]) -> AdapterResult<Value> {
        Err(AdapterError::unknown_member(name, obj))
    }

    fn array_get(&self, _obj: &Value, _index: i32) -> AdapterResult<Value> {
        Err(AdapterError::unsupported("no host arrays available"))
    }

    fn is_instance(&self, _value: &Value, ty: &TypeDesc) -> AdapterResult<bool> {
        Err(AdapterError::UnknownType { name: ty.name() })
    }

    fn resolve_type(&self, name: &str) -> AdapterResult<TypeDesc> {
        Err(AdapterError::UnknownType {
            name: name.to_string(),
        })
    }

    fn resolve_static_field(&self, type_name: &str, _name: &str) -> AdapterResult<Value> {
        Err(AdapterError::UnknownType {
            name: type_name.to_string(),
        })
    }

    fn resolve_static_method(
        &self,
        type_name: &str,
        _name: &str,
        _args: &[Value],
    ) -> AdapterResult<Value> {
        Err(AdapterError::UnknownType {
            name: type_name.to_string(),
        })
    }

    fn new_instance(&self, type_name: &str, _args: &[Value]) -> AdapterResult<Value> {
        Err(AdapterError::UnknownType {
            name: type_name.to_string(),
        })
    }

    fn iterate(&self, value: &Value) -> AdapterResult<Vec<Value>> {
        Err(AdapterError::unsupported(format!(
            "{} is not iterable",
            value.kind_name()
        )))
    }
}

/// Adapter over `serde_json` documents.
///
/// JSON objects become opaque host objects whose fields are their keys;
/// JSON arrays become engine lists; scalars become the matching primitive
/// values (integers in the 32-bit range are `int`, larger ones `long`,
/// other numbers `double`). Type names for `instanceof` are the JSON kind
/// names `object`, `array`, `string`, `number`, and `boolean`.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonAdapter;

impl JsonAdapter {
    /// Convert a JSON document into an engine value.
    pub fn to_value(json: &serde_json::Value) -> Value {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    match i32::try_from(i) {
                        Ok(v) => Value::Int(v),
                        Err(_) => Value::Long(i),
                    }
                } else {
                    Value::Double(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            serde_json::Value::String(s) => Value::Str(s.clone()),
            serde_json::Value::Array(items) => {
                Value::list(items.iter().map(Self::to_value).collect())
            }
            serde_json::Value::Object(_) => Value::Object(Rc::new(json.clone())),
        }
    }

    fn as_json(obj: &Value) -> Option<&serde_json::Value> {
        match obj {
            Value::Object(rc) => rc.downcast_ref::<serde_json::Value>(),
            _ => None,
        }
    }

    fn kind_of(value: &Value) -> &'static str {
        match value {
            Value::Bool(_) => "boolean",
            Value::Str(_) => "string",
            Value::List(_) => "array",
            Value::Object(_) => "object",
            v if v.is_numeric() => "number",
            _ => "null",
        }
    }
}

impl HostAdapter for JsonAdapter {
    fn get_field(&self, obj: &Value, name: &str) -> AdapterResult<Value> {
        let json = Self::as_json(obj).ok_or_else(|| AdapterError::unknown_member(name, obj))?;
        match json.get(name) {
            Some(field) => Ok(Self::to_value(field)),
            None => Err(AdapterError::unknown_member(name, obj)),
        }
    }

    fn call_method(&self, obj: &Value, name: &str, args: &[Value]) -> AdapterResult<Value> {
        match (obj, name, args) {
            (Value::Object(_), "size", []) => {
                let json = Self::as_json(obj)
                    .ok_or_else(|| AdapterError::unknown_member(name, obj))?;
                let len = json.as_object().map_or(0, |m| m.len());
                Ok(Value::Int(len as i32))
            }
            (Value::Object(_), "isEmpty", []) => {
                let json = Self::as_json(obj)
                    .ok_or_else(|| AdapterError::unknown_member(name, obj))?;
                Ok(Value::Bool(json.as_object().is_none_or(|m| m.is_empty())))
            }
            (Value::Object(_), "containsKey", [Value::Str(key)]) => {
                let json = Self::as_json(obj)
                    .ok_or_else(|| AdapterError::unknown_member(name, obj))?;
                Ok(Value::Bool(json.get(key.as_str()).is_some()))
            }
            (Value::List(items), "size", []) => Ok(Value::Int(items.len() as i32)),
            (Value::List(items), "isEmpty", []) => Ok(Value::Bool(items.is_empty())),
            (Value::List(items), "contains", [needle]) => {
                Ok(Value::Bool(items.iter().any(|item| item == needle)))
            }
            _ => Err(AdapterError::unknown_member(name, obj)),
        }
    }

    fn array_get(&self, obj: &Value, index: i32) -> AdapterResult<Value> {
        Err(AdapterError::unsupported(format!(
            "{} is not an array (index {index})",
            obj.kind_name()
        )))
    }

    fn is_instance(&self, value: &Value, ty: &TypeDesc) -> AdapterResult<bool> {
        match ty {
            TypeDesc::Reference(name) => Ok(Self::kind_of(value) == name),
            TypeDesc::Array(_) => Ok(matches!(value, Value::List(_))),
            TypeDesc::Primitive(p) => Ok(value.kind_name() == p.name()),
        }
    }

    fn resolve_type(&self, name: &str) -> AdapterResult<TypeDesc> {
        match name {
            "object" | "array" | "string" | "number" | "boolean" => {
                Ok(TypeDesc::Reference(name.to_string()))
            }
            _ => Err(AdapterError::UnknownType {
                name: name.to_string(),
            }),
        }
    }

    fn resolve_static_field(&self, type_name: &str, _name: &str) -> AdapterResult<Value> {
        Err(AdapterError::UnknownType {
            name: type_name.to_string(),
        })
    }

    fn resolve_static_method(
        &self,
        type_name: &str,
        _name: &str,
        _args: &[Value],
    ) -> AdapterResult<Value> {
        Err(AdapterError::UnknownType {
            name: type_name.to_string(),
        })
    }

    fn new_instance(&self, type_name: &str, _args: &[Value]) -> AdapterResult<Value> {
        Err(AdapterError::UnknownType {
            name: type_name.to_string(),
        })
    }

    fn iterate(&self, value: &Value) -> AdapterResult<Vec<Value>> {
        // Iterating a JSON object yields its values in key order.
        match Self::as_json(value).and_then(serde_json::Value::as_object) {
            Some(map) => Ok(map.values().map(Self::to_value).collect()),
            None => Err(AdapterError::unsupported(format!(
                "{} is not iterable",
                value.kind_name()
            ))),
        }
    }
}

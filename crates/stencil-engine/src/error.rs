/*
 * error.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Error types for template parsing, resolution, evaluation, and output.
//!
//! The taxonomy follows the phases of a generation run:
//!
//! 1. **Literal errors** are raised while constructing the AST, before any
//!    execution (malformed escapes, out-of-range literals).
//! 2. **Resolution errors** cover unresolved resources, imports, templates,
//!    identifiers, and members, plus ambiguous method overloads.
//! 3. **Evaluation errors** cover type mismatches, arithmetic failures,
//!    bounds violations, and failed casts.
//! 4. **I/O errors** cover output channels, including overwrite-policy
//!    violations.
//!
//! [`GeneratorError`] wraps any of these with the invocation-frame stack
//! accumulated up to the failure point.

use crate::position::Position;
use std::fmt;
use thiserror::Error;

/// Errors that can occur while building or executing templates.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A literal could not be decoded (malformed escape, out-of-range
    /// value, multi-character character literal).
    #[error("malformed literal at {position}: {message}")]
    MalformedLiteral { message: String, position: Position },

    /// A template resource could not be loaded.
    #[error("unresolved template resource '{uri}'")]
    UnresolvedResource { uri: String },

    /// A template resource was loaded but could not be parsed.
    #[error("malformed template resource '{uri}': {message}")]
    MalformedResource { uri: String, message: String },

    /// An import alias has no declaration in the current file.
    #[error("unresolved import alias '{alias}' at {position}")]
    UnresolvedImport { alias: String, position: Position },

    /// A template name has no definition in the target resource.
    #[error("no template named '{name}' in '{uri}'")]
    UnresolvedTemplate { name: String, uri: String },

    /// Two templates in one file share a name.
    #[error("duplicate template '{name}' in '{uri}'")]
    DuplicateTemplate { name: String, uri: String },

    /// A local variable reference has no binding in scope.
    #[error("unresolved identifier '{name}' at {position}")]
    UnresolvedIdentifier { name: String, position: Position },

    /// A field, method, or static member lookup found no match.
    #[error("unresolved member '{name}' on {target} at {position}")]
    UnresolvedMember {
        name: String,
        target: String,
        position: Position,
    },

    /// Two or more method overloads are equally applicable.
    #[error("ambiguous call to '{name}' at {position}")]
    AmbiguousOverload { name: String, position: Position },

    /// A type name could not be resolved to a descriptor.
    #[error("unknown type '{name}' at {position}")]
    UnknownType { name: String, position: Position },

    /// An operand or condition had the wrong runtime type.
    #[error("type mismatch at {position}: expected {expected}, found {found}")]
    TypeMismatch {
        expected: String,
        found: String,
        position: Position,
    },

    /// Integral division or remainder by zero.
    #[error("division by zero at {position}")]
    DivisionByZero { position: Position },

    /// Array index outside the target's bounds.
    #[error("index {index} out of bounds for length {len} at {position}")]
    IndexOutOfBounds {
        index: i32,
        len: usize,
        position: Position,
    },

    /// A reference cast failed the dynamic type check.
    #[error("cannot cast {value} to {target} at {position}")]
    CastFailed {
        target: String,
        value: String,
        position: Position,
    },

    /// The host adapter rejected an operation for another reason.
    #[error("adapter error at {position}: {message}")]
    Adapter { message: String, position: Position },

    /// Text was produced while no output channel was active.
    #[error("no active output channel at {position}")]
    NoActiveChannel { position: Position },

    /// A channel destination already exists and the overwrite policy
    /// forbids replacing it.
    #[error("output destination already exists: {path}")]
    DestinationExists { path: String },

    /// I/O failures from channel open/write/close.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias used throughout the engine.
pub type EngineResult<T> = Result<T, EngineError>;

/// One entry in the diagnostic invocation stack: a template name plus the
/// source position of its call site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationFrame {
    pub template: String,
    pub call_site: Position,
}

impl fmt::Display for InvocationFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "template '{}' invoked at {}", self.template, self.call_site)
    }
}

/// A generation failure together with the invocation frames that were
/// active when it occurred, innermost first.
#[derive(Debug, Error)]
pub struct GeneratorError {
    #[source]
    pub error: EngineError,
    pub stack: Vec<InvocationFrame>,
}

impl GeneratorError {
    pub fn new(error: EngineError, stack: Vec<InvocationFrame>) -> Self {
        Self { error, stack }
    }
}

impl fmt::Display for GeneratorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;
        for frame in self.stack.iter().rev() {
            write!(f, "\n  in {frame}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generator_error_prints_stack_innermost_first() {
        let err = GeneratorError::new(
            EngineError::DivisionByZero {
                position: Position::new(3, 7),
            },
            vec![
                InvocationFrame {
                    template: "root".to_string(),
                    call_site: Position::new(1, 1),
                },
                InvocationFrame {
                    template: "field".to_string(),
                    call_site: Position::new(2, 5),
                },
            ],
        );
        let text = err.to_string();
        assert_eq!(
            text,
            "division by zero at 3:7\n  in template 'field' invoked at 2:5\n  in template 'root' invoked at 1:1"
        );
    }
}

/*
 * lib.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Template-driven code generation engine.
//!
//! This crate executes template files against a host data model and writes the
//! generated text to named output channels. A template file holds a set of
//! named templates plus imports of other template files; each template body is
//! a sequence of statements:
//!
//! - Literal text, emitted verbatim
//! - Comments, emitted nowhere
//! - Interpolations: an expression evaluated and rendered into the output
//! - `if`/`else` blocks gated on a boolean expression
//! - `foreach` loops with an optional separator and loop counter
//! - Channel blocks that redirect output to a computed channel name
//! - Invocations of other templates, by name or through an import alias
//!
//! Expressions follow Java evaluation semantics: the full primitive tower
//! (`byte` through `double`) with numeric promotion and wraparound arithmetic,
//! two's-complement shift masking, string concatenation via `+`, eager and
//! short-circuit logical operators, ternaries, casts, and `instanceof`.
//!
//! # Architecture
//!
//! The engine is **independent of any concrete data model**. Field access,
//! method calls, array indexing and type lookup on model objects are routed
//! through the [`HostAdapter`] trait; the engine natively handles lists,
//! strings, primitives and `null`. [`JsonAdapter`] exposes `serde_json` trees
//! as a model, and [`TypeRegistry`] lets callers register native Rust types
//! with fields, methods and overloaded signatures.
//!
//! Template sources are loaded through [`TemplateResolver`] (in memory or from
//! disk) and generated text leaves through [`GeneratorOutput`] (in memory, to
//! files, fanned out to a pair of sinks, or captured with provenance for
//! debugging).
//!
//! # Example
//!
//! ```ignore
//! use stencil_engine::{
//!     Generator, JsonAdapter, MemoryOutput, MemoryResolver, TemplateFile,
//! };
//!
//! let mut resolver = MemoryResolver::new();
//! resolver.add_file(greeting_template_file()); // a TemplateFile value
//!
//! let adapter = JsonAdapter;
//! let model = JsonAdapter::to_value(&serde_json::json!({"name": "World"}));
//!
//! let mut output = MemoryOutput::new();
//! let mut generator =
//!     Generator::new(&mut resolver, &mut output, &adapter).with_default_channel("out");
//! generator.generate("greeting.json", "hello", model)?;
//! assert_eq!(output.content("out"), Some("Hello, World!"));
//! ```

pub mod adapter;
pub mod ast;
pub mod env;
pub mod error;
pub mod eval;
pub mod generator;
pub mod literal;
pub mod output;
pub mod position;
pub mod registry;
pub mod resolver;
pub mod value;

// Re-export main types at crate root
pub use adapter::{AdapterError, AdapterResult, HostAdapter, JsonAdapter, NullAdapter};
pub use ast::{
    BinaryOp, Expr, Import, Statement, TemplateDef, TemplateFile, UnaryOp,
};
pub use env::Environment;
pub use error::{EngineError, EngineResult, GeneratorError, InvocationFrame};
pub use eval::Evaluator;
pub use generator::Generator;
pub use output::{
    CombinedOutput, DebugOutput, Encoding, FileOutput, GeneratorOutput, MemoryOutput, Origin,
    OutputPreferences, OverwritePolicy, TraceSpan,
};
pub use position::Position;
pub use registry::{ParamType, TypeBuilder, TypeRegistry};
pub use resolver::{FileResolver, MemoryResolver, TemplateResolver};
pub use value::{CounterState, PrimitiveType, TypeDesc, Value};

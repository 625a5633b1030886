/*
 * ast.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! AST for the template language.
//!
//! Statements and expressions are closed sums; the generator and evaluator
//! match them exhaustively. The concrete delimiter syntax is a front-end
//! concern; this crate consumes templates either built programmatically or
//! deserialized from their JSON form (every node derives serde traits,
//! tagged by `kind`).
//!
//! Literal nodes hold already-decoded values. Source text is decoded at
//! construction time through the helpers in [`crate::literal`], so
//! malformed literals fail before any execution.

use crate::error::{EngineError, EngineResult};
use crate::literal;
use crate::position::Position;
use crate::value::{TypeDesc, Value};
use serde::{Deserialize, Serialize};

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnaryOp {
    /// `+`
    Plus,
    /// `-`
    Minus,
    /// `!`
    Not,
    /// `~`
    BitNot,
}

/// Binary operators, including the short-circuit forms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    /// `<<`
    Shl,
    /// `>>`
    Shr,
    /// `>>>`
    Ushr,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    /// Eager `&`
    BitAnd,
    /// Eager `|`
    BitOr,
    /// `^`
    BitXor,
    /// Short-circuit `&&`
    And,
    /// Short-circuit `||`
    Or,
}

/// An expression node. Every variant carries the source position of the
/// construct for diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Expr {
    Null {
        position: Position,
    },
    Bool {
        value: bool,
        position: Position,
    },
    Int {
        value: i32,
        position: Position,
    },
    Long {
        value: i64,
        position: Position,
    },
    Float {
        value: f32,
        position: Position,
    },
    Double {
        value: f64,
        position: Position,
    },
    Char {
        value: char,
        position: Position,
    },
    Str {
        value: String,
        position: Position,
    },
    /// A class literal such as `int`, `java.lang.String`, or `int[][]`.
    ClassLit {
        type_desc: TypeDesc,
        position: Position,
    },
    /// The current model value.
    This {
        position: Position,
    },
    /// A bound local variable (loop variable, counter).
    Ident {
        name: String,
        position: Position,
    },
    FieldAccess {
        target: Box<Expr>,
        name: String,
        position: Position,
    },
    /// Static field access, qualified by a fully qualified type name.
    StaticField {
        type_name: String,
        name: String,
        position: Position,
    },
    ArrayAccess {
        target: Box<Expr>,
        index: Box<Expr>,
        position: Position,
    },
    MethodCall {
        target: Box<Expr>,
        name: String,
        args: Vec<Expr>,
        position: Position,
    },
    /// Static method call, qualified by a fully qualified type name.
    StaticCall {
        type_name: String,
        name: String,
        args: Vec<Expr>,
        position: Position,
    },
    /// Instance construction through the host adapter.
    New {
        type_name: String,
        args: Vec<Expr>,
        position: Position,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
        position: Position,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
        position: Position,
    },
    /// Ternary conditional; only the selected branch is evaluated.
    Conditional {
        condition: Box<Expr>,
        then_expr: Box<Expr>,
        else_expr: Box<Expr>,
        position: Position,
    },
    Cast {
        target_type: TypeDesc,
        operand: Box<Expr>,
        position: Position,
    },
    InstanceOf {
        operand: Box<Expr>,
        type_desc: TypeDesc,
        position: Position,
    },
}

impl Expr {
    pub fn position(&self) -> Position {
        match self {
            Expr::Null { position }
            | Expr::Bool { position, .. }
            | Expr::Int { position, .. }
            | Expr::Long { position, .. }
            | Expr::Float { position, .. }
            | Expr::Double { position, .. }
            | Expr::Char { position, .. }
            | Expr::Str { position, .. }
            | Expr::ClassLit { position, .. }
            | Expr::This { position }
            | Expr::Ident { position, .. }
            | Expr::FieldAccess { position, .. }
            | Expr::StaticField { position, .. }
            | Expr::ArrayAccess { position, .. }
            | Expr::MethodCall { position, .. }
            | Expr::StaticCall { position, .. }
            | Expr::New { position, .. }
            | Expr::Unary { position, .. }
            | Expr::Binary { position, .. }
            | Expr::Conditional { position, .. }
            | Expr::Cast { position, .. }
            | Expr::InstanceOf { position, .. } => *position,
        }
    }

    /// Build an integer literal node from source text (`42`, `0x80000000`,
    /// `7L`), failing on malformed or out-of-range text.
    pub fn integer_literal(text: &str, position: Position) -> EngineResult<Expr> {
        match literal::parse_integer(text, position)? {
            Value::Int(value) => Ok(Expr::Int { value, position }),
            Value::Long(value) => Ok(Expr::Long { value, position }),
            _ => unreachable!("parse_integer yields int or long"),
        }
    }

    /// Build a floating-point literal node from source text.
    pub fn float_literal(text: &str, position: Position) -> EngineResult<Expr> {
        match literal::parse_float(text, position)? {
            Value::Float(value) => Ok(Expr::Float { value, position }),
            Value::Double(value) => Ok(Expr::Double { value, position }),
            _ => unreachable!("parse_float yields float or double"),
        }
    }

    /// Build a string literal node from its body text (quotes stripped,
    /// escapes still encoded).
    pub fn string_literal(text: &str, position: Position) -> EngineResult<Expr> {
        Ok(Expr::Str {
            value: literal::parse_string(text, position)?,
            position,
        })
    }

    /// Build a character literal node from its body text.
    pub fn character_literal(text: &str, position: Position) -> EngineResult<Expr> {
        Ok(Expr::Char {
            value: literal::parse_character(text, position)?,
            position,
        })
    }
}

/// A statement node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Statement {
    /// Literal text copied verbatim to the active output channel.
    Text {
        text: String,
        position: Position,
    },
    /// No-op; kept in the tree so positions survive for tooling.
    Comment {
        text: String,
        position: Position,
    },
    /// Expression interpolation; the value is rendered to the active
    /// channel.
    Interpolate {
        expr: Expr,
        position: Position,
    },
    /// Switches the active output channel for the nested statements.
    Output {
        channel: Expr,
        body: Vec<Statement>,
        position: Position,
    },
    If {
        condition: Expr,
        then_body: Vec<Statement>,
        #[serde(default)]
        else_body: Vec<Statement>,
        position: Position,
    },
    ForEach {
        var: String,
        source: Expr,
        #[serde(default)]
        counter: Option<String>,
        #[serde(default)]
        separator: Option<Expr>,
        body: Vec<Statement>,
        position: Position,
    },
    /// Invokes another template with the argument value bound as `this`.
    /// With `each`, the argument is iterated and the template applied per
    /// element, the separator rendered between applications.
    Invoke {
        #[serde(default)]
        alias: Option<String>,
        template: String,
        arg: Expr,
        #[serde(default)]
        each: bool,
        #[serde(default)]
        separator: Option<Expr>,
        position: Position,
    },
}

impl Statement {
    pub fn position(&self) -> Position {
        match self {
            Statement::Text { position, .. }
            | Statement::Comment { position, .. }
            | Statement::Interpolate { position, .. }
            | Statement::Output { position, .. }
            | Statement::If { position, .. }
            | Statement::ForEach { position, .. }
            | Statement::Invoke { position, .. } => *position,
        }
    }

    /// Statement kind label, used for debug traces.
    pub fn label(&self) -> &'static str {
        match self {
            Statement::Text { .. } => "text",
            Statement::Comment { .. } => "comment",
            Statement::Interpolate { .. } => "interpolate",
            Statement::Output { .. } => "output",
            Statement::If { .. } => "if",
            Statement::ForEach { .. } => "foreach",
            Statement::Invoke { .. } => "invoke",
        }
    }
}

/// An import declaration: a local alias for another template resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Import {
    pub alias: String,
    pub target: String,
    #[serde(default)]
    pub position: Position,
}

/// A named template definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateDef {
    pub name: String,
    /// Declared model type name; documentation for callers, not enforced
    /// at runtime beyond duck typing.
    #[serde(default)]
    pub model_type: Option<String>,
    pub body: Vec<Statement>,
    #[serde(default)]
    pub position: Position,
}

/// One template source unit: a resource URI, its imports, and its
/// template definitions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateFile {
    pub uri: String,
    #[serde(default)]
    pub imports: Vec<Import>,
    pub templates: Vec<TemplateDef>,
}

impl TemplateFile {
    /// Build a file, checking that template names are unique within it.
    pub fn new(
        uri: impl Into<String>,
        imports: Vec<Import>,
        templates: Vec<TemplateDef>,
    ) -> EngineResult<Self> {
        let file = Self {
            uri: uri.into(),
            imports,
            templates,
        };
        file.validate()?;
        Ok(file)
    }

    /// Check file-level invariants (used after deserialization too).
    pub fn validate(&self) -> EngineResult<()> {
        let mut seen = std::collections::BTreeSet::new();
        for template in &self.templates {
            if !seen.insert(template.name.as_str()) {
                return Err(EngineError::DuplicateTemplate {
                    name: template.name.clone(),
                    uri: self.uri.clone(),
                });
            }
        }
        Ok(())
    }

    pub fn find_template(&self, name: &str) -> Option<&TemplateDef> {
        self.templates.iter().find(|t| t.name == name)
    }

    pub fn find_import(&self, alias: &str) -> Option<&Import> {
        self.imports.iter().find(|i| i.alias == alias)
    }
}

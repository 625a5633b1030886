/*
 * eval.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! The expression evaluator.
//!
//! Walks [`Expr`] nodes against the current environment (which holds
//! `this` and the local bindings) and a [`HostAdapter`], producing
//! [`Value`]s. The numeric semantics reproduce the host language's rules:
//!
//! - Unary promotion: byte/short/char promote to int before any numeric
//!   operator; int, long, float, double pass through.
//! - Binary promotion: if either operand is double the operation is done
//!   in double, else float, else long, else int. Integral arithmetic
//!   wraps two's-complement; integral `/` and `%` by zero are errors.
//! - `&`/`|`/`^` are eager and work on booleans or integral operands;
//!   `&&`/`||` short-circuit and require booleans.
//! - Shift distances are masked (`& 0x1f` for int, `& 0x3f` for long);
//!   `>>>` is the unsigned right shift.
//! - `==`/`!=` compare numerics after promotion, booleans by value, and
//!   reference values by identity.
//! - The ternary conditional evaluates only the selected branch.
//!
//! Member access goes through the adapter, except for the built-in
//! surfaces the evaluator owns: counter fields/methods, list `length`
//! and indexing, and the common string methods.

use crate::adapter::{AdapterError, HostAdapter};
use crate::ast::{BinaryOp, Expr, UnaryOp};
use crate::env::Environment;
use crate::error::{EngineError, EngineResult};
use crate::position::Position;
use crate::value::{PrimitiveType, TypeDesc, Value};

/// A numerically promoted operand.
#[derive(Debug, Clone, Copy)]
enum Num {
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
}

impl Num {
    fn into_value(self) -> Value {
        match self {
            Num::Int(v) => Value::Int(v),
            Num::Long(v) => Value::Long(v),
            Num::Float(v) => Value::Float(v),
            Num::Double(v) => Value::Double(v),
        }
    }
}

/// Unary numeric promotion. `None` when the value is not numeric.
fn promote_unary(value: &Value) -> Option<Num> {
    match value {
        Value::Byte(v) => Some(Num::Int(i32::from(*v))),
        Value::Short(v) => Some(Num::Int(i32::from(*v))),
        Value::Char(c) => Some(Num::Int(*c as i32)),
        Value::Int(v) => Some(Num::Int(*v)),
        Value::Long(v) => Some(Num::Long(*v)),
        Value::Float(v) => Some(Num::Float(*v)),
        Value::Double(v) => Some(Num::Double(*v)),
        _ => None,
    }
}

/// Binary numeric promotion to the wider of the two kinds.
fn promote_pair(a: Num, b: Num) -> (Num, Num) {
    use Num::*;
    match (a, b) {
        (Double(_), _) | (_, Double(_)) => (Double(to_f64(a)), Double(to_f64(b))),
        (Float(_), _) | (_, Float(_)) => (Float(to_f64(a) as f32), Float(to_f64(b) as f32)),
        (Long(_), _) | (_, Long(_)) => (Long(to_i64(a)), Long(to_i64(b))),
        (Int(x), Int(y)) => (Int(x), Int(y)),
    }
}

fn to_i64(n: Num) -> i64 {
    match n {
        Num::Int(v) => i64::from(v),
        Num::Long(v) => v,
        Num::Float(v) => v as i64,
        Num::Double(v) => v as i64,
    }
}

fn to_f64(n: Num) -> f64 {
    match n {
        Num::Int(v) => f64::from(v),
        Num::Long(v) => v as f64,
        Num::Float(v) => f64::from(v),
        Num::Double(v) => v,
    }
}

pub struct Evaluator<'a> {
    adapter: &'a dyn HostAdapter,
}

impl<'a> Evaluator<'a> {
    pub fn new(adapter: &'a dyn HostAdapter) -> Self {
        Self { adapter }
    }

    pub fn eval(&self, expr: &Expr, env: &Environment) -> EngineResult<Value> {
        match expr {
            Expr::Null { .. } => Ok(Value::Null),
            Expr::Bool { value, .. } => Ok(Value::Bool(*value)),
            Expr::Int { value, .. } => Ok(Value::Int(*value)),
            Expr::Long { value, .. } => Ok(Value::Long(*value)),
            Expr::Float { value, .. } => Ok(Value::Float(*value)),
            Expr::Double { value, .. } => Ok(Value::Double(*value)),
            Expr::Char { value, .. } => Ok(Value::Char(*value)),
            Expr::Str { value, .. } => Ok(Value::Str(value.clone())),
            Expr::ClassLit { type_desc, .. } => Ok(Value::Type(type_desc.clone())),
            Expr::This { position } => self.lookup(env, "this", *position),
            Expr::Ident { name, position } => self.lookup(env, name, *position),
            Expr::FieldAccess {
                target,
                name,
                position,
            } => {
                let target = self.eval(target, env)?;
                self.field(&target, name, *position)
            }
            Expr::StaticField {
                type_name,
                name,
                position,
            } => self
                .adapter
                .resolve_static_field(type_name, name)
                .map_err(|e| adapter_failure(e, *position)),
            Expr::ArrayAccess {
                target,
                index,
                position,
            } => {
                let target = self.eval(target, env)?;
                let index = self.int_index(index, env)?;
                self.index(&target, index, *position)
            }
            Expr::MethodCall {
                target,
                name,
                args,
                position,
            } => {
                let target = self.eval(target, env)?;
                let args = self.eval_args(args, env)?;
                self.call(&target, name, &args, *position)
            }
            Expr::StaticCall {
                type_name,
                name,
                args,
                position,
            } => {
                let args = self.eval_args(args, env)?;
                self.adapter
                    .resolve_static_method(type_name, name, &args)
                    .map_err(|e| adapter_failure(e, *position))
            }
            Expr::New {
                type_name,
                args,
                position,
            } => {
                let args = self.eval_args(args, env)?;
                self.adapter
                    .new_instance(type_name, &args)
                    .map_err(|e| adapter_failure(e, *position))
            }
            Expr::Unary {
                op,
                operand,
                position,
            } => {
                let operand = self.eval(operand, env)?;
                self.unary(*op, &operand, *position)
            }
            Expr::Binary {
                op,
                left,
                right,
                position,
            } => self.binary(*op, left, right, env, *position),
            Expr::Conditional {
                condition,
                then_expr,
                else_expr,
                position,
            } => {
                if self.eval_bool(condition, env, *position)? {
                    self.eval(then_expr, env)
                } else {
                    self.eval(else_expr, env)
                }
            }
            Expr::Cast {
                target_type,
                operand,
                position,
            } => {
                let operand = self.eval(operand, env)?;
                self.cast(&operand, target_type, *position)
            }
            Expr::InstanceOf {
                operand,
                type_desc,
                position,
            } => {
                let operand = self.eval(operand, env)?;
                if matches!(operand, Value::Null) {
                    return Ok(Value::Bool(false));
                }
                self.adapter
                    .is_instance(&operand, type_desc)
                    .map(Value::Bool)
                    .map_err(|e| adapter_failure(e, *position))
            }
        }
    }

    /// Evaluate an expression that must produce a boolean.
    pub fn eval_bool(&self, expr: &Expr, env: &Environment, position: Position) -> EngineResult<bool> {
        match self.eval(expr, env)? {
            Value::Bool(b) => Ok(b),
            other => Err(mismatch("boolean", &other, position)),
        }
    }

    /// Evaluate an expression that must produce a string.
    pub fn eval_string(&self, expr: &Expr, env: &Environment, position: Position) -> EngineResult<String> {
        match self.eval(expr, env)? {
            Value::Str(s) => Ok(s),
            other => Err(mismatch("string", &other, position)),
        }
    }

    fn lookup(&self, env: &Environment, name: &str, position: Position) -> EngineResult<Value> {
        env.lookup(name)
            .cloned()
            .ok_or_else(|| EngineError::UnresolvedIdentifier {
                name: name.to_string(),
                position,
            })
    }

    fn eval_args(&self, args: &[Expr], env: &Environment) -> EngineResult<Vec<Value>> {
        args.iter().map(|arg| self.eval(arg, env)).collect()
    }

    /// Array-index operand: must promote to int (long indices are not
    /// allowed, matching the host language).
    fn int_index(&self, expr: &Expr, env: &Environment) -> EngineResult<i32> {
        let value = self.eval(expr, env)?;
        match promote_unary(&value) {
            Some(Num::Int(i)) => Ok(i),
            _ => Err(mismatch("int index", &value, expr.position())),
        }
    }

    fn field(&self, target: &Value, name: &str, position: Position) -> EngineResult<Value> {
        match target {
            Value::Null => Err(mismatch("object", target, position)),
            Value::Counter(c) => match name {
                "index" => Ok(Value::Int(c.index as i32)),
                "first" => Ok(Value::Bool(c.first)),
                "last" => Ok(Value::Bool(c.last)),
                "even" => Ok(Value::Bool(c.even())),
                "odd" => Ok(Value::Bool(c.odd())),
                _ => Err(unresolved_member(name, target, position)),
            },
            Value::List(items) => match name {
                "length" => Ok(Value::Int(items.len() as i32)),
                _ => Err(unresolved_member(name, target, position)),
            },
            _ => self
                .adapter
                .get_field(target, name)
                .map_err(|e| adapter_failure(e, position)),
        }
    }

    fn index(&self, target: &Value, index: i32, position: Position) -> EngineResult<Value> {
        match target {
            Value::List(items) => {
                let i = usize::try_from(index).map_err(|_| EngineError::IndexOutOfBounds {
                    index,
                    len: items.len(),
                    position,
                })?;
                items.get(i).cloned().ok_or(EngineError::IndexOutOfBounds {
                    index,
                    len: items.len(),
                    position,
                })
            }
            Value::Null => Err(mismatch("array", target, position)),
            _ => self
                .adapter
                .array_get(target, index)
                .map_err(|e| adapter_failure(e, position)),
        }
    }

    fn call(
        &self,
        target: &Value,
        name: &str,
        args: &[Value],
        position: Position,
    ) -> EngineResult<Value> {
        match target {
            Value::Null => Err(mismatch("object", target, position)),
            Value::Counter(c) if args.is_empty() => match name {
                "index" => Ok(Value::Int(c.index as i32)),
                "isFirst" => Ok(Value::Bool(c.first)),
                "isLast" => Ok(Value::Bool(c.last)),
                "isEven" => Ok(Value::Bool(c.even())),
                "isOdd" => Ok(Value::Bool(c.odd())),
                _ => Err(unresolved_member(name, target, position)),
            },
            Value::Str(s) => self.string_method(s, name, args, position),
            _ => self
                .adapter
                .call_method(target, name, args)
                .map_err(|e| adapter_failure(e, position)),
        }
    }

    /// Built-in string methods, mirroring the host string API surface the
    /// original templates rely on.
    fn string_method(
        &self,
        s: &str,
        name: &str,
        args: &[Value],
        position: Position,
    ) -> EngineResult<Value> {
        let chars: Vec<char> = s.chars().collect();
        match (name, args) {
            ("length", []) => Ok(Value::Int(chars.len() as i32)),
            ("isEmpty", []) => Ok(Value::Bool(s.is_empty())),
            ("toUpperCase", []) => Ok(Value::string(s.to_uppercase())),
            ("toLowerCase", []) => Ok(Value::string(s.to_lowercase())),
            ("trim", []) => Ok(Value::string(s.trim())),
            ("startsWith", [Value::Str(prefix)]) => Ok(Value::Bool(s.starts_with(prefix.as_str()))),
            ("endsWith", [Value::Str(suffix)]) => Ok(Value::Bool(s.ends_with(suffix.as_str()))),
            ("contains", [Value::Str(needle)]) => Ok(Value::Bool(s.contains(needle.as_str()))),
            ("indexOf", [Value::Str(needle)]) => {
                let index = s
                    .find(needle.as_str())
                    .map_or(-1, |byte| s[..byte].chars().count() as i32);
                Ok(Value::Int(index))
            }
            ("charAt", [index]) => {
                let i = self.require_int(index, position)?;
                usize::try_from(i)
                    .ok()
                    .and_then(|i| chars.get(i).copied())
                    .map(Value::Char)
                    .ok_or(EngineError::IndexOutOfBounds {
                        index: i,
                        len: chars.len(),
                        position,
                    })
            }
            ("substring", [start]) => {
                let from = self.require_int(start, position)?;
                self.substring(&chars, from, chars.len() as i32, position)
            }
            ("substring", [start, end]) => {
                let from = self.require_int(start, position)?;
                let to = self.require_int(end, position)?;
                self.substring(&chars, from, to, position)
            }
            _ => Err(unresolved_member(name, &Value::string(s), position)),
        }
    }

    fn require_int(&self, value: &Value, position: Position) -> EngineResult<i32> {
        match promote_unary(value) {
            Some(Num::Int(i)) => Ok(i),
            _ => Err(mismatch("int", value, position)),
        }
    }

    fn substring(
        &self,
        chars: &[char],
        from: i32,
        to: i32,
        position: Position,
    ) -> EngineResult<Value> {
        let len = chars.len() as i32;
        if from < 0 || to > len || from > to {
            return Err(EngineError::IndexOutOfBounds {
                index: if from < 0 || from > to { from } else { to },
                len: chars.len(),
                position,
            });
        }
        Ok(Value::string(
            chars[from as usize..to as usize].iter().collect::<String>(),
        ))
    }

    fn unary(&self, op: UnaryOp, operand: &Value, position: Position) -> EngineResult<Value> {
        match op {
            UnaryOp::Not => match operand {
                Value::Bool(b) => Ok(Value::Bool(!b)),
                other => Err(mismatch("boolean", other, position)),
            },
            UnaryOp::BitNot => match promote_unary(operand) {
                Some(Num::Int(v)) => Ok(Value::Int(!v)),
                Some(Num::Long(v)) => Ok(Value::Long(!v)),
                _ => Err(mismatch("integral value", operand, position)),
            },
            UnaryOp::Plus => promote_unary(operand)
                .map(Num::into_value)
                .ok_or_else(|| mismatch("numeric value", operand, position)),
            UnaryOp::Minus => match promote_unary(operand) {
                Some(Num::Int(v)) => Ok(Value::Int(v.wrapping_neg())),
                Some(Num::Long(v)) => Ok(Value::Long(v.wrapping_neg())),
                Some(Num::Float(v)) => Ok(Value::Float(-v)),
                Some(Num::Double(v)) => Ok(Value::Double(-v)),
                None => Err(mismatch("numeric value", operand, position)),
            },
        }
    }

    fn binary(
        &self,
        op: BinaryOp,
        left: &Expr,
        right: &Expr,
        env: &Environment,
        position: Position,
    ) -> EngineResult<Value> {
        // Short-circuit forms evaluate the right operand lazily.
        if let BinaryOp::And | BinaryOp::Or = op {
            let l = self.eval_bool(left, env, left.position())?;
            return match (op, l) {
                (BinaryOp::And, false) => Ok(Value::Bool(false)),
                (BinaryOp::Or, true) => Ok(Value::Bool(true)),
                _ => Ok(Value::Bool(self.eval_bool(right, env, right.position())?)),
            };
        }

        let l = self.eval(left, env)?;
        let r = self.eval(right, env)?;

        match op {
            BinaryOp::Add if matches!(l, Value::Str(_)) || matches!(r, Value::Str(_)) => {
                Ok(Value::string(format!("{}{}", l.render(), r.render())))
            }
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => {
                self.arith(op, &l, &r, position)
            }
            BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
                self.relational(op, &l, &r, position)
            }
            BinaryOp::Eq | BinaryOp::Ne => {
                let eq = self.equality(&l, &r, position)?;
                Ok(Value::Bool(if op == BinaryOp::Eq { eq } else { !eq }))
            }
            BinaryOp::BitAnd | BinaryOp::BitOr | BinaryOp::BitXor => {
                self.bitwise(op, &l, &r, position)
            }
            BinaryOp::Shl | BinaryOp::Shr | BinaryOp::Ushr => self.shift(op, &l, &r, position),
            BinaryOp::And | BinaryOp::Or => unreachable!("handled above"),
        }
    }

    fn arith(&self, op: BinaryOp, l: &Value, r: &Value, position: Position) -> EngineResult<Value> {
        let (a, b) = self.promote_operands(l, r, position)?;
        let div_by_zero = || EngineError::DivisionByZero { position };
        Ok(match (a, b) {
            (Num::Int(x), Num::Int(y)) => Value::Int(match op {
                BinaryOp::Add => x.wrapping_add(y),
                BinaryOp::Sub => x.wrapping_sub(y),
                BinaryOp::Mul => x.wrapping_mul(y),
                BinaryOp::Div => {
                    if y == 0 {
                        return Err(div_by_zero());
                    }
                    x.wrapping_div(y)
                }
                BinaryOp::Rem => {
                    if y == 0 {
                        return Err(div_by_zero());
                    }
                    x.wrapping_rem(y)
                }
                _ => unreachable!(),
            }),
            (Num::Long(x), Num::Long(y)) => Value::Long(match op {
                BinaryOp::Add => x.wrapping_add(y),
                BinaryOp::Sub => x.wrapping_sub(y),
                BinaryOp::Mul => x.wrapping_mul(y),
                BinaryOp::Div => {
                    if y == 0 {
                        return Err(div_by_zero());
                    }
                    x.wrapping_div(y)
                }
                BinaryOp::Rem => {
                    if y == 0 {
                        return Err(div_by_zero());
                    }
                    x.wrapping_rem(y)
                }
                _ => unreachable!(),
            }),
            (Num::Float(x), Num::Float(y)) => Value::Float(match op {
                BinaryOp::Add => x + y,
                BinaryOp::Sub => x - y,
                BinaryOp::Mul => x * y,
                BinaryOp::Div => x / y,
                BinaryOp::Rem => x % y,
                _ => unreachable!(),
            }),
            (Num::Double(x), Num::Double(y)) => Value::Double(match op {
                BinaryOp::Add => x + y,
                BinaryOp::Sub => x - y,
                BinaryOp::Mul => x * y,
                BinaryOp::Div => x / y,
                BinaryOp::Rem => x % y,
                _ => unreachable!(),
            }),
            _ => unreachable!("promote_pair yields matching kinds"),
        })
    }

    fn relational(
        &self,
        op: BinaryOp,
        l: &Value,
        r: &Value,
        position: Position,
    ) -> EngineResult<Value> {
        let (a, b) = self.promote_operands(l, r, position)?;
        let result = match (a, b) {
            (Num::Int(x), Num::Int(y)) => compare(op, x, y),
            (Num::Long(x), Num::Long(y)) => compare(op, x, y),
            // NaN comparisons are false for every relational operator.
            (Num::Float(x), Num::Float(y)) => compare_float(op, f64::from(x), f64::from(y)),
            (Num::Double(x), Num::Double(y)) => compare_float(op, x, y),
            _ => unreachable!("promote_pair yields matching kinds"),
        };
        Ok(Value::Bool(result))
    }

    fn equality(&self, l: &Value, r: &Value, position: Position) -> EngineResult<bool> {
        if l.is_numeric() && r.is_numeric() {
            let (a, b) = self.promote_operands(l, r, position)?;
            return Ok(match (a, b) {
                (Num::Int(x), Num::Int(y)) => x == y,
                (Num::Long(x), Num::Long(y)) => x == y,
                (Num::Float(x), Num::Float(y)) => x == y,
                (Num::Double(x), Num::Double(y)) => x == y,
                _ => unreachable!(),
            });
        }
        match (l, r) {
            (Value::Bool(a), Value::Bool(b)) => Ok(a == b),
            (Value::Null, Value::Null) => Ok(true),
            (Value::Null, _) | (_, Value::Null) => Ok(false),
            // Reference comparisons: identity for objects/lists, value
            // comparison for strings (interned literals compare equal in
            // the host language too) and descriptors.
            (Value::Str(a), Value::Str(b)) => Ok(a == b),
            (Value::Type(a), Value::Type(b)) => Ok(a == b),
            (Value::List(_), Value::List(_))
            | (Value::Object(_), Value::Object(_))
            | (Value::Counter(_), Value::Counter(_)) => Ok(l == r),
            (Value::Str(_) | Value::List(_) | Value::Object(_) | Value::Type(_), _)
                if !r.is_numeric() && !matches!(r, Value::Bool(_)) =>
            {
                Ok(false)
            }
            _ => Err(mismatch("comparable operands", r, position)),
        }
    }

    fn bitwise(&self, op: BinaryOp, l: &Value, r: &Value, position: Position) -> EngineResult<Value> {
        if let (Value::Bool(a), Value::Bool(b)) = (l, r) {
            return Ok(Value::Bool(match op {
                BinaryOp::BitAnd => a & b,
                BinaryOp::BitOr => a | b,
                BinaryOp::BitXor => a ^ b,
                _ => unreachable!(),
            }));
        }
        let (a, b) = self.promote_operands(l, r, position)?;
        match (a, b) {
            (Num::Int(x), Num::Int(y)) => Ok(Value::Int(match op {
                BinaryOp::BitAnd => x & y,
                BinaryOp::BitOr => x | y,
                BinaryOp::BitXor => x ^ y,
                _ => unreachable!(),
            })),
            (Num::Long(x), Num::Long(y)) => Ok(Value::Long(match op {
                BinaryOp::BitAnd => x & y,
                BinaryOp::BitOr => x | y,
                BinaryOp::BitXor => x ^ y,
                _ => unreachable!(),
            })),
            _ => Err(mismatch("integral or boolean operands", l, position)),
        }
    }

    fn shift(&self, op: BinaryOp, l: &Value, r: &Value, position: Position) -> EngineResult<Value> {
        // Each operand promotes separately; the result type is the left
        // operand's promoted type and the distance is masked to it.
        let value = promote_unary(l).ok_or_else(|| mismatch("integral value", l, position))?;
        let distance = promote_unary(r).ok_or_else(|| mismatch("integral value", r, position))?;
        let distance = match distance {
            Num::Int(d) => i64::from(d),
            Num::Long(d) => d,
            _ => return Err(mismatch("integral shift distance", r, position)),
        };
        match value {
            Num::Int(x) => {
                let d = (distance & 0x1f) as u32;
                Ok(Value::Int(match op {
                    BinaryOp::Shl => x.wrapping_shl(d),
                    BinaryOp::Shr => x.wrapping_shr(d),
                    BinaryOp::Ushr => ((x as u32) >> d) as i32,
                    _ => unreachable!(),
                }))
            }
            Num::Long(x) => {
                let d = (distance & 0x3f) as u32;
                Ok(Value::Long(match op {
                    BinaryOp::Shl => x.wrapping_shl(d),
                    BinaryOp::Shr => x.wrapping_shr(d),
                    BinaryOp::Ushr => ((x as u64) >> d) as i64,
                    _ => unreachable!(),
                }))
            }
            _ => Err(mismatch("integral value", l, position)),
        }
    }

    fn promote_operands(
        &self,
        l: &Value,
        r: &Value,
        position: Position,
    ) -> EngineResult<(Num, Num)> {
        let a = promote_unary(l).ok_or_else(|| mismatch("numeric value", l, position))?;
        let b = promote_unary(r).ok_or_else(|| mismatch("numeric value", r, position))?;
        Ok(promote_pair(a, b))
    }

    fn cast(&self, value: &Value, target: &TypeDesc, position: Position) -> EngineResult<Value> {
        match target {
            TypeDesc::Primitive(p) => self.cast_primitive(value, *p, position),
            _ => {
                // Reference cast: null passes, anything else must satisfy
                // the dynamic type check.
                if matches!(value, Value::Null) {
                    return Ok(Value::Null);
                }
                let compatible = self
                    .adapter
                    .is_instance(value, target)
                    .map_err(|e| adapter_failure(e, position))?;
                if compatible {
                    Ok(value.clone())
                } else {
                    Err(EngineError::CastFailed {
                        target: target.name(),
                        value: value.kind_name().to_string(),
                        position,
                    })
                }
            }
        }
    }

    fn cast_primitive(
        &self,
        value: &Value,
        target: PrimitiveType,
        position: Position,
    ) -> EngineResult<Value> {
        if target == PrimitiveType::Boolean {
            return match value {
                Value::Bool(b) => Ok(Value::Bool(*b)),
                other => Err(cast_failed("boolean", other, position)),
            };
        }
        let num = promote_unary(value)
            .ok_or_else(|| cast_failed(target.name(), value, position))?;
        // Integral sources narrow by truncating low bits; floating sources
        // convert through the host's float-to-integral rules (NaN to zero,
        // out-of-range saturating), which `as` reproduces.
        let value = match target {
            PrimitiveType::Byte => match num {
                Num::Int(v) => Value::Byte(v as i8),
                Num::Long(v) => Value::Byte(v as i8),
                Num::Float(v) => Value::Byte(v as i32 as i8),
                Num::Double(v) => Value::Byte(v as i32 as i8),
            },
            PrimitiveType::Short => match num {
                Num::Int(v) => Value::Short(v as i16),
                Num::Long(v) => Value::Short(v as i16),
                Num::Float(v) => Value::Short(v as i32 as i16),
                Num::Double(v) => Value::Short(v as i32 as i16),
            },
            PrimitiveType::Char => {
                let unit = match num {
                    Num::Int(v) => v as u16,
                    Num::Long(v) => v as u16,
                    Num::Float(v) => v as i32 as u16,
                    Num::Double(v) => v as i32 as u16,
                };
                match char::from_u32(u32::from(unit)) {
                    Some(c) => Value::Char(c),
                    None => return Err(cast_failed("char", value, position)),
                }
            }
            PrimitiveType::Int => match num {
                Num::Int(v) => Value::Int(v),
                Num::Long(v) => Value::Int(v as i32),
                Num::Float(v) => Value::Int(v as i32),
                Num::Double(v) => Value::Int(v as i32),
            },
            PrimitiveType::Long => match num {
                Num::Int(v) => Value::Long(i64::from(v)),
                Num::Long(v) => Value::Long(v),
                Num::Float(v) => Value::Long(v as i64),
                Num::Double(v) => Value::Long(v as i64),
            },
            PrimitiveType::Float => match num {
                Num::Int(v) => Value::Float(v as f32),
                Num::Long(v) => Value::Float(v as f32),
                Num::Float(v) => Value::Float(v),
                Num::Double(v) => Value::Float(v as f32),
            },
            PrimitiveType::Double => match num {
                Num::Int(v) => Value::Double(f64::from(v)),
                Num::Long(v) => Value::Double(v as f64),
                Num::Float(v) => Value::Double(f64::from(v)),
                Num::Double(v) => Value::Double(v),
            },
            PrimitiveType::Boolean => unreachable!("handled above"),
        };
        Ok(value)
    }
}

fn compare<T: Ord>(op: BinaryOp, x: T, y: T) -> bool {
    match op {
        BinaryOp::Lt => x < y,
        BinaryOp::Le => x <= y,
        BinaryOp::Gt => x > y,
        BinaryOp::Ge => x >= y,
        _ => unreachable!(),
    }
}

fn compare_float(op: BinaryOp, x: f64, y: f64) -> bool {
    match op {
        BinaryOp::Lt => x < y,
        BinaryOp::Le => x <= y,
        BinaryOp::Gt => x > y,
        BinaryOp::Ge => x >= y,
        _ => unreachable!(),
    }
}

fn mismatch(expected: &str, found: &Value, position: Position) -> EngineError {
    EngineError::TypeMismatch {
        expected: expected.to_string(),
        found: found.kind_name().to_string(),
        position,
    }
}

fn cast_failed(target: &str, value: &Value, position: Position) -> EngineError {
    EngineError::CastFailed {
        target: target.to_string(),
        value: value.kind_name().to_string(),
        position,
    }
}

fn unresolved_member(name: &str, target: &Value, position: Position) -> EngineError {
    EngineError::UnresolvedMember {
        name: name.to_string(),
        target: target.kind_name().to_string(),
        position,
    }
}

/// Attach a source position to an adapter failure, mapping it onto the
/// engine's error taxonomy.
pub fn adapter_failure(error: AdapterError, position: Position) -> EngineError {
    match error {
        AdapterError::UnknownMember { name, target } => EngineError::UnresolvedMember {
            name,
            target,
            position,
        },
        AdapterError::Ambiguous { name } => EngineError::AmbiguousOverload { name, position },
        AdapterError::UnknownType { name } => EngineError::UnknownType { name, position },
        AdapterError::IndexOutOfBounds { index, len } => EngineError::IndexOutOfBounds {
            index,
            len,
            position,
        },
        AdapterError::Unsupported { message } => EngineError::Adapter { message, position },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::NullAdapter;
    use pretty_assertions::assert_eq;

    fn pos() -> Position {
        Position::new(1, 1)
    }

    fn env_with(bindings: &[(&str, Value)]) -> Environment {
        let mut env = Environment::new();
        env.push_frame(false);
        for (name, value) in bindings {
            env.define(*name, value.clone());
        }
        env
    }

    fn eval(expr: &Expr) -> EngineResult<Value> {
        let env = env_with(&[]);
        Evaluator::new(&NullAdapter).eval(expr, &env)
    }

    fn int(v: i32) -> Expr {
        Expr::Int { value: v, position: pos() }
    }

    fn binary(op: BinaryOp, l: Expr, r: Expr) -> Expr {
        Expr::Binary {
            op,
            left: Box::new(l),
            right: Box::new(r),
            position: pos(),
        }
    }

    // ===== numeric promotion and arithmetic =====

    #[test]
    fn test_int_arithmetic() {
        assert_eq!(eval(&binary(BinaryOp::Mul, int(2), int(3))).unwrap(), Value::Int(6));
        assert_eq!(eval(&binary(BinaryOp::Div, int(19), int(2))).unwrap(), Value::Int(9));
        assert_eq!(eval(&binary(BinaryOp::Rem, int(19), int(2))).unwrap(), Value::Int(1));
    }

    #[test]
    fn test_float_double_promotion() {
        let expr = binary(
            BinaryOp::Mul,
            Expr::Float { value: 3.0, position: pos() },
            Expr::Double { value: 2.25, position: pos() },
        );
        assert_eq!(eval(&expr).unwrap(), Value::Double(6.75));
    }

    #[test]
    fn test_byte_short_char_promote_to_int() {
        let expr = binary(
            BinaryOp::Add,
            Expr::Char { value: 'a', position: pos() },
            Expr::Int { value: 1, position: pos() },
        );
        assert_eq!(eval(&expr).unwrap(), Value::Int(98));
        let expr = binary(
            BinaryOp::Add,
            Expr::Cast {
                target_type: TypeDesc::Primitive(PrimitiveType::Byte),
                operand: Box::new(int(1)),
                position: pos(),
            },
            Expr::Cast {
                target_type: TypeDesc::Primitive(PrimitiveType::Short),
                operand: Box::new(int(2)),
                position: pos(),
            },
        );
        assert_eq!(eval(&expr).unwrap(), Value::Int(3));
    }

    #[test]
    fn test_long_promotion() {
        let expr = binary(BinaryOp::Add, Expr::Long { value: 1, position: pos() }, int(2));
        assert_eq!(eval(&expr).unwrap(), Value::Long(3));
    }

    #[test]
    fn test_int_overflow_wraps() {
        let expr = binary(BinaryOp::Add, int(i32::MAX), int(1));
        assert_eq!(eval(&expr).unwrap(), Value::Int(i32::MIN));
    }

    #[test]
    fn test_integral_division_by_zero_fails() {
        assert!(matches!(
            eval(&binary(BinaryOp::Div, int(1), int(0))),
            Err(EngineError::DivisionByZero { .. })
        ));
        assert!(matches!(
            eval(&binary(BinaryOp::Rem, int(1), int(0))),
            Err(EngineError::DivisionByZero { .. })
        ));
        // Floating division by zero is infinity, not an error.
        let expr = binary(
            BinaryOp::Div,
            Expr::Double { value: 1.0, position: pos() },
            Expr::Double { value: 0.0, position: pos() },
        );
        assert_eq!(eval(&expr).unwrap(), Value::Double(f64::INFINITY));
    }

    // ===== string concatenation =====

    #[test]
    fn test_plus_concatenates_strings() {
        let expr = binary(
            BinaryOp::Add,
            Expr::Str { value: "n=".to_string(), position: pos() },
            int(4),
        );
        assert_eq!(eval(&expr).unwrap(), Value::string("n=4"));
        let expr = binary(
            BinaryOp::Add,
            int(4),
            Expr::Str { value: "!".to_string(), position: pos() },
        );
        assert_eq!(eval(&expr).unwrap(), Value::string("4!"));
    }

    // ===== bitwise, logical, shifts =====

    #[test]
    fn test_eager_bitwise_on_booleans_and_ints() {
        let t = Expr::Bool { value: true, position: pos() };
        let f = Expr::Bool { value: false, position: pos() };
        assert_eq!(
            eval(&binary(BinaryOp::BitAnd, t.clone(), f.clone())).unwrap(),
            Value::Bool(false)
        );
        assert_eq!(
            eval(&binary(BinaryOp::BitXor, t.clone(), f.clone())).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            eval(&binary(BinaryOp::BitAnd, int(0b1100), int(0b1010))).unwrap(),
            Value::Int(0b1000)
        );
        assert_eq!(
            eval(&binary(BinaryOp::BitOr, int(0b1100), int(0b1010))).unwrap(),
            Value::Int(0b1110)
        );
    }

    #[test]
    fn test_short_circuit_skips_right_operand() {
        // The right operand would fail (unresolved identifier) if evaluated.
        let boom = Expr::Ident { name: "boom".to_string(), position: pos() };
        let f = Expr::Bool { value: false, position: pos() };
        let t = Expr::Bool { value: true, position: pos() };
        assert_eq!(
            eval(&binary(BinaryOp::And, f, boom.clone())).unwrap(),
            Value::Bool(false)
        );
        assert_eq!(eval(&binary(BinaryOp::Or, t, boom)).unwrap(), Value::Bool(true));
    }

    #[test]
    fn test_logical_operators_require_booleans() {
        let t = Expr::Bool { value: true, position: pos() };
        assert!(eval(&binary(BinaryOp::And, int(1), t)).is_err());
    }

    #[test]
    fn test_shift_distance_is_masked() {
        assert_eq!(eval(&binary(BinaryOp::Shl, int(1), int(33))).unwrap(), Value::Int(2));
        assert_eq!(eval(&binary(BinaryOp::Shr, int(-8), int(1))).unwrap(), Value::Int(-4));
        assert_eq!(
            eval(&binary(BinaryOp::Ushr, int(-1), int(28))).unwrap(),
            Value::Int(0xf)
        );
        let expr = binary(BinaryOp::Shl, Expr::Long { value: 1, position: pos() }, int(65));
        assert_eq!(eval(&expr).unwrap(), Value::Long(2));
    }

    // ===== relational and equality =====

    #[test]
    fn test_relational_with_promotion() {
        assert_eq!(eval(&binary(BinaryOp::Lt, int(2), int(3))).unwrap(), Value::Bool(true));
        let expr = binary(
            BinaryOp::Ge,
            Expr::Double { value: 2.5, position: pos() },
            int(2),
        );
        assert_eq!(eval(&expr).unwrap(), Value::Bool(true));
        // NaN never compares.
        let nan = Expr::Double { value: f64::NAN, position: pos() };
        assert_eq!(
            eval(&binary(BinaryOp::Le, nan.clone(), nan)).unwrap(),
            Value::Bool(false)
        );
    }

    #[test]
    fn test_equality_promotes_numerics() {
        let expr = binary(BinaryOp::Eq, int(2), Expr::Double { value: 2.0, position: pos() });
        assert_eq!(eval(&expr).unwrap(), Value::Bool(true));
        let expr = binary(BinaryOp::Ne, int(2), int(3));
        assert_eq!(eval(&expr).unwrap(), Value::Bool(true));
    }

    #[test]
    fn test_equality_on_references() {
        let a = Value::list(vec![Value::Int(1)]);
        let b = Value::list(vec![Value::Int(1)]);
        let env = env_with(&[("a", a.clone()), ("a2", a), ("b", b)]);
        let ev = Evaluator::new(&NullAdapter);
        let ident = |name: &str| Expr::Ident { name: name.to_string(), position: pos() };
        // Same instance: equal. Structurally equal instance: not equal.
        assert_eq!(
            ev.eval(&binary(BinaryOp::Eq, ident("a"), ident("a2")), &env).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            ev.eval(&binary(BinaryOp::Eq, ident("a"), ident("b")), &env).unwrap(),
            Value::Bool(false)
        );
        // Null comparisons never error.
        assert_eq!(
            ev.eval(
                &binary(BinaryOp::Eq, ident("a"), Expr::Null { position: pos() }),
                &env
            )
            .unwrap(),
            Value::Bool(false)
        );
    }

    // ===== ternary =====

    #[test]
    fn test_conditional_is_lazy() {
        let boom = Expr::Ident { name: "boom".to_string(), position: pos() };
        let expr = Expr::Conditional {
            condition: Box::new(Expr::Bool { value: true, position: pos() }),
            then_expr: Box::new(int(1)),
            else_expr: Box::new(boom),
            position: pos(),
        };
        assert_eq!(eval(&expr).unwrap(), Value::Int(1));
    }

    #[test]
    fn test_conditional_requires_boolean_condition() {
        let expr = Expr::Conditional {
            condition: Box::new(int(1)),
            then_expr: Box::new(int(1)),
            else_expr: Box::new(int(2)),
            position: pos(),
        };
        assert!(matches!(eval(&expr), Err(EngineError::TypeMismatch { .. })));
    }

    // ===== unary =====

    #[test]
    fn test_unary_operators() {
        let minus = Expr::Unary {
            op: UnaryOp::Minus,
            operand: Box::new(int(5)),
            position: pos(),
        };
        assert_eq!(eval(&minus).unwrap(), Value::Int(-5));
        let not = Expr::Unary {
            op: UnaryOp::Not,
            operand: Box::new(Expr::Bool { value: false, position: pos() }),
            position: pos(),
        };
        assert_eq!(eval(&not).unwrap(), Value::Bool(true));
        let complement = Expr::Unary {
            op: UnaryOp::BitNot,
            operand: Box::new(int(0)),
            position: pos(),
        };
        assert_eq!(eval(&complement).unwrap(), Value::Int(-1));
        // ~ promotes byte to int first.
        let complement_byte = Expr::Unary {
            op: UnaryOp::BitNot,
            operand: Box::new(Expr::Cast {
                target_type: TypeDesc::Primitive(PrimitiveType::Byte),
                operand: Box::new(int(1)),
                position: pos(),
            }),
            position: pos(),
        };
        assert_eq!(eval(&complement_byte).unwrap(), Value::Int(-2));
    }

    // ===== casts =====

    #[test]
    fn test_primitive_casts() {
        let cast = |ty, operand| Expr::Cast {
            target_type: TypeDesc::Primitive(ty),
            operand: Box::new(operand),
            position: pos(),
        };
        assert_eq!(
            eval(&cast(PrimitiveType::Byte, int(300))).unwrap(),
            Value::Byte(44)
        );
        assert_eq!(
            eval(&cast(PrimitiveType::Int, Expr::Double { value: 9.9, position: pos() })).unwrap(),
            Value::Int(9)
        );
        assert_eq!(
            eval(&cast(PrimitiveType::Long, int(-1))).unwrap(),
            Value::Long(-1)
        );
        assert_eq!(
            eval(&cast(PrimitiveType::Char, int(97))).unwrap(),
            Value::Char('a')
        );
        assert_eq!(
            eval(&cast(PrimitiveType::Double, int(3))).unwrap(),
            Value::Double(3.0)
        );
        assert!(eval(&cast(PrimitiveType::Int, Expr::Bool { value: true, position: pos() })).is_err());
    }

    #[test]
    fn test_reference_cast_of_null_passes() {
        let expr = Expr::Cast {
            target_type: TypeDesc::Reference("anything".to_string()),
            operand: Box::new(Expr::Null { position: pos() }),
            position: pos(),
        };
        assert_eq!(eval(&expr).unwrap(), Value::Null);
    }

    #[test]
    fn test_instanceof_null_is_false() {
        let expr = Expr::InstanceOf {
            operand: Box::new(Expr::Null { position: pos() }),
            type_desc: TypeDesc::Reference("anything".to_string()),
            position: pos(),
        };
        assert_eq!(eval(&expr).unwrap(), Value::Bool(false));
    }

    // ===== member access =====

    #[test]
    fn test_list_length_and_indexing() {
        let list = Value::list(vec![Value::string("a"), Value::string("b")]);
        let env = env_with(&[("xs", list)]);
        let ev = Evaluator::new(&NullAdapter);
        let xs = Expr::Ident { name: "xs".to_string(), position: pos() };
        let length = Expr::FieldAccess {
            target: Box::new(xs.clone()),
            name: "length".to_string(),
            position: pos(),
        };
        assert_eq!(ev.eval(&length, &env).unwrap(), Value::Int(2));
        let index = Expr::ArrayAccess {
            target: Box::new(xs.clone()),
            index: Box::new(int(1)),
            position: pos(),
        };
        assert_eq!(ev.eval(&index, &env).unwrap(), Value::string("b"));
        let out = Expr::ArrayAccess {
            target: Box::new(xs.clone()),
            index: Box::new(int(2)),
            position: pos(),
        };
        assert!(matches!(
            ev.eval(&out, &env),
            Err(EngineError::IndexOutOfBounds { .. })
        ));
        // Long indices are rejected outright.
        let long_index = Expr::ArrayAccess {
            target: Box::new(xs),
            index: Box::new(Expr::Long { value: 0, position: pos() }),
            position: pos(),
        };
        assert!(matches!(
            ev.eval(&long_index, &env),
            Err(EngineError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_string_methods() {
        let env = env_with(&[("s", Value::string("Hello"))]);
        let ev = Evaluator::new(&NullAdapter);
        let s = || Box::new(Expr::Ident { name: "s".to_string(), position: pos() });
        let call = |name: &str, args: Vec<Expr>| Expr::MethodCall {
            target: s(),
            name: name.to_string(),
            args,
            position: pos(),
        };
        assert_eq!(ev.eval(&call("length", vec![]), &env).unwrap(), Value::Int(5));
        assert_eq!(
            ev.eval(&call("toUpperCase", vec![]), &env).unwrap(),
            Value::string("HELLO")
        );
        assert_eq!(
            ev.eval(&call("substring", vec![int(1), int(3)]), &env).unwrap(),
            Value::string("el")
        );
        assert_eq!(
            ev.eval(&call("charAt", vec![int(0)]), &env).unwrap(),
            Value::Char('H')
        );
        assert!(ev.eval(&call("reverse", vec![]), &env).is_err());
    }

    #[test]
    fn test_unresolved_identifier_carries_position() {
        let expr = Expr::Ident { name: "missing".to_string(), position: Position::new(4, 9) };
        match eval(&expr) {
            Err(EngineError::UnresolvedIdentifier { name, position }) => {
                assert_eq!(name, "missing");
                assert_eq!(position, Position::new(4, 9));
            }
            other => panic!("expected unresolved identifier, got {other:?}"),
        }
    }
}

/*
 * env.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Execution environment: variable frames and the invocation stack.
//!
//! Variable lookup walks a parent chain. A loop iteration pushes an
//! *inheriting* frame (the enclosing bindings stay visible); a template
//! invocation pushes a *fresh* frame so the callee sees only its own
//! `this`. The invocation stack exists purely for diagnostics; recursion
//! is legal and unbounded.

use crate::error::InvocationFrame;
use crate::position::Position;
use crate::value::Value;
use std::collections::BTreeMap;

#[derive(Debug)]
struct Frame {
    vars: BTreeMap<String, Value>,
    /// Index of the parent frame in the stack, if bindings are inherited.
    parent: Option<usize>,
}

/// Per-execution mutable state owned by one generator run.
#[derive(Debug, Default)]
pub struct Environment {
    frames: Vec<Frame>,
    invocations: Vec<InvocationFrame>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a frame. With `inherit`, lookups fall through to the frame
    /// that was current before the push.
    pub fn push_frame(&mut self, inherit: bool) {
        let parent = if inherit {
            self.frames.len().checked_sub(1)
        } else {
            None
        };
        self.frames.push(Frame {
            vars: BTreeMap::new(),
            parent,
        });
    }

    pub fn pop_frame(&mut self) {
        debug_assert!(!self.frames.is_empty(), "unbalanced frame pop");
        self.frames.pop();
    }

    /// Bind a variable in the current frame, shadowing any inherited
    /// binding of the same name.
    pub fn define(&mut self, name: impl Into<String>, value: Value) {
        let frame = self.frames.last_mut().expect("no active frame");
        frame.vars.insert(name.into(), value);
    }

    /// Look a variable up through the parent chain.
    pub fn lookup(&self, name: &str) -> Option<&Value> {
        let mut index = self.frames.len().checked_sub(1)?;
        loop {
            let frame = &self.frames[index];
            if let Some(value) = frame.vars.get(name) {
                return Some(value);
            }
            index = frame.parent?;
        }
    }

    pub fn push_invocation(&mut self, template: impl Into<String>, call_site: Position) {
        self.invocations.push(InvocationFrame {
            template: template.into(),
            call_site,
        });
    }

    pub fn pop_invocation(&mut self) {
        debug_assert!(!self.invocations.is_empty(), "unbalanced invocation pop");
        self.invocations.pop();
    }

    /// Snapshot of the invocation stack, outermost first.
    pub fn invocation_stack(&self) -> Vec<InvocationFrame> {
        self.invocations.clone()
    }

    pub fn depth(&self) -> usize {
        self.invocations.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_inheriting_frame_sees_outer_bindings() {
        let mut env = Environment::new();
        env.push_frame(false);
        env.define("this", Value::Int(1));
        env.push_frame(true);
        env.define("item", Value::Int(2));
        assert_eq!(env.lookup("this"), Some(&Value::Int(1)));
        assert_eq!(env.lookup("item"), Some(&Value::Int(2)));
        env.pop_frame();
        assert_eq!(env.lookup("item"), None);
    }

    #[test]
    fn test_fresh_frame_hides_outer_bindings() {
        let mut env = Environment::new();
        env.push_frame(false);
        env.define("outer", Value::Int(1));
        env.push_frame(false);
        assert_eq!(env.lookup("outer"), None);
        env.pop_frame();
        assert_eq!(env.lookup("outer"), Some(&Value::Int(1)));
    }

    #[test]
    fn test_shadowing_in_inner_frame() {
        let mut env = Environment::new();
        env.push_frame(false);
        env.define("x", Value::Int(1));
        env.push_frame(true);
        env.define("x", Value::Int(2));
        assert_eq!(env.lookup("x"), Some(&Value::Int(2)));
        env.pop_frame();
        assert_eq!(env.lookup("x"), Some(&Value::Int(1)));
    }
}

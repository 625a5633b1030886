/*
 * generator.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! The generation orchestrator.
//!
//! A [`Generator`] drives one execution: it selects the entry template
//! through its resolver, binds the root model as `this`, and executes the
//! statement sequence against its output. Execution is single-threaded
//! and strictly in source order; each run owns its environment, so
//! independent generators may run on separate threads without shared
//! state.
//!
//! The invocation-frame stack exists for diagnostics only. Recursive
//! template invocation is legal and bounded by the host call stack alone;
//! any failure aborts the chain and is surfaced as a
//! [`GeneratorError`] carrying the frames active at the failure point.

use crate::adapter::HostAdapter;
use crate::ast::{Statement, TemplateFile};
use crate::env::Environment;
use crate::error::{EngineError, EngineResult, GeneratorError};
use crate::eval::Evaluator;
use crate::output::{GeneratorOutput, Origin};
use crate::position::Position;
use crate::resolver::TemplateResolver;
use crate::value::{CounterState, Value};
use std::rc::Rc;

pub struct Generator<'a> {
    resolver: &'a mut dyn TemplateResolver,
    output: &'a mut dyn GeneratorOutput,
    adapter: &'a dyn HostAdapter,
    default_channel: Option<String>,
}

impl<'a> Generator<'a> {
    pub fn new(
        resolver: &'a mut dyn TemplateResolver,
        output: &'a mut dyn GeneratorOutput,
        adapter: &'a dyn HostAdapter,
    ) -> Self {
        Self {
            resolver,
            output,
            adapter,
            default_channel: None,
        }
    }

    /// Channel used for text produced outside any output block. Without
    /// one, such text is an error.
    pub fn with_default_channel(mut self, channel: impl Into<String>) -> Self {
        self.default_channel = Some(channel.into());
        self
    }

    /// Execute the named template from the given resource against a root
    /// model value, driving all writes through the configured output.
    pub fn generate(
        &mut self,
        uri: &str,
        template: &str,
        model: Value,
    ) -> Result<(), GeneratorError> {
        tracing::info!(uri, template, "generating");
        let mut env = Environment::new();
        let mut channels: Vec<String> = Vec::new();
        let result = self
            .resolver
            .resolve_template(uri, template)
            .and_then(|(file, index)| {
                self.exec_template(&file, index, model, Position::start(), &mut env, &mut channels)
            });
        result.map_err(|error| GeneratorError::new(error, env.invocation_stack()))
    }

    fn exec_template(
        &mut self,
        file: &Rc<TemplateFile>,
        index: usize,
        this: Value,
        call_site: Position,
        env: &mut Environment,
        channels: &mut Vec<String>,
    ) -> EngineResult<()> {
        let def = &file.templates[index];
        tracing::debug!(template = %def.name, uri = %file.uri, depth = env.depth(), "executing template");
        env.push_invocation(def.name.clone(), call_site);
        // A fresh frame: the callee sees only its own `this`.
        env.push_frame(false);
        env.define("this", this);
        self.exec_statements(file, &def.body, env, channels)?;
        env.pop_frame();
        env.pop_invocation();
        Ok(())
    }

    fn exec_statements(
        &mut self,
        file: &Rc<TemplateFile>,
        statements: &[Statement],
        env: &mut Environment,
        channels: &mut Vec<String>,
    ) -> EngineResult<()> {
        for statement in statements {
            self.exec_statement(file, statement, env, channels)?;
        }
        Ok(())
    }

    fn exec_statement(
        &mut self,
        file: &Rc<TemplateFile>,
        statement: &Statement,
        env: &mut Environment,
        channels: &mut Vec<String>,
    ) -> EngineResult<()> {
        let origin = Origin::new(statement.label(), statement.position());
        match statement {
            Statement::Text { text, .. } => self.write(channels, text, origin),
            Statement::Comment { .. } => Ok(()),
            Statement::Interpolate { expr, .. } => {
                let value = Evaluator::new(self.adapter).eval(expr, env)?;
                self.write(channels, &value.render(), origin)
            }
            Statement::Output { channel, body, .. } => {
                let name =
                    Evaluator::new(self.adapter).eval_string(channel, env, channel.position())?;
                channels.push(name);
                let result = self.exec_statements(file, body, env, channels);
                channels.pop();
                result
            }
            Statement::If {
                condition,
                then_body,
                else_body,
                ..
            } => {
                let branch = if Evaluator::new(self.adapter).eval_bool(
                    condition,
                    env,
                    condition.position(),
                )? {
                    then_body
                } else {
                    else_body
                };
                self.exec_statements(file, branch, env, channels)
            }
            Statement::ForEach {
                var,
                source,
                counter,
                separator,
                body,
                ..
            } => {
                let items = {
                    let value = Evaluator::new(self.adapter).eval(source, env)?;
                    self.iterable(value, source.position())?
                };
                let len = items.len();
                for (index, item) in items.into_iter().enumerate() {
                    // Separator strictly between iterations: never before
                    // the first, never after the last.
                    if index > 0 {
                        if let Some(separator) = separator {
                            let text = Evaluator::new(self.adapter).eval(separator, env)?.render();
                            self.write(channels, &text, origin)?;
                        }
                    }
                    env.push_frame(true);
                    env.define(var.clone(), item);
                    if let Some(counter) = counter {
                        env.define(
                            counter.clone(),
                            Value::Counter(Rc::new(CounterState {
                                index,
                                first: index == 0,
                                last: index + 1 == len,
                            })),
                        );
                    }
                    let result = self.exec_statements(file, body, env, channels);
                    env.pop_frame();
                    result?;
                }
                Ok(())
            }
            Statement::Invoke {
                alias,
                template,
                arg,
                each,
                separator,
                position,
            } => {
                let target_file = match alias {
                    Some(alias) => {
                        let uri = crate::resolver::resolve_import(file, alias, *position)?;
                        self.resolver.resolve_file(&uri)?
                    }
                    None => file.clone(),
                };
                let index = target_file
                    .templates
                    .iter()
                    .position(|t| t.name == *template)
                    .ok_or_else(|| EngineError::UnresolvedTemplate {
                        name: template.clone(),
                        uri: target_file.uri.clone(),
                    })?;
                let value = Evaluator::new(self.adapter).eval(arg, env)?;
                if *each {
                    let items = self.iterable(value, arg.position())?;
                    for (i, item) in items.into_iter().enumerate() {
                        if i > 0 {
                            if let Some(separator) = separator {
                                let text =
                                    Evaluator::new(self.adapter).eval(separator, env)?.render();
                                self.write(channels, &text, origin)?;
                            }
                        }
                        self.exec_template(&target_file, index, item, *position, env, channels)?;
                    }
                    Ok(())
                } else {
                    self.exec_template(&target_file, index, value, *position, env, channels)
                }
            }
        }
    }

    /// Obtain an iterable view of a loop source value: lists natively,
    /// anything else through the adapter.
    fn iterable(&self, value: Value, position: Position) -> EngineResult<Vec<Value>> {
        match value {
            Value::List(items) => Ok(items.as_ref().clone()),
            Value::Null => Err(EngineError::TypeMismatch {
                expected: "iterable".to_string(),
                found: "null".to_string(),
                position,
            }),
            other => self
                .adapter
                .iterate(&other)
                .map_err(|e| crate::eval::adapter_failure(e, position)),
        }
    }

    fn write(&mut self, channels: &[String], text: &str, origin: Origin) -> EngineResult<()> {
        let channel = channels
            .last()
            .map(String::as_str)
            .or(self.default_channel.as_deref())
            .ok_or(EngineError::NoActiveChannel {
                position: origin.position,
            })?;
        self.output.write(channel, text, origin)
    }
}

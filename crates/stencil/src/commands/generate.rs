/*
 * generate.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Generate command implementation
 */

//! Generate command implementation.
//!
//! Loads a template resource, binds a JSON model as the root `this`
//! value, and executes the named template. Output channels map to files
//! under the output directory; with `--trace`, an HTML provenance trace
//! is written next to each generated file.

use std::io::Read;

use anyhow::{Context, Result};
use tracing::info;

use stencil_engine::{
    CombinedOutput, DebugOutput, Encoding, FileOutput, FileResolver, Generator, GeneratorOutput,
    JsonAdapter, OutputPreferences, OverwritePolicy,
};

#[derive(Debug)]
pub struct GenerateArgs {
    pub resource: String,
    pub template: String,
    pub templates: String,
    pub model: String,
    pub output_dir: String,
    pub suffix: Option<String>,
    pub overwrite: OverwritePolicy,
    pub encoding: Encoding,
    pub default_channel: Option<String>,
    pub trace: bool,
}

pub fn execute(args: GenerateArgs) -> Result<()> {
    let model_json = read_model(&args.model)?;
    let model = JsonAdapter::to_value(&model_json);

    let prefs = OutputPreferences::new()
        .with_default_policy(args.overwrite)
        .with_default_encoding(args.encoding);
    let mut file_output = FileOutput::new(&args.output_dir, prefs);
    if let Some(suffix) = &args.suffix {
        file_output = file_output.with_suffix(suffix);
    }

    let mut resolver = FileResolver::new(&args.templates);
    let run = |output: &mut dyn GeneratorOutput| -> Result<()> {
        let mut generator = Generator::new(&mut resolver, output, &JsonAdapter);
        if let Some(channel) = &args.default_channel {
            generator = generator.with_default_channel(channel);
        }
        generator
            .generate(&args.resource, &args.template, model)
            .with_context(|| {
                format!(
                    "generating template '{}' from '{}'",
                    args.template, args.resource
                )
            })
    };

    if args.trace {
        let mut output = CombinedOutput::new(file_output, DebugOutput::new());
        run(&mut output)?;
        output.close_all()?;
        for channel in output.second.channel_names() {
            let html = output
                .second
                .trace_html(channel)
                .unwrap_or_default();
            let mut path = output.first.path_for(channel);
            path.as_mut_os_string().push(".trace.html");
            std::fs::write(&path, html)
                .with_context(|| format!("writing trace for channel '{channel}'"))?;
            info!(channel, path = %path.display(), "wrote trace");
        }
    } else {
        let mut output = file_output;
        run(&mut output)?;
        output.close_all()?;
    }
    Ok(())
}

fn read_model(source: &str) -> Result<serde_json::Value> {
    let text = if source == "-" {
        let mut buffer = String::new();
        std::io::stdin()
            .read_to_string(&mut buffer)
            .context("reading model from stdin")?;
        buffer
    } else {
        std::fs::read_to_string(source)
            .with_context(|| format!("reading model file '{source}'"))?
    };
    serde_json::from_str(&text).with_context(|| format!("parsing model '{source}'"))
}

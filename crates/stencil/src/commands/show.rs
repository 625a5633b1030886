/*
 * show.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Show command implementation
 */

//! Show command implementation.
//!
//! Loads and validates a template resource, then prints a short summary
//! of its imports and templates followed by the full tree in its JSON
//! form.

use anyhow::{Context, Result};

use stencil_engine::{FileResolver, TemplateResolver};

pub fn execute(templates: &str, resource: &str) -> Result<()> {
    let mut resolver = FileResolver::new(templates);
    let file = resolver
        .resolve_file(resource)
        .with_context(|| format!("loading template resource '{resource}'"))?;

    println!("resource: {}", file.uri);
    for import in &file.imports {
        println!("import: {} -> {}", import.alias, import.target);
    }
    for template in &file.templates {
        match &template.model_type {
            Some(model_type) => println!(
                "template: {} ({} statements, model {model_type})",
                template.name,
                template.body.len()
            ),
            None => println!(
                "template: {} ({} statements)",
                template.name,
                template.body.len()
            ),
        }
    }
    println!();
    println!("{}", serde_json::to_string_pretty(file.as_ref())?);
    Ok(())
}

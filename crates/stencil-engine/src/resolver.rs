/*
 * resolver.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Template resolution: mapping resource URIs to parsed template files.
//!
//! A [`TemplateResolver`] owns a lookup table keyed by normalized URI and
//! builds it incrementally as resources are requested. Import aliases
//! resolve to target URIs relative to the importing file; template
//! invocation through an alias is then a plain table lookup in the target
//! file. There is no import cycle detection because resolution never
//! recurses structurally.
//!
//! Two resolvers ship with the engine:
//!
//! - [`MemoryResolver`]: pre-registered files, for tests and embedders
//!   that construct ASTs programmatically.
//! - [`FileResolver`]: loads the serialized JSON form of a template file
//!   from disk under a root directory, caching parse results.

use crate::ast::TemplateFile;
use crate::error::{EngineError, EngineResult};
use std::collections::HashMap;
use std::path::PathBuf;
use std::rc::Rc;

/// Collapse `.` and `..` segments. URIs here are path-like strings; a
/// scheme prefix, when present, is preserved untouched.
pub fn normalize_uri(uri: &str) -> String {
    let (scheme, path) = match uri.split_once("://") {
        Some((scheme, rest)) => (Some(scheme), rest),
        None => (None, uri),
    };
    let absolute = path.starts_with('/');
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => match segments.last() {
                // Leading '..' segments are kept; there is nothing to
                // collapse them against.
                None | Some(&"..") => segments.push(".."),
                Some(_) => {
                    segments.pop();
                }
            },
            other => segments.push(other),
        }
    }
    let joined = segments.join("/");
    match (scheme, absolute) {
        (Some(scheme), _) => format!("{scheme}://{joined}"),
        (None, true) => format!("/{joined}"),
        (None, false) => joined,
    }
}

/// Resolve `target` against the resource it was referenced from.
/// Absolute targets (leading `/` or a scheme) stand alone; relative ones
/// are joined to the base URI's parent.
pub fn resolve_relative(base: &str, target: &str) -> String {
    if target.contains("://") || target.starts_with('/') {
        return normalize_uri(target);
    }
    match base.rsplit_once('/') {
        Some((parent, _)) => normalize_uri(&format!("{parent}/{target}")),
        None => normalize_uri(target),
    }
}

/// Resolve an import alias declared in `file` to an absolute target URI.
/// `position` is the location of the reference, for diagnostics.
pub fn resolve_import(
    file: &TemplateFile,
    alias: &str,
    position: crate::position::Position,
) -> EngineResult<String> {
    match file.find_import(alias) {
        Some(import) => Ok(resolve_relative(&file.uri, &import.target)),
        None => Err(EngineError::UnresolvedImport {
            alias: alias.to_string(),
            position,
        }),
    }
}

/// Maps a resource URI to its parsed template file.
pub trait TemplateResolver {
    fn resolve_file(&mut self, uri: &str) -> EngineResult<Rc<TemplateFile>>;

    /// Resolve a (resource, template-name) pair. The returned index is
    /// valid into the file's `templates`.
    fn resolve_template(&mut self, uri: &str, name: &str) -> EngineResult<(Rc<TemplateFile>, usize)> {
        let file = self.resolve_file(uri)?;
        let index = file
            .templates
            .iter()
            .position(|t| t.name == name)
            .ok_or_else(|| EngineError::UnresolvedTemplate {
                name: name.to_string(),
                uri: file.uri.clone(),
            })?;
        Ok((file, index))
    }
}

/// Resolver over pre-registered template files.
#[derive(Default)]
pub struct MemoryResolver {
    files: HashMap<String, Rc<TemplateFile>>,
}

impl MemoryResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_file(&mut self, mut file: TemplateFile) -> &mut Self {
        file.uri = normalize_uri(&file.uri);
        self.files.insert(file.uri.clone(), Rc::new(file));
        self
    }

    pub fn with_files(files: impl IntoIterator<Item = TemplateFile>) -> Self {
        let mut resolver = Self::new();
        for file in files {
            resolver.add_file(file);
        }
        resolver
    }
}

impl TemplateResolver for MemoryResolver {
    fn resolve_file(&mut self, uri: &str) -> EngineResult<Rc<TemplateFile>> {
        let uri = normalize_uri(uri);
        self.files
            .get(&uri)
            .cloned()
            .ok_or(EngineError::UnresolvedResource { uri })
    }
}

/// Resolver that loads serialized template files from disk, lazily and
/// with caching. A resource URI maps to a path under the root directory.
pub struct FileResolver {
    root: PathBuf,
    cache: HashMap<String, Rc<TemplateFile>>,
}

impl FileResolver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            cache: HashMap::new(),
        }
    }
}

impl TemplateResolver for FileResolver {
    fn resolve_file(&mut self, uri: &str) -> EngineResult<Rc<TemplateFile>> {
        let uri = normalize_uri(uri);
        if let Some(file) = self.cache.get(&uri) {
            return Ok(file.clone());
        }
        let path = self.root.join(uri.trim_start_matches('/'));
        tracing::debug!(uri = %uri, path = %path.display(), "loading template resource");
        let source = std::fs::read_to_string(&path)
            .map_err(|_| EngineError::UnresolvedResource { uri: uri.clone() })?;
        let mut file: TemplateFile =
            serde_json::from_str(&source).map_err(|e| EngineError::MalformedResource {
                uri: uri.clone(),
                message: e.to_string(),
            })?;
        file.uri = uri.clone();
        file.validate()?;
        let file = Rc::new(file);
        self.cache.insert(uri, file.clone());
        Ok(file.clone())
    }
}

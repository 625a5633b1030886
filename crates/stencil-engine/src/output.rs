/*
 * output.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Named output channels and their sinks.
//!
//! The generator writes text to channels by name and never learns what a
//! channel physically is. Channels open lazily on first write to an
//! unseen name; what "open" means is up to the sink:
//!
//! - [`MemoryOutput`] accumulates channel content in strings.
//! - [`FileOutput`] writes one file per channel under a root directory,
//!   honoring per-channel encoding and overwrite policy.
//! - [`CombinedOutput`] fans every write out to two underlying outputs.
//! - [`DebugOutput`] records each write together with the producing
//!   statement and source position, and renders a browsable HTML trace
//!   per channel.
//!
//! [`GeneratorOutput::close_all`] is best-effort: every channel is
//! attempted, and the first failure encountered is surfaced after all
//! closes have been tried.

use crate::error::{EngineError, EngineResult};
use crate::position::Position;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

/// What to do when a channel's destination already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverwritePolicy {
    /// Raise an error instead of touching the existing destination.
    #[default]
    FailIfExists,
    /// Keep the existing destination and silently discard writes.
    KeepExisting,
    /// Replace the destination.
    Overwrite,
}

/// Character encoding applied when a channel is backed by bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Encoding {
    #[default]
    Utf8,
    Utf16Le,
    Utf16Be,
}

impl Encoding {
    fn encode(self, text: &str) -> Vec<u8> {
        match self {
            Encoding::Utf8 => text.as_bytes().to_vec(),
            Encoding::Utf16Le => text
                .encode_utf16()
                .flat_map(|unit| unit.to_le_bytes())
                .collect(),
            Encoding::Utf16Be => text
                .encode_utf16()
                .flat_map(|unit| unit.to_be_bytes())
                .collect(),
        }
    }
}

/// Per-channel output configuration with defaults, constructor-injected
/// into the sinks that need it.
#[derive(Debug, Clone, Default)]
pub struct OutputPreferences {
    default_policy: OverwritePolicy,
    default_encoding: Encoding,
    policies: HashMap<String, OverwritePolicy>,
    encodings: HashMap<String, Encoding>,
}

impl OutputPreferences {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default_policy(mut self, policy: OverwritePolicy) -> Self {
        self.default_policy = policy;
        self
    }

    pub fn with_default_encoding(mut self, encoding: Encoding) -> Self {
        self.default_encoding = encoding;
        self
    }

    pub fn with_channel_policy(mut self, channel: impl Into<String>, policy: OverwritePolicy) -> Self {
        self.policies.insert(channel.into(), policy);
        self
    }

    pub fn with_channel_encoding(mut self, channel: impl Into<String>, encoding: Encoding) -> Self {
        self.encodings.insert(channel.into(), encoding);
        self
    }

    pub fn policy(&self, channel: &str) -> OverwritePolicy {
        self.policies.get(channel).copied().unwrap_or(self.default_policy)
    }

    pub fn encoding(&self, channel: &str) -> Encoding {
        self.encodings.get(channel).copied().unwrap_or(self.default_encoding)
    }
}

/// Provenance of one written span: which statement produced it, and where
/// that statement sits in the template source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Origin {
    pub statement: &'static str,
    pub position: Position,
}

impl Origin {
    pub fn new(statement: &'static str, position: Position) -> Self {
        Self { statement, position }
    }
}

/// A set of named output channels.
pub trait GeneratorOutput {
    /// Write text to a channel, opening it on first use.
    fn write(&mut self, channel: &str, text: &str, origin: Origin) -> EngineResult<()>;

    /// Close every open channel. Every channel is attempted even when an
    /// earlier close fails; the first failure is returned afterwards.
    fn close_all(&mut self) -> EngineResult<()>;
}

/// In-memory sink capturing full channel content, primarily for tests
/// and for embedders that post-process generated text.
#[derive(Debug, Default)]
pub struct MemoryOutput {
    channels: BTreeMap<String, String>,
}

impl MemoryOutput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Channel names seen so far, in sorted order.
    pub fn channel_names(&self) -> Vec<&str> {
        self.channels.keys().map(String::as_str).collect()
    }

    pub fn content(&self, channel: &str) -> Option<&str> {
        self.channels.get(channel).map(String::as_str)
    }
}

impl GeneratorOutput for MemoryOutput {
    fn write(&mut self, channel: &str, text: &str, _origin: Origin) -> EngineResult<()> {
        self.channels.entry(channel.to_string()).or_default().push_str(text);
        Ok(())
    }

    fn close_all(&mut self) -> EngineResult<()> {
        Ok(())
    }
}

enum FileChannel {
    Open { writer: BufWriter<fs::File>, encoding: Encoding },
    /// Destination pre-existed under `KeepExisting`; writes are dropped.
    Discard,
}

/// File-backed sink: one file per channel under a root directory. The
/// channel name is the relative file path; parent directories are created
/// lazily. An optional suffix is appended to every file name.
pub struct FileOutput {
    root: PathBuf,
    suffix: Option<String>,
    prefs: OutputPreferences,
    channels: BTreeMap<String, FileChannel>,
}

impl FileOutput {
    pub fn new(root: impl Into<PathBuf>, prefs: OutputPreferences) -> Self {
        Self {
            root: root.into(),
            suffix: None,
            prefs,
            channels: BTreeMap::new(),
        }
    }

    /// Append a suffix (e.g. `.java`) to every channel's file name.
    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = Some(suffix.into());
        self
    }

    /// The destination path for a channel name.
    pub fn path_for(&self, channel: &str) -> PathBuf {
        let name = match &self.suffix {
            Some(suffix) => format!("{channel}{suffix}"),
            None => channel.to_string(),
        };
        self.root.join(name)
    }

    fn open(&self, channel: &str) -> EngineResult<FileChannel> {
        let path = self.path_for(channel);
        if path.exists() {
            match self.prefs.policy(channel) {
                OverwritePolicy::FailIfExists => {
                    return Err(EngineError::DestinationExists {
                        path: path.display().to_string(),
                    });
                }
                OverwritePolicy::KeepExisting => {
                    tracing::debug!(channel, path = %path.display(), "keeping existing destination");
                    return Ok(FileChannel::Discard);
                }
                OverwritePolicy::Overwrite => {}
            }
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        tracing::debug!(channel, path = %path.display(), "opening output channel");
        let file = fs::File::create(&path)?;
        Ok(FileChannel::Open {
            writer: BufWriter::new(file),
            encoding: self.prefs.encoding(channel),
        })
    }
}

impl GeneratorOutput for FileOutput {
    fn write(&mut self, channel: &str, text: &str, _origin: Origin) -> EngineResult<()> {
        if !self.channels.contains_key(channel) {
            let opened = self.open(channel)?;
            self.channels.insert(channel.to_string(), opened);
        }
        match self.channels.get_mut(channel).expect("just inserted") {
            FileChannel::Open { writer, encoding } => {
                writer.write_all(&encoding.encode(text))?;
                Ok(())
            }
            FileChannel::Discard => Ok(()),
        }
    }

    fn close_all(&mut self) -> EngineResult<()> {
        let mut first_failure = None;
        for (channel, state) in std::mem::take(&mut self.channels) {
            if let FileChannel::Open { mut writer, .. } = state {
                if let Err(e) = writer.flush() {
                    tracing::debug!(channel = %channel, error = %e, "channel close failed");
                    if first_failure.is_none() {
                        first_failure = Some(EngineError::Io(e));
                    }
                }
            }
        }
        match first_failure {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

/// Fan-out sink: every write goes to both underlying outputs, e.g. the
/// primary file target plus a debug trace.
pub struct CombinedOutput<A: GeneratorOutput, B: GeneratorOutput> {
    pub first: A,
    pub second: B,
}

impl<A: GeneratorOutput, B: GeneratorOutput> CombinedOutput<A, B> {
    pub fn new(first: A, second: B) -> Self {
        Self { first, second }
    }
}

impl<A: GeneratorOutput, B: GeneratorOutput> GeneratorOutput for CombinedOutput<A, B> {
    fn write(&mut self, channel: &str, text: &str, origin: Origin) -> EngineResult<()> {
        self.first.write(channel, text, origin)?;
        self.second.write(channel, text, origin)
    }

    fn close_all(&mut self) -> EngineResult<()> {
        let first = self.first.close_all();
        let second = self.second.close_all();
        first.and(second)
    }
}

/// One recorded span in a debug trace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceSpan {
    pub text: String,
    pub statement: &'static str,
    pub position: Position,
}

/// Debug sink: records every span with its provenance and renders an
/// HTML trace document per channel.
#[derive(Debug, Default)]
pub struct DebugOutput {
    channels: BTreeMap<String, Vec<TraceSpan>>,
}

impl DebugOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn channel_names(&self) -> Vec<&str> {
        self.channels.keys().map(String::as_str).collect()
    }

    pub fn spans(&self, channel: &str) -> Option<&[TraceSpan]> {
        self.channels.get(channel).map(Vec::as_slice)
    }

    /// Render the recorded spans of a channel as a browsable HTML trace.
    /// Each span is annotated with the producing statement kind and its
    /// source position.
    pub fn trace_html(&self, channel: &str) -> Option<String> {
        let spans = self.channels.get(channel)?;
        let mut html = String::new();
        html.push_str("<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\"/><title>");
        html.push_str(&escape_html(channel));
        html.push_str("</title></head>\n<body><pre>");
        for span in spans {
            html.push_str(&format!(
                "<span class=\"{}\" title=\"{} at {}\">{}</span>",
                span.statement,
                span.statement,
                span.position,
                escape_html(&span.text)
            ));
        }
        html.push_str("</pre></body></html>\n");
        Some(html)
    }
}

impl GeneratorOutput for DebugOutput {
    fn write(&mut self, channel: &str, text: &str, origin: Origin) -> EngineResult<()> {
        self.channels
            .entry(channel.to_string())
            .or_default()
            .push(TraceSpan {
                text: text.to_string(),
                statement: origin.statement,
                position: origin.position,
            });
        Ok(())
    }

    fn close_all(&mut self) -> EngineResult<()> {
        Ok(())
    }
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::cell::Cell;
    use std::rc::Rc;

    fn origin() -> Origin {
        Origin::new("text", Position::new(1, 1))
    }

    // ===== memory sink =====

    #[test]
    fn test_memory_output_accumulates_per_channel() {
        let mut out = MemoryOutput::new();
        out.write("b", "world", origin()).unwrap();
        out.write("a", "hello ", origin()).unwrap();
        out.write("b", "!", origin()).unwrap();
        assert_eq!(out.channel_names(), vec!["a", "b"]);
        assert_eq!(out.content("a"), Some("hello "));
        assert_eq!(out.content("b"), Some("world!"));
        assert_eq!(out.content("missing"), None);
        out.close_all().unwrap();
    }

    // ===== file sink =====

    #[test]
    fn test_file_output_writes_with_suffix_and_subdirs() {
        let dir = tempfile::tempdir().unwrap();
        let prefs = OutputPreferences::new().with_default_policy(OverwritePolicy::Overwrite);
        let mut out = FileOutput::new(dir.path(), prefs).with_suffix(".java");
        out.write("model/Point", "class Point {}", origin()).unwrap();
        out.close_all().unwrap();
        let written = fs::read_to_string(dir.path().join("model/Point.java")).unwrap();
        assert_eq!(written, "class Point {}");
    }

    #[test]
    fn test_fail_if_exists_blocks_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("out.txt"), "old").unwrap();
        let mut out = FileOutput::new(dir.path(), OutputPreferences::new());
        let err = out.write("out.txt", "new", origin()).unwrap_err();
        assert!(matches!(err, EngineError::DestinationExists { .. }));
        assert_eq!(fs::read_to_string(dir.path().join("out.txt")).unwrap(), "old");
    }

    #[test]
    fn test_keep_existing_discards_writes() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("out.txt"), "old").unwrap();
        let prefs = OutputPreferences::new().with_default_policy(OverwritePolicy::KeepExisting);
        let mut out = FileOutput::new(dir.path(), prefs);
        out.write("out.txt", "new", origin()).unwrap();
        out.write("fresh.txt", "fresh", origin()).unwrap();
        out.close_all().unwrap();
        assert_eq!(fs::read_to_string(dir.path().join("out.txt")).unwrap(), "old");
        assert_eq!(fs::read_to_string(dir.path().join("fresh.txt")).unwrap(), "fresh");
    }

    #[test]
    fn test_overwrite_replaces_existing() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("out.txt"), "old").unwrap();
        let prefs = OutputPreferences::new().with_default_policy(OverwritePolicy::Overwrite);
        let mut out = FileOutput::new(dir.path(), prefs);
        out.write("out.txt", "new", origin()).unwrap();
        out.close_all().unwrap();
        assert_eq!(fs::read_to_string(dir.path().join("out.txt")).unwrap(), "new");
    }

    #[test]
    fn test_per_channel_policy_override() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), "old").unwrap();
        fs::write(dir.path().join("b.txt"), "old").unwrap();
        let prefs = OutputPreferences::new()
            .with_channel_policy("a.txt", OverwritePolicy::Overwrite);
        let mut out = FileOutput::new(dir.path(), prefs);
        out.write("a.txt", "new", origin()).unwrap();
        assert!(out.write("b.txt", "new", origin()).is_err());
    }

    #[test]
    fn test_utf16_encoding() {
        let dir = tempfile::tempdir().unwrap();
        let prefs = OutputPreferences::new()
            .with_default_policy(OverwritePolicy::Overwrite)
            .with_channel_encoding("wide.txt", Encoding::Utf16Le);
        let mut out = FileOutput::new(dir.path(), prefs);
        out.write("wide.txt", "ab", origin()).unwrap();
        out.close_all().unwrap();
        let bytes = fs::read(dir.path().join("wide.txt")).unwrap();
        assert_eq!(bytes, vec![0x61, 0x00, 0x62, 0x00]);
    }

    // ===== combined sink and close-all semantics =====

    struct FlakyOutput {
        label: &'static str,
        closed: Rc<Cell<u32>>,
        fail: bool,
    }

    impl GeneratorOutput for FlakyOutput {
        fn write(&mut self, _: &str, _: &str, _: Origin) -> EngineResult<()> {
            Ok(())
        }

        fn close_all(&mut self) -> EngineResult<()> {
            self.closed.set(self.closed.get() + 1);
            if self.fail {
                Err(EngineError::DestinationExists {
                    path: self.label.to_string(),
                })
            } else {
                Ok(())
            }
        }
    }

    #[test]
    fn test_combined_output_fans_out() {
        let mut out = CombinedOutput::new(MemoryOutput::new(), DebugOutput::new());
        out.write("a", "text", origin()).unwrap();
        assert_eq!(out.first.content("a"), Some("text"));
        assert_eq!(out.second.spans("a").unwrap().len(), 1);
    }

    #[test]
    fn test_close_all_attempts_every_output_and_surfaces_first_failure() {
        let closed = Rc::new(Cell::new(0));
        let mut out = CombinedOutput::new(
            FlakyOutput { label: "first", closed: closed.clone(), fail: true },
            FlakyOutput { label: "second", closed: closed.clone(), fail: true },
        );
        let err = out.close_all().unwrap_err();
        // Both were attempted; the first failure is the one reported.
        assert_eq!(closed.get(), 2);
        match err {
            EngineError::DestinationExists { path } => assert_eq!(path, "first"),
            other => panic!("unexpected error {other}"),
        }
    }

    // ===== debug sink =====

    #[test]
    fn test_debug_output_records_provenance() {
        let mut out = DebugOutput::new();
        out.write("a", "x < 1", Origin::new("interpolate", Position::new(2, 3)))
            .unwrap();
        let spans = out.spans("a").unwrap();
        assert_eq!(spans[0].statement, "interpolate");
        assert_eq!(spans[0].position, Position::new(2, 3));
        let html = out.trace_html("a").unwrap();
        assert!(html.contains("x &lt; 1"));
        assert!(html.contains("interpolate at 2:3"));
        assert_eq!(out.trace_html("missing"), None);
    }
}

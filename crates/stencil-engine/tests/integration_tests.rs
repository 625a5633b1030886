/*
 * integration_tests.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * End-to-end tests loading serialized template files from fixtures and
 * generating against a JSON model.
 */

use pretty_assertions::assert_eq;
use stencil_engine::{
    CombinedOutput, DebugOutput, Encoding, EngineError, FileOutput, FileResolver, Generator,
    GeneratorOutput, JsonAdapter, MemoryOutput, OutputPreferences, OverwritePolicy, Value,
};
use std::path::Path;

fn fixture_root() -> std::path::PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("test-fixtures")
}

fn model() -> Value {
    JsonAdapter::to_value(&serde_json::json!({
        "title": "Inventory",
        "items": [
            { "name": "bolt", "count": 3 },
            { "name": "nut", "count": 8 }
        ]
    }))
}

fn generate_to_memory(template: &str, model: Value) -> MemoryOutput {
    let mut resolver = FileResolver::new(fixture_root());
    let mut output = MemoryOutput::new();
    Generator::new(&mut resolver, &mut output, &JsonAdapter)
        .with_default_channel("main")
        .generate("report.json", template, model)
        .unwrap_or_else(|e| panic!("generation failed: {e}"));
    output
}

#[test]
fn test_report_with_imported_partial() {
    let output = generate_to_memory("report", model());
    assert_eq!(
        output.content("main"),
        Some("== Inventory ==\n- bolt x3\n- nut x8\n(small)\n")
    );
}

#[test]
fn test_if_takes_then_branch_on_larger_model() {
    let output = generate_to_memory(
        "report",
        JsonAdapter::to_value(&serde_json::json!({
            "title": "Big",
            "items": [
                { "name": "a", "count": 1 },
                { "name": "b", "count": 1 },
                { "name": "c", "count": 1 }
            ]
        })),
    );
    assert_eq!(
        output.content("main"),
        Some("== Big ==\n- a x1\n- b x1\n- c x1\n(large)\n")
    );
}

#[test]
fn test_foreach_counter_and_separator() {
    let output = generate_to_memory("numbered", model());
    assert_eq!(output.content("main"), Some("0:bolt, 1:nut"));
}

#[test]
fn test_file_output_with_computed_channels_and_suffix() {
    let dir = tempfile::tempdir().unwrap();
    let mut resolver = FileResolver::new(fixture_root());
    let mut output =
        FileOutput::new(dir.path(), OutputPreferences::new()).with_suffix(".txt");
    Generator::new(&mut resolver, &mut output, &JsonAdapter)
        .generate("report.json", "files", model())
        .unwrap();
    output.close_all().unwrap();

    let bolt = std::fs::read_to_string(dir.path().join("out/bolt.txt")).unwrap();
    let nut = std::fs::read_to_string(dir.path().join("out/nut.txt")).unwrap();
    assert_eq!(bolt, "count=3\n");
    assert_eq!(nut, "count=8\n");
}

#[test]
fn test_file_output_refuses_existing_destination() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("out")).unwrap();
    std::fs::write(dir.path().join("out/bolt.txt"), "keep me").unwrap();

    let mut resolver = FileResolver::new(fixture_root());
    let mut output =
        FileOutput::new(dir.path(), OutputPreferences::new()).with_suffix(".txt");
    let err = Generator::new(&mut resolver, &mut output, &JsonAdapter)
        .generate("report.json", "files", model())
        .unwrap_err();
    assert!(matches!(err.error, EngineError::DestinationExists { .. }));
    assert_eq!(
        std::fs::read_to_string(dir.path().join("out/bolt.txt")).unwrap(),
        "keep me"
    );
}

#[test]
fn test_file_output_overwrite_policy_and_utf16() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("out")).unwrap();
    std::fs::write(dir.path().join("out/bolt.txt"), "old").unwrap();

    let prefs = OutputPreferences::new()
        .with_default_policy(OverwritePolicy::Overwrite)
        .with_channel_encoding("out/nut", Encoding::Utf16Be);
    let mut resolver = FileResolver::new(fixture_root());
    let mut output = FileOutput::new(dir.path(), prefs).with_suffix(".txt");
    Generator::new(&mut resolver, &mut output, &JsonAdapter)
        .generate("report.json", "files", model())
        .unwrap();
    output.close_all().unwrap();

    assert_eq!(
        std::fs::read_to_string(dir.path().join("out/bolt.txt")).unwrap(),
        "count=3\n"
    );
    let nut = std::fs::read(dir.path().join("out/nut.txt")).unwrap();
    assert_eq!(&nut[..8], &[0x00, b'c', 0x00, b'o', 0x00, b'u', 0x00, b'n']);
}

#[test]
fn test_combined_output_captures_trace_alongside_text() {
    let mut resolver = FileResolver::new(fixture_root());
    let mut output = CombinedOutput::new(MemoryOutput::new(), DebugOutput::new());
    Generator::new(&mut resolver, &mut output, &JsonAdapter)
        .with_default_channel("main")
        .generate("report.json", "numbered", model())
        .unwrap();

    assert_eq!(output.first.content("main"), Some("0:bolt, 1:nut"));
    let spans = output.second.spans("main").unwrap();
    let rebuilt: String = spans.iter().map(|s| s.text.as_str()).collect();
    assert_eq!(rebuilt, "0:bolt, 1:nut");

    let html = output.second.trace_html("main").unwrap();
    assert!(html.contains("interpolate at 15:1"));
    assert!(html.contains("text at 15:4"));
}

#[test]
fn test_invocation_stack_reported_on_failure() {
    let mut resolver = FileResolver::new(fixture_root());
    let mut output = MemoryOutput::new();
    let err = Generator::new(&mut resolver, &mut output, &JsonAdapter)
        .with_default_channel("main")
        .generate(
            "report.json",
            "report",
            JsonAdapter::to_value(&serde_json::json!({
                "title": "Broken",
                "items": [{ "count": 1 }]
            })),
        )
        .unwrap_err();
    assert!(matches!(err.error, EngineError::UnresolvedMember { .. }));
    let names: Vec<&str> = err.stack.iter().map(|f| f.template.as_str()).collect();
    assert_eq!(names, ["report", "bullet"]);
}

#[test]
fn test_missing_template_and_missing_resource() {
    let mut resolver = FileResolver::new(fixture_root());
    let mut output = MemoryOutput::new();
    let err = Generator::new(&mut resolver, &mut output, &JsonAdapter)
        .generate("report.json", "nope", Value::Null)
        .unwrap_err();
    assert!(matches!(err.error, EngineError::UnresolvedTemplate { .. }));

    let err = Generator::new(&mut resolver, &mut output, &JsonAdapter)
        .generate("missing.json", "report", Value::Null)
        .unwrap_err();
    assert!(matches!(err.error, EngineError::UnresolvedResource { .. }));
}

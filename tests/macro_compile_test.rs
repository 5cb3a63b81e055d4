//! Integration tests for the macro lifecycle.
//!
//! These tests drive macros from source text through parse and compile and
//! check the resulting evaluators and metadata.

use secl_macro::{
    Context, FieldType, JsonEvent, Macro, Opts, SchemaModel, SeclError, Value,
};
use serde_json::json;
use std::collections::BTreeSet;

fn process_model() -> SchemaModel {
    SchemaModel::new()
        .with_field("process.name", FieldType::String)
        .with_field("process.uid", FieldType::Int)
        .with_field("process.args", FieldType::StringArray)
        .with_field("open.file.path", FieldType::String)
        .with_event_field("container.id", FieldType::String, "*")
}

fn set(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[test]
fn test_root_bash_scenario() {
    let model = process_model();
    let mut m = Macro::new("root_bash", r#"process.name == "bash" && process.uid == 0"#);
    m.parse().expect("expression should parse");
    let evaluator = m.compile(&model, &Opts::new()).expect("macro should compile");

    assert_eq!(m.fields().unwrap(), set(&["process.name", "process.uid"]));
    assert_eq!(m.event_types().unwrap(), set(&["process"]));

    let root = json!({"process": {"name": "bash", "uid": 0}});
    let event = JsonEvent::new(&root);
    assert_eq!(evaluator.eval(&Context::new(&event)), Some(true));

    let user = json!({"process": {"name": "bash", "uid": 1000}});
    let event = JsonEvent::new(&user);
    assert_eq!(evaluator.eval(&Context::new(&event)), Some(false));
}

#[test]
fn test_trailing_operator_parse_error() {
    let source = "process.name == ";
    let mut m = Macro::new("broken", source);
    let err = m.parse().unwrap_err();

    match err {
        SeclError::Parse { pos, .. } => {
            assert!(
                pos.offset >= source.find("==").unwrap(),
                "error should point at or after the operator, got {pos}"
            );
        }
        other => panic!("Expected Parse error, got {other:?}"),
    }
    assert!(m.ast().is_none());
}

#[test]
fn test_unknown_field_leaves_macro_uncompiled() {
    let model = process_model();
    let mut m = Macro::new("unknown", "unknown.attr == 1");
    m.parse().unwrap();

    let err = m.compile(&model, &Opts::new()).unwrap_err();
    assert!(err.is_field_error(), "expected a field error, got {err}");
    assert!(m.evaluator().is_none());

    assert_eq!(
        m.fields().unwrap_err(),
        SeclError::NotCompiled("unknown".to_string())
    );
}

#[test]
fn test_fields_are_textual_references() {
    let model = process_model();
    let mut m = Macro::new(
        "m",
        r#"(process.name in ["bash", "zsh"] || "-c" in process.args) && open.file.path =~ "/etc/*""#,
    );
    m.parse().unwrap();
    let evaluator = m.compile(&model, &Opts::new()).unwrap();

    let expected = set(&["open.file.path", "process.args", "process.name"]);
    assert_eq!(evaluator.fields(), expected);
    assert_eq!(m.fields().unwrap(), expected);
    assert_eq!(m.event_types().unwrap(), set(&["open", "process"]));
}

#[test]
fn test_explicit_event_type() {
    let model = process_model();
    let mut m = Macro::new("in_container", r#"container.id != """#);
    m.parse().unwrap();
    m.compile(&model, &Opts::new()).unwrap();
    assert_eq!(m.event_types().unwrap(), set(&["*"]));
}

#[test]
fn test_recompile_after_failure() {
    let model = process_model();
    let mut m = Macro::new("m", "process.uid == 0");
    m.parse().unwrap();
    m.compile(&model, &Opts::new()).unwrap();

    let narrow = SchemaModel::new().with_field("process.name", FieldType::String);
    assert!(m.compile(&narrow, &Opts::new()).is_err());

    // The previous compile is still in place.
    assert_eq!(m.fields().unwrap(), set(&["process.uid"]));
}

#[test]
fn test_syntax_error_carries_expression() {
    let model = process_model();
    let source = r#"process.name < "b""#;
    let mut m = Macro::new("m", source);
    m.parse().unwrap();

    match m.compile(&model, &Opts::new()).unwrap_err() {
        SeclError::Syntax { expr, pos, message } => {
            assert_eq!(expr, source);
            assert_eq!(pos.offset, source.find('<').unwrap());
            assert!(message.contains("string"));
        }
        other => panic!("Expected Syntax error, got {other:?}"),
    }
}

#[test]
fn test_constants() {
    let model = process_model();
    let opts = Opts::new()
        .with_constant("ROOT_UID", 0i64)
        .with_constant(
            "SHELLS",
            vec!["bash".to_string(), "zsh".to_string()],
        );

    let mut m = Macro::new("m", "process.uid == ROOT_UID && process.name in SHELLS");
    m.parse().unwrap();
    let evaluator = m.compile(&model, &opts).unwrap();

    let doc = json!({"process": {"name": "zsh", "uid": 0}});
    let event = JsonEvent::new(&doc);
    assert_eq!(evaluator.eval(&Context::new(&event)), Some(true));
    assert_eq!(
        evaluator.field_values["process.uid"][0].value,
        Value::Int(0)
    );
}

#[test]
fn test_compiled_macro_is_shareable() {
    let model = process_model();
    let mut m = Macro::new("m", r#"process.name == ~"*sh""#);
    m.parse().unwrap();
    let evaluator = m.compile(&model, &Opts::new()).unwrap();

    let handles: Vec<_> = ["bash", "zsh", "vim", "perl"]
        .into_iter()
        .map(|name| {
            let evaluator = evaluator.clone();
            std::thread::spawn(move || {
                let doc = json!({"process": {"name": name}});
                let event = JsonEvent::new(&doc);
                evaluator.eval(&Context::new(&event))
            })
        })
        .collect();

    let results: Vec<Option<bool>> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(
        results,
        vec![Some(true), Some(true), Some(false), Some(false)]
    );
}

//! Benchmarks for macro compilation and evaluation.
//!
//! Evaluation sits on the per-event path, so full and partial evaluation are
//! measured separately from compilation.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use secl_macro::{
    Context, Field, FieldType, Macro, MacroDefinition, MacroSet, Opts, SchemaModel, Value,
};
use std::collections::HashMap;

const EXPRESSIONS: &[(&str, &str)] = &[
    ("simple", r#"process.name == "bash""#),
    (
        "logical",
        r#"process.name == "bash" && process.uid == 0 || process.args in ["-c", "-i"]"#,
    ),
    (
        "patterns",
        r#"process.name in [~"*sh", r"^python[0-9.]*$", "perl"] && open.file.path =~ "/etc/*""#,
    ),
];

fn model() -> SchemaModel {
    SchemaModel::new()
        .with_field("process.name", FieldType::String)
        .with_field("process.uid", FieldType::Int)
        .with_field("process.args", FieldType::StringArray)
        .with_field("open.file.path", FieldType::String)
}

fn event() -> HashMap<Field, Value> {
    let mut event = HashMap::new();
    event.insert("process.name".to_string(), Value::from("python3.11"));
    event.insert("process.uid".to_string(), Value::Int(1000));
    event.insert(
        "process.args".to_string(),
        Value::StrList(vec!["-m".to_string(), "http.server".to_string()]),
    );
    event.insert("open.file.path".to_string(), Value::from("/etc/hosts"));
    event
}

fn bench_compile(c: &mut Criterion) {
    let model = model();
    let mut group = c.benchmark_group("compile");

    for (name, expression) in EXPRESSIONS {
        group.bench_with_input(BenchmarkId::new("macro", name), expression, |b, expr| {
            b.iter(|| {
                let mut m = Macro::new("bench", *expr);
                m.parse().unwrap();
                black_box(m.compile(&model, &Opts::new()).unwrap())
            })
        });
    }

    let definitions: Vec<MacroDefinition> = (0..64)
        .map(|i| {
            if i == 0 {
                MacroDefinition::new("m0", r#"process.name == "bash""#)
            } else {
                MacroDefinition::new(format!("m{i}"), format!("m{} || process.uid == {i}", i - 1))
            }
        })
        .collect();
    group.bench_function("macro_set_chain_64", |b| {
        b.iter(|| {
            black_box(MacroSet::compile(definitions.clone(), &model, &Opts::new()).unwrap())
        })
    });

    group.finish();
}

fn bench_eval(c: &mut Criterion) {
    let model = model();
    let event = event();
    let mut group = c.benchmark_group("eval");

    for (name, expression) in EXPRESSIONS {
        let mut m = Macro::new("bench", *expression);
        m.parse().unwrap();
        let evaluator = m.compile(&model, &Opts::new()).unwrap();

        group.bench_function(BenchmarkId::new("full", name), |b| {
            b.iter(|| {
                let ctx = Context::new(&event);
                black_box(evaluator.eval(&ctx))
            })
        });

        group.bench_function(BenchmarkId::new("partial_uid", name), |b| {
            b.iter(|| {
                let ctx = Context::new(&event).with_update("process.uid", 0i64);
                black_box(evaluator.eval_partial("process.uid", &ctx))
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_compile, bench_eval);
criterion_main!(benches);

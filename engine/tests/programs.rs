//! End-to-end programs through the session and the JSON parse-tree contract.

use serde_json::json;
use std::io::Write;
use std::path::Path;

use sdtl::{
    Binding, Dataset, EvalError, Program, SessionError, Session, Statement, Value, ValueType,
};

fn program(value: serde_json::Value) -> Program {
    serde_json::from_value(value).unwrap()
}

fn var(name: &str) -> serde_json::Value {
    json!({"type": "variable", "name": name})
}

fn constant(value: serde_json::Value) -> serde_json::Value {
    json!({"type": "constant", "value": value})
}

fn ds_structure() -> serde_json::Value {
    json!([
        {"name": "id", "type": "string", "role": "identifier"},
        {"name": "long1", "type": "int64"}
    ])
}

fn run(value: serde_json::Value) -> Session {
    let mut session = Session::new();
    session.run_program(&program(value), Path::new(".")).unwrap();
    session
}

fn rows(dataset: &Dataset) -> Vec<Vec<Value>> {
    dataset.rows().to_vec()
}

#[test]
fn keep_then_filter() {
    let session = run(json!({
        "datasets": {
            "ds": {"structure": ds_structure(), "rows": [["Toto", 30], ["Hadrien", 10]]}
        },
        "statements": [{
            "type": "assignment",
            "name": "res",
            "expr": {
                "type": "clause",
                "dataset": {
                    "type": "clause",
                    "dataset": var("ds"),
                    "clause": {"type": "keep", "columns": ["id", "long1"]}
                },
                "clause": {"type": "filter", "condition": {
                    "type": "comparison", "op": ">",
                    "left": var("long1"),
                    "right": constant(json!(15))
                }}
            }
        }]
    }));
    let res = session.dataset("res").unwrap();
    assert_eq!(rows(&res), vec![vec![Value::from("Toto"), Value::Int64(30)]]);
}

#[test]
fn integer_division_is_double() {
    let session = run(json!({
        "statements": [{
            "type": "assignment",
            "name": "x",
            "expr": {"type": "arithmetic", "op": "/", "left": constant(json!(6)), "right": constant(json!(3))}
        }]
    }));
    match session.get("x") {
        Some(Binding::Scalar { value, value_type }) => {
            assert_eq!(value, &Value::Float64(2.0));
            assert_eq!(value_type, &ValueType::Float64);
        }
        other => panic!("unexpected binding {other:?}"),
    }
}

#[test]
fn comparison_with_null_is_null() {
    let session = run(json!({
        "statements": [{
            "type": "assignment",
            "name": "x",
            "expr": {"type": "comparison", "op": "=", "left": constant(json!(1)), "right": constant(json!(null))}
        }]
    }));
    assert_eq!(session.value("x").unwrap(), Value::Null);
}

#[test]
fn nvl_signature_not_found() {
    let mut session = Session::new();
    let err = session
        .run_program(
            &program(json!({
                "statements": [{
                    "type": "assignment",
                    "name": "x",
                    "expr": {"type": "nvl", "operand": constant(json!(3)), "default": constant(json!("toto")),
                             "span": {"start": 5, "end": 20}}
                }]
            })),
            Path::new("."),
        )
        .unwrap_err();
    match err {
        SessionError::Statement { index, source } => {
            assert_eq!(index, 1);
            assert_eq!(source.to_string(), "function 'nvl(Long, String)' not found");
            assert!(matches!(source, EvalError::FunctionNotFound { .. }));
            assert_eq!(source.span().start, 5);
        }
        other => panic!("unexpected error {other}"),
    }
}

#[test]
fn union_keeps_first_duplicate() {
    let session = run(json!({
        "datasets": {
            "a": {"structure": ds_structure(), "rows": [["1", 10], ["2", 20]]},
            "b": {"structure": ds_structure(), "rows": [["2", 99], ["3", 30]]}
        },
        "statements": [{
            "type": "assignment",
            "name": "u",
            "expr": {"type": "union", "operands": [var("a"), var("b")]}
        }]
    }));
    let u = session.dataset("u").unwrap();
    assert_eq!(
        rows(&u),
        vec![
            vec![Value::from("1"), Value::Int64(10)],
            vec![Value::from("2"), Value::Int64(20)],
            vec![Value::from("3"), Value::Int64(30)],
        ]
    );
}

#[test]
fn calc_with_window_function() {
    let session = run(json!({
        "datasets": {
            "ds": {"structure": ds_structure(), "rows": [["a", 1], ["b", 3], ["c", 2]]}
        },
        "statements": [{
            "type": "assignment",
            "name": "res",
            "expr": {
                "type": "clause",
                "dataset": var("ds"),
                "clause": {"type": "calc", "items": [
                    {"name": "running", "expr": {
                        "type": "analytic", "function": "sum", "operand": "long1",
                        "order_by": [{"column": "long1"}]
                    }},
                    {"name": "r", "expr": {
                        "type": "analytic", "function": "rank",
                        "order_by": [{"column": "long1", "order": "desc"}]
                    }},
                    {"name": "twice", "expr": {
                        "type": "arithmetic", "op": "*", "left": var("long1"), "right": constant(json!(2))
                    }}
                ]}
            }
        }]
    }));
    let res = session.dataset("res").unwrap();
    let column = |name: &str| -> Vec<Value> { res.column(name).unwrap().into_iter().cloned().collect() };
    assert_eq!(column("running"), vec![Value::Int64(1), Value::Int64(6), Value::Int64(3)]);
    assert_eq!(column("r"), vec![Value::Int64(3), Value::Int64(1), Value::Int64(2)]);
    assert_eq!(column("twice"), vec![Value::Int64(2), Value::Int64(6), Value::Int64(4)]);
}

#[test]
fn datapoint_ruleset_with_mixed_levels_is_rejected() {
    let mut session = Session::new();
    let define: Statement = serde_json::from_value(json!({
        "type": "define_datapoint_ruleset",
        "name": "dpr",
        "variables": [{"name": "long1"}],
        "rules": [
            {"then": constant(json!(true)), "error_level": constant(json!(2))},
            {"then": constant(json!(true)), "error_level": constant(json!("2"))}
        ]
    }))
    .unwrap();
    let err = session.execute(&define).unwrap_err();
    assert_eq!(err.to_string(), "Error levels of rules have different types");
    assert!(session.get("dpr").is_none());
}

#[test]
fn example_program_runs() {
    let mut session = Session::new();
    session
        .run_program(&Program::example(), Path::new("."))
        .unwrap();

    let res = session.dataset("res").unwrap();
    assert_eq!(res.len(), 3);

    let totals = session.dataset("totals").unwrap();
    assert_eq!(
        rows(&totals),
        vec![
            vec![Value::Boolean(true), Value::Int64(130), Value::Int64(2)],
            vec![Value::Boolean(false), Value::Int64(30), Value::Int64(2)],
        ]
    );

    let checked = session.dataset("checked").unwrap();
    assert_eq!(checked.len(), 4);
    assert_eq!(checked.get(1, "errorcode"), Some(&Value::from("too small")));
    assert_eq!(checked.get(1, "bool_var"), Some(&Value::Boolean(false)));
    assert_eq!(checked.get(0, "errorcode"), Some(&Value::Null));
}

#[test]
fn example_program_round_trips_through_json() {
    let text = serde_json::to_string(&Program::example()).unwrap();
    let parsed: Program = serde_json::from_str(&text).unwrap();
    assert_eq!(parsed, Program::example());
}

#[test]
fn csv_dataset_relative_to_program() {
    let dir = tempfile::tempdir().unwrap();
    let mut file = std::fs::File::create(dir.path().join("ds.csv")).unwrap();
    writeln!(file, "id;long1").unwrap();
    writeln!(file, "Toto;30").unwrap();
    writeln!(file, "Hadrien;").unwrap();

    let mut session = Session::new();
    session
        .run_program(
            &program(json!({
                "datasets": {"ds": {"structure": ds_structure(), "csv": "ds.csv"}},
                "statements": [{
                    "type": "assignment",
                    "name": "n",
                    "expr": {"type": "clause", "dataset": var("ds"), "clause": {
                        "type": "aggregate",
                        "items": [{"name": "n", "function": "count"}, {"name": "s", "function": "sum", "operand": var("long1")}]
                    }}
                }]
            })),
            dir.path(),
        )
        .unwrap();
    let n = session.dataset("n").unwrap();
    assert_eq!(rows(&n), vec![vec![Value::Int64(2), Value::Int64(30)]]);
}

#[test]
fn recording_engine_sees_one_call_per_clause() {
    let engine = sdtl::RecordingEngine::new(sdtl::InMemoryEngine::new());
    let mut env = indexmap::IndexMap::new();
    let data = sdtl::loader::rows_from_json(
        &[json!(["Toto", 30]), json!(["Hadrien", 10])],
        &serde_json::from_value(ds_structure()).unwrap(),
    )
    .unwrap();
    env.insert("ds".to_string(), Binding::Dataset(std::sync::Arc::new(data)));
    let expr: sdtl::Expr = serde_json::from_value(json!({
        "type": "clause",
        "dataset": {"type": "clause", "dataset": var("ds"), "clause": {"type": "drop", "columns": ["long1"]}},
        "clause": {"type": "rename", "items": [{"from": "id", "to": "name"}]}
    }))
    .unwrap();
    let evaluator = sdtl::Evaluator::new(&engine, &env);
    let result = evaluator.dataset(&expr).unwrap().resolve().unwrap();
    assert_eq!(result.structure().names().collect::<Vec<_>>(), vec!["name"]);
    assert_eq!(engine.calls(), vec!["project [id]".to_string(), "rename [id to name]".to_string()]);
}

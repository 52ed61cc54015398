//! Integration tests for parsing, evaluation and configuration
//!
//! These tests drive the public API end to end, the way the daemon transports do.

use conditiond_rs::cli::{run_batch, EvaluationResult};
use conditiond_rs::condition::{
    parse, stringify, ConditionError, Context, Evaluation, Evaluator, Function, Node,
};
use conditiond_rs::config::Config;
use once_cell::sync::Lazy;
use serde_json::{json, Value};
use std::sync::Arc;
use std::thread;

static EVALUATOR: Lazy<Evaluator> = Lazy::new(Evaluator::with_builtins);

fn evaluate(input: &str, context: &Context) -> Result<Value, ConditionError> {
    EVALUATOR.evaluate(context, &parse(input)?)
}

// ============================================================================
// Scenarios
// ============================================================================

#[test]
fn test_rollout_condition() {
    let condition = r#"
    {"and": [
        {"eq": [{"context": ["user", "country"]}, "LT"]},
        {"lt": [{"sha1mod": [{"context": ["user", "id"]}, 100]}, 50]}
    ]}"#;

    // "value" lands in bucket 3
    let context = Context::raw(r#"{"user": {"country": "LT", "id": "value"}}"#);
    assert_eq!(evaluate(condition, &context).unwrap(), json!(true));

    let context = Context::raw(r#"{"user": {"country": "LV", "id": "value"}}"#);
    assert_eq!(evaluate(condition, &context).unwrap(), json!(false));
}

#[test]
fn test_if_selects_value_from_context() {
    let condition = r#"{"if": [
        {"gte": [{"context": ["score"]}, 90]},
        {"context": ["labels", 0]},
        {"context": ["labels", 1]}
    ]}"#;

    let high = Context::value(json!({"score": 95, "labels": ["gold", "silver"]}));
    let low = Context::value(json!({"score": 10, "labels": ["gold", "silver"]}));
    assert_eq!(evaluate(condition, &high).unwrap(), json!("gold"));
    assert_eq!(evaluate(condition, &low).unwrap(), json!("silver"));
}

#[test]
fn test_missing_context_data() {
    let condition = r#"{"eq": [{"context": ["missing", "deeper"]}, null]}"#;
    assert_eq!(
        evaluate(condition, &Context::raw("{}")).unwrap(),
        json!(true)
    );

    // an empty context is null, which has no keys to index
    let err = evaluate(condition, &Context::empty()).unwrap_err();
    assert_eq!(
        err.root_cause().to_string(),
        r#"cannot index null with key "missing""#
    );
}

#[test]
fn test_error_attribution_chain() {
    let err = evaluate(
        r#"{"or": [false, {"and": [true, {"eq": [1]}]}]}"#,
        &Context::empty(),
    )
    .unwrap_err();

    assert_eq!(err.function_chain(), vec!["or", "and", "eq"]);
    assert_eq!(
        err.to_string(),
        "or expression: and expression: eq expression: expected 2 argument(s), got 1"
    );
}

#[test]
fn test_parse_errors_surface_before_evaluation() {
    assert!(matches!(
        evaluate(r#"{"and": }"#, &Context::empty()),
        Err(ConditionError::Syntax { offset: 8, .. })
    ));
    assert!(matches!(
        evaluate(r#"{"and": [true]"#, &Context::empty()),
        Err(ConditionError::UnexpectedEnd { .. })
    ));
    assert!(matches!(
        evaluate("[1, @]", &Context::empty()),
        Err(ConditionError::Lex { .. })
    ));
}

// ============================================================================
// Properties
// ============================================================================

#[test]
fn test_parsed_tree_is_reusable() {
    let root = parse(r#"{"gt": [{"context": ["n"]}, 10]}"#).unwrap();
    let before = root.clone();

    for n in 0..20 {
        let context = Context::value(json!({ "n": n }));
        assert_eq!(EVALUATOR.evaluate(&context, &root).unwrap(), json!(n > 10));
    }
    assert_eq!(root, before);
}

#[test]
fn test_literal_roots_evaluate_to_themselves() {
    for (input, expected) in [
        ("3", json!(3)),
        ("-0.25", json!(-0.25)),
        (r#""text""#, json!("text")),
        ("false", json!(false)),
        ("null", json!(null)),
        (r#"[1, "a", [null]]"#, json!([1, "a", [null]])),
    ] {
        assert_eq!(evaluate(input, &Context::empty()).unwrap(), expected);
    }
}

#[test]
fn test_concurrent_evaluation_with_distinct_contexts() {
    let evaluator = Arc::new(Evaluator::with_builtins());
    let root = Arc::new(parse(r#"{"context": ["id"]}"#).unwrap());

    let handles: Vec<_> = (0..8)
        .map(|id| {
            let evaluator = evaluator.clone();
            let root = root.clone();
            thread::spawn(move || {
                for _ in 0..100 {
                    let context = Context::value(json!({ "id": id }));
                    assert_eq!(evaluator.evaluate(&context, &root).unwrap(), json!(id));
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
}

#[test]
fn test_custom_handler_alongside_builtins() {
    let mut evaluator = Evaluator::with_builtins();
    evaluator.add_handler(
        "len",
        |eval: &Evaluation<'_>, function: &Function| -> Result<Value, ConditionError> {
            match eval.evaluate(&function.argument)? {
                Value::String(s) => Ok(json!(s.chars().count())),
                Value::Array(items) => Ok(json!(items.len())),
                _ => Err(ConditionError::type_error("expected string or array")),
            }
        },
    );

    let context = Context::value(json!({"name": "Ada"}));
    let root = parse(r#"{"eq": [{"len": {"context": ["name"]}}, 3]}"#).unwrap();
    assert_eq!(evaluator.evaluate(&context, &root).unwrap(), json!(true));

    let root = parse(r#"{"len": 5}"#).unwrap();
    let err = evaluator.evaluate(&context, &root).unwrap_err();
    assert_eq!(err.to_string(), "len expression: expected string or array");
}

#[test]
fn test_tree_rendering_matches_structure() {
    let root = parse(r#"{"not": [{"eq": [1, 2]}]}"#).unwrap();
    assert!(matches!(root, Node::Function(_)));
    assert_eq!(
        stringify(&root),
        concat!(
            "FUNCTION<not>\n",
            " \\_ ARRAY\n",
            "     \\_ FUNCTION<eq>\n",
            "         \\_ ARRAY\n",
            "            |__ LITERAL<number::1>\n",
            "             \\_ LITERAL<number::2>\n",
        )
    );
}

// ============================================================================
// Configuration and transports
// ============================================================================

#[test]
fn test_configured_evaluator_in_batch() {
    let config = Config::from_yaml(
        r#"
evaluator:
  func_whitelist: [all, same, ctx]
  func_map:
    all: and
    same: eq
    ctx: context
    bigger: gt
"#,
    )
    .unwrap();
    let evaluator = config.build_evaluator().unwrap();

    let input = r#"
{"condition": {"all": [{"same": [{"ctx": ["a"]}, 1]}]}, "context": {"a": 1}}
{"condition": {"bigger": [2, 1]}}
{"condition": {"and": [true]}}
"#;

    let mut out = Vec::new();
    let processed = run_batch(&evaluator, &config.limits, input.as_bytes(), &mut out).unwrap();
    assert_eq!(processed, 3);

    let results: Vec<EvaluationResult> = String::from_utf8(out)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();

    assert_eq!(results[0].result, json!(true));
    assert!(results[1].error.as_deref().unwrap().contains("bigger"));
    assert!(results[2].error.as_deref().unwrap().contains("and"));
}

#[test]
fn test_configured_limits_reject_deep_input() {
    let config = Config::from_yaml("limits: {max_depth: 3}").unwrap();
    let evaluator = config.build_evaluator().unwrap();

    let mut out = Vec::new();
    run_batch(
        &evaluator,
        &config.limits,
        r#"{"condition": {"not": {"not": {"not": {"not": true}}}}}"#.as_bytes(),
        &mut out,
    )
    .unwrap();

    let result: EvaluationResult = serde_json::from_slice(&out).unwrap();
    assert_eq!(result.result, Value::Null);
    assert_eq!(
        result.error.as_deref(),
        Some("expression exceeds nesting depth limit of 3")
    );
}

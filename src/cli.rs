// SPDX-License-Identifier: MIT

//! Batch evaluation over a stream of JSON messages

use crate::condition::{parse_with_limits, ConditionError, Context, Evaluator, Limits};
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use serde_json::Value;
use std::io::{BufRead, Write};

/// A condition paired with the context to evaluate it against
#[derive(Debug, Deserialize)]
pub struct ConditionMessage {
    pub condition: Box<RawValue>,
    #[serde(default)]
    pub context: Option<Box<RawValue>>,
}

/// Outcome of one evaluation; exactly one of `error` and `result` is meaningful
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub error: Option<String>,
    pub result: Value,
}

impl EvaluationResult {
    pub fn from_outcome(outcome: Result<Value, ConditionError>) -> Self {
        match outcome {
            Ok(result) => Self {
                error: None,
                result,
            },
            Err(err) => Self {
                error: Some(err.to_string()),
                result: Value::Null,
            },
        }
    }
}

/// Parse and evaluate a single message
pub fn evaluate_message(
    evaluator: &Evaluator,
    limits: &Limits,
    message: &ConditionMessage,
) -> EvaluationResult {
    let context = match &message.context {
        Some(raw) => Context::raw(raw.get()),
        None => Context::empty(),
    };

    let outcome = parse_with_limits(message.condition.get(), limits)
        .and_then(|root| evaluator.evaluate(&context, &root));
    if let Err(err) = &outcome {
        log::debug!("evaluation failed: {}", err);
    }
    EvaluationResult::from_outcome(outcome)
}

/// Evaluate every message read from `input`, writing one result line per message.
///
/// Evaluation failures are reported in the result line; a malformed message or an
/// I/O failure aborts the batch. Returns the number of messages processed.
pub fn run_batch<R, W>(
    evaluator: &Evaluator,
    limits: &Limits,
    input: R,
    mut output: W,
) -> anyhow::Result<usize>
where
    R: BufRead,
    W: Write,
{
    let messages = serde_json::Deserializer::from_reader(input).into_iter::<ConditionMessage>();
    let mut processed = 0;

    for message in messages {
        let message = message?;
        let result = evaluate_message(evaluator, limits, &message);
        serde_json::to_writer(&mut output, &result)?;
        output.write_all(b"\n")?;
        processed += 1;
    }

    output.flush()?;
    log::info!("processed {} message(s)", processed);
    Ok(processed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn batch(input: &str) -> anyhow::Result<Vec<EvaluationResult>> {
        let mut out = Vec::new();
        run_batch(
            &Evaluator::with_builtins(),
            &Limits::default(),
            input.as_bytes(),
            &mut out,
        )?;
        Ok(String::from_utf8(out)?
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect())
    }

    #[test]
    fn test_batch_results() {
        let input = r#"
{"condition": {"gt": [{"context": ["age"]}, 18]}, "context": {"age": 30}}
{"condition": {"eq": [1, 1]}}
{"condition": {"nope": []}, "context": null}
"#;
        let results = batch(input).unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].result, json!(true));
        assert_eq!(results[0].error, None);
        assert_eq!(results[1].result, json!(true));
        assert_eq!(results[2].result, json!(null));
        assert_eq!(
            results[2].error.as_deref(),
            Some(r#"no expression handler bound to "nope""#)
        );
    }

    #[test]
    fn test_result_line_format() {
        let mut out = Vec::new();
        run_batch(
            &Evaluator::with_builtins(),
            &Limits::default(),
            r#"{"condition": {"sha1mod": ["value", 100]}}"#.as_bytes(),
            &mut out,
        )
        .unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "{\"error\":null,\"result\":3}\n"
        );
    }

    #[test]
    fn test_empty_input() {
        assert!(batch("  \n").unwrap().is_empty());
    }

    #[test]
    fn test_malformed_message_aborts() {
        assert!(batch(r#"{"condition": 1} {"context": 2}"#).is_err());
        assert!(batch(r#"{"condition": "#).is_err());
    }

    #[test]
    fn test_limits_apply_to_messages() {
        let limits = Limits {
            max_depth: 2,
            max_nodes: 100,
        };
        let message: ConditionMessage =
            serde_json::from_str(r#"{"condition": [[[1]]]}"#).unwrap();
        let result = evaluate_message(&Evaluator::with_builtins(), &limits, &message);
        assert!(result.error.unwrap().contains("limit"));
    }
}

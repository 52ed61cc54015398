// SPDX-License-Identifier: MIT

//! Condition expression evaluator
//!
//! Function nodes are dispatched by name to handlers held in a [`Registry`]. The
//! registry is assembled once and only read afterwards, and the context travels with
//! each `evaluate` call, so one [`Evaluator`] can serve concurrent evaluations.

use super::ast::{Function, Node};
use super::context::Context;
use super::error::ConditionError;
use super::handlers::builtin_registry;
use super::parser::Limits;
use serde_json::Value;
use std::cell::Cell;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A named evaluation rule bound to function nodes.
///
/// The handler receives the running evaluation, so it can evaluate its own argument
/// subtree as it sees fit, and the function node itself.
pub trait Handler: Send + Sync {
    fn call(&self, eval: &Evaluation<'_>, function: &Function) -> Result<Value, ConditionError>;
}

impl<F> Handler for F
where
    F: Fn(&Evaluation<'_>, &Function) -> Result<Value, ConditionError> + Send + Sync,
{
    fn call(&self, eval: &Evaluation<'_>, function: &Function) -> Result<Value, ConditionError> {
        self(eval, function)
    }
}

/// Mapping of function names to handlers
#[derive(Clone, Default)]
pub struct Registry {
    handlers: HashMap<String, Arc<dyn Handler>>,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Register a handler, replacing any existing binding for `name`
    pub fn add_handler(&mut self, name: impl Into<String>, handler: impl Handler + 'static) {
        self.add_shared(name, Arc::new(handler));
    }

    /// Register an already shared handler, replacing any existing binding for `name`
    pub fn add_shared(&mut self, name: impl Into<String>, handler: Arc<dyn Handler>) {
        self.handlers.insert(name.into(), handler);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Handler>> {
        self.handlers.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Registered names in sorted order
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Invoke the handler bound to the function's name.
    ///
    /// Any failure is attributed to the name the handler is registered under.
    pub fn invoke(
        &self,
        eval: &Evaluation<'_>,
        function: &Function,
    ) -> Result<Value, ConditionError> {
        let handler = self
            .handlers
            .get(&function.name)
            .ok_or_else(|| ConditionError::UnknownFunction(function.name.clone()))?;

        log::trace!("dispatching function {:?}", function.name);
        handler
            .call(eval, function)
            .map_err(|err| ConditionError::in_function(&function.name, err))
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("handlers", &self.names())
            .finish()
    }
}

/// Evaluates parsed condition expressions against a context
#[derive(Debug, Clone)]
pub struct Evaluator {
    registry: Registry,
    max_depth: usize,
}

impl Evaluator {
    /// Create an evaluator with no handlers
    pub fn new() -> Self {
        Self::from_registry(Registry::new())
    }

    /// Create an evaluator with every built-in function under its default name
    pub fn with_builtins() -> Self {
        Self::from_registry(builtin_registry())
    }

    pub fn from_registry(registry: Registry) -> Self {
        Self {
            registry,
            max_depth: Limits::default().max_depth,
        }
    }

    /// Apply the nesting depth limit to evaluation as well
    pub fn with_limits(mut self, limits: &Limits) -> Self {
        self.max_depth = limits.max_depth;
        self
    }

    /// Register a handler, replacing any existing binding for `name`
    pub fn add_handler(&mut self, name: impl Into<String>, handler: impl Handler + 'static) {
        self.registry.add_handler(name, handler);
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Evaluate `root` against `context`.
    ///
    /// A failing subexpression aborts the whole evaluation; there is no partial result.
    pub fn evaluate(&self, context: &Context, root: &Node) -> Result<Value, ConditionError> {
        Evaluation {
            registry: &self.registry,
            context,
            depth: Cell::new(0),
            max_depth: self.max_depth,
        }
        .evaluate(root)
    }
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new()
    }
}

/// State of a single `evaluate` call, handed to every handler
pub struct Evaluation<'a> {
    registry: &'a Registry,
    context: &'a Context,
    depth: Cell<usize>,
    max_depth: usize,
}

impl<'a> Evaluation<'a> {
    /// The context supplied to this evaluation
    pub fn context(&self) -> &'a Context {
        self.context
    }

    pub fn registry(&self) -> &'a Registry {
        self.registry
    }

    /// Evaluate a node.
    ///
    /// Literals yield their value, arrays evaluate every element left to right, and
    /// functions are dispatched to their handler.
    pub fn evaluate(&self, node: &Node) -> Result<Value, ConditionError> {
        match node {
            Node::Literal(literal) => Ok(literal.to_value()),
            Node::Array(elements) => self.nested(|| self.evaluate_all(elements).map(Value::Array)),
            Node::Function(function) => self.nested(|| self.registry.invoke(self, function)),
        }
    }

    /// Evaluate nodes in order, stopping at the first failure
    pub fn evaluate_all(&self, nodes: &[Node]) -> Result<Vec<Value>, ConditionError> {
        nodes.iter().map(|node| self.evaluate(node)).collect()
    }

    fn nested<T>(
        &self,
        f: impl FnOnce() -> Result<T, ConditionError>,
    ) -> Result<T, ConditionError> {
        let depth = self.depth.get() + 1;
        if depth > self.max_depth {
            return Err(ConditionError::LimitExceeded {
                limit: "evaluation depth",
                max: self.max_depth,
            });
        }

        self.depth.set(depth);
        let result = f();
        self.depth.set(depth - 1);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::parser::parse;
    use crate::condition::token::Literal;
    use serde_json::json;
    use std::sync::Mutex;

    fn constant(value: Value) -> impl Handler {
        move |_: &Evaluation<'_>, _: &Function| -> Result<Value, ConditionError> {
            Ok(value.clone())
        }
    }

    fn failing(_: &Evaluation<'_>, _: &Function) -> Result<Value, ConditionError> {
        Err(ConditionError::type_error("boom"))
    }

    fn evaluate(evaluator: &Evaluator, input: &str) -> Result<Value, ConditionError> {
        evaluator.evaluate(&Context::empty(), &parse(input).unwrap())
    }

    #[test]
    fn test_literals_and_arrays() {
        let evaluator = Evaluator::new();
        assert_eq!(evaluate(&evaluator, "1.5").unwrap(), json!(1.5));
        assert_eq!(evaluate(&evaluator, "\"s\"").unwrap(), json!("s"));
        assert_eq!(evaluate(&evaluator, "null").unwrap(), json!(null));
        assert_eq!(
            evaluate(&evaluator, "[1, [true, null], \"x\"]").unwrap(),
            json!([1, [true, null], "x"])
        );
        assert_eq!(evaluate(&evaluator, "[]").unwrap(), json!([]));
    }

    #[test]
    fn test_unknown_function() {
        let evaluator = Evaluator::new();
        let err = evaluate(&evaluator, r#"{"missing": []}"#).unwrap_err();
        assert!(matches!(err, ConditionError::UnknownFunction(ref name) if name == "missing"));
    }

    #[test]
    fn test_custom_handler_receives_node() {
        let mut evaluator = Evaluator::new();
        evaluator.add_handler(
            "count",
            |eval: &Evaluation<'_>, f: &Function| -> Result<Value, ConditionError> {
                let args = eval.evaluate_all(f.arguments()?)?;
                Ok(json!(args.len()))
            },
        );
        assert_eq!(evaluate(&evaluator, r#"{"count": [1, 2, 3]}"#).unwrap(), json!(3));
    }

    #[test]
    fn test_add_handler_overwrites() {
        let mut evaluator = Evaluator::new();
        evaluator.add_handler("f", constant(json!(1)));
        evaluator.add_handler("f", constant(json!(2)));
        assert_eq!(evaluator.registry().len(), 1);
        assert_eq!(evaluate(&evaluator, r#"{"f": null}"#).unwrap(), json!(2));
    }

    #[test]
    fn test_errors_are_attributed_to_registered_name() {
        let mut registry = Registry::new();
        registry.add_handler("explode", failing);
        let handler = registry.get("explode").unwrap();
        registry.add_shared("renamed", handler);

        let evaluator = Evaluator::from_registry(registry);
        let err = evaluate(&evaluator, r#"{"renamed": []}"#).unwrap_err();
        assert_eq!(err.to_string(), "renamed expression: boom");
        assert_eq!(err.function_chain(), vec!["renamed"]);
    }

    #[test]
    fn test_array_elements_evaluated_in_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let recorder = {
            let seen = seen.clone();
            move |eval: &Evaluation<'_>, f: &Function| -> Result<Value, ConditionError> {
                let value = eval.evaluate(&f.argument)?;
                seen.lock().unwrap().push(value.clone());
                Ok(value)
            }
        };

        let mut evaluator = Evaluator::new();
        evaluator.add_handler("rec", recorder);
        evaluate(&evaluator, r#"[{"rec": 1}, {"rec": 2}, {"rec": 3}]"#).unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![json!(1), json!(2), json!(3)]);
    }

    #[test]
    fn test_evaluation_depth_limit() {
        let mut node = Node::Literal(Literal::Boolean(true));
        for _ in 0..10 {
            node = Node::Array(vec![node]);
        }

        let limits = Limits {
            max_depth: 5,
            max_nodes: 100,
        };
        let evaluator = Evaluator::new().with_limits(&limits);
        let err = evaluator.evaluate(&Context::empty(), &node).unwrap_err();
        assert!(matches!(
            err,
            ConditionError::LimitExceeded {
                limit: "evaluation depth",
                ..
            }
        ));

        let evaluator = Evaluator::new();
        assert!(evaluator.evaluate(&Context::empty(), &node).is_ok());
    }

    #[test]
    fn test_registry_names_sorted() {
        let mut registry = Registry::new();
        assert!(registry.is_empty());
        registry.add_handler("b", failing);
        registry.add_handler("a", failing);
        assert_eq!(registry.names(), vec!["a", "b"]);
        assert!(registry.contains("a"));
        assert!(!registry.contains("c"));
        assert!(!registry.is_empty());
    }

    #[test]
    fn test_handler_sees_registry() {
        let mut evaluator = Evaluator::new();
        evaluator.add_handler(
            "defined",
            |eval: &Evaluation<'_>, f: &Function| -> Result<Value, ConditionError> {
                match eval.evaluate(&f.argument)? {
                    Value::String(name) => Ok(json!(eval.registry().contains(&name))),
                    _ => Err(ConditionError::type_error("expected function name")),
                }
            },
        );

        assert_eq!(evaluate(&evaluator, r#"{"defined": "defined"}"#).unwrap(), json!(true));
        assert_eq!(evaluate(&evaluator, r#"{"defined": "and"}"#).unwrap(), json!(false));
    }

    #[test]
    fn test_evaluator_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Evaluator>();
        assert_send_sync::<Node>();
        assert_send_sync::<Context>();
    }
}

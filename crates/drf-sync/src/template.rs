//! # Template Evaluator
//!
//! [`Evaluator`] backed by MiniJinja expressions, so `compose`, `groups` and
//! `keyed_groups` read like Jinja2: `operating_system.name == 'linux'`,
//! `description | lower`, `'prod'`.
//!
//! Undefined variables are errors, never silently empty.

use drf_core::{Evaluator, ExpressionError};
use minijinja::{Environment, UndefinedBehavior};
use serde_json::{Map, Value};

pub struct TemplateEvaluator {
    env: Environment<'static>,
}

impl Default for TemplateEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateEvaluator {
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        TemplateEvaluator { env }
    }

    fn eval(
        &self,
        expression: &str,
        context: &Map<String, Value>,
    ) -> Result<minijinja::Value, ExpressionError> {
        let compiled = self
            .env
            .compile_expression(expression)
            .map_err(|e| ExpressionError::new(e.to_string()))?;
        let value = compiled
            .eval(context)
            .map_err(|e| ExpressionError::new(e.to_string()))?;

        if value.is_undefined() {
            return Err(ExpressionError::new(format!(
                "'{}' is undefined",
                expression.trim()
            )));
        }
        Ok(value)
    }
}

impl Evaluator for TemplateEvaluator {
    fn evaluate(
        &self,
        expression: &str,
        context: &Map<String, Value>,
    ) -> Result<Value, ExpressionError> {
        let value = self.eval(expression, context)?;
        serde_json::to_value(&value).map_err(|e| ExpressionError::new(e.to_string()))
    }

    fn evaluate_condition(
        &self,
        expression: &str,
        context: &Map<String, Value>,
    ) -> Result<bool, ExpressionError> {
        self.eval(expression, context).map(|v| v.is_true())
    }
}

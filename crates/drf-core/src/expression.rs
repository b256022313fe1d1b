//! # Expression Evaluation Seam
//!
//! drf-core does not ship an expression language. Composed variables, group
//! conditions and keyed group keys are handed to an injected [`Evaluator`],
//! which sees a flat variable context built by [`combine_context`].

use serde_json::{Map, Value};

use crate::error::ExpressionError;

/// Evaluates expressions against a variable context.
///
/// Implementations must be pure: the same expression and context always give
/// the same result, and nothing outside the return value is touched.
pub trait Evaluator {
    /// Evaluates `expression` to a value.
    fn evaluate(&self, expression: &str, context: &Map<String, Value>)
        -> Result<Value, ExpressionError>;

    /// Evaluates `expression` as a condition.
    ///
    /// The default maps the value through [`is_truthy`].
    fn evaluate_condition(
        &self,
        expression: &str,
        context: &Map<String, Value>,
    ) -> Result<bool, ExpressionError> {
        self.evaluate(expression, context).map(|v| is_truthy(&v))
    }
}

impl<E: Evaluator + ?Sized> Evaluator for &E {
    fn evaluate(
        &self,
        expression: &str,
        context: &Map<String, Value>,
    ) -> Result<Value, ExpressionError> {
        (**self).evaluate(expression, context)
    }

    fn evaluate_condition(
        &self,
        expression: &str,
        context: &Map<String, Value>,
    ) -> Result<bool, ExpressionError> {
        (**self).evaluate_condition(expression, context)
    }
}

/// Truthiness of a JSON value.
///
/// Null, `false`, zero, and empty strings, arrays and objects are false. The
/// strings `"false"`, `"no"`, `"off"` and `"0"` (any case) are false too,
/// because templated conditions often come back as text.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => {
            let trimmed = s.trim();
            !(trimmed.is_empty()
                || matches!(
                    trimmed.to_ascii_lowercase().as_str(),
                    "false" | "no" | "off" | "0"
                ))
        }
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// Merges a record with host variables into one evaluation context.
///
/// Host variables win when both define the same name.
pub fn combine_context(record: &Value, host_vars: &Map<String, Value>) -> Map<String, Value> {
    let mut context = match record {
        Value::Object(map) => map.clone(),
        _ => Map::new(),
    };
    for (name, value) in host_vars {
        context.insert(name.clone(), value.clone());
    }
    context
}

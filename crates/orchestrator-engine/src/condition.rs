//! # EdgeConditionEvaluator (§4.6)
//!
//! Stateless predicate evaluator: reads the current [`ExecutionContext`] at
//! each expression's port path and combines the results by the condition's
//! operator, in the same style as a `workflow::validator` boolean-rule
//! evaluator, generalized to the port-path + operation lattice (§4.6).

use orchestrator_core::context::ExecutionContext;
use orchestrator_core::error::{OrchestratorError, Result};
use orchestrator_core::metamodel::{ConditionExpression, ConditionOperator, EdgeCondition, ExpressionOperation};
use orchestrator_core::ports::PortValue;

/// `evaluate(edge.condition, context)` (§4.6). A missing condition is
/// vacuously true.
pub fn evaluate(condition: Option<&EdgeCondition>, ctx: &ExecutionContext) -> Result<bool> {
    let Some(condition) = condition else { return Ok(true) };

    let mut results = Vec::with_capacity(condition.expressions.len());
    for expr in &condition.expressions {
        results.push(evaluate_expression(expr, ctx)?);
    }

    Ok(match condition.operator {
        ConditionOperator::And => results.into_iter().all(|r| r),
        ConditionOperator::Or => results.into_iter().any(|r| r),
    })
}

fn evaluate_expression(expr: &ConditionExpression, ctx: &ExecutionContext) -> Result<bool> {
    let actual = ctx.get(&expr.port);

    Ok(match expr.operation {
        ExpressionOperation::Equals => values_equal(actual, expr.value.as_ref()),
        ExpressionOperation::NotEquals => !values_equal(actual, expr.value.as_ref()),
        ExpressionOperation::GreaterThan | ExpressionOperation::LessThan => {
            let actual_f = as_f64(actual).ok_or_else(|| {
                OrchestratorError::validation_error(format!("port '{}' is not numeric", expr.port))
            })?;
            let expected_f = as_f64(expr.value.as_ref()).ok_or_else(|| {
                OrchestratorError::validation_error(format!("comparison value for '{}' is not numeric", expr.port))
            })?;
            if matches!(expr.operation, ExpressionOperation::GreaterThan) {
                actual_f > expected_f
            } else {
                actual_f < expected_f
            }
        }
        ExpressionOperation::Contains | ExpressionOperation::StartsWith => {
            let haystack = stringify(actual);
            let needle = stringify(expr.value.as_ref());
            if matches!(expr.operation, ExpressionOperation::Contains) {
                haystack.contains(&needle)
            } else {
                haystack.starts_with(&needle)
            }
        }
        ExpressionOperation::In | ExpressionOperation::NotIn => {
            let membership = match expr.value.as_ref() {
                Some(PortValue::Seq(items)) => items.iter().any(|item| values_equal(actual, Some(item))),
                Some(other) => values_equal(actual, Some(other)),
                None => false,
            };
            if matches!(expr.operation, ExpressionOperation::In) {
                membership
            } else {
                !membership
            }
        }
        ExpressionOperation::IsNull => actual.is_none() || actual.map(|v| v.is_null()).unwrap_or(true),
        ExpressionOperation::IsNotNull => actual.map(|v| !v.is_null()).unwrap_or(false),
        ExpressionOperation::IsTrue => actual.map(|v| v.is_true_value()).unwrap_or(false),
        ExpressionOperation::IsFalse => actual.map(|v| v.is_false_value()).unwrap_or(true),
    })
}

fn values_equal(actual: Option<&PortValue>, expected: Option<&PortValue>) -> bool {
    match (actual, expected) {
        (None, None) => true,
        (None, Some(v)) | (Some(v), None) => v.is_null(),
        (Some(a), Some(b)) => a == b,
    }
}

fn as_f64(value: Option<&PortValue>) -> Option<f64> {
    match value? {
        PortValue::Int(i) => Some(*i as f64),
        PortValue::Float(f) => Some(*f),
        PortValue::String(s) => s.parse::<f64>().ok(),
        _ => None,
    }
}

fn stringify(value: Option<&PortValue>) -> String {
    match value {
        None | Some(PortValue::Null) => String::new(),
        Some(PortValue::String(s)) => s.clone(),
        Some(PortValue::Bool(b)) => b.to_string(),
        Some(PortValue::Int(i)) => i.to_string(),
        Some(PortValue::Float(f)) => f.to_string(),
        Some(PortValue::Date(d)) => d.to_rfc3339(),
        Some(other) => serde_json::to_string(other).unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orchestrator_core::metamodel::ConditionExpression;

    fn ctx_with(key: &str, value: PortValue) -> ExecutionContext {
        let mut ctx = ExecutionContext::new();
        ctx.put(key, value);
        ctx
    }

    #[test]
    fn absent_condition_is_true() {
        let ctx = ExecutionContext::new();
        assert!(evaluate(None, &ctx).unwrap());
    }

    #[test]
    fn and_requires_all_expressions() {
        let ctx = ctx_with("status", PortValue::String("ok".to_string()));
        let condition = EdgeCondition {
            operator: ConditionOperator::And,
            expressions: vec![
                ConditionExpression {
                    port: "status".to_string(),
                    operation: ExpressionOperation::Equals,
                    value: Some(PortValue::String("ok".to_string())),
                },
                ConditionExpression {
                    port: "status".to_string(),
                    operation: ExpressionOperation::Equals,
                    value: Some(PortValue::String("fail".to_string())),
                },
            ],
        };
        assert!(!evaluate(Some(&condition), &ctx).unwrap());
    }

    #[test]
    fn is_false_on_null_is_true() {
        let ctx = ExecutionContext::new();
        let condition = EdgeCondition {
            operator: ConditionOperator::And,
            expressions: vec![ConditionExpression {
                port: "missing".to_string(),
                operation: ExpressionOperation::IsFalse,
                value: None,
            }],
        };
        assert!(evaluate(Some(&condition), &ctx).unwrap());
    }

    #[test]
    fn greater_than_parses_numeric_strings() {
        let ctx = ctx_with("count", PortValue::String("5".to_string()));
        let condition = EdgeCondition {
            operator: ConditionOperator::And,
            expressions: vec![ConditionExpression {
                port: "count".to_string(),
                operation: ExpressionOperation::GreaterThan,
                value: Some(PortValue::Int(3)),
            }],
        };
        assert!(evaluate(Some(&condition), &ctx).unwrap());
    }

    #[test]
    fn validate_rejects_empty_expressions() {
        let condition = EdgeCondition { operator: ConditionOperator::And, expressions: vec![] };
        assert!(condition.validate().is_err());
    }

    #[test]
    fn validate_rejects_null_value_for_equals() {
        let condition = EdgeCondition {
            operator: ConditionOperator::And,
            expressions: vec![ConditionExpression {
                port: "status".to_string(),
                operation: ExpressionOperation::Equals,
                value: None,
            }],
        };
        assert!(condition.validate().is_err());
    }
}

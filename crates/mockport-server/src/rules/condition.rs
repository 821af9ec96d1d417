use super::context::RequestContext;
use crate::model::{Condition, ConditionGroup, ConditionOperator, GroupOperator};
use serde_json::Value;
use tracing::debug;

/// Evaluate a condition group. An empty group is vacuously true.
pub fn evaluate_group(group: &ConditionGroup, ctx: &RequestContext) -> bool {
    if group.conditions.is_empty() {
        return true;
    }
    match group.operator {
        GroupOperator::And => group.conditions.iter().all(|c| evaluate_condition(c, ctx)),
        GroupOperator::Or => group.conditions.iter().any(|c| evaluate_condition(c, ctx)),
    }
}

/// Evaluate a single condition. Anomalies (missing field, bad operand types)
/// are a non-match.
pub fn evaluate_condition(condition: &Condition, ctx: &RequestContext) -> bool {
    let Some(actual) = ctx.resolve(&condition.field) else {
        debug!("Condition field '{}' not present", condition.field);
        return false;
    };
    apply_operator(condition.operator, &actual, &condition.value)
}

pub fn apply_operator(operator: ConditionOperator, actual: &Value, expected: &Value) -> bool {
    match operator {
        ConditionOperator::Equals => strict_equals(actual, expected),
        ConditionOperator::Contains => stringify(actual).contains(&stringify(expected)),
        ConditionOperator::Gt => compare(actual, expected, |a, b| a > b),
        ConditionOperator::Lt => compare(actual, expected, |a, b| a < b),
        ConditionOperator::Between => match expected.as_array().map(Vec::as_slice) {
            Some([low, high]) => match (to_number(actual), to_number(low), to_number(high)) {
                (Some(x), Some(lo), Some(hi)) => lo <= x && x <= hi,
                _ => false,
            },
            _ => {
                debug!("between requires a two element range, got {}", expected);
                false
            }
        },
        ConditionOperator::In => match expected {
            Value::Array(set) => set.iter().any(|candidate| strict_equals(actual, candidate)),
            _ => {
                debug!("in requires an array value, got {}", expected);
                false
            }
        },
    }
}

/// Same type and same value. Numbers compare by magnitude so `1` equals `1.0`.
fn strict_equals(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => x == y,
        },
        _ => a == b,
    }
}

fn compare(actual: &Value, expected: &Value, op: impl Fn(f64, f64) -> bool) -> bool {
    match (to_number(actual), to_number(expected)) {
        (Some(a), Some(b)) => op(a, b),
        _ => false,
    }
}

/// Numeric coercion: numbers, numeric strings and booleans. NaN is `None`.
pub fn to_number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        Value::Bool(b) => f64::from(u8::from(*b)),
        _ => return None,
    };
    (!n.is_nan()).then_some(n)
}

/// Strings as-is, everything else as JSON text.
pub fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

//! Visibility evaluation for conditional fields.

use serde_json::Value;

use crate::types::VisibilityCondition;

/// Coerce a field value to a boolean the way the browser form layer does:
/// null, `false`, `0`, NaN and the empty string are falsy, everything else
/// (including empty arrays and objects) is truthy.
pub fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().map(|f| f != 0.0 && !f.is_nan()).unwrap_or(true),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(_)) | Some(Value::Object(_)) => true,
    }
}

/// Strict equality: same kind and same value. Numbers compare numerically
/// so that `1` and `1.0` are equal.
pub fn strict_equals(left: Option<&Value>, right: &Value) -> bool {
    match (left.unwrap_or(&Value::Null), right) {
        (Value::Number(a), Value::Number(b)) => match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => a == b,
        },
        (a, b) => a == b,
    }
}

/// Decide whether a field renders given its condition and the watched value.
///
/// Precedence when several kinds are set: `isTruthy`, then `isFalsy`, then
/// `equals`. No condition means always visible.
pub fn is_visible(condition: Option<&VisibilityCondition>, watched: Option<&Value>) -> bool {
    let Some(condition) = condition else {
        return true;
    };

    if condition.is_truthy == Some(true) {
        return is_truthy(watched);
    }
    if condition.is_falsy == Some(true) {
        return !is_truthy(watched);
    }
    if let Some(expected) = &condition.equals {
        return strict_equals(watched, expected);
    }
    true
}

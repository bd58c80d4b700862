//! Input validation utilities.
//!
//! Raw selection values arrive from the form UI as untyped JSON. These helpers turn them into
//! typed values, or reject them before any state is touched.

use crate::{SyncError, SyncResult};
use ptw_types::PermitTypeId;
use serde_json::Value;

/// Returns true if `value` is blank: `null`, an empty or whitespace-only string, or an empty
/// array.
pub fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

/// Parses a raw permit type selection.
///
/// - `null` is an unset selection and yields `Ok(None)`.
/// - Non-negative integers yield [`PermitTypeId::Numeric`].
/// - Non-blank strings yield [`PermitTypeId::Text`] (trimmed).
///
/// # Errors
///
/// Returns [`SyncError::InvalidSelection`] for booleans, floats, negative integers, blank
/// strings, arrays and objects.
pub fn parse_permit_type_selection(raw: &Value) -> SyncResult<Option<PermitTypeId>> {
    match raw {
        Value::Null => Ok(None),
        Value::Number(n) => n
            .as_u64()
            .map(|id| Some(PermitTypeId::Numeric(id)))
            .ok_or_else(|| {
                SyncError::InvalidSelection(format!(
                    "permit type id must be a non-negative integer, got {n}"
                ))
            }),
        Value::String(s) => PermitTypeId::text(s)
            .map(Some)
            .map_err(|_| SyncError::InvalidSelection("permit type id cannot be blank".into())),
        other => Err(SyncError::InvalidSelection(format!(
            "permit type id must be an integer or string, got {}",
            value_kind(other)
        ))),
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_selection_accepts_ids() {
        assert_eq!(
            parse_permit_type_selection(&json!(12)).unwrap(),
            Some(PermitTypeId::Numeric(12))
        );
        assert_eq!(
            parse_permit_type_selection(&json!(" hot-work ")).unwrap(),
            Some(PermitTypeId::text("hot-work").unwrap())
        );
        assert_eq!(parse_permit_type_selection(&json!(null)).unwrap(), None);
    }

    #[test]
    fn test_parse_selection_rejects_malformed() {
        for raw in [json!(true), json!(1.5), json!(-3), json!("  "), json!([1]), json!({})] {
            let err = parse_permit_type_selection(&raw).unwrap_err();
            assert!(
                matches!(err, SyncError::InvalidSelection(_)),
                "expected InvalidSelection for {raw}"
            );
        }
    }

    #[test]
    fn test_is_blank() {
        assert!(is_blank(&json!(null)));
        assert!(is_blank(&json!("")));
        assert!(is_blank(&json!(" \t")));
        assert!(is_blank(&json!([])));
        assert!(!is_blank(&json!("x")));
        assert!(!is_blank(&json!(0)));
        assert!(!is_blank(&json!({})));
    }
}

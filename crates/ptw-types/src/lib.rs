//! Validated value types shared across the PTW crates.
//!
//! These types guarantee their invariants once constructed, so code further in can accept them
//! without re-checking:
//! - [`NonEmptyText`]: trimmed text with at least one non-whitespace character
//! - [`FieldName`]: a form field key safe to use as a map key and in save payloads
//! - [`PermitTypeId`]: the identifier of a permit type, numeric or textual

use std::borrow::Borrow;
use std::fmt;
use std::str::FromStr;

/// Form field holding the selected permit type.
pub const PERMIT_TYPE_FIELD: &str = "permit_type";

/// Errors that can occur when creating validated text types.
#[derive(Debug, thiserror::Error)]
pub enum TextError {
    /// The input text was empty or contained only whitespace
    #[error("Text cannot be empty")]
    Empty,
}

/// Errors that can occur when creating identifier types.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum IdentifierError {
    #[error("identifier cannot be empty")]
    Empty,
    #[error("identifier exceeds maximum length of {max} characters")]
    TooLong { max: usize },
    #[error("identifier contains invalid characters (only alphanumeric, '.', '-', '_' allowed): '{0}'")]
    InvalidCharacters(String),
}

/// A string type that guarantees non-empty content.
///
/// This type wraps a `String` and ensures it contains at least one non-whitespace character.
/// The input is automatically trimmed of leading and trailing whitespace during construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NonEmptyText(String);

impl NonEmptyText {
    /// Creates a new `NonEmptyText` from the given input.
    ///
    /// The input is trimmed of leading and trailing whitespace. If the trimmed
    /// result is empty, an error is returned.
    pub fn new(input: impl AsRef<str>) -> Result<Self, TextError> {
        let trimmed = input.as_ref().trim();
        if trimmed.is_empty() {
            return Err(TextError::Empty);
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Returns the inner string as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NonEmptyText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for NonEmptyText {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl serde::Serialize for NonEmptyText {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> serde::Deserialize<'de> for NonEmptyText {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        NonEmptyText::new(&s).map_err(serde::de::Error::custom)
    }
}

/// The key of a single form field.
///
/// Field names are restricted to a conservative ASCII set so they can be used verbatim as
/// JSON object keys, YAML keys and log fields. Unlike [`NonEmptyText`], surrounding whitespace is
/// rejected rather than trimmed: `" b"` and `"b"` must never address the same field by accident.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldName(String);

impl FieldName {
    /// Maximum accepted length of a field name.
    pub const MAX_LEN: usize = 128;

    /// Validates and wraps a field name.
    ///
    /// # Errors
    ///
    /// Returns an [`IdentifierError`] if the name is empty, longer than [`Self::MAX_LEN`], or
    /// contains characters outside `[A-Za-z0-9._-]`.
    pub fn new(input: impl AsRef<str>) -> Result<Self, IdentifierError> {
        let input = input.as_ref();
        if input.is_empty() {
            return Err(IdentifierError::Empty);
        }
        if input.len() > Self::MAX_LEN {
            return Err(IdentifierError::TooLong { max: Self::MAX_LEN });
        }
        let ok = input
            .bytes()
            .all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'z' | b'A'..=b'Z' | b'.' | b'-' | b'_'));
        if !ok {
            return Err(IdentifierError::InvalidCharacters(input.to_owned()));
        }
        Ok(Self(input.to_owned()))
    }

    /// The reserved field that records the selected permit type.
    pub fn permit_type() -> Self {
        Self(PERMIT_TYPE_FIELD.to_owned())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FieldName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for FieldName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for FieldName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl FromStr for FieldName {
    type Err = IdentifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl serde::Serialize for FieldName {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> serde::Deserialize<'de> for FieldName {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        FieldName::new(&s).map_err(serde::de::Error::custom)
    }
}

/// Identifier of a permit type.
///
/// Backends key permit types either by a numeric database id or by a textual code (for example
/// `hot-work`). Both forms are accepted; they are never considered equal to each other, so `7`
/// and `"7"` are distinct identifiers when constructed directly. [`FromStr`] maps all-digit
/// input to the numeric form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
pub enum PermitTypeId {
    Numeric(u64),
    Text(NonEmptyText),
}

impl PermitTypeId {
    /// Builds a textual identifier.
    pub fn text(input: impl AsRef<str>) -> Result<Self, TextError> {
        NonEmptyText::new(input).map(Self::Text)
    }

    /// Returns the identifier as a JSON value, as it is stored in the form's `permit_type` field.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Numeric(n) => serde_json::Value::from(*n),
            Self::Text(t) => serde_json::Value::String(t.as_str().to_owned()),
        }
    }
}

impl From<u64> for PermitTypeId {
    fn from(value: u64) -> Self {
        Self::Numeric(value)
    }
}

impl fmt::Display for PermitTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Numeric(n) => write!(f, "{n}"),
            Self::Text(t) => write!(f, "{t}"),
        }
    }
}

impl FromStr for PermitTypeId {
    type Err = TextError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if !trimmed.is_empty() && trimmed.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(n) = trimmed.parse::<u64>() {
                return Ok(Self::Numeric(n));
            }
        }
        Self::text(trimmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_empty_text_trims_input() {
        let text = NonEmptyText::new("  hot work  ").unwrap();
        assert_eq!(text.as_str(), "hot work");
    }

    #[test]
    fn test_non_empty_text_rejects_whitespace() {
        assert!(matches!(NonEmptyText::new("   "), Err(TextError::Empty)));
    }

    #[test]
    fn test_field_name_accepts_conservative_ascii() {
        let name = FieldName::new("gas_test.reading-1").unwrap();
        assert_eq!(name.as_str(), "gas_test.reading-1");
    }

    #[test]
    fn test_field_name_rejects_padding_and_symbols() {
        assert!(matches!(
            FieldName::new(" b"),
            Err(IdentifierError::InvalidCharacters(_))
        ));
        assert!(matches!(
            FieldName::new("a/b"),
            Err(IdentifierError::InvalidCharacters(_))
        ));
        assert_eq!(FieldName::new(""), Err(IdentifierError::Empty));
    }

    #[test]
    fn test_field_name_rejects_overlong_input() {
        let long = "a".repeat(FieldName::MAX_LEN + 1);
        assert_eq!(
            FieldName::new(long),
            Err(IdentifierError::TooLong {
                max: FieldName::MAX_LEN
            })
        );
    }

    #[test]
    fn test_reserved_permit_type_field_is_valid() {
        assert_eq!(FieldName::new(PERMIT_TYPE_FIELD).unwrap(), FieldName::permit_type());
    }

    #[test]
    fn test_permit_type_from_str_prefers_numeric() {
        assert_eq!("42".parse::<PermitTypeId>().unwrap(), PermitTypeId::Numeric(42));
        assert_eq!(
            "confined-space".parse::<PermitTypeId>().unwrap(),
            PermitTypeId::text("confined-space").unwrap()
        );
    }

    #[test]
    fn test_permit_type_deserializes_number_or_string() {
        let numeric: PermitTypeId = serde_json::from_str("3").unwrap();
        let text: PermitTypeId = serde_json::from_str("\"hot-work\"").unwrap();
        assert_eq!(numeric, PermitTypeId::Numeric(3));
        assert_eq!(text, PermitTypeId::text("hot-work").unwrap());
        assert!(serde_json::from_str::<PermitTypeId>("\"  \"").is_err());
    }

    #[test]
    fn test_permit_type_to_json_keeps_kind() {
        assert_eq!(PermitTypeId::Numeric(5).to_json(), serde_json::json!(5));
        assert_eq!(
            PermitTypeId::text("electrical").unwrap().to_json(),
            serde_json::json!("electrical")
        );
    }
}

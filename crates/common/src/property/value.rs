use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::crypto::{is_encrypted, EncryptedPayload};

/// Property key to value mapping for one document
pub type PropertyBag = BTreeMap<String, PropertyValue>;

/// A single property value
///
/// Serialized untagged, so the wire form is the bare JSON scalar or array.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
    List(Vec<String>),
}

impl PropertyValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            PropertyValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Whether this value looks like an encrypted payload
    ///
    /// Only text can be a payload. See [`is_encrypted`] for the limits of the
    /// check.
    pub fn is_encrypted(&self) -> bool {
        self.as_str().is_some_and(is_encrypted)
    }

    /// The value as a payload, if it looks like one
    pub fn as_payload(&self) -> Option<EncryptedPayload> {
        match self {
            PropertyValue::Text(text) if is_encrypted(text) => {
                Some(EncryptedPayload::new(text.clone()))
            }
            _ => None,
        }
    }

    /// Empty for persistence purposes
    ///
    /// Numeric zero is a value, not an absence.
    pub fn is_blank(&self) -> bool {
        match self {
            PropertyValue::Null => true,
            PropertyValue::Text(text) => text.is_empty(),
            _ => false,
        }
    }

    /// String form used for change detection
    ///
    /// `0` and `"0"` normalize to the same string, as do `null` and `""`.
    pub fn normalized(&self) -> String {
        match self {
            PropertyValue::Null => String::new(),
            PropertyValue::Bool(b) => b.to_string(),
            PropertyValue::Number(n) => format_number(*n),
            PropertyValue::Text(text) => text.clone(),
            PropertyValue::List(items) => items.join(","),
        }
    }

    /// Compare two values by their normalized string form
    pub fn same_as(&self, other: &PropertyValue) -> bool {
        self.normalized() == other.normalized()
    }

    /// Lenient numeric reading used by aggregations
    ///
    /// Text has every character except digits and `.` stripped, then the
    /// longest leading decimal is parsed. Anything unparseable is zero. Signs
    /// and locale grouping are not understood: `"-5"` reads as `5` and
    /// `"1.234,50"` as `1.234`.
    pub fn to_number_lossy(&self) -> f64 {
        let n = match self {
            PropertyValue::Number(n) => *n,
            PropertyValue::Text(text) => {
                let stripped: String = text
                    .chars()
                    .filter(|c| c.is_ascii_digit() || *c == '.')
                    .collect();
                parse_decimal_prefix(&stripped).unwrap_or(0.0)
            }
            _ => 0.0,
        };
        if n.is_finite() {
            n
        } else {
            0.0
        }
    }
}

fn format_number(n: f64) -> String {
    if n == 0.0 {
        // covers -0.0
        return "0".to_string();
    }
    n.to_string()
}

/// Parse the longest `digits[.digits]` prefix of a string made only of digits and dots
fn parse_decimal_prefix(s: &str) -> Option<f64> {
    let mut end = 0;
    let mut seen_dot = false;
    for (i, c) in s.char_indices() {
        if c == '.' {
            if seen_dot {
                break;
            }
            seen_dot = true;
        }
        end = i + c.len_utf8();
    }
    let prefix = &s[..end];
    if prefix.chars().any(|c| c.is_ascii_digit()) {
        prefix.parse::<f64>().ok()
    } else {
        None
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.normalized())
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::Text(value.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        PropertyValue::Text(value)
    }
}

impl From<f64> for PropertyValue {
    fn from(value: f64) -> Self {
        PropertyValue::Number(value)
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        PropertyValue::Number(value as f64)
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        PropertyValue::Bool(value)
    }
}

impl From<Vec<String>> for PropertyValue {
    fn from(value: Vec<String>) -> Self {
        PropertyValue::List(value)
    }
}

impl From<EncryptedPayload> for PropertyValue {
    fn from(value: EncryptedPayload) -> Self {
        PropertyValue::Text(value.into_inner())
    }
}

/// Read a bag one value at a time, skipping values of an unsupported shape
///
/// One odd value from the document API (an object, a list of numbers) must
/// not hide the rest of the document. A `null` bag reads as empty.
pub fn deserialize_bag_lenient<'de, D>(deserializer: D) -> Result<PropertyBag, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw: Option<BTreeMap<String, serde_json::Value>> = Option::deserialize(deserializer)?;
    let mut bag = PropertyBag::new();
    for (key, value) in raw.unwrap_or_default() {
        match serde_json::from_value::<PropertyValue>(value) {
            Ok(value) => {
                bag.insert(key, value);
            }
            Err(_) => tracing::warn!(key = %key, "skipping property with unsupported value shape"),
        }
    }
    Ok(bag)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_form_is_untagged() {
        let bag: PropertyBag = serde_json::from_str(
            r#"{"a": null, "b": true, "c": 42, "d": "x", "e": ["t1", "t2"], "f": 1.5}"#,
        )
        .unwrap();
        assert_eq!(bag["a"], PropertyValue::Null);
        assert_eq!(bag["b"], PropertyValue::Bool(true));
        assert_eq!(bag["c"], PropertyValue::Number(42.0));
        assert_eq!(bag["d"], PropertyValue::Text("x".into()));
        assert_eq!(
            bag["e"],
            PropertyValue::List(vec!["t1".into(), "t2".into()])
        );
        assert_eq!(bag["f"], PropertyValue::Number(1.5));

        let json = serde_json::to_value(PropertyValue::Text("x".into())).unwrap();
        assert_eq!(json, serde_json::json!("x"));
    }

    #[derive(Debug, Deserialize)]
    struct Holder {
        #[serde(default, deserialize_with = "deserialize_bag_lenient")]
        properties: PropertyBag,
    }

    #[test]
    fn test_lenient_bag_skips_odd_values() {
        let holder: Holder = serde_json::from_str(
            r#"{"properties": {"status": "todo", "meta": {"x": 1}, "scores": [1, 2], "value": 3}}"#,
        )
        .unwrap();
        assert_eq!(holder.properties.len(), 2);
        assert_eq!(holder.properties["status"], PropertyValue::from("todo"));
        assert_eq!(holder.properties["value"], PropertyValue::Number(3.0));

        let holder: Holder = serde_json::from_str(r#"{"properties": null}"#).unwrap();
        assert!(holder.properties.is_empty());
        let holder: Holder = serde_json::from_str("{}").unwrap();
        assert!(holder.properties.is_empty());
    }

    #[test]
    fn test_zero_is_not_blank() {
        assert!(!PropertyValue::Number(0.0).is_blank());
        assert!(!PropertyValue::from("0").is_blank());
        assert!(PropertyValue::Null.is_blank());
        assert!(PropertyValue::from("").is_blank());
    }

    #[test]
    fn test_zero_and_string_zero_are_same() {
        assert!(PropertyValue::Number(0.0).same_as(&PropertyValue::from("0")));
        assert!(PropertyValue::Number(-0.0).same_as(&PropertyValue::from("0")));
        assert!(!PropertyValue::Number(0.0).same_as(&PropertyValue::Null));
        assert!(PropertyValue::Null.same_as(&PropertyValue::from("")));
    }

    #[test]
    fn test_number_normalization() {
        assert_eq!(PropertyValue::Number(42.0).normalized(), "42");
        assert_eq!(PropertyValue::Number(10.5).normalized(), "10.5");
        assert!(PropertyValue::Number(42.0).same_as(&PropertyValue::from("42")));
    }

    #[test]
    fn test_lossy_number_parsing() {
        assert_eq!(PropertyValue::from("42").to_number_lossy(), 42.0);
        assert_eq!(PropertyValue::from("$10.50").to_number_lossy(), 10.5);
        assert_eq!(PropertyValue::from("1,250.75 USD").to_number_lossy(), 1250.75);
        assert_eq!(PropertyValue::from("1.2.3").to_number_lossy(), 1.2);
        assert_eq!(PropertyValue::from("-5").to_number_lossy(), 5.0);
        assert_eq!(PropertyValue::from("n/a").to_number_lossy(), 0.0);
        assert_eq!(PropertyValue::from(".").to_number_lossy(), 0.0);
        assert_eq!(PropertyValue::from(".5").to_number_lossy(), 0.5);
        assert_eq!(PropertyValue::Number(7.25).to_number_lossy(), 7.25);
        assert_eq!(PropertyValue::Number(f64::NAN).to_number_lossy(), 0.0);
        assert_eq!(PropertyValue::Bool(true).to_number_lossy(), 0.0);
    }

    #[test]
    fn test_encrypted_classification_is_text_only() {
        let long = "QUJDREVGR0hJSktMTU5PUFFSU1RVVldYWVphYmNk";
        assert!(PropertyValue::from(long).is_encrypted());
        assert!(PropertyValue::from(long).as_payload().is_some());
        assert!(!PropertyValue::List(vec![long.to_string()]).is_encrypted());
        assert!(!PropertyValue::Number(1e50).is_encrypted());
    }
}

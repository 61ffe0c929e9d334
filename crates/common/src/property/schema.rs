use serde::{Deserialize, Deserializer, Serialize};

/// Display type of a field, as named in the class schema
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    #[default]
    Text,
    Date,
    Select,
    Badge,
    Progress,
    Money,
    Email,
    Tags,
}

/// Which [`PropertyValue`](super::PropertyValue) variant a field stores
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Text,
    Number,
    List,
}

impl FieldType {
    pub fn value_kind(&self) -> ValueKind {
        match self {
            FieldType::Money | FieldType::Progress => ValueKind::Number,
            FieldType::Tags => ValueKind::List,
            _ => ValueKind::Text,
        }
    }
}

/// Static description of one property of a document class
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDefinition {
    pub key: String,
    #[serde(rename = "type", default)]
    pub field_type: FieldType,
    #[serde(default)]
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    /// Never written by a field controller
    #[serde(default)]
    pub read_only: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    /// Must be encrypted before it leaves the client
    #[serde(default)]
    pub confidential: bool,
}

impl FieldDefinition {
    pub fn new(key: impl Into<String>, field_type: FieldType) -> Self {
        let key = key.into();
        Self {
            label: key.clone(),
            key,
            field_type,
            options: None,
            read_only: false,
            currency: None,
            confidential: false,
        }
    }

    pub fn confidential(mut self) -> Self {
        self.confidential = true;
        self
    }

    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_options(mut self, options: Vec<String>) -> Self {
        self.options = Some(options);
        self
    }

    /// Placeholder shown while the input is empty
    pub fn placeholder(&self) -> &'static str {
        match (self.confidential, self.field_type) {
            (true, _) => "[ENCRYPTED_STREAM]",
            (false, FieldType::Money) => "0.00",
            (false, _) => ":: SIGNAL_IDLE ::",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("invalid ui schema: {0}")]
    Invalid(#[from] serde_json::Error),
    #[error("ui schema must be an array or a json-encoded array")]
    UnexpectedShape,
}

/// A document class and the fields it exposes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Archetype {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    /// Accepts either a JSON array or a string holding one
    #[serde(default, deserialize_with = "deserialize_ui_schema")]
    pub ui_schema: Vec<FieldDefinition>,
    #[serde(default)]
    pub behavior_rules: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_children: Option<Vec<String>>,
    #[serde(default)]
    pub has_collection: bool,
}

impl Archetype {
    /// Look up a field definition by key
    pub fn field(&self, key: &str) -> Option<&FieldDefinition> {
        self.ui_schema.iter().find(|f| f.key == key)
    }

    /// Whether a named behavior rule is switched on
    pub fn has_rule(&self, rule: &str) -> bool {
        self.behavior_rules
            .get(rule)
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }
}

/// Parse a ui schema that may have been stored as a JSON string
pub fn parse_ui_schema(raw: serde_json::Value) -> Result<Vec<FieldDefinition>, SchemaError> {
    match raw {
        serde_json::Value::Null => Ok(Vec::new()),
        serde_json::Value::Array(_) => Ok(serde_json::from_value(raw)?),
        serde_json::Value::String(encoded) => Ok(serde_json::from_str(&encoded)?),
        _ => Err(SchemaError::UnexpectedShape),
    }
}

fn deserialize_ui_schema<'de, D>(deserializer: D) -> Result<Vec<FieldDefinition>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = serde_json::Value::deserialize(deserializer)?;
    parse_ui_schema(raw).map_err(serde::de::Error::custom)
}

use serde::{Deserialize, Deserializer};
use serde_json::Value;
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow)]
pub struct SiteSetting {
    pub key: String,
    /// JSON text; `null` is stored literally
    pub value: String,
    pub updated_at: String,
}

impl SiteSetting {
    pub fn parsed_value(&self) -> Value {
        serde_json::from_str(&self.value).unwrap_or(Value::Null)
    }
}

/// Distinguishes an explicit `null` from a missing member
fn present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

#[derive(Debug, Deserialize)]
pub struct UpsertSettingRequest {
    #[serde(default)]
    pub key: String,
    #[serde(default, deserialize_with = "present")]
    pub value: Option<Value>,
}

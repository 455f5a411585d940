use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A line received from the pool: either a response (`id` set) or a
/// notification (`method` set, no `id`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub params: Option<Value>,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<Value>,
}

impl Response {
    pub fn request_id(&self) -> Option<u64> {
        self.id.as_ref().and_then(Value::as_u64)
    }

    /// Error message carried by the response, if any.
    ///
    /// Pools send either `{"message": ...}` objects or bare strings.
    pub fn error_message(&self) -> Option<String> {
        match self.error.as_ref()? {
            Value::Null => None,
            Value::String(message) => Some(message.clone()),
            Value::Object(map) => Some(
                map.get("message")
                    .and_then(Value::as_str)
                    .map(str::to_owned)
                    .unwrap_or_else(|| Value::Object(map.clone()).to_string()),
            ),
            other => Some(other.to_string()),
        }
    }
}

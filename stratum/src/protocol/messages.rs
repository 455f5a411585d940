use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ProxyError, Result};
use crate::job::Job;

/// Messages received from browser miners over the WebSocket
#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    Auth {
        site_key: Option<String>,
        user: Option<String>,
    },
    Submit(ShareSubmission),
    Hashrate {
        rate: f64,
    },
    Ping,
    /// Any other `type`; ignored by the router
    Unknown(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShareSubmission {
    pub job_id: String,
    pub nonce: String,
    pub result: String,
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    params: Value,
}

impl ClientMessage {
    pub fn parse(text: &str) -> Result<Self> {
        let envelope: Envelope =
            serde_json::from_str(text).map_err(|e| ProxyError::InvalidMessageFormat {
                message: e.to_string(),
                raw_data: Some(text.chars().take(256).collect()),
            })?;

        let params = envelope.params;

        let message = match envelope.kind.as_str() {
            "auth" => Self::Auth {
                site_key: string_param(&params, "site_key"),
                user: string_param(&params, "user"),
            },
            "submit" => {
                let share = serde_json::from_value::<ShareSubmission>(params).map_err(|e| {
                    ProxyError::Protocol {
                        message: format!("Invalid submit parameters: {}", e),
                        method: Some("submit".to_string()),
                        request_id: None,
                    }
                })?;

                Self::Submit(share)
            }
            "hashrate" => Self::Hashrate {
                rate: params.get("rate").and_then(Value::as_f64).unwrap_or(0.0),
            },
            "ping" => Self::Ping,
            other => Self::Unknown(other.to_owned()),
        };

        Ok(message)
    }

    pub fn message_type(&self) -> &str {
        match self {
            Self::Auth { .. } => "auth",
            Self::Submit(_) => "submit",
            Self::Hashrate { .. } => "hashrate",
            Self::Ping => "ping",
            Self::Unknown(kind) => kind,
        }
    }
}

fn string_param(params: &Value, key: &str) -> Option<String> {
    params.get(key).and_then(Value::as_str).map(str::to_owned)
}

/// Messages sent to browser miners
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "params", rename_all = "snake_case")]
pub enum ProxyMessage {
    Authed { hashes: u64 },
    Job(Job),
    HashAccepted { hashes: u64 },
    Error { error: String },
    Pong,
}

impl ProxyMessage {
    pub fn authed() -> Self {
        Self::Authed { hashes: 0 }
    }

    pub fn hash_accepted() -> Self {
        Self::HashAccepted { hashes: 1 }
    }

    pub fn error(error: impl Into<String>) -> Self {
        Self::Error {
            error: error.into(),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::method::Method;

/// Request id used for the login handshake
pub const LOGIN_REQUEST_ID: u64 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub id: Option<u64>,
    pub method: Method,
    pub params: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoginParams {
    pub login: String,
    pub pass: String,
    pub agent: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmitParams {
    /// Pool session id returned by login
    pub id: String,
    pub job_id: String,
    pub nonce: String,
    pub result: String,
}

impl Request {
    pub fn login(params: &LoginParams) -> Self {
        Self {
            id: Some(LOGIN_REQUEST_ID),
            method: Method::Login,
            params: serde_json::to_value(params).ok(),
        }
    }

    pub fn submit(id: u64, params: &SubmitParams) -> Self {
        Self {
            id: Some(id),
            method: Method::Submit,
            params: serde_json::to_value(params).ok(),
        }
    }

    /// Serialize as a single newline-terminated line
    pub fn to_line(&self) -> crate::error::Result<String> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }
}

use serde_json::Value;

use crate::error::{ProxyError, Result};
use crate::job::Job;
use crate::protocol::types::{Method, Response};

/// A pool line classified by the parser
#[derive(Debug, Clone, PartialEq)]
pub enum PoolMessage {
    /// Response carrying a job, sent for the login request
    LoginResult {
        id: u64,
        session_id: Option<String>,
        job: Job,
    },
    /// Pool-pushed job notification
    Job(Job),
    /// Response with `{"status": "OK"}`
    Accepted { id: u64 },
    /// Response with a non-null `error`
    Rejected { id: u64, message: String },
}

#[derive(Debug, Default, Clone)]
pub struct PoolParser;

impl PoolParser {
    pub fn new() -> Self {
        Self
    }

    /// Parse one line from the pool.
    ///
    /// Returns `Ok(None)` for well-formed lines the proxy has no use for
    /// (keepalive acks, unknown notifications).
    pub fn parse_line(&self, line: &str) -> Result<Option<PoolMessage>> {
        let line = line.trim();

        if line.is_empty() {
            return Ok(None);
        }

        let response: Response =
            serde_json::from_str(line).map_err(|e| ProxyError::InvalidMessageFormat {
                message: e.to_string(),
                raw_data: Some(line.chars().take(256).collect()),
            })?;

        if let Some(method) = response.method.clone() {
            return match Method::from(method) {
                Method::Job => self.handle_job(response).map(Some),
                _ => Ok(None),
            };
        }

        let Some(id) = response.request_id() else {
            return Ok(None);
        };

        if let Some(message) = response.error_message() {
            return Ok(Some(PoolMessage::Rejected { id, message }));
        }

        let Some(result) = response.result else {
            return Ok(None);
        };

        if let Some(job) = result.get("job") {
            let job = self.parse_job(job.clone(), "login")?;
            let session_id = result.get("id").and_then(Value::as_str).map(str::to_owned);

            return Ok(Some(PoolMessage::LoginResult {
                id,
                session_id,
                job,
            }));
        }

        if result.get("status").and_then(Value::as_str) == Some("OK") {
            return Ok(Some(PoolMessage::Accepted { id }));
        }

        Ok(None)
    }

    fn handle_job(&self, response: Response) -> Result<PoolMessage> {
        let params = response.params.ok_or_else(|| ProxyError::Protocol {
            message: "Job notification without params".to_string(),
            method: Some("job".to_string()),
            request_id: None,
        })?;

        Ok(PoolMessage::Job(self.parse_job(params, "job")?))
    }

    fn parse_job(&self, value: Value, method: &str) -> Result<Job> {
        let job: Job = serde_json::from_value(value).map_err(|e| ProxyError::Protocol {
            message: format!("Invalid job parameters: {}", e),
            method: Some(method.to_string()),
            request_id: None,
        })?;

        job.validate()?;

        Ok(job)
    }
}

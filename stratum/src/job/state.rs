use serde::{Deserialize, Serialize};

use crate::error::{ProxyError, Result};

/// Unit of work issued by the pool.
///
/// Jobs are never mutated; a newer job with a different `job_id` supersedes
/// the current one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub job_id: String,
    /// Hex-encoded work template
    pub blob: String,
    /// Hex-encoded difficulty threshold
    pub target: String,
}

impl Job {
    pub fn new(job_id: impl Into<String>, blob: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            blob: blob.into(),
            target: target.into(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.job_id.trim().is_empty() {
            return Err(ProxyError::InvalidJobParameters {
                message: "empty job_id".to_string(),
            });
        }

        if hex::decode(&self.blob).is_err() {
            return Err(ProxyError::InvalidJobParameters {
                message: format!("job {} has a non-hex blob", self.job_id),
            });
        }

        if hex::decode(&self.target).is_err() {
            return Err(ProxyError::InvalidJobParameters {
                message: format!("job {} has a non-hex target", self.job_id),
            });
        }

        Ok(())
    }
}

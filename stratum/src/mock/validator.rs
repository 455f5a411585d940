use std::collections::HashSet;

use anyhow::{Result, anyhow};
use tokio::sync::RwLock;

use super::config::MockConfig;

#[derive(Debug, Clone, PartialEq)]
pub struct ShareSubmission {
    pub session_id: String,
    pub job_id: String,
    pub nonce: String,
    pub result: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShareStats {
    pub accepted: u64,
    pub rejected: u64,
    pub stale: u64,
    pub duplicate: u64,
}

pub struct MockShareValidator {
    submitted_shares: RwLock<HashSet<String>>,
    stats: RwLock<ShareStats>,
}

impl MockShareValidator {
    pub fn new() -> Self {
        Self {
            submitted_shares: RwLock::new(HashSet::new()),
            stats: RwLock::new(ShareStats::default()),
        }
    }

    /// Shares for superseded jobs are still accepted; only jobs that fell
    /// out of history are refused.
    pub async fn validate_share(
        &self,
        submission: &ShareSubmission,
        known_job: bool,
        is_stale: bool,
        config: &MockConfig,
    ) -> Result<()> {
        let share_id = format!(
            "{}:{}:{}",
            submission.job_id, submission.nonce, submission.result
        );

        let mut submitted = self.submitted_shares.write().await;
        let mut stats = self.stats.write().await;

        if !known_job {
            stats.rejected += 1;
            return Err(anyhow!("Block expired"));
        }

        if submitted.contains(&share_id) {
            stats.duplicate += 1;
            return Err(anyhow!("Duplicate share"));
        }

        if !validate_format(submission) {
            stats.rejected += 1;
            return Err(anyhow!("Invalid share format"));
        }

        if !config.should_accept_share() {
            stats.rejected += 1;
            return Err(anyhow!("Low difficulty share"));
        }

        if is_stale {
            stats.stale += 1;
        }

        submitted.insert(share_id);
        stats.accepted += 1;

        Ok(())
    }

    pub async fn get_stats(&self) -> ShareStats {
        self.stats.read().await.clone()
    }
}

fn validate_format(submission: &ShareSubmission) -> bool {
    submission.nonce.len() == 8
        && is_hex(&submission.nonce)
        && !submission.result.is_empty()
        && submission.result.len() % 2 == 0
        && is_hex(&submission.result)
}

fn is_hex(s: &str) -> bool {
    s.chars().all(|c| c.is_ascii_hexdigit())
}

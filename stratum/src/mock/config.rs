use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MockConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    /// Probability that a well-formed share on a known job is accepted
    #[serde(default = "default_accept_rate")]
    pub accept_rate: f64,

    /// Seconds between pushed jobs; 0 disables rotation
    #[serde(default = "default_job_interval")]
    pub job_interval_secs: u64,

    #[serde(default = "default_latency_ms")]
    pub latency_ms: u64,

    /// Superseded jobs still accepted for submission
    #[serde(default = "default_job_history")]
    pub job_history: usize,

    #[serde(default = "default_target")]
    pub target: String,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            accept_rate: default_accept_rate(),
            job_interval_secs: default_job_interval(),
            latency_ms: default_latency_ms(),
            job_history: default_job_history(),
            target: default_target(),
        }
    }
}

impl MockConfig {
    pub fn job_interval(&self) -> Option<Duration> {
        (self.job_interval_secs > 0).then(|| Duration::from_secs(self.job_interval_secs))
    }

    pub fn latency(&self) -> Duration {
        Duration::from_millis(self.latency_ms)
    }

    pub fn should_accept_share(&self) -> bool {
        use rand::Rng;
        let mut rng = rand::thread_rng();
        rng.gen_bool(self.accept_rate.clamp(0.0, 1.0))
    }
}

fn default_port() -> u16 {
    13333
}

fn default_accept_rate() -> f64 {
    0.95
}

fn default_job_interval() -> u64 {
    30
}

fn default_latency_ms() -> u64 {
    0
}

fn default_job_history() -> usize {
    10
}

fn default_target() -> String {
    "b88d0600".to_string()
}

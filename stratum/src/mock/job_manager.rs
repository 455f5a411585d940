use std::collections::VecDeque;

use rand::RngCore;
use serde_json::{Value, json};
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq)]
pub struct MockJob {
    pub job_id: String,
    pub blob: String,
    pub target: String,
}

impl MockJob {
    pub fn new(target: &str) -> Self {
        Self {
            job_id: Uuid::new_v4().simple().to_string()[..8].to_string(),
            blob: generate_random_hex(152),
            target: target.to_string(),
        }
    }

    pub fn to_params(&self) -> Value {
        json!({
            "job_id": self.job_id,
            "blob": self.blob,
            "target": self.target,
        })
    }
}

struct JobState {
    current: MockJob,
    history: VecDeque<MockJob>,
}

pub struct MockJobManager {
    state: RwLock<JobState>,
    max_history: usize,
    target: String,
}

impl MockJobManager {
    pub fn new(target: &str, max_history: usize) -> Self {
        Self {
            state: RwLock::new(JobState {
                current: MockJob::new(target),
                history: VecDeque::new(),
            }),
            max_history,
            target: target.to_string(),
        }
    }

    pub async fn rotate_job(&self) -> MockJob {
        let new_job = MockJob::new(&self.target);
        let mut state = self.state.write().await;

        let old_job = std::mem::replace(&mut state.current, new_job.clone());
        state.history.push_back(old_job);

        while state.history.len() > self.max_history {
            state.history.pop_front();
        }

        new_job
    }

    pub async fn get_current_job(&self) -> MockJob {
        self.state.read().await.current.clone()
    }

    pub async fn is_valid_job(&self, job_id: &str) -> bool {
        let state = self.state.read().await;

        state.current.job_id == job_id || state.history.iter().any(|job| job.job_id == job_id)
    }

    pub async fn is_stale_job(&self, job_id: &str) -> bool {
        let state = self.state.read().await;

        state.current.job_id != job_id && state.history.iter().any(|job| job.job_id == job_id)
    }
}

fn generate_random_hex(len: usize) -> String {
    let mut rng = rand::thread_rng();
    let mut bytes = vec![0u8; len / 2];
    rng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

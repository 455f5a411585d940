use std::sync::Arc;

use indexmap::IndexMap;

use crate::job::Job;

/// Current job plus a bounded, insertion-ordered history of superseded jobs.
///
/// The most recently inserted job is always the last entry, so eviction of
/// the oldest entry never removes it.
#[derive(Debug, Clone)]
pub struct JobCache {
    capacity: usize,
    jobs: IndexMap<String, Arc<Job>>,
}

impl JobCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);

        Self {
            capacity,
            jobs: IndexMap::with_capacity(capacity + 1),
        }
    }

    /// Insert `job` as the current job, evicting the oldest entries beyond
    /// the bound. Re-inserting a known `job_id` replaces it and makes it
    /// current again.
    pub fn set_current(&mut self, job: Job) -> Arc<Job> {
        let job = Arc::new(job);

        self.jobs.shift_remove(&job.job_id);
        self.jobs.insert(job.job_id.clone(), job.clone());

        while self.jobs.len() > self.capacity {
            if let Some((evicted, _)) = self.jobs.shift_remove_index(0) {
                tracing::debug!("job {} evicted from recent history", evicted);
            }
        }

        metrics::gauge!("job_history_size").set(self.jobs.len() as f64);

        job
    }

    pub fn get(&self, job_id: &str) -> Option<Arc<Job>> {
        self.jobs.get(job_id).cloned()
    }

    pub fn current(&self) -> Option<Arc<Job>> {
        self.jobs.last().map(|(_, job)| job.clone())
    }

    pub fn is_current(&self, job_id: &str) -> bool {
        self.jobs
            .last()
            .is_some_and(|(current, _)| current == job_id)
    }

    pub fn contains(&self, job_id: &str) -> bool {
        self.jobs.contains_key(job_id)
    }

    pub fn clear(&mut self) {
        self.jobs.clear();
        metrics::gauge!("job_history_size").set(0.0);
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

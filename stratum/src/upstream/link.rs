use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::config::PoolConfig;
use crate::error::{ProxyError, Result};
use crate::job::{Job, JobCache};
use crate::protocol::types::{LOGIN_REQUEST_ID, LoginParams, Request, SubmitParams};
use crate::protocol::{PoolMessage, ShareSubmission};
use crate::stats::GlobalStats;
use crate::upstream::{ConnectRequest, UpstreamState};

/// Session id used in submits when the pool did not return one on login
const FALLBACK_SESSION_ID: &str = "1";

/// What the router should tell downstream clients after a pool message
#[derive(Debug, Clone, PartialEq)]
pub enum LinkEvent {
    /// Login answered with a job; clients get `authed` followed by the job
    Authenticated(Arc<Job>),
    JobReceived(Arc<Job>),
    ShareAccepted { request_id: u64 },
    ShareRejected { request_id: u64, message: String },
}

/// A share written to the pool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submitted {
    pub request_id: u64,
    /// The job had already been superseded by a newer one
    pub stale: bool,
}

/// The single logical session with the pool.
///
/// Owns the pool-side login state, the recent-job history, and the map of
/// in-flight submit ids. Socket I/O lives in [`crate::upstream::connection`];
/// this type only reacts to the events that task produces, so every state
/// transition happens on the router task.
#[derive(Debug)]
pub struct UpstreamLink {
    config: PoolConfig,
    state: UpstreamState,
    generation: u64,
    writer: Option<mpsc::UnboundedSender<String>>,
    session_id: Option<String>,
    next_request_id: u64,
    pending: HashMap<u64, String>,
    jobs: JobCache,
    stats: Arc<GlobalStats>,
}

impl UpstreamLink {
    pub fn new(config: PoolConfig, recent_jobs: usize, stats: Arc<GlobalStats>) -> Self {
        Self {
            config,
            state: UpstreamState::Disconnected,
            generation: 0,
            writer: None,
            session_id: None,
            next_request_id: LOGIN_REQUEST_ID + 1,
            pending: HashMap::new(),
            jobs: JobCache::new(recent_jobs),
            stats,
        }
    }

    pub fn state(&self) -> UpstreamState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state.is_connected()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.is_authenticated()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    pub fn jobs(&self) -> &JobCache {
        &self.jobs
    }

    pub fn current_job(&self) -> Option<Arc<Job>> {
        self.jobs.current()
    }

    pub fn pending_submits(&self) -> usize {
        self.pending.len()
    }

    /// Start a new connection attempt.
    ///
    /// Returns `None` while a connection is open or being opened, so
    /// concurrent callers never create a second socket.
    pub fn connect(&mut self) -> Option<ConnectRequest> {
        if self.state != UpstreamState::Disconnected {
            tracing::debug!("[pool] connect ignored, link is {}", self.state);
            return None;
        }

        self.generation += 1;
        self.state = UpstreamState::Connecting;

        tracing::info!(
            "[pool] connecting to {} (attempt {})",
            self.config.address(),
            self.generation
        );

        Some(ConnectRequest {
            generation: self.generation,
            address: self.config.address(),
        })
    }

    /// Socket opened: send the login request.
    pub fn on_connected(
        &mut self,
        generation: u64,
        writer: mpsc::UnboundedSender<String>,
    ) -> Result<()> {
        if !self.is_live(generation) {
            return Ok(());
        }

        self.state = UpstreamState::Connected;
        self.session_id = None;
        self.pending.clear();
        self.jobs.clear();
        self.writer = Some(writer);

        let login = Request::login(&LoginParams {
            login: self.config.wallet.clone(),
            pass: self.config.login_password().to_string(),
            agent: self.config.agent.clone(),
        });

        tracing::info!(
            "[pool] logging in as {} ({})",
            self.config.abbreviated_wallet(),
            self.config.worker_name
        );

        self.write(login.to_line()?)
    }

    /// Apply a pool message, returning what clients should be told.
    pub fn on_message(&mut self, generation: u64, message: PoolMessage) -> Option<LinkEvent> {
        if !self.is_live(generation) {
            return None;
        }

        match message {
            PoolMessage::LoginResult {
                id,
                session_id,
                job,
            } => {
                if id != LOGIN_REQUEST_ID || self.is_authenticated() {
                    tracing::debug!("[pool] job carried by response {}", id);
                    return Some(LinkEvent::JobReceived(self.set_job(job)));
                }

                self.state = UpstreamState::Authenticated;
                self.session_id = session_id;

                let job = self.set_job(job);
                tracing::info!("[pool] authenticated, first job {}", job.job_id);
                metrics::counter!("pool_login_success_total").increment(1);

                Some(LinkEvent::Authenticated(job))
            }
            PoolMessage::Job(job) => {
                let job = self.set_job(job);
                tracing::info!("[pool] new job {}", job.job_id);

                Some(LinkEvent::JobReceived(job))
            }
            PoolMessage::Accepted { id } if id == LOGIN_REQUEST_ID && !self.is_authenticated() => {
                tracing::warn!("[pool] login acknowledged without a job, waiting for one");
                None
            }
            PoolMessage::Accepted { id } => {
                let job_id = self.pending.remove(&id);
                self.stats.record_accepted();

                tracing::info!(
                    "[pool] share {} accepted (job {})",
                    id,
                    job_id.as_deref().unwrap_or("?")
                );

                Some(LinkEvent::ShareAccepted { request_id: id })
            }
            PoolMessage::Rejected { id, message }
                if id == LOGIN_REQUEST_ID && !self.is_authenticated() =>
            {
                tracing::error!("[pool] login failed: {}", message);
                metrics::counter!("pool_login_failed_total").increment(1);
                None
            }
            PoolMessage::Rejected { id, message } => {
                let job_id = self.pending.remove(&id);
                self.stats.record_rejected();

                tracing::warn!(
                    "[pool] share {} rejected (job {}): {}",
                    id,
                    job_id.as_deref().unwrap_or("?"),
                    message
                );

                Some(LinkEvent::ShareRejected {
                    request_id: id,
                    message,
                })
            }
        }
    }

    /// Connection lost. Returns `true` when the event belonged to the live
    /// connection and a reconnect should be scheduled.
    pub fn on_disconnected(&mut self, generation: u64, reason: &str) -> bool {
        if !self.is_live(generation) {
            return false;
        }

        tracing::warn!("[pool] disconnected: {}", reason);
        metrics::counter!("network_disconnected_total").increment(1);

        self.state = UpstreamState::Disconnected;
        self.writer = None;
        self.session_id = None;
        self.pending.clear();
        self.jobs.clear();

        true
    }

    /// Forward a share to the pool.
    ///
    /// Shares are accepted for any job still in the recent history, not
    /// only the current one.
    pub fn submit(&mut self, share: &ShareSubmission) -> Result<Submitted> {
        match self.state {
            UpstreamState::Disconnected | UpstreamState::Connecting => {
                return Err(ProxyError::UpstreamNotConnected);
            }
            UpstreamState::Connected => return Err(ProxyError::UpstreamNotAuthenticated),
            UpstreamState::Authenticated => {}
        }

        if !self.jobs.contains(&share.job_id) {
            return Err(ProxyError::JobNotFound {
                job_id: share.job_id.clone(),
            });
        }

        let stale = !self.jobs.is_current(&share.job_id);
        let request_id = self.next_request_id;

        let request = Request::submit(
            request_id,
            &SubmitParams {
                id: self
                    .session_id
                    .clone()
                    .unwrap_or_else(|| FALLBACK_SESSION_ID.to_string()),
                job_id: share.job_id.clone(),
                nonce: share.nonce.clone(),
                result: share.result.clone(),
            },
        );

        self.write(request.to_line()?)?;

        self.next_request_id += 1;
        self.pending.insert(request_id, share.job_id.clone());
        self.stats.record_submitted();

        Ok(Submitted { request_id, stale })
    }

    fn set_job(&mut self, job: Job) -> Arc<Job> {
        self.jobs.set_current(job)
    }

    fn is_live(&self, generation: u64) -> bool {
        if generation != self.generation {
            tracing::debug!(
                "[pool] ignoring event from stale connection {} (current {})",
                generation,
                self.generation
            );
            return false;
        }

        true
    }

    fn write(&mut self, line: String) -> Result<()> {
        let writer = self.writer.as_ref().ok_or(ProxyError::UpstreamNotConnected)?;

        writer.send(line).map_err(|_| ProxyError::UpstreamClosed)
    }
}

use anyhow::Result;
use serde_json::Value;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{RwLock, broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep};
use tracing::{debug, error, info};
use uuid::Uuid;

use super::config::MockConfig;
use super::job_manager::{MockJob, MockJobManager};
use super::responses::MockResponses;
use super::validator::{MockShareValidator, ShareSubmission};

#[derive(Clone)]
struct ClientSession {
    id: String,
    login: Option<String>,
    /// Lines pushed outside the request/response flow
    push_tx: mpsc::UnboundedSender<String>,
}

/// A share as received by the mock pool
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedShare {
    pub request_id: Option<u64>,
    pub submission: ShareSubmission,
    pub accepted: bool,
}

/// In-process pool speaking the login/submit/job JSON-RPC dialect
pub struct MockPool {
    config: MockConfig,
    job_manager: MockJobManager,
    validator: MockShareValidator,
    sessions: RwLock<HashMap<String, ClientSession>>,
    submissions: RwLock<Vec<RecordedShare>>,
    logins: AtomicU64,
    kick_tx: broadcast::Sender<()>,
    shutdown_tx: broadcast::Sender<()>,
}

impl MockPool {
    pub fn new(config: MockConfig) -> Self {
        let (kick_tx, _) = broadcast::channel(1);
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            job_manager: MockJobManager::new(&config.target, config.job_history),
            validator: MockShareValidator::new(),
            sessions: RwLock::new(HashMap::new()),
            submissions: RwLock::new(Vec::new()),
            logins: AtomicU64::new(0),
            kick_tx,
            shutdown_tx,
            config,
        }
    }

    pub async fn start(self, addr: &str) -> Result<MockPoolHandle> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        info!("Mock pool listening on {}", local_addr);

        let pool = Arc::new(self);
        let accept_handle = tokio::spawn(Self::accept_loop(Arc::clone(&pool), listener));
        let job_rotation_handle = tokio::spawn(Self::job_rotation_loop(Arc::clone(&pool)));

        Ok(MockPoolHandle {
            pool,
            accept_handle,
            job_rotation_handle,
            local_addr,
        })
    }

    async fn accept_loop(pool: Arc<Self>, listener: TcpListener) {
        let mut shutdown_rx = pool.shutdown_tx.subscribe();

        loop {
            tokio::select! {
                accept_result = listener.accept() => {
                    match accept_result {
                        Ok((stream, addr)) => {
                            let pool = Arc::clone(&pool);
                            tokio::spawn(async move {
                                if let Err(e) = pool.handle_client(stream, addr).await {
                                    error!("Client handler error: {}", e);
                                }
                            });
                        }
                        Err(e) => {
                            error!("Accept error: {}", e);
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Mock pool accept loop shutting down");
                    break;
                }
            }
        }
    }

    async fn job_rotation_loop(pool: Arc<Self>) {
        let Some(period) = pool.config.job_interval() else {
            return;
        };

        let mut interval = interval_at(tokio::time::Instant::now() + period, period);
        let mut shutdown_rx = pool.shutdown_tx.subscribe();

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    pool.broadcast_new_job().await;
                }
                _ = shutdown_rx.recv() => {
                    info!("Job rotation loop shutting down");
                    break;
                }
            }
        }
    }

    async fn handle_client(&self, stream: TcpStream, addr: SocketAddr) -> Result<()> {
        info!("New connection from {}", addr);

        let session_id = Uuid::new_v4().to_string();
        let (push_tx, mut push_rx) = mpsc::unbounded_channel();

        self.sessions.write().await.insert(
            session_id.clone(),
            ClientSession {
                id: session_id.clone(),
                login: None,
                push_tx,
            },
        );

        let (reader, mut writer) = stream.into_split();
        let mut reader = BufReader::new(reader);
        let mut line = String::new();

        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let mut kick_rx = self.kick_tx.subscribe();

        loop {
            tokio::select! {
                read_result = reader.read_line(&mut line) => {
                    match read_result {
                        Ok(0) => {
                            info!("Client {} disconnected", addr);
                            break;
                        }
                        Ok(_) => {
                            if let Err(e) = self.handle_message(&session_id, &line, &mut writer).await {
                                error!("Message handling error: {}", e);
                            }
                            line.clear();
                        }
                        Err(e) => {
                            error!("Read error from {}: {}", addr, e);
                            break;
                        }
                    }
                }
                Some(push) = push_rx.recv() => {
                    if let Err(e) = writer.write_all(push.as_bytes()).await {
                        error!("Push to {} failed: {}", addr, e);
                        break;
                    }
                }
                _ = kick_rx.recv() => {
                    info!("Dropping client {}", addr);
                    break;
                }
                _ = shutdown_rx.recv() => {
                    info!("Client handler for {} shutting down", addr);
                    break;
                }
            }
        }

        self.sessions.write().await.remove(&session_id);

        Ok(())
    }

    async fn handle_message(
        &self,
        session_id: &str,
        message: &str,
        writer: &mut OwnedWriteHalf,
    ) -> Result<()> {
        let msg: Value = serde_json::from_str(message)?;

        if self.config.latency_ms > 0 {
            sleep(self.config.latency()).await;
        }

        let method = msg["method"].as_str().unwrap_or("");
        let id = msg["id"].as_u64();
        let params = &msg["params"];

        debug!("Received method: {} with params: {:?}", method, params);

        let response = match method {
            "login" => self.handle_login(session_id, params, id.unwrap_or(0)).await,
            "submit" => self.handle_submit(session_id, params, id).await,
            "keepalived" => MockResponses::keepalived_response(id.unwrap_or(0)),
            _ => MockResponses::unknown_method_response(id, method),
        };

        send_line(writer, &response).await
    }

    async fn handle_login(&self, session_id: &str, params: &Value, id: u64) -> Value {
        let login = params["login"].as_str().unwrap_or("").to_string();

        if login.is_empty() {
            return MockResponses::error_response(Some(id), "Missing login", -1);
        }

        if let Some(session) = self.sessions.write().await.get_mut(session_id) {
            session.login = Some(login);
        }

        self.logins.fetch_add(1, Ordering::Relaxed);

        let job = self.job_manager.get_current_job().await;
        MockResponses::login_response(id, session_id, job.to_params())
    }

    async fn handle_submit(&self, session_id: &str, params: &Value, id: Option<u64>) -> Value {
        let authorized = self
            .sessions
            .read()
            .await
            .get(session_id)
            .is_some_and(|session| session.login.is_some());

        let submission = ShareSubmission {
            session_id: params["id"].as_str().unwrap_or("").to_string(),
            job_id: params["job_id"].as_str().unwrap_or("").to_string(),
            nonce: params["nonce"].as_str().unwrap_or("").to_string(),
            result: params["result"].as_str().unwrap_or("").to_string(),
        };

        let outcome = if !authorized || submission.session_id != session_id {
            Err(anyhow::anyhow!("Unauthenticated"))
        } else {
            let known = self.job_manager.is_valid_job(&submission.job_id).await;
            let stale = self.job_manager.is_stale_job(&submission.job_id).await;

            self.validator
                .validate_share(&submission, known, stale, &self.config)
                .await
        };

        self.submissions.write().await.push(RecordedShare {
            request_id: id,
            submission,
            accepted: outcome.is_ok(),
        });

        match outcome {
            Ok(()) => MockResponses::submit_ok(id.unwrap_or(0)),
            Err(e) => MockResponses::error_response(id, &e.to_string(), -1),
        }
    }

    async fn broadcast_new_job(&self) -> MockJob {
        let job = self.job_manager.rotate_job().await;
        let mut line = MockResponses::job_notification(job.to_params()).to_string();
        line.push('\n');

        let sessions = self.sessions.read().await;
        for session in sessions.values().filter(|session| session.login.is_some()) {
            debug!("Pushing job {} to session {}", job.job_id, session.id);
            let _ = session.push_tx.send(line.clone());
        }

        job
    }
}

async fn send_line(writer: &mut OwnedWriteHalf, response: &Value) -> Result<()> {
    let mut response_str = response.to_string();
    response_str.push('\n');
    writer.write_all(response_str.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}

pub struct MockPoolHandle {
    pool: Arc<MockPool>,
    accept_handle: JoinHandle<()>,
    job_rotation_handle: JoinHandle<()>,
    pub local_addr: SocketAddr,
}

impl MockPoolHandle {
    /// Rotate to a fresh job and push it to every logged-in connection
    pub async fn push_job(&self) -> MockJob {
        self.pool.broadcast_new_job().await
    }

    pub async fn current_job(&self) -> MockJob {
        self.pool.job_manager.get_current_job().await
    }

    /// Close every open connection; the listener keeps accepting
    pub fn disconnect_all(&self) {
        let _ = self.pool.kick_tx.send(());
    }

    pub async fn submissions(&self) -> Vec<RecordedShare> {
        self.pool.submissions.read().await.clone()
    }

    pub fn logins(&self) -> u64 {
        self.pool.logins.load(Ordering::Relaxed)
    }

    pub async fn connections(&self) -> usize {
        self.pool.sessions.read().await.len()
    }

    pub async fn shutdown(self) -> Result<()> {
        let _ = self.pool.shutdown_tx.send(());
        self.accept_handle.await?;
        self.job_rotation_handle.await?;
        Ok(())
    }
}

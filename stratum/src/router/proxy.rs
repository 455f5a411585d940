use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::client::{ClientId, ClientRegistry, OutboundSender};
use crate::config::Config;
use crate::error::ProxyError;
use crate::network::DisconnectReason;
use crate::protocol::{ClientMessage, ProxyMessage, ShareSubmission};
use crate::router::{RouterCommand, RouterHandle};
use crate::stats::{
    GlobalStats, MinerSnapshot, MinersSnapshot, MiningSnapshot, PoolSnapshot, ProxySnapshot,
};
use crate::sweeper;
use crate::upstream::{
    Connector, LinkEvent, TcpConnector, UpstreamEvent, UpstreamEventSender, UpstreamLink,
};

/// Owner of the pool session and the client table.
///
/// Every mutation of either happens on the task running [`ProxyRouter::run`];
/// WebSocket tasks, the sweeper and the HTTP handlers reach it through a
/// [`RouterHandle`].
pub struct ProxyRouter {
    config: Arc<Config>,
    link: UpstreamLink,
    clients: ClientRegistry,
    stats: Arc<GlobalStats>,
    connector: Box<dyn Connector>,
    upstream: UpstreamEventSender,
}

impl ProxyRouter {
    pub fn new(
        config: Arc<Config>,
        stats: Arc<GlobalStats>,
        connector: Box<dyn Connector>,
        upstream: UpstreamEventSender,
    ) -> Self {
        let link = UpstreamLink::new(
            config.pool.clone(),
            config.limiter.recent_jobs,
            stats.clone(),
        );

        Self {
            config,
            link,
            clients: ClientRegistry::new(),
            stats,
            connector,
            upstream,
        }
    }

    /// Start the router on a TCP pool connection
    pub fn spawn(config: Arc<Config>, stats: Arc<GlobalStats>) -> (RouterHandle, JoinHandle<()>) {
        Self::spawn_with(config, stats, Box::new(TcpConnector))
    }

    pub fn spawn_with(
        config: Arc<Config>,
        stats: Arc<GlobalStats>,
        connector: Box<dyn Connector>,
    ) -> (RouterHandle, JoinHandle<()>) {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (upstream_tx, upstream_rx) = mpsc::unbounded_channel();

        let router = Self::new(config, stats, connector, upstream_tx);
        let task = tokio::spawn(router.run(command_rx, upstream_rx));

        (RouterHandle::new(command_tx), task)
    }

    /// Process commands and pool events until every handle is dropped
    pub async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<RouterCommand>,
        mut upstream: mpsc::UnboundedReceiver<UpstreamEvent>,
    ) {
        self.connect_upstream();

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => self.handle_command(command, Instant::now()),
                    None => break,
                },
                Some(event) = upstream.recv() => self.handle_upstream(event),
            }
        }

        tracing::info!("router stopped with {} clients", self.clients.len());
    }

    pub fn link(&self) -> &UpstreamLink {
        &self.link
    }

    pub fn clients(&self) -> &ClientRegistry {
        &self.clients
    }

    pub fn handle_command(&mut self, command: RouterCommand, now: Instant) {
        match command {
            RouterCommand::Connect {
                remote_addr,
                sender,
                reply,
            } => {
                let id = self.on_client_connected(remote_addr, sender);

                if reply.send(id).is_err() {
                    tracing::debug!("[{}] connection task gone before registration", id);
                }
            }
            RouterCommand::Message { id, message } => self.on_client_message(id, message, now),
            RouterCommand::Activity { id } => {
                if let Some(session) = self.clients.get_mut(id) {
                    session.touch(now);
                }
            }
            RouterCommand::Disconnect { id, reason } => self.on_client_disconnected(id, reason),
            RouterCommand::Sweep => {
                sweeper::sweep(
                    &mut self.clients,
                    now,
                    self.config.limiter.inactivity_timeout(),
                );
                metrics::gauge!("active_clients").set(self.clients.len() as f64);
            }
            RouterCommand::Snapshot { reply } => {
                let _ = reply.send(self.snapshot());
            }
        }
    }

    pub fn handle_upstream(&mut self, event: UpstreamEvent) {
        match event {
            UpstreamEvent::Connected { generation, writer } => {
                if let Err(e) = self.link.on_connected(generation, writer) {
                    tracing::error!("[pool] failed to send login: {}", e);
                }
            }
            UpstreamEvent::Message {
                generation,
                message,
            } => {
                if let Some(event) = self.link.on_message(generation, message) {
                    self.on_link_event(event);
                }
            }
            UpstreamEvent::Disconnected { generation, reason } => {
                if self.link.on_disconnected(generation, &reason) {
                    self.schedule_reconnect();
                }
            }
            UpstreamEvent::ReconnectDue => self.connect_upstream(),
        }
    }

    fn on_client_connected(&mut self, remote_addr: String, sender: OutboundSender) -> ClientId {
        let id = self.clients.register(remote_addr, sender);

        self.stats.record_connection();
        metrics::gauge!("active_clients").set(self.clients.len() as f64);

        if let Some(session) = self.clients.get(id) {
            tracing::info!(
                "[{}] connected from {} ({} active)",
                id,
                session.remote_addr(),
                self.clients.len()
            );
        }

        if !self.link.is_connected() {
            self.connect_upstream();
        }

        self.send_work(id);

        id
    }

    fn on_client_message(&mut self, id: ClientId, message: ClientMessage, now: Instant) {
        let Some(session) = self.clients.get_mut(id) else {
            tracing::debug!("[{}] message after removal ignored", id);
            return;
        };

        session.touch(now);

        match message {
            ClientMessage::Auth { .. } => self.send_work(id),
            ClientMessage::Submit(share) => self.on_submit(id, share),
            ClientMessage::Hashrate { rate } => session.set_hashrate(rate),
            ClientMessage::Ping => {
                session.send(ProxyMessage::Pong);
            }
            ClientMessage::Unknown(kind) => {
                tracing::debug!("[{}] ignoring message type {}", id, kind);
            }
        }
    }

    fn on_submit(&mut self, id: ClientId, share: ShareSubmission) {
        let result = self.link.submit(&share);

        self.stats.record_hash_attempt();

        let Some(session) = self.clients.get_mut(id) else {
            return;
        };

        let credited = session.credit_share();

        match result {
            Ok(submitted) => tracing::debug!(
                "[{}] share {} for job {} forwarded as {}{} ({} credited)",
                id,
                share.nonce,
                share.job_id,
                submitted.request_id,
                if submitted.stale { ", stale" } else { "" },
                credited
            ),
            Err(ProxyError::JobNotFound { job_id }) => {
                tracing::warn!("[{}] share for unknown job {} dropped", id, job_id);
                metrics::counter!("shares_unknown_job_total").increment(1);
                session.send(ProxyMessage::error(format!("Unknown job: {}", job_id)));
            }
            Err(e) => {
                tracing::warn!("[{}] share for job {} not forwarded: {}", id, share.job_id, e);
            }
        }
    }

    fn on_client_disconnected(&mut self, id: ClientId, reason: DisconnectReason) {
        if let Some(session) = self.clients.remove(id) {
            tracing::info!(
                "[{}] disconnected: {} after {} shares ({} active)",
                id,
                reason,
                session.share_count(),
                self.clients.len()
            );
            metrics::gauge!("active_clients").set(self.clients.len() as f64);
        }
    }

    fn on_link_event(&mut self, event: LinkEvent) {
        match event {
            LinkEvent::Authenticated(job) => {
                self.broadcast(ProxyMessage::authed());
                self.broadcast(ProxyMessage::Job(job.as_ref().clone()));
            }
            LinkEvent::JobReceived(job) => {
                metrics::counter!("jobs_notified_total").increment(1);
                self.broadcast(ProxyMessage::Job(job.as_ref().clone()));
            }
            LinkEvent::ShareAccepted { .. } => self.broadcast(ProxyMessage::hash_accepted()),
            LinkEvent::ShareRejected { message, .. } => {
                self.broadcast(ProxyMessage::error(message))
            }
        }
    }

    /// Send `authed` and the current job to one client, if there is work
    fn send_work(&mut self, id: ClientId) {
        if !self.link.is_authenticated() {
            return;
        }

        let Some(job) = self.link.current_job() else {
            return;
        };

        if let Some(session) = self.clients.get_mut(id) {
            session.send(ProxyMessage::authed());
            session.send(ProxyMessage::Job(job.as_ref().clone()));
        }
    }

    fn broadcast(&mut self, message: ProxyMessage) {
        let delivered = self.clients.broadcast(&message);

        tracing::debug!(
            "broadcast {:?} to {}/{} clients",
            message,
            delivered,
            self.clients.len()
        );
    }

    fn connect_upstream(&mut self) {
        if let Some(request) = self.link.connect() {
            self.connector.connect(request, self.upstream.clone());
        }
    }

    fn schedule_reconnect(&self) {
        let delay = self.config.limiter.reconnect_delay();
        let upstream = self.upstream.clone();

        tracing::info!("[pool] reconnecting in {:?}", delay);

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = upstream.send(UpstreamEvent::ReconnectDue);
        });
    }

    pub fn snapshot(&self) -> ProxySnapshot {
        let pool = self.link.config();

        ProxySnapshot {
            uptime: self.stats.uptime().as_secs(),
            pool: PoolSnapshot {
                host: pool.address(),
                connected: self.link.is_connected(),
                authenticated: self.link.is_authenticated(),
                wallet: pool.abbreviated_wallet(),
                worker: pool.worker_name.clone(),
                current_job: self.link.current_job().map(|job| job.job_id.clone()),
            },
            mining: MiningSnapshot {
                combined_hashrate: self.clients.combined_hashrate(),
                total_hashes: self.stats.total_hashes(),
                total_shares: self.stats.shares_submitted(),
                accepted_shares: self.stats.accepted_shares(),
                rejected_shares: self.stats.rejected_shares(),
            },
            miners: MinersSnapshot {
                active: self.clients.len(),
                total_connections: self.stats.total_connections(),
                list: self
                    .clients
                    .iter()
                    .map(|session| MinerSnapshot {
                        id: session.id().as_u64(),
                        ip: session.remote_addr().to_string(),
                        hashrate: session.hashrate(),
                        hashes: session.share_count(),
                        connected: session.connected_unix_ms(),
                    })
                    .collect(),
            },
        }
    }
}

use std::fmt;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::protocol::ProxyMessage;

/// Identifier assigned to a miner when its WebSocket is accepted
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ClientId(u64);

impl ClientId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "miner #{}", self.0)
    }
}

/// Frames queued for a client's WebSocket writer
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Message(ProxyMessage),
    /// Protocol-level ping frame
    Probe,
    /// Close the socket
    Close,
}

pub type OutboundSender = mpsc::UnboundedSender<Outbound>;

#[derive(Debug)]
pub struct ClientSession {
    id: ClientId,
    remote_addr: String,
    sender: OutboundSender,
    hashrate: f64,
    share_count: u64,
    connected_at: Instant,
    connected_unix_ms: u64,
    last_activity: Instant,
    alive: bool,
    failed_sends: u64,
}

impl ClientSession {
    pub fn new(id: ClientId, remote_addr: impl Into<String>, sender: OutboundSender) -> Self {
        let now = Instant::now();

        Self {
            id,
            remote_addr: remote_addr.into(),
            sender,
            hashrate: 0.0,
            share_count: 0,
            connected_at: now,
            connected_unix_ms: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_millis() as u64)
                .unwrap_or_default(),
            last_activity: now,
            alive: true,
            failed_sends: 0,
        }
    }

    pub fn id(&self) -> ClientId {
        self.id
    }

    pub fn remote_addr(&self) -> &str {
        &self.remote_addr
    }

    pub fn hashrate(&self) -> f64 {
        self.hashrate
    }

    /// Store the self-reported hashrate. Advisory only.
    pub fn set_hashrate(&mut self, rate: f64) {
        self.hashrate = rate;
    }

    pub fn share_count(&self) -> u64 {
        self.share_count
    }

    /// Credit a submission attempt, whatever the pool later decides
    pub fn credit_share(&mut self) -> u64 {
        self.share_count += 1;
        self.share_count
    }

    pub fn connected_at(&self) -> Instant {
        self.connected_at
    }

    pub fn connected_unix_ms(&self) -> u64 {
        self.connected_unix_ms
    }

    pub fn last_activity(&self) -> Instant {
        self.last_activity
    }

    pub fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_activity)
    }

    /// Record inbound traffic; clears the pending-probe mark
    pub fn touch(&mut self, now: Instant) {
        self.last_activity = now;
        self.alive = true;
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }

    /// Transport still accepts frames
    pub fn is_open(&self) -> bool {
        !self.sender.is_closed()
    }

    pub fn failed_sends(&self) -> u64 {
        self.failed_sends
    }

    pub fn send(&mut self, message: ProxyMessage) -> bool {
        self.push(Outbound::Message(message))
    }

    /// Mark not-alive and send a ping frame; the next pong or message
    /// restores the mark.
    pub fn probe(&mut self) -> bool {
        self.alive = false;
        self.push(Outbound::Probe)
    }

    pub fn close(&mut self) {
        let _ = self.sender.send(Outbound::Close);
    }

    fn push(&mut self, outbound: Outbound) -> bool {
        if self.sender.send(outbound).is_err() {
            self.failed_sends += 1;
            metrics::counter!("client_send_failed_total").increment(1);
            return false;
        }

        true
    }
}

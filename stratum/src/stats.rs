use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// Process-wide counters. Never reset; only the router writes them, the
/// HTTP handlers read them.
#[derive(Debug)]
pub struct GlobalStats {
    started_at: Instant,
    total_connections: AtomicU64,
    shares_submitted: AtomicU64,
    accepted_shares: AtomicU64,
    rejected_shares: AtomicU64,
    total_hashes: AtomicU64,
}

impl Default for GlobalStats {
    fn default() -> Self {
        Self::new()
    }
}

impl GlobalStats {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            total_connections: AtomicU64::new(0),
            shares_submitted: AtomicU64::new(0),
            accepted_shares: AtomicU64::new(0),
            rejected_shares: AtomicU64::new(0),
            total_hashes: AtomicU64::new(0),
        }
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    pub fn record_connection(&self) {
        self.total_connections.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("network_connected_total").increment(1);
    }

    /// A share left the proxy for the pool
    pub fn record_submitted(&self) {
        self.shares_submitted.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("shares_submitted_total").increment(1);
    }

    pub fn record_accepted(&self) {
        self.accepted_shares.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("shares_accepted_total").increment(1);
    }

    pub fn record_rejected(&self) {
        self.rejected_shares.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("shares_rejected_total").increment(1);
    }

    /// A miner attempted a submission, forwarded or not
    pub fn record_hash_attempt(&self) {
        self.total_hashes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn total_connections(&self) -> u64 {
        self.total_connections.load(Ordering::Relaxed)
    }

    pub fn shares_submitted(&self) -> u64 {
        self.shares_submitted.load(Ordering::Relaxed)
    }

    pub fn accepted_shares(&self) -> u64 {
        self.accepted_shares.load(Ordering::Relaxed)
    }

    pub fn rejected_shares(&self) -> u64 {
        self.rejected_shares.load(Ordering::Relaxed)
    }

    pub fn total_hashes(&self) -> u64 {
        self.total_hashes.load(Ordering::Relaxed)
    }
}

/// Body of `GET /api/stats`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProxySnapshot {
    pub uptime: u64,
    pub pool: PoolSnapshot,
    pub mining: MiningSnapshot,
    pub miners: MinersSnapshot,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolSnapshot {
    pub host: String,
    pub connected: bool,
    pub authenticated: bool,
    pub wallet: String,
    pub worker: String,
    pub current_job: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MiningSnapshot {
    pub combined_hashrate: f64,
    pub total_hashes: u64,
    pub total_shares: u64,
    pub accepted_shares: u64,
    pub rejected_shares: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinersSnapshot {
    pub active: usize,
    pub total_connections: u64,
    pub list: Vec<MinerSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinerSnapshot {
    pub id: u64,
    pub ip: String,
    pub hashrate: f64,
    pub hashes: u64,
    /// Unix time in milliseconds
    pub connected: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_are_independent() {
        let stats = GlobalStats::new();

        stats.record_connection();
        stats.record_connection();
        stats.record_hash_attempt();
        stats.record_hash_attempt();
        stats.record_hash_attempt();
        stats.record_submitted();
        stats.record_accepted();

        assert_eq!(stats.total_connections(), 2);
        assert_eq!(stats.total_hashes(), 3);
        assert_eq!(stats.shares_submitted(), 1);
        assert_eq!(stats.accepted_shares(), 1);
        assert_eq!(stats.rejected_shares(), 0);
    }
}

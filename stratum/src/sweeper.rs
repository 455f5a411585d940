use std::fmt;
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;

use crate::client::{ClientId, ClientRegistry};
use crate::router::RouterHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictionReason {
    TransportClosed,
    /// The previous probe went unanswered
    PingTimeout,
    Inactive,
}

impl fmt::Display for EvictionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TransportClosed => write!(f, "transport closed"),
            Self::PingTimeout => write!(f, "ping timeout"),
            Self::Inactive => write!(f, "inactive"),
        }
    }
}

/// One liveness pass over the registry.
///
/// Sessions are evicted when their transport is gone, when the probe sent
/// by the previous pass was not answered, or when nothing arrived for
/// longer than `inactivity`. Survivors are marked not-alive and probed.
pub fn sweep(
    clients: &mut ClientRegistry,
    now: Instant,
    inactivity: Duration,
) -> Vec<(ClientId, EvictionReason)> {
    let evictions: Vec<(ClientId, EvictionReason)> = clients
        .iter()
        .filter_map(|session| {
            let reason = if !session.is_open() {
                EvictionReason::TransportClosed
            } else if !session.is_alive() {
                EvictionReason::PingTimeout
            } else if session.idle_for(now) > inactivity {
                EvictionReason::Inactive
            } else {
                return None;
            };

            Some((session.id(), reason))
        })
        .collect();

    for (id, reason) in &evictions {
        if let Some(mut session) = clients.remove(*id) {
            session.close();
            tracing::info!(
                "[{}] evicted ({}), idle for {:#.1?}",
                id,
                reason,
                session.idle_for(now)
            );
        }
    }

    clients.for_each(|session| {
        session.probe();
    });

    if !evictions.is_empty() {
        metrics::counter!("clients_evicted_total").increment(evictions.len() as u64);
    }

    evictions
}

/// Drives [`sweep`] on a fixed period through the router
#[derive(Debug, Clone)]
pub struct LivenessSweeper {
    interval: Duration,
    router: RouterHandle,
}

impl LivenessSweeper {
    pub fn new(interval: Duration, router: RouterHandle) -> Self {
        Self { interval, router }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker =
                tokio::time::interval_at(tokio::time::Instant::now() + self.interval, self.interval);

            loop {
                ticker.tick().await;

                if self.router.sweep().is_err() {
                    tracing::debug!("router stopped, liveness sweeper exiting");
                    break;
                }
            }
        })
    }
}

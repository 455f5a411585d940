//! # poolbridge
//!
//! A WebSocket to Stratum pool proxy. Many browser miners connect over
//! WebSocket; the proxy holds one logged-in TCP session with the pool,
//! fans every job out to all miners and relays their shares upstream as
//! a single combined worker.
//!
//! ## Architecture
//!
//! - **Upstream**: the pool connection, login state and recent-job history
//! - **Router**: one task owning the pool session and the client table;
//!   everything else talks to it over a command channel
//! - **Network**: per-miner WebSocket sessions and the HTTP endpoints
//! - **Sweeper**: periodic liveness probing and eviction of dead miners
//! - **Configuration**: TOML file with environment and CLI overrides
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use poolbridge::{Config, Listener};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load(None)?;
//!     config.validate()?;
//!
//!     let listener = Listener::new(Arc::new(config)).await?;
//!     listener.accept().await?;
//!
//!     Ok(())
//! }
//! ```

/// Core configuration management
pub mod config;

/// Error types for the proxy
pub mod error;

/// WebSocket session handling
pub mod network;

/// Downstream WebSocket messages and upstream JSON-RPC
pub mod protocol;

/// Command-line interface
pub mod cli;

/// Connected miner sessions
pub mod client;

/// Mining jobs and the recent-job history
pub mod job;

/// Shared pool session
pub mod upstream;

/// Central coordinator between pool and miners
pub mod router;

/// Process-wide counters and the stats snapshot
pub mod stats;

/// Liveness probing of miner connections
pub mod sweeper;

/// Mock pool for tests and local runs
pub mod mock;

/// HTTP and WebSocket listener
pub(crate) mod listener;

pub use config::Config;

pub use error::{ConfigError, ProxyError, Result};

/// Listener accepting miner WebSockets and serving the HTTP endpoints.
pub use listener::Listener;

pub use router::{ProxyRouter, RouterHandle};

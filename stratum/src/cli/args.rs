use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "poolbridge",
    version,
    about = "WebSocket to Stratum pool proxy",
    long_about = "Aggregates many browser miners behind a single pool login: jobs are \
                 fanned out over WebSocket and shares are relayed to one upstream session."
)]
pub struct Args {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the proxy server
    Start {
        /// Listen address (overrides config file and PORT)
        #[arg(short, long)]
        bind: Option<SocketAddr>,

        /// Upstream pool as host:port (overrides config file and env)
        #[arg(short, long)]
        pool: Option<String>,

        /// Wallet address used for the pool login
        #[arg(short, long)]
        wallet: Option<String>,

        /// Worker name reported to the pool
        #[arg(long)]
        worker: Option<String>,
    },

    /// Validate configuration file
    Config {
        /// Configuration file to validate
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Show effective configuration
        #[arg(long)]
        show: bool,
    },

    /// Generate example configuration file
    Init {
        /// Output file path
        #[arg(short, long, default_value = "poolbridge.toml")]
        output: PathBuf,

        /// Overwrite existing file
        #[arg(long)]
        force: bool,
    },

    /// Start a mock mining pool for testing
    MockPool {
        /// Bind address for the mock pool
        #[arg(short, long, default_value = "127.0.0.1:13333")]
        bind: String,

        /// Share acceptance rate (0.0-1.0)
        #[arg(long, default_value = "0.95")]
        accept_rate: f64,

        /// Job rotation interval in seconds, 0 to disable
        #[arg(long, default_value = "30")]
        job_interval: u64,

        /// Simulated response latency in milliseconds
        #[arg(long, default_value = "0")]
        latency: u64,
    },
}

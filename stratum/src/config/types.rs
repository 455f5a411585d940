use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use crate::error::ConfigError;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub pool: PoolConfig,
    pub limiter: LimiterConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address for the WebSocket and HTTP endpoints (default: 0.0.0.0:8892)
    pub bind_address: SocketAddr,
    /// Interval between WebSocket keep-alive pings sent to each client, in seconds
    pub keepalive_interval_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Pool host name or IP
    pub host: String,
    /// Pool TCP port
    pub port: u16,
    /// Wallet address sent as the login credential
    pub wallet: String,
    /// Name of the combined worker as seen by the pool
    pub worker_name: String,
    /// Explicit login password, the worker name is used when absent
    pub password: Option<String>,
    /// Agent string sent on login
    pub agent: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimiterConfig {
    /// Number of recent jobs accepted for submission (default 10)
    pub recent_jobs: usize,
    /// Liveness sweep period in seconds (default 15)
    pub sweep_interval_secs: u64,
    /// Clients silent for longer than this are evicted, in seconds (default 60)
    pub inactivity_timeout_secs: u64,
    /// Delay before reconnecting to the pool, in seconds (default 5)
    pub reconnect_delay_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([0, 0, 0, 0], 8892)),
            keepalive_interval_secs: 20,
        }
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            host: "gulf.moneroocean.stream".to_string(),
            port: 10128,
            wallet: String::new(),
            worker_name: "CombinedWebMiners".to_string(),
            password: None,
            agent: format!("poolbridge/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            recent_jobs: 10,
            sweep_interval_secs: 15,
            inactivity_timeout_secs: 60,
            reconnect_delay_secs: 5,
        }
    }
}

impl ServerConfig {
    pub fn keepalive_interval(&self) -> Duration {
        Duration::from_secs(self.keepalive_interval_secs)
    }
}

impl PoolConfig {
    /// Pool address in host:port format
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Password sent on login
    pub fn login_password(&self) -> &str {
        self.password.as_deref().unwrap_or(&self.worker_name)
    }

    /// Wallet shortened to its first and last 8 characters for reporting
    pub fn abbreviated_wallet(&self) -> String {
        let chars: Vec<char> = self.wallet.chars().collect();

        if chars.len() <= 16 {
            return self.wallet.clone();
        }

        let head: String = chars[..8].iter().collect();
        let tail: String = chars[chars.len() - 8..].iter().collect();

        format!("{}...{}", head, tail)
    }
}

impl LimiterConfig {
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn inactivity_timeout(&self) -> Duration {
        Duration::from_secs(self.inactivity_timeout_secs)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_delay_secs)
    }
}

impl Config {
    /// Load configuration from file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
            path: path.display().to_string(),
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::InvalidFormat {
            message: e.to_string(),
        })
    }

    /// Load from an optional file, then apply environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::load_from_file(path)?,
            None => Self::default(),
        };

        config.apply_env()?;

        Ok(config)
    }

    /// Render the configuration as TOML
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::InvalidFormat {
            message: e.to_string(),
        })
    }
}

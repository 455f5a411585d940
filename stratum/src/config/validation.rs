use std::time::Duration;

use crate::config::types::Config;
use crate::error::ConfigError;

impl Config {
    /// Port 0 on the bind address is allowed and picks an ephemeral port.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.keepalive_interval_secs == 0 {
            return Err(ConfigError::InvalidDuration {
                field: "server.keepalive_interval_secs".to_string(),
                duration: self.server.keepalive_interval(),
            });
        }

        if self.pool.host.trim().is_empty() {
            return Err(ConfigError::MissingField {
                field: "pool.host".to_string(),
            });
        }

        if self.pool.port == 0 {
            return Err(ConfigError::InvalidPort {
                port: self.pool.port,
            });
        }

        if self.pool.wallet.trim().is_empty() {
            return Err(ConfigError::MissingField {
                field: "pool.wallet".to_string(),
            });
        }

        if self.pool.worker_name.trim().is_empty() {
            return Err(ConfigError::MissingField {
                field: "pool.worker_name".to_string(),
            });
        }

        if self.limiter.recent_jobs == 0 {
            return Err(ConfigError::InvalidJobHistory {
                limit: self.limiter.recent_jobs,
            });
        }

        for (field, duration) in [
            ("limiter.sweep_interval_secs", self.limiter.sweep_interval()),
            (
                "limiter.inactivity_timeout_secs",
                self.limiter.inactivity_timeout(),
            ),
            (
                "limiter.reconnect_delay_secs",
                self.limiter.reconnect_delay(),
            ),
        ] {
            if duration == Duration::ZERO {
                return Err(ConfigError::InvalidDuration {
                    field: field.to_string(),
                    duration,
                });
            }
        }

        Ok(())
    }

    /// Apply overrides from the process environment
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides using `lookup` to resolve variables.
    ///
    /// Recognized variables: `PORT`, `POOL_HOST`, `POOL_PORT`, `WALLET`,
    /// `WORKER_NAME`, `POOL_PASSWORD`.
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup("PORT") {
            let port = parse_port("PORT", &port)?;
            self.server.bind_address.set_port(port);
        }

        if let Some(host) = lookup("POOL_HOST") {
            self.pool.host = host;
        }

        if let Some(port) = lookup("POOL_PORT") {
            self.pool.port = parse_port("POOL_PORT", &port)?;
        }

        if let Some(wallet) = lookup("WALLET") {
            self.pool.wallet = wallet;
        }

        if let Some(worker) = lookup("WORKER_NAME") {
            self.pool.worker_name = worker;
        }

        if let Some(password) = lookup("POOL_PASSWORD") {
            self.pool.password = Some(password);
        }

        Ok(())
    }
}

fn parse_port(variable: &str, value: &str) -> Result<u16, ConfigError> {
    value
        .trim()
        .parse::<u16>()
        .map_err(|e| ConfigError::EnvironmentVariable {
            variable: variable.to_string(),
            message: e.to_string(),
        })
}

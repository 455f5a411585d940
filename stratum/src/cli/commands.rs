use anyhow::{Context, Result, bail};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};

use crate::cli::{Args, Commands};
use crate::config::Config;
use crate::mock::{MockConfig, MockPool};

pub async fn execute(args: Args) -> Result<()> {
    setup_logging(&args)?;

    match args.command {
        Commands::Start {
            bind,
            pool,
            wallet,
            worker,
        } => {
            let overrides = StartOverrides {
                bind,
                pool,
                wallet,
                worker,
            };
            start_server(args.config.as_deref(), overrides).await
        }
        Commands::Config { file, show } => validate_config(file, show).await,
        Commands::Init { output, force } => init_config(output, force).await,
        Commands::MockPool {
            bind,
            accept_rate,
            job_interval,
            latency,
        } => run_mock_pool(bind, accept_rate, job_interval, latency).await,
    }
}

/// Command-line values that win over the file and the environment
#[derive(Debug, Default)]
pub struct StartOverrides {
    pub bind: Option<SocketAddr>,
    pub pool: Option<String>,
    pub wallet: Option<String>,
    pub worker: Option<String>,
}

impl StartOverrides {
    pub fn apply(self, config: &mut Config) -> Result<()> {
        if let Some(bind) = self.bind {
            config.server.bind_address = bind;
        }

        if let Some(pool) = self.pool {
            let (host, port) = pool
                .rsplit_once(':')
                .with_context(|| format!("pool address {} is not host:port", pool))?;

            config.pool.host = host.to_string();
            config.pool.port = port
                .parse()
                .with_context(|| format!("invalid pool port in {}", pool))?;
        }

        if let Some(wallet) = self.wallet {
            config.pool.wallet = wallet;
        }

        if let Some(worker) = self.worker {
            config.pool.worker_name = worker;
        }

        Ok(())
    }
}

async fn start_server(config_path: Option<&Path>, overrides: StartOverrides) -> Result<()> {
    info!("Starting poolbridge");

    let mut config = Config::load(config_path)?;
    overrides.apply(&mut config)?;

    config.validate()?;
    info!("Configuration validated successfully");

    let listener = crate::Listener::new(Arc::new(config)).await?;

    let shutdown = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for shutdown signal: {}", e);
            return;
        }
        info!("Received shutdown signal");
    };

    listener.accept_until(shutdown).await?;

    info!("Server shutdown completed");

    Ok(())
}

async fn validate_config(file: PathBuf, show: bool) -> Result<()> {
    info!("Validating configuration file: {}", file.display());

    let config = Config::load(Some(&file))?;
    config.validate()?;

    info!("Configuration is valid");

    if show {
        println!("Effective configuration:");
        println!("{}", config.to_toml()?);
    }

    Ok(())
}

async fn init_config(output: PathBuf, force: bool) -> Result<()> {
    if output.exists() && !force {
        bail!(
            "{} already exists, use --force to overwrite",
            output.display()
        );
    }

    let mut config = Config::default();
    config.pool.wallet = "YOUR_WALLET_ADDRESS".to_string();

    tokio::fs::write(&output, config.to_toml()?)
        .await
        .with_context(|| format!("failed to write {}", output.display()))?;

    info!("Example configuration written to {}", output.display());

    Ok(())
}

async fn run_mock_pool(bind: String, accept_rate: f64, job_interval: u64, latency: u64) -> Result<()> {
    let config = MockConfig {
        accept_rate,
        job_interval_secs: job_interval,
        latency_ms: latency,
        ..MockConfig::default()
    };

    let handle = MockPool::new(config).start(&bind).await?;
    info!("Mock pool running on {}", handle.local_addr);

    signal::ctrl_c().await?;
    info!("Received shutdown signal");

    handle.shutdown().await
}

fn setup_logging(args: &Args) -> Result<()> {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let log_level = match args.verbose {
        0 => &args.log_level,
        1 => "debug",
        _ => "trace",
    };

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    // JSON when requested or when the deployment says production
    let use_json_format = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or_else(|_| {
            std::env::var("ENVIRONMENT")
                .or_else(|_| std::env::var("ENV"))
                .map(|v| matches!(v.to_lowercase().as_str(), "production" | "prod"))
                .unwrap_or(false)
        });

    if use_json_format {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(true)
                    .with_target(true)
                    .with_line_number(true)
                    .with_file(true)
                    .with_thread_ids(true)
                    .flatten_event(false),
            )
            .try_init()?;

        info!("Structured JSON logging initialized");
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_line_number(true)
                    .with_file(false)
                    .compact(),
            )
            .try_init()?;

        info!("Human-readable logging initialized");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_override_splits_host_and_port() {
        let mut config = Config::default();

        StartOverrides {
            pool: Some("pool.example.org:3333".to_string()),
            worker: Some("rig".to_string()),
            ..StartOverrides::default()
        }
        .apply(&mut config)
        .unwrap();

        assert_eq!(config.pool.host, "pool.example.org");
        assert_eq!(config.pool.port, 3333);
        assert_eq!(config.pool.worker_name, "rig");
    }

    #[test]
    fn test_pool_override_without_port_fails() {
        let mut config = Config::default();

        let result = StartOverrides {
            pool: Some("pool.example.org".to_string()),
            ..StartOverrides::default()
        }
        .apply(&mut config);

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_init_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("poolbridge.toml");

        init_config(path.clone(), false).await.unwrap();
        let written = Config::load_from_file(&path).unwrap();
        assert_eq!(written.pool.wallet, "YOUR_WALLET_ADDRESS");
        assert_eq!(written.limiter.recent_jobs, 10);

        assert!(init_config(path.clone(), false).await.is_err());
        assert!(init_config(path, true).await.is_ok());
    }
}

use std::time::Duration;
use thiserror::Error;

/// Error types for the pool proxy
#[derive(Error, Debug)]
pub enum ProxyError {
    // Network-related errors
    #[error("Network error: {message}")]
    Network {
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("Connection error: {message}")]
    Connection {
        message: String,
        remote_addr: Option<std::net::SocketAddr>,
    },

    #[error("Failed to bind listener on {address}: {message}")]
    Bind { address: String, message: String },

    // Upstream pool session errors
    #[error("Pool is not connected")]
    UpstreamNotConnected,

    #[error("Pool session is not authenticated")]
    UpstreamNotAuthenticated,

    #[error("Pool closed the connection")]
    UpstreamClosed,

    // Protocol-related errors
    #[error("Protocol error: {message}")]
    Protocol {
        message: String,
        method: Option<String>,
        request_id: Option<u64>,
    },

    #[error("Invalid message format: {message}")]
    InvalidMessageFormat {
        message: String,
        raw_data: Option<String>,
    },

    #[error("Message too large: {size} bytes (max: {max_size} bytes)")]
    MessageTooLarge { size: usize, max_size: usize },

    // Job-related errors
    #[error("Job not found: {job_id}")]
    JobNotFound { job_id: String },

    #[error("Invalid job parameters: {message}")]
    InvalidJobParameters { message: String },

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("JSON parsing error: {message}")]
    JsonParsing { message: String },

    #[error("Router is not running")]
    RouterUnavailable,

    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Configuration-specific errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Invalid port: {port} (must be between 1 and 65535)")]
    InvalidPort { port: u16 },

    #[error("Invalid job history bound: {limit} (must be > 0)")]
    InvalidJobHistory { limit: usize },

    #[error("Invalid duration: {field} = {duration:?} (must be > 0)")]
    InvalidDuration { field: String, duration: Duration },

    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid configuration format: {message}")]
    InvalidFormat { message: String },

    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },

    #[error("Environment variable error: {variable} - {message}")]
    EnvironmentVariable { variable: String, message: String },
}

impl ProxyError {
    /// Create a network error from std::io::Error
    pub fn from_io_error(err: std::io::Error) -> Self {
        ProxyError::Network {
            message: err.to_string(),
            source: Some(err),
        }
    }

    /// Create a JSON parsing error
    pub fn from_json_error(err: serde_json::Error) -> Self {
        ProxyError::JsonParsing {
            message: err.to_string(),
        }
    }

    /// Transient failures are retried by reconnecting; everything else is
    /// reported and dropped.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ProxyError::Network { .. }
                | ProxyError::Connection { .. }
                | ProxyError::UpstreamNotConnected
                | ProxyError::UpstreamClosed
        )
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            ProxyError::Bind { .. } | ProxyError::Config(_) => ErrorSeverity::Critical,

            ProxyError::RouterUnavailable | ProxyError::Internal { .. } => ErrorSeverity::High,

            ProxyError::Network { .. }
            | ProxyError::Connection { .. }
            | ProxyError::UpstreamClosed
            | ProxyError::MessageTooLarge { .. } => ErrorSeverity::Medium,

            _ => ErrorSeverity::Low,
        }
    }
}

impl From<serde_json::Error> for ProxyError {
    fn from(err: serde_json::Error) -> Self {
        Self::from_json_error(err)
    }
}

impl From<std::io::Error> for ProxyError {
    fn from(err: std::io::Error) -> Self {
        Self::from_io_error(err)
    }
}

/// Error severity levels for logging
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low = 0,
    Medium = 1,
    High = 2,
    Critical = 3,
}

impl std::fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorSeverity::Low => write!(f, "LOW"),
            ErrorSeverity::Medium => write!(f, "MEDIUM"),
            ErrorSeverity::High => write!(f, "HIGH"),
            ErrorSeverity::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// Result type alias for the proxy
pub type Result<T> = std::result::Result<T, ProxyError>;

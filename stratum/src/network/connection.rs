use serde::{Deserialize, Serialize};

/// Reasons a client WebSocket session ended
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DisconnectReason {
    /// Client closed the socket
    ClientDisconnect,
    /// Router dropped the session or shut down
    ServerShutdown,
    /// Removed by the liveness sweeper
    Evicted,
    /// Outbound frame could not be encoded
    ProtocolError { message: String },
    NetworkError { error: String },
}

impl std::fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ClientDisconnect => write!(f, "client disconnect"),
            Self::ServerShutdown => write!(f, "server shutdown"),
            Self::Evicted => write!(f, "evicted"),
            Self::ProtocolError { message } => write!(f, "protocol error: {}", message),
            Self::NetworkError { error } => write!(f, "network error: {}", error),
        }
    }
}

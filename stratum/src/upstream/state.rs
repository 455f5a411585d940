use std::fmt;

/// Lifecycle of the shared pool session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UpstreamState {
    #[default]
    Disconnected,
    Connecting,
    /// Socket open, login sent but not answered with a job
    Connected,
    Authenticated,
}

impl UpstreamState {
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected | Self::Authenticated)
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated)
    }
}

impl fmt::Display for UpstreamState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connecting => write!(f, "connecting"),
            Self::Connected => write!(f, "connected"),
            Self::Authenticated => write!(f, "authenticated"),
        }
    }
}

use tokio::sync::oneshot;

use crate::client::{ClientId, OutboundSender};
use crate::network::DisconnectReason;
use crate::protocol::ClientMessage;
use crate::stats::ProxySnapshot;

/// Requests processed by the router task, in arrival order
#[derive(Debug)]
pub enum RouterCommand {
    /// A WebSocket was accepted
    Connect {
        remote_addr: String,
        sender: OutboundSender,
        reply: oneshot::Sender<ClientId>,
    },
    /// A decoded client message
    Message { id: ClientId, message: ClientMessage },
    /// Ping or pong frame from the client
    Activity { id: ClientId },
    Disconnect {
        id: ClientId,
        reason: DisconnectReason,
    },
    /// Periodic liveness sweep
    Sweep,
    Snapshot {
        reply: oneshot::Sender<ProxySnapshot>,
    },
}

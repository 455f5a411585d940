use tokio::sync::{mpsc, oneshot};

use crate::client::{ClientId, OutboundSender};
use crate::error::{ProxyError, Result};
use crate::network::DisconnectReason;
use crate::protocol::ClientMessage;
use crate::router::RouterCommand;
use crate::stats::ProxySnapshot;

/// Cloneable entry point to the router task
#[derive(Debug, Clone)]
pub struct RouterHandle {
    commands: mpsc::UnboundedSender<RouterCommand>,
}

impl RouterHandle {
    pub fn new(commands: mpsc::UnboundedSender<RouterCommand>) -> Self {
        Self { commands }
    }

    /// Register a client; resolves once the router has assigned its id
    pub async fn connect(&self, remote_addr: String, sender: OutboundSender) -> Result<ClientId> {
        let (reply, rx) = oneshot::channel();

        self.send(RouterCommand::Connect {
            remote_addr,
            sender,
            reply,
        })?;

        rx.await.map_err(|_| ProxyError::RouterUnavailable)
    }

    pub fn message(&self, id: ClientId, message: ClientMessage) -> Result<()> {
        self.send(RouterCommand::Message { id, message })
    }

    pub fn activity(&self, id: ClientId) -> Result<()> {
        self.send(RouterCommand::Activity { id })
    }

    pub fn disconnect(&self, id: ClientId, reason: DisconnectReason) -> Result<()> {
        self.send(RouterCommand::Disconnect { id, reason })
    }

    pub fn sweep(&self) -> Result<()> {
        self.send(RouterCommand::Sweep)
    }

    pub async fn snapshot(&self) -> Result<ProxySnapshot> {
        let (reply, rx) = oneshot::channel();

        self.send(RouterCommand::Snapshot { reply })?;

        rx.await.map_err(|_| ProxyError::RouterUnavailable)
    }

    fn send(&self, command: RouterCommand) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| ProxyError::RouterUnavailable)
    }
}

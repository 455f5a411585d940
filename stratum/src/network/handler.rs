use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use crate::client::{ClientId, Outbound};
use crate::network::DisconnectReason;
use crate::protocol::ClientMessage;
use crate::router::RouterHandle;

/// Drives one miner's WebSocket.
///
/// Inbound frames are decoded and handed to the router; outbound frames
/// queued by the router are written along with a keep-alive ping every
/// `keepalive`. Whichever half finishes first ends the session.
#[derive(Debug, Clone)]
pub struct WebSocketHandler {
    router: RouterHandle,
    keepalive: Duration,
}

impl WebSocketHandler {
    pub fn new(router: RouterHandle, keepalive: Duration) -> Self {
        Self { router, keepalive }
    }

    pub async fn run(self, socket: WebSocket, remote_addr: String) {
        let (tx, rx) = mpsc::unbounded_channel();

        let id = match self.router.connect(remote_addr.clone(), tx).await {
            Ok(id) => id,
            Err(e) => {
                tracing::error!("miner {} - failed to register: {}", remote_addr, e);
                return;
            }
        };

        let (sink, stream) = socket.split();

        let reason = tokio::select! {
            reason = self.read_loop(id, stream) => reason,
            reason = self.write_loop(id, sink, rx) => reason,
        };

        tracing::debug!("[{}] session ended: {}", id, reason);

        let _ = self.router.disconnect(id, reason);
    }

    async fn read_loop(&self, id: ClientId, mut stream: SplitStream<WebSocket>) -> DisconnectReason {
        while let Some(frame) = stream.next().await {
            let frame = match frame {
                Ok(frame) => frame,
                Err(e) => {
                    return DisconnectReason::NetworkError {
                        error: e.to_string(),
                    };
                }
            };

            let text = match &frame {
                Message::Text(text) => text.as_str(),
                Message::Binary(data) => match std::str::from_utf8(data) {
                    Ok(text) => text,
                    Err(_) => {
                        tracing::warn!("[{}] non UTF-8 binary frame dropped", id);
                        continue;
                    }
                },
                Message::Ping(_) | Message::Pong(_) => {
                    if self.router.activity(id).is_err() {
                        return DisconnectReason::ServerShutdown;
                    }
                    continue;
                }
                Message::Close(_) => return DisconnectReason::ClientDisconnect,
            };

            metrics::counter!("client_messages_received_total").increment(1);

            match ClientMessage::parse(text) {
                Ok(message) => {
                    tracing::trace!("[{}] <- {}", id, message.message_type());

                    if self.router.message(id, message).is_err() {
                        return DisconnectReason::ServerShutdown;
                    }
                }
                Err(e) => {
                    tracing::warn!("[{}] invalid message dropped: {}", id, e);
                    metrics::counter!("client_messages_invalid_total").increment(1);
                }
            }
        }

        DisconnectReason::ClientDisconnect
    }

    async fn write_loop(
        &self,
        id: ClientId,
        mut sink: SplitSink<WebSocket, Message>,
        mut rx: mpsc::UnboundedReceiver<Outbound>,
    ) -> DisconnectReason {
        let mut keepalive = tokio::time::interval_at(
            tokio::time::Instant::now() + self.keepalive,
            self.keepalive,
        );

        loop {
            let frame = tokio::select! {
                outbound = rx.recv() => match outbound {
                    Some(Outbound::Message(message)) => match message.to_json() {
                        Ok(json) => Message::Text(json.into()),
                        Err(e) => {
                            return DisconnectReason::ProtocolError {
                                message: e.to_string(),
                            };
                        }
                    },
                    Some(Outbound::Probe) => Message::Ping(Default::default()),
                    Some(Outbound::Close) => {
                        let _ = sink.send(Message::Close(None)).await;
                        return DisconnectReason::Evicted;
                    }
                    None => return DisconnectReason::ServerShutdown,
                },
                _ = keepalive.tick() => Message::Ping(Default::default()),
            };

            if let Err(e) = sink.send(frame).await {
                tracing::debug!("[{}] write failed: {}", id, e);

                return DisconnectReason::NetworkError {
                    error: e.to_string(),
                };
            }
        }
    }
}

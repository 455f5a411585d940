use std::collections::BTreeMap;

use crate::client::{ClientId, ClientSession, OutboundSender};
use crate::protocol::ProxyMessage;

/// Table of connected miners keyed by id.
///
/// Ids increase monotonically, so iteration follows registration order.
#[derive(Debug, Default)]
pub struct ClientRegistry {
    next_id: u64,
    sessions: BTreeMap<ClientId, ClientSession>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create and add a session for a freshly accepted transport
    pub fn register(&mut self, remote_addr: impl Into<String>, sender: OutboundSender) -> ClientId {
        self.next_id += 1;

        let id = ClientId::new(self.next_id);
        self.add(ClientSession::new(id, remote_addr, sender));

        id
    }

    pub fn add(&mut self, session: ClientSession) {
        self.next_id = self.next_id.max(session.id().as_u64());
        self.sessions.insert(session.id(), session);
    }

    pub fn remove(&mut self, id: ClientId) -> Option<ClientSession> {
        self.sessions.remove(&id)
    }

    pub fn get(&self, id: ClientId) -> Option<&ClientSession> {
        self.sessions.get(&id)
    }

    pub fn get_mut(&mut self, id: ClientId) -> Option<&mut ClientSession> {
        self.sessions.get_mut(&id)
    }

    pub fn for_each<F>(&mut self, mut f: F)
    where
        F: FnMut(&mut ClientSession),
    {
        self.sessions.values_mut().for_each(|session| f(session));
    }

    pub fn iter(&self) -> impl Iterator<Item = &ClientSession> {
        self.sessions.values()
    }

    /// Send `message` to every open session. Failed sends are not retried.
    ///
    /// Returns the number of sessions the message was queued for.
    pub fn broadcast(&mut self, message: &ProxyMessage) -> usize {
        let mut delivered = 0;

        self.for_each(|session| {
            if session.is_open() && session.send(message.clone()) {
                delivered += 1;
            }
        });

        delivered
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Sum of advisory hashrates
    pub fn combined_hashrate(&self) -> f64 {
        self.sessions
            .values()
            .map(ClientSession::hashrate)
            .filter(|rate| rate.is_finite() && *rate > 0.0)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::Outbound;
    use tokio::sync::mpsc;

    #[test]
    fn test_ids_follow_registration_order() {
        let mut registry = ClientRegistry::new();
        let (tx, _rx) = mpsc::unbounded_channel();

        let a = registry.register("10.0.0.1", tx.clone());
        let b = registry.register("10.0.0.2", tx.clone());
        let c = registry.register("10.0.0.3", tx);

        assert!(a < b && b < c);
        assert_eq!(registry.len(), 3);

        let order: Vec<ClientId> = registry.iter().map(ClientSession::id).collect();
        assert_eq!(order, vec![a, b, c]);

        registry.remove(b);
        assert!(registry.get(b).is_none());
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_removed_id_is_never_reused() {
        let mut registry = ClientRegistry::new();
        let (tx, _rx) = mpsc::unbounded_channel();

        let a = registry.register("10.0.0.1", tx.clone());
        registry.remove(a);
        let b = registry.register("10.0.0.1", tx);

        assert_ne!(a, b);
    }

    #[test]
    fn test_broadcast_skips_closed_transports() {
        let mut registry = ClientRegistry::new();
        let (open_tx, mut open_rx) = mpsc::unbounded_channel();
        let (closed_tx, closed_rx) = mpsc::unbounded_channel();

        let open = registry.register("10.0.0.1", open_tx);
        let closed = registry.register("10.0.0.2", closed_tx);
        drop(closed_rx);

        let delivered = registry.broadcast(&ProxyMessage::hash_accepted());

        assert_eq!(delivered, 1);
        assert_eq!(
            open_rx.try_recv().unwrap(),
            Outbound::Message(ProxyMessage::hash_accepted())
        );
        assert!(registry.get(open).unwrap().is_open());
        assert!(!registry.get(closed).unwrap().is_open());
        // closed sessions stay registered until the sweeper reaps them
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_failed_send_is_counted() {
        let mut registry = ClientRegistry::new();
        let (tx, rx) = mpsc::unbounded_channel();
        let id = registry.register("10.0.0.1", tx);
        drop(rx);

        let session = registry.get_mut(id).unwrap();
        assert!(!session.send(ProxyMessage::Pong));
        assert_eq!(session.failed_sends(), 1);
    }

    #[test]
    fn test_combined_hashrate() {
        let mut registry = ClientRegistry::new();
        let (tx, _rx) = mpsc::unbounded_channel();

        let a = registry.register("10.0.0.1", tx.clone());
        let b = registry.register("10.0.0.2", tx);

        registry.get_mut(a).unwrap().set_hashrate(12.5);
        registry.get_mut(b).unwrap().set_hashrate(30.0);

        assert_eq!(registry.combined_hashrate(), 42.5);
    }
}

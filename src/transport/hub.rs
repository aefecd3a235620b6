use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;

use crate::entity::ConnectionId;
use crate::protocol::ServerEvent;
use crate::router::{Push, PushError};

/// Sender half of a connection's outbound queue. The socket's writer task
/// owns the receiving half.
pub type Outbound = mpsc::UnboundedSender<ServerEvent>;

/// Every open socket, keyed by the id handed out on connect.
#[derive(Debug, Default)]
pub struct ConnectionHub {
    connections: Mutex<HashMap<ConnectionId, Outbound>>,
}

impl ConnectionHub {
    pub fn new() -> Self {
        Self::default()
    }

    fn connections(&self) -> MutexGuard<'_, HashMap<ConnectionId, Outbound>> {
        self.connections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Allocate an id and an outbound queue for a new socket.
    pub fn open(&self) -> (ConnectionId, mpsc::UnboundedReceiver<ServerEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let connection_id = ConnectionId::generate();
        self.connections().insert(connection_id, tx);
        (connection_id, rx)
    }

    pub fn close(&self, connection_id: ConnectionId) {
        self.connections().remove(&connection_id);
    }

    pub fn len(&self) -> usize {
        self.connections().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Push for ConnectionHub {
    fn push(&self, connection_id: ConnectionId, event: ServerEvent) -> Result<(), PushError> {
        // Clone the sender out so the hub lock is not held while sending.
        let tx = self
            .connections()
            .get(&connection_id)
            .cloned()
            .ok_or(PushError::Closed(connection_id))?;

        tx.send(event).map_err(|_| PushError::Closed(connection_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn error_event() -> ServerEvent {
        ServerEvent::MessageError {
            error: "boom".into(),
        }
    }

    #[tokio::test]
    async fn push_lands_in_the_connection_queue() {
        let hub = ConnectionHub::new();
        let (id, mut rx) = hub.open();

        hub.push(id, error_event()).unwrap();

        assert!(matches!(rx.recv().await, Some(ServerEvent::MessageError { .. })));
    }

    #[test]
    fn push_after_close_fails() {
        let hub = ConnectionHub::new();
        let (id, _rx) = hub.open();
        hub.close(id);

        assert!(matches!(hub.push(id, error_event()), Err(PushError::Closed(_))));
        assert!(hub.is_empty());
    }

    #[test]
    fn push_with_dropped_receiver_fails() {
        let hub = ConnectionHub::new();
        let (id, rx) = hub.open();
        drop(rx);

        assert!(hub.push(id, error_event()).is_err());
    }
}

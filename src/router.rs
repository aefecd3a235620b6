use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info};

use crate::chat::Message;
use crate::entity::ConnectionId;
use crate::protocol::ServerEvent;
use crate::registry::ConnectionRegistry;

#[derive(Error, Debug)]
pub enum PushError {
    #[error("connection {0} is closed")]
    Closed(ConnectionId),
}

/// Non-blocking push onto one live connection, supplied by the transport.
pub trait Push: Send + Sync {
    fn push(&self, connection_id: ConnectionId, event: ServerEvent) -> Result<(), PushError>;
}

/// Forwards persisted messages to whoever of sender and receiver is online.
#[derive(Clone)]
pub struct DeliveryRouter {
    registry: Arc<ConnectionRegistry>,
    transport: Arc<dyn Push>,
}

impl DeliveryRouter {
    pub fn new(registry: Arc<ConnectionRegistry>, transport: Arc<dyn Push>) -> Self {
        Self {
            registry,
            transport,
        }
    }

    /// Push `message` to the live connections of its sender and receiver.
    ///
    /// Offline sides are skipped, a shared connection gets one push, and a
    /// failed push is dropped. Returns how many pushes went through.
    pub fn route(&self, message: &Message) -> usize {
        // Resolved under the registry lock, pushed after it is released.
        let (sender, receiver) = self
            .registry
            .lookup_pair(message.sender_id, message.receiver_id);

        let mut targets = Vec::with_capacity(2);
        targets.extend(sender);
        if let Some(receiver) = receiver {
            if sender != Some(receiver) {
                targets.push(receiver);
            }
        }

        let mut delivered = 0;
        for connection_id in targets {
            match self
                .transport
                .push(connection_id, ServerEvent::NewMessage(message.clone()))
            {
                Ok(()) => delivered += 1,
                Err(e) => {
                    debug!(message_id = message.id, error = %e, "Dropped live push");
                }
            }
        }

        info!(
            message_id = message.id,
            sender_id = %message.sender_id,
            receiver_id = %message.receiver_id,
            delivered,
            "Routed message"
        );
        delivered
    }
}

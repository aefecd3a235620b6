use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info};

use crate::entity::{ConnectionId, UserId};
use crate::registry::ConnectionRegistry;

/// Where one connection is in its life.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Open, not routable to anyone yet
    Connected,
    Registered(UserId),
    Terminated,
}

/// Per-connection view owned by the transport task driving the socket.
#[derive(Debug)]
pub struct ConnectionSession {
    id: ConnectionId,
    state: ConnectionState,
}

impl ConnectionSession {
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }
}

/// Applies connect / register / disconnect events to the registry.
#[derive(Clone)]
pub struct LifecycleHandler {
    registry: Arc<ConnectionRegistry>,
}

impl LifecycleHandler {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    /// A fresh connection. Nothing is routed to it until it registers.
    pub fn on_connect(&self, connection_id: ConnectionId) -> ConnectionSession {
        info!(connection_id = %connection_id, "Connection opened");
        ConnectionSession {
            id: connection_id,
            state: ConnectionState::Connected,
        }
    }

    /// Bind the connection to the user named by `raw_user_id`.
    ///
    /// An empty or malformed id leaves the connection as it was.
    pub fn on_register(&self, session: &mut ConnectionSession, raw_user_id: &Value) -> Option<UserId> {
        if session.state == ConnectionState::Terminated {
            return None;
        }

        let user_id = match UserId::parse(raw_user_id) {
            Ok(user_id) => user_id,
            Err(e) => {
                debug!(connection_id = %session.id, error = %e, "Ignoring register");
                return None;
            }
        };

        if let ConnectionState::Registered(previous) = session.state {
            if previous != user_id {
                debug!(connection_id = %session.id, from = %previous, to = %user_id, "Re-registering connection");
            }
        }

        self.registry.register(user_id, session.id);
        session.state = ConnectionState::Registered(user_id);
        info!(user_id = %user_id, connection_id = %session.id, "User registered");
        Some(user_id)
    }

    /// Drop whatever registry entry the connection holds. Safe to repeat.
    pub fn on_disconnect(&self, session: &mut ConnectionSession) -> Option<UserId> {
        session.state = ConnectionState::Terminated;
        let user_id = self.registry.unregister(session.id);
        info!(
            connection_id = %session.id,
            user_id = ?user_id.map(|u| u.get()),
            "Connection closed"
        );
        user_id
    }
}

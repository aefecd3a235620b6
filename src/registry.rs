//! Live mapping between users and the connection they are reachable on.
//!
//! One entry per user, last registration wins. Both directions are kept in
//! the same locked structure so a connection can never be left behind as the
//! value of two users, and a disconnect can drop its entry without a scan.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::debug;

use crate::entity::{ConnectionId, UserId};

#[derive(Debug, Default)]
struct Entries {
    by_user: HashMap<UserId, ConnectionId>,
    by_connection: HashMap<ConnectionId, UserId>,
}

#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    entries: Mutex<Entries>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    // Every critical section is a few map operations with no await inside,
    // so a poisoned lock still holds consistent maps.
    fn entries(&self) -> MutexGuard<'_, Entries> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Point `user_id` at `connection_id`, replacing whatever it pointed at.
    ///
    /// The previous connection is not closed, it just stops being routable.
    /// If `connection_id` was registered for another user, that user goes offline.
    /// Returns the connection that was displaced, if any.
    pub fn register(&self, user_id: UserId, connection_id: ConnectionId) -> Option<ConnectionId> {
        let mut entries = self.entries();

        if let Some(previous_user) = entries.by_connection.insert(connection_id, user_id) {
            if previous_user != user_id {
                entries.by_user.remove(&previous_user);
            }
        }

        let displaced = entries
            .by_user
            .insert(user_id, connection_id)
            .filter(|previous| *previous != connection_id);
        if let Some(previous) = displaced {
            entries.by_connection.remove(&previous);
        }

        debug!(
            user_id = %user_id,
            connection_id = %connection_id,
            displaced = ?displaced.map(|c| c.to_string()),
            "Registry entry written"
        );
        displaced
    }

    /// Drop the entry held by `connection_id`. Idempotent.
    pub fn unregister(&self, connection_id: ConnectionId) -> Option<UserId> {
        let mut entries = self.entries();
        let user_id = entries.by_connection.remove(&connection_id)?;

        // by_user can only point back at this connection; checked anyway so a
        // newer registration is never dropped.
        if entries.by_user.get(&user_id) == Some(&connection_id) {
            entries.by_user.remove(&user_id);
        }

        debug!(user_id = %user_id, connection_id = %connection_id, "Registry entry removed");
        Some(user_id)
    }

    pub fn lookup(&self, user_id: UserId) -> Option<ConnectionId> {
        self.entries().by_user.get(&user_id).copied()
    }

    /// Look up two users under a single acquisition of the lock.
    pub fn lookup_pair(
        &self,
        first: UserId,
        second: UserId,
    ) -> (Option<ConnectionId>, Option<ConnectionId>) {
        let entries = self.entries();
        (
            entries.by_user.get(&first).copied(),
            entries.by_user.get(&second).copied(),
        )
    }

    /// The user a connection is registered under, if any.
    #[cfg(test)]
    fn user_of(&self, connection_id: ConnectionId) -> Option<UserId> {
        self.entries().by_connection.get(&connection_id).copied()
    }

    pub fn len(&self) -> usize {
        self.entries().by_user.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Panics unless the two directions are exact inverses of each other,
    /// which is what "one connection per user and one user per connection" means.
    #[cfg(test)]
    fn assert_consistent(&self) {
        let entries = self.entries();
        assert_eq!(entries.by_user.len(), entries.by_connection.len());
        for (user, connection) in &entries.by_user {
            assert_eq!(entries.by_connection.get(connection), Some(user));
        }
    }
}

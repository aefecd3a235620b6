use std::sync::Arc;

use serde_json::Value;
use tracing::{error, info};

use crate::chat::Message;
use crate::entity::{User, UserId};
use crate::error::RelayError;
use crate::protocol::SendMessageRequest;
use crate::router::DeliveryRouter;
use crate::store::MessageStore;

/// Entry point for sends and history reads: persist first, then route.
#[derive(Clone)]
pub struct Relay {
    store: Arc<dyn MessageStore>,
    router: DeliveryRouter,
}

impl Relay {
    pub fn new(store: Arc<dyn MessageStore>, router: DeliveryRouter) -> Self {
        Self { store, router }
    }

    pub async fn send_message(&self, request: &SendMessageRequest) -> Result<Message, RelayError> {
        let content = request.content.as_str().ok_or(RelayError::InvalidContent)?;
        self.send(&request.sender_id, &request.receiver_id, content)
            .await
    }

    /// Persist a message and push it to whoever is live.
    ///
    /// Routing only starts once the store has returned the record, so a client
    /// reading history right after a push always finds the message there.
    pub async fn send(
        &self,
        sender_id: &Value,
        receiver_id: &Value,
        content: &str,
    ) -> Result<Message, RelayError> {
        let sender_id = UserId::parse(sender_id)?;
        let receiver_id = UserId::parse(receiver_id)?;

        let message = self
            .store
            .create(sender_id, receiver_id, content)
            .await
            .map_err(|e| {
                error!(sender_id = %sender_id, receiver_id = %receiver_id, error = %e, "Error creating message");
                RelayError::store("create message")(e)
            })?;

        info!(message_id = message.id, sender_id = %sender_id, receiver_id = %receiver_id, "Message stored");
        self.router.route(&message);

        Ok(message)
    }

    pub async fn history(&self, user_id: UserId) -> Result<Vec<Message>, RelayError> {
        self.store.list_for_user(user_id).await.map_err(|e| {
            error!(user_id = %user_id, error = %e, "Error fetching messages");
            RelayError::store("fetch messages")(e)
        })
    }

    pub async fn users(&self) -> Result<Vec<User>, RelayError> {
        self.store.list_users().await.map_err(|e| {
            error!(error = %e, "Error fetching users");
            RelayError::store("fetch users")(e)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::ConnectionId;
    use crate::registry::ConnectionRegistry;
    use crate::router::tests::{message, RecordingPush};
    use crate::store::StoreError;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    /// Keeps messages in memory and records each create call.
    #[derive(Default)]
    struct RecordingStore {
        creates: Mutex<Vec<(UserId, UserId, String)>>,
        messages: Mutex<Vec<Message>>,
        fail: bool,
    }

    #[async_trait]
    impl MessageStore for RecordingStore {
        async fn create(
            &self,
            sender_id: UserId,
            receiver_id: UserId,
            content: &str,
        ) -> Result<Message, StoreError> {
            if self.fail {
                return Err(StoreError::Database(sqlx::Error::PoolClosed));
            }
            self.creates
                .lock()
                .unwrap()
                .push((sender_id, receiver_id, content.to_string()));

            let mut messages = self.messages.lock().unwrap();
            let mut msg = message(sender_id.get(), receiver_id.get());
            msg.id = messages.len() as i64 + 1;
            msg.content = content.to_string();
            messages.push(msg.clone());
            Ok(msg)
        }

        async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Message>, StoreError> {
            if self.fail {
                return Err(StoreError::Database(sqlx::Error::PoolClosed));
            }
            Ok(self
                .messages
                .lock()
                .unwrap()
                .iter()
                .filter(|m| m.sender_id == user_id || m.receiver_id == user_id)
                .cloned()
                .collect())
        }

        async fn list_users(&self) -> Result<Vec<User>, StoreError> {
            Ok(Vec::new())
        }
    }

    struct Harness {
        registry: Arc<ConnectionRegistry>,
        push: Arc<RecordingPush>,
        store: Arc<RecordingStore>,
        relay: Relay,
    }

    fn harness(fail: bool) -> Harness {
        let registry = Arc::new(ConnectionRegistry::new());
        let push = Arc::new(RecordingPush::default());
        let store = Arc::new(RecordingStore {
            fail,
            ..Default::default()
        });
        let router = DeliveryRouter::new(registry.clone(), push.clone());
        let relay = Relay::new(store.clone(), router);
        Harness {
            registry,
            push,
            store,
            relay,
        }
    }

    #[tokio::test]
    async fn send_persists_then_pushes_to_both_parties() {
        let h = harness(false);
        let (a, b, other) = (
            ConnectionId::generate(),
            ConnectionId::generate(),
            ConnectionId::generate(),
        );
        h.registry.register(UserId::new(1), a);
        h.registry.register(UserId::new(2), b);
        h.registry.register(UserId::new(3), other);

        let msg = h.relay.send(&json!(1), &json!("2"), "hi").await.unwrap();

        assert_eq!(
            *h.store.creates.lock().unwrap(),
            vec![(UserId::new(1), UserId::new(2), "hi".to_string())]
        );
        let targets = h.push.targets();
        assert_eq!(targets.len(), 2);
        assert!(targets.contains(&a) && targets.contains(&b));
        assert!(!targets.contains(&other));
        assert_eq!(msg.content, "hi");
    }

    #[tokio::test]
    async fn offline_send_is_still_persisted() {
        let h = harness(false);

        h.relay.send(&json!(1), &json!(2), "hi").await.unwrap();

        assert!(h.push.targets().is_empty());
        let history = h.relay.history(UserId::new(2)).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].content, "hi");
    }

    #[tokio::test]
    async fn store_failure_is_surfaced_and_nothing_is_routed() {
        let h = harness(true);
        h.registry.register(UserId::new(1), ConnectionId::generate());

        let err = h.relay.send(&json!(1), &json!(1), "hi").await.unwrap_err();

        assert!(matches!(err, RelayError::Store { .. }));
        assert_eq!(err.to_string(), "Failed to create message");
        assert!(h.push.targets().is_empty());
    }

    #[tokio::test]
    async fn malformed_ids_never_reach_the_store() {
        let h = harness(false);

        let err = h.relay.send(&json!(""), &json!(2), "hi").await.unwrap_err();

        assert!(matches!(err, RelayError::InvalidIdentity(_)));
        assert!(h.store.creates.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn non_string_content_never_reaches_the_store() {
        let h = harness(false);
        h.registry.register(UserId::new(1), ConnectionId::generate());

        for content in [json!(5), Value::Null] {
            let request = SendMessageRequest {
                sender_id: json!(1),
                receiver_id: json!(2),
                content,
            };
            let err = h.relay.send_message(&request).await.unwrap_err();
            assert!(matches!(err, RelayError::InvalidContent));
        }

        assert!(h.store.creates.lock().unwrap().is_empty());
        assert!(h.push.targets().is_empty());
    }

    #[tokio::test]
    async fn history_failure_maps_to_fetch_error() {
        let h = harness(true);

        let err = h.relay.history(UserId::new(1)).await.unwrap_err();

        assert_eq!(err.to_string(), "Failed to fetch messages");
    }
}

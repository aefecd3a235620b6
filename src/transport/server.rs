use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Json, Path, State},
    routing::get,
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use crate::chat::Message;
use crate::entity::{User, UserId};
use crate::error::RelayError;
use crate::lifecycle::LifecycleHandler;
use crate::protocol::SendMessageRequest;
use crate::registry::ConnectionRegistry;
use crate::relay::Relay;
use crate::router::DeliveryRouter;
use crate::store::MessageStore;

use super::hub::ConnectionHub;
use super::socket::ws_handler;

// -----------------------------------------------------------------------------
// Server State
// -----------------------------------------------------------------------------

/// Process-wide state, built once at startup and handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<ConnectionRegistry>,
    pub hub: Arc<ConnectionHub>,
    pub lifecycle: LifecycleHandler,
    pub relay: Relay,
}

impl AppState {
    pub fn new(store: Arc<dyn MessageStore>) -> Self {
        let registry = Arc::new(ConnectionRegistry::new());
        let hub = Arc::new(ConnectionHub::new());
        let router = DeliveryRouter::new(registry.clone(), hub.clone());

        Self {
            lifecycle: LifecycleHandler::new(registry.clone()),
            relay: Relay::new(store, router),
            registry,
            hub,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/users", get(users_handler))
        .route("/messages", axum::routing::post(send_message_handler))
        .route("/messages/:user_id", get(history_handler))
        .route("/ws", get(ws_handler))
        .with_state(Arc::new(state))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

// -----------------------------------------------------------------------------
// Handlers
// -----------------------------------------------------------------------------

async fn history_handler(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<Message>>, RelayError> {
    let user_id: UserId = user_id.parse()?;
    let messages = state.relay.history(user_id).await?;
    Ok(Json(messages))
}

async fn send_message_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<SendMessageRequest>, JsonRejection>,
) -> Result<Json<Message>, RelayError> {
    let Json(request) = payload.map_err(|e| RelayError::MalformedBody(e.body_text()))?;
    info!(sender_id = %request.sender_id, receiver_id = %request.receiver_id, "POST /messages");
    let message = state.relay.send_message(&request).await?;
    Ok(Json(message))
}

async fn users_handler(State(state): State<Arc<AppState>>) -> Result<Json<Vec<User>>, RelayError> {
    Ok(Json(state.relay.users().await?))
}

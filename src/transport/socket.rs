//! Live channel: one WebSocket per connection, JSON frames both ways.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

use crate::lifecycle::ConnectionSession;
use crate::protocol::{ClientEvent, ServerEvent};
use crate::router::Push;

use super::server::AppState;

const SEND_FAILED: &str = "Failed to send message";

/// GET /ws
pub(super) async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (connection_id, outbound) = state.hub.open();
    let mut session = state.lifecycle.on_connect(connection_id);

    let (sink, mut stream) = socket.split();
    let writer = tokio::spawn(writer_task(sink, outbound));

    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Text(text)) => handle_frame(&state, &mut session, &text).await,
            Ok(Message::Close(_)) => break,
            // Ping/pong is answered by the websocket layer itself.
            Ok(_) => {}
            Err(e) => {
                warn!(connection_id = %connection_id, error = %e, "WebSocket receive error");
                break;
            }
        }
    }

    state.lifecycle.on_disconnect(&mut session);
    state.hub.close(connection_id);
    writer.abort();
}

/// Drains the connection's outbound queue into the socket.
async fn writer_task(
    mut sink: futures::stream::SplitSink<WebSocket, Message>,
    mut outbound: mpsc::UnboundedReceiver<ServerEvent>,
) {
    while let Some(event) = outbound.recv().await {
        let text = match serde_json::to_string(&event) {
            Ok(text) => text,
            Err(e) => {
                error!(event = event.name(), error = %e, "Failed to encode event");
                continue;
            }
        };
        if sink.send(Message::Text(text)).await.is_err() {
            break;
        }
    }
}

async fn handle_frame(state: &AppState, session: &mut ConnectionSession, text: &str) {
    let event: ClientEvent = match serde_json::from_str(text) {
        Ok(event) => event,
        Err(e) => {
            // An undecodable sendMessage still counts as a failed send.
            if ClientEvent::name_of(text).as_deref() == Some(ClientEvent::SEND_MESSAGE) {
                warn!(connection_id = %session.id(), error = %e, "Malformed sendMessage frame");
                report_send_failure(state, session);
            } else {
                debug!(connection_id = %session.id(), error = %e, "Ignoring unparseable frame");
            }
            return;
        }
    };

    match event {
        ClientEvent::RegisterUser(raw_user_id) => {
            state.lifecycle.on_register(session, &raw_user_id);
        }
        ClientEvent::SendMessage(request) => {
            if let Err(e) = state.relay.send_message(&request).await {
                warn!(connection_id = %session.id(), error = %e, "Live send failed");
                report_send_failure(state, session);
            }
        }
    }
}

fn report_send_failure(state: &AppState, session: &ConnectionSession) {
    let _ = state.hub.push(
        session.id(),
        ServerEvent::MessageError {
            error: SEND_FAILED.to_string(),
        },
    );
}

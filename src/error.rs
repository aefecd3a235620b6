use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::entity::InvalidIdentity;
use crate::store::StoreError;

/// Failures the relay surfaces to callers.
#[derive(Error, Debug)]
pub enum RelayError {
    #[error(transparent)]
    InvalidIdentity(#[from] InvalidIdentity),

    #[error("message content must be a string")]
    InvalidContent,

    /// Request body that is not valid JSON or not a send payload
    #[error("malformed request body: {0}")]
    MalformedBody(String),

    /// The message store could not complete `action`. Never routed.
    #[error("Failed to {action}")]
    Store {
        action: &'static str,
        #[source]
        source: StoreError,
    },
}

impl RelayError {
    pub fn store(action: &'static str) -> impl FnOnce(StoreError) -> Self {
        move |source| RelayError::Store { action, source }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = match &self {
            RelayError::InvalidIdentity(_)
            | RelayError::InvalidContent
            | RelayError::MalformedBody(_) => StatusCode::BAD_REQUEST,
            RelayError::Store { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = Json(serde_json::json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

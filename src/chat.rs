use crate::entity::{User, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A persisted direct message. Created once per successful send, never mutated.
///
/// Field names follow the camelCase shape clients already consume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: i64,
    pub sender_id: UserId,
    pub receiver_id: UserId,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub sender: User,
    pub receiver: User,
}

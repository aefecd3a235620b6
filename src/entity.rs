use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Stable identity of a person using the relay.
///
/// Clients send ids either as JSON numbers or as numeric strings, so every
/// entry point funnels raw input through [`UserId::parse`] before the id is
/// used for a lookup or a store call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(i64);

/// Raw id could not be turned into a [`UserId`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid user id: {0}")]
pub struct InvalidIdentity(pub String);

impl UserId {
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    pub fn get(self) -> i64 {
        self.0
    }

    /// Normalize a wire value into the canonical representation.
    ///
    /// Accepts positive integers and strings holding one. Zero, null, empty
    /// strings, floats, booleans and anything else are rejected.
    pub fn parse(raw: &Value) -> Result<Self, InvalidIdentity> {
        match raw {
            Value::Number(n) => n
                .as_i64()
                .filter(|id| *id > 0)
                .map(Self)
                .ok_or_else(|| InvalidIdentity(n.to_string())),
            Value::String(s) => s.parse(),
            other => Err(InvalidIdentity(other.to_string())),
        }
    }
}

impl FromStr for UserId {
    type Err = InvalidIdentity;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
            return Err(InvalidIdentity(s.to_string()));
        }
        trimmed
            .parse::<i64>()
            .ok()
            .filter(|id| *id > 0)
            .map(Self)
            .ok_or_else(|| InvalidIdentity(s.to_string()))
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Transport-assigned id of one live connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
}

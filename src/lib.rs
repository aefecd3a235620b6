//! Direct-messaging relay: users register a live connection, messages are
//! stored and then pushed to whichever of sender and receiver is online.

pub mod chat;
pub mod config;
pub mod entity;
pub mod error;
pub mod lifecycle;
pub mod protocol;
pub mod registry;
pub mod relay;
pub mod router;
pub mod store;
pub mod transport;

pub mod hub;
pub mod server;
pub mod socket;

pub use hub::ConnectionHub;
pub use server::{router, AppState};

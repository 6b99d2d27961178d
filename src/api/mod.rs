//! Dashboard HTTP API and price WebSocket

pub mod dto;
mod error;
mod handlers;
mod prices;
mod router;
mod state;

pub use error::ApiError;
pub use router::create_router;
pub use state::{AppState, ConnectOutcome};

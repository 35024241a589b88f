//! Dispatch HTTP API.
//!
//! REST endpoints for patients, crews, hospitals and the dispatch
//! console, plus a WebSocket for live events. `api_router()` returns a
//! `Router` that can be mounted on any axum server instance.

pub mod endpoints;
pub mod error;
pub mod middleware;
pub mod router;
pub mod server;
pub mod types;
pub mod websocket;

pub use router::api_router;
pub use server::{start_api_server, ApiServer};
pub use types::ApiContext;

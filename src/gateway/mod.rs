//! Stateless HTTP surface over the workflow runtime adapter.

pub mod api;
pub mod server;

pub use api::{AppState, SharedState, api_router};
pub use server::{ServerConfig, build_router, start_server};

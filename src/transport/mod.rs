//! The `transport` module exposes the engine over HTTP.
//!
//! - `GET /streaming/{route}/{topics}`: Server-Sent Events
//! - `GET /ws-streaming/{route}/{topics}`: WebSocket
//! - `GET /admin`: SSE stream of the admin topic
//! - `GET /`: status and counters as JSON

pub mod server;
pub mod sse;
pub mod status;
pub mod websocket;

pub use server::{AppState, router, serve};

#[cfg(test)]
mod tests;

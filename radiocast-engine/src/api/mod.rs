//! HTTP control surface
//!
//! Renderer polling and callbacks, transport commands and the SSE event
//! stream.

pub mod handlers;
pub mod server;
pub mod sse;

pub use server::{create_router, AppContext};

//! # Radiocast Common Library
//!
//! Shared code for the radiocast services:
//! - Event types (`RadioEvent`) and the broadcast `EventBus`
//! - Playback vocabulary (phases, voice styles, ordering policies)
//! - Configuration file discovery and loading
//! - SSE stream helpers
//! - Timestamp and progress utilities

pub mod config;
pub mod error;
pub mod events;
pub mod sse;
pub mod time;

pub use error::{Error, Result};

//! # Radiocast Engine (radiocast-engine)
//!
//! Narrated radio sequencing: picks ranked tracks from a catalog, announces
//! each one with recorded narration clips and hands the track to an external
//! renderer.
//!
//! **Architecture:** one supervised tokio task per active sequence, a single
//! shared playback status that renderers poll or follow over SSE, and
//! per-wait completion channels for renderer callbacks.

pub mod api;
pub mod assets;
pub mod catalog;
pub mod config;
pub mod device;
pub mod engine;
pub mod error;
pub mod playback;
pub mod state;

pub use engine::RadioEngine;
pub use error::{Error, Result};

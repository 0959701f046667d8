//! Core response-resolution components
//!
//! This module contains the lookup pipeline: normalization, the knowledge
//! store, fuzzy matching, intent recognition and the engine tying them together.

pub mod engine;
pub mod intents;
pub mod jokes;
pub mod knowledge;
pub mod matcher;
pub mod normalize;

pub use engine::ChatEngine;

//! Request types, feature extraction and the orchestrating engine.

pub mod engine;
pub mod error;
pub mod features;
pub mod hash;
pub mod output;
pub mod types;

//! Atelier: an orchestration service for AI-assisted ad generation.
//!
//! A run flows through brand-kit extraction, media generation, automated
//! critique, and bounded refinement, driven by a background engine and
//! observed over a polling HTTP API.

pub mod adapters;
pub mod config;
pub mod engine;
pub mod errors;
pub mod model;
pub mod policy;
pub mod server;
pub mod storage;
pub mod store;

//! Domain layer for the questline rules engine
//!
//! This module contains the engine's models, error types and the ports
//! that storage and reward adapters implement.

pub mod errors;
pub mod models;
pub mod ports;

// Re-export error types for convenient access
pub use errors::{DomainError, DomainResult, ErrorKind};

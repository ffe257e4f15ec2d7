//! Infrastructure layer module
//!
//! Process-level concerns that sit outside the domain:
//! - Configuration management (figment)
//! - Logging infrastructure (tracing-subscriber, tracing-appender)

pub mod config;
pub mod logging;

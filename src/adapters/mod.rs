//! Adapters that satisfy the domain ports.
//!
//! - `sqlite`: durable record store and reward ledger backed by sqlx
//! - `memory`: in-process store used by tests and demos

pub mod memory;
pub mod sqlite;

//! In-memory record store and reward ledger.
//!
//! Implements every port with the same guarded-write semantics as the SQLite
//! adapter, so services can be exercised without a database.

mod store;

pub use store::InMemoryStore;

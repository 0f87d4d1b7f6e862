//! Ledger mirror on PostgreSQL.
//!
//! The in-memory ledger is authoritative while the process runs; this crate
//! keeps a durable reflection of it so a restart can rebuild the ladder of
//! open orders, per-symbol state and accumulated profit. Every mutation runs
//! in its own transaction, and the sell path commits the profit update and
//! the order deletions atomically.

// Declare the modules that constitute this crate.
pub mod connection;
pub mod error;
pub mod repository;

// Re-export the key components to create a clean, public-facing API.
pub use connection::{connect, run_migrations};
pub use error::DbError;
pub use repository::{MirrorRepository, NewOrder, RestoredSymbol};

#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Read-side database access for the displacement indicators.
//!
//! The indicator builders never touch a connection directly: they go through
//! the [`DisplacementStore`] trait, which exposes one method per query
//! primitive. [`store::SqlStore`] implements it with raw `PostgreSQL` via
//! `switchy_database::Database::query_raw_params()`, and
//! [`memory::MemoryStore`] implements it over in-process records.
//!
//! Every primitive is read-only, takes no transaction and holds no lock.

pub mod db;
pub mod memory;
pub mod queries;
pub mod store;

pub use memory::MemoryStore;
pub use store::{DisplacementStore, Primitive, SqlStore};

/// Errors that can occur during database operations.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// Database query error.
    #[error("Database error: {0}")]
    Database(#[from] switchy_database::DatabaseError),

    /// The database could not be reached.
    #[error("Connection error: {message}")]
    Connection {
        /// Description of what went wrong.
        message: String,
    },

    /// Data conversion error.
    #[error("Data conversion error: {message}")]
    Conversion {
        /// Description of what went wrong.
        message: String,
    },
}

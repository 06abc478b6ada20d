//! Datadock persistence layer
//!
//! Record persistence and the user registry, each behind a trait so the
//! ingestion and analysis code can run against Postgres or the in-memory
//! implementations in [`db::memory`].

pub mod db;

pub use db::data_files::{DataFileStore, PostgresDataFileRepository};
pub use db::memory::{InMemoryDataFileStore, InMemoryUserRegistry};
pub use db::pool::setup_database;
pub use db::transaction::TransactionGuard;
pub use db::users::{PostgresUserRepository, UserRegistry};

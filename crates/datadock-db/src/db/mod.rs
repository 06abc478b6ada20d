//! Database repositories for the data access layer
//
// Stored file records
pub mod data_files;
//
// In-memory implementations (tests, dry runs without a database)
pub mod memory;
//
// Pool setup and migrations
pub mod pool;
//
// Transaction utilities
pub mod transaction;
//
// User registry
pub mod users;

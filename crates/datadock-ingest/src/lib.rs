//! Inbox watcher and ingester
//!
//! Files dropped into the inbox are picked up once their modification time
//! is older than the stability window. The owner is derived from the
//! filename, the bytes are saved to durable storage, a record is created and
//! the columnar cache is built. The source file then moves to
//! `processed/<username>/`, or to `error/<reason>/` when a step fails.

pub mod error;
pub mod moves;
pub mod ownership;
pub mod report;
pub mod service;
pub mod watcher;

pub use error::IngestError;
pub use moves::move_to;
pub use ownership::{extract_username, resolve_owner};
pub use report::{ErrorReason, FileOutcome, ScanReport};
pub use service::IngestService;
pub use watcher::InboxWatcher;

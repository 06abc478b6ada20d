//! Datadock Core Library
//!
//! This crate provides the domain models, error types and configuration
//! shared by every Datadock component (ingestion, analysis, HTTP and CLI).

pub mod config;
pub mod error;
pub mod models;

// Re-export commonly used types
pub use config::{CacheCompression, CacheSettings, Config, DatadockConfig, IngestSettings};
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use models::{DataFile, FileKind, NewDataFile, User};

//! Datadock Infrastructure Library
//!
//! Shared infrastructure for the Datadock binaries:
//! - Telemetry initialization (tracing subscriber)
//! - Request ID middleware
//! - The JSON error body of the HTTP API

pub mod error;
pub mod middleware;
pub mod telemetry;

pub use error::ErrorResponse;
pub use middleware::{get_request_id, request_id_middleware, RequestId, REQUEST_ID_HEADER};
pub use telemetry::init_telemetry;

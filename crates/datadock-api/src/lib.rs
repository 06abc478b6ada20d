//! Datadock API Library
//!
//! HTTP boundary of the analysis pipeline: file download and the analyze
//! endpoint (sheet overview or an Arrow IPC stream).

mod api_doc;
mod handlers;

pub mod auth;
pub mod error;
pub mod setup;
pub mod state;

pub use api_doc::ApiDoc;
pub use datadock_infra::ErrorResponse;
pub use error::HttpAppError;
pub use state::AppState;

//! OpenAPI documentation, served at `/api-docs/openapi.json`.

use utoipa::OpenApi;

use crate::handlers;
use datadock_infra::ErrorResponse;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Datadock API",
        version = "0.1.0",
        description = "Download, analyze and delete ingested tabular files; analysis is served as Arrow IPC streams. Every route except health requires the X-Authenticated-User header set by the fronting proxy."
    ),
    paths(
        handlers::files::download_file,
        handlers::files::analyze_file,
        handlers::files::delete_file,
    ),
    components(
        schemas(
            handlers::files::AnalysisPage,
            ErrorResponse,
        )
    ),
    tags(
        (name = "files", description = "Download, analysis and deletion of ingested data files")
    )
)]
pub struct ApiDoc;

use crate::auth::AuthenticatedUser;
use crate::error::HttpAppError;
use crate::state::AppState;
use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{header, Response, StatusCode},
    response::IntoResponse,
    Json,
};
use datadock_core::{AppError, DataFile};
use datadock_infra::ErrorResponse;
use datadock_services::{AnalysisRequest, ARROW_STREAM_CONTENT_TYPE};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

/// Load a record and check that the caller owns it
async fn owned_record(
    state: &AppState,
    user: &AuthenticatedUser,
    id: Uuid,
) -> Result<DataFile, HttpAppError> {
    let record = state
        .records
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound("File not found".to_string()))?;

    if !record.is_owned_by(user.0.id) {
        return Err(AppError::Forbidden("You do not have access to this file".to_string()).into());
    }
    Ok(record)
}

#[utoipa::path(
    get,
    path = "/files/{id}/download",
    tag = "files",
    params(
        ("id" = Uuid, Path, description = "File ID")
    ),
    responses(
        (status = 200, description = "Original file", content_type = "application/octet-stream"),
        (status = 403, description = "File belongs to another user", body = ErrorResponse),
        (status = 404, description = "File or stored bytes not found", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, user), fields(user_id = %user.0.id, file_id = %id, operation = "download_file"))]
pub async fn download_file(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpAppError> {
    let record = owned_record(&state, &user, id).await?;

    let stream = state.storage.open_stream(&record.file_path).await?;
    let body_stream = stream.map(|result| {
        result.map_err(|e| std::io::Error::other(format!("Storage stream error: {}", e)))
    });

    let content_disposition = format!(
        "attachment; filename=\"{}\"",
        record.filename().replace('"', "")
    );

    let response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/octet-stream")
        .header(header::CONTENT_DISPOSITION, content_disposition.as_str())
        .body(Body::from_stream(body_stream))
        .map_err(|e| AppError::Internal(format!("Failed to build response: {}", e)))?;

    Ok(response)
}

#[utoipa::path(
    delete,
    path = "/files/{id}",
    tag = "files",
    params(
        ("id" = Uuid, Path, description = "File ID")
    ),
    responses(
        (status = 204, description = "File, stored bytes and cache artifacts deleted"),
        (status = 403, description = "File belongs to another user", body = ErrorResponse),
        (status = 404, description = "File not found", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, user), fields(user_id = %user.0.id, file_id = %id, operation = "delete_file"))]
pub async fn delete_file(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, HttpAppError> {
    let record = owned_record(&state, &user, id).await?;
    let report = state.lifecycle.delete(&record).await?;

    if !report.record_deleted {
        return Err(AppError::NotFound("File not found".to_string()).into());
    }
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct AnalyzeQuery {
    /// `html` (default) for the sheet overview, `arrow` for the table stream
    pub format: Option<String>,
    pub sheet: Option<String>,
    /// `1`, `true` or `yes` re-parses the original
    pub refresh: Option<String>,
}

impl AnalyzeQuery {
    fn refresh(&self) -> bool {
        matches!(self.refresh.as_deref(), Some("1" | "true" | "yes"))
    }
}

/// Analysis page data
#[derive(Debug, Serialize, ToSchema)]
pub struct AnalysisPage {
    pub file_id: Uuid,
    pub title: String,
    pub sheet_names: Vec<String>,
    pub selected_sheet: Option<String>,
}

#[utoipa::path(
    get,
    path = "/files/{id}/analyze",
    tag = "files",
    params(
        ("id" = Uuid, Path, description = "File ID"),
        AnalyzeQuery
    ),
    responses(
        (status = 200, description = "Sheet overview, or the table as an Arrow IPC stream with format=arrow", body = AnalysisPage),
        (status = 400, description = "File type not analyzable or invalid format", body = ErrorResponse),
        (status = 403, description = "File belongs to another user", body = ErrorResponse),
        (status = 404, description = "File not found", body = ErrorResponse),
        (status = 500, description = "File could not be processed", body = ErrorResponse),
        (status = 503, description = "Columnar cache backend unavailable", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, user, query), fields(user_id = %user.0.id, file_id = %id, format = ?query.format, operation = "analyze_file"))]
pub async fn analyze_file(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Query(query): Query<AnalyzeQuery>,
) -> Result<Response<Body>, HttpAppError> {
    let record = owned_record(&state, &user, id).await?;

    if !record.is_analyzable() {
        return Err(AppError::InvalidInput(format!(
            "File type '{}' cannot be analyzed online",
            record.extension()
        ))
        .into());
    }

    match query.format.as_deref().unwrap_or("html") {
        "html" => {
            let overview = state
                .analysis
                .sheet_overview(&record, query.sheet.as_deref())
                .await?;
            Ok(Json(AnalysisPage {
                file_id: record.id,
                title: record.title.clone(),
                sheet_names: overview.sheet_names,
                selected_sheet: overview.selected_sheet,
            })
            .into_response())
        }
        "arrow" => {
            let request = AnalysisRequest {
                sheet: query.sheet.clone(),
                refresh: query.refresh(),
            };
            let result = state.analysis.analyze(&record, &request).await?;
            tracing::info!(
                rows = result.batch.num_rows(),
                columns = result.batch.num_columns(),
                source = ?result.source,
                "Returning Arrow stream"
            );
            let bytes = result.to_arrow_stream()?;

            Response::builder()
                .status(StatusCode::OK)
                .header(header::CONTENT_TYPE, ARROW_STREAM_CONTENT_TYPE)
                .body(Body::from(bytes))
                .map_err(|e| AppError::Internal(format!("Failed to build response: {}", e)).into())
        }
        other => Err(AppError::InvalidInput(format!("Invalid format requested: '{}'", other)).into()),
    }
}

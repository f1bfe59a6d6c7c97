use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::error::AppError;
use crate::sheets::{AppendSummary, RowSink};

#[derive(Clone)]
pub struct AppState {
    sheet: Arc<dyn RowSink>,
}

impl AppState {
    pub fn new(sheet: Arc<dyn RowSink>) -> Self {
        Self { sheet }
    }
}

pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/sheet", get(read_sheet).post(append_row))
        .route("/api/records", post(append_records))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_headers(Any)
                .allow_methods(Any),
        )
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp: i64,
}

async fn healthz() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        timestamp: Utc::now().timestamp(),
    })
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AppendResponse {
    success: bool,
    #[serde(flatten)]
    summary: AppendSummary,
}

async fn read_sheet(State(state): State<AppState>) -> Result<Json<Vec<Vec<Value>>>, AppError> {
    Ok(Json(state.sheet.read_rows().await?))
}

/// Append one row, e.g. a shift start or end event.
async fn append_row(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<AppendResponse>, AppError> {
    let Json(body) = body.map_err(|rejection| AppError::bad_request(rejection.body_text()))?;
    let row = body
        .get("row")
        .ok_or_else(|| AppError::bad_request("row must be array"))
        .and_then(row_cells)?;

    let summary = state.sheet.append_rows(std::slice::from_ref(&row)).await?;
    tracing::info!(endpoint = "sheet", cells = row.len(), "Appended row");
    Ok(Json(AppendResponse {
        success: true,
        summary,
    }))
}

/// Append a batch of weight rows in one request.
async fn append_records(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<AppendResponse>, AppError> {
    let Json(body) = body.map_err(|rejection| AppError::bad_request(rejection.body_text()))?;
    let rows = body
        .get("rows")
        .and_then(Value::as_array)
        .ok_or_else(|| AppError::bad_request("rows must be array"))?;
    if rows.is_empty() {
        return Err(AppError::bad_request("rows must not be empty"));
    }
    let rows = rows
        .iter()
        .map(row_cells)
        .collect::<Result<Vec<_>, _>>()?;

    let summary = state.sheet.append_rows(&rows).await?;
    tracing::info!(
        endpoint = "records",
        rows = rows.len(),
        range = summary.updated_range.as_deref().unwrap_or("unknown"),
        "Appended weight records"
    );
    Ok(Json(AppendResponse {
        success: true,
        summary,
    }))
}

fn row_cells(row: &Value) -> Result<Vec<String>, AppError> {
    let cells = row
        .as_array()
        .ok_or_else(|| AppError::bad_request("row must be array"))?;
    Ok(cells.iter().map(cell_text).collect())
}

fn cell_text(cell: &Value) -> String {
    match cell {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

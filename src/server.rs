//! One-button web front end.
//!
//! `GET /` serves a small form whose only control is the "Generate Report" button.  Submitting
//! it posts to `/generate`, which renders the report on a blocking thread and returns it as a
//! download.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{Json, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Router,
};
use log::{error, info};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::task::JoinError;

use crate::data::ReportData;
use crate::error::ReportError;
use crate::report::{generate_pdf, DOWNLOAD_FILE_NAME};

/// Name reported by the health endpoint.
pub const SERVICE_NAME: &str = "impact-report";

/// Page title of the form.
pub const PAGE_TITLE: &str = "Indian American Economic Impact Report (2025)";

const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <title>Indian American Economic Impact Report (2025)</title>
  <style>
    body { font-family: sans-serif; max-width: 40rem; margin: 4rem auto; color: #222; }
    h1 { color: #00008b; font-size: 1.6rem; }
    button { background: #00008b; color: #fff; border: 0; padding: 0.6rem 1.4rem;
             font-size: 1rem; border-radius: 4px; cursor: pointer; }
  </style>
</head>
<body>
  <h1>Indian American Economic Impact Report (2025)</h1>
  <p>Generate a professional PDF report showing contributions by Indian Americans in the US economy.</p>
  <form method="post" action="/generate">
    <button type="submit">Generate Report</button>
  </form>
</body>
</html>
"#;

/// Standard error response structure.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Body of `GET /api/health`.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
}

/// Errors surfaced by the HTTP handlers.
#[derive(Debug)]
pub enum AppError {
    /// Rendering the report failed.
    Report(ReportError),
    /// The blocking render task panicked or was cancelled.
    Task(JoinError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let message = match self {
            AppError::Report(err) => {
                let message = error_chain(&err);
                error!("Report generation failed: {message}");
                message
            }
            AppError::Task(err) => {
                error!("Report task did not complete: {err}");
                format!("report task did not complete: {err}")
            }
        };

        let body = ErrorResponse { error: message };
        (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
    }
}

/// `err` followed by each of its causes, separated by colons.
fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

impl From<ReportError> for AppError {
    fn from(err: ReportError) -> Self {
        AppError::Report(err)
    }
}

impl From<JoinError> for AppError {
    fn from(err: JoinError) -> Self {
        AppError::Task(err)
    }
}

/// Router serving the built-in 2025 dataset.
pub fn app() -> Router {
    app_with_data(ReportData::diaspora_2025())
}

/// Router serving reports for `data`.
pub fn app_with_data(data: ReportData) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/generate", post(generate))
        .route("/api/health", get(health_check))
        .with_state(Arc::new(data))
}

/// Binds `addr` and serves [`app_with_data`] until the process is stopped.
pub async fn serve(addr: SocketAddr, data: ReportData) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!("Serving report form on http://{}", listener.local_addr()?);
    axum::serve(listener, app_with_data(data)).await
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

/// Renders the report and returns it as an attachment.
pub async fn generate(State(data): State<Arc<ReportData>>) -> Result<Response, AppError> {
    let pdf = tokio::task::spawn_blocking(move || generate_pdf(&data)).await??;

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/pdf".to_owned()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{DOWNLOAD_FILE_NAME}\""),
            ),
        ],
        pdf.bytes,
    )
        .into_response())
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_owned(),
        service: SERVICE_NAME.to_owned(),
        version: env!("CARGO_PKG_VERSION").to_owned(),
    })
}

//! Conversion API handler.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;
use inkpress_core::{
    converter::{split_custom_options, JobReport},
    ConversionRequest, ConversionResult, ConverterError, ErrorKind,
};

use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ConvertRequest {
    #[serde(flatten)]
    pub request: ConversionRequest,
    /// Whitespace-separated engine flags, appended after `extra_options`.
    #[serde(default)]
    pub custom_options: Option<String>,
}

impl ConvertRequest {
    pub fn into_request(self) -> ConversionRequest {
        let mut request = self.request;
        if let Some(custom) = self.custom_options.as_deref() {
            request.extra_options.extend(split_custom_options(custom));
        }
        request
    }
}

/// Maps a finished job to the HTTP status returned with it.
pub fn status_for(result: &ConversionResult) -> StatusCode {
    match result.error_kind {
        None => StatusCode::OK,
        Some(ErrorKind::Configuration) => StatusCode::UNPROCESSABLE_ENTITY,
        Some(ErrorKind::Io) => StatusCode::BAD_REQUEST,
        Some(ErrorKind::Timeout) => StatusCode::GATEWAY_TIMEOUT,
        Some(ErrorKind::Engine) | Some(ErrorKind::OutputMissing) => StatusCode::BAD_GATEWAY,
    }
}

/// Failed result for a body that never became a request.
pub fn rejected(rejection: &JsonRejection) -> ConversionResult {
    JobReport::new(Uuid::new_v4().to_string())
        .reject(ConverterError::invalid_request(rejection.body_text()))
}

/// POST /api/v1/convert
///
/// Runs one conversion to completion and returns its result, log included.
/// Bodies that fail to parse still get a result, with a configuration error.
pub async fn convert(
    State(state): State<Arc<AppState>>,
    body: Result<Json<ConvertRequest>, JsonRejection>,
) -> (StatusCode, Json<ConversionResult>) {
    let result = match body {
        Ok(Json(body)) => state.converter().run(&body.into_request()).await,
        Err(rejection) => rejected(&rejection),
    };
    let status = status_for(&result);

    info!(
        job_id = %result.job_id,
        status = status.as_u16(),
        duration_ms = result.duration_ms,
        "Conversion request finished"
    );

    (status, Json(result))
}

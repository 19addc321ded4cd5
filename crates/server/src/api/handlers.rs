use axum::{extract::State, http::header, response::IntoResponse, Json};
use serde::Serialize;
use std::sync::Arc;
use inkpress_core::{EbookFormat, SanitizedConfig, TargetDevice};

use crate::metrics::encode_metrics;
use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

pub async fn get_config(State(state): State<Arc<AppState>>) -> Json<SanitizedConfig> {
    Json(state.sanitized_config())
}

#[derive(Debug, Serialize)]
pub struct ConverterInfoResponse {
    pub name: String,
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub formats: Vec<FormatInfo>,
    pub devices: Vec<DeviceInfo>,
}

#[derive(Debug, Serialize)]
pub struct FormatInfo {
    pub format: EbookFormat,
    pub extension: String,
    pub mime_type: String,
}

#[derive(Debug, Serialize)]
pub struct DeviceInfo {
    pub device: TargetDevice,
    pub output_profile: String,
    /// Output formats this device accepts.
    pub formats: Vec<EbookFormat>,
}

/// GET /api/v1/converter
///
/// Reports whether the engine can be run and what it can produce.
pub async fn converter_info(State(state): State<Arc<AppState>>) -> Json<ConverterInfoResponse> {
    let converter = state.converter();
    let validation = converter.validate().await;
    let formats = converter.supported_formats();

    Json(ConverterInfoResponse {
        name: converter.name().to_string(),
        available: validation.is_ok(),
        error: validation.err().map(|e| e.to_string()),
        formats: formats
            .iter()
            .map(|f| FormatInfo {
                format: *f,
                extension: f.extension().to_string(),
                mime_type: f.mime_type().to_string(),
            })
            .collect(),
        devices: converter
            .supported_devices()
            .iter()
            .map(|d| DeviceInfo {
                device: *d,
                output_profile: d.output_profile().to_string(),
                formats: formats.iter().copied().filter(|f| d.supports(*f)).collect(),
            })
            .collect(),
    })
}

/// GET /metrics
pub async fn metrics() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        encode_metrics(),
    )
}

//! Error types for the converter module.

use std::path::PathBuf;
use thiserror::Error;

use super::types::{EbookFormat, ErrorKind, TargetDevice};

/// Errors that can occur during conversion.
#[derive(Debug, Error)]
pub enum ConverterError {
    /// Target format is not one the engine is driven for.
    #[error("Unsupported output format: {format}")]
    UnsupportedFormat { format: String },

    /// Device name is unknown.
    #[error("Unsupported target device: {device}")]
    UnsupportedDevice { device: String },

    /// The device cannot read the requested format.
    #[error("Format {format} is not supported on device {device}")]
    UnsupportedCombination {
        format: EbookFormat,
        device: TargetDevice,
    },

    /// The request is malformed (paths, extensions, quality).
    #[error("Invalid request: {reason}")]
    InvalidRequest { reason: String },

    /// Engine binary not found.
    #[error("Conversion engine not found at path: {path}")]
    EngineNotFound { path: PathBuf },

    /// Engine exited non-zero.
    #[error("Conversion engine exited with {}", exit_label(.exit_code))]
    EngineFailed {
        exit_code: Option<i32>,
        stderr: Option<String>,
    },

    /// Engine exceeded the time budget and was killed.
    #[error("Conversion timed out after {timeout_secs} seconds")]
    Timeout { timeout_secs: u64 },

    /// Engine exited zero but left nothing usable behind.
    #[error("Output missing at {path}: {reason}")]
    OutputMissing { path: PathBuf, reason: String },

    /// Input file missing or unreadable.
    #[error("Cannot read input file {path}: {source}")]
    InputUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Output location cannot be written.
    #[error("Cannot write output file {path}: {source}")]
    OutputUnwritable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// I/O error during conversion.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn exit_label(exit_code: &Option<i32>) -> String {
    match exit_code {
        Some(code) => format!("code {}", code),
        None => "no exit code (terminated by signal)".to_string(),
    }
}

impl ConverterError {
    /// Creates a new invalid request error.
    pub fn invalid_request(reason: impl Into<String>) -> Self {
        Self::InvalidRequest {
            reason: reason.into(),
        }
    }

    /// Creates a new output missing error.
    pub fn output_missing(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::OutputMissing {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// The category reported to callers.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnsupportedFormat { .. }
            | Self::UnsupportedDevice { .. }
            | Self::UnsupportedCombination { .. }
            | Self::InvalidRequest { .. }
            | Self::EngineNotFound { .. } => ErrorKind::Configuration,
            Self::EngineFailed { .. } => ErrorKind::Engine,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::OutputMissing { .. } => ErrorKind::OutputMissing,
            Self::InputUnreadable { .. } | Self::OutputUnwritable { .. } | Self::Io(_) => {
                ErrorKind::Io
            }
        }
    }

    /// Captured engine stderr, if any.
    pub fn stderr(&self) -> Option<&str> {
        match self {
            Self::EngineFailed { stderr, .. } => stderr.as_deref(),
            _ => None,
        }
    }
}

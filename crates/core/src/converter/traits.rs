//! Trait definitions for the converter module.

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::error::ConverterError;
use super::types::{ConversionProgress, ConversionRequest, ConversionResult, EbookFormat, TargetDevice};

/// A converter that turns one ebook into another format.
///
/// `run` never fails: every outcome, including invalid requests, comes back
/// as a [`ConversionResult`] with the captured log attached.
#[async_trait]
pub trait Converter: Send + Sync {
    /// Returns the name of this converter implementation.
    fn name(&self) -> &str;

    /// Converts one ebook, returning once the engine has finished or timed out.
    async fn run(&self, request: &ConversionRequest) -> ConversionResult;

    /// Converts one ebook with progress reporting.
    ///
    /// The progress sender receives updates while the engine runs.
    /// If the receiver is dropped, conversion continues without progress reporting.
    async fn run_with_progress(
        &self,
        request: &ConversionRequest,
        progress_tx: mpsc::Sender<ConversionProgress>,
    ) -> ConversionResult;

    /// Validates that the converter is properly configured and ready.
    async fn validate(&self) -> Result<(), ConverterError>;

    /// Returns the supported output formats.
    fn supported_formats(&self) -> &[EbookFormat] {
        EbookFormat::ALL
    }

    /// Returns the supported target devices.
    fn supported_devices(&self) -> &[TargetDevice] {
        TargetDevice::ALL
    }
}

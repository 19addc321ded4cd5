//! Mock converter for testing.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

use crate::converter::{
    ConversionProgress, ConversionRequest, ConversionResult, ConversionSummary, Converter,
    ConverterError, FileDetails, FileReport, JobReport, JobState, OptionTranslator,
};

/// A recorded conversion request for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedConversion {
    /// The request that was submitted.
    pub request: ConversionRequest,
    /// Whether the conversion succeeded.
    pub success: bool,
}

/// Mock implementation of the Converter trait.
///
/// Provides controllable behavior for testing:
/// - Track requests for assertions
/// - Simulate success/failure
/// - Simulate progress updates
///
/// Requests are still translated, so unsupported format/device combinations
/// fail the same way they do with a real engine. No files are touched.
///
/// # Example
///
/// ```rust,ignore
/// use inkpress_core::testing::MockConverter;
///
/// let converter = MockConverter::new();
/// converter.set_next_error(ConverterError::Timeout { timeout_secs: 1 }).await;
///
/// let result = converter.run(&request).await;
/// assert!(!result.success);
///
/// assert_eq!(converter.conversion_count().await, 1);
/// ```
#[derive(Debug)]
pub struct MockConverter {
    /// Recorded conversions.
    conversions: Arc<RwLock<Vec<RecordedConversion>>>,
    /// If set, the next operation will fail with this error.
    next_error: Arc<RwLock<Option<ConverterError>>>,
    /// Simulated conversion duration in milliseconds.
    conversion_duration_ms: Arc<RwLock<u64>>,
    /// Reported size of input and output files.
    file_sizes: Arc<RwLock<(u64, u64)>>,
    /// Engine output lines appended to every log.
    engine_lines: Arc<RwLock<Vec<String>>>,
    translator: OptionTranslator,
}

impl Default for MockConverter {
    fn default() -> Self {
        Self::new()
    }
}

impl MockConverter {
    /// Create a new mock converter.
    pub fn new() -> Self {
        Self {
            conversions: Arc::new(RwLock::new(Vec::new())),
            next_error: Arc::new(RwLock::new(None)),
            conversion_duration_ms: Arc::new(RwLock::new(0)),
            file_sizes: Arc::new(RwLock::new((2 * 1024 * 1024, 1024 * 1024))),
            engine_lines: Arc::new(RwLock::new(vec![
                "Converting input to HTML...".to_string(),
                "Creating output...".to_string(),
            ])),
            translator: OptionTranslator::default(),
        }
    }

    /// Get all recorded conversions.
    pub async fn recorded_conversions(&self) -> Vec<RecordedConversion> {
        self.conversions.read().await.clone()
    }

    /// Clear recorded conversions.
    pub async fn clear_recorded(&self) {
        self.conversions.write().await.clear();
    }

    /// Get the number of conversions performed.
    pub async fn conversion_count(&self) -> usize {
        self.conversions.read().await.len()
    }

    /// Configure the next operation to fail with the given error.
    pub async fn set_next_error(&self, error: ConverterError) {
        *self.next_error.write().await = Some(error);
    }

    /// Clear any pending error.
    pub async fn clear_next_error(&self) {
        *self.next_error.write().await = None;
    }

    /// Set the simulated conversion duration.
    pub async fn set_conversion_duration(&self, duration: Duration) {
        *self.conversion_duration_ms.write().await = duration.as_millis() as u64;
    }

    /// Set the input and output sizes reported on success.
    pub async fn set_file_sizes(&self, input_bytes: u64, output_bytes: u64) {
        *self.file_sizes.write().await = (input_bytes, output_bytes);
    }

    /// Replace the simulated engine output.
    pub async fn set_engine_lines(&self, lines: Vec<String>) {
        *self.engine_lines.write().await = lines;
    }

    /// Take the next error if set.
    async fn take_error(&self) -> Option<ConverterError> {
        self.next_error.write().await.take()
    }

    async fn simulate(
        &self,
        request: &ConversionRequest,
        progress_tx: Option<mpsc::Sender<ConversionProgress>>,
    ) -> ConversionResult {
        let mut report = JobReport::new(Uuid::new_v4().to_string());
        let (input_size, output_size) = *self.file_sizes.read().await;
        report.preamble(request, Some(input_size));

        let options = match self.translator.translate(request) {
            Ok(options) => options,
            Err(e) => return self.finish(request, report.fail(e, request)).await,
        };
        if let Some(err) = self.take_error().await {
            return self.finish(request, report.fail(err, request)).await;
        }

        report.transition(JobState::Running);
        let lines = self.engine_lines.read().await.clone();
        let duration_ms = *self.conversion_duration_ms.read().await;
        let total = lines.len().max(1);
        let step = Duration::from_millis(duration_ms / total as u64);

        for (i, line) in lines.into_iter().enumerate() {
            if let Some(tx) = &progress_tx {
                let _ = tx
                    .send(ConversionProgress {
                        job_id: report.job_id().to_string(),
                        percent: (i + 1) as f32 / total as f32 * 100.0,
                        message: line.clone(),
                    })
                    .await;
            }
            report.push(line);
            if !step.is_zero() {
                tokio::time::sleep(step).await;
            }
        }

        let input = FileDetails::new(&request.input_path, input_size);
        let output = FileDetails::new(&options.output_path, output_size);
        let file_info = FileReport {
            conversion: ConversionSummary {
                from_format: input.extension.trim_start_matches('.').to_string(),
                to_format: request.target_format,
                quality: request.quality,
                device: request.device,
                size_change_mb: output.size_mb - input.size_mb,
            },
            input,
            output,
        };

        let result = report.succeed(&options.output_path, file_info);
        self.finish(request, result).await
    }

    async fn finish(&self, request: &ConversionRequest, result: ConversionResult) -> ConversionResult {
        self.conversions.write().await.push(RecordedConversion {
            request: request.clone(),
            success: result.success,
        });
        result
    }
}

#[async_trait]
impl Converter for MockConverter {
    fn name(&self) -> &str {
        "mock"
    }

    async fn run(&self, request: &ConversionRequest) -> ConversionResult {
        self.simulate(request, None).await
    }

    async fn run_with_progress(
        &self,
        request: &ConversionRequest,
        progress_tx: mpsc::Sender<ConversionProgress>,
    ) -> ConversionResult {
        self.simulate(request, Some(progress_tx)).await
    }

    async fn validate(&self) -> Result<(), ConverterError> {
        if let Some(err) = self.take_error().await {
            return Err(err);
        }
        Ok(())
    }
}

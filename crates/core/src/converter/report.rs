//! Turns a job's outcome into a [`ConversionResult`].

use chrono::{DateTime, Utc};
use std::path::Path;
use std::time::Instant;
use tokio::fs;
use tracing::{debug, info, warn};

use super::error::ConverterError;
use super::types::{
    bytes_to_mb, ConversionRequest, ConversionResult, EbookFormat, FileDetails, FileReport,
    JobState,
};

/// Checks that the engine actually produced something. Returns the size in bytes.
pub async fn verify_output(path: &Path) -> Result<u64, ConverterError> {
    let metadata = fs::metadata(path).await.map_err(|_| {
        ConverterError::output_missing(path, "engine reported success but created no output")
    })?;

    if !metadata.is_file() {
        return Err(ConverterError::output_missing(path, "output is not a regular file"));
    }
    if metadata.len() == 0 {
        return Err(ConverterError::output_missing(path, "output file is empty"));
    }

    Ok(metadata.len())
}

/// Moves the staged output to its final location, creating parent directories.
pub async fn place_output(staged: &Path, destination: &Path) -> Result<(), ConverterError> {
    let unwritable = |source| ConverterError::OutputUnwritable {
        path: destination.to_path_buf(),
        source,
    };

    if let Some(parent) = destination.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await.map_err(unwritable)?;
    }

    match fs::rename(staged, destination).await {
        Ok(()) => Ok(()),
        // Cross-filesystem moves fail with EXDEV (18 on Linux)
        Err(e) if e.kind() == std::io::ErrorKind::CrossesDevices || e.raw_os_error() == Some(18) => {
            debug!(
                "Rename across filesystems, copying {} to {}",
                staged.display(),
                destination.display()
            );
            fs::copy(staged, destination).await.map_err(unwritable)?;
            Ok(())
        }
        Err(e) => Err(unwritable(e)),
    }
}

/// Hints appended to failure logs for common engine complaints.
pub fn diagnose(error: &ConverterError, request: &ConversionRequest) -> Vec<String> {
    let mut hints = Vec::new();

    if let ConverterError::EngineNotFound { .. } = error {
        hints.push("Note: Make sure Calibre is properly installed.".to_string());
        return hints;
    }

    let Some(stderr) = error.stderr() else {
        return hints;
    };
    let upper = stderr.to_uppercase();

    if upper.contains("DRM") || upper.contains("ENCRYPTION") {
        hints.push(
            "Note: This file may be DRM-protected. DRM-protected files cannot be converted."
                .to_string(),
        );
    } else if stderr.to_lowercase().contains("not found") {
        hints.push("Note: Make sure Calibre is properly installed.".to_string());
    } else if EbookFormat::from_path(&request.input_path) == Some(request.target_format) {
        hints.push(format!(
            "Note: Input and output formats are the same ({}). No conversion needed.",
            request.target_format
        ));
    }

    hints
}

/// Accumulates the log and state of one job until it finishes.
#[derive(Debug)]
pub struct JobReport {
    job_id: String,
    state: JobState,
    log: Vec<String>,
    started_at: DateTime<Utc>,
    started: Instant,
}

impl JobReport {
    pub fn new(job_id: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            state: JobState::Pending,
            log: Vec::new(),
            started_at: Utc::now(),
            started: Instant::now(),
        }
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    pub fn log(&self) -> &[String] {
        &self.log
    }

    pub fn log_mut(&mut self) -> &mut Vec<String> {
        &mut self.log
    }

    pub fn push(&mut self, line: impl Into<String>) {
        self.log.push(line.into());
    }

    /// Moves to `next`, ignoring transitions the state machine does not allow.
    pub fn transition(&mut self, next: JobState) {
        if self.state.can_transition_to(next) {
            debug!(job_id = %self.job_id, "Job {:?} -> {:?}", self.state, next);
            self.state = next;
        } else {
            warn!(
                job_id = %self.job_id,
                "Ignoring invalid transition {:?} -> {:?}", self.state, next
            );
        }
    }

    /// Writes the request summary at the top of the log.
    pub fn preamble(&mut self, request: &ConversionRequest, input_size: Option<u64>) {
        let input_format = request
            .input_path
            .extension()
            .map(|e| e.to_string_lossy().to_uppercase())
            .unwrap_or_else(|| "UNKNOWN".to_string());

        self.push(format!(
            "Converting {} ({}) to {} ({})",
            request.input_path.display(),
            input_format,
            request.output_path.display(),
            request.target_format.extension().to_uppercase()
        ));
        if let Some(size) = input_size {
            self.push(format!("Input file size: {} MB", bytes_to_mb(size)));
        }
        self.push(format!("Quality setting: {}", request.quality));
        self.push(format!("Target device: {}", request.device));
        self.push(format!("Preserve metadata: {}", request.preserve_metadata));
        if request.fix_formatting {
            self.push("Fix formatting: true");
        }
        if !request.extra_options.is_empty() {
            self.push(format!("Custom options: {}", request.extra_options.join(" ")));
        }
    }

    /// Finishes the job successfully.
    pub fn succeed(mut self, output_path: &Path, file_info: FileReport) -> ConversionResult {
        self.transition(JobState::Succeeded);
        self.push("Conversion completed successfully");
        self.push(format!("Output file size: {} MB", file_info.output.size_mb));
        info!(
            job_id = %self.job_id,
            output = %output_path.display(),
            "Conversion succeeded"
        );

        let finished_at = Utc::now();
        ConversionResult {
            job_id: self.job_id,
            success: true,
            output_path: Some(output_path.to_path_buf()),
            log: self.log,
            error_kind: None,
            error_message: None,
            file_info: Some(file_info),
            started_at: self.started_at,
            finished_at,
            duration_ms: self.started.elapsed().as_millis() as u64,
        }
    }

    /// Finishes the job with an error. The log keeps everything captured so far.
    pub fn fail(mut self, error: ConverterError, request: &ConversionRequest) -> ConversionResult {
        self.transition(JobState::Failed);
        self.push(format!("Error: {}", error));
        for hint in diagnose(&error, request) {
            self.push(hint);
        }
        self.into_failure(error)
    }

    /// Fails a job whose request could not be parsed at all.
    pub fn reject(mut self, error: ConverterError) -> ConversionResult {
        self.transition(JobState::Failed);
        self.push(format!("Error: {}", error));
        self.into_failure(error)
    }

    fn into_failure(self, error: ConverterError) -> ConversionResult {
        warn!(
            job_id = %self.job_id,
            kind = %error.kind(),
            "Conversion failed: {}", error
        );

        let finished_at = Utc::now();
        ConversionResult {
            job_id: self.job_id,
            success: false,
            output_path: None,
            log: self.log,
            error_kind: Some(error.kind()),
            error_message: Some(error.to_string()),
            file_info: None,
            started_at: self.started_at,
            finished_at,
            duration_ms: self.started.elapsed().as_millis() as u64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::converter::types::{ConversionSummary, ErrorKind, Quality, TargetDevice};
    use std::path::PathBuf;

    fn request() -> ConversionRequest {
        ConversionRequest::new("/books/dune.epub", "/out/dune.mobi", EbookFormat::Mobi)
            .with_quality(Quality::Medium)
            .with_device(TargetDevice::Kindle)
    }

    fn engine_failure(stderr: &str) -> ConverterError {
        ConverterError::EngineFailed {
            exit_code: Some(1),
            stderr: Some(stderr.to_string()),
        }
    }

    #[tokio::test]
    async fn test_verify_output_missing() {
        let dir = tempfile::tempdir().unwrap();
        let err = verify_output(&dir.path().join("none.mobi")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::OutputMissing);
    }

    #[tokio::test]
    async fn test_verify_output_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.mobi");
        std::fs::write(&path, b"").unwrap();
        let err = verify_output(&path).await.unwrap_err();
        assert!(matches!(err, ConverterError::OutputMissing { .. }));
    }

    #[tokio::test]
    async fn test_verify_output_ok() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("book.mobi");
        std::fs::write(&path, b"BOOKMOBI").unwrap();
        assert_eq!(verify_output(&path).await.unwrap(), 8);
    }

    #[tokio::test]
    async fn test_place_output_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let staged = dir.path().join("staged.epub");
        std::fs::write(&staged, b"PK").unwrap();
        let destination = dir.path().join("a").join("b").join("book.epub");

        place_output(&staged, &destination).await.unwrap();
        assert!(!staged.exists());
        assert_eq!(std::fs::read(&destination).unwrap(), b"PK");
    }

    #[tokio::test]
    async fn test_place_output_unwritable() {
        let dir = tempfile::tempdir().unwrap();
        let staged = dir.path().join("staged.epub");
        std::fs::write(&staged, b"PK").unwrap();
        // A regular file where a directory is needed
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"").unwrap();

        let err = place_output(&staged, &blocker.join("book.epub"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
    }

    #[test]
    fn test_diagnose_drm() {
        let hints = diagnose(&engine_failure("calibre.ebooks.DRMError: book is locked"), &request());
        assert_eq!(hints.len(), 1);
        assert!(hints[0].contains("DRM-protected"));
    }

    #[test]
    fn test_diagnose_same_format() {
        let request = ConversionRequest::new("/books/a.epub", "/out/b.epub", EbookFormat::Epub);
        let hints = diagnose(&engine_failure("something went wrong"), &request);
        assert!(hints[0].contains("same (epub)"));
    }

    #[test]
    fn test_diagnose_engine_missing() {
        let err = ConverterError::EngineNotFound {
            path: PathBuf::from("ebook-convert"),
        };
        let hints = diagnose(&err, &request());
        assert!(hints[0].contains("Calibre"));
    }

    #[test]
    fn test_diagnose_nothing_for_timeouts() {
        assert!(diagnose(&ConverterError::Timeout { timeout_secs: 1 }, &request()).is_empty());
    }

    #[test]
    fn test_preamble() {
        let mut report = JobReport::new("job-1");
        report.preamble(
            &request().with_extra_options(["--no-inline-toc"]),
            Some(2 * 1024 * 1024),
        );
        let log = report.log();
        assert_eq!(
            log[0],
            "Converting /books/dune.epub (EPUB) to /out/dune.mobi (MOBI)"
        );
        assert!(log.contains(&"Input file size: 2 MB".to_string()));
        assert!(log.contains(&"Quality setting: medium".to_string()));
        assert!(log.contains(&"Target device: kindle".to_string()));
        assert!(log.contains(&"Custom options: --no-inline-toc".to_string()));
    }

    #[test]
    fn test_fail_keeps_log_and_kind() {
        let mut report = JobReport::new("job-2");
        report.transition(JobState::Running);
        report.push("engine said hello");
        let result = report.fail(engine_failure("Traceback: boom"), &request());

        assert!(!result.success);
        assert!(result.output_path.is_none());
        assert_eq!(result.error_kind, Some(ErrorKind::Engine));
        assert_eq!(result.log[0], "engine said hello");
        assert!(result.log_text().contains("Error: Conversion engine exited with code 1"));
    }

    #[test]
    fn test_reject_without_request() {
        let result = JobReport::new("job-4")
            .reject(ConverterError::invalid_request("target_format: unknown format"));

        assert!(!result.success);
        assert_eq!(result.error_kind, Some(ErrorKind::Configuration));
        assert_eq!(
            result.log,
            vec!["Error: Invalid request: target_format: unknown format".to_string()]
        );
        assert!(result.file_info.is_none());
    }

    #[test]
    fn test_succeed() {
        let mut report = JobReport::new("job-3");
        report.transition(JobState::Running);
        let output = Path::new("/out/dune.mobi");
        let info = FileReport {
            input: FileDetails::new(Path::new("/books/dune.epub"), 2048),
            output: FileDetails::new(output, 4096),
            conversion: ConversionSummary {
                from_format: "epub".to_string(),
                to_format: EbookFormat::Mobi,
                quality: Quality::Medium,
                device: TargetDevice::Kindle,
                size_change_mb: 0.0,
            },
        };

        let result = report.succeed(output, info);
        assert!(result.success);
        assert_eq!(result.output_path.as_deref(), Some(output));
        assert!(result.error_kind.is_none());
        assert!(result.file_info.is_some());
        assert!(result.finished_at >= result.started_at);
    }

    #[test]
    fn test_invalid_transition_ignored() {
        let mut report = JobReport::new("job-4");
        report.transition(JobState::Succeeded);
        assert_eq!(report.state(), JobState::Pending);
        report.transition(JobState::Running);
        assert_eq!(report.state(), JobState::Running);
    }
}

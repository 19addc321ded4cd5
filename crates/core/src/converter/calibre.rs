//! Calibre `ebook-convert` backed converter.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

use super::config::ConverterConfig;
use super::error::ConverterError;
use super::invoker::{EngineInvoker, EngineOutput};
use super::options::{OptionTranslator, TranslatedOptions};
use super::report::{place_output, verify_output, JobReport};
use super::traits::Converter;
use super::types::{
    ConversionProgress, ConversionRequest, ConversionResult, ConversionSummary, FileDetails,
    FileReport, JobState,
};
use super::workspace::{sweep_stale, Workspace};
use crate::metrics::{record_conversion, WORKSPACES_SWEPT};

/// Converter driving Calibre's `ebook-convert` command.
pub struct CalibreConverter {
    config: ConverterConfig,
    translator: OptionTranslator,
    invoker: EngineInvoker,
}

impl CalibreConverter {
    /// Creates a new converter with the given configuration.
    pub fn new(config: ConverterConfig) -> Self {
        Self {
            translator: OptionTranslator::from_config(&config),
            invoker: EngineInvoker::new(config.engine_path.clone()),
            config,
        }
    }

    /// Creates a converter with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(ConverterConfig::default())
    }

    pub fn config(&self) -> &ConverterConfig {
        &self.config
    }

    /// Removes workspaces left behind by a previous process.
    pub async fn sweep_stale_workspaces(&self) -> std::io::Result<usize> {
        let removed =
            sweep_stale(&self.config.workspace_root, self.config.stale_workspace_age()).await?;
        if removed > 0 {
            info!(
                "Removed {} stale workspaces under {}",
                removed,
                self.config.workspace_root.display()
            );
            WORKSPACES_SWEPT.inc_by(removed as u64);
        }
        Ok(removed)
    }

    async fn run_job(
        &self,
        request: &ConversionRequest,
        progress_tx: Option<mpsc::Sender<ConversionProgress>>,
    ) -> ConversionResult {
        let mut report = JobReport::new(Uuid::new_v4().to_string());
        info!(
            job_id = %report.job_id(),
            format = %request.target_format,
            device = %request.device,
            "Starting conversion of {}",
            request.input_path.display()
        );

        let result = match self.execute(request, &mut report, progress_tx.as_ref()).await {
            Ok((output_path, file_info)) => report.succeed(&output_path, file_info),
            Err(e) => report.fail(e, request),
        };
        record_conversion(request.target_format, &result);
        result
    }

    /// Translate, check input, provision workspace, run engine, place output.
    async fn execute(
        &self,
        request: &ConversionRequest,
        report: &mut JobReport,
        progress_tx: Option<&mpsc::Sender<ConversionProgress>>,
    ) -> Result<(PathBuf, FileReport), ConverterError> {
        let options = match self.translator.translate(request) {
            Ok(options) => options,
            Err(e) => {
                report.preamble(request, None);
                return Err(e);
            }
        };

        let input = check_input(&request.input_path).await;
        report.preamble(request, input.as_ref().ok().map(|(_, size)| *size));
        let (input_path, input_size) = input?;
        check_output_target(&input_path, &options.output_path).await?;

        let mut workspace = Workspace::create(&self.config.workspace_root)?;
        let outcome = self
            .run_in_workspace(request, &options, &input_path, &workspace, report, progress_tx)
            .await;

        if let Err(e) = workspace.close() {
            warn!(
                job_id = %report.job_id(),
                workspace = %workspace.path().display(),
                "Failed to remove workspace: {}", e
            );
        }

        let output_size = outcome?;
        let input_details = FileDetails::new(&request.input_path, input_size);
        let output_details = FileDetails::new(&options.output_path, output_size);
        let file_info = FileReport {
            conversion: ConversionSummary {
                from_format: input_details.extension.trim_start_matches('.').to_string(),
                to_format: request.target_format,
                quality: request.quality,
                device: request.device,
                size_change_mb: round_mb(output_details.size_mb - input_details.size_mb),
            },
            input: input_details,
            output: output_details,
        };

        Ok((options.output_path, file_info))
    }

    async fn run_in_workspace(
        &self,
        request: &ConversionRequest,
        options: &TranslatedOptions,
        input_path: &Path,
        workspace: &Workspace,
        report: &mut JobReport,
        progress_tx: Option<&mpsc::Sender<ConversionProgress>>,
    ) -> Result<u64, ConverterError> {
        let stem = options
            .output_path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "book".to_string());
        let staged = workspace.output_file(&stem, request.target_format);

        let args = options.command_line(input_path, &staged);
        let limit = Duration::from_secs(request.timeout_secs.unwrap_or(self.config.timeout_secs));

        report.transition(JobState::Running);
        let job_id = report.job_id().to_string();
        self.invoker
            .run(
                &args,
                workspace.path(),
                limit,
                EngineOutput {
                    job_id: &job_id,
                    log: report.log_mut(),
                    progress_tx,
                },
            )
            .await?;

        let size = verify_output(&staged).await?;
        place_output(&staged, &options.output_path).await?;
        Ok(size)
    }
}

/// Resolves the input to an absolute path and checks it can be opened.
async fn check_input(path: &Path) -> Result<(PathBuf, u64), ConverterError> {
    let unreadable = |source| ConverterError::InputUnreadable {
        path: path.to_path_buf(),
        source,
    };

    let absolute = tokio::fs::canonicalize(path).await.map_err(unreadable)?;
    let metadata = tokio::fs::metadata(&absolute).await.map_err(unreadable)?;
    if !metadata.is_file() {
        return Err(unreadable(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "not a regular file",
        )));
    }
    tokio::fs::File::open(&absolute).await.map_err(unreadable)?;

    Ok((absolute, metadata.len()))
}

/// Rejects an output path that resolves to the input file.
async fn check_output_target(input: &Path, output: &Path) -> Result<(), ConverterError> {
    let resolved = match tokio::fs::canonicalize(output).await {
        Ok(resolved) => resolved,
        Err(_) => {
            let parent = output
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            match (tokio::fs::canonicalize(parent).await, output.file_name()) {
                (Ok(parent), Some(name)) => parent.join(name),
                // Parent does not exist yet, so the output cannot be the input.
                _ => return Ok(()),
            }
        }
    };

    if resolved == input {
        return Err(ConverterError::invalid_request(format!(
            "output path {} refers to the input file",
            output.display()
        )));
    }
    Ok(())
}

fn round_mb(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[async_trait]
impl Converter for CalibreConverter {
    fn name(&self) -> &str {
        "calibre"
    }

    async fn run(&self, request: &ConversionRequest) -> ConversionResult {
        self.run_job(request, None).await
    }

    async fn run_with_progress(
        &self,
        request: &ConversionRequest,
        progress_tx: mpsc::Sender<ConversionProgress>,
    ) -> ConversionResult {
        self.run_job(request, Some(progress_tx)).await
    }

    async fn validate(&self) -> Result<(), ConverterError> {
        let output = Command::new(&self.config.engine_path)
            .arg("--version")
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    ConverterError::EngineNotFound {
                        path: self.config.engine_path.clone(),
                    }
                } else {
                    ConverterError::Io(e)
                }
            })?;

        if !output.status.success() {
            return Err(ConverterError::EngineFailed {
                exit_code: output.status.code(),
                stderr: Some(String::from_utf8_lossy(&output.stderr).to_string()),
            });
        }

        // Ensure workspace root exists
        tokio::fs::create_dir_all(&self.config.workspace_root).await?;

        Ok(())
    }
}

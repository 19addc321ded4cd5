//! Types for the converter module.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use super::error::ConverterError;

/// Ebook format the engine can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", try_from = "String")]
pub enum EbookFormat {
    /// EPUB (reflowable, open standard)
    Epub,
    /// Mobipocket
    Mobi,
    /// Kindle Format 8
    Azw3,
    /// Portable Document Format
    Pdf,
    /// Plain text
    Txt,
    /// HTML
    Html,
}

impl EbookFormat {
    /// Every target format, in display order.
    pub const ALL: &'static [EbookFormat] = &[
        Self::Epub,
        Self::Mobi,
        Self::Azw3,
        Self::Pdf,
        Self::Txt,
        Self::Html,
    ];

    /// Returns the file extension for this format.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Epub => "epub",
            Self::Mobi => "mobi",
            Self::Azw3 => "azw3",
            Self::Pdf => "pdf",
            Self::Txt => "txt",
            Self::Html => "html",
        }
    }

    /// Returns the MIME type for this format.
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Epub => "application/epub+zip",
            Self::Mobi => "application/x-mobipocket-ebook",
            Self::Azw3 => "application/vnd.amazon.ebook",
            Self::Pdf => "application/pdf",
            Self::Txt => "text/plain",
            Self::Html => "text/html",
        }
    }

    /// Guesses the format from a path's extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(|e| e.parse().ok())
    }
}

impl fmt::Display for EbookFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for EbookFormat {
    type Err = ConverterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().trim_start_matches('.').to_ascii_lowercase();
        match normalized.as_str() {
            "epub" => Ok(Self::Epub),
            "mobi" => Ok(Self::Mobi),
            "azw3" => Ok(Self::Azw3),
            "pdf" => Ok(Self::Pdf),
            "txt" => Ok(Self::Txt),
            "html" | "htm" => Ok(Self::Html),
            _ => Err(ConverterError::UnsupportedFormat {
                format: s.to_string(),
            }),
        }
    }
}

impl TryFrom<String> for EbookFormat {
    type Error = ConverterError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Coarse fidelity setting mapped to engine flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", try_from = "String")]
pub enum Quality {
    Low,
    Medium,
    #[default]
    High,
    Best,
}

impl Quality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Best => "best",
        }
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Quality {
    type Err = ConverterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "best" => Ok(Self::Best),
            _ => Err(ConverterError::invalid_request(format!(
                "unknown quality tier: {}",
                s
            ))),
        }
    }
}

impl TryFrom<String> for Quality {
    type Error = ConverterError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Broad device class, used to decide which formats a device reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceFamily {
    Generic,
    Kindle,
    Tablet,
    Eink,
}

/// Reading device the output is tuned for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", try_from = "String")]
pub enum TargetDevice {
    #[default]
    Generic,
    Kindle,
    KindlePaperwhite,
    KindleDx,
    KindleFire,
    KindleOasis,
    Ipad,
    Kobo,
    Nook,
}

impl TargetDevice {
    /// Every known device.
    pub const ALL: &'static [TargetDevice] = &[
        Self::Generic,
        Self::Kindle,
        Self::KindlePaperwhite,
        Self::KindleDx,
        Self::KindleFire,
        Self::KindleOasis,
        Self::Ipad,
        Self::Kobo,
        Self::Nook,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Generic => "generic",
            Self::Kindle => "kindle",
            Self::KindlePaperwhite => "kindle_paperwhite",
            Self::KindleDx => "kindle_dx",
            Self::KindleFire => "kindle_fire",
            Self::KindleOasis => "kindle_oasis",
            Self::Ipad => "ipad",
            Self::Kobo => "kobo",
            Self::Nook => "nook",
        }
    }

    /// Returns the engine's output profile name for this device.
    pub fn output_profile(&self) -> &'static str {
        match self {
            Self::Generic => "generic_eink",
            Self::Kindle => "kindle",
            Self::KindlePaperwhite => "kindle_pw",
            Self::KindleDx => "kindle_dx",
            Self::KindleFire => "kindle_fire",
            Self::KindleOasis => "kindle_oasis",
            Self::Ipad => "ipad",
            Self::Kobo => "kobo",
            Self::Nook => "nook",
        }
    }

    pub fn family(&self) -> DeviceFamily {
        match self {
            Self::Generic => DeviceFamily::Generic,
            Self::Kindle
            | Self::KindlePaperwhite
            | Self::KindleDx
            | Self::KindleFire
            | Self::KindleOasis => DeviceFamily::Kindle,
            Self::Ipad => DeviceFamily::Tablet,
            Self::Kobo | Self::Nook => DeviceFamily::Eink,
        }
    }

    /// Whether this device can read the given format.
    pub fn supports(&self, format: EbookFormat) -> bool {
        use EbookFormat::*;
        match self.family() {
            DeviceFamily::Generic => true,
            DeviceFamily::Kindle => matches!(format, Mobi | Azw3 | Pdf | Txt),
            DeviceFamily::Tablet => matches!(format, Epub | Pdf | Txt | Html),
            DeviceFamily::Eink => matches!(format, Epub | Pdf | Txt),
        }
    }
}

impl fmt::Display for TargetDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TargetDevice {
    type Err = ConverterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .iter()
            .copied()
            .find(|d| d.as_str() == normalized)
            .ok_or_else(|| ConverterError::UnsupportedDevice {
                device: s.to_string(),
            })
    }
}

impl TryFrom<String> for TargetDevice {
    type Error = ConverterError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// A single conversion request. Owned by the caller for the duration of a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionRequest {
    /// Source ebook.
    pub input_path: PathBuf,
    /// Destination chosen by the caller. The format extension is appended if missing.
    pub output_path: PathBuf,
    /// Format to produce.
    pub target_format: EbookFormat,
    #[serde(default)]
    pub quality: Quality,
    #[serde(default)]
    pub device: TargetDevice,
    /// Keep the source cover and metadata.
    #[serde(default)]
    pub preserve_metadata: bool,
    /// Normalise indents and paragraph spacing.
    #[serde(default)]
    pub fix_formatting: bool,
    /// Opaque engine flags, appended verbatim after everything else.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extra_options: Vec<String>,
    /// Overrides the configured engine timeout.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

impl ConversionRequest {
    /// Creates a request with default quality, device and toggles.
    pub fn new(
        input_path: impl Into<PathBuf>,
        output_path: impl Into<PathBuf>,
        target_format: EbookFormat,
    ) -> Self {
        Self {
            input_path: input_path.into(),
            output_path: output_path.into(),
            target_format,
            quality: Quality::default(),
            device: TargetDevice::default(),
            preserve_metadata: false,
            fix_formatting: false,
            extra_options: Vec::new(),
            timeout_secs: None,
        }
    }

    pub fn with_quality(mut self, quality: Quality) -> Self {
        self.quality = quality;
        self
    }

    pub fn with_device(mut self, device: TargetDevice) -> Self {
        self.device = device;
        self
    }

    pub fn with_preserve_metadata(mut self, preserve: bool) -> Self {
        self.preserve_metadata = preserve;
        self
    }

    pub fn with_fix_formatting(mut self, fix: bool) -> Self {
        self.fix_formatting = fix;
        self
    }

    pub fn with_extra_options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extra_options.extend(options.into_iter().map(Into::into));
        self
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = Some(timeout_secs);
        self
    }
}

/// Category of a failed conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Invalid format, device or quality combination, or no engine installed.
    Configuration,
    /// The engine exited non-zero.
    Engine,
    /// The engine exceeded its time budget.
    Timeout,
    /// The engine reported success but left no usable output.
    OutputMissing,
    /// Input unreadable or output unwritable.
    Io,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Configuration => "configuration",
            Self::Engine => "engine",
            Self::Timeout => "timeout",
            Self::OutputMissing => "output_missing",
            Self::Io => "io",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of a single job. No automatic retries: both end states are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Pending,
    Running,
    Succeeded,
    Failed,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    /// Pending may fail early (bad options, unreadable input) without ever running.
    pub fn can_transition_to(&self, next: JobState) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Running)
                | (Self::Pending, Self::Failed)
                | (Self::Running, Self::Succeeded)
                | (Self::Running, Self::Failed)
        )
    }
}

/// Basic facts about a file on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileDetails {
    pub filename: String,
    pub size_bytes: u64,
    /// Size in MiB, rounded to two decimals.
    pub size_mb: f64,
    /// Lowercase extension including the dot, empty if none.
    pub extension: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

impl FileDetails {
    pub fn new(path: &Path, size_bytes: u64) -> Self {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| format!(".{}", e.to_ascii_lowercase()))
            .unwrap_or_default();
        Self {
            filename: path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default(),
            size_bytes,
            size_mb: bytes_to_mb(size_bytes),
            extension,
            mime_type: EbookFormat::from_path(path).map(|f| f.mime_type().to_string()),
        }
    }
}

/// Rounds a byte count to MiB with two decimals.
pub fn bytes_to_mb(bytes: u64) -> f64 {
    (bytes as f64 / (1024.0 * 1024.0) * 100.0).round() / 100.0
}

/// What was converted into what.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionSummary {
    pub from_format: String,
    pub to_format: EbookFormat,
    pub quality: Quality,
    pub device: TargetDevice,
    pub size_change_mb: f64,
}

/// Input and output file facts attached to a successful result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileReport {
    pub input: FileDetails,
    pub output: FileDetails,
    pub conversion: ConversionSummary,
}

/// Outcome of one conversion. Produced once per request and handed to the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionResult {
    pub job_id: String,
    pub success: bool,
    /// Present iff `success`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_path: Option<PathBuf>,
    /// Preamble, engine output and diagnostics in order.
    pub log: Vec<String>,
    /// Present iff not `success`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_info: Option<FileReport>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: u64,
}

impl ConversionResult {
    /// The log as a single newline-separated string.
    pub fn log_text(&self) -> String {
        self.log.join("\n")
    }
}

/// Progress reported by the engine while it runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionProgress {
    pub job_id: String,
    /// Progress percentage (0.0 - 100.0).
    pub percent: f32,
    /// Stage description printed by the engine.
    pub message: String,
}

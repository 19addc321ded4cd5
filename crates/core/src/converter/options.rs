//! Maps request options onto the engine's command-line vocabulary.

use std::path::{Component, Path, PathBuf};

use super::config::ConverterConfig;
use super::error::ConverterError;
use super::types::{ConversionRequest, EbookFormat, Quality};

const PRESERVE_METADATA_FLAGS: &[&str] = &["--prefer-metadata-cover", "--preserve-cover-aspect-ratio"];

const FIX_FORMATTING_FLAGS: &[&str] = &[
    "--fix-indents",
    "--remove-paragraph-spacing",
    "--remove-paragraph-spacing-indent-size",
    "1.5",
    "--insert-blank-line",
    "--html-unwrap-factor",
    "0.4",
];

/// Engine flags for a quality tier. Each tier includes the previous one.
pub fn quality_flags(quality: Quality) -> &'static [&'static str] {
    match quality {
        Quality::Low => &[],
        Quality::Medium => &["--pretty-print"],
        Quality::High => &["--pretty-print", "--linearize-tables"],
        Quality::Best => &[
            "--pretty-print",
            "--linearize-tables",
            "--enable-heuristics",
            "--smarten-punctuation",
        ],
    }
}

/// Splits a free-form custom options string on whitespace.
pub fn split_custom_options(options: &str) -> Vec<String> {
    options.split_whitespace().map(str::to_string).collect()
}

/// Validated options for one request, computed before any workspace or process exists.
#[derive(Debug, Clone, PartialEq)]
pub struct TranslatedOptions {
    /// Where the caller will find the output, extension normalised.
    pub output_path: PathBuf,
    /// Flags that follow the two positional paths.
    pub flags: Vec<String>,
}

impl TranslatedOptions {
    /// Full argument list: input, engine output, then flags.
    pub fn command_line(&self, input: &Path, engine_output: &Path) -> Vec<String> {
        let mut args = Vec::with_capacity(self.flags.len() + 2);
        args.push(input.to_string_lossy().to_string());
        args.push(engine_output.to_string_lossy().to_string());
        args.extend(self.flags.iter().cloned());
        args
    }
}

/// Builds engine arguments from a request.
#[derive(Debug, Clone)]
pub struct OptionTranslator {
    pdf_paper_size: String,
    extra_engine_args: Vec<String>,
}

impl Default for OptionTranslator {
    fn default() -> Self {
        Self::from_config(&ConverterConfig::default())
    }
}

impl OptionTranslator {
    pub fn from_config(config: &ConverterConfig) -> Self {
        Self {
            pdf_paper_size: config.pdf_paper_size.clone(),
            extra_engine_args: config.extra_engine_args.clone(),
        }
    }

    /// Validates the request and produces the engine flags.
    ///
    /// Fails with a configuration error for unsupported device/format pairs,
    /// mismatched output extensions, identical input and output paths, or a
    /// zero timeout.
    pub fn translate(&self, request: &ConversionRequest) -> Result<TranslatedOptions, ConverterError> {
        if !request.device.supports(request.target_format) {
            return Err(ConverterError::UnsupportedCombination {
                format: request.target_format,
                device: request.device,
            });
        }
        if request.timeout_secs == Some(0) {
            return Err(ConverterError::invalid_request(
                "timeout_secs must be greater than zero",
            ));
        }

        let output_path = resolve_output_path(&request.output_path, request.target_format)?;
        if normalize_lexically(&output_path) == normalize_lexically(&request.input_path) {
            return Err(ConverterError::invalid_request(
                "input and output paths are the same file",
            ));
        }

        let mut flags = vec![
            "--output-profile".to_string(),
            request.device.output_profile().to_string(),
        ];
        push_all(&mut flags, quality_flags(request.quality));
        self.push_format_flags(&mut flags, request.target_format);

        if request.preserve_metadata {
            push_all(&mut flags, PRESERVE_METADATA_FLAGS);
        }
        if request.fix_formatting {
            push_formatting_flags(&mut flags);
        }

        flags.extend(self.extra_engine_args.iter().cloned());
        // Request extras go last so they can override anything above.
        flags.extend(request.extra_options.iter().cloned());

        Ok(TranslatedOptions { output_path, flags })
    }

    fn push_format_flags(&self, flags: &mut Vec<String>, format: EbookFormat) {
        match format {
            EbookFormat::Mobi => push_all(flags, &["--mobi-file-type", "new", "--mobi-toc"]),
            EbookFormat::Azw3 => push_all(
                flags,
                &[
                    "--mobi-file-type",
                    "new",
                    "--mobi-toc",
                    "--mobi-keep-original-images",
                ],
            ),
            EbookFormat::Epub => {
                push_all(flags, &["--remove-paragraph-spacing", "--insert-blank-line"])
            }
            EbookFormat::Pdf => {
                flags.extend(["--paper-size".to_string(), self.pdf_paper_size.clone()])
            }
            EbookFormat::Txt | EbookFormat::Html => {}
        }
    }
}

/// Appends the target extension when missing; rejects a conflicting one.
pub fn resolve_output_path(path: &Path, format: EbookFormat) -> Result<PathBuf, ConverterError> {
    if path.as_os_str().is_empty() || path.file_name().is_none() {
        return Err(ConverterError::invalid_request("output path has no file name"));
    }

    match path.extension().and_then(|e| e.to_str()) {
        None => Ok(path.with_extension(format.extension())),
        Some(ext) if ext.eq_ignore_ascii_case(format.extension()) => Ok(path.to_path_buf()),
        Some(ext) if format == EbookFormat::Html && ext.eq_ignore_ascii_case("htm") => {
            Ok(path.to_path_buf())
        }
        Some(ext) => Err(ConverterError::invalid_request(format!(
            "output extension .{} does not match target format {}",
            ext, format
        ))),
    }
}

/// Drops `.` and folds `..` into its parent without touching the filesystem.
fn normalize_lexically(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match normalized.components().next_back() {
                Some(Component::Normal(_)) => {
                    normalized.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => normalized.push(".."),
            },
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

fn push_all(flags: &mut Vec<String>, values: &[&str]) {
    flags.extend(values.iter().map(|v| v.to_string()));
}

/// Adds formatting fixes, skipping switches the format flags already set.
fn push_formatting_flags(flags: &mut Vec<String>) {
    let mut iter = FIX_FORMATTING_FLAGS.iter().peekable();
    while let Some(flag) = iter.next() {
        let value = iter.peek().filter(|v| !v.starts_with("--")).copied();
        if value.is_some() {
            iter.next();
        }
        if flags.iter().any(|f| f == flag) {
            continue;
        }
        flags.push(flag.to_string());
        if let Some(value) = value {
            flags.push(value.to_string());
        }
    }
}

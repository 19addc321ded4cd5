//! Converter module for ebook format conversion.
//!
//! This module provides the `Converter` trait and an implementation that
//! drives Calibre's `ebook-convert` as an external engine.
//!
//! Each job runs in its own scratch workspace which is removed once the job
//! finishes, whether it succeeded, failed or timed out. Results always come
//! back as a [`ConversionResult`] carrying the engine log.
//!
//! # Example
//!
//! ```ignore
//! use inkpress_core::converter::{CalibreConverter, ConversionRequest, Converter, EbookFormat, Quality, TargetDevice};
//!
//! let converter = CalibreConverter::with_defaults();
//!
//! // Validate ebook-convert is available
//! converter.validate().await?;
//!
//! let request = ConversionRequest::new("book.epub", "book.mobi", EbookFormat::Mobi)
//!     .with_quality(Quality::Medium)
//!     .with_device(TargetDevice::Kindle);
//!
//! let result = converter.run(&request).await;
//! println!("{}", result.log_text());
//! ```

mod calibre;
mod config;
mod error;
mod invoker;
mod options;
mod report;
mod traits;
mod types;
mod workspace;

pub use calibre::CalibreConverter;
pub use config::ConverterConfig;
pub use error::ConverterError;
pub use invoker::{EngineInvoker, EngineOutput};
pub use options::{
    quality_flags, resolve_output_path, split_custom_options, OptionTranslator, TranslatedOptions,
};
pub use report::{diagnose, place_output, verify_output, JobReport};
pub use traits::Converter;
pub use types::{
    bytes_to_mb, ConversionProgress, ConversionRequest, ConversionResult, ConversionSummary,
    DeviceFamily, EbookFormat, ErrorKind, FileDetails, FileReport, JobState, Quality,
    TargetDevice,
};
pub use workspace::{sweep_stale, Workspace, WORKSPACE_PREFIX};

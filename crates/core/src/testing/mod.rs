//! Testing utilities and mock implementations.
//!
//! Lets the HTTP layer and other callers be exercised without a Calibre
//! installation.
//!
//! # Example
//!
//! ```rust,ignore
//! use inkpress_core::testing::{fixtures, MockConverter};
//!
//! let converter = MockConverter::new();
//! let request = fixtures::kindle_request("book.epub", "book.mobi");
//! let result = converter.run(&request).await;
//! ```

mod mock_converter;

pub use mock_converter::{MockConverter, RecordedConversion};

/// Test fixtures and helper functions.
pub mod fixtures {
    use std::path::Path;

    use crate::converter::{ConversionRequest, EbookFormat, Quality, TargetDevice};

    /// A plain EPUB conversion request with default options.
    pub fn epub_request(input: impl AsRef<Path>, output: impl AsRef<Path>) -> ConversionRequest {
        ConversionRequest::new(input.as_ref(), output.as_ref(), EbookFormat::Epub)
    }

    /// Kindle MOBI request at medium quality.
    pub fn kindle_request(input: impl AsRef<Path>, output: impl AsRef<Path>) -> ConversionRequest {
        ConversionRequest::new(input.as_ref(), output.as_ref(), EbookFormat::Mobi)
            .with_quality(Quality::Medium)
            .with_device(TargetDevice::Kindle)
    }

    /// Minimal bytes that look enough like an EPUB for a fake engine.
    pub fn sample_epub_bytes() -> Vec<u8> {
        let mut bytes = b"PK\x03\x04".to_vec();
        bytes.extend_from_slice(b"mimetypeapplication/epub+zip");
        bytes
    }
}

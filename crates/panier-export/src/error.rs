//! # Export Error Types

use thiserror::Error;

/// PDF export failures.
#[derive(Debug, Error)]
pub enum ExportError {
    /// printpdf failed to build or serialize the document.
    #[error("PDF generation failed: {0}")]
    Pdf(#[from] printpdf::Error),

    /// Writing the file failed.
    #[error("Could not write PDF: {0}")]
    Io(#[from] std::io::Error),

    /// Nothing to export.
    #[error("Cannot export an empty list")]
    EmptyList,
}

/// Result type for export operations.
pub type ExportResult<T> = Result<T, ExportError>;

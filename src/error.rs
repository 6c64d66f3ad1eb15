//! Error types shared by the grid engine and its collaborators.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, GridError>;

/// Failures surfaced to the caller as a kind plus a message.
#[derive(Debug, Error)]
pub enum GridError {
    /// Source document or worksheet is missing
    #[error("Not found: {0}")]
    NotFound(String),

    /// Malformed grid payload
    #[error("Invalid grid: {0}")]
    Format(String),

    /// Invalid or overlapping merge ranges
    #[error("Invalid merge ranges: {0}")]
    Validation(String),

    /// Reading or writing the spreadsheet file failed
    #[error("Storage error: {0}")]
    Storage(String),

    /// The PDF document could not be produced
    #[error("Export failed: {0}")]
    Export(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl GridError {
    pub fn kind(&self) -> &'static str {
        match self {
            GridError::NotFound(_) => "not_found",
            GridError::Format(_) => "format",
            GridError::Validation(_) => "validation",
            GridError::Storage(_) | GridError::Io(_) => "storage",
            GridError::Export(_) => "export",
        }
    }
}

/// A single text run the canvas refused to draw.
#[derive(Debug, Error)]
#[error("Cannot draw {text:?}: {reason}")]
pub struct DrawError {
    pub text: String,
    pub reason: String,
}

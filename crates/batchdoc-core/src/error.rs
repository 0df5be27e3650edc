use crate::mode::Mode;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BatchDocError {
    #[error("{name} rejected! {reason}")]
    ValidationRejected { name: String, reason: String },

    #[error(transparent)]
    CapacityExceeded(#[from] CapacityViolation),

    #[error("Failed to process {name}: {source}")]
    CollaboratorFailure {
        name: String,
        #[source]
        source: CollaboratorError,
    },

    #[error("Processing took too long ({mode} limit is {}s). Try with fewer or smaller files.", .limit.as_secs())]
    OperationTimeout { mode: Mode, limit: Duration },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Invalid page range: {0}")]
    InvalidRange(String),

    #[error("Invalid run configuration: {0}")]
    InvalidRunConfig(String),

    #[error("Invalid order: {0}")]
    InvalidOrder(String),

    #[error("{0}")]
    NothingToProcess(String),
}

/// Why an incoming batch could not be appended.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CapacityViolation {
    #[error("Memory limit exceeded! You can add at most {} more.", megabytes(.available_bytes))]
    Memory {
        limit_bytes: u64,
        attempted_bytes: u64,
        available_bytes: u64,
    },

    #[error("File count limit! You can add max {available} more files.")]
    FileCount {
        limit: usize,
        attempted: usize,
        available: usize,
    },
}

/// Failure reported by an external collaborator (PDF, codec, archive, OCR).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CollaboratorError {
    #[error("Failed to parse PDF: {0}")]
    ParseFailure(String),

    #[error("Unsupported PDF structure: {0}")]
    UnsupportedStructure(String),

    #[error("Image codec error: {0}")]
    Codec(String),

    #[error("Archive error: {0}")]
    Archive(String),

    #[error("OCR failed: {0}")]
    Ocr(String),

    #[error("{0} is not available")]
    Unavailable(&'static str),

    #[error("Handle allocation failed: {0}")]
    Handle(String),
}

fn megabytes(bytes: &u64) -> String {
    format!("{:.2}MB", *bytes as f64 / 1024.0 / 1024.0)
}

pub type Result<T> = std::result::Result<T, BatchDocError>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_memory_violation_names_remaining_bytes() {
        let err = CapacityViolation::Memory {
            limit_bytes: 10 * 1024 * 1024,
            attempted_bytes: 12 * 1024 * 1024,
            available_bytes: 3 * 1024 * 1024 / 2,
        };
        assert_eq!(
            err.to_string(),
            "Memory limit exceeded! You can add at most 1.50MB more."
        );
    }

    #[test]
    fn test_file_count_violation_names_remaining_files() {
        let err = CapacityViolation::FileCount {
            limit: 50,
            attempted: 52,
            available: 2,
        };
        assert_eq!(err.to_string(), "File count limit! You can add max 2 more files.");
    }
}

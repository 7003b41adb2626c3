use std::time::Duration;

use thiserror::Error;

/// Broad classification of an [`MpError`].
///
/// Every error is fatal to the computation that raised it; the kind only tells
/// the caller which part of the input or setup to look at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Unavailable capability or an unsupported combination of options.
    Configuration,
    /// The inputs disagree with each other (design, markers, pedigree).
    InputConsistency,
    /// A computed layout failed its self-consistency check.
    Internal,
    /// The computation was cancelled or ran past its deadline.
    Interrupted,
    /// Reading or writing files failed.
    Io,
}

#[derive(Error, Debug)]
pub enum MpError {
    #[error("Missing capability: {capability}")]
    MissingCapability { capability: String },

    #[error("Unsupported design: {0}")]
    UnsupportedDesign(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Mixed designs among observed individuals: {}", designs.join(", "))]
    MixedDesign { designs: Vec<String> },

    #[error("Marker mismatch: {0}")]
    MarkerMismatch(String),

    #[error("Pedigree error: {0}")]
    Pedigree(String),

    #[error("Data error: {0}")]
    Data(String),

    #[error("Dimension mismatch: expected {expected}, got {got} in {context}")]
    DimensionMismatch {
        expected: usize,
        got: usize,
        context: String,
    },

    #[error(
        "Grid mismatch on chromosome '{chromosome}': grid has {grid} positions \
         but the computed array has {columns} columns"
    )]
    GridMismatch {
        chromosome: String,
        grid: usize,
        columns: usize,
    },

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Computation cancelled")]
    Cancelled,

    #[error("Deadline exceeded after {elapsed:?}")]
    DeadlineExceeded { elapsed: Duration },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl MpError {
    /// The taxonomy class of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            MpError::MissingCapability { .. }
            | MpError::UnsupportedDesign(_)
            | MpError::InvalidParameter(_)
            | MpError::Config(_) => ErrorKind::Configuration,
            MpError::MixedDesign { .. }
            | MpError::MarkerMismatch(_)
            | MpError::Pedigree(_)
            | MpError::Data(_)
            | MpError::DimensionMismatch { .. } => ErrorKind::InputConsistency,
            MpError::GridMismatch { .. } | MpError::Internal(_) => ErrorKind::Internal,
            MpError::Cancelled | MpError::DeadlineExceeded { .. } => ErrorKind::Interrupted,
            MpError::Io(_) | MpError::Csv(_) | MpError::Json(_) => ErrorKind::Io,
        }
    }
}

pub type Result<T> = std::result::Result<T, MpError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds() {
        let e = MpError::MissingCapability {
            capability: "multipoint".into(),
        };
        assert_eq!(e.kind(), ErrorKind::Configuration);
        assert!(e.to_string().contains("multipoint"));

        let e = MpError::MixedDesign {
            designs: vec!["4wayG2aic0".into(), "4wayG2aic1".into()],
        };
        assert_eq!(e.kind(), ErrorKind::InputConsistency);
        assert!(e.to_string().contains("4wayG2aic0, 4wayG2aic1"));

        let e = MpError::GridMismatch {
            chromosome: "1".into(),
            grid: 11,
            columns: 12,
        };
        assert_eq!(e.kind(), ErrorKind::Internal);
        assert_eq!(MpError::Cancelled.kind(), ErrorKind::Interrupted);
    }
}

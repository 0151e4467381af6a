//! Error types for segmented vectors

use thiserror::Error;

use crate::element::ElementKind;

pub type Result<T> = std::result::Result<T, VectorError>;

#[derive(Error, Debug)]
pub enum VectorError {
    /// Operation invoked in the wrong seal state (append after seal, read before seal).
    #[error("Illegal state: {0}")]
    IllegalState(String),

    #[error("Index {index} out of range for vector of size {size}")]
    IndexOutOfRange { index: usize, size: usize },

    #[error("Segment capacity {capacity} exceeded")]
    CapacityExceeded { capacity: usize },

    #[error("More than {max} unique values")]
    TooManyUniqueValues { max: usize },

    /// Pin count underflow or copy accounting mismatch. Never expected
    /// outside a concurrency bug.
    #[error("Concurrency invariant violated: {0}")]
    ConcurrencyInvariantViolation(String),

    #[error("Segment was never submitted to a memory manager")]
    ManagerNotReady,

    #[error("Incompatible segment: cannot copy {source_kind:?} into {target_kind:?}")]
    IncompatibleSegment {
        source_kind: ElementKind,
        target_kind: ElementKind,
    },

    #[error("Segment {0} not found in backing store")]
    SegmentNotFound(u64),

    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl VectorError {
    /// Stable error code, one per error kind.
    pub fn code(&self) -> &'static str {
        match self {
            VectorError::IllegalState(_) => "ILLEGAL_STATE",
            VectorError::IndexOutOfRange { .. } => "INDEX_OUT_OF_RANGE",
            VectorError::CapacityExceeded { .. } => "CAPACITY_EXCEEDED",
            VectorError::TooManyUniqueValues { .. } => "TOO_MANY_UNIQUE_VALUES",
            VectorError::ConcurrencyInvariantViolation(_) => "CONCURRENCY_INVARIANT_VIOLATION",
            VectorError::ManagerNotReady => "MANAGER_NOT_READY",
            VectorError::IncompatibleSegment { .. } => "INCOMPATIBLE_SEGMENT",
            VectorError::SegmentNotFound(_) => "SEGMENT_NOT_FOUND",
            VectorError::InvalidFormat(_) => "INVALID_FORMAT",
            VectorError::InvalidConfig(_) => "INVALID_CONFIG",
            VectorError::Io(_) | VectorError::Json(_) => "IO_ERROR",
        }
    }

    pub(crate) fn illegal_state(msg: impl Into<String>) -> Self {
        VectorError::IllegalState(msg.into())
    }

    /// Build an invariant violation and log it; these must never pass silently.
    pub(crate) fn invariant(msg: impl Into<String>) -> Self {
        let msg = msg.into();
        tracing::error!(reason = msg.as_str(), "concurrency invariant violated");
        VectorError::ConcurrencyInvariantViolation(msg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(VectorError::illegal_state("x").code(), "ILLEGAL_STATE");
        assert_eq!(
            VectorError::IndexOutOfRange { index: 3, size: 2 }.code(),
            "INDEX_OUT_OF_RANGE"
        );
        assert_eq!(VectorError::ManagerNotReady.code(), "MANAGER_NOT_READY");
        assert_eq!(
            VectorError::invariant("pin count underflow").code(),
            "CONCURRENCY_INVARIANT_VIOLATION"
        );
    }

    #[test]
    fn test_error_display() {
        let err = VectorError::IndexOutOfRange { index: 10, size: 4 };
        assert_eq!(err.to_string(), "Index 10 out of range for vector of size 4");

        let err = VectorError::IncompatibleSegment {
            source_kind: ElementKind::Int,
            target_kind: ElementKind::Double,
        };
        assert!(err.to_string().contains("Int"));
        assert!(err.to_string().contains("Double"));
    }
}

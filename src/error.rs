//! Error types for metafile playback
//!
//! Every failure the player reports is detected before the first canvas call:
//! the byte stream is walked and decoded once up front, so a truncated or
//! malformed metafile never produces a partial drawing.

use thiserror::Error;

/// Custom error type for metafile decoding and playback
#[derive(Error, Debug)]
pub enum MetafileError {
    #[error("Metafile data is empty")]
    Empty,

    #[error("Data is neither EMF nor WMF")]
    NotAMetafile,

    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    #[error("Truncated metafile at offset {offset}: needed {needed} bytes, {available} available")]
    Truncated {
        offset: usize,
        needed: usize,
        available: usize,
    },

    #[error("Malformed {kind} record at offset {offset}: {reason}")]
    MalformedRecord {
        offset: usize,
        kind: &'static str,
        reason: String,
    },

    #[error("Canvas rejected the picture size")]
    SizeRejected,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for metafile operations
pub type MetafileResult<T> = Result<T, MetafileError>;

impl MetafileError {
    pub(crate) fn malformed(offset: usize, kind: &'static str, reason: impl Into<String>) -> Self {
        MetafileError::MalformedRecord {
            offset,
            kind,
            reason: reason.into(),
        }
    }
}

/// Conversion from MetafileError to PyErr
#[cfg(feature = "python")]
impl From<MetafileError> for pyo3::PyErr {
    fn from(err: MetafileError) -> Self {
        pyo3::PyErr::new::<pyo3::exceptions::PyValueError, _>(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncated_message() {
        let err = MetafileError::Truncated {
            offset: 88,
            needed: 20,
            available: 12,
        };
        assert_eq!(
            err.to_string(),
            "Truncated metafile at offset 88: needed 20 bytes, 12 available"
        );
    }

    #[test]
    fn test_malformed_helper() {
        let err = MetafileError::malformed(100, "EMR_POLYGON", "point count exceeds record");
        assert_eq!(
            err.to_string(),
            "Malformed EMR_POLYGON record at offset 100: point count exceeds record"
        );
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "eof");
        let err: MetafileError = io.into();
        assert!(matches!(err, MetafileError::Io(_)));
    }
}

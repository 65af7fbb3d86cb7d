//! Error types for the codec crate.

use thiserror::Error;

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors that can occur while encoding or decoding a blob.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Failed to encode a column map.
    #[error("encoding failed: {message}")]
    EncodingFailed {
        /// Description of the encoding error.
        message: String,
    },

    /// Failed to decode blob text.
    #[error("decoding failed: {message}")]
    DecodingFailed {
        /// Description of the decoding error.
        message: String,
    },

    /// NaN and infinite floats have no blob representation.
    #[error("non-finite float in column '{column}'")]
    NonFiniteFloat {
        /// Column holding the offending value.
        column: String,
    },

    /// The blob is valid text but not a flat map of scalars.
    #[error("invalid blob structure: {message}")]
    InvalidStructure {
        /// Description of the structural error.
        message: String,
    },

    /// Integer does not fit in a signed 64-bit column.
    #[error("integer overflow in column '{column}'")]
    IntegerOverflow {
        /// Column holding the offending value.
        column: String,
    },
}

impl CodecError {
    /// Create an encoding failed error.
    pub fn encoding_failed(message: impl Into<String>) -> Self {
        Self::EncodingFailed {
            message: message.into(),
        }
    }

    /// Create a decoding failed error.
    pub fn decoding_failed(message: impl Into<String>) -> Self {
        Self::DecodingFailed {
            message: message.into(),
        }
    }

    /// Create an invalid structure error.
    pub fn invalid_structure(message: impl Into<String>) -> Self {
        Self::InvalidStructure {
            message: message.into(),
        }
    }
}

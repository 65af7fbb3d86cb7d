//! Error types for entirow core.

use entirow_codec::RowId;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in entirow core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Driver failure. Propagated unchanged after any rollback.
    #[error("storage error: {0}")]
    Storage(#[from] entirow_storage::StorageError),

    /// The blob column holds text that is not a valid blob.
    #[error("codec error: {0}")]
    Codec(#[from] entirow_codec::CodecError),

    /// Bad or duplicate entity type registration, or use of an unknown type.
    #[error("configuration error: {message}")]
    Configuration {
        /// Description of the problem.
        message: String,
    },

    /// No row matched.
    #[error("record not found in '{table}': {lookup}")]
    RecordNotFound {
        /// Table that was searched.
        table: String,
        /// What was looked up.
        lookup: String,
    },

    /// Row ids must be positive integers.
    #[error("invalid entity id {id}, expecting a positive integer")]
    InvalidId {
        /// The rejected id.
        id: i64,
    },

    /// Column names must be non-empty.
    #[error("invalid column name '{column}', expecting a non-empty name")]
    InvalidColumn {
        /// The rejected name.
        column: String,
    },

    /// The value cannot be stored in a column.
    #[error("invalid value for column '{column}': {reason}")]
    InvalidValue {
        /// Column being written.
        column: String,
        /// Why the value was rejected.
        reason: String,
    },

    /// The id, hash and blob columns are managed by entirow.
    #[error("column '{column}' cannot be set")]
    ProtectedColumn {
        /// Column being written.
        column: String,
    },

    /// The table or input does not match what the entity type requires.
    #[error("schema error: {message}")]
    Schema {
        /// Description of the mismatch.
        message: String,
    },
}

impl CoreError {
    /// Creates a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Creates a schema error.
    pub fn schema(message: impl Into<String>) -> Self {
        Self::Schema {
            message: message.into(),
        }
    }

    /// Creates a not-found error for a primary key lookup.
    pub fn not_found_id(table: impl Into<String>, id: RowId) -> Self {
        Self::RecordNotFound {
            table: table.into(),
            lookup: format!("id {id}"),
        }
    }

    /// Creates a not-found error for a conditional lookup.
    pub fn not_found(table: impl Into<String>, lookup: impl Into<String>) -> Self {
        Self::RecordNotFound {
            table: table.into(),
            lookup: lookup.into(),
        }
    }

    /// Creates an invalid value error.
    pub fn invalid_value(column: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            column: column.into(),
            reason: reason.into(),
        }
    }

    /// Returns true for [`CoreError::RecordNotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::RecordNotFound { .. })
    }
}

/// Validates a caller-supplied id.
pub(crate) fn row_id(id: i64) -> CoreResult<RowId> {
    RowId::new(id).ok_or(CoreError::InvalidId { id })
}

//! Error types for driver operations.

use thiserror::Error;

/// Result type for driver operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors a driver can report.
///
/// Callers above the driver treat these as opaque: they roll back and
/// propagate them unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    /// The table does not exist.
    #[error("unknown table '{table}'")]
    UnknownTable {
        /// Table name.
        table: String,
    },

    /// The column does not exist in the table.
    #[error("unknown column '{column}' in table '{table}'")]
    UnknownColumn {
        /// Table name.
        table: String,
        /// Column name.
        column: String,
    },

    /// The table already exists.
    #[error("table '{table}' already exists")]
    TableExists {
        /// Table name.
        table: String,
    },

    /// A row with this primary key already exists.
    #[error("duplicate id {id} in table '{table}'")]
    DuplicateId {
        /// Table name.
        table: String,
        /// Conflicting id.
        id: i64,
    },

    /// `begin` while a transaction is open.
    #[error("a transaction is already active")]
    TransactionActive,

    /// `commit` or `rollback` with no open transaction.
    #[error("no active transaction")]
    NoTransaction,

    /// A failure raised by a configured fail point.
    #[error("injected failure on {op} '{table}'")]
    Injected {
        /// Operation that failed.
        op: String,
        /// Table the operation targeted.
        table: String,
    },

    /// Any other backend failure.
    #[error("backend error: {0}")]
    Backend(String),
}

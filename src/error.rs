//! Error types for the ledger and inventory engines.

use crate::amount::Amount;
use crate::store::StoreError;
use thiserror::Error;

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, LedgerError>;

/// Errors that can occur during engine operation.
///
/// Every engine operation either commits in full or fails with one of these
/// before any write becomes visible.
#[derive(Error, Debug)]
pub enum LedgerError {
    /// Bad input: non-positive amount, empty description, empty document, ...
    #[error("Validation failed: {0}")]
    Validation(String),

    /// A referenced account, product, transaction or movement is missing
    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },

    /// An expense line asks for more than is on hand
    #[error("Insufficient stock of {product}: requested {requested}, available {available}")]
    InsufficientStock {
        product: String,
        requested: Amount,
        available: Amount,
    },

    /// A display amount could not be parsed
    #[error("Cannot parse amount from {input:?}")]
    Format { input: String },

    /// The datastore rejected or aborted a commit
    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),

    /// Failed to open or read an input file
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV parsing or writing error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl LedgerError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        LedgerError::Validation(message.into())
    }

    pub(crate) fn not_found(entity: &'static str, key: impl ToString) -> Self {
        LedgerError::NotFound {
            entity,
            key: key.to_string(),
        }
    }
}

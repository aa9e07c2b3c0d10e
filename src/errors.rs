use sea_orm::DbErr;
use thiserror::Error;

/// Error type shared by every service in the engine.
///
/// Business-rule rejections (`InsufficientStock`, `OverSale`, ...) abort the
/// surrounding transaction and are surfaced verbatim to the caller; they are
/// not system failures and are logged at warn level. Everything else is
/// infrastructure trouble.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] DbErr),

    #[error("Item not found: {0}")]
    ItemNotFound(String),

    #[error("Account not found: {0}")]
    AccountNotFound(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Duplicate serial code: {0}")]
    DuplicateSerial(String),

    #[error("Insufficient stock: {0}")]
    InsufficientStock(String),

    #[error("Over-sale: {0}")]
    OverSale(String),

    #[error("Invalid quantity: {0}")]
    InvalidQuantity(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Event delivery error: {0}")]
    EventError(String),
}

impl ServiceError {
    /// True for rejections a caller can fix by resubmitting corrected input.
    ///
    /// These leave the data store untouched (the transaction rolled back) and
    /// should not page anyone.
    pub fn is_business_rule(&self) -> bool {
        matches!(
            self,
            ServiceError::DuplicateSerial(_)
                | ServiceError::InsufficientStock(_)
                | ServiceError::OverSale(_)
                | ServiceError::InvalidQuantity(_)
                | ServiceError::Conflict(_)
                | ServiceError::ValidationError(_)
        )
    }

    /// True when the target of the operation does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            ServiceError::ItemNotFound(_)
                | ServiceError::AccountNotFound(_)
                | ServiceError::NotFound(_)
        )
    }
}

impl From<serde_json::Error> for ServiceError {
    fn from(err: serde_json::Error) -> Self {
        ServiceError::SerializationError(err.to_string())
    }
}

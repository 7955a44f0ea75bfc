use crate::domain::resource::ErrorKind;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, PaymentError>;

#[derive(Error, Debug)]
pub enum PaymentError {
    #[error("Payment initiation failed: {0}")]
    InitiationFailure(String),
    #[error("Gateway charge failed: {0}")]
    GatewayFailure(String),
    #[error("Payment is still pending")]
    VerificationPending,
    #[error("Verification request failed: {0}")]
    VerificationTransientFailure(String),
    #[error("Payment verification timed out")]
    VerificationTimeout,
    #[error("Payment failed: {0}")]
    VerificationDefinitiveFailure(String),
    #[error("Verification already in progress for contribution {0}")]
    VerificationInFlight(String),
    #[error("Payment received but not recorded: {0}")]
    ReconciliationFailure(String),
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Storage error: {0}")]
    StorageError(String),
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[cfg(feature = "storage-rocksdb")]
    #[error("RocksDB error: {0}")]
    RocksDbError(#[from] rocksdb::Error),
}

impl PaymentError {
    /// Maps the error onto the taxonomy carried by [`crate::domain::resource::Resource`].
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InitiationFailure(_) => ErrorKind::InitiationFailure,
            Self::GatewayFailure(_) => ErrorKind::GatewayFailure,
            Self::VerificationPending | Self::VerificationTransientFailure(_) => {
                ErrorKind::VerificationTransientFailure
            }
            Self::VerificationTimeout => ErrorKind::VerificationTimeout,
            Self::VerificationDefinitiveFailure(_) => ErrorKind::VerificationDefinitiveFailure,
            Self::VerificationInFlight(_) => ErrorKind::VerificationInFlight,
            Self::ReconciliationFailure(_) => ErrorKind::ReconciliationFailure,
            Self::ValidationError(_) | Self::CsvError(_) => ErrorKind::InvalidInput,
            Self::StorageError(_) | Self::SerializationError(_) | Self::IoError(_) => {
                ErrorKind::Storage
            }
            #[cfg(feature = "storage-rocksdb")]
            Self::RocksDbError(_) => ErrorKind::Storage,
        }
    }

    /// Whether polling should keep asking after this error.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::VerificationPending | Self::VerificationTransientFailure(_)
        )
    }
}

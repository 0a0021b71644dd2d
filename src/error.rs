use crate::domain::operation::Phase;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, PaymentError>;

/// A rejection reported by a payment provider.
///
/// Gateways never fail with anything else; the orchestrator wraps this into
/// [`PaymentError::PaymentFailure`] together with the phase that was attempted.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{provider}: {message}")]
pub struct ProviderFailure {
    pub provider: String,
    pub message: String,
}

impl ProviderFailure {
    pub fn new(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            message: message.into(),
        }
    }
}

/// Coarse error classification handed to the boundary layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    ValidationFailure,
    AuthorizationNotFound,
    CaptureNotFound,
    PaymentFailure,
    StorageUnavailable,
    UnknownProvider,
}

#[derive(Error, Debug)]
pub enum PaymentError {
    /// Every violation found in one request, in the order they were found.
    #[error("Validation failed: {}", .0.join(", "))]
    ValidationFailure(Vec<String>),
    #[error("Capture failed: Authorization not found.")]
    AuthorizationNotFound { auth_token: String },
    #[error("Refund failed: Capture not found.")]
    CaptureNotFound { transaction_id: String },
    #[error("Payment {phase} failed: {}", source.message)]
    PaymentFailure {
        phase: Phase,
        #[source]
        source: ProviderFailure,
    },
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),
    #[error("Unknown provider: {0}")]
    UnknownProvider(String),
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl PaymentError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PaymentError::ValidationFailure(_) | PaymentError::CsvError(_) => {
                ErrorKind::ValidationFailure
            }
            PaymentError::AuthorizationNotFound { .. } => ErrorKind::AuthorizationNotFound,
            PaymentError::CaptureNotFound { .. } => ErrorKind::CaptureNotFound,
            PaymentError::PaymentFailure { .. } => ErrorKind::PaymentFailure,
            PaymentError::StorageUnavailable(_) | PaymentError::IoError(_) => {
                ErrorKind::StorageUnavailable
            }
            PaymentError::UnknownProvider(_) => ErrorKind::UnknownProvider,
        }
    }

    /// Status code the transport layer should answer with.
    pub fn http_status_code(&self) -> u16 {
        match self.kind() {
            ErrorKind::ValidationFailure => 400,
            _ => 500,
        }
    }

    /// Whether the caller may safely resubmit the same request.
    ///
    /// Provider rejections and storage outages are transient; capture and refund
    /// retries are guarded by idempotency.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::PaymentFailure | ErrorKind::StorageUnavailable
        )
    }
}

#[cfg(feature = "storage-rocksdb")]
impl From<rocksdb::Error> for PaymentError {
    fn from(err: rocksdb::Error) -> Self {
        PaymentError::StorageUnavailable(err.to_string())
    }
}

use crate::error::PaymentError;
use serde::Serialize;

/// Classification of a failed operation, shared by every envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InitiationFailure,
    GatewayFailure,
    VerificationTransientFailure,
    VerificationTimeout,
    VerificationDefinitiveFailure,
    VerificationInFlight,
    ReconciliationFailure,
    InvalidInput,
    Storage,
}

impl ErrorKind {
    /// True when the user may safely check again later without being charged twice.
    pub fn is_reverifiable(self) -> bool {
        matches!(
            self,
            Self::VerificationTransientFailure | Self::VerificationTimeout | Self::VerificationInFlight
        )
    }
}

/// Three-state wrapper for anything crossing a process or network boundary.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Resource<T> {
    Loading,
    Success { value: T },
    Error { kind: ErrorKind, message: String },
}

impl<T> Resource<T> {
    pub fn success(value: T) -> Self {
        Self::Success { value }
    }

    pub fn error(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self::Error {
            kind,
            message: message.into(),
        }
    }

    pub fn from_result(result: Result<T, PaymentError>) -> Self {
        match result {
            Ok(value) => Self::success(value),
            Err(e) => Self::error(e.kind(), e.to_string()),
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Loading)
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            Self::Success { value } => Some(value),
            _ => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Resource<U> {
        match self {
            Self::Loading => Resource::Loading,
            Self::Success { value } => Resource::Success { value: f(value) },
            Self::Error { kind, message } => Resource::Error { kind, message },
        }
    }
}

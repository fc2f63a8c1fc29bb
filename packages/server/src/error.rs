use common::GeoError;
use sea_orm::DbErr;
use serde::Serialize;
use thiserror::Error;

/// Structured failure returned to whatever transport sits in front of the core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    /// Machine-readable error code. One of: `PROVIDER_CLAIM_INVALID`,
    /// `VERIFICATION_FAILED`, `UNAUTHORIZED`, `INVALID_LOCATION`, `NOT_FOUND`,
    /// `DUPLICATE_IDENTITY`, `LINK_CONFLICT`, `MERGE_CONFLICT`, `INTERNAL_ERROR`.
    pub code: &'static str,
    /// Human-readable error description.
    pub message: String,
}

/// Coarse failure class. Transports pick their own status codes from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorClass {
    Authentication,
    Validation,
    NotFound,
    Conflict,
    Internal,
}

impl ErrorClass {
    /// The HTTP status an HTTP transport would normally use for this class.
    pub fn status_hint(&self) -> u16 {
        match self {
            Self::Authentication => 401,
            Self::Validation => 400,
            Self::NotFound => 404,
            Self::Conflict => 409,
            Self::Internal => 500,
        }
    }
}

/// Application-level error type.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Provider claims rejected: {0}")]
    ProviderClaimInvalid(String),

    #[error("Identity verification failed: {0}")]
    VerificationFailure(String),

    #[error("Identity is already registered to another account")]
    DuplicateIdentity,

    #[error("Cannot link identity: {0}")]
    LinkConflict(String),

    #[error("Cannot merge accounts: {0}")]
    MergeConflict(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Invalid location: {0}")]
    InvalidLocation(#[from] GeoError),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Store or network failure. Not the caller's fault; may succeed on retry.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn code(&self) -> &'static str {
        match self {
            AppError::ProviderClaimInvalid(_) => "PROVIDER_CLAIM_INVALID",
            AppError::VerificationFailure(_) => "VERIFICATION_FAILED",
            AppError::DuplicateIdentity => "DUPLICATE_IDENTITY",
            AppError::LinkConflict(_) => "LINK_CONFLICT",
            AppError::MergeConflict(_) => "MERGE_CONFLICT",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::InvalidLocation(_) => "INVALID_LOCATION",
            AppError::Unauthorized(_) => "UNAUTHORIZED",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            AppError::ProviderClaimInvalid(_)
            | AppError::VerificationFailure(_)
            | AppError::Unauthorized(_) => ErrorClass::Authentication,
            AppError::InvalidLocation(_) => ErrorClass::Validation,
            AppError::NotFound(_) => ErrorClass::NotFound,
            AppError::DuplicateIdentity
            | AppError::LinkConflict(_)
            | AppError::MergeConflict(_) => ErrorClass::Conflict,
            AppError::Internal(_) => ErrorClass::Internal,
        }
    }

    /// Only infrastructure failures are worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::Internal(_))
    }

    /// Split into class and wire body. Internal details are logged, not exposed.
    pub fn class_and_body(self) -> (ErrorClass, ErrorBody) {
        let class = self.class();
        let code = self.code();
        let message = match self {
            AppError::Internal(detail) => {
                tracing::error!("Internal error: {}", detail);
                "An unexpected error occurred".into()
            }
            other => other.to_string(),
        };
        (class, ErrorBody { code, message })
    }
}

impl From<DbErr> for AppError {
    fn from(err: DbErr) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::VerificationFailure(err.to_string())
    }
}

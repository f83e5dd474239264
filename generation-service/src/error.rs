use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use service_core::error::ErrorResponse;
use thiserror::Error;

use crate::services::accounts::StoreError;
use crate::services::identity::IdentityError;

/// Every failure a generation-service endpoint can report. The `kind()` string
/// is what callers match on; internal causes stay in the logs.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Missing bearer credential")]
    MissingCredential,

    #[error("Invalid credential")]
    InvalidCredential,

    #[error("Authentication required")]
    Unauthenticated,

    #[error("Identity provider unavailable")]
    IdentityUnavailable,

    #[error("Account not found")]
    AccountNotFound,

    #[error("Account is disabled")]
    AccountDisabled,

    #[error("An account with this email already exists")]
    DuplicateAccount,

    #[error("Insufficient credits: {required} required, {available} available")]
    InsufficientCredits { required: i64, available: i64 },

    #[error("Balance adjustment would go below zero")]
    WouldUnderflow,

    #[error("Balance adjustment would exceed the maximum balance")]
    BalanceOverflow,

    #[error("Generation failed: {0}")]
    GenerationFailed(String),

    #[error("Persistence failed: {0}")]
    PersistenceFailed(String),

    #[error("Credit grant not applied: {0}")]
    GrantNotApplied(String),

    #[error("Validation failed: {0}")]
    ValidationFailed(String),
}

impl GenerationError {
    /// Stable identifier exposed to callers in the `error` field.
    pub fn kind(&self) -> &'static str {
        match self {
            GenerationError::MissingCredential => "MissingCredential",
            GenerationError::InvalidCredential => "InvalidCredential",
            GenerationError::Unauthenticated => "Unauthenticated",
            GenerationError::IdentityUnavailable => "IdentityUnavailable",
            GenerationError::AccountNotFound => "AccountNotFound",
            GenerationError::AccountDisabled => "AccountDisabled",
            GenerationError::DuplicateAccount => "DuplicateAccount",
            GenerationError::InsufficientCredits { .. } => "InsufficientCredits",
            GenerationError::WouldUnderflow => "WouldUnderflow",
            GenerationError::BalanceOverflow => "BalanceOverflow",
            GenerationError::GenerationFailed(_) => "GenerationFailed",
            GenerationError::PersistenceFailed(_) => "PersistenceFailed",
            GenerationError::GrantNotApplied(_) => "GrantNotApplied",
            GenerationError::ValidationFailed(_) => "ValidationFailed",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            GenerationError::MissingCredential
            | GenerationError::InvalidCredential
            | GenerationError::Unauthenticated => StatusCode::UNAUTHORIZED,
            GenerationError::IdentityUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            GenerationError::InsufficientCredits { .. } | GenerationError::WouldUnderflow => {
                StatusCode::PAYMENT_REQUIRED
            }
            GenerationError::AccountDisabled => StatusCode::FORBIDDEN,
            GenerationError::AccountNotFound => StatusCode::NOT_FOUND,
            GenerationError::DuplicateAccount => StatusCode::CONFLICT,
            GenerationError::ValidationFailed(_) | GenerationError::BalanceOverflow => {
                StatusCode::BAD_REQUEST
            }
            GenerationError::GenerationFailed(_)
            | GenerationError::PersistenceFailed(_)
            | GenerationError::GrantNotApplied(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message returned to the caller. Upstream and storage details are
    /// replaced by a generic sentence.
    fn public_message(&self) -> String {
        match self {
            GenerationError::GenerationFailed(_) => "Content generation failed".to_string(),
            GenerationError::PersistenceFailed(_) => {
                "The generation could not be saved, please try again".to_string()
            }
            GenerationError::GrantNotApplied(_) => {
                "Billing references were saved but the credit grant was not applied, retry the request"
                    .to_string()
            }
            other => other.to_string(),
        }
    }
}

impl From<IdentityError> for GenerationError {
    fn from(err: IdentityError) -> Self {
        match err {
            IdentityError::MissingCredential => GenerationError::MissingCredential,
            IdentityError::InvalidCredential(reason) => {
                tracing::debug!(reason = %reason, "Rejected bearer credential");
                GenerationError::InvalidCredential
            }
            IdentityError::Unavailable(reason) => {
                tracing::error!(reason = %reason, "Identity provider unavailable");
                GenerationError::IdentityUnavailable
            }
        }
    }
}

impl From<StoreError> for GenerationError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => GenerationError::AccountNotFound,
            StoreError::DuplicateAccount => GenerationError::DuplicateAccount,
            StoreError::WouldUnderflow { .. } => GenerationError::WouldUnderflow,
            StoreError::WouldOverflow { .. } => GenerationError::BalanceOverflow,
            StoreError::Backend(e) => GenerationError::PersistenceFailed(e.to_string()),
        }
    }
}

impl From<validator::ValidationErrors> for GenerationError {
    fn from(err: validator::ValidationErrors) -> Self {
        GenerationError::ValidationFailed(err.to_string())
    }
}

impl IntoResponse for GenerationError {
    fn into_response(self) -> Response {
        let status = self.status();

        match &self {
            GenerationError::GenerationFailed(cause) => {
                tracing::error!(cause = %cause, "Generation failed");
            }
            GenerationError::PersistenceFailed(cause) => {
                tracing::error!(cause = %cause, "Persistence failed");
            }
            GenerationError::GrantNotApplied(cause) => {
                tracing::error!(cause = %cause, "Credit grant not applied");
            }
            _ => {}
        }

        (
            status,
            Json(ErrorResponse::new(self.kind(), self.public_message())),
        )
            .into_response()
    }
}

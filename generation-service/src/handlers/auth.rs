use axum::{extract::State, http::StatusCode, Json};

use crate::dtos::account::{
    ChangePasswordRequest, MessageResponse, ProfileResponse, RegisterRequest,
};
use crate::error::GenerationError;
use crate::extract::ValidatedJson;
use crate::middleware::AuthUser;
use crate::services::credentials;
use crate::utils::password::Password;
use crate::AppState;

/// First sign-in through the identity provider: provision the account if it
/// does not exist yet and stamp the login time.
pub async fn session(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
) -> Result<Json<ProfileResponse>, GenerationError> {
    let account = state
        .accounts
        .find_or_create_by_external_identity(&identity)
        .await?;

    if !account.is_active {
        return Err(GenerationError::AccountDisabled);
    }

    let account = state.accounts.record_login(&account.id).await?;
    tracing::info!(account_id = %account.id, "Session established");

    Ok(Json(account.into()))
}

pub async fn register(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<RegisterRequest>,
) -> Result<(StatusCode, Json<ProfileResponse>), GenerationError> {
    let password = Password::new(req.password);
    let account = credentials::register(
        state.accounts.as_ref(),
        &req.email,
        &password,
        req.display_name,
    )
    .await?;

    Ok((StatusCode::CREATED, Json(account.into())))
}

pub async fn change_password(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<ChangePasswordRequest>,
) -> Result<Json<MessageResponse>, GenerationError> {
    credentials::change_password(
        state.accounts.as_ref(),
        &req.email,
        &Password::new(req.current_password),
        &Password::new(req.new_password),
    )
    .await?;

    Ok(Json(MessageResponse {
        message: "Password updated".to_string(),
    }))
}

use axum::{
    extract::{Path, State},
    Json,
};

use crate::dtos::account::{BillingRequest, ProfileResponse, SettingsRequest};
use crate::error::GenerationError;
use crate::extract::ValidatedJson;
use crate::middleware::AuthUser;
use crate::models::Account;
use crate::services::identity::VerifiedIdentity;
use crate::services::{PreferencesUpdate, StoreError};
use crate::AppState;

async fn current_account(
    state: &AppState,
    identity: &VerifiedIdentity,
) -> Result<Account, GenerationError> {
    state
        .accounts
        .find_by_subject(&identity.subject_id)
        .await?
        .ok_or(GenerationError::AccountNotFound)
}

pub async fn get_me(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
) -> Result<Json<ProfileResponse>, GenerationError> {
    let account = current_account(&state, &identity).await?;
    Ok(Json(account.into()))
}

pub async fn update_settings(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    ValidatedJson(req): ValidatedJson<SettingsRequest>,
) -> Result<Json<ProfileResponse>, GenerationError> {
    let account = current_account(&state, &identity).await?;
    let update = PreferencesUpdate::from(req);

    let account = state.accounts.update_preferences(&account.id, &update).await?;
    tracing::info!(account_id = %account.id, "Preferences updated");

    Ok(Json(account.into()))
}

/// Billing-system hook: record subscription references and grant credits.
///
/// References are written first and setting them again is harmless. A grant
/// that fails after that is reported as `GrantNotApplied`: the references are
/// stored and only the grant is outstanding.
pub async fn update_billing(
    State(state): State<AppState>,
    Path(account_id): Path<String>,
    ValidatedJson(req): ValidatedJson<BillingRequest>,
) -> Result<Json<ProfileResponse>, GenerationError> {
    let mut account = state.accounts.update_billing(&account_id, &req.update()).await?;

    if let Some(grant) = req.credits.filter(|c| *c > 0) {
        account.credits = state
            .accounts
            .adjust_balance(&account_id, grant)
            .await
            .map_err(|e| match e {
                StoreError::Backend(cause) => GenerationError::GrantNotApplied(cause.to_string()),
                other => other.into(),
            })?;
        tracing::info!(account_id = %account_id, grant, balance = account.credits, "Credits granted");
    }

    tracing::info!(
        account_id = %account_id,
        tier = account.tier.as_str(),
        "Billing references updated"
    );

    Ok(Json(account.into()))
}

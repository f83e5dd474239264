//! Email/password accounts: registration, credential checks and password
//! changes. Hashing is always an explicit step here, never a store side effect.

use crate::error::GenerationError;
use crate::models::Account;
use crate::services::accounts::AccountStore;
use crate::utils::password::{hash_password, verify_password, Password, PasswordHashString};

/// Create an email/password account with a freshly hashed password.
pub async fn register(
    store: &dyn AccountStore,
    email: &str,
    password: &Password,
    display_name: Option<String>,
) -> Result<Account, GenerationError> {
    if store.find_by_email(email).await?.is_some() {
        return Err(GenerationError::DuplicateAccount);
    }

    let hash = hash_password(password)
        .map_err(|e| GenerationError::PersistenceFailed(e.to_string()))?;

    let account = store
        .create(Account::with_password(email, hash.into_string(), display_name))
        .await?;

    tracing::info!(account_id = %account.id, "Registered email account");
    Ok(account)
}

/// Return the active account matching the email and password.
///
/// Unknown emails, wrong passwords and identity-provider accounts all fail
/// with `InvalidCredential`.
pub async fn verify_credentials(
    store: &dyn AccountStore,
    email: &str,
    password: &Password,
) -> Result<Account, GenerationError> {
    let account = store
        .find_by_email(email)
        .await?
        .ok_or(GenerationError::InvalidCredential)?;

    let stored = account
        .credential
        .password_hash()
        .map(|hash| PasswordHashString::new(hash.to_string()))
        .ok_or(GenerationError::InvalidCredential)?;

    verify_password(password, &stored).map_err(|_| {
        tracing::debug!(account_id = %account.id, "Password mismatch");
        GenerationError::InvalidCredential
    })?;

    if !account.is_active {
        return Err(GenerationError::AccountDisabled);
    }

    Ok(account)
}

/// Replace the password after checking the current one.
pub async fn change_password(
    store: &dyn AccountStore,
    email: &str,
    current: &Password,
    new_password: &Password,
) -> Result<Account, GenerationError> {
    let account = verify_credentials(store, email, current).await?;

    let hash = hash_password(new_password)
        .map_err(|e| GenerationError::PersistenceFailed(e.to_string()))?;
    store.set_password_hash(&account.id, hash.as_str()).await?;

    tracing::info!(account_id = %account.id, "Password changed");
    Ok(account)
}

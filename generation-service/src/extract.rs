use axum::{
    extract::{FromRequest, Request},
    Json,
};
use serde::de::DeserializeOwned;
use validator::Validate;

use crate::error::GenerationError;

/// JSON body that has been deserialized and validated. Malformed bodies and
/// failed validation both surface as `ValidationFailed`.
pub struct ValidatedJson<T>(pub T);

#[axum::async_trait]
impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = GenerationError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| GenerationError::ValidationFailed(rejection.body_text()))?;

        value.validate()?;
        Ok(ValidatedJson(value))
    }
}

use axum::{
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::Response,
};

use crate::error::GenerationError;
use crate::services::identity::{bearer_token, VerifiedIdentity};
use crate::AppState;

/// Require a verified bearer credential. The identity is stored in the request
/// extensions for the handler.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, GenerationError> {
    let token = bearer_token(req.headers())?;
    let identity = state.verifier.verify(token).await?;

    tracing::debug!(subject_id = %identity.subject_id, "Authenticated request");
    req.extensions_mut().insert(identity);

    Ok(next.run(req).await)
}

/// Extractor for the identity placed by [`auth_middleware`].
pub struct AuthUser(pub VerifiedIdentity);

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = GenerationError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<VerifiedIdentity>()
            .cloned()
            .map(AuthUser)
            .ok_or(GenerationError::Unauthenticated)
    }
}

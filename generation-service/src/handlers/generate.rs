use axum::{
    extract::{Query, State},
    Json,
};

use crate::dtos::generate::{
    DocumentRequest, DocumentResponse, HistoryQuery, HistoryResponse, TextRequest, TextResponse,
};
use crate::error::GenerationError;
use crate::extract::ValidatedJson;
use crate::middleware::AuthUser;
use crate::services::PageRequest;
use crate::AppState;

pub async fn generate_text(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    ValidatedJson(req): ValidatedJson<TextRequest>,
) -> Result<Json<TextResponse>, GenerationError> {
    let outcome = state
        .gateway
        .generate_text(Some(&identity), req.into())
        .await?;

    Ok(Json(TextResponse {
        success: true,
        text: outcome.content,
        credits_remaining: outcome.credits_remaining,
    }))
}

pub async fn generate_document(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    ValidatedJson(req): ValidatedJson<DocumentRequest>,
) -> Result<Json<DocumentResponse>, GenerationError> {
    let outcome = state
        .gateway
        .generate_document(Some(&identity), req.into())
        .await?;

    Ok(Json(DocumentResponse::new(
        outcome.content,
        outcome.credits_remaining,
    )))
}

pub async fn history(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<HistoryResponse>, GenerationError> {
    let page = PageRequest::from_query(query.page.as_deref(), query.limit.as_deref());
    let history = state.gateway.history(Some(&identity), page).await?;

    Ok(Json(history.into()))
}

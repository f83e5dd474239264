//! Caller identity verification.
//!
//! Bearer tokens are issued by Firebase Authentication. The verifier checks
//! them against Google's published signing keys and yields the verified
//! subject. Handlers only ever see a [`VerifiedIdentity`].

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use axum::http::{header, HeaderMap};
use jsonwebtoken::{decode, decode_header, jwk::JwkSet, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::config::IdentityConfig;

/// Claims the rest of the service relies on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedIdentity {
    pub subject_id: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
}

#[derive(Error, Debug)]
pub enum IdentityError {
    #[error("Missing bearer credential")]
    MissingCredential,

    #[error("Invalid credential: {0}")]
    InvalidCredential(String),

    #[error("Identity provider unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    /// Verify a raw bearer token.
    async fn verify(&self, token: &str) -> Result<VerifiedIdentity, IdentityError>;
}

/// Extract the token from an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, IdentityError> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or(IdentityError::MissingCredential)
}

/// Claims carried by a Firebase ID token.
#[derive(Debug, Deserialize)]
struct FirebaseClaims {
    sub: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

struct CachedKeys {
    keys: JwkSet,
    fetched_at: Instant,
}

/// Verifies Firebase ID tokens (RS256) against the project's JWKS.
pub struct FirebaseVerifier {
    client: reqwest::Client,
    jwks_url: String,
    project_id: String,
    issuer: String,
    cache_ttl: Duration,
    cache: RwLock<Option<CachedKeys>>,
}

/// Minimum age of the key cache before an unknown `kid` triggers a refetch.
const REFRESH_COOLDOWN: Duration = Duration::from_secs(60);

impl FirebaseVerifier {
    pub fn new(config: &IdentityConfig) -> Result<Self, anyhow::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build identity HTTP client: {}", e))?;

        tracing::info!(
            project_id = %config.project_id,
            jwks_url = %config.jwks_url,
            "Firebase identity verifier initialized"
        );

        Ok(Self {
            client,
            jwks_url: config.jwks_url.clone(),
            project_id: config.project_id.clone(),
            issuer: format!("https://securetoken.google.com/{}", config.project_id),
            cache_ttl: Duration::from_secs(config.key_cache_ttl_secs),
            cache: RwLock::new(None),
        })
    }

    async fn fetch_keys(&self) -> Result<JwkSet, IdentityError> {
        let response = self
            .client
            .get(&self.jwks_url)
            .send()
            .await
            .map_err(|e| IdentityError::Unavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(IdentityError::Unavailable(format!(
                "key endpoint returned {}",
                response.status()
            )));
        }

        response
            .json::<JwkSet>()
            .await
            .map_err(|e| IdentityError::Unavailable(format!("malformed key set: {}", e)))
    }

    /// Resolve the decoding key for `kid`, refreshing the cache when it is
    /// stale or the key is unknown.
    async fn decoding_key(&self, kid: &str) -> Result<DecodingKey, IdentityError> {
        {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.as_ref() {
                let age = cached.fetched_at.elapsed();
                if age < self.cache_ttl {
                    if let Some(jwk) = cached.keys.find(kid) {
                        return DecodingKey::from_jwk(jwk)
                            .map_err(|e| IdentityError::InvalidCredential(e.to_string()));
                    }
                    if age < REFRESH_COOLDOWN {
                        return Err(IdentityError::InvalidCredential(
                            "unknown signing key".to_string(),
                        ));
                    }
                }
            }
        }

        let keys = self.fetch_keys().await?;
        tracing::debug!(count = keys.keys.len(), "Refreshed identity signing keys");

        let key = keys
            .find(kid)
            .map(DecodingKey::from_jwk)
            .transpose()
            .map_err(|e| IdentityError::InvalidCredential(e.to_string()))?;

        *self.cache.write().await = Some(CachedKeys {
            keys,
            fetched_at: Instant::now(),
        });

        key.ok_or_else(|| IdentityError::InvalidCredential("unknown signing key".to_string()))
    }
}

#[async_trait]
impl IdentityVerifier for FirebaseVerifier {
    async fn verify(&self, token: &str) -> Result<VerifiedIdentity, IdentityError> {
        let header =
            decode_header(token).map_err(|e| IdentityError::InvalidCredential(e.to_string()))?;

        if header.alg != Algorithm::RS256 {
            return Err(IdentityError::InvalidCredential(format!(
                "unexpected algorithm {:?}",
                header.alg
            )));
        }

        let kid = header
            .kid
            .ok_or_else(|| IdentityError::InvalidCredential("missing key id".to_string()))?;

        let key = self.decoding_key(&kid).await?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[&self.project_id]);
        validation.set_issuer(&[&self.issuer]);

        let data = decode::<FirebaseClaims>(token, &key, &validation)
            .map_err(|e| IdentityError::InvalidCredential(e.to_string()))?;

        if data.claims.sub.is_empty() {
            return Err(IdentityError::InvalidCredential("empty subject".to_string()));
        }

        Ok(VerifiedIdentity {
            subject_id: data.claims.sub,
            email: data.claims.email,
            display_name: data.claims.name,
        })
    }
}

/// Verifier backed by a fixed token table. Used by tests and local
/// development where no identity provider is reachable.
#[derive(Default)]
pub struct StaticIdentityVerifier {
    tokens: Mutex<HashMap<String, VerifiedIdentity>>,
}

impl StaticIdentityVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(self, token: &str, identity: VerifiedIdentity) -> Self {
        self.insert(token, identity);
        self
    }

    pub fn insert(&self, token: &str, identity: VerifiedIdentity) {
        if let Ok(mut tokens) = self.tokens.lock() {
            tokens.insert(token.to_string(), identity);
        }
    }
}

#[async_trait]
impl IdentityVerifier for StaticIdentityVerifier {
    async fn verify(&self, token: &str) -> Result<VerifiedIdentity, IdentityError> {
        let tokens = self
            .tokens
            .lock()
            .map_err(|_| IdentityError::Unavailable("token table poisoned".to_string()))?;

        tokens
            .get(token)
            .cloned()
            .ok_or_else(|| IdentityError::InvalidCredential("unknown token".to_string()))
    }
}

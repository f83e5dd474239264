use secrecy::Secret;
use serde::Deserialize;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;

const DEFAULT_ALLOWED_ORIGIN: &str = "http://localhost:3000";
const DEFAULT_JWKS_URL: &str =
    "https://www.googleapis.com/service_accounts/v1/jwk/securetoken@system.gserviceaccount.com";

#[derive(Debug, Clone, Deserialize)]
pub struct GenerationConfig {
    #[serde(flatten)]
    pub common: core_config::Config,
    pub mongodb: MongoConfig,
    pub openai: OpenAiConfig,
    pub generation: GenerationSettings,
    pub identity: IdentityConfig,
    pub http: HttpConfig,
    pub admin: AdminConfig,
    pub otlp_endpoint: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MongoConfig {
    pub uri: String,
    pub database: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OpenAiConfig {
    pub api_key: Secret<String>,
    pub model: String,
    pub base_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenerationSettings {
    /// Upper bound on a single provider call.
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IdentityConfig {
    pub project_id: String,
    pub jwks_url: String,
    pub timeout_secs: u64,
    pub key_cache_ttl_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    pub allowed_origins: Vec<String>,
    pub rate_limit_requests: u32,
    pub rate_limit_window_secs: u64,
    pub body_limit_bytes: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec![DEFAULT_ALLOWED_ORIGIN.to_string()],
            rate_limit_requests: 100,
            rate_limit_window_secs: 900,
            body_limit_bytes: 10 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AdminConfig {
    /// Shared key for the billing hook. Unset disables the hook.
    pub api_key: Option<Secret<String>>,
}

impl GenerationConfig {
    pub fn load() -> Result<Self, AppError> {
        let mut common_config = core_config::Config::load()?;
        let is_prod = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string()) == "prod";

        if let Some(level) = get_optional_env("LOG_LEVEL") {
            common_config.log_level = level;
        }

        let allowed_origins = match get_optional_env("ALLOWED_ORIGINS") {
            Some(list) => parse_list(&list),
            None => vec![get_env("FRONTEND_URL", Some(DEFAULT_ALLOWED_ORIGIN), is_prod)?],
        };

        Ok(GenerationConfig {
            common: common_config,
            mongodb: MongoConfig {
                uri: get_env("MONGODB_URI", None, is_prod)?,
                database: get_env("MONGODB_DATABASE", Some("lovableclone"), is_prod)?,
            },
            openai: OpenAiConfig {
                api_key: Secret::new(get_env("OPENAI_API_KEY", None, is_prod)?),
                model: get_env("OPENAI_MODEL", Some("gpt-3.5-turbo"), is_prod)?,
                base_url: get_env("OPENAI_BASE_URL", Some("https://api.openai.com/v1"), is_prod)?,
            },
            generation: GenerationSettings {
                timeout_secs: parse_number("GENERATION_TIMEOUT_SECS", 30, is_prod)?,
            },
            identity: IdentityConfig {
                project_id: get_env("FIREBASE_PROJECT_ID", None, is_prod)?,
                jwks_url: get_env("FIREBASE_JWKS_URL", Some(DEFAULT_JWKS_URL), is_prod)?,
                timeout_secs: parse_number("IDENTITY_TIMEOUT_SECS", 10, is_prod)?,
                key_cache_ttl_secs: parse_number("IDENTITY_KEY_CACHE_TTL_SECS", 3600, is_prod)?,
            },
            http: HttpConfig {
                allowed_origins,
                rate_limit_requests: parse_number("RATE_LIMIT_REQUESTS", 100, is_prod)?,
                rate_limit_window_secs: parse_number("RATE_LIMIT_WINDOW_SECS", 900, is_prod)?,
                body_limit_bytes: parse_number("BODY_LIMIT_BYTES", 10 * 1024 * 1024, is_prod)?,
            },
            admin: AdminConfig {
                api_key: if is_prod {
                    Some(Secret::new(get_env("ADMIN_API_KEY", None, is_prod)?))
                } else {
                    get_optional_env("ADMIN_API_KEY").map(Secret::new)
                },
            },
            otlp_endpoint: get_optional_env("OTLP_ENDPOINT"),
        })
    }
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required in production but not set",
                    key
                )))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required but not set",
                    key
                )))
            }
        }
    }
}

fn get_optional_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Numeric settings keep their default outside production even when set to
/// garbage; production refuses to start.
fn parse_number<T>(key: &str, default: T, is_prod: bool) -> Result<T, AppError>
where
    T: std::str::FromStr + ToString + Copy,
{
    let raw = get_env(key, Some(&default.to_string()), is_prod)?;
    match raw.trim().parse() {
        Ok(value) => Ok(value),
        Err(_) if !is_prod => {
            tracing::warn!(key, value = %raw, "Invalid numeric setting, using default");
            Ok(default)
        }
        Err(_) => Err(AppError::ConfigError(anyhow::anyhow!(
            "{} must be a number, got {:?}",
            key,
            raw
        ))),
    }
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

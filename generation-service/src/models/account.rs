//! Account model: one persisted record per registered user.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Credits granted to every new account.
pub const SIGNUP_CREDITS: i64 = 5;

/// Identity provider name recorded for externally authenticated accounts.
pub const FIREBASE_PROVIDER: &str = "firebase";

/// Subscription tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    #[default]
    Free,
    Basic,
    Premium,
    Enterprise,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Free => "free",
            Tier::Basic => "basic",
            Tier::Premium => "premium",
            Tier::Enterprise => "enterprise",
        }
    }
}

/// How the account proves who it is. Email/password accounts carry a salted
/// hash; identity-provider accounts carry the provider's subject id instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Credential {
    EmailPassword { password_hash: String },
    ExternalIdentity { provider: String, subject_id: String },
}

impl Credential {
    pub fn subject_id(&self) -> Option<&str> {
        match self {
            Credential::ExternalIdentity { subject_id, .. } => Some(subject_id),
            Credential::EmailPassword { .. } => None,
        }
    }

    pub fn password_hash(&self) -> Option<&str> {
        match self {
            Credential::EmailPassword { password_hash } => Some(password_hash),
            Credential::ExternalIdentity { .. } => None,
        }
    }
}

/// Opaque references owned by the payments collaborator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingReferences {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscription_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPreferences {
    pub email: bool,
    pub promotional: bool,
}

impl Default for NotificationPreferences {
    fn default() -> Self {
        Self {
            email: true,
            promotional: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {
    pub language: String,
    pub dark_mode: bool,
    #[serde(default)]
    pub notifications: NotificationPreferences,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            language: "fr".to_string(),
            dark_mode: false,
            notifications: NotificationPreferences::default(),
        }
    }
}

/// Persisted account document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    #[serde(rename = "_id")]
    pub id: String,

    /// Lower-cased, trimmed. Required for email/password accounts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    pub credential: Credential,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,

    /// Credit balance. Never negative.
    pub credits: i64,

    #[serde(default)]
    pub tier: Tier,

    #[serde(default)]
    pub billing: BillingReferences,

    #[serde(default)]
    pub settings: Preferences,

    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,

    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub updated_at: DateTime<Utc>,

    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub last_login: Option<DateTime<Utc>>,

    /// Usage records whose debit has been credited back.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub refunded_records: Vec<String>,

    pub is_active: bool,
}

impl Account {
    fn new(email: Option<String>, credential: Credential, display_name: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            email: email.map(|e| normalize_email(&e)),
            credential,
            display_name: display_name
                .map(|n| n.trim().to_string())
                .filter(|n| !n.is_empty()),
            avatar: None,
            credits: SIGNUP_CREDITS,
            tier: Tier::Free,
            billing: BillingReferences::default(),
            settings: Preferences::default(),
            created_at: now,
            updated_at: now,
            last_login: None,
            refunded_records: Vec::new(),
            is_active: true,
        }
    }

    /// Account created through email/password registration. The caller hashes
    /// the password before building the account.
    pub fn with_password(email: &str, password_hash: String, display_name: Option<String>) -> Self {
        Self::new(
            Some(email.to_string()),
            Credential::EmailPassword { password_hash },
            display_name,
        )
    }

    /// Account provisioned on first login through the identity provider.
    pub fn with_external_identity(
        provider: &str,
        subject_id: &str,
        email: Option<String>,
        display_name: Option<String>,
    ) -> Self {
        Self::new(
            email,
            Credential::ExternalIdentity {
                provider: provider.to_string(),
                subject_id: subject_id.to_string(),
            },
            display_name,
        )
    }

    pub fn subject_id(&self) -> Option<&str> {
        self.credential.subject_id()
    }
}

/// Emails are unique case-insensitively, so they are stored folded.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_accounts_get_signup_defaults() {
        let account = Account::with_external_identity(
            FIREBASE_PROVIDER,
            "uid-123",
            Some("  Ada@Example.COM ".to_string()),
            Some("Ada".to_string()),
        );

        assert_eq!(account.credits, SIGNUP_CREDITS);
        assert_eq!(account.tier, Tier::Free);
        assert_eq!(account.email.as_deref(), Some("ada@example.com"));
        assert_eq!(account.subject_id(), Some("uid-123"));
        assert!(account.is_active);
        assert!(account.last_login.is_none());
        assert_eq!(account.settings.language, "fr");
        assert!(account.settings.notifications.email);
        assert!(!account.settings.notifications.promotional);
    }

    #[test]
    fn password_accounts_have_no_subject() {
        let account = Account::with_password("bob@example.com", "$argon2id$hash".to_string(), None);

        assert!(account.subject_id().is_none());
        assert_eq!(account.credential.password_hash(), Some("$argon2id$hash"));
    }

    #[test]
    fn credential_is_tagged_in_storage() {
        let credential = Credential::ExternalIdentity {
            provider: FIREBASE_PROVIDER.to_string(),
            subject_id: "uid-1".to_string(),
        };

        let value = serde_json::to_value(&credential).unwrap();
        assert_eq!(value["kind"], "external_identity");
        assert_eq!(value["subject_id"], "uid-1");
    }
}

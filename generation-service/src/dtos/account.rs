use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::{Account, Preferences, Tier};
use crate::services::{BillingUpdate, PreferencesUpdate};

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[serde(default)]
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[serde(default)]
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,

    #[validate(length(max = 100, message = "Display name is too long"))]
    pub display_name: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    #[serde(default)]
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[serde(default)]
    #[validate(length(min = 1, message = "Current password is required"))]
    pub current_password: String,

    #[serde(default)]
    #[validate(length(min = 8, message = "New password must be at least 8 characters"))]
    pub new_password: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct NotificationSettingsRequest {
    pub email: Option<bool>,
    pub promotional: Option<bool>,
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SettingsRequest {
    #[validate(length(min = 2, max = 16, message = "Invalid language code"))]
    pub language: Option<String>,
    pub dark_mode: Option<bool>,
    #[serde(default)]
    pub notifications: NotificationSettingsRequest,
}

impl From<SettingsRequest> for PreferencesUpdate {
    fn from(req: SettingsRequest) -> Self {
        Self {
            language: req.language.map(|l| l.trim().to_lowercase()),
            dark_mode: req.dark_mode,
            email_notifications: req.notifications.email,
            promotional_notifications: req.notifications.promotional,
        }
    }
}

/// Pushed by the billing system after a subscription change or purchase.
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct BillingRequest {
    #[validate(length(min = 1, message = "Subscription id must not be empty"))]
    pub subscription_id: Option<String>,
    #[validate(length(min = 1, message = "Customer id must not be empty"))]
    pub customer_id: Option<String>,
    pub subscription: Option<Tier>,
    /// Credits to add to the balance, at most one million per call.
    #[validate(range(
        min = 0,
        max = 1_000_000,
        message = "Credit grant must be between 0 and 1000000"
    ))]
    pub credits: Option<i64>,
}

impl BillingRequest {
    pub fn update(&self) -> BillingUpdate {
        BillingUpdate {
            subscription_id: self.subscription_id.clone(),
            customer_id: self.customer_id.clone(),
            tier: self.subscription,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationSettings {
    pub email: bool,
    pub promotional: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsView {
    pub language: String,
    pub dark_mode: bool,
    pub notifications: NotificationSettings,
}

impl From<Preferences> for SettingsView {
    fn from(prefs: Preferences) -> Self {
        Self {
            language: prefs.language,
            dark_mode: prefs.dark_mode,
            notifications: NotificationSettings {
                email: prefs.notifications.email,
                promotional: prefs.notifications.promotional,
            },
        }
    }
}

/// Public projection of an account. Credentials and billing ids stay
/// server-side.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileResponse {
    pub id: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub avatar: Option<String>,
    pub credits: i64,
    pub subscription: Tier,
    pub settings: SettingsView,
    pub last_login: Option<String>,
    pub created_at: String,
}

impl From<Account> for ProfileResponse {
    fn from(account: Account) -> Self {
        Self {
            id: account.id,
            email: account.email,
            display_name: account.display_name,
            avatar: account.avatar,
            credits: account.credits,
            subscription: account.tier,
            settings: account.settings.into(),
            last_login: account.last_login.map(|t| t.to_rfc3339()),
            created_at: account.created_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_request_is_validated() {
        let req: RegisterRequest =
            serde_json::from_str(r#"{"email":"not-an-email","password":"short"}"#).unwrap();
        let errors = req.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("email"));
        assert!(fields.contains_key("password"));
    }

    #[test]
    fn settings_request_maps_nested_notifications() {
        let req: SettingsRequest = serde_json::from_str(
            r#"{"language":" EN ","darkMode":true,"notifications":{"promotional":true}}"#,
        )
        .unwrap();
        let update = PreferencesUpdate::from(req);

        assert_eq!(update.language.as_deref(), Some("en"));
        assert_eq!(update.dark_mode, Some(true));
        assert_eq!(update.email_notifications, None);
        assert_eq!(update.promotional_notifications, Some(true));
    }

    #[test]
    fn negative_credit_grant_is_rejected() {
        let req: BillingRequest = serde_json::from_str(r#"{"credits":-5}"#).unwrap();
        assert!(req.validate().is_err());
    }

    #[test]
    fn oversized_credit_grant_is_rejected() {
        let req: BillingRequest =
            serde_json::from_str(&format!(r#"{{"credits":{}}}"#, i64::MAX)).unwrap();
        assert!(req.validate().is_err());

        let req: BillingRequest = serde_json::from_str(r#"{"credits":1000000}"#).unwrap();
        assert!(req.validate().is_ok());
    }

    #[test]
    fn profile_hides_the_credential() {
        let account = Account::with_password("a@example.com", "$argon2id$secret".to_string(), None);
        let json = serde_json::to_value(ProfileResponse::from(account)).unwrap();

        assert!(json.get("credential").is_none());
        assert!(!json.to_string().contains("argon2"));
        assert_eq!(json["subscription"], "free");
        assert_eq!(json["credits"], 5);
        assert_eq!(json["settings"]["darkMode"], false);
    }
}

//! Account store: persistence for accounts and their credit balances.

use async_trait::async_trait;
use chrono::Utc;
use mongodb::{
    bson::{doc, Document},
    options::{FindOneAndUpdateOptions, ReturnDocument},
    Collection,
};
use thiserror::Error;

use crate::models::account::{normalize_email, FIREBASE_PROVIDER};
use crate::models::{Account, Preferences, Tier};
use crate::services::database::{is_duplicate_key, observe, GenerationDb, ACCOUNTS_COLLECTION};
use crate::services::identity::VerifiedIdentity;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Account not found")]
    NotFound,

    #[error("An account with this identity already exists")]
    DuplicateAccount,

    #[error("Adjustment of {delta} would take balance {balance} below zero")]
    WouldUnderflow { balance: i64, delta: i64 },

    #[error("Adjustment of {delta} would overflow balance {balance}")]
    WouldOverflow { balance: i64, delta: i64 },

    #[error("Storage backend error: {0}")]
    Backend(#[from] anyhow::Error),
}

impl From<mongodb::error::Error> for StoreError {
    fn from(err: mongodb::error::Error) -> Self {
        StoreError::Backend(anyhow::Error::new(err))
    }
}

/// Partial preference update. Absent fields keep their stored value.
#[derive(Debug, Clone, Default)]
pub struct PreferencesUpdate {
    pub language: Option<String>,
    pub dark_mode: Option<bool>,
    pub email_notifications: Option<bool>,
    pub promotional_notifications: Option<bool>,
}

impl PreferencesUpdate {
    pub fn is_empty(&self) -> bool {
        self.language.is_none()
            && self.dark_mode.is_none()
            && self.email_notifications.is_none()
            && self.promotional_notifications.is_none()
    }

    pub fn apply(&self, preferences: &mut Preferences) {
        if let Some(language) = &self.language {
            preferences.language = language.clone();
        }
        if let Some(dark_mode) = self.dark_mode {
            preferences.dark_mode = dark_mode;
        }
        if let Some(email) = self.email_notifications {
            preferences.notifications.email = email;
        }
        if let Some(promotional) = self.promotional_notifications {
            preferences.notifications.promotional = promotional;
        }
    }

    fn to_set_document(&self) -> Document {
        let mut set = Document::new();
        if let Some(language) = &self.language {
            set.insert("settings.language", language.as_str());
        }
        if let Some(dark_mode) = self.dark_mode {
            set.insert("settings.dark_mode", dark_mode);
        }
        if let Some(email) = self.email_notifications {
            set.insert("settings.notifications.email", email);
        }
        if let Some(promotional) = self.promotional_notifications {
            set.insert("settings.notifications.promotional", promotional);
        }
        set
    }
}

/// Changes pushed by the billing collaborator.
#[derive(Debug, Clone, Default)]
pub struct BillingUpdate {
    pub subscription_id: Option<String>,
    pub customer_id: Option<String>,
    pub tier: Option<Tier>,
}

impl BillingUpdate {
    pub fn is_empty(&self) -> bool {
        self.subscription_id.is_none() && self.customer_id.is_none() && self.tier.is_none()
    }

    pub fn apply(&self, account: &mut Account) {
        if let Some(subscription_id) = &self.subscription_id {
            account.billing.subscription_id = Some(subscription_id.clone());
        }
        if let Some(customer_id) = &self.customer_id {
            account.billing.customer_id = Some(customer_id.clone());
        }
        if let Some(tier) = self.tier {
            account.tier = tier;
        }
    }

    fn to_set_document(&self) -> Document {
        let mut set = Document::new();
        if let Some(subscription_id) = &self.subscription_id {
            set.insert("billing.subscription_id", subscription_id.as_str());
        }
        if let Some(customer_id) = &self.customer_id {
            set.insert("billing.customer_id", customer_id.as_str());
        }
        if let Some(tier) = self.tier {
            set.insert("tier", tier.as_str());
        }
        set
    }
}

#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Insert a new account. Email collisions yield `DuplicateAccount`.
    async fn create(&self, account: Account) -> Result<Account, StoreError>;

    /// Return the account linked to the external identity, creating it with
    /// signup defaults on first sight.
    async fn find_or_create_by_external_identity(
        &self,
        identity: &VerifiedIdentity,
    ) -> Result<Account, StoreError>;

    async fn find_by_id(&self, id: &str) -> Result<Option<Account>, StoreError>;

    /// Case-insensitive lookup.
    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, StoreError>;

    async fn find_by_subject(&self, subject_id: &str) -> Result<Option<Account>, StoreError>;

    /// Atomically add `delta` (negative to debit) to the balance and return
    /// the new balance. An adjustment that would go below zero or past
    /// `i64::MAX` is rejected without being applied.
    async fn adjust_balance(&self, id: &str, delta: i64) -> Result<i64, StoreError>;

    /// Credit back the debit behind `record_id` and return the new balance.
    /// Applied at most once per record, so a retried refund never credits
    /// twice.
    async fn refund_debit(&self, id: &str, record_id: &str, credits: i64)
        -> Result<i64, StoreError>;

    async fn update_preferences(
        &self,
        id: &str,
        update: &PreferencesUpdate,
    ) -> Result<Account, StoreError>;

    async fn update_billing(&self, id: &str, update: &BillingUpdate) -> Result<Account, StoreError>;

    async fn record_login(&self, id: &str) -> Result<Account, StoreError>;

    /// Replace the stored hash of an email/password account.
    async fn set_password_hash(&self, id: &str, password_hash: &str) -> Result<(), StoreError>;

    async fn health_check(&self) -> Result<(), StoreError>;
}

#[derive(Clone)]
pub struct MongoAccountStore {
    db: GenerationDb,
}

impl MongoAccountStore {
    pub fn new(db: GenerationDb) -> Self {
        Self { db }
    }

    fn collection(&self) -> Collection<Account> {
        self.db.accounts()
    }

    fn after_update() -> FindOneAndUpdateOptions {
        FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build()
    }

    async fn set_fields(
        &self,
        operation: &str,
        id: &str,
        mut set: Document,
    ) -> Result<Account, StoreError> {
        set.insert("updated_at", Utc::now().timestamp_millis());

        observe(
            operation,
            ACCOUNTS_COLLECTION,
            self.collection().find_one_and_update(
                doc! { "_id": id },
                doc! { "$set": set },
                Self::after_update(),
            ),
        )
        .await?
        .ok_or(StoreError::NotFound)
    }
}

#[async_trait]
impl AccountStore for MongoAccountStore {
    async fn create(&self, account: Account) -> Result<Account, StoreError> {
        match observe(
            "insert",
            ACCOUNTS_COLLECTION,
            self.collection().insert_one(&account, None),
        )
        .await
        {
            Ok(_) => {
                tracing::info!(account_id = %account.id, "Account created");
                Ok(account)
            }
            Err(e) if is_duplicate_key(&e) => Err(StoreError::DuplicateAccount),
            Err(e) => Err(e.into()),
        }
    }

    async fn find_or_create_by_external_identity(
        &self,
        identity: &VerifiedIdentity,
    ) -> Result<Account, StoreError> {
        if let Some(existing) = self.find_by_subject(&identity.subject_id).await? {
            return Ok(existing);
        }

        let account = Account::with_external_identity(
            FIREBASE_PROVIDER,
            &identity.subject_id,
            identity.email.clone(),
            identity.display_name.clone(),
        );

        match self.create(account).await {
            Ok(account) => Ok(account),
            // A concurrent first login may have inserted the same subject
            Err(StoreError::DuplicateAccount) => self
                .find_by_subject(&identity.subject_id)
                .await?
                .ok_or(StoreError::DuplicateAccount),
            Err(e) => Err(e),
        }
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Account>, StoreError> {
        Ok(observe(
            "find_by_id",
            ACCOUNTS_COLLECTION,
            self.collection().find_one(doc! { "_id": id }, None),
        )
        .await?)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, StoreError> {
        Ok(observe(
            "find_by_email",
            ACCOUNTS_COLLECTION,
            self.collection()
                .find_one(doc! { "email": normalize_email(email) }, None),
        )
        .await?)
    }

    async fn find_by_subject(&self, subject_id: &str) -> Result<Option<Account>, StoreError> {
        Ok(observe(
            "find_by_subject",
            ACCOUNTS_COLLECTION,
            self.collection()
                .find_one(doc! { "credential.subject_id": subject_id }, None),
        )
        .await?)
    }

    async fn adjust_balance(&self, id: &str, delta: i64) -> Result<i64, StoreError> {
        // The bound check and the increment happen in one document update
        let filter = if delta < 0 {
            doc! { "_id": id, "credits": { "$gte": -delta } }
        } else {
            doc! { "_id": id, "credits": { "$lte": i64::MAX - delta } }
        };
        let update = doc! {
            "$inc": { "credits": delta },
            "$set": { "updated_at": Utc::now().timestamp_millis() },
        };

        let updated = observe(
            "adjust_balance",
            ACCOUNTS_COLLECTION,
            self.collection()
                .find_one_and_update(filter, update, Self::after_update()),
        )
        .await?;

        match updated {
            Some(account) => Ok(account.credits),
            None => match self.find_by_id(id).await? {
                Some(account) if delta > 0 => Err(StoreError::WouldOverflow {
                    balance: account.credits,
                    delta,
                }),
                Some(account) => Err(StoreError::WouldUnderflow {
                    balance: account.credits,
                    delta,
                }),
                None => Err(StoreError::NotFound),
            },
        }
    }

    async fn refund_debit(
        &self,
        id: &str,
        record_id: &str,
        credits: i64,
    ) -> Result<i64, StoreError> {
        let filter = doc! {
            "_id": id,
            "refunded_records": { "$ne": record_id },
            "credits": { "$lte": i64::MAX - credits },
        };
        let update = doc! {
            "$inc": { "credits": credits },
            "$push": { "refunded_records": record_id },
            "$set": { "updated_at": Utc::now().timestamp_millis() },
        };

        let updated = observe(
            "refund_debit",
            ACCOUNTS_COLLECTION,
            self.collection()
                .find_one_and_update(filter, update, Self::after_update()),
        )
        .await?;

        if let Some(account) = updated {
            return Ok(account.credits);
        }

        match self.find_by_id(id).await? {
            Some(account) if account.refunded_records.iter().any(|r| r == record_id) => {
                tracing::debug!(account_id = %id, record_id, "Debit already refunded");
                Ok(account.credits)
            }
            Some(account) => Err(StoreError::WouldOverflow {
                balance: account.credits,
                delta: credits,
            }),
            None => Err(StoreError::NotFound),
        }
    }

    async fn update_preferences(
        &self,
        id: &str,
        update: &PreferencesUpdate,
    ) -> Result<Account, StoreError> {
        if update.is_empty() {
            return self.find_by_id(id).await?.ok_or(StoreError::NotFound);
        }
        self.set_fields("update_preferences", id, update.to_set_document())
            .await
    }

    async fn update_billing(&self, id: &str, update: &BillingUpdate) -> Result<Account, StoreError> {
        if update.is_empty() {
            return self.find_by_id(id).await?.ok_or(StoreError::NotFound);
        }
        self.set_fields("update_billing", id, update.to_set_document())
            .await
    }

    async fn record_login(&self, id: &str) -> Result<Account, StoreError> {
        self.set_fields(
            "record_login",
            id,
            doc! { "last_login": Utc::now().timestamp_millis() },
        )
        .await
    }

    async fn set_password_hash(&self, id: &str, password_hash: &str) -> Result<(), StoreError> {
        let result = observe(
            "set_password_hash",
            ACCOUNTS_COLLECTION,
            self.collection().update_one(
                doc! { "_id": id, "credential.kind": "email_password" },
                doc! { "$set": {
                    "credential.password_hash": password_hash,
                    "updated_at": Utc::now().timestamp_millis(),
                } },
                None,
            ),
        )
        .await?;

        if result.matched_count == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        self.db
            .health_check()
            .await
            .map_err(|e| StoreError::Backend(anyhow::anyhow!(e.to_string())))
    }
}

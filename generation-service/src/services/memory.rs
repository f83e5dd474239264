//! In-memory store implementations for tests and local development.
//!
//! Each store guards its data with a single mutex, so a balance check and
//! its decrement form one critical section.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;

use crate::models::account::{normalize_email, FIREBASE_PROVIDER};
use crate::models::{Account, Credential, UsageRecord};
use crate::services::accounts::{AccountStore, BillingUpdate, PreferencesUpdate, StoreError};
use crate::services::identity::VerifiedIdentity;
use crate::services::ledger::{PageRequest, UsageLedger};

fn poisoned() -> StoreError {
    StoreError::Backend(anyhow::anyhow!("in-memory store lock poisoned"))
}

#[derive(Default)]
pub struct InMemoryAccountStore {
    accounts: Mutex<HashMap<String, Account>>,
    fail_credits: AtomicBool,
    lost_refund_replies: AtomicUsize,
}

impl InMemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make positive balance adjustments (grants and refunds) fail.
    pub fn set_credit_failure(&self, fail: bool) {
        self.fail_credits.store(fail, Ordering::SeqCst);
    }

    /// Apply the next `count` refunds but report each as a backend error, the
    /// way a write acknowledged after a dropped connection looks to a client.
    pub fn lose_refund_replies(&self, count: usize) {
        self.lost_refund_replies.store(count, Ordering::SeqCst);
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, Account>>, StoreError> {
        self.accounts.lock().map_err(|_| poisoned())
    }

    fn update<F>(&self, id: &str, apply: F) -> Result<Account, StoreError>
    where
        F: FnOnce(&mut Account),
    {
        let mut accounts = self.lock()?;
        let account = accounts.get_mut(id).ok_or(StoreError::NotFound)?;
        apply(account);
        account.updated_at = Utc::now();
        Ok(account.clone())
    }

    fn insert_unique(
        accounts: &mut HashMap<String, Account>,
        account: Account,
    ) -> Result<Account, StoreError> {
        let clash = accounts.values().any(|existing| {
            (account.email.is_some() && existing.email == account.email)
                || (account.subject_id().is_some() && existing.subject_id() == account.subject_id())
        });
        if clash || accounts.contains_key(&account.id) {
            return Err(StoreError::DuplicateAccount);
        }
        accounts.insert(account.id.clone(), account.clone());
        Ok(account)
    }
}

#[async_trait]
impl AccountStore for InMemoryAccountStore {
    async fn create(&self, account: Account) -> Result<Account, StoreError> {
        let mut accounts = self.lock()?;
        Self::insert_unique(&mut accounts, account)
    }

    async fn find_or_create_by_external_identity(
        &self,
        identity: &VerifiedIdentity,
    ) -> Result<Account, StoreError> {
        let mut accounts = self.lock()?;
        if let Some(existing) = accounts
            .values()
            .find(|a| a.subject_id() == Some(identity.subject_id.as_str()))
        {
            return Ok(existing.clone());
        }

        let account = Account::with_external_identity(
            FIREBASE_PROVIDER,
            &identity.subject_id,
            identity.email.clone(),
            identity.display_name.clone(),
        );
        Self::insert_unique(&mut accounts, account)
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Account>, StoreError> {
        Ok(self.lock()?.get(id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, StoreError> {
        let email = normalize_email(email);
        Ok(self
            .lock()?
            .values()
            .find(|a| a.email.as_deref() == Some(email.as_str()))
            .cloned())
    }

    async fn find_by_subject(&self, subject_id: &str) -> Result<Option<Account>, StoreError> {
        Ok(self
            .lock()?
            .values()
            .find(|a| a.subject_id() == Some(subject_id))
            .cloned())
    }

    async fn adjust_balance(&self, id: &str, delta: i64) -> Result<i64, StoreError> {
        if delta > 0 && self.fail_credits.load(Ordering::SeqCst) {
            return Err(StoreError::Backend(anyhow::anyhow!("credit adjustments disabled")));
        }

        let mut accounts = self.lock()?;
        let account = accounts.get_mut(id).ok_or(StoreError::NotFound)?;
        let balance = account.credits;
        let next = balance
            .checked_add(delta)
            .ok_or(StoreError::WouldOverflow { balance, delta })?;
        if next < 0 {
            return Err(StoreError::WouldUnderflow { balance, delta });
        }
        account.credits = next;
        account.updated_at = Utc::now();
        Ok(account.credits)
    }

    async fn refund_debit(
        &self,
        id: &str,
        record_id: &str,
        credits: i64,
    ) -> Result<i64, StoreError> {
        if self.fail_credits.load(Ordering::SeqCst) {
            return Err(StoreError::Backend(anyhow::anyhow!("credit adjustments disabled")));
        }

        let mut accounts = self.lock()?;
        let account = accounts.get_mut(id).ok_or(StoreError::NotFound)?;
        if !account.refunded_records.iter().any(|r| r == record_id) {
            let balance = account.credits;
            account.credits = balance
                .checked_add(credits)
                .ok_or(StoreError::WouldOverflow {
                    balance,
                    delta: credits,
                })?;
            account.refunded_records.push(record_id.to_string());
            account.updated_at = Utc::now();

            let lost = self
                .lost_refund_replies
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if lost {
                return Err(StoreError::Backend(anyhow::anyhow!("connection reset")));
            }
        }
        Ok(account.credits)
    }

    async fn update_preferences(
        &self,
        id: &str,
        update: &PreferencesUpdate,
    ) -> Result<Account, StoreError> {
        self.update(id, |account| update.apply(&mut account.settings))
    }

    async fn update_billing(&self, id: &str, update: &BillingUpdate) -> Result<Account, StoreError> {
        self.update(id, |account| update.apply(account))
    }

    async fn record_login(&self, id: &str) -> Result<Account, StoreError> {
        self.update(id, |account| account.last_login = Some(Utc::now()))
    }

    async fn set_password_hash(&self, id: &str, password_hash: &str) -> Result<(), StoreError> {
        let mut accounts = self.lock()?;
        let account = accounts.get_mut(id).ok_or(StoreError::NotFound)?;
        match &mut account.credential {
            Credential::EmailPassword { password_hash: stored } => {
                *stored = password_hash.to_string();
                account.updated_at = Utc::now();
                Ok(())
            }
            Credential::ExternalIdentity { .. } => Err(StoreError::NotFound),
        }
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        self.lock().map(|_| ())
    }
}

#[derive(Default)]
pub struct InMemoryUsageLedger {
    records: Mutex<Vec<UsageRecord>>,
    fail_appends: AtomicBool,
    append_attempts: AtomicUsize,
}

impl InMemoryUsageLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every append fail with a backend error.
    pub fn set_append_failure(&self, fail: bool) {
        self.fail_appends.store(fail, Ordering::SeqCst);
    }

    /// Appends attempted so far, failed ones included.
    pub fn append_attempts(&self) -> usize {
        self.append_attempts.load(Ordering::SeqCst)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Vec<UsageRecord>>, StoreError> {
        self.records.lock().map_err(|_| poisoned())
    }
}

#[async_trait]
impl UsageLedger for InMemoryUsageLedger {
    async fn append(&self, record: &UsageRecord) -> Result<(), StoreError> {
        self.append_attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail_appends.load(Ordering::SeqCst) {
            return Err(StoreError::Backend(anyhow::anyhow!("ledger unavailable")));
        }

        let mut records = self.lock()?;
        if !records.iter().any(|r| r.id == record.id) {
            records.push(record.clone());
        }
        Ok(())
    }

    async fn list_by_owner(
        &self,
        account_id: &str,
        page: PageRequest,
    ) -> Result<Vec<UsageRecord>, StoreError> {
        let mut owned: Vec<UsageRecord> = self
            .lock()?
            .iter()
            .filter(|r| r.account_id == account_id)
            .cloned()
            .collect();

        owned.sort_by(|a, b| {
            b.created_at
                .timestamp_millis()
                .cmp(&a.created_at.timestamp_millis())
                .then_with(|| b.id.cmp(&a.id))
        });

        Ok(owned
            .into_iter()
            .skip(page.skip() as usize)
            .take(page.limit as usize)
            .collect())
    }

    async fn count_by_owner(&self, account_id: &str) -> Result<u64, StoreError> {
        Ok(self
            .lock()?
            .iter()
            .filter(|r| r.account_id == account_id)
            .count() as u64)
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        self.lock().map(|_| ())
    }
}

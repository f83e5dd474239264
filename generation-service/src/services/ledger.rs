//! Usage ledger: append-only history of completed generations.

use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::{bson::doc, options::FindOptions, Collection};

use crate::models::UsageRecord;
use crate::services::accounts::StoreError;
use crate::services::database::{is_duplicate_key, observe, GenerationDb, USAGE_RECORDS_COLLECTION};

pub const DEFAULT_PAGE: u64 = 1;
pub const DEFAULT_LIMIT: u64 = 10;
pub const MAX_LIMIT: u64 = 100;

/// Normalized page selection. Always has `page >= 1` and
/// `1 <= limit <= MAX_LIMIT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u64,
    pub limit: u64,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            limit: DEFAULT_LIMIT,
        }
    }
}

impl PageRequest {
    /// Build from raw query values. Unparsable or non-positive values fall
    /// back to the defaults; oversized limits are capped.
    pub fn from_query(page: Option<&str>, limit: Option<&str>) -> Self {
        let parse = |raw: Option<&str>| {
            raw.and_then(|s| s.trim().parse::<i64>().ok())
                .filter(|n| *n > 0)
                .map(|n| n as u64)
        };

        Self {
            page: parse(page).unwrap_or(DEFAULT_PAGE),
            limit: parse(limit).unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT),
        }
    }

    pub fn skip(&self) -> u64 {
        (self.page - 1).saturating_mul(self.limit)
    }

    /// Number of pages needed for `total` records.
    pub fn page_count(&self, total: u64) -> u64 {
        total.div_ceil(self.limit)
    }
}

#[async_trait]
pub trait UsageLedger: Send + Sync {
    /// Insert a record. Appending an id that already exists succeeds without
    /// writing, so retries are safe.
    async fn append(&self, record: &UsageRecord) -> Result<(), StoreError>;

    /// Records owned by `account_id`, newest first.
    async fn list_by_owner(
        &self,
        account_id: &str,
        page: PageRequest,
    ) -> Result<Vec<UsageRecord>, StoreError>;

    async fn count_by_owner(&self, account_id: &str) -> Result<u64, StoreError>;

    async fn health_check(&self) -> Result<(), StoreError>;
}

#[derive(Clone)]
pub struct MongoUsageLedger {
    db: GenerationDb,
}

impl MongoUsageLedger {
    pub fn new(db: GenerationDb) -> Self {
        Self { db }
    }

    fn collection(&self) -> Collection<UsageRecord> {
        self.db.usage_records()
    }
}

#[async_trait]
impl UsageLedger for MongoUsageLedger {
    async fn append(&self, record: &UsageRecord) -> Result<(), StoreError> {
        match observe(
            "insert",
            USAGE_RECORDS_COLLECTION,
            self.collection().insert_one(record, None),
        )
        .await
        {
            Ok(_) => Ok(()),
            Err(e) if is_duplicate_key(&e) => {
                tracing::debug!(record_id = %record.id, "Usage record already stored");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn list_by_owner(
        &self,
        account_id: &str,
        page: PageRequest,
    ) -> Result<Vec<UsageRecord>, StoreError> {
        let options = FindOptions::builder()
            .sort(doc! { "created_at": -1, "_id": -1 })
            .skip(page.skip())
            .limit(page.limit as i64)
            .build();

        let cursor = observe(
            "list_by_owner",
            USAGE_RECORDS_COLLECTION,
            self.collection()
                .find(doc! { "account_id": account_id }, options),
        )
        .await?;

        let records: Vec<UsageRecord> = cursor.try_collect().await?;
        Ok(records)
    }

    async fn count_by_owner(&self, account_id: &str) -> Result<u64, StoreError> {
        Ok(observe(
            "count_by_owner",
            USAGE_RECORDS_COLLECTION,
            self.collection()
                .count_documents(doc! { "account_id": account_id }, None),
        )
        .await?)
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        self.db
            .health_check()
            .await
            .map_err(|e| StoreError::Backend(anyhow::anyhow!(e.to_string())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_or_invalid_values_use_defaults() {
        assert_eq!(PageRequest::from_query(None, None), PageRequest::default());
        assert_eq!(
            PageRequest::from_query(Some("abc"), Some("-3")),
            PageRequest { page: 1, limit: 10 }
        );
        assert_eq!(
            PageRequest::from_query(Some("0"), Some("0")),
            PageRequest { page: 1, limit: 10 }
        );
    }

    #[test]
    fn limit_is_capped() {
        assert_eq!(PageRequest::from_query(Some("2"), Some("500")).limit, MAX_LIMIT);
    }

    #[test]
    fn page_count_rounds_up() {
        let page = PageRequest { page: 1, limit: 10 };
        assert_eq!(page.page_count(0), 0);
        assert_eq!(page.page_count(10), 1);
        assert_eq!(page.page_count(11), 2);
        assert_eq!(PageRequest { page: 3, limit: 4 }.skip(), 8);
    }
}

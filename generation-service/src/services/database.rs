//! MongoDB connection and index management for generation-service.

use mongodb::{
    bson::doc,
    error::{ErrorKind, WriteFailure},
    options::IndexOptions,
    Client as MongoClient, Collection, Database, IndexModel,
};
use service_core::error::AppError;
use std::future::Future;
use std::time::Instant;

use crate::models::{Account, UsageRecord};
use crate::services::metrics;

pub const ACCOUNTS_COLLECTION: &str = "accounts";
pub const USAGE_RECORDS_COLLECTION: &str = "usage_records";

const DUPLICATE_KEY_CODE: i32 = 11000;

#[derive(Clone)]
pub struct GenerationDb {
    client: MongoClient,
    db: Database,
}

impl GenerationDb {
    pub async fn connect(uri: &str, database: &str) -> Result<Self, AppError> {
        tracing::info!(database = %database, "Connecting to MongoDB");
        let client = MongoClient::with_uri_str(uri).await.map_err(|e| {
            tracing::error!("Failed to connect to MongoDB: {}", e);
            AppError::DatabaseError(anyhow::anyhow!(e.to_string()))
        })?;
        let db = client.database(database);
        tracing::info!(database = %database, "Successfully connected to MongoDB database");
        Ok(Self { client, db })
    }

    pub async fn initialize_indexes(&self) -> Result<(), AppError> {
        tracing::info!("Creating MongoDB indexes for generation-service");

        self.create_account_indexes().await?;
        self.create_usage_indexes().await?;

        tracing::info!("Successfully created all MongoDB indexes");
        Ok(())
    }

    async fn create_account_indexes(&self) -> Result<(), AppError> {
        let accounts = self.accounts();

        // Sparse so that identity-provider accounts without an email coexist
        let email_index = IndexModel::builder()
            .keys(doc! { "email": 1 })
            .options(
                IndexOptions::builder()
                    .name("email_idx".to_string())
                    .unique(true)
                    .sparse(true)
                    .build(),
            )
            .build();

        let subject_index = IndexModel::builder()
            .keys(doc! { "credential.subject_id": 1 })
            .options(
                IndexOptions::builder()
                    .name("subject_id_idx".to_string())
                    .unique(true)
                    .sparse(true)
                    .build(),
            )
            .build();

        let tier_index = IndexModel::builder()
            .keys(doc! { "tier": 1 })
            .options(IndexOptions::builder().name("tier_idx".to_string()).build())
            .build();

        for (name, index) in [
            ("email", email_index),
            ("subject_id", subject_index),
            ("tier", tier_index),
        ] {
            accounts.create_index(index, None).await.map_err(|e| {
                tracing::error!("Failed to create {} index: {}", name, e);
                AppError::DatabaseError(anyhow::anyhow!(e.to_string()))
            })?;
        }

        Ok(())
    }

    async fn create_usage_indexes(&self) -> Result<(), AppError> {
        // Serves the per-account history listing, newest first
        let owner_time_index = IndexModel::builder()
            .keys(doc! { "account_id": 1, "created_at": -1 })
            .options(
                IndexOptions::builder()
                    .name("account_time_idx".to_string())
                    .build(),
            )
            .build();

        self.usage_records()
            .create_index(owner_time_index, None)
            .await
            .map_err(|e| {
                tracing::error!("Failed to create account_time index: {}", e);
                AppError::DatabaseError(anyhow::anyhow!(e.to_string()))
            })?;

        Ok(())
    }

    pub async fn health_check(&self) -> Result<(), AppError> {
        self.client
            .database("admin")
            .run_command(doc! { "ping": 1 }, None)
            .await
            .map_err(|e| {
                tracing::error!("MongoDB health check failed: {}", e);
                AppError::DatabaseError(anyhow::anyhow!(e.to_string()))
            })?;
        Ok(())
    }

    // Collection accessors

    pub fn accounts(&self) -> Collection<Account> {
        self.db.collection(ACCOUNTS_COLLECTION)
    }

    pub fn usage_records(&self) -> Collection<UsageRecord> {
        self.db.collection(USAGE_RECORDS_COLLECTION)
    }
}

/// True when the write was rejected by a unique index.
pub fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(write_error)) => {
            write_error.code == DUPLICATE_KEY_CODE
        }
        ErrorKind::Command(command_error) => command_error.code == DUPLICATE_KEY_CODE,
        _ => false,
    }
}

/// Time a database call and count its failures.
pub async fn observe<T, F>(
    operation: &str,
    collection: &str,
    fut: F,
) -> Result<T, mongodb::error::Error>
where
    F: Future<Output = Result<T, mongodb::error::Error>>,
{
    let start = Instant::now();
    let result = fut.await;
    metrics::record_db_operation(operation, collection, start.elapsed().as_secs_f64());
    if result.is_err() {
        metrics::record_db_error(operation, collection);
    }
    result
}

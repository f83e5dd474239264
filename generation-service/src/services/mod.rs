pub mod accounts;
pub mod credentials;
pub mod database;
pub mod gateway;
pub mod identity;
pub mod ledger;
pub mod memory;
pub mod metrics;
pub mod prompts;
pub mod providers;

pub use accounts::{AccountStore, BillingUpdate, MongoAccountStore, PreferencesUpdate, StoreError};
pub use database::GenerationDb;
pub use gateway::{DocumentGeneration, GenerationGateway, GenerationOutcome, HistoryPage, TextGeneration};
pub use identity::{FirebaseVerifier, IdentityVerifier, StaticIdentityVerifier, VerifiedIdentity};
pub use ledger::{MongoUsageLedger, PageRequest, UsageLedger};
pub use memory::{InMemoryAccountStore, InMemoryUsageLedger};
pub use providers::{MockTextProvider, OpenAiProvider, TextProvider};

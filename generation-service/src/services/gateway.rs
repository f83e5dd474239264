//! Generation gateway: the credit-metered generation workflow.
//!
//! One request runs through caller resolution, quota check, a single provider
//! call, an atomic debit and a usage record append. A record exists only when
//! its debit was applied; when the append cannot be completed the debit is
//! refunded.

use std::sync::Arc;
use std::time::{Duration, Instant};

use backoff::future::retry;
use backoff::ExponentialBackoff;

use crate::error::GenerationError;
use crate::models::parameters::language_or_default;
use crate::models::{
    Account, DocumentDesign, GenerationKind, LengthTier, Tone, UsageParameters, UsageRecord,
};
use crate::services::accounts::{AccountStore, StoreError};
use crate::services::identity::VerifiedIdentity;
use crate::services::ledger::{PageRequest, UsageLedger};
use crate::services::metrics;
use crate::services::prompts;
use crate::services::providers::{ProviderError, ProviderRequest, TextProvider};

/// Default bound on retrying a failed ledger append or refund.
const DEFAULT_RETRY_WINDOW: Duration = Duration::from_secs(3);

/// Text generation input as received from the caller.
#[derive(Debug, Clone, Default)]
pub struct TextGeneration {
    pub prompt: String,
    pub tone: Option<String>,
    pub length: Option<String>,
    pub language: Option<String>,
}

/// Document generation input as received from the caller.
#[derive(Debug, Clone, Default)]
pub struct DocumentGeneration {
    pub prompt: String,
    pub design: Option<String>,
}

#[derive(Debug, Clone)]
pub struct GenerationOutcome {
    pub content: String,
    pub credits_remaining: i64,
    pub record: UsageRecord,
}

#[derive(Debug, Clone)]
pub struct HistoryPage {
    pub records: Vec<UsageRecord>,
    pub page: u64,
    pub limit: u64,
    pub total: u64,
    pub pages: u64,
}

/// A fully resolved request, ready to be sent to the provider.
struct GenerationPlan {
    prompt: String,
    request: ProviderRequest,
    parameters: UsageParameters,
}

pub struct GenerationGateway {
    accounts: Arc<dyn AccountStore>,
    ledger: Arc<dyn UsageLedger>,
    provider: Arc<dyn TextProvider>,
    timeout: Duration,
    retry_window: Duration,
}

impl GenerationGateway {
    pub fn new(
        accounts: Arc<dyn AccountStore>,
        ledger: Arc<dyn UsageLedger>,
        provider: Arc<dyn TextProvider>,
        timeout: Duration,
    ) -> Self {
        Self {
            accounts,
            ledger,
            provider,
            timeout,
            retry_window: DEFAULT_RETRY_WINDOW,
        }
    }

    /// Total time spent retrying a ledger append (and again a refund).
    pub fn with_retry_window(mut self, window: Duration) -> Self {
        self.retry_window = window;
        self
    }

    pub async fn generate_text(
        &self,
        caller: Option<&VerifiedIdentity>,
        input: TextGeneration,
    ) -> Result<GenerationOutcome, GenerationError> {
        let plan = validate_prompt(&input.prompt).map(|prompt| {
            let tone = Tone::parse(input.tone.as_deref());
            let length = LengthTier::parse(input.length.as_deref());
            let language = language_or_default(input.language.as_deref());

            GenerationPlan {
                request: prompts::text_request(&prompt, tone, length, &language),
                parameters: UsageParameters::Text {
                    tone,
                    length,
                    language,
                },
                prompt,
            }
        });

        self.execute(caller, GenerationKind::Text, plan).await
    }

    pub async fn generate_document(
        &self,
        caller: Option<&VerifiedIdentity>,
        input: DocumentGeneration,
    ) -> Result<GenerationOutcome, GenerationError> {
        let plan = validate_prompt(&input.prompt).map(|prompt| {
            let design = DocumentDesign::parse(input.design.as_deref());

            GenerationPlan {
                request: prompts::document_request(&prompt, design),
                parameters: UsageParameters::Document { design },
                prompt,
            }
        });

        self.execute(caller, GenerationKind::Document, plan).await
    }

    /// The caller's usage records, newest first.
    pub async fn history(
        &self,
        caller: Option<&VerifiedIdentity>,
        page: PageRequest,
    ) -> Result<HistoryPage, GenerationError> {
        let account = self.resolve_account(caller).await?;

        let total = self.ledger.count_by_owner(&account.id).await?;
        let records = self.ledger.list_by_owner(&account.id, page).await?;

        Ok(HistoryPage {
            records,
            page: page.page,
            limit: page.limit,
            total,
            pages: page.page_count(total),
        })
    }

    async fn execute(
        &self,
        caller: Option<&VerifiedIdentity>,
        kind: GenerationKind,
        plan: Result<GenerationPlan, GenerationError>,
    ) -> Result<GenerationOutcome, GenerationError> {
        let result = self.run(caller, plan).await;

        let outcome = match &result {
            Ok(_) => "success",
            Err(e) => e.kind(),
        };
        metrics::record_generation(kind.as_str(), outcome);

        result
    }

    /// The caller is resolved before the input is looked at, so an
    /// unauthenticated request is reported as such whatever its body.
    async fn run(
        &self,
        caller: Option<&VerifiedIdentity>,
        plan: Result<GenerationPlan, GenerationError>,
    ) -> Result<GenerationOutcome, GenerationError> {
        let account = self.resolve_account(caller).await?;
        let plan = plan?;
        let kind = plan.parameters.kind();
        let cost = kind.cost();

        if account.credits < cost {
            tracing::info!(
                account_id = %account.id,
                kind = kind.as_str(),
                balance = account.credits,
                cost,
                "Insufficient credits"
            );
            return Err(GenerationError::InsufficientCredits {
                required: cost,
                available: account.credits,
            });
        }

        let content = self.call_provider(&plan.request).await?;

        let credits_remaining = match self.accounts.adjust_balance(&account.id, -cost).await {
            Ok(balance) => balance,
            Err(StoreError::WouldUnderflow { balance, .. }) => {
                // Lost a race against a concurrent request on the same account
                tracing::info!(
                    account_id = %account.id,
                    balance,
                    cost,
                    "Debit rejected after generation"
                );
                return Err(GenerationError::InsufficientCredits {
                    required: cost,
                    available: balance,
                });
            }
            Err(e) => return Err(e.into()),
        };
        metrics::record_credits_debited(kind.as_str(), cost);

        let record = UsageRecord::new(&account.id, &plan.prompt, content, plan.parameters);

        if let Err(append_error) = self.append_with_retry(&record).await {
            self.refund(&record, &append_error).await;
            return Err(GenerationError::PersistenceFailed(append_error.to_string()));
        }

        tracing::info!(
            account_id = %account.id,
            record_id = %record.id,
            kind = kind.as_str(),
            cost,
            credits_remaining,
            "Generation completed"
        );

        Ok(GenerationOutcome {
            content: record.result.clone(),
            credits_remaining,
            record,
        })
    }

    async fn resolve_account(
        &self,
        caller: Option<&VerifiedIdentity>,
    ) -> Result<Account, GenerationError> {
        let caller = caller.ok_or(GenerationError::Unauthenticated)?;

        let account = self
            .accounts
            .find_by_subject(&caller.subject_id)
            .await?
            .ok_or(GenerationError::AccountNotFound)?;

        if !account.is_active {
            return Err(GenerationError::AccountDisabled);
        }

        Ok(account)
    }

    async fn call_provider(&self, request: &ProviderRequest) -> Result<String, GenerationError> {
        let provider = self.provider.name();
        let model = self.provider.model();
        let start = Instant::now();

        let result = match tokio::time::timeout(self.timeout, self.provider.generate(request)).await
        {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout(self.timeout.as_secs())),
        };

        metrics::record_provider_latency(provider, model, start.elapsed().as_secs_f64());

        match result {
            Ok(response) => {
                tracing::debug!(
                    provider,
                    model,
                    input_tokens = response.input_tokens,
                    output_tokens = response.output_tokens,
                    "Provider call succeeded"
                );
                Ok(response.text)
            }
            Err(e) => {
                metrics::record_provider_error(provider, e.error_type());
                tracing::warn!(provider, model, error = %e, "Provider call failed");
                Err(GenerationError::GenerationFailed(e.to_string()))
            }
        }
    }

    fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            initial_interval: Duration::from_millis(50),
            max_interval: Duration::from_secs(1),
            max_elapsed_time: Some(self.retry_window),
            ..Default::default()
        }
    }

    async fn append_with_retry(&self, record: &UsageRecord) -> Result<(), StoreError> {
        retry(self.backoff(), || async move {
            self.ledger.append(record).await.map_err(|e| {
                tracing::warn!(record_id = %record.id, error = %e, "Usage record append failed");
                transient_if_backend(e)
            })
        })
        .await
    }

    /// Give back the credits of a debit whose record could not be written.
    /// The refund is keyed by the record id, so retrying an attempt whose
    /// reply was lost cannot credit twice.
    async fn refund(&self, record: &UsageRecord, append_error: &StoreError) {
        let result = retry(self.backoff(), || async move {
            self.accounts
                .refund_debit(&record.account_id, &record.id, record.cost)
                .await
                .map_err(transient_if_backend)
        })
        .await;

        match result {
            Ok(balance) => {
                tracing::warn!(
                    account_id = %record.account_id,
                    record_id = %record.id,
                    cost = record.cost,
                    balance,
                    append_error = %append_error,
                    "Refunded debit after usage record append failed"
                );
            }
            Err(refund_error) => {
                metrics::record_ledger_divergence();
                tracing::error!(
                    account_id = %record.account_id,
                    record_id = %record.id,
                    cost = record.cost,
                    append_error = %append_error,
                    refund_error = %refund_error,
                    "Ledger divergence: debit applied without usage record and refund failed"
                );
            }
        }
    }
}

fn transient_if_backend(err: StoreError) -> backoff::Error<StoreError> {
    match err {
        StoreError::Backend(_) => backoff::Error::transient(err),
        other => backoff::Error::permanent(other),
    }
}

fn validate_prompt(prompt: &str) -> Result<String, GenerationError> {
    if prompt.trim().is_empty() {
        return Err(GenerationError::ValidationFailed(
            "prompt must not be empty".to_string(),
        ));
    }
    Ok(prompt.to_string())
}

//! Usage record: the immutable ledger entry written for each completed
//! generation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::parameters::{DocumentDesign, LengthTier, Tone};

/// Kind of generation. Determines cost and provider parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GenerationKind {
    #[serde(rename = "text")]
    Text,
    /// Stored as `pdf` to stay readable alongside existing history.
    #[serde(rename = "pdf")]
    Document,
}

impl GenerationKind {
    /// Credits charged per successful generation.
    pub fn cost(&self) -> i64 {
        match self {
            GenerationKind::Text => 1,
            GenerationKind::Document => 2,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            GenerationKind::Text => "text",
            GenerationKind::Document => "pdf",
        }
    }
}

/// Parameters the generation ran with, after defaults were applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UsageParameters {
    Text {
        tone: Tone,
        length: LengthTier,
        language: String,
    },
    Document {
        design: DocumentDesign,
    },
}

impl UsageParameters {
    pub fn kind(&self) -> GenerationKind {
        match self {
            UsageParameters::Text { .. } => GenerationKind::Text,
            UsageParameters::Document { .. } => GenerationKind::Document,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageRecord {
    #[serde(rename = "_id")]
    pub id: String,

    pub account_id: String,

    pub kind: GenerationKind,

    pub prompt: String,

    pub result: String,

    pub parameters: UsageParameters,

    /// Credits debited for this generation.
    pub cost: i64,

    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

impl UsageRecord {
    /// Builds a record with a fresh id. The id is assigned before the first
    /// write attempt so that retried appends stay idempotent.
    pub fn new(account_id: &str, prompt: &str, result: String, parameters: UsageParameters) -> Self {
        let kind = parameters.kind();
        Self {
            id: Uuid::new_v4().to_string(),
            account_id: account_id.to_string(),
            kind,
            prompt: prompt.to_string(),
            result,
            parameters,
            cost: kind.cost(),
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cost_follows_kind() {
        let text = UsageRecord::new(
            "acc-1",
            "hello",
            "bonjour".to_string(),
            UsageParameters::Text {
                tone: Tone::Casual,
                length: LengthTier::Short,
                language: "french".to_string(),
            },
        );
        assert_eq!(text.kind, GenerationKind::Text);
        assert_eq!(text.cost, 1);

        let document = UsageRecord::new(
            "acc-1",
            "report",
            "# Report".to_string(),
            UsageParameters::Document {
                design: DocumentDesign::Academic,
            },
        );
        assert_eq!(document.kind, GenerationKind::Document);
        assert_eq!(document.cost, 2);
    }

    #[test]
    fn document_kind_is_stored_as_pdf() {
        let value = serde_json::to_value(GenerationKind::Document).unwrap();
        assert_eq!(value, "pdf");
    }

    #[test]
    fn parameters_keep_their_shape() {
        let params = UsageParameters::Document {
            design: DocumentDesign::Creative,
        };
        let value = serde_json::to_value(&params).unwrap();
        assert_eq!(value, serde_json::json!({ "design": "creative" }));

        let back: UsageParameters = serde_json::from_value(value).unwrap();
        assert_eq!(back, params);
    }
}

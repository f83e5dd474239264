use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::{UsageParameters, UsageRecord};
use crate::services::{DocumentGeneration, HistoryPage, TextGeneration};

#[derive(Debug, Deserialize, Validate)]
pub struct TextRequest {
    #[serde(default)]
    #[validate(length(min = 1, max = 10000, message = "Prompt is required"))]
    pub prompt: String,
    pub tone: Option<String>,
    pub length: Option<String>,
    pub language: Option<String>,
}

impl From<TextRequest> for TextGeneration {
    fn from(req: TextRequest) -> Self {
        Self {
            prompt: req.prompt,
            tone: req.tone,
            length: req.length,
            language: req.language,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct DocumentRequest {
    #[serde(default)]
    #[validate(length(min = 1, max = 10000, message = "Prompt is required"))]
    pub prompt: String,
    pub design: Option<String>,
}

impl From<DocumentRequest> for DocumentGeneration {
    fn from(req: DocumentRequest) -> Self {
        Self {
            prompt: req.prompt,
            design: req.design,
        }
    }
}

/// Raw paging values. Parsed leniently by `PageRequest::from_query`.
#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    pub page: Option<String>,
    pub limit: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TextResponse {
    pub success: bool,
    pub text: String,
    pub credits_remaining: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentResponse {
    pub success: bool,
    pub content: String,
    pub pdf_url: String,
    pub credits_remaining: i64,
}

impl DocumentResponse {
    pub fn new(content: String, credits_remaining: i64) -> Self {
        Self {
            pdf_url: simulated_pdf_url(&content),
            success: true,
            content,
            credits_remaining,
        }
    }
}

/// Stand-in for a rendered PDF: the content as a base64 text data URL.
pub fn simulated_pdf_url(content: &str) -> String {
    format!(
        "data:text/plain;base64,{}",
        STANDARD.encode(format!("PDF Simulation: {}", content))
    )
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageRecordView {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub prompt: String,
    pub result: String,
    pub parameters: UsageParameters,
    pub credits_used: i64,
    pub created_at: String,
}

impl From<UsageRecord> for UsageRecordView {
    fn from(record: UsageRecord) -> Self {
        Self {
            id: record.id,
            kind: record.kind.as_str(),
            prompt: record.prompt,
            result: record.result,
            parameters: record.parameters,
            credits_used: record.cost,
            created_at: record.created_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct Pagination {
    pub page: u64,
    pub limit: u64,
    pub total: u64,
    pub pages: u64,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub records: Vec<UsageRecordView>,
    pub pagination: Pagination,
}

impl From<HistoryPage> for HistoryResponse {
    fn from(page: HistoryPage) -> Self {
        Self {
            records: page.records.into_iter().map(UsageRecordView::from).collect(),
            pagination: Pagination {
                page: page.page,
                limit: page.limit,
                total: page.total,
                pages: page.pages,
            },
        }
    }
}

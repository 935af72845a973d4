//! Client for the external document classification and extraction service.

pub mod client;
pub mod fields;
pub mod prompts;
pub mod retry;
pub mod vision;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::processor::PreparedImage;

pub use client::OpenAiAnalyzer;
pub use fields::{clean_amount, BillingFields, FIELD_NAMES};
pub use retry::{FailureClass, RetryPolicy, Retryable};
pub use vision::VisionReader;

#[derive(Error, Debug)]
pub enum AnalyzerError {
    #[error("Rate limited by the extraction service (HTTP 429): {body}")]
    RateLimited { body: String },

    #[error("Extraction service returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Request to the extraction service timed out")]
    Timeout,

    #[error("Network error talking to the extraction service: {0}")]
    Network(String),

    #[error("Unexpected response from the extraction service: {0}")]
    InvalidResponse(String),
}

impl Retryable for AnalyzerError {
    fn failure_class(&self) -> FailureClass {
        match self {
            AnalyzerError::RateLimited { .. } => FailureClass::RateLimited,
            AnalyzerError::Http { status, .. } if *status >= 500 => FailureClass::Transient,
            AnalyzerError::Timeout | AnalyzerError::Network(_) => FailureClass::Transient,
            _ => FailureClass::Fatal,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocumentType {
    BillInvoice,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Confidence {
    High,
    Medium,
    #[default]
    Low,
}

/// Classifier verdict for a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub document_type: DocumentType,
    #[serde(default)]
    pub confidence: Confidence,
    #[serde(default)]
    pub reason: String,
}

impl Classification {
    pub fn is_financial(&self) -> bool {
        self.document_type == DocumentType::BillInvoice
    }
}

/// The classification, field extraction and image-to-text capabilities.
///
/// Implementations apply their own retry policy; an `Err` means the call
/// failed for good.
#[async_trait]
pub trait DocumentAnalyzer: Send + Sync {
    async fn classify(&self, text: &str) -> Result<Classification, AnalyzerError>;

    /// Extracts billing fields. Amounts come back normalized.
    async fn extract_fields(&self, text: &str) -> Result<BillingFields, AnalyzerError>;

    async fn image_text(&self, image: &PreparedImage) -> Result<String, AnalyzerError>;
}

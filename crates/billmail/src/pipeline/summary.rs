use serde::Serialize;

use super::result::{DocumentResult, ResultStatus};

/// Number of results echoed back in the summary.
pub const SAMPLE_RESULTS: usize = 3;

/// Counts of results per status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FileSummary {
    pub successful_files: usize,
    pub error_files: usize,
    pub skipped_files: usize,
    pub total_files: usize,
}

impl FileSummary {
    pub fn of(results: &[DocumentResult]) -> Self {
        let count = |status: ResultStatus| results.iter().filter(|r| r.status() == status).count();
        Self {
            successful_files: count(ResultStatus::Success),
            error_files: count(ResultStatus::Error),
            skipped_files: count(ResultStatus::Skipped),
            total_files: results.len(),
        }
    }
}

/// An email object that could not be fetched or parsed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedFile {
    pub file: String,
    pub error: String,
}

/// Outcome of one invocation.
#[derive(Debug, Clone, Serialize)]
pub struct InvocationSummary {
    pub status_code: u16,
    pub message: String,
    pub new_emails_processed: usize,
    pub total_emails_found: usize,
    pub previously_processed: usize,
    pub previously_sent: usize,
    pub emails_sent_this_run: usize,
    pub delivery_failures: usize,
    pub summary: FileSummary,
    pub sample_results: Vec<DocumentResult>,
    pub failed_files: Vec<FailedFile>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl InvocationSummary {
    /// A 500 summary for an invocation that failed before any email was listed.
    pub fn failed(error: impl std::fmt::Display) -> Self {
        let message = format!("Error in main processing: {}", error);
        Self {
            status_code: 500,
            message: message.clone(),
            new_emails_processed: 0,
            total_emails_found: 0,
            previously_processed: 0,
            previously_sent: 0,
            emails_sent_this_run: 0,
            delivery_failures: 0,
            summary: FileSummary::default(),
            sample_results: Vec::new(),
            failed_files: Vec::new(),
            error: Some(message),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status_code == 200
    }
}

//! Routes attachments through text acquisition, classification and field
//! extraction.

use std::sync::Arc;

use tracing::{debug, info, info_span, warn, Instrument};

use crate::analyzer::DocumentAnalyzer;
use crate::error::ProcessError;
use crate::processor::{pdf, DocumentKind, DocumentSource, ImageTextReader};

use super::result::{DocumentResult, Sentinel};

pub struct Dispatcher {
    analyzer: Arc<dyn DocumentAnalyzer>,
    image_reader: Arc<dyn ImageTextReader>,
}

impl Dispatcher {
    pub fn new(analyzer: Arc<dyn DocumentAnalyzer>, image_reader: Arc<dyn ImageTextReader>) -> Self {
        Self {
            analyzer,
            image_reader,
        }
    }

    /// Analyzes one attachment, returning one result per document it holds.
    ///
    /// Unsupported suffixes yield no results. An archive that cannot be
    /// opened yields a single `ZIP_ERROR` result named after the archive.
    pub async fn dispatch(&self, filename: &str, content: Vec<u8>) -> Vec<DocumentResult> {
        let Some(source) = DocumentSource::new(filename, content) else {
            debug!("No handler for {}, skipping", filename);
            return Vec::new();
        };

        let is_archive = source.kind() == DocumentKind::Archive;
        let leaves = match source.resolve() {
            Ok(leaves) => leaves,
            Err(e) => {
                warn!("Error processing ZIP file {}: {}", filename, e);
                return vec![DocumentResult::degraded(filename, Sentinel::ZipError)];
            }
        };
        if is_archive {
            info!("{} holds {} document(s) to analyze", filename, leaves.len());
        }

        let mut results = Vec::with_capacity(leaves.len());
        for leaf in &leaves {
            let span = info_span!("dispatch", filename = %leaf.name(), kind = leaf.kind().as_str());
            results.push(self.analyze(leaf).instrument(span).await);
        }
        results
    }

    async fn analyze(&self, leaf: &DocumentSource) -> DocumentResult {
        let text = match self.acquire_text(leaf).await {
            Ok(text) => text,
            Err(e) => {
                warn!("Could not get text from {}: {}", leaf.name(), e);
                return DocumentResult::degraded(leaf.name(), Sentinel::Error);
            }
        };

        self.analyze_text(leaf.name(), &text).await
    }

    async fn acquire_text(&self, leaf: &DocumentSource) -> Result<String, ProcessError> {
        let content = leaf.read()?;
        match leaf.kind() {
            DocumentKind::Pdf => pdf::extract_text(content),
            DocumentKind::Image => self.image_reader.read_text(leaf.name(), content).await,
            DocumentKind::Archive => Err(ProcessError::UnsupportedFormat(format!(
                "nested archive {}",
                leaf.name()
            ))),
        }
    }

    /// Classification and extraction over acquired text.
    pub async fn analyze_text(&self, filename: &str, text: &str) -> DocumentResult {
        if text.trim().is_empty() {
            info!("{} has no extractable text", filename);
            return DocumentResult::degraded(filename, Sentinel::NoText);
        }

        match self.analyzer.classify(text).await {
            Ok(classification) if !classification.is_financial() => {
                info!(
                    "{} is not a bill or invoice ({:?}): {}",
                    filename, classification.confidence, classification.reason
                );
                return DocumentResult::degraded(filename, Sentinel::NotInvoice);
            }
            Ok(classification) => {
                debug!(
                    "{} classified as invoice ({:?})",
                    filename, classification.confidence
                );
            }
            Err(e) => {
                warn!(
                    "Classification of {} failed, treating it as an invoice: {}",
                    filename, e
                );
            }
        }

        match self.analyzer.extract_fields(text).await {
            Ok(fields) => {
                info!("Extracted billing fields from {}", filename);
                DocumentResult::extracted(filename, fields)
            }
            Err(e) => {
                warn!("Field extraction failed for {}: {}", filename, e);
                DocumentResult::degraded(filename, Sentinel::ApiError)
            }
        }
    }
}

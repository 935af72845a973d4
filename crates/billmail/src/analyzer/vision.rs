use std::sync::Arc;

use async_trait::async_trait;

use crate::error::ProcessError;
use crate::processor::image::{prepare_for_vision, ImageTextReader};

use super::DocumentAnalyzer;

/// Reads image text through the analyzer's vision capability.
pub struct VisionReader {
    analyzer: Arc<dyn DocumentAnalyzer>,
}

impl VisionReader {
    pub fn new(analyzer: Arc<dyn DocumentAnalyzer>) -> Self {
        Self { analyzer }
    }
}

#[async_trait]
impl ImageTextReader for VisionReader {
    async fn read_text(&self, filename: &str, image: &[u8]) -> Result<String, ProcessError> {
        let prepared = prepare_for_vision(filename, image)?;
        self.analyzer
            .image_text(&prepared)
            .await
            .map_err(|e| ProcessError::TextExtraction(format!("{}: {}", filename, e)))
    }
}

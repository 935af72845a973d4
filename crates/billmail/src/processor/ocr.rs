use std::io::Cursor;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::ProcessError;
use crate::processor::ImageTextReader;

/// Local OCR through Tesseract, used instead of the vision endpoint when
/// `image_text.provider` is `tesseract`.
#[derive(Clone)]
pub struct TesseractReader {
    languages: Arc<str>,
}

impl TesseractReader {
    pub fn new(languages: &[String]) -> Self {
        let lang_str = if languages.is_empty() {
            "eng".to_string()
        } else {
            languages.join("+")
        };

        Self {
            languages: Arc::from(lang_str),
        }
    }

    pub fn languages(&self) -> &str {
        &self.languages
    }

    pub fn process_image_bytes(&self, image_data: &[u8]) -> Result<String, ProcessError> {
        let _span = tracing::info_span!("processor.ocr").entered();

        let img = image::load_from_memory(image_data)
            .map_err(|e| ProcessError::OcrFailed(format!("Failed to load image: {}", e)))?;

        // leptess reads PNG reliably whatever the source format was.
        let mut png_data = Vec::new();
        img.write_to(&mut Cursor::new(&mut png_data), image::ImageFormat::Png)
            .map_err(|e| ProcessError::OcrFailed(format!("Failed to convert image: {}", e)))?;

        let mut lt = leptess::LepTess::new(None, &self.languages).map_err(|e| {
            ProcessError::OcrFailed(format!("Failed to initialize Tesseract: {}", e))
        })?;

        lt.set_image_from_mem(&png_data)
            .map_err(|e| ProcessError::OcrFailed(format!("Failed to set image for OCR: {}", e)))?;

        lt.get_utf8_text()
            .map_err(|e| ProcessError::OcrFailed(format!("OCR failed: {}", e)))
    }
}

#[async_trait]
impl ImageTextReader for TesseractReader {
    async fn read_text(&self, _filename: &str, image: &[u8]) -> Result<String, ProcessError> {
        let reader = self.clone();
        let image = image.to_vec();
        tokio::task::spawn_blocking(move || reader.process_image_bytes(&image))
            .await
            .map_err(|e| ProcessError::OcrFailed(format!("OCR task failed: {}", e)))?
    }
}

use std::io::Cursor;

use async_trait::async_trait;

use crate::error::ProcessError;

/// Media types the vision endpoint accepts as-is.
const VISION_MEDIA_TYPES: &[&str] = &["image/png", "image/jpeg", "image/webp", "image/gif"];

/// Turns an image into text.
#[async_trait]
pub trait ImageTextReader: Send + Sync {
    async fn read_text(&self, filename: &str, image: &[u8]) -> Result<String, ProcessError>;
}

/// Image bytes in a format the vision endpoint accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedImage {
    pub media_type: String,
    pub data: Vec<u8>,
}

impl PreparedImage {
    /// Renders the image as a base64 `data:` URL.
    pub fn data_url(&self) -> String {
        use base64::Engine;
        format!(
            "data:{};base64,{}",
            self.media_type,
            base64::engine::general_purpose::STANDARD.encode(&self.data)
        )
    }
}

/// Prepares an image for upload, re-encoding formats such as BMP or TIFF as PNG.
pub fn prepare_for_vision(filename: &str, image_data: &[u8]) -> Result<PreparedImage, ProcessError> {
    let media_type = mime_guess::from_path(filename)
        .first_or_octet_stream()
        .essence_str()
        .to_string();

    if VISION_MEDIA_TYPES.contains(&media_type.as_str()) {
        return Ok(PreparedImage {
            media_type,
            data: image_data.to_vec(),
        });
    }

    let _span = tracing::info_span!("processor.image.reencode", from = %media_type).entered();
    let img = image::load_from_memory(image_data)
        .map_err(|e| ProcessError::ImageProcessing(format!("Failed to load image: {}", e)))?;

    let mut png_data = Vec::new();
    img.write_to(&mut Cursor::new(&mut png_data), image::ImageFormat::Png)
        .map_err(|e| ProcessError::ImageProcessing(format!("Failed to convert image: {}", e)))?;

    Ok(PreparedImage {
        media_type: "image/png".to_string(),
        data: png_data,
    })
}

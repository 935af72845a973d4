use crate::error::ProcessError;

/// Extracts the text layer of a PDF held in memory.
///
/// Pages whose text cannot be decoded are skipped. A document with no
/// extractable text yields an empty string, not an error.
pub fn extract_text(pdf_bytes: &[u8]) -> Result<String, ProcessError> {
    let _span = tracing::info_span!("processor.pdf").entered();

    let doc = lopdf::Document::load_mem(pdf_bytes)
        .map_err(|e| ProcessError::PdfProcessing(format!("Failed to load PDF: {}", e)))?;

    Ok(extract_text_from_pdf(&doc))
}

fn extract_text_from_pdf(doc: &lopdf::Document) -> String {
    let mut pages = Vec::new();

    for (page_num, _) in doc.get_pages() {
        match doc.extract_text(&[page_num]) {
            Ok(page_text) if !page_text.trim().is_empty() => pages.push(page_text),
            Ok(_) => {}
            Err(e) => tracing::debug!("Skipping page {}: {}", page_num, e),
        }
    }

    pages.join("\n")
}

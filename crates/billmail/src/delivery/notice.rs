//! Outbound message composition.

use chrono::{DateTime, Utc};

use super::{MessageAttachment, OutboundMessage};

/// The results message: CSV attached, column guide in the body.
pub fn results_message(
    from: &str,
    to: &str,
    original_subject: &str,
    csv_filename: &str,
    csv: Vec<u8>,
    now: DateTime<Utc>,
) -> OutboundMessage {
    let body = format!(
        "Hello,

Your invoice processing request has been completed successfully.

Original Subject: {subject}
Processing Date: {date} UTC

Please find the processed invoice data attached as a CSV file with the following columns:
- Filename: Name of the processed file
- PO Number: Purchase order number found in the invoice
- Bill To: Company/person the invoice is billed to
- Bill From: Company/vendor issuing the invoice
- Total Amount: Total amount on the invoice (numbers only)
- Amount Due: Amount that needs to be paid (numbers only)
- Currency: Currency code (USD, INR, EUR, etc.)
- Bill ID: Invoice number or identifier
- Bill Date: Date of the invoice
- Items/Services: Products or services purchased/subscribed
- Status: Processing status

Our system now supports:
- PDF documents
- ZIP files containing multiple documents
- Image files (JPG, PNG, etc.) including handwritten receipts

Best regards,
Invoice Processing System
",
        subject = original_subject,
        date = now.format("%Y-%m-%d %H:%M:%S"),
    );

    OutboundMessage {
        from: from.to_string(),
        to: to.to_string(),
        subject: format!("Invoice Processing Complete - {}", original_subject),
        body,
        attachment: Some(MessageAttachment {
            filename: csv_filename.to_string(),
            content_type: "text/csv".to_string(),
            data: csv,
        }),
    }
}

/// The notice sent when an email carried nothing we can analyze.
pub fn no_attachments_message(
    from: &str,
    to: &str,
    original_subject: &str,
    now: DateTime<Utc>,
) -> OutboundMessage {
    let body = format!(
        "Hello,

We received your email but could not find any valid PDF, ZIP, or image attachments to process.

Original Subject: {subject}
Processing Date: {date} UTC

Please ensure that:
1. Your email includes PDF files, ZIP files containing documents, or images of invoices/receipts
2. The files are properly attached (not embedded images in email body)
3. The PDF files contain readable text (not just scanned images without OCR)
4. Images are clear and readable (invoices, receipts, bills)

Supported file types:
- PDF files (.pdf)
- ZIP files (.zip) containing PDFs or images
- Image files (.jpg, .jpeg, .png, .bmp, .tiff, .webp)

If you need assistance, please reply to this email.

Best regards,
Invoice Processing System
",
        subject = original_subject,
        date = now.format("%Y-%m-%d %H:%M:%S"),
    );

    OutboundMessage {
        from: from.to_string(),
        to: to.to_string(),
        subject: format!("No Valid Attachments Found - {}", original_subject),
        body,
        attachment: None,
    }
}

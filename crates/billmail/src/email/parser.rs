//! Email parsing and attachment extraction.

use log::{debug, warn};
use mail_parser::{HeaderName, Message, MessageParser, MessagePart, MimeHeaders, PartType};

use super::error::{EmailError, Result};

/// Filename suffixes accepted for parts with an attachment disposition.
pub const SUPPORTED_EXTENSIONS: &[&str] = &[
    ".pdf", ".zip", ".jpg", ".jpeg", ".png", ".bmp", ".tiff", ".webp",
];

/// Envelope metadata of an inbound email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailEnvelope {
    /// Sender address only, without display name. Empty when absent.
    pub sender: String,
    /// The Subject header, empty when absent.
    pub subject: String,
    /// The Message-ID header without angle brackets, empty when absent.
    pub message_id: String,
    /// The Date header as written, trimmed. Empty when absent.
    pub date: String,
    /// Object key the raw message was read from.
    pub source_key: String,
}

/// An attachment extracted from an email.
#[derive(Debug, Clone)]
pub struct Attachment {
    pub filename: String,
    pub media_type: String,
    pub content: Vec<u8>,
}

/// Result of parsing one raw message.
#[derive(Debug)]
pub struct ParsedEmail {
    pub envelope: EmailEnvelope,
    pub attachments: Vec<Attachment>,
}

/// Parser turning raw MIME messages into envelopes and document attachments.
#[derive(Debug, Default, Clone, Copy)]
pub struct EmailParser;

impl EmailParser {
    pub fn new() -> Self {
        Self
    }

    /// Parses a raw message and collects its document attachments.
    ///
    /// Fails only when the message cannot be parsed at all. Parts whose body
    /// cannot be decoded are logged and skipped.
    pub fn parse(&self, raw_email: &[u8], source_key: &str) -> Result<ParsedEmail> {
        let message = MessageParser::default()
            .parse(raw_email)
            .ok_or_else(|| EmailError::ParseError("Failed to parse email message".to_string()))?;

        if message.headers().is_empty() {
            return Err(EmailError::ParseError(
                "Message has no header section".to_string(),
            ));
        }

        let envelope = extract_envelope(&message, source_key);
        debug!(
            "Parsing email {} from={:?} subject={:?} message_id={:?}",
            source_key, envelope.sender, envelope.subject, envelope.message_id
        );

        let mut attachments = Vec::new();
        collect_attachments(&message, &mut attachments);

        if attachments.is_empty() {
            debug!("No PDF, ZIP or image attachments found in {}", source_key);
        } else {
            debug!(
                "Extracted {} attachments from {}",
                attachments.len(),
                source_key
            );
        }

        Ok(ParsedEmail {
            envelope,
            attachments,
        })
    }
}

fn extract_envelope(message: &Message, source_key: &str) -> EmailEnvelope {
    let sender = message
        .from()
        .and_then(|addr| addr.first())
        .map(|addr| match addr.address() {
            Some(address) => address.trim().to_string(),
            None => normalize_sender(addr.name().unwrap_or_default()),
        })
        .unwrap_or_default();

    EmailEnvelope {
        sender,
        subject: message.subject().unwrap_or_default().to_string(),
        message_id: message.message_id().unwrap_or_default().trim().to_string(),
        date: message
            .header_raw(HeaderName::Date)
            .map(|raw| raw.trim().to_string())
            .unwrap_or_default(),
        source_key: source_key.to_string(),
    }
}

/// Reduces a `"Name <addr>"` sender to the bracketed address.
pub fn normalize_sender(raw: &str) -> String {
    if let (Some(start), Some(end)) = (raw.find('<'), raw.rfind('>')) {
        if start < end {
            return raw[start + 1..end].trim().to_string();
        }
    }
    raw.trim().to_string()
}

/// Walks every part, descending into attached messages.
fn collect_attachments(message: &Message, attachments: &mut Vec<Attachment>) {
    for part in message.parts.iter() {
        match &part.body {
            PartType::Multipart(_) => continue,
            PartType::Message(nested) => {
                collect_attachments(nested, attachments);
                continue;
            }
            _ => {}
        }

        if let Some(attachment) = attachment_from_part(part, attachments.len()) {
            debug!(
                "Found attachment: {} ({}, {} bytes)",
                attachment.filename,
                attachment.media_type,
                attachment.content.len()
            );
            attachments.push(attachment);
        }
    }
}

fn attachment_from_part(part: &MessagePart, collected: usize) -> Option<Attachment> {
    let media_type = media_type_of(part);
    let has_attachment_disposition = part
        .content_disposition()
        .map(|d| d.ctype().eq_ignore_ascii_case("attachment"))
        .unwrap_or(false);

    if has_attachment_disposition {
        let Some(filename) = part.attachment_name().filter(|n| !n.is_empty()) else {
            debug!("Attachment part without filename skipped ({})", media_type);
            return None;
        };
        let content = match decoded_body(part) {
            Some(content) => content,
            None => {
                warn!("Could not decode attachment {}", filename);
                return None;
            }
        };
        if !has_supported_extension(filename) {
            debug!("Skipping attachment {} (unsupported file type)", filename);
            return None;
        }
        return Some(Attachment {
            filename: filename.to_string(),
            media_type,
            content,
        });
    }

    if !is_document_media_type(&media_type) {
        return None;
    }

    let filename = match part.attachment_name().filter(|n| !n.is_empty()) {
        Some(name) => name.to_string(),
        None => format!(
            "attachment_{}.{}",
            collected + 1,
            extension_for_media_type(&media_type)
        ),
    };
    let Some(content) = decoded_body(part) else {
        warn!("Could not decode inline part {}", filename);
        return None;
    };

    Some(Attachment {
        filename,
        media_type,
        content,
    })
}

fn media_type_of(part: &MessagePart) -> String {
    part.content_type()
        .map(|ct| match ct.subtype() {
            Some(subtype) => format!("{}/{}", ct.ctype(), subtype),
            None => ct.ctype().to_string(),
        })
        .unwrap_or_else(|| "text/plain".to_string())
        .to_ascii_lowercase()
}

/// Returns the decoded body, or `None` when it is empty or not a leaf.
fn decoded_body(part: &MessagePart) -> Option<Vec<u8>> {
    let content = match &part.body {
        PartType::Binary(data) | PartType::InlineBinary(data) => data.to_vec(),
        PartType::Text(text) | PartType::Html(text) => text.as_bytes().to_vec(),
        PartType::Message(_) | PartType::Multipart(_) => return None,
    };
    if content.is_empty() {
        None
    } else {
        Some(content)
    }
}

/// Case-insensitive check against [`SUPPORTED_EXTENSIONS`].
pub fn has_supported_extension(filename: &str) -> bool {
    let lower = filename.to_ascii_lowercase();
    SUPPORTED_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

fn is_document_media_type(media_type: &str) -> bool {
    media_type == "application/pdf"
        || media_type == "application/zip"
        || media_type.starts_with("image/")
}

fn extension_for_media_type(media_type: &str) -> &'static str {
    match media_type {
        "application/pdf" => "pdf",
        "application/zip" => "zip",
        _ => "jpg",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn multipart(from: &str, extra_headers: &str, parts: &[&str]) -> Vec<u8> {
        let mut raw = format!(
            "From: {}\r\nTo: invoices@example.com\r\nSubject: Monthly bills\r\n\
             Date: Mon, 15 Jan 2024 10:30:00 +0000\r\n{}MIME-Version: 1.0\r\n\
             Content-Type: multipart/mixed; boundary=\"XYZ\"\r\n\r\n",
            from, extra_headers
        );
        raw.push_str("--XYZ\r\nContent-Type: text/plain\r\n\r\nPlease see attached.\r\n");
        for part in parts {
            raw.push_str("--XYZ\r\n");
            raw.push_str(part);
            raw.push_str("\r\n");
        }
        raw.push_str("--XYZ--\r\n");
        raw.into_bytes()
    }

    // "%PDF-1.4 test" in base64
    const PDF_B64: &str = "JVBERi0xLjQgdGVzdA==";

    fn attached(filename: &str, content_type: &str) -> String {
        format!(
            "Content-Type: {}\r\nContent-Disposition: attachment; filename=\"{}\"\r\n\
             Content-Transfer-Encoding: base64\r\n\r\n{}",
            content_type, filename, PDF_B64
        )
    }

    #[test]
    fn test_normalize_sender() {
        assert_eq!(normalize_sender("Jane Doe <jane@example.com>"), "jane@example.com");
        assert_eq!(normalize_sender(" jane@example.com "), "jane@example.com");
        assert_eq!(normalize_sender("<a@b.com>"), "a@b.com");
        assert_eq!(normalize_sender("broken > order <"), "broken > order <");
    }

    #[test]
    fn test_has_supported_extension() {
        assert!(has_supported_extension("invoice.PDF"));
        assert!(has_supported_extension("scan.jpeg"));
        assert!(has_supported_extension("bundle.zip"));
        assert!(!has_supported_extension("setup.exe"));
        assert!(!has_supported_extension("pdf"));
    }

    #[test]
    fn test_envelope_fields() {
        let raw = multipart(
            "\"Jane Doe\" <jane@example.com>",
            "Message-ID: <abc@x>\r\n",
            &[],
        );
        let parsed = EmailParser::new().parse(&raw, "Emails/one").unwrap();

        assert_eq!(parsed.envelope.sender, "jane@example.com");
        assert_eq!(parsed.envelope.subject, "Monthly bills");
        assert_eq!(parsed.envelope.message_id, "abc@x");
        assert_eq!(parsed.envelope.date, "Mon, 15 Jan 2024 10:30:00 +0000");
        assert_eq!(parsed.envelope.source_key, "Emails/one");
        assert!(parsed.attachments.is_empty());
    }

    #[test]
    fn test_missing_headers_are_empty() {
        let raw = b"Subject: only a subject\r\n\r\nbody\r\n";
        let parsed = EmailParser::new().parse(raw, "k").unwrap();
        assert_eq!(parsed.envelope.sender, "");
        assert_eq!(parsed.envelope.message_id, "");
        assert_eq!(parsed.envelope.date, "");
    }

    #[test]
    fn test_unparseable_dates_are_kept_verbatim() {
        let monday = b"From: a@b.com\r\nSubject: Invoice\r\nDate: sometime on monday\r\n\r\nbody\r\n";
        let tuesday = b"From: a@b.com\r\nSubject: Invoice\r\nDate: sometime on tuesday\r\n\r\nbody\r\n";
        let first = EmailParser::new().parse(monday, "k1").unwrap().envelope;
        let second = EmailParser::new().parse(tuesday, "k2").unwrap().envelope;

        assert_eq!(first.date, "sometime on monday");
        assert_eq!(second.date, "sometime on tuesday");
        assert_ne!(
            crate::email::EmailSignature::of(&first),
            crate::email::EmailSignature::of(&second)
        );
    }

    #[test]
    fn test_attachment_disposition_with_supported_extension() {
        let raw = multipart(
            "a@b.com",
            "",
            &[
                &attached("invoice.pdf", "application/pdf"),
                &attached("setup.exe", "application/octet-stream"),
                &attached("scan.PNG", "application/octet-stream"),
            ],
        );
        let parsed = EmailParser::new().parse(&raw, "k").unwrap();

        let names: Vec<&str> = parsed
            .attachments
            .iter()
            .map(|a| a.filename.as_str())
            .collect();
        assert_eq!(names, vec!["invoice.pdf", "scan.PNG"]);
        assert_eq!(parsed.attachments[0].content, b"%PDF-1.4 test");
        assert_eq!(parsed.attachments[0].media_type, "application/pdf");
    }

    #[test]
    fn test_inline_document_parts_get_synthesized_names() {
        let inline_pdf = format!(
            "Content-Type: application/pdf\r\nContent-Transfer-Encoding: base64\r\n\r\n{}",
            PDF_B64
        );
        let inline_image = format!(
            "Content-Type: image/png\r\nContent-Transfer-Encoding: base64\r\n\r\n{}",
            PDF_B64
        );
        let named_image = format!(
            "Content-Type: image/jpeg; name=\"receipt.jpeg\"\r\n\
             Content-Disposition: inline\r\nContent-Transfer-Encoding: base64\r\n\r\n{}",
            PDF_B64
        );
        let raw = multipart("a@b.com", "", &[&inline_pdf, &inline_image, &named_image]);
        let parsed = EmailParser::new().parse(&raw, "k").unwrap();

        let names: Vec<&str> = parsed
            .attachments
            .iter()
            .map(|a| a.filename.as_str())
            .collect();
        assert_eq!(names, vec!["attachment_1.pdf", "attachment_2.jpg", "receipt.jpeg"]);
    }

    #[test]
    fn test_plain_text_parts_are_not_attachments() {
        let html = "Content-Type: text/html\r\n\r\n<p>hello</p>";
        let raw = multipart("a@b.com", "", &[html]);
        let parsed = EmailParser::new().parse(&raw, "k").unwrap();
        assert!(parsed.attachments.is_empty());
    }

    #[test]
    fn test_attachments_inside_forwarded_message() {
        let inner = String::from_utf8(multipart(
            "vendor@shop.com",
            "",
            &[&attached("forwarded.pdf", "application/pdf")],
        ))
        .unwrap();
        let forwarded = format!(
            "Content-Type: message/rfc822\r\nContent-Disposition: attachment; filename=\"fwd.eml\"\r\n\r\n{}",
            inner
        );
        let raw = multipart("a@b.com", "", &[&forwarded]);
        let parsed = EmailParser::new().parse(&raw, "k").unwrap();

        assert_eq!(parsed.envelope.sender, "a@b.com");
        assert_eq!(parsed.attachments.len(), 1);
        assert_eq!(parsed.attachments[0].filename, "forwarded.pdf");
    }

    #[test]
    fn test_unparseable_message_fails() {
        let result = EmailParser::new().parse(b"", "k");
        assert!(matches!(result, Err(EmailError::ParseError(_))));
    }
}

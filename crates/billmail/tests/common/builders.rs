//! Builders for raw emails and the documents they carry.

#![allow(dead_code)]

use std::io::{Cursor, Write};

use base64::Engine;
use lopdf::{dictionary, Document, Object, Stream};
use zip::write::SimpleFileOptions;

/// Builder for raw MIME messages.
pub struct EmailBuilder {
    from: Option<String>,
    subject: String,
    message_id: Option<String>,
    date: String,
    parts: Vec<String>,
}

impl EmailBuilder {
    /// A message from `from` with a Message-ID and a fixed date.
    pub fn new(from: &str) -> Self {
        Self {
            from: Some(from.to_string()),
            subject: "Invoices".to_string(),
            message_id: None,
            date: "Mon, 15 Jan 2024 10:30:00 +0000".to_string(),
            parts: Vec::new(),
        }
    }

    /// A message without a From header.
    pub fn anonymous() -> Self {
        Self {
            from: None,
            ..Self::new("")
        }
    }

    pub fn subject(mut self, subject: &str) -> Self {
        self.subject = subject.to_string();
        self
    }

    pub fn message_id(mut self, id: &str) -> Self {
        self.message_id = Some(id.to_string());
        self
    }

    pub fn date(mut self, date: &str) -> Self {
        self.date = date.to_string();
        self
    }

    /// Adds an attachment with a Content-Disposition filename.
    pub fn attachment(mut self, filename: &str, content_type: &str, content: &[u8]) -> Self {
        self.parts.push(format!(
            "Content-Type: {}\r\nContent-Disposition: attachment; filename=\"{}\"\r\n\
             Content-Transfer-Encoding: base64\r\n\r\n{}",
            content_type,
            filename,
            encode_lines(content)
        ));
        self
    }

    /// Adds an inline part with no disposition or filename.
    pub fn inline(mut self, content_type: &str, content: &[u8]) -> Self {
        self.parts.push(format!(
            "Content-Type: {}\r\nContent-Transfer-Encoding: base64\r\n\r\n{}",
            content_type,
            encode_lines(content)
        ));
        self
    }

    pub fn build(self) -> Vec<u8> {
        let mut raw = String::new();
        if let Some(from) = &self.from {
            raw.push_str(&format!("From: {}\r\n", from));
        }
        raw.push_str("To: invoices@example.com\r\n");
        raw.push_str(&format!("Subject: {}\r\n", self.subject));
        raw.push_str(&format!("Date: {}\r\n", self.date));
        if let Some(id) = &self.message_id {
            raw.push_str(&format!("Message-ID: <{}>\r\n", id));
        }
        raw.push_str("MIME-Version: 1.0\r\n");
        raw.push_str("Content-Type: multipart/mixed; boundary=\"BILLMAIL-BOUNDARY\"\r\n\r\n");
        raw.push_str("--BILLMAIL-BOUNDARY\r\nContent-Type: text/plain\r\n\r\nPlease see attached.\r\n");
        for part in &self.parts {
            raw.push_str("--BILLMAIL-BOUNDARY\r\n");
            raw.push_str(part);
            raw.push_str("\r\n");
        }
        raw.push_str("--BILLMAIL-BOUNDARY--\r\n");
        raw.into_bytes()
    }
}

fn encode_lines(content: &[u8]) -> String {
    let encoded = base64::engine::general_purpose::STANDARD.encode(content);
    encoded
        .as_bytes()
        .chunks(76)
        .map(|chunk| String::from_utf8_lossy(chunk).into_owned())
        .collect::<Vec<_>>()
        .join("\r\n")
}

/// A one-page PDF whose text layer holds `text`.
pub fn pdf_with_text(text: &str) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => font_id,
        },
    });
    let content = format!("BT /F1 12 Tf 50 700 Td ({}) Tj ET", text);
    let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        "Resources" => resources_id,
        "Contents" => content_id,
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Count" => 1,
            "Kids" => vec![Object::from(page_id)],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).expect("Failed to save PDF");
    bytes
}

/// A small PNG image.
pub fn png_image() -> Vec<u8> {
    let img = image::RgbImage::from_pixel(4, 4, image::Rgb([255, 255, 255]));
    let mut bytes = Cursor::new(Vec::new());
    img.write_to(&mut bytes, image::ImageFormat::Png)
        .expect("Failed to encode PNG");
    bytes.into_inner()
}

/// A ZIP archive with the given entries, all deflated.
pub fn zip_with(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for (name, content) in entries {
        writer
            .start_file(*name, SimpleFileOptions::default())
            .expect("Failed to start ZIP entry");
        writer.write_all(content).expect("Failed to write ZIP entry");
    }
    writer.finish().expect("Failed to finish ZIP").into_inner()
}

/// Payload of the entry [`zip_with_corrupt_entry`] damages.
const CORRUPT_MARKER: &[u8] = b"%PDF-1.4 this entry will fail its checksum";

/// A ZIP archive with `good` entries plus a stored entry named `bad_name`
/// whose bytes no longer match the recorded CRC.
pub fn zip_with_corrupt_entry(good: &[(&str, &[u8])], bad_name: &str) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for (name, content) in good {
        writer
            .start_file(*name, SimpleFileOptions::default())
            .expect("Failed to start ZIP entry");
        writer.write_all(content).expect("Failed to write ZIP entry");
    }
    writer
        .start_file(
            bad_name,
            SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored),
        )
        .expect("Failed to start ZIP entry");
    writer
        .write_all(CORRUPT_MARKER)
        .expect("Failed to write ZIP entry");
    let mut bytes = writer.finish().expect("Failed to finish ZIP").into_inner();

    let start = bytes
        .windows(CORRUPT_MARKER.len())
        .position(|w| w == CORRUPT_MARKER)
        .expect("stored entry present");
    let last = start + CORRUPT_MARKER.len() - 1;
    bytes[last] ^= 0xFF;
    bytes
}

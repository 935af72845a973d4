pub mod archive;
pub mod image;
#[cfg(feature = "tesseract")]
pub mod ocr;
pub mod pdf;

use crate::error::ProcessError;

pub use self::image::{ImageTextReader, PreparedImage};

/// Suffixes handled by the image path.
pub const IMAGE_EXTENSIONS: &[&str] = &[".jpg", ".jpeg", ".png", ".bmp", ".tiff", ".webp"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    Image,
    Archive,
}

impl DocumentKind {
    /// Routes a filename by suffix, case-insensitively. Archives win over
    /// PDFs, PDFs over images.
    pub fn from_filename(filename: &str) -> Option<Self> {
        let lower = filename.to_ascii_lowercase();
        if lower.ends_with(".zip") {
            Some(Self::Archive)
        } else if lower.ends_with(".pdf") {
            Some(Self::Pdf)
        } else if IMAGE_EXTENSIONS.iter().any(|ext| lower.ends_with(ext)) {
            Some(Self::Image)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Image => "image",
            Self::Archive => "archive",
        }
    }
}

#[derive(Debug)]
enum SourceBody {
    Bytes(Vec<u8>),
    Unreadable(String),
}

/// A document to analyze: an attachment or an entry of an archive.
///
/// Archives are expanded with [`DocumentSource::resolve`]; only leaves
/// (PDFs and images) are ever read.
#[derive(Debug)]
pub struct DocumentSource {
    name: String,
    kind: DocumentKind,
    body: SourceBody,
}

impl DocumentSource {
    /// Wraps attachment content. Returns `None` for unsupported suffixes.
    pub fn new(name: impl Into<String>, content: Vec<u8>) -> Option<Self> {
        let name = name.into();
        let kind = DocumentKind::from_filename(&name)?;
        Some(Self {
            name,
            kind,
            body: SourceBody::Bytes(content),
        })
    }

    /// A leaf whose bytes could not be read; reading it yields `reason`.
    pub(crate) fn unreadable(name: String, kind: DocumentKind, reason: String) -> Self {
        Self {
            name,
            kind,
            body: SourceBody::Unreadable(reason),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> DocumentKind {
        self.kind
    }

    /// Expands the source into the leaves to analyze.
    ///
    /// Fails only when an archive cannot be opened at all. Entries that fail
    /// to decompress are returned as unreadable leaves.
    pub fn resolve(self) -> Result<Vec<DocumentSource>, ProcessError> {
        match (self.kind, &self.body) {
            (DocumentKind::Archive, SourceBody::Bytes(bytes)) => archive::entries(&self.name, bytes),
            (DocumentKind::Archive, SourceBody::Unreadable(reason)) => {
                Err(ProcessError::ArchiveOpen(reason.clone()))
            }
            _ => Ok(vec![self]),
        }
    }

    /// Returns the content of a leaf.
    pub fn read(&self) -> Result<&[u8], ProcessError> {
        match &self.body {
            SourceBody::Bytes(bytes) => Ok(bytes),
            SourceBody::Unreadable(reason) => Err(ProcessError::ArchiveEntry {
                name: self.name.clone(),
                reason: reason.clone(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_routing_by_suffix() {
        assert_eq!(DocumentKind::from_filename("a.ZIP"), Some(DocumentKind::Archive));
        assert_eq!(DocumentKind::from_filename("a.Pdf"), Some(DocumentKind::Pdf));
        assert_eq!(DocumentKind::from_filename("a.tiff"), Some(DocumentKind::Image));
        assert_eq!(DocumentKind::from_filename("a.webp"), Some(DocumentKind::Image));
        assert_eq!(DocumentKind::from_filename("a.docx"), None);
        assert_eq!(DocumentKind::from_filename("zip"), None);
    }

    #[test]
    fn test_leaf_resolves_to_itself() {
        let source = DocumentSource::new("bill.pdf", b"%PDF".to_vec()).unwrap();
        let leaves = source.resolve().unwrap();
        assert_eq!(leaves.len(), 1);
        assert_eq!(leaves[0].name(), "bill.pdf");
        assert_eq!(leaves[0].read().unwrap(), b"%PDF");
    }

    #[test]
    fn test_unsupported_suffix_has_no_source() {
        assert!(DocumentSource::new("notes.txt", b"hi".to_vec()).is_none());
    }

    #[test]
    fn test_unreadable_leaf_errors_on_read() {
        let source = DocumentSource::unreadable(
            "broken.pdf".to_string(),
            DocumentKind::Pdf,
            "invalid checksum".to_string(),
        );
        match source.read() {
            Err(ProcessError::ArchiveEntry { name, reason }) => {
                assert_eq!(name, "broken.pdf");
                assert_eq!(reason, "invalid checksum");
            }
            other => panic!("Expected ArchiveEntry error, got {:?}", other),
        }
    }
}

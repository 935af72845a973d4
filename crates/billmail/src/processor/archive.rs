use std::io::{Cursor, Read};

use log::{debug, warn};

use crate::error::ProcessError;
use crate::processor::{DocumentKind, DocumentSource};

/// Resource-fork folder written by macOS archivers.
const MACOS_METADATA_DIR: &str = "__MACOSX/";

/// Opens a ZIP archive held in memory and returns its analyzable entries in
/// archive order.
///
/// Entries outside `__MACOSX/` with a PDF or image suffix are kept. Nested
/// archives are not expanded. An entry that fails to decompress is returned
/// as an unreadable leaf so the remaining entries are unaffected.
pub fn entries(archive_name: &str, bytes: &[u8]) -> Result<Vec<DocumentSource>, ProcessError> {
    let _span = tracing::info_span!("processor.archive", archive = archive_name).entered();

    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).map_err(|e| {
        ProcessError::ArchiveOpen(format!("Failed to open ZIP {}: {}", archive_name, e))
    })?;

    let names: Vec<String> = archive.file_names().map(str::to_string).collect();
    debug!("Files in ZIP {}: {:?}", archive_name, names);

    let mut sources = Vec::new();
    for name in names {
        if name.starts_with(MACOS_METADATA_DIR) || name.ends_with('/') {
            continue;
        }
        let kind = match DocumentKind::from_filename(&name) {
            Some(kind @ (DocumentKind::Pdf | DocumentKind::Image)) => kind,
            _ => {
                debug!("Skipped {} in {}: not a PDF or image", name, archive_name);
                continue;
            }
        };

        match read_entry(&mut archive, &name) {
            Ok(content) => sources.push(DocumentSource {
                name,
                kind,
                body: super::SourceBody::Bytes(content),
            }),
            Err(reason) => {
                warn!("Error extracting {} from {}: {}", name, archive_name, reason);
                sources.push(DocumentSource::unreadable(name, kind, reason));
            }
        }
    }

    Ok(sources)
}

fn read_entry(
    archive: &mut zip::ZipArchive<Cursor<&[u8]>>,
    name: &str,
) -> Result<Vec<u8>, String> {
    let mut entry = archive.by_name(name).map_err(|e| e.to_string())?;
    let mut content = Vec::new();
    entry.read_to_end(&mut content).map_err(|e| e.to_string())?;
    Ok(content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    fn build_zip(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        for (name, content) in entries {
            writer
                .start_file(*name, SimpleFileOptions::default())
                .unwrap();
            writer.write_all(content).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn test_filters_entries() {
        let bytes = build_zip(&[
            ("invoice.pdf", &b"%PDF-1.4"[..]),
            ("__MACOSX/._invoice.pdf", &b"junk"[..]),
            ("readme.txt", &b"hello"[..]),
            ("inner.zip", &b"PK"[..]),
            ("scans/receipt.JPG", &b"jpeg"[..]),
        ]);

        let sources = entries("bundle.zip", &bytes).unwrap();
        let names: Vec<&str> = sources.iter().map(|s| s.name()).collect();
        assert_eq!(names, vec!["invoice.pdf", "scans/receipt.JPG"]);
        assert_eq!(sources[0].kind(), DocumentKind::Pdf);
        assert_eq!(sources[1].kind(), DocumentKind::Image);
        assert_eq!(sources[0].read().unwrap(), b"%PDF-1.4");
    }

    #[test]
    fn test_garbage_is_open_error() {
        let result = entries("bad.zip", b"definitely not a zip");
        assert!(matches!(result, Err(ProcessError::ArchiveOpen(_))));
    }

    #[test]
    fn test_empty_archive_has_no_entries() {
        let bytes = build_zip(&[]);
        assert!(entries("empty.zip", &bytes).unwrap().is_empty());
    }
}

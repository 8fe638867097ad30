//! Document text extraction.
//!
//! Turns a source file into ordered, located fragments. Two formats are
//! recognized: PDF (paginated, one locator per page) and plain text (locator
//! is the window's position in the segmenter output).

use crate::segmenter::Segmenter;
use crate::types::Fragment;
use docqa_core::{AppError, AppResult};
use lopdf::Document;
use std::fs;
use std::path::Path;

/// Recognized document formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Pdf,
    PlainText,
}

impl DocumentFormat {
    /// Detect the format from the file extension (case-insensitive).
    pub fn from_path(path: &Path) -> AppResult<Self> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        match extension.as_deref() {
            Some("pdf") => Ok(Self::Pdf),
            Some("txt") => Ok(Self::PlainText),
            Some(other) => Err(AppError::UnsupportedFormat(format!(
                ".{} ({})",
                other,
                path.display()
            ))),
            None => Err(AppError::UnsupportedFormat(format!(
                "no file extension ({})",
                path.display()
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::PlainText => "text",
        }
    }
}

/// Extracts fragments from documents using one segmenter configuration.
#[derive(Debug, Clone, Copy)]
pub struct Extractor {
    segmenter: Segmenter,
}

impl Extractor {
    pub fn new(segmenter: Segmenter) -> Self {
        Self { segmenter }
    }

    /// Extract fragments from `path` in document order.
    ///
    /// Fails with `UnsupportedFormat` before touching the file when the
    /// extension is not recognized, and with an I/O category error
    /// (`Io`/`Document`) when the file cannot be read or decoded.
    pub fn extract(&self, path: &Path) -> AppResult<Vec<Fragment>> {
        let format = DocumentFormat::from_path(path)?;
        tracing::debug!("Extracting {} document {:?}", format.as_str(), path);

        let mut fragments = match format {
            DocumentFormat::Pdf => self.extract_pdf(path)?,
            DocumentFormat::PlainText => self.extract_plain_text(path)?,
        };

        if let Some(name) = path.file_name().map(|n| n.to_string_lossy().into_owned()) {
            for fragment in &mut fragments {
                fragment.source = Some(name.clone());
            }
        }

        tracing::info!(
            "Extracted {} fragments from {:?}",
            fragments.len(),
            path
        );
        Ok(fragments)
    }

    fn extract_pdf(&self, path: &Path) -> AppResult<Vec<Fragment>> {
        let bytes = fs::read(path)?;
        let document = Document::load_mem(&bytes)
            .map_err(|e| AppError::Document(format!("Failed to parse PDF {:?}: {}", path, e)))?;

        if document.is_encrypted() {
            return Err(AppError::Document(format!(
                "Encrypted PDF is not supported: {:?}",
                path
            )));
        }

        let mut fragments = Vec::new();
        // get_pages is keyed by 1-based page number, in page order
        for page_number in document.get_pages().into_keys() {
            let text = match document.extract_text(&[page_number]) {
                Ok(text) => text,
                Err(e) => {
                    tracing::warn!(
                        "Could not decode text on page {} of {:?}, treating it as blank: {}",
                        page_number,
                        path,
                        e
                    );
                    continue;
                }
            };

            fragments.extend(
                self.segmenter
                    .split(&text)
                    .filter_map(|window| non_blank(window, page_number)),
            );
        }

        Ok(fragments)
    }

    fn extract_plain_text(&self, path: &Path) -> AppResult<Vec<Fragment>> {
        let bytes = fs::read(path)?;
        let text = String::from_utf8(bytes).map_err(|e| {
            AppError::Document(format!("{:?} is not valid UTF-8 text: {}", path, e))
        })?;

        Ok(self.fragments_from_text(&text))
    }

    /// Segment plain text, numbering fragments by window position.
    ///
    /// Blank windows still consume a position, so locators can skip numbers.
    pub fn fragments_from_text(&self, text: &str) -> Vec<Fragment> {
        self.segmenter
            .split(text)
            .enumerate()
            .filter_map(|(i, window)| non_blank(window, i as u32 + 1))
            .collect()
    }
}

fn non_blank(window: &str, locator: u32) -> Option<Fragment> {
    let trimmed = window.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(Fragment::new(trimmed, locator))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Object, Stream};
    use tempfile::TempDir;

    fn extractor(size: usize, overlap: usize) -> Extractor {
        Extractor::new(Segmenter::new(size, overlap).unwrap())
    }

    /// Write a single-font PDF with one text line per page.
    fn write_pdf(path: &Path, pages: &[&str]) {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let mut kids = Vec::new();
        for text in pages {
            let mut operations = vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 12.into()]),
                Operation::new("Td", vec![72.into(), 720.into()]),
            ];
            if !text.is_empty() {
                operations.push(Operation::new("Tj", vec![Object::string_literal(*text)]));
            }
            operations.push(Operation::new("ET", vec![]));

            let content = Content { operations };
            let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            kids.push(page_id.into());
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        doc.save(path).unwrap();
    }

    #[test]
    fn test_format_detection() {
        assert_eq!(
            DocumentFormat::from_path(Path::new("a/report.PDF")).unwrap(),
            DocumentFormat::Pdf
        );
        assert_eq!(
            DocumentFormat::from_path(Path::new("notes.txt")).unwrap(),
            DocumentFormat::PlainText
        );
        assert!(matches!(
            DocumentFormat::from_path(Path::new("letter.docx")),
            Err(AppError::UnsupportedFormat(_))
        ));
        assert!(matches!(
            DocumentFormat::from_path(Path::new("README")),
            Err(AppError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_unsupported_format_checked_before_reading() {
        let err = extractor(100, 10)
            .extract(Path::new("/nonexistent/file.docx"))
            .unwrap_err();
        assert!(matches!(err, AppError::UnsupportedFormat(_)));
    }

    #[test]
    fn test_missing_file_is_io_failure() {
        let err = extractor(100, 10)
            .extract(Path::new("/nonexistent/file.txt"))
            .unwrap_err();
        assert!(err.is_io_failure());
    }

    #[test]
    fn test_plain_text_locators_are_positions() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("notes.txt");
        fs::write(&path, "abcdefghij").unwrap();

        let fragments = extractor(4, 1).extract(&path).unwrap();
        let locators: Vec<u32> = fragments.iter().map(|f| f.locator).collect();
        let contents: Vec<&str> = fragments.iter().map(|f| f.content.as_str()).collect();

        assert_eq!(contents, vec!["abcd", "defg", "ghij"]);
        assert_eq!(locators, vec![1, 2, 3]);
        assert!(fragments
            .iter()
            .all(|f| f.source.as_deref() == Some("notes.txt")));
    }

    #[test]
    fn test_blank_windows_dropped_but_counted() {
        let fragments = extractor(4, 0).fragments_from_text("abcd        efgh");
        let locators: Vec<u32> = fragments.iter().map(|f| f.locator).collect();

        assert_eq!(fragments.len(), 2);
        assert_eq!(locators, vec![1, 4]);
    }

    #[test]
    fn test_invalid_utf8_is_io_failure() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("binary.txt");
        fs::write(&path, [0xff, 0xfe, 0x00, 0x80]).unwrap();

        let err = extractor(100, 10).extract(&path).unwrap_err();
        assert!(err.is_io_failure());
    }

    #[test]
    fn test_corrupt_pdf_is_io_failure() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("broken.pdf");
        fs::write(&path, b"this is not a pdf at all").unwrap();

        let err = extractor(100, 10).extract(&path).unwrap_err();
        assert!(err.is_io_failure());
    }

    #[test]
    fn test_pdf_fragments_carry_page_numbers() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("guide.pdf");
        write_pdf(
            &path,
            &[
                "Python is a programming language.",
                "",
                "Machine learning is a branch of AI.",
            ],
        );

        let fragments = extractor(1000, 200).extract(&path).unwrap();

        // The blank second page contributes nothing.
        assert_eq!(fragments.len(), 2);
        assert_eq!(fragments[0].locator, 1);
        assert!(fragments[0].content.contains("Python"));
        assert_eq!(fragments[1].locator, 3);
        assert!(fragments[1].content.contains("Machine"));
        assert_eq!(fragments[0].source.as_deref(), Some("guide.pdf"));
    }
}

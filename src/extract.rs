//! Per-page text extraction.
//!
//! Turns [`DocumentHandle`]s into [`SourceDocument`]s: an ordered page →
//! text table plus the full-document concatenation. The page-text backend
//! is pluggable so tests can run without real PDFs.
//!
//! Failure is document-scoped: an unreadable document is reported in the
//! [`ExtractionReport`] and the rest of the batch still extracts. A page
//! the backend cannot parse yields an empty string, never an error.

use std::collections::BTreeMap;

use tracing::debug;

use crate::models::SourceDocument;
use crate::sources::DocumentHandle;

/// Pluggable page-text backend.
///
/// Returns the text of every page in order, one entry per page. A backend
/// must map an unparsable page to an empty string rather than failing;
/// only a document it cannot open at all is an error.
pub trait PageTextSource: Send + Sync {
    fn pages(&self, bytes: &[u8]) -> Result<Vec<String>, String>;
}

/// Default backend: `pdf-extract` over in-memory PDF bytes.
pub struct PdfPages;

impl PageTextSource for PdfPages {
    fn pages(&self, bytes: &[u8]) -> Result<Vec<String>, String> {
        pdf_extract::extract_text_from_mem_by_pages(bytes).map_err(|e| e.to_string())
    }
}

/// One document that could not be extracted.
#[derive(Debug, Clone)]
pub struct DocumentFailure {
    pub title: String,
    pub reason: String,
}

/// Result of extracting a batch: successfully extracted documents keyed
/// by title, plus per-document failures. The caller decides whether a
/// failure aborts the batch.
#[derive(Debug, Default)]
pub struct ExtractionReport {
    pub documents: BTreeMap<String, SourceDocument>,
    pub failures: Vec<DocumentFailure>,
}

/// Extract every document in the batch.
///
/// Pages are numbered from 1 in reading order; `full_text` is the
/// concatenation of the page texts with nothing inserted between them.
pub fn extract_documents(
    handles: &[DocumentHandle],
    source: &dyn PageTextSource,
) -> ExtractionReport {
    let mut report = ExtractionReport::default();

    for handle in handles {
        let title = handle.title();

        let bytes = match handle.read() {
            Ok(b) => b,
            Err(e) => {
                report.failures.push(DocumentFailure {
                    title,
                    reason: e.to_string(),
                });
                continue;
            }
        };

        match source.pages(&bytes) {
            Ok(pages) => {
                let mut text_by_page = BTreeMap::new();
                let mut full_text = String::new();
                for (i, page_text) in pages.into_iter().enumerate() {
                    full_text.push_str(&page_text);
                    text_by_page.insert(i as u32 + 1, page_text);
                }
                debug!(
                    document = %title,
                    pages = text_by_page.len(),
                    chars = full_text.len(),
                    "extracted document"
                );
                report.documents.insert(
                    title.clone(),
                    SourceDocument {
                        title,
                        text_by_page,
                        full_text,
                    },
                );
            }
            Err(reason) => {
                report.failures.push(DocumentFailure { title, reason });
            }
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Test backend: UTF-8 bytes split into pages on form feed.
    pub(crate) struct FormFeedPages;

    impl PageTextSource for FormFeedPages {
        fn pages(&self, bytes: &[u8]) -> Result<Vec<String>, String> {
            let text = std::str::from_utf8(bytes).map_err(|e| e.to_string())?;
            Ok(text.split('\u{000C}').map(|p| p.to_string()).collect())
        }
    }

    #[test]
    fn pages_are_contiguous_from_one_and_full_text_is_concat() {
        let handle = DocumentHandle::from_bytes(
            "doc.pdf",
            "page one text\u{000C}page two text\u{000C}page three".into(),
        );
        let report = extract_documents(&[handle], &FormFeedPages);
        assert!(report.failures.is_empty());

        let doc = &report.documents["doc.pdf"];
        let pages: Vec<u32> = doc.text_by_page.keys().copied().collect();
        assert_eq!(pages, vec![1, 2, 3]);

        let concat: String = doc.text_by_page.values().cloned().collect();
        assert_eq!(doc.full_text, concat);
        assert_eq!(doc.full_text, "page one textpage two textpage three");
    }

    #[test]
    fn unreadable_document_fails_alone() {
        let good = DocumentHandle::from_bytes("good.pdf", "fine text".into());
        let bad = DocumentHandle::from_bytes("bad.pdf", vec![0xFF, 0xFE, 0xFD]);
        let report = extract_documents(&[good, bad], &FormFeedPages);

        assert_eq!(report.documents.len(), 1);
        assert!(report.documents.contains_key("good.pdf"));
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].title, "bad.pdf");
    }

    #[test]
    fn missing_file_is_a_document_failure() {
        let handle = DocumentHandle::from_path("/nonexistent/nowhere.pdf");
        let report = extract_documents(&[handle], &FormFeedPages);
        assert!(report.documents.is_empty());
        assert_eq!(report.failures.len(), 1);
    }

    #[test]
    fn invalid_pdf_bytes_fail_with_real_backend() {
        let handle = DocumentHandle::from_bytes("nope.pdf", b"not a pdf".to_vec());
        let report = extract_documents(&[handle], &PdfPages);
        assert!(report.documents.is_empty());
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].title, "nope.pdf");
    }
}

//! Core data models used throughout askpdf.
//!
//! These types represent the documents, chunks, and answers that flow
//! through the extraction, indexing, and retrieval pipeline.

use std::collections::BTreeMap;

/// A fully extracted source document: per-page text plus the concatenation
/// of all pages in page order. Immutable once constructed.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    /// Display name or path of the originating file.
    pub title: String,
    /// Page number (1-based, contiguous) → raw page text. A page that the
    /// backend could not parse maps to an empty string.
    pub text_by_page: BTreeMap<u32, String>,
    /// All page texts concatenated in page order, with no separator
    /// inserted beyond what the page text already contains.
    pub full_text: String,
}

impl SourceDocument {
    /// Number of pages in the document.
    pub fn page_count(&self) -> u32 {
        self.text_by_page.len() as u32
    }
}

/// A bounded-length text segment derived from one document.
#[derive(Debug, Clone)]
pub struct Chunk {
    /// 1-based ordinal within the owning document. Dense: `1..=N`.
    pub ordinal: u32,
    /// Chunk text, including any overlap prefix carried from the
    /// previous chunk.
    pub text: String,
    /// Best-effort originating page. Non-decreasing in ordinal order.
    pub page: u32,
}

/// The chunking result for one document.
#[derive(Debug, Clone)]
pub struct ChunkedDocument {
    pub chunks: Vec<Chunk>,
}

impl ChunkedDocument {
    /// The ordinal → page table for this document.
    pub fn chunk_to_page(&self) -> BTreeMap<u32, u32> {
        self.chunks.iter().map(|c| (c.ordinal, c.page)).collect()
    }
}

/// Provenance metadata attached to every indexed chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkMeta {
    /// Title of the owning document.
    pub source: String,
    /// Attributed page number.
    pub page: u32,
    /// Chunk ordinal within the document.
    pub ordinal: u32,
}

/// A chunk paired with its embedding vector, owned by the knowledge base.
#[derive(Debug, Clone)]
pub struct IndexEntry {
    pub vector: Vec<f32>,
    pub text: String,
    pub meta: ChunkMeta,
}

/// One entry of a retrieval result: a matching chunk with its metadata
/// and similarity score, in descending relevance order.
#[derive(Debug, Clone)]
pub struct Retrieved {
    pub text: String,
    pub meta: ChunkMeta,
    pub score: f32,
}

/// A `(source title, page)` pair indicating where retrieved content
/// originated. `Ord` sorts by title first, then page, which is exactly
/// the citation ordering contract.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Citation {
    pub source: String,
    pub page: u32,
}

/// The synthesized answer plus its deduplicated, sorted citations.
#[derive(Debug, Clone)]
pub struct AnswerRecord {
    pub answer: String,
    pub citations: Vec<Citation>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn citation_ord_is_title_then_page() {
        let mut cites = vec![
            Citation {
                source: "b.pdf".into(),
                page: 1,
            },
            Citation {
                source: "a.pdf".into(),
                page: 9,
            },
            Citation {
                source: "a.pdf".into(),
                page: 2,
            },
        ];
        cites.sort();
        assert_eq!(cites[0].source, "a.pdf");
        assert_eq!(cites[0].page, 2);
        assert_eq!(cites[1].page, 9);
        assert_eq!(cites[2].source, "b.pdf");
    }

    #[test]
    fn chunk_to_page_table() {
        let doc = ChunkedDocument {
            chunks: vec![
                Chunk {
                    ordinal: 1,
                    text: "a".into(),
                    page: 1,
                },
                Chunk {
                    ordinal: 2,
                    text: "b".into(),
                    page: 3,
                },
            ],
        };
        let table = doc.chunk_to_page();
        assert_eq!(table.get(&1), Some(&1));
        assert_eq!(table.get(&2), Some(&3));
    }
}

//! Overlap chunking and chunk → page attribution.
//!
//! Splits a document's full text on a configured separator into units,
//! then greedily packs consecutive units into chunks of at most
//! `chunk_size` characters. When a new chunk starts it is seeded with the
//! trailing `chunk_overlap` characters of the previous chunk, so adjacent
//! chunks overlap. The seed shrinks when a large unit follows it, so no
//! chunk ever exceeds `chunk_size`; only the overlap degrades.
//!
//! # Page attribution
//!
//! Each chunk is attributed to a page by scanning pages forward from the
//! last attributed page and taking the first page whose raw text contains
//! the chunk's probe (its first [`PROBE_CHARS`] characters, whitespace-
//! trimmed) as a substring. The scan never backtracks, so attributed
//! pages are non-decreasing in ordinal order even when text repeats
//! across pages.
//!
//! The probe legitimately misses when the overlap seed straddles a page
//! boundary or when extraction normalized whitespace differently from the
//! concatenation. In that case the chunk reuses the previous chunk's page
//! (page 1 for the first chunk); attribution degrades, it never aborts.

use std::collections::BTreeMap;

use crate::config::ChunkingConfig;
use crate::models::{Chunk, ChunkedDocument, SourceDocument};

/// Characters of chunk text used as the page-attribution probe.
const PROBE_CHARS: usize = 50;

/// Chunk one document and attribute every chunk to a page.
///
/// Ordinals are dense `1..=N`; pages are non-decreasing in ordinal order.
pub fn split_document(doc: &SourceDocument, cfg: &ChunkingConfig) -> ChunkedDocument {
    let texts = split_text(
        &doc.full_text,
        cfg.chunk_size,
        cfg.chunk_overlap,
        &cfg.separator,
    );
    let pages = attribute_pages(&texts, &doc.text_by_page);

    let chunks = texts
        .into_iter()
        .zip(pages)
        .enumerate()
        .map(|(i, (text, page))| Chunk {
            ordinal: i as u32 + 1,
            text,
            page,
        })
        .collect();

    ChunkedDocument { chunks }
}

/// Split text into overlapping chunks of at most `chunk_size` characters.
///
/// Empty units (consecutive separators, leading/trailing separator) are
/// skipped. A unit longer than `chunk_size` is hard-split at the nearest
/// newline or space boundary within the limit.
pub fn split_text(
    text: &str,
    chunk_size: usize,
    chunk_overlap: usize,
    separator: &str,
) -> Vec<String> {
    let mut chunks: Vec<String> = Vec::new();
    let mut current = String::new();
    // Length of the overlap seed at the front of `current`; a chunk is
    // only emitted once it holds more than its seed.
    let mut seed_len = 0usize;

    for unit in text.split(separator) {
        if unit.is_empty() {
            continue;
        }

        if unit.len() > chunk_size {
            if current.len() > seed_len {
                chunks.push(std::mem::take(&mut current));
            }
            hard_split_unit(unit, chunk_size, chunk_overlap, separator, &mut chunks);
            current = chunks
                .last()
                .map(|c| overlap_tail(c, chunk_overlap))
                .unwrap_or_default();
            seed_len = current.len();
            continue;
        }

        let joined_len = if current.is_empty() {
            unit.len()
        } else {
            current.len() + separator.len() + unit.len()
        };

        if joined_len > chunk_size && current.len() > seed_len {
            chunks.push(current.clone());
            current = overlap_tail(&current, chunk_overlap);
            seed_len = current.len();
        }

        // A bare seed must never push the chunk past the limit; drop its
        // oldest characters until the unit fits.
        if !current.is_empty() && current.len() + separator.len() + unit.len() > chunk_size {
            current = overlap_tail(
                &current,
                chunk_size.saturating_sub(unit.len() + separator.len()),
            );
            seed_len = current.len();
        }

        if !current.is_empty() {
            current.push_str(separator);
        }
        current.push_str(unit);
    }

    if current.len() > seed_len {
        chunks.push(current);
    }

    chunks
}

/// Hard-split one oversized unit into pieces of at most `chunk_size`
/// characters, seeding each piece with the previous chunk's overlap tail.
fn hard_split_unit(
    unit: &str,
    chunk_size: usize,
    chunk_overlap: usize,
    separator: &str,
    chunks: &mut Vec<String>,
) {
    let mut remaining = unit;
    let mut first = true;
    while !remaining.is_empty() {
        let mut seed = chunks
            .last()
            .map(|c| overlap_tail(c, chunk_overlap))
            .unwrap_or_default();
        let sep_len = if first && !seed.is_empty() {
            separator.len()
        } else {
            0
        };
        if seed.len() + sep_len >= chunk_size {
            seed = overlap_tail(&seed, chunk_size.saturating_sub(sep_len + 1));
        }
        let budget = chunk_size.saturating_sub(seed.len() + sep_len).max(1);
        let take = hard_split_point(remaining, budget);

        let mut piece = seed;
        if !piece.is_empty() && first {
            // Pieces after the first continue the same unit, so only the
            // first gets the separator between seed and text.
            piece.push_str(separator);
        }
        piece.push_str(&remaining[..take]);
        chunks.push(piece);

        remaining = &remaining[take..];
        first = false;
    }
}

/// Byte index to split `s` at so the head is at most `max` bytes, snapped
/// to a char boundary and preferring a newline or space within the window.
/// Always makes progress (returns at least one char).
fn hard_split_point(s: &str, max: usize) -> usize {
    if s.len() <= max {
        return s.len();
    }
    let limit = snap_to_char_boundary(s, max);
    let limit = ensure_progress(s, limit);
    let preferred = s[..limit]
        .rfind('\n')
        .or_else(|| s[..limit].rfind(' '))
        .map(|pos| pos + 1)
        .unwrap_or(limit);
    ensure_progress(s, snap_to_char_boundary(s, preferred))
}

/// Snap a byte index back to the nearest valid UTF-8 char boundary.
fn snap_to_char_boundary(s: &str, index: usize) -> usize {
    if index >= s.len() {
        return s.len();
    }
    let mut i = index;
    while i > 0 && !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}

/// Bump a zero split point forward to the first char boundary.
fn ensure_progress(s: &str, index: usize) -> usize {
    if index > 0 || s.is_empty() {
        return index;
    }
    s.char_indices()
        .nth(1)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

/// The trailing `overlap` characters of a chunk, snapped to a char
/// boundary, used to seed the next chunk.
fn overlap_tail(text: &str, overlap: usize) -> String {
    if overlap == 0 || text.is_empty() {
        return String::new();
    }
    let start = snap_forward(text, text.len().saturating_sub(overlap));
    text[start..].to_string()
}

fn snap_forward(s: &str, index: usize) -> usize {
    let mut i = index;
    while i < s.len() && !s.is_char_boundary(i) {
        i += 1;
    }
    i
}

/// The whitespace-trimmed probe used to locate a chunk's page.
fn probe(chunk: &str) -> String {
    let head: String = chunk.chars().take(PROBE_CHARS).collect();
    head.trim().to_string()
}

/// Attribute each chunk to a page via a forward-only substring scan.
///
/// The scan's lower bound only advances, so the returned pages are
/// non-decreasing. A chunk whose probe matches no page at or past the
/// cursor reuses the previous chunk's page (page 1 for the first chunk).
pub fn attribute_pages(chunks: &[String], text_by_page: &BTreeMap<u32, String>) -> Vec<u32> {
    let mut pages = Vec::with_capacity(chunks.len());
    let mut current_page = 1u32;

    for chunk in chunks {
        let needle = probe(chunk);
        let matched = text_by_page
            .range(current_page..)
            .find(|(_, page_text)| page_text.contains(&needle))
            .map(|(&page, _)| page);

        let page = matched.unwrap_or(current_page);
        current_page = page;
        pages.push(page);
    }

    pages
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ChunkingConfig;

    fn doc(pages: &[&str]) -> SourceDocument {
        let text_by_page: BTreeMap<u32, String> = pages
            .iter()
            .enumerate()
            .map(|(i, t)| (i as u32 + 1, t.to_string()))
            .collect();
        let full_text = pages.concat();
        SourceDocument {
            title: "doc.pdf".into(),
            text_by_page,
            full_text,
        }
    }

    fn cfg(chunk_size: usize, chunk_overlap: usize) -> ChunkingConfig {
        ChunkingConfig {
            chunk_size,
            chunk_overlap,
            separator: "\n".into(),
        }
    }

    #[test]
    fn small_text_single_chunk() {
        let chunks = split_text("Hello, world!", 100, 20, "\n");
        assert_eq!(chunks, vec!["Hello, world!".to_string()]);
    }

    #[test]
    fn empty_text_yields_no_chunks() {
        assert!(split_text("", 100, 20, "\n").is_empty());
        assert!(split_text("\n\n\n", 100, 20, "\n").is_empty());
    }

    #[test]
    fn consecutive_chunks_overlap() {
        let a = "a".repeat(80);
        let b = "b".repeat(80);
        let text = format!("{}\n{}", a, b);
        let chunks = split_text(&text, 100, 20, "\n");
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0], a);
        // The seed is trimmed to 19 chars so the chunk stays within the
        // limit (19 + separator + 80 = 100).
        assert!(chunks[1].starts_with(&"a".repeat(19)));
        assert!(chunks[1].ends_with(&b));
        assert_eq!(chunks[1].len(), 100);
    }

    #[test]
    fn overlap_seed_never_pushes_a_chunk_past_the_limit() {
        // Two units that each nearly fill a chunk: the second chunk's
        // seed must shrink rather than overflow the limit.
        let a = "a".repeat(95);
        let b = "b".repeat(95);
        let text = format!("{}\n{}", a, b);
        let chunks = split_text(&text, 100, 20, "\n");
        assert_eq!(chunks.len(), 2);
        for c in &chunks {
            assert!(c.len() <= 100, "chunk has {} chars", c.len());
        }
        // The trimmed seed still provides what overlap the limit allows.
        assert!(chunks[1].starts_with("aaaa\n"));
        assert!(chunks[1].ends_with(&b));
    }

    #[test]
    fn oversized_unit_is_hard_split_at_spaces() {
        let text = "word ".repeat(60); // 300 chars, no separator
        let chunks = split_text(text.trim_end(), 100, 0, "\n");
        assert!(chunks.len() >= 3);
        for c in &chunks {
            assert!(c.len() <= 100, "chunk too long: {}", c.len());
        }
        // Nothing lost: pieces re-concatenate to the original.
        assert_eq!(chunks.concat(), text.trim_end());
    }

    #[test]
    fn multibyte_text_splits_on_char_boundaries() {
        let text = "é".repeat(200);
        let chunks = split_text(&text, 50, 10, "\n");
        assert!(!chunks.is_empty());
        for c in &chunks {
            assert!(c.chars().all(|ch| ch == 'é'));
        }
    }

    #[test]
    fn ordinals_are_dense_from_one() {
        let pages: Vec<String> = (0..6)
            .map(|i| format!("{}\n", ('a'..='z').nth(i).unwrap().to_string().repeat(45)))
            .collect();
        let page_refs: Vec<&str> = pages.iter().map(|s| s.as_str()).collect();
        let chunked = split_document(&doc(&page_refs), &cfg(100, 20));
        for (i, c) in chunked.chunks.iter().enumerate() {
            assert_eq!(c.ordinal, i as u32 + 1);
        }
    }

    #[test]
    fn attribution_is_non_decreasing_and_matches_expected_pages() {
        // Three 2-line pages, 45 chars per line. With chunk_size=100 and
        // overlap=20 this packs into five chunks whose probes alternate
        // between matching (chunk starts inside one page) and falling
        // back (overlap seed straddles a page boundary).
        let a1 = "a".repeat(45);
        let a2 = "b".repeat(45);
        let b1 = "c".repeat(45);
        let b2 = "d".repeat(45);
        let c1 = "e".repeat(45);
        let c2 = "f".repeat(45);
        let page1 = format!("{}\n{}\n", a1, a2);
        let page2 = format!("{}\n{}\n", b1, b2);
        let page3 = format!("{}\n{}\n", c1, c2);

        let chunked = split_document(&doc(&[&page1, &page2, &page3]), &cfg(100, 20));
        let assigned: Vec<u32> = chunked.chunks.iter().map(|c| c.page).collect();
        assert_eq!(assigned, vec![1, 1, 2, 2, 3]);
    }

    #[test]
    fn scan_never_backtracks_on_repeated_text() {
        // The same sentence appears on pages 1 and 3. Once the cursor has
        // advanced to page 2, a later chunk matching the repeated text
        // must land on page 3, not back on page 1.
        let repeated = "x".repeat(45);
        let middle = "m".repeat(45);
        let page1 = format!("{}\n", repeated);
        let page2 = format!("{}\n", middle);
        let page3 = format!("{}\n", repeated);

        let chunked = split_document(&doc(&[&page1, &page2, &page3]), &cfg(60, 0));
        let assigned: Vec<u32> = chunked.chunks.iter().map(|c| c.page).collect();
        assert_eq!(assigned, vec![1, 2, 3]);
    }

    #[test]
    fn unmatched_probe_reuses_previous_page() {
        let chunks = vec!["never on any page".to_string()];
        let mut pages = BTreeMap::new();
        pages.insert(1, "completely different content".to_string());
        assert_eq!(attribute_pages(&chunks, &pages), vec![1]);

        // Second chunk misses too and inherits the first chunk's page.
        let chunks = vec!["completely different".to_string(), "no match here".to_string()];
        assert_eq!(attribute_pages(&chunks, &pages), vec![1, 1]);
    }

    #[test]
    fn probe_is_trimmed_and_char_limited() {
        assert_eq!(probe("   padded text   "), "padded text");
        let long = "y".repeat(200);
        assert_eq!(probe(&long).len(), 50);
        // Multibyte chars count as chars, not bytes.
        let accented = "é".repeat(60);
        assert_eq!(probe(&accented).chars().count(), 50);
    }
}

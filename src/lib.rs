//! # askpdf
//!
//! Grounded question answering over PDF documents with page-level citations.
//!
//! askpdf ingests a set of PDFs, splits their text into overlapping chunks,
//! attributes each chunk back to its originating page, embeds the chunks into
//! an in-memory vector index, and answers natural-language questions by
//! retrieving the most similar chunks and synthesizing an answer with a
//! deduplicated, sorted citation list.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐   ┌─────────┐   ┌─────────┐   ┌───────────────┐
//! │ Documents │──▶│ Extract │──▶│  Chunk  │──▶│ KnowledgeBase │
//! │  (PDFs)   │   │ per page│   │ + pages │   │ embed + index │
//! └───────────┘   └─────────┘   └─────────┘   └──────┬────────┘
//!                                                    │ query time
//!                                       ┌────────────┴───────────┐
//!                                       ▼                        ▼
//!                                 ┌──────────┐           ┌──────────────┐
//!                                 │ Retrieve │──────────▶│  Synthesize  │
//!                                 │  top-k   │           │ answer+cites │
//!                                 └──────────┘           └──────────────┘
//! ```
//!
//! The whole flow is driven through a [`pipeline::Session`], which caches
//! each stage's output so repeated calls never redo completed work.
//!
//! ## Quick Start
//!
//! ```bash
//! askpdf chunks report.pdf                 # inspect the chunk → page table
//! askpdf ask "What is the conclusion?" --pdf report.pdf
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`error`] | Pipeline error taxonomy |
//! | [`sources`] | Opaque PDF document handles |
//! | [`extract`] | Per-page text extraction |
//! | [`chunk`] | Overlap chunking and page attribution |
//! | [`embedding`] | Embedding service abstraction |
//! | [`index`] | In-memory vector index |
//! | [`search`] | Top-k similarity retrieval |
//! | [`answer`] | Answer synthesis and citations |
//! | [`pipeline`] | Per-session pipeline cache |

pub mod answer;
pub mod chunk;
pub mod config;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod index;
pub mod models;
pub mod pipeline;
pub mod search;
pub mod sources;

//! The in-memory knowledge base: embedded chunks plus similarity search.
//!
//! Built exactly once per document set (the session cache enforces that);
//! search is brute-force cosine similarity over all entries, the same
//! approach as scanning every stored vector in a small corpus.

use std::collections::BTreeMap;

use tracing::{debug, info};

use crate::embedding::{cosine_similarity, EmbeddingService};
use crate::error::{PipelineError, ServiceError};
use crate::models::{ChunkMeta, ChunkedDocument, IndexEntry, Retrieved};

/// The searchable collection of embedded chunks for one document set.
#[derive(Debug, Default)]
pub struct KnowledgeBase {
    entries: Vec<IndexEntry>,
}

impl KnowledgeBase {
    /// Flatten all documents' chunks, embed them in batches, and build
    /// the index.
    ///
    /// An empty document set yields an empty knowledge base without any
    /// service call. An `Unauthorized` failure from the embedding service
    /// is translated to [`PipelineError::InvalidCredential`]; this is the
    /// one place credential problems are specifically diagnosed.
    pub async fn build(
        chunked: &BTreeMap<String, ChunkedDocument>,
        embeddings: &dyn EmbeddingService,
        batch_size: usize,
    ) -> Result<Self, PipelineError> {
        let mut texts: Vec<String> = Vec::new();
        let mut metas: Vec<ChunkMeta> = Vec::new();

        for (title, doc) in chunked {
            for chunk in &doc.chunks {
                texts.push(chunk.text.clone());
                metas.push(ChunkMeta {
                    source: title.clone(),
                    page: chunk.page,
                    ordinal: chunk.ordinal,
                });
            }
        }

        if texts.is_empty() {
            return Ok(Self::default());
        }

        let dims = embeddings.dims();
        let mut vectors: Vec<Vec<f32>> = Vec::with_capacity(texts.len());
        for batch in texts.chunks(batch_size.max(1)) {
            let batch_vecs = embeddings.embed(batch).await.map_err(|e| match e {
                ServiceError::Unauthorized => PipelineError::InvalidCredential,
                other => PipelineError::Service(other),
            })?;
            if batch_vecs.len() != batch.len() {
                return Err(PipelineError::Service(ServiceError::Transient(format!(
                    "embedding service returned {} vectors for {} texts",
                    batch_vecs.len(),
                    batch.len()
                ))));
            }
            if let Some(bad) = batch_vecs.iter().find(|v| v.len() != dims) {
                return Err(PipelineError::Service(ServiceError::Transient(format!(
                    "embedding service returned a {}-dim vector, expected {}",
                    bad.len(),
                    dims
                ))));
            }
            debug!(batch = batch.len(), "embedded chunk batch");
            vectors.extend(batch_vecs);
        }

        let entries = vectors
            .into_iter()
            .zip(texts)
            .zip(metas)
            .map(|((vector, text), meta)| IndexEntry { vector, text, meta })
            .collect::<Vec<_>>();

        info!(chunks = entries.len(), "knowledge base built");
        Ok(Self { entries })
    }

    /// The `k` entries whose vectors are closest to `query_vec` under
    /// cosine similarity, descending.
    pub fn similarity_search(&self, query_vec: &[f32], k: usize) -> Vec<Retrieved> {
        let mut scored: Vec<Retrieved> = self
            .entries
            .iter()
            .map(|entry| Retrieved {
                text: entry.text.clone(),
                meta: entry.meta.clone(),
                score: cosine_similarity(query_vec, &entry.vector),
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(k);
        scored
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

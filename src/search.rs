//! Query-time retrieval: embed the query, rank chunks by similarity.

use tracing::debug;

use crate::embedding::EmbeddingService;
use crate::error::PipelineError;
use crate::index::KnowledgeBase;
use crate::models::Retrieved;

/// Retrieve the `k` most similar chunks for `query` across all ingested
/// documents. No filtering by title or page.
///
/// An empty knowledge base returns an empty result without an embedding
/// call.
pub async fn search(
    kb: &KnowledgeBase,
    embeddings: &dyn EmbeddingService,
    query: &str,
    k: usize,
) -> Result<Vec<Retrieved>, PipelineError> {
    if kb.is_empty() {
        return Ok(Vec::new());
    }

    let query_vec = embeddings
        .embed(&[query.to_string()])
        .await
        .map_err(PipelineError::Service)?
        .into_iter()
        .next()
        .ok_or_else(|| {
            PipelineError::Service(crate::error::ServiceError::Transient(
                "empty embedding response for query".into(),
            ))
        })?;

    let hits = kb.similarity_search(&query_vec, k);
    debug!(query_len = query.len(), hits = hits.len(), "retrieval done");
    Ok(hits)
}

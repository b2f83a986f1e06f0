//! Answer synthesis and citation derivation.
//!
//! Uses the "stuff" strategy: every retrieved chunk is placed into one
//! prompt, in retrieval order, with no truncation beyond the generation
//! service's own context-length error. Citations are derived from the
//! same retrieval result: projected to `(source, page)`, deduplicated,
//! and sorted by title then page, so they are reproducible for a fixed
//! retrieval set regardless of rank order.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::time::Duration;
use tracing::debug;

use crate::config::GenerationConfig;
use crate::error::{PipelineError, ServiceError};
use crate::models::{AnswerRecord, Citation, Retrieved};

/// Answer returned when retrieval produced nothing to ground on. The
/// generation service is not called in that case.
pub const NO_CONTEXT_ANSWER: &str = "No relevant context found in the loaded documents.";

/// A black-box service turning context plus a question into an answer.
#[async_trait]
pub trait GenerationService: Send + Sync {
    async fn generate(&self, context: &str, question: &str) -> Result<String, ServiceError>;
}

/// Generation service backed by `POST /v1/chat/completions` on the
/// OpenAI API. Single attempt with the configured request timeout.
pub struct OpenAiChat {
    model: String,
    max_output_tokens: u32,
    temperature: f32,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiChat {
    pub fn new(config: &GenerationConfig, api_key: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            model: config.model.clone(),
            max_output_tokens: config.max_output_tokens,
            temperature: config.temperature,
            api_key: api_key.into(),
            client,
        })
    }
}

#[async_trait]
impl GenerationService for OpenAiChat {
    async fn generate(&self, context: &str, question: &str) -> Result<String, ServiceError> {
        let prompt = format!(
            "Use the following pieces of context to answer the question at the end. \
             If you don't know the answer, just say that you don't know, don't try \
             to make up an answer.\n\n{}\n\nQuestion: {}\nHelpful Answer:",
            context, question
        );

        let body = serde_json::json!({
            "model": self.model,
            "temperature": self.temperature,
            "max_tokens": self.max_output_tokens,
            "messages": [
                { "role": "user", "content": prompt },
            ],
        });

        let response = self
            .client
            .post("https://api.openai.com/v1/chat/completions")
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| ServiceError::Transient(e.to_string()))?;

        let status = response.status();
        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(ServiceError::Unauthorized);
        }
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            if body_text.contains("context_length_exceeded") {
                return Err(ServiceError::ContextLength(body_text));
            }
            return Err(ServiceError::Transient(format!(
                "OpenAI API error {}: {}",
                status, body_text
            )));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ServiceError::Transient(e.to_string()))?;

        json.get("choices")
            .and_then(|c| c.as_array())
            .and_then(|c| c.first())
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(|t| t.as_str())
            .map(|s| s.trim().to_string())
            .ok_or_else(|| ServiceError::Transient("invalid response: missing choices".into()))
    }
}

/// Project a retrieval result to its deduplicated, sorted citation list.
///
/// Ordering is title-lexicographic, then page-numeric, independent of
/// retrieval rank.
pub fn derive_citations(retrieved: &[Retrieved]) -> Vec<Citation> {
    retrieved
        .iter()
        .map(|r| Citation {
            source: r.meta.source.clone(),
            page: r.meta.page,
        })
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Synthesize an answer from the retrieved chunks and derive citations.
///
/// Generation-service failures surface as [`PipelineError::Generation`];
/// retrieval is not re-attempted.
pub async fn synthesize(
    query: &str,
    retrieved: &[Retrieved],
    generation: &dyn GenerationService,
) -> Result<AnswerRecord, PipelineError> {
    if retrieved.is_empty() {
        return Ok(AnswerRecord {
            answer: NO_CONTEXT_ANSWER.to_string(),
            citations: Vec::new(),
        });
    }

    let context = retrieved
        .iter()
        .map(|r| r.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");

    debug!(
        chunks = retrieved.len(),
        context_chars = context.len(),
        "synthesizing answer"
    );

    let answer = generation
        .generate(&context, query)
        .await
        .map_err(PipelineError::Generation)?;

    Ok(AnswerRecord {
        answer,
        citations: derive_citations(retrieved),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ChunkMeta;

    fn hit(source: &str, page: u32, text: &str, score: f32) -> Retrieved {
        Retrieved {
            text: text.to_string(),
            meta: ChunkMeta {
                source: source.to_string(),
                page,
                ordinal: 1,
            },
            score,
        }
    }

    struct EchoGeneration;

    #[async_trait]
    impl GenerationService for EchoGeneration {
        async fn generate(&self, context: &str, question: &str) -> Result<String, ServiceError> {
            Ok(format!("q={} ctx_len={}", question, context.len()))
        }
    }

    struct FailingGeneration;

    #[async_trait]
    impl GenerationService for FailingGeneration {
        async fn generate(&self, _: &str, _: &str) -> Result<String, ServiceError> {
            Err(ServiceError::Transient("quota exceeded".into()))
        }
    }

    #[test]
    fn citations_dedupe_and_sort_independent_of_rank() {
        // Retrieval rank order deliberately scrambled and duplicated.
        let retrieved = vec![
            hit("Doc2", 1, "b", 0.9),
            hit("Doc1", 3, "a", 0.8),
            hit("Doc1", 1, "c", 0.7),
            hit("Doc2", 1, "b again", 0.6),
        ];
        let cites = derive_citations(&retrieved);
        assert_eq!(
            cites,
            vec![
                Citation {
                    source: "Doc1".into(),
                    page: 1
                },
                Citation {
                    source: "Doc1".into(),
                    page: 3
                },
                Citation {
                    source: "Doc2".into(),
                    page: 1
                },
            ]
        );

        // Reversed rank order produces the identical list.
        let reversed: Vec<Retrieved> = retrieved.into_iter().rev().collect();
        assert_eq!(derive_citations(&reversed), cites);
    }

    #[test]
    fn two_single_page_documents_cite_alphabetically() {
        let retrieved = vec![
            hit("Doc2", 1, "Skepticism means questioning evidence.", 0.9),
            hit("Doc1", 1, "Professional scepticism is essential.", 0.8),
        ];
        let cites = derive_citations(&retrieved);
        assert_eq!(
            cites,
            vec![
                Citation {
                    source: "Doc1".into(),
                    page: 1
                },
                Citation {
                    source: "Doc2".into(),
                    page: 1
                },
            ]
        );
    }

    #[tokio::test]
    async fn stuff_context_preserves_retrieval_order() {
        let retrieved = vec![hit("Doc1", 1, "first", 0.9), hit("Doc2", 1, "second", 0.8)];
        let record = synthesize("why?", &retrieved, &EchoGeneration).await.unwrap();
        // "first\n\nsecond" = 13 chars
        assert_eq!(record.answer, "q=why? ctx_len=13");
        assert_eq!(record.citations.len(), 2);
    }

    #[tokio::test]
    async fn empty_retrieval_short_circuits_generation() {
        let record = synthesize("anything", &[], &FailingGeneration).await.unwrap();
        assert_eq!(record.answer, NO_CONTEXT_ANSWER);
        assert!(record.citations.is_empty());
    }

    #[tokio::test]
    async fn generation_failure_is_a_generation_error() {
        let retrieved = vec![hit("Doc1", 1, "text", 0.9)];
        let err = synthesize("q", &retrieved, &FailingGeneration)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Generation(_)));
    }
}

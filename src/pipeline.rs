//! Per-session pipeline cache.
//!
//! A [`Session`] owns one document set, one credential, and the cached
//! artifacts of each pipeline stage. The stage progression is an explicit
//! state machine (`Empty → Extracted → Chunked → Indexed`): whether a
//! stage has run is a type-level fact, not an attribute probe. Each
//! transition is idempotent, so calling [`Session::build_knowledge_base`]
//! twice embeds exactly once.
//!
//! On a stage failure the state stays at the last successful stage; a
//! retry with a corrected input (e.g. a valid credential) resumes there
//! without redoing extraction or chunking. `&mut self` on every entry
//! point gives single-flight per session.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, info};

use crate::answer::{synthesize, GenerationService, OpenAiChat};
use crate::chunk::split_document;
use crate::config::Config;
use crate::embedding::{EmbeddingService, OpenAiEmbeddings};
use crate::error::PipelineError;
use crate::extract::{extract_documents, DocumentFailure, PageTextSource, PdfPages};
use crate::index::KnowledgeBase;
use crate::models::{AnswerRecord, ChunkedDocument, SourceDocument};
use crate::search::search;
use crate::sources::DocumentHandle;

/// Pipeline stage, carrying every artifact computed so far.
enum SessionState {
    Empty,
    Extracted {
        documents: BTreeMap<String, SourceDocument>,
    },
    Chunked {
        documents: BTreeMap<String, SourceDocument>,
        chunked: BTreeMap<String, ChunkedDocument>,
    },
    Indexed {
        documents: BTreeMap<String, SourceDocument>,
        chunked: BTreeMap<String, ChunkedDocument>,
        kb: KnowledgeBase,
    },
}

impl SessionState {
    fn name(&self) -> &'static str {
        match self {
            SessionState::Empty => "empty",
            SessionState::Extracted { .. } => "extracted",
            SessionState::Chunked { .. } => "chunked",
            SessionState::Indexed { .. } => "indexed",
        }
    }
}

/// One question-answering session over one document set.
pub struct Session {
    config: Config,
    credential: Option<String>,
    handles: Vec<DocumentHandle>,
    page_source: Box<dyn PageTextSource>,
    embeddings: Option<Arc<dyn EmbeddingService>>,
    generation: Option<Arc<dyn GenerationService>>,
    state: SessionState,
    extraction_failures: Vec<DocumentFailure>,
}

impl Session {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            credential: None,
            handles: Vec::new(),
            page_source: Box::new(PdfPages),
            embeddings: None,
            generation: None,
            state: SessionState::Empty,
            extraction_failures: Vec::new(),
        }
    }

    /// Install a new document set and credential, discarding all cached
    /// artifacts.
    pub fn configure(&mut self, handles: Vec<DocumentHandle>, credential: impl Into<String>) {
        self.handles = handles;
        self.credential = Some(credential.into());
        self.state = SessionState::Empty;
        self.extraction_failures.clear();
        info!(documents = self.handles.len(), "session configured");
    }

    /// Replace the credential without touching the document set.
    ///
    /// Extraction and chunking artifacts do not depend on the credential
    /// and survive; the knowledge base is discarded so the next build
    /// embeds with the new credential.
    pub fn set_credential(&mut self, credential: impl Into<String>) {
        self.credential = Some(credential.into());
        let state = std::mem::replace(&mut self.state, SessionState::Empty);
        self.state = match state {
            SessionState::Indexed {
                documents, chunked, ..
            } => SessionState::Chunked { documents, chunked },
            // Anything below Indexed is credential-independent.
            other => other,
        };
    }

    /// Swap in a different page-text backend (tests, alternate formats).
    pub fn set_page_source(&mut self, source: Box<dyn PageTextSource>) {
        self.page_source = source;
    }

    /// Inject service implementations instead of the OpenAI defaults.
    pub fn set_services(
        &mut self,
        embeddings: Arc<dyn EmbeddingService>,
        generation: Arc<dyn GenerationService>,
    ) {
        self.embeddings = Some(embeddings);
        self.generation = Some(generation);
    }

    /// Per-document extraction failures from the last build, when
    /// `extraction.skip_unreadable` let the batch continue.
    pub fn extraction_failures(&self) -> &[DocumentFailure] {
        &self.extraction_failures
    }

    /// Extracted documents, available at `Extracted` or later.
    pub fn documents(&self) -> Option<&BTreeMap<String, SourceDocument>> {
        match &self.state {
            SessionState::Empty => None,
            SessionState::Extracted { documents }
            | SessionState::Chunked { documents, .. }
            | SessionState::Indexed { documents, .. } => Some(documents),
        }
    }

    /// Chunk tables, available at `Chunked` or later.
    pub fn chunked(&self) -> Option<&BTreeMap<String, ChunkedDocument>> {
        match &self.state {
            SessionState::Chunked { chunked, .. } | SessionState::Indexed { chunked, .. } => {
                Some(chunked)
            }
            _ => None,
        }
    }

    /// Drive the pipeline to `Extracted` and return the documents.
    /// Idempotent like every stage transition.
    pub fn extract(&mut self) -> Result<&BTreeMap<String, SourceDocument>, PipelineError> {
        self.ensure_extracted()?;
        self.documents().ok_or_else(|| stage_error("extracted"))
    }

    /// Drive the pipeline to `Chunked` and return the chunk tables.
    pub fn chunk(&mut self) -> Result<&BTreeMap<String, ChunkedDocument>, PipelineError> {
        self.ensure_extracted()?;
        self.ensure_chunked();
        self.chunked().ok_or_else(|| stage_error("chunked"))
    }

    /// Drive the pipeline to `Indexed` and return the knowledge base.
    /// Idempotent: at `Indexed` the cached knowledge base is returned
    /// without recomputation.
    pub async fn build_knowledge_base(&mut self) -> Result<&KnowledgeBase, PipelineError> {
        self.ensure_extracted()?;
        self.ensure_chunked();
        self.ensure_indexed().await?;

        match &self.state {
            SessionState::Indexed { kb, .. } => Ok(kb),
            // ensure_indexed either reached Indexed or returned an error.
            _ => Err(stage_error("indexed")),
        }
    }

    /// Answer a question against the knowledge base, building it first
    /// if needed.
    pub async fn ask(&mut self, query: &str) -> Result<AnswerRecord, PipelineError> {
        self.build_knowledge_base().await?;

        let kb = match &self.state {
            SessionState::Indexed { kb, .. } => kb,
            _ => return Err(stage_error("indexed")),
        };

        if kb.is_empty() {
            // Scenario: nothing indexed. No retrieval, no generation.
            return synthesize(query, &[], &NoGeneration).await;
        }

        let embeddings = self.embedding_service()?;
        let retrieved = search(kb, embeddings.as_ref(), query, self.config.retrieval.top_k).await?;

        let generation = self.generation_service()?;
        synthesize(query, &retrieved, generation.as_ref()).await
    }

    fn ensure_extracted(&mut self) -> Result<(), PipelineError> {
        if !matches!(self.state, SessionState::Empty) {
            return Ok(());
        }

        let report = extract_documents(&self.handles, self.page_source.as_ref());
        self.extraction_failures = report.failures.clone();

        if !report.failures.is_empty() && !self.config.extraction.skip_unreadable {
            let failure = &report.failures[0];
            return Err(PipelineError::Extraction {
                document: failure.title.clone(),
                reason: failure.reason.clone(),
            });
        }

        debug!(
            documents = report.documents.len(),
            skipped = report.failures.len(),
            "extraction stage complete"
        );
        self.state = SessionState::Extracted {
            documents: report.documents,
        };
        Ok(())
    }

    fn ensure_chunked(&mut self) {
        let state = std::mem::replace(&mut self.state, SessionState::Empty);
        match state {
            SessionState::Extracted { documents } => {
                let chunked: BTreeMap<String, ChunkedDocument> = documents
                    .iter()
                    .map(|(title, doc)| {
                        (title.clone(), split_document(doc, &self.config.chunking))
                    })
                    .collect();
                let total: usize = chunked.values().map(|d| d.chunks.len()).sum();
                debug!(chunks = total, "chunking stage complete");
                self.state = SessionState::Chunked { documents, chunked };
            }
            other => self.state = other,
        }
    }

    async fn ensure_indexed(&mut self) -> Result<(), PipelineError> {
        if matches!(self.state, SessionState::Indexed { .. }) {
            debug!(stage = self.state.name(), "knowledge base cached, skipping build");
            return Ok(());
        }

        let state = std::mem::replace(&mut self.state, SessionState::Empty);
        let (documents, chunked) = match state {
            SessionState::Chunked { documents, chunked } => (documents, chunked),
            other => {
                self.state = other;
                return Ok(());
            }
        };

        let total_chunks: usize = chunked.values().map(|d| d.chunks.len()).sum();

        let result = if total_chunks == 0 {
            // Empty document set: an empty knowledge base, no service
            // call, and no credential required.
            Ok(KnowledgeBase::default())
        } else {
            match self.embedding_service() {
                Ok(embeddings) => {
                    KnowledgeBase::build(
                        &chunked,
                        embeddings.as_ref(),
                        self.config.embedding.batch_size,
                    )
                    .await
                }
                Err(e) => Err(e),
            }
        };

        match result {
            Ok(kb) => {
                self.state = SessionState::Indexed {
                    documents,
                    chunked,
                    kb,
                };
                Ok(())
            }
            Err(e) => {
                // Stay at the last successful stage so a retry resumes here.
                self.state = SessionState::Chunked { documents, chunked };
                Err(e)
            }
        }
    }

    fn embedding_service(&self) -> Result<Arc<dyn EmbeddingService>, PipelineError> {
        if let Some(service) = &self.embeddings {
            return Ok(service.clone());
        }
        let credential = self
            .credential
            .as_deref()
            .filter(|c| !c.is_empty())
            .ok_or(PipelineError::InvalidCredential)?;
        let service = OpenAiEmbeddings::new(&self.config.embedding, credential)
            .map_err(|e| PipelineError::Service(crate::error::ServiceError::Transient(e.to_string())))?;
        Ok(Arc::new(service))
    }

    fn generation_service(&self) -> Result<Arc<dyn GenerationService>, PipelineError> {
        if let Some(service) = &self.generation {
            return Ok(service.clone());
        }
        let credential = self
            .credential
            .as_deref()
            .filter(|c| !c.is_empty())
            .ok_or(PipelineError::InvalidCredential)?;
        let service = OpenAiChat::new(&self.config.generation, credential)
            .map_err(|e| PipelineError::Service(crate::error::ServiceError::Transient(e.to_string())))?;
        Ok(Arc::new(service))
    }
}

fn stage_error(stage: &str) -> PipelineError {
    PipelineError::Service(crate::error::ServiceError::Transient(format!(
        "pipeline did not reach the {} stage",
        stage
    )))
}

/// Placeholder used on the empty-knowledge-base path, where synthesis
/// short-circuits before any generation call.
struct NoGeneration;

#[async_trait::async_trait]
impl GenerationService for NoGeneration {
    async fn generate(
        &self,
        _context: &str,
        _question: &str,
    ) -> Result<String, crate::error::ServiceError> {
        Err(crate::error::ServiceError::Transient(
            "no generation service for an empty knowledge base".into(),
        ))
    }
}

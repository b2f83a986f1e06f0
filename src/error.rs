//! Error taxonomy for the question-answering pipeline.
//!
//! Extraction failures are document-scoped and may leave the rest of a
//! batch intact; credential failures must stop the pipeline and present
//! an actionable message; transient service failures surface their cause
//! without an automatic retry at this layer.

/// Failure reported by an embedding or generation service call.
#[derive(Debug)]
pub enum ServiceError {
    /// The service rejected the credential (HTTP 401/403).
    Unauthorized,
    /// The assembled prompt exceeded the model's context window.
    ContextLength(String),
    /// Transient network, timeout, quota, or server-side failure.
    Transient(String),
}

impl std::fmt::Display for ServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServiceError::Unauthorized => write!(f, "service rejected the API credential"),
            ServiceError::ContextLength(e) => write!(f, "context length exceeded: {}", e),
            ServiceError::Transient(e) => write!(f, "service error: {}", e),
        }
    }
}

impl std::error::Error for ServiceError {}

/// Top-level pipeline error.
#[derive(Debug)]
pub enum PipelineError {
    /// A document could not be opened or parsed at all. Other documents
    /// in the batch are unaffected.
    Extraction { document: String, reason: String },
    /// The embedding service rejected the credential while building the
    /// knowledge base. Requires re-configuration before retrying.
    InvalidCredential,
    /// A transient service failure outside answer generation.
    Service(ServiceError),
    /// Answer synthesis failed after successful retrieval.
    Generation(ServiceError),
}

impl std::fmt::Display for PipelineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineError::Extraction { document, reason } => {
                write!(f, "failed to extract '{}': {}", document, reason)
            }
            PipelineError::InvalidCredential => write!(
                f,
                "Please enter a valid OpenAI API key. You can find your API key at \
                 https://platform.openai.com/account/api-keys."
            ),
            PipelineError::Service(e) => write!(f, "{}", e),
            PipelineError::Generation(e) => write!(f, "answer generation failed: {}", e),
        }
    }
}

impl std::error::Error for PipelineError {}

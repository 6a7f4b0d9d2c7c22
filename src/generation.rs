//! Text-generation collaborator abstraction
//!
//! The session core treats reply and title generation as an external
//! capability: a pure function of the thread it is handed, with unbounded
//! latency and the possibility of failure. Implementations live outside this
//! crate (a remote model, a local one, a canned demo responder).

mod error;

pub use error::{GenerationError, GenerationErrorKind};

use crate::session::Message;
use async_trait::async_trait;
use std::sync::Arc;

/// Common interface for text-generation backends
#[async_trait]
pub trait GenerationService: Send + Sync {
    /// Produce a reply to the latest user turn, given the full prior thread
    async fn generate_reply(&self, thread: &[Arc<Message>]) -> Result<String, GenerationError>;

    /// Derive a short descriptive label for a thread
    async fn generate_title(&self, thread: &[Arc<Message>]) -> Result<String, GenerationError>;
}

/// Logging wrapper for generation services
pub struct LoggingService<G> {
    inner: G,
}

impl<G: GenerationService> LoggingService<G> {
    pub fn new(inner: G) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<G: GenerationService> GenerationService for LoggingService<G> {
    async fn generate_reply(&self, thread: &[Arc<Message>]) -> Result<String, GenerationError> {
        let start = std::time::Instant::now();
        let result = self.inner.generate_reply(thread).await;
        let duration = start.elapsed();

        match &result {
            Ok(reply) => {
                tracing::info!(
                    duration_ms = %duration.as_millis(),
                    thread_len = thread.len(),
                    reply_chars = reply.chars().count(),
                    "Reply generation completed"
                );
            }
            Err(e) => {
                tracing::error!(
                    duration_ms = %duration.as_millis(),
                    error = %e.message,
                    retryable = e.kind.is_retryable(),
                    "Reply generation failed"
                );
            }
        }

        result
    }

    async fn generate_title(&self, thread: &[Arc<Message>]) -> Result<String, GenerationError> {
        let result = self.inner.generate_title(thread).await;
        if let Err(e) = &result {
            tracing::warn!(error = %e.message, "Title generation failed");
        }
        result
    }
}

#[async_trait]
impl<G: GenerationService + ?Sized> GenerationService for Arc<G> {
    async fn generate_reply(&self, thread: &[Arc<Message>]) -> Result<String, GenerationError> {
        (**self).generate_reply(thread).await
    }

    async fn generate_title(&self, thread: &[Arc<Message>]) -> Result<String, GenerationError> {
        (**self).generate_title(thread).await
    }
}

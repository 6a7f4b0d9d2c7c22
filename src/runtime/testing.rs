//! Mock generation services for runtime tests

use crate::generation::{GenerationError, GenerationService};
use crate::session::Message;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

/// Mock generation service that returns queued results.
///
/// An optional delay (raced against nothing by the mock itself; the runtime's
/// cancellation token wins by dropping the future) makes cancellation and
/// busy-rejection windows observable in tests.
pub struct MockGenerationService {
    replies: Mutex<VecDeque<Result<String, GenerationError>>>,
    titles: Mutex<VecDeque<Result<String, GenerationError>>>,
    delay: Option<Duration>,
    /// Record of every thread handed to `generate_reply`
    pub reply_requests: Mutex<Vec<Vec<Arc<Message>>>>,
    /// Notified when a reply request starts (for test synchronization)
    pub reply_started: Arc<Notify>,
}

impl MockGenerationService {
    pub fn new() -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            titles: Mutex::new(VecDeque::new()),
            delay: None,
            reply_requests: Mutex::new(Vec::new()),
            reply_started: Arc::new(Notify::new()),
        }
    }

    /// Delay every reply by `delay` before resolving
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn queue_reply(&self, text: impl Into<String>) -> &Self {
        self.replies.lock().unwrap().push_back(Ok(text.into()));
        self
    }

    pub fn queue_reply_error(&self, error: GenerationError) -> &Self {
        self.replies.lock().unwrap().push_back(Err(error));
        self
    }

    pub fn queue_title(&self, text: impl Into<String>) -> &Self {
        self.titles.lock().unwrap().push_back(Ok(text.into()));
        self
    }

    pub fn recorded_reply_requests(&self) -> Vec<Vec<Arc<Message>>> {
        self.reply_requests.lock().unwrap().clone()
    }
}

impl Default for MockGenerationService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GenerationService for MockGenerationService {
    async fn generate_reply(&self, thread: &[Arc<Message>]) -> Result<String, GenerationError> {
        self.reply_requests.lock().unwrap().push(thread.to_vec());
        // notify_one stores a permit, so a test may start awaiting after the
        // request already began without missing the signal.
        self.reply_started.notify_one();

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(GenerationError::network("No mock reply queued")))
    }

    async fn generate_title(&self, _thread: &[Arc<Message>]) -> Result<String, GenerationError> {
        self.titles
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(GenerationError::unknown("No mock title queued")))
    }
}

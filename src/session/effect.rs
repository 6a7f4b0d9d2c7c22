//! Effects produced by state transitions

use crate::session::state::{DisplayMode, Message};
use std::sync::Arc;
use std::time::Duration;

/// Effects to be executed by the runtime after a transition
#[derive(Debug, Clone)]
pub enum Effect {
    /// Request a reply for the given thread snapshot
    RequestReply {
        conversation_id: String,
        thread: Vec<Arc<Message>>,
    },

    /// Request a derived title for the given thread snapshot
    RequestTitle {
        conversation_id: String,
        thread: Vec<Arc<Message>>,
    },

    /// Cancel the in-flight reply request for an abandoned conversation
    AbortGeneration { conversation_id: String },

    /// Re-issue the reply request after a backoff delay
    ScheduleRetry { delay: Duration, attempt: u32 },

    /// Notify observers of an observable change
    Notify(Notice),
}

/// Observable changes announced to subscribers
#[derive(Debug, Clone)]
pub enum Notice {
    MessageAppended {
        conversation_id: String,
        message: Arc<Message>,
    },
    PendingChanged {
        pending: bool,
    },
    ConversationStarted {
        conversation_id: String,
    },
    ConversationArchived {
        conversation_id: String,
    },
    TitleChanged {
        conversation_id: String,
        title: String,
    },
    MessageSaved {
        message: Arc<Message>,
        newly_saved: bool,
    },
    DisplayModeChanged {
        mode: DisplayMode,
    },
    /// A generation result arrived for a conversation that is no longer the
    /// active target; it was dropped without touching any thread.
    StaleReplyDiscarded {
        conversation_id: String,
    },
}

impl Effect {
    pub fn message_appended(conversation_id: impl Into<String>, message: Arc<Message>) -> Self {
        Effect::Notify(Notice::MessageAppended {
            conversation_id: conversation_id.into(),
            message,
        })
    }

    pub fn pending_changed(pending: bool) -> Self {
        Effect::Notify(Notice::PendingChanged { pending })
    }
}

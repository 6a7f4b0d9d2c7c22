//! Session state types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Who authored a message. Closed set by design.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

/// One turn in a thread. Immutable once constructed; shared via `Arc` so a
/// bookmark entry outlives the conversation that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    fn new(role: Role, content: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            id: uuid::Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            timestamp: Utc::now(),
        })
    }

    pub fn user(content: impl Into<String>) -> Arc<Self> {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Arc<Self> {
        Self::new(Role::Assistant, content)
    }
}

/// An ordered thread of messages plus metadata.
///
/// `messages` is append-only for the conversation's lifetime: entries are
/// never removed or reordered, and no two entries share an id.
#[derive(Debug, Clone, PartialEq)]
pub struct Conversation {
    pub id: String,
    pub title: String,
    messages: Vec<Arc<Message>>,
    pub timestamp: DateTime<Utc>,
}

impl Conversation {
    /// Create a conversation seeded with the assistant greeting.
    pub fn seeded(config: &SessionConfig) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            title: config.placeholder_title.clone(),
            messages: vec![Message::assistant(&config.greeting)],
            timestamp: Utc::now(),
        }
    }

    /// Append a message and mark activity. The id-uniqueness invariant holds
    /// because ids are minted per message; the debug assert guards misuse.
    pub(crate) fn push(&mut self, message: Arc<Message>) {
        debug_assert!(
            !self.messages.iter().any(|m| m.id == message.id),
            "duplicate message id in conversation"
        );
        self.timestamp = message.timestamp;
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[Arc<Message>] {
        &self.messages
    }

    /// Snapshot of the thread, for handing to a generation request.
    pub fn thread(&self) -> Vec<Arc<Message>> {
        self.messages.clone()
    }

    pub fn find_message(&self, message_id: &str) -> Option<&Arc<Message>> {
        self.messages.iter().find(|m| m.id == message_id)
    }

    /// Whether the user has contributed to this thread (anything beyond the
    /// seeded greeting).
    pub fn has_user_content(&self) -> bool {
        self.messages.iter().any(|m| m.role == Role::User)
    }
}

/// Deduplicated, insertion-ordered collection of saved messages.
///
/// Entries hold their own `Arc` to the message, so a saved message stays
/// retrievable after its conversation is discarded.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bookmarks {
    entries: Vec<Arc<Message>>,
}

impl Bookmarks {
    /// Idempotent insert by message id. Returns true if the entry was newly
    /// added, false if it was already present.
    pub fn add(&mut self, message: Arc<Message>) -> bool {
        if self.contains(&message.id) {
            return false;
        }
        self.entries.push(message);
        true
    }

    pub fn contains(&self, message_id: &str) -> bool {
        self.entries.iter().any(|m| m.id == message_id)
    }

    /// Saved messages in insertion order (oldest save first).
    pub fn list(&self) -> &[Arc<Message>] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Which sidebar panel the presentation layer shows. Purely presentational;
/// every mode is a legal direct target from every other mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayMode {
    #[default]
    History,
    Saved,
    Profile,
    About,
}

/// Generation phase of the session
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Phase {
    /// Ready for user input, no reply in flight
    #[default]
    Idle,

    /// A reply request is in flight for the named conversation
    Generating {
        conversation_id: String,
        attempt: u32,
    },
}

/// Full session state: the single active conversation, prior conversations
/// (most recent first), bookmarks, display mode, and generation phase.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    pub active: Conversation,
    pub history: Vec<Conversation>,
    pub bookmarks: Bookmarks,
    pub display_mode: DisplayMode,
    pub phase: Phase,
}

impl SessionState {
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            active: Conversation::seeded(config),
            history: Vec::new(),
            bookmarks: Bookmarks::default(),
            display_mode: DisplayMode::default(),
            phase: Phase::Idle,
        }
    }

    /// Whether a reply is in flight for the active conversation
    pub fn pending(&self) -> bool {
        matches!(self.phase, Phase::Generating { .. })
    }

    /// Look up a message in the active conversation or history
    pub fn find_message(&self, message_id: &str) -> Option<&Arc<Message>> {
        self.active.find_message(message_id).or_else(|| {
            self.history
                .iter()
                .find_map(|c| c.find_message(message_id))
        })
    }

    /// Look up a conversation (active or archived) by id
    pub fn find_conversation_mut(&mut self, conversation_id: &str) -> Option<&mut Conversation> {
        if self.active.id == conversation_id {
            return Some(&mut self.active);
        }
        self.history.iter_mut().find(|c| c.id == conversation_id)
    }
}

/// Immutable session configuration
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Assistant greeting seeded into every fresh conversation
    pub greeting: String,
    /// Title shown until one is derived from content
    pub placeholder_title: String,
    /// Assistant reply appended when generation ultimately fails
    pub fallback_reply: String,
    /// Total attempts (first try + retries) before giving up on a reply
    pub max_generation_attempts: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            greeting: "Hello! I'm your assistant. How can I help you today?".to_string(),
            placeholder_title: "New conversation".to_string(),
            fallback_reply:
                "Sorry, I couldn't generate a reply just now. Please try again.".to_string(),
            max_generation_attempts: 3,
        }
    }
}

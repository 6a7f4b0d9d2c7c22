//! Conversational session core
//!
//! A client-side session manager for a chat application: one active message
//! thread, a history of prior conversations, a bookmark set, and a display
//! mode selector, all mutated through a pure state-transition function and
//! driven by an async runtime that exchanges user input for replies from an
//! external [`generation::GenerationService`].
//!
//! Presentation, persistence, and transport are out of scope: embedders
//! subscribe to [`runtime::SessionUpdate`]s and read state snapshots from the
//! [`runtime::SessionHandle`].

pub mod generation;
pub mod runtime;
pub mod session;
pub mod title;

pub use generation::{GenerationError, GenerationErrorKind, GenerationService, LoggingService};
pub use runtime::{SessionClosed, SessionHandle, SessionRuntime, SessionUpdate};
pub use session::{
    Bookmarks, Conversation, DisplayMode, Message, Phase, Role, SessionConfig, SessionState,
};

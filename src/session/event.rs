//! Events that can change session state

use crate::generation::GenerationErrorKind;
use crate::session::state::DisplayMode;

/// Events that trigger state transitions.
///
/// The first four are the operations a presentation layer invokes; the rest
/// are produced by the runtime's background tasks and timers.
#[derive(Debug, Clone)]
pub enum Event {
    // User operations
    SubmitMessage {
        text: String,
    },
    StartConversation,
    SaveMessage {
        message_id: String,
    },
    SetDisplayMode {
        mode: DisplayMode,
    },

    // Generation outcomes, tagged with the conversation they target
    GenerationComplete {
        conversation_id: String,
        text: String,
    },
    GenerationFailed {
        conversation_id: String,
        kind: GenerationErrorKind,
        message: String,
    },
    RetryTimeout {
        attempt: u32,
    },

    // Title derivation outcome (already sanitized by the runtime)
    TitleGenerated {
        conversation_id: String,
        title: String,
    },
}

//! Pure state transition function
//!
//! All session mutation flows through [`transition`]: given the current
//! state, the session configuration, and an event, it returns the complete
//! next state plus the effects the runtime must perform. A failed transition
//! leaves the caller's state untouched, so every operation is atomic as
//! observed by readers.

use super::effect::{Effect, Notice};
use super::event::Event;
use super::state::{Conversation, Message, Phase, SessionConfig, SessionState};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: SessionState,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: SessionState) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }
}

/// Errors that can occur during transition
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("A reply is already being generated for this conversation")]
    GenerationPending,
    #[error("Unknown message id: {0}")]
    UnknownMessage(String),
}

/// Pure transition function.
///
/// Pure up to fresh message-id generation: given the same inputs it produces
/// the same shape of output, with no I/O side effects.
pub fn transition(
    state: &SessionState,
    config: &SessionConfig,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    match event {
        Event::SubmitMessage { text } => submit_message(state, &text),

        Event::GenerationComplete {
            conversation_id,
            text,
        } => {
            if pending_generation_attempt(state, &conversation_id).is_none() {
                return Ok(discard_stale(state, conversation_id));
            }
            let mut next = state.clone();
            let reply = Message::assistant(text);
            next.active.push(Arc::clone(&reply));
            next.phase = Phase::Idle;

            let mut result = TransitionResult::new(next)
                .with_effect(Effect::message_appended(
                    conversation_id.clone(),
                    reply,
                ))
                .with_effect(Effect::pending_changed(false));

            // Opportunistic title derivation once the thread has content and
            // no title was ever derived (or a previous derivation failed).
            if result.new_state.active.title == config.placeholder_title
                && result.new_state.active.has_user_content()
            {
                let thread = result.new_state.active.thread();
                result = result.with_effect(Effect::RequestTitle {
                    conversation_id,
                    thread,
                });
            }
            Ok(result)
        }

        Event::GenerationFailed {
            conversation_id,
            kind,
            message: _,
        } => {
            let Some(attempt) = pending_generation_attempt(state, &conversation_id) else {
                return Ok(discard_stale(state, conversation_id));
            };

            if kind.is_retryable() && attempt < config.max_generation_attempts {
                let next_attempt = attempt + 1;
                let mut next = state.clone();
                next.phase = Phase::Generating {
                    conversation_id,
                    attempt: next_attempt,
                };
                return Ok(TransitionResult::new(next).with_effect(Effect::ScheduleRetry {
                    delay: retry_delay(next_attempt),
                    attempt: next_attempt,
                }));
            }

            // Out of attempts (or not worth retrying): recover locally with a
            // fallback reply so the thread never ends on an unanswered user
            // message.
            let mut next = state.clone();
            let fallback = Message::assistant(&config.fallback_reply);
            next.active.push(Arc::clone(&fallback));
            next.phase = Phase::Idle;
            Ok(TransitionResult::new(next)
                .with_effect(Effect::message_appended(conversation_id, fallback))
                .with_effect(Effect::pending_changed(false)))
        }

        Event::RetryTimeout { attempt } => {
            // A backoff timer can outlive the generation it was scheduled
            // for (the session was reset meanwhile); ignore it then.
            match &state.phase {
                Phase::Generating {
                    conversation_id,
                    attempt: current,
                } if *current == attempt && state.active.id == *conversation_id => {
                    Ok(TransitionResult::new(state.clone()).with_effect(Effect::RequestReply {
                        conversation_id: conversation_id.clone(),
                        thread: state.active.thread(),
                    }))
                }
                _ => Ok(TransitionResult::new(state.clone())),
            }
        }

        Event::StartConversation => Ok(start_conversation(state, config)),

        Event::SaveMessage { message_id } => {
            let Some(message) = state.find_message(&message_id).cloned() else {
                return Err(TransitionError::UnknownMessage(message_id));
            };
            let mut next = state.clone();
            let newly_saved = next.bookmarks.add(Arc::clone(&message));
            Ok(TransitionResult::new(next).with_effect(Effect::Notify(Notice::MessageSaved {
                message,
                newly_saved,
            })))
        }

        Event::SetDisplayMode { mode } => {
            let mut next = state.clone();
            next.display_mode = mode;
            Ok(TransitionResult::new(next)
                .with_effect(Effect::Notify(Notice::DisplayModeChanged { mode })))
        }

        Event::TitleGenerated {
            conversation_id,
            title,
        } => {
            let mut next = state.clone();
            match next.find_conversation_mut(&conversation_id) {
                Some(conversation) => {
                    conversation.title = title.clone();
                    Ok(TransitionResult::new(next).with_effect(Effect::Notify(
                        Notice::TitleChanged {
                            conversation_id,
                            title,
                        },
                    )))
                }
                // Conversation gone entirely; nothing to label.
                None => Ok(TransitionResult::new(next)),
            }
        }
    }
}

fn submit_message(state: &SessionState, text: &str) -> Result<TransitionResult, TransitionError> {
    if state.pending() {
        return Err(TransitionError::GenerationPending);
    }

    let trimmed = text.trim();
    if trimmed.is_empty() {
        // Blank input is silently ignored, matching the permissive input UX.
        return Ok(TransitionResult::new(state.clone()));
    }

    let mut next = state.clone();
    let message = Message::user(trimmed);
    next.active.push(Arc::clone(&message));
    let conversation_id = next.active.id.clone();
    next.phase = Phase::Generating {
        conversation_id: conversation_id.clone(),
        attempt: 1,
    };

    // The user message is announced before the reply request is issued, so
    // it is observable while generation is still in flight.
    let thread = next.active.thread();
    Ok(TransitionResult::new(next)
        .with_effect(Effect::message_appended(conversation_id.clone(), message))
        .with_effect(Effect::pending_changed(true))
        .with_effect(Effect::RequestReply {
            conversation_id,
            thread,
        }))
}

fn start_conversation(state: &SessionState, config: &SessionConfig) -> TransitionResult {
    let mut next = state.clone();
    let mut result_effects = Vec::new();

    // Any in-flight generation targets the conversation being abandoned;
    // cancel it and drop whatever result still escapes the race.
    if let Phase::Generating {
        conversation_id, ..
    } = &next.phase
    {
        result_effects.push(Effect::AbortGeneration {
            conversation_id: conversation_id.clone(),
        });
        result_effects.push(Effect::pending_changed(false));
    }
    next.phase = Phase::Idle;

    let fresh = Conversation::seeded(config);
    let started_id = fresh.id.clone();
    let abandoned = std::mem::replace(&mut next.active, fresh);

    // Archive only threads the user actually contributed to; a greeting-only
    // conversation has nothing worth keeping.
    if abandoned.has_user_content() {
        result_effects.push(Effect::Notify(Notice::ConversationArchived {
            conversation_id: abandoned.id.clone(),
        }));
        next.history.insert(0, abandoned);
    }

    result_effects.push(Effect::Notify(Notice::ConversationStarted {
        conversation_id: started_id,
    }));

    let mut result = TransitionResult::new(next);
    result.effects = result_effects;
    result
}

/// Attempt number of the in-flight generation, when the event targets the
/// generation currently pending for the active conversation. `None` marks
/// the event as stale.
fn pending_generation_attempt(state: &SessionState, conversation_id: &str) -> Option<u32> {
    match &state.phase {
        Phase::Generating {
            conversation_id: pending,
            attempt,
        } if pending.as_str() == conversation_id && state.active.id == conversation_id => {
            Some(*attempt)
        }
        _ => None,
    }
}

fn discard_stale(state: &SessionState, conversation_id: String) -> TransitionResult {
    TransitionResult::new(state.clone())
        .with_effect(Effect::Notify(Notice::StaleReplyDiscarded { conversation_id }))
}

fn retry_delay(attempt: u32) -> Duration {
    // Exponential backoff: 1s, 2s, 4s
    Duration::from_secs(1 << (attempt.saturating_sub(2)))
}

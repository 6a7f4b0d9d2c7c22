//! Async session runtime
//!
//! Owns the [`SessionState`] and serializes every mutation through its event
//! loop. Generation runs as background tasks raced against a cancellation
//! token keyed by the target conversation; outcomes re-enter the loop as
//! events tagged with that conversation's id, so a result for an abandoned
//! conversation can never touch a live thread.

#[cfg(test)]
pub mod testing;


use crate::generation::GenerationService;
use crate::session::{transition, Effect, Event, Notice, SessionConfig, SessionState};
use crate::title;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, watch};
use tokio_util::sync::CancellationToken;

const EVENT_CHANNEL_CAPACITY: usize = 32;
const UPDATE_CHANNEL_CAPACITY: usize = 128;

/// Updates broadcast to subscribers
#[derive(Debug, Clone)]
pub enum SessionUpdate {
    /// An observable state change
    Notice(Notice),
    /// An operation was rejected; session state is unchanged
    Error { message: String },
}

/// The session runtime stopped and can no longer accept operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("session runtime has stopped")]
pub struct SessionClosed;

/// Handle for interacting with a running session
#[derive(Clone)]
pub struct SessionHandle {
    event_tx: mpsc::Sender<Event>,
    update_tx: broadcast::Sender<SessionUpdate>,
    state_rx: watch::Receiver<SessionState>,
}

impl SessionHandle {
    /// Submit user input for a generated reply. Blank input is ignored;
    /// submitting while a reply is pending is rejected via a broadcast
    /// [`SessionUpdate::Error`].
    pub async fn submit_message(&self, text: impl Into<String>) -> Result<(), SessionClosed> {
        self.send(Event::SubmitMessage { text: text.into() }).await
    }

    /// Start a fresh conversation, archiving the current one if the user
    /// contributed to it and cancelling any in-flight generation.
    pub async fn start_conversation(&self) -> Result<(), SessionClosed> {
        self.send(Event::StartConversation).await
    }

    /// Bookmark a message by id (idempotent).
    pub async fn save_message(&self, message_id: impl Into<String>) -> Result<(), SessionClosed> {
        self.send(Event::SaveMessage {
            message_id: message_id.into(),
        })
        .await
    }

    /// Switch the visible panel.
    pub async fn set_display_mode(
        &self,
        mode: crate::session::DisplayMode,
    ) -> Result<(), SessionClosed> {
        self.send(Event::SetDisplayMode { mode }).await
    }

    /// Subscribe to observable session updates.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionUpdate> {
        self.update_tx.subscribe()
    }

    /// Snapshot of the current session state.
    pub fn state(&self) -> SessionState {
        self.state_rx.borrow().clone()
    }

    /// Watch channel over state snapshots, for callers that want to await
    /// changes instead of polling.
    pub fn watch_state(&self) -> watch::Receiver<SessionState> {
        self.state_rx.clone()
    }

    async fn send(&self, event: Event) -> Result<(), SessionClosed> {
        self.event_tx.send(event).await.map_err(|_| SessionClosed)
    }
}

/// Session runtime, generic over the generation backend
pub struct SessionRuntime<G>
where
    G: GenerationService + 'static,
{
    state: SessionState,
    config: SessionConfig,
    service: Arc<G>,
    event_rx: mpsc::Receiver<Event>,
    event_tx: mpsc::Sender<Event>,
    update_tx: broadcast::Sender<SessionUpdate>,
    state_tx: watch::Sender<SessionState>,
    /// Cancellation token for the in-flight reply request, keyed by the
    /// conversation it targets
    generation_cancel: Option<(String, CancellationToken)>,
}

impl<G> SessionRuntime<G>
where
    G: GenerationService + 'static,
{
    /// Build a runtime and its handle. The runtime does nothing until
    /// [`run`](Self::run) is awaited (or use [`spawn`](Self::spawn)).
    pub fn new(service: G, config: SessionConfig) -> (Self, SessionHandle) {
        let state = SessionState::new(&config);
        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let (update_tx, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        let (state_tx, state_rx) = watch::channel(state.clone());

        let handle = SessionHandle {
            event_tx: event_tx.clone(),
            update_tx: update_tx.clone(),
            state_rx,
        };
        let runtime = Self {
            state,
            config,
            service: Arc::new(service),
            event_rx,
            event_tx,
            update_tx,
            state_tx,
            generation_cancel: None,
        };
        (runtime, handle)
    }

    /// Spawn the runtime onto the current tokio runtime and return its handle.
    pub fn spawn(service: G, config: SessionConfig) -> SessionHandle {
        let (runtime, handle) = Self::new(service, config);
        tokio::spawn(runtime.run());
        handle
    }

    /// Drive the session until every handle is dropped.
    pub async fn run(mut self) {
        tracing::info!(conversation_id = %self.state.active.id, "Starting session runtime");

        while let Some(event) = self.event_rx.recv().await {
            self.process_event(event);
        }

        tracing::info!("Session runtime stopped");
    }

    fn process_event(&mut self, event: Event) {
        let result = match transition(&self.state, &self.config, event) {
            Ok(result) => result,
            Err(e) => {
                // Transition errors are user-facing and leave state untouched.
                tracing::debug!(error = %e, "Transition rejected");
                let _ = self.update_tx.send(SessionUpdate::Error {
                    message: e.to_string(),
                });
                return;
            }
        };

        self.state = result.new_state;
        let _ = self.state_tx.send(self.state.clone());

        for effect in result.effects {
            self.execute_effect(effect);
        }

        // Keep the token tied to an actual in-flight reply: once the phase
        // settles back to idle the stored token is spent.
        if !self.state.pending() {
            self.generation_cancel = None;
        }
    }

    fn execute_effect(&mut self, effect: Effect) {
        match effect {
            Effect::RequestReply {
                conversation_id,
                thread,
            } => {
                let cancel = CancellationToken::new();
                self.generation_cancel = Some((conversation_id.clone(), cancel.clone()));

                let service = Arc::clone(&self.service);
                let event_tx = self.event_tx.clone();

                tokio::spawn(async move {
                    tokio::select! {
                        biased;

                        () = cancel.cancelled() => {
                            tracing::info!(
                                conversation_id = %conversation_id,
                                "Reply generation cancelled"
                            );
                        }

                        result = service.generate_reply(&thread) => {
                            let event = match result {
                                Ok(text) => Event::GenerationComplete {
                                    conversation_id,
                                    text,
                                },
                                Err(e) => Event::GenerationFailed {
                                    conversation_id,
                                    kind: e.kind,
                                    message: e.message,
                                },
                            };
                            // Runtime may be gone; nothing left to notify then.
                            let _ = event_tx.send(event).await;
                        }
                    }
                });
            }

            Effect::RequestTitle {
                conversation_id,
                thread,
            } => {
                let service = Arc::clone(&self.service);
                let event_tx = self.event_tx.clone();

                tokio::spawn(async move {
                    // On failure the conversation keeps its placeholder title.
                    if let Some(title) = title::derive_title(&thread, service.as_ref()).await {
                        let _ = event_tx
                            .send(Event::TitleGenerated {
                                conversation_id,
                                title,
                            })
                            .await;
                    }
                });
            }

            Effect::AbortGeneration { conversation_id } => {
                match self.generation_cancel.take() {
                    Some((pending_id, token)) if pending_id == conversation_id => {
                        tracing::info!(
                            conversation_id = %conversation_id,
                            "Aborting in-flight generation"
                        );
                        token.cancel();
                    }
                    other => self.generation_cancel = other,
                }
            }

            Effect::ScheduleRetry { delay, attempt } => {
                let event_tx = self.event_tx.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    let _ = event_tx.send(Event::RetryTimeout { attempt }).await;
                });
            }

            Effect::Notify(notice) => {
                if let Notice::StaleReplyDiscarded { conversation_id } = &notice {
                    tracing::info!(
                        conversation_id = %conversation_id,
                        "Discarded generation result for inactive conversation"
                    );
                }
                let _ = self.update_tx.send(SessionUpdate::Notice(notice));
            }
        }
    }
}

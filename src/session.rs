//! Core session state machine
//!
//! Implements the Elm Architecture pattern with pure state transitions: the
//! runtime feeds [`Event`]s through [`transition`] and performs the returned
//! [`Effect`]s.

mod effect;
pub mod event;
pub mod state;
pub(crate) mod transition;

#[cfg(test)]
mod proptests;

pub use effect::{Effect, Notice};
pub use event::Event;
pub use state::{
    Bookmarks, Conversation, DisplayMode, Message, Phase, Role, SessionConfig, SessionState,
};
pub use transition::{transition, TransitionError, TransitionResult};

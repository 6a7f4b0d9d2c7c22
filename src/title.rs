//! Conversation title derivation
//!
//! Asks the generation service for a short label and tidies the result for
//! display. Failures are swallowed: the caller keeps the placeholder title.

use crate::generation::GenerationService;
use crate::session::Message;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

const TITLE_TIMEOUT: Duration = Duration::from_secs(5);
const MAX_TITLE_CHARS: usize = 60;

/// Derive a title for a thread.
///
/// Returns None if derivation fails (timeout, service error, empty output);
/// the conversation keeps its placeholder title in that case.
pub async fn derive_title<G: GenerationService>(
    thread: &[Arc<Message>],
    service: &G,
) -> Option<String> {
    let result = timeout(TITLE_TIMEOUT, service.generate_title(thread)).await;

    match result {
        Ok(Ok(raw)) => {
            let title = sanitize_title(&raw);
            if title.is_empty() {
                tracing::warn!("Title generation returned no usable text");
                None
            } else {
                Some(title)
            }
        }
        Ok(Err(e)) => {
            tracing::warn!(error = %e, "Title generation error");
            None
        }
        Err(_) => {
            tracing::warn!("Title generation timed out");
            None
        }
    }
}

/// Tidy a model-produced title for display:
/// - collapse whitespace runs and strip surrounding quotes
/// - keep it to a single line
/// - truncate at a word boundary past the length cap
fn sanitize_title(raw: &str) -> String {
    let joined = raw
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    let trimmed = joined.trim_matches(|c| c == '"' || c == '\'' || c == '`');

    if trimmed.chars().count() <= MAX_TITLE_CHARS {
        return trimmed.to_string();
    }

    let cut: String = trimmed.chars().take(MAX_TITLE_CHARS).collect();
    match cut.rsplit_once(' ') {
        Some((head, _)) => head.to_string(),
        None => cut,
    }
}

//! Merges streaming transcription and content events into stable turns
//!
//! Deltas of one utterance extend the open tail turn. A new turn of a
//! different role first finalizes whatever tail is still open, so at most
//! the last turn in the log is ever non-final.

use std::sync::Arc;

use super::log::{ConversationLog, LogWriter};
use super::turn::{GroundingChunk, NewTurn, Role, TurnId, TurnUpdate};
use crate::live::LiveEvent;

/// Applies live events to a [`ConversationLog`]
#[derive(Debug, Clone)]
pub struct TurnAccumulator {
    log: Arc<ConversationLog>,
}

impl TurnAccumulator {
    #[must_use]
    pub const fn new(log: Arc<ConversationLog>) -> Self {
        Self { log }
    }

    /// Apply one event, returning the turn it touched
    ///
    /// Each event is applied as a single atomic log edit.
    pub fn handle(&self, event: &LiveEvent) -> Option<TurnId> {
        let touched = self.log.edit(|w| match event {
            LiveEvent::InputTranscription { text, is_final } => {
                transcription(w, Role::User, text, *is_final)
            }
            LiveEvent::OutputTranscription { text, is_final } => {
                transcription(w, Role::Agent, text, *is_final)
            }
            LiveEvent::Content {
                text,
                grounding_chunks,
            } => content(w, text, grounding_chunks),
            LiveEvent::TurnComplete => turn_complete(w),
        });

        if touched.is_none() {
            tracing::trace!(kind = event.kind(), "event ignored");
        }
        touched
    }
}

/// Id of the tail turn when it is open and spoken by `role`
fn open_tail(w: &LogWriter<'_>, role: Role) -> Option<TurnId> {
    w.tail()
        .filter(|t| t.role == role && !t.is_final)
        .map(|t| t.id)
}

/// Finalize an open tail before a turn of another role starts
fn close_open_tail(w: &mut LogWriter<'_>) {
    if w.tail().is_some_and(|t| !t.is_final) {
        if let Some(id) = w.update_tail(TurnUpdate::new().finalize()) {
            tracing::debug!(turn_id = %id, "finalized open turn on role switch");
        }
    }
}

fn transcription(w: &mut LogWriter<'_>, role: Role, text: &str, is_final: bool) -> Option<TurnId> {
    if open_tail(w, role).is_some() {
        return w.update_tail(TurnUpdate::new().append_text(text).finalize_if(is_final));
    }

    if text.is_empty() {
        return None;
    }

    close_open_tail(w);
    Some(w.append(NewTurn::new(role, text, is_final)))
}

fn content(w: &mut LogWriter<'_>, text: &str, chunks: &[GroundingChunk]) -> Option<TurnId> {
    if text.is_empty() && chunks.is_empty() {
        return None;
    }

    if open_tail(w, Role::Agent).is_some() {
        return w.update_tail(
            TurnUpdate::new()
                .append_text(text)
                .append_grounding(chunks.iter().cloned()),
        );
    }

    close_open_tail(w);
    Some(w.append(NewTurn::new(Role::Agent, text, false).with_grounding(chunks.to_vec())))
}

fn turn_complete(w: &mut LogWriter<'_>) -> Option<TurnId> {
    if w.tail().is_some_and(|t| !t.is_final) {
        w.update_tail(TurnUpdate::new().finalize())
    } else {
        None
    }
}

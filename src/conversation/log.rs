//! Ordered, session-scoped store of conversation turns
//!
//! Every mutation runs under one write lock, so readers never observe a
//! partially-applied update. Changes are published on a broadcast channel
//! after the lock is released.

use std::sync::{PoisonError, RwLock};

use tokio::sync::broadcast;

use super::turn::{AppliedChange, ConversationTurn, NewTurn, TurnId, TurnUpdate};

/// Capacity of the change notification channel
const CHANGE_CHANNEL_CAPACITY: usize = 256;

/// A mutation that was applied to the log
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogChange {
    /// A turn was inserted at the tail
    Appended(TurnId),
    /// Text, grounding, or finalization of a turn changed
    Transcript(TurnId),
    /// Only enrichment fields of a turn changed
    Enrichment(TurnId),
    /// All turns were discarded
    Cleared,
}

#[derive(Debug, Default)]
struct LogState {
    turns: Vec<ConversationTurn>,
    epoch: u64,
}

/// Append-mostly ordered turn log
#[derive(Debug)]
pub struct ConversationLog {
    state: RwLock<LogState>,
    changes: broadcast::Sender<LogChange>,
}

impl Default for ConversationLog {
    fn default() -> Self {
        Self::new()
    }
}

impl ConversationLog {
    #[must_use]
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            state: RwLock::new(LogState::default()),
            changes,
        }
    }

    /// Subscribe to changes applied after this call
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<LogChange> {
        self.changes.subscribe()
    }

    /// Assign identity and timestamp, then insert at the tail
    pub fn append(&self, turn: NewTurn) -> TurnId {
        self.edit(|w| w.append(turn))
    }

    /// Merge a patch into the last turn; no-op on an empty log
    pub fn update_tail(&self, update: TurnUpdate) -> Option<TurnId> {
        self.edit(|w| w.update_tail(update))
    }

    /// Merge a patch into the turn with `id`
    ///
    /// Returns `false` when the turn no longer exists, which is expected for
    /// fetches that settle after a [`clear`](Self::clear).
    pub fn update_by_id(&self, id: TurnId, update: TurnUpdate) -> bool {
        let found = self.edit(|w| w.update_by_id(id, update));
        if !found {
            tracing::debug!(turn_id = %id, "update for vanished turn ignored");
        }
        found
    }

    /// Discard every turn and start a new epoch
    pub fn clear(&self) {
        self.edit(|w| w.clear());
    }

    /// Run several reads and writes as one atomic step
    pub fn edit<R>(&self, f: impl FnOnce(&mut LogWriter<'_>) -> R) -> R {
        let (result, pending) = {
            let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
            let mut writer = LogWriter {
                state: &mut *state,
                pending: Vec::new(),
            };
            let result = f(&mut writer);
            (result, writer.pending)
        };

        for change in pending {
            // No subscribers is fine
            let _ = self.changes.send(change);
        }

        result
    }

    /// Read the turns and current epoch without cloning
    pub fn with_turns<R>(&self, f: impl FnOnce(&[ConversationTurn], u64) -> R) -> R {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        f(&state.turns, state.epoch)
    }

    /// Read-only copy of the ordered turns
    #[must_use]
    pub fn snapshot(&self) -> Vec<ConversationTurn> {
        self.with_turns(|turns, _| turns.to_vec())
    }

    /// Current state of the turn with `id`
    #[must_use]
    pub fn get(&self, id: TurnId) -> Option<ConversationTurn> {
        self.with_turns(|turns, _| turns.iter().find(|t| t.id == id).cloned())
    }

    #[must_use]
    pub fn tail(&self) -> Option<ConversationTurn> {
        self.with_turns(|turns, _| turns.last().cloned())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.with_turns(|turns, _| turns.len())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of times the log has been cleared
    #[must_use]
    pub fn epoch(&self) -> u64 {
        self.with_turns(|_, epoch| epoch)
    }
}

/// Mutable view of the log held for the duration of one [`ConversationLog::edit`]
pub struct LogWriter<'a> {
    state: &'a mut LogState,
    pending: Vec<LogChange>,
}

impl LogWriter<'_> {
    #[must_use]
    pub fn tail(&self) -> Option<&ConversationTurn> {
        self.state.turns.last()
    }

    #[must_use]
    pub fn turns(&self) -> &[ConversationTurn] {
        &self.state.turns
    }

    pub fn append(&mut self, turn: NewTurn) -> TurnId {
        let turn = ConversationTurn::from_new(turn);
        let id = turn.id;
        tracing::trace!(turn_id = %id, role = ?turn.role, "turn appended");
        self.state.turns.push(turn);
        self.pending.push(LogChange::Appended(id));
        id
    }

    pub fn update_tail(&mut self, update: TurnUpdate) -> Option<TurnId> {
        let turn = self.state.turns.last_mut()?;
        let id = turn.id;
        let change = turn.apply(update);
        self.record(id, change);
        Some(id)
    }

    pub fn update_by_id(&mut self, id: TurnId, update: TurnUpdate) -> bool {
        let Some(turn) = self.state.turns.iter_mut().find(|t| t.id == id) else {
            return false;
        };
        let change = turn.apply(update);
        self.record(id, change);
        true
    }

    pub fn clear(&mut self) {
        self.state.turns.clear();
        self.state.epoch += 1;
        self.pending.push(LogChange::Cleared);
    }

    fn record(&mut self, id: TurnId, change: AppliedChange) {
        if change.transcript {
            self.pending.push(LogChange::Transcript(id));
        } else if change.enrichment {
            self.pending.push(LogChange::Enrichment(id));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::turn::{Feedback, Role};

    #[test]
    fn append_preserves_insertion_order() {
        let log = ConversationLog::new();
        let a = log.append(NewTurn::new(Role::User, "one", true));
        let b = log.append(NewTurn::new(Role::Agent, "two", true));
        let c = log.append(NewTurn::new(Role::User, "three", false));

        let ids: Vec<_> = log.snapshot().iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![a, b, c]);
        assert_ne!(a, b);
    }

    #[test]
    fn update_tail_on_empty_log_is_noop() {
        let log = ConversationLog::new();
        assert_eq!(log.update_tail(TurnUpdate::new().append_text("x")), None);
        assert!(log.is_empty());
    }

    #[test]
    fn update_tail_merges_into_last_turn() {
        let log = ConversationLog::new();
        log.append(NewTurn::new(Role::User, "first", true));
        let id = log.append(NewTurn::new(Role::Agent, "Hi", false));

        assert_eq!(log.update_tail(TurnUpdate::new().append_text(" there")), Some(id));
        assert_eq!(log.tail().map(|t| t.text), Some("Hi there".to_string()));
    }

    #[test]
    fn update_by_missing_id_is_noop() {
        let log = ConversationLog::new();
        let id = log.append(NewTurn::new(Role::User, "hello", true));
        log.clear();

        assert!(!log.update_by_id(id, TurnUpdate::new().ipa("/x/")));
        assert!(log.is_empty());
    }

    #[test]
    fn clear_bumps_epoch() {
        let log = ConversationLog::new();
        log.append(NewTurn::new(Role::User, "hello", true));
        assert_eq!(log.epoch(), 0);

        log.clear();
        assert!(log.is_empty());
        assert_eq!(log.epoch(), 1);
    }

    #[test]
    fn changes_are_published_by_kind() {
        let log = ConversationLog::new();
        let mut rx = log.subscribe();

        let id = log.append(NewTurn::new(Role::User, "hi", false));
        log.update_tail(TurnUpdate::new().finalize());
        log.update_by_id(id, TurnUpdate::new().pronunciation(Feedback::Analyzing));
        // Nothing changes: no notification
        log.update_by_id(id, TurnUpdate::new().finalize());
        log.clear();

        assert_eq!(rx.try_recv().unwrap(), LogChange::Appended(id));
        assert_eq!(rx.try_recv().unwrap(), LogChange::Transcript(id));
        assert_eq!(rx.try_recv().unwrap(), LogChange::Enrichment(id));
        assert_eq!(rx.try_recv().unwrap(), LogChange::Cleared);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn edit_applies_several_writes_atomically() {
        let log = ConversationLog::new();
        let mut rx = log.subscribe();

        let (first, second) = log.edit(|w| {
            let first = w.append(NewTurn::new(Role::User, "a", false));
            w.update_tail(TurnUpdate::new().finalize());
            let second = w.append(NewTurn::new(Role::Agent, "b", false));
            (first, second)
        });

        let turns = log.snapshot();
        assert!(turns[0].is_final);
        assert!(!turns[1].is_final);
        assert_eq!(rx.try_recv().unwrap(), LogChange::Appended(first));
        assert_eq!(rx.try_recv().unwrap(), LogChange::Transcript(first));
        assert_eq!(rx.try_recv().unwrap(), LogChange::Appended(second));
    }
}

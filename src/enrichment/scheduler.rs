//! Background pronunciation feedback for finalized user turns
//!
//! Each pass picks the most recent finalized, non-empty user turn without
//! feedback. The in-flight map is checked and updated under one lock before
//! any request starts, so a turn is analyzed at most once at a time. Entries
//! are tagged with the log epoch; a clear makes them stale.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::{Notify, broadcast};
use tokio::task::JoinHandle;

use super::{CoachService, with_timeout};
use crate::conversation::{
    ConversationLog, ConversationTurn, Feedback, LogChange, Role, TurnId, TurnUpdate,
};

/// Outcome of one selection pass
enum Pass {
    Idle,
    InFlight(TurnId),
    Started(TurnId, JoinHandle<()>),
}

fn is_candidate(turn: &ConversationTurn) -> bool {
    turn.role == Role::User
        && turn.is_final
        && turn.has_text()
        && turn.pronunciation_feedback.is_none()
}

#[derive(Debug, Clone, Copy)]
struct InFlight {
    token: u64,
    epoch: u64,
}

/// Deduplicating driver for pronunciation analysis
pub struct EnrichmentScheduler {
    log: Arc<ConversationLog>,
    service: Arc<dyn CoachService>,
    fetch_timeout: Duration,
    in_flight: Mutex<HashMap<TurnId, InFlight>>,
    next_token: AtomicU64,
    idle: Notify,
}

impl EnrichmentScheduler {
    #[must_use]
    pub fn new(
        log: Arc<ConversationLog>,
        service: Arc<dyn CoachService>,
        fetch_timeout: Duration,
    ) -> Self {
        Self {
            log,
            service,
            fetch_timeout,
            in_flight: Mutex::new(HashMap::new()),
            next_token: AtomicU64::new(0),
            idle: Notify::new(),
        }
    }

    /// Most recent finalized user turn with text and no pronunciation feedback
    #[must_use]
    pub fn select_candidate(turns: &[ConversationTurn]) -> Option<&ConversationTurn> {
        turns.iter().rev().find(|t| is_candidate(t))
    }

    /// Run one selection pass, spawning an analysis if a new candidate exists
    ///
    /// Returns `None` when there is nothing to do or the candidate is already
    /// in flight.
    pub fn schedule(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        match self.start(&HashSet::new()) {
            Pass::Started(_, handle) => Some(handle),
            Pass::InFlight(_) | Pass::Idle => None,
        }
    }

    /// Start analysis for every eligible turn, each at most once
    ///
    /// A turn whose analysis fails during the drain is not picked again by
    /// it. Returns the number of analyses started.
    pub fn schedule_pending(self: &Arc<Self>) -> usize {
        let mut attempted = HashSet::new();
        let mut started = 0;
        loop {
            match self.start(&attempted) {
                Pass::Started(id, _) => {
                    started += 1;
                    attempted.insert(id);
                }
                Pass::InFlight(id) => {
                    attempted.insert(id);
                }
                Pass::Idle => return started,
            }
        }
    }

    fn start(self: &Arc<Self>, skip: &HashSet<TurnId>) -> Pass {
        let (id, text, token) = {
            let mut in_flight = self.lock_in_flight();
            let (candidate, epoch) = self.log.with_turns(|turns, epoch| {
                let candidate = turns
                    .iter()
                    .rev()
                    .filter(|t| !skip.contains(&t.id))
                    .find(|t| is_candidate(t))
                    .map(|t| (t.id, t.text.clone()));
                (candidate, epoch)
            });

            in_flight.retain(|_, entry| entry.epoch == epoch);
            let Some((id, text)) = candidate else {
                return Pass::Idle;
            };
            if in_flight.contains_key(&id) {
                tracing::debug!(turn_id = %id, "pronunciation analysis already in flight");
                return Pass::InFlight(id);
            }

            let token = self.next_token.fetch_add(1, Ordering::Relaxed);
            in_flight.insert(id, InFlight { token, epoch });
            (id, text, token)
        };

        self.log
            .update_by_id(id, TurnUpdate::new().pronunciation(Feedback::Analyzing));
        tracing::debug!(turn_id = %id, service = self.service.name(), "pronunciation analysis started");

        let this = Arc::clone(self);
        Pass::Started(
            id,
            tokio::spawn(async move {
                this.analyze(id, &text, token).await;
            }),
        )
    }

    async fn analyze(&self, id: TurnId, text: &str, token: u64) {
        let result = with_timeout(
            "pronunciation analysis",
            self.fetch_timeout,
            self.service.analyze_pronunciation(text),
        )
        .await;

        let update = match result {
            Ok(feedback) => {
                tracing::debug!(turn_id = %id, words = feedback.words.len(), "pronunciation feedback ready");
                TurnUpdate::new().pronunciation(Feedback::Ready(feedback))
            }
            Err(e) => {
                tracing::warn!(turn_id = %id, error = %e, "pronunciation analysis failed");
                TurnUpdate::new().clear_pronunciation()
            }
        };
        self.log.update_by_id(id, update);
        self.finish(id, token);
    }

    fn finish(&self, id: TurnId, token: u64) {
        let mut in_flight = self.lock_in_flight();
        if in_flight.get(&id).is_some_and(|entry| entry.token == token) {
            in_flight.remove(&id);
        }
        if in_flight.is_empty() {
            self.idle.notify_waiters();
        }
    }

    /// Drop all in-flight bookkeeping (session reset)
    pub fn reset(&self) {
        self.lock_in_flight().clear();
        self.idle.notify_waiters();
    }

    /// Number of analyses currently tracked as in flight
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.lock_in_flight().len()
    }

    /// Resolve once no analysis is in flight
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            if self.in_flight() == 0 {
                return;
            }
            notified.await;
        }
    }

    /// React to log changes until the log is dropped
    ///
    /// Enrichment-only changes are skipped so a failed analysis is retried on
    /// the next transcript activity rather than immediately.
    pub async fn run(self: Arc<Self>, mut changes: broadcast::Receiver<LogChange>) {
        loop {
            match changes.recv().await {
                Ok(LogChange::Appended(_) | LogChange::Transcript(_)) => {
                    drop(self.schedule());
                }
                Ok(LogChange::Enrichment(_) | LogChange::Cleared) => {}
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "enrichment scheduler lagged behind log");
                    drop(self.schedule());
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }

    fn lock_in_flight(&self) -> MutexGuard<'_, HashMap<TurnId, InFlight>> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

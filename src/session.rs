//! Session controller
//!
//! Owns the turn log for one practice session and wires the accumulator,
//! the pronunciation scheduler and the playback coordinator to it.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::config::{DEFAULT_FETCH_TIMEOUT_SECS, DEFAULT_USER_VOICE, DEFAULT_VOICE};
use crate::conversation::{ConversationLog, ConversationTurn, TurnAccumulator, TurnId};
use crate::enrichment::{CoachService, EnrichmentScheduler};
use crate::live::{LiveConnectConfig, LiveEvent};
use crate::playback::{AudioOutput, PlaybackCoordinator, PlaybackOutcome, VoiceSelection};
use crate::prompt::PromptTemplate;

/// Per-session settings resolved from [`crate::Config`]
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub voices: VoiceSelection,
    pub system_instruction: String,
    pub fetch_timeout: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            voices: VoiceSelection {
                agent: DEFAULT_VOICE.to_string(),
                user: DEFAULT_USER_VOICE.to_string(),
            },
            system_instruction: PromptTemplate::default().content().system_prompt.to_string(),
            fetch_timeout: Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS),
        }
    }
}

/// One conversation with the coach
pub struct CoachSession {
    settings: SessionSettings,
    log: Arc<ConversationLog>,
    accumulator: TurnAccumulator,
    scheduler: Arc<EnrichmentScheduler>,
    playback: Arc<PlaybackCoordinator>,
    scheduler_task: JoinHandle<()>,
}

impl CoachSession {
    /// Build a session and start reacting to log changes
    ///
    /// Must be called from within a tokio runtime.
    #[must_use]
    pub fn new(
        settings: SessionSettings,
        service: Arc<dyn CoachService>,
        output: Arc<dyn AudioOutput>,
    ) -> Self {
        let log = Arc::new(ConversationLog::new());
        let accumulator = TurnAccumulator::new(Arc::clone(&log));
        let scheduler = Arc::new(EnrichmentScheduler::new(
            Arc::clone(&log),
            Arc::clone(&service),
            settings.fetch_timeout,
        ));
        let playback = Arc::new(PlaybackCoordinator::new(
            Arc::clone(&log),
            Arc::clone(&service),
            output,
            settings.voices.clone(),
            settings.fetch_timeout,
        ));

        let scheduler_task = tokio::spawn(Arc::clone(&scheduler).run(log.subscribe()));

        tracing::info!(
            service = service.name(),
            voice = %settings.voices.agent,
            "coach session started"
        );

        Self {
            settings,
            log,
            accumulator,
            scheduler,
            playback,
            scheduler_task,
        }
    }

    /// Feed one event from the live service into the log
    pub fn handle_event(&self, event: &LiveEvent) -> Option<TurnId> {
        self.accumulator.handle(event)
    }

    /// Start reading a turn aloud in the background
    ///
    /// Must be called from within a tokio runtime.
    pub fn request_playback(&self, id: TurnId) -> JoinHandle<PlaybackOutcome> {
        let playback = Arc::clone(&self.playback);
        tokio::spawn(async move { playback.play(id).await })
    }

    /// Read a turn aloud, resolving when playback ends or is rejected
    pub async fn play(&self, id: TurnId) -> PlaybackOutcome {
        self.playback.play(id).await
    }

    /// Discard every turn and all pending analysis bookkeeping
    pub fn reset(&self) {
        let turns = self.log.len();
        self.log.clear();
        self.scheduler.reset();
        tracing::info!(turns, "coach session reset");
    }

    /// Snapshot of the conversation so far
    #[must_use]
    pub fn turns(&self) -> Vec<ConversationTurn> {
        self.log.snapshot()
    }

    #[must_use]
    pub fn log(&self) -> &Arc<ConversationLog> {
        &self.log
    }

    #[must_use]
    pub fn scheduler(&self) -> &Arc<EnrichmentScheduler> {
        &self.scheduler
    }

    #[must_use]
    pub fn playback(&self) -> &PlaybackCoordinator {
        &self.playback
    }

    /// Configuration record for connecting the live service
    #[must_use]
    pub fn live_config(&self) -> LiveConnectConfig {
        LiveConnectConfig::new(
            self.settings.voices.agent.clone(),
            self.settings.system_instruction.clone(),
        )
    }

    /// Start analysis for every finalized user turn still lacking feedback
    /// and wait for all of it to settle
    ///
    /// Returns `false` if analysis was still running when `limit` expired.
    pub async fn wait_for_enrichment(&self, limit: Duration) -> bool {
        let started = self.scheduler.schedule_pending();
        tracing::debug!(started, "waiting for pronunciation analysis");

        tokio::time::timeout(limit, self.scheduler.wait_idle())
            .await
            .is_ok()
    }
}

impl Drop for CoachSession {
    fn drop(&mut self) {
        self.scheduler_task.abort();
        tracing::info!(turns = self.log.len(), "coach session ended");
    }
}

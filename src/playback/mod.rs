//! Single-flight "read aloud" pipeline for a finalized turn
//!
//! One request at a time, system-wide: phonetic transcription, grammar
//! feedback for user turns, speech synthesis, then playback. Requests that
//! arrive while another turn is playing are rejected without side effects.

mod output;

pub use output::{AudioOutput, PLAYBACK_SAMPLE_RATE, SpeakerOutput, decode_pcm16};

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::conversation::{ConversationLog, Feedback, Role, TurnId, TurnUpdate};
use crate::enrichment::{CoachService, with_timeout};

/// Voices used when reading turns back
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceSelection {
    /// Configured voice for agent turns
    pub agent: String,
    /// Fixed voice for the user's own turns
    pub user: String,
}

impl VoiceSelection {
    #[must_use]
    pub fn for_role(&self, role: Role) -> &str {
        match role {
            Role::User => &self.user,
            Role::Agent | Role::System => &self.agent,
        }
    }
}

/// How a playback request ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackOutcome {
    /// Audio was synthesized and played to the end
    Played,
    /// Another turn holds the playback lock; nothing was done
    Busy,
    /// The turn is missing, still open, empty, or a system turn
    NotPlayable,
    /// Synthesis returned no audio; enrichment was rolled back
    NoAudio,
    /// Synthesis or playback failed; enrichment was rolled back
    Failed,
}

/// Serializes read-aloud requests behind one global lock
pub struct PlaybackCoordinator {
    log: Arc<ConversationLog>,
    service: Arc<dyn CoachService>,
    output: Arc<dyn AudioOutput>,
    voices: VoiceSelection,
    fetch_timeout: Duration,
    playing: Mutex<Option<TurnId>>,
}

/// Holds the playback lock; releases it on drop
struct PlaybackGuard<'a> {
    playing: &'a Mutex<Option<TurnId>>,
}

impl Drop for PlaybackGuard<'_> {
    fn drop(&mut self) {
        *self.playing.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

impl PlaybackCoordinator {
    #[must_use]
    pub fn new(
        log: Arc<ConversationLog>,
        service: Arc<dyn CoachService>,
        output: Arc<dyn AudioOutput>,
        voices: VoiceSelection,
        fetch_timeout: Duration,
    ) -> Self {
        Self {
            log,
            service,
            output,
            voices,
            fetch_timeout,
            playing: Mutex::new(None),
        }
    }

    /// Turn currently holding the playback lock
    #[must_use]
    pub fn playing(&self) -> Option<TurnId> {
        *self.lock_playing()
    }

    #[must_use]
    pub const fn voices(&self) -> &VoiceSelection {
        &self.voices
    }

    /// Enrich and read a turn aloud
    ///
    /// The lock is taken before the first suspension point and released once
    /// playback ends or the pipeline fails.
    pub async fn play(&self, id: TurnId) -> PlaybackOutcome {
        let _guard = match self.try_acquire(id) {
            Ok(guard) => guard,
            Err(outcome) => return outcome,
        };
        tracing::debug!(turn_id = %id, "playback started");

        self.attach_ipa(id).await;
        self.attach_grammar(id).await;

        let outcome = self.speak(id).await;
        if outcome != PlaybackOutcome::Played {
            self.log
                .update_by_id(id, TurnUpdate::new().clear_ipa().clear_grammar());
        }
        tracing::debug!(turn_id = %id, ?outcome, "playback finished");
        outcome
    }

    fn try_acquire(&self, id: TurnId) -> Result<PlaybackGuard<'_>, PlaybackOutcome> {
        let mut playing = self.lock_playing();
        if let Some(current) = *playing {
            tracing::debug!(turn_id = %id, playing = %current, "playback busy, request ignored");
            return Err(PlaybackOutcome::Busy);
        }

        let playable = self
            .log
            .get(id)
            .is_some_and(|t| t.is_final && t.has_text() && t.role != Role::System);
        if !playable {
            return Err(PlaybackOutcome::NotPlayable);
        }

        *playing = Some(id);
        Ok(PlaybackGuard {
            playing: &self.playing,
        })
    }

    /// Step 1: IPA transcription; failure leaves it absent
    async fn attach_ipa(&self, id: TurnId) {
        let Some(turn) = self.log.get(id) else {
            return;
        };
        if turn.ipa.is_some() {
            return;
        }

        let result = with_timeout(
            "phonetic transcription",
            self.fetch_timeout,
            self.service.transcribe_phonetic(&turn.text),
        )
        .await;

        match result {
            Ok(ipa) if !ipa.is_empty() => {
                self.log.update_by_id(id, TurnUpdate::new().ipa(ipa));
            }
            Ok(_) => tracing::debug!(turn_id = %id, "empty phonetic transcription"),
            Err(e) => tracing::warn!(turn_id = %id, error = %e, "phonetic transcription failed"),
        }
    }

    /// Step 2: grammar feedback for user turns, with a loading placeholder
    async fn attach_grammar(&self, id: TurnId) {
        let Some(turn) = self.log.get(id) else {
            return;
        };
        if turn.role != Role::User || turn.grammar_feedback.is_some() {
            return;
        }

        self.log
            .update_by_id(id, TurnUpdate::new().grammar(Feedback::Analyzing));

        let result = with_timeout(
            "grammar analysis",
            self.fetch_timeout,
            self.service.analyze_grammar(&turn.text),
        )
        .await;

        let update = match result {
            Ok(feedback) => TurnUpdate::new().grammar(Feedback::Ready(feedback)),
            Err(e) => {
                tracing::warn!(turn_id = %id, error = %e, "grammar analysis failed");
                TurnUpdate::new().clear_grammar()
            }
        };
        self.log.update_by_id(id, update);
    }

    /// Steps 3 and 4: synthesize with the role's voice and play
    async fn speak(&self, id: TurnId) -> PlaybackOutcome {
        let Some(turn) = self.log.get(id) else {
            tracing::debug!(turn_id = %id, "turn vanished before synthesis");
            return PlaybackOutcome::Failed;
        };
        let voice = self.voices.for_role(turn.role);

        let audio = match with_timeout(
            "speech synthesis",
            self.fetch_timeout,
            self.service.synthesize_speech(&turn.text, voice),
        )
        .await
        {
            Ok(Some(audio)) if !audio.is_empty() => audio,
            Ok(_) => {
                tracing::warn!(turn_id = %id, "speech synthesis returned no audio");
                return PlaybackOutcome::NoAudio;
            }
            Err(e) => {
                tracing::warn!(turn_id = %id, error = %e, "speech synthesis failed");
                return PlaybackOutcome::Failed;
            }
        };

        match self.output.play(&audio).await {
            Ok(()) => PlaybackOutcome::Played,
            Err(e) => {
                tracing::warn!(turn_id = %id, error = %e, "audio playback failed");
                PlaybackOutcome::Failed
            }
        }
    }

    fn lock_playing(&self) -> MutexGuard<'_, Option<TurnId>> {
        self.playing.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

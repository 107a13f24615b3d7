//! Shared test utilities
#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Semaphore;

use parley::conversation::{
    GrammarCorrection, GrammarFeedback, PronunciationFeedback, WordAccuracy, WordFeedback,
};
use parley::{
    AudioOutput, CoachService, CoachSession, Error, Result, SessionSettings, VoiceSelection,
};

/// Scripted analysis and speech service
///
/// When gated, every request waits for a permit from [`FakeCoach::open_gate`].
#[derive(Default)]
pub struct FakeCoach {
    pub fail_pronunciation: AtomicBool,
    pub fail_grammar: AtomicBool,
    pub fail_ipa: AtomicBool,
    pub fail_speech: AtomicBool,
    pub no_audio: AtomicBool,
    pub pronunciation_calls: AtomicUsize,
    pub grammar_calls: AtomicUsize,
    pub ipa_calls: AtomicUsize,
    pub speech_calls: AtomicUsize,
    pub voices: Mutex<Vec<String>>,
    gate: Option<Semaphore>,
}

impl FakeCoach {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// A coach whose requests block until permits are released
    pub fn gated() -> Arc<Self> {
        Arc::new(Self {
            gate: Some(Semaphore::new(0)),
            ..Self::default()
        })
    }

    pub fn open_gate(&self, permits: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(permits);
        }
    }

    pub fn voices(&self) -> Vec<String> {
        self.voices.lock().unwrap().clone()
    }

    async fn enter(&self, counter: &AtomicUsize, fail: &AtomicBool, what: &str) -> Result<()> {
        counter.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.acquire().await.expect("gate closed").forget();
        }
        if fail.load(Ordering::SeqCst) {
            return Err(Error::Service(format!("{what} unavailable")));
        }
        Ok(())
    }
}

#[async_trait]
impl CoachService for FakeCoach {
    async fn analyze_pronunciation(&self, text: &str) -> Result<PronunciationFeedback> {
        self.enter(&self.pronunciation_calls, &self.fail_pronunciation, "pronunciation")
            .await?;
        Ok(PronunciationFeedback {
            overall_assessment: format!("assessed: {text}"),
            words: text
                .split_whitespace()
                .map(|w| WordFeedback {
                    word: w.to_string(),
                    accuracy: WordAccuracy::Good,
                    feedback: "clear".to_string(),
                })
                .collect(),
        })
    }

    async fn analyze_grammar(&self, text: &str) -> Result<GrammarFeedback> {
        self.enter(&self.grammar_calls, &self.fail_grammar, "grammar")
            .await?;
        Ok(GrammarFeedback {
            overall_assessment: "mostly correct".to_string(),
            corrections: vec![GrammarCorrection {
                original: text.to_string(),
                corrected: format!("{text}."),
                explanation: "end the sentence with a period".to_string(),
            }],
        })
    }

    async fn transcribe_phonetic(&self, text: &str) -> Result<String> {
        self.enter(&self.ipa_calls, &self.fail_ipa, "ipa").await?;
        Ok(format!("ipa:{text}"))
    }

    async fn synthesize_speech(&self, _text: &str, voice: &str) -> Result<Option<Vec<u8>>> {
        self.voices.lock().unwrap().push(voice.to_string());
        self.enter(&self.speech_calls, &self.fail_speech, "speech")
            .await?;
        if self.no_audio.load(Ordering::SeqCst) {
            return Ok(None);
        }
        Ok(Some(vec![0x00, 0x00, 0x00, 0x40]))
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}

/// Records played audio instead of opening a device
#[derive(Default)]
pub struct FakeOutput {
    pub fail: AtomicBool,
    pub started: AtomicUsize,
    pub played: AtomicUsize,
    gate: Option<Semaphore>,
}

impl FakeOutput {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// An output that holds playback open until [`FakeOutput::finish`]
    pub fn gated() -> Arc<Self> {
        Arc::new(Self {
            gate: Some(Semaphore::new(0)),
            ..Self::default()
        })
    }

    pub fn finish(&self, permits: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(permits);
        }
    }

    pub fn played(&self) -> usize {
        self.played.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AudioOutput for FakeOutput {
    async fn play(&self, audio: &[u8]) -> Result<()> {
        assert!(!audio.is_empty());
        self.started.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.acquire().await.expect("gate closed").forget();
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::Audio("device unplugged".to_string()));
        }
        self.played.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Current value of a call counter
pub fn calls(counter: &AtomicUsize) -> usize {
    counter.load(Ordering::SeqCst)
}

pub fn voices() -> VoiceSelection {
    VoiceSelection {
        agent: "Zephyr".to_string(),
        user: "Puck".to_string(),
    }
}

pub fn settings(fetch_timeout: Duration) -> SessionSettings {
    SessionSettings {
        voices: voices(),
        system_instruction: "Be a friendly practice partner.".to_string(),
        fetch_timeout,
    }
}

pub fn session(coach: &Arc<FakeCoach>, output: &Arc<FakeOutput>) -> CoachSession {
    CoachSession::new(
        settings(Duration::from_secs(5)),
        Arc::clone(coach) as Arc<dyn CoachService>,
        Arc::clone(output) as Arc<dyn AudioOutput>,
    )
}

/// Poll `condition` until it holds, panicking after two seconds
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !condition() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not reached in time"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

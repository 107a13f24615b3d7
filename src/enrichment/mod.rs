//! Pronunciation, grammar, phonetic and speech collaborators
//!
//! [`CoachService`] is the seam between the conversation core and whatever
//! service performs the analysis. [`EnrichmentScheduler`] drives background
//! pronunciation feedback against the turn log.

pub mod gemini;
mod scheduler;

pub use gemini::GeminiCoach;
pub use scheduler::EnrichmentScheduler;

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;

use crate::conversation::{GrammarFeedback, PronunciationFeedback};
use crate::{Error, Result};

/// Analysis and synthesis requests the coach depends on
#[async_trait]
pub trait CoachService: Send + Sync {
    /// Word-by-word pronunciation feedback for a user utterance
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the response is malformed
    async fn analyze_pronunciation(&self, text: &str) -> Result<PronunciationFeedback>;

    /// Grammar corrections for a user utterance
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the response is malformed
    async fn analyze_grammar(&self, text: &str) -> Result<GrammarFeedback>;

    /// IPA transcription of `text`
    ///
    /// # Errors
    ///
    /// Returns error if the request fails
    async fn transcribe_phonetic(&self, text: &str) -> Result<String>;

    /// Synthesized speech for `text`, or `None` if the service returned no audio
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the payload cannot be decoded
    async fn synthesize_speech(&self, text: &str, voice: &str) -> Result<Option<Vec<u8>>>;

    /// Service name for logging
    fn name(&self) -> &'static str;
}

/// Stand-in used when no API key is configured
///
/// Every request fails, so enrichment degrades to absent.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unavailable;

impl Unavailable {
    fn error() -> Error {
        Error::NotConfigured("set GEMINI_API_KEY to enable feedback and playback".to_string())
    }
}

#[async_trait]
impl CoachService for Unavailable {
    async fn analyze_pronunciation(&self, _text: &str) -> Result<PronunciationFeedback> {
        Err(Self::error())
    }

    async fn analyze_grammar(&self, _text: &str) -> Result<GrammarFeedback> {
        Err(Self::error())
    }

    async fn transcribe_phonetic(&self, _text: &str) -> Result<String> {
        Err(Self::error())
    }

    async fn synthesize_speech(&self, _text: &str, _voice: &str) -> Result<Option<Vec<u8>>> {
        Err(Self::error())
    }

    fn name(&self) -> &'static str {
        "unavailable"
    }
}

/// Run a collaborator fetch, mapping expiry to [`Error::Timeout`]
pub(crate) async fn with_timeout<T>(
    operation: &'static str,
    limit: Duration,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::time::timeout(limit, fut)
        .await
        .unwrap_or_else(|_| {
            Err(Error::Timeout { operation, limit })
        })
}

//! Parley - Spoken-language practice coach
//!
//! This library provides the conversation core behind the coach:
//! - Turn accumulation from live transcription and content events
//! - Background pronunciation feedback for the user's turns
//! - Single-flight "read aloud" playback with phonetic and grammar feedback
//! - Practice templates, topics and the live session configuration
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │              Live service events                     │
//! │   input transcription │ output │ content │ complete │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │                 CoachSession                         │
//! │   Accumulator  │  Turn log  │  Scheduler │ Playback │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │            CoachService / AudioOutput                │
//! │   Pronunciation │ Grammar │ IPA │ Speech │ Speakers │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod conversation;
pub mod enrichment;
pub mod error;
pub mod live;
pub mod playback;
pub mod prompt;
pub mod session;

pub use config::Config;
pub use conversation::{
    ConversationLog, ConversationTurn, Feedback, LogChange, Role, TurnAccumulator, TurnId,
};
pub use enrichment::{CoachService, EnrichmentScheduler, GeminiCoach, Unavailable};
pub use error::{Error, Result};
pub use live::{LiveConnectConfig, LiveEvent};
pub use playback::{AudioOutput, PlaybackCoordinator, PlaybackOutcome, SpeakerOutput, VoiceSelection};
pub use prompt::{PromptTemplate, TopicSelection};
pub use session::{CoachSession, SessionSettings};

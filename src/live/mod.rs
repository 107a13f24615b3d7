//! Events consumed from, and configuration sent to, the live speech service
//!
//! The duplex connection itself lives outside this crate; these are the
//! shapes the conversation core understands.

mod config;

pub use config::{LiveConnectConfig, OutputModality};

use serde::{Deserialize, Serialize};

use crate::conversation::GroundingChunk;

/// One inbound event from the live session
///
/// Variant tags are snake_case; fields are camelCase like the rest of the
/// wire shapes (`isFinal`, `groundingChunks`, `sourceUri`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum LiveEvent {
    /// Transcription delta of the user's speech
    InputTranscription {
        text: String,
        #[serde(default)]
        is_final: bool,
    },
    /// Transcription delta of the agent's speech
    OutputTranscription {
        text: String,
        #[serde(default)]
        is_final: bool,
    },
    /// Model content: text and optional grounding citations
    Content {
        #[serde(default)]
        text: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        grounding_chunks: Vec<GroundingChunk>,
    },
    /// The agent finished its turn
    TurnComplete,
}

impl LiveEvent {
    #[must_use]
    pub fn input(text: impl Into<String>, is_final: bool) -> Self {
        Self::InputTranscription {
            text: text.into(),
            is_final,
        }
    }

    #[must_use]
    pub fn output(text: impl Into<String>, is_final: bool) -> Self {
        Self::OutputTranscription {
            text: text.into(),
            is_final,
        }
    }

    #[must_use]
    pub fn content(text: impl Into<String>, grounding_chunks: Vec<GroundingChunk>) -> Self {
        Self::Content {
            text: text.into(),
            grounding_chunks,
        }
    }

    /// Build a content event from the text parts of one model turn
    ///
    /// Empty parts are dropped and the rest joined with a single space.
    #[must_use]
    pub fn content_from_parts<'a>(
        parts: impl IntoIterator<Item = &'a str>,
        grounding_chunks: Vec<GroundingChunk>,
    ) -> Self {
        let text = parts
            .into_iter()
            .filter(|p| !p.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        Self::content(text, grounding_chunks)
    }

    /// Short name for logging
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::InputTranscription { .. } => "input_transcription",
            Self::OutputTranscription { .. } => "output_transcription",
            Self::Content { .. } => "content",
            Self::TurnComplete => "turn_complete",
        }
    }
}

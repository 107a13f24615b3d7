//! Session configuration record sent when the live session connects

use serde::{Deserialize, Serialize};

/// Response modality requested from the live service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputModality {
    Audio,
}

/// Options the live service is configured with
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveConnectConfig {
    pub output_modality: OutputModality,
    pub voice: String,
    pub input_transcription_enabled: bool,
    pub output_transcription_enabled: bool,
    pub system_instruction_text: String,
    /// Always empty for the coach: it declares no tools
    pub tool_declarations: Vec<serde_json::Value>,
}

impl LiveConnectConfig {
    /// Audio output with both transcription streams enabled
    #[must_use]
    pub fn new(voice: impl Into<String>, system_instruction_text: impl Into<String>) -> Self {
        Self {
            output_modality: OutputModality::Audio,
            voice: voice.into(),
            input_transcription_enabled: true,
            output_transcription_enabled: true,
            system_instruction_text: system_instruction_text.into(),
            tool_declarations: Vec::new(),
        }
    }
}

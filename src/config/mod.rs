//! Configuration management for Parley
//!
//! Values are layered: built-in defaults, then the TOML file, then
//! environment variables.

pub mod file;

use std::time::Duration;

use secrecy::SecretString;

use self::file::ParleyConfigFile;
use crate::playback::VoiceSelection;
use crate::prompt::{PromptTemplate, TopicSelection};
use crate::session::SessionSettings;
use crate::{Error, Result};

/// Default REST endpoint for analysis and speech
pub const DEFAULT_API_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Default live (duplex audio) model
pub const DEFAULT_LIVE_MODEL: &str = "gemini-live-2.5-flash-preview";

/// Default model for pronunciation, grammar and IPA analysis
pub const DEFAULT_ANALYSIS_MODEL: &str = "gemini-2.5-flash";

/// Default speech synthesis model
pub const DEFAULT_TTS_MODEL: &str = "gemini-2.5-flash-preview-tts";

/// Default voice for the agent
pub const DEFAULT_VOICE: &str = "Zephyr";

/// Fixed voice used to read user turns back
pub const DEFAULT_USER_VOICE: &str = "Puck";

/// Default per-fetch timeout
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 30;

/// Prebuilt voices accepted by the speech service
pub const AVAILABLE_VOICES: &[&str] = &[
    "Zephyr", "Puck", "Charon", "Kore", "Fenrir", "Leda", "Orus", "Aoede", "Callirrhoe",
    "Autonoe", "Enceladus", "Iapetus", "Umbriel", "Algieba", "Despina", "Erinome", "Algenib",
    "Rasalgethi", "Laomedeia", "Achernar", "Alnilam", "Schedar", "Gacrux", "Pulcherrima",
    "Achird", "Zubenelgenubi", "Vindemiatrix", "Sadachbia", "Sadaltager", "Sulafat",
];

/// Parley configuration
#[derive(Debug)]
pub struct Config {
    /// Service endpoint and models
    pub api: ApiConfig,

    /// Agent and user playback voices
    pub voices: VoiceSelection,

    /// Practice template, prompt and topics
    pub practice: PracticeConfig,
}

/// Analysis and speech service configuration
#[derive(Debug)]
pub struct ApiConfig {
    /// API key (`GEMINI_API_KEY`); without it enrichment is unavailable
    pub api_key: Option<SecretString>,

    /// REST base URL
    pub base_url: String,

    /// Live session model identifier
    pub live_model: String,

    /// Analysis model identifier
    pub analysis_model: String,

    /// Speech synthesis model identifier
    pub tts_model: String,

    /// Timeout applied to each collaborator fetch
    pub fetch_timeout: Duration,
}

/// Practice scenario configuration
#[derive(Debug, Clone)]
pub struct PracticeConfig {
    /// Base system prompt (template default unless overridden)
    pub system_prompt: String,

    /// Topic toggles and custom topics
    pub topics: TopicSelection,
}

impl Config {
    /// Load configuration from the config file and environment
    ///
    /// # Errors
    ///
    /// Returns error if the template or a voice is not recognized
    pub fn load() -> Result<Self> {
        Self::from_sources(file::load_config_file(), |key| std::env::var(key).ok())
    }

    /// Build configuration from a parsed file and an environment lookup
    ///
    /// # Errors
    ///
    /// Returns error if the template or a voice is not recognized
    pub fn from_sources(
        file: ParleyConfigFile,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let env = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        let api_key = env("GEMINI_API_KEY")
            .or(file.api.key)
            .map(SecretString::from);

        let fetch_timeout_secs = match env("PARLEY_FETCH_TIMEOUT_SECS") {
            Some(raw) => raw.trim().parse::<u64>().map_err(|_| {
                Error::Config(format!("PARLEY_FETCH_TIMEOUT_SECS must be a number, got '{raw}'"))
            })?,
            None => file.api.timeout_secs.unwrap_or(DEFAULT_FETCH_TIMEOUT_SECS),
        };
        if fetch_timeout_secs == 0 {
            return Err(Error::Config("fetch timeout must be at least 1 second".to_string()));
        }

        let api = ApiConfig {
            api_key,
            base_url: env("PARLEY_API_BASE_URL")
                .or(file.api.base_url)
                .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string()),
            live_model: env("PARLEY_LIVE_MODEL")
                .or(file.api.live_model)
                .unwrap_or_else(|| DEFAULT_LIVE_MODEL.to_string()),
            analysis_model: env("PARLEY_ANALYSIS_MODEL")
                .or(file.api.analysis_model)
                .unwrap_or_else(|| DEFAULT_ANALYSIS_MODEL.to_string()),
            tts_model: env("PARLEY_TTS_MODEL")
                .or(file.api.tts_model)
                .unwrap_or_else(|| DEFAULT_TTS_MODEL.to_string()),
            fetch_timeout: Duration::from_secs(fetch_timeout_secs),
        };

        let voices = VoiceSelection {
            agent: validate_voice(
                env("PARLEY_VOICE")
                    .or(file.voice.agent)
                    .unwrap_or_else(|| DEFAULT_VOICE.to_string()),
            )?,
            user: validate_voice(
                env("PARLEY_USER_VOICE")
                    .or(file.voice.user)
                    .unwrap_or_else(|| DEFAULT_USER_VOICE.to_string()),
            )?,
        };

        let template = match env("PARLEY_TEMPLATE").or(file.practice.template) {
            Some(name) => name.parse()?,
            None => PromptTemplate::default(),
        };

        let mut topics = TopicSelection::new(template);
        for name in &file.practice.enable_topics {
            if !topics.set(name, true) {
                tracing::warn!(topic = %name, %template, "unknown topic in config");
            }
        }
        for name in &file.practice.disable_topics {
            if !topics.set(name, false) {
                tracing::warn!(topic = %name, %template, "unknown topic in config");
            }
        }
        if let Some(custom) = env("PARLEY_TOPICS").or(file.practice.custom_topics) {
            topics.set_custom(&custom);
        }

        let practice = PracticeConfig {
            system_prompt: file
                .practice
                .system_prompt
                .unwrap_or_else(|| template.content().system_prompt.to_string()),
            topics,
        };

        Ok(Self {
            api,
            voices,
            practice,
        })
    }

    /// System instruction for the live session
    #[must_use]
    pub fn system_instruction(&self) -> String {
        self.practice
            .topics
            .system_instruction(&self.practice.system_prompt)
    }

    /// Settings for a new coaching session
    #[must_use]
    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            voices: self.voices.clone(),
            system_instruction: self.system_instruction(),
            fetch_timeout: self.api.fetch_timeout,
        }
    }
}

/// Match a voice name case-insensitively against the supported list
fn validate_voice(name: String) -> Result<String> {
    AVAILABLE_VOICES
        .iter()
        .find(|v| v.eq_ignore_ascii_case(name.trim()))
        .map(ToString::to_string)
        .ok_or_else(|| Error::Config(format!("unknown voice '{name}'")))
}

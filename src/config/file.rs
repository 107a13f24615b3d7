//! TOML configuration file loading
//!
//! Supports `~/.config/parley/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::Result;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct ParleyConfigFile {
    /// Analysis and speech service configuration
    #[serde(default)]
    pub api: ApiFileConfig,

    /// Voice selection
    #[serde(default)]
    pub voice: VoiceFileConfig,

    /// Practice template and topics
    #[serde(default)]
    pub practice: PracticeFileConfig,
}

/// Service endpoint and model configuration
#[derive(Debug, Default, Deserialize)]
pub struct ApiFileConfig {
    /// API key (prefer the `GEMINI_API_KEY` env var)
    pub key: Option<String>,

    /// REST base URL
    pub base_url: Option<String>,

    /// Live (duplex audio) model identifier
    pub live_model: Option<String>,

    /// Model used for pronunciation, grammar and IPA analysis
    pub analysis_model: Option<String>,

    /// Model used for speech synthesis
    pub tts_model: Option<String>,

    /// Per-fetch timeout in seconds
    pub timeout_secs: Option<u64>,
}

/// Voice configuration
#[derive(Debug, Default, Deserialize)]
pub struct VoiceFileConfig {
    /// Voice the agent speaks with (e.g. "Zephyr")
    pub agent: Option<String>,

    /// Voice used to read the user's own turns back
    pub user: Option<String>,
}

/// Practice scenario configuration
#[derive(Debug, Default, Deserialize)]
pub struct PracticeFileConfig {
    /// Template identifier (e.g. "travel")
    pub template: Option<String>,

    /// Replaces the template's system prompt
    pub system_prompt: Option<String>,

    /// Template topics to force on
    #[serde(default)]
    pub enable_topics: Vec<String>,

    /// Template topics to force off
    #[serde(default)]
    pub disable_topics: Vec<String>,

    /// Comma-separated free-form topics
    pub custom_topics: Option<String>,
}

/// Load the TOML config file from the standard path
///
/// Returns `ParleyConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> ParleyConfigFile {
    let Some(path) = config_file_path() else {
        return ParleyConfigFile::default();
    };

    if !path.exists() {
        return ParleyConfigFile::default();
    }

    match load_config_file_from(&path) {
        Ok(config) => {
            tracing::info!(path = %path.display(), "loaded config file");
            config
        }
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to load config file, using defaults"
            );
            ParleyConfigFile::default()
        }
    }
}

/// Read and parse a config file at an explicit path
///
/// # Errors
///
/// Returns error if the file cannot be read or is not valid TOML
pub fn load_config_file_from(path: &Path) -> Result<ParleyConfigFile> {
    let content = std::fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// Return the config file path: `~/.config/parley/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("parley").join("config.toml"))
}

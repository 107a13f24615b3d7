//! Gemini `generateContent` client for analysis and speech

use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::CoachService;
use crate::conversation::{GrammarFeedback, PronunciationFeedback};
use crate::{Error, Result};

/// Pronunciation, grammar, IPA and TTS over the Gemini REST API
pub struct GeminiCoach {
    client: Client,
    api_key: SecretString,
    base_url: String,
    analysis_model: String,
    tts_model: String,
}

impl GeminiCoach {
    /// Create a new Gemini coach client
    ///
    /// # Errors
    ///
    /// Returns error if the API key is empty
    pub fn new(
        api_key: SecretString,
        base_url: impl Into<String>,
        analysis_model: impl Into<String>,
        tts_model: impl Into<String>,
    ) -> Result<Self> {
        if api_key.expose_secret().trim().is_empty() {
            return Err(Error::Config("Gemini API key must not be empty".to_string()));
        }

        Ok(Self {
            client: Client::new(),
            api_key,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            analysis_model: analysis_model.into(),
            tts_model: tts_model.into(),
        })
    }

    async fn generate(&self, model: &str, request: &GenerateRequest<'_>) -> Result<GenerateResponse> {
        let url = format!("{}/models/{model}:generateContent", self.base_url);

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", self.api_key.expose_secret())
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Service(format!("Gemini error {status}: {body}")));
        }

        Ok(response.json().await?)
    }

    /// Request a JSON document conforming to `schema` and parse it
    async fn generate_structured<T: DeserializeOwned>(
        &self,
        prompt: &str,
        schema: serde_json::Value,
    ) -> Result<T> {
        let request = GenerateRequest {
            contents: vec![Content::text(prompt)],
            generation_config: Some(GenerationConfig {
                response_mime_type: Some("application/json"),
                response_schema: Some(schema),
                ..GenerationConfig::default()
            }),
        };

        let response = self.generate(&self.analysis_model, &request).await?;
        let text = response
            .text()
            .ok_or_else(|| Error::Service("empty analysis response".to_string()))?;
        Ok(serde_json::from_str(&text)?)
    }
}

#[async_trait]
impl CoachService for GeminiCoach {
    async fn analyze_pronunciation(&self, text: &str) -> Result<PronunciationFeedback> {
        self.generate_structured(&pronunciation_prompt(text), pronunciation_schema())
            .await
    }

    async fn analyze_grammar(&self, text: &str) -> Result<GrammarFeedback> {
        self.generate_structured(&grammar_prompt(text), grammar_schema())
            .await
    }

    async fn transcribe_phonetic(&self, text: &str) -> Result<String> {
        let prompt = ipa_prompt(text);
        let request = GenerateRequest {
            contents: vec![Content::text(&prompt)],
            generation_config: None,
        };

        let response = self.generate(&self.analysis_model, &request).await?;
        Ok(response.text().unwrap_or_default().trim().to_string())
    }

    async fn synthesize_speech(&self, text: &str, voice: &str) -> Result<Option<Vec<u8>>> {
        let request = GenerateRequest {
            contents: vec![Content::text(text)],
            generation_config: Some(GenerationConfig {
                response_modalities: Some(vec!["AUDIO"]),
                speech_config: Some(SpeechConfig {
                    voice_config: VoiceConfig {
                        prebuilt_voice_config: PrebuiltVoiceConfig { voice_name: voice },
                    },
                }),
                ..GenerationConfig::default()
            }),
        };

        let response = self.generate(&self.tts_model, &request).await?;
        response
            .inline_audio()
            .map(|data| base64::engine::general_purpose::STANDARD.decode(data))
            .transpose()
            .map_err(Error::from)
    }

    fn name(&self) -> &'static str {
        "gemini"
    }
}

fn pronunciation_prompt(text: &str) -> String {
    format!(
        "You are an expert English pronunciation coach. Analyze the pronunciation of the \
         following text from a non-native English speaker. Provide an overall assessment and a \
         word-by-word breakdown of every word. Respond ONLY with a JSON object that conforms to \
         the provided schema.\n\nText to analyze: \"{text}\""
    )
}

fn grammar_prompt(text: &str) -> String {
    format!(
        "You are an expert English grammar coach. Analyze the grammar of the following text from \
         a non-native English speaker. Provide an overall assessment and a list of corrections. \
         If the text is grammatically perfect, provide a positive assessment and an empty array \
         for corrections. Respond ONLY with a JSON object that conforms to the provided \
         schema.\n\nText to analyze: \"{text}\""
    )
}

fn ipa_prompt(text: &str) -> String {
    format!(
        "Provide the International Phonetic Alphabet (IPA) transcription for the following \
         English text. Return only the IPA string, without any surrounding text, labels, or \
         markdown formatting. For example, for \"hello world\", return \"/həˈloʊ wɜːrld/\". \
         Text: \"{text}\""
    )
}

fn pronunciation_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "OBJECT",
        "properties": {
            "overall_assessment": {
                "type": "STRING",
                "description": "A brief, encouraging overall assessment of the user's pronunciation."
            },
            "words": {
                "type": "ARRAY",
                "description": "A word-by-word analysis of the user's pronunciation.",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "word": { "type": "STRING", "description": "The word from the original text." },
                        "accuracy": {
                            "type": "STRING",
                            "enum": ["good", "needs_improvement", "incorrect"],
                            "description": "Pronunciation accuracy."
                        },
                        "feedback": {
                            "type": "STRING",
                            "description": "Specific feedback for this word. If \"good\", a simple encouragement."
                        }
                    },
                    "required": ["word", "accuracy", "feedback"]
                }
            }
        },
        "required": ["overall_assessment", "words"]
    })
}

fn grammar_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "OBJECT",
        "properties": {
            "overall_assessment": {
                "type": "STRING",
                "description": "A brief, encouraging overall assessment of the user's grammar."
            },
            "corrections": {
                "type": "ARRAY",
                "description": "Specific grammar corrections; empty when there are no errors.",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "original": { "type": "STRING", "description": "The original phrase with the error." },
                        "corrected": { "type": "STRING", "description": "The grammatically correct phrase." },
                        "explanation": { "type": "STRING", "description": "A simple explanation of the rule." }
                    },
                    "required": ["original", "corrected", "explanation"]
                }
            }
        },
        "required": ["overall_assessment", "corrections"]
    })
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig<'a>>,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

impl<'a> Content<'a> {
    fn text(text: &'a str) -> Self {
        Self {
            parts: vec![Part { text }],
        }
    }
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Default, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_schema: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_modalities: Option<Vec<&'a str>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    speech_config: Option<SpeechConfig<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SpeechConfig<'a> {
    voice_config: VoiceConfig<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct VoiceConfig<'a> {
    prebuilt_voice_config: PrebuiltVoiceConfig<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PrebuiltVoiceConfig<'a> {
    voice_name: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponsePart {
    text: Option<String>,
    inline_data: Option<InlineData>,
}

#[derive(Debug, Deserialize)]
struct InlineData {
    data: String,
}

impl GenerateResponse {
    fn first_parts(&self) -> &[ResponsePart] {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|c| c.parts.as_slice())
            .unwrap_or_default()
    }

    /// Concatenated text of the first candidate
    fn text(&self) -> Option<String> {
        let text: String = self
            .first_parts()
            .iter()
            .filter_map(|p| p.text.as_deref())
            .collect();
        (!text.is_empty()).then_some(text)
    }

    /// Base64 audio of the first inline part, if any
    fn inline_audio(&self) -> Option<&str> {
        self.first_parts()
            .iter()
            .find_map(|p| p.inline_data.as_ref())
            .map(|d| d.data.as_str())
    }
}

//! Conversation turns and the patches that mutate them

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque, immutable turn identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TurnId(Uuid);

impl TurnId {
    pub(crate) fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for TurnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Who spoke a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Agent,
    System,
}

impl Role {
    /// Label shown next to a turn
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::User => "You",
            Self::Agent => "Agent",
            Self::System => "System",
        }
    }
}

/// A citation attached to agent-generated content
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroundingChunk {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_title: Option<String>,
}

impl GroundingChunk {
    /// Chunk pointing at a URI with no title
    #[must_use]
    pub fn uri(uri: impl Into<String>) -> Self {
        Self {
            source_uri: Some(uri.into()),
            source_title: None,
        }
    }

    /// Text to show for the link: the title when present, otherwise the URI
    #[must_use]
    pub fn display_text(&self) -> Option<&str> {
        self.source_title
            .as_deref()
            .filter(|t| !t.is_empty())
            .or(self.source_uri.as_deref())
    }
}

/// Pronunciation accuracy for a single word
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WordAccuracy {
    Good,
    NeedsImprovement,
    Incorrect,
}

/// Per-word pronunciation note
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordFeedback {
    pub word: String,
    pub accuracy: WordAccuracy,
    pub feedback: String,
}

/// Structured pronunciation analysis of a user turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PronunciationFeedback {
    pub overall_assessment: String,
    #[serde(default)]
    pub words: Vec<WordFeedback>,
}

/// A single grammar fix
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrammarCorrection {
    pub original: String,
    pub corrected: String,
    pub explanation: String,
}

/// Structured grammar analysis of a user turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrammarFeedback {
    pub overall_assessment: String,
    #[serde(default)]
    pub corrections: Vec<GrammarCorrection>,
}

/// Enrichment that is either still being fetched or available
///
/// `Analyzing` is the observable loading placeholder; an absent field is `None`
/// on the turn itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum Feedback<T> {
    Analyzing,
    Ready(T),
}

impl<T> Feedback<T> {
    #[must_use]
    pub const fn is_analyzing(&self) -> bool {
        matches!(self, Self::Analyzing)
    }

    #[must_use]
    pub const fn ready(&self) -> Option<&T> {
        match self {
            Self::Analyzing => None,
            Self::Ready(value) => Some(value),
        }
    }
}

/// One contiguous utterance by a single role
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationTurn {
    pub id: TurnId,
    pub role: Role,
    pub text: String,
    pub is_final: bool,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub grounding_chunks: Vec<GroundingChunk>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipa: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pronunciation_feedback: Option<Feedback<PronunciationFeedback>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grammar_feedback: Option<Feedback<GrammarFeedback>>,
}

impl ConversationTurn {
    pub(crate) fn from_new(turn: NewTurn) -> Self {
        Self {
            id: TurnId::new(),
            role: turn.role,
            text: turn.text,
            is_final: turn.is_final,
            timestamp: Utc::now(),
            grounding_chunks: turn.grounding_chunks,
            ipa: None,
            pronunciation_feedback: None,
            grammar_feedback: None,
        }
    }

    /// Whether the text carries anything besides whitespace
    #[must_use]
    pub fn has_text(&self) -> bool {
        !self.text.trim().is_empty()
    }

    /// Apply a patch, keeping every field monotonic
    ///
    /// Transcript fields only grow while the turn is open, finalization never
    /// reverts, and enrichment only lands on finalized turns.
    pub(crate) fn apply(&mut self, update: TurnUpdate) -> AppliedChange {
        let mut change = AppliedChange::default();

        if !self.is_final {
            if let Some(text) = update.append_text.filter(|t| !t.is_empty()) {
                self.text.push_str(&text);
                change.transcript = true;
            }
            if !update.append_grounding.is_empty() {
                self.grounding_chunks.extend(update.append_grounding);
                change.transcript = true;
            }
            if update.finalize {
                self.is_final = true;
                change.transcript = true;
            }
        } else if update.append_text.is_some_and(|t| !t.is_empty())
            || !update.append_grounding.is_empty()
        {
            tracing::debug!(turn_id = %self.id, "ignoring transcript append to final turn");
        }

        let enrichment = update.ipa.is_touch()
            || update.pronunciation_feedback.is_touch()
            || update.grammar_feedback.is_touch();
        if enrichment && !self.is_final {
            tracing::debug!(turn_id = %self.id, "ignoring enrichment for open turn");
            return change;
        }

        change.enrichment |= update.ipa.apply_to(&mut self.ipa);
        change.enrichment |= update
            .pronunciation_feedback
            .apply_to(&mut self.pronunciation_feedback);
        change.enrichment |= update.grammar_feedback.apply_to(&mut self.grammar_feedback);

        change
    }
}

/// A turn before the log assigns identity and timestamp
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTurn {
    pub role: Role,
    pub text: String,
    pub is_final: bool,
    pub grounding_chunks: Vec<GroundingChunk>,
}

impl NewTurn {
    #[must_use]
    pub fn new(role: Role, text: impl Into<String>, is_final: bool) -> Self {
        Self {
            role,
            text: text.into(),
            is_final,
            grounding_chunks: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_grounding(mut self, chunks: Vec<GroundingChunk>) -> Self {
        self.grounding_chunks = chunks;
        self
    }
}

/// Change to an optional enrichment field
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Patch<T> {
    #[default]
    Keep,
    Set(T),
    Clear,
}

impl<T: PartialEq> Patch<T> {
    const fn is_touch(&self) -> bool {
        !matches!(self, Self::Keep)
    }

    fn apply_to(self, slot: &mut Option<T>) -> bool {
        match self {
            Self::Keep => false,
            Self::Set(value) => {
                let changed = slot.as_ref() != Some(&value);
                *slot = Some(value);
                changed
            }
            Self::Clear => slot.take().is_some(),
        }
    }
}

/// Partial update merged into an existing turn
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TurnUpdate {
    pub append_text: Option<String>,
    pub append_grounding: Vec<GroundingChunk>,
    pub finalize: bool,
    pub ipa: Patch<String>,
    pub pronunciation_feedback: Patch<Feedback<PronunciationFeedback>>,
    pub grammar_feedback: Patch<Feedback<GrammarFeedback>>,
}

impl TurnUpdate {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn append_text(mut self, text: impl Into<String>) -> Self {
        self.append_text = Some(text.into());
        self
    }

    #[must_use]
    pub fn append_grounding(mut self, chunks: impl IntoIterator<Item = GroundingChunk>) -> Self {
        self.append_grounding.extend(chunks);
        self
    }

    /// Finalize when `is_final` is set; `false` leaves the flag alone
    #[must_use]
    pub fn finalize_if(mut self, is_final: bool) -> Self {
        self.finalize |= is_final;
        self
    }

    #[must_use]
    pub fn finalize(self) -> Self {
        self.finalize_if(true)
    }

    #[must_use]
    pub fn ipa(mut self, ipa: impl Into<String>) -> Self {
        self.ipa = Patch::Set(ipa.into());
        self
    }

    #[must_use]
    pub fn clear_ipa(mut self) -> Self {
        self.ipa = Patch::Clear;
        self
    }

    #[must_use]
    pub fn pronunciation(mut self, feedback: Feedback<PronunciationFeedback>) -> Self {
        self.pronunciation_feedback = Patch::Set(feedback);
        self
    }

    #[must_use]
    pub fn clear_pronunciation(mut self) -> Self {
        self.pronunciation_feedback = Patch::Clear;
        self
    }

    #[must_use]
    pub fn grammar(mut self, feedback: Feedback<GrammarFeedback>) -> Self {
        self.grammar_feedback = Patch::Set(feedback);
        self
    }

    #[must_use]
    pub fn clear_grammar(mut self) -> Self {
        self.grammar_feedback = Patch::Clear;
        self
    }
}

/// Which kinds of fields an applied patch actually changed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct AppliedChange {
    pub transcript: bool,
    pub enrichment: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_user(text: &str) -> ConversationTurn {
        ConversationTurn::from_new(NewTurn::new(Role::User, text, false))
    }

    fn sample_grammar() -> GrammarFeedback {
        GrammarFeedback {
            overall_assessment: "Nice".to_string(),
            corrections: vec![],
        }
    }

    #[test]
    fn append_extends_open_turn() {
        let mut turn = open_user("Hel");
        let change = turn.apply(TurnUpdate::new().append_text("lo"));
        assert_eq!(turn.text, "Hello");
        assert!(change.transcript);
        assert!(!turn.is_final);
    }

    #[test]
    fn finalization_never_reverts() {
        let mut turn = open_user("Hi");
        turn.apply(TurnUpdate::new().finalize());
        assert!(turn.is_final);

        let change = turn.apply(TurnUpdate::new().finalize_if(false));
        assert!(turn.is_final);
        assert_eq!(change, AppliedChange::default());
    }

    #[test]
    fn final_turn_text_is_frozen() {
        let mut turn = open_user("Done");
        turn.apply(TurnUpdate::new().finalize());
        turn.apply(
            TurnUpdate::new()
                .append_text(" more")
                .append_grounding([GroundingChunk::uri("https://x")]),
        );
        assert_eq!(turn.text, "Done");
        assert!(turn.grounding_chunks.is_empty());
    }

    #[test]
    fn enrichment_rejected_on_open_turn() {
        let mut turn = open_user("Hi");
        let change = turn.apply(TurnUpdate::new().ipa("/haɪ/"));
        assert!(turn.ipa.is_none());
        assert!(!change.enrichment);
    }

    #[test]
    fn finalize_and_enrich_in_one_patch() {
        let mut turn = open_user("Hi");
        let change = turn.apply(TurnUpdate::new().finalize().ipa("/haɪ/"));
        assert!(change.transcript && change.enrichment);
        assert_eq!(turn.ipa.as_deref(), Some("/haɪ/"));
    }

    #[test]
    fn clear_resets_enrichment_to_absent() {
        let mut turn = open_user("Hi");
        turn.apply(
            TurnUpdate::new()
                .finalize()
                .grammar(Feedback::Ready(sample_grammar())),
        );
        assert!(turn.grammar_feedback.is_some());

        let change = turn.apply(TurnUpdate::new().clear_grammar());
        assert!(turn.grammar_feedback.is_none());
        assert!(change.enrichment);

        let change = turn.apply(TurnUpdate::new().clear_grammar());
        assert!(!change.enrichment);
    }

    #[test]
    fn feedback_placeholder_accessors() {
        let analyzing: Feedback<GrammarFeedback> = Feedback::Analyzing;
        assert!(analyzing.is_analyzing());
        assert!(analyzing.ready().is_none());

        let ready = Feedback::Ready(sample_grammar());
        assert_eq!(ready.ready().map(|g| g.overall_assessment.as_str()), Some("Nice"));
    }

    #[test]
    fn grounding_display_prefers_title() {
        let chunk = GroundingChunk {
            source_uri: Some("https://x".to_string()),
            source_title: Some("X".to_string()),
        };
        assert_eq!(chunk.display_text(), Some("X"));
        assert_eq!(GroundingChunk::uri("https://y").display_text(), Some("https://y"));
        assert_eq!(GroundingChunk::default().display_text(), None);
    }

    #[test]
    fn word_accuracy_uses_snake_case() {
        let parsed: WordAccuracy = serde_json::from_str("\"needs_improvement\"").unwrap();
        assert_eq!(parsed, WordAccuracy::NeedsImprovement);
    }
}

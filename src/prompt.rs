//! Practice templates, conversation topics, and the system instruction
//!
//! Each template carries a base system prompt and a default topic list.
//! [`TopicSelection`] tracks which topics are enabled for the session and
//! turns them into the instruction sent to the live service.

use std::fmt;
use std::str::FromStr;

use crate::{Error, Result};

/// Practice scenario
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PromptTemplate {
    #[default]
    DailyLife,
    Professional,
    Creative,
    Travel,
    Health,
}

/// A topic offered by a template
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TopicDef {
    pub name: &'static str,
    pub description: &'static str,
    pub enabled_by_default: bool,
}

/// Static content of a template
#[derive(Debug, Clone, Copy)]
pub struct PromptContent {
    pub title: &'static str,
    pub description: &'static str,
    pub system_prompt: &'static str,
    pub starter_prompts: &'static [&'static str],
    pub topics: &'static [TopicDef],
}

const fn topic(name: &'static str, description: &'static str, enabled: bool) -> TopicDef {
    TopicDef {
        name,
        description,
        enabled_by_default: enabled,
    }
}

const DAILY_LIFE: PromptContent = PromptContent {
    title: "Daily Life Conversations",
    description: "Practice everyday conversations like ordering food or making plans.",
    system_prompt: "You are a friendly and patient English conversation partner. Your goal is to \
        help the user practice everyday English conversations. Be encouraging and gently correct \
        their mistakes in grammar and pronunciation. Keep your responses natural and not overly \
        formal.",
    starter_prompts: &[
        "Let's order a coffee.",
        "What should we do this weekend?",
        "I'd like to buy a t-shirt.",
    ],
    topics: &[
        topic("Ordering Food", "Practice ordering at a restaurant.", true),
        topic("Making Plans", "Talk about making plans with a friend.", true),
        topic("Shopping", "Practice conversations while shopping.", false),
    ],
};

const PROFESSIONAL: PromptContent = PromptContent {
    title: "Professional Conversations",
    description: "Improve your business English for interviews, presentations, and meetings.",
    system_prompt: "You are a professional English communication coach. Your goal is to help the \
        user practice their business English for situations like job interviews and meetings. \
        Provide clear feedback on their language use, focusing on clarity, formality, and \
        confidence.",
    starter_prompts: &[
        "Tell me about yourself.",
        "How would you handle a difficult colleague?",
        "Let's begin the presentation.",
    ],
    topics: &[
        topic("Job Interview", "Practice common interview questions.", true),
        topic("Giving a Presentation", "Practice presenting a topic.", true),
        topic(
            "Participating in a Meeting",
            "Practice expressing opinions in a meeting.",
            false,
        ),
    ],
};

const CREATIVE: PromptContent = PromptContent {
    title: "Creative Conversations",
    description: "Boost your creativity with storytelling and descriptive exercises.",
    system_prompt: "You are a creative and imaginative English tutor. Your goal is to help the \
        user practice their descriptive and narrative skills. Encourage them to be creative and \
        use vivid language. Help them with vocabulary and sentence structure to make their \
        stories and descriptions more engaging.",
    starter_prompts: &[
        "Once upon a time...",
        "Describe the most beautiful place you've seen.",
        "I believe that...",
    ],
    topics: &[
        topic("Storytelling", "Create and tell a short story.", true),
        topic("Describing a Picture", "Practice describing a scene.", true),
        topic("Debate a Topic", "Practice arguing for or against a topic.", false),
    ],
};

const TRAVEL: PromptContent = PromptContent {
    title: "Travel Conversations",
    description: "Prepare for your next trip by practicing common travel scenarios.",
    system_prompt: "You are a helpful travel assistant and conversation partner. Your goal is to \
        help the user practice English for travel-related situations like booking hotels, asking \
        for directions, and talking about travel experiences. Be friendly and provide useful \
        travel tips.",
    starter_prompts: &[
        "I'd like to book a flight.",
        "Could you tell me how to get to the museum?",
        "What are the local attractions?",
    ],
    topics: &[
        topic("Booking a Hotel", "Practice booking a hotel room.", true),
        topic(
            "Asking for Directions",
            "Learn how to ask for and understand directions.",
            true,
        ),
        topic(
            "At the Airport",
            "Practice conversations at the airport check-in and security.",
            false,
        ),
    ],
};

const HEALTH: PromptContent = PromptContent {
    title: "Health Conversations",
    description: "Practice discussing health topics and symptoms with a doctor.",
    system_prompt: "You are a compassionate and clear-speaking healthcare conversation partner. \
        Your role is to help the user practice English for medical situations, such as describing \
        symptoms to a doctor or asking about medication. Use simple, easy-to-understand language \
        and be reassuring. Do not provide medical advice.",
    starter_prompts: &[
        "I have a headache.",
        "What are the side effects of this medicine?",
        "I need to make an appointment.",
    ],
    topics: &[
        topic(
            "Describing Symptoms",
            "Practice explaining your symptoms to a doctor.",
            true,
        ),
        topic(
            "At the Pharmacy",
            "Practice conversations when picking up a prescription.",
            true,
        ),
        topic(
            "Making an Appointment",
            "Learn how to schedule a doctor's appointment over the phone.",
            false,
        ),
    ],
};

impl PromptTemplate {
    pub const ALL: [Self; 5] = [
        Self::DailyLife,
        Self::Professional,
        Self::Creative,
        Self::Travel,
        Self::Health,
    ];

    /// Identifier used in config files and on the command line
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DailyLife => "daily-life",
            Self::Professional => "professional",
            Self::Creative => "creative",
            Self::Travel => "travel",
            Self::Health => "health",
        }
    }

    #[must_use]
    pub const fn content(self) -> &'static PromptContent {
        match self {
            Self::DailyLife => &DAILY_LIFE,
            Self::Professional => &PROFESSIONAL,
            Self::Creative => &CREATIVE,
            Self::Travel => &TRAVEL,
            Self::Health => &HEALTH,
        }
    }

    /// Human-readable listing: title, description, starter prompts and topics
    #[must_use]
    pub fn summary(self) -> String {
        let content = self.content();
        let mut out = format!("{self}: {}\n  {}\n", content.title, content.description);

        out.push_str("  Try saying:\n");
        for prompt in content.starter_prompts {
            out.push_str(&format!("    \"{prompt}\"\n"));
        }

        out.push_str("  Topics:\n");
        for topic in content.topics {
            let mark = if topic.enabled_by_default { "x" } else { " " };
            out.push_str(&format!("    [{mark}] {} - {}\n", topic.name, topic.description));
        }
        out
    }
}

impl fmt::Display for PromptTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PromptTemplate {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_lowercase().replace('_', "-");
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == wanted)
            .ok_or_else(|| {
                Error::Config(format!(
                    "unknown template '{s}' (expected one of: {})",
                    Self::ALL.map(Self::as_str).join(", ")
                ))
            })
    }
}

/// A topic with its session-level toggle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTopic {
    pub name: String,
    pub description: String,
    pub enabled: bool,
}

/// Enabled template topics plus free-form custom topics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicSelection {
    template: PromptTemplate,
    topics: Vec<PromptTopic>,
    custom: Vec<String>,
}

impl TopicSelection {
    /// Start from the template's default toggles
    #[must_use]
    pub fn new(template: PromptTemplate) -> Self {
        let topics = template
            .content()
            .topics
            .iter()
            .map(|t| PromptTopic {
                name: t.name.to_string(),
                description: t.description.to_string(),
                enabled: t.enabled_by_default,
            })
            .collect();

        Self {
            template,
            topics,
            custom: Vec::new(),
        }
    }

    #[must_use]
    pub const fn template(&self) -> PromptTemplate {
        self.template
    }

    #[must_use]
    pub fn topics(&self) -> &[PromptTopic] {
        &self.topics
    }

    #[must_use]
    pub fn custom_topics(&self) -> &[String] {
        &self.custom
    }

    /// Flip a topic by name; returns `false` if the template has no such topic
    pub fn toggle(&mut self, name: &str) -> bool {
        self.set_enabled(name, None)
    }

    /// Force a topic on or off by name (case-insensitive)
    pub fn set(&mut self, name: &str, enabled: bool) -> bool {
        self.set_enabled(name, Some(enabled))
    }

    fn set_enabled(&mut self, name: &str, enabled: Option<bool>) -> bool {
        match self
            .topics
            .iter_mut()
            .find(|t| t.name.eq_ignore_ascii_case(name.trim()))
        {
            Some(topic) => {
                topic.enabled = enabled.unwrap_or(!topic.enabled);
                true
            }
            None => false,
        }
    }

    /// Replace custom topics from a comma-separated list
    pub fn set_custom(&mut self, list: &str) {
        self.custom = list
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(ToString::to_string)
            .collect();
    }

    /// Enabled template topics followed by custom topics
    pub fn active(&self) -> impl Iterator<Item = &str> {
        self.topics
            .iter()
            .filter(|t| t.enabled)
            .map(|t| t.name.as_str())
            .chain(self.custom.iter().map(String::as_str))
    }

    /// Base prompt with a focus sentence listing the active topics
    #[must_use]
    pub fn system_instruction(&self, base_prompt: &str) -> String {
        let active: Vec<&str> = self.active().collect();
        if active.is_empty() {
            return base_prompt.to_string();
        }
        format!(
            "{base_prompt}\n\nPlease focus the conversation on these topics: {}.",
            active.join(", ")
        )
    }
}

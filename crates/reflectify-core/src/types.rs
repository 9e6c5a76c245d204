use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ReflectifyError;

// =============================================================================
// Enums
// =============================================================================

/// Who produced a conversation turn.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Speaker {
    User,
    Assistant,
}

impl Speaker {
    /// Label used when a turn is serialized into a prompt.
    pub fn prompt_label(&self) -> &'static str {
        match self {
            Speaker::User => "User",
            Speaker::Assistant => "AI",
        }
    }
}

/// The user-declared emotional state that parameterizes chat tone.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mood {
    Happy,
    Neutral,
    Sad,
    /// No mood picked yet, or the conversation was reset.
    #[default]
    Unset,
}

impl Mood {
    /// The three moods a user can pick.
    pub const SELECTABLE: [Mood; 3] = [Mood::Happy, Mood::Neutral, Mood::Sad];

    pub fn is_set(&self) -> bool {
        !matches!(self, Mood::Unset)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Mood::Happy => "happy",
            Mood::Neutral => "neutral",
            Mood::Sad => "sad",
            Mood::Unset => "unset",
        }
    }
}

impl fmt::Display for Mood {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mood {
    type Err = ReflectifyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "happy" => Ok(Mood::Happy),
            "neutral" => Ok(Mood::Neutral),
            "sad" => Ok(Mood::Sad),
            "unset" => Ok(Mood::Unset),
            other => Err(ReflectifyError::InvalidValue(format!(
                "unknown mood `{}` (expected happy, neutral or sad)",
                other
            ))),
        }
    }
}

/// Overall safety classification of analysed content.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverallRating {
    Safe,
    Caution,
    Toxic,
}

impl OverallRating {
    /// Parse the exact wire label. Case and whitespace are not forgiven.
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "safe" => Some(OverallRating::Safe),
            "caution" => Some(OverallRating::Caution),
            "toxic" => Some(OverallRating::Toxic),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            OverallRating::Safe => "safe",
            OverallRating::Caution => "caution",
            OverallRating::Toxic => "toxic",
        }
    }

    /// Heading shown next to the analysis results.
    pub fn display_label(&self) -> &'static str {
        match self {
            OverallRating::Safe => "Safe Content",
            OverallRating::Caution => "Use Caution",
            OverallRating::Toxic => "Potentially Harmful",
        }
    }
}

impl fmt::Display for OverallRating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The five numeric dimensions of a content analysis.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreCategory {
    Toxicity,
    Insult,
    Profanity,
    IdentityAttack,
    Threat,
}

impl ScoreCategory {
    /// All categories, in validation and display order.
    pub const ALL: [ScoreCategory; 5] = [
        ScoreCategory::Toxicity,
        ScoreCategory::Insult,
        ScoreCategory::Profanity,
        ScoreCategory::IdentityAttack,
        ScoreCategory::Threat,
    ];

    /// JSON field name of this category.
    pub fn field_name(&self) -> &'static str {
        match self {
            ScoreCategory::Toxicity => "toxicity",
            ScoreCategory::Insult => "insult",
            ScoreCategory::Profanity => "profanity",
            ScoreCategory::IdentityAttack => "identity_attack",
            ScoreCategory::Threat => "threat",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ScoreCategory::Toxicity => "Toxicity",
            ScoreCategory::Insult => "Insult",
            ScoreCategory::Profanity => "Profanity",
            ScoreCategory::IdentityAttack => "Identity Attack",
            ScoreCategory::Threat => "Threat",
        }
    }
}

/// Severity band of a single score, used for colouring results.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreBand {
    /// Below 0.3.
    Low,
    /// From 0.3 up to (not including) 0.6.
    Moderate,
    /// 0.6 and above.
    High,
}

impl ScoreBand {
    pub fn from_score(score: f64) -> Self {
        if score < 0.3 {
            ScoreBand::Low
        } else if score < 0.6 {
            ScoreBand::Moderate
        } else {
            ScoreBand::High
        }
    }
}

// =============================================================================
// Conversation
// =============================================================================

/// One utterance in a conversation. Immutable once created.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    speaker: Speaker,
    text: String,
    created_at: DateTime<Utc>,
}

impl Turn {
    pub fn new(speaker: Speaker, text: impl Into<String>) -> Self {
        Self {
            speaker,
            text: text.into(),
            created_at: Utc::now(),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Speaker::User, text)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Speaker::Assistant, text)
    }

    pub fn speaker(&self) -> Speaker {
        self.speaker
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// `"<speaker>: <text>"` line used in chat prompts.
    pub fn prompt_line(&self) -> String {
        format!("{}: {}", self.speaker.prompt_label(), self.text)
    }
}

// =============================================================================
// Results
// =============================================================================

/// Reply to a free-form expression.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpressionResult {
    pub reply: String,
}

/// Validated safety analysis of a piece of content.
///
/// Every score is within `[0, 1]`; records that violate this never get
/// constructed by the validator.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRecord {
    pub toxicity: f64,
    pub insult: f64,
    pub profanity: f64,
    pub identity_attack: f64,
    pub threat: f64,
    pub overall: OverallRating,
    pub summary: String,
}

/// Text displayed when the service returned an empty summary.
pub const NO_SUMMARY_PLACEHOLDER: &str = "No summary provided.";

impl AnalysisRecord {
    pub fn score(&self, category: ScoreCategory) -> f64 {
        match category {
            ScoreCategory::Toxicity => self.toxicity,
            ScoreCategory::Insult => self.insult,
            ScoreCategory::Profanity => self.profanity,
            ScoreCategory::IdentityAttack => self.identity_attack,
            ScoreCategory::Threat => self.threat,
        }
    }

    /// All five scores in display order.
    pub fn scores(&self) -> [(ScoreCategory, f64); 5] {
        ScoreCategory::ALL.map(|c| (c, self.score(c)))
    }

    /// The category with the highest score (first one wins on ties).
    pub fn dominant_category(&self) -> ScoreCategory {
        let mut best = (ScoreCategory::Toxicity, self.toxicity);
        for (category, score) in self.scores() {
            if score > best.1 {
                best = (category, score);
            }
        }
        best.0
    }

    pub fn has_summary(&self) -> bool {
        !self.summary.trim().is_empty()
    }

    /// Summary for display, substituting a placeholder when it is empty.
    pub fn summary_or_placeholder(&self) -> &str {
        if self.has_summary() {
            self.summary.trim()
        } else {
            NO_SUMMARY_PLACEHOLDER
        }
    }
}

// =============================================================================
// Generation options
// =============================================================================

/// Sampling settings sent with each generation request.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GenerationOptions {
    pub temperature: f32,
    pub top_k: u32,
    pub top_p: f32,
    pub max_output_tokens: u32,
}

impl GenerationOptions {
    /// Profile for the expression and chat tasks: natural variation.
    pub const CONVERSATIONAL: GenerationOptions = GenerationOptions {
        temperature: 0.7,
        top_k: 40,
        top_p: 0.95,
        max_output_tokens: 800,
    };

    /// Profile for content analysis: near-deterministic, schema-conformant.
    pub const ANALYSIS: GenerationOptions = GenerationOptions {
        temperature: 0.2,
        top_k: 40,
        top_p: 0.95,
        max_output_tokens: 1024,
    };
}

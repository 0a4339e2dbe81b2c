use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Who authored a transcript entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sender {
    /// The synthetic prospect.
    Persona,
    /// The trainee.
    Player,
}

/// An immutable transcript entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub sender: Sender,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    /// Create a message spoken by the persona
    pub fn persona(text: impl Into<String>) -> Self {
        Self::new(Sender::Persona, text)
    }

    /// Create a message chosen by the player
    pub fn player(text: impl Into<String>) -> Self {
        Self::new(Sender::Player, text)
    }

    fn new(sender: Sender, text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            sender,
            text: text.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Accumulated score for one tracked skill.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillScore {
    pub skill: String,
    pub score: u32,
    pub max_score: u32,
}

impl SkillScore {
    /// Default ceiling for every skill accumulator.
    pub const DEFAULT_MAX: u32 = 100;

    /// Create an empty accumulator
    pub fn new(skill: impl Into<String>) -> Self {
        Self {
            skill: skill.into(),
            score: 0,
            max_score: Self::DEFAULT_MAX,
        }
    }

    /// Add points, saturating at `max_score`.
    pub fn add(&mut self, points: u32) {
        self.score = self.score.saturating_add(points).min(self.max_score);
    }
}

/// Outcome of one answered turn, keyed by the stage it was played in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagePerformance {
    pub stage_key: String,
    pub score: u32,
    /// Signed rapport impact of the chosen option.
    pub rapport_gained: i32,
}

/// Lifecycle phase of a play-through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GamePhase {
    ChannelSelect,
    PersonaSelect,
    Playing,
    Results,
}

impl GamePhase {
    /// Convert to string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            GamePhase::ChannelSelect => "channel_select",
            GamePhase::PersonaSelect => "persona_select",
            GamePhase::Playing => "playing",
            GamePhase::Results => "results",
        }
    }
}

impl std::fmt::Display for GamePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Why a game reached the results phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    /// The final stage was answered.
    Completed,
    /// The countdown reached zero.
    TimedOut,
}

/// Advisory feedback shown briefly after a choice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feedback {
    /// Sequence number used to clear exactly this feedback.
    pub seq: u64,
    pub text: String,
    pub optimal: bool,
}

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::catalog::{Channel, Persona, Script, Stage};
use crate::error::{DialogueError, DialogueResult};
use crate::game::ChatMessage;

/// Quality grade of a response option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseQuality {
    Poor,
    Good,
    Optimal,
}

impl ResponseQuality {
    /// Convert to string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseQuality::Poor => "poor",
            ResponseQuality::Good => "good",
            ResponseQuality::Optimal => "optimal",
        }
    }
}

impl std::fmt::Display for ResponseQuality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One candidate line the player may choose at a turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseOption {
    /// Line the player says if they pick this option.
    pub text: String,
    /// Quality grade of the line.
    pub quality: ResponseQuality,
    /// Signed change applied to rapport, roughly -15..=15.
    pub rapport_impact: i32,
    /// Points awarded, 0..=100. Unsigned so the score can never fall.
    pub score_value: u32,
    /// Coaching note shown after the choice.
    #[serde(default)]
    pub feedback: String,
    /// Skill the option exercises, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skill: Option<String>,
}

impl ResponseOption {
    /// Upper bound for `score_value`.
    pub const MAX_SCORE_VALUE: u32 = 100;

    /// Bound for the magnitude of `rapport_impact`.
    pub const MAX_RAPPORT_IMPACT: i32 = 100;

    /// Create an option without feedback or skill tag
    pub fn new(
        text: impl Into<String>,
        quality: ResponseQuality,
        rapport_impact: i32,
        score_value: u32,
    ) -> Self {
        Self {
            text: text.into(),
            quality,
            rapport_impact,
            score_value,
            feedback: String::new(),
            skill: None,
        }
    }

    /// Set the feedback text
    pub fn with_feedback(mut self, feedback: impl Into<String>) -> Self {
        self.feedback = feedback.into();
        self
    }

    /// Tag the option with the skill it exercises
    pub fn with_skill(mut self, skill: impl Into<String>) -> Self {
        self.skill = Some(skill.into());
        self
    }

    /// Pull `score_value` and `rapport_impact` back inside their bounds.
    pub fn clamped(mut self) -> Self {
        self.score_value = self.score_value.min(Self::MAX_SCORE_VALUE);
        self.rapport_impact = self
            .rapport_impact
            .clamp(-Self::MAX_RAPPORT_IMPACT, Self::MAX_RAPPORT_IMPACT);
        self
    }
}

/// Everything the dialogue generator needs to produce the next persona turn.
///
/// Serialized as-is into the generator request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TurnContext {
    pub persona: Persona,
    pub stage: Stage,
    pub track_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<Channel>,
    pub conversation_history: Vec<ChatMessage>,
    /// Latest player line; absent for the opening turn.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub player_response: Option<String>,
    pub rapport: u8,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub is_cold_outreach: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub script: Option<Script>,
}

impl TurnContext {
    /// True when this context asks for the conversation opener.
    pub fn is_opening(&self) -> bool {
        self.player_response.is_none()
    }
}

/// The persona's next line plus the options offered to the player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DialogueReply {
    /// What the persona says.
    #[serde(rename = "client_response")]
    pub utterance: String,
    /// Lines offered to the player.
    #[serde(rename = "response_options")]
    pub options: Vec<ResponseOption>,
    /// Optional coaching hint for this turn.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl DialogueReply {
    /// Parse a reply from pipe completion text.
    ///
    /// Accepts bare JSON or JSON wrapped in a markdown code fence. Rejects
    /// replies without an utterance or without any usable option. The parsed
    /// reply is passed through [`DialogueReply::sanitized`].
    pub fn from_completion(completion: &str) -> DialogueResult<Self> {
        let body = strip_code_fence(completion);

        let mut reply: DialogueReply =
            serde_json::from_str(body).map_err(|e| DialogueError::InvalidResponse {
                message: format!("Failed to parse dialogue reply: {}", e),
            })?;

        if reply.utterance.trim().is_empty() {
            return Err(DialogueError::InvalidResponse {
                message: "client_response is empty".to_string(),
            });
        }

        reply = reply.sanitized();
        if reply.options.is_empty() {
            return Err(DialogueError::InvalidResponse {
                message: "response_options is empty".to_string(),
            });
        }

        Ok(reply)
    }

    /// Drop options with blank text and clamp the rest to their bounds.
    ///
    /// Applied to every reply before it reaches game state, whichever
    /// generator produced it.
    pub fn sanitized(mut self) -> Self {
        self.options = self
            .options
            .into_iter()
            .filter(|o| !o.text.trim().is_empty())
            .map(ResponseOption::clamped)
            .collect();
        self
    }
}

fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// Message in a pipe conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

/// Message role
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

impl Message {
    /// Create a system message
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }
}

/// Request to run a pipe
#[derive(Debug, Clone, Serialize)]
pub struct PipeRequest {
    pub name: String,
    pub messages: Vec<Message>,
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variables: Option<HashMap<String, String>>,
}

impl PipeRequest {
    /// Create a new non-streaming pipe request
    pub fn new(name: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            name: name.into(),
            messages,
            stream: false,
            variables: None,
        }
    }

    /// Add a single variable
    pub fn with_variable(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.variables
            .get_or_insert_with(HashMap::new)
            .insert(key.into(), value.into());
        self
    }
}

/// Response from a pipe run
#[derive(Debug, Clone, Deserialize)]
pub struct PipeResponse {
    pub success: bool,
    pub completion: String,
}

/// Request to create or upsert a pipe definition
#[derive(Debug, Clone, Serialize)]
pub struct CreatePipeRequest {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upsert: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub json: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub messages: Option<Vec<Message>>,
}

impl CreatePipeRequest {
    /// Create a new pipe request with just a name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            model: None,
            upsert: None,
            json: None,
            temperature: None,
            max_tokens: None,
            messages: None,
        }
    }

    /// Set description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set model (e.g., "openai:gpt-4o-mini")
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Enable upsert (update if exists)
    pub fn with_upsert(mut self, upsert: bool) -> Self {
        self.upsert = Some(upsert);
        self
    }

    /// Enable JSON output mode
    pub fn with_json_output(mut self, json: bool) -> Self {
        self.json = Some(json);
        self
    }

    /// Set temperature
    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Set max tokens
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Set system/user messages
    pub fn with_messages(mut self, messages: Vec<Message>) -> Self {
        self.messages = Some(messages);
        self
    }
}

/// Response from creating a pipe
#[derive(Debug, Clone, Deserialize)]
pub struct CreatePipeResponse {
    pub name: String,
    #[serde(default)]
    pub url: Option<String>,
}

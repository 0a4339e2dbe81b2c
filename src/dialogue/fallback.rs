//! Deterministic dialogue used when the generator cannot be reached.

use serde::{Deserialize, Serialize};

use super::types::{DialogueReply, ResponseOption, ResponseQuality};

/// Canned persona line and options returned in place of a failed generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FallbackDialogue {
    /// Persona line for the opening turn.
    pub opening: String,
    /// Persona line for every later turn.
    pub continuation: String,
    /// Options offered with either line. Never empty.
    pub options: Vec<ResponseOption>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl FallbackDialogue {
    /// Fallback for warm prospecting and closing tracks.
    pub fn standard() -> Self {
        Self {
            opening: "Hi, thanks for making the time. What did you want to discuss today?"
                .to_string(),
            continuation:
                "Okay, I hear you. Can you tell me a bit more about how that would work for us?"
                    .to_string(),
            options: vec![
                ResponseOption::new(
                    "Before I go further, could you walk me through how your team handles this today?",
                    ResponseQuality::Optimal,
                    8,
                    80,
                )
                .with_feedback("Open question that keeps the focus on their situation.")
                .with_skill("discovery"),
                ResponseOption::new(
                    "Sure. We help teams like yours save time on exactly this kind of work.",
                    ResponseQuality::Good,
                    3,
                    50,
                )
                .with_feedback("Relevant, but a question would have learned more."),
                ResponseOption::new(
                    "Let me send you our full brochure and pricing sheet.",
                    ResponseQuality::Poor,
                    -5,
                    15,
                )
                .with_feedback("Jumps to collateral without understanding their needs."),
            ],
            hint: Some("Ask before you pitch.".to_string()),
        }
    }

    /// Fallback for cold outreach, where the prospect starts guarded.
    pub fn cold_outreach() -> Self {
        Self {
            opening: "Yes? Who is this, and how did you get my number?".to_string(),
            continuation: "I'm pretty busy. Why should I keep listening?".to_string(),
            options: vec![
                ResponseOption::new(
                    "Fair question. I'll take 30 seconds and you can tell me if it's worth more.",
                    ResponseQuality::Optimal,
                    10,
                    85,
                )
                .with_feedback("Acknowledges the interruption and asks permission.")
                .with_skill("permission"),
                ResponseOption::new(
                    "I work with companies in your space on reducing operating costs.",
                    ResponseQuality::Good,
                    2,
                    45,
                )
                .with_feedback("Clear, but does not earn the right to continue."),
                ResponseOption::new(
                    "I just need five minutes to walk you through our product.",
                    ResponseQuality::Poor,
                    -10,
                    10,
                )
                .with_feedback("Asks a stranger for time without offering value."),
            ],
            hint: Some("Earn the next 30 seconds.".to_string()),
        }
    }

    /// Build the reply for an opening or continuation turn.
    pub fn reply(&self, opening: bool) -> DialogueReply {
        let utterance = if opening {
            &self.opening
        } else {
            &self.continuation
        };

        DialogueReply {
            utterance: utterance.clone(),
            options: self.options.clone(),
            hint: self.hint.clone(),
        }
    }
}

impl Default for FallbackDialogue {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallbacks_offer_every_quality() {
        for fallback in [FallbackDialogue::standard(), FallbackDialogue::cold_outreach()] {
            let qualities: Vec<ResponseQuality> =
                fallback.options.iter().map(|o| o.quality).collect();
            assert!(qualities.contains(&ResponseQuality::Poor));
            assert!(qualities.contains(&ResponseQuality::Good));
            assert!(qualities.contains(&ResponseQuality::Optimal));
        }
    }

    #[test]
    fn test_reply_is_deterministic() {
        let fallback = FallbackDialogue::cold_outreach();
        assert_eq!(fallback.reply(true), fallback.reply(true));
        assert_ne!(fallback.reply(true).utterance, fallback.reply(false).utterance);
        assert_eq!(fallback.reply(false).options.len(), 3);
    }
}

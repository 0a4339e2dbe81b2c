//! Dialogue gateway: the async boundary to the external dialogue generator.
//!
//! The generator is modelled by the [`DialogueGenerator`] trait and may fail.
//! [`DialogueGateway`] wraps a generator and never fails: any error is
//! replaced by the track's [`FallbackDialogue`] after a single attempt.

mod client;
mod fallback;
mod types;

pub use client::DialogueClient;
pub use fallback::FallbackDialogue;
pub use types::*;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use crate::error::DialogueResult;

/// Produces the persona's next line and the scored options for a turn.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DialogueGenerator: Send + Sync {
    /// Generate one turn for the given context.
    async fn generate(&self, context: &TurnContext) -> DialogueResult<DialogueReply>;
}

/// Infallible front for a [`DialogueGenerator`].
#[derive(Clone)]
pub struct DialogueGateway {
    generator: Arc<dyn DialogueGenerator>,
}

impl DialogueGateway {
    /// Wrap a generator.
    pub fn new(generator: Arc<dyn DialogueGenerator>) -> Self {
        Self { generator }
    }

    /// Request one turn, falling back to canned dialogue on any failure.
    ///
    /// Successful replies are sanitized before they are returned.
    pub async fn request_turn(
        &self,
        context: &TurnContext,
        fallback: &FallbackDialogue,
    ) -> DialogueReply {
        match self.generator.generate(context).await {
            Ok(reply) => reply.sanitized(),
            Err(e) => {
                warn!(
                    track = %context.track_key,
                    stage = %context.stage.key,
                    opening = context.is_opening(),
                    error = %e,
                    "Using fallback dialogue"
                );
                fallback.reply(context.is_opening())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Difficulty, Persona, Stage};
    use crate::error::DialogueError;

    fn context(player_response: Option<&str>) -> TurnContext {
        TurnContext {
            persona: Persona {
                id: "p-1".to_string(),
                track_key: "sdr".to_string(),
                name: "Dana Reyes".to_string(),
                personality: "skeptical".to_string(),
                role: "VP Operations".to_string(),
                company: "Northwind Freight".to_string(),
                pain_points: vec![],
                decision_factors: vec![],
                difficulty: Difficulty::Medium,
                channel: None,
                active: true,
            },
            stage: Stage {
                id: "s-1".to_string(),
                track_key: "sdr".to_string(),
                key: "opener".to_string(),
                order: 1,
                label: "Opener".to_string(),
                tips: None,
                channel: None,
            },
            track_key: "sdr".to_string(),
            channel: None,
            conversation_history: vec![],
            player_response: player_response.map(str::to_string),
            rapport: 40,
            is_cold_outreach: false,
            script: None,
        }
    }

    #[tokio::test]
    async fn test_gateway_passes_through_success() {
        let mut generator = MockDialogueGenerator::new();
        generator.expect_generate().times(1).returning(|_| {
            Ok(DialogueReply {
                utterance: "Go ahead.".to_string(),
                options: vec![ResponseOption::new("Thanks!", ResponseQuality::Good, 2, 40)],
                hint: None,
            })
        });

        let gateway = DialogueGateway::new(Arc::new(generator));
        let reply = gateway
            .request_turn(&context(None), &FallbackDialogue::standard())
            .await;

        assert_eq!(reply.utterance, "Go ahead.");
        assert_eq!(reply.options.len(), 1);
    }

    #[tokio::test]
    async fn test_gateway_clamps_out_of_range_options() {
        let mut generator = MockDialogueGenerator::new();
        generator.expect_generate().times(1).returning(|_| {
            Ok(DialogueReply {
                utterance: "Go ahead.".to_string(),
                options: vec![
                    ResponseOption::new("", ResponseQuality::Poor, 0, 0),
                    ResponseOption::new("x", ResponseQuality::Good, i32::MAX, 5000),
                ],
                hint: None,
            })
        });

        let gateway = DialogueGateway::new(Arc::new(generator));
        let reply = gateway
            .request_turn(&context(None), &FallbackDialogue::standard())
            .await;

        assert_eq!(reply.options.len(), 1);
        assert_eq!(reply.options[0].score_value, 100);
        assert_eq!(reply.options[0].rapport_impact, 100);
    }

    #[tokio::test]
    async fn test_gateway_falls_back_after_single_failure() {
        let mut generator = MockDialogueGenerator::new();
        generator
            .expect_generate()
            .times(1)
            .returning(|_| Err(DialogueError::Timeout { timeout_ms: 100 }));

        let gateway = DialogueGateway::new(Arc::new(generator));
        let fallback = FallbackDialogue::standard();

        let reply = gateway.request_turn(&context(Some("Hello")), &fallback).await;

        assert_eq!(reply.utterance, fallback.continuation);
        assert!(!reply.options.is_empty());
    }

    #[tokio::test]
    async fn test_gateway_fallback_opening_line() {
        let mut generator = MockDialogueGenerator::new();
        generator.expect_generate().returning(|_| {
            Err(DialogueError::InvalidResponse {
                message: "garbage".to_string(),
            })
        });

        let gateway = DialogueGateway::new(Arc::new(generator));
        let fallback = FallbackDialogue::cold_outreach();
        let reply = gateway.request_turn(&context(None), &fallback).await;

        assert_eq!(reply.utterance, fallback.opening);
    }
}

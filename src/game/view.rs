//! Read-only snapshot of a game for the presentation layer.

use serde::{Deserialize, Serialize};

use super::engine::GameEngine;
use super::summary::ResultsSummary;
use super::types::{ChatMessage, EndReason, Feedback, GamePhase, SkillScore};
use crate::catalog::{Channel, Persona, Script};
use crate::dialogue::ResponseOption;

/// Everything a screen needs to render the current state of a game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameView {
    pub phase: GamePhase,
    pub track_key: String,
    pub channel: Option<Channel>,
    /// Personas offered on the selection screen.
    pub personas: Vec<Persona>,
    /// Opening scripts offered on the selection screen.
    pub scripts: Vec<Script>,
    pub persona: Option<Persona>,
    pub stage_index: usize,
    pub stage_count: usize,
    pub stage_label: Option<String>,
    pub stage_tips: Option<String>,
    pub transcript: Vec<ChatMessage>,
    pub options: Vec<ResponseOption>,
    pub hint: Option<String>,
    pub is_generating: bool,
    pub rapport: u8,
    pub score: u32,
    pub skills: Vec<SkillScore>,
    pub time_left: u32,
    pub time_spent: u32,
    pub feedback: Option<Feedback>,
    pub commitment: bool,
    pub end_reason: Option<EndReason>,
    pub session_id: Option<String>,
    pub summary: Option<ResultsSummary>,
}

impl From<&GameEngine> for GameView {
    fn from(engine: &GameEngine) -> Self {
        let stage = engine.current_stage();
        Self {
            phase: engine.phase(),
            track_key: engine.track().key.clone(),
            channel: engine.channel(),
            personas: engine.catalog().personas.clone(),
            scripts: engine.catalog().scripts.clone(),
            persona: engine.persona().cloned(),
            stage_index: engine.stage_index(),
            stage_count: engine.stage_count(),
            stage_label: stage.map(|s| s.label.clone()),
            stage_tips: stage.and_then(|s| s.tips.clone()),
            transcript: engine.transcript().to_vec(),
            options: engine.options().to_vec(),
            hint: engine.hint().map(str::to_string),
            is_generating: engine.is_generating(),
            rapport: engine.rapport(),
            score: engine.score(),
            skills: engine.skills().to_vec(),
            time_left: engine.time_left(),
            time_spent: engine.time_spent(),
            feedback: engine.feedback().cloned(),
            commitment: engine.commitment(),
            end_reason: engine.end_reason(),
            session_id: engine.session_id().map(str::to_string),
            summary: engine.summary(),
        }
    }
}

impl GameEngine {
    /// Snapshot for rendering.
    pub fn view(&self) -> GameView {
        GameView::from(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracks::TrackConfig;
    use std::sync::Arc;

    #[test]
    fn test_initial_view() {
        let engine = GameEngine::new(Arc::new(TrackConfig::cold_outreach()), None);
        let view = engine.view();

        assert_eq!(view.phase, GamePhase::ChannelSelect);
        assert_eq!(view.track_key, "cold_outreach");
        assert_eq!(view.rapport, 20);
        assert_eq!(view.time_left, 180);
        assert!(view.personas.is_empty());
        assert!(view.stage_label.is_none());
        assert!(!view.is_generating);
        assert!(view.summary.is_none());
    }

    #[test]
    fn test_view_serializes_phase_snake_case() {
        let engine = GameEngine::new(Arc::new(TrackConfig::sdr()), None);
        let value = serde_json::to_value(engine.view()).unwrap();
        assert_eq!(value["phase"], "persona_select");
    }
}

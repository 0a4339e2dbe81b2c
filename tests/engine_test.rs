//! Integration tests for the turn engine
//!
//! Drives `GameEngine` through whole play-throughs with the public event API
//! and checks the invariants that must hold after every event.

use std::sync::Arc;

use async_trait::async_trait;

use rapport_trainer::catalog::{Catalog, Difficulty, Persona, Stage};
use rapport_trainer::dialogue::{
    DialogueGateway, DialogueGenerator, DialogueReply, ResponseOption, ResponseQuality,
    TurnContext,
};
use rapport_trainer::error::{DialogueError, DialogueResult};
use rapport_trainer::game::{
    Effect, EndReason, GameEngine, GameEvent, GamePhase, Sender, TurnTicket,
};
use rapport_trainer::tracks::TrackConfig;

fn catalog(track: &str, stages: usize) -> Catalog {
    Catalog {
        stages: (0..stages)
            .map(|i| Stage {
                id: format!("stage-{}", i),
                track_key: track.to_string(),
                key: format!("stage_{}", i),
                order: i as i32,
                label: format!("Stage {}", i),
                tips: None,
                channel: None,
            })
            .collect(),
        personas: vec![Persona {
            id: "p-1".to_string(),
            track_key: track.to_string(),
            name: "Jordan Lee".to_string(),
            personality: "guarded".to_string(),
            role: "Operations Manager".to_string(),
            company: "Acme Logistics".to_string(),
            pain_points: vec![],
            decision_factors: vec![],
            difficulty: Difficulty::Medium,
            channel: None,
            active: true,
        }],
        scripts: vec![],
    }
}

fn option(quality: ResponseQuality, impact: i32, score: u32) -> ResponseOption {
    ResponseOption::new(format!("{} reply", quality), quality, impact, score)
}

fn reply(options: Vec<ResponseOption>) -> DialogueReply {
    DialogueReply {
        utterance: "Okay, go on.".to_string(),
        options,
        hint: None,
    }
}

/// Engine started on `track` with `stages` stages, opening turn outstanding.
fn start(track: TrackConfig, stages: usize) -> GameEngine {
    let key = track.key.clone();
    let engine = GameEngine::new(Arc::new(track), Some("user-1".to_string()));
    let (engine, _) = engine.apply(GameEvent::CatalogLoaded {
        channel: None,
        catalog: catalog(&key, stages),
    });
    let (engine, transition) = engine.apply(GameEvent::StartGame {
        persona_id: "p-1".to_string(),
        script_id: None,
    });
    assert!(transition.is_applied());
    engine
}

fn ticket(engine: &GameEngine) -> TurnTicket {
    engine.pending_ticket().expect("a turn should be outstanding")
}

fn answer(engine: GameEngine, choice: ResponseOption) -> GameEngine {
    let t = ticket(&engine);
    let (engine, _) = engine.apply(GameEvent::TurnResolved {
        ticket: t,
        reply: reply(vec![choice]),
    });
    let (engine, _) = engine.apply(GameEvent::ChooseOption(0));
    engine
}

fn assert_invariants(engine: &GameEngine, previous_score: u32, previous_stage: usize) {
    assert!(engine.rapport() <= 100);
    assert!(engine.score() >= previous_score);
    assert!(engine.stage_index() >= previous_stage);
    if engine.stage_count() > 0 {
        assert!(engine.stage_index() < engine.stage_count());
    }
    for (i, message) in engine.transcript().iter().enumerate() {
        let expected = if i % 2 == 0 {
            Sender::Persona
        } else {
            Sender::Player
        };
        assert_eq!(message.sender, expected, "transcript out of order at {}", i);
    }
}

struct FailingGenerator;

#[async_trait]
impl DialogueGenerator for FailingGenerator {
    async fn generate(&self, _context: &TurnContext) -> DialogueResult<DialogueReply> {
        Err(DialogueError::Api {
            status: 502,
            message: "bad gateway".to_string(),
        })
    }
}

#[cfg(test)]
mod scenario_tests {
    use super::*;

    #[test]
    fn test_optimal_choice_from_cold_baseline() {
        let engine = start(TrackConfig::cold_outreach(), 3);
        assert_eq!(engine.rapport(), 20);

        let engine = answer(engine, option(ResponseQuality::Optimal, 10, 80));

        assert_eq!(engine.rapport(), 30);
        assert_eq!(engine.score(), 80);
        assert_eq!(engine.stage_index(), 1);
    }

    #[test]
    fn test_timeout_on_middle_stage_never_closes() {
        let mut track = TrackConfig::sdr();
        track.duration_secs = 10;
        let mut engine = start(track, 3);
        engine = answer(engine, option(ResponseQuality::Optimal, 15, 100));
        assert_eq!(engine.stage_index(), 1);

        let mut finalized = Vec::new();
        for _ in 0..10 {
            let (next, transition) = engine.apply(GameEvent::Tick);
            engine = next;
            finalized.extend(transition.effects().iter().filter_map(|e| match e {
                Effect::FinalizeSession { outcome, .. } => Some(outcome.clone()),
                _ => None,
            }));
        }

        assert_eq!(engine.phase(), GamePhase::Results);
        assert_eq!(finalized.len(), 1);
        let outcome = &finalized[0];
        assert_eq!(outcome.end_reason, EndReason::TimedOut);
        assert!(!outcome.commitment);
        assert_eq!(outcome.score, 100);
        assert_eq!(outcome.rapport, 55);
    }

    #[test]
    fn test_poor_final_choice_at_high_rapport() {
        let mut track = TrackConfig::closer();
        track.baseline_rapport = 90;
        let engine = start(track, 1);

        let engine = answer(engine, option(ResponseQuality::Poor, 0, 0));

        assert_eq!(engine.phase(), GamePhase::Results);
        assert_eq!(engine.rapport(), 90);
        assert!(!engine.commitment());
    }

    #[tokio::test]
    async fn test_failing_gateway_keeps_engine_playable() {
        let track = TrackConfig::sdr();
        let fallback = track.fallback.clone();
        let gateway = DialogueGateway::new(Arc::new(FailingGenerator));
        let mut engine = GameEngine::new(Arc::new(track), None);
        engine.handle(GameEvent::CatalogLoaded {
            channel: None,
            catalog: catalog("sdr", 2),
        });

        let transition = engine.handle(GameEvent::StartGame {
            persona_id: "p-1".to_string(),
            script_id: None,
        });
        let (ticket, context) = transition
            .effects()
            .iter()
            .find_map(|e| match e {
                Effect::RequestTurn { ticket, context } => Some((*ticket, context.clone())),
                _ => None,
            })
            .unwrap();

        let reply = gateway.request_turn(&context, &fallback).await;
        assert!(!reply.options.is_empty());
        engine.handle(GameEvent::TurnResolved { ticket, reply });

        assert!(!engine.is_generating());
        assert!(!engine.options().is_empty());
        assert!(engine.handle(GameEvent::ChooseOption(0)).is_applied());
    }
}

#[cfg(test)]
mod invariant_tests {
    use super::*;

    /// Options cycling through extreme impacts and every quality.
    fn choices() -> Vec<ResponseOption> {
        vec![
            option(ResponseQuality::Optimal, 15, 100),
            option(ResponseQuality::Poor, -15, 0),
            option(ResponseQuality::Good, 7, 55),
            option(ResponseQuality::Poor, -15, 3),
            option(ResponseQuality::Optimal, 15, 90),
        ]
    }

    #[test]
    fn test_invariants_hold_for_every_event() {
        for baseline in [0u8, 20, 50, 100] {
            for stages in 1..=5 {
                let mut track = TrackConfig::sdr();
                track.baseline_rapport = baseline;
                track.duration_secs = 4;
                let mut engine = start(track, stages);
                let mut finalizes = 0;

                for (step, choice) in choices().into_iter().cycle().take(12).enumerate() {
                    let score = engine.score();
                    let stage = engine.stage_index();

                    let events = if engine.is_generating() {
                        vec![GameEvent::TurnResolved {
                            ticket: ticket(&engine),
                            reply: reply(vec![choice]),
                        }]
                    } else {
                        vec![GameEvent::ChooseOption(0)]
                    };
                    let events = if step % 3 == 2 {
                        [events, vec![GameEvent::Tick]].concat()
                    } else {
                        events
                    };

                    for event in events {
                        let (next, transition) = engine.apply(event);
                        engine = next;
                        finalizes += transition
                            .effects()
                            .iter()
                            .filter(|e| matches!(e, Effect::FinalizeSession { .. }))
                            .count();
                        assert_invariants(&engine, score, stage);
                    }

                    if engine.phase() == GamePhase::Results {
                        break;
                    }
                }

                assert!(finalizes <= 1);
                if engine.phase() == GamePhase::Results {
                    assert_eq!(finalizes, 1);
                }
            }
        }
    }

    #[test]
    fn test_ticks_outside_playing_change_nothing() {
        let engine = GameEngine::new(Arc::new(TrackConfig::cold_outreach()), None);
        let (engine, transition) = engine.apply(GameEvent::Tick);
        assert!(!transition.is_applied());
        assert_eq!(engine.time_left(), 180);
        assert_eq!(engine.time_spent(), 0);
    }

    #[test]
    fn test_stale_reply_after_results_is_ignored() {
        let mut track = TrackConfig::sdr();
        track.duration_secs = 1;
        let engine = start(track, 3);
        let outstanding = ticket(&engine);
        let (engine, _) = engine.apply(GameEvent::Tick);
        assert_eq!(engine.phase(), GamePhase::Results);

        let (engine, transition) = engine.apply(GameEvent::TurnResolved {
            ticket: outstanding,
            reply: reply(vec![option(ResponseQuality::Good, 5, 50)]),
        });

        assert!(!transition.is_applied());
        assert!(engine.transcript().is_empty());
        assert!(engine.options().is_empty());
    }
}

//! The turn engine: a pure state machine for one training game.
//!
//! [`GameEngine`] never performs I/O. Every input is a [`GameEvent`]; every
//! request for outside work (dialogue generation, persistence, timers) comes
//! back as an [`Effect`] for the controller to carry out. Inputs that are not
//! valid in the current state are answered with [`Transition::Ignored`] and
//! leave the state untouched.
//!
//! # Phases
//!
//! ```text
//! channel_select ──SelectChannel──▶ persona_select ──StartGame──▶ playing ──▶ results
//!        ▲                                ▲                                       │
//!        └────────────── Reset (channel-sensitive) ─┴── Reset ────────────────────┘
//! ```
//!
//! # Turn tickets
//!
//! Each dialogue request carries a [`TurnTicket`] made of the play-through id
//! and a turn counter that only grows. A [`GameEvent::TurnResolved`] is
//! applied only when its ticket is the one outstanding, so a late reply after
//! a timeout, a reset, or a newer request is dropped.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::summary::ResultsSummary;
use super::timer::Countdown;
use super::types::{
    ChatMessage, EndReason, Feedback, GamePhase, SkillScore, StagePerformance,
};
use crate::catalog::{Catalog, Channel, Persona, Script, Stage};
use crate::dialogue::{DialogueReply, ResponseOption, ResponseQuality, TurnContext};
use crate::tracks::TrackConfig;

/// Identifies one outstanding dialogue request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TurnTicket {
    /// Play-through the request belongs to.
    pub play_id: Uuid,
    /// Turn counter at the time of the request.
    pub turn: u64,
}

/// Inputs to the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum GameEvent {
    /// Catalog data arrived for the given channel (or none).
    CatalogLoaded {
        channel: Option<Channel>,
        catalog: Catalog,
    },
    /// Player picked an outreach channel.
    SelectChannel(Channel),
    /// Player picked a persona and optionally an opening script.
    StartGame {
        persona_id: String,
        script_id: Option<String>,
    },
    /// The session record for a play-through was created.
    SessionOpened { play_id: Uuid, session_id: String },
    /// A dialogue request completed.
    TurnResolved {
        ticket: TurnTicket,
        reply: DialogueReply,
    },
    /// Player chose the option at this index.
    ChooseOption(usize),
    /// One second elapsed.
    Tick,
    /// The feedback with this sequence number expired.
    ClearFeedback { seq: u64 },
    /// Return to the selection screens.
    Reset,
}

impl GameEvent {
    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            GameEvent::CatalogLoaded { .. } => "catalog_loaded",
            GameEvent::SelectChannel(_) => "select_channel",
            GameEvent::StartGame { .. } => "start_game",
            GameEvent::SessionOpened { .. } => "session_opened",
            GameEvent::TurnResolved { .. } => "turn_resolved",
            GameEvent::ChooseOption(_) => "choose_option",
            GameEvent::Tick => "tick",
            GameEvent::ClearFeedback { .. } => "clear_feedback",
            GameEvent::Reset => "reset",
        }
    }
}

/// Final aggregate handed to the session recorder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionOutcome {
    /// How the game ended.
    pub end_reason: EndReason,
    /// Total score.
    pub score: u32,
    /// Rapport at the end, 0..=100.
    pub rapport: u8,
    /// Whether the persona committed to a next step.
    pub commitment: bool,
    /// Seconds played.
    pub time_spent: u32,
    /// Per-skill accumulators.
    pub skills: Vec<SkillScore>,
    /// One entry per answered stage.
    pub stage_performance: Vec<StagePerformance>,
    /// Full conversation.
    pub transcript: Vec<ChatMessage>,
}

/// Work the controller must perform on the engine's behalf.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Load the catalog for the track, filtered by channel.
    LoadCatalog { channel: Option<Channel> },
    /// Start the one-second ticker.
    StartTimer,
    /// Stop the ticker.
    StopTimer,
    /// Open the session record. Must complete before the next `RequestTurn`.
    OpenSession {
        play_id: Uuid,
        user_id: Option<String>,
        persona_id: String,
        track_key: String,
    },
    /// Ask the dialogue gateway for the next persona turn.
    RequestTurn {
        ticket: TurnTicket,
        context: Box<TurnContext>,
    },
    /// Send `ClearFeedback { seq }` after `after`.
    ScheduleFeedbackClear { seq: u64, after: Duration },
    /// Persist the final aggregate. `session_id` is `None` when no record was opened.
    FinalizeSession {
        session_id: Option<String>,
        outcome: Box<SessionOutcome>,
    },
}

/// Why an event was not applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IgnoreReason {
    /// The event is not valid in this phase.
    WrongPhase {
        phase: GamePhase,
        event: &'static str,
    },
    /// The track has no channel dimension.
    NotChannelSensitive,
    /// No persona with this id in the catalog.
    UnknownPersona(String),
    /// No script with this id in the catalog.
    UnknownScript(String),
    /// The catalog has no stages to play.
    NoStages,
    /// A dialogue request is still outstanding.
    TurnInFlight,
    /// No persona is active.
    NoActivePersona,
    /// The option index is out of range.
    UnknownOption { index: usize, available: usize },
    /// The dialogue reply belongs to a superseded request.
    StaleTurn,
    /// The catalog was loaded for a different channel.
    StaleCatalog,
    /// The session record belongs to another play-through.
    StaleSession,
    /// The feedback was already replaced or cleared.
    StaleFeedback,
}

/// Result of applying one event.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// State changed; perform these effects in order.
    Applied(Vec<Effect>),
    /// State unchanged.
    Ignored(IgnoreReason),
}

impl Transition {
    /// True when the event changed the state.
    pub fn is_applied(&self) -> bool {
        matches!(self, Transition::Applied(_))
    }

    /// Effects to perform; empty when ignored.
    pub fn effects(&self) -> &[Effect] {
        match self {
            Transition::Applied(effects) => effects,
            Transition::Ignored(_) => &[],
        }
    }

    /// The ignore reason, if any.
    pub fn ignored(&self) -> Option<&IgnoreReason> {
        match self {
            Transition::Applied(_) => None,
            Transition::Ignored(reason) => Some(reason),
        }
    }
}

/// State of one game for one player on one track.
#[derive(Debug, Clone)]
pub struct GameEngine {
    track: Arc<TrackConfig>,
    user_id: Option<String>,
    phase: GamePhase,
    channel: Option<Channel>,
    catalog: Catalog,

    persona: Option<Persona>,
    script: Option<Script>,
    play_id: Option<Uuid>,
    session_id: Option<String>,

    stage_index: usize,
    transcript: Vec<ChatMessage>,
    rapport: u8,
    score: u32,
    skills: Vec<SkillScore>,
    stage_performance: Vec<StagePerformance>,
    optimal_choices: u32,

    options: Vec<ResponseOption>,
    hint: Option<String>,
    pending: Option<TurnTicket>,
    turn: u64,

    countdown: Countdown,
    commitment: bool,
    feedback: Option<Feedback>,
    feedback_seq: u64,
    end_reason: Option<EndReason>,
    finalized: bool,
    /// Last play-through that finished before its session record was opened.
    unrecorded: Option<(Uuid, SessionOutcome)>,
}

impl GameEngine {
    /// Create an engine in the track's first selection phase.
    pub fn new(track: Arc<TrackConfig>, user_id: Option<String>) -> Self {
        let phase = initial_phase(&track);
        Self {
            user_id,
            phase,
            channel: None,
            catalog: Catalog::default(),
            persona: None,
            script: None,
            play_id: None,
            session_id: None,
            stage_index: 0,
            transcript: Vec::new(),
            rapport: track.baseline_rapport.min(100),
            score: 0,
            skills: Vec::new(),
            stage_performance: Vec::new(),
            optimal_choices: 0,
            options: Vec::new(),
            hint: None,
            pending: None,
            turn: 0,
            countdown: Countdown::new(track.duration_secs),
            commitment: false,
            feedback: None,
            feedback_seq: 0,
            end_reason: None,
            finalized: false,
            unrecorded: None,
            track,
        }
    }

    /// Pure transition: consume the state and an event, return the next state.
    pub fn apply(mut self, event: GameEvent) -> (Self, Transition) {
        let transition = self.handle(event);
        (self, transition)
    }

    /// In-place form of [`GameEngine::apply`].
    pub fn handle(&mut self, event: GameEvent) -> Transition {
        match event {
            GameEvent::CatalogLoaded { channel, catalog } => {
                self.on_catalog_loaded(channel, catalog)
            }
            GameEvent::SelectChannel(channel) => self.on_select_channel(channel),
            GameEvent::StartGame {
                persona_id,
                script_id,
            } => self.on_start_game(&persona_id, script_id.as_deref()),
            GameEvent::SessionOpened {
                play_id,
                session_id,
            } => self.on_session_opened(play_id, session_id),
            GameEvent::TurnResolved { ticket, reply } => self.on_turn_resolved(ticket, reply),
            GameEvent::ChooseOption(index) => self.on_choose_option(index),
            GameEvent::Tick => self.on_tick(),
            GameEvent::ClearFeedback { seq } => self.on_clear_feedback(seq),
            GameEvent::Reset => self.on_reset(),
        }
    }

    fn on_catalog_loaded(&mut self, channel: Option<Channel>, catalog: Catalog) -> Transition {
        if !matches!(self.phase, GamePhase::ChannelSelect | GamePhase::PersonaSelect) {
            return self.wrong_phase("catalog_loaded");
        }
        if channel != self.channel {
            return Transition::Ignored(IgnoreReason::StaleCatalog);
        }

        self.catalog = catalog;
        Transition::Applied(Vec::new())
    }

    fn on_select_channel(&mut self, channel: Channel) -> Transition {
        if !self.track.channel_sensitive {
            return Transition::Ignored(IgnoreReason::NotChannelSensitive);
        }
        if self.phase != GamePhase::ChannelSelect {
            return self.wrong_phase("select_channel");
        }

        self.channel = Some(channel);
        self.catalog = Catalog::default();
        self.phase = GamePhase::PersonaSelect;
        Transition::Applied(vec![Effect::LoadCatalog {
            channel: Some(channel),
        }])
    }

    fn on_start_game(&mut self, persona_id: &str, script_id: Option<&str>) -> Transition {
        if self.phase != GamePhase::PersonaSelect {
            return self.wrong_phase("start_game");
        }
        let Some(persona) = self.catalog.persona(persona_id).cloned() else {
            return Transition::Ignored(IgnoreReason::UnknownPersona(persona_id.to_string()));
        };
        let script = match script_id {
            Some(id) => match self.catalog.script(id) {
                Some(script) => Some(script.clone()),
                None => return Transition::Ignored(IgnoreReason::UnknownScript(id.to_string())),
            },
            None => None,
        };
        if self.catalog.stages.is_empty() {
            return Transition::Ignored(IgnoreReason::NoStages);
        }

        let play_id = Uuid::new_v4();
        self.clear_session();
        self.play_id = Some(play_id);
        self.persona = Some(persona.clone());
        self.script = script;
        self.skills = self.track.skills.iter().map(SkillScore::new).collect();
        self.phase = GamePhase::Playing;

        let mut effects = vec![
            Effect::StartTimer,
            Effect::OpenSession {
                play_id,
                user_id: self.user_id.clone(),
                persona_id: persona.id,
                track_key: self.track.key.clone(),
            },
        ];
        effects.extend(self.request_turn(None));
        Transition::Applied(effects)
    }

    fn on_session_opened(&mut self, play_id: Uuid, session_id: String) -> Transition {
        // The play-through already ended without a record, possibly followed
        // by a reset or a new game. Close the record from its own outcome.
        match self.unrecorded.take() {
            Some((id, outcome)) if id == play_id => {
                if self.play_id == Some(play_id) {
                    self.session_id = Some(session_id.clone());
                }
                return Transition::Applied(vec![Effect::FinalizeSession {
                    session_id: Some(session_id),
                    outcome: Box::new(outcome),
                }]);
            }
            other => self.unrecorded = other,
        }

        if self.play_id != Some(play_id) || self.session_id.is_some() || self.finalized {
            return Transition::Ignored(IgnoreReason::StaleSession);
        }

        self.session_id = Some(session_id);
        Transition::Applied(Vec::new())
    }

    fn on_turn_resolved(&mut self, ticket: TurnTicket, reply: DialogueReply) -> Transition {
        if self.phase != GamePhase::Playing || self.pending != Some(ticket) {
            return Transition::Ignored(IgnoreReason::StaleTurn);
        }

        let reply = reply.sanitized();
        self.pending = None;
        self.transcript.push(ChatMessage::persona(reply.utterance));
        self.options = if reply.options.is_empty() {
            self.track.fallback.options.clone()
        } else {
            reply.options
        };
        self.hint = reply.hint;
        Transition::Applied(Vec::new())
    }

    fn on_choose_option(&mut self, index: usize) -> Transition {
        if self.phase != GamePhase::Playing {
            return self.wrong_phase("choose_option");
        }
        if self.pending.is_some() {
            return Transition::Ignored(IgnoreReason::TurnInFlight);
        }
        if self.persona.is_none() {
            return Transition::Ignored(IgnoreReason::NoActivePersona);
        }
        let Some(option) = self.options.get(index).cloned() else {
            return Transition::Ignored(IgnoreReason::UnknownOption {
                index,
                available: self.options.len(),
            });
        };
        let Some(stage_key) = self.current_stage().map(|s| s.key.clone()) else {
            return Transition::Ignored(IgnoreReason::NoStages);
        };

        self.transcript.push(ChatMessage::player(option.text.clone()));
        self.rapport = clamp_rapport(i32::from(self.rapport).saturating_add(option.rapport_impact));
        self.score = self.score.saturating_add(option.score_value);
        if let Some(skill) = option.skill.as_deref() {
            if let Some(acc) = self.skills.iter_mut().find(|s| s.skill == skill) {
                acc.add(option.score_value);
            }
        }
        self.stage_performance.push(StagePerformance {
            stage_key,
            score: option.score_value,
            rapport_gained: option.rapport_impact,
        });
        if option.quality == ResponseQuality::Optimal {
            self.optimal_choices += 1;
        }
        self.options.clear();
        self.hint = None;

        self.feedback_seq += 1;
        self.feedback = Some(Feedback {
            seq: self.feedback_seq,
            text: option.feedback.clone(),
            optimal: option.quality == ResponseQuality::Optimal,
        });
        let mut effects = vec![Effect::ScheduleFeedbackClear {
            seq: self.feedback_seq,
            after: self.track.feedback_display(),
        }];

        if self.stage_index + 1 < self.catalog.stages.len() {
            self.stage_index += 1;
            effects.extend(self.request_turn(Some(option.text)));
        } else {
            self.commitment = option.quality != ResponseQuality::Poor
                && self.rapport >= self.track.commitment_threshold;
            effects.extend(self.finish(EndReason::Completed));
        }

        Transition::Applied(effects)
    }

    fn on_tick(&mut self) -> Transition {
        if self.phase != GamePhase::Playing {
            return self.wrong_phase("tick");
        }

        if self.countdown.tick() {
            Transition::Applied(self.finish(EndReason::TimedOut))
        } else {
            Transition::Applied(Vec::new())
        }
    }

    fn on_clear_feedback(&mut self, seq: u64) -> Transition {
        match &self.feedback {
            Some(feedback) if feedback.seq == seq => {
                self.feedback = None;
                Transition::Applied(Vec::new())
            }
            _ => Transition::Ignored(IgnoreReason::StaleFeedback),
        }
    }

    fn on_reset(&mut self) -> Transition {
        if self.phase == GamePhase::Playing {
            return self.wrong_phase("reset");
        }

        self.clear_session();
        self.play_id = None;
        self.session_id = None;
        self.persona = None;
        self.script = None;
        self.phase = initial_phase(&self.track);
        if self.track.channel_sensitive {
            self.channel = None;
            self.catalog = Catalog::default();
        }
        Transition::Applied(Vec::new())
    }

    /// Issue the next dialogue request for the current stage.
    fn request_turn(&mut self, player_response: Option<String>) -> Option<Effect> {
        let play_id = self.play_id?;
        let persona = self.persona.clone()?;
        let stage = self.current_stage()?.clone();

        self.turn += 1;
        let ticket = TurnTicket {
            play_id,
            turn: self.turn,
        };
        self.pending = Some(ticket);

        Some(Effect::RequestTurn {
            ticket,
            context: Box::new(TurnContext {
                persona,
                stage,
                track_key: self.track.key.clone(),
                channel: self.channel,
                conversation_history: self.transcript.clone(),
                player_response,
                rapport: self.rapport,
                is_cold_outreach: self.track.cold_outreach,
                script: self.script.clone(),
            }),
        })
    }

    /// Enter `results`. Emits the finalize effect at most once per play-through.
    fn finish(&mut self, reason: EndReason) -> Vec<Effect> {
        self.phase = GamePhase::Results;
        self.end_reason = Some(reason);
        self.pending = None;
        self.options.clear();
        self.hint = None;

        let mut effects = vec![Effect::StopTimer];
        if !self.finalized {
            self.finalized = true;
            let outcome = self.outcome();
            if let (None, Some(play_id)) = (&self.session_id, self.play_id) {
                self.unrecorded = Some((play_id, outcome.clone()));
            }
            effects.push(Effect::FinalizeSession {
                session_id: self.session_id.clone(),
                outcome: Box::new(outcome),
            });
        }
        effects
    }

    fn clear_session(&mut self) {
        self.stage_index = 0;
        self.transcript.clear();
        self.rapport = self.track.baseline_rapport.min(100);
        self.score = 0;
        self.skills.clear();
        self.stage_performance.clear();
        self.optimal_choices = 0;
        self.options.clear();
        self.hint = None;
        self.pending = None;
        self.countdown = Countdown::new(self.track.duration_secs);
        self.commitment = false;
        self.feedback = None;
        self.end_reason = None;
        self.finalized = false;
    }

    fn wrong_phase(&self, event: &'static str) -> Transition {
        Transition::Ignored(IgnoreReason::WrongPhase {
            phase: self.phase,
            event,
        })
    }

    /// Snapshot of the aggregate as it stands.
    pub fn outcome(&self) -> SessionOutcome {
        SessionOutcome {
            end_reason: self.end_reason.unwrap_or(EndReason::Completed),
            score: self.score,
            rapport: self.rapport,
            commitment: self.commitment,
            time_spent: self.countdown.time_spent,
            skills: self.skills.clone(),
            stage_performance: self.stage_performance.clone(),
            transcript: self.transcript.clone(),
        }
    }

    /// Post-game analysis; `None` until the game reaches `results`.
    pub fn summary(&self) -> Option<ResultsSummary> {
        if self.phase != GamePhase::Results {
            return None;
        }
        Some(ResultsSummary::new(
            &self.stage_performance,
            &self.skills,
            self.optimal_choices,
        ))
    }

    /// Track this engine plays.
    pub fn track(&self) -> &TrackConfig {
        &self.track
    }

    /// Signed-in player, if any.
    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    /// Current phase.
    pub fn phase(&self) -> GamePhase {
        self.phase
    }

    /// Selected outreach channel.
    pub fn channel(&self) -> Option<Channel> {
        self.channel
    }

    /// Catalog loaded for the current track and channel.
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Persona being played against.
    pub fn persona(&self) -> Option<&Persona> {
        self.persona.as_ref()
    }

    /// Opening script, if one was picked.
    pub fn script(&self) -> Option<&Script> {
        self.script.as_ref()
    }

    /// Id of the current play-through.
    pub fn play_id(&self) -> Option<Uuid> {
        self.play_id
    }

    /// Session record id, once opened.
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// Index of the current stage.
    pub fn stage_index(&self) -> usize {
        self.stage_index
    }

    /// Stage currently being played.
    pub fn current_stage(&self) -> Option<&Stage> {
        self.catalog.stages.get(self.stage_index)
    }

    /// Number of stages in the catalog.
    pub fn stage_count(&self) -> usize {
        self.catalog.stages.len()
    }

    /// Conversation so far.
    pub fn transcript(&self) -> &[ChatMessage] {
        &self.transcript
    }

    /// Current rapport, 0..=100.
    pub fn rapport(&self) -> u8 {
        self.rapport
    }

    /// Total score so far.
    pub fn score(&self) -> u32 {
        self.score
    }

    /// Per-skill accumulators.
    pub fn skills(&self) -> &[SkillScore] {
        &self.skills
    }

    /// Answered stages in order.
    pub fn stage_performance(&self) -> &[StagePerformance] {
        &self.stage_performance
    }

    /// Options offered for the current turn; empty while generating.
    pub fn options(&self) -> &[ResponseOption] {
        &self.options
    }

    /// Coaching hint for the current turn.
    pub fn hint(&self) -> Option<&str> {
        self.hint.as_deref()
    }

    /// True while a dialogue request is outstanding.
    pub fn is_generating(&self) -> bool {
        self.pending.is_some()
    }

    /// Ticket of the outstanding dialogue request.
    pub fn pending_ticket(&self) -> Option<TurnTicket> {
        self.pending
    }

    /// Seconds remaining.
    pub fn time_left(&self) -> u32 {
        self.countdown.time_left
    }

    /// Seconds played.
    pub fn time_spent(&self) -> u32 {
        self.countdown.time_spent
    }

    /// True when the persona committed to a next step.
    pub fn commitment(&self) -> bool {
        self.commitment
    }

    /// Feedback for the last choice, until it expires.
    pub fn feedback(&self) -> Option<&Feedback> {
        self.feedback.as_ref()
    }

    /// How the game ended; `None` before `results`.
    pub fn end_reason(&self) -> Option<EndReason> {
        self.end_reason
    }
}

fn initial_phase(track: &TrackConfig) -> GamePhase {
    if track.channel_sensitive {
        GamePhase::ChannelSelect
    } else {
        GamePhase::PersonaSelect
    }
}

fn clamp_rapport(value: i32) -> u8 {
    // Bounded to 0..=100, so the conversion cannot fail.
    u8::try_from(value.clamp(0, 100)).unwrap_or(100)
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod engine_tests;

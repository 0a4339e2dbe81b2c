//! The game: turn engine, session clock, and the controller that drives them.
//!
//! [`GameEngine`] is the pure state machine; [`GameController`] is the
//! imperative shell a caller uses. Everything the presentation layer needs is
//! published as a [`GameView`].

mod controller;
mod engine;
mod summary;
mod timer;
mod types;
mod view;

pub use controller::GameController;
pub use engine::{
    Effect, GameEngine, GameEvent, IgnoreReason, SessionOutcome, Transition, TurnTicket,
};
pub use summary::ResultsSummary;
pub use timer::{Countdown, SessionTimer, TICK_PERIOD};
pub use types::{
    ChatMessage, EndReason, Feedback, GamePhase, Sender, SkillScore, StagePerformance,
};
pub use view::GameView;

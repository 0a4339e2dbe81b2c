//! # Rapport Trainer
//!
//! Conversation simulation engine for sales role-play training. A player talks
//! to a synthetic prospect through an ordered set of stages, picking one of
//! several pre-scored responses each turn, while the engine tracks rapport,
//! score, per-skill sub-scores and a session clock.
//!
//! ## Features
//!
//! - **Turn Engine**: pure state machine with explicit events and effects
//! - **Dialogue Gateway**: LLM pipe client with deterministic fallback content
//! - **Session Timer**: one-second countdown that ends the game on timeout
//! - **Session Recorder**: opens and finalizes persisted game sessions
//! - **Tracks**: SDR prospecting, closer negotiation, and channel-aware cold outreach
//!
//! ## Architecture
//!
//! ```text
//! Caller → GameController → GameEngine (pure)
//!               ↓      ↓
//!   Dialogue pipe (HTTP)   SQLite (catalog + sessions)
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use rapport_trainer::{Config, GameController, TrackRegistry};
//! use rapport_trainer::dialogue::DialogueClient;
//! use rapport_trainer::storage::SqliteStorage;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env()?;
//!     let storage = Arc::new(SqliteStorage::new(&config.database).await?);
//!     let client = Arc::new(DialogueClient::new(&config.dialogue, config.request.clone())?);
//!     let tracks = TrackRegistry::with_config(&config.game);
//!     let track = tracks.get("sdr").cloned().ok_or("unknown track")?;
//!
//!     let game = GameController::new(track, Some("user-1".into()), client, storage);
//!     game.mount().await;
//!     game.start_game("persona-id", None).await;
//!     game.handle_response(0).await;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]

/// Catalog data (stages, personas, scripts) and its loader.
pub mod catalog;
/// Configuration management.
pub mod config;
/// Dialogue generator contract, pipe client and fallback content.
pub mod dialogue;
/// Error types and result aliases for the application.
pub mod error;
/// Turn engine, session timer and game controller.
pub mod game;
/// Tracing subscriber setup.
pub mod logging;
/// System prompts for the dialogue pipe.
pub mod prompts;
/// Session recorder for persisted game sessions.
pub mod recorder;
/// SQLite storage layer for persistence.
pub mod storage;
/// Built-in training tracks and their tuning.
pub mod tracks;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use game::{GameController, GameEngine, GameEvent, GameView, Transition};
pub use recorder::SessionRecorder;
pub use tracks::{TrackConfig, TrackRegistry};

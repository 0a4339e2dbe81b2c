//! Storage layer for catalog data and game session records.
//!
//! This module defines the [`Storage`] trait consumed by the catalog loader
//! and the session recorder, the persisted [`GameSession`] aggregate, and the
//! versioned snapshot documents stored inside it.

mod sqlite;


pub use sqlite::SqliteStorage;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::catalog::{Channel, Persona, Script, Stage};
use crate::error::StorageResult;
use crate::game::{ChatMessage, SkillScore, StagePerformance};

/// Schema version written into every session snapshot.
pub const SNAPSHOT_VERSION: u32 = 1;

/// A versioned, explicitly typed JSON document stored on a session row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot<T> {
    /// Schema version of `entries`.
    pub version: u32,
    /// Snapshot contents, in order.
    pub entries: Vec<T>,
}

impl<T> SessionSnapshot<T> {
    /// Wrap entries with the current schema version.
    pub fn new(entries: Vec<T>) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            entries,
        }
    }
}

/// The persisted record of one play-through.
///
/// Opened at game start with only the identifying columns set; the aggregate
/// columns are filled exactly once when the game ends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameSession {
    /// Unique session identifier.
    pub id: String,
    /// Player identity.
    pub user_id: String,
    /// Persona played against.
    pub persona_id: String,
    /// Training track.
    pub track_key: String,
    /// When the game entered `playing`.
    pub started_at: DateTime<Utc>,
    /// When the game entered `results`. `None` while open.
    pub completed_at: Option<DateTime<Utc>>,
    pub total_score: u32,
    pub final_rapport: u8,
    /// Whether the persona committed to a next step.
    pub sale_closed: bool,
    pub time_spent_seconds: u32,
    pub skills_measured: Option<SessionSnapshot<SkillScore>>,
    pub stage_performance: Option<SessionSnapshot<StagePerformance>>,
    pub conversation_history: Option<SessionSnapshot<ChatMessage>>,
}

impl GameSession {
    /// Create an open session record
    pub fn open(
        user_id: impl Into<String>,
        persona_id: impl Into<String>,
        track_key: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            persona_id: persona_id.into(),
            track_key: track_key.into(),
            started_at: Utc::now(),
            completed_at: None,
            total_score: 0,
            final_rapport: 0,
            sale_closed: false,
            time_spent_seconds: 0,
            skills_measured: None,
            stage_performance: None,
            conversation_history: None,
        }
    }

    /// True once the final aggregate has been written.
    pub fn is_completed(&self) -> bool {
        self.completed_at.is_some()
    }
}

/// Final aggregate written when a session closes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionCompletion {
    pub completed_at: DateTime<Utc>,
    pub total_score: u32,
    pub final_rapport: u8,
    pub sale_closed: bool,
    pub time_spent_seconds: u32,
    pub skills_measured: SessionSnapshot<SkillScore>,
    pub stage_performance: SessionSnapshot<StagePerformance>,
    pub conversation_history: SessionSnapshot<ChatMessage>,
}

/// Storage backend trait.
///
/// Catalog reads filter to active rows of a track; when a channel is given,
/// rows bound to a different channel are excluded.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Storage: Send + Sync {
    // Catalog reads

    /// List stages of a track.
    async fn list_stages(&self, track_key: &str, channel: Option<Channel>)
        -> StorageResult<Vec<Stage>>;
    /// List active personas of a track.
    async fn list_personas(
        &self,
        track_key: &str,
        channel: Option<Channel>,
    ) -> StorageResult<Vec<Persona>>;
    /// List active opening scripts of a track.
    async fn list_scripts(
        &self,
        track_key: &str,
        channel: Option<Channel>,
    ) -> StorageResult<Vec<Script>>;

    // Catalog writes

    /// Insert a stage.
    async fn create_stage(&self, stage: &Stage) -> StorageResult<()>;
    /// Insert a persona.
    async fn create_persona(&self, persona: &Persona) -> StorageResult<()>;
    /// Insert a script.
    async fn create_script(&self, script: &Script) -> StorageResult<()>;

    // Game sessions

    /// Insert an open session record.
    async fn create_game_session(&self, session: &GameSession) -> StorageResult<()>;
    /// Write the final aggregate of an open session.
    async fn complete_game_session(
        &self,
        id: &str,
        completion: &SessionCompletion,
    ) -> StorageResult<()>;
    /// Get a session by ID.
    async fn get_game_session(&self, id: &str) -> StorageResult<Option<GameSession>>;
    /// List a user's sessions, most recent first.
    async fn list_user_sessions(&self, user_id: &str, limit: u32)
        -> StorageResult<Vec<GameSession>>;
}

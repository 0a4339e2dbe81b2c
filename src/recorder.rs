//! Session recorder: the only writer of persisted game sessions.
//!
//! A record is opened when a game enters `playing` and finalized once when it
//! reaches `results`. Persistence failures are logged and never interrupt
//! play; the game simply proceeds without a record.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::error::StorageResult;
use crate::game::SessionOutcome;
use crate::storage::{GameSession, SessionCompletion, SessionSnapshot, Storage};

/// Opens and finalizes game session records.
#[derive(Clone)]
pub struct SessionRecorder {
    storage: Arc<dyn Storage>,
}

impl SessionRecorder {
    /// Create a recorder backed by the given store.
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Open a record for a play-through.
    ///
    /// Returns `None` without touching storage when there is no identity, and
    /// `None` with a warning when the insert fails.
    pub async fn open(
        &self,
        user_id: Option<&str>,
        persona_id: &str,
        track_key: &str,
    ) -> Option<String> {
        let Some(user_id) = user_id else {
            debug!(track = %track_key, "No player identity, session will not be recorded");
            return None;
        };

        let session = GameSession::open(user_id, persona_id, track_key);
        match self.storage.create_game_session(&session).await {
            Ok(()) => {
                info!(
                    session_id = %session.id,
                    user_id = %user_id,
                    persona_id = %persona_id,
                    track = %track_key,
                    "Game session opened"
                );
                Some(session.id)
            }
            Err(e) => {
                warn!(
                    user_id = %user_id,
                    track = %track_key,
                    error = %e,
                    "Failed to open game session, continuing without a record"
                );
                None
            }
        }
    }

    /// Write the final aggregate. No-op without a session id.
    pub async fn finalize(&self, session_id: Option<&str>, outcome: &SessionOutcome) {
        let Some(session_id) = session_id else {
            debug!("No open session record, skipping finalize");
            return;
        };

        let completion = SessionCompletion {
            completed_at: Utc::now(),
            total_score: outcome.score,
            final_rapport: outcome.rapport,
            sale_closed: outcome.commitment,
            time_spent_seconds: outcome.time_spent,
            skills_measured: SessionSnapshot::new(outcome.skills.clone()),
            stage_performance: SessionSnapshot::new(outcome.stage_performance.clone()),
            conversation_history: SessionSnapshot::new(outcome.transcript.clone()),
        };

        match self
            .storage
            .complete_game_session(session_id, &completion)
            .await
        {
            Ok(()) => info!(
                session_id = %session_id,
                score = outcome.score,
                rapport = outcome.rapport,
                sale_closed = outcome.commitment,
                end_reason = ?outcome.end_reason,
                "Game session finalized"
            ),
            Err(e) => error!(
                session_id = %session_id,
                error = %e,
                "Failed to finalize game session"
            ),
        }
    }

    /// Load one session record.
    pub async fn get(&self, session_id: &str) -> StorageResult<Option<GameSession>> {
        self.storage.get_game_session(session_id).await
    }

    /// A player's most recent sessions, newest first.
    pub async fn history(&self, user_id: &str, limit: u32) -> StorageResult<Vec<GameSession>> {
        self.storage.list_user_sessions(user_id, limit).await
    }
}

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::migrate::Migrator;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use tracing::{info, warn};

use super::{GameSession, SessionCompletion, Storage};
use crate::catalog::{Channel, Difficulty, Persona, Script, Stage};
use crate::config::DatabaseConfig;
use crate::error::{StorageError, StorageResult};

/// Static migrator that embeds migrations at compile time
static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// SQLite-backed storage implementation
#[derive(Clone)]
pub struct SqliteStorage {
    pool: SqlitePool,
}

impl SqliteStorage {
    /// Create a new SQLite storage instance
    pub async fn new(config: &DatabaseConfig) -> StorageResult<Self> {
        // Ensure parent directory exists
        if let Some(parent) = config.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StorageError::Connection {
                message: format!("Failed to create database directory: {}", e),
            })?;
        }

        let database_url = format!("sqlite://{}?mode=rwc", config.path.display());

        let options = SqliteConnectOptions::from_str(&database_url)
            .map_err(|e| StorageError::Connection {
                message: format!("Invalid database URL: {}", e),
            })?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::Connection {
                message: format!("Failed to connect to database: {}", e),
            })?;

        let storage = Self { pool };
        storage.run_migrations().await?;

        Ok(storage)
    }

    /// Create a private in-memory database.
    ///
    /// Uses a single long-lived connection: every SQLite in-memory connection
    /// is its own database.
    pub async fn new_in_memory() -> StorageResult<Self> {
        let options =
            SqliteConnectOptions::from_str("sqlite::memory:").map_err(|e| {
                StorageError::Connection {
                    message: format!("Invalid database URL: {}", e),
                }
            })?;

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::Connection {
                message: format!("Failed to open in-memory database: {}", e),
            })?;

        let storage = Self { pool };
        storage.run_migrations().await?;

        Ok(storage)
    }

    /// Run database migrations using embedded sqlx migrations
    async fn run_migrations(&self) -> StorageResult<()> {
        info!("Running database migrations...");

        MIGRATOR.run(&self.pool).await.map_err(|e| StorageError::Migration {
            message: format!("Failed to run migrations: {}", e),
        })?;

        info!("Database migrations completed successfully");
        Ok(())
    }

    /// Get the underlying pool for advanced queries
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn list_stages(
        &self,
        track_key: &str,
        channel: Option<Channel>,
    ) -> StorageResult<Vec<Stage>> {
        let channel = channel.map(|c| c.as_str());
        let rows: Vec<StageRow> = sqlx::query_as(
            r#"
            SELECT id, track_key, stage_key, sort_order, label, tips, channel
            FROM stages
            WHERE track_key = ?
              AND (? IS NULL OR channel IS NULL OR channel = ?)
            ORDER BY sort_order ASC
            "#,
        )
        .bind(track_key)
        .bind(channel)
        .bind(channel)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into()).collect())
    }

    async fn list_personas(
        &self,
        track_key: &str,
        channel: Option<Channel>,
    ) -> StorageResult<Vec<Persona>> {
        let channel = channel.map(|c| c.as_str());
        let rows: Vec<PersonaRow> = sqlx::query_as(
            r#"
            SELECT id, track_key, name, personality, role, company, pain_points,
                   decision_factors, difficulty, channel, active
            FROM personas
            WHERE track_key = ? AND active = 1
              AND (? IS NULL OR channel IS NULL OR channel = ?)
            ORDER BY name ASC
            "#,
        )
        .bind(track_key)
        .bind(channel)
        .bind(channel)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into()).collect())
    }

    async fn list_scripts(
        &self,
        track_key: &str,
        channel: Option<Channel>,
    ) -> StorageResult<Vec<Script>> {
        let channel = channel.map(|c| c.as_str());
        let rows: Vec<ScriptRow> = sqlx::query_as(
            r#"
            SELECT id, track_key, channel, persona_id, title, opening_line, active
            FROM scripts
            WHERE track_key = ? AND active = 1
              AND (? IS NULL OR channel IS NULL OR channel = ?)
            ORDER BY title ASC
            "#,
        )
        .bind(track_key)
        .bind(channel)
        .bind(channel)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into()).collect())
    }

    async fn create_stage(&self, stage: &Stage) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO stages (id, track_key, stage_key, sort_order, label, tips, channel)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&stage.id)
        .bind(&stage.track_key)
        .bind(&stage.key)
        .bind(stage.order)
        .bind(&stage.label)
        .bind(&stage.tips)
        .bind(stage.channel.map(|c| c.as_str()))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn create_persona(&self, persona: &Persona) -> StorageResult<()> {
        let pain_points = serde_json::to_string(&persona.pain_points)?;
        let decision_factors = serde_json::to_string(&persona.decision_factors)?;

        sqlx::query(
            r#"
            INSERT INTO personas (id, track_key, name, personality, role, company, pain_points,
                                  decision_factors, difficulty, channel, active)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&persona.id)
        .bind(&persona.track_key)
        .bind(&persona.name)
        .bind(&persona.personality)
        .bind(&persona.role)
        .bind(&persona.company)
        .bind(&pain_points)
        .bind(&decision_factors)
        .bind(persona.difficulty.as_str())
        .bind(persona.channel.map(|c| c.as_str()))
        .bind(persona.active)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn create_script(&self, script: &Script) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO scripts (id, track_key, channel, persona_id, title, opening_line, active)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&script.id)
        .bind(&script.track_key)
        .bind(script.channel.map(|c| c.as_str()))
        .bind(&script.persona_id)
        .bind(&script.title)
        .bind(&script.opening_line)
        .bind(script.active)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn create_game_session(&self, session: &GameSession) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO game_sessions (id, user_id, persona_id, track_key, started_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&session.id)
        .bind(&session.user_id)
        .bind(&session.persona_id)
        .bind(&session.track_key)
        .bind(session.started_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn complete_game_session(
        &self,
        id: &str,
        completion: &SessionCompletion,
    ) -> StorageResult<()> {
        let skills = serde_json::to_string(&completion.skills_measured)?;
        let stages = serde_json::to_string(&completion.stage_performance)?;
        let history = serde_json::to_string(&completion.conversation_history)?;

        let result = sqlx::query(
            r#"
            UPDATE game_sessions
            SET completed_at = ?, total_score = ?, final_rapport = ?, sale_closed = ?,
                time_spent_seconds = ?, skills_measured = ?, stage_performance = ?,
                conversation_history = ?
            WHERE id = ? AND completed_at IS NULL
            "#,
        )
        .bind(completion.completed_at.to_rfc3339())
        .bind(i64::from(completion.total_score))
        .bind(i64::from(completion.final_rapport))
        .bind(completion.sale_closed)
        .bind(i64::from(completion.time_spent_seconds))
        .bind(&skills)
        .bind(&stages)
        .bind(&history)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return match self.get_game_session(id).await? {
                Some(_) => Err(StorageError::Query {
                    message: format!("Game session already completed: {}", id),
                }),
                None => Err(StorageError::SessionNotFound {
                    session_id: id.to_string(),
                }),
            };
        }

        Ok(())
    }

    async fn get_game_session(&self, id: &str) -> StorageResult<Option<GameSession>> {
        let row: Option<GameSessionRow> = sqlx::query_as(
            r#"
            SELECT id, user_id, persona_id, track_key, started_at, completed_at, total_score,
                   final_rapport, sale_closed, time_spent_seconds, skills_measured,
                   stage_performance, conversation_history
            FROM game_sessions
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into()))
    }

    async fn list_user_sessions(
        &self,
        user_id: &str,
        limit: u32,
    ) -> StorageResult<Vec<GameSession>> {
        let rows: Vec<GameSessionRow> = sqlx::query_as(
            r#"
            SELECT id, user_id, persona_id, track_key, started_at, completed_at, total_score,
                   final_rapport, sale_closed, time_spent_seconds, skills_measured,
                   stage_performance, conversation_history
            FROM game_sessions
            WHERE user_id = ?
            ORDER BY started_at DESC
            LIMIT ?
            "#,
        )
        .bind(user_id)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into()).collect())
    }
}

// Internal row types for SQLx mapping
#[derive(sqlx::FromRow)]
struct StageRow {
    id: String,
    track_key: String,
    stage_key: String,
    sort_order: i64,
    label: String,
    tips: Option<String>,
    channel: Option<String>,
}

impl From<StageRow> for Stage {
    fn from(row: StageRow) -> Self {
        Self {
            id: row.id,
            track_key: row.track_key,
            key: row.stage_key,
            order: i32::try_from(row.sort_order).unwrap_or(i32::MAX),
            label: row.label,
            tips: row.tips,
            channel: parse_channel(row.channel),
        }
    }
}

#[derive(sqlx::FromRow)]
struct PersonaRow {
    id: String,
    track_key: String,
    name: String,
    personality: String,
    role: String,
    company: String,
    pain_points: String,
    decision_factors: String,
    difficulty: String,
    channel: Option<String>,
    active: bool,
}

impl From<PersonaRow> for Persona {
    fn from(row: PersonaRow) -> Self {
        Self {
            difficulty: row.difficulty.parse().unwrap_or_else(|e| {
                warn!(persona = %row.id, error = %e, "Defaulting persona difficulty");
                Difficulty::default()
            }),
            id: row.id,
            track_key: row.track_key,
            name: row.name,
            personality: row.personality,
            role: row.role,
            company: row.company,
            pain_points: serde_json::from_str(&row.pain_points).unwrap_or_default(),
            decision_factors: serde_json::from_str(&row.decision_factors).unwrap_or_default(),
            channel: parse_channel(row.channel),
            active: row.active,
        }
    }
}

#[derive(sqlx::FromRow)]
struct ScriptRow {
    id: String,
    track_key: String,
    channel: Option<String>,
    persona_id: Option<String>,
    title: String,
    opening_line: String,
    active: bool,
}

impl From<ScriptRow> for Script {
    fn from(row: ScriptRow) -> Self {
        Self {
            id: row.id,
            track_key: row.track_key,
            channel: parse_channel(row.channel),
            persona_id: row.persona_id,
            title: row.title,
            opening_line: row.opening_line,
            active: row.active,
        }
    }
}

#[derive(sqlx::FromRow)]
struct GameSessionRow {
    id: String,
    user_id: String,
    persona_id: String,
    track_key: String,
    started_at: String,
    completed_at: Option<String>,
    total_score: i64,
    final_rapport: i64,
    sale_closed: bool,
    time_spent_seconds: i64,
    skills_measured: Option<String>,
    stage_performance: Option<String>,
    conversation_history: Option<String>,
}

impl From<GameSessionRow> for GameSession {
    fn from(row: GameSessionRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            persona_id: row.persona_id,
            track_key: row.track_key,
            started_at: parse_timestamp(&row.started_at),
            completed_at: row.completed_at.as_deref().map(parse_timestamp),
            total_score: u32::try_from(row.total_score).unwrap_or(0),
            final_rapport: u8::try_from(row.final_rapport.clamp(0, 100)).unwrap_or(0),
            sale_closed: row.sale_closed,
            time_spent_seconds: u32::try_from(row.time_spent_seconds).unwrap_or(0),
            skills_measured: row
                .skills_measured
                .and_then(|s| serde_json::from_str(&s).ok()),
            stage_performance: row
                .stage_performance
                .and_then(|s| serde_json::from_str(&s).ok()),
            conversation_history: row
                .conversation_history
                .and_then(|s| serde_json::from_str(&s).ok()),
        }
    }
}

fn parse_timestamp(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn parse_channel(value: Option<String>) -> Option<Channel> {
    value.and_then(|s| s.parse().ok())
}

use std::env;
use std::path::PathBuf;

use crate::error::AppError;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub dialogue: DialogueConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub request: RequestConfig,
    pub game: GameConfig,
}

/// Dialogue generator API configuration
#[derive(Debug, Clone)]
pub struct DialogueConfig {
    pub api_key: String,
    pub base_url: String,
    pub pipe: String,
}

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub path: PathBuf,
    pub max_connections: u32,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

/// Log output format
#[derive(Debug, Clone, PartialEq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// HTTP request configuration.
///
/// Dialogue requests are attempted exactly once; there is no retry policy.
#[derive(Debug, Clone)]
pub struct RequestConfig {
    pub timeout_ms: u64,
}

/// Gameplay tuning shared by every track
#[derive(Debug, Clone, PartialEq)]
pub struct GameConfig {
    /// How long option feedback stays visible after a choice.
    pub feedback_display_ms: u64,
    /// Overrides every track's session duration when set.
    pub session_duration_secs: Option<u32>,
    /// Overrides every track's commitment threshold when set.
    pub commitment_threshold: Option<u8>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, AppError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let dialogue = DialogueConfig {
            api_key: env::var("DIALOGUE_API_KEY").map_err(|_| AppError::Config {
                message: "DIALOGUE_API_KEY is required".to_string(),
            })?,
            base_url: env::var("DIALOGUE_BASE_URL")
                .unwrap_or_else(|_| "https://api.langbase.com".to_string()),
            pipe: env::var("DIALOGUE_PIPE")
                .unwrap_or_else(|_| "sales-roleplay-dialogue-v1".to_string()),
        };

        let database = DatabaseConfig {
            path: PathBuf::from(
                env::var("DATABASE_PATH").unwrap_or_else(|_| "./data/rapport.db".to_string()),
            ),
            max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(5),
        };

        let logging = LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            format: match env::var("LOG_FORMAT")
                .unwrap_or_else(|_| "pretty".to_string())
                .to_lowercase()
                .as_str()
            {
                "json" => LogFormat::Json,
                _ => LogFormat::Pretty,
            },
        };

        let request = RequestConfig {
            timeout_ms: env::var("REQUEST_TIMEOUT_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(30000),
        };

        let game = GameConfig {
            feedback_display_ms: env::var("FEEDBACK_DISPLAY_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(2500),
            session_duration_secs: env::var("SESSION_DURATION_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|secs: &u32| *secs > 0),
            commitment_threshold: env::var("COMMITMENT_THRESHOLD")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(|t: u8| t.min(100)),
        };

        Ok(Config {
            dialogue,
            database,
            logging,
            request,
            game,
        })
    }
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self { timeout_ms: 30000 }
    }
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            feedback_display_ms: 2500,
            session_duration_secs: None,
            commitment_threshold: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_config_default() {
        assert_eq!(RequestConfig::default().timeout_ms, 30000);
    }

    #[test]
    fn test_game_config_default_has_no_overrides() {
        let game = GameConfig::default();
        assert_eq!(game.feedback_display_ms, 2500);
        assert!(game.session_duration_secs.is_none());
        assert!(game.commitment_threshold.is_none());
    }
}

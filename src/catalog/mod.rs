//! Catalog data for a training track: ordered stages, playable personas and
//! optional opening scripts.
//!
//! Catalog rows are immutable for the duration of a game. The [`CatalogLoader`]
//! reads them through the [`Storage`] trait and never fails into the caller:
//! an unavailable store yields an empty [`Catalog`].

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::storage::Storage;

/// Outreach channel for channel-sensitive tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    /// Cold call.
    Phone,
    /// Chat message thread.
    Whatsapp,
    /// Social selling via direct message.
    Linkedin,
}

impl Channel {
    /// Convert to string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Phone => "phone",
            Channel::Whatsapp => "whatsapp",
            Channel::Linkedin => "linkedin",
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Channel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "phone" => Ok(Channel::Phone),
            "whatsapp" => Ok(Channel::Whatsapp),
            "linkedin" => Ok(Channel::Linkedin),
            _ => Err(format!("Unknown channel: {}", s)),
        }
    }
}

/// How hard a persona is to win over.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl Difficulty {
    /// Convert to string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

impl std::fmt::Display for Difficulty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            _ => Err(format!("Unknown difficulty: {}", s)),
        }
    }
}

/// One ordered step of the conversation arc.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stage {
    /// Unique stage identifier.
    pub id: String,
    /// Track this stage belongs to.
    pub track_key: String,
    /// Stable key (e.g. "opener", "discovery").
    pub key: String,
    /// Position within the track; stages are played in ascending order.
    pub order: i32,
    /// Display label.
    pub label: String,
    /// Coaching tips shown during the stage.
    pub tips: Option<String>,
    /// Restricts the stage to one channel; `None` applies to all.
    pub channel: Option<Channel>,
}

/// A synthetic prospect the player converses with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Persona {
    pub id: String,
    pub track_key: String,
    pub name: String,
    /// Personality tag (e.g. "skeptical", "analytical").
    pub personality: String,
    pub role: String,
    pub company: String,
    pub pain_points: Vec<String>,
    pub decision_factors: Vec<String>,
    pub difficulty: Difficulty,
    pub channel: Option<Channel>,
    pub active: bool,
}

/// Optional opening script offered to the player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Script {
    pub id: String,
    pub track_key: String,
    pub channel: Option<Channel>,
    /// Limits the script to a single persona when set.
    pub persona_id: Option<String>,
    pub title: String,
    pub opening_line: String,
    pub active: bool,
}

/// Everything a game needs from the catalog for one track (and channel).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    /// Stages sorted by `order`.
    pub stages: Vec<Stage>,
    pub personas: Vec<Persona>,
    pub scripts: Vec<Script>,
}

impl Catalog {
    /// True when no game can be played from this catalog.
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty() || self.personas.is_empty()
    }

    /// Look up a persona by id.
    pub fn persona(&self, id: &str) -> Option<&Persona> {
        self.personas.iter().find(|p| p.id == id)
    }

    /// Look up a script by id.
    pub fn script(&self, id: &str) -> Option<&Script> {
        self.scripts.iter().find(|s| s.id == id)
    }

    /// Scripts usable with the given persona.
    pub fn scripts_for<'a>(&'a self, persona_id: &'a str) -> impl Iterator<Item = &'a Script> {
        self.scripts
            .iter()
            .filter(move |s| s.persona_id.as_deref().map_or(true, |p| p == persona_id))
    }
}

/// Reads catalog data for a track.
#[derive(Clone)]
pub struct CatalogLoader {
    storage: Arc<dyn Storage>,
}

impl CatalogLoader {
    /// Create a loader backed by the given store.
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Load stages, personas and scripts for a track.
    ///
    /// With a channel, rows bound to another channel are excluded. Storage
    /// failures are logged and produce an empty catalog.
    pub async fn load(&self, track_key: &str, channel: Option<Channel>) -> Catalog {
        match self.try_load(track_key, channel).await {
            Ok(catalog) => {
                debug!(
                    track = %track_key,
                    channel = ?channel,
                    stages = catalog.stages.len(),
                    personas = catalog.personas.len(),
                    scripts = catalog.scripts.len(),
                    "Catalog loaded"
                );
                catalog
            }
            Err(e) => {
                error!(
                    track = %track_key,
                    channel = ?channel,
                    error = %e,
                    "Failed to load catalog, continuing with an empty one"
                );
                Catalog::default()
            }
        }
    }

    async fn try_load(
        &self,
        track_key: &str,
        channel: Option<Channel>,
    ) -> crate::error::StorageResult<Catalog> {
        let mut stages = self.storage.list_stages(track_key, channel).await?;
        stages.sort_by_key(|s| s.order);
        let personas = self.storage.list_personas(track_key, channel).await?;
        let scripts = self.storage.list_scripts(track_key, channel).await?;

        Ok(Catalog {
            stages,
            personas,
            scripts,
        })
    }
}

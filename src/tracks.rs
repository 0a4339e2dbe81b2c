//! Training tracks: the scenario families a game can be played in.
//!
//! A [`TrackConfig`] carries every tunable that shapes a play-through:
//! baseline rapport, session length, the commitment threshold, the skills
//! tracked, and the fallback dialogue. The [`TrackRegistry`] ships the
//! built-in tracks and applies [`GameConfig`] overrides.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::GameConfig;
use crate::dialogue::FallbackDialogue;

/// Built-in track key for SDR prospecting.
pub const SDR_TRACK: &str = "sdr";
/// Built-in track key for closer negotiation.
pub const CLOSER_TRACK: &str = "closer";
/// Built-in track key for cold outreach.
pub const COLD_OUTREACH_TRACK: &str = "cold_outreach";

/// Tunables for one training track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackConfig {
    pub key: String,
    pub label: String,
    /// Requires a channel choice before persona selection.
    pub channel_sensitive: bool,
    /// Asks the generator for cold-contact realism.
    pub cold_outreach: bool,
    /// Rapport at game start.
    pub baseline_rapport: u8,
    /// Countdown length.
    pub duration_secs: u32,
    /// Minimum final rapport for a commitment.
    pub commitment_threshold: u8,
    /// Skills tracked for this track, in display order.
    pub skills: Vec<String>,
    /// How long option feedback stays visible.
    pub feedback_display_ms: u64,
    pub fallback: FallbackDialogue,
}

impl TrackConfig {
    /// Feedback display duration.
    pub fn feedback_display(&self) -> Duration {
        Duration::from_millis(self.feedback_display_ms)
    }

    /// SDR prospecting: warm-ish outbound discovery calls.
    pub fn sdr() -> Self {
        Self {
            key: SDR_TRACK.to_string(),
            label: "SDR Prospecting".to_string(),
            channel_sensitive: false,
            cold_outreach: false,
            baseline_rapport: 40,
            duration_secs: 300,
            commitment_threshold: 50,
            skills: skills(&[
                "opening",
                "discovery",
                "qualification",
                "objection_handling",
                "scheduling",
            ]),
            feedback_display_ms: 2500,
            fallback: FallbackDialogue::standard(),
        }
    }

    /// Closer negotiation: late-stage deal conversations.
    pub fn closer() -> Self {
        Self {
            key: CLOSER_TRACK.to_string(),
            label: "Closer Negotiation".to_string(),
            channel_sensitive: false,
            cold_outreach: false,
            baseline_rapport: 50,
            duration_secs: 300,
            commitment_threshold: 50,
            skills: skills(&[
                "value_framing",
                "negotiation",
                "objection_handling",
                "closing",
            ]),
            feedback_display_ms: 2500,
            fallback: FallbackDialogue::standard(),
        }
    }

    /// Cold outreach: unsolicited contact over phone, WhatsApp or LinkedIn.
    pub fn cold_outreach() -> Self {
        Self {
            key: COLD_OUTREACH_TRACK.to_string(),
            label: "Cold Outreach".to_string(),
            channel_sensitive: true,
            cold_outreach: true,
            baseline_rapport: 20,
            duration_secs: 180,
            commitment_threshold: 50,
            skills: skills(&[
                "permission",
                "relevance",
                "curiosity",
                "objection_handling",
                "next_step",
            ]),
            feedback_display_ms: 2500,
            fallback: FallbackDialogue::cold_outreach(),
        }
    }

    fn apply_overrides(&mut self, game: &GameConfig) {
        self.feedback_display_ms = game.feedback_display_ms;
        if let Some(secs) = game.session_duration_secs {
            self.duration_secs = secs;
        }
        if let Some(threshold) = game.commitment_threshold {
            self.commitment_threshold = threshold.min(100);
        }
    }
}

fn skills(ids: &[&str]) -> Vec<String> {
    ids.iter().map(|s| s.to_string()).collect()
}

/// Registry of available tracks keyed by track key.
#[derive(Debug, Clone)]
pub struct TrackRegistry {
    tracks: HashMap<String, TrackConfig>,
}

impl TrackRegistry {
    /// Registry with the built-in tracks and default tuning.
    pub fn new() -> Self {
        let mut registry = Self {
            tracks: HashMap::new(),
        };
        for track in [TrackConfig::sdr(), TrackConfig::closer(), TrackConfig::cold_outreach()] {
            registry.register(track);
        }
        registry
    }

    /// Registry with the built-in tracks tuned by `game`.
    pub fn with_config(game: &GameConfig) -> Self {
        let mut registry = Self::new();
        for track in registry.tracks.values_mut() {
            track.apply_overrides(game);
        }
        registry
    }

    /// Add or replace a track.
    pub fn register(&mut self, track: TrackConfig) {
        debug!(track = %track.key, "Registering track");
        self.tracks.insert(track.key.clone(), track);
    }

    /// Look up a track.
    pub fn get(&self, key: &str) -> Option<&TrackConfig> {
        self.tracks.get(key)
    }

    /// All track keys, sorted.
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.tracks.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }
}

impl Default for TrackRegistry {
    fn default() -> Self {
        Self::new()
    }
}

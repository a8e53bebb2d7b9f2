//! Configuration for a whole simulation run.
//!
//! `sunny.toml` has one table per layer: `[general]`, `[memory]` and
//! `[social]` belong to the cognition core, `[llm]` to the generation
//! pipeline and `[world]` to the orchestration in this crate. Every field
//! has a default, so an empty file is a valid configuration.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sunny_core::config::{GeneralConfig, MemoryConfig, SocialConfig};
use sunny_llm::LlmConfig;

use crate::error::{Result, WorldError};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SimConfig {
    /// Logging and seeding.
    #[serde(default)]
    pub general: GeneralConfig,
    /// Per-agent memory stores.
    #[serde(default)]
    pub memory: MemoryConfig,
    /// Social drives and the social engine.
    #[serde(default)]
    pub social: SocialConfig,
    /// Providers, spacing and rate limits.
    #[serde(default)]
    pub llm: LlmConfig,
    /// Orchestration timings and proximity.
    #[serde(default)]
    pub world: WorldConfig,
}

impl SimConfig {
    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    /// Returns [`WorldError::Config`] if the TOML is malformed.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str).map_err(|e| WorldError::Config(e.to_string()))
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }
}

// ---------------------------------------------------------------------------
// World
// ---------------------------------------------------------------------------

/// Timings and distances of the session loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldConfig {
    /// Viewport width assumed for players that never reported one.
    #[serde(default = "default_viewport_width")]
    pub viewport_width: f32,
    /// Viewport height assumed for players that never reported one.
    #[serde(default = "default_viewport_height")]
    pub viewport_height: f32,
    /// Extra distance beyond the half-viewport at which agents still hear.
    #[serde(default = "default_margin")]
    pub proximity_margin: f32,
    /// Milliseconds between movement and social ticks.
    #[serde(default = "default_world_tick")]
    pub world_tick_ms: u64,
    /// Seconds between attempts to play a queued social conversation.
    #[serde(default = "default_poll")]
    pub conversation_poll_secs: u64,
    /// Seconds between mood drift passes.
    #[serde(default = "default_mood_tick")]
    pub mood_tick_secs: u64,
    /// Lock held past the last line of a social conversation, ms.
    #[serde(default = "default_lock_tail")]
    pub lock_tail_ms: u64,
    /// Granularity of the dialogue schedule driver, ms.
    #[serde(default = "default_resolution")]
    pub schedule_resolution_ms: u64,
    /// Pause between a player message and the generation request, ms.
    #[serde(default = "default_reply_pause")]
    pub player_reply_pause_ms: u64,
    /// World units an agent walks per world tick.
    #[serde(default = "default_walk_step")]
    pub walk_step: f32,
    /// Agents closer than this to their target have arrived.
    #[serde(default = "default_arrival")]
    pub arrival_radius: f32,
    /// Random spread around a seek target, world units.
    #[serde(default = "default_seek_jitter")]
    pub seek_jitter: f32,
    /// How long a seeking agent keeps walking before picking an activity.
    #[serde(default = "default_seek_hold")]
    pub seek_hold_ms: u64,
    /// Random spread of a zone-less wander, world units.
    #[serde(default = "default_wander")]
    pub wander_radius: f32,
    /// Extra random time added to each activity, ms.
    #[serde(default = "default_activity_jitter")]
    pub activity_jitter_ms: u64,
    /// Ceiling of every friendship, mood and relationship score.
    #[serde(default = "default_score_cap")]
    pub score_cap: f64,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            viewport_width: default_viewport_width(),
            viewport_height: default_viewport_height(),
            proximity_margin: default_margin(),
            world_tick_ms: default_world_tick(),
            conversation_poll_secs: default_poll(),
            mood_tick_secs: default_mood_tick(),
            lock_tail_ms: default_lock_tail(),
            schedule_resolution_ms: default_resolution(),
            player_reply_pause_ms: default_reply_pause(),
            walk_step: default_walk_step(),
            arrival_radius: default_arrival(),
            seek_jitter: default_seek_jitter(),
            seek_hold_ms: default_seek_hold(),
            wander_radius: default_wander(),
            activity_jitter_ms: default_activity_jitter(),
            score_cap: default_score_cap(),
        }
    }
}

impl WorldConfig {
    /// Movement and social tick period.
    #[must_use]
    pub fn world_tick(&self) -> Duration {
        Duration::from_millis(self.world_tick_ms.max(1))
    }

    /// Social conversation poll period.
    #[must_use]
    pub fn conversation_poll(&self) -> Duration {
        Duration::from_secs(self.conversation_poll_secs.max(1))
    }

    /// Mood drift period.
    #[must_use]
    pub fn mood_tick(&self) -> Duration {
        Duration::from_secs(self.mood_tick_secs.max(1))
    }

    /// Lock held past a conversation's last line.
    #[must_use]
    pub fn lock_tail(&self) -> Duration {
        Duration::from_millis(self.lock_tail_ms)
    }

    /// Schedule driver period.
    #[must_use]
    pub fn schedule_resolution(&self) -> Duration {
        Duration::from_millis(self.schedule_resolution_ms.max(1))
    }

    /// Pause before a player reply is requested.
    #[must_use]
    pub fn player_reply_pause(&self) -> Duration {
        Duration::from_millis(self.player_reply_pause_ms)
    }
}

// ---------------------------------------------------------------------------
// Default value functions
// ---------------------------------------------------------------------------

fn default_viewport_width() -> f32 {
    1280.0
}
fn default_viewport_height() -> f32 {
    720.0
}
fn default_margin() -> f32 {
    80.0
}
fn default_world_tick() -> u64 {
    500
}
fn default_poll() -> u64 {
    8
}
fn default_mood_tick() -> u64 {
    30
}
fn default_lock_tail() -> u64 {
    2_000
}
fn default_resolution() -> u64 {
    100
}
fn default_reply_pause() -> u64 {
    1_000
}
fn default_walk_step() -> f32 {
    12.0
}
fn default_arrival() -> f32 {
    15.0
}
fn default_seek_jitter() -> f32 {
    30.0
}
fn default_seek_hold() -> u64 {
    8_000
}
fn default_wander() -> f32 {
    100.0
}
fn default_activity_jitter() -> u64 {
    3_000
}
fn default_score_cap() -> f64 {
    100.0
}

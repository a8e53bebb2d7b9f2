//! Configuration for the cognition core.
//!
//! Maps to the `[general]`, `[memory]` and `[social]` tables of
//! `sunny.toml`. Every field has a default, so an empty table is valid.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// General
// ---------------------------------------------------------------------------

/// General process settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Log level filter: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Emit logs as JSON lines instead of human-readable text.
    #[serde(default)]
    pub json_logs: bool,
    /// Fixed RNG seed for reproducible sessions. `None` seeds from entropy.
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logs: false,
            seed: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Memory
// ---------------------------------------------------------------------------

/// Per-agent memory capacity, decay and recall settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Hard cap on memories per agent; the weakest are evicted beyond it.
    #[serde(default = "default_capacity")]
    pub capacity: usize,
    /// Size of the short-term buffer of most recent memories.
    #[serde(default = "default_short_term")]
    pub short_term_capacity: usize,
    /// Base strength lost per decay pass before importance damping.
    #[serde(default = "default_decay_rate")]
    pub base_decay_rate: f64,
    /// Memories at or below this strength are forgotten.
    #[serde(default = "default_strength_floor")]
    pub strength_floor: f64,
    /// Seconds between decay passes.
    #[serde(default = "default_decay_interval")]
    pub decay_interval_secs: u64,
    /// Minimum relevance score for a memory to be recalled at all.
    #[serde(default = "default_min_recall_score")]
    pub min_recall_score: f64,
    /// Results returned by a full recall when the caller does not say.
    #[serde(default = "default_max_results")]
    pub max_recall_results: usize,
    /// Chance that a weak (score < 1) recall only yields a vague hint.
    #[serde(default = "default_vague_chance")]
    pub vague_chance: f64,
    /// Chance that a middling (score < 2) recall yields one fuzzy memory.
    #[serde(default = "default_fuzzy_chance")]
    pub fuzzy_chance: f64,
    /// Entries included in debug snapshots.
    #[serde(default = "default_snapshot_size")]
    pub snapshot_size: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            short_term_capacity: default_short_term(),
            base_decay_rate: default_decay_rate(),
            strength_floor: default_strength_floor(),
            decay_interval_secs: default_decay_interval(),
            min_recall_score: default_min_recall_score(),
            max_recall_results: default_max_results(),
            vague_chance: default_vague_chance(),
            fuzzy_chance: default_fuzzy_chance(),
            snapshot_size: default_snapshot_size(),
        }
    }
}

// ---------------------------------------------------------------------------
// Social
// ---------------------------------------------------------------------------

/// Social drive rates and social engine tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SocialConfig {
    /// Agents closer than this (world units) can hear each other.
    #[serde(default = "default_hearing_radius")]
    pub hearing_radius: f32,
    /// Milliseconds between social engine ticks.
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,
    /// Seconds without conversation before loneliness starts rising.
    #[serde(default = "default_idle_secs")]
    pub lonely_after_secs: u64,
    /// Loneliness gained per idle second.
    #[serde(default = "default_loneliness_rate")]
    pub loneliness_rate: f64,
    /// Scale of the curiosity random walk per second.
    #[serde(default = "default_curiosity_rate")]
    pub curiosity_rate: f64,
    /// Expressiveness gained per second.
    #[serde(default = "default_expressiveness_rate")]
    pub expressiveness_rate: f64,
    /// Shortest post-conversation cooldown, seconds.
    #[serde(default = "default_cooldown_min")]
    pub cooldown_min_secs: u64,
    /// Longest post-conversation cooldown, seconds.
    #[serde(default = "default_cooldown_max")]
    pub cooldown_max_secs: u64,
    /// Loneliness removed by a conversation.
    #[serde(default = "default_loneliness_relief")]
    pub loneliness_relief: f64,
    /// Expressiveness removed by a conversation.
    #[serde(default = "default_expressiveness_relief")]
    pub expressiveness_relief: f64,
    /// Chance a seeking agent heads for its favourite partner.
    #[serde(default = "default_top_preference")]
    pub top_preference_chance: f64,
    /// Bystanders join when they roll under `talkativeness × factor`.
    #[serde(default = "default_join_factor")]
    pub bystander_join_factor: f64,
    /// Loneliness above which a seek is reported as "lonely".
    #[serde(default = "default_lonely_threshold")]
    pub lonely_threshold: f64,
    /// Base delay before the first responder's message, ms.
    #[serde(default = "default_first_delay")]
    pub first_responder_delay_ms: u64,
    /// Base delay before every later message, ms.
    #[serde(default = "default_later_delay")]
    pub later_responder_delay_ms: u64,
}

impl Default for SocialConfig {
    fn default() -> Self {
        Self {
            hearing_radius: default_hearing_radius(),
            tick_ms: default_tick_ms(),
            lonely_after_secs: default_idle_secs(),
            loneliness_rate: default_loneliness_rate(),
            curiosity_rate: default_curiosity_rate(),
            expressiveness_rate: default_expressiveness_rate(),
            cooldown_min_secs: default_cooldown_min(),
            cooldown_max_secs: default_cooldown_max(),
            loneliness_relief: default_loneliness_relief(),
            expressiveness_relief: default_expressiveness_relief(),
            top_preference_chance: default_top_preference(),
            bystander_join_factor: default_join_factor(),
            lonely_threshold: default_lonely_threshold(),
            first_responder_delay_ms: default_first_delay(),
            later_responder_delay_ms: default_later_delay(),
        }
    }
}

// ---------------------------------------------------------------------------
// Default value functions
// ---------------------------------------------------------------------------

fn default_log_level() -> String {
    "info".to_string()
}
fn default_capacity() -> usize {
    80
}
fn default_short_term() -> usize {
    6
}
fn default_decay_rate() -> f64 {
    0.02
}
fn default_strength_floor() -> f64 {
    0.05
}
fn default_decay_interval() -> u64 {
    60
}
fn default_min_recall_score() -> f64 {
    0.5
}
fn default_max_results() -> usize {
    3
}
fn default_vague_chance() -> f64 {
    0.3
}
fn default_fuzzy_chance() -> f64 {
    0.2
}
fn default_snapshot_size() -> usize {
    20
}
fn default_hearing_radius() -> f32 {
    350.0
}
fn default_tick_ms() -> u64 {
    500
}
fn default_idle_secs() -> u64 {
    60
}
fn default_loneliness_rate() -> f64 {
    0.15
}
fn default_curiosity_rate() -> f64 {
    0.05
}
fn default_expressiveness_rate() -> f64 {
    0.08
}
fn default_cooldown_min() -> u64 {
    90
}
fn default_cooldown_max() -> u64 {
    210
}
fn default_loneliness_relief() -> f64 {
    30.0
}
fn default_expressiveness_relief() -> f64 {
    20.0
}
fn default_top_preference() -> f64 {
    0.6
}
fn default_join_factor() -> f64 {
    0.5
}
fn default_lonely_threshold() -> f64 {
    60.0
}
fn default_first_delay() -> u64 {
    1_800
}
fn default_later_delay() -> u64 {
    3_000
}

//! Where agents live on the map.
//!
//! The layout is static data: a rectangle the agents never leave, a spawn
//! point per agent and, per activity, how long it lasts and which zone it
//! happens in.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use sunny_core::{PersonalityCatalog, Position};

use crate::error::{Result, WorldError};

/// The built-in village map.
const VILLAGE_TOML: &str = include_str!("../assets/village.toml");

/// Rectangle agents are kept inside.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    /// Left edge.
    pub min_x: f32,
    /// Right edge.
    pub max_x: f32,
    /// Top edge.
    pub min_y: f32,
    /// Bottom edge.
    pub max_y: f32,
}

impl Bounds {
    /// `pos` moved onto the nearest point inside the rectangle.
    #[must_use]
    pub fn clamp(&self, pos: Position) -> Position {
        Position::new(pos.x.clamp(self.min_x, self.max_x), pos.y.clamp(self.min_y, self.max_y))
    }

    /// Centre of the rectangle.
    #[must_use]
    pub fn center(&self) -> Position {
        Position::new((self.min_x + self.max_x) / 2.0, (self.min_y + self.max_y) / 2.0)
    }
}

/// Axis-aligned area an activity happens in.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Zone {
    /// Left edge.
    pub x: f32,
    /// Top edge.
    pub y: f32,
    /// Width.
    pub w: f32,
    /// Height.
    pub h: f32,
}

/// One activity on the map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivitySpot {
    /// Activity label, as used in prompts and fallback tables.
    pub name: String,
    /// Base duration before the agent moves on, ms.
    pub duration_ms: u64,
    /// Where it happens. `None` means a short wander.
    #[serde(default)]
    pub zone: Option<Zone>,
}

/// One agent's place in the village.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentLayout {
    /// Starting position.
    pub spawn: Position,
    /// Activities the agent rotates through.
    #[serde(default)]
    pub activities: Vec<ActivitySpot>,
}

/// The whole village map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VillageLayout {
    /// Map rectangle.
    pub bounds: Bounds,
    /// Per-agent layout, keyed by name.
    pub agents: BTreeMap<String, AgentLayout>,
}

impl VillageLayout {
    /// The built-in Sunnyside map.
    ///
    /// # Errors
    /// Returns [`WorldError::Layout`] if the embedded asset fails to parse.
    pub fn sunnyside() -> Result<Self> {
        Self::from_toml(VILLAGE_TOML)
    }

    /// Parse a layout from TOML.
    ///
    /// # Errors
    /// Returns [`WorldError::Layout`] on malformed TOML.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str).map_err(|e| WorldError::Layout(e.to_string()))
    }

    /// Load a layout file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Check that every rostered agent has a spawn point and that every
    /// activity is one the agent's profile knows.
    ///
    /// # Errors
    /// Returns [`WorldError::Layout`] naming the first mismatch.
    pub fn validate(&self, catalog: &PersonalityCatalog) -> Result<()> {
        for profile in catalog.iter() {
            let Some(agent) = self.agents.get(&profile.name) else {
                return Err(WorldError::Layout(format!("{} has no spawn point", profile.name)));
            };
            if let Some(spot) = agent.activities.iter().find(|s| !profile.activities.contains(&s.name)) {
                return Err(WorldError::Layout(format!(
                    "{} has no activity called {:?}",
                    profile.name, spot.name
                )));
            }
        }
        Ok(())
    }

    /// Layout for one agent.
    #[must_use]
    pub fn agent(&self, name: &str) -> Option<&AgentLayout> {
        self.agents.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sunnyside_layout_matches_roster() {
        let layout = VillageLayout::sunnyside().expect("layout");
        let catalog = PersonalityCatalog::sunnyside().expect("catalog");
        layout.validate(&catalog).expect("consistent");
        let elena = layout.agent("Elena").expect("Elena");
        assert_eq!(elena.spawn, Position::new(1450.0, 1450.0));
        assert_eq!(elena.activities[0].name, "watering");
        assert!(elena.activities[0].zone.is_some());
    }

    #[test]
    fn unknown_activity_is_rejected() {
        let catalog = PersonalityCatalog::sunnyside().expect("catalog");
        let mut layout = VillageLayout::sunnyside().expect("layout");
        if let Some(agent) = layout.agents.get_mut("Gruk") {
            agent.activities.push(ActivitySpot {
                name: "knitting".into(),
                duration_ms: 1000,
                zone: None,
            });
        }
        let err = layout.validate(&catalog).expect_err("knitting is not Gruk's");
        assert!(err.to_string().contains("knitting"));
    }

    #[test]
    fn missing_agent_is_rejected() {
        let catalog = PersonalityCatalog::sunnyside().expect("catalog");
        let mut layout = VillageLayout::sunnyside().expect("layout");
        layout.agents.remove("Bones");
        assert!(matches!(layout.validate(&catalog), Err(WorldError::Layout(_))));
    }

    #[test]
    fn clamp_keeps_points_inside() {
        let bounds = VillageLayout::sunnyside().expect("layout").bounds;
        assert_eq!(bounds.clamp(Position::new(0.0, 5000.0)), Position::new(1100.0, 1900.0));
        assert_eq!(bounds.center(), Position::new(1550.0, 1550.0));
    }
}

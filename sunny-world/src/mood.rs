//! Per-agent moods.
//!
//! Moods start at each profile's baseline and drift on a slow tick: energy
//! recovers, the need for company builds up, loneliness saps happiness and a
//! well-rested agent cheers up. Talking lifts the social and happiness
//! levels.

use std::collections::BTreeMap;

use sunny_core::{Mood, PersonalityCatalog};
use tracing::{debug, info};

/// Energy recovered per tick.
const ENERGY_RECOVERY: f64 = 1.0;
/// Social satisfaction lost per tick.
const SOCIAL_DECAY: f64 = 0.5;
/// Below this social level, happiness drops.
const LONELY_BELOW: f64 = 20.0;
/// Happiness lost per tick while lonely.
const LONELY_PENALTY: f64 = 1.0;
/// Happiness never drifts below this.
const HAPPINESS_FLOOR: f64 = 10.0;
/// Above this energy, happiness rises.
const RESTED_ABOVE: f64 = 80.0;
/// Happiness gained per tick while rested.
const RESTED_BONUS: f64 = 0.5;
/// Below this social level an agent is reported as lonely.
const REPORT_LONELY_BELOW: f64 = 25.0;

/// Social and happiness gain for answering a player.
const PLAYER_REPLY_BOOST: (f64, f64) = (10.0, 3.0);
/// Social and happiness gain for a line in a village conversation.
const SOCIAL_LINE_BOOST: (f64, f64) = (15.0, 5.0);

/// Moods of every agent.
#[derive(Debug, Clone)]
pub struct MoodBoard {
    moods: BTreeMap<String, Mood>,
    cap: f64,
}

impl MoodBoard {
    /// Every agent at its baseline. Levels never exceed `cap`.
    #[must_use]
    pub fn new(catalog: &PersonalityCatalog, cap: f64) -> Self {
        let moods = catalog.iter().map(|p| (p.name.clone(), p.mood_baseline)).collect();
        Self { moods, cap }
    }

    /// One agent's mood.
    #[must_use]
    pub fn get(&self, agent: &str) -> Option<&Mood> {
        self.moods.get(agent)
    }

    /// All moods, by name.
    #[must_use]
    pub fn all(&self) -> &BTreeMap<String, Mood> {
        &self.moods
    }

    /// One drift step for every agent. Returns the agents left lonely.
    pub fn tick(&mut self) -> Vec<String> {
        let mut lonely = Vec::new();
        for (name, mood) in &mut self.moods {
            mood.energy = (mood.energy + ENERGY_RECOVERY).min(self.cap);
            mood.social = (mood.social - SOCIAL_DECAY).max(0.0);
            if mood.social < LONELY_BELOW {
                mood.happiness = (mood.happiness - LONELY_PENALTY).max(HAPPINESS_FLOOR);
            }
            if mood.energy > RESTED_ABOVE {
                mood.happiness = (mood.happiness + RESTED_BONUS).min(self.cap);
            }
            debug!(agent = %name, happiness = mood.happiness, energy = mood.energy, social = mood.social, "mood drift");
            if mood.social < REPORT_LONELY_BELOW {
                info!(agent = %name, social = mood.social.round(), "feeling lonely");
                lonely.push(name.clone());
            }
        }
        lonely
    }

    /// `agent` answered a player.
    pub fn on_player_reply(&mut self, agent: &str) {
        self.boost(agent, PLAYER_REPLY_BOOST);
    }

    /// `agent` spoke in a village conversation.
    pub fn on_social_line(&mut self, agent: &str) {
        self.boost(agent, SOCIAL_LINE_BOOST);
    }

    fn boost(&mut self, agent: &str, (social, happiness): (f64, f64)) {
        if let Some(mood) = self.moods.get_mut(agent) {
            mood.social = (mood.social + social).min(self.cap);
            mood.happiness = (mood.happiness + happiness).min(self.cap);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sunny_core::AgentProfile;

    fn board(mood: Mood) -> MoodBoard {
        let mut profile = AgentProfile::named("Elena");
        profile.mood_baseline = mood;
        let catalog = PersonalityCatalog::new(vec![profile]).expect("catalog");
        MoodBoard::new(&catalog, 100.0)
    }

    fn elena(board: &MoodBoard) -> Mood {
        *board.get("Elena").expect("Elena")
    }

    #[test]
    fn drift_recovers_energy_and_drains_company() {
        let mut moods = board(Mood {
            happiness: 50.0,
            energy: 50.0,
            social: 50.0,
        });
        assert!(moods.tick().is_empty());
        let m = elena(&moods);
        assert!((m.energy - 51.0).abs() < 1e-9);
        assert!((m.social - 49.5).abs() < 1e-9);
        assert!((m.happiness - 50.0).abs() < 1e-9);
    }

    #[test]
    fn loneliness_saps_happiness_down_to_the_floor() {
        let mut moods = board(Mood {
            happiness: 10.5,
            energy: 10.0,
            social: 5.0,
        });
        assert_eq!(moods.tick(), vec!["Elena".to_string()]);
        assert!((elena(&moods).happiness - 10.0).abs() < 1e-9);
        moods.tick();
        assert!((elena(&moods).happiness - 10.0).abs() < 1e-9);
    }

    #[test]
    fn rested_agents_cheer_up() {
        let mut moods = board(Mood {
            happiness: 60.0,
            energy: 90.0,
            social: 50.0,
        });
        moods.tick();
        assert!((elena(&moods).happiness - 60.5).abs() < 1e-9);
    }

    #[test]
    fn boosts_are_capped() {
        let mut moods = board(Mood {
            happiness: 99.0,
            energy: 50.0,
            social: 95.0,
        });
        moods.on_social_line("Elena");
        let m = elena(&moods);
        assert!((m.social - 100.0).abs() < 1e-9);
        assert!((m.happiness - 100.0).abs() < 1e-9);
        moods.on_player_reply("Nobody");
    }
}

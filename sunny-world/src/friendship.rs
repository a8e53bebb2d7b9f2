//! What a player has earned with each agent.
//!
//! Every reply an agent gives a player counts toward their friendship. A
//! reply that asks something back counts a little more, and so does a
//! message in which the player shared something new about themselves.
//! Agents also let slip their favourite colour or food; each slip is a
//! discovery the player collects once.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use sunny_core::AgentProfile;

/// Gain for any reply.
const REPLY_GAIN: u32 = 2;
/// Extra gain when the reply asks a question.
const QUESTION_GAIN: u32 = 1;
/// Extra gain when the player revealed new facts.
const REVEAL_GAIN: u32 = 2;

/// Friendship gained from one reply.
#[must_use]
pub fn reply_gain(reply: &str, revealed_facts: bool) -> u32 {
    let mut gain = REPLY_GAIN;
    if reply.contains('?') || reply.contains('¿') {
        gain += QUESTION_GAIN;
    }
    if revealed_facts {
        gain += REVEAL_GAIN;
    }
    gain
}

/// Something a player can learn about an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Discovery {
    /// The agent's favourite colour.
    FavoriteColor,
    /// The agent's favourite food.
    FavoriteFood,
}

/// Discoveries a reply gives away: any of the agent's cue words, matched
/// case-insensitively.
#[must_use]
pub fn discoveries_in(profile: &AgentProfile, reply: &str) -> Vec<Discovery> {
    let lower = reply.to_lowercase();
    let mentions = |cues: &[String]| cues.iter().any(|c| !c.is_empty() && lower.contains(&c.to_lowercase()));
    let mut found = Vec::new();
    if mentions(&profile.discovery.color) {
        found.push(Discovery::FavoriteColor);
    }
    if mentions(&profile.discovery.food) {
        found.push(Discovery::FavoriteFood);
    }
    found
}

/// One player's standing with every agent.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Friendship {
    levels: BTreeMap<String, u32>,
    discovered: BTreeSet<(String, Discovery)>,
    #[serde(skip)]
    cap: u32,
}

impl Friendship {
    /// Zero with every agent in `roster`. Levels never exceed `cap`.
    #[must_use]
    pub fn new<S: AsRef<str>>(roster: &[S], cap: u32) -> Self {
        Self {
            levels: roster.iter().map(|n| (n.as_ref().to_string(), 0)).collect(),
            discovered: BTreeSet::new(),
            cap,
        }
    }

    /// Current level with `agent`.
    #[must_use]
    pub fn level(&self, agent: &str) -> u32 {
        self.levels.get(agent).copied().unwrap_or(0)
    }

    /// All levels, by agent.
    #[must_use]
    pub fn levels(&self) -> &BTreeMap<String, u32> {
        &self.levels
    }

    /// Add `gain` with `agent` and return the new level.
    pub fn award(&mut self, agent: &str, gain: u32) -> u32 {
        let level = self.levels.entry(agent.to_string()).or_insert(0);
        *level = level.saturating_add(gain).min(self.cap);
        *level
    }

    /// Record discoveries and return the ones that are new.
    pub fn discover(&mut self, agent: &str, found: &[Discovery]) -> Vec<Discovery> {
        found
            .iter()
            .copied()
            .filter(|d| self.discovered.insert((agent.to_string(), *d)))
            .collect()
    }

    /// Everything discovered so far.
    pub fn discoveries(&self) -> impl Iterator<Item = (&str, Discovery)> {
        self.discovered.iter().map(|(a, d)| (a.as_str(), *d))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gains_stack() {
        assert_eq!(reply_gain("Hola, cariño.", false), 2);
        assert_eq!(reply_gain("¿Cómo estás", false), 3);
        assert_eq!(reply_gain("¿Y tú?", true), 5);
    }

    #[test]
    fn award_is_capped() {
        let mut friendship = Friendship::new(&["Elena"], 100);
        assert_eq!(friendship.award("Elena", 60), 60);
        assert_eq!(friendship.award("Elena", 60), 100);
        assert_eq!(friendship.level("Marco"), 0);
    }

    #[test]
    fn discoveries_match_cues_once() {
        let mut profile = AgentProfile::named("Elena");
        profile.discovery.color = vec!["verde".into()];
        profile.discovery.food = vec!["sopa de calabaza".into()];

        let found = discoveries_in(&profile, "Me encanta el VERDE de las hojas");
        assert_eq!(found, vec![Discovery::FavoriteColor]);

        let mut friendship = Friendship::new(&["Elena"], 100);
        assert_eq!(friendship.discover("Elena", &found), vec![Discovery::FavoriteColor]);
        assert!(friendship.discover("Elena", &found).is_empty());
        assert_eq!(friendship.discoveries().count(), 1);
    }

    #[test]
    fn empty_cues_never_match() {
        let mut profile = AgentProfile::named("Gruk");
        profile.discovery.color = vec![String::new()];
        assert!(discoveries_in(&profile, "cualquier cosa").is_empty());
    }
}

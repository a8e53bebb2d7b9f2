//! Canned replies for when generation is unavailable.
//!
//! Each agent has a small phrase table per activity plus a default table.
//! Selection always succeeds: there is no layer below this one.

use std::collections::BTreeMap;
use std::path::Path;

use rand::Rng;
use rand::seq::SliceRandom;
use serde::Deserialize;

use crate::error::{GenerationError, Result};

/// The built-in phrase tables for the village roster.
const SUNNYSIDE_PHRASES: &str = include_str!("../assets/fallback_phrases.toml");

/// Activity assumed when the caller does not know one.
pub const DEFAULT_ACTIVITY: &str = "resting";

/// Chance that one unaddressed agent chimes in next to the addressed ones.
const EXTRA_RESPONDER_CHANCE: f64 = 0.3;

#[derive(Debug, Clone, Deserialize)]
struct PhraseFile {
    agents: BTreeMap<String, AgentPhrases>,
}

#[derive(Debug, Clone, Deserialize)]
struct AgentPhrases {
    default: Vec<String>,
    #[serde(default)]
    activities: BTreeMap<String, Vec<String>>,
}

impl AgentPhrases {
    fn for_activity(&self, activity: &str) -> &[String] {
        self.activities
            .get(activity)
            .filter(|p| !p.is_empty())
            .unwrap_or(&self.default)
    }
}

/// Per-agent, per-activity phrase tables.
#[derive(Debug, Clone)]
pub struct ContextualFallback {
    agents: BTreeMap<String, AgentPhrases>,
}

impl ContextualFallback {
    /// Tables for the built-in village.
    ///
    /// # Errors
    /// Returns [`GenerationError::Config`] if the embedded asset is invalid.
    pub fn sunnyside() -> Result<Self> {
        Self::from_toml(SUNNYSIDE_PHRASES)
    }

    /// Parse tables from TOML.
    ///
    /// # Errors
    /// Returns [`GenerationError::Config`] on a parse error, an empty file
    /// or an agent without default phrases.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let file: PhraseFile = toml::from_str(toml_str).map_err(|e| GenerationError::Config(e.to_string()))?;
        if file.agents.is_empty() {
            return Err(GenerationError::Config("fallback table has no agents".into()));
        }
        if let Some((name, _)) = file.agents.iter().find(|(_, p)| p.default.is_empty()) {
            return Err(GenerationError::Config(format!("{name} has no default fallback phrases")));
        }
        Ok(Self { agents: file.agents })
    }

    /// Load tables from a file.
    ///
    /// # Errors
    /// Returns [`GenerationError::Config`] if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| GenerationError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml(&text)
    }

    /// Agents with phrase tables.
    pub fn agents(&self) -> impl Iterator<Item = &str> {
        self.agents.keys().map(String::as_str)
    }

    /// Phrases `agent` may use while doing `activity`.
    #[must_use]
    pub fn phrases(&self, agent: &str, activity: &str) -> Option<&[String]> {
        self.agents.get(agent).map(|p| p.for_activity(activity))
    }

    /// Pick responders and a line for each.
    ///
    /// Addressed agents always answer, occasionally joined by one other.
    /// Otherwise one or two random agents speak up. Never empty.
    pub fn respond<R: Rng + ?Sized>(
        &self,
        activities: &BTreeMap<String, String>,
        addressed: &[String],
        rng: &mut R,
    ) -> Vec<(String, String)> {
        let known: Vec<&String> = self.agents.keys().collect();
        let mut responders: Vec<&String> = addressed
            .iter()
            .filter_map(|a| self.agents.get_key_value(a).map(|(k, _)| k))
            .collect();

        if responders.is_empty() {
            let mut shuffled = known.clone();
            shuffled.shuffle(rng);
            let count = rng.gen_range(1..=2).min(shuffled.len());
            responders.extend(shuffled.into_iter().take(count));
        } else if rng.gen_bool(EXTRA_RESPONDER_CHANCE) {
            let others: Vec<&String> = known.iter().copied().filter(|k| !responders.contains(k)).collect();
            if let Some(extra) = others.choose(rng) {
                responders.push(*extra);
            }
        }

        responders
            .into_iter()
            .filter_map(|name| {
                let activity = activities.get(name).map_or(DEFAULT_ACTIVITY, String::as_str);
                let line = self.phrases(name, activity)?.choose(rng)?;
                Some((name.clone(), line.clone()))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn fallback() -> ContextualFallback {
        ContextualFallback::sunnyside().expect("phrases")
    }

    #[test]
    fn every_village_agent_has_tables() {
        let fb = fallback();
        assert_eq!(fb.agents().collect::<Vec<_>>(), vec!["Bones", "Elena", "Gruk", "Marco"]);
        assert_eq!(fb.phrases("Elena", "watering").map(<[String]>::len), Some(2));
    }

    #[test]
    fn unknown_activity_uses_defaults() {
        let fb = fallback();
        let phrases = fb.phrases("Gruk", "knitting").expect("gruk");
        assert!(phrases.contains(&"¡Shiny!".to_string()));
    }

    #[test]
    fn addressed_agent_answers_first() {
        let fb = fallback();
        let mut activities = BTreeMap::new();
        activities.insert("Elena".to_string(), "watering".to_string());
        for seed in 0..20 {
            let mut rng = StdRng::seed_from_u64(seed);
            let out = fb.respond(&activities, &["Elena".to_string()], &mut rng);
            assert_eq!(out[0].0, "Elena");
            assert!(fb.phrases("Elena", "watering").expect("elena").contains(&out[0].1));
            assert!(out.len() <= 2);
        }
    }

    #[test]
    fn never_empty_without_activities() {
        let fb = fallback();
        for seed in 0..50 {
            let mut rng = StdRng::seed_from_u64(seed);
            let out = fb.respond(&BTreeMap::new(), &[], &mut rng);
            assert!((1..=2).contains(&out.len()));
        }
    }

    #[test]
    fn unknown_addressees_fall_back_to_random_agents() {
        let fb = fallback();
        let mut rng = StdRng::seed_from_u64(3);
        let out = fb.respond(&BTreeMap::new(), &["Nadie".to_string()], &mut rng);
        assert!(!out.is_empty());
    }

    #[test]
    fn tables_need_defaults() {
        let err = ContextualFallback::from_toml("[agents.Ana]\ndefault = []\n");
        assert!(err.is_err());
    }
}

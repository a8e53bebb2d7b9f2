//! What agents learn about a player from chat.
//!
//! A small fixed set of patterns pulls personal facts out of each message
//! and merges them into the player's [`PlayerFacts`]. Trivial words and
//! agent names never overwrite a stored value.

use std::collections::BTreeMap;
use std::fmt;

use regex::Regex;
use serde::Serialize;
use tracing::debug;

use crate::error::Result;

/// Captures shorter than this (in chars) are ignored.
const MIN_VALUE_CHARS: usize = 2;
/// Captures this long or longer are ignored.
const MAX_VALUE_CHARS: usize = 30;

/// Words that are never stored as a fact value.
const SKIP_WORDS: &[&str] = &["hola", "si", "no", "que", "como", "bien", "mal"];

/// A kind of fact a player can reveal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FactKey {
    /// Real name.
    Name,
    /// Age in years.
    Age,
    /// Favourite colour.
    FavoriteColor,
    /// Favourite food.
    FavoriteFood,
    /// Pastime.
    Hobby,
    /// Job.
    Occupation,
}

impl FactKey {
    /// Label used in prompts.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Name => "nombre_real",
            Self::Age => "edad",
            Self::FavoriteColor => "color_favorito",
            Self::FavoriteFood => "comida_favorita",
            Self::Hobby => "hobby",
            Self::Occupation => "profesion",
        }
    }
}

impl fmt::Display for FactKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Patterns per key. Within a key, later matches win.
const PATTERNS: &[(FactKey, &[&str])] = &[
    (
        FactKey::Name,
        &[r"me llamo (\w+)", r"mi nombre (?:real )?(?:es|será) (\w+)", r"soy (\w+)"],
    ),
    (
        FactKey::Age,
        &[r"tengo (\d+) años", r"mi edad (?:es|son) (\d+)", r"(\d+) años"],
    ),
    (
        FactKey::FavoriteColor,
        &[
            r"mi color favorito (?:es|será) (?:el )?(\w+)",
            r"me gusta (?:el color )?(\w+)",
            r"favorito (?:es|el) (\w+)",
        ],
    ),
    (
        FactKey::FavoriteFood,
        &[
            r"mi comida favorita (?:es|será) (.+?)(?:\.|$)",
            r"me gusta (?:comer|la comida) (.+?)(?:\.|$)",
        ],
    ),
    (
        FactKey::Hobby,
        &[
            r"me gusta (?:mucho )?(?:el |la |los |las )?(\w+(?:\s\w+)?)",
            r"mi hobby (?:es|será) (.+?)(?:\.|$)",
        ],
    ),
    (
        FactKey::Occupation,
        &[r"soy (\w+(?:\s\w+)?) de profesión", r"trabajo (?:como|de) (.+?)(?:\.|$)"],
    ),
];

/// Facts known about one player, held for the session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PlayerFacts(BTreeMap<FactKey, String>);

impl PlayerFacts {
    /// No facts yet.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A stored value.
    #[must_use]
    pub fn get(&self, key: FactKey) -> Option<&str> {
        self.0.get(&key).map(String::as_str)
    }

    /// Store or replace a value.
    pub fn insert(&mut self, key: FactKey, value: impl Into<String>) {
        self.0.insert(key, value.into());
    }

    /// All facts in key order.
    pub fn iter(&self) -> impl Iterator<Item = (FactKey, &str)> {
        self.0.iter().map(|(k, v)| (*k, v.as_str()))
    }

    /// Number of facts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether nothing is known.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// `k=v, k=v` for prompts.
    #[must_use]
    pub fn summary(&self) -> String {
        self.0
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Compiled fact patterns plus the words that may never become values.
#[derive(Debug, Clone)]
pub struct PlayerFactExtractor {
    patterns: Vec<(FactKey, Vec<Regex>)>,
    skip: Vec<String>,
}

impl PlayerFactExtractor {
    /// Compile the patterns. Roster names join the skip list.
    ///
    /// # Errors
    /// Returns [`CoreError::Pattern`](crate::CoreError::Pattern) if a pattern
    /// fails to compile.
    pub fn new<S: AsRef<str>>(roster: &[S]) -> Result<Self> {
        let patterns = PATTERNS
            .iter()
            .map(|(key, sources)| {
                let compiled = sources
                    .iter()
                    .map(|p| Regex::new(&format!("(?i){p}")))
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok((*key, compiled))
            })
            .collect::<Result<Vec<_>>>()?;
        let skip = roster
            .iter()
            .map(|n| n.as_ref().to_lowercase())
            .chain(SKIP_WORDS.iter().map(|w| (*w).to_string()))
            .collect();
        Ok(Self { patterns, skip })
    }

    /// Merge whatever `message` reveals into `facts`.
    ///
    /// Returns the keys that were not known before this message.
    pub fn extract(&self, message: &str, facts: &mut PlayerFacts) -> Vec<FactKey> {
        let lower = message.to_lowercase();
        let mut revealed = Vec::new();
        for (key, patterns) in &self.patterns {
            for pattern in patterns {
                let Some(capture) = pattern.captures(&lower).and_then(|c| c.get(1)) else {
                    continue;
                };
                let len = capture.as_str().chars().count();
                if !(MIN_VALUE_CHARS..MAX_VALUE_CHARS).contains(&len) {
                    continue;
                }
                let value = capture.as_str().trim();
                if self.skip.iter().any(|w| w == value) {
                    continue;
                }
                if facts.get(*key).is_none() && !revealed.contains(key) {
                    revealed.push(*key);
                }
                facts.insert(*key, value);
            }
        }
        if !revealed.is_empty() {
            debug!(keys = ?revealed, "player revealed facts");
        }
        revealed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extractor() -> PlayerFactExtractor {
        PlayerFactExtractor::new(&["Elena", "Marco", "Gruk", "Bones"]).expect("patterns")
    }

    #[test]
    fn name_and_age() {
        let mut facts = PlayerFacts::new();
        let revealed = extractor().extract("Hola! Me llamo Lucía y tengo 25 años", &mut facts);
        assert_eq!(revealed, vec![FactKey::Name, FactKey::Age]);
        assert_eq!(facts.get(FactKey::Name), Some("lucía"));
        assert_eq!(facts.get(FactKey::Age), Some("25"));
    }

    #[test]
    fn agent_names_never_become_values() {
        let mut facts = PlayerFacts::new();
        facts.insert(FactKey::Name, "lucía");
        let revealed = extractor().extract("soy Elena", &mut facts);
        assert!(revealed.is_empty());
        assert_eq!(facts.get(FactKey::Name), Some("lucía"));
    }

    #[test]
    fn trivial_words_are_skipped() {
        let mut facts = PlayerFacts::new();
        extractor().extract("soy bien", &mut facts);
        assert!(facts.is_empty());
    }

    #[test]
    fn food_and_occupation() {
        let mut facts = PlayerFacts::new();
        let ex = extractor();
        ex.extract("Mi comida favorita es la paella.", &mut facts);
        ex.extract("Trabajo como carpintero", &mut facts);
        assert_eq!(facts.get(FactKey::FavoriteFood), Some("la paella"));
        assert_eq!(facts.get(FactKey::Occupation), Some("carpintero"));
    }

    #[test]
    fn known_keys_are_not_reported_again() {
        let mut facts = PlayerFacts::new();
        let ex = extractor();
        assert_eq!(ex.extract("tengo 30 años", &mut facts), vec![FactKey::Age]);
        assert!(ex.extract("tengo 31 años", &mut facts).is_empty());
        assert_eq!(facts.get(FactKey::Age), Some("31"));
    }

    #[test]
    fn summary_lists_pairs() {
        let mut facts = PlayerFacts::new();
        facts.insert(FactKey::Age, "25");
        facts.insert(FactKey::Name, "ana");
        assert_eq!(facts.summary(), "nombre_real=ana, edad=25");
    }
}

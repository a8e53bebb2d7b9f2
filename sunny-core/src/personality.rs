//! Static per-agent configuration.
//!
//! A [`PersonalityCatalog`] is read-only after load. Prompt builders read the
//! flavour text, the drives and the engine read [`SocialTraits`], and the
//! memory book seeds each agent's starting knowledge from it.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::memory::Emotion;

/// The built-in village roster.
const SUNNYSIDE_TOML: &str = include_str!("../assets/sunnyside.toml");

/// Marker used in [`CoreKnowledge::about`] for facts an agent holds about itself.
pub const SELF_KNOWLEDGE: &str = "self";

/// Social parameters read by the drives and the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SocialTraits {
    /// Fixed part of the typing delay, ms.
    #[serde(default = "default_typing_base")]
    pub typing_base_ms: u64,
    /// Random extra typing delay, up to this many ms.
    #[serde(default = "default_typing_variance")]
    pub typing_variance_ms: u64,
    /// Probability of chiming in when not addressed.
    #[serde(default = "default_probability")]
    pub talkativeness: f64,
    /// Probability weight for starting conversations.
    #[serde(default = "default_probability")]
    pub initiative: f64,
    /// Soft cap on message length, chars.
    #[serde(default = "default_verbosity")]
    pub verbosity: usize,
    /// Topics the agent likes to bring up.
    #[serde(default)]
    pub interests: Vec<String>,
    /// Preference weight toward each other agent.
    #[serde(default)]
    pub affinities: BTreeMap<String, f64>,
}

impl Default for SocialTraits {
    fn default() -> Self {
        Self {
            typing_base_ms: default_typing_base(),
            typing_variance_ms: default_typing_variance(),
            talkativeness: default_probability(),
            initiative: default_probability(),
            verbosity: default_verbosity(),
            interests: Vec::new(),
            affinities: BTreeMap::new(),
        }
    }
}

/// Keywords that reveal an agent's favourite colour or food when spoken.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryKeywords {
    /// Favourite-colour cues.
    #[serde(default)]
    pub color: Vec<String>,
    /// Favourite-food cues.
    #[serde(default)]
    pub food: Vec<String>,
}

/// Knowledge an agent starts every session with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoreKnowledge {
    /// Another agent's name, or [`SELF_KNOWLEDGE`].
    pub about: String,
    /// Facts stored as permanent semantic memories.
    pub facts: Vec<String>,
    /// Standing feeling toward `about`; seeds one emotional memory.
    #[serde(default)]
    pub emotion: Option<Emotion>,
    /// Tags stored with the facts.
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Mood levels on a 0–100 scale. Profiles carry the starting values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Mood {
    /// Contentment.
    pub happiness: f64,
    /// Vigour.
    pub energy: f64,
    /// Satisfied need for company.
    pub social: f64,
}

impl Default for Mood {
    fn default() -> Self {
        Self {
            happiness: 50.0,
            energy: 50.0,
            social: 50.0,
        }
    }
}

impl Mood {
    /// Prompt label for happiness: feliz, normal or triste.
    #[must_use]
    pub fn happiness_label(&self) -> &'static str {
        if self.happiness > 70.0 {
            "feliz"
        } else if self.happiness > 40.0 {
            "normal"
        } else {
            "triste"
        }
    }

    /// Prompt label for the social need: sociable or solo.
    #[must_use]
    pub fn social_label(&self) -> &'static str {
        if self.social > 50.0 { "sociable" } else { "solo" }
    }
}

/// Everything static about one agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentProfile {
    /// Unique display name.
    pub name: String,
    /// Archetype: human, goblin, skeleton...
    pub kind: String,
    /// Role in the village.
    pub role: String,
    /// Short personality description.
    pub personality: String,
    /// Background story.
    #[serde(default)]
    pub backstory: String,
    /// Flavour strings; the first is used in compact prompts.
    #[serde(default)]
    pub quirks: Vec<String>,
    /// Baseline mood tag.
    #[serde(default)]
    pub mood: String,
    /// Greeting line.
    #[serde(default)]
    pub greeting: String,
    /// Favourite colour.
    #[serde(default)]
    pub favorite_color: String,
    /// Favourite food.
    #[serde(default)]
    pub favorite_food: String,
    /// Style reminder embedded in prompts to keep the voice consistent.
    #[serde(default)]
    pub style: String,
    /// Activity labels the agent cycles through.
    #[serde(default)]
    pub activities: Vec<String>,
    /// Starting mood.
    #[serde(default)]
    pub mood_baseline: Mood,
    /// Starting relationship score (0–100) toward other agents.
    #[serde(default)]
    pub bonds: BTreeMap<String, f64>,
    /// Drive and engine parameters.
    #[serde(default)]
    pub social: SocialTraits,
    /// Discovery cues.
    #[serde(default)]
    pub discovery: DiscoveryKeywords,
    /// Seeded knowledge.
    #[serde(default)]
    pub knowledge: Vec<CoreKnowledge>,
}

impl AgentProfile {
    /// A bare profile with default social traits, mostly for tests.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: "human".to_string(),
            role: String::new(),
            personality: String::new(),
            backstory: String::new(),
            quirks: Vec::new(),
            mood: String::new(),
            greeting: String::new(),
            favorite_color: String::new(),
            favorite_food: String::new(),
            style: String::new(),
            activities: Vec::new(),
            mood_baseline: Mood::default(),
            bonds: BTreeMap::new(),
            social: SocialTraits::default(),
            discovery: DiscoveryKeywords::default(),
            knowledge: Vec::new(),
        }
    }

    /// Affinity toward `other`, if configured.
    #[must_use]
    pub fn affinity_toward(&self, other: &str) -> Option<f64> {
        self.social.affinities.get(other).copied()
    }

    /// The first quirk, or an empty string.
    #[must_use]
    pub fn signature_quirk(&self) -> &str {
        self.quirks.first().map_or("", String::as_str)
    }
}

/// The full roster, in declaration order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonalityCatalog {
    agents: Vec<AgentProfile>,
}

impl PersonalityCatalog {
    /// The built-in four-agent village.
    ///
    /// # Errors
    /// Returns [`CoreError::Catalog`] if the embedded asset fails to parse,
    /// which would be a packaging bug.
    pub fn sunnyside() -> Result<Self> {
        Self::from_toml(SUNNYSIDE_TOML)
    }

    /// Build a catalog from profiles.
    ///
    /// # Errors
    /// Returns [`CoreError::Catalog`] on an empty roster or duplicate names.
    pub fn new(agents: Vec<AgentProfile>) -> Result<Self> {
        if agents.is_empty() {
            return Err(CoreError::Catalog("roster is empty".to_string()));
        }
        for (i, agent) in agents.iter().enumerate() {
            if agent.name.trim().is_empty() {
                return Err(CoreError::Catalog(format!("agent #{i} has no name")));
            }
            if agents[..i].iter().any(|a| a.name.eq_ignore_ascii_case(&agent.name)) {
                return Err(CoreError::Catalog(format!("duplicate agent {}", agent.name)));
            }
        }
        Ok(Self { agents })
    }

    /// Load a catalog from a TOML string with an `[[agents]]` array.
    ///
    /// # Errors
    /// Returns [`CoreError::Catalog`] if the TOML is invalid or the roster
    /// fails validation.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        #[derive(Deserialize)]
        struct Raw {
            agents: Vec<AgentProfile>,
        }
        let raw: Raw = toml::from_str(toml_str).map_err(|e| CoreError::Catalog(e.to_string()))?;
        Self::new(raw.agents)
    }

    /// Load a catalog from a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Look up an agent by exact name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&AgentProfile> {
        self.agents.iter().find(|a| a.name == name)
    }

    /// Look up an agent ignoring case.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<&AgentProfile> {
        self.agents.iter().find(|a| a.name.eq_ignore_ascii_case(name))
    }

    /// Whether `name` is on the roster.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Agent names in roster order.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.agents.iter().map(|a| a.name.clone()).collect()
    }

    /// All profiles in roster order.
    pub fn iter(&self) -> impl Iterator<Item = &AgentProfile> {
        self.agents.iter()
    }

    /// Number of agents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.agents.len()
    }

    /// Always `false`; a catalog cannot be empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}

fn default_typing_base() -> u64 {
    3_000
}
fn default_typing_variance() -> u64 {
    1_500
}
fn default_probability() -> f64 {
    0.3
}
fn default_verbosity() -> usize {
    50
}

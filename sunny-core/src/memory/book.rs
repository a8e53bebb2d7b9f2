//! One memory store per agent, plus the rules for turning what agents hear
//! into memories.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use crate::classify::{KeywordClassifier, TextClassifier};
use crate::config::MemoryConfig;
use crate::dice::Dice;
use crate::error::Result;
use crate::memory::store::{Feeling, MemoryStore, StoreStats};
use crate::memory::{Emotion, Importance, Memory, NewMemory};
use crate::personality::{PersonalityCatalog, SELF_KNOWLEDGE};
use crate::retrieval::{RecallQuery, Recollection};
use crate::types::{MemoryId, Timestamp, truncate_chars};

/// Characters of an utterance kept in the episodic memory of hearing it.
const UTTERANCE_EXCERPT: usize = 80;
/// Facts listed per person in a relationship summary.
const RELATIONSHIP_FACTS: usize = 5;
/// Facts listed per person in prompt context.
const CONTEXT_FACTS: usize = 3;

/// What one agent knows and feels about another.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Relationship {
    /// Strongest memories about them.
    pub facts: Vec<Memory>,
    /// Aggregated feeling.
    pub feeling: Feeling,
}

/// Point-in-time view of one store.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoreSnapshot {
    /// Summary numbers.
    pub stats: StoreStats,
    /// Strongest memories.
    pub strongest: Vec<Memory>,
}

/// Every agent's memory store.
#[derive(Debug, Clone)]
pub struct MemoryBook {
    stores: BTreeMap<String, MemoryStore>,
    classifier: Arc<dyn TextClassifier>,
    config: MemoryConfig,
}

impl MemoryBook {
    /// Empty stores for every agent in the catalog.
    #[must_use]
    pub fn new(catalog: &PersonalityCatalog, config: MemoryConfig, classifier: Arc<dyn TextClassifier>) -> Self {
        let stores = catalog
            .iter()
            .map(|p| (p.name.clone(), MemoryStore::new(p.name.clone(), config.clone())))
            .collect();
        Self {
            stores,
            classifier,
            config,
        }
    }

    /// Stores backed by the default [`KeywordClassifier`], seeded with each
    /// agent's core knowledge.
    ///
    /// # Errors
    /// Fails only if the classifier's built-in patterns do not compile.
    pub fn seeded(catalog: &PersonalityCatalog, config: MemoryConfig, now: Timestamp) -> Result<Self> {
        let classifier = KeywordClassifier::new(&catalog.names())?;
        let mut book = Self::new(catalog, config, Arc::new(classifier));
        book.seed_core_knowledge(catalog, now);
        Ok(book)
    }

    /// Store every agent's starting knowledge: permanent facts, plus one
    /// emotional memory per agent they have a standing feeling toward.
    pub fn seed_core_knowledge(&mut self, catalog: &PersonalityCatalog, now: Timestamp) {
        for profile in catalog.iter() {
            let Some(store) = self.stores.get_mut(&profile.name) else {
                continue;
            };
            for knowledge in &profile.knowledge {
                let is_self = knowledge.about == SELF_KNOWLEDGE;
                let about = if is_self { profile.name.as_str() } else { knowledge.about.as_str() };
                for fact in &knowledge.facts {
                    store.remember(
                        NewMemory::semantic(fact.as_str())
                            .about(about)
                            .tags(&knowledge.tags)
                            .importance(Importance::PERMANENT)
                            .emotion(knowledge.emotion.unwrap_or_default()),
                        now,
                    );
                }
                if let (false, Some(emotion)) = (is_self, knowledge.emotion) {
                    store.remember(
                        NewMemory::emotional(format!("Siento {} hacia {about}", emotion.sentiment_word()))
                            .about(about)
                            .tags([about.to_lowercase()])
                            .importance(Importance::HIGH)
                            .emotion(emotion),
                        now,
                    );
                }
            }
        }
        info!(agents = self.stores.len(), "seeded core knowledge");
    }

    /// The text classifier in use.
    #[must_use]
    pub fn classifier(&self) -> &dyn TextClassifier {
        self.classifier.as_ref()
    }

    /// Memory settings shared by every store.
    #[must_use]
    pub fn config(&self) -> &MemoryConfig {
        &self.config
    }

    /// One agent's store.
    #[must_use]
    pub fn store(&self, agent: &str) -> Option<&MemoryStore> {
        self.stores.get(agent)
    }

    /// One agent's store, mutably.
    pub fn store_mut(&mut self, agent: &str) -> Option<&mut MemoryStore> {
        self.stores.get_mut(agent)
    }

    /// Store a memory for `agent`. Unknown agents are ignored.
    pub fn remember(&mut self, agent: &str, draft: NewMemory, now: Timestamp) -> Option<MemoryId> {
        match self.stores.get_mut(agent) {
            Some(store) => Some(store.remember(draft, now)),
            None => {
                debug!(agent, "ignoring memory for unknown agent");
                None
            }
        }
    }

    /// `listener` heard `speaker` say `text`.
    ///
    /// Stores an episodic memory of the utterance and a semantic memory for
    /// every fact the speaker revealed about themselves.
    pub fn observe_utterance(&mut self, listener: &str, speaker: &str, text: &str, now: Timestamp) {
        let Some(store) = self.stores.get_mut(listener) else {
            return;
        };
        let classifier = self.classifier.as_ref();
        store.remember(
            NewMemory::episodic(format!("{speaker} dijo: \"{}\"", truncate_chars(text, UTTERANCE_EXCERPT)))
                .about(speaker)
                .tags(classifier.tags(text))
                .importance(classifier.importance(text, listener))
                .emotion(classifier.emotion(text)),
            now,
        );
        for fact in classifier.facts(speaker, text) {
            store.remember(
                NewMemory::semantic(fact.text)
                    .about(fact.subject)
                    .tags(fact.tags)
                    .importance(Importance::HIGH),
                now,
            );
        }
    }

    /// Both agents remember having talked about `topic`.
    pub fn record_interaction(&mut self, first: &str, second: &str, topic: &str, outcome: &str, now: Timestamp) {
        let topic_tags = self.classifier.tags(topic);
        for (agent, other) in [(first, second), (second, first)] {
            let Some(store) = self.stores.get_mut(agent) else {
                continue;
            };
            let text = format!("Hablé con {other} sobre {topic}. {outcome}");
            store.remember(
                NewMemory::episodic(text.trim())
                    .about(other)
                    .tags([other.to_lowercase()])
                    .tags(&topic_tags)
                    .importance(Importance::NORMAL),
                now,
            );
        }
    }

    /// `agent` tries to remember something.
    pub fn recall(&mut self, agent: &str, query: &RecallQuery, now: Timestamp, dice: &mut Dice) -> Recollection {
        match self.stores.get_mut(agent) {
            Some(store) => store.recall(query, now, dice),
            None => Recollection::Nothing,
        }
    }

    /// How `agent` feels about `other`.
    #[must_use]
    pub fn feeling(&self, agent: &str, other: &str) -> Feeling {
        self.stores
            .get(agent)
            .map_or_else(Feeling::neutral, |s| s.feelings_about(other))
    }

    /// What `agent` knows and feels about `other`.
    #[must_use]
    pub fn relationship(&self, agent: &str, other: &str) -> Relationship {
        let Some(store) = self.stores.get(agent) else {
            return Relationship {
                facts: Vec::new(),
                feeling: Feeling::neutral(),
            };
        };
        Relationship {
            facts: store
                .memories_about(other)
                .into_iter()
                .take(RELATIONSHIP_FACTS)
                .cloned()
                .collect(),
            feeling: store.feelings_about(other),
        }
    }

    /// Compact memory context for a prompt: recent events, then what
    /// `agent` knows and feels about each other participant.
    #[must_use]
    pub fn context_for(&self, agent: &str, participants: &[String]) -> String {
        let Some(store) = self.stores.get(agent) else {
            return String::new();
        };
        let mut parts = Vec::new();
        let recent = store.short_term_summary();
        if !recent.is_empty() {
            parts.push(format!("[Reciente] {recent}"));
        }
        for other in participants.iter().filter(|p| p.as_str() != agent) {
            let relationship = self.relationship(agent, other);
            if relationship.facts.is_empty() {
                continue;
            }
            let facts: Vec<&str> = relationship
                .facts
                .iter()
                .take(CONTEXT_FACTS)
                .map(|m| m.text.as_str())
                .collect();
            let emotion: Emotion = relationship.feeling.emotion;
            parts.push(format!("[Sobre {other}] {}. Siento: {emotion}", facts.join(". ")));
        }
        parts.join("\n")
    }

    /// Run a decay pass over every store. Returns memories forgotten.
    pub fn tick_decay(&mut self) -> usize {
        let forgotten: usize = self.stores.values_mut().map(MemoryStore::tick).sum();
        debug!(forgotten, "memory decay pass");
        forgotten
    }

    /// Per-agent debug snapshot.
    #[must_use]
    pub fn snapshot(&self) -> BTreeMap<String, StoreSnapshot> {
        self.stores
            .iter()
            .map(|(name, store)| {
                (
                    name.clone(),
                    StoreSnapshot {
                        stats: store.stats(),
                        strongest: store.strongest(self.config.snapshot_size),
                    },
                )
            })
            .collect()
    }

    /// Agent names with a store.
    pub fn agents(&self) -> impl Iterator<Item = &str> {
        self.stores.keys().map(String::as_str)
    }
}

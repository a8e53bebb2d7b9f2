//! The bounded per-agent memory store.

use std::collections::{BTreeMap, VecDeque};

use serde::Serialize;
use tracing::trace;

use crate::config::MemoryConfig;
use crate::decay;
use crate::dice::Dice;
use crate::eviction;
use crate::memory::{Emotion, Memory, MemoryKind, NewMemory};
use crate::retrieval::{self, RecallQuery, Recollection};
use crate::types::{MemoryId, Timestamp};

/// Aggregated feeling toward someone.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Feeling {
    /// Dominant emotion by summed strength.
    pub emotion: Emotion,
    /// `min(1, dominant strength / 3)`.
    pub intensity: f64,
    /// Text of the most recent emotional memory about them.
    pub reason: Option<String>,
}

impl Feeling {
    /// No emotional memories at all.
    #[must_use]
    pub fn neutral() -> Self {
        Self {
            emotion: Emotion::Neutral,
            intensity: 0.0,
            reason: None,
        }
    }
}

/// Summary numbers for introspection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoreStats {
    /// Memories held.
    pub total: usize,
    /// Entries in the short-term buffer.
    pub short_term: usize,
    /// Count per kind.
    pub by_kind: BTreeMap<MemoryKind, usize>,
    /// Mean strength, rounded to two decimals.
    pub average_strength: f64,
}

/// One agent's memories plus a short-term buffer of the latest ones.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    owner: String,
    memories: Vec<Memory>,
    short_term: VecDeque<Memory>,
    config: MemoryConfig,
}

impl MemoryStore {
    /// Create an empty store for `owner`.
    #[must_use]
    pub fn new(owner: impl Into<String>, config: MemoryConfig) -> Self {
        Self {
            owner: owner.into(),
            memories: Vec::new(),
            short_term: VecDeque::new(),
            config,
        }
    }

    /// The agent this store belongs to.
    #[must_use]
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Store a new memory, then evict the weakest if over capacity.
    ///
    /// The returned ID may already be gone if the new memory was itself the
    /// weakest candidate.
    pub fn remember(&mut self, draft: NewMemory, now: Timestamp) -> MemoryId {
        let memory = Memory::from_draft(self.owner.clone(), draft, now);
        let id = memory.id;
        trace!(owner = %self.owner, kind = memory.kind.as_str(), text = %memory.text, "remember");

        self.short_term.push_back(memory.clone());
        while self.short_term.len() > self.config.short_term_capacity {
            self.short_term.pop_front();
        }
        self.memories.push(memory);
        eviction::enforce_capacity(&mut self.memories, self.config.capacity);
        id
    }

    /// Try to remember something. See [`retrieval::recall`].
    pub fn recall(&mut self, query: &RecallQuery, now: Timestamp, dice: &mut Dice) -> Recollection {
        retrieval::recall(&mut self.memories, query, &self.config, now, dice)
    }

    /// Every memory concerning `subject`, strongest first.
    #[must_use]
    pub fn memories_about(&self, subject: &str) -> Vec<&Memory> {
        let mut found: Vec<&Memory> = self.memories.iter().filter(|m| m.concerns(subject)).collect();
        found.sort_by(|a, b| b.strength.total_cmp(&a.strength));
        found
    }

    /// Aggregate the emotional memories about `subject`.
    #[must_use]
    pub fn feelings_about(&self, subject: &str) -> Feeling {
        let lowered = subject.to_lowercase();
        let emotional: Vec<&Memory> = self
            .memories
            .iter()
            .filter(|m| {
                m.kind == MemoryKind::Emotional && m.subject.as_deref().is_some_and(|s| s.to_lowercase() == lowered)
            })
            .collect();
        let Some(latest) = emotional.iter().max_by_key(|m| m.created_at) else {
            return Feeling::neutral();
        };

        let mut totals: BTreeMap<Emotion, f64> = BTreeMap::new();
        for m in &emotional {
            *totals.entry(m.emotion).or_default() += m.strength;
        }
        let (emotion, total) = totals
            .into_iter()
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .unwrap_or((Emotion::Neutral, 0.0));

        Feeling {
            emotion,
            intensity: (total / 3.0).min(1.0),
            reason: Some(latest.text.clone()),
        }
    }

    /// Run one decay pass. Returns the number of memories forgotten.
    pub fn tick(&mut self) -> usize {
        decay::decay_memories(
            &mut self.memories,
            self.config.base_decay_rate,
            self.config.strength_floor,
        )
    }

    /// The recent memories joined into one line, oldest first.
    #[must_use]
    pub fn short_term_summary(&self) -> String {
        self.short_term
            .iter()
            .map(|m| m.text.as_str())
            .collect::<Vec<_>>()
            .join(". ")
    }

    /// Look up a memory by ID.
    #[must_use]
    pub fn get(&self, id: MemoryId) -> Option<&Memory> {
        self.memories.iter().find(|m| m.id == id)
    }

    /// All memories in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Memory> {
        self.memories.iter()
    }

    /// Mutable access for tests and tools that need to age memories.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Memory> {
        self.memories.iter_mut()
    }

    /// Number of memories held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.memories.len()
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.memories.is_empty()
    }

    /// Summary statistics.
    #[must_use]
    pub fn stats(&self) -> StoreStats {
        let mut by_kind = BTreeMap::new();
        for m in &self.memories {
            *by_kind.entry(m.kind).or_insert(0) += 1;
        }
        let average_strength = if self.memories.is_empty() {
            0.0
        } else {
            #[allow(clippy::cast_precision_loss)]
            let mean = self.memories.iter().map(|m| m.strength).sum::<f64>() / self.memories.len() as f64;
            (mean * 100.0).round() / 100.0
        };
        StoreStats {
            total: self.memories.len(),
            short_term: self.short_term.len(),
            by_kind,
            average_strength,
        }
    }

    /// The strongest memories, for debug views.
    #[must_use]
    pub fn strongest(&self, n: usize) -> Vec<Memory> {
        let mut sorted: Vec<&Memory> = self.memories.iter().collect();
        sorted.sort_by(|a, b| b.strength.total_cmp(&a.strength));
        sorted.into_iter().take(n).cloned().collect()
    }
}

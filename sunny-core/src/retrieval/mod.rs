//! Probabilistic recall.
//!
//! Recall scores every memory against a query (see [`scoring`]) and keeps
//! those above a floor. Remembering is deliberately imperfect: a weak best
//! match sometimes only surfaces as a vague hint, and a middling one as a
//! single fuzzy memory. Callers that need a definite answer set
//! [`RecallQuery::must_succeed`].

pub mod scoring;

use std::cmp::Reverse;

use ordered_float::OrderedFloat;
use serde::Serialize;

use crate::config::MemoryConfig;
use crate::dice::Dice;
use crate::memory::Memory;
use crate::types::Timestamp;

use self::scoring::{PreparedQuery, compute_breakdown};

/// Top score below which a recall may come back vague.
pub const VAGUE_BELOW: f64 = 1.0;
/// Top score below which a recall may come back fuzzy.
pub const FUZZY_BELOW: f64 = 2.0;
/// Top score above which a recall feels vivid.
pub const VIVID_ABOVE: f64 = 4.0;

// ---------------------------------------------------------------------------
// Scores
// ---------------------------------------------------------------------------

/// Individual factor contributions before strength scaling.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ScoreBreakdown {
    /// Whole-query text match.
    pub text_match: f64,
    /// Significant query words found.
    pub word_hits: f64,
    /// Matching context tags.
    pub tag_hits: f64,
    /// Subject mentioned in the query.
    pub subject: f64,
    /// Recently touched.
    pub recency: f64,
    /// Emotionally coloured.
    pub emotion: f64,
    /// Memory strength multiplier.
    pub strength: f64,
}

impl ScoreBreakdown {
    /// Final relevance score.
    #[must_use]
    pub fn total(&self) -> f64 {
        (self.text_match + self.word_hits + self.tag_hits + self.subject + self.recency + self.emotion)
            * self.strength
    }
}

// ---------------------------------------------------------------------------
// Query & outcome
// ---------------------------------------------------------------------------

/// What to try to remember.
#[derive(Debug, Clone, Default)]
pub struct RecallQuery {
    /// Free text (a name, a topic).
    pub text: String,
    /// Context tags that boost matching memories.
    pub tags: Vec<String>,
    /// Cap on returned memories; `None` uses the configured default.
    pub max_results: Option<usize>,
    /// Skip the vague/fuzzy failure modes.
    pub must_succeed: bool,
}

impl RecallQuery {
    /// Query by free text.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    /// Add context tags.
    #[must_use]
    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    /// Cap the number of results.
    #[must_use]
    pub fn max_results(mut self, max: usize) -> Self {
        self.max_results = Some(max);
        self
    }

    /// Always return the full result set when anything matches.
    #[must_use]
    pub fn must_succeed(mut self) -> Self {
        self.must_succeed = true;
        self
    }
}

/// How confident the agent is in what it recalled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    /// A fuzzy partial memory.
    Low,
    /// A clear memory.
    Medium,
    /// A vivid memory.
    High,
}

/// How a recall attempt felt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RecallFeeling {
    /// Nothing came to mind.
    Nothing,
    /// Only a hint of the topic.
    Vague,
    /// One half-remembered memory.
    Fuzzy,
    /// A solid recollection.
    Clear,
    /// A strong, detailed recollection.
    Vivid,
}

/// Outcome of a recall attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum Recollection {
    /// No memory scored above the floor.
    Nothing,
    /// Something is there but won't surface; `hint` names the topic.
    Vague {
        /// Subject or first tag of the best match.
        hint: Option<String>,
    },
    /// Only the best match, half-remembered.
    Fuzzy {
        /// The recalled memory, after rehearsal.
        memory: Memory,
    },
    /// The top matches.
    Clear {
        /// Recalled memories, best first, after rehearsal.
        memories: Vec<Memory>,
        /// Whether the best score was above [`VIVID_ABOVE`].
        vivid: bool,
    },
}

impl Recollection {
    /// Whether any memory was returned.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Fuzzy { .. } | Self::Clear { .. })
    }

    /// Recalled memories, best first.
    #[must_use]
    pub fn memories(&self) -> &[Memory] {
        match self {
            Self::Fuzzy { memory } => std::slice::from_ref(memory),
            Self::Clear { memories, .. } => memories,
            Self::Nothing | Self::Vague { .. } => &[],
        }
    }

    /// How the recall felt.
    #[must_use]
    pub fn feeling(&self) -> RecallFeeling {
        match self {
            Self::Nothing => RecallFeeling::Nothing,
            Self::Vague { .. } => RecallFeeling::Vague,
            Self::Fuzzy { .. } => RecallFeeling::Fuzzy,
            Self::Clear { vivid: true, .. } => RecallFeeling::Vivid,
            Self::Clear { vivid: false, .. } => RecallFeeling::Clear,
        }
    }

    /// Confidence in the recalled memories, if any were returned.
    #[must_use]
    pub fn confidence(&self) -> Option<Confidence> {
        match self {
            Self::Fuzzy { .. } => Some(Confidence::Low),
            Self::Clear { vivid: true, .. } => Some(Confidence::High),
            Self::Clear { vivid: false, .. } => Some(Confidence::Medium),
            Self::Nothing | Self::Vague { .. } => None,
        }
    }

    /// Topic hint of a vague recall.
    #[must_use]
    pub fn hint(&self) -> Option<&str> {
        match self {
            Self::Vague { hint } => hint.as_deref(),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Recall
// ---------------------------------------------------------------------------

/// Score, filter and rank `memories` against `query`, applying the
/// probabilistic failure modes and rehearsing whatever is returned.
pub fn recall(
    memories: &mut [Memory],
    query: &RecallQuery,
    config: &MemoryConfig,
    now: Timestamp,
    dice: &mut Dice,
) -> Recollection {
    let prepared = PreparedQuery::new(&query.text, &query.tags);

    let mut scored: Vec<(usize, f64)> = memories
        .iter()
        .enumerate()
        .map(|(i, m)| (i, compute_breakdown(m, &prepared, now).total()))
        .filter(|(_, score)| *score > config.min_recall_score)
        .collect();
    if scored.is_empty() {
        return Recollection::Nothing;
    }
    scored.sort_by_key(|(_, score)| Reverse(OrderedFloat(*score)));

    let (top_idx, top_score) = scored[0];
    if !query.must_succeed {
        if top_score < VAGUE_BELOW && dice.chance(config.vague_chance) {
            let best = &memories[top_idx];
            let hint = best.subject.clone().or_else(|| best.tags.first().cloned());
            return Recollection::Vague { hint };
        }
        if top_score < FUZZY_BELOW && dice.chance(config.fuzzy_chance) {
            let best = &mut memories[top_idx];
            best.access(now);
            return Recollection::Fuzzy {
                memory: best.clone(),
            };
        }
    }

    let limit = query.max_results.unwrap_or(config.max_recall_results).max(1);
    let recalled = scored
        .iter()
        .take(limit)
        .map(|(i, _)| {
            let memory = &mut memories[*i];
            memory.access(now);
            memory.clone()
        })
        .collect();
    Recollection::Clear {
        memories: recalled,
        vivid: top_score > VIVID_ABOVE,
    }
}

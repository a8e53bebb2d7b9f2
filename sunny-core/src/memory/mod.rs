//! Memory entries and the per-agent stores that hold them.
//!
//! A [`Memory`] is one recollection held by one agent. Agents keep their
//! memories in a bounded [`MemoryStore`]; the [`MemoryBook`] holds one store
//! per agent and knows how to turn utterances into memories.

pub mod book;
pub mod store;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{MemoryId, Timestamp};

pub use book::MemoryBook;
pub use store::{Feeling, MemoryStore, StoreStats};

/// Strength regained every time a memory is recalled.
pub const REHEARSAL_BOOST: f64 = 0.15;

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// Which kind of recollection a memory is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryKind {
    /// Something that happened.
    Episodic,
    /// Something known to be true.
    Semantic,
    /// How the owner feels about someone.
    Emotional,
}

impl MemoryKind {
    /// Lowercase label.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Episodic => "episodic",
            Self::Semantic => "semantic",
            Self::Emotional => "emotional",
        }
    }
}

/// Emotional colouring of a memory.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Emotion {
    /// Warmth, appreciation.
    Happy,
    /// Sorrow, pity.
    Sad,
    /// Anger.
    Angry,
    /// Interest, intrigue.
    Curious,
    /// Finding something funny.
    Amused,
    /// Mild irritation.
    Annoyed,
    /// No particular feeling.
    #[default]
    Neutral,
}

impl Emotion {
    /// Lowercase label.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Happy => "happy",
            Self::Sad => "sad",
            Self::Angry => "angry",
            Self::Curious => "curious",
            Self::Amused => "amused",
            Self::Annoyed => "annoyed",
            Self::Neutral => "neutral",
        }
    }

    /// How an agent phrases this feeling toward someone, in village speech.
    #[must_use]
    pub fn sentiment_word(self) -> &'static str {
        match self {
            Self::Happy => "aprecio",
            Self::Annoyed => "fastidio",
            Self::Curious => "curiosidad",
            Self::Amused => "diversión",
            Self::Sad => "pena",
            Self::Angry => "rabia",
            Self::Neutral => "indiferencia",
        }
    }
}

impl fmt::Display for Emotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How much a memory matters. Higher importance decays more slowly and
/// survives eviction longer; [`Importance::PERMANENT`] never decays at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Importance(pub u8);

impl Importance {
    /// Small talk.
    pub const TRIVIAL: Self = Self(1);
    /// Short greetings and asides.
    pub const LOW: Self = Self(2);
    /// Ordinary conversation.
    pub const NORMAL: Self = Self(3);
    /// Personal revelations.
    pub const HIGH: Self = Self(5);
    /// Life-changing events.
    pub const CRITICAL: Self = Self(8);
    /// Core knowledge; exempt from decay and eviction.
    pub const PERMANENT: Self = Self(10);

    /// Whether this is the permanent tier.
    #[must_use]
    pub fn is_permanent(self) -> bool {
        self >= Self::PERMANENT
    }

    /// The tier as a float for scoring.
    #[must_use]
    pub fn weight(self) -> f64 {
        f64::from(self.0)
    }

    /// One tier-step above, saturating at permanent.
    #[must_use]
    pub fn bumped(self) -> Self {
        Self(self.0.saturating_add(1).min(Self::PERMANENT.0))
    }
}

impl Default for Importance {
    fn default() -> Self {
        Self::NORMAL
    }
}

// ---------------------------------------------------------------------------
// Memory
// ---------------------------------------------------------------------------

/// One recollection held by one agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Memory {
    /// Unique ID.
    pub id: MemoryId,
    /// Agent holding the memory.
    pub owner: String,
    /// Episodic, semantic or emotional.
    pub kind: MemoryKind,
    /// The recollection itself.
    pub text: String,
    /// Who or what it concerns.
    pub subject: Option<String>,
    /// Lowercase keywords.
    pub tags: Vec<String>,
    /// Importance tier.
    pub importance: Importance,
    /// Emotional colouring.
    pub emotion: Emotion,
    /// Current strength in (0, 1]; starts at 1.0.
    pub strength: f64,
    /// Times this memory has been recalled.
    pub access_count: u32,
    /// When the memory was formed.
    pub created_at: Timestamp,
    /// When it was last formed or recalled.
    pub last_access: Timestamp,
}

impl Memory {
    /// Build a full-strength memory from a draft.
    #[must_use]
    pub fn from_draft(owner: impl Into<String>, draft: NewMemory, now: Timestamp) -> Self {
        Self {
            id: MemoryId::new(),
            owner: owner.into(),
            kind: draft.kind,
            text: draft.text,
            subject: draft.subject,
            tags: draft.tags,
            importance: draft.importance,
            emotion: draft.emotion,
            strength: 1.0,
            access_count: 0,
            created_at: now,
            last_access: now,
        }
    }

    /// Rehearse the memory: count the access and restore some strength.
    pub fn access(&mut self, now: Timestamp) {
        self.access_count = self.access_count.saturating_add(1);
        self.strength = (self.strength + REHEARSAL_BOOST).min(1.0);
        self.last_access = now;
    }

    /// Apply one decay step at `rate`.
    ///
    /// Returns `false` when the memory has faded to `floor` or below and
    /// should be forgotten. Permanent memories are untouched and always
    /// survive.
    pub fn decay(&mut self, rate: f64, floor: f64) -> bool {
        if self.is_permanent() {
            return true;
        }
        self.strength -= crate::decay::decay_step(self.importance, self.access_count, rate);
        self.strength > floor
    }

    /// Whether this memory is exempt from decay and eviction.
    #[must_use]
    pub fn is_permanent(&self) -> bool {
        self.importance.is_permanent()
    }

    /// Whether the memory concerns `subject`, by subject or by tag.
    #[must_use]
    pub fn concerns(&self, subject: &str) -> bool {
        let lowered = subject.to_lowercase();
        self.subject
            .as_deref()
            .is_some_and(|s| s.to_lowercase() == lowered)
            || self.tags.iter().any(|t| *t == lowered)
    }
}

// ---------------------------------------------------------------------------
// Drafts
// ---------------------------------------------------------------------------

/// A memory about to be stored. Built with the chained setters.
///
/// ```
/// use sunny_core::memory::{Emotion, Importance, NewMemory};
///
/// let draft = NewMemory::episodic("Marco dijo: \"buenos días\"")
///     .about("Marco")
///     .tags(["marco"])
///     .importance(Importance::LOW)
///     .emotion(Emotion::Happy);
/// assert_eq!(draft.subject.as_deref(), Some("Marco"));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct NewMemory {
    /// Kind of memory.
    pub kind: MemoryKind,
    /// Text of the memory.
    pub text: String,
    /// Optional subject.
    pub subject: Option<String>,
    /// Keywords, lowercased on insertion.
    pub tags: Vec<String>,
    /// Importance tier.
    pub importance: Importance,
    /// Emotional colouring.
    pub emotion: Emotion,
}

impl NewMemory {
    /// Start a draft of the given kind.
    #[must_use]
    pub fn new(kind: MemoryKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
            subject: None,
            tags: Vec::new(),
            importance: Importance::NORMAL,
            emotion: Emotion::Neutral,
        }
    }

    /// Start an episodic draft.
    #[must_use]
    pub fn episodic(text: impl Into<String>) -> Self {
        Self::new(MemoryKind::Episodic, text)
    }

    /// Start a semantic draft.
    #[must_use]
    pub fn semantic(text: impl Into<String>) -> Self {
        Self::new(MemoryKind::Semantic, text)
    }

    /// Start an emotional draft.
    #[must_use]
    pub fn emotional(text: impl Into<String>) -> Self {
        Self::new(MemoryKind::Emotional, text)
    }

    /// Set the subject.
    #[must_use]
    pub fn about(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    /// Add tags. Duplicates are dropped and everything is lowercased.
    #[must_use]
    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for tag in tags {
            let tag = tag.as_ref().trim().to_lowercase();
            if !tag.is_empty() && !self.tags.contains(&tag) {
                self.tags.push(tag);
            }
        }
        self
    }

    /// Set the importance tier.
    #[must_use]
    pub fn importance(mut self, importance: Importance) -> Self {
        self.importance = importance;
        self
    }

    /// Set the emotion.
    #[must_use]
    pub fn emotion(mut self, emotion: Emotion) -> Self {
        self.emotion = emotion;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory(importance: Importance) -> Memory {
        Memory::from_draft(
            "Elena",
            NewMemory::episodic("Marco dijo: \"hola\"").importance(importance),
            Timestamp::ZERO,
        )
    }

    #[test]
    fn new_memory_starts_at_full_strength() {
        let m = memory(Importance::NORMAL);
        assert!((m.strength - 1.0).abs() < f64::EPSILON);
        assert_eq!(m.access_count, 0);
    }

    #[test]
    fn access_reinforces_and_caps() {
        let mut m = memory(Importance::NORMAL);
        m.strength = 0.5;
        m.access(Timestamp(10));
        assert!((m.strength - 0.65).abs() < 1e-9);
        assert_eq!(m.access_count, 1);
        assert_eq!(m.last_access, Timestamp(10));
        m.strength = 0.95;
        m.access(Timestamp(20));
        assert!((m.strength - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn permanent_memories_ignore_decay() {
        let mut m = memory(Importance::PERMANENT);
        for _ in 0..10_000 {
            assert!(m.decay(0.5, 0.05));
        }
        assert!((m.strength - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn trivial_memories_fade_out() {
        let mut m = memory(Importance::TRIVIAL);
        let mut passes = 0;
        while m.decay(0.02, 0.05) {
            passes += 1;
            assert!(passes < 1_000, "memory never faded");
        }
        assert!(m.strength <= 0.05);
    }

    #[test]
    fn tags_are_normalised() {
        let draft = NewMemory::semantic("x").tags(["Elena", "elena", " Plantas "]);
        assert_eq!(draft.tags, vec!["elena".to_string(), "plantas".to_string()]);
    }

    #[test]
    fn concerns_matches_subject_or_tag() {
        let m = Memory::from_draft(
            "Marco",
            NewMemory::semantic("Gruk roba manzanas").about("Gruk").tags(["manzanas"]),
            Timestamp::ZERO,
        );
        assert!(m.concerns("gruk"));
        assert!(m.concerns("Manzanas"));
        assert!(!m.concerns("Bones"));
    }
}

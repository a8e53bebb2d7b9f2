//! Per-factor relevance scoring for recall.
//!
//! Score = (Text + Words + Tags + Subject + Recency + Emotion) × strength
//!
//! Where:
//!   Text     = 3 if the memory text contains the whole query
//!   Words    = 1 per query word longer than two chars found in the text
//!   Tags     = 2 per context tag carried by the memory
//!   Subject  = 2 if the query mentions the memory's subject
//!   Recency  = 2 if touched in the last 5 minutes, 1 within 30 minutes
//!   Emotion  = 1 if the memory is emotionally coloured

use std::time::Duration;

use crate::memory::{Emotion, Memory};
use crate::retrieval::ScoreBreakdown;
use crate::types::Timestamp;

const FRESH_WINDOW: Duration = Duration::from_secs(5 * 60);
const RECENT_WINDOW: Duration = Duration::from_secs(30 * 60);

/// A query prepared once and scored against many memories.
#[derive(Debug, Clone)]
pub struct PreparedQuery {
    lowered: String,
    words: Vec<String>,
    tags: Vec<String>,
}

impl PreparedQuery {
    /// Lowercase the query, split out its significant words and normalise tags.
    #[must_use]
    pub fn new(query: &str, tags: &[String]) -> Self {
        let lowered = query.trim().to_lowercase();
        let words = lowered
            .split_whitespace()
            .filter(|w| w.chars().count() > 2)
            .map(str::to_string)
            .collect();
        let tags = tags.iter().map(|t| t.to_lowercase()).collect();
        Self { lowered, words, tags }
    }
}

/// Compute the full score breakdown for a single memory.
#[must_use]
pub fn compute_breakdown(memory: &Memory, query: &PreparedQuery, now: Timestamp) -> ScoreBreakdown {
    let text = memory.text.to_lowercase();

    let text_match = if !query.lowered.is_empty() && text.contains(&query.lowered) {
        3.0
    } else {
        0.0
    };
    let word_hits = count_f64(query.words.iter().filter(|w| text.contains(w.as_str())).count());
    let tag_hits = 2.0 * count_f64(query.tags.iter().filter(|t| memory.tags.contains(t)).count());
    let subject = match &memory.subject {
        Some(s) if !s.is_empty() && query.lowered.contains(&s.to_lowercase()) => 2.0,
        _ => 0.0,
    };
    let idle = now.since(memory.last_access);
    let recency = if idle < FRESH_WINDOW {
        2.0
    } else if idle < RECENT_WINDOW {
        1.0
    } else {
        0.0
    };
    let emotion = if memory.emotion == Emotion::Neutral { 0.0 } else { 1.0 };

    ScoreBreakdown {
        text_match,
        word_hits,
        tag_hits,
        subject,
        recency,
        emotion,
        strength: memory.strength,
    }
}

#[allow(clippy::cast_precision_loss)]
fn count_f64(n: usize) -> f64 {
    n as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::NewMemory;

    fn memory(text: &str) -> Memory {
        Memory::from_draft(
            "Marco",
            NewMemory::semantic(text).about("Gruk").tags(["gruk", "manzanas"]),
            Timestamp::ZERO,
        )
    }

    #[test]
    fn every_factor_adds_up() {
        let m = memory("Gruk roba manzanas del huerto");
        let q = PreparedQuery::new("Gruk roba", &["manzanas".to_string()]);
        let score = compute_breakdown(&m, &q, Timestamp::ZERO);
        assert!((score.text_match - 3.0).abs() < f64::EPSILON);
        assert!((score.word_hits - 2.0).abs() < f64::EPSILON);
        assert!((score.tag_hits - 2.0).abs() < f64::EPSILON);
        assert!((score.subject - 2.0).abs() < f64::EPSILON);
        assert!((score.recency - 2.0).abs() < f64::EPSILON);
        assert!(score.emotion.abs() < f64::EPSILON);
        assert!((score.total() - 11.0).abs() < 1e-9);
    }

    #[test]
    fn strength_scales_total() {
        let mut m = memory("Gruk roba manzanas");
        m.strength = 0.5;
        let q = PreparedQuery::new("gruk", &[]);
        let score = compute_breakdown(&m, &q, Timestamp::ZERO);
        // text 3 + word 1 + subject 2 + recency 2 = 8, halved
        assert!((score.total() - 4.0).abs() < 1e-9);
    }

    #[test]
    fn recency_fades_with_idle_time() {
        let m = memory("nada");
        let q = PreparedQuery::new("", &[]);
        let ten_min = Timestamp::ZERO.after(Duration::from_secs(600));
        let hour = Timestamp::ZERO.after(Duration::from_secs(3_600));
        assert!((compute_breakdown(&m, &q, ten_min).recency - 1.0).abs() < f64::EPSILON);
        assert!(compute_breakdown(&m, &q, hour).recency.abs() < f64::EPSILON);
    }

    #[test]
    fn empty_query_does_not_match_text() {
        let m = memory("cualquier cosa");
        let q = PreparedQuery::new("   ", &[]);
        assert!(compute_breakdown(&m, &q, Timestamp::ZERO).text_match.abs() < f64::EPSILON);
    }
}

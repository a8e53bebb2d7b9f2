//! How much agents like each other.
//!
//! Scores start at each profile's `bonds` and grow a little with every
//! village conversation. Only pairs listed in the catalog are tracked.

use std::collections::BTreeMap;

use serde::Serialize;
use sunny_core::PersonalityCatalog;
use tracing::debug;

/// Score gained, in both directions, per conversation together.
const CONVERSATION_GAIN: f64 = 2.0;

/// Directed agent-to-agent scores.
#[derive(Debug, Clone, Serialize)]
pub struct Bonds {
    scores: BTreeMap<String, BTreeMap<String, f64>>,
    #[serde(skip)]
    cap: f64,
}

impl Bonds {
    /// Scores from the catalog. None exceeds `cap`.
    #[must_use]
    pub fn new(catalog: &PersonalityCatalog, cap: f64) -> Self {
        let scores = catalog
            .iter()
            .map(|p| {
                let row = p.bonds.iter().map(|(other, s)| (other.clone(), s.min(cap))).collect();
                (p.name.clone(), row)
            })
            .collect();
        Self { scores, cap }
    }

    /// How much `agent` likes `other`.
    #[must_use]
    pub fn score(&self, agent: &str, other: &str) -> Option<f64> {
        self.scores.get(agent).and_then(|row| row.get(other)).copied()
    }

    /// Raise every tracked pair among the distinct `speakers`.
    pub fn after_conversation(&mut self, speakers: &[String]) {
        for (i, a) in speakers.iter().enumerate() {
            for b in &speakers[i + 1..] {
                if a == b {
                    continue;
                }
                self.raise(a, b);
                self.raise(b, a);
            }
        }
    }

    fn raise(&mut self, agent: &str, other: &str) {
        if let Some(score) = self.scores.get_mut(agent).and_then(|row| row.get_mut(other)) {
            *score = (*score + CONVERSATION_GAIN).min(self.cap);
            debug!(agent, other, score = *score, "bond strengthened");
        }
    }
}

//! Injectable randomness.
//!
//! Every probabilistic branch in the core (recall failures, initiative rolls,
//! target jitter, topic choice, cooldowns) draws from a [`Dice`]. Production
//! code seeds it from entropy; tests either seed it or script the exact rolls.

use std::collections::VecDeque;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// A source of uniform rolls in `[0, 1)`.
#[derive(Debug, Clone)]
pub struct Dice {
    source: Source,
}

#[derive(Debug, Clone)]
enum Source {
    Rng(StdRng),
    Scripted { rolls: VecDeque<f64>, rest: f64 },
}

impl Dice {
    /// Dice seeded from OS entropy.
    #[must_use]
    pub fn from_entropy() -> Self {
        Self {
            source: Source::Rng(StdRng::from_entropy()),
        }
    }

    /// Deterministic dice for a given seed.
    #[must_use]
    pub fn seeded(seed: u64) -> Self {
        Self {
            source: Source::Rng(StdRng::seed_from_u64(seed)),
        }
    }

    /// Dice that return `rolls` in order, then keep repeating the last one
    /// (or `0.5` if the script is empty).
    #[must_use]
    pub fn scripted(rolls: impl IntoIterator<Item = f64>) -> Self {
        let rolls: VecDeque<f64> = rolls.into_iter().map(clamp_roll).collect();
        let rest = rolls.back().copied().unwrap_or(0.5);
        Self {
            source: Source::Scripted { rolls, rest },
        }
    }

    /// A uniform roll in `[0, 1)`.
    pub fn roll(&mut self) -> f64 {
        match &mut self.source {
            Source::Rng(rng) => rng.gen_range(0.0..1.0),
            Source::Scripted { rolls, rest } => rolls.pop_front().unwrap_or(*rest),
        }
    }

    /// `true` with probability `p`.
    pub fn chance(&mut self, p: f64) -> bool {
        self.roll() < p
    }

    /// A uniform value in `[lo, hi)`.
    pub fn between(&mut self, lo: f64, hi: f64) -> f64 {
        lo + self.roll() * (hi - lo)
    }

    /// A uniform index into a collection of `len` items.
    pub fn index(&mut self, len: usize) -> Option<usize> {
        if len == 0 {
            return None;
        }
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
        let idx = (self.roll() * len as f64) as usize;
        Some(idx.min(len - 1))
    }

    /// A uniformly chosen element.
    pub fn pick<'a, T>(&mut self, items: &'a [T]) -> Option<&'a T> {
        self.index(items.len()).map(|i| &items[i])
    }

    /// An element chosen with probability proportional to `weight`.
    ///
    /// Non-positive weights are never chosen unless every weight is.
    pub fn weighted<'a, T>(&mut self, items: &'a [T], weight: impl Fn(&T) -> f64) -> Option<&'a T> {
        let total: f64 = items.iter().map(|item| weight(item).max(0.0)).sum();
        if total <= 0.0 {
            return self.pick(items);
        }
        let mut target = self.roll() * total;
        for item in items {
            let w = weight(item).max(0.0);
            if target < w {
                return Some(item);
            }
            target -= w;
        }
        items.iter().rev().find(|item| weight(item) > 0.0)
    }
}

impl Default for Dice {
    fn default() -> Self {
        Self::from_entropy()
    }
}

fn clamp_roll(value: f64) -> f64 {
    value.clamp(0.0, 1.0 - f64::EPSILON)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeded_dice_are_reproducible() {
        let mut a = Dice::seeded(7);
        let mut b = Dice::seeded(7);
        for _ in 0..20 {
            assert!((a.roll() - b.roll()).abs() < f64::EPSILON);
        }
    }

    #[test]
    fn scripted_dice_repeat_last_roll() {
        let mut dice = Dice::scripted([0.1, 0.9]);
        assert!((dice.roll() - 0.1).abs() < f64::EPSILON);
        assert!((dice.roll() - 0.9).abs() < f64::EPSILON);
        assert!((dice.roll() - 0.9).abs() < f64::EPSILON);
    }

    #[test]
    fn weighted_respects_weights() {
        let items = [("a", 3.0), ("b", 1.0)];
        // 0.7 * 4.0 = 2.8 falls in a's bucket, 0.8 * 4.0 = 3.2 in b's.
        let mut dice = Dice::scripted([0.7, 0.8]);
        assert_eq!(dice.weighted(&items, |i| i.1).map(|i| i.0), Some("a"));
        assert_eq!(dice.weighted(&items, |i| i.1).map(|i| i.0), Some("b"));
    }

    #[test]
    fn index_never_overflows() {
        let mut dice = Dice::scripted([0.999_999]);
        assert_eq!(dice.index(3), Some(2));
        assert_eq!(dice.index(0), None);
    }
}

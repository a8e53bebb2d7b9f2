//! Strength decay for agent memories.
//!
//! Every decay pass removes a small amount of strength from each memory:
//!
//! ```text
//! step = max(0.001, rate / (importance × 0.5 + 1) − min(0.5, accesses × 0.05))
//! ```
//!
//! Important memories fade more slowly and frequently recalled ones are
//! barely touched, but every non-permanent memory loses at least `0.001`
//! per pass. Permanent-tier memories are skipped entirely.

use tracing::debug;

use crate::memory::{Importance, Memory};

/// Smallest strength loss a non-permanent memory suffers per pass.
pub const MIN_DECAY_STEP: f64 = 0.001;

/// Cap on how much rehearsal can offset decay.
pub const MAX_ACCESS_BONUS: f64 = 0.5;

/// Strength lost by one memory in one decay pass.
#[must_use]
pub fn decay_step(importance: Importance, access_count: u32, rate: f64) -> f64 {
    let damped = rate / (importance.weight() * 0.5 + 1.0);
    let access_bonus = (f64::from(access_count) * 0.05).min(MAX_ACCESS_BONUS);
    (damped - access_bonus).max(MIN_DECAY_STEP)
}

/// Run a decay pass, forgetting memories that fade to `floor` or below.
///
/// Returns the number of memories forgotten.
pub fn decay_memories(memories: &mut Vec<Memory>, rate: f64, floor: f64) -> usize {
    let before = memories.len();
    memories.retain_mut(|memory| memory.decay(rate, floor));
    let forgotten = before - memories.len();
    if forgotten > 0 {
        debug!(forgotten, remaining = memories.len(), "decay pass forgot memories");
    }
    forgotten
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::NewMemory;
    use crate::types::Timestamp;

    #[test]
    fn importance_damps_decay() {
        let low = decay_step(Importance::LOW, 0, 0.02);
        let high = decay_step(Importance::HIGH, 0, 0.02);
        assert!(high < low);
        assert!((low - 0.01).abs() < 1e-9);
    }

    #[test]
    fn rehearsal_floors_at_minimum_step() {
        let step = decay_step(Importance::NORMAL, 20, 0.02);
        assert!((step - MIN_DECAY_STEP).abs() < f64::EPSILON);
    }

    #[test]
    fn decay_pass_drops_faded_and_keeps_permanent() {
        let mut faded = Memory::from_draft("Elena", NewMemory::episodic("a"), Timestamp::ZERO);
        faded.strength = 0.051;
        let permanent = Memory::from_draft(
            "Elena",
            NewMemory::semantic("b").importance(Importance::PERMANENT),
            Timestamp::ZERO,
        );
        let fresh = Memory::from_draft("Elena", NewMemory::episodic("c"), Timestamp::ZERO);

        let mut memories = vec![faded, permanent, fresh];
        let forgotten = decay_memories(&mut memories, 0.02, 0.05);

        assert_eq!(forgotten, 1);
        assert_eq!(memories.len(), 2);
        assert!(memories.iter().all(|m| m.text != "a"));
    }
}

//! Capacity-based eviction.
//!
//! When a store grows past its capacity, the memories with the lowest
//! `strength × importance` go first. Permanent memories are never candidates,
//! so a store made only of permanent memories may stay above capacity.
//! Among equal scores the oldest memory is evicted first.

use std::collections::HashSet;

use tracing::debug;

use crate::memory::Memory;
use crate::types::MemoryId;

/// Eviction priority of a memory. **Lower** scores are evicted first.
///
/// Permanent memories return `f64::MAX` so they sort last.
#[must_use]
pub fn eviction_score(memory: &Memory) -> f64 {
    if memory.is_permanent() {
        return f64::MAX;
    }
    memory.strength * memory.importance.weight()
}

/// Evict the lowest-scoring non-permanent memories until `memories` fits
/// in `capacity`. Survivors keep their original order.
///
/// Returns the evicted memories, lowest score first.
pub fn enforce_capacity(memories: &mut Vec<Memory>, capacity: usize) -> Vec<Memory> {
    if memories.len() <= capacity {
        return Vec::new();
    }
    let excess = memories.len() - capacity;

    let mut candidates: Vec<(usize, f64)> = memories
        .iter()
        .enumerate()
        .filter(|(_, m)| !m.is_permanent())
        .map(|(i, m)| (i, eviction_score(m)))
        .collect();
    // Stable sort keeps insertion order among equal scores.
    candidates.sort_by(|a, b| a.1.total_cmp(&b.1));
    candidates.truncate(excess);

    let doomed: HashSet<MemoryId> = candidates.iter().map(|(i, _)| memories[*i].id).collect();
    let mut evicted: Vec<Memory> = Vec::with_capacity(doomed.len());
    let mut kept: Vec<Memory> = Vec::with_capacity(memories.len() - doomed.len());
    for memory in memories.drain(..) {
        if doomed.contains(&memory.id) {
            evicted.push(memory);
        } else {
            kept.push(memory);
        }
    }
    *memories = kept;

    evicted.sort_by(|a, b| eviction_score(a).total_cmp(&eviction_score(b)));
    if !evicted.is_empty() {
        debug!(evicted = evicted.len(), capacity, "evicted weakest memories");
    }
    evicted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{Importance, NewMemory};
    use crate::types::Timestamp;

    fn mem(text: &str, strength: f64, importance: Importance) -> Memory {
        let mut m = Memory::from_draft("Bones", NewMemory::episodic(text).importance(importance), Timestamp::ZERO);
        m.strength = strength;
        m
    }

    #[test]
    fn under_capacity_is_untouched() {
        let mut memories = vec![mem("a", 0.1, Importance::LOW)];
        assert!(enforce_capacity(&mut memories, 5).is_empty());
        assert_eq!(memories.len(), 1);
    }

    #[test]
    fn lowest_product_is_evicted() {
        let mut memories = vec![
            mem("strong-low", 0.9, Importance::LOW),   // 1.8
            mem("weak-high", 0.3, Importance::HIGH),   // 1.5
            mem("weak-low", 0.5, Importance::TRIVIAL), // 0.5
        ];
        let evicted = enforce_capacity(&mut memories, 2);
        assert_eq!(evicted.len(), 1);
        assert_eq!(evicted[0].text, "weak-low");
        let texts: Vec<_> = memories.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["strong-low", "weak-high"]);
    }

    #[test]
    fn permanent_memories_are_never_evicted() {
        let mut memories = vec![
            mem("core-1", 0.06, Importance::PERMANENT),
            mem("core-2", 0.06, Importance::PERMANENT),
            mem("chat", 1.0, Importance::HIGH),
        ];
        let evicted = enforce_capacity(&mut memories, 1);
        assert_eq!(evicted.len(), 1);
        assert_eq!(evicted[0].text, "chat");
        assert_eq!(memories.len(), 2);
    }

    #[test]
    fn ties_evict_oldest_first() {
        let mut memories = vec![
            mem("first", 1.0, Importance::NORMAL),
            mem("second", 1.0, Importance::NORMAL),
            mem("third", 1.0, Importance::NORMAL),
        ];
        let evicted = enforce_capacity(&mut memories, 2);
        assert_eq!(evicted[0].text, "first");
    }
}

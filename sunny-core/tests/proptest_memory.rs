//! Property tests for the memory and drive invariants.
//!
//! Every random choice goes through `Dice`, so each case is reproducible from
//! the generated inputs alone.

use std::time::Duration;

use proptest::prelude::*;

use sunny_core::config::{MemoryConfig, SocialConfig};
use sunny_core::decay;
use sunny_core::eviction;
use sunny_core::memory::{Importance, Memory, MemoryStore, NewMemory};
use sunny_core::retrieval::{RecallQuery, Recollection};
use sunny_core::{Dice, SocialDrive, Timestamp};

// ---------------------------------------------------------------------------
// Strategy helpers
// ---------------------------------------------------------------------------

fn arb_importance() -> impl Strategy<Value = Importance> {
    prop_oneof![
        Just(Importance::TRIVIAL),
        Just(Importance::LOW),
        Just(Importance::NORMAL),
        Just(Importance::HIGH),
        Just(Importance::CRITICAL),
    ]
}

fn arb_memory() -> impl Strategy<Value = Memory> {
    (arb_importance(), 0.06..1.0f64, 0u32..20).prop_map(|(importance, strength, accesses)| {
        let mut m = Memory::from_draft(
            "Elena",
            NewMemory::episodic("algo pasó en la plaza").importance(importance),
            Timestamp::ZERO,
        );
        m.strength = strength;
        m.access_count = accesses;
        m
    })
}

// ---------------------------------------------------------------------------
// Decay
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn permanent_memories_never_fade(passes in 1usize..500, rate in 0.0..1.0f64) {
        let mut memories = vec![Memory::from_draft(
            "Marco",
            NewMemory::semantic("Elena es la granjera").importance(Importance::PERMANENT),
            Timestamp::ZERO,
        )];
        for _ in 0..passes {
            let forgotten = decay::decay_memories(&mut memories, rate, 0.05);
            prop_assert_eq!(forgotten, 0);
        }
        prop_assert_eq!(memories.len(), 1);
        prop_assert!((memories[0].strength - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn decay_never_raises_strength(mut memory in arb_memory(), rate in 0.0..0.5f64) {
        let before = memory.strength;
        memory.decay(rate, 0.05);
        prop_assert!(memory.strength <= before);
    }

    #[test]
    fn survivors_stay_above_floor(mut memories in prop::collection::vec(arb_memory(), 0..60)) {
        decay::decay_memories(&mut memories, 0.2, 0.05);
        for m in &memories {
            prop_assert!(m.strength > 0.05);
        }
    }
}

// ---------------------------------------------------------------------------
// Access
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn access_reinforces_and_counts(mut memory in arb_memory(), at in 0u64..1_000_000) {
        let strength = memory.strength;
        let count = memory.access_count;
        memory.access(Timestamp(at));
        prop_assert!(memory.strength >= strength);
        prop_assert!(memory.strength <= 1.0);
        prop_assert_eq!(memory.access_count, count + 1);
    }
}

// ---------------------------------------------------------------------------
// Eviction
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn eviction_keeps_capacity_and_drops_lowest(memories in prop::collection::vec(arb_memory(), 81..140)) {
        let mut kept = memories;
        let evicted = eviction::enforce_capacity(&mut kept, 80);
        prop_assert_eq!(kept.len(), 80);

        let lowest_kept = kept
            .iter()
            .map(eviction::eviction_score)
            .fold(f64::INFINITY, f64::min);
        for gone in &evicted {
            prop_assert!(eviction::eviction_score(gone) <= lowest_kept);
        }
    }

    #[test]
    fn store_never_exceeds_capacity(count in 0usize..200) {
        let mut store = MemoryStore::new("Gruk", MemoryConfig::default());
        for i in 0..count {
            store.remember(NewMemory::episodic(format!("vi un shiny {i}")), Timestamp(i as u64));
        }
        prop_assert_eq!(store.len(), count.min(80));
    }
}

// ---------------------------------------------------------------------------
// Recall
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn must_succeed_recall_is_never_partial(roll in 0.0..1.0f64, strength in 0.06..1.0f64) {
        let mut store = MemoryStore::new("Bones", MemoryConfig::default());
        let id = store.remember(NewMemory::semantic("Marco es un hombre de honor").about("Marco"), Timestamp::ZERO);
        for m in store.iter_mut() {
            if m.id == id {
                m.strength = strength;
            }
        }
        let late = Timestamp::ZERO.after(Duration::from_secs(7_200));
        let mut dice = Dice::scripted([roll]);
        let out = store.recall(&RecallQuery::new("marco").must_succeed(), late, &mut dice);
        let partial = matches!(out, Recollection::Vague { .. } | Recollection::Fuzzy { .. });
        prop_assert!(!partial);
    }
}

// ---------------------------------------------------------------------------
// Drives
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn conversation_never_drives_needs_negative(
        loneliness in 0.0..100.0f64,
        expressiveness in 0.0..100.0f64,
        repeats in 1usize..10,
        seed in any::<u64>(),
    ) {
        let config = SocialConfig::default();
        let mut dice = Dice::seeded(seed);
        let mut drive = SocialDrive::new("Elena");
        drive.loneliness = loneliness;
        drive.expressiveness = expressiveness;
        for _ in 0..repeats {
            drive.on_conversation(Timestamp::ZERO, &config, &mut dice);
            prop_assert!(drive.loneliness >= 0.0);
            prop_assert!(drive.expressiveness >= 0.0);
        }
        prop_assert!(drive.cooldown >= Duration::from_secs(90));
        prop_assert!(drive.cooldown <= Duration::from_secs(210));
    }

    #[test]
    fn needs_stay_in_range(secs in 0u64..100_000, seed in any::<u64>()) {
        let config = SocialConfig::default();
        let mut dice = Dice::seeded(seed);
        let mut drive = SocialDrive::new("Gruk");
        drive.tick(Duration::from_secs(secs), Timestamp::ZERO, &config, &mut dice);
        for need in [drive.loneliness, drive.curiosity, drive.expressiveness] {
            prop_assert!((0.0..=100.0).contains(&need));
        }
    }
}

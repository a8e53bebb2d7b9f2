//! Sunny benchmark suite
//!
//! Hot paths of a running village:
//!   memory_remember_single ........... one episodic memory into a full store
//!   memory_recall_from_full_store .... keyword recall across a full store
//!   memory_decay_pass_village ........ one decay pass over every agent
//!   social_tick_village .............. one social engine tick

use std::collections::BTreeMap;
use std::hint::black_box;
use std::sync::Arc;

use criterion::{Criterion, criterion_group, criterion_main};

use sunny_core::retrieval::RecallQuery;
use sunny_core::{
    Dice, Emotion, Importance, ManualClock, MemoryBook, MemoryConfig, MemoryStore, NewMemory, PersonalityCatalog,
    Position, SocialConfig, SocialEngine, Timestamp,
};

const SPEAKERS: [&str; 4] = ["Elena", "Marco", "Gruk", "Bones"];

fn draft(i: usize) -> NewMemory {
    let speaker = SPEAKERS[i % SPEAKERS.len()];
    NewMemory::episodic(format!("{speaker} habló del huerto y de la feria número {i}"))
        .about(speaker)
        .tags([speaker.to_lowercase(), "huerto".to_string()])
        .importance(if i % 7 == 0 { Importance::HIGH } else { Importance::NORMAL })
        .emotion(Emotion::Neutral)
}

fn full_store() -> MemoryStore {
    let config = MemoryConfig::default();
    let capacity = config.capacity;
    let mut store = MemoryStore::new("Elena", config);
    for i in 0..capacity {
        store.remember(draft(i), Timestamp::from_millis(i as u64 * 1_000));
    }
    store
}

fn bench_remember(c: &mut Criterion) {
    let mut store = full_store();
    let mut i = 0_usize;
    c.bench_function("memory_remember_single", |b| {
        b.iter(|| {
            i += 1;
            let id = store.remember(black_box(draft(i)), Timestamp::from_millis(1_000_000 + i as u64));
            black_box(id);
        });
    });
}

fn bench_recall(c: &mut Criterion) {
    let mut store = full_store();
    let mut dice = Dice::seeded(7);
    let query = RecallQuery::new("Marco").tags(["huerto"]);
    c.bench_function("memory_recall_from_full_store", |b| {
        b.iter(|| {
            let found = store.recall(black_box(&query), Timestamp::from_millis(500_000), &mut dice);
            black_box(found);
        });
    });
}

fn bench_decay(c: &mut Criterion) {
    let catalog = PersonalityCatalog::sunnyside().expect("catalog");
    let mut book = MemoryBook::seeded(&catalog, MemoryConfig::default(), Timestamp::ZERO).expect("book");
    for i in 0..60 {
        for agent in SPEAKERS {
            book.remember(agent, draft(i), Timestamp::from_millis(i as u64 * 1_000));
        }
    }
    c.bench_function("memory_decay_pass_village", |b| {
        b.iter(|| {
            black_box(book.tick_decay());
        });
    });
}

fn bench_social_tick(c: &mut Criterion) {
    let catalog = Arc::new(PersonalityCatalog::sunnyside().expect("catalog"));
    let mut book = MemoryBook::seeded(&catalog, MemoryConfig::default(), Timestamp::ZERO).expect("book");
    let clock = ManualClock::new(Timestamp::ZERO);
    let mut engine = SocialEngine::new(Arc::clone(&catalog), SocialConfig::default(), Arc::new(clock), Dice::seeded(3));
    let positions: BTreeMap<String, Position> = SPEAKERS
        .iter()
        .enumerate()
        .map(|(i, name)| ((*name).to_string(), Position::new(1_300.0 + i as f32 * 120.0, 1_500.0)))
        .collect();
    c.bench_function("social_tick_village", |b| {
        b.iter(|| {
            let action = engine.tick(&mut book, black_box(&positions));
            black_box(action);
            black_box(engine.take_seek_targets());
        });
    });
}

criterion_group!(benches, bench_remember, bench_recall, bench_decay, bench_social_tick);
criterion_main!(benches);

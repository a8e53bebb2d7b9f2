//! # Sunny Core
//!
//! The cognition layer for a small village of non-player characters.
//!
//! Every agent owns a [`MemoryStore`] of decaying recollections and a
//! [`SocialDrive`] of needs that build up while it is idle. The
//! [`SocialEngine`] turns those needs into conversation requests and the
//! prompts that describe them; the generation side lives in `sunny-llm`.
//!
//! - **Episodic**: "what happened" (someone said something, we talked)
//! - **Semantic**: "what I know" (facts about people, seeded or overheard)
//! - **Emotional**: "how I feel" about someone
//!
//! Recall is deliberately imperfect: weakly matching memories sometimes come
//! back only as a vague hint or a single fuzzy recollection. Randomness is
//! injected through [`Dice`] and time through [`Clock`], so every outcome is
//! reproducible in tests.

#![deny(clippy::unwrap_used)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod classify;
pub mod clock;
pub mod config;
pub mod decay;
pub mod dice;
pub mod drive;
pub mod error;
pub mod eviction;
pub mod memory;
pub mod personality;
pub mod player;
pub mod prompt;
pub mod retrieval;
pub mod social;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{MemoryConfig, SocialConfig};
pub use dice::Dice;
pub use drive::{SeekIntent, SocialDrive, Topic, TopicKind};
pub use error::CoreError;
pub use memory::{Emotion, Importance, Memory, MemoryBook, MemoryKind, MemoryStore, NewMemory};
pub use personality::{AgentProfile, Mood, PersonalityCatalog};
pub use player::{FactKey, PlayerFactExtractor, PlayerFacts};
pub use prompt::{ChatLine, Prompt};
pub use social::{ConversationRequest, SocialAction, SocialEngine, Turn};
pub use types::*;

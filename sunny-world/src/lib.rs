//! # Sunny World: the village around the minds
//!
//! `sunny-core` decides what agents remember and want; `sunny-llm` turns
//! that into words. This crate puts both in a place:
//!
//! - **Village**: bodies walking between activity zones, seeking each other
//!   out when the social engine asks
//! - **Proximity**: only agents within a player's screen (plus a margin)
//!   hear them or answer them
//! - **Schedule**: generated lines are revealed one at a time at cumulative
//!   typing delays, never all at once
//! - **Standing**: moods, agent-to-agent bonds and per-player friendship
//!   move with every exchange
//!
//! ```text
//!            PlayerEvent                         WorldEvent
//!  transport ───────────► Runner ──► Session ───────────► transport
//!                           │          │  ▲
//!                           │ spawn    │  │ deliver_*
//!                           ▼          │  │
//!                   GenerationPipeline ┘──┘
//! ```
//!
//! Everything a session does is reachable without a network: with no
//! providers configured, players still get contextual fallback replies.

#![deny(clippy::unwrap_used)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod clock;
pub mod config;
pub mod error;
pub mod events;
pub mod friendship;
pub mod history;
pub mod layout;
pub mod mood;
pub mod proximity;
pub mod relationships;
pub mod runner;
pub mod schedule;
pub mod session;
pub mod village;

pub use clock::TokioClock;
pub use config::{SimConfig, WorldConfig};
pub use error::WorldError;
pub use events::{PlayerEvent, WorldEvent};
pub use friendship::{Discovery, Friendship};
pub use layout::VillageLayout;
pub use proximity::Viewport;
pub use runner::Runner;
pub use schedule::{ConversationId, DialogueSchedule, Origin};
pub use session::{PlayerId, Session, SessionSnapshot};
pub use village::Village;

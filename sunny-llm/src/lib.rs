//! # Sunny LLM: dialogue generation
//!
//! Every generation call in Sunny funnels through one [`GenerationPipeline`]:
//!   - **Providers** are tried strictly in priority order per request
//!     (an OpenAI-compatible endpoint first, a Gemini model rotation after)
//!   - **Spacing**: a single worker keeps consecutive calls at least the
//!     configured interval apart, however many callers enqueue at once
//!   - **Rate limits**: a shared "limited until" instant is honoured both
//!     before enqueueing and before each dequeued call
//!   - **Repair**: truncated or chatty JSON goes through a repair ladder
//!     before a call is written off
//!
//! Failures never reach players as errors. The pipeline answers `None` and
//! the caller substitutes a [`ContextualFallback`] line instead.
//!
//! ```text
//! caller ──► pre-flight ──► queue ──► worker ──► spacing ──► providers ──► repair
//!                │                       │                                  │
//!                └──── None ◄────────────┴──────────── None ◄───────────────┘
//! ```

#![deny(clippy::unwrap_used)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod addressing;
pub mod config;
pub mod error;
pub mod fallback;
pub mod pipeline;
pub mod provider;
pub mod repair;
pub mod types;

pub use addressing::{Addressing, AddressingDetector};
pub use config::{LlmConfig, ProviderConfig, ProviderKind};
pub use error::GenerationError;
pub use fallback::ContextualFallback;
pub use pipeline::{GenerationPipeline, PipelineStats};
pub use provider::{GeminiProvider, OpenAiCompatibleProvider, Provider};
pub use repair::{JsonRepairer, Repaired};
pub use types::{AiStatus, DialogueTurn, ParsedReply, ProviderReply};

//! Messages in and out of a session.
//!
//! Inbound events come from players (whatever transport carries them).
//! Outbound events are what clients render: chat lines, speech bubbles,
//! notices and status. The session never talks to a transport itself.

use serde::{Deserialize, Serialize};
use sunny_core::Position;
use sunny_llm::AiStatus;

use crate::friendship::Discovery;
use crate::proximity::Viewport;
use crate::schedule::{ConversationId, Origin, PlannedLine};
use crate::session::PlayerId;

/// Shortest time a speech bubble stays up, ms.
const BUBBLE_BASE_MS: u64 = 2_500;
/// Extra bubble time per char, ms.
const BUBBLE_PER_CHAR_MS: u64 = 60;
/// Longest time a speech bubble stays up, ms.
const BUBBLE_MAX_MS: u64 = 6_000;

/// How long a line stays on screen.
#[must_use]
pub fn bubble_duration_ms(text: &str) -> u64 {
    let chars = u64::try_from(text.chars().count()).unwrap_or(u64::MAX);
    BUBBLE_BASE_MS
        .saturating_add(chars.saturating_mul(BUBBLE_PER_CHAR_MS))
        .min(BUBBLE_MAX_MS)
}

/// Something a player did.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlayerEvent {
    /// A player connected.
    Join {
        /// Connection id.
        player: PlayerId,
        /// Display name. Empty picks a default.
        #[serde(default)]
        name: String,
        /// Starting position, if the client chose one.
        #[serde(default)]
        position: Option<Position>,
        /// Screen size, if known.
        #[serde(default)]
        viewport: Option<Viewport>,
    },
    /// A player moved or resized their screen.
    Move {
        /// Connection id.
        player: PlayerId,
        /// New position.
        position: Position,
        /// New screen size, if it changed.
        #[serde(default)]
        viewport: Option<Viewport>,
    },
    /// A player typed in chat.
    Say {
        /// Connection id.
        player: PlayerId,
        /// The message.
        text: String,
    },
    /// A player disconnected.
    Leave {
        /// Connection id.
        player: PlayerId,
    },
}

/// Something clients should show.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorldEvent {
    /// A player arrived.
    PlayerJoined {
        /// Connection id.
        player: PlayerId,
        /// Display name.
        name: String,
    },
    /// A player left.
    PlayerLeft {
        /// Connection id.
        player: PlayerId,
        /// Display name.
        name: String,
    },
    /// A player's chat line.
    PlayerSpoke {
        /// Connection id.
        player: PlayerId,
        /// Display name.
        name: String,
        /// The line.
        text: String,
    },
    /// A system line, to one player or everyone.
    Notice {
        /// Recipient, or `None` for everyone.
        to: Option<PlayerId>,
        /// The line.
        text: String,
    },
    /// Lines planned for later, with their display delays.
    DialogueScheduled {
        /// Exchange id.
        conversation: ConversationId,
        /// What started it.
        origin: Origin,
        /// The lines in display order.
        lines: Vec<PlannedLine>,
    },
    /// An agent says a line now.
    AgentSpoke {
        /// Exchange id.
        conversation: ConversationId,
        /// Speaker.
        agent: String,
        /// The line.
        text: String,
        /// How long the bubble stays up, ms.
        bubble_ms: u64,
    },
    /// A player's friendship with an agent changed.
    FriendshipChanged {
        /// Player.
        player: PlayerId,
        /// Agent.
        agent: String,
        /// New level.
        level: u32,
    },
    /// A player learned something about an agent.
    Discovered {
        /// Player.
        player: PlayerId,
        /// Agent.
        agent: String,
        /// What was learned.
        discovery: Discovery,
    },
    /// An agent set off toward someone it wants to talk to.
    AgentSeeking {
        /// Who walks.
        agent: String,
        /// Toward whom.
        partner: String,
        /// Where it is headed.
        target: Position,
    },
    /// Dialogue generation health.
    AiStatus {
        /// Recipient, or `None` for everyone.
        to: Option<PlayerId>,
        /// Current status.
        status: AiStatus,
    },
}

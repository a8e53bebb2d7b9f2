//! The dialogue schedule.
//!
//! Multi-line replies are not fired from independent timers. Each line is
//! placed on one sorted timeline at its cumulative delay, and a single driver
//! pops whatever is due. Lines belong to a conversation, so a stale
//! conversation can be dropped as a unit.
//!
//! ```text
//!   plan(start, [(Elena, +1.9s), (Marco, +3.4s)])
//!        │
//!        ▼
//!   ┌───────────────────────────────────────────┐
//!   │ t+1.9s Elena #7 │ t+5.3s Marco #7 │ ...   │  ← sorted by (due, seq)
//!   └───────────────────────────────────────────┘
//!        ▲                        │
//!   cancel(#7) ──────────────────┘ due(now) pops the front
//! ```

use std::fmt;
use std::time::Duration;

use serde::Serialize;
use sunny_core::Timestamp;

use crate::session::PlayerId;

/// Identifies the lines of one exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct ConversationId(pub u64);

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What started an exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Origin {
    /// Agents answering a player.
    Player {
        /// Who asked.
        player: PlayerId,
        /// Whether the player's message revealed new facts.
        revealed_facts: bool,
    },
    /// Agents talking among themselves.
    Social {
        /// Everyone taking part.
        participants: Vec<String>,
    },
}

/// One line waiting for its moment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScheduledLine {
    /// Exchange the line belongs to.
    pub conversation: ConversationId,
    /// What started the exchange.
    pub origin: Origin,
    /// Speaking agent.
    pub agent: String,
    /// The line.
    pub text: String,
    /// Position within the exchange, from zero.
    pub index: usize,
    /// Whether this is the exchange's final line.
    pub last: bool,
    /// When it is due.
    pub due: Timestamp,
}

/// A line as announced to clients: who, what and after how long.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedLine {
    /// Speaking agent.
    pub agent: String,
    /// The line.
    pub text: String,
    /// Delay from the moment the exchange was planned, ms.
    pub display_at_delay_ms: u64,
}

/// Sorted timeline of pending lines.
#[derive(Debug, Default)]
pub struct DialogueSchedule {
    // Sorted by `due`; equal dues keep insertion order.
    pending: Vec<ScheduledLine>,
    next_id: u64,
}

impl DialogueSchedule {
    /// Empty schedule.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Place an exchange on the timeline.
    ///
    /// `lines` carry per-line delays; each line is due that long after the
    /// previous one, the first that long after `start`.
    pub fn plan(
        &mut self,
        origin: Origin,
        start: Timestamp,
        lines: Vec<(String, String, Duration)>,
    ) -> (ConversationId, Vec<PlannedLine>) {
        self.next_id += 1;
        let conversation = ConversationId(self.next_id);
        let count = lines.len();
        let mut due = start;
        let mut planned = Vec::with_capacity(count);
        for (index, (agent, text, delay)) in lines.into_iter().enumerate() {
            due = due.after(delay);
            planned.push(PlannedLine {
                agent: agent.clone(),
                text: text.clone(),
                display_at_delay_ms: due.since(start).as_millis().try_into().unwrap_or(u64::MAX),
            });
            self.insert(ScheduledLine {
                conversation,
                origin: origin.clone(),
                agent,
                text,
                index,
                last: index + 1 == count,
                due,
            });
        }
        (conversation, planned)
    }

    fn insert(&mut self, line: ScheduledLine) {
        let at = self.pending.partition_point(|p| p.due <= line.due);
        self.pending.insert(at, line);
    }

    /// Remove and return every line due at or before `now`, in order.
    pub fn due(&mut self, now: Timestamp) -> Vec<ScheduledLine> {
        let split = self.pending.partition_point(|p| p.due <= now);
        self.pending.drain(..split).collect()
    }

    /// Drop the pending lines of one exchange. Returns how many were dropped.
    pub fn cancel(&mut self, conversation: ConversationId) -> usize {
        let before = self.pending.len();
        self.pending.retain(|p| p.conversation != conversation);
        before - self.pending.len()
    }

    /// Drop every pending agent-to-agent line. Returns how many were dropped.
    pub fn cancel_social(&mut self) -> usize {
        let before = self.pending.len();
        self.pending.retain(|p| !matches!(p.origin, Origin::Social { .. }));
        before - self.pending.len()
    }

    /// Drop every pending reply to `player`.
    pub fn cancel_player(&mut self, player: &PlayerId) -> usize {
        let before = self.pending.len();
        self.pending
            .retain(|p| !matches!(&p.origin, Origin::Player { player: who, .. } if who == player));
        before - self.pending.len()
    }

    /// When the next line is due.
    #[must_use]
    pub fn next_due(&self) -> Option<Timestamp> {
        self.pending.first().map(|p| p.due)
    }

    /// Pending lines.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether nothing is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn social() -> Origin {
        Origin::Social {
            participants: vec!["Elena".into(), "Marco".into()],
        }
    }

    fn player() -> Origin {
        Origin::Player {
            player: PlayerId::from("p1"),
            revealed_facts: false,
        }
    }

    fn line(agent: &str, ms: u64) -> (String, String, Duration) {
        (agent.to_string(), format!("{agent} dice algo"), Duration::from_millis(ms))
    }

    #[test]
    fn delays_accumulate() {
        let mut schedule = DialogueSchedule::new();
        let (_, planned) = schedule.plan(social(), Timestamp(1_000), vec![line("Elena", 2_000), line("Marco", 3_000)]);
        assert_eq!(planned[0].display_at_delay_ms, 2_000);
        assert_eq!(planned[1].display_at_delay_ms, 5_000);
        assert_eq!(schedule.next_due(), Some(Timestamp(3_000)));
    }

    #[test]
    fn due_pops_in_time_order_across_exchanges() {
        let mut schedule = DialogueSchedule::new();
        schedule.plan(social(), Timestamp(0), vec![line("Elena", 1_000), line("Marco", 4_000)]);
        schedule.plan(player(), Timestamp(0), vec![line("Gruk", 2_000)]);

        assert!(schedule.due(Timestamp(999)).is_empty());
        let first = schedule.due(Timestamp(2_500));
        let speakers: Vec<&str> = first.iter().map(|l| l.agent.as_str()).collect();
        assert_eq!(speakers, vec!["Elena", "Gruk"]);
        assert!(first[1].last);
        assert!(!first[0].last);

        let rest = schedule.due(Timestamp(10_000));
        assert_eq!(rest.len(), 1);
        assert!(rest[0].last);
        assert!(schedule.is_empty());
    }

    #[test]
    fn equal_dues_keep_plan_order() {
        let mut schedule = DialogueSchedule::new();
        schedule.plan(player(), Timestamp(0), vec![line("Elena", 1_000)]);
        schedule.plan(social(), Timestamp(0), vec![line("Marco", 1_000)]);
        let due = schedule.due(Timestamp(1_000));
        assert_eq!(due[0].agent, "Elena");
        assert_eq!(due[1].agent, "Marco");
    }

    #[test]
    fn cancel_drops_one_exchange() {
        let mut schedule = DialogueSchedule::new();
        let (stale, _) = schedule.plan(social(), Timestamp(0), vec![line("Elena", 1_000), line("Marco", 1_000)]);
        schedule.plan(player(), Timestamp(0), vec![line("Gruk", 500)]);
        assert_eq!(schedule.cancel(stale), 2);
        assert_eq!(schedule.len(), 1);
        assert_eq!(schedule.cancel(stale), 0);
    }

    #[test]
    fn cancel_by_origin() {
        let mut schedule = DialogueSchedule::new();
        schedule.plan(social(), Timestamp(0), vec![line("Elena", 1_000)]);
        schedule.plan(player(), Timestamp(0), vec![line("Gruk", 500), line("Bones", 500)]);
        assert_eq!(schedule.cancel_social(), 1);
        assert_eq!(schedule.cancel_player(&PlayerId::from("someone else")), 0);
        assert_eq!(schedule.cancel_player(&PlayerId::from("p1")), 2);
        assert!(schedule.is_empty());
    }
}

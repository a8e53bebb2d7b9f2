//! Who can hear a player, and which replies survive that.
//!
//! An agent hears a player when it stands inside the player's viewport
//! grown by a margin on every side. Replies from anyone else are dropped
//! before they are scheduled.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sunny_core::Position;

/// Size of a player's screen in world units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    /// Width.
    pub width: f32,
    /// Height.
    pub height: f32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280.0,
            height: 720.0,
        }
    }
}

/// Whether an agent at `agent` hears a player at `player`.
#[must_use]
pub fn can_hear(player: Position, viewport: Viewport, margin: f32, agent: Position) -> bool {
    let half_w = viewport.width / 2.0 + margin;
    let half_h = viewport.height / 2.0 + margin;
    (agent.x - player.x).abs() <= half_w && (agent.y - player.y).abs() <= half_h
}

/// Agents that hear the player, nearest first.
#[must_use]
pub fn nearby_agents(
    player: Position,
    viewport: Viewport,
    margin: f32,
    agents: &BTreeMap<String, Position>,
) -> Vec<String> {
    let mut nearby: Vec<(&String, f32)> = agents
        .iter()
        .filter(|(_, pos)| can_hear(player, viewport, margin, **pos))
        .map(|(name, pos)| (name, player.distance_to(pos)))
        .collect();
    nearby.sort_by(|a, b| a.1.total_cmp(&b.1));
    nearby.into_iter().map(|(name, _)| name.clone()).collect()
}

/// What to do with a set of replies once proximity is applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplySelection {
    /// Schedule these lines, in order.
    Speak(Vec<(String, String)>),
    /// There were replies but nobody is close enough to give them.
    NobodyNear,
    /// Nothing to say.
    Silent,
}

/// Keep the replies of agents that hear the player.
///
/// When every reply came from out of range, the nearest agent answers in
/// their place with an ellipsis.
#[must_use]
pub fn select_replies(replies: Vec<(String, String)>, nearby: &[String]) -> ReplySelection {
    if replies.is_empty() {
        return ReplySelection::Silent;
    }
    let Some(nearest) = nearby.first() else {
        return ReplySelection::NobodyNear;
    };
    let kept: Vec<(String, String)> = replies.into_iter().filter(|(agent, _)| nearby.contains(agent)).collect();
    if kept.is_empty() {
        return ReplySelection::Speak(vec![(nearest.clone(), "...".to_string())]);
    }
    ReplySelection::Speak(kept)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agents(entries: &[(&str, f32, f32)]) -> BTreeMap<String, Position> {
        entries
            .iter()
            .map(|(n, x, y)| ((*n).to_string(), Position::new(*x, *y)))
            .collect()
    }

    #[test]
    fn far_agent_is_excluded_near_agent_included() {
        let player = Position::new(1500.0, 1500.0);
        let map = agents(&[("Elena", 1550.0, 1500.0), ("Bones", 2500.0, 1500.0)]);
        let nearby = nearby_agents(player, Viewport::default(), 80.0, &map);
        assert_eq!(nearby, vec!["Elena".to_string()]);
    }

    #[test]
    fn margin_extends_the_viewport() {
        let player = Position::new(0.0, 0.0);
        let agent = Position::new(700.0, 0.0);
        assert!(can_hear(player, Viewport::default(), 80.0, agent));
        assert!(!can_hear(player, Viewport::default(), 0.0, agent));
        assert!(!can_hear(player, Viewport::default(), 80.0, Position::new(0.0, 441.0)));
    }

    #[test]
    fn nearest_comes_first() {
        let player = Position::new(0.0, 0.0);
        let map = agents(&[("Elena", 300.0, 0.0), ("Gruk", 10.0, 10.0), ("Marco", 100.0, 0.0)]);
        let nearby = nearby_agents(player, Viewport::default(), 80.0, &map);
        assert_eq!(nearby, vec!["Gruk", "Marco", "Elena"]);
    }

    #[test]
    fn out_of_range_replies_are_dropped() {
        let replies = vec![("Elena".into(), "hola".into()), ("Bones".into(), "*rattle*".into())];
        let selection = select_replies(replies, &["Elena".to_string()]);
        assert_eq!(selection, ReplySelection::Speak(vec![("Elena".into(), "hola".into())]));
    }

    #[test]
    fn nearest_stands_in_when_only_far_agents_replied() {
        let replies = vec![("Bones".into(), "*rattle*".into())];
        let selection = select_replies(replies, &["Gruk".to_string(), "Elena".to_string()]);
        assert_eq!(selection, ReplySelection::Speak(vec![("Gruk".into(), "...".into())]));
    }

    #[test]
    fn nobody_near_and_silence() {
        let replies = vec![("Bones".into(), "*rattle*".into())];
        assert_eq!(select_replies(replies, &[]), ReplySelection::NobodyNear);
        assert_eq!(select_replies(Vec::new(), &["Elena".to_string()]), ReplySelection::Silent);
    }
}

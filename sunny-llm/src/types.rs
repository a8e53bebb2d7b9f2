//! Shared types for the generation layer.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Raw text returned by one successful provider call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderReply {
    /// Model output, unparsed.
    pub text: String,
    /// Why generation stopped, as the provider reported it.
    pub finish_reason: Option<String>,
    /// Model that actually answered.
    pub model: String,
}

/// One line of a multi-agent exchange, in the wire shape models produce.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialogueTurn {
    /// Speaking agent.
    #[serde(rename = "npc")]
    pub agent: String,
    /// What they say.
    #[serde(rename = "msg")]
    pub message: String,
}

impl DialogueTurn {
    /// Create a new turn.
    #[must_use]
    pub fn new(agent: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            agent: agent.into(),
            message: message.into(),
        }
    }
}

/// A model answer after repair, in whichever shape it arrived.
///
/// Player chat asks for `{"Agent": "text" | null}`, agent-to-agent chat
/// for `[{"npc": .., "msg": ..}]`. Models mix the two up, so both shapes
/// convert into each other explicitly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedReply {
    /// One optional line per agent.
    ByAgent(BTreeMap<String, Option<String>>),
    /// Ordered turns.
    Turns(Vec<DialogueTurn>),
}

impl ParsedReply {
    /// Ordered turns. The per-agent shape is laid out in roster order,
    /// skipping agents with nothing to say.
    #[must_use]
    pub fn into_turns<S: AsRef<str>>(self, roster: &[S], max_chars: usize) -> Vec<DialogueTurn> {
        match self {
            Self::Turns(turns) => turns
                .into_iter()
                .filter(|t| !t.message.trim().is_empty())
                .map(|t| DialogueTurn::new(t.agent, truncate(&t.message, max_chars)))
                .collect(),
            Self::ByAgent(lines) => roster
                .iter()
                .filter_map(|name| {
                    let name = name.as_ref();
                    let text = lines.get(name)?.as_deref()?;
                    if text.trim().is_empty() || text == "null" {
                        return None;
                    }
                    Some(DialogueTurn::new(name, truncate(text, max_chars)))
                })
                .collect(),
        }
    }

    /// One line per agent, roster order. Turns keep each agent's first line.
    #[must_use]
    pub fn into_lines<S: AsRef<str>>(self, roster: &[S], max_chars: usize) -> Vec<(String, String)> {
        let turns = self.into_turns(roster, max_chars);
        roster
            .iter()
            .filter_map(|name| {
                turns
                    .iter()
                    .find(|t| t.agent == name.as_ref())
                    .map(|t| (t.agent.clone(), t.message.clone()))
            })
            .collect()
    }
}

/// Aggregate health of dialogue generation, for status indicators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AiStatus {
    /// The last request was answered by a provider.
    Ok,
    /// A provider limit is active.
    RateLimited {
        /// Whole seconds until calls resume.
        remaining_secs: u64,
    },
    /// Replies currently come from canned lines.
    Fallback,
    /// Nothing can be generated, e.g. no provider has a key.
    Error {
        /// What went wrong.
        message: String,
    },
}

/// First `max_chars` chars of `text`.
pub(crate) fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROSTER: [&str; 4] = ["Elena", "Marco", "Gruk", "Bones"];

    #[test]
    fn by_agent_converts_in_roster_order() {
        let mut lines = BTreeMap::new();
        lines.insert("Marco".to_string(), Some("bien".to_string()));
        lines.insert("Elena".to_string(), Some("hola".to_string()));
        lines.insert("Gruk".to_string(), None);
        lines.insert("Bones".to_string(), Some("  ".to_string()));
        let turns = ParsedReply::ByAgent(lines).into_turns(&ROSTER, 200);
        assert_eq!(
            turns,
            vec![DialogueTurn::new("Elena", "hola"), DialogueTurn::new("Marco", "bien")]
        );
    }

    #[test]
    fn turns_truncate_on_char_boundary() {
        let reply = ParsedReply::Turns(vec![DialogueTurn::new("Gruk", "¡shiny shiny!")]);
        let turns = reply.into_turns(&ROSTER, 6);
        assert_eq!(turns[0].message, "¡shiny");
    }

    #[test]
    fn lines_keep_first_turn_per_agent() {
        let reply = ParsedReply::Turns(vec![
            DialogueTurn::new("Bones", "uno"),
            DialogueTurn::new("Elena", "dos"),
            DialogueTurn::new("Bones", "tres"),
        ]);
        let lines = reply.into_lines(&ROSTER, 200);
        assert_eq!(
            lines,
            vec![
                ("Elena".to_string(), "dos".to_string()),
                ("Bones".to_string(), "uno".to_string())
            ]
        );
    }

    #[test]
    fn wire_names_are_npc_and_msg() {
        let turn: DialogueTurn = serde_json::from_str(r#"{"npc":"Elena","msg":"hola"}"#).expect("turn");
        assert_eq!(turn, DialogueTurn::new("Elena", "hola"));
    }
}

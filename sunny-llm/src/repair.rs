//! Recovering usable replies from imperfect model output.
//!
//! Small models wrap JSON in code fences, run out of tokens mid-string or
//! drift into the other reply shape. The ladder here tries, in order:
//! a direct parse, closing a truncated object, and finally regex
//! extraction of whatever agent lines are still intact.

use std::collections::BTreeMap;

use regex::Regex;
use serde_json::Value;
use tracing::debug;

use crate::error::{GenerationError, Result};
use crate::types::{DialogueTurn, truncate};

/// A multi-turn exchange needs at least this many turns to be usable.
pub const MIN_TURNS: usize = 2;

/// Longest message the truncated-array extractor accepts, in chars.
const MAX_TURN_CHARS: usize = 200;

/// Lines keyed by agent, `None` for "stays silent".
pub type AgentLines = BTreeMap<String, Option<String>>;

/// A parsed value and whether the repair ladder was needed to get it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repaired<T> {
    /// The recovered value.
    pub value: T,
    /// `false` when the text parsed as-is.
    pub repaired: bool,
}

impl<T> Repaired<T> {
    fn clean(value: T) -> Self {
        Self { value, repaired: false }
    }

    fn fixed(value: T) -> Self {
        Self { value, repaired: true }
    }
}

/// Roster-aware repair ladder.
#[derive(Debug, Clone)]
pub struct JsonRepairer {
    roster: Vec<String>,
    fence: Regex,
    pair: Regex,
    loose_pair: Regex,
    turn: Regex,
}

impl JsonRepairer {
    /// Compile the extractors for the given agent names.
    ///
    /// # Errors
    /// Returns [`GenerationError::Config`] if the roster is empty or a
    /// pattern fails to compile.
    pub fn new<S: AsRef<str>>(roster: &[S]) -> Result<Self> {
        if roster.is_empty() {
            return Err(GenerationError::Config("repair needs at least one agent name".into()));
        }
        let roster: Vec<String> = roster.iter().map(|n| n.as_ref().to_string()).collect();
        let names = roster.iter().map(|n| regex::escape(n)).collect::<Vec<_>>().join("|");
        let compile = |pattern: String| Regex::new(&pattern).map_err(|e| GenerationError::Config(e.to_string()));
        Ok(Self {
            fence: compile(r"```(?:json)?\s*".to_string())?,
            pair: compile(format!(r#""({names})"\s*:\s*("(?:[^"\\]|\\.)*"|null)"#))?,
            loose_pair: compile(format!(r#""?({names})"?\s*:\s*"([^"]{{3,}})""#))?,
            turn: compile(format!(
                r#"\{{\s*"npc"\s*:\s*"({names})"\s*,\s*"msg"\s*:\s*"([^"]{{1,{MAX_TURN_CHARS}}})"\s*\}}"#
            ))?,
            roster,
        })
    }

    /// Agent names, in roster order.
    #[must_use]
    pub fn roster(&self) -> &[String] {
        &self.roster
    }

    /// Recover a `{"Agent": "text" | null}` object.
    #[must_use]
    pub fn repair_object(&self, raw: &str) -> Option<Repaired<AgentLines>> {
        let cleaned = self.strip_fences(raw);
        if cleaned.is_empty() {
            return None;
        }
        if let Some(lines) = parse_object(&cleaned) {
            return Some(Repaired::clean(lines));
        }

        if cleaned.starts_with('{') && !cleaned.ends_with('}') {
            if let Some(lines) = close_truncated(&cleaned) {
                debug!(keys = lines.len(), "closed truncated reply");
                return Some(Repaired::fixed(lines));
            }
        }

        let pairs: AgentLines = self
            .pair
            .captures_iter(&cleaned)
            .map(|c| {
                let value = if &c[2] == "null" { None } else { Some(unquote(&c[2])) };
                (c[1].to_string(), value)
            })
            .collect();
        if !pairs.is_empty() {
            debug!(keys = pairs.len(), "extracted agent pairs");
            return Some(Repaired::fixed(pairs));
        }

        let loose: AgentLines = self
            .loose_pair
            .captures_iter(&cleaned)
            .map(|c| (c[1].to_string(), Some(c[2].to_string())))
            .collect();
        if !loose.is_empty() {
            debug!(keys = loose.len(), "extracted loose agent pairs");
            return Some(Repaired::fixed(loose));
        }
        None
    }

    /// Recover an ordered `[{"npc": .., "msg": ..}]` exchange of at least
    /// [`MIN_TURNS`] turns.
    #[must_use]
    pub fn repair_turns(&self, raw: &str, max_chars: usize) -> Option<Repaired<Vec<DialogueTurn>>> {
        let cleaned = self.strip_fences(raw);
        if cleaned.is_empty() {
            return None;
        }
        match serde_json::from_str::<Value>(&cleaned) {
            Ok(Value::Array(items)) => {
                let turns: Vec<DialogueTurn> = items
                    .iter()
                    .filter_map(|item| {
                        let agent = item.get("npc")?.as_str()?;
                        let message = item.get("msg")?.as_str()?;
                        (!agent.is_empty() && !message.is_empty())
                            .then(|| DialogueTurn::new(agent, truncate(message, max_chars)))
                    })
                    .collect();
                if turns.len() >= MIN_TURNS {
                    return Some(Repaired::clean(turns));
                }
            }
            Ok(Value::Object(map)) => {
                let turns = self.roster_turns(&object_lines(map), max_chars);
                if turns.len() >= MIN_TURNS {
                    return Some(Repaired::fixed(turns));
                }
            }
            _ => {}
        }

        if cleaned.starts_with('[') {
            let turns: Vec<DialogueTurn> = self
                .turn
                .captures_iter(&cleaned)
                .map(|c| DialogueTurn::new(&c[1], truncate(&c[2], max_chars)))
                .collect();
            if turns.len() >= MIN_TURNS {
                debug!(turns = turns.len(), "extracted turns from truncated array");
                return Some(Repaired::fixed(turns));
            }
        }

        let lines = self.repair_object(&cleaned)?;
        let turns = self.roster_turns(&lines.value, max_chars);
        (turns.len() >= MIN_TURNS).then(|| Repaired::fixed(turns))
    }

    fn strip_fences(&self, raw: &str) -> String {
        self.fence.replace_all(raw, "").trim().to_string()
    }

    fn roster_turns(&self, lines: &AgentLines, max_chars: usize) -> Vec<DialogueTurn> {
        self.roster
            .iter()
            .filter_map(|name| {
                let text = lines.get(name)?.as_deref()?;
                (!text.trim().is_empty()).then(|| DialogueTurn::new(name, truncate(text, max_chars)))
            })
            .collect()
    }
}

fn parse_object(text: &str) -> Option<AgentLines> {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => Some(object_lines(map)),
        _ => None,
    }
}

fn object_lines(map: serde_json::Map<String, Value>) -> AgentLines {
    map.into_iter()
        .map(|(key, value)| match value {
            Value::String(s) => (key, Some(s)),
            _ => (key, None),
        })
        .collect()
}

/// Close an object cut off mid-value, or cut back to the last quote and
/// close it there. Only results with something to say count.
fn close_truncated(text: &str) -> Option<AgentLines> {
    let says_something = |lines: &AgentLines| lines.values().flatten().any(|v| !v.trim().is_empty());

    for suffix in ["\"}", "}"] {
        if let Some(lines) = parse_object(&format!("{text}{suffix}")).filter(says_something) {
            return Some(lines);
        }
    }
    let last_quote = text.rfind('"').filter(|&idx| idx > 0)?;
    let head = &text[..=last_quote];
    ["}", "\"}"]
        .iter()
        .find_map(|suffix| parse_object(&format!("{head}{suffix}")).filter(says_something))
}

/// Decode a JSON string literal, keeping the raw body if it is malformed.
fn unquote(literal: &str) -> String {
    serde_json::from_str::<String>(literal).unwrap_or_else(|_| {
        literal
            .strip_prefix('"')
            .and_then(|s| s.strip_suffix('"'))
            .unwrap_or(literal)
            .to_string()
    })
}

//! Who a player message is talking to, and who it is talking about.
//!
//! "Elena, ¿dónde está Bones?" should get an answer from Elena about Bones,
//! not one from Bones. The detector splits agent names into those spoken
//! to and those merely mentioned; the hint it renders goes into the prompt
//! and the lists steer which agents answer when generation falls back.

use regex::Regex;
use serde::Serialize;

use crate::error::{GenerationError, Result};

/// Greetings that may precede a name.
const GREETINGS: &str = "oye|hey|hola|eh|ey|mira|dime|escucha";

/// Words that commonly follow a name used as a vocative.
const VOCATIVE_FOLLOWERS: &str = "dime|sabes|puedes|quiero|te|eres|como|que|donde|por|tienes|has";

/// A name starting before this char offset counts as spoken to.
const OPENING_CHARS: usize = 3;

/// Result of addressing detection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Addressing {
    /// Agents the player is talking to, in detection order.
    pub spoken_to: Vec<String>,
    /// Agents the player is asking about.
    pub mentioned: Vec<String>,
}

impl Addressing {
    /// Whether `agent` was spoken to directly.
    #[must_use]
    pub fn is_spoken_to(&self, agent: &str) -> bool {
        self.spoken_to.iter().any(|a| a == agent)
    }

    /// Prompt instruction, empty when nobody is named.
    #[must_use]
    pub fn hint(&self) -> String {
        if !self.spoken_to.is_empty() {
            let mut hint = format!(" [HABLA CON {}", self.spoken_to.join(", "));
            if !self.mentioned.is_empty() {
                hint.push_str(&format!(", PREGUNTA SOBRE {}", self.mentioned.join(", ")));
            }
            hint.push_str(&format!(". Solo {} responde(n).]", self.spoken_to.join("/")));
            hint
        } else if !self.mentioned.is_empty() {
            format!(
                " [Menciona a {}. Quien mejor conozca el tema responde.]",
                self.mentioned.join(", ")
            )
        } else {
            String::new()
        }
    }
}

/// Compiled addressing patterns for one roster.
#[derive(Debug, Clone)]
pub struct AddressingDetector {
    roster: Vec<String>,
    speak_to: Vec<Regex>,
    ask_about: Vec<Regex>,
}

impl AddressingDetector {
    /// Compile the patterns for the given agent names.
    ///
    /// # Errors
    /// Returns [`GenerationError::Config`] if a pattern fails to compile.
    pub fn new<S: AsRef<str>>(roster: &[S]) -> Result<Self> {
        let roster: Vec<String> = roster.iter().map(|n| n.as_ref().to_string()).collect();
        let names = roster
            .iter()
            .map(|n| regex::escape(&n.to_lowercase()))
            .collect::<Vec<_>>()
            .join("|");
        let compile = |sources: &[String]| {
            sources
                .iter()
                .map(|s| Regex::new(&format!("(?i){s}")).map_err(|e| GenerationError::Config(e.to_string())))
                .collect::<Result<Vec<_>>>()
        };
        let speak_to = compile(&[
            format!(r"^({GREETINGS})\s+({names})"),
            format!(r"^({names})\s*[,!:¡¿]"),
            format!(r"^({names})$"),
            format!(r"^({names})\s+({VOCATIVE_FOLLOWERS})"),
        ])?;
        let ask_about = compile(&[
            format!(r"(?:donde|dónde)\s+(?:esta|está|anda|vive)\s+({names})"),
            format!(r"(?:visto|conoces|sabes de|que piensas de|opinas de|que tal|como es)\s+({names})"),
            format!(r"(?:sobre|acerca de|de)\s+({names})"),
            format!(r"(?:con|a)\s+({names})\s*\?"),
        ])?;
        Ok(Self {
            roster,
            speak_to,
            ask_about,
        })
    }

    /// Classify the agents named in `message`.
    #[must_use]
    pub fn detect(&self, message: &str) -> Addressing {
        let lower = message.trim().to_lowercase();
        let mut out = Addressing::default();

        for pattern in &self.speak_to {
            let Some(found) = pattern.find(&lower) else { continue };
            for name in self.names_in(found.as_str()) {
                if !out.spoken_to.contains(&name) {
                    out.spoken_to.push(name);
                }
            }
        }
        for pattern in &self.ask_about {
            let Some(found) = pattern.find(&lower) else { continue };
            for name in self.names_in(found.as_str()) {
                if !out.spoken_to.contains(&name) && !out.mentioned.contains(&name) {
                    out.mentioned.push(name);
                }
            }
        }

        if out.spoken_to.is_empty() {
            for name in &self.roster {
                let Some(byte_idx) = lower.find(&name.to_lowercase()) else { continue };
                if out.mentioned.contains(name) {
                    continue;
                }
                if lower[..byte_idx].chars().count() < OPENING_CHARS {
                    out.spoken_to.push(name.clone());
                } else {
                    out.mentioned.push(name.clone());
                }
            }
            if out.spoken_to.is_empty() && out.mentioned.len() == 1 {
                out.spoken_to = std::mem::take(&mut out.mentioned);
            }
        }
        out
    }

    /// Roster names that are a substring of the lowercased `text`.
    fn names_in(&self, text: &str) -> Vec<String> {
        self.roster
            .iter()
            .filter(|name| text.contains(&name.to_lowercase()))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detector() -> AddressingDetector {
        AddressingDetector::new(&["Elena", "Marco", "Gruk", "Bones"]).expect("patterns")
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn speaking_to_one_about_another() {
        let a = detector().detect("Elena, donde esta Bones");
        assert_eq!(a.spoken_to, names(&["Elena"]));
        assert_eq!(a.mentioned, names(&["Bones"]));
    }

    #[test]
    fn greeting_then_name() {
        let a = detector().detect("Hola Gruk, ¿qué haces?");
        assert_eq!(a.spoken_to, names(&["Gruk"]));
        assert!(a.mentioned.is_empty());
    }

    #[test]
    fn addressing_everyone_names_nobody() {
        let a = detector().detect("Hola a todos");
        assert_eq!(a, Addressing::default());
        assert!(a.hint().is_empty());
    }

    #[test]
    fn lone_mention_is_promoted() {
        let a = detector().detect("¿Alguien ha visto a Marco?");
        assert_eq!(a.spoken_to, names(&["Marco"]));
        assert!(a.mentioned.is_empty());
    }

    #[test]
    fn two_mentions_stay_mentions() {
        let a = detector().detect("que piensas de marco y de gruk");
        assert!(a.spoken_to.is_empty());
        assert_eq!(a.mentioned, names(&["Marco", "Gruk"]));
        assert_eq!(
            a.hint(),
            " [Menciona a Marco, Gruk. Quien mejor conozca el tema responde.]"
        );
    }

    #[test]
    fn hint_names_both_roles() {
        let a = detector().detect("Elena, donde esta Bones");
        assert_eq!(
            a.hint(),
            " [HABLA CON Elena, PREGUNTA SOBRE Bones. Solo Elena responde(n).]"
        );
    }

    #[test]
    fn bare_name_is_spoken_to() {
        assert_eq!(detector().detect("bones").spoken_to, names(&["Bones"]));
    }
}

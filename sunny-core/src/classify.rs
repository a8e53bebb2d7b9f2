//! Heuristic text classification for overheard speech.
//!
//! Turning an utterance into a memory needs tags, an importance tier, an
//! emotion and any facts worth keeping. The [`TextClassifier`] trait is the
//! seam; [`KeywordClassifier`] is the default, a set of keyword and regex
//! rules tuned for the village's Spanish.

use std::fmt;

use regex::Regex;

use crate::error::Result;
use crate::memory::{Emotion, Importance};

/// Messages shorter than this (in chars) are treated as small talk.
const SHORT_MESSAGE_CHARS: usize = 15;

/// Topic keyword patterns and the tag each one yields.
const TOPIC_PATTERNS: &[(&str, &str)] = &[
    (r"planta|hierba|flor|jard[ií]n|cultivo|regar", "plantas"),
    (r"shiny|brillante|oro|tesoro|bot[oó]n", "shiny"),
    (r"guardia|patrulla|pelea|espada|proteger", "guardia"),
    (r"hueso|muerte|morir|vida|filosof", "filosofía"),
    (r"comida|comer|cocinar|sopa|manzana", "comida"),
    (r"libro|leer|historia|saber|conocer", "conocimiento"),
    (r"mina|piedra|cavar|excavar|pico", "minería"),
    (r"amigo|querer|cariño|solo|compañía", "amistad"),
    (r"triste|feliz|contento|enfadado|miedo", "emociones"),
];

/// Emotion cues, checked in order; the first match wins.
const EMOTION_PATTERNS: &[(&str, Emotion)] = &[
    (r"jaja|jeje|gracioso|divertido|risa", Emotion::Amused),
    (r"gracias|amable|genial|incre[ií]ble|me gusta", Emotion::Happy),
    (r"triste|pena|l[aá]stima|lo siento|pobre", Emotion::Sad),
    (r"idiota|tonto|feo|odio|c[aá]llate", Emotion::Angry),
    (r"misterio|secreto|curioso|interesante|¿por qu[eé]", Emotion::Curious),
];

const REVELATION_PATTERN: &str = r"mi nombre|me llamo|mi favorit|mi familia|te cuento un secreto";
const NAME_FACT: &str = r"(?:me llamo|mi nombre es|soy) (\w+)";
const LIKE_FACT: &str = r"me (?:gusta|encanta|fascina) (?:mucho )?(?:el |la |los |las )?(.{3,25}?)(?:\.|,|$)";
const WORK_FACT: &str = r"(?:trabajo (?:como|de) (.{3,20}?)(?:\.|,| en |$)|soy (.{3,20}?) de profesi[oó]n)";

/// A fact worth storing as semantic knowledge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedFact {
    /// The fact, phrased from the listener's point of view.
    pub text: String,
    /// Who the fact is about.
    pub subject: String,
    /// Tags to store with it.
    pub tags: Vec<String>,
}

/// Turns raw utterances into memory metadata.
pub trait TextClassifier: Send + Sync + fmt::Debug {
    /// Topic and name tags found in `text`, deduplicated.
    fn tags(&self, text: &str) -> Vec<String>;

    /// How much `listener` should care about hearing `text`.
    fn importance(&self, text: &str, listener: &str) -> Importance;

    /// The emotion `text` conveys.
    fn emotion(&self, text: &str) -> Emotion;

    /// Facts `speaker` reveals about themselves in `text`.
    fn facts(&self, speaker: &str, text: &str) -> Vec<ExtractedFact>;
}

/// Keyword and regex rules. Cheap, predictable and easily fooled.
#[derive(Debug, Clone)]
pub struct KeywordClassifier {
    names: Vec<String>,
    topics: Vec<(Regex, &'static str)>,
    emotions: Vec<(Regex, Emotion)>,
    revelation: Regex,
    name_fact: Regex,
    like_fact: Regex,
    work_fact: Regex,
}

impl KeywordClassifier {
    /// Build the classifier for a roster of agent names.
    ///
    /// # Errors
    /// Returns [`CoreError::Pattern`](crate::CoreError::Pattern) if a built-in
    /// pattern fails to compile.
    pub fn new<S: AsRef<str>>(roster: &[S]) -> Result<Self> {
        let topics = TOPIC_PATTERNS
            .iter()
            .map(|(pattern, tag)| Ok((ci(pattern)?, *tag)))
            .collect::<Result<Vec<_>>>()?;
        let emotions = EMOTION_PATTERNS
            .iter()
            .map(|(pattern, emotion)| Ok((ci(pattern)?, *emotion)))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            names: roster.iter().map(|n| n.as_ref().to_lowercase()).collect(),
            topics,
            emotions,
            revelation: ci(REVELATION_PATTERN)?,
            name_fact: ci(NAME_FACT)?,
            like_fact: ci(LIKE_FACT)?,
            work_fact: ci(WORK_FACT)?,
        })
    }
}

fn ci(pattern: &str) -> Result<Regex> {
    Ok(Regex::new(&format!("(?i){pattern}"))?)
}

impl TextClassifier for KeywordClassifier {
    fn tags(&self, text: &str) -> Vec<String> {
        let lower = text.to_lowercase();
        let mut tags: Vec<String> = Vec::new();
        for name in &self.names {
            if lower.contains(name.as_str()) && !tags.contains(name) {
                tags.push(name.clone());
            }
        }
        for (pattern, tag) in &self.topics {
            if pattern.is_match(&lower) && !tags.iter().any(|t| t == tag) {
                tags.push((*tag).to_string());
            }
        }
        tags
    }

    fn importance(&self, text: &str, listener: &str) -> Importance {
        let lower = text.to_lowercase();
        if self.revelation.is_match(&lower) {
            return Importance::HIGH;
        }
        if !listener.is_empty() && lower.contains(&listener.to_lowercase()) {
            return Importance::NORMAL.bumped();
        }
        if text.chars().count() < SHORT_MESSAGE_CHARS {
            return Importance::LOW;
        }
        Importance::NORMAL
    }

    fn emotion(&self, text: &str) -> Emotion {
        let lower = text.to_lowercase();
        self.emotions
            .iter()
            .find(|(pattern, _)| pattern.is_match(&lower))
            .map_or(Emotion::Neutral, |(_, emotion)| *emotion)
    }

    fn facts(&self, speaker: &str, text: &str) -> Vec<ExtractedFact> {
        let lower = text.to_lowercase();
        let speaker_tag = speaker.to_lowercase();
        let mut facts = Vec::new();

        if let Some(name) = self.name_fact.captures(&lower).and_then(|c| c.get(1)) {
            facts.push(ExtractedFact {
                text: format!("{speaker} se llama {}", name.as_str()),
                subject: speaker.to_string(),
                tags: vec!["nombre".to_string(), speaker_tag.clone()],
            });
        }
        if let Some(liked) = self.like_fact.captures(&lower).and_then(|c| c.get(1)) {
            facts.push(ExtractedFact {
                text: format!("A {speaker} le gusta {}", liked.as_str().trim()),
                subject: speaker.to_string(),
                tags: vec!["gustos".to_string(), speaker_tag.clone()],
            });
        }
        if let Some(job) = self
            .work_fact
            .captures(&lower)
            .and_then(|c| c.get(1).or_else(|| c.get(2)))
        {
            facts.push(ExtractedFact {
                text: format!("{speaker} trabaja como {}", job.as_str().trim()),
                subject: speaker.to_string(),
                tags: vec!["trabajo".to_string(), speaker_tag],
            });
        }
        facts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> KeywordClassifier {
        KeywordClassifier::new(&["Elena", "Marco", "Gruk", "Bones"]).expect("patterns compile")
    }

    #[test]
    fn tags_include_names_and_topics() {
        let tags = classifier().tags("Marco, ¿has visto las flores del jardín?");
        assert_eq!(tags, vec!["marco".to_string(), "plantas".to_string()]);
    }

    #[test]
    fn importance_tiers() {
        let c = classifier();
        assert_eq!(c.importance("me llamo Ana y vengo de lejos", "Elena"), Importance::HIGH);
        assert_eq!(c.importance("oye elena, ¿qué tal el huerto?", "Elena"), Importance(4));
        assert_eq!(c.importance("hola", "Elena"), Importance::LOW);
        assert_eq!(c.importance("hace un día precioso en la aldea", "Elena"), Importance::NORMAL);
    }

    #[test]
    fn emotion_follows_first_matching_cue() {
        let c = classifier();
        assert_eq!(c.emotion("jaja qué gracioso"), Emotion::Amused);
        assert_eq!(c.emotion("muchas gracias"), Emotion::Happy);
        assert_eq!(c.emotion("¿por qué brilla?"), Emotion::Curious);
        assert_eq!(c.emotion("buenos días"), Emotion::Neutral);
    }

    #[test]
    fn facts_are_extracted() {
        let facts = classifier().facts("Ana", "Me llamo Ana y me gusta la sopa de calabaza.");
        let texts: Vec<_> = facts.iter().map(|f| f.text.as_str()).collect();
        assert!(texts.contains(&"Ana se llama ana"));
        assert!(texts.contains(&"A Ana le gusta sopa de calabaza"));
    }

    #[test]
    fn occupation_fact() {
        let facts = classifier().facts("Leo", "trabajo como herrero en la ciudad");
        assert_eq!(facts.len(), 1);
        assert_eq!(facts[0].text, "Leo trabaja como herrero");
        assert_eq!(facts[0].tags, vec!["trabajo".to_string(), "leo".to_string()]);
    }
}

//! Per-agent social needs and the decisions that follow from them.
//!
//! A drive accumulates loneliness and expressiveness while its agent is
//! idle. Once the agent is off cooldown, every tick rolls against
//! `initiative × urgency` to decide whether it wants to talk.

use std::time::Duration;

use serde::Serialize;
use tracing::trace;

use crate::config::SocialConfig;
use crate::dice::Dice;
use crate::memory::{Emotion, MemoryBook};
use crate::personality::AgentProfile;
use crate::retrieval::RecallQuery;
use crate::types::Timestamp;

/// Affinity assumed toward agents the profile does not list.
pub const DEFAULT_AFFINITY: f64 = 0.3;

const NEED_MAX: f64 = 100.0;
const HAPPY_BONUS: f64 = 0.2;
const CURIOUS_BONUS: f64 = 0.15;
const TARGET_JITTER: f64 = 0.3;

/// Offsets the curiosity walk so it drifts upward on average.
const CURIOSITY_BIAS: f64 = 0.3;

/// Remarks an agent can open with when nothing better comes to mind.
pub const ENVIRONMENTAL_REMARKS: &[&str] = &[
    "qué bonito día",
    "hace calor hoy",
    "oí un ruido raro",
    "vi algo moverse en el bosque",
    "tengo hambre",
    "qué hora es",
    "ayer soñé algo raro",
    "has visto algo interesante",
];

/// Placeholder topic text for "comment on what we are doing".
pub const ACTIVITY_TOPIC: &str = "actividad actual";

// ---------------------------------------------------------------------------
// Topics and intents
// ---------------------------------------------------------------------------

/// Where a conversation topic came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TopicKind {
    /// Something the initiator remembers about the target.
    Memory,
    /// One of the initiator's interests.
    Interest,
    /// What the participants are doing right now.
    Activity,
    /// A stock remark about the surroundings.
    Environmental,
}

/// A chosen conversation topic.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Topic {
    /// Origin of the topic.
    pub kind: TopicKind,
    /// Topic text.
    pub text: String,
    /// Selection weight it was drawn with.
    pub weight: f64,
}

impl Topic {
    fn new(kind: TopicKind, text: impl Into<String>, weight: f64) -> Self {
        Self {
            kind,
            text: text.into(),
            weight,
        }
    }
}

/// Why an agent is walking toward someone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SeekReason {
    /// Loneliness is above the configured threshold.
    Lonely,
    /// The agent simply has something to say.
    WantsToChat,
}

/// An agent with nobody in earshot heading toward a preferred partner.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeekIntent {
    /// The agent that moves.
    pub agent: String,
    /// Who it is looking for.
    pub target: String,
    /// Why.
    pub reason: SeekReason,
}

// ---------------------------------------------------------------------------
// Drive
// ---------------------------------------------------------------------------

/// One agent's social needs on a 0–100 scale.
#[derive(Debug, Clone, PartialEq)]
pub struct SocialDrive {
    agent: String,
    /// Grows after a minute without conversation.
    pub loneliness: f64,
    /// Wanders randomly.
    pub curiosity: f64,
    /// Things to say; grows steadily.
    pub expressiveness: f64,
    /// Desire to help someone. Not yet driven by anything.
    pub helpfulness: f64,
    /// Pending seek, handed out once by the engine.
    pub seek: Option<SeekIntent>,
    /// When the agent last took part in a conversation.
    pub last_conversation: Option<Timestamp>,
    /// Time left before the agent may initiate again.
    pub cooldown: Duration,
}

impl SocialDrive {
    /// Fresh drive with the default starting needs.
    #[must_use]
    pub fn new(agent: impl Into<String>) -> Self {
        Self {
            agent: agent.into(),
            loneliness: 30.0,
            curiosity: 50.0,
            expressiveness: 40.0,
            helpfulness: 20.0,
            seek: None,
            last_conversation: None,
            cooldown: Duration::ZERO,
        }
    }

    /// The agent this drive belongs to.
    #[must_use]
    pub fn agent(&self) -> &str {
        &self.agent
    }

    /// `loneliness + expressiveness`, used to rank initiators.
    #[must_use]
    pub fn urgency(&self) -> f64 {
        self.loneliness + self.expressiveness
    }

    /// Whether the agent is still cooling down from its last conversation.
    #[must_use]
    pub fn on_cooldown(&self) -> bool {
        !self.cooldown.is_zero()
    }

    /// Advance the needs by `dt`.
    pub fn tick(&mut self, dt: Duration, now: Timestamp, config: &SocialConfig, dice: &mut Dice) {
        let secs = dt.as_secs_f64();

        let idle = self
            .last_conversation
            .is_none_or(|at| now.since(at) > Duration::from_secs(config.lonely_after_secs));
        if idle {
            self.loneliness = (self.loneliness + secs * config.loneliness_rate).min(NEED_MAX);
        }

        let walk = secs * config.curiosity_rate * (dice.roll() - CURIOSITY_BIAS);
        self.curiosity = (self.curiosity + walk).clamp(0.0, NEED_MAX);

        self.expressiveness = (self.expressiveness + secs * config.expressiveness_rate).min(NEED_MAX);
        self.cooldown = self.cooldown.saturating_sub(dt);
    }

    /// Roll for starting a conversation. Always false on cooldown.
    pub fn should_initiate(&self, initiative: f64, dice: &mut Dice) -> bool {
        if self.on_cooldown() {
            return false;
        }
        dice.chance(initiative * self.urgency() / 200.0)
    }

    /// Choose whom to talk to among `nearby`.
    ///
    /// Each candidate scores its affinity, a bonus for a happy or curious
    /// feeling toward them and some jitter. The highest score wins; the
    /// earliest candidate wins ties.
    pub fn pick_target(
        &self,
        profile: &AgentProfile,
        nearby: &[String],
        memory: &MemoryBook,
        dice: &mut Dice,
    ) -> Option<String> {
        let mut best: Option<(&String, f64)> = None;
        for name in nearby.iter().filter(|n| n.as_str() != self.agent) {
            let mut score = profile.affinity_toward(name).unwrap_or(DEFAULT_AFFINITY);
            match memory.feeling(&self.agent, name).emotion {
                Emotion::Happy => score += HAPPY_BONUS,
                Emotion::Curious => score += CURIOUS_BONUS,
                _ => {}
            }
            score += dice.roll() * TARGET_JITTER;
            if best.is_none_or(|(_, top)| score > top) {
                best = Some((name, score));
            }
        }
        best.map(|(name, _)| name.clone())
    }

    /// Weighted draw among a remembered fact about `target` (weight 3, only
    /// when recall succeeds), an interest (2), the current activity (1.5) and
    /// an environmental remark (1).
    pub fn pick_topic(
        &self,
        profile: &AgentProfile,
        target: &str,
        memory: &mut MemoryBook,
        now: Timestamp,
        dice: &mut Dice,
    ) -> Topic {
        let mut topics = Vec::with_capacity(4);

        let query = RecallQuery::new(target).tags([target.to_lowercase()]).max_results(2);
        let recollection = memory.recall(&self.agent, &query, now, dice);
        if let Some(first) = recollection.memories().first() {
            topics.push(Topic::new(TopicKind::Memory, first.text.clone(), 3.0));
        }
        if let Some(interest) = dice.pick(&profile.social.interests) {
            topics.push(Topic::new(TopicKind::Interest, interest.clone(), 2.0));
        }
        topics.push(Topic::new(TopicKind::Activity, ACTIVITY_TOPIC, 1.5));
        let remark = dice.pick(ENVIRONMENTAL_REMARKS).copied().unwrap_or(ENVIRONMENTAL_REMARKS[0]);
        topics.push(Topic::new(TopicKind::Environmental, remark, 1.0));

        let chosen = dice
            .weighted(&topics, |t| t.weight)
            .cloned()
            .unwrap_or_else(|| Topic::new(TopicKind::Activity, ACTIVITY_TOPIC, 1.5));
        trace!(agent = %self.agent, kind = ?chosen.kind, topic = %chosen.text, "picked topic");
        chosen
    }

    /// The agent just took part in a conversation.
    pub fn on_conversation(&mut self, now: Timestamp, config: &SocialConfig, dice: &mut Dice) {
        self.last_conversation = Some(now);
        self.loneliness = (self.loneliness - config.loneliness_relief).max(0.0);
        self.expressiveness = (self.expressiveness - config.expressiveness_relief).max(0.0);
        #[allow(clippy::cast_precision_loss)]
        let secs = dice.between(config.cooldown_min_secs as f64, config.cooldown_max_secs as f64);
        self.cooldown = Duration::from_secs_f64(secs.max(0.0));
    }

    /// Rounded view for debug output.
    #[must_use]
    pub fn snapshot(&self, now: Timestamp) -> DriveSnapshot {
        DriveSnapshot {
            loneliness: self.loneliness.round(),
            curiosity: self.curiosity.round(),
            expressiveness: self.expressiveness.round(),
            seek_target: self.seek.as_ref().map(|s| s.target.clone()),
            cooldown_ms: u64::try_from(self.cooldown.as_millis()).unwrap_or(u64::MAX),
            last_conversation_secs_ago: self.last_conversation.map(|at| now.since(at).as_secs()),
        }
    }
}

/// Point-in-time drive state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DriveSnapshot {
    /// Rounded loneliness.
    pub loneliness: f64,
    /// Rounded curiosity.
    pub curiosity: f64,
    /// Rounded expressiveness.
    pub expressiveness: f64,
    /// Pending seek target, if any.
    pub seek_target: Option<String>,
    /// Remaining cooldown.
    pub cooldown_ms: u64,
    /// Seconds since the last conversation.
    pub last_conversation_secs_ago: Option<u64>,
}

//! The social engine: drives for every agent, conversation requests and the
//! lock that keeps group conversations from overlapping.
//!
//! ```text
//!   tick() ──► drives tick ──► initiators ranked by urgency
//!                                  │
//!                 nobody in earshot│someone nearby
//!                        ▼         ▼
//!                   SeekIntent   ConversationRequest ──► queue
//!                                                          │
//!   next_conversation() ◄── (unless locked) ◄──────────────┘
//! ```

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info};

use crate::clock::Clock;
use crate::config::SocialConfig;
use crate::dice::Dice;
use crate::drive::{DriveSnapshot, SeekIntent, SeekReason, SocialDrive, Topic};
use crate::memory::MemoryBook;
use crate::personality::{PersonalityCatalog, SocialTraits};
use crate::prompt::{self, PlayerScene, Prompt};
use crate::types::{ActivityMap, PositionProvider, Timestamp, truncate_chars};

/// Bonus to the reply chance of a lonely agent.
const LONELY_REPLY_BONUS: f64 = 0.15;
/// Loneliness above which the bonus applies.
const LONELY_REPLY_THRESHOLD: f64 = 50.0;
/// Bonus to the reply chance when the message touches an interest.
const INTEREST_REPLY_BONUS: f64 = 0.2;
/// Chars of the opening line used as the interaction topic.
const INTERACTION_TOPIC_CHARS: usize = 30;

/// A conversation the engine wants to happen.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversationRequest {
    /// Who starts talking.
    pub initiator: String,
    /// Who they address.
    pub target: String,
    /// What about.
    pub topic: Topic,
    /// Initiator, target, then any bystanders who joined.
    pub participants: Vec<String>,
    /// When the request was formed.
    pub created_at: Timestamp,
}

/// Outcome of a social tick.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SocialAction {
    /// A conversation was queued.
    Converse(ConversationRequest),
    /// Nobody was in earshot; the initiator should go find someone.
    Seek(SeekIntent),
}

/// One spoken line of a finished conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    /// Who spoke.
    pub speaker: String,
    /// What they said.
    pub text: String,
}

impl Turn {
    /// Build a turn.
    #[must_use]
    pub fn new(speaker: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            speaker: speaker.into(),
            text: text.into(),
        }
    }
}

/// Debug view of the engine.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineSnapshot {
    /// Per-agent drive state.
    pub drives: BTreeMap<String, DriveSnapshot>,
    /// Requests waiting for the lock.
    pub queue_len: usize,
    /// Remaining lock time.
    pub locked_for_ms: u64,
}

/// Drives, queue and lock for the whole village.
#[derive(Debug)]
pub struct SocialEngine {
    catalog: Arc<PersonalityCatalog>,
    config: SocialConfig,
    drives: BTreeMap<String, SocialDrive>,
    queue: VecDeque<ConversationRequest>,
    lock_until: Timestamp,
    last_tick: Timestamp,
    clock: Arc<dyn Clock>,
    dice: Dice,
}

impl SocialEngine {
    /// One drive per catalog agent.
    #[must_use]
    pub fn new(catalog: Arc<PersonalityCatalog>, config: SocialConfig, clock: Arc<dyn Clock>, dice: Dice) -> Self {
        let drives = catalog
            .iter()
            .map(|p| (p.name.clone(), SocialDrive::new(p.name.clone())))
            .collect();
        let now = clock.now();
        Self {
            catalog,
            config,
            drives,
            queue: VecDeque::new(),
            lock_until: now,
            last_tick: now,
            clock,
            dice,
        }
    }

    /// The catalog the engine was built from.
    #[must_use]
    pub fn catalog(&self) -> &PersonalityCatalog {
        &self.catalog
    }

    /// Social tuning in use.
    #[must_use]
    pub fn config(&self) -> &SocialConfig {
        &self.config
    }

    /// One agent's drive.
    #[must_use]
    pub fn drive(&self, agent: &str) -> Option<&SocialDrive> {
        self.drives.get(agent)
    }

    /// One agent's drive, mutably.
    pub fn drive_mut(&mut self, agent: &str) -> Option<&mut SocialDrive> {
        self.drives.get_mut(agent)
    }

    /// The engine's random source, shared with memory recall during ticks.
    pub fn dice_mut(&mut self) -> &mut Dice {
        &mut self.dice
    }

    fn traits(&self, agent: &str) -> SocialTraits {
        self.catalog.get(agent).map(|p| p.social.clone()).unwrap_or_default()
    }

    // -----------------------------------------------------------------------
    // Tick
    // -----------------------------------------------------------------------

    /// Advance every drive and maybe form an intent.
    ///
    /// Only the most urgent willing initiator acts per tick.
    pub fn tick(&mut self, memory: &mut MemoryBook, positions: &dyn PositionProvider) -> Option<SocialAction> {
        let now = self.clock.now();
        let dt = now.since(self.last_tick);
        self.last_tick = now;

        for drive in self.drives.values_mut() {
            drive.tick(dt, now, &self.config, &mut self.dice);
        }

        let mut initiators: Vec<(String, f64)> = Vec::new();
        for (name, drive) in &self.drives {
            let initiative = self.catalog.get(name).map_or(SocialTraits::default().initiative, |p| p.social.initiative);
            if drive.should_initiate(initiative, &mut self.dice) {
                initiators.push((name.clone(), drive.urgency()));
            }
        }
        initiators.sort_by(|a, b| b.1.total_cmp(&a.1));
        let (initiator, _) = initiators.into_iter().next()?;

        let nearby = self.nearby(&initiator, positions);
        if nearby.is_empty() {
            return self.seek(&initiator).map(SocialAction::Seek);
        }

        let profile = self.catalog.get(&initiator)?.clone();
        let drive = self.drives.get(&initiator)?;
        let target = drive.pick_target(&profile, &nearby, memory, &mut self.dice)?;
        let topic = drive.pick_topic(&profile, &target, memory, now, &mut self.dice);
        let participants = self.participants(&initiator, &target, &nearby);

        let request = ConversationRequest {
            initiator,
            target,
            topic,
            participants,
            created_at: now,
        };
        info!(
            initiator = %request.initiator,
            target = %request.target,
            topic = %request.topic.text,
            participants = request.participants.len(),
            "conversation queued"
        );
        self.queue.push_back(request.clone());
        Some(SocialAction::Converse(request))
    }

    /// Agents within hearing range of `agent`, in name order.
    fn nearby(&self, agent: &str, positions: &dyn PositionProvider) -> Vec<String> {
        let positions = positions.positions();
        let Some(origin) = positions.get(agent) else {
            return Vec::new();
        };
        positions
            .iter()
            .filter(|(name, pos)| name.as_str() != agent && origin.distance_to(pos) < self.config.hearing_radius)
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Initiator and target, plus bystanders who roll under
    /// `talkativeness × join factor`.
    fn participants(&mut self, initiator: &str, target: &str, nearby: &[String]) -> Vec<String> {
        let mut participants = vec![initiator.to_string(), target.to_string()];
        for name in nearby {
            if name == initiator || name == target {
                continue;
            }
            let talkativeness = self.traits(name).talkativeness;
            if self.dice.chance(talkativeness * self.config.bystander_join_factor) {
                participants.push(name.clone());
            }
        }
        participants
    }

    fn seek(&mut self, agent: &str) -> Option<SeekIntent> {
        let mut candidates: Vec<(String, f64)> = self.traits(agent).affinities.into_iter().collect();
        candidates.sort_by(|a, b| b.1.total_cmp(&a.1));
        if candidates.is_empty() {
            return None;
        }

        let target = if self.dice.chance(self.config.top_preference_chance) {
            candidates[0].0.clone()
        } else {
            let index = self.dice.index(candidates.len()).unwrap_or(0);
            candidates[index].0.clone()
        };

        let drive = self.drives.get_mut(agent)?;
        let reason = if drive.loneliness > self.config.lonely_threshold {
            SeekReason::Lonely
        } else {
            SeekReason::WantsToChat
        };
        let intent = SeekIntent {
            agent: agent.to_string(),
            target,
            reason,
        };
        debug!(agent, target = %intent.target, ?reason, "seek intent");
        drive.seek = Some(intent.clone());
        Some(intent)
    }

    // -----------------------------------------------------------------------
    // After a conversation
    // -----------------------------------------------------------------------

    /// Update drives and memories once a conversation has played out.
    ///
    /// Every participant's drive is relieved. Each turn is remembered by every
    /// participant except its speaker. The first two distinct speakers
    /// remember the exchange as an interaction.
    pub fn after_conversation(&mut self, memory: &mut MemoryBook, participants: &[String], turns: &[Turn]) {
        let now = self.clock.now();
        for name in participants {
            if let Some(drive) = self.drives.get_mut(name) {
                drive.on_conversation(now, &self.config, &mut self.dice);
            }
            for turn in turns {
                if !turn.text.is_empty() && turn.speaker != *name {
                    memory.observe_utterance(name, &turn.speaker, &turn.text, now);
                }
            }
        }

        let mut speakers: Vec<&str> = Vec::new();
        for turn in turns {
            if !speakers.contains(&turn.speaker.as_str()) {
                speakers.push(&turn.speaker);
            }
        }
        if let [first, second, ..] = speakers.as_slice() {
            let topic = turns
                .first()
                .map(|t| truncate_chars(&t.text, INTERACTION_TOPIC_CHARS))
                .filter(|t| !t.is_empty())
                .unwrap_or("chat");
            memory.record_interaction(first, second, topic, "conversación normal", now);
        }
    }

    /// Relieve one agent's drive after it talked to a player.
    pub fn note_conversation(&mut self, agent: &str) {
        let now = self.clock.now();
        if let Some(drive) = self.drives.get_mut(agent) {
            drive.on_conversation(now, &self.config, &mut self.dice);
        }
    }

    /// Pending seek intents. Each is handed out once.
    pub fn take_seek_targets(&mut self) -> Vec<SeekIntent> {
        self.drives.values_mut().filter_map(|d| d.seek.take()).collect()
    }

    // -----------------------------------------------------------------------
    // Queue and lock
    // -----------------------------------------------------------------------

    /// Hold back queued conversations for `duration`.
    pub fn lock(&mut self, duration: Duration) {
        self.lock_until = self.clock.now().after(duration);
        debug!(until = %self.lock_until, "conversation lock");
    }

    /// Whether a conversation is still playing out.
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.clock.now() < self.lock_until
    }

    /// The oldest queued request, unless locked.
    pub fn next_conversation(&mut self) -> Option<ConversationRequest> {
        if self.is_locked() {
            return None;
        }
        self.queue.pop_front()
    }

    /// Whether requests are waiting.
    #[must_use]
    pub fn has_pending(&self) -> bool {
        !self.queue.is_empty()
    }

    // -----------------------------------------------------------------------
    // Player chat helpers
    // -----------------------------------------------------------------------

    /// Whether `agent` chimes in on a player message.
    ///
    /// Always when directly addressed; otherwise a roll against its
    /// talkativeness, raised when lonely or when the message touches an
    /// interest.
    pub fn should_respond(&mut self, agent: &str, message: &str, addressed: bool) -> bool {
        if addressed {
            return true;
        }
        let traits = self.traits(agent);
        let mut chance = traits.talkativeness;
        if self.drives.get(agent).is_some_and(|d| d.loneliness > LONELY_REPLY_THRESHOLD) {
            chance += LONELY_REPLY_BONUS;
        }
        let lower = message.to_lowercase();
        if traits.interests.iter().any(|i| lower.contains(i.as_str())) {
            chance += INTEREST_REPLY_BONUS;
        }
        self.dice.chance(chance)
    }

    /// Delay before `agent`'s message at position `index` in a reply
    /// sequence. Callers accumulate these so messages never overlap.
    pub fn response_delay(&mut self, agent: &str, index: usize) -> Duration {
        let traits = self.traits(agent);
        let base = if index == 0 {
            self.config.first_responder_delay_ms
        } else {
            self.config.later_responder_delay_ms
        };
        #[allow(clippy::cast_precision_loss)]
        let jitter = self.dice.roll() * traits.typing_variance_ms as f64;
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let ms = base + traits.typing_base_ms + jitter as u64;
        Duration::from_millis(ms)
    }

    // -----------------------------------------------------------------------
    // Prompts and introspection
    // -----------------------------------------------------------------------

    /// Prompt for a queued conversation.
    #[must_use]
    pub fn build_conversation_prompt(
        &self,
        request: &ConversationRequest,
        memory: &MemoryBook,
        activities: &ActivityMap,
    ) -> Prompt {
        prompt::conversation_prompt(request, &self.catalog, memory, activities)
    }

    /// Prompt for a player message.
    #[must_use]
    pub fn build_player_prompt(&self, scene: &PlayerScene<'_>, memory: &MemoryBook) -> Prompt {
        prompt::player_prompt(scene, &self.catalog, memory)
    }

    /// Debug view of drives, queue and lock.
    #[must_use]
    pub fn snapshot(&self) -> EngineSnapshot {
        let now = self.clock.now();
        EngineSnapshot {
            drives: self
                .drives
                .iter()
                .map(|(name, drive)| (name.clone(), drive.snapshot(now)))
                .collect(),
            queue_len: self.queue.len(),
            locked_for_ms: u64::try_from(self.lock_until.since(now).as_millis()).unwrap_or(u64::MAX),
        }
    }
}

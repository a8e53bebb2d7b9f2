//! One running village.
//!
//! A [`Session`] owns every piece of mutable state: memories, drives, moods,
//! bodies, players and the dialogue schedule. It is driven by a single task
//! (see [`crate::runner`]), so nothing in here is shared or locked.
//!
//! Generation is the only slow step. It is split out of the session so the
//! driver can await it without holding the state:
//!
//! ```text
//!   player_message() ──► ReplyRequest ──► pipeline ──► deliver_player_replies()
//!   poll_conversation() ─► ConversationPlan ─► pipeline ─► deliver_conversation()
//!                                                               │
//!   flush_due() ◄──────────── DialogueSchedule ◄────────────────┘
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use sunny_core::memory::book::StoreSnapshot;
use sunny_core::prompt::PlayerScene;
use sunny_core::social::EngineSnapshot;
use sunny_core::{
    Clock, ConversationRequest, Dice, Emotion, Importance, MemoryBook, Mood, NewMemory, PersonalityCatalog,
    PlayerFactExtractor, PlayerFacts, Position, PositionProvider, Prompt, SocialAction, SocialEngine, Timestamp, Turn, truncate_chars,
};
use sunny_llm::{DialogueTurn, GenerationPipeline, PipelineStats};
use tracing::{debug, info, warn};

use crate::config::SimConfig;
use crate::error::{Result, WorldError};
use crate::events::{WorldEvent, bubble_duration_ms};
use crate::friendship::{Friendship, discoveries_in, reply_gain};
use crate::history::ChatHistory;
use crate::layout::VillageLayout;
use crate::mood::MoodBoard;
use crate::proximity::{ReplySelection, Viewport, nearby_agents, select_replies};
use crate::relationships::Bonds;
use crate::schedule::{DialogueSchedule, Origin, ScheduledLine};
use crate::village::{BodySnapshot, Village};

/// Name given to players who did not pick one.
const DEFAULT_PLAYER_NAME: &str = "Aventurero";
/// Told to a player whom no agent can hear.
const NOBODY_NEAR_NOTICE: &str = "No hay nadie cerca para oírte. Acércate a un NPC.";
/// Chars of an agent's own reply it remembers.
const OWN_REPLY_EXCERPT: usize = 60;

/// A connected player.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub String);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PlayerId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for PlayerId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// What the village knows about one player.
#[derive(Debug, Clone, Serialize)]
pub struct Player {
    /// Connection id.
    pub id: PlayerId,
    /// Display name.
    pub name: String,
    /// Where they stand.
    pub position: Position,
    /// Their screen size.
    pub viewport: Viewport,
    /// Facts gathered from their chat.
    pub facts: PlayerFacts,
    /// Standing with each agent.
    pub friendship: Friendship,
}

/// A player message waiting for generated replies.
#[derive(Debug, Clone)]
pub struct ReplyRequest {
    /// Who asked.
    pub player: PlayerId,
    /// What they said.
    pub message: String,
    /// The prompt to send.
    pub prompt: Prompt,
    /// Agents spoken to directly.
    pub spoken_to: Vec<String>,
    /// Agents that heard the message, nearest first.
    pub nearby: Vec<String>,
    /// Whether the message revealed new facts about the player.
    pub revealed_facts: bool,
}

/// A queued village conversation waiting for generated turns.
#[derive(Debug, Clone)]
pub struct ConversationPlan {
    /// The request the social engine formed.
    pub request: ConversationRequest,
    /// The prompt to send.
    pub prompt: Prompt,
}

/// Debug view of the whole session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    /// When the snapshot was taken.
    pub at: Timestamp,
    /// Per-agent memory stores.
    pub memories: BTreeMap<String, StoreSnapshot>,
    /// Drives, queue and lock.
    pub engine: EngineSnapshot,
    /// Generation counters.
    pub pipeline: PipelineStats,
    /// Agent bodies.
    pub bodies: Vec<BodySnapshot>,
    /// Agent moods.
    pub moods: BTreeMap<String, Mood>,
    /// Agent-to-agent scores.
    pub bonds: Bonds,
    /// Connected players.
    pub players: Vec<Player>,
    /// Lines waiting on the schedule.
    pub scheduled_lines: usize,
}

/// One running village.
#[derive(Debug)]
pub struct Session {
    config: SimConfig,
    catalog: Arc<PersonalityCatalog>,
    roster: Vec<String>,
    clock: Arc<dyn Clock>,
    memory: MemoryBook,
    engine: SocialEngine,
    pipeline: GenerationPipeline,
    extractor: PlayerFactExtractor,
    village: Village,
    moods: MoodBoard,
    bonds: Bonds,
    history: ChatHistory,
    schedule: DialogueSchedule,
    players: BTreeMap<PlayerId, Player>,
    rng: StdRng,
    last_tick: Timestamp,
    conversation_in_flight: bool,
    last_status: Option<sunny_llm::AiStatus>,
}

impl Session {
    /// Build a session around an already running pipeline.
    ///
    /// `general.seed`, when set, makes every random choice reproducible.
    ///
    /// # Errors
    /// Returns [`WorldError::Layout`] if the layout does not fit the roster
    /// and [`WorldError::Core`] if the core fails to initialise.
    pub fn new(
        config: SimConfig,
        catalog: Arc<PersonalityCatalog>,
        layout: VillageLayout,
        pipeline: GenerationPipeline,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        layout.validate(&catalog)?;
        let now = clock.now();
        let roster = catalog.names();
        let (dice, rng) = match config.general.seed {
            Some(seed) => (Dice::seeded(seed), StdRng::seed_from_u64(seed.wrapping_add(1))),
            None => (Dice::from_entropy(), StdRng::from_entropy()),
        };
        let memory = MemoryBook::seeded(&catalog, config.memory.clone(), now)?;
        let engine = SocialEngine::new(Arc::clone(&catalog), config.social.clone(), Arc::clone(&clock), dice);
        let cap = config.world.score_cap;
        info!(agents = roster.len(), seeded = config.general.seed.is_some(), "session started");
        Ok(Self {
            extractor: PlayerFactExtractor::new(&roster)?,
            village: Village::new(layout, config.world.clone()),
            moods: MoodBoard::new(&catalog, cap),
            bonds: Bonds::new(&catalog, cap),
            history: ChatHistory::new(config.llm.history_size),
            schedule: DialogueSchedule::new(),
            players: BTreeMap::new(),
            last_tick: now,
            conversation_in_flight: false,
            last_status: None,
            config,
            catalog,
            roster,
            clock,
            memory,
            engine,
            pipeline,
            rng,
        })
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    /// Settings in use.
    #[must_use]
    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Current session time.
    #[must_use]
    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    /// Every agent's memories.
    #[must_use]
    pub fn memory(&self) -> &MemoryBook {
        &self.memory
    }

    /// The social engine.
    #[must_use]
    pub fn engine(&self) -> &SocialEngine {
        &self.engine
    }

    /// The generation pipeline handle.
    #[must_use]
    pub fn pipeline(&self) -> &GenerationPipeline {
        &self.pipeline
    }

    /// Agent bodies.
    #[must_use]
    pub fn village(&self) -> &Village {
        &self.village
    }

    /// Agent bodies, mutably.
    pub fn village_mut(&mut self) -> &mut Village {
        &mut self.village
    }

    /// Agent moods.
    #[must_use]
    pub fn moods(&self) -> &MoodBoard {
        &self.moods
    }

    /// Agent-to-agent scores.
    #[must_use]
    pub fn bonds(&self) -> &Bonds {
        &self.bonds
    }

    /// Recent chat.
    #[must_use]
    pub fn history(&self) -> &ChatHistory {
        &self.history
    }

    /// The dialogue schedule.
    #[must_use]
    pub fn schedule(&self) -> &DialogueSchedule {
        &self.schedule
    }

    /// A connected player.
    #[must_use]
    pub fn player(&self, id: &PlayerId) -> Option<&Player> {
        self.players.get(id)
    }

    /// Whether anyone is connected.
    #[must_use]
    pub fn has_players(&self) -> bool {
        !self.players.is_empty()
    }

    // -----------------------------------------------------------------------
    // Players
    // -----------------------------------------------------------------------

    /// Connect a player.
    pub fn join(
        &mut self,
        id: PlayerId,
        name: &str,
        position: Option<Position>,
        viewport: Option<Viewport>,
    ) -> Vec<WorldEvent> {
        let name = match name.trim() {
            "" => DEFAULT_PLAYER_NAME.to_string(),
            trimmed => trimmed.to_string(),
        };
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let cap = self.config.world.score_cap as u32;
        let player = Player {
            id: id.clone(),
            name: name.clone(),
            position: position.unwrap_or_else(|| self.village.layout().bounds.center()),
            viewport: viewport.unwrap_or_else(|| self.default_viewport()),
            facts: PlayerFacts::new(),
            friendship: Friendship::new(&self.roster, cap),
        };
        info!(player = %id, %name, "player joined");
        self.players.insert(id.clone(), player);
        vec![
            WorldEvent::PlayerJoined {
                player: id.clone(),
                name: name.clone(),
            },
            WorldEvent::Notice {
                to: Some(id),
                text: format!("¡Bienvenido {name}! Habla por el chat y los NPCs te responderán."),
            },
        ]
    }

    /// Disconnect a player and drop replies still owed to them.
    ///
    /// # Errors
    /// Returns [`WorldError::UnknownPlayer`] if `id` is not connected.
    pub fn leave(&mut self, id: &PlayerId) -> Result<Vec<WorldEvent>> {
        let player = self
            .players
            .remove(id)
            .ok_or_else(|| WorldError::UnknownPlayer(id.clone()))?;
        let dropped = self.schedule.cancel_player(id);
        info!(player = %id, dropped, "player left");
        Ok(vec![WorldEvent::PlayerLeft {
            player: player.id,
            name: player.name,
        }])
    }

    /// Update where a player stands and, optionally, their screen size.
    ///
    /// # Errors
    /// Returns [`WorldError::UnknownPlayer`] if `id` is not connected.
    pub fn move_player(&mut self, id: &PlayerId, position: Position, viewport: Option<Viewport>) -> Result<()> {
        let player = self
            .players
            .get_mut(id)
            .ok_or_else(|| WorldError::UnknownPlayer(id.clone()))?;
        player.position = position;
        if let Some(viewport) = viewport {
            player.viewport = viewport;
        }
        Ok(())
    }

    /// Agents that hear `id` right now, nearest first.
    ///
    /// # Errors
    /// Returns [`WorldError::UnknownPlayer`] if `id` is not connected.
    pub fn nearby(&self, id: &PlayerId) -> Result<Vec<String>> {
        let player = self.players.get(id).ok_or_else(|| WorldError::UnknownPlayer(id.clone()))?;
        Ok(self.hearing(player))
    }

    fn hearing(&self, player: &Player) -> Vec<String> {
        nearby_agents(
            player.position,
            player.viewport,
            self.config.world.proximity_margin,
            &self.village.positions(),
        )
    }

    fn default_viewport(&self) -> Viewport {
        Viewport {
            width: self.config.world.viewport_width,
            height: self.config.world.viewport_height,
        }
    }

    /// Take a chat line from a player.
    ///
    /// Agents in earshot remember it, facts are extracted, and the reply
    /// prompt is built. Returns the events to show now and the request to
    /// hand to the pipeline, if any agent should answer.
    ///
    /// # Errors
    /// Returns [`WorldError::UnknownPlayer`] if `id` is not connected.
    pub fn player_message(&mut self, id: &PlayerId, text: &str) -> Result<(Vec<WorldEvent>, Option<ReplyRequest>)> {
        let message = text.trim();
        if message.is_empty() {
            return Ok((Vec::new(), None));
        }
        let now = self.clock.now();
        let player = self.players.get_mut(id).ok_or_else(|| WorldError::UnknownPlayer(id.clone()))?;
        let revealed = self.extractor.extract(message, &mut player.facts);
        let player = player.clone();

        let nearby = self.hearing(&player);
        for agent in &nearby {
            self.memory.observe_utterance(agent, &player.name, message, now);
        }

        let addressing = self.pipeline.detect_addressing(message);
        let activities = self.village.activities();
        let recent = self.history.recent(self.config.llm.history_in_prompt);
        let hint = addressing.hint();
        let scene = PlayerScene {
            player: &player.name,
            message,
            nearby: &nearby,
            activities: &activities,
            moods: self.moods.all(),
            addressing_hint: &hint,
            recent: &recent,
            facts: &player.facts,
        };
        let prompt = self.engine.build_player_prompt(&scene, &self.memory);
        self.history.push(player.name.clone(), message);

        info!(
            player = %id,
            nearby = nearby.len(),
            spoken_to = ?addressing.spoken_to,
            revealed = revealed.len(),
            "player message"
        );
        let events = vec![WorldEvent::PlayerSpoke {
            player: id.clone(),
            name: player.name,
            text: message.to_string(),
        }];
        let request = ReplyRequest {
            player: id.clone(),
            message: message.to_string(),
            prompt,
            spoken_to: addressing.spoken_to,
            nearby,
            revealed_facts: !revealed.is_empty(),
        };
        Ok((events, Some(request)))
    }

    /// Schedule the replies to a player message.
    ///
    /// `generated` is the pipeline's answer; `None` falls back to canned
    /// lines keyed on each agent's activity. Replies from agents that did not
    /// hear the message are dropped.
    pub fn deliver_player_replies(
        &mut self,
        request: ReplyRequest,
        generated: Option<Vec<(String, String)>>,
    ) -> Vec<WorldEvent> {
        if !self.players.contains_key(&request.player) {
            debug!(player = %request.player, "player left before the reply");
            return Vec::new();
        }
        let replies = match generated {
            Some(lines) if !lines.is_empty() => lines,
            _ => {
                let lower = request.message.to_lowercase();
                let addressed: Vec<String> = self
                    .roster
                    .iter()
                    .filter(|n| lower.contains(&n.to_lowercase()))
                    .cloned()
                    .collect();
                self.pipeline.fallback(&self.village.activities(), &addressed, &mut self.rng)
            }
        };

        let mut events = Vec::new();
        match select_replies(replies, &request.nearby) {
            ReplySelection::Speak(lines) => {
                let timed: Vec<(String, String, Duration)> = lines
                    .into_iter()
                    .enumerate()
                    .map(|(i, (agent, text))| {
                        let delay = self.engine.response_delay(&agent, i);
                        (agent, text, delay)
                    })
                    .collect();
                let origin = Origin::Player {
                    player: request.player.clone(),
                    revealed_facts: request.revealed_facts,
                };
                let (conversation, lines) = self.schedule.plan(origin.clone(), self.clock.now(), timed);
                events.push(WorldEvent::DialogueScheduled {
                    conversation,
                    origin,
                    lines,
                });
            }
            ReplySelection::NobodyNear => {
                events.push(WorldEvent::Notice {
                    to: Some(request.player.clone()),
                    text: NOBODY_NEAR_NOTICE.to_string(),
                });
            }
            ReplySelection::Silent => {}
        }
        events.push(WorldEvent::AiStatus {
            to: Some(request.player),
            status: self.pipeline.status(),
        });
        events
    }

    // -----------------------------------------------------------------------
    // Village conversations
    // -----------------------------------------------------------------------

    /// Take the next queued village conversation, if one may start now.
    ///
    /// Nothing starts while nobody is watching, while no provider is
    /// configured, while a provider limit is active, while a previous
    /// conversation is still being generated, or while the engine is locked.
    pub fn poll_conversation(&mut self) -> Option<ConversationPlan> {
        if self.players.is_empty() || !self.pipeline.has_providers() || self.pipeline.is_rate_limited() {
            return None;
        }
        if self.conversation_in_flight {
            return None;
        }
        let request = self.engine.next_conversation()?;
        let prompt = self
            .engine
            .build_conversation_prompt(&request, &self.memory, &self.village.activities());
        info!(
            initiator = %request.initiator,
            target = %request.target,
            topic = %request.topic.text,
            "conversation starting"
        );
        self.conversation_in_flight = true;
        Some(ConversationPlan { request, prompt })
    }

    /// Schedule a generated village conversation and apply its aftermath.
    ///
    /// Lines are placed at cumulative typing delays, the engine is locked
    /// until the last one has been shown plus a tail, every participant
    /// remembers the exchange and speaking pairs grow closer.
    pub fn deliver_conversation(&mut self, plan: ConversationPlan, turns: Option<Vec<DialogueTurn>>) -> Vec<WorldEvent> {
        self.conversation_in_flight = false;
        let turns: Vec<DialogueTurn> = turns
            .unwrap_or_default()
            .into_iter()
            .filter(|t| !t.message.is_empty() && self.catalog.contains(&t.agent))
            .collect();
        if turns.is_empty() {
            warn!(initiator = %plan.request.initiator, "conversation produced no turns");
            return Vec::new();
        }

        let stale = self.schedule.cancel_social();
        if stale > 0 {
            debug!(stale, "dropped lines of an older conversation");
        }

        let mut total = Duration::ZERO;
        let timed: Vec<(String, String, Duration)> = turns
            .iter()
            .enumerate()
            .map(|(i, t)| {
                let delay = self.engine.response_delay(&t.agent, i);
                total += delay;
                (t.agent.clone(), t.message.clone(), delay)
            })
            .collect();
        let origin = Origin::Social {
            participants: plan.request.participants.clone(),
        };
        let (conversation, lines) = self.schedule.plan(origin.clone(), self.clock.now(), timed);
        self.engine.lock(total + self.config.world.lock_tail());

        let spoken: Vec<Turn> = turns.iter().map(|t| Turn::new(&t.agent, &t.message)).collect();
        self.engine
            .after_conversation(&mut self.memory, &plan.request.participants, &spoken);

        let mut speakers: Vec<String> = Vec::new();
        for turn in &turns {
            if !speakers.contains(&turn.agent) {
                speakers.push(turn.agent.clone());
            }
        }
        self.bonds.after_conversation(&speakers);

        info!(%conversation, turns = turns.len(), total_ms = total.as_millis(), "conversation scheduled");
        vec![WorldEvent::DialogueScheduled {
            conversation,
            origin,
            lines,
        }]
    }

    // -----------------------------------------------------------------------
    // Ticks
    // -----------------------------------------------------------------------

    /// Move bodies, advance drives and act on seek intents.
    pub fn tick(&mut self) -> Vec<WorldEvent> {
        let now = self.clock.now();
        let dt = now.since(self.last_tick);
        self.last_tick = now;
        self.village.tick(dt, &mut self.rng);

        if let Some(SocialAction::Converse(request)) = self.engine.tick(&mut self.memory, &self.village) {
            debug!(initiator = %request.initiator, target = %request.target, "conversation queued");
        }

        let mut events = Vec::new();
        for intent in self.engine.take_seek_targets() {
            if let Some(target) = self.village.seek(&intent.agent, &intent.target, &mut self.rng) {
                info!(agent = %intent.agent, partner = %intent.target, reason = ?intent.reason, "seeking company");
                events.push(WorldEvent::AgentSeeking {
                    agent: intent.agent,
                    partner: intent.target,
                    target,
                });
            }
        }
        events
    }

    /// One mood drift step.
    pub fn tick_moods(&mut self) {
        self.moods.tick();
    }

    /// One memory decay pass. Returns how many memories were forgotten.
    pub fn tick_decay(&mut self) -> usize {
        self.memory.tick_decay()
    }

    /// The pipeline status, if it changed since the last call.
    pub fn status_change(&mut self) -> Option<WorldEvent> {
        let status = self.pipeline.status();
        if self.last_status.as_ref() == Some(&status) {
            return None;
        }
        self.last_status = Some(status.clone());
        Some(WorldEvent::AiStatus { to: None, status })
    }

    // -----------------------------------------------------------------------
    // Schedule driver
    // -----------------------------------------------------------------------

    /// Speak every line that is due and apply what follows from it.
    pub fn flush_due(&mut self) -> Vec<WorldEvent> {
        let now = self.clock.now();
        let mut events = Vec::new();
        for line in self.schedule.due(now) {
            self.history.push(line.agent.clone(), line.text.clone());
            events.push(WorldEvent::AgentSpoke {
                conversation: line.conversation,
                agent: line.agent.clone(),
                text: line.text.clone(),
                bubble_ms: bubble_duration_ms(&line.text),
            });
            match &line.origin {
                Origin::Social { .. } => self.moods.on_social_line(&line.agent),
                Origin::Player { player, revealed_facts } => {
                    let (player, revealed_facts) = (player.clone(), *revealed_facts);
                    self.after_player_reply(&line, &player, revealed_facts, now, &mut events);
                }
            }
        }
        events
    }

    fn after_player_reply(
        &mut self,
        line: &ScheduledLine,
        player_id: &PlayerId,
        revealed_facts: bool,
        now: Timestamp,
        events: &mut Vec<WorldEvent>,
    ) {
        let Some(player) = self.players.get(player_id) else {
            return;
        };
        let name = player.name.clone();

        for listener in self.hearing(player) {
            if listener != line.agent {
                self.memory.observe_utterance(&listener, &line.agent, &line.text, now);
            }
        }
        self.memory.remember(
            &line.agent,
            NewMemory::episodic(format!(
                "Le dije a {name}: \"{}\"",
                truncate_chars(&line.text, OWN_REPLY_EXCERPT)
            ))
            .about(name.clone())
            .tags([name.to_lowercase(), "conversación".to_string()])
            .importance(Importance::NORMAL)
            .emotion(Emotion::Neutral),
            now,
        );
        self.moods.on_player_reply(&line.agent);
        self.engine.note_conversation(&line.agent);

        let found = self
            .catalog
            .get(&line.agent)
            .map(|profile| discoveries_in(profile, &line.text))
            .unwrap_or_default();
        let Some(player) = self.players.get_mut(player_id) else {
            return;
        };
        let level = player
            .friendship
            .award(&line.agent, reply_gain(&line.text, revealed_facts));
        events.push(WorldEvent::FriendshipChanged {
            player: player_id.clone(),
            agent: line.agent.clone(),
            level,
        });
        for discovery in player.friendship.discover(&line.agent, &found) {
            info!(player = %player_id, agent = %line.agent, ?discovery, "discovery");
            events.push(WorldEvent::Discovered {
                player: player_id.clone(),
                agent: line.agent.clone(),
                discovery,
            });
        }
    }

    // -----------------------------------------------------------------------
    // Introspection
    // -----------------------------------------------------------------------

    /// Point-in-time view of everything.
    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            at: self.clock.now(),
            memories: self.memory.snapshot(),
            engine: self.engine.snapshot(),
            pipeline: self.pipeline.stats(),
            bodies: self.village.snapshot(),
            moods: self.moods.all().clone(),
            bonds: self.bonds.clone(),
            players: self.players.values().cloned().collect(),
            scheduled_lines: self.schedule.len(),
        }
    }
}

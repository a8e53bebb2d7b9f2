//! The session loop.
//!
//! One task owns the [`Session`] and multiplexes everything that can happen
//! to it:
//! 1. Player events arriving on the inbound channel
//! 2. World ticks (movement, drives, seek intents)
//! 3. The conversation poll, which hands queued village conversations to
//!    the pipeline
//! 4. Mood drift and memory decay
//! 5. The schedule driver, which speaks due lines and reports status changes
//! 6. Generations finishing in their own tasks
//!
//! Generation requests never block the loop. Each runs in a spawned task
//! holding a pipeline handle and reports back on an internal channel, so
//! ticks and chat keep flowing while a provider is slow or a rate limit is
//! being waited out.

use sunny_llm::DialogueTurn;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior, interval, interval_at};
use tracing::{debug, info, warn};

use crate::events::{PlayerEvent, WorldEvent};
use crate::session::{ConversationPlan, ReplyRequest, Session};

/// A generation that came back.
#[derive(Debug)]
enum Completed {
    Replies(ReplyRequest, Option<Vec<(String, String)>>),
    Conversation(ConversationPlan, Option<Vec<DialogueTurn>>),
}

/// Drives a [`Session`] from channels and timers.
#[derive(Debug)]
pub struct Runner {
    session: Session,
}

impl Runner {
    /// Wrap a session.
    #[must_use]
    pub fn new(session: Session) -> Self {
        Self { session }
    }

    /// The session being driven.
    #[must_use]
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Run until the inbound channel closes or nobody listens to outbound
    /// events. Returns the session for inspection.
    pub async fn run(mut self, mut inbound: mpsc::Receiver<PlayerEvent>, outbound: mpsc::Sender<WorldEvent>) -> Session {
        let world = self.session.config().world.clone();
        let decay_period = std::time::Duration::from_secs(self.session.config().memory.decay_interval_secs.max(1));
        let start = Instant::now();

        let mut world_tick = interval(world.world_tick());
        let mut schedule_tick = interval(world.schedule_resolution());
        let mut poll_tick = interval_at(start + world.conversation_poll(), world.conversation_poll());
        let mut mood_tick = interval_at(start + world.mood_tick(), world.mood_tick());
        let mut decay_tick = interval_at(start + decay_period, decay_period);
        for timer in [&mut world_tick, &mut schedule_tick, &mut poll_tick, &mut mood_tick, &mut decay_tick] {
            timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        }

        let (done_tx, mut done_rx) = mpsc::unbounded_channel::<Completed>();
        info!("session loop started");

        loop {
            let events = tokio::select! {
                event = inbound.recv() => match event {
                    Some(event) => self.handle(event, &done_tx),
                    None => {
                        info!("inbound closed, stopping");
                        break;
                    }
                },
                Some(done) = done_rx.recv() => match done {
                    Completed::Replies(request, lines) => self.session.deliver_player_replies(request, lines),
                    Completed::Conversation(plan, turns) => self.session.deliver_conversation(plan, turns),
                },
                _ = world_tick.tick() => self.session.tick(),
                _ = schedule_tick.tick() => {
                    let mut events = self.session.flush_due();
                    events.extend(self.session.status_change());
                    events
                },
                _ = poll_tick.tick() => {
                    if let Some(plan) = self.session.poll_conversation() {
                        self.generate_conversation(plan, &done_tx);
                    }
                    Vec::new()
                },
                _ = mood_tick.tick() => {
                    self.session.tick_moods();
                    Vec::new()
                },
                _ = decay_tick.tick() => {
                    let forgotten = self.session.tick_decay();
                    debug!(forgotten, "memory decay pass");
                    Vec::new()
                },
            };
            for event in events {
                if outbound.send(event).await.is_err() {
                    info!("outbound closed, stopping");
                    return self.session;
                }
            }
        }
        self.session
    }

    fn handle(&mut self, event: PlayerEvent, done: &mpsc::UnboundedSender<Completed>) -> Vec<WorldEvent> {
        let outcome = match event {
            PlayerEvent::Join {
                player,
                name,
                position,
                viewport,
            } => Ok(self.session.join(player, &name, position, viewport)),
            PlayerEvent::Move {
                player,
                position,
                viewport,
            } => self.session.move_player(&player, position, viewport).map(|()| Vec::new()),
            PlayerEvent::Leave { player } => self.session.leave(&player),
            PlayerEvent::Say { player, text } => self.session.player_message(&player, &text).map(|(events, request)| {
                if let Some(request) = request {
                    self.generate_replies(request, done);
                }
                events
            }),
        };
        outcome.unwrap_or_else(|err| {
            warn!(error = %err, "player event rejected");
            Vec::new()
        })
    }

    fn generate_replies(&self, request: ReplyRequest, done: &mpsc::UnboundedSender<Completed>) {
        let pipeline = self.session.pipeline().clone();
        let pause = self.session.config().world.player_reply_pause();
        let done = done.clone();
        tokio::spawn(async move {
            tokio::time::sleep(pause).await;
            let lines = pipeline
                .player_replies(request.prompt.system.clone(), request.prompt.user.clone(), &request.spoken_to)
                .await;
            if done.send(Completed::Replies(request, lines)).is_err() {
                debug!("session loop gone before replies arrived");
            }
        });
    }

    fn generate_conversation(&self, plan: ConversationPlan, done: &mpsc::UnboundedSender<Completed>) {
        let pipeline = self.session.pipeline().clone();
        let done = done.clone();
        tokio::spawn(async move {
            let turns = pipeline
                .conversation(plan.prompt.system.clone(), plan.prompt.user.clone())
                .await;
            if done.send(Completed::Conversation(plan, turns)).is_err() {
                debug!("session loop gone before the conversation arrived");
            }
        });
    }
}

//! A whole session driven through its channels, on paused tokio time.
//!
//! No provider is configured, so every reply comes from the contextual
//! fallback tables. That keeps the run offline and deterministic enough to
//! assert on while exercising the runner, schedule, proximity and memory
//! paths together.

use std::sync::Arc;
use std::time::Duration;

use sunny_core::{PersonalityCatalog, Position};
use sunny_llm::{ContextualFallback, GenerationPipeline};
use sunny_world::{
    Origin, PlayerEvent, PlayerId, Runner, Session, SimConfig, TokioClock, Viewport, VillageLayout, WorldEvent,
};
use tokio::sync::mpsc;

fn session(seed: u64) -> Session {
    let mut config = SimConfig::default();
    config.general.seed = Some(seed);
    let catalog = Arc::new(PersonalityCatalog::sunnyside().expect("catalog"));
    let roster = catalog.names();
    let pipeline = GenerationPipeline::spawn(
        config.llm.clone(),
        Vec::new(),
        ContextualFallback::sunnyside().expect("phrases"),
        &roster,
    )
    .expect("pipeline");
    let layout = VillageLayout::sunnyside().expect("layout");
    Session::new(config, catalog, layout, pipeline, Arc::new(TokioClock::new())).expect("session")
}

/// Elena stands next to the player; everyone else is well out of earshot.
fn stage(session: &mut Session) {
    let village = session.village_mut();
    village.place("Elena", Position::new(1_500.0, 1_500.0));
    assert!(village.set_activity("Elena", "watering"));
    village.place("Marco", Position::new(1_900.0, 1_850.0));
    village.place("Gruk", Position::new(1_100.0, 1_200.0));
    village.place("Bones", Position::new(2_000.0, 1_900.0));
}

async fn next(rx: &mut mpsc::Receiver<WorldEvent>) -> WorldEvent {
    tokio::time::timeout(Duration::from_secs(60), rx.recv())
        .await
        .expect("event within a minute")
        .expect("runner still alive")
}

#[tokio::test(start_paused = true)]
async fn greeting_a_nearby_agent_gets_a_delayed_contextual_reply() {
    let mut session = session(42);
    stage(&mut session);
    let watering: Vec<String> = ContextualFallback::sunnyside()
        .expect("phrases")
        .phrases("Elena", "watering")
        .expect("Elena waters")
        .to_vec();

    let (in_tx, in_rx) = mpsc::channel(8);
    let (out_tx, mut out_rx) = mpsc::channel(64);
    let runner = tokio::spawn(Runner::new(session).run(in_rx, out_tx));

    let player = PlayerId::from("p1");
    in_tx
        .send(PlayerEvent::Join {
            player: player.clone(),
            name: "Ana".into(),
            position: Some(Position::new(1_500.0, 1_500.0)),
            viewport: Some(Viewport {
                width: 200.0,
                height: 200.0,
            }),
        })
        .await
        .expect("join");
    in_tx
        .send(PlayerEvent::Say {
            player: player.clone(),
            text: "Hola Elena, ¿qué haces?".into(),
        })
        .await
        .expect("say");

    let mut scheduled = Vec::new();
    let mut spoken = Vec::new();
    let level = loop {
        match next(&mut out_rx).await {
            WorldEvent::DialogueScheduled { origin, lines, .. } => {
                assert!(matches!(origin, Origin::Player { ref player, .. } if player.0 == "p1"));
                scheduled.push(lines);
            }
            WorldEvent::AgentSpoke { agent, text, bubble_ms, .. } => {
                assert!(bubble_ms >= 2_500);
                spoken.push((agent, text));
            }
            WorldEvent::FriendshipChanged { agent, level, .. } => {
                assert_eq!(agent, "Elena");
                break level;
            }
            _ => {}
        }
    };

    assert_eq!(scheduled.len(), 1);
    let lines = &scheduled[0];
    assert_eq!(lines.len(), 1, "only Elena can hear: {lines:?}");
    assert_eq!(lines[0].agent, "Elena");
    assert!(lines[0].display_at_delay_ms >= 1_800);
    assert!(watering.contains(&lines[0].text), "{:?} is not a watering line", lines[0].text);
    assert_eq!(spoken, vec![("Elena".to_string(), lines[0].text.clone())]);
    assert!(level >= 2);

    drop(in_tx);
    let session = runner.await.expect("runner");
    let elena = session.memory().store("Elena").expect("Elena's store");
    assert!(elena.iter().any(|m| m.text.starts_with("Le dije a Ana")));
    assert!(elena.iter().any(|m| m.text.contains("¿qué haces?")));
    assert_eq!(session.player(&player).map(|p| p.friendship.level("Elena")), Some(level));
}

#[tokio::test(start_paused = true)]
async fn a_distant_player_is_told_nobody_heard() {
    let mut session = session(7);
    stage(&mut session);

    let (in_tx, in_rx) = mpsc::channel(8);
    let (out_tx, mut out_rx) = mpsc::channel(64);
    let runner = tokio::spawn(Runner::new(session).run(in_rx, out_tx));

    let player = PlayerId::from("far");
    in_tx
        .send(PlayerEvent::Join {
            player: player.clone(),
            name: String::new(),
            position: Some(Position::new(1_100.0, 1_900.0)),
            viewport: Some(Viewport {
                width: 100.0,
                height: 100.0,
            }),
        })
        .await
        .expect("join");
    in_tx
        .send(PlayerEvent::Say {
            player: player.clone(),
            text: "¿Hay alguien?".into(),
        })
        .await
        .expect("say");

    let notice = loop {
        match next(&mut out_rx).await {
            WorldEvent::Notice { to: Some(to), text } if to == player && text.contains("nadie") => break text,
            WorldEvent::DialogueScheduled { .. } => panic!("nobody should answer"),
            _ => {}
        }
    };
    assert!(notice.contains("Acércate"));

    drop(in_tx);
    let session = runner.await.expect("runner");
    assert!(session.schedule().is_empty());
    assert_eq!(session.player(&player).map(|p| p.name.as_str()), Some("Aventurero"));
}

#[tokio::test(start_paused = true)]
async fn events_from_unknown_players_are_ignored() {
    let session = session(1);
    let (in_tx, in_rx) = mpsc::channel(8);
    let (out_tx, mut out_rx) = mpsc::channel(64);
    let runner = tokio::spawn(Runner::new(session).run(in_rx, out_tx));

    in_tx
        .send(PlayerEvent::Say {
            player: PlayerId::from("ghost"),
            text: "boo".into(),
        })
        .await
        .expect("say");
    in_tx
        .send(PlayerEvent::Leave {
            player: PlayerId::from("ghost"),
        })
        .await
        .expect("leave");
    drop(in_tx);

    let session = runner.await.expect("runner");
    while let Ok(event) = out_rx.try_recv() {
        assert!(
            !matches!(event, WorldEvent::PlayerSpoke { .. } | WorldEvent::PlayerLeft { .. }),
            "{event:?}"
        );
    }
    assert!(!session.has_players());
    assert!(session.history().is_empty());
}

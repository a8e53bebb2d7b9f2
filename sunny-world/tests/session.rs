//! Session behaviour with a hand-driven clock.

use std::sync::Arc;
use std::time::Duration;

use proptest::prelude::*;
use sunny_core::{ConversationRequest, ManualClock, PersonalityCatalog, Position, Prompt, Timestamp, Topic, TopicKind};
use sunny_llm::{ContextualFallback, DialogueTurn, GenerationPipeline};
use sunny_world::session::{ConversationPlan, ReplyRequest};
use sunny_world::{Origin, PlayerId, Session, SimConfig, Viewport, VillageLayout, WorldEvent};

fn session(clock: &ManualClock) -> Session {
    let mut config = SimConfig::default();
    config.general.seed = Some(11);
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
    Session::new(config, catalog, layout, pipeline, Arc::new(clock.clone())).expect("session")
}

fn plan(initiator: &str, target: &str) -> ConversationPlan {
    ConversationPlan {
        request: ConversationRequest {
            initiator: initiator.into(),
            target: target.into(),
            topic: Topic {
                kind: TopicKind::Interest,
                text: "las calabazas".into(),
                weight: 1.0,
            },
            participants: vec![initiator.to_string(), target.to_string()],
            created_at: Timestamp::ZERO,
        },
        prompt: Prompt {
            system: String::new(),
            user: String::new(),
        },
    }
}

fn turn(agent: &str, message: &str) -> DialogueTurn {
    DialogueTurn {
        agent: agent.into(),
        message: message.into(),
    }
}

fn join_near_elena(session: &mut Session, id: &PlayerId) {
    session.village_mut().place("Elena", Position::new(1_500.0, 1_500.0));
    session.join(
        id.clone(),
        "Ana",
        Some(Position::new(1_500.0, 1_500.0)),
        Some(Viewport {
            width: 300.0,
            height: 300.0,
        }),
    );
}

#[tokio::test]
async fn village_conversation_is_revealed_line_by_line() {
    let clock = ManualClock::new(Timestamp::ZERO);
    let mut session = session(&clock);
    let events = session.deliver_conversation(
        plan("Elena", "Marco"),
        Some(vec![
            turn("Elena", "¿Has visto las calabazas?"),
            turn("Marco", "¡Enormes este año!"),
            turn("Nadie", "ignored"),
            turn("Elena", ""),
        ]),
    );

    let [WorldEvent::DialogueScheduled { origin, lines, .. }] = events.as_slice() else {
        panic!("expected one schedule event, got {events:?}");
    };
    assert!(matches!(origin, Origin::Social { participants } if participants.len() == 2));
    assert_eq!(lines.len(), 2);
    assert!(lines[0].display_at_delay_ms < lines[1].display_at_delay_ms);
    assert!(session.engine().is_locked());
    assert_eq!(session.bonds().score("Elena", "Marco"), Some(62.0));
    assert_eq!(session.bonds().score("Marco", "Elena"), Some(57.0));

    clock.advance(Duration::from_millis(lines[0].display_at_delay_ms));
    let first: Vec<_> = session
        .flush_due()
        .into_iter()
        .filter_map(|e| match e {
            WorldEvent::AgentSpoke { agent, .. } => Some(agent),
            _ => None,
        })
        .collect();
    assert_eq!(first, vec!["Elena".to_string()]);

    clock.set(Timestamp::from_millis(lines[1].display_at_delay_ms));
    assert_eq!(session.flush_due().len(), 1);
    assert!(session.schedule().is_empty());
    assert_eq!(session.history().len(), 2);

    // lock runs two seconds past the last line
    clock.advance(Duration::from_millis(1_999));
    assert!(session.engine().is_locked());
    clock.advance(Duration::from_millis(1));
    assert!(!session.engine().is_locked());
}

#[tokio::test]
async fn empty_generations_schedule_nothing() {
    let clock = ManualClock::new(Timestamp::ZERO);
    let mut session = session(&clock);
    assert!(session.deliver_conversation(plan("Gruk", "Bones"), None).is_empty());
    assert!(session.deliver_conversation(plan("Gruk", "Bones"), Some(Vec::new())).is_empty());
    assert!(!session.engine().is_locked());
    assert_eq!(session.bonds().score("Gruk", "Bones"), Some(30.0));
}

#[tokio::test]
async fn conversations_wait_for_an_audience_and_a_provider() {
    let clock = ManualClock::new(Timestamp::ZERO);
    let mut session = session(&clock);
    assert!(session.poll_conversation().is_none());
    join_near_elena(&mut session, &PlayerId::from("p1"));
    // still nothing: the pipeline has no provider to write the exchange
    assert!(session.poll_conversation().is_none());
}

#[tokio::test]
async fn leaving_drops_replies_still_owed() {
    let clock = ManualClock::new(Timestamp::ZERO);
    let mut session = session(&clock);
    let id = PlayerId::from("p1");
    join_near_elena(&mut session, &id);

    let (_, request) = session.player_message(&id, "  Hola Elena  ").expect("message");
    let request: ReplyRequest = request.expect("someone heard");
    assert_eq!(request.message, "Hola Elena");
    assert!(request.nearby.contains(&"Elena".to_string()));

    let events = session.deliver_player_replies(request, Some(vec![("Elena".into(), "¡Hola, cariño!".into())]));
    assert!(events.iter().any(|e| matches!(e, WorldEvent::DialogueScheduled { .. })));
    assert!(events.iter().any(|e| matches!(e, WorldEvent::AiStatus { to: Some(_), .. })));
    assert_eq!(session.schedule().len(), 1);

    let left = session.leave(&id).expect("leave");
    assert!(matches!(left.as_slice(), [WorldEvent::PlayerLeft { name, .. }] if name == "Ana"));
    assert!(session.schedule().is_empty());
    assert!(session.leave(&id).is_err());
}

#[tokio::test]
async fn replies_to_a_departed_player_are_dropped() {
    let clock = ManualClock::new(Timestamp::ZERO);
    let mut session = session(&clock);
    let id = PlayerId::from("p1");
    join_near_elena(&mut session, &id);
    let (_, request) = session.player_message(&id, "Hola").expect("message");
    session.leave(&id).expect("leave");
    let events = session.deliver_player_replies(request.expect("request"), None);
    assert!(events.is_empty());
    assert!(session.schedule().is_empty());
}

#[tokio::test]
async fn a_reply_builds_friendship_and_memory() {
    let clock = ManualClock::new(Timestamp::ZERO);
    let mut session = session(&clock);
    let id = PlayerId::from("p1");
    join_near_elena(&mut session, &id);

    let (_, request) = session.player_message(&id, "Hola Elena").expect("message");
    session.deliver_player_replies(
        request.expect("request"),
        Some(vec![("Elena".into(), "¿Te gusta la sopa de calabaza?".into())]),
    );
    clock.advance(Duration::from_secs(30));
    let events = session.flush_due();

    assert!(events.iter().any(|e| matches!(
        e,
        WorldEvent::FriendshipChanged { agent, level: 3, .. } if agent == "Elena"
    )));
    assert!(events.iter().any(|e| matches!(e, WorldEvent::Discovered { agent, .. } if agent == "Elena")));
    let elena = session.memory().store("Elena").expect("store");
    assert!(elena.iter().any(|m| m.text.starts_with("Le dije a Ana")));

    // the same discovery is only reported once
    let (_, request) = session.player_message(&id, "¿De verdad?").expect("message");
    session.deliver_player_replies(
        request.expect("request"),
        Some(vec![("Elena".into(), "La calabaza es lo mejor.".into())]),
    );
    clock.advance(Duration::from_secs(30));
    let again = session.flush_due();
    assert!(!again.iter().any(|e| matches!(e, WorldEvent::Discovered { .. })));
}

#[tokio::test]
async fn status_is_reported_only_when_it_changes() {
    let clock = ManualClock::new(Timestamp::ZERO);
    let mut session = session(&clock);
    assert!(session.status_change().is_some());
    assert!(session.status_change().is_none());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn blank_messages_never_reach_the_pipeline(blank in "[ \t\n]{0,8}") {
        let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().expect("runtime");
        runtime.block_on(async {
            let clock = ManualClock::new(Timestamp::ZERO);
            let mut session = session(&clock);
            let id = PlayerId::from("p1");
            join_near_elena(&mut session, &id);
            let (events, request) = session.player_message(&id, &blank).expect("message");
            prop_assert!(events.is_empty());
            prop_assert!(request.is_none());
            prop_assert!(session.history().is_empty());
            Ok(())
        })?;
    }
}

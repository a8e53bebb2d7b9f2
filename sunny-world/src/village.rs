//! Agent bodies: where each agent stands and what it is doing.
//!
//! Every world tick counts down the current activity. When it runs out the
//! agent picks a different one and walks to its zone, or wanders a little
//! when the activity has none. A seek intent overrides this for a while and
//! sends the agent toward the partner it wants to talk to.

use std::collections::BTreeMap;
use std::time::Duration;

use rand::Rng;
use serde::Serialize;
use sunny_core::{ActivityMap, Position, PositionProvider};
use tracing::debug;

use crate::config::WorldConfig;
use crate::layout::{AgentLayout, VillageLayout, Zone};

/// One agent's physical state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentBody {
    /// Where the agent stands.
    pub position: Position,
    /// Where it is walking to, if anywhere.
    pub target: Option<Position>,
    /// Index into the agent's layout activities.
    activity: Option<usize>,
    /// Time left on the current activity, ms. Zero or less means pick anew.
    remaining_ms: i64,
}

impl AgentBody {
    fn at(position: Position) -> Self {
        Self {
            position,
            target: None,
            activity: None,
            remaining_ms: 0,
        }
    }
}

/// Debug view of one agent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BodySnapshot {
    /// Agent name.
    pub agent: String,
    /// Where it stands.
    pub position: Position,
    /// Current activity label.
    pub activity: Option<String>,
    /// Whether it is on its way somewhere.
    pub walking: bool,
}

/// All agent bodies on the village map.
#[derive(Debug, Clone)]
pub struct Village {
    layout: VillageLayout,
    bodies: BTreeMap<String, AgentBody>,
    config: WorldConfig,
}

impl Village {
    /// Every agent at its spawn point, with no activity yet.
    #[must_use]
    pub fn new(layout: VillageLayout, config: WorldConfig) -> Self {
        let bodies = layout
            .agents
            .iter()
            .map(|(name, agent)| (name.clone(), AgentBody::at(layout.bounds.clamp(agent.spawn))))
            .collect();
        Self { layout, bodies, config }
    }

    /// The map.
    #[must_use]
    pub fn layout(&self) -> &VillageLayout {
        &self.layout
    }

    /// One agent's body.
    #[must_use]
    pub fn body(&self, agent: &str) -> Option<&AgentBody> {
        self.bodies.get(agent)
    }

    /// Where `agent` stands.
    #[must_use]
    pub fn position(&self, agent: &str) -> Option<Position> {
        self.bodies.get(agent).map(|b| b.position)
    }

    /// Put `agent` somewhere and stop it walking.
    pub fn place(&mut self, agent: &str, position: Position) {
        let bounds = self.layout.bounds;
        if let Some(body) = self.bodies.get_mut(agent) {
            body.position = bounds.clamp(position);
            body.target = None;
        }
    }

    /// Force `agent` into the activity called `name`, for its full duration.
    /// Returns `false` if the agent has no such activity.
    pub fn set_activity(&mut self, agent: &str, name: &str) -> bool {
        let Some(layout) = self.layout.agents.get(agent) else {
            return false;
        };
        let Some(index) = layout.activities.iter().position(|s| s.name == name) else {
            return false;
        };
        let duration = layout.activities[index].duration_ms;
        if let Some(body) = self.bodies.get_mut(agent) {
            body.activity = Some(index);
            body.remaining_ms = i64::try_from(duration).unwrap_or(i64::MAX);
        }
        true
    }

    /// Current activity label of `agent`.
    #[must_use]
    pub fn activity(&self, agent: &str) -> Option<&str> {
        let index = self.bodies.get(agent)?.activity?;
        self.layout
            .agents
            .get(agent)?
            .activities
            .get(index)
            .map(|s| s.name.as_str())
    }

    /// Current activity of every agent that has one.
    #[must_use]
    pub fn activities(&self) -> ActivityMap {
        self.bodies
            .keys()
            .filter_map(|name| self.activity(name).map(|a| (name.clone(), a.to_string())))
            .collect()
    }

    // -----------------------------------------------------------------------
    // Tick
    // -----------------------------------------------------------------------

    /// Advance activities and walking by `dt`.
    pub fn tick<R: Rng + ?Sized>(&mut self, dt: Duration, rng: &mut R) {
        let dt_ms = i64::try_from(dt.as_millis()).unwrap_or(i64::MAX);
        let bounds = self.layout.bounds;
        for (name, body) in &mut self.bodies {
            let Some(layout) = self.layout.agents.get(name) else {
                continue;
            };
            body.remaining_ms = body.remaining_ms.saturating_sub(dt_ms);
            if body.remaining_ms <= 0 && !layout.activities.is_empty() {
                start_next_activity(name, body, layout, &self.config, rng);
                body.target = body.target.map(|t| bounds.clamp(t));
            }
            walk(body, self.config.walk_step, self.config.arrival_radius);
        }
    }

    /// Send `seeker` toward `partner`. Returns where it is headed.
    pub fn seek<R: Rng + ?Sized>(&mut self, seeker: &str, partner: &str, rng: &mut R) -> Option<Position> {
        let around = self.position(partner)?;
        let jitter = self.config.seek_jitter;
        let target = self.layout.bounds.clamp(Position::new(
            around.x + rng.gen_range(-jitter..=jitter),
            around.y + rng.gen_range(-jitter..=jitter),
        ));
        let body = self.bodies.get_mut(seeker)?;
        body.target = Some(target);
        body.remaining_ms = i64::try_from(self.config.seek_hold_ms).unwrap_or(i64::MAX);
        debug!(seeker, partner, %target, "walking toward partner");
        Some(target)
    }

    /// Debug view of every body.
    #[must_use]
    pub fn snapshot(&self) -> Vec<BodySnapshot> {
        self.bodies
            .iter()
            .map(|(name, body)| BodySnapshot {
                agent: name.clone(),
                position: body.position,
                activity: self.activity(name).map(str::to_string),
                walking: body.target.is_some(),
            })
            .collect()
    }
}

impl PositionProvider for Village {
    fn positions(&self) -> BTreeMap<String, Position> {
        self.bodies.iter().map(|(n, b)| (n.clone(), b.position)).collect()
    }
}

fn start_next_activity<R: Rng + ?Sized>(
    name: &str,
    body: &mut AgentBody,
    layout: &AgentLayout,
    config: &WorldConfig,
    rng: &mut R,
) {
    let count = layout.activities.len();
    let mut index = rng.gen_range(0..count);
    if count > 1 {
        while Some(index) == body.activity {
            index = rng.gen_range(0..count);
        }
    }
    let spot = &layout.activities[index];
    let jitter = if config.activity_jitter_ms == 0 {
        0
    } else {
        rng.gen_range(0..config.activity_jitter_ms)
    };
    body.activity = Some(index);
    body.remaining_ms = i64::try_from(spot.duration_ms.saturating_add(jitter)).unwrap_or(i64::MAX);
    body.target = Some(match spot.zone {
        Some(zone) => point_in(zone, rng),
        None => {
            let r = config.wander_radius;
            Position::new(
                body.position.x + rng.gen_range(-r..=r),
                body.position.y + rng.gen_range(-r..=r),
            )
        }
    });
    debug!(agent = name, activity = %spot.name, "new activity");
}

fn point_in<R: Rng + ?Sized>(zone: Zone, rng: &mut R) -> Position {
    Position::new(zone.x + rng.gen_range(0.0..=zone.w), zone.y + rng.gen_range(0.0..=zone.h))
}

/// One step toward the target; arriving clears it.
fn walk(body: &mut AgentBody, step: f32, arrival: f32) {
    let Some(target) = body.target else {
        return;
    };
    let dist = body.position.distance_to(&target);
    if dist <= arrival {
        body.target = None;
        return;
    }
    let step = step.min(dist);
    body.position.x += (target.x - body.position.x) / dist * step;
    body.position.y += (target.y - body.position.y) / dist * step;
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn village() -> Village {
        Village::new(VillageLayout::sunnyside().expect("layout"), WorldConfig::default())
    }

    #[test]
    fn agents_start_at_spawn_without_activity() {
        let v = village();
        assert_eq!(v.position("Marco"), Some(Position::new(1600.0, 1500.0)));
        assert!(v.activities().is_empty());
    }

    #[test]
    fn first_tick_assigns_activities_inside_bounds() {
        let mut v = village();
        let mut rng = StdRng::seed_from_u64(3);
        v.tick(Duration::from_millis(500), &mut rng);
        assert_eq!(v.activities().len(), 4);
        let bounds = v.layout().bounds;
        for body in v.snapshot() {
            assert!(body.position.x >= bounds.min_x && body.position.x <= bounds.max_x);
            let target = v.body(&body.agent).and_then(|b| b.target);
            if let Some(t) = target {
                assert_eq!(bounds.clamp(t), t);
            }
        }
    }

    #[test]
    fn activity_changes_when_it_runs_out() {
        let mut v = village();
        let mut rng = StdRng::seed_from_u64(11);
        assert!(v.set_activity("Elena", "watering"));
        v.tick(Duration::from_millis(5_000), &mut rng);
        assert_eq!(v.activity("Elena"), Some("watering"));
        v.tick(Duration::from_millis(1_000), &mut rng);
        assert_ne!(v.activity("Elena"), Some("watering"));
        assert!(!v.set_activity("Elena", "mining"));
    }

    #[test]
    fn walking_moves_one_step_and_arrives() {
        let mut body = AgentBody::at(Position::new(0.0, 0.0));
        body.target = Some(Position::new(30.0, 0.0));
        walk(&mut body, 12.0, 15.0);
        assert_eq!(body.position, Position::new(12.0, 0.0));
        walk(&mut body, 12.0, 15.0);
        assert_eq!(body.position, Position::new(24.0, 0.0));
        walk(&mut body, 12.0, 15.0);
        assert_eq!(body.target, None);
        assert_eq!(body.position, Position::new(24.0, 0.0));
    }

    #[test]
    fn seek_heads_for_the_partner() {
        let mut v = village();
        let mut rng = StdRng::seed_from_u64(5);
        let target = v.seek("Gruk", "Bones", &mut rng).expect("both exist");
        let bones = v.position("Bones").expect("Bones");
        assert!((target.x - bones.x).abs() <= 30.0 && (target.y - bones.y).abs() <= 30.0);
        let start = v.position("Gruk").expect("Gruk");
        v.tick(Duration::from_millis(500), &mut rng);
        let after = v.position("Gruk").expect("Gruk");
        assert!(after.distance_to(&bones) < start.distance_to(&bones));
        assert!(v.seek("Gruk", "Nobody", &mut rng).is_none());
    }
}

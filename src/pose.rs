// Agent identity, pose, and the per-agent pose store fed by telemetry

use std::collections::HashMap;
use std::f32::consts::{PI, TAU};
use std::fmt;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// Identifier of one cube, unique and immutable for the run
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(String);

impl AgentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AgentId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Wrap an angle in radians into [0, 2π)
pub fn wrap_angle(theta: f32) -> f32 {
    let wrapped = theta.rem_euclid(TAU);
    // rem_euclid can round up to TAU for tiny negative inputs
    if wrapped >= TAU { 0.0 } else { wrapped }
}

/// Signed angle difference in (-π, π]
pub fn normalize_angle(delta: f32) -> f32 {
    let wrapped = (delta + PI).rem_euclid(TAU) - PI;
    if wrapped <= -PI { wrapped + TAU } else { wrapped }
}

/// Last known position and heading of an agent
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    pub x: f32,
    pub y: f32,
    theta: f32,
    timestamp: Instant,
}

impl Pose {
    /// Pose stamped now, heading in radians
    pub fn new(x: f32, y: f32, theta: f32) -> Self {
        Self {
            x,
            y,
            theta: wrap_angle(theta),
            timestamp: Instant::now(),
        }
    }

    /// Pose stamped now, heading in degrees (as reported by the cube)
    pub fn from_degrees(x: f32, y: f32, theta_deg: f32) -> Self {
        Self::new(x, y, theta_deg.to_radians())
    }

    /// Heading in radians, always within [0, 2π)
    pub fn theta(&self) -> f32 {
        self.theta
    }

    pub fn timestamp(&self) -> Instant {
        self.timestamp
    }

    pub fn distance_to(&self, x: f32, y: f32) -> f32 {
        (self.x - x).hypot(self.y - y)
    }
}

/// Latest pose per agent.
///
/// Each agent gets one slot at setup. The slot holds `None` until the first
/// telemetry report arrives, so "never updated" stays distinguishable from
/// a pose at the origin. The telemetry ingest path for an agent is the only
/// writer of its slot. Readers take snapshots without locking.
#[derive(Debug)]
pub struct PoseStore {
    slots: HashMap<AgentId, watch::Sender<Option<Pose>>>,
}

impl PoseStore {
    pub fn new(agents: impl IntoIterator<Item = AgentId>) -> Self {
        let slots = agents
            .into_iter()
            .map(|id| (id, watch::Sender::new(None)))
            .collect();
        Self { slots }
    }

    pub fn contains(&self, agent: &AgentId) -> bool {
        self.slots.contains_key(agent)
    }

    /// Record a new pose. Returns false if the agent is not registered.
    pub fn update(&self, agent: &AgentId, pose: Pose) -> bool {
        match self.slots.get(agent) {
            Some(slot) => {
                slot.send_replace(Some(pose));
                true
            }
            None => false,
        }
    }

    /// Latest pose, or `None` if the agent has never reported one
    pub fn latest(&self, agent: &AgentId) -> Option<Pose> {
        self.slots.get(agent).and_then(|slot| *slot.borrow())
    }

    pub fn is_updated(&self, agent: &AgentId) -> bool {
        self.latest(agent).is_some()
    }

    /// Consistent-per-agent snapshot of every agent with a known pose
    pub fn snapshot(&self) -> HashMap<AgentId, Pose> {
        self.slots
            .iter()
            .filter_map(|(id, slot)| {
                let latest = *slot.borrow();
                latest.map(|pose| (id.clone(), pose))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_angle() {
        assert!((normalize_angle(PI) - PI).abs() < 1e-6);
        assert!((normalize_angle(-PI) - PI).abs() < 1e-6);
        assert!((normalize_angle(1.5 * PI) + 0.5 * PI).abs() < 1e-5);
        assert!((normalize_angle(-1.5 * PI) - 0.5 * PI).abs() < 1e-5);
        assert_eq!(normalize_angle(0.0), 0.0);
    }

    #[test]
    fn test_wrap_angle() {
        assert_eq!(wrap_angle(0.0), 0.0);
        assert!((wrap_angle(-PI / 2.0) - 1.5 * PI).abs() < 1e-5);
        assert!((wrap_angle(5.0 * PI) - PI).abs() < 1e-4);
        assert!(wrap_angle(-1e-9) < TAU);
        assert!(wrap_angle(TAU) < TAU);
    }

    #[test]
    fn test_pose_from_degrees_is_wrapped() {
        let pose = Pose::from_degrees(10.0, 20.0, 450.0);
        assert!((pose.theta() - PI / 2.0).abs() < 1e-5);

        let pose = Pose::from_degrees(0.0, 0.0, -90.0);
        assert!((pose.theta() - 1.5 * PI).abs() < 1e-5);
    }

    #[test]
    fn test_store_unknown_until_updated() {
        let a = AgentId::from("cube1");
        let store = PoseStore::new([a.clone()]);

        assert!(store.contains(&a));
        assert!(!store.is_updated(&a));
        assert_eq!(store.latest(&a), None);
        assert!(store.snapshot().is_empty());

        assert!(store.update(&a, Pose::new(120.0, 80.0, 0.0)));
        let pose = store.latest(&a).unwrap();
        assert_eq!((pose.x, pose.y), (120.0, 80.0));
        assert_eq!(store.snapshot().len(), 1);
    }

    #[test]
    fn test_store_rejects_unregistered_agent() {
        let store = PoseStore::new([AgentId::from("cube1")]);
        let stranger = AgentId::from("cube9");
        assert!(!store.update(&stranger, Pose::new(0.0, 0.0, 0.0)));
        assert_eq!(store.latest(&stranger), None);
    }
}

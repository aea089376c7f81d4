// Inter-agent repulsion field, recomputed from a fresh pose snapshot every tick

use std::collections::HashMap;

use crate::pose::{AgentId, Pose};

/// Peak push between two agents, reached as their distance approaches zero
pub const REPULSION_GAIN: f32 = 10.0;

/// Agents closer than this are treated as coincident and ignored
const COINCIDENT_EPSILON: f32 = 1e-6;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn magnitude(&self) -> f32 {
        self.x.hypot(self.y)
    }
}

impl std::ops::Add for Vec2 {
    type Output = Vec2;

    fn add(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl std::ops::AddAssign for Vec2 {
    fn add_assign(&mut self, rhs: Vec2) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

/// Push that `other` exerts on `agent`.
///
/// Zero outside `safety_radius` and for coincident poses; otherwise
/// `10 * (r - d) / r` along the unit vector from `other` to `agent`.
pub fn repulsion_between(agent: &Pose, other: &Pose, safety_radius: f32) -> Vec2 {
    let dx = agent.x - other.x;
    let dy = agent.y - other.y;
    let d = dx.hypot(dy);

    if d < COINCIDENT_EPSILON || d >= safety_radius {
        return Vec2::ZERO;
    }

    let strength = REPULSION_GAIN * (safety_radius - d) / safety_radius;
    Vec2::new(dx / d * strength, dy / d * strength)
}

/// Avoidance vector for every agent in the snapshot
pub fn compute_repulsions(
    poses: &HashMap<AgentId, Pose>,
    safety_radius: f32,
) -> HashMap<AgentId, Vec2> {
    poses
        .iter()
        .map(|(id, pose)| {
            let total = poses
                .iter()
                .filter(|(other_id, _)| *other_id != id)
                .fold(Vec2::ZERO, |acc, (_, other)| {
                    acc + repulsion_between(pose, other, safety_radius)
                });
            (id.clone(), total)
        })
        .collect()
}

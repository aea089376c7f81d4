// Behavior controllers
//
// Each controller turns a pose and tick length into a MotionIntent.
// Roaming and Tired are stateless; Stressed keeps a segment timer and Lazy
// keeps its chosen corner for as long as the instance lives.

use std::f32::consts::{FRAC_PI_2, PI};
use std::sync::Arc;

use rand::rngs::SmallRng;
use rand::seq::SliceRandom;

use super::repulsion::Vec2;
use super::{MotionIntent, Params};
use crate::pose::{Pose, normalize_angle};

/// How strongly the corrective vector bends the roaming heading
const STEER_GAIN: f32 = 0.005;

/// Stressed cubes near a wall always turn away from it
const EDGE_TURNS: [f32; 3] = [FRAC_PI_2, -FRAC_PI_2, PI];
const OPEN_TURNS: [f32; 3] = [0.0, FRAC_PI_2, -FRAC_PI_2];

/// Stressed treats this multiple of boundary_margin as "near the edge"
const STRESSED_EDGE_FACTOR: f32 = 1.5;

/// Lazy stops once within this distance of its corner
pub const LAZY_ARRIVAL: f32 = 10.0;

/// True if the pose is within `margin` of any arena edge
pub fn near_edge(pose: &Pose, margin: f32, arena: [f32; 2]) -> bool {
    let [w, h] = arena;
    pose.x < margin || pose.x > w - margin || pose.y < margin || pose.y > h - margin
}

/// Push back toward the interior, growing linearly once inside the margin
fn boundary_force(pose: &Pose, margin: f32, arena: [f32; 2]) -> Vec2 {
    let [w, h] = arena;
    let mut force = Vec2::ZERO;

    if pose.x < margin {
        force.x += margin - pose.x;
    }
    if pose.x > w - margin {
        force.x -= pose.x - (w - margin);
    }
    if pose.y < margin {
        force.y += margin - pose.y;
    }
    if pose.y > h - margin {
        force.y -= pose.y - (h - margin);
    }
    force
}

/// Drifts forward, bending away from walls and neighbours at a bounded turn rate
#[derive(Debug, Clone)]
pub struct RoamingController {
    params: Arc<Params>,
}

impl RoamingController {
    pub fn new(params: Arc<Params>) -> Self {
        Self { params }
    }

    pub fn step(&self, pose: &Pose, dt: f32, repel: Vec2) -> MotionIntent {
        let p = &self.params;
        let theta = pose.theta();

        let correction = boundary_force(pose, p.boundary_margin, p.arena) + repel;
        let desired = (theta.sin() + STEER_GAIN * correction.y)
            .atan2(theta.cos() + STEER_GAIN * correction.x);

        let limit = (p.max_turn_rate * dt).max(0.0);
        let delta = normalize_angle(desired - theta).clamp(-limit, limit);

        MotionIntent::drive(p.v_roam, delta)
    }
}

/// Spins in place at a constant rate
#[derive(Debug, Clone)]
pub struct TiredController {
    params: Arc<Params>,
}

impl TiredController {
    pub fn new(params: Arc<Params>) -> Self {
        Self { params }
    }

    pub fn step(&self, _pose: &Pose, _dt: f32) -> MotionIntent {
        MotionIntent::spin(self.params.v_tired_rot_deg.to_radians())
    }
}

/// Darts forward fast, changing heading only at fixed segment boundaries
#[derive(Debug, Clone)]
pub struct StressedController {
    params: Arc<Params>,
    segment_elapsed: f32,
    segment_duration: f32,
    rng: SmallRng,
}

impl StressedController {
    pub fn new(params: Arc<Params>, rng: SmallRng) -> Self {
        let segment_duration = params.stressed_segment_s;
        Self {
            params,
            segment_elapsed: 0.0,
            segment_duration,
            rng,
        }
    }

    /// The repulsion vector is accepted but only edges shape the turn choice
    pub fn step(&mut self, pose: &Pose, dt: f32, _repel: Vec2) -> MotionIntent {
        self.segment_elapsed += dt;

        let mut heading_error = 0.0;
        if self.segment_elapsed >= self.segment_duration {
            self.segment_elapsed = 0.0;
            heading_error = self.next_turn(pose);
        }

        MotionIntent::drive(self.params.v_stressed, heading_error)
    }

    fn next_turn(&mut self, pose: &Pose) -> f32 {
        let margin = self.params.boundary_margin * STRESSED_EDGE_FACTOR;
        let choices = if near_edge(pose, margin, self.params.arena) {
            &EDGE_TURNS
        } else {
            &OPEN_TURNS
        };
        choices.choose(&mut self.rng).copied().unwrap_or(0.0)
    }

    pub fn segment_elapsed(&self) -> f32 {
        self.segment_elapsed
    }
}

/// Heads for the nearest arena corner and parks there
#[derive(Debug, Clone)]
pub struct LazyController {
    params: Arc<Params>,
    target: Option<(f32, f32)>,
    arrived: bool,
}

impl LazyController {
    pub fn new(params: Arc<Params>) -> Self {
        Self {
            params,
            target: None,
            arrived: false,
        }
    }

    pub fn step(&mut self, pose: &Pose, _dt: f32) -> MotionIntent {
        if self.arrived {
            return MotionIntent::STOP;
        }

        let arena = self.params.arena;
        let (tx, ty) = *self
            .target
            .get_or_insert_with(|| nearest_corner(pose, arena));

        let dx = tx - pose.x;
        let dy = ty - pose.y;
        if dx.hypot(dy) < LAZY_ARRIVAL {
            self.arrived = true;
            return MotionIntent::STOP;
        }

        let bearing = dy.atan2(dx);
        MotionIntent::drive(self.params.v_lazy, normalize_angle(bearing - pose.theta()))
    }

    /// Corner chosen on the first step, if any
    pub fn target(&self) -> Option<(f32, f32)> {
        self.target
    }

    pub fn has_arrived(&self) -> bool {
        self.arrived
    }
}

/// Nearest of (0,0), (W,0), (0,H), (W,H); ties go to the earlier corner
fn nearest_corner(pose: &Pose, arena: [f32; 2]) -> (f32, f32) {
    let [w, h] = arena;
    let corners = [(0.0, 0.0), (w, 0.0), (0.0, h), (w, h)];

    let mut best = corners[0];
    let mut best_d2 = f32::INFINITY;
    for (cx, cy) in corners {
        let d2 = (pose.x - cx).powi(2) + (pose.y - cy).powi(2);
        if d2 < best_d2 {
            best = (cx, cy);
            best_d2 = d2;
        }
    }
    best
}

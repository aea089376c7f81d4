// Per-agent behavior state machine
//
// Holds the active behavior and one lazily-built controller per behavior.
// Transitions only happen through set_state; controller sub-state survives
// leaving and re-entering a behavior.

use std::sync::Arc;

use rand::SeedableRng;
use rand::rngs::SmallRng;
use tracing::{debug, info};

use super::controllers::{LazyController, RoamingController, StressedController, TiredController};
use super::repulsion::Vec2;
use super::{Behavior, MotionIntent, Params};
use crate::motor::kinematics::{WheelSpeeds, mix_intent};
use crate::pose::{AgentId, Pose};

/// 64-bit fractional golden-ratio constant for seed mixing
const MIXING_CONSTANT: u64 = 0x9e37_79b9_7f4a_7c15;

/// Derive a per-agent seed so agents never share random streams
fn agent_seed(run_seed: u64, agent: &AgentId) -> u64 {
    // FNV-1a over the id bytes
    let hash = agent
        .as_str()
        .bytes()
        .fold(0xcbf2_9ce4_8422_2325_u64, |h, b| {
            (h ^ b as u64).wrapping_mul(0x0000_0100_0000_01b3)
        });
    run_seed ^ hash.wrapping_mul(MIXING_CONSTANT)
}

pub struct BehaviorMachine {
    agent: AgentId,
    behavior: Behavior,
    params: Arc<Params>,
    seed: u64,
    roaming: Option<RoamingController>,
    tired: Option<TiredController>,
    stressed: Option<StressedController>,
    lazy: Option<LazyController>,
}

impl BehaviorMachine {
    pub fn new(agent: AgentId, behavior: Behavior, params: Arc<Params>, run_seed: u64) -> Self {
        let seed = agent_seed(run_seed, &agent);
        Self {
            agent,
            behavior,
            params,
            seed,
            roaming: None,
            tired: None,
            stressed: None,
            lazy: None,
        }
    }

    pub fn behavior(&self) -> Behavior {
        self.behavior
    }

    /// Switch behavior. Safe between any two ticks.
    pub fn set_state(&mut self, behavior: Behavior) {
        if behavior != self.behavior {
            info!("{}: {} -> {}", self.agent, self.behavior, behavior);
            self.behavior = behavior;
        }
    }

    /// Run the active controller and mix its output into wheel speeds
    pub fn step(&mut self, pose: &Pose, dt: f32, repel: Vec2) -> WheelSpeeds {
        let intent = self.intent(pose, dt, repel);
        let wheels = mix_intent(intent, dt, self.params.wheelbase);
        debug!(
            "{} [{}] intent={:?} -> left={:.1}, right={:.1}",
            self.agent, self.behavior, intent, wheels.left, wheels.right
        );
        wheels
    }

    /// Controller output before mixing. Repulsion only reaches behaviors that use it.
    pub fn intent(&mut self, pose: &Pose, dt: f32, repel: Vec2) -> MotionIntent {
        let repel = if self.behavior.uses_repulsion() {
            repel
        } else {
            Vec2::ZERO
        };

        match self.behavior {
            Behavior::Roaming => self
                .roaming
                .get_or_insert_with(|| RoamingController::new(Arc::clone(&self.params)))
                .step(pose, dt, repel),
            Behavior::Tired => self
                .tired
                .get_or_insert_with(|| TiredController::new(Arc::clone(&self.params)))
                .step(pose, dt),
            Behavior::Stressed => self
                .stressed
                .get_or_insert_with(|| {
                    StressedController::new(
                        Arc::clone(&self.params),
                        SmallRng::seed_from_u64(self.seed),
                    )
                })
                .step(pose, dt, repel),
            Behavior::Lazy => self
                .lazy
                .get_or_insert_with(|| LazyController::new(Arc::clone(&self.params)))
                .step(pose, dt),
        }
    }

    /// Lazy's sub-state, if the behavior has been entered
    pub fn lazy(&self) -> Option<&LazyController> {
        self.lazy.as_ref()
    }

    pub fn stressed(&self) -> Option<&StressedController> {
        self.stressed.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn machine(behavior: Behavior) -> BehaviorMachine {
        BehaviorMachine::new(
            AgentId::from("cube1"),
            behavior,
            Arc::new(Params::default()),
            0,
        )
    }

    #[test]
    fn test_sub_state_is_lazy() {
        let mut m = machine(Behavior::Roaming);
        assert!(m.lazy().is_none());
        m.set_state(Behavior::Lazy);
        // switching alone builds nothing
        assert!(m.lazy().is_none());
        m.step(&Pose::new(40.0, 260.0, 0.0), 0.1, Vec2::ZERO);
        assert_eq!(m.lazy().and_then(|l| l.target()), Some((0.0, 300.0)));
    }

    #[test]
    fn test_sub_state_survives_reentry() {
        let mut m = machine(Behavior::Lazy);
        m.step(&Pose::new(40.0, 40.0, 0.0), 0.1, Vec2::ZERO);

        m.set_state(Behavior::Tired);
        m.step(&Pose::new(280.0, 280.0, 0.0), 0.1, Vec2::ZERO);

        m.set_state(Behavior::Lazy);
        m.step(&Pose::new(280.0, 280.0, 0.0), 0.1, Vec2::ZERO);
        // still the corner picked on first entry
        assert_eq!(m.lazy().and_then(|l| l.target()), Some((0.0, 0.0)));
    }

    #[test]
    fn test_stressed_timer_survives_reentry() {
        let mut m = machine(Behavior::Stressed);
        let pose = Pose::new(150.0, 150.0, 0.0);
        m.step(&pose, 0.5, Vec2::ZERO);
        m.set_state(Behavior::Roaming);
        m.step(&pose, 0.5, Vec2::ZERO);
        m.set_state(Behavior::Stressed);
        m.step(&pose, 0.25, Vec2::ZERO);
        let elapsed = m.stressed().map(|s| s.segment_elapsed()).unwrap_or_default();
        assert!((elapsed - 0.75).abs() < 1e-6);
    }

    #[test]
    fn test_tired_ignores_repulsion() {
        let mut m = machine(Behavior::Tired);
        let pose = Pose::new(150.0, 150.0, 0.0);
        let with = m.intent(&pose, 0.1, Vec2::new(50.0, -50.0));
        let without = m.intent(&pose, 0.1, Vec2::ZERO);
        assert_eq!(with, without);
    }

    #[test]
    fn test_roaming_receives_repulsion() {
        let mut m = machine(Behavior::Roaming);
        let pose = Pose::new(150.0, 150.0, 0.0);
        let pushed = m.intent(&pose, 0.1, Vec2::new(0.0, 7.5));
        assert!(pushed.heading_error > 0.0);
    }

    #[test]
    fn test_tired_step_mixes_to_counter_rotation() {
        let mut m = machine(Behavior::Tired);
        let wheels = m.step(&Pose::new(150.0, 150.0, 0.0), 0.1, Vec2::ZERO);
        assert_eq!(wheels.left, -wheels.right);
        assert!(wheels.right > 0.0);
    }

    #[test]
    fn test_agent_seeds_differ() {
        let a = agent_seed(1, &AgentId::from("cube1"));
        let b = agent_seed(1, &AgentId::from("cube2"));
        assert_ne!(a, b);
        assert_eq!(a, agent_seed(1, &AgentId::from("cube1")));
    }

    #[test]
    fn test_same_seed_same_turns() {
        let run = |seed| {
            let mut m = BehaviorMachine::new(
                AgentId::from("cube3"),
                Behavior::Stressed,
                Arc::new(Params::default()),
                seed,
            );
            let pose = Pose::new(150.0, 150.0, 0.0);
            (0..20)
                .map(|_| m.intent(&pose, 1.2, Vec2::ZERO).heading_error)
                .collect::<Vec<_>>()
        };
        assert_eq!(run(9), run(9));
    }
}

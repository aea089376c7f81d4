// Behavior kernel for the cubes
//
// Provides:
// - Per-behavior controllers (roaming, tired, stressed, lazy)
// - Inter-agent repulsion field
// - Per-agent behavior state machine

pub mod controllers;
mod machine;
pub mod repulsion;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;

pub use controllers::{LazyController, RoamingController, StressedController, TiredController};
pub use machine::BehaviorMachine;
pub use repulsion::{Vec2, compute_repulsions};

/// Behavior modes an agent can be switched between
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Behavior {
    Roaming,
    Tired,
    Stressed,
    Lazy,
}

impl Behavior {
    pub const ALL: [Behavior; 4] = [
        Behavior::Roaming,
        Behavior::Tired,
        Behavior::Stressed,
        Behavior::Lazy,
    ];

    /// Whether the controller for this behavior reacts to the repulsion field
    pub fn uses_repulsion(self) -> bool {
        matches!(self, Behavior::Roaming | Behavior::Stressed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Behavior::Roaming => "roaming",
            Behavior::Tired => "tired",
            Behavior::Stressed => "stressed",
            Behavior::Lazy => "lazy",
        }
    }
}

impl fmt::Display for Behavior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a controller wants this tick, before wheel mixing
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MotionIntent {
    /// Forward speed, mm/s
    pub forward: f32,
    /// Explicit turn rate, rad/s (positive = counter-clockwise)
    pub angular_rate: f32,
    /// Heading correction to apply this tick, radians
    pub heading_error: f32,
}

impl MotionIntent {
    pub const STOP: MotionIntent = MotionIntent {
        forward: 0.0,
        angular_rate: 0.0,
        heading_error: 0.0,
    };

    pub fn drive(forward: f32, heading_error: f32) -> Self {
        Self {
            forward,
            angular_rate: 0.0,
            heading_error,
        }
    }

    pub fn spin(angular_rate: f32) -> Self {
        Self {
            forward: 0.0,
            angular_rate,
            heading_error: 0.0,
        }
    }
}

/// Tuning constants for one run. Shared read-only by every controller of an agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Params {
    pub v_roam: f32,
    pub v_tired_rot_deg: f32,
    pub v_stressed: f32,
    pub v_lazy: f32,
    pub safety_radius: f32,
    pub boundary_margin: f32,
    /// rad/s
    pub max_turn_rate: f32,
    /// Distance between the two drive wheels
    pub wheelbase: f32,
    /// Width and height of the area behaviors treat as bounded
    pub arena: [f32; 2],
    /// Stressed heading segment length, seconds
    pub stressed_segment_s: f32,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            v_roam: 15.0,
            v_tired_rot_deg: 7.5,
            v_stressed: 35.0,
            v_lazy: 15.0,
            safety_radius: 40.0,
            boundary_margin: 25.0,
            max_turn_rate: 90f32.to_radians(),
            wheelbase: crate::motor::kinematics::WHEELBASE,
            arena: [300.0, 300.0],
            stressed_segment_s: 1.2,
        }
    }
}

impl Params {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let finite = [
            ("v_roam", self.v_roam),
            ("v_tired_rot_deg", self.v_tired_rot_deg),
            ("v_stressed", self.v_stressed),
            ("v_lazy", self.v_lazy),
        ];
        for (name, value) in finite {
            if !value.is_finite() {
                return Err(ConfigError::Param { name, value });
            }
        }

        let positive = [
            ("safety_radius", self.safety_radius),
            ("wheelbase", self.wheelbase),
            ("arena.width", self.arena[0]),
            ("arena.height", self.arena[1]),
            ("stressed_segment_s", self.stressed_segment_s),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::Param { name, value });
            }
        }

        let non_negative = [
            ("boundary_margin", self.boundary_margin),
            ("max_turn_rate", self.max_turn_rate),
        ];
        for (name, value) in non_negative {
            if !(value.is_finite() && value >= 0.0) {
                return Err(ConfigError::Param { name, value });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_behavior_display_matches_wire_name() {
        for b in Behavior::ALL {
            let json = serde_json::to_string(&b).unwrap();
            assert_eq!(json, format!("\"{}\"", b));
        }
    }

    #[test]
    fn test_behavior_serde_snake_case() {
        let json = serde_json::to_string(&Behavior::Stressed).unwrap();
        assert_eq!(json, "\"stressed\"");
        let b: Behavior = serde_json::from_str("\"roaming\"").unwrap();
        assert_eq!(b, Behavior::Roaming);
    }

    #[test]
    fn test_repulsion_users() {
        assert!(Behavior::Roaming.uses_repulsion());
        assert!(Behavior::Stressed.uses_repulsion());
        assert!(!Behavior::Tired.uses_repulsion());
        assert!(!Behavior::Lazy.uses_repulsion());
    }

    #[test]
    fn test_default_params_are_valid() {
        let params = Params::default();
        params.validate().unwrap();
        assert!((params.max_turn_rate - std::f32::consts::FRAC_PI_2).abs() < 1e-6);
    }

    #[test]
    fn test_params_rejects_bad_values() {
        let params = Params {
            safety_radius: 0.0,
            ..Params::default()
        };
        assert!(matches!(
            params.validate(),
            Err(ConfigError::Param {
                name: "safety_radius",
                ..
            })
        ));

        let params = Params {
            v_roam: f32::NAN,
            ..Params::default()
        };
        assert!(params.validate().is_err());
    }
}

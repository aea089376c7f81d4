// Differential-drive mixing for the cube's two wheels
// Converts forward speed plus turn request into left/right wheel speeds.
// Every behavior goes through here, so wheel speeds are derived in exactly one place.

use serde::Serialize;

use crate::behavior::MotionIntent;

/// Distance between the cube's drive wheels, mm
pub const WHEELBASE: f32 = 40.0;

/// Proportional gain applied to a per-tick heading error
pub const HEADING_GAIN: f32 = 2.0;

/// Floor for dt so a zero-length tick cannot blow up the heading term
const MIN_DT: f32 = 1e-3;

/// Wheel speeds in mm/s (positive = forward)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct WheelSpeeds {
    pub left: f32,
    pub right: f32,
}

impl WheelSpeeds {
    pub fn new(left: f32, right: f32) -> Self {
        Self { left, right }
    }

    pub fn zero() -> Self {
        Self::default()
    }
}

/// Mix with the standard cube wheelbase
///
/// # Arguments
/// * `v_forward` - Forward speed in mm/s
/// * `angular_rate` - Explicit turn rate in rad/s (positive = counter-clockwise)
/// * `heading_error` - Heading correction wanted this tick, radians
/// * `dt` - Tick length in seconds
pub fn mix(v_forward: f32, angular_rate: f32, heading_error: f32, dt: f32) -> WheelSpeeds {
    mix_with_wheelbase(v_forward, angular_rate, heading_error, dt, WHEELBASE)
}

/// Mix with a custom wheelbase
pub fn mix_with_wheelbase(
    v_forward: f32,
    angular_rate: f32,
    heading_error: f32,
    dt: f32,
    wheelbase: f32,
) -> WheelSpeeds {
    let omega = angular_rate + HEADING_GAIN * (heading_error / dt.max(MIN_DT));
    let half_track = omega * wheelbase / 2.0;

    WheelSpeeds {
        left: v_forward - half_track,
        right: v_forward + half_track,
    }
}

pub fn mix_intent(intent: MotionIntent, dt: f32, wheelbase: f32) -> WheelSpeeds {
    mix_with_wheelbase(
        intent.forward,
        intent.angular_rate,
        intent.heading_error,
        dt,
        wheelbase,
    )
}

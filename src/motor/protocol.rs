// Cube motor / position-ID wire protocol
//
// Outbound packets go to the motor characteristic:
//   timed wheel speeds: [0x02, 0x01, dir, speed, 0x02, dir, speed, duration/10ms]
//   move to target:     [0x03, ctrl_id, timeout, move_type, max_speed, speed_change, 0,
//                        x_lo, x_hi, y_lo, y_hi, angle_lo, angle_hi]
// Inbound packets come from the position-ID characteristic:
//   position report:    [0x01, x_lo, x_hi, y_lo, y_hi, angle_lo, angle_hi, ...]

use std::time::Duration;

use crate::config::{MOVE_CONTROL_ID, MOVE_MAX_SPEED, MOVE_TIMEOUT_S};
use crate::mapper::SurfacePoint;
use crate::pose::Pose;

use super::kinematics::WheelSpeeds;

/// Command ids
pub const CMD_MOTOR_TIMED: u8 = 0x02;
pub const CMD_MOVE_TO_TARGET: u8 = 0x03;

/// Position-ID report tag for "on the mat"
pub const TAG_POSITION_ID: u8 = 0x01;

const MOTOR_LEFT: u8 = 0x01;
const MOTOR_RIGHT: u8 = 0x02;
const DIR_FORWARD: u8 = 0x01;
const DIR_BACKWARD: u8 = 0x02;

/// Largest speed value the cube accepts
pub const MAX_WHEEL_SPEED: u8 = 115;

pub const WHEEL_COMMAND_LEN: usize = 8;
pub const MOVE_TO_TARGET_LEN: usize = 13;
pub const POSITION_REPORT_LEN: usize = 7;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ProtocolError {
    #[error("Truncated position report: expected {expected} bytes, got {got}")]
    Truncated { expected: usize, got: usize },

    #[error("Target ({x}, {y}) does not fit the u16 mat coordinates")]
    OutOfRange { x: i32, y: i32 },
}

/// How the cube approaches an absolute target
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MovementType {
    /// Turn toward the target as needed while driving
    #[default]
    RotateAndMove = 0x00,
    /// Same, but never reverses
    RotateAndMoveForwardOnly = 0x01,
    /// Face the target first, then drive straight
    RotateThenMove = 0x02,
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SpeedChange {
    #[default]
    Constant = 0x00,
    Accelerate = 0x01,
    Decelerate = 0x02,
    AccelerateThenDecelerate = 0x03,
}

/// Direct wheel-speed command with a run duration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WheelCommand {
    /// mm/s, signed
    pub left: i16,
    pub right: i16,
    /// 0 = run until the next command
    pub duration_ms: u16,
}

impl WheelCommand {
    /// Speeds are truncated toward zero
    pub fn from_speeds(speeds: WheelSpeeds, duration: Duration) -> Self {
        Self {
            left: speeds.left as i16,
            right: speeds.right as i16,
            duration_ms: duration.as_millis().min(u16::MAX as u128) as u16,
        }
    }

    pub fn stop() -> Self {
        Self {
            left: 0,
            right: 0,
            duration_ms: 0,
        }
    }

    pub fn encode(&self) -> [u8; WHEEL_COMMAND_LEN] {
        let (left_dir, left_speed) = encode_speed(self.left);
        let (right_dir, right_speed) = encode_speed(self.right);
        // duration travels in 10 ms units
        let duration = (self.duration_ms / 10).min(u8::MAX as u16) as u8;

        [
            CMD_MOTOR_TIMED,
            MOTOR_LEFT,
            left_dir,
            left_speed,
            MOTOR_RIGHT,
            right_dir,
            right_speed,
            duration,
        ]
    }
}

/// Split a signed speed into (direction, magnitude), saturating the magnitude
fn encode_speed(speed: i16) -> (u8, u8) {
    let dir = if speed < 0 { DIR_BACKWARD } else { DIR_FORWARD };
    let magnitude = speed.unsigned_abs().min(MAX_WHEEL_SPEED as u16) as u8;
    (dir, magnitude)
}

/// Absolute "move to target" command in mat coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveToTarget {
    pub control_id: u8,
    pub timeout_s: u8,
    pub movement: MovementType,
    pub max_speed: u8,
    pub speed_change: SpeedChange,
    x: u16,
    y: u16,
}

impl MoveToTarget {
    /// Fails if either coordinate is negative or above u16::MAX
    pub fn new(target: SurfacePoint) -> Result<Self, ProtocolError> {
        let (Ok(x), Ok(y)) = (u16::try_from(target.x), u16::try_from(target.y)) else {
            return Err(ProtocolError::OutOfRange {
                x: target.x,
                y: target.y,
            });
        };

        Ok(Self {
            control_id: MOVE_CONTROL_ID,
            timeout_s: MOVE_TIMEOUT_S,
            movement: MovementType::default(),
            max_speed: MOVE_MAX_SPEED,
            speed_change: SpeedChange::default(),
            x,
            y,
        })
    }

    pub fn with_max_speed(mut self, max_speed: u8) -> Self {
        self.max_speed = max_speed;
        self
    }

    pub fn with_movement(mut self, movement: MovementType) -> Self {
        self.movement = movement;
        self
    }

    pub fn with_speed_change(mut self, speed_change: SpeedChange) -> Self {
        self.speed_change = speed_change;
        self
    }

    pub fn encode(&self) -> [u8; MOVE_TO_TARGET_LEN] {
        let mut packet = [0u8; MOVE_TO_TARGET_LEN];
        packet[0] = CMD_MOVE_TO_TARGET;
        packet[1] = self.control_id;
        packet[2] = self.timeout_s;
        packet[3] = self.movement as u8;
        packet[4] = self.max_speed;
        packet[5] = self.speed_change as u8;
        packet[6] = 0x00; // reserved
        packet[7..9].copy_from_slice(&self.x.to_le_bytes());
        packet[9..11].copy_from_slice(&self.y.to_le_bytes());
        // final angle unused
        packet[11..13].copy_from_slice(&0u16.to_le_bytes());
        packet
    }
}

/// Position and heading as reported by the cube's mat reader
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionReport {
    pub x: u16,
    pub y: u16,
    pub angle_deg: u16,
}

impl PositionReport {
    pub fn to_pose(&self) -> Pose {
        Pose::from_degrees(self.x as f32, self.y as f32, self.angle_deg as f32)
    }
}

/// Decode a position-ID notification.
///
/// Returns `Ok(None)` for empty buffers and any tag other than a position
/// report; those are dropped without complaint.
pub fn decode_position(data: &[u8]) -> Result<Option<PositionReport>, ProtocolError> {
    match data.first() {
        Some(&TAG_POSITION_ID) => {}
        _ => return Ok(None),
    }

    if data.len() < POSITION_REPORT_LEN {
        return Err(ProtocolError::Truncated {
            expected: POSITION_REPORT_LEN,
            got: data.len(),
        });
    }

    Ok(Some(PositionReport {
        x: u16::from_le_bytes([data[1], data[2]]),
        y: u16::from_le_bytes([data[3], data[4]]),
        angle_deg: u16::from_le_bytes([data[5], data[6]]),
    }))
}

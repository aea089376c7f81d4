// Motor control module for the cubes
//
// Provides:
// - Differential-drive mixing (forward speed + turn -> wheel speeds)
// - Cube motor / position-ID packet encoding and decoding
// - The outbound command link used by the runtime and navigation

pub mod kinematics;
pub mod link;
pub mod protocol;

pub use kinematics::{WheelSpeeds, mix, mix_with_wheelbase};
pub use link::{CommandLink, LinkError, ZenohLink};
pub use protocol::{MoveToTarget, PositionReport, ProtocolError, WheelCommand, decode_position};

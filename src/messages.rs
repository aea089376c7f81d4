// JSON messages exchanged with the orchestrator

use serde::{Deserialize, Serialize};

use crate::behavior::Behavior;
use crate::motor::kinematics::WheelSpeeds;
use crate::pose::AgentId;

// Behavior switch request from an orchestrator -> runtime
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BehaviorCommand {
    pub agent: AgentId,
    pub behavior: Behavior,
}

/// Whether the runtime has a pose to act on
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum TelemetryHealth {
    Ok,
    PoseUnknown,
}

// Per-agent status published by the runtime every tick
#[derive(Debug, Clone, Serialize)]
pub struct AgentStatus {
    pub agent: AgentId,
    pub behavior: Behavior,
    pub wheels: WheelSpeeds,
    pub health: TelemetryHealth,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_behavior_command() {
        let cmd: BehaviorCommand =
            serde_json::from_str(r#"{"agent": "cube2", "behavior": "stressed"}"#).unwrap();
        assert_eq!(cmd.agent, AgentId::from("cube2"));
        assert_eq!(cmd.behavior, Behavior::Stressed);
    }

    #[test]
    fn test_reject_unknown_behavior() {
        let parsed =
            serde_json::from_str::<BehaviorCommand>(r#"{"agent": "cube2", "behavior": "sleepy"}"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_status_json() {
        let status = AgentStatus {
            agent: AgentId::from("cube1"),
            behavior: Behavior::Tired,
            wheels: WheelSpeeds::new(-2.5, 2.5),
            health: TelemetryHealth::PoseUnknown,
        };
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["agent"], "cube1");
        assert_eq!(json["behavior"], "tired");
        assert_eq!(json["wheels"]["left"], -2.5);
        assert_eq!(json["health"], "pose_unknown");
    }
}

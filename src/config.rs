// Tick periods, thresholds, key expressions, and the runtime config file
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::behavior::Params;
use crate::mapper::{CoordinateMapper, MatAnchors};
use crate::pose::AgentId;

// Control loop period shared by all agents
pub const TICK_PERIOD: Duration = Duration::from_millis(100);

// moveTo polls the pose store at this interval
pub const POLL_INTERVAL: Duration = Duration::from_millis(50);

// Surface units (~1 mm) within which a cube counts as arrived
pub const ARRIVAL_THRESHOLD: f32 = 10.0;

// Zenoh key expressions: <prefix>/<agent>/<suffix>
pub const KEY_PREFIX: &str = "cubes";
pub const TOPIC_MOTOR: &str = "motor"; // encoded motor commands
pub const TOPIC_POSITION: &str = "position"; // raw position reports
pub const TOPIC_STATUS: &str = "status"; // per-agent status json
pub const TOPIC_BEHAVIOR_CMD: &str = "cmd/behavior"; // behavior switch requests

// Mat calibration: surface coords of playfield (0, 0) and of the playfield extent
pub const MAT_TOP_LEFT: [f32; 2] = [89.0, 238.0];
pub const MAT_BOTTOM_RIGHT: [f32; 2] = [283.0, 45.0];
pub const PLAYFIELD_SIZE: [f32; 2] = [300.0, 300.0];

// Defaults for the absolute move-to-target command
pub const MOVE_CONTROL_ID: u8 = 0x01;
pub const MOVE_TIMEOUT_S: u8 = 5;
pub const MOVE_MAX_SPEED: u8 = 80;

// Default cube names when none are configured
pub const DEFAULT_AGENTS: [&str; 4] = ["cube1", "cube2", "cube3", "cube4"];

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Playfield extent must be positive and finite, got {width} x {height}")]
    PlayfieldExtent { width: f32, height: f32 },

    #[error("Malformed mat anchors: {0}")]
    Anchors(String),

    #[error("Invalid parameter {name}: {value}")]
    Param { name: &'static str, value: f32 },

    #[error("No agents configured")]
    NoAgents,

    #[error("Duplicate agent id: {0}")]
    DuplicateAgent(AgentId),

    #[error("Tick period must be non-zero")]
    ZeroTick,
}

/// Runtime configuration, read from JSON. Every field has a default, so `{}` is valid.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub agents: Vec<AgentId>,
    pub params: Params,
    pub anchors: MatAnchors,
    pub playfield: [f32; 2],
    pub tick_ms: u64,
    pub seed: u64,
    pub key_prefix: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            agents: DEFAULT_AGENTS.iter().map(|&id| AgentId::new(id)).collect(),
            params: Params::default(),
            anchors: MatAnchors::default(),
            playfield: PLAYFIELD_SIZE,
            tick_ms: TICK_PERIOD.as_millis() as u64,
            seed: 0,
            key_prefix: KEY_PREFIX.to_string(),
        }
    }
}

impl RuntimeConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&json)
    }

    /// Check everything the control loop relies on. Call before starting any task.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.agents.is_empty() {
            return Err(ConfigError::NoAgents);
        }
        let mut seen = std::collections::HashSet::new();
        for id in &self.agents {
            if !seen.insert(id) {
                return Err(ConfigError::DuplicateAgent(id.clone()));
            }
        }
        if self.tick_ms == 0 {
            return Err(ConfigError::ZeroTick);
        }
        self.params.validate()?;
        self.mapper().map(|_| ())
    }

    pub fn mapper(&self) -> Result<CoordinateMapper, ConfigError> {
        CoordinateMapper::new(self.anchors, self.playfield)
    }

    pub fn tick_period(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    pub fn motor_key(&self, agent: &AgentId) -> String {
        format!("{}/{}/{}", self.key_prefix, agent, TOPIC_MOTOR)
    }

    pub fn position_key(&self, agent: &AgentId) -> String {
        format!("{}/{}/{}", self.key_prefix, agent, TOPIC_POSITION)
    }

    pub fn status_key(&self, agent: &AgentId) -> String {
        format!("{}/{}/{}", self.key_prefix, agent, TOPIC_STATUS)
    }

    pub fn behavior_cmd_key(&self) -> String {
        format!("{}/{}", self.key_prefix, TOPIC_BEHAVIOR_CMD)
    }
}

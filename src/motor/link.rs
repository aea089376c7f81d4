// Outbound command channel to the cubes
//
// The kernel only needs two capabilities from whoever holds the radio link:
// send timed wheel speeds and send an absolute target. ZenohLink publishes
// the encoded packets for a BLE gateway to forward to the motor characteristic.

use std::collections::HashMap;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::protocol::{MoveToTarget, WheelCommand};
use crate::config::RuntimeConfig;
use crate::pose::AgentId;

#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    #[error("No command channel for {0}")]
    UnknownAgent(AgentId),

    #[error("Failed to send to {agent}: {reason}")]
    Send { agent: AgentId, reason: String },
}

/// Capability interface implemented by the connection layer
#[async_trait]
pub trait CommandLink: Send + Sync {
    async fn send_wheel_speeds(
        &self,
        agent: &AgentId,
        cmd: WheelCommand,
    ) -> Result<(), LinkError>;

    async fn send_absolute_target(
        &self,
        agent: &AgentId,
        cmd: MoveToTarget,
    ) -> Result<(), LinkError>;
}

/// Publishes encoded motor packets on `<prefix>/<agent>/motor`
pub struct ZenohLink {
    publishers: HashMap<AgentId, zenoh::pubsub::Publisher<'static>>,
}

impl ZenohLink {
    /// Declare one publisher per configured agent
    pub async fn declare(session: &zenoh::Session, config: &RuntimeConfig) -> zenoh::Result<Self> {
        let mut publishers = HashMap::new();
        for agent in &config.agents {
            let key = config.motor_key(agent);
            info!("{}: motor commands on {}", agent, key);
            let publisher = session.declare_publisher(key).await?;
            publishers.insert(agent.clone(), publisher);
        }
        Ok(Self { publishers })
    }

    async fn publish(&self, agent: &AgentId, packet: &[u8]) -> Result<(), LinkError> {
        let publisher = self
            .publishers
            .get(agent)
            .ok_or_else(|| LinkError::UnknownAgent(agent.clone()))?;

        debug!("{}: sending {:02X?}", agent, packet);
        publisher
            .put(packet.to_vec())
            .await
            .map_err(|e| LinkError::Send {
                agent: agent.clone(),
                reason: e.to_string(),
            })
    }

    /// Best-effort stop for every cube, used on shutdown
    pub async fn stop_all(&self) {
        info!("Stopping all cubes");
        for agent in self.publishers.keys() {
            if let Err(e) = self.send_wheel_speeds(agent, WheelCommand::stop()).await {
                warn!("Failed to stop {}: {}", agent, e);
            }
        }
    }
}

#[async_trait]
impl CommandLink for ZenohLink {
    async fn send_wheel_speeds(
        &self,
        agent: &AgentId,
        cmd: WheelCommand,
    ) -> Result<(), LinkError> {
        self.publish(agent, &cmd.encode()).await
    }

    async fn send_absolute_target(
        &self,
        agent: &AgentId,
        cmd: MoveToTarget,
    ) -> Result<(), LinkError> {
        self.publish(agent, &cmd.encode()).await
    }
}

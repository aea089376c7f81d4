// Inbound position reports -> pose store

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::RuntimeConfig;
use crate::motor::protocol::{ProtocolError, decode_position};
use crate::pose::{AgentId, PoseStore};

/// Decode one raw notification and record it for `agent`.
///
/// Returns `Ok(true)` when a pose was written, `Ok(false)` when the buffer
/// carried some other report type (or the agent is unknown).
pub fn ingest(store: &PoseStore, agent: &AgentId, data: &[u8]) -> Result<bool, ProtocolError> {
    let Some(report) = decode_position(data)? else {
        return Ok(false);
    };
    Ok(store.update(agent, report.to_pose()))
}

/// Spawn one subscriber task per agent feeding `<prefix>/<agent>/position` into the store
pub async fn spawn_subscribers(
    session: &zenoh::Session,
    config: &RuntimeConfig,
    store: Arc<PoseStore>,
) -> zenoh::Result<Vec<JoinHandle<()>>> {
    let mut handles = Vec::with_capacity(config.agents.len());

    for agent in config.agents.iter().cloned() {
        let key = config.position_key(&agent);
        let subscriber = session.declare_subscriber(key.as_str()).await?;
        info!("{}: position reports from {}", agent, key);

        let store = Arc::clone(&store);
        handles.push(tokio::spawn(async move {
            while let Ok(sample) = subscriber.recv_async().await {
                let payload = sample.payload().to_bytes();
                match ingest(&store, &agent, &payload) {
                    Ok(true) => {}
                    Ok(false) => debug!("{}: ignored non-position report", agent),
                    Err(e) => warn!("{}: {}", agent, e),
                }
            }
            warn!("{}: telemetry subscription closed", agent);
        }));
    }

    Ok(handles)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ingest_writes_pose() {
        let agent = AgentId::from("cube1");
        let store = PoseStore::new([agent.clone()]);

        let written = ingest(&store, &agent, &[0x01, 0x64, 0x00, 0xC8, 0x00, 0x5A, 0x00]).unwrap();
        assert!(written);
        let pose = store.latest(&agent).unwrap();
        assert_eq!((pose.x, pose.y), (100.0, 200.0));
        assert!((pose.theta() - std::f32::consts::FRAC_PI_2).abs() < 1e-5);
    }

    #[test]
    fn test_ingest_ignores_other_reports() {
        let agent = AgentId::from("cube1");
        let store = PoseStore::new([agent.clone()]);

        // position-missed notification
        assert!(!ingest(&store, &agent, &[0x03]).unwrap());
        assert!(!store.is_updated(&agent));
    }

    #[test]
    fn test_truncated_report_leaves_store_untouched() {
        let agent = AgentId::from("cube1");
        let store = PoseStore::new([agent.clone()]);

        assert!(ingest(&store, &agent, &[0x01, 0x64]).is_err());
        assert!(!store.is_updated(&agent));
    }
}

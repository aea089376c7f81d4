// Closed-loop "move to target" for one or more cubes
//
// The cube drives itself toward an absolute mat target; we only send the
// command and watch the pose store until it reports arrival. Every wait is
// bounded by a caller-supplied deadline.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tokio::time::{Instant, sleep, timeout};
use tracing::{debug, error, info, warn};

use crate::config::{ARRIVAL_THRESHOLD, MOVE_MAX_SPEED, POLL_INTERVAL};
use crate::mapper::{CoordinateMapper, SurfacePoint};
use crate::motor::link::{CommandLink, LinkError};
use crate::motor::protocol::{MoveToTarget, MovementType, SpeedChange};
use crate::pose::{AgentId, Pose, PoseStore};

#[derive(Debug, thiserror::Error)]
pub enum NavError {
    #[error("Unknown agent {0}")]
    UnknownAgent(AgentId),

    #[error(transparent)]
    Link(#[from] LinkError),

    #[error("{agent}: target {target:?} lies off the mat")]
    TargetOutOfRange { agent: AgentId, target: SurfacePoint },

    #[error("{agent} did not reach {target:?} within {waited:?}")]
    ArrivalTimeout {
        agent: AgentId,
        target: SurfacePoint,
        waited: Duration,
    },
}

#[derive(Debug, Clone, Copy)]
pub struct NavSettings {
    pub poll_interval: Duration,
    pub arrival_threshold: f32,
    pub max_speed: u8,
    pub movement: MovementType,
    pub speed_change: SpeedChange,
}

impl Default for NavSettings {
    fn default() -> Self {
        Self {
            poll_interval: POLL_INTERVAL,
            arrival_threshold: ARRIVAL_THRESHOLD,
            max_speed: MOVE_MAX_SPEED,
            movement: MovementType::default(),
            speed_change: SpeedChange::default(),
        }
    }
}

/// Successful moveTo outcome
#[derive(Debug, Clone, Copy)]
pub struct Arrival {
    pub target: SurfacePoint,
    pub pose: Pose,
    pub elapsed: Duration,
}

pub struct Navigator<L: CommandLink + ?Sized> {
    mapper: CoordinateMapper,
    store: Arc<PoseStore>,
    link: Arc<L>,
    settings: NavSettings,
}

impl<L: CommandLink + ?Sized + 'static> Navigator<L> {
    pub fn new(mapper: CoordinateMapper, store: Arc<PoseStore>, link: Arc<L>) -> Self {
        Self::with_settings(mapper, store, link, NavSettings::default())
    }

    pub fn with_settings(
        mapper: CoordinateMapper,
        store: Arc<PoseStore>,
        link: Arc<L>,
        settings: NavSettings,
    ) -> Self {
        Self {
            mapper,
            store,
            link,
            settings,
        }
    }

    /// Send `agent` to a playfield target and wait until it reports arrival.
    ///
    /// Fails with `ArrivalTimeout` if no qualifying pose shows up within
    /// `deadline`. Dropping the future cancels the wait.
    pub async fn move_to(
        &self,
        agent: &AgentId,
        playfield_x: f32,
        playfield_y: f32,
        deadline: Duration,
    ) -> Result<Arrival, NavError> {
        if !self.store.contains(agent) {
            return Err(NavError::UnknownAgent(agent.clone()));
        }

        let target = self.mapper.map(playfield_x, playfield_y);
        info!(
            "{}: moveTo ({}, {}) playfield -> ({}, {}) mat",
            agent, playfield_x, playfield_y, target.x, target.y
        );

        let cmd = match MoveToTarget::new(target) {
            Ok(cmd) => cmd
                .with_max_speed(self.settings.max_speed)
                .with_movement(self.settings.movement)
                .with_speed_change(self.settings.speed_change),
            Err(e) => {
                warn!("{}: {}", agent, e);
                return Err(NavError::TargetOutOfRange {
                    agent: agent.clone(),
                    target,
                });
            }
        };

        let started = Instant::now();
        self.link.send_absolute_target(agent, cmd).await?;

        match timeout(deadline, self.wait_for_arrival(agent, target)).await {
            Ok(pose) => {
                let elapsed = started.elapsed();
                info!("{}: arrived at ({}, {}) in {:?}", agent, target.x, target.y, elapsed);
                Ok(Arrival {
                    target,
                    pose,
                    elapsed,
                })
            }
            Err(_) => {
                warn!("{}: no arrival after {:?}", agent, deadline);
                Err(NavError::ArrivalTimeout {
                    agent: agent.clone(),
                    target,
                    waited: deadline,
                })
            }
        }
    }

    /// Poll until the agent has reported at least once and sits within the threshold.
    /// A missing pose means "unknown" and keeps us waiting.
    async fn wait_for_arrival(&self, agent: &AgentId, target: SurfacePoint) -> Pose {
        loop {
            if let Some(pose) = self.store.latest(agent) {
                let distance = target.distance_to(pose.x, pose.y);
                if distance < self.settings.arrival_threshold {
                    return pose;
                }
                debug!("{}: {:.1} from target", agent, distance);
            }
            sleep(self.settings.poll_interval).await;
        }
    }

    /// Run several moveTo calls at once. One agent failing never cancels the others.
    pub async fn move_all(
        self: &Arc<Self>,
        targets: impl IntoIterator<Item = (AgentId, (f32, f32))>,
        deadline: Duration,
    ) -> HashMap<AgentId, Result<Arrival, NavError>> {
        let mut tasks = JoinSet::new();
        for (agent, (x, y)) in targets {
            let nav = Arc::clone(self);
            tasks.spawn(async move {
                let result = nav.move_to(&agent, x, y, deadline).await;
                (agent, result)
            });
        }

        let mut results = HashMap::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((agent, result)) => {
                    results.insert(agent, result);
                }
                Err(e) => error!("moveTo task failed: {}", e),
            }
        }
        results
    }
}

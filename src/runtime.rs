// Fixed-tick behavior loop for all cubes
// Each tick: apply pending behavior switches, snapshot poses, compute the
// repulsion field, step every agent's state machine, and send wheel commands.
// Agents without a reported pose sit the tick out rather than acting on a guess.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tokio::time::{Instant, interval};
use tracing::{debug, info, warn};

use crate::behavior::{Behavior, BehaviorMachine, Params, Vec2, compute_repulsions};
use crate::config::RuntimeConfig;
use crate::messages::{AgentStatus, BehaviorCommand, TelemetryHealth};
use crate::motor::kinematics::WheelSpeeds;
use crate::motor::link::{CommandLink, ZenohLink};
use crate::motor::protocol::WheelCommand;
use crate::pose::{AgentId, PoseStore};
use crate::telemetry;

pub struct Runtime {
    machines: BTreeMap<AgentId, BehaviorMachine>,
    store: Arc<PoseStore>,
    params: Arc<Params>,
    last_wheels: HashMap<AgentId, WheelSpeeds>,
}

impl Runtime {
    /// Agents start in roaming, tired, stressed, lazy order, cycling
    pub fn new(config: &RuntimeConfig, store: Arc<PoseStore>) -> Self {
        let params = Arc::new(config.params.clone());
        let machines = config
            .agents
            .iter()
            .enumerate()
            .map(|(i, id)| {
                let behavior = Behavior::ALL[i % Behavior::ALL.len()];
                info!("{}: starting as {}", id, behavior);
                let machine =
                    BehaviorMachine::new(id.clone(), behavior, Arc::clone(&params), config.seed);
                (id.clone(), machine)
            })
            .collect();

        Self {
            machines,
            store,
            params,
            last_wheels: HashMap::new(),
        }
    }

    /// Apply a behavior switch. Returns false for unknown agents.
    pub fn on_command(&mut self, cmd: BehaviorCommand) -> bool {
        match self.machines.get_mut(&cmd.agent) {
            Some(machine) => {
                machine.set_state(cmd.behavior);
                true
            }
            None => {
                warn!("Behavior command for unknown agent {}", cmd.agent);
                false
            }
        }
    }

    pub fn behavior(&self, agent: &AgentId) -> Option<Behavior> {
        self.machines.get(agent).map(|m| m.behavior())
    }

    /// Step every agent with a known pose against one consistent snapshot
    pub fn compute_commands(&mut self, dt: f32) -> Vec<(AgentId, WheelSpeeds)> {
        let snapshot = self.store.snapshot();
        let field = compute_repulsions(&snapshot, self.params.safety_radius);

        let mut commands = Vec::with_capacity(self.machines.len());
        for (id, machine) in self.machines.iter_mut() {
            let Some(pose) = snapshot.get(id) else {
                debug!("{}: pose unknown, skipping tick", id);
                self.last_wheels.remove(id);
                continue;
            };
            let repel = field.get(id).copied().unwrap_or(Vec2::ZERO);
            let wheels = machine.step(pose, dt, repel);
            self.last_wheels.insert(id.clone(), wheels);
            commands.push((id.clone(), wheels));
        }
        commands
    }

    pub fn status(&self) -> Vec<AgentStatus> {
        self.machines
            .iter()
            .map(|(id, machine)| AgentStatus {
                agent: id.clone(),
                behavior: machine.behavior(),
                wheels: self.last_wheels.get(id).copied().unwrap_or_default(),
                health: if self.store.is_updated(id) {
                    TelemetryHealth::Ok
                } else {
                    TelemetryHealth::PoseUnknown
                },
            })
            .collect()
    }
}

/// Send every agent's wheel command concurrently.
/// A failed send is logged and costs only that agent its tick.
pub async fn dispatch<L: CommandLink + ?Sized + 'static>(
    link: &Arc<L>,
    commands: Vec<(AgentId, WheelSpeeds)>,
    duration: Duration,
) -> usize {
    let mut sends = JoinSet::new();
    for (agent, wheels) in commands {
        let link = Arc::clone(link);
        sends.spawn(async move {
            let cmd = WheelCommand::from_speeds(wheels, duration);
            let result = link.send_wheel_speeds(&agent, cmd).await;
            (agent, result)
        });
    }

    let mut delivered = 0;
    while let Some(joined) = sends.join_next().await {
        match joined {
            Ok((_, Ok(()))) => delivered += 1,
            Ok((agent, Err(e))) => warn!("{}: skipped tick: {}", agent, e),
            Err(e) => warn!("Send task failed: {}", e),
        }
    }
    delivered
}

pub async fn run(config: RuntimeConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    config.validate()?;

    info!("Opening Zenoh session...");
    let session = zenoh::open(zenoh::Config::default()).await?;

    info!("Setting up publishers and subscribers...");
    let store = Arc::new(PoseStore::new(config.agents.iter().cloned()));
    let _telemetry = telemetry::spawn_subscribers(&session, &config, Arc::clone(&store)).await?;
    let link = Arc::new(ZenohLink::declare(&session, &config).await?);
    let cmd_subscriber = session.declare_subscriber(config.behavior_cmd_key()).await?;

    let mut status_publishers = HashMap::new();
    for agent in &config.agents {
        let publisher = session.declare_publisher(config.status_key(agent)).await?;
        status_publishers.insert(agent.clone(), publisher);
    }

    let mut runtime = Runtime::new(&config, Arc::clone(&store));
    let period = config.tick_period();
    let mut tick = interval(period);
    let mut last = Instant::now();

    info!(
        "Runtime started: {} agents, {}ms tick",
        config.agents.len(),
        period.as_millis()
    );
    info!("Behavior commands on: {}", config.behavior_cmd_key());

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = tick.tick() => {}
            _ = &mut shutdown => {
                info!("Stopping...");
                break;
            }
        }

        let now = Instant::now();
        let dt = now.duration_since(last).as_secs_f32();
        last = now;

        // 1. Drain pending behavior switches (non-blocking)
        while let Ok(Some(sample)) = cmd_subscriber.try_recv() {
            let payload = sample.payload().to_bytes();
            match serde_json::from_slice::<BehaviorCommand>(&payload) {
                Ok(cmd) => {
                    runtime.on_command(cmd);
                }
                Err(e) => warn!("Failed to parse behavior command: {}", e),
            }
        }

        // 2. Step every agent and send wheel speeds
        let commands = runtime.compute_commands(dt);
        dispatch(&link, commands, period).await;

        // 3. Publish status
        for status in runtime.status() {
            if let Some(publisher) = status_publishers.get(&status.agent) {
                let json = serde_json::to_string(&status)?;
                if let Err(e) = publisher.put(json).await {
                    warn!("{}: failed to publish status: {}", status.agent, e);
                }
            }
        }
    }

    link.stop_all().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::motor::link::testing::RecordingLink;
    use crate::pose::Pose;

    fn runtime(agents: &[&str]) -> (Runtime, Arc<PoseStore>) {
        let config = RuntimeConfig {
            agents: agents.iter().map(|&a| AgentId::from(a)).collect(),
            ..RuntimeConfig::default()
        };
        let store = Arc::new(PoseStore::new(config.agents.iter().cloned()));
        (Runtime::new(&config, Arc::clone(&store)), store)
    }

    #[test]
    fn test_initial_behaviors_cycle() {
        let (rt, _) = runtime(&["a", "b", "c", "d", "e"]);
        assert_eq!(rt.behavior(&AgentId::from("a")), Some(Behavior::Roaming));
        assert_eq!(rt.behavior(&AgentId::from("b")), Some(Behavior::Tired));
        assert_eq!(rt.behavior(&AgentId::from("c")), Some(Behavior::Stressed));
        assert_eq!(rt.behavior(&AgentId::from("d")), Some(Behavior::Lazy));
        assert_eq!(rt.behavior(&AgentId::from("e")), Some(Behavior::Roaming));
    }

    #[test]
    fn test_agents_without_pose_skip_tick() {
        let (mut rt, store) = runtime(&["a", "b"]);
        store.update(&AgentId::from("b"), Pose::new(150.0, 150.0, 0.0));

        let commands = rt.compute_commands(0.1);
        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0].0, AgentId::from("b"));

        let status = rt.status();
        let a = status.iter().find(|s| s.agent.as_str() == "a").unwrap();
        assert_eq!(a.health, TelemetryHealth::PoseUnknown);
        assert_eq!(a.wheels, WheelSpeeds::zero());
    }

    #[test]
    fn test_behavior_command_applies() {
        let (mut rt, store) = runtime(&["a"]);
        store.update(&AgentId::from("a"), Pose::new(150.0, 150.0, 0.0));

        assert!(rt.on_command(BehaviorCommand {
            agent: AgentId::from("a"),
            behavior: Behavior::Tired,
        }));
        let commands = rt.compute_commands(0.1);
        let wheels = commands[0].1;
        // tired spins in place
        assert_eq!(wheels.left, -wheels.right);

        assert!(!rt.on_command(BehaviorCommand {
            agent: AgentId::from("zz"),
            behavior: Behavior::Lazy,
        }));
    }

    #[test]
    fn test_neighbours_steer_roaming_agents() {
        let (mut rt, store) = runtime(&["a", "b"]);
        for id in ["a", "b"] {
            rt.on_command(BehaviorCommand {
                agent: AgentId::from(id),
                behavior: Behavior::Roaming,
            });
        }
        // both face +x, b sits just above a
        store.update(&AgentId::from("a"), Pose::new(150.0, 150.0, 0.0));
        store.update(&AgentId::from("b"), Pose::new(150.0, 160.0, 0.0));

        let commands: HashMap<_, _> = rt.compute_commands(0.1).into_iter().collect();
        let a = commands[&AgentId::from("a")];
        let b = commands[&AgentId::from("b")];
        // a is pushed down (turns clockwise), b up (counter-clockwise)
        assert!(a.left > a.right);
        assert!(b.right > b.left);
    }

    #[tokio::test]
    async fn test_dispatch_isolates_failed_sends() {
        let link = Arc::new(RecordingLink::failing_for(&["b"]));
        let commands = vec![
            (AgentId::from("a"), WheelSpeeds::new(10.0, 10.0)),
            (AgentId::from("b"), WheelSpeeds::new(10.0, 10.0)),
            (AgentId::from("c"), WheelSpeeds::new(-5.0, 5.0)),
        ];

        let delivered = dispatch(&link, commands, Duration::from_millis(100)).await;
        assert_eq!(delivered, 2);

        let sent = link.sent();
        assert_eq!(sent.len(), 2);
        assert!(sent.iter().all(|(agent, _)| agent.as_str() != "b"));
        let (_, packet) = sent.iter().find(|(a, _)| a.as_str() == "c").unwrap();
        assert_eq!(packet, &vec![0x02, 0x01, 0x02, 5, 0x02, 0x01, 5, 10]);
    }
}

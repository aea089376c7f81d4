// Navigation run: send each cube to a corner of the safe playfield and wait for all of them
//
// Usage: cargo run --example navigate -- [--config runtime.json] [--timeout-s 30]
//        [--approach turn-first] [--ramp ease]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use cube_swarm_runtime::config::RuntimeConfig;
use cube_swarm_runtime::motor::ZenohLink;
use cube_swarm_runtime::motor::protocol::{MovementType, SpeedChange};
use cube_swarm_runtime::navigation::{NavSettings, Navigator};
use cube_swarm_runtime::pose::{AgentId, PoseStore};
use cube_swarm_runtime::telemetry;

// Corners of the safe playfield, 30 units in from each edge
const CORNER_TARGETS: [(f32, f32); 4] = [
    (30.0, 30.0),
    (270.0, 30.0),
    (30.0, 270.0),
    (270.0, 270.0),
];

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Approach {
    /// Steer toward the target while driving
    Drive,
    /// Steer while driving, never reversing
    ForwardOnly,
    /// Face the target before driving
    TurnFirst,
}

impl From<Approach> for MovementType {
    fn from(approach: Approach) -> Self {
        match approach {
            Approach::Drive => MovementType::RotateAndMove,
            Approach::ForwardOnly => MovementType::RotateAndMoveForwardOnly,
            Approach::TurnFirst => MovementType::RotateThenMove,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Ramp {
    Constant,
    Accelerate,
    Decelerate,
    /// Accelerate, then slow down near the target
    Ease,
}

impl From<Ramp> for SpeedChange {
    fn from(ramp: Ramp) -> Self {
        match ramp {
            Ramp::Constant => SpeedChange::Constant,
            Ramp::Accelerate => SpeedChange::Accelerate,
            Ramp::Decelerate => SpeedChange::Decelerate,
            Ramp::Ease => SpeedChange::AccelerateThenDecelerate,
        }
    }
}

#[derive(Debug, Parser)]
#[command(about = "Drive each cube to a playfield corner")]
struct Args {
    /// JSON runtime config; built-in defaults when omitted
    #[arg(long)]
    config: Option<PathBuf>,

    /// Agent id to drive (repeatable, at most four)
    #[arg(long = "agent")]
    agents: Vec<String>,

    /// Give up on a cube that has not arrived after this many seconds
    #[arg(long, default_value_t = 30)]
    timeout_s: u64,

    /// How each cube approaches its corner
    #[arg(long, value_enum, default_value = "drive")]
    approach: Approach,

    /// Speed profile along the way
    #[arg(long, value_enum, default_value = "constant")]
    ramp: Ramp,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .init();

    let args = Args::parse();
    let mut config = match &args.config {
        Some(path) => RuntimeConfig::load(path)?,
        None => RuntimeConfig::default(),
    };
    if !args.agents.is_empty() {
        config.agents = args.agents.iter().map(|a| AgentId::new(a.as_str())).collect();
    }
    config.validate()?;

    info!("Opening Zenoh session...");
    let session = zenoh::open(zenoh::Config::default()).await?;
    let store = Arc::new(PoseStore::new(config.agents.iter().cloned()));
    let _telemetry = telemetry::spawn_subscribers(&session, &config, Arc::clone(&store)).await?;
    let link = Arc::new(ZenohLink::declare(&session, &config).await?);
    let settings = NavSettings {
        movement: args.approach.into(),
        speed_change: args.ramp.into(),
        ..NavSettings::default()
    };
    let navigator = Arc::new(Navigator::with_settings(config.mapper()?, store, link, settings));

    let targets: Vec<_> = config
        .agents
        .iter()
        .cloned()
        .zip(CORNER_TARGETS)
        .collect();

    info!("--- Starting navigation run ({} cubes) ---", targets.len());
    let results = navigator
        .move_all(targets, Duration::from_secs(args.timeout_s))
        .await;

    let mut failed = 0;
    for (agent, result) in &results {
        match result {
            Ok(arrival) => info!("{}: arrived in {:?}", agent, arrival.elapsed),
            Err(e) => {
                error!("{}: {}", agent, e);
                failed += 1;
            }
        }
    }
    info!(
        "--- Navigation run complete: {}/{} arrived ---",
        results.len() - failed,
        results.len()
    );

    if failed > 0 {
        std::process::exit(1);
    }
    Ok(())
}

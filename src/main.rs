use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cube_swarm_runtime::config::RuntimeConfig;
use cube_swarm_runtime::pose::AgentId;

/// Autonomous behavior loop for the cubes
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// JSON runtime config; built-in defaults when omitted
    #[arg(long)]
    config: Option<PathBuf>,

    /// Agent id to drive (repeatable); overrides the config's list
    #[arg(long = "agent")]
    agents: Vec<String>,

    /// Seed for the stressed behavior's turn choices
    #[arg(long)]
    seed: Option<u64>,

    /// Control tick in milliseconds
    #[arg(long)]
    tick_ms: Option<u64>,
}

impl Args {
    fn into_config(self) -> Result<RuntimeConfig, cube_swarm_runtime::config::ConfigError> {
        let mut config = match &self.config {
            Some(path) => RuntimeConfig::load(path)?,
            None => RuntimeConfig::default(),
        };
        if !self.agents.is_empty() {
            config.agents = self.agents.into_iter().map(AgentId::new).collect();
        }
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        if let Some(tick_ms) = self.tick_ms {
            config.tick_ms = tick_ms;
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() {
    // Setup logging (set RUST_LOG=info or debug)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .init();

    let config = match Args::parse().into_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Config error: {}", e);
            std::process::exit(2);
        }
    };

    if let Err(e) = cube_swarm_runtime::runtime::run(config).await {
        eprintln!("Runtime error: {}", e);
        std::process::exit(1);
    }
}

// Behavior and navigation kernel for a swarm of mat-tracked cubes

pub mod behavior;
pub mod config;
pub mod mapper;
pub mod messages;
pub mod motor;
pub mod navigation;
pub mod pose;
pub mod runtime;
pub mod telemetry;

//! # Aegis CLI
//!
//! Support code for the `aegis` binary: a seeded failure-storm simulator
//! that exercises the logger, widget handler and recovery orchestrator
//! together.

pub mod simulator;

pub use simulator::{run_simulator, SimulatorConfig, SimulatorReport};

//! Cell-grid urban traffic simulation
//!
//! A tick-based traffic simulation: autonomous vehicle agents and adaptive
//! traffic lights on a discretized road network. Runs headless; external
//! consumers only ever see immutable per-tick snapshots.

pub mod simulation;

//! Error taxonomy for the simulation core

use thiserror::Error;

use super::types::{CellCoord, LaneId, SpawnPointId};

/// A rejected simulation configuration
///
/// Raised from `Scheduler::reset` before any tick runs; the simulation
/// never starts with an invalid configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("grid dimensions must be positive, got {width}x{height}")]
    NonPositiveDimensions { width: i32, height: i32 },

    #[error("spawn rate for {0:?} must be within [0.0, 1.0], got {1}")]
    InvalidSpawnRate(SpawnPointId, f64),

    #[error("spawn point {0:?} sits on a building cell at {1:?}")]
    SpawnOnBuilding(SpawnPointId, CellCoord),

    #[error("spawn point {0:?} references unknown lane {1:?}")]
    SpawnLaneUnknown(SpawnPointId, LaneId),

    #[error("spawn point {0:?} has no vehicle profiles")]
    SpawnWithoutProfiles(SpawnPointId),

    #[error("spawn point {0:?} shares entry cell {1:?} with another spawn point")]
    DuplicateSpawnCell(SpawnPointId, CellCoord),

    #[error("cell {0:?} is outside the grid")]
    CellOutOfBounds(CellCoord),

    #[error("lane {0:?} is malformed: {1}")]
    MalformedLane(LaneId, String),

    #[error("intersection at {0:?} is malformed: {1}")]
    MalformedIntersection(CellCoord, String),

    #[error("light timing is invalid: {0}")]
    InvalidLightTiming(String),

    #[error("no destination cells configured")]
    NoDestinations,
}

/// Top-level simulation error taxonomy
#[derive(Debug, Error)]
pub enum SimError {
    /// Invalid configuration, rejected at reset
    #[error("configuration rejected: {0}")]
    Configuration(#[from] ConfigError),

    /// `advance()` called before any `reset()`
    #[error("simulation state is uninitialized; call reset() first")]
    Uninitialized,

    /// The occupancy invariant was broken; this indicates a bug in the
    /// collision guard and is unrecoverable.
    #[error("occupancy invariant violated: {0}")]
    InvariantViolation(String),
}

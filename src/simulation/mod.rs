//! Standalone traffic simulation core
//!
//! All simulation logic lives here and runs headless: a tick-based
//! scheduler over a cell grid, vehicle agents with collision avoidance,
//! and adaptive decentralized traffic lights. External consumers (maps,
//! bridges, dashboards) only ever read published snapshots.

mod collision;
mod config;
mod error;
mod grid;
mod light;
mod metrics;
mod scheduler;
mod snapshot;
mod spawn;
mod types;
mod vehicle;

pub use collision::{CollisionGuard, ResolvedMove};
pub use config::{
    BuildingRect, IntersectionConfig, LaneConfig, LightTiming, SimConfig, SpawnPointConfig,
    VehicleProfile,
};
pub use error::{ConfigError, SimError};
pub use grid::{Grid, Intersection, Lane, SpawnPoint};
pub use light::TrafficLightAgent;
pub use metrics::{MetricsCollector, TickMetrics};
pub use scheduler::Scheduler;
pub use snapshot::{LightSnapshot, Snapshot, SnapshotQuery, SnapshotStore, VehicleSnapshot};
pub use spawn::SpawnController;
pub use types::{
    Axis, CellCoord, CellState, Direction, IntersectionId, LaneId, LightId, Phase, SimId,
    SpawnPointId, VehicleId, HAPPINESS_MAX, MOVE_RECOVERY, SENSING_WINDOW, WAIT_PENALTY,
};
pub use vehicle::{IntentKind, MoveIntent, VehicleAgent};

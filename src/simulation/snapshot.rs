//! Immutable per-tick state snapshots and their retained history
//!
//! A snapshot is the only artifact the core exposes outward. Once
//! published it is never mutated; consumers get a frozen `Arc` copy and
//! can be arbitrarily slower than the tick rate without affecting the
//! simulation.

use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;

use super::types::{CellCoord, Direction, IntersectionId, LaneId, LightId, Phase, VehicleId};

/// Frozen view of one vehicle at a tick boundary
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VehicleSnapshot {
    pub id: VehicleId,
    pub cell: CellCoord,
    pub lane: LaneId,
    pub speed: u8,
    pub happiness: f32,
    pub wait_ticks: u32,
}

/// Frozen view of one traffic light at a tick boundary
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LightSnapshot {
    pub id: LightId,
    pub intersection: IntersectionId,
    /// Signal per approach direction
    pub approaches: Vec<(Direction, Phase)>,
    /// Ticks remaining before the active phase may end
    pub phase_remaining: u32,
}

/// Immutable, tick-stamped copy of the full simulation state
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub tick: u64,
    pub vehicles: Vec<VehicleSnapshot>,
    pub lights: Vec<LightSnapshot>,
    /// Vehicles spawned since reset
    pub spawned_total: u64,
    /// Vehicles that reached their destination or left the grid since reset
    pub exited_total: u64,
}

/// Result of a historical snapshot query
#[derive(Debug, Clone)]
pub enum SnapshotQuery {
    Found(Arc<Snapshot>),
    /// The requested tick is outside the retained history window (or the
    /// simulation has not produced it yet). Not an error.
    NotAvailable,
}

impl SnapshotQuery {
    pub fn found(self) -> Option<Arc<Snapshot>> {
        match self {
            SnapshotQuery::Found(snapshot) => Some(snapshot),
            SnapshotQuery::NotAvailable => None,
        }
    }
}

/// Bounded history of published snapshots
pub struct SnapshotStore {
    retention: usize,
    history: VecDeque<Arc<Snapshot>>,
}

impl SnapshotStore {
    pub fn new(retention: usize) -> Self {
        Self {
            retention: retention.max(1),
            history: VecDeque::new(),
        }
    }

    /// Publish a snapshot, evicting the oldest beyond the retention window
    pub fn publish(&mut self, snapshot: Snapshot) -> Arc<Snapshot> {
        let snapshot = Arc::new(snapshot);
        self.history.push_back(Arc::clone(&snapshot));
        while self.history.len() > self.retention {
            self.history.pop_front();
        }
        snapshot
    }

    pub fn latest(&self) -> Option<Arc<Snapshot>> {
        self.history.back().cloned()
    }

    pub fn at_tick(&self, tick: u64) -> SnapshotQuery {
        self.history
            .iter()
            .find(|snapshot| snapshot.tick == tick)
            .map(|snapshot| SnapshotQuery::Found(Arc::clone(snapshot)))
            .unwrap_or(SnapshotQuery::NotAvailable)
    }

    pub fn retention(&self) -> usize {
        self.retention
    }
}

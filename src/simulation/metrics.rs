//! Aggregate metrics derived from published snapshots
//!
//! Pure read-side: everything here is computed from immutable snapshots
//! and never touches the simulation's mutable state.

use serde::Serialize;
use std::io::Write;

use super::snapshot::Snapshot;

/// Per-tick aggregates for external analysis
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TickMetrics {
    pub tick: u64,
    pub active_vehicles: usize,
    pub mean_happiness: f32,
    pub mean_wait_ticks: f32,
    pub spawned_total: u64,
    pub exited_total: u64,
    /// Vehicles exited since the previous recorded tick
    pub throughput: u64,
}

/// Collects per-tick aggregates from the snapshot stream
#[derive(Default)]
pub struct MetricsCollector {
    last_exited: u64,
    rows: Vec<TickMetrics>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Derive and retain metrics for one snapshot
    pub fn record(&mut self, snapshot: &Snapshot) -> TickMetrics {
        let count = snapshot.vehicles.len();
        let (mean_happiness, mean_wait_ticks) = if count > 0 {
            let happiness: f32 = snapshot.vehicles.iter().map(|v| v.happiness).sum();
            let wait: f32 = snapshot.vehicles.iter().map(|v| v.wait_ticks as f32).sum();
            (happiness / count as f32, wait / count as f32)
        } else {
            (0.0, 0.0)
        };

        let row = TickMetrics {
            tick: snapshot.tick,
            active_vehicles: count,
            mean_happiness,
            mean_wait_ticks,
            spawned_total: snapshot.spawned_total,
            exited_total: snapshot.exited_total,
            throughput: snapshot.exited_total - self.last_exited,
        };
        self.last_exited = snapshot.exited_total;
        self.rows.push(row.clone());
        row
    }

    pub fn rows(&self) -> &[TickMetrics] {
        &self.rows
    }

    /// Write all recorded rows as CSV
    pub fn write_csv<W: Write>(&self, writer: W) -> csv::Result<()> {
        let mut csv_writer = csv::Writer::from_writer(writer);
        for row in &self.rows {
            csv_writer.serialize(row)?;
        }
        csv_writer.flush()?;
        Ok(())
    }
}

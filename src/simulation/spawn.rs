//! Spawn controller: stochastic vehicle arrivals at configured entry points
//!
//! One Bernoulli draw per spawn point per tick, always in spawn-point-id
//! order, so the shared RNG stream is consumed identically across runs
//! with the same seed. A failed attempt (entry cell occupied) is dropped,
//! never queued.

use log::{debug, warn};
use rand::rngs::StdRng;
use rand::Rng;

use super::grid::{Grid, SpawnPoint};
use super::types::{CellCoord, SimId, VehicleId};
use super::vehicle::VehicleAgent;

/// Generates new vehicle agents from the grid's spawn points
pub struct SpawnController {
    /// Total spawns emitted per spawn point, for limit enforcement
    spawned_counts: Vec<u32>,
}

impl SpawnController {
    pub fn new(spawn_point_count: usize) -> Self {
        Self {
            spawned_counts: vec![0; spawn_point_count],
        }
    }

    /// Run one spawn pass over every spawn point in id order. Returns the
    /// new agents; their entry cells are committed by the scheduler, not
    /// here.
    pub fn run_tick(
        &mut self,
        grid: &Grid,
        rng: &mut StdRng,
        next_id: &mut usize,
        tick: u64,
    ) -> Vec<VehicleAgent> {
        let mut spawned = Vec::new();
        for spawn_point in grid.spawn_points() {
            if let Some(vehicle) = self.try_spawn(grid, spawn_point, rng, next_id, tick) {
                spawned.push(vehicle);
            }
        }
        spawned
    }

    /// One spawn attempt at a single point. The arrival draw happens every
    /// tick regardless of outcome, keeping the RNG stream aligned across
    /// configurations; profile and destination draws only consume the
    /// stream on a successful attempt.
    pub fn try_spawn(
        &mut self,
        grid: &Grid,
        spawn_point: &SpawnPoint,
        rng: &mut StdRng,
        next_id: &mut usize,
        tick: u64,
    ) -> Option<VehicleAgent> {
        let arrival = rng.random::<f64>() < spawn_point.rate;
        if !arrival {
            return None;
        }

        if let Some(limit) = spawn_point.limit {
            if self.spawned_counts[spawn_point.id.0] >= limit {
                return None;
            }
        }

        // Transient failure: entry occupied. Dropped, never queued.
        if !grid.is_free(spawn_point.cell) {
            debug!(
                "spawn {:?} dropped: entry cell {:?} occupied",
                spawn_point.id, spawn_point.cell
            );
            return None;
        }

        let profile = spawn_point.profiles[rng.random_range(0..spawn_point.profiles.len())];
        let speed = rng.random_range(profile.min_speed..=profile.max_speed);

        let candidates: Vec<CellCoord> = grid
            .destinations()
            .iter()
            .copied()
            .filter(|destination| *destination != spawn_point.cell)
            .collect();
        if candidates.is_empty() {
            warn!("spawn {:?} has no reachable destinations", spawn_point.id);
            return None;
        }
        let destination = candidates[rng.random_range(0..candidates.len())];

        let Some(route) = grid.find_route(spawn_point.cell, destination) else {
            warn!(
                "spawn {:?} dropped: no route from {:?} to {:?}",
                spawn_point.id, spawn_point.cell, destination
            );
            return None;
        };

        let id = VehicleId(SimId(*next_id));
        *next_id += 1;
        self.spawned_counts[spawn_point.id.0] += 1;

        debug!(
            "tick {}: spawned vehicle {:?} at {:?} -> {:?} (speed {})",
            tick, id, spawn_point.cell, destination, speed
        );
        Some(VehicleAgent::new(
            id,
            spawn_point.cell,
            spawn_point.lane,
            speed,
            destination,
            route,
            tick,
        ))
    }
}

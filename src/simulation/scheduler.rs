//! Tick scheduler: the only place global state mutates
//!
//! Advances simulation time in discrete ticks with a fixed activation
//! order: spawn, vehicle move intents (computed against the previous
//! tick's committed state), conflict resolution, light phase advancement
//! and negotiation, then a single commit followed by snapshot
//! publication. All agent computation is read-only against the committed
//! state; the commit here is the one serialization point per tick.

use log::debug;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use super::collision::CollisionGuard;
use super::error::SimError;
use super::config::SimConfig;
use super::grid::Grid;
use super::light::TrafficLightAgent;
use super::snapshot::{LightSnapshot, Snapshot, SnapshotQuery, SnapshotStore, VehicleSnapshot};
use super::spawn::SpawnController;
use super::types::{CellCoord, Direction, LightId, VehicleId};
use super::vehicle::{IntentKind, VehicleAgent};

/// Everything that exists between reset and the end of the run
struct SimState {
    grid: Grid,
    /// Agent arena keyed by stable id; BTreeMap so every per-tick
    /// iteration is in deterministic id order.
    vehicles: BTreeMap<VehicleId, VehicleAgent>,
    lights: BTreeMap<LightId, TrafficLightAgent>,
    /// Queue-length reports broadcast last tick, keyed by recipient;
    /// consumed at the start of this tick's light pass.
    inboxes: BTreeMap<LightId, Vec<u32>>,
    rng: StdRng,
    spawner: SpawnController,
    store: SnapshotStore,
    tick: u64,
    next_id: usize,
    spawned_total: u64,
    exited_total: u64,
}

/// The simulation scheduler and snapshot publisher
#[derive(Default)]
pub struct Scheduler {
    state: Option<SimState>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self { state: None }
    }

    /// Reinitialize the whole simulation deterministically from a seed.
    /// Rejects invalid configurations before any tick runs and publishes
    /// the tick-0 snapshot.
    pub fn reset(&mut self, config: &SimConfig, seed: u64) -> Result<Arc<Snapshot>, SimError> {
        let grid = Grid::build(config)?;

        let mut lights = BTreeMap::new();
        for intersection in grid.intersections() {
            let approaches: Vec<Direction> =
                intersection.approaches.iter().map(|&(d, _)| d).collect();
            let light = TrafficLightAgent::new(
                intersection.light,
                intersection.id,
                &approaches,
                intersection.neighbors.clone(),
                config.timing,
            );
            lights.insert(light.id, light);
        }

        let spawner = SpawnController::new(grid.spawn_points().len());
        let mut state = SimState {
            grid,
            vehicles: BTreeMap::new(),
            lights,
            inboxes: BTreeMap::new(),
            rng: StdRng::seed_from_u64(seed),
            spawner,
            store: SnapshotStore::new(config.snapshot_retention),
            tick: 0,
            next_id: 0,
            spawned_total: 0,
            exited_total: 0,
        };

        let snapshot = Self::build_snapshot(&state);
        let published = state.store.publish(snapshot);
        self.state = Some(state);
        debug!("scheduler reset with seed {}", seed);
        Ok(published)
    }

    /// Advance simulation time by one tick and publish the new snapshot
    pub fn advance(&mut self) -> Result<Arc<Snapshot>, SimError> {
        let state = self.state.as_mut().ok_or(SimError::Uninitialized)?;
        let tick = state.tick + 1;

        // 1. Spawn: new agents hold their entry cells for this tick.
        let spawned =
            state
                .spawner
                .run_tick(&state.grid, &mut state.rng, &mut state.next_id, tick);
        let reserved: BTreeSet<CellCoord> = spawned.iter().map(|v| v.cell).collect();

        // 2. Move intents, all computed against the committed state of the
        // previous tick; no agent sees another's decision for this tick.
        let mut intents = Vec::with_capacity(state.vehicles.len());
        for vehicle in state.vehicles.values_mut() {
            intents.push(vehicle.plan_move(&state.grid, &state.lights));
        }

        // 3. Conflict resolution over the full proposal set.
        let moves = CollisionGuard::resolve(intents, &reserved, &state.grid)?;

        // 4. Lights: sense committed queues, consume last tick's neighbor
        // reports, advance phase machines, broadcast for next tick.
        let mut outboxes: BTreeMap<LightId, Vec<u32>> = BTreeMap::new();
        for light in state.lights.values_mut() {
            let intersection = state.grid.intersection(light.intersection);
            let sensed: Vec<(Direction, u32)> = intersection
                .approaches
                .iter()
                .map(|&(direction, lane)| (direction, state.grid.queue_length(lane)))
                .collect();
            let reports = state.inboxes.remove(&light.id).unwrap_or_default();
            light.step(sensed, &reports);

            let report = light.busiest_queue();
            for &neighbor in &light.neighbors {
                outboxes.entry(neighbor).or_default().push(report);
            }
        }
        state.inboxes = outboxes;

        // 5. Commit: the single point where shared state mutates.
        for resolved in moves {
            let vehicle = state
                .vehicles
                .get_mut(&resolved.vehicle)
                .expect("resolved move for unknown vehicle");
            match resolved.kind {
                IntentKind::Hold => vehicle.apply_hold(),
                IntentKind::Advance => {
                    state.grid.vacate(resolved.from);
                    state.grid.occupy(resolved.target, resolved.vehicle)?;
                    vehicle.apply_advance(&state.grid, resolved.target);
                }
                IntentKind::LaneChange => {
                    state.grid.vacate(resolved.from);
                    state.grid.occupy(resolved.target, resolved.vehicle)?;
                    vehicle.apply_lane_change(&state.grid, resolved.target);
                }
            }
        }

        // Remove arrivals and boundary exits.
        let done: Vec<VehicleId> = state
            .vehicles
            .values()
            .filter(|vehicle| vehicle.is_done(&state.grid))
            .map(|vehicle| vehicle.id)
            .collect();
        for id in done {
            if let Some(vehicle) = state.vehicles.remove(&id) {
                state.grid.vacate(vehicle.cell);
                state.exited_total += 1;
                debug!(
                    "tick {}: vehicle {:?} exited at {:?} (happiness {:.1})",
                    tick, id, vehicle.cell, vehicle.happiness
                );
            }
        }

        // Insert this tick's spawns.
        for vehicle in spawned {
            state.grid.occupy(vehicle.cell, vehicle.id)?;
            state.spawned_total += 1;
            state.vehicles.insert(vehicle.id, vehicle);
        }

        state.tick = tick;
        let snapshot = Self::build_snapshot(state);
        Ok(state.store.publish(snapshot))
    }

    fn build_snapshot(state: &SimState) -> Snapshot {
        let vehicles = state
            .vehicles
            .values()
            .map(|vehicle| VehicleSnapshot {
                id: vehicle.id,
                cell: vehicle.cell,
                lane: vehicle.lane,
                speed: vehicle.speed,
                happiness: vehicle.happiness,
                wait_ticks: vehicle.wait_ticks,
            })
            .collect();

        let lights = state
            .lights
            .values()
            .map(|light| LightSnapshot {
                id: light.id,
                intersection: light.intersection,
                approaches: light
                    .queues
                    .iter()
                    .map(|&(direction, _)| (direction, light.phase_for(direction)))
                    .collect(),
                phase_remaining: light.phase_remaining(),
            })
            .collect();

        Snapshot {
            tick: state.tick,
            vehicles,
            lights,
            spawned_total: state.spawned_total,
            exited_total: state.exited_total,
        }
    }

    /// Current tick, if initialized
    pub fn tick(&self) -> Option<u64> {
        self.state.as_ref().map(|state| state.tick)
    }

    /// The most recently published snapshot
    pub fn latest_snapshot(&self) -> Option<Arc<Snapshot>> {
        self.state.as_ref().and_then(|state| state.store.latest())
    }

    /// A historical snapshot by tick number; `NotAvailable` when the tick
    /// has fallen out of the retained window or was never produced.
    pub fn snapshot_at(&self, tick: u64) -> SnapshotQuery {
        match &self.state {
            Some(state) => state.store.at_tick(tick),
            None => SnapshotQuery::NotAvailable,
        }
    }

    /// Read access to the static grid (None before the first reset)
    pub fn grid(&self) -> Option<&Grid> {
        self.state.as_ref().map(|state| &state.grid)
    }

    pub fn vehicle_count(&self) -> usize {
        self.state
            .as_ref()
            .map(|state| state.vehicles.len())
            .unwrap_or(0)
    }

    /// Print a summary of the current state
    pub fn print_summary(&self) {
        let Some(state) = &self.state else {
            println!("(uninitialized)");
            return;
        };

        println!("=== Traffic Grid Summary ===");
        println!("Tick: {}", state.tick);
        println!(
            "Vehicles: {} active, {} spawned, {} exited",
            state.vehicles.len(),
            state.spawned_total,
            state.exited_total
        );

        if !state.lights.is_empty() {
            println!("--- Lights ---");
            for light in state.lights.values() {
                let queues: Vec<String> = light
                    .queues
                    .iter()
                    .map(|(direction, queue)| format!("{:?}={}", direction, queue))
                    .collect();
                println!(
                    "  Light {:?}: {:?} {:?} for {} more ticks, queues [{}]",
                    light.id,
                    light.phase,
                    light.active_axis,
                    light.phase_remaining(),
                    queues.join(", ")
                );
            }
        }

        if !state.vehicles.is_empty() {
            println!("--- Vehicles ---");
            for vehicle in state.vehicles.values() {
                println!(
                    "  Vehicle {:?}: at {:?}, speed {}, wait {}, happiness {:.1}",
                    vehicle.id, vehicle.cell, vehicle.speed, vehicle.wait_ticks, vehicle.happiness
                );
            }
        }
    }

    /// Draw the grid in the terminal: buildings, lanes, lights, vehicles
    pub fn draw_map(&self) {
        let Some(state) = &self.state else {
            return;
        };
        let grid = &state.grid;

        let mut rows: Vec<Vec<char>> =
            vec![vec![' '; grid.width() as usize]; grid.height() as usize];

        for y in 0..grid.height() {
            for x in 0..grid.width() {
                let cell = CellCoord::new(x, y);
                rows[y as usize][x as usize] = match state.grid.state(cell) {
                    super::types::CellState::Building => '#',
                    super::types::CellState::Occupied(_) => 'C',
                    super::types::CellState::Empty => {
                        if grid.lane_at(cell).is_some() {
                            '.'
                        } else {
                            ' '
                        }
                    }
                };
            }
        }

        for intersection in grid.intersections() {
            if let Some(light) = state.lights.get(&intersection.light) {
                let cell = intersection.cell;
                if state.grid.vehicle_at(cell).is_none() {
                    rows[cell.y as usize][cell.x as usize] = match light.phase {
                        super::types::Phase::Green => 'G',
                        super::types::Phase::Yellow => 'Y',
                        super::types::Phase::Red => 'R',
                    };
                }
            }
        }

        for spawn_point in grid.spawn_points() {
            let cell = spawn_point.cell;
            if rows[cell.y as usize][cell.x as usize] == '.' {
                rows[cell.y as usize][cell.x as usize] = 'S';
            }
        }

        println!("=== Map (tick {}) ===", state.tick);
        println!("Legend: #=building, .=lane, S=spawn, C=vehicle, G/Y=light phase");
        for row in &rows {
            let line: String = row.iter().collect();
            println!("{}", line);
        }
        println!();
    }
}

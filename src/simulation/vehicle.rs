//! Vehicle agent behavior: routing, speed, lane changes, happiness
//!
//! Each tick every vehicle computes a move intent against the committed
//! state of the previous tick. Nothing here mutates shared state; the
//! scheduler applies the resolved intents at commit.

use log::debug;
use std::collections::{BTreeMap, VecDeque};

use super::grid::Grid;
use super::light::TrafficLightAgent;
use super::types::{
    CellCoord, LaneId, LightId, Phase, VehicleId, HAPPINESS_MAX, MOVE_RECOVERY, WAIT_PENALTY,
};

/// What a vehicle proposes to do this tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntentKind {
    /// Stay on the current cell
    Hold,
    /// Advance along the route to `target`
    Advance,
    /// Lateral move into an adjacent lane
    LaneChange,
}

/// A single vehicle's proposed move for one tick
#[derive(Debug, Clone, Copy)]
pub struct MoveIntent {
    pub vehicle: VehicleId,
    pub from: CellCoord,
    pub target: CellCoord,
    pub kind: IntentKind,
    /// Accumulated wait at intent time, used by the collision guard's
    /// fairness tie-break.
    pub wait_ticks: u32,
}

/// An autonomous vehicle on the grid
#[derive(Debug, Clone)]
pub struct VehicleAgent {
    pub id: VehicleId,
    pub cell: CellCoord,
    pub lane: LaneId,
    /// Speed tier: maximum cells advanced per tick
    pub speed: u8,
    pub destination: CellCoord,
    /// Remaining route, front = next cell; recomputed lazily when empty
    /// or invalidated by a lane change.
    pub route: VecDeque<CellCoord>,
    pub wait_ticks: u32,
    pub happiness: f32,
    /// Tick at which the vehicle entered the grid
    pub spawned_tick: u64,
    /// Set when no route to the destination exists, to avoid re-running
    /// the search every tick; cleared when the vehicle changes lanes.
    unroutable: bool,
}

impl VehicleAgent {
    pub fn new(
        id: VehicleId,
        cell: CellCoord,
        lane: LaneId,
        speed: u8,
        destination: CellCoord,
        route: Vec<CellCoord>,
        spawned_tick: u64,
    ) -> Self {
        Self {
            id,
            cell,
            lane,
            speed,
            destination,
            route: route.into(),
            wait_ticks: 0,
            happiness: HAPPINESS_MAX,
            spawned_tick,
            unroutable: false,
        }
    }

    /// Recompute the route if it has been invalidated
    fn ensure_route(&mut self, grid: &Grid) {
        if !self.route.is_empty() || self.cell == self.destination || self.unroutable {
            return;
        }
        match grid.find_route(self.cell, self.destination) {
            Some(route) => self.route = route.into(),
            None => {
                debug!(
                    "vehicle {:?} has no route from {:?} to {:?}",
                    self.id, self.cell, self.destination
                );
                self.unroutable = true;
            }
        }
    }

    /// Whether a step into `next` is gated by a traffic light, and if so
    /// whether that light shows Green for our approach. Yellow and Red
    /// both block entry.
    fn gate_permits(
        &self,
        grid: &Grid,
        lights: &BTreeMap<LightId, TrafficLightAgent>,
        from: CellCoord,
        next: CellCoord,
    ) -> bool {
        let Some(intersection_id) = grid.intersection_at(next) else {
            return true;
        };
        let Some(approach) = from.direction_to(&next) else {
            return false;
        };
        let light_id = grid.intersection(intersection_id).light;
        match lights.get(&light_id) {
            Some(light) => light.phase_for(approach) == Phase::Green,
            // An intersection without a light is uncontrolled
            None => true,
        }
    }

    /// Whether stepping from `from` to `next` leaves the lane sideways.
    /// Lateral steps move a vehicle between adjacent lanes and are never
    /// combined with forward motion in the same tick.
    fn is_lateral_step(&self, grid: &Grid, from: CellCoord, next: CellCoord) -> bool {
        let Some(lane_id) = grid.lane_at(from) else {
            return false;
        };
        let lane_axis = grid.lane(lane_id).direction.axis();
        match from.direction_to(&next) {
            Some(step) => step.axis() != lane_axis,
            None => false,
        }
    }

    /// Probe adjacent lanes for a lateral move that strictly shortens the
    /// remaining route. Only consulted when the forward cell is blocked by
    /// another vehicle.
    fn lane_change_candidate(&self, grid: &Grid) -> Option<CellCoord> {
        let lane = grid.lane(self.lane);
        if lane.adjacent.is_empty() {
            return None;
        }
        let current_cost = grid.route_cost(self.cell, self.destination)?;

        let mut best: Option<(u32, CellCoord)> = None;
        for lateral in lane.direction.laterals() {
            let candidate = self.cell.step(lateral);
            let Some(candidate_lane) = grid.lane_at(candidate) else {
                continue;
            };
            if !lane.adjacent.contains(&candidate_lane) || !grid.is_free(candidate) {
                continue;
            }
            let Some(candidate_cost) = grid.route_cost(candidate, self.destination) else {
                continue;
            };
            // Strict improvement over routing from where we stand
            if candidate_cost + 1 < current_cost
                && best.map(|(cost, _)| candidate_cost < cost).unwrap_or(true)
            {
                best = Some((candidate_cost, candidate));
            }
        }
        best.map(|(_, cell)| cell)
    }

    /// Compute this tick's move intent against the committed state.
    /// May lazily recompute the vehicle's own route; shared state is
    /// strictly read-only here.
    pub fn plan_move(
        &mut self,
        grid: &Grid,
        lights: &BTreeMap<LightId, TrafficLightAgent>,
    ) -> MoveIntent {
        self.ensure_route(grid);

        let mut reached = self.cell;
        let mut steps = 0usize;
        let mut blocked_by_vehicle = false;

        while steps < self.speed as usize {
            let Some(&next) = self.route.get(steps) else {
                break;
            };
            // A routed lateral step ends the free run; it is taken on its
            // own below, never folded into forward motion.
            if self.is_lateral_step(grid, reached, next) {
                break;
            }
            if !grid.is_free(next) {
                blocked_by_vehicle = grid.vehicle_at(next).is_some();
                break;
            }
            if !self.gate_permits(grid, lights, reached, next) {
                break;
            }
            reached = next;
            steps += 1;
            if reached == self.destination {
                break;
            }
        }

        if steps > 0 {
            return MoveIntent {
                vehicle: self.id,
                from: self.cell,
                target: reached,
                kind: IntentKind::Advance,
                wait_ticks: self.wait_ticks,
            };
        }

        // The route itself starts with a lateral step: a pure lane change
        if let Some(&next) = self.route.front() {
            if self.is_lateral_step(grid, self.cell, next) && grid.is_free(next) {
                return MoveIntent {
                    vehicle: self.id,
                    from: self.cell,
                    target: next,
                    kind: IntentKind::LaneChange,
                    wait_ticks: self.wait_ticks,
                };
            }
        }

        // Forward progress blocked by traffic: consider a lane change
        if blocked_by_vehicle {
            if let Some(candidate) = self.lane_change_candidate(grid) {
                return MoveIntent {
                    vehicle: self.id,
                    from: self.cell,
                    target: candidate,
                    kind: IntentKind::LaneChange,
                    wait_ticks: self.wait_ticks,
                };
            }
        }

        MoveIntent {
            vehicle: self.id,
            from: self.cell,
            target: self.cell,
            kind: IntentKind::Hold,
            wait_ticks: self.wait_ticks,
        }
    }

    /// Commit an advance along the route to `target`
    pub(crate) fn apply_advance(&mut self, grid: &Grid, target: CellCoord) {
        while let Some(cell) = self.route.pop_front() {
            if cell == target {
                break;
            }
        }
        self.cell = target;
        if let Some(lane) = grid.lane_at(target) {
            self.lane = lane;
        }
        self.recover();
    }

    /// Commit a lateral move; the stale route is dropped and recomputed
    /// lazily on the next planning pass.
    pub(crate) fn apply_lane_change(&mut self, grid: &Grid, target: CellCoord) {
        self.route.clear();
        self.unroutable = false;
        self.cell = target;
        if let Some(lane) = grid.lane_at(target) {
            self.lane = lane;
        }
        self.recover();
    }

    /// Commit a held tick: accumulate wait and decay happiness
    pub(crate) fn apply_hold(&mut self) {
        self.wait_ticks += 1;
        self.happiness = (self.happiness - WAIT_PENALTY).max(0.0);
    }

    fn recover(&mut self) {
        self.happiness = (self.happiness + MOVE_RECOVERY).min(HAPPINESS_MAX);
    }

    /// A vehicle is done when it stands on its destination cell or has
    /// run off the routed network at a boundary dead end.
    pub fn is_done(&self, grid: &Grid) -> bool {
        self.cell == self.destination || (self.route.is_empty() && !grid.has_successor(self.cell))
    }
}

//! Static road-network topology and committed occupancy
//!
//! The Grid owns the cell table (the single shared mutable resource,
//! written only by the scheduler's commit step), the lane and intersection
//! tables, and a petgraph route graph over drivable cells used for
//! shortest-path routing.

use log::debug;
use petgraph::algo::astar;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::HashMap;

use super::config::{SimConfig, SpawnPointConfig, VehicleProfile};
use super::error::{ConfigError, SimError};
use super::types::{
    CellCoord, CellState, Direction, IntersectionId, LaneId, LightId, SpawnPointId, VehicleId,
    SENSING_WINDOW,
};

/// Cost of a forward step in the route graph; lateral lane changes cost
/// more so routes prefer staying in lane.
const FORWARD_COST: u32 = 1;
const LANE_CHANGE_COST: u32 = 2;

/// An ordered run of cells with one direction of travel
#[derive(Debug, Clone)]
pub struct Lane {
    pub id: LaneId,
    pub cells: Vec<CellCoord>,
    pub direction: Direction,
    pub adjacent: Vec<LaneId>,
}

/// A single-cell intersection controlled by one traffic light
#[derive(Debug, Clone)]
pub struct Intersection {
    pub id: IntersectionId,
    pub cell: CellCoord,
    pub light: LightId,
    pub approaches: Vec<(Direction, LaneId)>,
    pub exits: Vec<(Direction, LaneId)>,
    pub neighbors: Vec<LightId>,
}

/// A configured vehicle entry point (stateless besides its configuration)
#[derive(Debug, Clone)]
pub struct SpawnPoint {
    pub id: SpawnPointId,
    pub cell: CellCoord,
    pub lane: LaneId,
    pub rate: f64,
    pub profiles: Vec<VehicleProfile>,
    pub limit: Option<u32>,
}

impl SpawnPoint {
    fn from_config(id: SpawnPointId, config: &SpawnPointConfig) -> Self {
        Self {
            id,
            cell: config.cell,
            lane: config.lane,
            rate: config.rate,
            profiles: config.profiles.clone(),
            limit: config.limit,
        }
    }
}

/// The static road network plus the committed occupancy table
pub struct Grid {
    width: i32,
    height: i32,
    cells: Vec<CellState>,
    lanes: Vec<Lane>,
    intersections: Vec<Intersection>,
    spawn_points: Vec<SpawnPoint>,
    destinations: Vec<CellCoord>,
    lane_of_cell: HashMap<CellCoord, LaneId>,
    intersection_of_cell: HashMap<CellCoord, IntersectionId>,
    route_graph: DiGraph<CellCoord, u32>,
    cell_to_node: HashMap<CellCoord, NodeIndex>,
}

impl Grid {
    /// Build a grid from a validated configuration
    pub fn build(config: &SimConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let cell_count = (config.width * config.height) as usize;
        let mut cells = vec![CellState::Empty; cell_count];
        for building in &config.buildings {
            for y in building.min.y..=building.max.y {
                for x in building.min.x..=building.max.x {
                    cells[(y * config.width + x) as usize] = CellState::Building;
                }
            }
        }

        let mut grid = Self {
            width: config.width,
            height: config.height,
            cells,
            lanes: Vec::with_capacity(config.lanes.len()),
            intersections: Vec::with_capacity(config.intersections.len()),
            spawn_points: config
                .spawn_points
                .iter()
                .enumerate()
                .map(|(index, spawn)| SpawnPoint::from_config(SpawnPointId(index), spawn))
                .collect(),
            destinations: config.destinations.clone(),
            lane_of_cell: HashMap::new(),
            intersection_of_cell: HashMap::new(),
            route_graph: DiGraph::new(),
            cell_to_node: HashMap::new(),
        };

        for (index, intersection) in config.intersections.iter().enumerate() {
            let id = IntersectionId(index);
            if grid
                .intersection_of_cell
                .insert(intersection.cell, id)
                .is_some()
            {
                return Err(ConfigError::MalformedIntersection(
                    intersection.cell,
                    "two intersections share a cell".into(),
                ));
            }
            grid.intersections.push(Intersection {
                id,
                cell: intersection.cell,
                light: LightId(super::types::SimId(index)),
                approaches: intersection.approaches.clone(),
                exits: intersection.exits.clone(),
                neighbors: intersection
                    .neighbors
                    .iter()
                    .map(|n| LightId(super::types::SimId(n.0)))
                    .collect(),
            });
        }

        for (index, lane) in config.lanes.iter().enumerate() {
            let id = LaneId(index);
            for &cell in &lane.cells {
                if grid.intersection_of_cell.contains_key(&cell)
                    || grid.lane_of_cell.insert(cell, id).is_some()
                {
                    return Err(ConfigError::MalformedLane(
                        id,
                        format!("cell {:?} already belongs to another lane or intersection", cell),
                    ));
                }
            }
            grid.lanes.push(Lane {
                id,
                cells: lane.cells.clone(),
                direction: lane.direction,
                adjacent: lane.adjacent.clone(),
            });
        }

        grid.build_route_graph();
        debug!(
            "grid built: {}x{}, {} lanes, {} intersections, {} spawn points",
            grid.width,
            grid.height,
            grid.lanes.len(),
            grid.intersections.len(),
            grid.spawn_points.len()
        );
        Ok(grid)
    }

    /// Wire up the directed route graph: consecutive lane cells, approach
    /// lanes into intersection cells, intersection cells into exit lanes,
    /// and lateral edges between configured adjacent lanes.
    fn build_route_graph(&mut self) {
        let mut drivable: Vec<CellCoord> = Vec::new();
        for lane in &self.lanes {
            drivable.extend(lane.cells.iter().copied());
        }
        drivable.extend(self.intersections.iter().map(|i| i.cell));

        for cell in drivable {
            let node = self.route_graph.add_node(cell);
            self.cell_to_node.insert(cell, node);
        }

        let mut edges: Vec<(CellCoord, CellCoord, u32)> = Vec::new();

        for lane in &self.lanes {
            for window in lane.cells.windows(2) {
                edges.push((window[0], window[1], FORWARD_COST));
            }
            // Lateral lane-change edges to adjacent lanes
            for &cell in &lane.cells {
                for lateral in lane.direction.laterals() {
                    let candidate = cell.step(lateral);
                    if let Some(&candidate_lane) = self.lane_of_cell.get(&candidate) {
                        if lane.adjacent.contains(&candidate_lane) {
                            edges.push((cell, candidate, LANE_CHANGE_COST));
                        }
                    }
                }
            }
        }

        for intersection in &self.intersections {
            for &(_, lane_id) in &intersection.approaches {
                let last = *self.lanes[lane_id.0].cells.last().expect("lanes are non-empty");
                edges.push((last, intersection.cell, FORWARD_COST));
            }
            for &(_, lane_id) in &intersection.exits {
                let first = *self.lanes[lane_id.0].cells.first().expect("lanes are non-empty");
                edges.push((intersection.cell, first, FORWARD_COST));
            }
        }

        for (from, to, weight) in edges {
            let from_node = self.cell_to_node[&from];
            let to_node = self.cell_to_node[&to];
            self.route_graph.add_edge(from_node, to_node, weight);
        }
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn in_bounds(&self, cell: CellCoord) -> bool {
        cell.x >= 0 && cell.x < self.width && cell.y >= 0 && cell.y < self.height
    }

    fn index(&self, cell: CellCoord) -> usize {
        (cell.y * self.width + cell.x) as usize
    }

    /// Committed occupancy state of a cell; out-of-bounds reads as Building
    /// so boundary cells are uniformly non-drivable.
    pub fn state(&self, cell: CellCoord) -> CellState {
        if !self.in_bounds(cell) {
            return CellState::Building;
        }
        self.cells[self.index(cell)]
    }

    pub fn is_free(&self, cell: CellCoord) -> bool {
        self.state(cell) == CellState::Empty
    }

    pub fn is_building(&self, cell: CellCoord) -> bool {
        self.state(cell) == CellState::Building
    }

    pub fn vehicle_at(&self, cell: CellCoord) -> Option<VehicleId> {
        match self.state(cell) {
            CellState::Occupied(id) => Some(id),
            _ => None,
        }
    }

    /// Mark a cell occupied. The caller (scheduler commit) is responsible
    /// for only writing cells the collision guard assigned.
    pub(crate) fn occupy(&mut self, cell: CellCoord, vehicle: VehicleId) -> Result<(), SimError> {
        let index = self.index(cell);
        match self.cells[index] {
            CellState::Empty => {
                self.cells[index] = CellState::Occupied(vehicle);
                Ok(())
            }
            CellState::Occupied(other) => Err(SimError::InvariantViolation(format!(
                "cell {:?} assigned to {:?} while occupied by {:?}",
                cell, vehicle, other
            ))),
            CellState::Building => Err(SimError::InvariantViolation(format!(
                "cell {:?} assigned to {:?} but is a building",
                cell, vehicle
            ))),
        }
    }

    pub(crate) fn vacate(&mut self, cell: CellCoord) {
        let index = self.index(cell);
        if let CellState::Occupied(_) = self.cells[index] {
            self.cells[index] = CellState::Empty;
        }
    }

    pub fn lanes(&self) -> &[Lane] {
        &self.lanes
    }

    pub fn lane(&self, id: LaneId) -> &Lane {
        &self.lanes[id.0]
    }

    pub fn intersections(&self) -> &[Intersection] {
        &self.intersections
    }

    pub fn intersection(&self, id: IntersectionId) -> &Intersection {
        &self.intersections[id.0]
    }

    pub fn spawn_points(&self) -> &[SpawnPoint] {
        &self.spawn_points
    }

    pub fn destinations(&self) -> &[CellCoord] {
        &self.destinations
    }

    pub fn lane_at(&self, cell: CellCoord) -> Option<LaneId> {
        self.lane_of_cell.get(&cell).copied()
    }

    pub fn intersection_at(&self, cell: CellCoord) -> Option<IntersectionId> {
        self.intersection_of_cell.get(&cell).copied()
    }

    /// Whether any route continues from this cell; a vehicle at a dead-end
    /// boundary cell has left the network and is removed.
    pub fn has_successor(&self, cell: CellCoord) -> bool {
        self.cell_to_node
            .get(&cell)
            .map(|node| self.route_graph.edges(*node).next().is_some())
            .unwrap_or(false)
    }

    /// Shortest route between two drivable cells, excluding `from` itself.
    /// A* over the route graph with a Manhattan-distance heuristic.
    pub fn find_route(&self, from: CellCoord, to: CellCoord) -> Option<Vec<CellCoord>> {
        if from == to {
            return Some(Vec::new());
        }
        let start = *self.cell_to_node.get(&from)?;
        let goal = *self.cell_to_node.get(&to)?;

        let (_, node_path) = astar(
            &self.route_graph,
            start,
            |node| node == goal,
            |edge| *edge.weight(),
            |node| self.route_graph[node].manhattan(&to),
        )?;

        Some(
            node_path
                .into_iter()
                .skip(1)
                .map(|node| self.route_graph[node])
                .collect(),
        )
    }

    /// Total cost of the shortest route between two cells
    pub fn route_cost(&self, from: CellCoord, to: CellCoord) -> Option<u32> {
        if from == to {
            return Some(0);
        }
        let start = *self.cell_to_node.get(&from)?;
        let goal = *self.cell_to_node.get(&to)?;

        astar(
            &self.route_graph,
            start,
            |node| node == goal,
            |edge| *edge.weight(),
            |node| self.route_graph[node].manhattan(&to),
        )
        .map(|(cost, _)| cost)
    }

    /// Sensed queue length for one approach lane: occupied cells within
    /// the sensing window at the downstream end of the lane.
    pub fn queue_length(&self, lane_id: LaneId) -> u32 {
        let lane = &self.lanes[lane_id.0];
        lane.cells
            .iter()
            .rev()
            .take(SENSING_WINDOW)
            .filter(|&&cell| matches!(self.state(cell), CellState::Occupied(_)))
            .count() as u32
    }
}

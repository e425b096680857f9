//! Simulation configuration and scenario builders
//!
//! All control/config intake happens here: grid dimensions, lanes,
//! intersections, spawn points, light timing. Invalid values are rejected
//! by `validate()` before any tick runs.

use super::error::ConfigError;
use super::types::{CellCoord, Direction, IntersectionId, LaneId, SpawnPointId};

/// An axis-aligned block of permanently blocked cells (inclusive bounds)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildingRect {
    pub min: CellCoord,
    pub max: CellCoord,
}

impl BuildingRect {
    pub fn new(min: CellCoord, max: CellCoord) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, cell: CellCoord) -> bool {
        cell.x >= self.min.x && cell.x <= self.max.x && cell.y >= self.min.y && cell.y <= self.max.y
    }
}

/// An ordered run of cells with a single direction of travel
#[derive(Debug, Clone)]
pub struct LaneConfig {
    pub cells: Vec<CellCoord>,
    pub direction: Direction,
    /// Lanes a vehicle may change into from this lane
    pub adjacent: Vec<LaneId>,
}

impl LaneConfig {
    pub fn new(cells: Vec<CellCoord>, direction: Direction) -> Self {
        Self {
            cells,
            direction,
            adjacent: Vec::new(),
        }
    }
}

/// A single-cell intersection joining approach lanes to exit lanes
#[derive(Debug, Clone)]
pub struct IntersectionConfig {
    pub cell: CellCoord,
    /// Incoming lanes keyed by their direction of travel; the lane's last
    /// cell must sit one step before `cell`.
    pub approaches: Vec<(Direction, LaneId)>,
    /// Outgoing lanes keyed by direction of travel; the lane's first cell
    /// must sit one step past `cell`.
    pub exits: Vec<(Direction, LaneId)>,
    /// Adjacent intersections whose lights exchange queue reports with this one
    pub neighbors: Vec<IntersectionId>,
}

/// Speed-tier range a spawned vehicle draws from (cells per tick, inclusive)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VehicleProfile {
    pub min_speed: u8,
    pub max_speed: u8,
}

impl VehicleProfile {
    pub fn fixed(speed: u8) -> Self {
        Self {
            min_speed: speed,
            max_speed: speed,
        }
    }
}

/// A vehicle entry point with a Bernoulli-per-tick arrival process
#[derive(Debug, Clone)]
pub struct SpawnPointConfig {
    pub cell: CellCoord,
    pub lane: LaneId,
    /// Arrival probability per tick, in [0.0, 1.0]
    pub rate: f64,
    /// Profile distribution; one is drawn uniformly per successful spawn
    pub profiles: Vec<VehicleProfile>,
    /// Optional cap on total spawns from this point (scenario knob)
    pub limit: Option<u32>,
}

/// Dwell parameters for every traffic light on the grid
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LightTiming {
    /// Minimum ticks a Green phase holds before it may end
    pub min_green: u32,
    /// Adaptive Green budget ceiling
    pub max_green: u32,
    /// Fixed Yellow dwell in ticks
    pub yellow_dwell: u32,
}

impl Default for LightTiming {
    fn default() -> Self {
        Self {
            min_green: 3,
            max_green: 10,
            yellow_dwell: 2,
        }
    }
}

/// Full simulation configuration, consumed by `Scheduler::reset`
#[derive(Debug, Clone)]
pub struct SimConfig {
    pub width: i32,
    pub height: i32,
    pub buildings: Vec<BuildingRect>,
    pub lanes: Vec<LaneConfig>,
    pub intersections: Vec<IntersectionConfig>,
    pub spawn_points: Vec<SpawnPointConfig>,
    /// Cells vehicles may be routed to; a destination is drawn uniformly
    /// per spawn, excluding the vehicle's own entry cell.
    pub destinations: Vec<CellCoord>,
    pub timing: LightTiming,
    /// How many published snapshots the scheduler retains for queries
    pub snapshot_retention: usize,
}

impl SimConfig {
    fn in_bounds(&self, cell: CellCoord) -> bool {
        cell.x >= 0 && cell.x < self.width && cell.y >= 0 && cell.y < self.height
    }

    fn on_building(&self, cell: CellCoord) -> bool {
        self.buildings.iter().any(|b| b.contains(cell))
    }

    /// Validate the configuration; rejected configs never start a simulation
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.width <= 0 || self.height <= 0 {
            return Err(ConfigError::NonPositiveDimensions {
                width: self.width,
                height: self.height,
            });
        }

        if self.timing.min_green == 0 || self.timing.yellow_dwell == 0 {
            return Err(ConfigError::InvalidLightTiming(
                "min_green and yellow_dwell must be at least 1 tick".into(),
            ));
        }
        if self.timing.max_green < self.timing.min_green {
            return Err(ConfigError::InvalidLightTiming(format!(
                "max_green {} is below min_green {}",
                self.timing.max_green, self.timing.min_green
            )));
        }

        for building in &self.buildings {
            if !self.in_bounds(building.min) || !self.in_bounds(building.max) {
                return Err(ConfigError::CellOutOfBounds(building.max));
            }
        }

        for (index, lane) in self.lanes.iter().enumerate() {
            let lane_id = LaneId(index);
            if lane.cells.is_empty() {
                return Err(ConfigError::MalformedLane(lane_id, "lane has no cells".into()));
            }
            for window in lane.cells.windows(2) {
                if window[0].step(lane.direction) != window[1] {
                    return Err(ConfigError::MalformedLane(
                        lane_id,
                        format!(
                            "cells {:?} -> {:?} do not follow direction {:?}",
                            window[0], window[1], lane.direction
                        ),
                    ));
                }
            }
            for &cell in &lane.cells {
                if !self.in_bounds(cell) {
                    return Err(ConfigError::CellOutOfBounds(cell));
                }
                if self.on_building(cell) {
                    return Err(ConfigError::MalformedLane(
                        lane_id,
                        format!("cell {:?} overlaps a building", cell),
                    ));
                }
            }
            for &adjacent in &lane.adjacent {
                if adjacent.0 >= self.lanes.len() {
                    return Err(ConfigError::MalformedLane(
                        lane_id,
                        format!("unknown adjacent lane {:?}", adjacent),
                    ));
                }
            }
        }

        for intersection in &self.intersections {
            let cell = intersection.cell;
            if !self.in_bounds(cell) {
                return Err(ConfigError::CellOutOfBounds(cell));
            }
            if self.on_building(cell) {
                return Err(ConfigError::MalformedIntersection(
                    cell,
                    "intersection cell overlaps a building".into(),
                ));
            }
            for &(direction, lane_id) in &intersection.approaches {
                let lane = self.lanes.get(lane_id.0).ok_or_else(|| {
                    ConfigError::MalformedIntersection(
                        cell,
                        format!("unknown approach lane {:?}", lane_id),
                    )
                })?;
                let last = *lane.cells.last().expect("validated non-empty");
                if lane.direction != direction || last.step(direction) != cell {
                    return Err(ConfigError::MalformedIntersection(
                        cell,
                        format!("approach lane {:?} does not feed this cell", lane_id),
                    ));
                }
            }
            for &(direction, lane_id) in &intersection.exits {
                let lane = self.lanes.get(lane_id.0).ok_or_else(|| {
                    ConfigError::MalformedIntersection(
                        cell,
                        format!("unknown exit lane {:?}", lane_id),
                    )
                })?;
                let first = *lane.cells.first().expect("validated non-empty");
                if lane.direction != direction || cell.step(direction) != first {
                    return Err(ConfigError::MalformedIntersection(
                        cell,
                        format!("exit lane {:?} does not leave this cell", lane_id),
                    ));
                }
            }
            for &neighbor in &intersection.neighbors {
                if neighbor.0 >= self.intersections.len() {
                    return Err(ConfigError::MalformedIntersection(
                        cell,
                        format!("unknown neighbor intersection {:?}", neighbor),
                    ));
                }
            }
        }

        for (index, spawn) in self.spawn_points.iter().enumerate() {
            let spawn_id = SpawnPointId(index);
            if self.spawn_points[..index].iter().any(|s| s.cell == spawn.cell) {
                return Err(ConfigError::DuplicateSpawnCell(spawn_id, spawn.cell));
            }
            if !self.in_bounds(spawn.cell) {
                return Err(ConfigError::CellOutOfBounds(spawn.cell));
            }
            if self.on_building(spawn.cell) {
                return Err(ConfigError::SpawnOnBuilding(spawn_id, spawn.cell));
            }
            if !(0.0..=1.0).contains(&spawn.rate) {
                return Err(ConfigError::InvalidSpawnRate(spawn_id, spawn.rate));
            }
            let lane = self
                .lanes
                .get(spawn.lane.0)
                .ok_or(ConfigError::SpawnLaneUnknown(spawn_id, spawn.lane))?;
            if !lane.cells.contains(&spawn.cell) {
                return Err(ConfigError::SpawnLaneUnknown(spawn_id, spawn.lane));
            }
            if spawn.profiles.is_empty() {
                return Err(ConfigError::SpawnWithoutProfiles(spawn_id));
            }
            for profile in &spawn.profiles {
                if profile.min_speed == 0 || profile.max_speed < profile.min_speed {
                    return Err(ConfigError::SpawnWithoutProfiles(spawn_id));
                }
            }
        }

        if self.destinations.is_empty() {
            return Err(ConfigError::NoDestinations);
        }
        for &destination in &self.destinations {
            if !self.in_bounds(destination) {
                return Err(ConfigError::CellOutOfBounds(destination));
            }
        }

        Ok(())
    }

    /// A single straight eastbound road with one spawn point at the west
    /// end and the east end as destination. No intersections, no lights.
    pub fn straight_road(length: i32, rate: f64, limit: Option<u32>) -> Self {
        let cells: Vec<CellCoord> = (0..length).map(|x| CellCoord::new(x, 0)).collect();
        let destination = CellCoord::new(length - 1, 0);

        Self {
            width: length,
            height: 1,
            buildings: Vec::new(),
            lanes: vec![LaneConfig::new(cells, Direction::East)],
            intersections: Vec::new(),
            spawn_points: vec![SpawnPointConfig {
                cell: CellCoord::new(0, 0),
                lane: LaneId(0),
                rate,
                profiles: vec![VehicleProfile::fixed(1)],
                limit,
            }],
            destinations: vec![destination],
            timing: LightTiming::default(),
            snapshot_retention: 64,
        }
    }

    /// Two intersections in a line along an eastbound main road, each with
    /// a short southbound cross street. A single spawn point feeds the
    /// western approach.
    pub fn two_intersection_line(rate: f64) -> Self {
        let east_row = |x0: i32, x1: i32, y: i32| -> Vec<CellCoord> {
            (x0..=x1).map(|x| CellCoord::new(x, y)).collect()
        };
        let south_col = |y0: i32, y1: i32, x: i32| -> Vec<CellCoord> {
            (y0..=y1).map(|y| CellCoord::new(x, y)).collect()
        };

        let lanes = vec![
            // 0: west approach to the first intersection
            LaneConfig::new(east_row(0, 3, 2), Direction::East),
            // 1: link between the two intersections
            LaneConfig::new(east_row(5, 7, 2), Direction::East),
            // 2: east exit lane
            LaneConfig::new(east_row(9, 12, 2), Direction::East),
            // 3/4: cross street at the first intersection
            LaneConfig::new(south_col(0, 1, 4), Direction::South),
            LaneConfig::new(south_col(3, 4, 4), Direction::South),
            // 5/6: cross street at the second intersection
            LaneConfig::new(south_col(0, 1, 8), Direction::South),
            LaneConfig::new(south_col(3, 4, 8), Direction::South),
        ];

        let intersections = vec![
            IntersectionConfig {
                cell: CellCoord::new(4, 2),
                approaches: vec![(Direction::East, LaneId(0)), (Direction::South, LaneId(3))],
                exits: vec![(Direction::East, LaneId(1)), (Direction::South, LaneId(4))],
                neighbors: vec![IntersectionId(1)],
            },
            IntersectionConfig {
                cell: CellCoord::new(8, 2),
                approaches: vec![(Direction::East, LaneId(1)), (Direction::South, LaneId(5))],
                exits: vec![(Direction::East, LaneId(2)), (Direction::South, LaneId(6))],
                neighbors: vec![IntersectionId(0)],
            },
        ];

        Self {
            width: 13,
            height: 5,
            buildings: Vec::new(),
            lanes,
            intersections,
            spawn_points: vec![SpawnPointConfig {
                cell: CellCoord::new(0, 2),
                lane: LaneId(0),
                rate,
                profiles: vec![VehicleProfile::fixed(1)],
                limit: None,
            }],
            destinations: vec![CellCoord::new(12, 2)],
            timing: LightTiming::default(),
            snapshot_retention: 64,
        }
    }

    /// A 2x2 grid of lit intersections joined by one-way streets, with
    /// building blocks filling the quadrants. Four spawn points feed the
    /// grid, one per boundary street entry.
    pub fn demo_city(rate: f64) -> Self {
        let east_row = |x0: i32, x1: i32, y: i32| -> Vec<CellCoord> {
            (x0..=x1).map(|x| CellCoord::new(x, y)).collect()
        };
        let west_row = |x0: i32, x1: i32, y: i32| -> Vec<CellCoord> {
            (x1..=x0).rev().map(|x| CellCoord::new(x, y)).collect()
        };
        let south_col = |y0: i32, y1: i32, x: i32| -> Vec<CellCoord> {
            (y0..=y1).map(|y| CellCoord::new(x, y)).collect()
        };
        let north_col = |y0: i32, y1: i32, x: i32| -> Vec<CellCoord> {
            (y1..=y0).rev().map(|y| CellCoord::new(x, y)).collect()
        };

        // One-way streets: eastbound on y=4, westbound on y=12,
        // southbound on x=4, northbound on x=12.
        let lanes = vec![
            LaneConfig::new(east_row(0, 3, 4), Direction::East), // 0: E approach to I0
            LaneConfig::new(east_row(5, 11, 4), Direction::East), // 1: I0 -> I1
            LaneConfig::new(east_row(13, 16, 4), Direction::East), // 2: east exit
            LaneConfig::new(west_row(16, 13, 12), Direction::West), // 3: W approach to I3
            LaneConfig::new(west_row(11, 5, 12), Direction::West), // 4: I3 -> I2
            LaneConfig::new(west_row(3, 0, 12), Direction::West), // 5: west exit
            LaneConfig::new(south_col(0, 3, 4), Direction::South), // 6: S approach to I0
            LaneConfig::new(south_col(5, 11, 4), Direction::South), // 7: I0 -> I2
            LaneConfig::new(south_col(13, 16, 4), Direction::South), // 8: south exit
            LaneConfig::new(north_col(16, 13, 12), Direction::North), // 9: N approach to I3
            LaneConfig::new(north_col(11, 5, 12), Direction::North), // 10: I3 -> I1
            LaneConfig::new(north_col(3, 0, 12), Direction::North), // 11: north exit
        ];

        let intersections = vec![
            // I0 at (4,4)
            IntersectionConfig {
                cell: CellCoord::new(4, 4),
                approaches: vec![(Direction::East, LaneId(0)), (Direction::South, LaneId(6))],
                exits: vec![(Direction::East, LaneId(1)), (Direction::South, LaneId(7))],
                neighbors: vec![IntersectionId(1), IntersectionId(2)],
            },
            // I1 at (12,4)
            IntersectionConfig {
                cell: CellCoord::new(12, 4),
                approaches: vec![(Direction::East, LaneId(1)), (Direction::North, LaneId(10))],
                exits: vec![(Direction::East, LaneId(2)), (Direction::North, LaneId(11))],
                neighbors: vec![IntersectionId(0), IntersectionId(3)],
            },
            // I2 at (4,12)
            IntersectionConfig {
                cell: CellCoord::new(4, 12),
                approaches: vec![(Direction::West, LaneId(4)), (Direction::South, LaneId(7))],
                exits: vec![(Direction::West, LaneId(5)), (Direction::South, LaneId(8))],
                neighbors: vec![IntersectionId(0), IntersectionId(3)],
            },
            // I3 at (12,12)
            IntersectionConfig {
                cell: CellCoord::new(12, 12),
                approaches: vec![(Direction::West, LaneId(3)), (Direction::North, LaneId(9))],
                exits: vec![(Direction::West, LaneId(4)), (Direction::North, LaneId(10))],
                neighbors: vec![IntersectionId(1), IntersectionId(2)],
            },
        ];

        let buildings = vec![
            BuildingRect::new(CellCoord::new(0, 0), CellCoord::new(2, 2)),
            BuildingRect::new(CellCoord::new(6, 0), CellCoord::new(10, 2)),
            BuildingRect::new(CellCoord::new(14, 0), CellCoord::new(16, 2)),
            BuildingRect::new(CellCoord::new(0, 6), CellCoord::new(2, 10)),
            BuildingRect::new(CellCoord::new(6, 6), CellCoord::new(10, 10)),
            BuildingRect::new(CellCoord::new(14, 6), CellCoord::new(16, 10)),
            BuildingRect::new(CellCoord::new(0, 14), CellCoord::new(2, 16)),
            BuildingRect::new(CellCoord::new(6, 14), CellCoord::new(10, 16)),
            BuildingRect::new(CellCoord::new(14, 14), CellCoord::new(16, 16)),
        ];

        let profiles = vec![VehicleProfile::fixed(1), VehicleProfile { min_speed: 1, max_speed: 2 }];
        let spawn = |cell: CellCoord, lane: usize| SpawnPointConfig {
            cell,
            lane: LaneId(lane),
            rate,
            profiles: profiles.clone(),
            limit: None,
        };

        Self {
            width: 17,
            height: 17,
            buildings,
            lanes,
            intersections,
            spawn_points: vec![
                spawn(CellCoord::new(0, 4), 0),
                spawn(CellCoord::new(16, 12), 3),
                spawn(CellCoord::new(4, 0), 6),
                spawn(CellCoord::new(12, 16), 9),
            ],
            destinations: vec![
                CellCoord::new(16, 4),
                CellCoord::new(0, 12),
                CellCoord::new(4, 16),
                CellCoord::new(12, 0),
            ],
            timing: LightTiming::default(),
            snapshot_retention: 64,
        }
    }
}

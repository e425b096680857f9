//! Core types for the grid traffic simulation
//!
//! Standalone identifier and geometry types shared across the simulation.

use serde::Serialize;

/// A unique identifier for simulation entities
/// This is a simple wrapper around a usize for type safety
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct SimId(pub usize);

/// A wrapper type for vehicle IDs
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct VehicleId(pub SimId);

/// A wrapper type for traffic light IDs
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct LightId(pub SimId);

/// A wrapper type for lane IDs (index into the grid's lane table)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct LaneId(pub usize);

/// A wrapper type for intersection IDs (index into the grid's intersection table)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct IntersectionId(pub usize);

/// A wrapper type for spawn point IDs
///
/// Spawn points are always processed in id order so the RNG stream is
/// consumed in a reproducible sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct SpawnPointId(pub usize);

/// A cell coordinate on the grid
///
/// `Ord` is derived so per-cell maps (e.g. the collision guard's target
/// table) iterate in a deterministic order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct CellCoord {
    pub x: i32,
    pub y: i32,
}

impl CellCoord {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Manhattan distance to another cell
    pub fn manhattan(&self, other: &CellCoord) -> u32 {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }

    /// The neighboring cell one step in the given direction
    pub fn step(&self, direction: Direction) -> CellCoord {
        let (dx, dy) = direction.offset();
        CellCoord::new(self.x + dx, self.y + dy)
    }

    /// Direction of travel from this cell to an adjacent cell, if adjacent
    pub fn direction_to(&self, other: &CellCoord) -> Option<Direction> {
        match (other.x - self.x, other.y - self.y) {
            (0, -1) => Some(Direction::North),
            (0, 1) => Some(Direction::South),
            (1, 0) => Some(Direction::East),
            (-1, 0) => Some(Direction::West),
            _ => None,
        }
    }
}

/// A compass direction of travel
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Direction {
    North,
    South,
    East,
    West,
}

impl Direction {
    /// Grid offset for one step of travel. North is -y, matching a
    /// top-down map printed row by row.
    pub fn offset(&self) -> (i32, i32) {
        match self {
            Direction::North => (0, -1),
            Direction::South => (0, 1),
            Direction::East => (1, 0),
            Direction::West => (-1, 0),
        }
    }

    pub fn opposite(&self) -> Direction {
        match self {
            Direction::North => Direction::South,
            Direction::South => Direction::North,
            Direction::East => Direction::West,
            Direction::West => Direction::East,
        }
    }

    /// The axis this direction of travel belongs to
    pub fn axis(&self) -> Axis {
        match self {
            Direction::North | Direction::South => Axis::NorthSouth,
            Direction::East | Direction::West => Axis::EastWest,
        }
    }

    /// The two directions perpendicular to this one, used when probing
    /// for lane-change candidates.
    pub fn laterals(&self) -> [Direction; 2] {
        match self.axis() {
            Axis::NorthSouth => [Direction::East, Direction::West],
            Axis::EastWest => [Direction::North, Direction::South],
        }
    }
}

/// One of the two road axes meeting at an intersection
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Axis {
    NorthSouth,
    EastWest,
}

impl Axis {
    pub fn other(&self) -> Axis {
        match self {
            Axis::NorthSouth => Axis::EastWest,
            Axis::EastWest => Axis::NorthSouth,
        }
    }
}

/// Signal state of a traffic light for one approach
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Phase {
    Green,
    Yellow,
    Red,
}

/// Occupancy state of a single grid cell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellState {
    Empty,
    Occupied(VehicleId),
    Building,
}

/// How many cells upstream of an intersection a light senses for queued vehicles
pub const SENSING_WINDOW: usize = 5;

/// Happiness score assigned to a freshly spawned vehicle (also the cap)
pub const HAPPINESS_MAX: f32 = 100.0;

/// Happiness lost for every tick a vehicle is held in place
pub const WAIT_PENALTY: f32 = 2.0;

/// Happiness recovered per moving tick, up to HAPPINESS_MAX
pub const MOVE_RECOVERY: f32 = 1.0;

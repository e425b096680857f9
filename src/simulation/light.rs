//! Adaptive traffic light control with decentralized negotiation
//!
//! Each light runs a per-axis phase machine (Green -> Yellow -> switch
//! axis) and tunes its Green budget from its own sensed queues relative
//! to the busiest queue its neighbors reported. Reports broadcast during
//! tick t are consumed in tick t+1, so broadcast order within a tick
//! cannot matter. A light only ever adjusts its own timing.

use log::debug;

use super::config::LightTiming;
use super::types::{Axis, Direction, IntersectionId, LightId, Phase};

/// Per-intersection adaptive signal controller
#[derive(Debug, Clone)]
pub struct TrafficLightAgent {
    pub id: LightId,
    pub intersection: IntersectionId,
    /// The axis currently holding Green (or Yellow); the cross axis is Red
    pub active_axis: Axis,
    /// Phase of the active axis; Red is only ever derived for the cross axis
    pub phase: Phase,
    /// Ticks spent in the current phase
    pub phase_ticks: u32,
    /// Adaptive Green budget for the current/next Green phase
    pub green_target: u32,
    /// Most recent sensed queue length per approach
    pub queues: Vec<(Direction, u32)>,
    /// Lights at directly adjacent intersections (read-only references by id)
    pub neighbors: Vec<LightId>,
    timing: LightTiming,
    /// Busiest queue reported by any neighbor last tick
    neighbor_peak: u32,
}

impl TrafficLightAgent {
    pub fn new(
        id: LightId,
        intersection: IntersectionId,
        approaches: &[Direction],
        neighbors: Vec<LightId>,
        timing: LightTiming,
    ) -> Self {
        // Start Green on the first configured approach axis
        let active_axis = approaches
            .first()
            .map(|d| d.axis())
            .unwrap_or(Axis::NorthSouth);
        Self {
            id,
            intersection,
            active_axis,
            phase: Phase::Green,
            phase_ticks: 0,
            green_target: timing.min_green,
            queues: approaches.iter().map(|&d| (d, 0)).collect(),
            neighbors,
            timing,
            neighbor_peak: 0,
        }
    }

    /// Signal shown to vehicles arriving from the given approach direction
    pub fn phase_for(&self, approach: Direction) -> Phase {
        if approach.axis() == self.active_axis {
            self.phase
        } else {
            Phase::Red
        }
    }

    /// Largest sensed queue across all approaches; this is the value
    /// broadcast to neighbors.
    pub fn busiest_queue(&self) -> u32 {
        self.queues.iter().map(|&(_, q)| q).max().unwrap_or(0)
    }

    fn axis_queue(&self, axis: Axis) -> u32 {
        self.queues
            .iter()
            .filter(|(direction, _)| direction.axis() == axis)
            .map(|&(_, q)| q)
            .max()
            .unwrap_or(0)
    }

    /// Green budget proportional to our own congestion relative to the
    /// busiest neighborhood queue. An idle approach gets the minimum; an
    /// approach at least as congested as every neighbor gets the maximum.
    fn adaptive_target(&self, own_queue: u32) -> u32 {
        let span = self.timing.max_green - self.timing.min_green;
        let peak = own_queue.max(self.neighbor_peak).max(1);
        self.timing.min_green + span * own_queue / peak
    }

    /// Advance the phase machine by one tick.
    ///
    /// `sensed` is this tick's queue measurement per approach (committed
    /// state); `neighbor_reports` are the queue lengths neighbors
    /// broadcast last tick.
    pub fn step(&mut self, sensed: Vec<(Direction, u32)>, neighbor_reports: &[u32]) {
        self.queues = sensed;
        self.neighbor_peak = neighbor_reports.iter().copied().max().unwrap_or(0);
        self.phase_ticks += 1;

        match self.phase {
            Phase::Green => {
                let queue = self.axis_queue(self.active_axis);
                // Early advance only past the minimum dwell, and only once
                // the queue is drained or the adaptive budget is spent.
                if self.phase_ticks >= self.timing.min_green
                    && (queue == 0 || self.phase_ticks >= self.green_target)
                {
                    self.phase = Phase::Yellow;
                    self.phase_ticks = 0;
                }
            }
            Phase::Yellow => {
                if self.phase_ticks >= self.timing.yellow_dwell {
                    self.active_axis = self.active_axis.other();
                    self.phase = Phase::Green;
                    self.phase_ticks = 0;
                    let own = self.axis_queue(self.active_axis);
                    self.green_target = self.adaptive_target(own);
                    debug!(
                        "light {:?} green on {:?}, target {} (own queue {}, neighbor peak {})",
                        self.id, self.active_axis, self.green_target, own, self.neighbor_peak
                    );
                }
            }
            // The stored phase is only ever Green or Yellow; Red is
            // derived per approach in phase_for.
            Phase::Red => {}
        }
    }

    /// Ticks remaining before the current phase may end
    pub fn phase_remaining(&self) -> u32 {
        match self.phase {
            Phase::Green => self
                .green_target
                .max(self.timing.min_green)
                .saturating_sub(self.phase_ticks),
            Phase::Yellow => self.timing.yellow_dwell.saturating_sub(self.phase_ticks),
            Phase::Red => 0,
        }
    }
}

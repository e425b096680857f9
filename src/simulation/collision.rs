//! Collision guard: conflict-free assignment of proposed moves
//!
//! Takes every vehicle's proposed move for the tick and produces an
//! assignment where no two vehicles commit to the same cell and nothing
//! commits onto a building. Contested cells go to the longest-waiting
//! contender (starved vehicles win), ties to the lowest id. Losers fall
//! back to holding their current cell, which is always conflict-free, so
//! resolution can never wedge the whole simulation.

use log::warn;
use std::collections::{BTreeMap, BTreeSet};

use super::error::SimError;
use super::grid::Grid;
use super::types::{CellCoord, VehicleId};
use super::vehicle::{IntentKind, MoveIntent};

/// A validated, conflict-free move for one vehicle
#[derive(Debug, Clone, Copy)]
pub struct ResolvedMove {
    pub vehicle: VehicleId,
    pub from: CellCoord,
    pub target: CellCoord,
    pub kind: IntentKind,
}

impl ResolvedMove {
    fn hold(intent: &MoveIntent) -> Self {
        Self {
            vehicle: intent.vehicle,
            from: intent.from,
            target: intent.from,
            kind: IntentKind::Hold,
        }
    }
}

pub struct CollisionGuard;

impl CollisionGuard {
    /// Resolve all proposals for a tick.
    ///
    /// `reserved` holds cells already claimed this tick (entry cells of
    /// vehicles spawned at the top of the tick); movers targeting them are
    /// demoted to Hold.
    pub fn resolve(
        intents: Vec<MoveIntent>,
        reserved: &BTreeSet<CellCoord>,
        grid: &Grid,
    ) -> Result<Vec<ResolvedMove>, SimError> {
        let mut resolved: Vec<ResolvedMove> = Vec::with_capacity(intents.len());
        let mut contested: BTreeMap<CellCoord, Vec<MoveIntent>> = BTreeMap::new();

        for intent in intents {
            match intent.kind {
                IntentKind::Hold => resolved.push(ResolvedMove::hold(&intent)),
                IntentKind::Advance | IntentKind::LaneChange => {
                    if grid.is_building(intent.target) {
                        // Planners never propose building cells; demote
                        // rather than corrupt the occupancy table.
                        warn!(
                            "vehicle {:?} proposed building cell {:?}; holding",
                            intent.vehicle, intent.target
                        );
                        resolved.push(ResolvedMove::hold(&intent));
                    } else if reserved.contains(&intent.target) {
                        resolved.push(ResolvedMove::hold(&intent));
                    } else {
                        contested.entry(intent.target).or_default().push(intent);
                    }
                }
            }
        }

        for (target, mut contenders) in contested {
            // Fairness: longest accumulated wait wins; deterministic final
            // tie-break on the lower vehicle id.
            contenders.sort_by(|a, b| {
                b.wait_ticks
                    .cmp(&a.wait_ticks)
                    .then(a.vehicle.cmp(&b.vehicle))
            });
            let mut contenders = contenders.into_iter();
            let winner = contenders.next().expect("contested entries are non-empty");
            resolved.push(ResolvedMove {
                vehicle: winner.vehicle,
                from: winner.from,
                target,
                kind: winner.kind,
            });
            for loser in contenders {
                resolved.push(ResolvedMove::hold(&loser));
            }
        }

        // Post-condition: the assignment must be a valid total occupancy,
        // one cell per vehicle. A duplicate here is a guard bug and fatal.
        let mut assigned: BTreeSet<CellCoord> = BTreeSet::new();
        for resolved_move in &resolved {
            if !assigned.insert(resolved_move.target) {
                return Err(SimError::InvariantViolation(format!(
                    "cell {:?} assigned twice during conflict resolution",
                    resolved_move.target
                )));
            }
        }

        resolved.sort_by_key(|m| m.vehicle);
        Ok(resolved)
    }
}

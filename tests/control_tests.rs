//! Unit-level checks for the control pieces: collision resolution,
//! adaptive light timing, spawn limits, and configuration validation.

use std::collections::BTreeSet;

use rand::rngs::StdRng;
use rand::SeedableRng;

use traffic_grid::simulation::{
    BuildingRect, CellCoord, CollisionGuard, ConfigError, Direction, Grid, IntentKind,
    IntersectionId, LaneConfig, LaneId, LightId, LightTiming, MoveIntent, Phase, SimConfig, SimId,
    SpawnController, SpawnPointConfig, TrafficLightAgent, VehicleId, VehicleProfile,
};

fn advance_intent(id: usize, from: CellCoord, target: CellCoord, wait_ticks: u32) -> MoveIntent {
    MoveIntent {
        vehicle: VehicleId(SimId(id)),
        from,
        target,
        kind: IntentKind::Advance,
        wait_ticks,
    }
}

fn road_grid() -> Grid {
    Grid::build(&SimConfig::straight_road(6, 0.0, None)).expect("valid scenario")
}

// --- collision guard ---

#[test]
fn test_contested_cell_goes_to_longest_wait() {
    let grid = road_grid();
    let contested = CellCoord::new(2, 0);
    let intents = vec![
        advance_intent(0, CellCoord::new(1, 0), contested, 1),
        advance_intent(1, CellCoord::new(3, 0), contested, 6),
    ];

    let resolved = CollisionGuard::resolve(intents, &BTreeSet::new(), &grid).unwrap();
    assert_eq!(resolved.len(), 2);

    let winner = &resolved[1];
    assert_eq!(winner.vehicle, VehicleId(SimId(1)));
    assert_eq!(winner.target, contested);
    assert_eq!(winner.kind, IntentKind::Advance);

    let loser = &resolved[0];
    assert_eq!(loser.kind, IntentKind::Hold);
    assert_eq!(loser.target, loser.from);
}

#[test]
fn test_contested_tie_breaks_on_lower_id() {
    let grid = road_grid();
    let contested = CellCoord::new(2, 0);
    let intents = vec![
        advance_intent(4, CellCoord::new(3, 0), contested, 2),
        advance_intent(3, CellCoord::new(1, 0), contested, 2),
    ];

    let resolved = CollisionGuard::resolve(intents, &BTreeSet::new(), &grid).unwrap();
    let winner = resolved
        .iter()
        .find(|m| m.target == contested)
        .expect("someone wins the cell");
    assert_eq!(winner.vehicle, VehicleId(SimId(3)));
}

#[test]
fn test_building_target_demoted_to_hold() {
    let grid = Grid::build(&SimConfig::demo_city(0.0)).expect("valid scenario");
    let intents = vec![advance_intent(
        0,
        CellCoord::new(0, 4),
        CellCoord::new(0, 0),
        0,
    )];

    let resolved = CollisionGuard::resolve(intents, &BTreeSet::new(), &grid).unwrap();
    assert_eq!(resolved[0].kind, IntentKind::Hold);
    assert_eq!(resolved[0].target, CellCoord::new(0, 4));
}

#[test]
fn test_reserved_cell_demoted_to_hold() {
    let grid = road_grid();
    let target = CellCoord::new(0, 0);
    let reserved: BTreeSet<CellCoord> = [target].into_iter().collect();
    let intents = vec![advance_intent(0, CellCoord::new(1, 0), target, 9)];

    let resolved = CollisionGuard::resolve(intents, &reserved, &grid).unwrap();
    assert_eq!(resolved[0].kind, IntentKind::Hold);
}

#[test]
fn test_uncontested_moves_pass_through() {
    let grid = road_grid();
    let intents = vec![
        advance_intent(0, CellCoord::new(0, 0), CellCoord::new(1, 0), 0),
        advance_intent(1, CellCoord::new(2, 0), CellCoord::new(3, 0), 0),
        MoveIntent {
            vehicle: VehicleId(SimId(2)),
            from: CellCoord::new(5, 0),
            target: CellCoord::new(5, 0),
            kind: IntentKind::Hold,
            wait_ticks: 0,
        },
    ];

    let resolved = CollisionGuard::resolve(intents, &BTreeSet::new(), &grid).unwrap();
    assert_eq!(resolved.len(), 3);
    assert_eq!(resolved[0].target, CellCoord::new(1, 0));
    assert_eq!(resolved[1].target, CellCoord::new(3, 0));
    assert_eq!(resolved[2].kind, IntentKind::Hold);
}

// --- traffic lights ---

fn crossing_light(first_approach: Direction) -> TrafficLightAgent {
    let approaches = [first_approach, first_approach.laterals()[0]];
    TrafficLightAgent::new(
        LightId(SimId(0)),
        IntersectionId(0),
        &approaches,
        Vec::new(),
        LightTiming::default(),
    )
}

#[test]
fn test_light_starts_green_on_first_approach_axis() {
    let light = crossing_light(Direction::East);
    assert_eq!(light.phase_for(Direction::East), Phase::Green);
    assert_eq!(light.phase_for(Direction::West), Phase::Green);
    assert_eq!(light.phase_for(Direction::South), Phase::Red);
    assert_eq!(light.phase_for(Direction::North), Phase::Red);
}

#[test]
fn test_starved_cross_axis_gets_green() {
    // East-West holds Green with an empty road while three vehicles queue
    // on the cross street; they must get Green within one full cycle.
    let mut light = crossing_light(Direction::East);
    let timing = LightTiming::default();
    let cycle = timing.min_green + timing.yellow_dwell + 1;

    let mut waited = 0;
    while light.phase_for(Direction::South) != Phase::Green {
        light.step(vec![(Direction::East, 0), (Direction::South, 3)], &[]);
        waited += 1;
        assert!(waited <= cycle, "cross street starved past a full cycle");
    }
}

#[test]
fn test_congested_axis_gets_full_green_budget() {
    // Own queue at least as busy as every neighbor: budget hits max_green.
    let mut light = crossing_light(Direction::East);
    for _ in 0..LightTiming::default().min_green + LightTiming::default().yellow_dwell {
        light.step(vec![(Direction::East, 0), (Direction::South, 3)], &[3]);
    }
    assert_eq!(light.phase_for(Direction::South), Phase::Green);
    assert_eq!(light.green_target, LightTiming::default().max_green);
}

#[test]
fn test_green_budget_scales_with_neighbor_reports() {
    // Own queue 3 against a reported peak of 12: budget stays near minimum.
    let mut light = crossing_light(Direction::East);
    for _ in 0..LightTiming::default().min_green + LightTiming::default().yellow_dwell {
        light.step(vec![(Direction::East, 0), (Direction::South, 3)], &[12, 5]);
    }
    assert_eq!(light.phase_for(Direction::South), Phase::Green);

    let timing = LightTiming::default();
    let span = timing.max_green - timing.min_green;
    assert_eq!(light.green_target, timing.min_green + span * 3 / 12);
}

#[test]
fn test_idle_axis_gets_minimum_green() {
    let mut light = crossing_light(Direction::East);
    for _ in 0..LightTiming::default().min_green + LightTiming::default().yellow_dwell {
        light.step(vec![(Direction::East, 0), (Direction::South, 0)], &[]);
    }
    assert_eq!(light.phase_for(Direction::South), Phase::Green);
    assert_eq!(light.green_target, LightTiming::default().min_green);
}

#[test]
fn test_green_ends_early_when_queue_drains() {
    let mut light = crossing_light(Direction::East);
    let timing = LightTiming::default();

    // Reach a North-South Green with the full adaptive budget
    for _ in 0..timing.min_green + timing.yellow_dwell {
        light.step(vec![(Direction::East, 0), (Direction::South, 4)], &[]);
    }
    assert_eq!(light.phase_for(Direction::South), Phase::Green);
    assert_eq!(light.green_target, timing.max_green);

    // The queue drains immediately: Green ends at the minimum dwell, not
    // the full budget.
    for _ in 0..timing.min_green {
        assert_eq!(light.phase_for(Direction::South), Phase::Green);
        light.step(vec![(Direction::East, 0), (Direction::South, 0)], &[]);
    }
    assert_eq!(light.phase_for(Direction::South), Phase::Yellow);
}

#[test]
fn test_busiest_queue_is_what_gets_broadcast() {
    let mut light = crossing_light(Direction::East);
    light.step(vec![(Direction::East, 2), (Direction::South, 7)], &[]);
    assert_eq!(light.busiest_queue(), 7);
}

// --- spawn controller ---

#[test]
fn test_spawn_limit_caps_total_spawns() {
    let grid = Grid::build(&SimConfig::straight_road(6, 1.0, Some(1))).unwrap();
    let mut controller = SpawnController::new(1);
    let mut rng = StdRng::seed_from_u64(8);
    let mut next_id = 0;

    let first = controller.run_tick(&grid, &mut rng, &mut next_id, 1);
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].cell, CellCoord::new(0, 0));
    assert_eq!(first[0].destination, CellCoord::new(5, 0));
    assert_eq!(first[0].route.len(), 5);

    let second = controller.run_tick(&grid, &mut rng, &mut next_id, 2);
    assert!(second.is_empty(), "limit of one spawn was exceeded");
    assert_eq!(next_id, 1);
}

#[test]
fn test_zero_rate_never_spawns() {
    let grid = Grid::build(&SimConfig::straight_road(6, 0.0, None)).unwrap();
    let mut controller = SpawnController::new(1);
    let mut rng = StdRng::seed_from_u64(8);
    let mut next_id = 0;

    for tick in 1..=50 {
        assert!(controller.run_tick(&grid, &mut rng, &mut next_id, tick).is_empty());
    }
}

// --- configuration validation ---

#[test]
fn test_rejects_non_positive_dimensions() {
    let config = SimConfig::straight_road(0, 0.5, None);
    assert!(matches!(
        config.validate(),
        Err(ConfigError::NonPositiveDimensions { .. })
    ));
}

#[test]
fn test_rejects_out_of_range_spawn_rate() {
    let config = SimConfig::straight_road(5, -0.1, None);
    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidSpawnRate(_, _))
    ));
}

#[test]
fn test_rejects_spawn_point_on_building() {
    let mut config = SimConfig::straight_road(5, 0.5, None);
    config.height = 2;
    // Move the road off row 0, leave the spawn point behind on a building
    config.lanes = vec![LaneConfig::new(
        (0..5).map(|x| CellCoord::new(x, 1)).collect(),
        Direction::East,
    )];
    config.buildings = vec![BuildingRect::new(CellCoord::new(0, 0), CellCoord::new(0, 0))];
    assert!(matches!(
        config.validate(),
        Err(ConfigError::SpawnOnBuilding(_, _))
    ));
}

#[test]
fn test_rejects_duplicate_spawn_cells() {
    let mut config = SimConfig::straight_road(5, 0.5, None);
    config.spawn_points.push(SpawnPointConfig {
        cell: CellCoord::new(0, 0),
        lane: LaneId(0),
        rate: 0.5,
        profiles: vec![VehicleProfile::fixed(1)],
        limit: None,
    });
    assert!(matches!(
        config.validate(),
        Err(ConfigError::DuplicateSpawnCell(_, _))
    ));
}

#[test]
fn test_rejects_spawn_off_its_lane() {
    let mut config = SimConfig::straight_road(5, 0.5, None);
    config.spawn_points[0].lane = LaneId(3);
    assert!(matches!(
        config.validate(),
        Err(ConfigError::SpawnLaneUnknown(_, _))
    ));
}

#[test]
fn test_rejects_gapped_lane() {
    let mut config = SimConfig::straight_road(5, 0.5, None);
    config.lanes[0].cells = vec![CellCoord::new(0, 0), CellCoord::new(2, 0)];
    assert!(matches!(
        config.validate(),
        Err(ConfigError::MalformedLane(_, _))
    ));
}

#[test]
fn test_rejects_inverted_light_timing() {
    let mut config = SimConfig::two_intersection_line(0.5);
    config.timing = LightTiming {
        min_green: 5,
        max_green: 2,
        yellow_dwell: 2,
    };
    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidLightTiming(_))
    ));
}

#[test]
fn test_rejects_empty_destination_set() {
    let mut config = SimConfig::straight_road(5, 0.5, None);
    config.destinations.clear();
    assert!(matches!(config.validate(), Err(ConfigError::NoDestinations)));
}

#[test]
fn test_scenario_builders_validate_clean() {
    assert!(SimConfig::straight_road(20, 0.3, None).validate().is_ok());
    assert!(SimConfig::two_intersection_line(0.3).validate().is_ok());
    assert!(SimConfig::demo_city(0.3).validate().is_ok());
}

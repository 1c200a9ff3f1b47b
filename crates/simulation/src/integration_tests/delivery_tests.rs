//! Resources booked for construction sites and carried there, across one or
//! more segments.

use crate::events::ColonyEvent;
use crate::game_params::HumanParams;
use crate::test_harness::TestColony;
use crate::tile_pos::TilePos;

/// A minute of simulated time is plenty for every map below.
const MAX_TICKS: u32 = 60 * 60;

fn delivered(colony: &TestColony) -> usize {
    colony.count_events(|e| matches!(e, ColonyEvent::ResourceDelivered { .. }))
}

// ====================================================================
// Single segment
// ====================================================================

#[test]
fn test_construction_site_requests_and_books_resources() {
    let mut colony = TestColony::from_rows(&["Crrrr."]).with_resources("planks", 2, 0, 1);
    let hut = colony.build_site("lumberjacks_hut", 5, 0);
    assert_eq!(colony.world().resources.pending_for(hut), 2, "a hut needs two planks");

    colony.tick(1);
    let booked = colony.world().resources.booked_for(hut);
    assert_eq!(booked.len(), 1, "the only plank on the map is booked");
    assert_eq!(colony.world().resources.pending_for(hut), 1);

    let res = colony.world().resources.strict(booked[0]);
    assert_eq!(res.transportation_segments.len(), 1);
    assert_eq!(res.transportation_vertices, vec![colony.world().buildings.strict(hut).pos]);
    colony.assert_invariants();
}

#[test]
fn test_hut_is_built_from_planks_on_its_road() {
    let mut colony = TestColony::from_rows(&["Crrrr."]).with_resources("planks", 2, 0, 2);
    let hut = colony.build_site("lumberjacks_hut", 5, 0);
    assert!(!colony.is_constructed(hut));

    let ticks = colony.tick_until(MAX_TICKS, |w| w.buildings.strict(hut).constructed);
    assert!(ticks.is_some(), "hut was never constructed");

    assert_eq!(delivered(&colony), 2);
    assert_eq!(
        colony.count_events(|e| matches!(e, ColonyEvent::BuildingConstructed { building, .. } if *building == hut)),
        1
    );
    assert!(colony.world().resources.is_empty(), "delivered planks are consumed");
    assert_eq!(colony.world().resources.bookings_len(), 0);
    assert_eq!(colony.world().resources.pending_for(hut), 0);
    assert!(!colony.world().buildings.not_constructed.contains(&hut));
    colony.assert_invariants();
}

#[test]
fn test_pickup_and_placing_fire_in_order() {
    let mut colony = TestColony::from_rows(&["Crrrr."]).with_resources("planks", 3, 0, 1);
    let hut = colony.build_site("lumberjacks_hut", 5, 0);
    colony.tick_until(MAX_TICKS, |w| w.buildings.strict(hut).delivered_resources.len() == 1);

    let order: Vec<&str> = colony
        .events()
        .iter()
        .filter_map(|e| match e {
            ColonyEvent::HumanStartedPickingUpResource { .. } => Some("start"),
            ColonyEvent::HumanFinishedPickingUpResource { .. } => Some("picked"),
            ColonyEvent::ResourceDelivered { .. } => Some("delivered"),
            ColonyEvent::HumanFinishedPlacingResource { .. } => Some("placed"),
            _ => None,
        })
        .collect();
    assert_eq!(order, vec!["start", "picked", "delivered", "placed"]);
}

#[test]
fn test_action_durations_come_from_params() {
    let fast = HumanParams {
        moving_one_tile_duration: 0.25,
        picking_up_duration: 0.25,
        placing_duration: 0.25,
    };
    let rows = ["Crrrr."];

    let mut slow_colony = TestColony::from_rows(&rows).with_resources("planks", 2, 0, 2);
    let slow_hut = slow_colony.build_site("lumberjacks_hut", 5, 0);
    let slow = slow_colony.tick_until(MAX_TICKS, |w| w.buildings.strict(slow_hut).constructed);

    let mut fast_colony = TestColony::from_rows(&rows)
        .with_params(fast)
        .with_resources("planks", 2, 0, 2);
    let fast_hut = fast_colony.build_site("lumberjacks_hut", 5, 0);
    let fast = fast_colony.tick_until(MAX_TICKS, |w| w.buildings.strict(fast_hut).constructed);

    let (Some(slow), Some(fast)) = (slow, fast) else {
        panic!("construction did not finish: slow={slow:?} fast={fast:?}");
    };
    assert!(fast * 2 < slow, "quarter durations should be much faster: {fast} vs {slow} ticks");
}

#[test]
fn test_resource_off_the_road_network_is_never_booked() {
    let mut colony = TestColony::from_rows(&["......", "Crrrr."]).with_resources("planks", 2, 1, 1);
    let hut = colony.build_site("lumberjacks_hut", 5, 0);
    colony.tick_seconds(5.0);
    assert!(colony.world().resources.booked_for(hut).is_empty());
    assert_eq!(colony.world().resources.pending_for(hut), 2, "request stays open");
    colony.assert_invariants();
}

// ====================================================================
// Across segments
// ====================================================================

#[test]
fn test_resource_is_handed_over_at_a_flag() {
    let mut colony = TestColony::from_rows(&["CrrFrr."]).with_resources("planks", 1, 0, 2);
    let hut = colony.build_site("lumberjacks_hut", 6, 0);
    colony.assert_segment_count(2);

    // One search per tick reaches a tile only once, so the second plank on
    // the same tile is booked a tick later.
    colony.tick(1);
    assert_eq!(colony.world().resources.booked_for(hut).len(), 1);
    colony.tick(1);
    let booked = colony.world().resources.booked_for(hut);
    assert_eq!(booked.len(), 2);
    for &id in &booked {
        let res = colony.world().resources.strict(id);
        assert_eq!(res.transportation_segments.len(), 2, "{id} crosses both segments");
        assert_eq!(res.transportation_vertices[0].x, 3, "first leg ends at the flag");
    }

    let ticks = colony.tick_until(MAX_TICKS, |w| w.buildings.strict(hut).constructed);
    assert!(ticks.is_some(), "hut behind a flag was never constructed");
    assert_eq!(delivered(&colony), 2);

    let placers: std::collections::HashSet<_> = colony
        .events()
        .iter()
        .filter_map(|e| match e {
            ColonyEvent::HumanFinishedPlacingResource { human, .. } => Some(*human),
            _ => None,
        })
        .collect();
    assert_eq!(placers.len(), 2, "both transporters carried a leg");
    colony.assert_invariants();
}

#[test]
fn test_two_sites_share_one_road() {
    let mut colony = TestColony::from_rows(&[".....", "CrrrF", "....."])
        .with_resources("planks", 2, 1, 2)
        .with_resources("planks", 3, 1, 2);
    let below = colony.build_site("lumberjacks_hut", 2, 0);
    let above = colony.build_site("lumberjacks_hut", 3, 2);
    colony.assert_segment_count(1);

    let ticks = colony.tick_until(MAX_TICKS, |w| {
        w.buildings.strict(below).constructed && w.buildings.strict(above).constructed
    });
    assert!(ticks.is_some(), "both huts should be built");
    assert_eq!(delivered(&colony), 4);
    colony.assert_invariants();
}

// ====================================================================
// Vertices side by side
// ====================================================================

#[test]
fn test_adjacent_flags_cut_the_route() {
    let mut colony = TestColony::from_rows(&["CrFFrr."]).with_resources("planks", 1, 0, 2);
    let hut = colony.build_site("lumberjacks_hut", 6, 0);
    colony.assert_segment_count(2);

    colony.tick_seconds(5.0);
    assert!(
        colony.world().resources.booked_for(hut).is_empty(),
        "no road joins the two flags"
    );
    assert_eq!(colony.world().resources.pending_for(hut), 2);
    colony.assert_invariants();

    // Planks on the hut's side of the flags still get through.
    colony.drop_resources("planks", 4, 0, 2);
    let ticks = colony.tick_until(MAX_TICKS, |w| w.buildings.strict(hut).constructed);
    assert!(ticks.is_some(), "hut was never constructed");
    assert_eq!(delivered(&colony), 2);
    assert_eq!(colony.resources_at(1, 0).len(), 2, "planks behind the flags stay put");
    colony.assert_invariants();
}

#[test]
fn test_site_next_to_a_flag_is_not_served_across_it() {
    let mut colony = TestColony::from_rows(&["CrF."]).with_resources("planks", 1, 0, 2);
    let hut = colony.build_site("lumberjacks_hut", 3, 0);
    colony.assert_segment_count(1);

    colony.tick_seconds(5.0);
    assert!(colony.world().resources.booked_for(hut).is_empty());
    assert_eq!(colony.world().resources.pending_for(hut), 2);
    assert_eq!(delivered(&colony), 0);
    colony.assert_invariants();
}

#[test]
fn test_route_never_passes_through_other_buildings() {
    let mut colony = TestColony::from_rows(&["CrBrr."])
        .with_resources("planks", 1, 0, 1)
        .with_resources("planks", 3, 0, 1);
    let hut = colony.build_site("lumberjacks_hut", 5, 0);
    colony.assert_segment_count(2);

    let ticks = colony.tick_until(MAX_TICKS, |w| w.buildings.strict(hut).delivered_resources.len() == 1);
    assert!(ticks.is_some(), "plank on the hut's road was never delivered");
    colony.tick_seconds(10.0);

    assert!(!colony.is_constructed(hut), "the sawmill blocks the second plank");
    assert_eq!(delivered(&colony), 1);
    let stuck = colony.resources_at(1, 0);
    assert_eq!(stuck.len(), 1);
    assert!(colony.world().resources.strict(stuck[0]).booking.is_none());
    assert_eq!(colony.world().resources.pending_for(hut), 1);
    colony.assert_invariants();
}

#[test]
fn test_route_passes_through_city_hall() {
    let mut colony = TestColony::from_rows(&["BrCrr."]).with_resources("planks", 1, 0, 2);
    let hut = colony.build_site("lumberjacks_hut", 5, 0);
    colony.assert_segment_count(2);

    colony.tick(1);
    let booked = colony.world().resources.booked_for(hut);
    assert_eq!(booked.len(), 1);
    let res = colony.world().resources.strict(booked[0]);
    assert_eq!(res.transportation_segments.len(), 2);
    assert_eq!(res.transportation_vertices[0], TilePos::new(2, 0), "first leg ends at the city hall");

    let ticks = colony.tick_until(MAX_TICKS, |w| w.buildings.strict(hut).constructed);
    assert!(ticks.is_some(), "hut behind the city hall was never constructed");
    assert_eq!(delivered(&colony), 2);
    colony.assert_invariants();
}

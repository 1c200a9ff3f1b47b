//! The bevy side: fixed-step systems, build requests and event forwarding.

use std::time::Duration;

use bevy::prelude::*;

use crate::events::{ColonyEvent, ItemToBuild};
use crate::test_harness::{run_fixed_ticks, TestColony, TICK_DT};
use crate::tile_pos::TilePos;
use crate::{BuildRequests, ColonyWorld, SimulationPlugin, TickCounter};

fn forwarded(app: &App, matches: impl Fn(&ColonyEvent) -> bool) -> usize {
    app.world()
        .resource::<Events<ColonyEvent>>()
        .iter_current_update_events()
        .filter(|e| matches(e))
        .count()
}

#[test]
fn test_plugin_defaults() {
    let mut app = App::new();
    app.add_plugins(MinimalPlugins).add_plugins(SimulationPlugin);
    assert_eq!(
        app.world().resource::<Time<Fixed>>().timestep(),
        Duration::from_secs_f64(1.0 / 60.0)
    );
    run_fixed_ticks(&mut app, 5);
    assert_eq!(app.world().resource::<TickCounter>().0, 5);
    let world = app.world().resource::<ColonyWorld>();
    assert_eq!(world.grid.width, 32);
    assert!(world.segments.is_empty());
    assert!(world.humans.is_empty());
}

#[test]
fn test_plugin_ticks_the_colony() {
    let mut app = TestColony::from_rows(&["CrrrB"]).app();
    run_fixed_ticks(&mut app, 3);

    let world = app.world().resource::<ColonyWorld>();
    assert_eq!(world.humans.len(), 1, "city hall spawned on the first tick");
    assert!(
        (world.time - 3.0 * f64::from(TICK_DT)).abs() < 1e-6,
        "three fixed steps simulated, got {}",
        world.time
    );
    assert!(world.observers.journal().is_empty(), "journal drained every tick");
    assert_eq!(forwarded(&app, |e| matches!(e, ColonyEvent::HumanCreated { .. })), 1);
}

#[test]
fn test_build_requests_reach_the_world() {
    let mut app = TestColony::from_rows(&["C...B"]).app();
    {
        let mut requests = app.world_mut().resource_mut::<BuildRequests>();
        for x in 1..=3 {
            requests.push(TilePos::new(x, 0), ItemToBuild::Road);
        }
        assert_eq!(requests.len(), 3);
    }
    run_fixed_ticks(&mut app, 1);

    assert!(app.world().resource::<BuildRequests>().is_empty());
    assert_eq!(app.world().resource::<ColonyWorld>().segments.len(), 1);
    assert_eq!(forwarded(&app, |e| matches!(e, ColonyEvent::ItemBuilt { .. })), 3);
}

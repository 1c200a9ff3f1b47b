//! # TestColony: headless harness for colony scenarios
//!
//! Wraps a [`ColonyWorld`] built from an ASCII layout (see [`crate::layout`])
//! with a fluent builder, tick helpers and whole-world invariant checks.
//! [`TestColony::app`] moves the world into a minimal bevy `App` with
//! [`SimulationPlugin`] for tests that go through the ECS.

use std::collections::HashSet;

use bevy::app::App;
use bevy::prelude::*;

use crate::config::SIMULATION_HZ;
use crate::events::{ColonyEvent, ItemToBuild};
use crate::game_params::HumanParams;
use crate::ids::{BuildingId, ResourceId};
use crate::layout::Layout;
use crate::library::BuildingLibrary;
use crate::tile_pos::TilePos;
use crate::world::ColonyWorld;
use crate::SimulationPlugin;

/// Seconds per tick, matching the plugin's fixed timestep.
pub const TICK_DT: f32 = (1.0 / SIMULATION_HZ) as f32;

pub struct TestColony {
    world: ColonyWorld,
}

impl TestColony {
    // -----------------------------------------------------------------------
    // Constructors
    // -----------------------------------------------------------------------

    /// Parse `rows` with the default library and params. Segments are built
    /// and waiting for transporters.
    pub fn from_rows(rows: &[&str]) -> Self {
        let layout = Layout::parse(rows).unwrap_or_else(|e| panic!("bad test layout: {e}"));
        Self {
            world: ColonyWorld::from_layout(layout, BuildingLibrary::default(), HumanParams::default()),
        }
    }

    pub fn from_world(world: ColonyWorld) -> Self {
        Self { world }
    }

    // -----------------------------------------------------------------------
    // Builder methods
    // -----------------------------------------------------------------------

    pub fn with_params(mut self, params: HumanParams) -> Self {
        self.world.params = params;
        self
    }

    /// Drop `count` resources of `code` at `(x, y)`.
    pub fn with_resources(mut self, code: &str, x: i32, y: i32, count: usize) -> Self {
        self.drop_resources(code, x, y, count);
        self
    }

    /// Build an item through the public edit path, panicking on rejection.
    pub fn with_item(mut self, x: i32, y: i32, item: ItemToBuild) -> Self {
        self.build(x, y, item);
        self
    }

    /// Place an unbuilt building by library code.
    pub fn with_construction_site(mut self, code: &str, x: i32, y: i32) -> Self {
        self.build_site(code, x, y);
        self
    }

    // -----------------------------------------------------------------------
    // Edits
    // -----------------------------------------------------------------------

    pub fn build(&mut self, x: i32, y: i32, item: ItemToBuild) {
        let pos = TilePos::new(x, y);
        if let Err(e) = self.world.try_build(pos, item) {
            panic!("building {item:?} at {pos} failed: {e}");
        }
    }

    /// Drop `count` resources of `code` at `(x, y)` mid-scenario.
    pub fn drop_resources(&mut self, code: &str, x: i32, y: i32, count: usize) {
        let kind = self
            .world
            .library
            .resource_by_code(code)
            .unwrap_or_else(|| panic!("no resource {code:?} in the library"));
        for _ in 0..count {
            self.world.add_resource(kind, TilePos::new(x, y));
        }
    }

    /// Place an unbuilt building and return its id.
    pub fn build_site(&mut self, code: &str, x: i32, y: i32) -> BuildingId {
        let kind = self
            .world
            .library
            .building_by_code(code)
            .unwrap_or_else(|| panic!("no building {code:?} in the library"));
        self.build(x, y, ItemToBuild::Building(kind));
        self.building_at(x, y)
    }

    // -----------------------------------------------------------------------
    // Simulation
    // -----------------------------------------------------------------------

    pub fn tick(&mut self, n: u32) {
        for _ in 0..n {
            self.world.update(TICK_DT);
        }
    }

    /// Advance by at least `seconds` of simulated time.
    pub fn tick_seconds(&mut self, seconds: f32) {
        self.tick((seconds / TICK_DT).ceil() as u32);
    }

    /// Tick until `done` holds, at most `max_ticks` times. Returns the number
    /// of ticks taken, or `None` if the condition never held.
    pub fn tick_until(&mut self, max_ticks: u32, done: impl Fn(&ColonyWorld) -> bool) -> Option<u32> {
        for n in 0..max_ticks {
            if done(&self.world) {
                return Some(n);
            }
            self.world.update(TICK_DT);
        }
        done(&self.world).then_some(max_ticks)
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn world(&self) -> &ColonyWorld {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut ColonyWorld {
        &mut self.world
    }

    pub fn into_world(self) -> ColonyWorld {
        self.world
    }

    pub fn segment_count(&self) -> usize {
        self.world.segments.len()
    }

    pub fn human_count(&self) -> usize {
        self.world.humans.len()
    }

    pub fn building_at(&self, x: i32, y: i32) -> BuildingId {
        let pos = TilePos::new(x, y);
        self.world
            .grid
            .element(pos)
            .building_id
            .unwrap_or_else(|| panic!("no building at {pos}"))
    }

    pub fn is_constructed(&self, building: BuildingId) -> bool {
        self.world.buildings.strict(building).constructed
    }

    pub fn resources_at(&self, x: i32, y: i32) -> Vec<ResourceId> {
        self.world
            .resources
            .at(TilePos::new(x, y))
            .map(|(id, _)| id)
            .collect()
    }

    /// Events fired since the last drain, oldest first.
    pub fn events(&self) -> &[ColonyEvent] {
        self.world.observers.journal()
    }

    pub fn count_events(&self, matches: impl Fn(&ColonyEvent) -> bool) -> usize {
        self.events().iter().filter(|e| matches(e)).count()
    }

    // -----------------------------------------------------------------------
    // Assertions
    // -----------------------------------------------------------------------

    #[track_caller]
    pub fn assert_segment_count(&self, expected: usize) {
        let actual = self.segment_count();
        assert_eq!(actual, expected, "expected {expected} segments, got {actual}");
    }

    #[track_caller]
    pub fn assert_human_count(&self, expected: usize) {
        let actual = self.human_count();
        assert_eq!(actual, expected, "expected {expected} humans, got {actual}");
    }

    /// Cross-check segments, humans and resources against each other.
    #[track_caller]
    pub fn assert_invariants(&self) {
        let world = &self.world;
        world.segments.assert_no_overlaps();

        let mut queued = HashSet::new();
        for &segment_id in &world.segments.wo_humans {
            assert!(world.segments.contains(segment_id), "dead segment {segment_id} queued");
            assert!(queued.insert(segment_id), "segment {segment_id} queued twice");
        }

        for (segment_id, segment) in world.segments.iter() {
            segment.graph.assert_is_undirected();
            for &linked in &segment.linked_segments {
                assert!(
                    world.segments.strict(linked).linked_segments.contains(&segment_id),
                    "link {segment_id} -> {linked} is one-way"
                );
            }

            match segment.assigned_human {
                Some(human_id) => {
                    assert!(
                        !queued.contains(&segment_id),
                        "segment {segment_id} has {human_id} and is still queued"
                    );
                    let human = world
                        .humans
                        .get(human_id)
                        .unwrap_or_else(|| panic!("segment {segment_id} assigned to dead {human_id}"));
                    assert_eq!(
                        human.segment_id,
                        Some(segment_id),
                        "{human_id} does not point back at {segment_id}"
                    );
                }
                None => assert!(
                    queued.contains(&segment_id),
                    "segment {segment_id} has no transporter and is not queued"
                ),
            }

            for &resource_id in &segment.resources_to_transport {
                assert!(
                    segment.linked_resources.contains(&resource_id),
                    "{resource_id} queued on {segment_id} but not linked"
                );
            }
            for &resource_id in &segment.linked_resources {
                let resource = world
                    .resources
                    .get(resource_id)
                    .unwrap_or_else(|| panic!("{segment_id} links dead {resource_id}"));
                assert!(
                    resource.transportation_segments.contains(&segment_id),
                    "{segment_id} links {resource_id} whose route skips it"
                );
            }
        }

        for (human_id, human) in world.humans.iter() {
            if let Some(segment_id) = human.segment_id {
                let segment = world
                    .segments
                    .get(segment_id)
                    .unwrap_or_else(|| panic!("{human_id} on dead segment {segment_id}"));
                assert_eq!(
                    segment.assigned_human,
                    Some(human_id),
                    "{segment_id} does not point back at {human_id}"
                );
            }
        }

        for (resource_id, resource) in world.resources.iter() {
            assert_eq!(
                resource.transportation_segments.len(),
                resource.transportation_vertices.len(),
                "{resource_id} route legs are uneven"
            );
            match resource.booking {
                Some(booking) => assert!(
                    world.resources.booking(booking).is_some(),
                    "{resource_id} holds dead booking {booking}"
                ),
                None => assert!(
                    resource.transportation_segments.is_empty(),
                    "{resource_id} has a route without a booking"
                ),
            }
            for &segment_id in &resource.transportation_segments {
                assert!(
                    world.segments.contains(segment_id),
                    "{resource_id} routed over dead segment {segment_id}"
                );
            }
            for human_id in [resource.targeted_human, resource.carrying_human].into_iter().flatten() {
                assert!(
                    world.humans.get(human_id).is_some(),
                    "{resource_id} references dead {human_id}"
                );
            }
        }
    }

    // -----------------------------------------------------------------------
    // ECS
    // -----------------------------------------------------------------------

    /// Move the world into a headless `App` with [`SimulationPlugin`].
    /// Drive it with [`run_fixed_ticks`].
    pub fn app(self) -> App {
        let mut app = App::new();
        app.add_plugins(MinimalPlugins);
        app.add_plugins(SimulationPlugin);
        app.insert_resource(self.world);
        app
    }
}

/// Run the `FixedUpdate` schedule `n` times without waiting on real time.
pub fn run_fixed_ticks(app: &mut App, n: u32) {
    for _ in 0..n {
        app.world_mut().run_schedule(FixedUpdate);
    }
}

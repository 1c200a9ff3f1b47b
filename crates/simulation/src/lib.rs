//! Road-network colony simulation: flood-fill road segmentation, per-segment
//! all-pairs shortest paths, resource booking across segments and the
//! transporter state machine that carries resources to construction sites.

use bevy::prelude::*;

pub mod buildings;
pub mod config;
pub mod events;
pub mod game_params;
pub mod graph;
pub mod grid;
pub mod hash;
pub mod human;
pub mod ids;
pub mod layout;
pub mod library;
pub mod pathfinding_sys;
pub mod resources;
pub mod scratch;
pub mod segment_builder;
pub mod segments;
pub mod sim_rng;
pub mod simulation_sets;
pub mod terrain_generation;
pub mod tile_pos;
pub mod world;

#[cfg(any(test, feature = "bench"))]
pub mod test_harness;


pub use events::{ColonyEvent, ItemToBuild};
pub use simulation_sets::SimulationSet;
pub use world::{BuildError, ColonyWorld};

/// Expensive whole-world checks after every segment update.
pub const SLOW_ASSERTS: bool = cfg!(any(debug_assertions, feature = "slow-asserts"));

// ---------------------------------------------------------------------------
// Core resources
// ---------------------------------------------------------------------------

/// Global tick counter incremented each FixedUpdate.
#[derive(Resource, Default)]
pub struct TickCounter(pub u64);

/// Edits requested through the ECS, applied to the world at the start of the
/// next fixed tick.
#[derive(Resource, Debug, Clone, Default, PartialEq)]
pub struct BuildRequests {
    pending: Vec<(tile_pos::TilePos, ItemToBuild)>,
}

impl BuildRequests {
    pub fn push(&mut self, pos: tile_pos::TilePos, item: ItemToBuild) {
        self.pending.push((pos, item));
    }

    pub fn drain(&mut self) -> Vec<(tile_pos::TilePos, ItemToBuild)> {
        self.pending.drain(..).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }
}

pub struct SimulationPlugin;

impl Plugin for SimulationPlugin {
    fn build(&self, app: &mut App) {
        simulation_sets::configure_simulation_sets(app);

        app.init_resource::<TickCounter>()
            .init_resource::<game_params::GameParams>()
            .init_resource::<sim_rng::SimRng>()
            .init_resource::<ColonyWorld>()
            .init_resource::<BuildRequests>()
            .insert_resource(Time::<Fixed>::from_hz(config::SIMULATION_HZ))
            .add_event::<ColonyEvent>()
            .add_systems(
                FixedUpdate,
                (tick_counter, apply_build_requests).in_set(SimulationSet::PreSim),
            )
            .add_systems(
                FixedUpdate,
                tick_colony_world.in_set(SimulationSet::Simulation),
            )
            .add_systems(
                FixedUpdate,
                forward_colony_events.in_set(SimulationSet::PostSim),
            );
    }
}

pub fn tick_counter(mut tick: ResMut<TickCounter>) {
    tick.0 = tick.0.wrapping_add(1);
}

pub fn apply_build_requests(mut requests: ResMut<BuildRequests>, mut world: ResMut<ColonyWorld>) {
    for (pos, item) in requests.drain() {
        world.queue_build(pos, item);
    }
}

/// Uses the fixed timestep, not the measured delta, so running the schedule
/// by hand advances the colony the same amount.
pub fn tick_colony_world(time: Res<Time<Fixed>>, mut world: ResMut<ColonyWorld>) {
    world.update(time.timestep().as_secs_f32());
}

pub fn forward_colony_events(mut world: ResMut<ColonyWorld>, mut events: EventWriter<ColonyEvent>) {
    for event in world.observers.drain_journal() {
        events.send(event);
    }
}

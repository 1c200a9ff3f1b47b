use std::time::Duration;

use bevy::app::ScheduleRunnerPlugin;
use bevy::log::LogPlugin;
use bevy::prelude::*;

use colony_sim::config::SIMULATION_HZ;
use colony_sim::game_params::GameParams;
use colony_sim::library::BuildingLibrary;
use colony_sim::sim_rng::SimRng;
use colony_sim::terrain_generation::generate_terrain;
use colony_sim::world::demo_map;
use colony_sim::{SimulationPlugin, TickCounter};

mod report;

fn main() {
    let mut app = App::new();

    app.add_plugins(
        MinimalPlugins.set(ScheduleRunnerPlugin::run_loop(Duration::from_secs_f64(
            1.0 / SIMULATION_HZ,
        ))),
    )
    .add_plugins(LogPlugin::default())
    .add_plugins(SimulationPlugin);

    // Params file: COLONY_PARAMS=path/to/params.json
    let mut params = match std::env::var("COLONY_PARAMS") {
        Ok(path) => load_params(&path),
        Err(_) => GameParams::default(),
    };

    // The demo map does not fit below 14x10.
    params.world.width = params.world.width.max(14);
    params.world.height = params.world.height.max(10);
    let mut world = demo_map(
        BuildingLibrary::default(),
        params.humans.clone(),
        params.world.width,
        params.world.height,
    );
    let mut rng = SimRng::from_seed_u64(params.world.seed);
    generate_terrain(&mut world.grid, &params, &mut rng);
    info!(
        "colony ready: {}x{} tiles, {} segments, seed {}",
        params.world.width,
        params.world.height,
        world.segments.len(),
        params.world.seed
    );

    app.insert_resource(world)
        .insert_resource(params)
        .insert_resource(rng)
        .add_systems(Update, report::log_colony_events);

    // Run a fixed number of ticks and exit: COLONY_TICKS=600
    if let Ok(ticks) = std::env::var("COLONY_TICKS") {
        match ticks.parse::<u64>() {
            Ok(limit) => {
                app.insert_resource(TickLimit(limit));
                app.add_systems(Update, exit_after_tick_limit);
            }
            Err(e) => warn!("ignoring COLONY_TICKS={ticks:?}: {e}"),
        }
    }

    app.run();
}

fn load_params(path: &str) -> GameParams {
    let parsed = std::fs::read_to_string(path)
        .map_err(|e| e.to_string())
        .and_then(|json| GameParams::from_json(&json));
    match parsed {
        Ok(params) => {
            info!("loaded params from {path}");
            params
        }
        Err(e) => {
            warn!("failed to load params from {path}: {e}; using defaults");
            GameParams::default()
        }
    }
}

#[derive(Resource)]
struct TickLimit(u64);

fn exit_after_tick_limit(
    tick: Res<TickCounter>,
    limit: Res<TickLimit>,
    mut exit: EventWriter<AppExit>,
) {
    if tick.0 >= limit.0 {
        info!("reached {} ticks, exiting", tick.0);
        exit.send(AppExit::Success);
    }
}

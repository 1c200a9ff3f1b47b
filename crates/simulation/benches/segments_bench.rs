//! Criterion benchmarks for segment building and whole-world ticks.
//!
//! Benchmarks:
//!   - full rebuild of a flag lattice at three sizes
//!   - incremental update after toggling one flag
//!   - shortest-path tables for one large segment
//!   - one tick of a staffed colony
//!
//! Run with: cargo bench -p colony_sim --bench segments_bench --features bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use colony_sim::config::DEFAULT_PLAYER_ID;
use colony_sim::game_params::HumanParams;
use colony_sim::grid::{ElementTile, WorldGrid};
use colony_sim::library::BuildingLibrary;
use colony_sim::scratch::ScratchArena;
use colony_sim::segment_builder::{build_graph_segments, TileUpdate};
use colony_sim::test_harness::TestColony;
use colony_sim::tile_pos::TilePos;
use colony_sim::ColonyWorld;

// ---------------------------------------------------------------------------
// Fixture: road lattice with a flag on every crossing
// ---------------------------------------------------------------------------

/// Roads every `spacing` tiles in both directions, flags where they cross.
fn lattice(size: i32, spacing: i32) -> WorldGrid {
    let mut grid = WorldGrid::new(size, size);
    for pos in grid.positions().collect::<Vec<_>>() {
        let on_x = pos.x % spacing == 0;
        let on_y = pos.y % spacing == 0;
        let tile = match (on_x, on_y) {
            (true, true) => ElementTile::flag(DEFAULT_PLAYER_ID),
            (true, false) | (false, true) => ElementTile::road(DEFAULT_PLAYER_ID),
            (false, false) => continue,
        };
        grid.set_element(pos, tile);
    }
    grid
}

fn bench_full_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("build_graph_segments");
    group.sample_size(20);
    let scratch = ScratchArena::default();

    for size in [33, 65, 129] {
        let grid = lattice(size, 4);
        group.bench_with_input(BenchmarkId::from_parameter(size), &grid, |b, grid| {
            b.iter(|| black_box(build_graph_segments(grid, &scratch)));
        });
    }
    group.finish();
}

fn bench_flag_toggle(c: &mut Criterion) {
    let mut group = c.benchmark_group("update_tiles");
    let mut world = ColonyWorld::new(lattice(65, 4), BuildingLibrary::default(), HumanParams::default());
    world.rebuild_segments();
    let pos = TilePos::new(34, 32);

    group.bench_function("toggle_flag", |b| {
        b.iter(|| {
            world.grid.set_element(pos, ElementTile::flag(DEFAULT_PLAYER_ID));
            black_box(world.update_tiles(&[(pos, TileUpdate::FlagPlaced)]));
            world.grid.set_element(pos, ElementTile::road(DEFAULT_PLAYER_ID));
            black_box(world.update_tiles(&[(pos, TileUpdate::FlagRemoved)]));
        });
    });
    group.finish();
}

// ---------------------------------------------------------------------------
// Benchmark: all-pairs tables for one big segment
// ---------------------------------------------------------------------------

fn bench_calculate_data(c: &mut Criterion) {
    let mut group = c.benchmark_group("calculate_graph_data");
    group.sample_size(10);

    // Without flags the whole lattice is one segment bounded by two buildings.
    for size in [9, 17, 25] {
        let mut grid = lattice(size, 4);
        for pos in grid.positions().collect::<Vec<_>>() {
            if grid.element(pos).is_vertex() {
                grid.set_element(pos, ElementTile::road(DEFAULT_PLAYER_ID));
            }
        }
        let mut world = ColonyWorld::new(grid, BuildingLibrary::default(), HumanParams::default());
        if let Some(kind) = world.library.building_by_code("sawmill") {
            world.place_building(TilePos::new(1, 1), kind, true);
            world.place_building(TilePos::new(size - 2, size - 2), kind, true);
        }
        let segments = build_graph_segments(&world.grid, &world.scratch);
        let Some(segment) = segments.into_iter().max_by_key(|s| s.graph.non_zero_nodes_count) else {
            panic!("lattice of size {size} built no segments");
        };

        group.bench_with_input(BenchmarkId::from_parameter(size), &segment, |b, segment| {
            b.iter(|| {
                let mut graph = segment.graph.clone();
                graph.calculate_data();
                black_box(graph.center())
            });
        });
    }
    group.finish();
}

// ---------------------------------------------------------------------------
// Benchmark: whole-world tick
// ---------------------------------------------------------------------------

fn bench_colony_tick(c: &mut Criterion) {
    let mut group = c.benchmark_group("colony_tick");
    let rows = [
        "..........r..........",
        "..........r..........",
        "CrrFrrFrrFrrFrrFrrFrr",
        "..........r..........",
        "..........r..........",
    ];
    let mut colony = TestColony::from_rows(&rows);
    colony.tick_seconds(30.0);

    group.bench_function("staffed_line", |b| {
        b.iter(|| colony.tick(1));
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_full_build,
    bench_flag_toggle,
    bench_calculate_data,
    bench_colony_tick,
);
criterion_main!(benches);

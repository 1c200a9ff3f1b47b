//! Incremental segment updates after single-tile edits, checked against a
//! full rebuild of the same grid.
//!
//! Run: cargo test -p colony_sim --test tile_updates

use colony_sim::game_params::HumanParams;
use colony_sim::grid::{ElementTile, WorldGrid};
use colony_sim::layout::Layout;
use colony_sim::library::{BuildingKind, BuildingLibrary};
use colony_sim::scratch::ScratchArena;
use colony_sim::segment_builder::{build_graph_segments, TileUpdate};
use colony_sim::tile_pos::TilePos;
use colony_sim::ColonyWorld;

fn world(rows: &[&str]) -> ColonyWorld {
    let layout = Layout::parse(rows).unwrap_or_else(|e| panic!("bad layout {rows:?}: {e}"));
    ColonyWorld::from_layout(layout, BuildingLibrary::default(), HumanParams::default())
}

/// The live store must hold what a rebuild from scratch would produce.
#[track_caller]
fn assert_matches_full_build(world: &ColonyWorld) {
    world.segments.assert_no_overlaps();
    let rebuilt = build_graph_segments(&world.grid, &ScratchArena::default());
    assert_eq!(world.segments.len(), rebuilt.len(), "incremental and full builds disagree");
    for segment in &rebuilt {
        let mut vertices = segment.vertices.clone();
        vertices.sort_by_key(|p| (p.y, p.x));
        let found = world.segments.iter().any(|(_, live)| {
            let mut live_vertices = live.vertices.clone();
            live_vertices.sort_by_key(|p| (p.y, p.x));
            live_vertices == vertices && live.graph.nodes == segment.graph.nodes
        });
        assert!(found, "no live segment matches one with vertices {vertices:?}");
    }
}

fn set(world: &mut ColonyWorld, x: i32, y: i32, tile: ElementTile, update: TileUpdate) -> (usize, usize) {
    let pos = TilePos::new(x, y);
    world.grid.set_element(pos, tile);
    let counts = world.update_tiles(&[(pos, update)]);
    assert_matches_full_build(world);
    counts
}

fn road(world: &mut ColonyWorld, x: i32, y: i32) -> (usize, usize) {
    set(world, x, y, ElementTile::road(0), TileUpdate::RoadPlaced)
}

fn flag(world: &mut ColonyWorld, x: i32, y: i32) -> (usize, usize) {
    set(world, x, y, ElementTile::flag(0), TileUpdate::FlagPlaced)
}

fn building(world: &mut ColonyWorld, x: i32, y: i32) -> (usize, usize) {
    let kind = world
        .library
        .first_of_kind(BuildingKind::Produce)
        .expect("default library has a produce building");
    let pos = TilePos::new(x, y);
    world.place_building(pos, kind, true);
    let counts = world.update_tiles(&[(pos, TileUpdate::BuildingPlaced)]);
    assert_matches_full_build(world);
    counts
}

fn remove_building(world: &mut ColonyWorld, x: i32, y: i32) -> (usize, usize) {
    let pos = TilePos::new(x, y);
    let id = world.grid.element(pos).building_id.expect("building tile");
    world.buildings.remove(id);
    set(world, x, y, ElementTile::default(), TileUpdate::BuildingRemoved)
}

#[test]
fn test_growing_a_road_grid() {
    let mut w = ColonyWorld::new(WorldGrid::new(3, 2), BuildingLibrary::default(), HumanParams::default());
    assert_eq!(road(&mut w, 0, 0), (0, 0));
    assert_eq!(road(&mut w, 1, 0), (0, 0));
    assert_eq!(road(&mut w, 2, 0), (0, 0));
    assert_eq!(road(&mut w, 0, 1), (0, 0));
    assert_eq!(road(&mut w, 1, 1), (0, 0));
    assert_eq!(flag(&mut w, 0, 0), (0, 0), "a lone flag bounds nothing");
    assert_eq!(flag(&mut w, 1, 1), (2, 0), "two routes between the flags");
    assert_eq!(flag(&mut w, 2, 0), (1, 1));
    assert_eq!(flag(&mut w, 1, 0), (0, 1), "adjacent flags leave no road");
    assert_eq!(w.segments.len(), 1);
}

#[test]
fn test_flag_on_a_dead_end_road() {
    let mut w = world(&["rF.", "FrF"]);
    assert_eq!(w.segments.len(), 2);
    assert_eq!(flag(&mut w, 1, 0), (0, 1));
}

#[test]
fn test_flag_removed_between_flags() {
    let mut w = world(&[".F.", "FFF"]);
    assert!(w.segments.is_empty());
    assert_eq!(set(&mut w, 1, 0, ElementTile::road(0), TileUpdate::FlagRemoved), (1, 0));
}

#[test]
fn test_flag_splits_one_side_of_a_loop() {
    let mut w = world(&["Frr", "r.r", "rrF"]);
    assert_eq!(w.segments.len(), 2);
    assert_eq!(flag(&mut w, 2, 2), (2, 1));
}

#[test]
fn test_building_placed() {
    let mut w = world(&[".B", "CF"]);
    assert_eq!(building(&mut w, 0, 1), (0, 0), "no road to join");

    let mut w = world(&["..", "CF"]);
    assert_eq!(building(&mut w, 1, 1), (0, 0));

    let mut w = world(&["..", "Cr"]);
    assert_eq!(building(&mut w, 1, 1), (1, 0), "the road gets its second vertex");
}

#[test]
fn test_building_removed() {
    let mut w = world(&[".B", "Cr"]);
    assert_eq!(remove_building(&mut w, 1, 1), (0, 1));

    let mut w = world(&[".B.", "CrB"]);
    assert_eq!(remove_building(&mut w, 1, 1), (1, 1), "the rest of the road survives");
}

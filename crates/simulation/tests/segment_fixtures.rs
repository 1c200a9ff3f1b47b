//! Full segment builds over small ASCII maps.
//!
//! Rows are top-first. `C` city hall, `B` building, `S` one shared sawmill,
//! `F` flag, `r` road.
//!
//! Run: cargo test -p colony_sim --test segment_fixtures

use colony_sim::layout::Layout;
use colony_sim::scratch::ScratchArena;
use colony_sim::segment_builder::build_graph_segments;
use colony_sim::segments::SegmentStore;
use colony_sim::tile_pos::TilePos;

fn count(rows: &[&str]) -> usize {
    let layout = Layout::parse(rows).unwrap_or_else(|e| panic!("bad layout {rows:?}: {e}"));
    let segments = build_graph_segments(&layout.grid, &ScratchArena::default());
    for segment in &segments {
        segment.graph.assert_is_undirected();
        assert!(segment.vertices.len() > 1, "{rows:?}: segment with one vertex");
    }
    segments.len()
}

#[track_caller]
fn check(rows: &[&str], expected: usize) {
    assert_eq!(count(rows), expected, "segment count for {rows:?}");
}

// ---------------------------------------------------------------------------
// 1. Two-tile and one-line maps
// ---------------------------------------------------------------------------

#[test]
fn test_tiny_maps() {
    check(&[".B", "Cr"], 1);
    check(&["..", "Cr"], 0);
    check(&["..", "CB"], 0);
    check(&["BB", "CB"], 0);
    check(&[".B", "CF"], 0);
    check(&["FB", "Cr"], 1);
    check(&["FF", "CB"], 0);
    check(&["FB", "CF"], 0);
}

#[test]
fn test_single_lines() {
    check(&["CrB"], 1);
    check(&["CFB"], 0);
    check(&["BFCFB"], 0);
    check(&["CrrFrB"], 2);
    check(&["CrrrrB"], 1);
    check(&["BrCrB"], 2);
}

#[test]
fn test_parallel_roads_merge() {
    check(&["rrrrrr", "CrrrrB"], 1);
    check(&["B.B", "r.r", "B.B"], 2);
    check(&["BrB", "...", "BrB"], 2);
}

// ---------------------------------------------------------------------------
// 2. Crossings around a vertex
// ---------------------------------------------------------------------------

#[test]
fn test_vertex_with_four_arms() {
    check(&["...B..", "...r..", "BrrCrB", "...r..", "...B.."], 4);
    check(&["..B..", "..r..", "CrFrB", "..r..", "..B.."], 4);
}

#[test]
fn test_arms_joined_by_roads() {
    check(&["...B..", "..rrr.", "BrrCrB", "...r..", "...B.."], 2);
    check(&["...B..", "..rFr.", "BrrCrB", "...r..", "...B.."], 3);
    check(&["...B..", "..rrr.", "CrrFrB"], 1);
    check(&["...B..", "..rrr.", "CrrFrB", "...r..", "...B.."], 2);
    check(&["...B..", "..rrr.", "BrrCrB", "..rrr.", "...B.."], 1);
    check(&["...B..", "..rrr.", "BrrCrB", "..rr..", "...B.."], 1);
}

#[test]
fn test_buildings_around_one_road() {
    check(&[".B.", "CrB", ".B."], 1);
    check(&[".B.", "CFB", ".B."], 0);
    check(&["CrF", ".rB"], 1);
}

// ---------------------------------------------------------------------------
// 3. Multi-tile buildings
// ---------------------------------------------------------------------------

#[test]
fn test_sawmill_faces_share_segments() {
    check(&["...B...", "..rrrr.", "CrrSSrB", "....rr."], 1);
    check(&["...B...", "..rFrr.", "CrrSSrB", "....rr."], 2);
    check(&["...B...", "..rFFr.", "CrrSSrB", "....rr."], 2);
    check(&["...B...", "..rrFr.", "CrrSSrB", "....rr."], 2);
    check(&["CrFr", ".rSS"], 2);
    check(&["Crrr", ".rSS"], 1);
}

// ---------------------------------------------------------------------------
// 4. Shape of the built segments
// ---------------------------------------------------------------------------

#[test]
fn test_loop_between_two_flags_is_two_segments() {
    let layout = Layout::parse(&["Frr", "r.r", "rrF"]).expect("valid layout");
    let mut store = SegmentStore::default();
    for segment in build_graph_segments(&layout.grid, &ScratchArena::default()) {
        store.add_and_link(segment);
    }
    assert_eq!(store.len(), 2, "each side of the loop is its own segment");
    store.assert_no_overlaps();

    let flags = [TilePos::new(0, 2), TilePos::new(2, 0)];
    for (id, segment) in store.iter() {
        let mut vertices = segment.vertices.clone();
        vertices.sort_by_key(|p| (p.y, p.x));
        assert_eq!(vertices, vec![flags[1], flags[0]], "{id} joins both flags");
        assert_eq!(segment.linked_segments.len(), 1, "{id} shares its flags with the other side");
    }
}

#[test]
fn test_rebuild_is_stable() {
    let rows = ["...B...", "..rFrr.", "CrrSSrB", "....rr."];
    let layout = Layout::parse(&rows).expect("valid layout");
    let scratch = ScratchArena::default();
    let first = build_graph_segments(&layout.grid, &scratch);
    let second = build_graph_segments(&layout.grid, &scratch);
    assert_eq!(first, second, "same grid, same segments");
    assert_eq!(scratch.used(), 0, "every lease returned");
}

//! Flood-fill that cuts the road network into segments.
//!
//! Vertices (buildings and flags) bound segments; roads are traversed. Every
//! pass starts from one `(direction, position)` seed of the big queue and
//! grows a local BFS, marking traversed edges in a shared `visited` grid so no
//! edge is claimed twice. A pass that touches at least two vertices becomes a
//! candidate [`GraphSegment`].
//!
//! The full build seeds from the first vertex of the map and follows every
//! vertex it reaches (plus a rescan for islands). The incremental path only
//! seeds around edited tiles and rebuilds the segments those edits broke.

use std::collections::VecDeque;

use bevy::log::debug_span;

use crate::config::QUEUES_SCALE;
use crate::graph::Graph;
use crate::grid::WorldGrid;
use crate::ids::SegmentId;
use crate::scratch::ScratchArena;
use crate::segments::{GraphSegment, SegmentStore};
use crate::tile_pos::{Direction, TilePos};

pub type DirPos = (Direction, TilePos);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TileUpdate {
    RoadPlaced,
    RoadRemoved,
    FlagPlaced,
    FlagRemoved,
    BuildingPlaced,
    BuildingRemoved,
}

/// Result of planning an incremental rebuild.
#[derive(Debug, Default)]
pub struct SegmentChanges {
    pub to_add: Vec<GraphSegment>,
    pub to_delete: Vec<SegmentId>,
}

fn push_unique(list: &mut Vec<TilePos>, pos: TilePos) {
    if !list.contains(&pos) {
        list.push(pos);
    }
}

/// Seed every direction of `pos` that isn't marked in `visited`.
fn push_unmarked(big_queue: &mut VecDeque<DirPos>, visited: u8, pos: TilePos) {
    for dir in Direction::ALL {
        if !dir.is_set(visited) {
            big_queue.push_back((dir, pos));
        }
    }
}

/// Drain `big_queue`, returning one candidate per pass that reached two or
/// more vertices.
pub fn update_graphs(
    grid: &WorldGrid,
    big_queue: &mut VecDeque<DirPos>,
    visited: &mut [u8],
    full_build: bool,
    scratch: &ScratchArena,
) -> Vec<GraphSegment> {
    let _span = debug_span!("update_graphs", full_build).entered();
    let _temp = scratch.temp_usage();

    let tiles_count = grid.tiles_count();
    assert_eq!(visited.len(), tiles_count, "visited grid does not match the map");

    // Seed positions a full build has already expanded from. Separate from
    // `visited`: a vertex can be popped without any edge being taken.
    let mut reached = scratch.lease_zeroed::<bool>(if full_build { tiles_count } else { 0 });
    let mut queue = scratch.lease_queue::<DirPos>(tiles_count * QUEUES_SCALE);
    let mut temp_nodes = scratch.lease_zeroed::<u8>(tiles_count);
    let mut touched = scratch.lease_vec::<usize>(tiles_count);
    let mut vertices = scratch.lease_vec::<TilePos>(tiles_count.min(64));

    let mut added = Vec::new();

    while let Some(seed) = big_queue.pop_front() {
        queue.clear();
        vertices.clear();
        queue.push_back(seed);
        if full_build {
            reached[grid.index(seed.1)] = true;
        }

        while let Some((dir, pos)) = queue.pop_front() {
            let pos_index = grid.index(pos);
            if full_build {
                reached[pos_index] = true;
            }

            let tile = *grid.element(pos);
            let is_vertex = tile.is_vertex();
            if is_vertex {
                push_unique(&mut vertices, pos);
            }

            for d in Direction::ALL {
                // A vertex only leaves through the side it was seeded on.
                if is_vertex && d != dir {
                    continue;
                }
                if d.is_set(visited[pos_index]) {
                    continue;
                }
                let new_pos = pos.step(d);
                if !grid.in_bounds(new_pos) {
                    continue;
                }
                let new_index = grid.index(new_pos);
                let opposite = d.opposite();
                if opposite.is_set(visited[new_index]) {
                    continue;
                }
                let new_tile = grid.element(new_pos);
                if new_tile.is_none() {
                    continue;
                }
                let new_is_vertex = new_tile.is_vertex();

                if is_vertex && new_is_vertex {
                    // Faces of one multi-tile building: hand the neighbour's
                    // remaining sides to the big queue.
                    if tile.building_id == new_tile.building_id {
                        opposite.mark(&mut visited[new_index]);
                        push_unmarked(big_queue, visited[new_index], new_pos);
                    }
                    continue;
                }

                d.mark(&mut visited[pos_index]);
                opposite.mark(&mut visited[new_index]);
                for (index, bit) in [(pos_index, d), (new_index, opposite)] {
                    if temp_nodes[index] == 0 {
                        touched.push(index);
                    }
                    bit.mark(&mut temp_nodes[index]);
                }

                if full_build && new_is_vertex {
                    push_unmarked(big_queue, visited[new_index], new_pos);
                }

                if new_is_vertex {
                    push_unique(&mut vertices, new_pos);
                } else {
                    queue.push_back((Direction::Right, new_pos));
                }
            }
        }

        if full_build && big_queue.is_empty() {
            for pos in grid.positions() {
                let i = grid.index(pos);
                if grid.element(pos).is_vertex() && visited[i] == 0 && !reached[i] {
                    for d in Direction::ALL {
                        big_queue.push_back((d, pos));
                    }
                }
            }
        }

        if vertices.len() > 1 {
            assert!(!touched.is_empty(), "segment with {} vertices but no edges", vertices.len());
            added.push(cut_segment(grid, &temp_nodes, &touched, &vertices));
        }

        for &i in touched.iter() {
            temp_nodes[i] = 0;
        }
        touched.clear();
    }

    added
}

/// Copy the touched part of the temp graph into a tight rectangle.
fn cut_segment(grid: &WorldGrid, temp_nodes: &[u8], touched: &[usize], vertices: &[TilePos]) -> GraphSegment {
    let mut min = grid.size();
    let mut max = TilePos::new(-1, -1);
    for &i in touched {
        let p = grid.pos_of(i);
        min = TilePos::new(min.x.min(p.x), min.y.min(p.y));
        max = TilePos::new(max.x.max(p.x), max.y.max(p.y));
    }
    let size = max - min + TilePos::new(1, 1);
    debug_assert!(size.x > 0 && size.y > 0);

    let mut nodes = Vec::with_capacity((size.x * size.y) as usize);
    for y in min.y..=max.y {
        let row = grid.index(TilePos::new(min.x, y));
        nodes.extend_from_slice(&temp_nodes[row..row + size.x as usize]);
    }

    GraphSegment::new(vertices.to_vec(), Graph::new(size, min, nodes))
}

/// Full rebuild from scratch. Returns nothing on a map without vertices.
pub fn build_graph_segments(grid: &WorldGrid, scratch: &ScratchArena) -> Vec<GraphSegment> {
    let Some(first) = grid.positions().find(|&p| grid.element(p).is_vertex()) else {
        return Vec::new();
    };

    let tiles_count = grid.tiles_count();
    let _temp = scratch.temp_usage();
    let mut big_queue = scratch.lease_queue::<DirPos>(tiles_count * QUEUES_SCALE);
    for d in Direction::ALL {
        big_queue.push_back((d, first));
    }
    let mut visited = scratch.lease_zeroed::<u8>(tiles_count);

    update_graphs(grid, &mut big_queue, &mut visited, true, scratch)
}

/// Whether `segment` is invalidated by any of `updates`. The grid is the
/// state after the edits.
pub fn should_segment_be_deleted(
    grid: &WorldGrid,
    updates: &[(TilePos, TileUpdate)],
    segment: &GraphSegment,
) -> bool {
    updates.iter().any(|&(pos, kind)| match kind {
        TileUpdate::RoadPlaced | TileUpdate::BuildingPlaced => grid
            .neighbors4(pos)
            .any(|(_, n)| segment.graph.has_node(n) && grid.element(n).is_road()),
        TileUpdate::FlagPlaced
        | TileUpdate::FlagRemoved
        | TileUpdate::RoadRemoved
        | TileUpdate::BuildingRemoved => grid.in_bounds(pos) && segment.graph.has_node(pos),
    })
}

fn seed_update(grid: &WorldGrid, pos: TilePos, kind: TileUpdate, big_queue: &mut VecDeque<DirPos>) {
    for (dir, n) in grid.neighbors4(pos) {
        let tile = grid.element(n);
        match kind {
            TileUpdate::RoadPlaced | TileUpdate::FlagRemoved => {
                if !tile.is_none() {
                    big_queue.push_back((dir, pos));
                }
            }
            TileUpdate::FlagPlaced => {
                if tile.is_road() {
                    big_queue.push_back((dir, pos));
                }
            }
            TileUpdate::RoadRemoved => {
                if !tile.is_none() {
                    for d in Direction::ALL {
                        big_queue.push_back((d, n));
                    }
                }
            }
            TileUpdate::BuildingPlaced | TileUpdate::BuildingRemoved => {
                if tile.is_road() {
                    for d in Direction::ALL {
                        big_queue.push_back((d, n));
                    }
                }
            }
        }
    }
}

/// Plan the segment changes for a batch of edits already applied to `grid`.
pub fn plan_tile_updates(
    grid: &WorldGrid,
    segments: &SegmentStore,
    updates: &[(TilePos, TileUpdate)],
    scratch: &ScratchArena,
) -> SegmentChanges {
    let _span = debug_span!("plan_tile_updates", updates = updates.len()).entered();
    assert!(!updates.is_empty(), "tile update batch is empty");

    let to_delete: Vec<SegmentId> = segments
        .iter()
        .filter(|(_, s)| should_segment_be_deleted(grid, updates, s))
        .map(|(id, _)| id)
        .collect();

    let tiles_count = grid.tiles_count();
    let _temp = scratch.temp_usage();
    let mut big_queue = scratch.lease_queue::<DirPos>(tiles_count * QUEUES_SCALE);
    for &(pos, kind) in updates {
        seed_update(grid, pos, kind, &mut big_queue);
    }
    let mut visited = scratch.lease_zeroed::<u8>(tiles_count);
    let to_add = update_graphs(grid, &mut big_queue, &mut visited, false, scratch);

    SegmentChanges { to_add, to_delete }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::Layout;

    fn build(rows: &[&str]) -> (WorldGrid, Vec<GraphSegment>) {
        let layout = Layout::parse(rows).expect("valid layout");
        let grid = layout.grid;
        let segments = build_graph_segments(&grid, &ScratchArena::default());
        (grid, segments)
    }

    #[test]
    fn test_empty_map_has_no_segments() {
        let (_, segments) = build(&["...", "..."]);
        assert!(segments.is_empty());
    }

    #[test]
    fn test_line_segment_shape() {
        let (_, segments) = build(&["CrB"]);
        assert_eq!(segments.len(), 1);
        let s = &segments[0];
        assert_eq!(s.vertices.len(), 2);
        assert!(s.vertices.contains(&TilePos::new(0, 0)));
        assert!(s.vertices.contains(&TilePos::new(2, 0)));
        assert_eq!(s.graph.size, TilePos::new(3, 1));
        assert_eq!(s.graph.offset, TilePos::new(0, 0));
        assert_eq!(s.graph.nodes, vec![0b0001, 0b0101, 0b0100]);
        assert_eq!(s.graph.non_zero_nodes_count, 3);
    }

    #[test]
    fn test_bounding_box_is_tight() {
        let (_, segments) = build(&["....", ".CrB", "...."]);
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].graph.offset, TilePos::new(1, 1));
        assert_eq!(segments[0].graph.size, TilePos::new(3, 1));
    }

    #[test]
    fn test_vertex_is_recorded_once() {
        // The pass forks at (1,0) and reaches the building from two sides.
        let (_, segments) = build(&[".rr", "CrB"]);
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].vertices.len(), 2, "{:?}", segments[0].vertices);
    }

    #[test]
    fn test_every_candidate_is_undirected() {
        let (_, segments) = build(&["...B..", "..rFr.", "BrrCrB", "...r..", "...B.."]);
        assert_eq!(segments.len(), 3);
        for s in &segments {
            s.graph.assert_is_undirected();
        }
    }

    #[test]
    fn test_should_delete_on_road_next_to_segment_road() {
        let (mut grid, segments) = build(&[".B", "Cr"]);
        let pos = TilePos::new(0, 1);
        grid.set_element(pos, crate::grid::ElementTile::road(0));
        let updates = [(pos, TileUpdate::RoadPlaced)];
        assert!(
            !should_segment_be_deleted(&grid, &updates, &segments[0]),
            "only roads adjacent to the new tile invalidate; (0,1) touches C and B"
        );
    }

    #[test]
    fn test_should_delete_on_flag_inside_segment() {
        let (mut grid, segments) = build(&["CrrB"]);
        let pos = TilePos::new(1, 0);
        grid.set_element(pos, crate::grid::ElementTile::flag(0));
        assert!(should_segment_be_deleted(&grid, &[(pos, TileUpdate::FlagPlaced)], &segments[0]));
        let far = TilePos::new(5, 5);
        assert!(!should_segment_be_deleted(&grid, &[(far, TileUpdate::FlagRemoved)], &segments[0]));
    }
}

use std::cell::Cell;

use bevy::prelude::*;
use pathfinding::prelude::bfs;

use crate::graph::Graph;
use crate::grid::WorldGrid;
use crate::tile_pos::{Direction, TilePos};

/// Upper bound on the length of a non-looping walk on a `size` grid. Used as
/// the expansion ceiling for world searches.
pub fn longest_meaningful_path(size: TilePos) -> usize {
    let a = size.x.min(size.y);
    let b = size.x.max(size.y);
    let half_up = |v: i32| (v + 1) / 2;
    let v1 = a / 2 + half_up(a) * b;
    let v2 = b / 2 + half_up(b) * a;
    v1.max(v2) as usize
}

/// 4-directional BFS over the whole map, ignoring element tiles.
///
/// Returns `source..=destination`, or an empty path when they coincide. With
/// `avoid_harvestable` set, tiles carrying trees are never entered.
pub fn find_path(
    grid: &WorldGrid,
    source: TilePos,
    destination: TilePos,
    avoid_harvestable: bool,
) -> Option<Vec<TilePos>> {
    if source == destination {
        return Some(Vec::new());
    }

    let ceiling = longest_meaningful_path(grid.size()) * 4;
    let expansions = Cell::new(0usize);

    let path = bfs(
        &source,
        |&pos| {
            expansions.set(expansions.get() + 1);
            Direction::ALL.into_iter().filter_map(move |dir| {
                let next = pos.step(dir);
                if !grid.in_bounds(next) {
                    return None;
                }
                if avoid_harvestable && grid.terrain(next).resource_amount > 0 {
                    return None;
                }
                Some(next)
            })
        },
        |&pos| pos == destination,
    );

    if expansions.get() > ceiling {
        warn!(
            "find_path {source} -> {destination} took {} expansions (ceiling {ceiling})",
            expansions.get()
        );
    }
    path
}

/// Shortest path between two nodes of a finalised graph, read back from the
/// predecessor table.
///
/// Both endpoints are world positions inside the graph. Returns
/// `source..=destination`, empty when they coincide, `None` when the nodes
/// are not connected.
pub fn find_path_inside_graph(graph: &Graph, source: TilePos, destination: TilePos) -> Option<Vec<TilePos>> {
    assert!(graph.contains(source), "source {source} outside graph at {}", graph.offset);
    assert!(
        graph.contains(destination),
        "destination {destination} outside graph at {}",
        graph.offset
    );

    if source == destination {
        return Some(Vec::new());
    }

    let data = graph.data();
    let Some(src) = graph.node_index(source) else {
        panic!("source {source} is not a graph node");
    };
    let Some(mut dst) = graph.node_index(destination) else {
        panic!("destination {destination} is not a graph node");
    };
    if data.prev(src, dst) < 0 {
        return None;
    }

    let n = data.node_count;
    let mut path = Vec::with_capacity(n);
    path.push(destination);

    let mut iterations = 0;
    while src != dst {
        iterations += 1;
        assert!(iterations <= n, "predecessor table has a cycle towards {destination}");
        let prev = data.prev(src, dst);
        assert!(prev >= 0 && (prev as usize) < n, "bad predecessor {prev}");
        dst = prev as usize;
        path.push(data.node_index_to_pos[dst] + graph.offset);
    }
    path.reverse();

    for p in &path {
        assert!(graph.contains(*p), "path leaves the graph at {p}");
    }
    for w in path.windows(2) {
        assert!(
            Direction::from_offset(w[1] - w[0]).is_some(),
            "path jumps from {} to {}",
            w[0],
            w[1]
        );
    }
    Some(path)
}

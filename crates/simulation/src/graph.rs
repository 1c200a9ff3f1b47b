//! Per-segment connectivity graph.
//!
//! A [`Graph`] is a tight rectangle of direction bytes cut out of the map,
//! plus an offset back to world coordinates. Once a segment is finalised its
//! graph gets [`CalculatedGraphData`]: all-pairs distances and predecessors
//! (Floyd–Warshall) and the center node used as a transporter's idle spot.

use bevy::log::debug_span;
use serde::{Deserialize, Serialize};

use crate::tile_pos::{Direction, TilePos};

/// Sentinel for "no path" in `dist`.
pub const INFINITE_DIST: i16 = i16::MAX;
/// Sentinel for "no predecessor" in `prev`.
pub const NO_PREV: i16 = i16::MIN;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalculatedGraphData {
    pub node_count: usize,
    /// `dist[i * n + j]`: edges from node `i` to node `j`.
    pub dist: Vec<i16>,
    /// `prev[i * n + j]`: node before `j` on the shortest path from `i`.
    pub prev: Vec<i16>,
    /// Dense node index to graph-local position.
    pub node_index_to_pos: Vec<TilePos>,
    /// Graph-local tile index to dense node index, `-1` for empty tiles.
    pub pos_to_node_index: Vec<i16>,
    /// World position of the center node.
    pub center: TilePos,
}

impl CalculatedGraphData {
    #[inline]
    pub fn dist(&self, from: usize, to: usize) -> i16 {
        self.dist[from * self.node_count + to]
    }

    #[inline]
    pub fn prev(&self, from: usize, to: usize) -> i16 {
        self.prev[from * self.node_count + to]
    }

    /// Largest distance from `node` to any other node.
    pub fn eccentricity(&self, node: usize) -> i16 {
        (0..self.node_count)
            .map(|j| self.dist(node, j))
            .max()
            .unwrap_or(0)
    }

    pub fn radius(&self) -> i16 {
        (0..self.node_count)
            .map(|i| self.eccentricity(i))
            .min()
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Graph {
    pub nodes: Vec<u8>,
    pub size: TilePos,
    pub offset: TilePos,
    pub non_zero_nodes_count: usize,
    pub data: Option<CalculatedGraphData>,
}

impl Graph {
    pub fn new(size: TilePos, offset: TilePos, nodes: Vec<u8>) -> Self {
        assert_eq!(
            nodes.len(),
            (size.x * size.y) as usize,
            "graph nodes do not match size {size}"
        );
        let non_zero_nodes_count = nodes.iter().filter(|&&n| n != 0).count();
        Self {
            nodes,
            size,
            offset,
            non_zero_nodes_count,
            data: None,
        }
    }

    /// Index into `nodes` for a world position inside the rectangle.
    #[inline]
    pub fn local_index(&self, world: TilePos) -> Option<usize> {
        let p = world - self.offset;
        (p.x >= 0 && p.y >= 0 && p.x < self.size.x && p.y < self.size.y)
            .then(|| (p.y * self.size.x + p.x) as usize)
    }

    #[inline]
    pub fn contains(&self, world: TilePos) -> bool {
        self.local_index(world).is_some()
    }

    /// Direction byte at a world position, 0 outside the rectangle.
    #[inline]
    pub fn node(&self, world: TilePos) -> u8 {
        self.local_index(world).map_or(0, |i| self.nodes[i])
    }

    #[inline]
    pub fn has_node(&self, world: TilePos) -> bool {
        self.node(world) != 0
    }

    /// World positions of all non-zero nodes, y-then-x.
    pub fn node_positions(&self) -> impl Iterator<Item = TilePos> + '_ {
        let w = self.size.x;
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, &n)| n != 0)
            .map(move |(i, _)| TilePos::new(i as i32 % w, i as i32 / w) + self.offset)
    }

    #[track_caller]
    pub fn data(&self) -> &CalculatedGraphData {
        match &self.data {
            Some(d) => d,
            None => panic!("graph data requested before calculate_data"),
        }
    }

    pub fn center(&self) -> TilePos {
        self.data().center
    }

    /// Dense node index of a world position.
    pub fn node_index(&self, world: TilePos) -> Option<usize> {
        let local = self.local_index(world)?;
        let idx = self.data.as_ref()?.pos_to_node_index[local];
        (idx >= 0).then_some(idx as usize)
    }

    /// Every edge bit has its reciprocal on the neighbour.
    #[track_caller]
    pub fn assert_is_undirected(&self) {
        for y in 0..self.size.y {
            for x in 0..self.size.x {
                let local = TilePos::new(x, y);
                let node = self.nodes[(y * self.size.x + x) as usize];
                for dir in Direction::ALL {
                    if !dir.is_set(node) {
                        continue;
                    }
                    let world = local + self.offset;
                    let neighbour = self.node(world.step(dir));
                    assert!(
                        dir.opposite().is_set(neighbour),
                        "graph is not undirected: {world} has {dir:?} but its neighbour lacks {:?}",
                        dir.opposite()
                    );
                }
            }
        }
    }

    /// Floyd–Warshall over the non-zero nodes and the center by minimum
    /// eccentricity (first in y-then-x order on ties).
    pub fn calculate_data(&mut self) {
        let _span = debug_span!("calculate_graph_data", nodes = self.non_zero_nodes_count).entered();
        assert!(self.non_zero_nodes_count > 0, "graph without nodes");
        assert!(
            self.non_zero_nodes_count < i16::MAX as usize,
            "graph with {} nodes does not fit i16 tables",
            self.non_zero_nodes_count
        );

        let mut pos_to_node_index = vec![-1i16; self.nodes.len()];
        let mut node_index_to_pos = Vec::with_capacity(self.non_zero_nodes_count);
        for (i, &node) in self.nodes.iter().enumerate() {
            if node != 0 {
                pos_to_node_index[i] = node_index_to_pos.len() as i16;
                let i = i as i32;
                node_index_to_pos.push(TilePos::new(i % self.size.x, i / self.size.x));
            }
        }

        let n = node_index_to_pos.len();
        let mut dist = vec![INFINITE_DIST; n * n];
        let mut prev = vec![NO_PREV; n * n];

        for (u, &local) in node_index_to_pos.iter().enumerate() {
            let node = self.nodes[(local.y * self.size.x + local.x) as usize];
            for dir in Direction::ALL {
                if !dir.is_set(node) {
                    continue;
                }
                let Some(neighbour) = self.local_index(local.step(dir) + self.offset) else {
                    panic!("edge {dir:?} from {local} leaves the graph rectangle");
                };
                let v = pos_to_node_index[neighbour];
                assert!(v >= 0, "edge {dir:?} from {local} points at an empty node");
                dist[u * n + v as usize] = 1;
                prev[u * n + v as usize] = u as i16;
            }
        }
        for v in 0..n {
            dist[v * n + v] = 0;
            prev[v * n + v] = v as i16;
        }

        for k in 0..n {
            for j in 0..n {
                let kj = dist[k * n + j];
                if kj == INFINITE_DIST {
                    continue;
                }
                for i in 0..n {
                    let ik = dist[i * n + k];
                    if ik == INFINITE_DIST {
                        continue;
                    }
                    let through = ik as i32 + kj as i32;
                    if (dist[i * n + j] as i32) > through {
                        dist[i * n + j] = through as i16;
                        prev[i * n + j] = prev[k * n + j];
                    }
                }
            }
        }

        let mut data = CalculatedGraphData {
            node_count: n,
            dist,
            prev,
            node_index_to_pos,
            pos_to_node_index,
            center: TilePos::ZERO,
        };

        let eccentricities: Vec<i16> = (0..n).map(|i| data.eccentricity(i)).collect();
        let radius = eccentricities.iter().copied().min().unwrap_or(0);
        let center_index = eccentricities
            .iter()
            .position(|&e| e == radius)
            .unwrap_or(0);
        data.center = data.node_index_to_pos[center_index] + self.offset;
        self.data = Some(data);

        if crate::SLOW_ASSERTS {
            self.assert_is_undirected();
        }
    }
}

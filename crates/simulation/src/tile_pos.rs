//! Tile coordinates and the four cardinal directions.
//!
//! A graph node is a `u8` whose low four bits say which neighbours the tile
//! is connected to, indexed by [`Direction`].

use std::ops::{Add, Sub};

use bitcode::{Decode, Encode};
use serde::{Deserialize, Serialize};

/// All four direction bits set.
pub const ALL_DIRECTIONS: u8 = 0b1111;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord, Serialize, Deserialize, Encode, Decode,
)]
pub struct TilePos {
    pub x: i32,
    pub y: i32,
}

impl TilePos {
    pub const ZERO: TilePos = TilePos { x: 0, y: 0 };

    #[inline]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    #[inline]
    pub fn step(self, dir: Direction) -> Self {
        self + dir.offset()
    }

    /// Direction of a unit step from `self` to `to`, if they are 4-adjacent.
    pub fn direction_to(self, to: TilePos) -> Option<Direction> {
        Direction::from_offset(to - self)
    }

    #[inline]
    pub fn manhattan(self, other: TilePos) -> i32 {
        (self.x - other.x).abs() + (self.y - other.y).abs()
    }
}

impl From<(i32, i32)> for TilePos {
    fn from((x, y): (i32, i32)) -> Self {
        Self { x, y }
    }
}

impl Add for TilePos {
    type Output = TilePos;
    fn add(self, rhs: TilePos) -> TilePos {
        TilePos::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for TilePos {
    type Output = TilePos;
    fn sub(self, rhs: TilePos) -> TilePos {
        TilePos::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl std::fmt::Display for TilePos {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

// ---------------------------------------------------------------------------
// Direction
// ---------------------------------------------------------------------------

/// Cardinal direction. The discriminant is the bit index inside a graph node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Encode, Decode)]
#[repr(u8)]
pub enum Direction {
    Right = 0,
    Up = 1,
    Left = 2,
    Down = 3,
}

impl Direction {
    /// Expansion order used by every BFS in the crate.
    pub const ALL: [Direction; 4] = [
        Direction::Right,
        Direction::Up,
        Direction::Left,
        Direction::Down,
    ];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    #[inline]
    pub fn from_index(i: usize) -> Direction {
        Self::ALL[i % 4]
    }

    #[inline]
    pub fn opposite(self) -> Direction {
        Self::from_index(self.index() + 2)
    }

    #[inline]
    pub fn bit(self) -> u8 {
        1 << (self as u8)
    }

    pub fn offset(self) -> TilePos {
        match self {
            Direction::Right => TilePos::new(1, 0),
            Direction::Up => TilePos::new(0, 1),
            Direction::Left => TilePos::new(-1, 0),
            Direction::Down => TilePos::new(0, -1),
        }
    }

    pub fn from_offset(offset: TilePos) -> Option<Direction> {
        match (offset.x, offset.y) {
            (1, 0) => Some(Direction::Right),
            (0, 1) => Some(Direction::Up),
            (-1, 0) => Some(Direction::Left),
            (0, -1) => Some(Direction::Down),
            _ => None,
        }
    }

    #[inline]
    pub fn is_set(self, node: u8) -> bool {
        node & self.bit() != 0
    }

    #[inline]
    pub fn mark(self, node: &mut u8) {
        *node |= self.bit();
    }
}

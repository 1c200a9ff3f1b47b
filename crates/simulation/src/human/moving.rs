use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::tile_pos::TilePos;

/// Tile-by-tile walking. `to` is the tile being entered; `path` queues the
/// ones after it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HumanMoving {
    pub pos: TilePos,
    pub from: TilePos,
    pub to: Option<TilePos>,
    pub elapsed: f32,
    pub progress: f32,
    pub path: VecDeque<TilePos>,
}

impl HumanMoving {
    pub fn new(pos: TilePos) -> Self {
        Self {
            pos,
            from: pos,
            to: None,
            elapsed: 0.0,
            progress: 0.0,
            path: VecDeque::new(),
        }
    }

    pub fn reset_path(&mut self) {
        self.path.clear();
    }

    /// Drop `to` unless the human is already part-way into it.
    pub fn clear_to_if_idle(&mut self) {
        if self.elapsed == 0.0 {
            self.to = None;
        }
    }

    /// Where the human will stand once the current tile is finished.
    pub fn destination(&self) -> TilePos {
        self.to.unwrap_or(self.pos)
    }

    /// Replace the queued path. `path` may start at the tile being entered.
    pub fn add_path(&mut self, path: &[TilePos]) {
        self.path.clear();
        self.clear_to_if_idle();

        let rest = match path.first() {
            Some(&first) if first == self.destination() => &path[1..],
            _ => path,
        };
        self.path.extend(rest.iter().copied());

        if self.to.is_none() {
            self.advance();
        }
    }

    pub fn advance(&mut self) {
        match self.path.pop_front() {
            Some(next) => self.to = Some(next),
            None => {
                self.progress = 0.0;
                self.to = None;
            }
        }
    }

    /// Accumulate `dt`. Returns `true` when the human stepped onto `to`; the
    /// caller fires the moved callback before [`HumanMoving::settle`].
    pub fn step(&mut self, dt: f32, duration: f32) -> bool {
        self.elapsed += dt;
        if self.elapsed <= duration {
            return false;
        }
        self.elapsed -= duration;
        if let Some(to) = self.to {
            self.pos = to;
            self.from = to;
        }
        self.advance();
        true
    }

    pub fn settle(&mut self, duration: f32) {
        if self.to.is_none() {
            self.elapsed = 0.0;
        }
        self.progress = if duration > 0.0 {
            (self.elapsed / duration).min(1.0)
        } else {
            1.0
        };
    }
}

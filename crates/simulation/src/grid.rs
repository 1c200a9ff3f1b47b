use serde::{Deserialize, Serialize};

use crate::ids::BuildingId;
use crate::tile_pos::{Direction, TilePos};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ElementTileKind {
    #[default]
    None,
    Road,
    Building,
    Flag,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ElementTile {
    pub kind: ElementTileKind,
    pub building_id: Option<BuildingId>,
    pub player_id: u8,
}

impl ElementTile {
    pub fn road(player_id: u8) -> Self {
        Self {
            kind: ElementTileKind::Road,
            building_id: None,
            player_id,
        }
    }

    pub fn flag(player_id: u8) -> Self {
        Self {
            kind: ElementTileKind::Flag,
            building_id: None,
            player_id,
        }
    }

    pub fn building(id: BuildingId, player_id: u8) -> Self {
        Self {
            kind: ElementTileKind::Building,
            building_id: Some(id),
            player_id,
        }
    }

    /// Buildings and flags bound segments.
    #[inline]
    pub fn is_vertex(&self) -> bool {
        matches!(self.kind, ElementTileKind::Building | ElementTileKind::Flag)
    }

    #[inline]
    pub fn is_none(&self) -> bool {
        self.kind == ElementTileKind::None
    }

    #[inline]
    pub fn is_road(&self) -> bool {
        self.kind == ElementTileKind::Road
    }

    #[inline]
    pub fn is_building(&self) -> bool {
        self.kind == ElementTileKind::Building
    }

    /// Building tiles carry an id, nothing else does.
    #[track_caller]
    pub fn validate(&self) {
        match self.kind {
            ElementTileKind::Building => assert!(
                self.building_id.is_some(),
                "building tile without a building id"
            ),
            _ => assert!(
                self.building_id.is_none(),
                "{:?} tile carries building id {:?}",
                self.kind,
                self.building_id
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Terrain {
    #[default]
    Grass,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct TerrainTile {
    pub terrain: Terrain,
    pub height: i32,
    pub is_cliff: bool,
    /// Harvestable amount (trees). Walkers can be told to avoid these.
    pub resource_amount: u8,
}

/// Element and terrain layers of the map, both indexed `y * width + x`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldGrid {
    pub elements: Vec<ElementTile>,
    pub terrain: Vec<TerrainTile>,
    pub width: i32,
    pub height: i32,
}

impl WorldGrid {
    pub fn new(width: i32, height: i32) -> Self {
        assert!(width > 0 && height > 0, "empty grid {width}x{height}");
        let n = (width * height) as usize;
        Self {
            elements: vec![ElementTile::default(); n],
            terrain: vec![TerrainTile::default(); n],
            width,
            height,
        }
    }

    #[inline]
    pub fn size(&self) -> TilePos {
        TilePos::new(self.width, self.height)
    }

    #[inline]
    pub fn tiles_count(&self) -> usize {
        (self.width * self.height) as usize
    }

    #[inline]
    pub fn index(&self, pos: TilePos) -> usize {
        debug_assert!(self.in_bounds(pos), "{pos} outside {}x{}", self.width, self.height);
        (pos.y * self.width + pos.x) as usize
    }

    #[inline]
    pub fn pos_of(&self, index: usize) -> TilePos {
        let i = index as i32;
        TilePos::new(i % self.width, i / self.width)
    }

    #[inline]
    pub fn in_bounds(&self, pos: TilePos) -> bool {
        pos.x >= 0 && pos.y >= 0 && pos.x < self.width && pos.y < self.height
    }

    #[inline]
    pub fn element(&self, pos: TilePos) -> &ElementTile {
        &self.elements[self.index(pos)]
    }

    /// Replace an element tile, checking the building-id invariant.
    pub fn set_element(&mut self, pos: TilePos, tile: ElementTile) {
        tile.validate();
        let idx = self.index(pos);
        self.elements[idx] = tile;
    }

    #[inline]
    pub fn terrain(&self, pos: TilePos) -> &TerrainTile {
        &self.terrain[self.index(pos)]
    }

    #[inline]
    pub fn terrain_mut(&mut self, pos: TilePos) -> &mut TerrainTile {
        let idx = self.index(pos);
        &mut self.terrain[idx]
    }

    /// In-bounds neighbours in `Direction::ALL` order.
    pub fn neighbors4(&self, pos: TilePos) -> impl Iterator<Item = (Direction, TilePos)> + '_ {
        Direction::ALL
            .into_iter()
            .map(move |d| (d, pos.step(d)))
            .filter(|(_, p)| self.in_bounds(*p))
    }

    /// All positions in y-then-x order.
    pub fn positions(&self) -> impl Iterator<Item = TilePos> {
        let (w, h) = (self.width, self.height);
        (0..h).flat_map(move |y| (0..w).map(move |x| TilePos::new(x, y)))
    }
}

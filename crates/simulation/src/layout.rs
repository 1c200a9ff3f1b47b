//! ASCII map fixtures.
//!
//! ```text
//! C  built city hall          r  road
//! B  built produce building   F  flag
//! S  one sawmill shared by every S tile
//! .  nothing
//! ```
//!
//! Rows are written top-first: the last row is `y == 0`.

use crate::buildings::BuildingStore;
use crate::config::DEFAULT_PLAYER_ID;
use crate::grid::{ElementTile, WorldGrid};
use crate::ids::BuildingId;
use crate::library::{BuildingKind, BuildingLibrary};
use crate::tile_pos::TilePos;

#[derive(Debug)]
pub struct Layout {
    pub grid: WorldGrid,
    pub buildings: BuildingStore,
}

impl Layout {
    pub fn parse(rows: &[&str]) -> Result<Self, String> {
        Self::parse_with_library(rows, &BuildingLibrary::default())
    }

    pub fn parse_with_library(rows: &[&str], library: &BuildingLibrary) -> Result<Self, String> {
        let height = rows.len();
        let Some(width) = rows.first().map(|r| r.chars().count()) else {
            return Err("layout has no rows".into());
        };
        if width == 0 {
            return Err("layout rows are empty".into());
        }
        if let Some((i, row)) = rows.iter().enumerate().find(|(_, r)| r.chars().count() != width) {
            return Err(format!("row {i} ({row:?}) is not {width} tiles wide"));
        }

        let symbols: Vec<Vec<char>> = rows.iter().map(|r| r.chars().collect()).collect();
        let city_hall = library.first_of_kind(BuildingKind::CityHall);
        let produce = library.first_of_kind(BuildingKind::Produce);
        let sawmill_kind = library.building_by_code("sawmill").or(produce);

        let mut grid = WorldGrid::new(width as i32, height as i32);
        let mut buildings = BuildingStore::default();
        let mut sawmill: Option<BuildingId> = None;

        for pos in grid.positions().collect::<Vec<_>>() {
            let symbol = symbols[height - pos.y as usize - 1][pos.x as usize];
            let tile = match symbol {
                '.' => continue,
                'r' => ElementTile::road(DEFAULT_PLAYER_ID),
                'F' => ElementTile::flag(DEFAULT_PLAYER_ID),
                'C' => {
                    let kind = city_hall.ok_or("library has no city hall")?;
                    ElementTile::building(buildings.insert(pos, kind, true, library), DEFAULT_PLAYER_ID)
                }
                'B' => {
                    let kind = produce.ok_or("library has no produce building")?;
                    ElementTile::building(buildings.insert(pos, kind, true, library), DEFAULT_PLAYER_ID)
                }
                'S' => {
                    let kind = sawmill_kind.ok_or("library has no sawmill")?;
                    let id = *sawmill.get_or_insert_with(|| buildings.insert(pos, kind, true, library));
                    ElementTile::building(id, DEFAULT_PLAYER_ID)
                }
                other => return Err(format!("unknown layout symbol {other:?} at {pos}")),
            };
            grid.set_element(pos, tile);
        }

        Ok(Self { grid, buildings })
    }
}

/// Tile positions holding `symbol`, in the layout's coordinates.
pub fn find_symbol(rows: &[&str], symbol: char) -> Vec<TilePos> {
    let height = rows.len() as i32;
    let mut found = Vec::new();
    for (r, row) in rows.iter().enumerate() {
        for (x, c) in row.chars().enumerate() {
            if c == symbol {
                found.push(TilePos::new(x as i32, height - r as i32 - 1));
            }
        }
    }
    found.sort_by_key(|p| (p.y, p.x));
    found
}

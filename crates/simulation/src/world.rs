//! The colony world: grid, segments, resources, buildings and humans, plus
//! the tick that drives them.

use bevy::log::debug_span;
use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::buildings::BuildingStore;
use crate::config::DEFAULT_PLAYER_ID;
use crate::events::{ColonyEvent, ItemToBuild, Observers};
use crate::game_params::HumanParams;
use crate::grid::{ElementTile, ElementTileKind, WorldGrid};
use crate::human::{self, HumanCx, HumanStateKind, HumanStore};
use crate::ids::{BuildingId, ResourceId};
use crate::layout::Layout;
use crate::library::{BuildingKindId, BuildingLibrary, ResourceKindId};
use crate::resources::{book_resources, cancel_resource_route, ResourceStore};
use crate::scratch::ScratchArena;
use crate::segment_builder::{build_graph_segments, plan_tile_updates, TileUpdate};
use crate::segments::{update_segments, SegmentStore};
use crate::tile_pos::TilePos;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BuildError {
    OutOfBounds,
    TileOccupied,
    NotARoadOrFlag,
    UnknownBuildingKind,
    /// The last way to spawn transporters is never demolished.
    CityHallProtected,
    NothingToDemolish,
}

impl std::fmt::Display for BuildError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BuildError::OutOfBounds => write!(f, "position is outside the map"),
            BuildError::TileOccupied => write!(f, "tile is already occupied"),
            BuildError::NotARoadOrFlag => write!(f, "flags go on roads or existing flags"),
            BuildError::UnknownBuildingKind => write!(f, "unknown building kind"),
            BuildError::CityHallProtected => write!(f, "city halls cannot be demolished"),
            BuildError::NothingToDemolish => write!(f, "nothing to demolish here"),
        }
    }
}

#[derive(Resource, Debug)]
pub struct ColonyWorld {
    pub grid: WorldGrid,
    pub segments: SegmentStore,
    pub resources: ResourceStore,
    pub buildings: BuildingStore,
    pub humans: HumanStore,
    pub library: BuildingLibrary,
    pub params: HumanParams,
    pub observers: Observers,
    pub scratch: ScratchArena,
    /// Seconds simulated so far.
    pub time: f64,
    pending_builds: Vec<(TilePos, ItemToBuild)>,
}

impl Default for ColonyWorld {
    fn default() -> Self {
        Self::new(
            WorldGrid::new(
                crate::config::DEFAULT_WORLD_WIDTH,
                crate::config::DEFAULT_WORLD_HEIGHT,
            ),
            BuildingLibrary::default(),
            HumanParams::default(),
        )
    }
}

impl ColonyWorld {
    pub fn new(grid: WorldGrid, library: BuildingLibrary, params: HumanParams) -> Self {
        Self {
            grid,
            segments: SegmentStore::default(),
            resources: ResourceStore::default(),
            buildings: BuildingStore::default(),
            humans: HumanStore::default(),
            library,
            params,
            observers: Observers::default(),
            scratch: ScratchArena::default(),
            time: 0.0,
            pending_builds: Vec::new(),
        }
    }

    /// Load a parsed layout and build every segment from scratch.
    pub fn from_layout(layout: Layout, library: BuildingLibrary, params: HumanParams) -> Self {
        let mut world = Self::new(layout.grid, library, params);
        world.buildings = layout.buildings;
        let not_constructed = world.buildings.not_constructed.clone();
        for building_id in not_constructed {
            world.request_construction_resources(building_id);
        }
        world.rebuild_segments();
        world
    }

    /// Drop every segment and rebuild them from the grid. New segments wait
    /// for transporters.
    pub fn rebuild_segments(&mut self) -> usize {
        let to_add = build_graph_segments(&self.grid, &self.scratch);
        let to_delete: Vec<_> = self.segments.ids().collect();
        let added = to_add.len();
        let (humans, mut cx) = self.split();
        update_segments(humans, &mut cx, to_add, &to_delete);
        info!("built {added} segments");
        added
    }

    /// The human store and a context over everything else.
    pub fn split(&mut self) -> (&mut HumanStore, HumanCx<'_>) {
        (
            &mut self.humans,
            HumanCx {
                grid: &self.grid,
                segments: &mut self.segments,
                resources: &mut self.resources,
                buildings: &mut self.buildings,
                library: &self.library,
                params: &self.params,
                observers: &mut self.observers,
                time: self.time,
            },
        )
    }

    // -----------------------------------------------------------------------
    // Tick
    // -----------------------------------------------------------------------

    /// One simulation step: city halls, humans, queued edits, booking.
    pub fn update(&mut self, dt: f32) {
        let _span = debug_span!("colony_update").entered();
        self.time += f64::from(dt);

        {
            let (humans, mut cx) = self.split();
            human::process_city_halls(humans, &mut cx, dt);
            human::update_humans(humans, &mut cx, dt);
        }

        for (pos, item) in std::mem::take(&mut self.pending_builds) {
            if let Err(e) = self.try_build(pos, item) {
                warn!("queued {item:?} at {pos} rejected: {e}");
            }
        }

        book_resources(
            &self.grid,
            &mut self.segments,
            &mut self.resources,
            &self.buildings,
            &self.library,
            &self.scratch,
        );
    }

    /// Defer an edit to the next [`ColonyWorld::update`].
    pub fn queue_build(&mut self, pos: TilePos, item: ItemToBuild) {
        self.pending_builds.push((pos, item));
    }

    pub fn pending_builds(&self) -> usize {
        self.pending_builds.len()
    }

    // -----------------------------------------------------------------------
    // Edits
    // -----------------------------------------------------------------------

    pub fn try_build(&mut self, pos: TilePos, item: ItemToBuild) -> Result<(), BuildError> {
        if !self.grid.in_bounds(pos) {
            return Err(BuildError::OutOfBounds);
        }
        let tile = *self.grid.element(pos);

        let update = match item {
            ItemToBuild::Flag => match tile.kind {
                ElementTileKind::Flag => {
                    self.grid.set_element(pos, ElementTile::road(tile.player_id));
                    TileUpdate::FlagRemoved
                }
                ElementTileKind::Road => {
                    self.grid.set_element(pos, ElementTile::flag(tile.player_id));
                    TileUpdate::FlagPlaced
                }
                _ => return Err(BuildError::NotARoadOrFlag),
            },
            ItemToBuild::Road => {
                if !tile.is_none() {
                    return Err(BuildError::TileOccupied);
                }
                self.grid.set_element(pos, ElementTile::road(DEFAULT_PLAYER_ID));
                TileUpdate::RoadPlaced
            }
            ItemToBuild::Building(kind) => {
                if self.library.building(kind).is_none() {
                    return Err(BuildError::UnknownBuildingKind);
                }
                if !tile.is_none() {
                    return Err(BuildError::TileOccupied);
                }
                self.place_building(pos, kind, false);
                TileUpdate::BuildingPlaced
            }
        };

        let (added, removed) = self.update_tiles(&[(pos, update)]);
        info!("built {item:?} at {pos}: +{added} -{removed} segments");
        self.observers.emit(ColonyEvent::ItemBuilt { pos, item });
        Ok(())
    }

    /// Put a building on an empty tile without touching segments. Unbuilt
    /// buildings ask for their construction resources.
    pub fn place_building(&mut self, pos: TilePos, kind: BuildingKindId, built: bool) -> BuildingId {
        debug_assert!(self.grid.element(pos).is_none(), "{pos} is not empty");
        let id = self.buildings.insert(pos, kind, built, &self.library);
        self.grid.set_element(pos, ElementTile::building(id, DEFAULT_PLAYER_ID));
        if !built {
            self.request_construction_resources(id);
        }
        id
    }

    fn request_construction_resources(&mut self, building_id: BuildingId) {
        let scriptable = self.buildings.strict(building_id).scriptable;
        let needed = self.library.strict_building(scriptable).construction_resources.clone();
        for (resource, count) in needed {
            self.resources.request(resource, building_id, count);
        }
    }

    /// Undo one edit at `pos`: a flag turns back into road, a road or a
    /// building disappears.
    pub fn demolish(&mut self, pos: TilePos) -> Result<(), BuildError> {
        if !self.grid.in_bounds(pos) {
            return Err(BuildError::OutOfBounds);
        }
        let tile = *self.grid.element(pos);

        let mut updates = Vec::with_capacity(1);
        match tile.kind {
            ElementTileKind::None => return Err(BuildError::NothingToDemolish),
            ElementTileKind::Flag => {
                self.grid.set_element(pos, ElementTile::road(tile.player_id));
                updates.push((pos, TileUpdate::FlagRemoved));
            }
            ElementTileKind::Road => {
                self.grid.set_element(pos, ElementTile::default());
                updates.push((pos, TileUpdate::RoadRemoved));
            }
            ElementTileKind::Building => {
                let Some(building_id) = tile.building_id else {
                    panic!("building tile at {pos} has no id");
                };
                if self.buildings.is_city_hall(building_id, &self.library) {
                    return Err(BuildError::CityHallProtected);
                }
                self.release_resources_of(building_id);
                self.buildings.remove(building_id);
                // A building may cover several tiles.
                for p in self.grid.positions().collect::<Vec<_>>() {
                    if self.grid.element(p).building_id == Some(building_id) {
                        self.grid.set_element(p, ElementTile::default());
                        updates.push((p, TileUpdate::BuildingRemoved));
                    }
                }
            }
        }

        let (added, removed) = self.update_tiles(&updates);
        info!("demolished {:?} at {pos}: +{added} -{removed} segments", tile.kind);
        Ok(())
    }

    /// Cancel every booking for `building_id` and drop its requests.
    /// Transporters handling those resources put them down first.
    fn release_resources_of(&mut self, building_id: BuildingId) {
        let booked = self.resources.booked_for(building_id);
        let (humans, mut cx) = self.split();
        for &resource_id in &booked {
            let targeted = cx.resources.get(resource_id).and_then(|r| r.targeted_human);
            if let Some(human_id) = targeted {
                if let Some(human) = humans.humans.get_mut(human_id) {
                    human::set_state(human_id, human, HumanStateKind::MovingInTheWorld, &mut cx);
                }
            }
            cancel_resource_route(cx.resources, cx.segments, resource_id, false);
        }
        self.resources.to_book.retain(|r| r.building != building_id);
        debug!("released {} resources of {building_id}", booked.len());
    }

    /// Run the incremental segment pipeline for edits already written to the
    /// grid. Returns `(added, removed)` segment counts.
    pub fn update_tiles(&mut self, updates: &[(TilePos, TileUpdate)]) -> (usize, usize) {
        let changes = plan_tile_updates(&self.grid, &self.segments, updates, &self.scratch);
        let counts = (changes.to_add.len(), changes.to_delete.len());
        {
            let (humans, mut cx) = self.split();
            update_segments(humans, &mut cx, changes.to_add, &changes.to_delete);
        }
        if crate::SLOW_ASSERTS {
            self.segments.assert_no_overlaps();
            for (_, segment) in self.segments.iter() {
                segment.graph.assert_is_undirected();
            }
        }
        debug!("update_tiles: +{} -{} segments", counts.0, counts.1);
        counts
    }

    pub fn add_resource(&mut self, kind: ResourceKindId, pos: TilePos) -> ResourceId {
        debug_assert!(self.grid.in_bounds(pos), "{pos} outside the map");
        self.resources.add(kind, pos)
    }
}

// ---------------------------------------------------------------------------
// Demo map
// ---------------------------------------------------------------------------

/// The startup map: a city hall on a road strip, a disconnected road ring,
/// a flagged road block and three planks on the map. Two lumberjack huts and
/// a flag get built on top.
pub fn demo_map(library: BuildingLibrary, params: HumanParams, width: i32, height: i32) -> ColonyWorld {
    assert!(width >= 14 && height >= 10, "demo map needs at least 14x10, got {width}x{height}");
    let mut grid = WorldGrid::new(width, height);

    let ring = [(0, 0), (1, 0), (2, 0), (0, 1), (2, 1), (0, 2), (1, 2), (2, 2)];
    let strip = (5..=10).map(|x| (x, 1));
    for (x, y) in ring.into_iter().chain(strip) {
        grid.set_element(TilePos::new(x, y), ElementTile::road(DEFAULT_PLAYER_ID));
    }
    for y in 0..5 {
        for x in 0..9 {
            let tile = if x % 2 == 0 && y % 2 == 0 {
                ElementTile::flag(DEFAULT_PLAYER_ID)
            } else {
                ElementTile::road(DEFAULT_PLAYER_ID)
            };
            grid.set_element(TilePos::new(x + 5, y + 5), tile);
        }
    }
    grid.set_element(TilePos::new(11, 1), ElementTile::flag(DEFAULT_PLAYER_ID));

    let mut world = ColonyWorld::new(grid, library, params);

    if let Some(city_hall) = world.library.first_of_kind(crate::library::BuildingKind::CityHall) {
        world.place_building(TilePos::new(4, 1), city_hall, true);
    }
    world.rebuild_segments();

    if let Some(planks) = world.library.resource_by_code("planks") {
        for pos in [(1, 0), (1, 0), (5, 1), (6, 1)] {
            world.add_resource(planks, pos.into());
        }
    }

    // Applied by the first tick.
    world.queue_build(TilePos::new(8, 1), ItemToBuild::Flag);
    if let Some(hut) = world.library.building_by_code("lumberjacks_hut") {
        world.queue_build(TilePos::new(0, 3), ItemToBuild::Building(hut));
        world.queue_build(TilePos::new(10, 2), ItemToBuild::Building(hut));
    }
    world
}

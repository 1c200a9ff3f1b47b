//! Placed buildings, city-hall spawn timers and construction progress.

use serde::{Deserialize, Serialize};

use crate::ids::{BuildingId, SlotMap, StrictLookup};
use crate::library::{BuildingKind, BuildingKindId, BuildingLibrary, ResourceKindId};
use crate::tile_pos::TilePos;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Building {
    pub pos: TilePos,
    pub scriptable: BuildingKindId,
    pub remaining_construction_points: f32,
    pub delivered_resources: Vec<ResourceKindId>,
    pub constructed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CityHall {
    pub time_since_human_was_created: f32,
}

impl Default for CityHall {
    fn default() -> Self {
        Self {
            time_since_human_was_created: f32::INFINITY,
        }
    }
}

#[derive(Debug, Default)]
pub struct BuildingStore {
    buildings: SlotMap<BuildingId, Building>,
    /// Constructed city halls in registration order.
    pub city_halls: Vec<(BuildingId, CityHall)>,
    pub not_constructed: Vec<BuildingId>,
}

impl BuildingStore {
    /// Allocate a building. Unbuilt ones start with the kind's full
    /// construction cost; built city halls get a spawn timer.
    pub fn insert(&mut self, pos: TilePos, scriptable: BuildingKindId, built: bool, library: &BuildingLibrary) -> BuildingId {
        let kind = library.strict_building(scriptable);
        let id = self.buildings.insert(Building {
            pos,
            scriptable,
            remaining_construction_points: if built { 0.0 } else { kind.required_construction_points },
            delivered_resources: Vec::new(),
            constructed: built,
        });
        if !built {
            self.not_constructed.push(id);
        } else if kind.kind == BuildingKind::CityHall {
            self.city_halls.push((id, CityHall::default()));
        }
        id
    }

    pub fn remove(&mut self, id: BuildingId) -> Option<Building> {
        self.city_halls.retain(|(hall, _)| *hall != id);
        self.not_constructed.retain(|&b| b != id);
        self.buildings.remove(id)
    }

    pub fn len(&self) -> usize {
        self.buildings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buildings.is_empty()
    }

    pub fn get(&self, id: BuildingId) -> Option<&Building> {
        self.buildings.get(id)
    }

    pub fn get_mut(&mut self, id: BuildingId) -> Option<&mut Building> {
        self.buildings.get_mut(id)
    }

    #[track_caller]
    pub fn strict(&self, id: BuildingId) -> &Building {
        self.buildings.strict(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (BuildingId, &Building)> + '_ {
        self.buildings.iter()
    }

    pub fn first_city_hall(&self) -> Option<BuildingId> {
        self.city_halls.first().map(|(id, _)| *id)
    }

    pub fn is_city_hall(&self, id: BuildingId, library: &BuildingLibrary) -> bool {
        self.get(id)
            .is_some_and(|b| library.strict_building(b.scriptable).kind == BuildingKind::CityHall)
    }

    /// Record a delivered construction resource. Returns `true` when this
    /// delivery completed the building.
    pub fn deliver_resource(&mut self, id: BuildingId, kind: ResourceKindId, library: &BuildingLibrary) -> bool {
        let Some(building) = self.buildings.get_mut(id) else {
            panic!("delivery to dead building {id}");
        };
        building.delivered_resources.push(kind);
        if building.constructed {
            return false;
        }

        let scriptable = library.strict_building(building.scriptable);
        let complete = scriptable.construction_resources.iter().all(|&(resource, count)| {
            building.delivered_resources.iter().filter(|&&r| r == resource).count() >= count as usize
        });
        if !complete {
            return false;
        }

        building.constructed = true;
        building.remaining_construction_points = 0.0;
        let is_hall = scriptable.kind == BuildingKind::CityHall;
        self.not_constructed.retain(|&b| b != id);
        if is_hall {
            self.city_halls.push((id, CityHall::default()));
        }
        true
    }
}

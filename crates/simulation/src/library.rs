//! Catalog of scriptable buildings and resources.
//!
//! Entries are defined by code name (JSON-loadable) and resolved into
//! index ids once, so the simulation never compares strings. Names are
//! indexed by [`hash32`].

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::hash::hash32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BuildingKindId(pub u16);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceKindId(pub u16);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BuildingKind {
    CityHall,
    Harvest,
    Produce,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptableResource {
    pub code: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScriptableBuilding {
    pub code: String,
    pub kind: BuildingKind,
    pub human_spawning_delay: f32,
    pub required_construction_points: f32,
    pub can_be_built: bool,
    pub harvestable_resource: Option<ResourceKindId>,
    pub construction_resources: Vec<(ResourceKindId, u32)>,
}

// ---------------------------------------------------------------------------
// Serialized definitions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConstructionResourceDef {
    pub resource: String,
    pub count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildingDef {
    pub code: String,
    pub kind: BuildingKind,
    #[serde(default)]
    pub human_spawning_delay: f32,
    #[serde(default)]
    pub required_construction_points: f32,
    #[serde(default = "default_can_be_built")]
    pub can_be_built: bool,
    #[serde(default)]
    pub harvestable_resource: Option<String>,
    #[serde(default)]
    pub construction_resources: Vec<ConstructionResourceDef>,
}

fn default_can_be_built() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LibraryDef {
    pub resources: Vec<ScriptableResource>,
    pub buildings: Vec<BuildingDef>,
}

// ---------------------------------------------------------------------------
// BuildingLibrary
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct BuildingLibrary {
    resources: Vec<ScriptableResource>,
    buildings: Vec<ScriptableBuilding>,
    resource_by_hash: HashMap<u32, ResourceKindId>,
    building_by_hash: HashMap<u32, BuildingKindId>,
}

impl Default for BuildingLibrary {
    fn default() -> Self {
        match Self::from_def(default_library_def()) {
            Ok(lib) => lib,
            Err(e) => panic!("built-in building library is invalid: {e}"),
        }
    }
}

impl BuildingLibrary {
    pub fn from_def(def: LibraryDef) -> Result<Self, String> {
        let mut resource_by_hash = HashMap::new();
        for (i, res) in def.resources.iter().enumerate() {
            let id = ResourceKindId(i as u16);
            if resource_by_hash.insert(hash32(&res.code), id).is_some() {
                return Err(format!("duplicate resource code '{}'", res.code));
            }
        }

        let resolve = |code: &str| -> Result<ResourceKindId, String> {
            resource_by_hash
                .get(&hash32(code))
                .copied()
                .ok_or_else(|| format!("unknown resource code '{code}'"))
        };

        let mut buildings = Vec::with_capacity(def.buildings.len());
        let mut building_by_hash = HashMap::new();
        for (i, b) in def.buildings.into_iter().enumerate() {
            let construction_resources = b
                .construction_resources
                .iter()
                .map(|c| resolve(&c.resource).map(|id| (id, c.count)))
                .collect::<Result<Vec<_>, _>>()?;
            let harvestable_resource = b.harvestable_resource.as_deref().map(resolve).transpose()?;
            if building_by_hash
                .insert(hash32(&b.code), BuildingKindId(i as u16))
                .is_some()
            {
                return Err(format!("duplicate building code '{}'", b.code));
            }
            buildings.push(ScriptableBuilding {
                code: b.code,
                kind: b.kind,
                human_spawning_delay: b.human_spawning_delay,
                required_construction_points: b.required_construction_points,
                can_be_built: b.can_be_built,
                harvestable_resource,
                construction_resources,
            });
        }

        Ok(Self {
            resources: def.resources,
            buildings,
            resource_by_hash,
            building_by_hash,
        })
    }

    pub fn from_json(json: &str) -> Result<Self, String> {
        let def: LibraryDef =
            serde_json::from_str(json).map_err(|e| format!("JSON decode error: {e}"))?;
        Self::from_def(def)
    }

    pub fn building(&self, id: BuildingKindId) -> Option<&ScriptableBuilding> {
        self.buildings.get(id.0 as usize)
    }

    #[track_caller]
    pub fn strict_building(&self, id: BuildingKindId) -> &ScriptableBuilding {
        match self.building(id) {
            Some(b) => b,
            None => panic!("unknown building kind {id:?}"),
        }
    }

    pub fn resource(&self, id: ResourceKindId) -> Option<&ScriptableResource> {
        self.resources.get(id.0 as usize)
    }

    pub fn building_by_code(&self, code: &str) -> Option<BuildingKindId> {
        self.building_by_hash.get(&hash32(code)).copied()
    }

    pub fn resource_by_code(&self, code: &str) -> Option<ResourceKindId> {
        self.resource_by_hash.get(&hash32(code)).copied()
    }

    /// First building of the given kind, in definition order.
    pub fn first_of_kind(&self, kind: BuildingKind) -> Option<BuildingKindId> {
        self.buildings
            .iter()
            .position(|b| b.kind == kind)
            .map(|i| BuildingKindId(i as u16))
    }

    pub fn buildings(&self) -> impl Iterator<Item = (BuildingKindId, &ScriptableBuilding)> {
        self.buildings
            .iter()
            .enumerate()
            .map(|(i, b)| (BuildingKindId(i as u16), b))
    }
}

pub fn default_library_def() -> LibraryDef {
    let planks = |count| ConstructionResourceDef {
        resource: "planks".into(),
        count,
    };
    LibraryDef {
        resources: vec![
            ScriptableResource {
                code: "planks".into(),
            },
            ScriptableResource {
                code: "wood".into(),
            },
        ],
        buildings: vec![
            BuildingDef {
                code: "city_hall".into(),
                kind: BuildingKind::CityHall,
                human_spawning_delay: 2.0,
                required_construction_points: 0.0,
                can_be_built: false,
                harvestable_resource: None,
                construction_resources: vec![],
            },
            BuildingDef {
                code: "lumberjacks_hut".into(),
                kind: BuildingKind::Harvest,
                human_spawning_delay: 0.0,
                required_construction_points: 10.0,
                can_be_built: true,
                harvestable_resource: Some("wood".into()),
                construction_resources: vec![planks(2)],
            },
            BuildingDef {
                code: "sawmill".into(),
                kind: BuildingKind::Produce,
                human_spawning_delay: 0.0,
                required_construction_points: 20.0,
                can_be_built: true,
                harvestable_resource: None,
                construction_resources: vec![planks(3)],
            },
        ],
    }
}

//! Data-driven colony parameters.
//!
//! Durations and world-generation tunables live in one [`GameParams`]
//! resource. It can be loaded from JSON (the runner reads `COLONY_PARAMS`)
//! and packed with bitcode for persistence next to a map.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::{DEFAULT_WORLD_HEIGHT, DEFAULT_WORLD_WIDTH};

// ---------------------------------------------------------------------------
// Human parameters
// ---------------------------------------------------------------------------

/// Timings of the transporter state machine, in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, bitcode::Encode, bitcode::Decode)]
pub struct HumanParams {
    /// How long crossing one tile takes.
    pub moving_one_tile_duration: f32,
    pub picking_up_duration: f32,
    pub placing_duration: f32,
}

impl Default for HumanParams {
    fn default() -> Self {
        Self {
            moving_one_tile_duration: 1.0,
            picking_up_duration: 1.0,
            placing_duration: 1.0,
        }
    }
}

// ---------------------------------------------------------------------------
// Noise parameters
// ---------------------------------------------------------------------------

/// One fractal noise layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, bitcode::Encode, bitcode::Decode)]
pub struct NoiseParams {
    pub octaves: i32,
    /// Each octave's amplitude is the previous one divided by this.
    pub scaling_bias: f32,
    pub frequency: f32,
    /// Added to the world seed so layers differ.
    pub seed_offset: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, bitcode::Encode, bitcode::Decode)]
pub struct TerrainParams {
    pub noise: NoiseParams,
    pub max_height: i32,
}

impl Default for TerrainParams {
    fn default() -> Self {
        Self {
            noise: NoiseParams {
                octaves: 9,
                scaling_bias: 2.0,
                frequency: 0.04,
                seed_offset: 0,
            },
            max_height: 6,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, bitcode::Encode, bitcode::Decode)]
pub struct ForestParams {
    pub noise: NoiseParams,
    /// Noise above this grows a forest (when the tile isn't a cliff).
    pub threshold: f32,
    pub max_amount: u8,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            noise: NoiseParams {
                octaves: 7,
                scaling_bias: 0.38,
                frequency: 0.08,
                seed_offset: 1,
            },
            threshold: 0.54,
            max_amount: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, bitcode::Encode, bitcode::Decode)]
pub struct WorldParams {
    pub width: i32,
    pub height: i32,
    pub seed: u64,
}

impl Default for WorldParams {
    fn default() -> Self {
        Self {
            width: DEFAULT_WORLD_WIDTH,
            height: DEFAULT_WORLD_HEIGHT,
            seed: 0,
        }
    }
}

// ---------------------------------------------------------------------------
// GameParams resource
// ---------------------------------------------------------------------------

#[derive(
    Resource, Debug, Clone, PartialEq, Default, Serialize, Deserialize, bitcode::Encode, bitcode::Decode,
)]
pub struct GameParams {
    #[serde(default)]
    pub humans: HumanParams,
    #[serde(default)]
    pub terrain: TerrainParams,
    #[serde(default)]
    pub forest: ForestParams,
    #[serde(default)]
    pub world: WorldParams,
}

impl GameParams {
    pub fn from_json(json: &str) -> Result<Self, String> {
        serde_json::from_str(json).map_err(|e| format!("JSON decode error: {e}"))
    }

    pub fn to_json(&self) -> Result<String, String> {
        serde_json::to_string_pretty(self).map_err(|e| format!("JSON encode error: {e}"))
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        bitcode::encode(self)
    }

    /// Decode packed params, falling back to defaults on corrupt input.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        match bitcode::decode(bytes) {
            Ok(v) => v,
            Err(e) => {
                warn!(
                    "GameParams: failed to decode {} bytes, falling back to default: {}",
                    bytes.len(),
                    e
                );
                Self::default()
            }
        }
    }
}

//! Procedural terrain heights, cliffs and forests.
//!
//! Two fBm layers drive the map: one becomes integer terrain heights, the
//! second grows forests (harvestable amount on terrain tiles) wherever the
//! ground isn't a cliff.

use fastnoise_lite::{FastNoiseLite, FractalType, NoiseType};

use crate::game_params::{GameParams, NoiseParams};
use crate::grid::{Terrain, WorldGrid};
use crate::sim_rng::SimRng;
use crate::tile_pos::TilePos;

// ---------------------------------------------------------------------------
// fBm noise generation
// ---------------------------------------------------------------------------

/// Fill `output` (row-major, `width * height`) with fBm noise in `[0, 1]`.
pub fn fill_noise(output: &mut [f32], params: &NoiseParams, seed: i32, width: usize, height: usize) {
    assert_eq!(output.len(), width * height, "noise buffer does not match {width}x{height}");

    let mut noise = FastNoiseLite::with_seed(seed.wrapping_add(params.seed_offset));
    noise.set_noise_type(Some(NoiseType::OpenSimplex2));
    noise.set_frequency(Some(params.frequency));
    noise.set_fractal_type(Some(FractalType::FBm));
    noise.set_fractal_octaves(Some(params.octaves.max(1)));
    noise.set_fractal_gain(Some(1.0 / params.scaling_bias.max(f32::EPSILON)));
    noise.set_fractal_lacunarity(Some(2.0));

    for y in 0..height {
        for x in 0..width {
            let raw = noise.get_noise_2d(x as f32, y as f32);
            // fBm with OpenSimplex2 outputs in [-1, 1]; normalize to [0, 1]
            output[y * width + x] = ((raw + 1.0) * 0.5).clamp(0.0, 1.0);
        }
    }
}

// ---------------------------------------------------------------------------
// Terrain
// ---------------------------------------------------------------------------

/// Regenerate every terrain tile of `grid`. Element tiles are untouched.
pub fn generate_terrain(grid: &mut WorldGrid, params: &GameParams, rng: &mut SimRng) {
    let (w, h) = (grid.width as usize, grid.height as usize);
    let seed = rng.noise_seed();

    let mut heights = vec![0.0; w * h];
    fill_noise(&mut heights, &params.terrain.noise, seed, w, h);
    let mut forest = vec![0.0; w * h];
    fill_noise(&mut forest, &params.forest.noise, seed, w, h);

    let max_height = params.terrain.max_height;
    for (i, tile) in grid.terrain.iter_mut().enumerate() {
        tile.terrain = Terrain::Grass;
        tile.height = (((max_height + 1) as f32 * heights[i]) as i32).clamp(0, max_height);
        tile.is_cliff = false;
    }

    remove_one_tile_bumps(grid);

    for pos in grid.positions() {
        let below = (pos.y > 0).then(|| grid.terrain(TilePos::new(pos.x, pos.y - 1)).height);
        let tile = grid.terrain_mut(pos);
        tile.is_cliff = match below {
            None => true,
            Some(b) => tile.height > b,
        };
    }

    for pos in grid.positions() {
        let noise = forest[grid.index(pos)];
        let tile = grid.terrain_mut(pos);
        let grows = !tile.is_cliff && noise > params.forest.threshold;
        tile.resource_amount = if grows { params.forest.max_amount } else { 0 };
    }
}

/// Flatten tiles that stick out above both their vertical neighbours.
/// Missing neighbours count as height 0.
fn remove_one_tile_bumps(grid: &mut WorldGrid) {
    loop {
        let mut changed = false;
        for pos in grid.positions() {
            let above = if pos.y + 1 < grid.height {
                grid.terrain(TilePos::new(pos.x, pos.y + 1)).height
            } else {
                0
            };
            let below = if pos.y > 0 {
                grid.terrain(TilePos::new(pos.x, pos.y - 1)).height
            } else {
                0
            };
            let tile = grid.terrain_mut(pos);
            if tile.height > below && tile.height > above {
                tile.height = below.max(above);
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }
}

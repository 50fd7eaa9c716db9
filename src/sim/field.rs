//! Procedural star field
//!
//! `shade` answers "what colour is this pixel" from the pixel coordinate and a
//! per-frame parameter snapshot. It is the host-side twin of `fs_main` in
//! `renderer/galaxy.wgsl`: same layers, same 3x3 cell neighbourhood, same
//! hashes, so tests on this function hold for the GPU path too.

use glam::{Mat2, Vec2, Vec3};
use std::f32::consts::TAU;

use super::color::star_color;
use super::hash::{hash21, tri, tris, trisn};
use crate::config::GalaxyConfig;
use crate::consts::{BACKGROUND, DIVISOR_EPSILON};
use crate::{fract, mix, smoothstep};

/// Period of the flare gloss wave
const FLARE_PERIOD: f32 = 3.0;
/// Per-layer offset so layers don't share cells
const LAYER_OFFSET: f32 = 453.32;
/// Cell scale of the farthest and nearest layer, before density
const FAR_SCALE: f32 = 20.0;
const NEAR_SCALE: f32 = 0.5;

/// Everything `shade` needs for one frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldParams {
    /// Surface size in physical pixels
    pub resolution: Vec2,
    /// Animated seconds since start
    pub time: f32,
    /// Accumulated depth motion (animated seconds x starSpeed / 10)
    pub travel: f32,
    /// Depth layers (2 on constrained devices, 3 otherwise)
    pub layers: u32,
    pub config: GalaxyConfig,
}

/// Attributes derived from one cell's seed
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellStar {
    pub seed: f32,
    /// Relative size in [0, 1)
    pub size: f32,
    /// Cross-flare strength; non-zero only for the largest stars
    pub flare: f32,
    pub color: Vec3,
    /// Current drift offset within the cell, each axis in [-0.5, 0.5]
    pub offset: Vec2,
    /// Brightness multiplier from twinkling
    pub twinkle: f32,
}

/// Derive the star anchored in `cell` at the given frame
pub fn cell_star(cell: Vec2, params: &FieldParams) -> CellStar {
    let cfg = &params.config;
    let seed = hash21(cell);
    let size = fract(seed * 345.32);
    let gloss = tri(params.travel / (FLARE_PERIOD * seed + 1.0));
    let flare = smoothstep(0.9, 1.0, size) * gloss;

    let color = star_color(cell, seed, cfg.hue_shift, cfg.saturation);

    let t = params.time * cfg.speed;
    let offset = Vec2::new(
        tris(seed * 34.0 + t / 10.0),
        tris(seed * 38.0 + t / 30.0),
    ) - 0.5;

    let twinkle = trisn(t + seed * TAU) * 0.5 + 1.0;
    let twinkle = mix(1.0, twinkle, cfg.twinkle_intensity);

    CellStar {
        seed,
        size,
        flare,
        color,
        offset,
        twinkle,
    }
}

/// Intensity of a star at offset `uv` from its centre
pub fn star_intensity(uv: Vec2, flare: f32, size: f32, glow: f32) -> f32 {
    let size = size.max(DIVISOR_EPSILON);
    let d = uv.length();
    let effective = (d / size).max(DIVISOR_EPSILON);

    let mut m = (0.02 * glow) / effective;
    let rays = smoothstep(0.0, 1.0, 1.0 - (uv.x * uv.y * 1000.0).abs());
    m += rays * flare * glow;

    // Hard cutoff keeps the glow from reaching far cells
    m * smoothstep(0.5 * size, 0.0, d)
}

/// Colour contributed by one layer at cell-space coordinate `uv`
pub fn star_layer(uv: Vec2, params: &FieldParams) -> Vec3 {
    let cfg = &params.config;
    let local = Vec2::new(fract(uv.x), fract(uv.y)) - 0.5;
    let id = uv.floor();

    let mut col = Vec3::ZERO;
    for y in -1..=1 {
        for x in -1..=1 {
            let neighbour = Vec2::new(x as f32, y as f32);
            let star = cell_star(id + neighbour, params);
            let m = star_intensity(
                local - neighbour - star.offset,
                star.flare,
                cfg.size,
                cfg.glow_intensity,
            );
            col += m * star.twinkle * star.size * star.color;
        }
    }
    col
}

/// Map a pixel coordinate (y up) into the centred, aspect-corrected space
pub fn normalize_coord(frag: Vec2, resolution: Vec2, focal: [f32; 2]) -> Vec2 {
    let focal_px = Vec2::from(focal) * resolution;
    (frag - focal_px) / resolution.y.max(DIVISOR_EPSILON)
}

/// Rotation applied to the whole field at `angle` radians
pub fn rotation(angle: f32) -> Mat2 {
    let (s, c) = angle.sin_cos();
    Mat2::from_cols(Vec2::new(c, -s), Vec2::new(s, c))
}

/// Depth of layer `index` of `layers`, cycling through [0, 1) with `travel`
pub fn layer_depth(index: u32, layers: u32, travel: f32) -> f32 {
    let i = index as f32 / layers.max(1) as f32;
    fract(i + travel)
}

/// Cell scale for a layer at `depth`: dense when far, sparse when near
pub fn layer_scale(depth: f32, density: f32) -> f32 {
    let density = density.max(DIVISOR_EPSILON);
    mix(FAR_SCALE * density, NEAR_SCALE * density, depth)
}

/// Opacity for a layer at `depth`; zero at both ends of the cycle
pub fn layer_fade(depth: f32) -> f32 {
    depth * smoothstep(1.0, 0.9, depth)
}

/// Colour and alpha of the pixel at `frag` (physical pixels, origin bottom-left)
pub fn shade(frag: Vec2, params: &FieldParams) -> [f32; 4] {
    let cfg = &params.config;
    let uv = normalize_coord(frag, params.resolution, cfg.focal);
    let uv = rotation(params.time * cfg.rotation_speed) * uv;

    let layers = params.layers.max(1);
    let travel = params.travel * cfg.speed;
    let mut col = Vec3::ZERO;
    for index in 0..layers {
        let i = index as f32 / layers as f32;
        let depth = layer_depth(index, layers, travel);
        let scale = layer_scale(depth, cfg.density);
        let fade = layer_fade(depth);
        col += star_layer(uv * scale + i * LAYER_OFFSET, params) * fade;
    }

    if cfg.transparent {
        let alpha = smoothstep(0.0, 0.3, col.length()).min(1.0);
        [col.x, col.y, col.z, alpha]
    } else {
        let col = col + Vec3::from(BACKGROUND);
        [col.x, col.y, col.z, 1.0]
    }
}

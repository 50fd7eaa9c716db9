//! Star tinting
//!
//! Palette scheme: a hashed red/blue base is converted to HSV, its hue rotated
//! by `hue_shift` degrees and its saturation scaled, then converted back.

use glam::{Vec2, Vec3};
use std::f32::consts::TAU;

use super::hash::hash21;
use crate::{fract, smoothstep};

/// Below this hash value a channel contributes only its floor
const STAR_COLOR_CUTOFF: f32 = 0.2;

/// Rec. 601 luma weights
const LUMA: Vec3 = Vec3::new(0.299, 0.587, 0.114);

/// HSV (all components in [0, 1]) to RGB
pub fn hsv_to_rgb(hsv: Vec3) -> Vec3 {
    let k = Vec3::new(1.0, 2.0 / 3.0, 1.0 / 3.0);
    let p = Vec3::new(
        (fract(hsv.x + k.x) * 6.0 - 3.0).abs(),
        (fract(hsv.x + k.y) * 6.0 - 3.0).abs(),
        (fract(hsv.x + k.z) * 6.0 - 3.0).abs(),
    );
    let chroma = (p - Vec3::ONE).clamp(Vec3::ZERO, Vec3::ONE);
    hsv.z * Vec3::ONE.lerp(chroma, hsv.y)
}

/// Colour of the star anchored in cell `cell`, whose seed is `seed`
pub fn star_color(cell: Vec2, seed: f32, hue_shift: f32, saturation: f32) -> Vec3 {
    let red = smoothstep(STAR_COLOR_CUTOFF, 1.0, hash21(cell + 1.0)) + STAR_COLOR_CUTOFF;
    let blue = smoothstep(STAR_COLOR_CUTOFF, 1.0, hash21(cell + 3.0)) + STAR_COLOR_CUTOFF;
    let green = red.min(blue) * seed;
    let base = Vec3::new(red, green, blue);

    let hue = (base.y - base.x).atan2(base.z - base.x) / TAU + 0.5;
    let hue = fract(hue + hue_shift / 360.0);
    let grey = Vec3::splat(base.dot(LUMA));
    let sat = ((base - grey).length() * saturation).clamp(0.0, 1.0);
    let val = base.max_element();

    hsv_to_rgb(Vec3::new(hue, sat, val))
}

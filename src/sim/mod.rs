//! Deterministic simulation module
//!
//! Everything that decides what a frame looks like lives here. This module
//! must stay pure and deterministic:
//! - Hash-seeded or explicitly seeded randomness only
//! - Time enters only through `ClockSample`
//! - No rendering or platform dependencies

pub mod clock;
pub mod color;
pub mod distortion;
pub mod field;
pub mod hash;
pub mod road;

pub use clock::{ClockSample, SimClock};
pub use color::{hsv_to_rgb, star_color};
pub use distortion::Distortion;
pub use field::{
    CellStar, FieldParams, cell_star, layer_depth, layer_fade, layer_scale, normalize_coord,
    shade, star_intensity, star_layer,
};
pub use hash::{hash21, tri, tris, trisn};
pub use road::{
    Camera, LightStreak, RoadFrame, RoadScene, Roadway, StreakSample, fog_factor, recycle_fade,
    wrap_position,
};

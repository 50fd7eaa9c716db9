//! Starlane - procedural animated backgrounds for the web
//!
//! Core modules:
//! - `sim`: Deterministic field and scene math (hashing, star layers, road scene)
//! - `engine`: Mount/frame/teardown state machine around one render target
//! - `surface`: Pixel-density policy and render target ownership
//! - `renderer`: WebGPU pipelines plus a CPU raster of the same field
//! - `platform`: Frame scheduling and browser glue
//! - `config`: Scene configuration and tuning presets

pub mod config;
pub mod engine;
pub mod error;
pub mod platform;
pub mod renderer;
pub mod sim;
pub mod surface;

pub use config::{GalaxyConfig, Preset, RoadConfig, SceneConfig};
pub use engine::{Engine, EngineState, Frame, FrameOutcome};
pub use error::EngineError;

/// Engine-wide constants
pub mod consts {
    /// Smallest value a user-supplied divisor (size, density) is clamped to
    pub const DIVISOR_EPSILON: f32 = 1e-4;

    /// Star layers rendered on constrained (mobile-class) devices
    pub const CONSTRAINED_LAYERS: u32 = 2;
    /// Star layers rendered everywhere else
    pub const STANDARD_LAYERS: u32 = 3;

    /// Viewports narrower than this (CSS px) are treated as mobile-class
    pub const NARROW_VIEWPORT_PX: f64 = 768.0;
    /// Pixel-density cap on constrained devices
    pub const CONSTRAINED_PIXEL_RATIO: f64 = 1.0;

    /// Frame gaps longer than this (seconds) mean the tab was hidden; the
    /// clock treats them as a pause instead of jumping ahead
    pub const MAX_FRAME_GAP: f64 = 1.0;

    /// Bloom chain resolution relative to the surface on constrained devices
    pub const CONSTRAINED_BLOOM_SCALE: f32 = 0.5;

    /// Page background behind every scene (#020617)
    pub const BACKGROUND: [f32; 3] = [2.0 / 255.0, 6.0 / 255.0, 23.0 / 255.0];
}

/// Fractional part, always in [0, 1) (GLSL `fract`)
#[inline]
pub fn fract(x: f32) -> f32 {
    x - x.floor()
}

/// Hermite smoothstep; works with `edge0 > edge1` like the GLSL builtin
#[inline]
pub fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// Linear interpolation between `a` and `b`
#[inline]
pub fn mix(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Convert a packed 0xRRGGBB colour to linear-ish floats in [0, 1]
#[inline]
pub fn hex_to_rgb(hex: u32) -> [f32; 3] {
    [
        ((hex >> 16) & 0xff) as f32 / 255.0,
        ((hex >> 8) & 0xff) as f32 / 255.0,
        (hex & 0xff) as f32 / 255.0,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fract_negative() {
        assert!((fract(-0.25) - 0.75).abs() < 1e-6);
        assert!((fract(3.5) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_smoothstep_reversed_edges() {
        assert_eq!(smoothstep(1.0, 0.9, 0.5), 1.0);
        assert_eq!(smoothstep(1.0, 0.9, 1.0), 0.0);
        assert!((smoothstep(0.0, 1.0, 0.5) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_hex_to_rgb() {
        let [r, g, b] = hex_to_rgb(0xff8000);
        assert_eq!(r, 1.0);
        assert!((g - 128.0 / 255.0).abs() < 1e-6);
        assert_eq!(b, 0.0);
    }
}

//! Scene configuration and tuning presets
//!
//! Configuration is supplied once when an engine is mounted and never mutated
//! afterwards; changing it means tearing the engine down and mounting a new one.
//! Field names deserialize in camelCase so the page can pass the same option
//! objects it always has.

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Maximum light pairs per roadway (instance buffer capacity is twice this)
pub const MAX_LIGHT_PAIRS: u32 = 256;
/// Maximum lanes per roadway
pub const MAX_LANES: u32 = 8;

/// Starfield ("galaxy") options
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GalaxyConfig {
    /// Screen-space origin of the field, as a fraction of the surface
    pub focal: [f32; 2],
    /// Rate of depth cycling
    pub star_speed: f32,
    /// Spatial frequency of star cells
    pub density: f32,
    /// Star radius multiplier
    pub size: f32,
    /// Palette rotation in degrees
    pub hue_shift: f32,
    /// Multiplier on drift, twinkle and depth cycling
    pub speed: f32,
    /// Brightness falloff multiplier
    pub glow_intensity: f32,
    /// Colour vividness (0 = white stars)
    pub saturation: f32,
    /// Blend between steady (0) and oscillating (1) brightness
    pub twinkle_intensity: f32,
    /// Global rotation, radians per second
    pub rotation_speed: f32,
    /// Emit an alpha channel so the page shows through
    pub transparent: bool,
    /// Freeze every time-derived parameter
    pub disable_animation: bool,
    /// Accepted for compatibility; the field ignores the pointer
    pub mouse_interaction: bool,
    /// Accepted for compatibility; the field ignores the pointer
    pub mouse_repulsion: bool,
    pub repulsion_strength: f32,
    /// Pixel-density cap on non-constrained devices
    pub max_pixel_ratio: f64,
}

impl Default for GalaxyConfig {
    fn default() -> Self {
        Self {
            focal: [0.5, 0.5],
            star_speed: 0.5,
            density: 1.0,
            size: 1.0,
            hue_shift: 140.0,
            speed: 1.0,
            glow_intensity: 0.3,
            saturation: 0.0,
            twinkle_intensity: 0.3,
            rotation_speed: 0.1,
            transparent: true,
            disable_animation: false,
            mouse_interaction: false,
            mouse_repulsion: false,
            repulsion_strength: 2.0,
            max_pixel_ratio: 1.5,
        }
    }
}

impl GalaxyConfig {
    /// Replace non-finite values with their defaults
    pub fn sanitized(mut self) -> Self {
        let d = Self::default();
        finite_or(&mut self.focal[0], d.focal[0]);
        finite_or(&mut self.focal[1], d.focal[1]);
        finite_or(&mut self.star_speed, d.star_speed);
        finite_or(&mut self.density, d.density);
        finite_or(&mut self.size, d.size);
        finite_or(&mut self.hue_shift, d.hue_shift);
        finite_or(&mut self.speed, d.speed);
        finite_or(&mut self.glow_intensity, d.glow_intensity);
        finite_or(&mut self.saturation, d.saturation);
        finite_or(&mut self.twinkle_intensity, d.twinkle_intensity);
        finite_or(&mut self.rotation_speed, d.rotation_speed);
        finite_or(&mut self.repulsion_strength, d.repulsion_strength);
        if !self.max_pixel_ratio.is_finite() || self.max_pixel_ratio <= 0.0 {
            self.max_pixel_ratio = d.max_pixel_ratio;
        }
        self
    }
}

/// Road and traffic colours, packed 0xRRGGBB
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RoadColors {
    pub road_color: u32,
    pub island_color: u32,
    pub background: u32,
    /// Palette for receding traffic (left roadway)
    pub left_cars: Vec<u32>,
    /// Palette for oncoming traffic (right roadway)
    pub right_cars: Vec<u32>,
}

impl Default for RoadColors {
    fn default() -> Self {
        Self {
            road_color: 0x081424,
            island_color: 0x0a1a2a,
            background: 0x020617,
            left_cars: vec![0xFFFFFF, 0xF5C45E, 0xFFEAA7],
            right_cars: vec![0xBE3D2A, 0xE78B48, 0xC0392B],
        }
    }
}

/// Turbulent camera-relative distortion coefficients
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DistortionConfig {
    pub freq: [f32; 4],
    pub amp: [f32; 4],
}

impl Default for DistortionConfig {
    fn default() -> Self {
        Self {
            freq: [4.0, 8.0, 8.0, 1.0],
            amp: [25.0, 5.0, 10.0, 10.0],
        }
    }
}

/// Road ("hyperspeed") options. Ranges are `[a, b]` and may be reversed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RoadConfig {
    /// Travel length of the road, world units
    pub length: f32,
    pub road_width: f32,
    pub island_width: f32,
    pub lanes_per_road: u32,
    /// Resting field of view, degrees
    pub fov: f32,
    /// Field of view while boosting
    pub fov_speed_up: f32,
    /// Time-offset rate while boosting
    pub speed_up: f32,
    /// Fraction of each streak that fades toward its tail
    pub car_lights_fade: f32,
    pub light_pairs_per_road_way: u32,
    pub moving_away_speed: [f32; 2],
    pub moving_closer_speed: [f32; 2],
    pub car_lights_length: [f32; 2],
    pub car_lights_radius: [f32; 2],
    pub car_width_percentage: [f32; 2],
    pub car_shift_x: [f32; 2],
    pub car_floor_separation: [f32; 2],
    /// Fraction of the travel axis faded at each end to hide recycling
    pub recycle_fade: f32,
    pub colors: RoadColors,
    pub distortion: DistortionConfig,
    /// Glow around the light streaks, when the adapter can sample the surface format
    pub bloom: bool,
    /// Luminance below which nothing blooms
    pub bloom_threshold: f32,
    /// Width of the soft edge above the threshold; 0 is a hard cut
    pub bloom_smoothing: f32,
    pub bloom_intensity: f32,
    /// Seed for streak placement
    pub seed: u64,
    pub transparent: bool,
    pub disable_animation: bool,
    pub max_pixel_ratio: f64,
}

impl Default for RoadConfig {
    fn default() -> Self {
        Self {
            length: 400.0,
            road_width: 10.0,
            island_width: 2.0,
            lanes_per_road: 3,
            fov: 90.0,
            fov_speed_up: 150.0,
            speed_up: 2.0,
            car_lights_fade: 0.4,
            light_pairs_per_road_way: 40,
            moving_away_speed: [60.0, 80.0],
            moving_closer_speed: [-120.0, -160.0],
            car_lights_length: [400.0 * 0.03, 400.0 * 0.2],
            car_lights_radius: [0.05, 0.14],
            car_width_percentage: [0.3, 0.5],
            car_shift_x: [-0.8, 0.8],
            car_floor_separation: [0.0, 5.0],
            recycle_fade: 0.05,
            colors: RoadColors::default(),
            distortion: DistortionConfig::default(),
            bloom: true,
            bloom_threshold: 0.2,
            bloom_smoothing: 0.0,
            bloom_intensity: 1.0,
            seed: 0x5eed,
            transparent: true,
            disable_animation: false,
            max_pixel_ratio: 2.0,
        }
    }
}

impl RoadConfig {
    /// Replace non-finite values with defaults and clamp counts to buffer capacity
    pub fn sanitized(mut self) -> Self {
        let d = Self::default();
        finite_or(&mut self.length, d.length);
        if self.length.abs() < crate::consts::DIVISOR_EPSILON {
            self.length = d.length;
        }
        self.length = self.length.abs();
        finite_or(&mut self.road_width, d.road_width);
        finite_or(&mut self.island_width, d.island_width);
        finite_or(&mut self.fov, d.fov);
        finite_or(&mut self.fov_speed_up, d.fov_speed_up);
        finite_or(&mut self.speed_up, d.speed_up);
        finite_or(&mut self.car_lights_fade, d.car_lights_fade);
        finite_or(&mut self.recycle_fade, d.recycle_fade);
        finite_or(&mut self.bloom_threshold, d.bloom_threshold);
        finite_or(&mut self.bloom_smoothing, d.bloom_smoothing);
        finite_or(&mut self.bloom_intensity, d.bloom_intensity);
        self.bloom_smoothing = self.bloom_smoothing.max(0.0);
        self.bloom_intensity = self.bloom_intensity.max(0.0);
        self.recycle_fade = self.recycle_fade.clamp(0.0, 0.5);
        self.lanes_per_road = self.lanes_per_road.clamp(1, MAX_LANES);
        self.light_pairs_per_road_way = self.light_pairs_per_road_way.min(MAX_LIGHT_PAIRS);
        for (range, default) in [
            (&mut self.moving_away_speed, d.moving_away_speed),
            (&mut self.moving_closer_speed, d.moving_closer_speed),
            (&mut self.car_lights_length, d.car_lights_length),
            (&mut self.car_lights_radius, d.car_lights_radius),
            (&mut self.car_width_percentage, d.car_width_percentage),
            (&mut self.car_shift_x, d.car_shift_x),
            (&mut self.car_floor_separation, d.car_floor_separation),
        ] {
            if !range.iter().all(|v| v.is_finite()) {
                *range = default;
            }
        }
        for (coeffs, default) in [
            (&mut self.distortion.freq, d.distortion.freq),
            (&mut self.distortion.amp, d.distortion.amp),
        ] {
            if !coeffs.iter().all(|v| v.is_finite()) {
                *coeffs = default;
            }
        }
        if !self.max_pixel_ratio.is_finite() || self.max_pixel_ratio <= 0.0 {
            self.max_pixel_ratio = d.max_pixel_ratio;
        }
        self
    }
}

/// Which scene an engine renders
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "scene", rename_all = "snake_case")]
pub enum SceneConfig {
    Galaxy(GalaxyConfig),
    Road(RoadConfig),
}

impl Default for SceneConfig {
    fn default() -> Self {
        SceneConfig::Galaxy(GalaxyConfig::default())
    }
}

impl SceneConfig {
    /// Parse an options object, e.g. `{"scene": "galaxy", "hueShift": 20}`
    pub fn from_json(json: &str) -> Result<Self, EngineError> {
        let config: SceneConfig = serde_json::from_str(json)?;
        Ok(config.sanitized())
    }

    pub fn sanitized(self) -> Self {
        match self {
            SceneConfig::Galaxy(c) => SceneConfig::Galaxy(c.sanitized()),
            SceneConfig::Road(c) => SceneConfig::Road(c.sanitized()),
        }
    }

    pub fn disable_animation(&self) -> bool {
        match self {
            SceneConfig::Galaxy(c) => c.disable_animation,
            SceneConfig::Road(c) => c.disable_animation,
        }
    }

    pub fn transparent(&self) -> bool {
        match self {
            SceneConfig::Galaxy(c) => c.transparent,
            SceneConfig::Road(c) => c.transparent,
        }
    }

    pub fn max_pixel_ratio(&self) -> f64 {
        match self {
            SceneConfig::Galaxy(c) => c.max_pixel_ratio,
            SceneConfig::Road(c) => c.max_pixel_ratio,
        }
    }
}

/// Named tuning profiles layered on the single engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Preset {
    #[default]
    Galaxy,
    /// Gold/orange starfield behind the hero section
    HyperCanvas,
    Hyperspeed,
    /// Road with half the traffic, for low-end devices
    HyperspeedLite,
}

impl Preset {
    pub const ALL: [Preset; 4] = [
        Preset::Galaxy,
        Preset::HyperCanvas,
        Preset::Hyperspeed,
        Preset::HyperspeedLite,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Preset::Galaxy => "galaxy",
            Preset::HyperCanvas => "hyper-canvas",
            Preset::Hyperspeed => "hyperspeed",
            Preset::HyperspeedLite => "hyperspeed-lite",
        }
    }

    /// Build the scene configuration for this preset
    pub fn config(&self) -> SceneConfig {
        match self {
            Preset::Galaxy => SceneConfig::Galaxy(GalaxyConfig::default()),
            Preset::HyperCanvas => SceneConfig::Galaxy(GalaxyConfig {
                hue_shift: 20.0,
                density: 1.5,
                glow_intensity: 0.8,
                star_speed: 0.5,
                rotation_speed: 0.05,
                transparent: true,
                saturation: 0.8,
                mouse_interaction: false,
                mouse_repulsion: false,
                ..GalaxyConfig::default()
            }),
            Preset::Hyperspeed => SceneConfig::Road(RoadConfig::default()),
            Preset::HyperspeedLite => SceneConfig::Road(RoadConfig {
                light_pairs_per_road_way: 20,
                ..RoadConfig::default()
            }),
        }
    }
}

impl std::str::FromStr for Preset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "galaxy" => Ok(Preset::Galaxy),
            "hyper-canvas" | "hypercanvas" | "hero" => Ok(Preset::HyperCanvas),
            "hyperspeed" | "road" => Ok(Preset::Hyperspeed),
            "hyperspeed-lite" | "lite" => Ok(Preset::HyperspeedLite),
            other => Err(format!("unknown preset '{other}'")),
        }
    }
}

#[inline]
fn finite_or(value: &mut f32, default: f32) {
    if !value.is_finite() {
        *value = default;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_galaxy_json_camel_case() {
        let config =
            SceneConfig::from_json(r#"{"scene":"galaxy","hueShift":20,"starSpeed":0.25}"#)
                .unwrap();
        let SceneConfig::Galaxy(galaxy) = config else {
            panic!("expected galaxy");
        };
        assert_eq!(galaxy.hue_shift, 20.0);
        assert_eq!(galaxy.star_speed, 0.25);
        // Unspecified fields keep their defaults
        assert_eq!(galaxy.glow_intensity, 0.3);
        assert!(galaxy.transparent);
    }

    #[test]
    fn test_road_json_nested_colors() {
        let config = SceneConfig::from_json(
            r#"{"scene":"road","lightPairsPerRoadWay":12,"colors":{"leftCars":[255]}}"#,
        )
        .unwrap();
        let SceneConfig::Road(road) = config else {
            panic!("expected road");
        };
        assert_eq!(road.light_pairs_per_road_way, 12);
        assert_eq!(road.colors.left_cars, vec![255]);
        assert_eq!(road.colors.road_color, 0x081424);
    }

    #[test]
    fn test_bad_json_is_config_error() {
        let err = SceneConfig::from_json(r#"{"scene":"teapot"}"#).unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));
    }

    #[test]
    fn test_sanitize_non_finite() {
        let config = GalaxyConfig {
            density: f32::NAN,
            size: f32::INFINITY,
            max_pixel_ratio: -1.0,
            ..Default::default()
        }
        .sanitized();
        assert_eq!(config.density, 1.0);
        assert_eq!(config.size, 1.0);
        assert_eq!(config.max_pixel_ratio, 1.5);
    }

    #[test]
    fn test_sanitize_road_counts() {
        let config = RoadConfig {
            lanes_per_road: 0,
            light_pairs_per_road_way: 10_000,
            length: 0.0,
            ..Default::default()
        }
        .sanitized();
        assert_eq!(config.lanes_per_road, 1);
        assert_eq!(config.light_pairs_per_road_way, MAX_LIGHT_PAIRS);
        assert_eq!(config.length, 400.0);
    }

    #[test]
    fn test_road_bloom_options() {
        let config = SceneConfig::from_json(
            r#"{"scene":"road","bloomThreshold":0.5,"bloomIntensity":-2}"#,
        )
        .unwrap();
        let SceneConfig::Road(road) = config else {
            panic!("expected road");
        };
        assert!(road.bloom);
        assert_eq!(road.bloom_threshold, 0.5);
        assert_eq!(road.bloom_smoothing, 0.0);
        assert_eq!(road.bloom_intensity, 0.0);
    }

    #[test]
    fn test_preset_names_round_trip() {
        for preset in Preset::ALL {
            assert_eq!(preset.as_str().parse::<Preset>(), Ok(preset));
        }
        assert_eq!("HERO".parse::<Preset>(), Ok(Preset::HyperCanvas));
        assert!("nope".parse::<Preset>().is_err());
    }

    #[test]
    fn test_hyper_canvas_preset() {
        let SceneConfig::Galaxy(config) = Preset::HyperCanvas.config() else {
            panic!("expected galaxy");
        };
        assert_eq!(config.hue_shift, 20.0);
        assert_eq!(config.density, 1.5);
        assert_eq!(config.saturation, 0.8);
    }
}

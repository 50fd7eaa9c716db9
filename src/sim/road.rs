//! Road ("hyperspeed") scene composer
//!
//! Two roadways with a central island recede along the travel axis (world -z).
//! Light streaks are placed once from a seeded RNG; every frame only their
//! position along the axis changes, wrapping modulo the road length.

use glam::{Mat4, Vec2, Vec3};
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

use super::clock::ClockSample;
use super::distortion::{Distortion, LOOK_PROGRESS};
use crate::config::RoadConfig;
use crate::consts::DIVISOR_EPSILON;
use crate::{hex_to_rgb, smoothstep};

/// Camera position, world units
pub const CAMERA_POSITION: Vec3 = Vec3::new(0.0, 8.0, -5.0);
pub const CAMERA_NEAR: f32 = 0.1;
pub const CAMERA_FAR: f32 = 10_000.0;
/// Fog starts at this fraction of the road length
const FOG_NEAR_FACTOR: f32 = 0.2;
const FOG_FAR_FACTOR: f32 = 500.0;
/// Streaks float this many radii above the floor separation
const LIGHT_LIFT: f32 = 1.3;

/// Which roadway a streak belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Roadway {
    /// Receding traffic
    Left,
    /// Oncoming traffic
    Right,
}

impl Roadway {
    /// Signed x of the roadway centre line
    pub fn center_x(&self, config: &RoadConfig) -> f32 {
        let offset = config.road_width / 2.0 + config.island_width / 2.0;
        match self {
            Roadway::Left => -offset,
            Roadway::Right => offset,
        }
    }

    /// Tail fade edges (smoothstep from `.0` to `.1` along the streak)
    pub fn fade_edges(&self, car_lights_fade: f32) -> Vec2 {
        match self {
            Roadway::Left => Vec2::new(0.0, 1.0 - car_lights_fade),
            Roadway::Right => Vec2::new(1.0, car_lights_fade),
        }
    }
}

/// One headlight/taillight streak
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightStreak {
    pub roadway: Roadway,
    pub lane: u32,
    /// World x of the streak centre
    pub x: f32,
    /// Height above the road
    pub y: f32,
    /// Position along the travel axis at time zero, in [0, length)
    pub start: f32,
    pub radius: f32,
    pub length: f32,
    /// Travel units per second; negative for oncoming traffic
    pub speed: f32,
    pub color: [f32; 3],
}

impl LightStreak {
    /// Position along the travel axis at `time`, in [0, travel_length)
    pub fn position(&self, time: f32, travel_length: f32) -> f32 {
        wrap_position(self.start, self.speed, time, travel_length)
    }
}

/// `(start + speed * time) mod length`, always non-negative
pub fn wrap_position(start: f32, speed: f32, time: f32, length: f32) -> f32 {
    let length = length.abs().max(DIVISOR_EPSILON);
    let p = (start + speed * time).rem_euclid(length);
    // rem_euclid can round up to exactly `length`
    if p >= length { 0.0 } else { p }
}

/// Opacity near the ends of the travel axis; 0 at both ends, 1 in between
pub fn recycle_fade(position: f32, length: f32, fraction: f32) -> f32 {
    let band = fraction * length;
    if band <= DIVISOR_EPSILON {
        return 1.0;
    }
    smoothstep(0.0, band, position) * smoothstep(length, length - band, position)
}

/// Linear fog factor (0 = clear, 1 = fully fogged) at view depth `depth`
pub fn fog_factor(depth: f32, near: f32, far: f32) -> f32 {
    smoothstep(near, far, depth)
}

/// Where a streak is this frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StreakSample {
    /// World position of the streak head, distortion applied
    pub head: Vec3,
    pub position: f32,
    /// Recycle fade
    pub alpha: f32,
    pub radius: f32,
    pub color: [f32; 3],
}

/// Perspective camera for one frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    pub eye: Vec3,
    pub target: Vec3,
    /// Vertical field of view, degrees
    pub fov: f32,
    pub aspect: f32,
}

impl Camera {
    pub fn view_proj(&self) -> Mat4 {
        let aspect = self.aspect.max(DIVISOR_EPSILON);
        let fov = self.fov.clamp(1.0, 179.0).to_radians();
        Mat4::perspective_rh(fov, aspect, CAMERA_NEAR, CAMERA_FAR)
            * Mat4::look_at_rh(self.eye, self.target, Vec3::Y)
    }

    /// Normalised device coordinates of `world`, or None when behind the camera
    pub fn project(&self, world: Vec3) -> Option<Vec3> {
        let clip = self.view_proj() * world.extend(1.0);
        if clip.w <= CAMERA_NEAR {
            return None;
        }
        Some(clip.truncate() / clip.w)
    }
}

/// Per-frame uniforms for the road scene
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoadFrame {
    /// Scene time: animated seconds plus boost offset
    pub time: f32,
    pub camera: Camera,
    pub fog_near: f32,
    pub fog_far: f32,
}

pub struct RoadScene {
    config: RoadConfig,
    distortion: Distortion,
    streaks: Vec<LightStreak>,
    boost: bool,
    speed_up: f32,
    time_offset: f32,
    fov: f32,
    /// Reused across frames
    samples: Vec<StreakSample>,
}

impl RoadScene {
    pub fn new(config: RoadConfig) -> Self {
        let config = config.sanitized();
        let streaks = place_streaks(&config);
        log::debug!(
            "Road scene: {} streaks over {} units",
            streaks.len(),
            config.length
        );
        Self {
            distortion: config.distortion.into(),
            fov: config.fov,
            samples: Vec::with_capacity(streaks.len()),
            streaks,
            boost: false,
            speed_up: 0.0,
            time_offset: 0.0,
            config,
        }
    }

    pub fn config(&self) -> &RoadConfig {
        &self.config
    }

    pub fn distortion(&self) -> &Distortion {
        &self.distortion
    }

    pub fn streaks(&self) -> &[LightStreak] {
        &self.streaks
    }

    /// Ease toward the boosted speed and field of view (or back)
    pub fn set_boost(&mut self, on: bool) {
        self.boost = on;
    }

    pub fn fov(&self) -> f32 {
        self.fov
    }

    /// Advance easing state and produce this frame's uniforms
    pub fn update(&mut self, sample: &ClockSample, aspect: f32) -> RoadFrame {
        let delta = sample.delta as f32;
        let (speed_target, fov_target) = if self.boost {
            (self.config.speed_up, self.config.fov_speed_up)
        } else {
            (0.0, self.config.fov)
        };

        // Frame-rate independent easing factor
        let pct = (-(-60.0 * (1.0f32 - 0.1).log2()) * delta).exp();
        self.speed_up += ease(self.speed_up, speed_target, pct, 0.00001);
        self.time_offset += self.speed_up * delta;

        let fov_change = ease(self.fov, fov_target, pct, 0.01);
        self.fov += fov_change * delta * 6.0;

        let time = sample.elapsed as f32 + self.time_offset;
        RoadFrame {
            time,
            camera: self.camera(time, aspect),
            fog_near: self.config.length * FOG_NEAR_FACTOR,
            fog_far: self.config.length * FOG_FAR_FACTOR,
        }
    }

    pub fn camera(&self, time: f32, aspect: f32) -> Camera {
        let look = self.distortion.look_direction(LOOK_PROGRESS, time);
        Camera {
            eye: CAMERA_POSITION,
            target: CAMERA_POSITION + look,
            fov: self.fov,
            aspect,
        }
    }

    /// Head position and fade of every streak at `time`
    pub fn sample_streaks(&mut self, time: f32) -> &[StreakSample] {
        let length = self.config.length;
        self.samples.clear();
        for streak in &self.streaks {
            let position = streak.position(time, length);
            let z = streak.length - position;
            let progress = (z / length).abs();
            let head = Vec3::new(streak.x, streak.y, z) + self.distortion.offset(progress, time);
            self.samples.push(StreakSample {
                head,
                position,
                alpha: recycle_fade(position, length, self.config.recycle_fade),
                radius: streak.radius,
                color: streak.color,
            });
        }
        &self.samples
    }
}

/// Step toward `target`, snapping once the step is below `limit`
fn ease(current: f32, target: f32, speed: f32, limit: f32) -> f32 {
    let change = (target - current) * speed;
    if change.abs() < limit {
        target - current
    } else {
        change
    }
}

fn sample_range(rng: &mut Pcg32, range: [f32; 2]) -> f32 {
    range[0] + rng.random::<f32>() * (range[1] - range[0])
}

fn pick_color(rng: &mut Pcg32, palette: &[u32]) -> [f32; 3] {
    if palette.is_empty() {
        return [1.0, 1.0, 1.0];
    }
    hex_to_rgb(palette[rng.random_range(0..palette.len())])
}

/// Place light pairs for both roadways
fn place_streaks(config: &RoadConfig) -> Vec<LightStreak> {
    let mut rng = Pcg32::seed_from_u64(config.seed);
    let pairs = config.light_pairs_per_road_way as usize;
    let mut streaks = Vec::with_capacity(pairs * 4);

    for (roadway, speed, palette) in [
        (Roadway::Left, config.moving_away_speed, &config.colors.left_cars),
        (Roadway::Right, config.moving_closer_speed, &config.colors.right_cars),
    ] {
        let lanes = config.lanes_per_road.max(1);
        let lane_width = config.road_width / lanes as f32;
        let center = roadway.center_x(config);

        for i in 0..pairs {
            let radius = sample_range(&mut rng, config.car_lights_radius);
            let length = sample_range(&mut rng, config.car_lights_length);
            let speed = sample_range(&mut rng, speed);

            let lane = i as u32 % lanes;
            let lane_x = lane as f32 * lane_width - config.road_width / 2.0
                + lane_width / 2.0
                + sample_range(&mut rng, config.car_shift_x) * lane_width;
            let car_width = sample_range(&mut rng, config.car_width_percentage) * lane_width;
            let y = sample_range(&mut rng, config.car_floor_separation) + radius * LIGHT_LIFT;
            let start = sample_range(&mut rng, [0.0, config.length]);
            let color = pick_color(&mut rng, palette);

            for side in [-0.5, 0.5] {
                streaks.push(LightStreak {
                    roadway,
                    lane,
                    x: center + lane_x + car_width * side,
                    y,
                    start,
                    radius,
                    length,
                    speed,
                    color,
                });
            }
        }
    }
    streaks
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn scene() -> RoadScene {
        RoadScene::new(RoadConfig::default())
    }

    #[test]
    fn test_streak_position_after_time() {
        // Offset 0, speed S, after T: (S * T) mod L
        let length = 400.0;
        let streak = LightStreak {
            roadway: Roadway::Left,
            lane: 0,
            x: 0.0,
            y: 0.0,
            start: 0.0,
            radius: 0.1,
            length: 20.0,
            speed: 70.0,
            color: [1.0; 3],
        };
        for t in [0.0f32, 1.0, 5.5, 6.0, 12.34, 100.0] {
            let expected = (70.0 * t) % length;
            assert!(
                (streak.position(t, length) - expected).abs() < 1e-2,
                "t={t}"
            );
        }
    }

    #[test]
    fn test_oncoming_wraps_non_negative() {
        let p = wrap_position(0.0, -140.0, 1.0, 400.0);
        assert!((p - 260.0).abs() < 1e-3);
    }

    #[test]
    fn test_pairs_per_roadway() {
        let s = scene();
        let left = s.streaks().iter().filter(|l| l.roadway == Roadway::Left).count();
        let right = s.streaks().iter().filter(|l| l.roadway == Roadway::Right).count();
        assert_eq!(left, 80);
        assert_eq!(right, 80);
    }

    #[test]
    fn test_palettes_and_speeds_by_roadway() {
        let s = scene();
        let cfg = RoadConfig::default();
        let left: Vec<[f32; 3]> = cfg.colors.left_cars.iter().map(|&c| hex_to_rgb(c)).collect();
        let right: Vec<[f32; 3]> = cfg.colors.right_cars.iter().map(|&c| hex_to_rgb(c)).collect();
        for streak in s.streaks() {
            match streak.roadway {
                Roadway::Left => {
                    assert!(left.contains(&streak.color));
                    assert!((60.0..=80.0).contains(&streak.speed));
                }
                Roadway::Right => {
                    assert!(right.contains(&streak.color));
                    assert!((-160.0..=-120.0).contains(&streak.speed));
                }
            }
            assert!((0.0..400.0).contains(&streak.start));
            assert!(streak.lane < 3);
        }
    }

    #[test]
    fn test_streaks_stay_near_their_roadway() {
        let s = scene();
        let cfg = RoadConfig::default();
        let lane_width = cfg.road_width / cfg.lanes_per_road as f32;
        // Outermost lane centre, full lane shift, half the widest car
        let reach = cfg.road_width / 2.0 - lane_width / 2.0
            + cfg.car_shift_x[1] * lane_width
            + cfg.car_width_percentage[1] * lane_width / 2.0;
        let mut sums = [0.0f32; 2];
        for streak in s.streaks() {
            let center = streak.roadway.center_x(&cfg);
            assert!((streak.x - center).abs() <= reach + 1e-4);
            sums[streak.roadway as usize] += streak.x;
        }
        // Shifted lights may cross the island, the traffic as a whole doesn't
        assert!(sums[Roadway::Left as usize] < 0.0);
        assert!(sums[Roadway::Right as usize] > 0.0);
    }

    #[test]
    fn test_placement_seeded() {
        let a = scene();
        let b = scene();
        assert_eq!(a.streaks(), b.streaks());
        let c = RoadScene::new(RoadConfig {
            seed: 99,
            ..Default::default()
        });
        assert_ne!(a.streaks(), c.streaks());
    }

    #[test]
    fn test_recycle_fade_hides_wrap() {
        let length = 400.0;
        assert_eq!(recycle_fade(0.0, length, 0.05), 0.0);
        assert!(recycle_fade(399.999, length, 0.05) < 1e-4);
        assert_eq!(recycle_fade(200.0, length, 0.05), 1.0);
        // A streak crossing the wrap goes from ~0 to ~0, not 1 to 1
        let before = wrap_position(0.0, 70.0, 400.0 / 70.0 - 1e-4, length);
        let after = wrap_position(0.0, 70.0, 400.0 / 70.0 + 1e-4, length);
        assert!(before > 399.0 && after < 1.0);
        assert!(recycle_fade(before, length, 0.05) < 0.01);
        assert!(recycle_fade(after, length, 0.05) < 0.01);
    }

    #[test]
    fn test_recycle_fade_disabled() {
        assert_eq!(recycle_fade(0.0, 400.0, 0.0), 1.0);
    }

    #[test]
    fn test_frozen_frame_is_static() {
        let mut s = scene();
        let frozen = ClockSample::default();
        s.set_boost(true);
        let a = s.update(&frozen, 1.5);
        let b = s.update(&frozen, 1.5);
        assert_eq!(a, b);
    }

    #[test]
    fn test_boost_eases_fov_and_time() {
        let mut s = scene();
        s.set_boost(true);
        let mut elapsed = 0.0;
        let mut frame = RoadFrame {
            time: 0.0,
            camera: s.camera(0.0, 1.0),
            fog_near: 0.0,
            fog_far: 0.0,
        };
        for _ in 0..240 {
            elapsed += 1.0 / 60.0;
            frame = s.update(
                &ClockSample {
                    elapsed,
                    delta: 1.0 / 60.0,
                    ..Default::default()
                },
                1.0,
            );
        }
        assert!(s.fov() > 140.0);
        // Scene time runs ahead of wall time while boosting
        assert!(frame.time > elapsed as f32 + 1.0);

        s.set_boost(false);
        for _ in 0..600 {
            elapsed += 1.0 / 60.0;
            s.update(
                &ClockSample {
                    elapsed,
                    delta: 1.0 / 60.0,
                    ..Default::default()
                },
                1.0,
            );
        }
        assert!((s.fov() - 90.0).abs() < 1.0);
    }

    #[test]
    fn test_streaks_project_in_front_of_camera() {
        let mut s = scene();
        let frame = s.update(&ClockSample::default(), 16.0 / 9.0);
        let camera = frame.camera;
        let samples = s.sample_streaks(frame.time).to_vec();
        let visible = samples
            .iter()
            .filter_map(|sample| camera.project(sample.head))
            .filter(|ndc| ndc.x.abs() <= 1.0 && ndc.y.abs() <= 1.0)
            .count();
        assert!(visible > samples.len() / 4, "{visible} of {} visible", samples.len());
    }

    #[test]
    fn test_fog_factor() {
        assert_eq!(fog_factor(10.0, 80.0, 200_000.0), 0.0);
        assert_eq!(fog_factor(300_000.0, 80.0, 200_000.0), 1.0);
    }

    proptest! {
        #[test]
        fn prop_position_in_range(
            start in 0.0f32..400.0,
            speed in -200.0f32..200.0,
            time in 0.0f32..600.0,
        ) {
            let p = wrap_position(start, speed, time, 400.0);
            prop_assert!((0.0..400.0).contains(&p));
        }

        #[test]
        fn prop_recycle_fade_bounded(position in 0.0f32..400.0, fraction in 0.0f32..0.5) {
            let f = recycle_fade(position, 400.0, fraction);
            prop_assert!((0.0..=1.0).contains(&f));
        }
    }
}

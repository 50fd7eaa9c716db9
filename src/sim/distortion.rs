//! Turbulent road distortion
//!
//! A small sum of sines and cosines over progress along the travel axis.
//! Deterministic in (progress, time); the WGSL in `renderer/road.wgsl` uses the
//! same terms for the road and streak vertices.

use glam::{Vec3, Vec4};
use std::f32::consts::PI;

use crate::config::DistortionConfig;

/// Progress the distortion is measured relative to, so the near end stays put
pub const ANCHOR_PROGRESS: f32 = 0.0125;
/// Progress the camera looks toward
pub const LOOK_PROGRESS: f32 = 0.025;
/// Progress step used for the camera's look direction
const LOOK_STEP: f32 = 0.007;

const LOOK_AT_AMP: Vec3 = Vec3::new(-2.0, -5.0, 0.0);
const LOOK_AT_OFFSET: Vec3 = Vec3::new(0.0, 0.0, -10.0);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Distortion {
    pub freq: Vec4,
    pub amp: Vec4,
}

impl From<DistortionConfig> for Distortion {
    fn from(cfg: DistortionConfig) -> Self {
        Self {
            freq: Vec4::from(cfg.freq),
            amp: Vec4::from(cfg.amp),
        }
    }
}

impl Default for Distortion {
    fn default() -> Self {
        DistortionConfig::default().into()
    }
}

#[inline]
fn nsin(v: f32) -> f32 {
    v.sin() * 0.5 + 0.5
}

/// Ratio that tolerates a zero denominator
#[inline]
fn ratio(num: f32, den: f32) -> f32 {
    if den.abs() < f32::EPSILON { 0.0 } else { num / den }
}

impl Distortion {
    pub fn x(&self, progress: f32, time: f32) -> f32 {
        let (f, a) = (self.freq, self.amp);
        (PI * progress * f.x + time).cos() * a.x
            + (PI * progress * f.y + time * ratio(f.y, f.x)).cos().powi(2) * a.y
    }

    pub fn y(&self, progress: f32, time: f32) -> f32 {
        let (f, a) = (self.freq, self.amp);
        -nsin(PI * progress * f.z + time) * a.z
            - nsin(PI * progress * f.w + time * ratio(f.w, f.z)).powi(5) * a.w
    }

    /// Offset applied to geometry at `progress` in [0, 1] along the road
    pub fn offset(&self, progress: f32, time: f32) -> Vec3 {
        Vec3::new(
            self.x(progress, time) - self.x(ANCHOR_PROGRESS, time),
            self.y(progress, time) - self.y(ANCHOR_PROGRESS, time),
            0.0,
        )
    }

    /// Direction (relative to the camera position) the camera looks along
    pub fn look_direction(&self, progress: f32, time: f32) -> Vec3 {
        let ahead = progress + LOOK_STEP;
        let slope = Vec3::new(
            self.x(progress, time) - self.x(ahead, time),
            self.y(progress, time) - self.y(ahead, time),
            0.0,
        );
        slope * LOOK_AT_AMP + LOOK_AT_OFFSET
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anchor_has_no_offset() {
        let d = Distortion::default();
        for t in [0.0, 1.5, 42.0] {
            assert!(d.offset(ANCHOR_PROGRESS, t).length() < 1e-5);
        }
    }

    #[test]
    fn test_deterministic() {
        let d = Distortion::default();
        assert_eq!(d.offset(0.4, 3.3), d.offset(0.4, 3.3));
        assert_eq!(d.look_direction(LOOK_PROGRESS, 7.0), d.look_direction(LOOK_PROGRESS, 7.0));
    }

    #[test]
    fn test_offset_bounded_by_amplitudes() {
        let d = Distortion::default();
        let bound_x = 2.0 * (d.amp.x + d.amp.y);
        let bound_y = 2.0 * (d.amp.z + d.amp.w);
        for i in 0..=100 {
            for t in 0..10 {
                let o = d.offset(i as f32 / 100.0, t as f32 * 0.7);
                assert!(o.x.abs() <= bound_x && o.y.abs() <= bound_y);
                assert_eq!(o.z, 0.0);
            }
        }
    }

    #[test]
    fn test_camera_looks_forward() {
        let d = Distortion::default();
        for t in 0..20 {
            let dir = d.look_direction(LOOK_PROGRESS, t as f32 * 0.5);
            assert_eq!(dir.z, -10.0);
        }
    }

    #[test]
    fn test_zero_frequency_is_safe() {
        let d = Distortion {
            freq: Vec4::ZERO,
            amp: Vec4::ONE,
        };
        assert!(d.offset(0.5, 1.0).is_finite());
    }
}

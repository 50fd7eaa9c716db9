//! Surface management
//!
//! Pixel-density policy, device profiling, and the slot that owns the one live
//! render target of an engine.

use crate::consts::{
    CONSTRAINED_BLOOM_SCALE, CONSTRAINED_LAYERS, CONSTRAINED_PIXEL_RATIO, NARROW_VIEWPORT_PX,
    STANDARD_LAYERS,
};
use crate::engine::Frame;
use crate::error::EngineError;

/// User-agent fragments that mark a phone or tablet
const MOBILE_AGENTS: [&str; 8] = [
    "android",
    "webos",
    "iphone",
    "ipad",
    "ipod",
    "blackberry",
    "iemobile",
    "opera mini",
];

/// Device class used for quality/performance trade-offs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeviceProfile {
    /// Narrow viewport, touch-primary pointer or mobile user agent
    Constrained,
    #[default]
    Standard,
}

impl DeviceProfile {
    pub fn detect(viewport_width: f64, user_agent: &str, coarse_pointer: bool) -> Self {
        let agent = user_agent.to_lowercase();
        let mobile_agent = MOBILE_AGENTS.iter().any(|m| agent.contains(m));
        if viewport_width < NARROW_VIEWPORT_PX || coarse_pointer || mobile_agent {
            DeviceProfile::Constrained
        } else {
            DeviceProfile::Standard
        }
    }

    /// Depth layers the star field renders with
    pub fn star_layers(&self) -> u32 {
        match self {
            DeviceProfile::Constrained => CONSTRAINED_LAYERS,
            DeviceProfile::Standard => STANDARD_LAYERS,
        }
    }

    /// Whether the optional anti-aliasing pass may be attempted
    pub fn allows_antialiasing(&self) -> bool {
        matches!(self, DeviceProfile::Standard)
    }

    /// Resolution scale of the bloom chain; glow doesn't need sharp edges
    pub fn bloom_scale(&self) -> f32 {
        match self {
            DeviceProfile::Constrained => CONSTRAINED_BLOOM_SCALE,
            DeviceProfile::Standard => 1.0,
        }
    }

    /// Pixel-density cap; `standard_cap` comes from the scene config
    pub fn pixel_ratio_cap(&self, standard_cap: f64) -> f64 {
        match self {
            DeviceProfile::Constrained => CONSTRAINED_PIXEL_RATIO,
            DeviceProfile::Standard => standard_cap,
        }
    }
}

/// Container size in CSS pixels plus the display's pixel ratio
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
    pub device_pixel_ratio: f64,
}

impl Viewport {
    pub fn new(width: f64, height: f64, device_pixel_ratio: f64) -> Self {
        Self {
            width,
            height,
            device_pixel_ratio,
        }
    }
}

/// Physical pixel dimensions of a surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SurfaceSize {
    pub width: u32,
    pub height: u32,
}

impl SurfaceSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn aspect(&self) -> f32 {
        self.width as f32 / self.height.max(1) as f32
    }
}

/// Device pixel ratio actually rendered at
pub fn effective_pixel_ratio(device_pixel_ratio: f64, cap: f64) -> f64 {
    let dpr = if device_pixel_ratio.is_finite() && device_pixel_ratio > 0.0 {
        device_pixel_ratio
    } else {
        1.0
    };
    dpr.min(cap.max(0.25))
}

/// Physical size for a viewport at a given effective ratio; never zero
pub fn physical_size(viewport: &Viewport, pixel_ratio: f64) -> SurfaceSize {
    let scale = |css: f64| {
        let px = (css.max(0.0) * pixel_ratio).round();
        if px.is_finite() { (px as u32).max(1) } else { 1 }
    };
    SurfaceSize::new(scale(viewport.width), scale(viewport.height))
}

/// What a render target must be created with
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceRequest {
    pub size: SurfaceSize,
    pub pixel_ratio: f64,
    pub transparent: bool,
    /// The target may enable anti-aliasing if the platform supports it
    pub antialias: bool,
    /// Resolution scale for the bloom chain, if the scene has one
    pub bloom_scale: f32,
}

/// A drawing target owned by exactly one engine
pub trait RenderTarget {
    /// Reconfigure for a new physical size
    fn resize(&mut self, size: SurfaceSize);
    /// Draw one frame
    fn render(&mut self, frame: &Frame<'_>) -> Result<(), EngineError>;
    /// Free every GPU/DOM resource. Called exactly once by the slot.
    fn release(&mut self);
    /// Whether road frames need per-streak samples. Targets that move the
    /// streaks in a vertex shader return false and get an empty slice.
    fn draws_streaks(&self) -> bool {
        true
    }
}

/// Holds the live render target, if any
pub struct SurfaceSlot<T: RenderTarget> {
    target: Option<T>,
    size: SurfaceSize,
}

impl<T: RenderTarget> Default for SurfaceSlot<T> {
    fn default() -> Self {
        Self {
            target: None,
            size: SurfaceSize::default(),
        }
    }
}

impl<T: RenderTarget> SurfaceSlot<T> {
    /// Install a target; any previous one is released first
    pub fn attach(&mut self, mut target: T, size: SurfaceSize) {
        self.release();
        target.resize(size);
        self.target = Some(target);
        self.size = size;
    }

    /// Apply a size; returns false (and does nothing) if unchanged or empty
    pub fn resize(&mut self, size: SurfaceSize) -> bool {
        if size == self.size {
            return false;
        }
        self.size = size;
        match self.target.as_mut() {
            Some(target) => {
                target.resize(size);
                true
            }
            None => false,
        }
    }

    pub fn render(&mut self, frame: &Frame<'_>) -> Result<(), EngineError> {
        match self.target.as_mut() {
            Some(target) => target.render(frame),
            None => Err(EngineError::Disposed),
        }
    }

    /// Release the target; returns whether one was live. Safe to repeat.
    pub fn release(&mut self) -> bool {
        match self.target.take() {
            Some(mut target) => {
                target.release();
                true
            }
            None => false,
        }
    }

    pub fn is_live(&self) -> bool {
        self.target.is_some()
    }

    pub fn size(&self) -> SurfaceSize {
        self.size
    }

    pub fn target(&self) -> Option<&T> {
        self.target.as_ref()
    }

    pub fn target_mut(&mut self) -> Option<&mut T> {
        self.target.as_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GalaxyConfig;
    use crate::sim::FieldParams;
    use glam::Vec2;

    const DESKTOP_UA: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 Chrome/126.0";
    const PHONE_UA: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X)";

    #[derive(Default)]
    struct Counting {
        resizes: Vec<SurfaceSize>,
        releases: u32,
    }

    impl RenderTarget for Counting {
        fn resize(&mut self, size: SurfaceSize) {
            self.resizes.push(size);
        }
        fn render(&mut self, _frame: &Frame<'_>) -> Result<(), EngineError> {
            Ok(())
        }
        fn release(&mut self) {
            self.releases += 1;
        }
    }

    #[test]
    fn test_profile_detection() {
        assert_eq!(DeviceProfile::detect(1440.0, DESKTOP_UA, false), DeviceProfile::Standard);
        assert_eq!(DeviceProfile::detect(360.0, DESKTOP_UA, false), DeviceProfile::Constrained);
        assert_eq!(DeviceProfile::detect(1440.0, DESKTOP_UA, true), DeviceProfile::Constrained);
        assert_eq!(DeviceProfile::detect(1024.0, PHONE_UA, false), DeviceProfile::Constrained);
    }

    #[test]
    fn test_layers_by_profile() {
        assert_eq!(DeviceProfile::Constrained.star_layers(), 2);
        assert_eq!(DeviceProfile::Standard.star_layers(), 3);
    }

    #[test]
    fn test_bloom_scale_by_profile() {
        assert_eq!(DeviceProfile::Constrained.bloom_scale(), 0.5);
        assert_eq!(DeviceProfile::Standard.bloom_scale(), 1.0);
    }

    #[test]
    fn test_density_caps() {
        let constrained = DeviceProfile::Constrained.pixel_ratio_cap(1.5);
        let standard = DeviceProfile::Standard.pixel_ratio_cap(1.5);
        assert_eq!(effective_pixel_ratio(3.0, constrained), 1.0);
        assert_eq!(effective_pixel_ratio(3.0, standard), 1.5);
        assert_eq!(effective_pixel_ratio(1.25, standard), 1.25);
        assert_eq!(effective_pixel_ratio(f64::NAN, standard), 1.0);
    }

    #[test]
    fn test_physical_size_never_zero() {
        let size = physical_size(&Viewport::new(0.0, 0.0, 2.0), 1.5);
        assert_eq!(size, SurfaceSize::new(1, 1));
        let size = physical_size(&Viewport::new(800.0, 600.0, 2.0), 1.5);
        assert_eq!(size, SurfaceSize::new(1200, 900));
    }

    #[test]
    fn test_slot_resize_idempotent() {
        let mut slot = SurfaceSlot::default();
        slot.attach(Counting::default(), SurfaceSize::new(100, 50));
        assert!(slot.resize(SurfaceSize::new(200, 100)));
        assert!(!slot.resize(SurfaceSize::new(200, 100)));
        let target = slot.target().unwrap();
        assert_eq!(
            target.resizes,
            vec![SurfaceSize::new(100, 50), SurfaceSize::new(200, 100)]
        );
    }

    #[test]
    fn test_slot_release_once() {
        let mut slot = SurfaceSlot::default();
        slot.attach(Counting::default(), SurfaceSize::new(10, 10));
        assert!(slot.release());
        assert!(!slot.release());
        assert!(!slot.is_live());
        let frame = Frame::Galaxy(FieldParams {
            resolution: Vec2::new(10.0, 10.0),
            time: 0.0,
            travel: 0.0,
            layers: 3,
            config: GalaxyConfig::default(),
        });
        assert!(matches!(slot.render(&frame), Err(EngineError::Disposed)));
    }
}

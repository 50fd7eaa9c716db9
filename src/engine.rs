//! Engine lifecycle
//!
//! One engine owns one render target, one clock and one scheduled frame
//! callback at a time. The lifecycle is
//!
//! ```text
//! Uninitialized -> Initializing -> Running -> Disposed
//!                        \_________________/
//!                     (context failure or destroy)
//! ```
//!
//! Every entry point checks the state first, so a frame callback, resize
//! event or late surface that arrives after `destroy` does nothing.

use glam::Vec2;

use crate::config::{GalaxyConfig, SceneConfig};
use crate::error::EngineError;
use crate::platform::{CancelToken, FrameScheduler, Subscription};
use crate::sim::{ClockSample, FieldParams, RoadFrame, RoadScene, SimClock, StreakSample};
use crate::surface::{
    DeviceProfile, RenderTarget, SurfaceRequest, SurfaceSize, SurfaceSlot, Viewport,
    effective_pixel_ratio, physical_size,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Uninitialized,
    /// Waiting for the render target (GPU device requests are async on web)
    Initializing,
    Running,
    Disposed,
}

impl EngineState {
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineState::Uninitialized => "uninitialized",
            EngineState::Initializing => "initializing",
            EngineState::Running => "running",
            EngineState::Disposed => "disposed",
        }
    }
}

/// What a target draws this frame
#[derive(Debug, Clone, Copy)]
pub enum Frame<'a> {
    Galaxy(FieldParams),
    Road {
        frame: RoadFrame,
        streaks: &'a [StreakSample],
    },
}

/// Result of one refresh callback
#[derive(Debug, Clone, PartialEq)]
pub enum FrameOutcome {
    /// Engine isn't running or the callback was cancelled; nothing touched
    Skipped,
    Rendered,
    /// Recoverable failure; the next frame is still scheduled
    Dropped(EngineError),
    /// Unrecoverable failure; the engine disposed itself
    Stopped(EngineError),
}

enum Scene {
    Galaxy(GalaxyConfig),
    Road(Box<RoadScene>),
}

impl Scene {
    fn new(config: &SceneConfig) -> Self {
        match config {
            SceneConfig::Galaxy(c) => Scene::Galaxy(*c),
            SceneConfig::Road(c) => Scene::Road(Box::new(RoadScene::new(c.clone()))),
        }
    }

    /// Travel units per animated second fed to the clock
    fn travel_rate(&self) -> f64 {
        match self {
            Scene::Galaxy(c) => c.star_speed as f64 / 10.0,
            Scene::Road(_) => 1.0,
        }
    }
}

pub struct Engine<T: RenderTarget, S: FrameScheduler> {
    state: EngineState,
    config: SceneConfig,
    profile: DeviceProfile,
    viewport: Viewport,
    pixel_ratio: f64,
    scene: Scene,
    clock: SimClock,
    slot: SurfaceSlot<T>,
    scheduler: S,
    pending: Option<S::Handle>,
    token: CancelToken,
    subscriptions: Vec<Subscription>,
    last_error: Option<EngineError>,
    frames_rendered: u64,
}

impl<T: RenderTarget, S: FrameScheduler> Engine<T, S> {
    pub fn new(config: SceneConfig, viewport: Viewport, profile: DeviceProfile, scheduler: S) -> Self {
        let config = config.sanitized();
        let scene = Scene::new(&config);
        let clock = SimClock::new(scene.travel_rate(), config.disable_animation());
        let pixel_ratio = effective_pixel_ratio(
            viewport.device_pixel_ratio,
            profile.pixel_ratio_cap(config.max_pixel_ratio()),
        );
        log::debug!("Engine created: profile={profile:?}, pixel ratio {pixel_ratio}");
        Self {
            state: EngineState::Uninitialized,
            config,
            profile,
            viewport,
            pixel_ratio,
            scene,
            clock,
            slot: SurfaceSlot::default(),
            scheduler,
            pending: None,
            token: CancelToken::new(),
            subscriptions: Vec::new(),
            last_error: None,
            frames_rendered: 0,
        }
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn config(&self) -> &SceneConfig {
        &self.config
    }

    pub fn profile(&self) -> DeviceProfile {
        self.profile
    }

    /// Effective pixel ratio the surface is rendered at
    pub fn pixel_ratio(&self) -> f64 {
        self.pixel_ratio
    }

    pub fn star_layers(&self) -> u32 {
        self.profile.star_layers()
    }

    pub fn surface_size(&self) -> SurfaceSize {
        physical_size(&self.viewport, self.pixel_ratio)
    }

    /// Why the engine stopped, if it stopped on its own
    pub fn last_error(&self) -> Option<&EngineError> {
        self.last_error.as_ref()
    }

    /// Token shared with scheduled callbacks; cancelled by `destroy`
    pub fn token(&self) -> CancelToken {
        self.token.clone()
    }

    pub fn pending(&self) -> Option<S::Handle> {
        self.pending
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }

    pub fn clock(&self) -> ClockSample {
        self.clock.sample()
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    pub fn target(&self) -> Option<&T> {
        self.slot.target()
    }

    pub fn surface_request(&self) -> SurfaceRequest {
        SurfaceRequest {
            size: self.surface_size(),
            pixel_ratio: self.pixel_ratio,
            transparent: self.config.transparent(),
            antialias: self.profile.allows_antialiasing(),
            bloom_scale: self.profile.bloom_scale(),
        }
    }

    /// Move to `Initializing` and describe the target to create.
    /// Returns `None` unless the engine is fresh.
    pub fn begin_init(&mut self) -> Option<SurfaceRequest> {
        if self.state != EngineState::Uninitialized {
            return None;
        }
        self.state = EngineState::Initializing;
        Some(self.surface_request())
    }

    /// Hand over the target (or the reason there isn't one)
    pub fn attach(&mut self, target: Result<T, EngineError>) -> Result<(), EngineError> {
        match (self.state, target) {
            (EngineState::Initializing, Ok(target)) => {
                let size = self.surface_size();
                self.slot.attach(target, size);
                self.state = EngineState::Running;
                log::info!("Engine running at {}x{}", size.width, size.height);
                self.schedule();
                Ok(())
            }
            (_, Ok(mut target)) => {
                // Destroyed (or never initialized) while the target was being created
                log::debug!("Discarding late render target");
                target.release();
                Err(EngineError::Disposed)
            }
            (EngineState::Disposed, Err(_)) => Err(EngineError::Disposed),
            (_, Err(err)) => {
                log::warn!("Render target unavailable: {err}");
                self.last_error = Some(err.clone());
                self.destroy();
                Err(err)
            }
        }
    }

    /// Synchronous mount: create the target with `provider` and start
    pub fn mount_with<F>(&mut self, provider: F) -> Result<(), EngineError>
    where
        F: FnOnce(&SurfaceRequest) -> Result<T, EngineError>,
    {
        let request = match self.begin_init() {
            Some(request) => request,
            None if self.state == EngineState::Disposed => return Err(EngineError::Disposed),
            None => return Ok(()),
        };
        self.attach(provider(&request))
    }

    /// Keep `subscription` attached until the engine is destroyed
    pub fn add_subscription(&mut self, subscription: Subscription) {
        if self.state == EngineState::Disposed {
            subscription.detach();
            return;
        }
        self.subscriptions.push(subscription);
    }

    /// Apply a new container size. Returns whether the surface changed.
    pub fn resize(&mut self, viewport: Viewport) -> bool {
        if self.state == EngineState::Disposed {
            return false;
        }
        self.viewport = viewport;
        self.pixel_ratio = effective_pixel_ratio(
            viewport.device_pixel_ratio,
            self.profile.pixel_ratio_cap(self.config.max_pixel_ratio()),
        );
        let size = self.surface_size();
        let changed = self.slot.resize(size);
        if changed {
            log::debug!("Surface resized to {}x{}", size.width, size.height);
        }
        changed
    }

    /// Ease the road scene toward its boosted speed (no-op for the star field)
    pub fn set_boost(&mut self, on: bool) {
        if let Scene::Road(scene) = &mut self.scene {
            scene.set_boost(on);
        }
    }

    /// Run one refresh callback at `timestamp_ms`
    pub fn frame(&mut self, timestamp_ms: f64) -> FrameOutcome {
        if self.state != EngineState::Running || self.token.is_cancelled() {
            return FrameOutcome::Skipped;
        }
        self.pending = None;

        let sample = self.clock.tick(timestamp_ms);
        let size = self.slot.size();
        let result = match &mut self.scene {
            Scene::Galaxy(config) => {
                let params = FieldParams {
                    resolution: Vec2::new(size.width as f32, size.height as f32),
                    time: sample.elapsed as f32,
                    travel: sample.travel as f32,
                    layers: self.profile.star_layers(),
                    config: *config,
                };
                self.slot.render(&Frame::Galaxy(params))
            }
            Scene::Road(scene) => {
                let frame = scene.update(&sample, size.aspect());
                let sampled = self.slot.target().is_some_and(|t| t.draws_streaks());
                let streaks: &[StreakSample] = if sampled {
                    scene.sample_streaks(frame.time)
                } else {
                    &[]
                };
                self.slot.render(&Frame::Road { frame, streaks })
            }
        };

        let outcome = match result {
            Ok(()) => {
                self.frames_rendered += 1;
                FrameOutcome::Rendered
            }
            Err(EngineError::SurfaceLost) => {
                log::warn!("Surface lost, reconfiguring");
                if let Some(target) = self.slot.target_mut() {
                    target.resize(size);
                }
                FrameOutcome::Dropped(EngineError::SurfaceLost)
            }
            Err(err @ EngineError::Render(_)) => {
                log::error!("Frame failed: {err}");
                FrameOutcome::Dropped(err)
            }
            Err(err) => {
                log::error!("Stopping engine: {err}");
                self.last_error = Some(err.clone());
                self.destroy();
                return FrameOutcome::Stopped(err);
            }
        };

        // destroy may have run from inside the target
        if self.state == EngineState::Running && !self.token.is_cancelled() {
            self.schedule();
        }
        outcome
    }

    fn schedule(&mut self) {
        if self.pending.is_some() {
            return;
        }
        self.pending = self.scheduler.request();
        if self.pending.is_none() {
            log::warn!("Frame scheduler refused a request");
        }
    }

    /// Stop the loop and free everything. Safe to call any number of times.
    pub fn destroy(&mut self) {
        self.token.cancel();
        if let Some(handle) = self.pending.take() {
            self.scheduler.cancel(handle);
        }
        for subscription in self.subscriptions.drain(..) {
            subscription.detach();
        }
        let released = self.slot.release();
        if self.state != EngineState::Disposed {
            log::info!(
                "Engine disposed after {} frames (target released: {released})",
                self.frames_rendered
            );
        }
        self.state = EngineState::Disposed;
    }
}

impl<T: RenderTarget, S: FrameScheduler> Drop for Engine<T, S> {
    fn drop(&mut self) {
        self.destroy();
    }
}

//! Browser glue
//!
//! Mounts an engine into a container element: creates the canvas, requests a
//! GPU device asynchronously, drives frames with requestAnimationFrame and
//! tracks window resizes. Exposed to JavaScript as `Backdrop`.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::{Document, HtmlCanvasElement, HtmlElement, Window};

use super::{FrameScheduler, Subscription, undo_on_err};
use crate::config::{Preset, RoadConfig, SceneConfig};
use crate::engine::{Engine, EngineState, Frame};
use crate::error::EngineError;
use crate::renderer::GpuTarget;
use crate::surface::{DeviceProfile, RenderTarget, SurfaceRequest, SurfaceSize, Viewport};

type FrameCallback = Closure<dyn FnMut(f64)>;
type WebEngine = Engine<CanvasTarget, RafScheduler>;

const CANVAS_STYLE: [(&str, &str); 7] = [
    ("position", "absolute"),
    ("inset", "0"),
    ("width", "100%"),
    ("height", "100%"),
    ("display", "block"),
    ("pointer-events", "none"),
    ("z-index", "0"),
];

fn js_error(context: &str) -> impl Fn(JsValue) -> EngineError + '_ {
    move |err| EngineError::ContextUnavailable(format!("{context}: {err:?}"))
}

/// requestAnimationFrame scheduler. The callback is installed after the
/// engine exists, since it holds a weak reference back to it.
pub struct RafScheduler {
    window: Window,
    callback: Rc<RefCell<Option<FrameCallback>>>,
}

impl FrameScheduler for RafScheduler {
    type Handle = i32;

    fn request(&mut self) -> Option<i32> {
        let callback = self.callback.borrow();
        let callback = callback.as_ref()?;
        self.window
            .request_animation_frame(callback.as_ref().unchecked_ref())
            .ok()
    }

    fn cancel(&mut self, handle: i32) {
        let _ = self.window.cancel_animation_frame(handle);
    }
}

/// GPU target bound to a canvas that is removed from the page on release
pub struct CanvasTarget {
    canvas: HtmlCanvasElement,
    gpu: GpuTarget,
}

impl RenderTarget for CanvasTarget {
    fn resize(&mut self, size: SurfaceSize) {
        self.canvas.set_width(size.width);
        self.canvas.set_height(size.height);
        self.gpu.resize(size);
    }

    fn render(&mut self, frame: &Frame<'_>) -> Result<(), EngineError> {
        self.gpu.render(frame)
    }

    fn release(&mut self) {
        self.gpu.release();
        self.canvas.remove();
    }

    fn draws_streaks(&self) -> bool {
        self.gpu.draws_streaks()
    }
}

fn init_logging() {
    console_error_panic_hook::set_once();
    // Already initialised by an earlier mount
    let _ = console_log::init_with_level(log::Level::Info);
}

#[wasm_bindgen(start)]
pub fn start() {
    init_logging();
}

fn container_viewport(window: &Window, container: &HtmlElement) -> Viewport {
    let rect = container.get_bounding_client_rect();
    let (mut width, mut height) = (rect.width(), rect.height());
    if width <= 0.0 || height <= 0.0 {
        width = container.client_width() as f64;
        height = container.client_height() as f64;
    }
    Viewport::new(width, height, window.device_pixel_ratio())
}

fn detect_profile(window: &Window) -> DeviceProfile {
    let width = window
        .inner_width()
        .ok()
        .and_then(|w| w.as_f64())
        .unwrap_or(f64::MAX);
    let user_agent = window.navigator().user_agent().unwrap_or_default();
    let coarse = window
        .match_media("(pointer: coarse)")
        .ok()
        .flatten()
        .is_some_and(|m| m.matches());
    DeviceProfile::detect(width, &user_agent, coarse)
}

fn create_canvas(
    document: &Document,
    container: &HtmlElement,
    request: &SurfaceRequest,
) -> Result<HtmlCanvasElement, EngineError> {
    let canvas: HtmlCanvasElement = document
        .create_element("canvas")
        .map_err(js_error("create canvas"))?
        .dyn_into()
        .map_err(|_| EngineError::ContextUnavailable("not a canvas".into()))?;
    canvas.set_width(request.size.width);
    canvas.set_height(request.size.height);
    let _ = canvas.set_attribute("aria-hidden", "true");
    let style = canvas.style();
    for (property, value) in CANVAS_STYLE {
        style
            .set_property(property, value)
            .map_err(js_error("style canvas"))?;
    }
    container
        .append_child(&canvas)
        .map_err(js_error("attach canvas"))?;
    Ok(canvas)
}

async fn create_gpu_target(
    canvas: &HtmlCanvasElement,
    request: &SurfaceRequest,
    config: &SceneConfig,
) -> Result<GpuTarget, EngineError> {
    let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
        backends: wgpu::Backends::BROWSER_WEBGPU | wgpu::Backends::GL,
        ..Default::default()
    });
    let surface = instance
        .create_surface(wgpu::SurfaceTarget::Canvas(canvas.clone()))
        .map_err(|e| EngineError::ContextUnavailable(e.to_string()))?;
    GpuTarget::new(&instance, surface, request, config).await
}

async fn create_target(
    canvas: HtmlCanvasElement,
    request: SurfaceRequest,
    config: SceneConfig,
) -> Result<CanvasTarget, EngineError> {
    let gpu = undo_on_err(create_gpu_target(&canvas, &request, &config).await, || {
        canvas.remove()
    })?;
    Ok(CanvasTarget { canvas, gpu })
}

fn frame_callback(engine: &Rc<RefCell<WebEngine>>) -> FrameCallback {
    let weak = Rc::downgrade(engine);
    let token = engine.borrow().token();
    Closure::<dyn FnMut(f64)>::new(move |timestamp: f64| {
        if token.is_cancelled() {
            return;
        }
        if let Some(engine) = weak.upgrade() {
            if let Ok(mut engine) = engine.try_borrow_mut() {
                engine.frame(timestamp);
            }
        }
    })
}

fn listen_resize(
    window: &Window,
    container: &HtmlElement,
    engine: Weak<RefCell<WebEngine>>,
) -> Result<Subscription, EngineError> {
    let closure = {
        let window = window.clone();
        let container = container.clone();
        Closure::<dyn FnMut(_)>::new(move |_event: web_sys::Event| {
            // Container left the page without a destroy call
            if !container.is_connected() {
                return;
            }
            let Some(engine) = engine.upgrade() else {
                return;
            };
            let Ok(mut engine) = engine.try_borrow_mut() else {
                return;
            };
            engine.resize(container_viewport(&window, &container));
        })
    };
    window
        .add_event_listener_with_callback("resize", closure.as_ref().unchecked_ref())
        .map_err(js_error("resize listener"))?;

    let window = window.clone();
    Ok(Subscription::new(move || {
        let _ =
            window.remove_event_listener_with_callback("resize", closure.as_ref().unchecked_ref());
        drop(closure);
    }))
}

fn mount_engine(
    container: HtmlElement,
    config: SceneConfig,
) -> Result<Rc<RefCell<WebEngine>>, EngineError> {
    let window = web_sys::window().ok_or_else(|| EngineError::ContextUnavailable("no window".into()))?;
    let document = window
        .document()
        .ok_or_else(|| EngineError::ContextUnavailable("no document".into()))?;

    let viewport = container_viewport(&window, &container);
    let profile = detect_profile(&window);
    let callback = Rc::new(RefCell::new(None));
    let scheduler = RafScheduler {
        window: window.clone(),
        callback: callback.clone(),
    };
    let engine = Rc::new(RefCell::new(Engine::new(
        config,
        viewport,
        profile,
        scheduler,
    )));
    *callback.borrow_mut() = Some(frame_callback(&engine));

    let request = engine
        .borrow_mut()
        .begin_init()
        .ok_or(EngineError::Disposed)?;
    let canvas = create_canvas(&document, &container, &request)?;
    // No target owns the canvas yet
    let subscription = undo_on_err(
        listen_resize(&window, &container, Rc::downgrade(&engine)),
        || canvas.remove(),
    )?;
    engine.borrow_mut().add_subscription(subscription);

    // The GPU pipeline must see the same sanitized config as the engine
    let config = engine.borrow().config().clone();
    let weak = Rc::downgrade(&engine);
    wasm_bindgen_futures::spawn_local(async move {
        let result = create_target(canvas, request, config).await;
        match weak.upgrade() {
            Some(engine) => {
                // Failures are recorded on the engine and logged there
                let _ = engine.borrow_mut().attach(result);
            }
            None => {
                if let Ok(mut target) = result {
                    target.release();
                }
            }
        }
    });

    Ok(engine)
}

/// A mounted background animation
#[wasm_bindgen]
pub struct Backdrop {
    engine: Option<Rc<RefCell<WebEngine>>>,
    error: Option<EngineError>,
}

impl Backdrop {
    fn from_result(result: Result<Rc<RefCell<WebEngine>>, EngineError>) -> Self {
        match result {
            Ok(engine) => Self {
                engine: Some(engine),
                error: None,
            },
            Err(err) => {
                log::warn!("Backdrop unavailable: {err}");
                Self {
                    engine: None,
                    error: Some(err),
                }
            }
        }
    }
}

#[wasm_bindgen]
impl Backdrop {
    /// Mount with a JSON options object, e.g. `{"scene": "galaxy", "hueShift": 20}`.
    /// An empty string mounts the default star field.
    pub fn mount(container: HtmlElement, options: &str) -> Backdrop {
        init_logging();
        let config = if options.trim().is_empty() {
            Ok(SceneConfig::default())
        } else {
            SceneConfig::from_json(options)
        };
        Self::from_result(config.and_then(|config| mount_engine(container, config)))
    }

    /// Mount a named preset (`galaxy`, `hyper-canvas`, `hyperspeed`, `hyperspeed-lite`)
    #[wasm_bindgen(js_name = mountPreset)]
    pub fn mount_preset(container: HtmlElement, preset: &str) -> Backdrop {
        init_logging();
        let config = preset
            .parse::<Preset>()
            .map(|p| match p.config() {
                // Fresh traffic on every page load
                SceneConfig::Road(road) => SceneConfig::Road(RoadConfig {
                    seed: js_sys::Date::now() as u64,
                    ..road
                }),
                galaxy => galaxy,
            })
            .map_err(EngineError::Config);
        Self::from_result(config.and_then(|config| mount_engine(container, config)))
    }

    /// Stop the loop, detach listeners and remove the canvas. Idempotent.
    pub fn destroy(&mut self) {
        if let Some(engine) = self.engine.take() {
            if let Ok(mut engine) = engine.try_borrow_mut() {
                engine.destroy();
            }
        }
    }

    /// Ease the road scene into (or out of) boosted speed
    #[wasm_bindgen(js_name = setBoost)]
    pub fn set_boost(&self, on: bool) {
        if let Some(engine) = &self.engine {
            if let Ok(mut engine) = engine.try_borrow_mut() {
                engine.set_boost(on);
            }
        }
    }

    /// `uninitialized`, `initializing`, `running` or `disposed`
    pub fn state(&self) -> String {
        let state = self
            .engine
            .as_ref()
            .and_then(|engine| engine.try_borrow().ok().map(|e| e.state()))
            .unwrap_or(EngineState::Disposed);
        state.as_str().to_string()
    }

    /// Why the backdrop isn't running, if it failed
    #[wasm_bindgen(js_name = lastError)]
    pub fn last_error(&self) -> Option<String> {
        if let Some(err) = &self.error {
            return Some(err.to_string());
        }
        self.engine
            .as_ref()
            .and_then(|engine| engine.try_borrow().ok()?.last_error().map(|e| e.to_string()))
    }
}

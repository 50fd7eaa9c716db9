//! WebGPU device and surface setup shared by both scene pipelines

use crate::consts::BACKGROUND;
use crate::error::EngineError;
use crate::surface::{SurfaceRequest, SurfaceSize};

/// Samples per pixel when anti-aliasing is on
const MSAA_SAMPLES: u32 = 4;

pub struct GpuContext {
    pub surface: wgpu::Surface<'static>,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub config: wgpu::SurfaceConfiguration,
    /// 1, or `MSAA_SAMPLES` when anti-aliasing is active
    pub sample_count: u32,
    /// The surface format can be rendered to and filtered as a texture,
    /// which post-processing needs
    pub sampleable: bool,
    msaa_view: Option<wgpu::TextureView>,
    transparent: bool,
}

impl GpuContext {
    /// Pick an adapter, open a device and configure `surface` for `request`.
    ///
    /// `antialias` is only honoured if the request allows it and the adapter
    /// supports 4x multisampling of the surface format.
    pub async fn new(
        instance: &wgpu::Instance,
        surface: wgpu::Surface<'static>,
        request: &SurfaceRequest,
        antialias: bool,
    ) -> Result<Self, EngineError> {
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::LowPower,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .map_err(|e| EngineError::ContextUnavailable(e.to_string()))?;

        log::info!("Using adapter: {:?}", adapter.get_info().name);

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("starlane-device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::downlevel_webgl2_defaults(),
                memory_hints: Default::default(),
                trace: Default::default(),
                experimental_features: Default::default(),
            })
            .await
            .map_err(|e| EngineError::ContextUnavailable(e.to_string()))?;

        let surface_caps = surface.get_capabilities(&adapter);
        log::debug!("Surface formats: {:?}", surface_caps.formats);
        log::debug!("Surface alpha modes: {:?}", surface_caps.alpha_modes);

        // Shaders write display-referred colour, so skip the sRGB encode
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|f| !f.is_srgb())
            .or_else(|| surface_caps.formats.first())
            .copied()
            .ok_or_else(|| EngineError::ContextUnavailable("surface has no formats".into()))?;

        let wanted_alpha = if request.transparent {
            wgpu::CompositeAlphaMode::PreMultiplied
        } else {
            wgpu::CompositeAlphaMode::Opaque
        };
        let alpha_mode = if surface_caps.alpha_modes.contains(&wanted_alpha) {
            wanted_alpha
        } else {
            surface_caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto)
        };

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: request.size.width.max(1),
            height: request.size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        log::info!(
            "Surface config: {}x{} {:?}, alpha: {:?}",
            config.width,
            config.height,
            config.format,
            config.alpha_mode
        );
        surface.configure(&device, &config);

        let features = adapter.get_texture_format_features(surface_format);
        let sampleable = features
            .flags
            .contains(wgpu::TextureFormatFeatureFlags::FILTERABLE)
            && features.allowed_usages.contains(
                wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::RENDER_ATTACHMENT,
            );
        let sample_count = if antialias
            && request.antialias
            && features.flags.sample_count_supported(MSAA_SAMPLES)
        {
            MSAA_SAMPLES
        } else {
            1
        };
        let msaa_view = create_msaa_view(&device, &config, sample_count);

        Ok(Self {
            surface,
            device,
            queue,
            config,
            sample_count,
            sampleable,
            msaa_view,
            transparent: request.transparent,
        })
    }

    pub fn resize(&mut self, size: SurfaceSize) {
        if size.width > 0 && size.height > 0 {
            self.config.width = size.width;
            self.config.height = size.height;
            self.surface.configure(&self.device, &self.config);
            self.msaa_view = create_msaa_view(&self.device, &self.config, self.sample_count);
        }
    }

    pub fn size(&self) -> SurfaceSize {
        SurfaceSize::new(self.config.width, self.config.height)
    }

    pub fn format(&self) -> wgpu::TextureFormat {
        self.config.format
    }

    /// Whether fragment output must be premultiplied by alpha
    pub fn premultiplied(&self) -> bool {
        self.config.alpha_mode == wgpu::CompositeAlphaMode::PreMultiplied
    }

    pub fn multisample(&self) -> wgpu::MultisampleState {
        wgpu::MultisampleState {
            count: self.sample_count,
            ..Default::default()
        }
    }

    /// Transparent when the page should show through, otherwise the page background
    pub fn clear_color(&self) -> wgpu::Color {
        if self.transparent {
            wgpu::Color::TRANSPARENT
        } else {
            wgpu::Color {
                r: BACKGROUND[0] as f64,
                g: BACKGROUND[1] as f64,
                b: BACKGROUND[2] as f64,
                a: 1.0,
            }
        }
    }

    /// Colour attachment that resolves through the MSAA texture when active
    pub fn color_attachment<'a>(
        &'a self,
        frame_view: &'a wgpu::TextureView,
    ) -> wgpu::RenderPassColorAttachment<'a> {
        let load = wgpu::LoadOp::Clear(self.clear_color());
        match &self.msaa_view {
            Some(msaa) => wgpu::RenderPassColorAttachment {
                view: msaa,
                resolve_target: Some(frame_view),
                ops: wgpu::Operations {
                    load,
                    store: wgpu::StoreOp::Discard,
                },
                depth_slice: None,
            },
            None => wgpu::RenderPassColorAttachment {
                view: frame_view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load,
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            },
        }
    }

    /// Acquire the next surface texture
    pub fn acquire(&self) -> Result<(wgpu::SurfaceTexture, wgpu::TextureView), EngineError> {
        let output = self.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        Ok((output, view))
    }
}

fn create_msaa_view(
    device: &wgpu::Device,
    config: &wgpu::SurfaceConfiguration,
    sample_count: u32,
) -> Option<wgpu::TextureView> {
    if sample_count <= 1 {
        return None;
    }
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("msaa_color"),
        size: wgpu::Extent3d {
            width: config.width,
            height: config.height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count,
        dimension: wgpu::TextureDimension::D2,
        format: config.format,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    Some(texture.create_view(&wgpu::TextureViewDescriptor::default()))
}

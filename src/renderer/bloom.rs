//! Bloom post-process for the road scene
//!
//! The scene is drawn into an offscreen texture. Bright pixels are extracted
//! into a chain of half-size mips, blurred down the chain and back up with
//! additive blending, then composited over the scene onto the surface. The
//! free functions are the per-pixel maths `bloom.wgsl` runs.

use bytemuck::{Pod, Zeroable};
use wgpu::util::DeviceExt;

use super::gpu::GpuContext;
use crate::config::RoadConfig;
use crate::smoothstep;
use crate::surface::SurfaceSize;

/// Longest downsample chain
pub const MAX_BLOOM_MIPS: usize = 5;

/// Rec. 709 luma weights
const LUMA: [f32; 3] = [0.2126, 0.7152, 0.0722];

pub fn luminance(rgb: [f32; 3]) -> f32 {
    rgb[0] * LUMA[0] + rgb[1] * LUMA[1] + rgb[2] * LUMA[2]
}

/// Share of a pixel that blooms; `smoothing == 0` is a hard cut at `threshold`
pub fn threshold_weight(luma: f32, threshold: f32, smoothing: f32) -> f32 {
    if smoothing <= 0.0 {
        return if luma >= threshold { 1.0 } else { 0.0 };
    }
    smoothstep(threshold, threshold + smoothing, luma)
}

/// Add bloom light to a premultiplied scene pixel. Alpha grows with the
/// added light so the result stays valid premultiplied colour.
pub fn composite(scene: [f32; 4], bloom: [f32; 3], intensity: f32) -> [f32; 4] {
    let rgb = [
        scene[0] + bloom[0] * intensity,
        scene[1] + bloom[1] * intensity,
        scene[2] + bloom[2] * intensity,
    ];
    let peak = rgb[0].max(rgb[1]).max(rgb[2]);
    [rgb[0], rgb[1], rgb[2], scene[3].max(peak).min(1.0)]
}

/// Bloom chain sizes: the first level is half the scaled surface, each next
/// one half again, stopping around 8px on the short side
pub fn mip_sizes(surface: SurfaceSize, scale: f32) -> Vec<SurfaceSize> {
    let scale = if scale.is_finite() { scale.clamp(0.1, 1.0) } else { 1.0 };
    let width = ((surface.width as f32 * scale) as u32).max(1);
    let height = ((surface.height as f32 * scale) as u32).max(1);
    let levels = ((width.min(height) as f32).log2().floor() as usize)
        .saturating_sub(3)
        .clamp(1, MAX_BLOOM_MIPS);

    let half = |s: SurfaceSize| SurfaceSize::new((s.width / 2).max(1), (s.height / 2).max(1));
    let mut size = half(SurfaceSize::new(width, height));
    let mut sizes = Vec::with_capacity(levels);
    for _ in 0..levels {
        sizes.push(size);
        size = half(size);
    }
    sizes
}

// Must match `Bloom` in bloom.wgsl
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
struct BloomUniforms {
    texel_size: [f32; 2], // offset 0
    threshold: f32,       // offset 8
    smoothing: f32,       // offset 12
    intensity: f32,       // offset 16
    _pad: [f32; 3],       // offset 20
}

/// Size-dependent textures and bind groups, rebuilt on resize
struct Chain {
    scene_view: wgpu::TextureView,
    mips: Vec<wgpu::TextureView>,
    threshold: wgpu::BindGroup,
    /// `downsample[i]` reads mip `i` into mip `i + 1`
    downsample: Vec<wgpu::BindGroup>,
    /// `upsample[i]` reads mip `i + 1` into mip `i`
    upsample: Vec<wgpu::BindGroup>,
    composite: wgpu::BindGroup,
}

pub struct BloomPass {
    threshold_pipeline: wgpu::RenderPipeline,
    downsample_pipeline: wgpu::RenderPipeline,
    upsample_pipeline: wgpu::RenderPipeline,
    composite_pipeline: wgpu::RenderPipeline,
    layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    threshold: f32,
    smoothing: f32,
    intensity: f32,
    scale: f32,
    chain: Chain,
}

fn texture_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: true },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    }
}

fn fullscreen_pipeline(
    ctx: &GpuContext,
    layout: &wgpu::PipelineLayout,
    shader: &wgpu::ShaderModule,
    label: &str,
    fs: &str,
    blend: Option<wgpu::BlendState>,
) -> wgpu::RenderPipeline {
    ctx.device
        .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(label),
            layout: Some(layout),
            vertex: wgpu::VertexState {
                module: shader,
                entry_point: Some("vs_fullscreen"),
                buffers: &[],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: shader,
                entry_point: Some(fs),
                targets: &[Some(wgpu::ColorTargetState {
                    format: ctx.format(),
                    blend,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview_mask: None,
            cache: None,
        })
}

fn render_texture(ctx: &GpuContext, label: &str, size: SurfaceSize) -> wgpu::TextureView {
    let texture = ctx.device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: wgpu::Extent3d {
            width: size.width.max(1),
            height: size.height.max(1),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: ctx.format(),
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
        view_formats: &[],
    });
    texture.create_view(&wgpu::TextureViewDescriptor::default())
}

fn run_pass(
    encoder: &mut wgpu::CommandEncoder,
    label: &str,
    target: &wgpu::TextureView,
    load: wgpu::LoadOp<wgpu::Color>,
    pipeline: &wgpu::RenderPipeline,
    bind_group: &wgpu::BindGroup,
) {
    let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
        label: Some(label),
        color_attachments: &[Some(wgpu::RenderPassColorAttachment {
            view: target,
            resolve_target: None,
            ops: wgpu::Operations {
                load,
                store: wgpu::StoreOp::Store,
            },
            depth_slice: None,
        })],
        depth_stencil_attachment: None,
        timestamp_writes: None,
        occlusion_query_set: None,
        multiview_mask: None,
    });
    pass.set_pipeline(pipeline);
    pass.set_bind_group(0, bind_group, &[]);
    pass.draw(0..3, 0..1);
}

impl BloomPass {
    /// `scale` is the chain resolution relative to the surface
    pub fn new(ctx: &GpuContext, config: &RoadConfig, scale: f32) -> Self {
        let device = &ctx.device;
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("bloom_shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("bloom.wgsl").into()),
        });

        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("bloom_bind_group_layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                texture_entry(1),
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
                texture_entry(3),
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("bloom_pipeline_layout"),
            bind_group_layouts: &[&layout],
            immediate_size: 0,
        });

        let additive = wgpu::BlendComponent {
            src_factor: wgpu::BlendFactor::One,
            dst_factor: wgpu::BlendFactor::One,
            operation: wgpu::BlendOperation::Add,
        };
        let threshold_pipeline = fullscreen_pipeline(
            ctx,
            &pipeline_layout,
            &shader,
            "bloom_threshold_pipeline",
            "fs_threshold",
            None,
        );
        let downsample_pipeline = fullscreen_pipeline(
            ctx,
            &pipeline_layout,
            &shader,
            "bloom_downsample_pipeline",
            "fs_downsample",
            None,
        );
        let upsample_pipeline = fullscreen_pipeline(
            ctx,
            &pipeline_layout,
            &shader,
            "bloom_upsample_pipeline",
            "fs_upsample",
            Some(wgpu::BlendState {
                color: additive,
                alpha: additive,
            }),
        );
        let composite_pipeline = fullscreen_pipeline(
            ctx,
            &pipeline_layout,
            &shader,
            "bloom_composite_pipeline",
            "fs_composite",
            None,
        );

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("bloom_sampler"),
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            ..Default::default()
        });

        let mut pass = Self {
            threshold_pipeline,
            downsample_pipeline,
            upsample_pipeline,
            composite_pipeline,
            chain: Chain::empty(ctx, &layout, &sampler),
            layout,
            sampler,
            threshold: config.bloom_threshold,
            smoothing: config.bloom_smoothing,
            intensity: config.bloom_intensity,
            scale,
        };
        pass.resize(ctx);
        pass
    }

    /// Rebuild the offscreen scene and mip chain for the surface's size
    pub fn resize(&mut self, ctx: &GpuContext) {
        let size = ctx.size();
        let sizes = mip_sizes(size, self.scale);
        log::debug!(
            "Bloom chain for {}x{}: {} levels from {}x{}",
            size.width,
            size.height,
            sizes.len(),
            sizes[0].width,
            sizes[0].height
        );

        let scene_view = render_texture(ctx, "bloom_scene", size);
        let mips: Vec<wgpu::TextureView> = sizes
            .iter()
            .map(|&s| render_texture(ctx, "bloom_mip", s))
            .collect();

        let threshold = self.bind_group(ctx, size, &scene_view, &scene_view);
        let downsample = (1..mips.len())
            .map(|i| self.bind_group(ctx, sizes[i - 1], &mips[i - 1], &mips[i - 1]))
            .collect();
        let upsample = (0..mips.len() - 1)
            .map(|i| self.bind_group(ctx, sizes[i + 1], &mips[i + 1], &mips[i + 1]))
            .collect();
        let composite = self.bind_group(ctx, size, &scene_view, &mips[0]);

        self.chain = Chain {
            scene_view,
            mips,
            threshold,
            downsample,
            upsample,
            composite,
        };
    }

    fn bind_group(
        &self,
        ctx: &GpuContext,
        source_size: SurfaceSize,
        source: &wgpu::TextureView,
        aux: &wgpu::TextureView,
    ) -> wgpu::BindGroup {
        let uniforms = BloomUniforms {
            texel_size: [
                1.0 / source_size.width.max(1) as f32,
                1.0 / source_size.height.max(1) as f32,
            ],
            threshold: self.threshold,
            smoothing: self.smoothing,
            intensity: self.intensity,
            _pad: [0.0; 3],
        };
        bloom_bind_group(ctx, &self.layout, &self.sampler, &uniforms, source, aux)
    }

    /// Where the scene pass should draw
    pub fn scene_view(&self) -> &wgpu::TextureView {
        &self.chain.scene_view
    }

    /// Record the bloom passes, ending with the composite into `output`
    pub fn apply(&self, encoder: &mut wgpu::CommandEncoder, output: &wgpu::TextureView) {
        let chain = &self.chain;
        let clear = wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT);

        run_pass(
            encoder,
            "bloom_threshold_pass",
            &chain.mips[0],
            clear,
            &self.threshold_pipeline,
            &chain.threshold,
        );
        for (i, bind_group) in chain.downsample.iter().enumerate() {
            run_pass(
                encoder,
                "bloom_downsample_pass",
                &chain.mips[i + 1],
                clear,
                &self.downsample_pipeline,
                bind_group,
            );
        }
        for (i, bind_group) in chain.upsample.iter().enumerate().rev() {
            run_pass(
                encoder,
                "bloom_upsample_pass",
                &chain.mips[i],
                wgpu::LoadOp::Load,
                &self.upsample_pipeline,
                bind_group,
            );
        }
        run_pass(
            encoder,
            "bloom_composite_pass",
            output,
            clear,
            &self.composite_pipeline,
            &chain.composite,
        );
    }
}

fn bloom_bind_group(
    ctx: &GpuContext,
    layout: &wgpu::BindGroupLayout,
    sampler: &wgpu::Sampler,
    uniforms: &BloomUniforms,
    source: &wgpu::TextureView,
    aux: &wgpu::TextureView,
) -> wgpu::BindGroup {
    let buffer = ctx
        .device
        .create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("bloom_uniforms"),
            contents: bytemuck::bytes_of(uniforms),
            usage: wgpu::BufferUsages::UNIFORM,
        });
    ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("bloom_bind_group"),
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::TextureView(source),
            },
            wgpu::BindGroupEntry {
                binding: 2,
                resource: wgpu::BindingResource::Sampler(sampler),
            },
            wgpu::BindGroupEntry {
                binding: 3,
                resource: wgpu::BindingResource::TextureView(aux),
            },
        ],
    })
}

impl Chain {
    /// 1x1 placeholder so `BloomPass` exists before its first resize
    fn empty(ctx: &GpuContext, layout: &wgpu::BindGroupLayout, sampler: &wgpu::Sampler) -> Self {
        let one = SurfaceSize::new(1, 1);
        let scene_view = render_texture(ctx, "bloom_scene", one);
        let mip = render_texture(ctx, "bloom_mip", one);
        let uniforms = BloomUniforms::zeroed();
        let threshold = bloom_bind_group(ctx, layout, sampler, &uniforms, &scene_view, &scene_view);
        let composite = bloom_bind_group(ctx, layout, sampler, &uniforms, &scene_view, &mip);
        Self {
            scene_view,
            mips: vec![mip],
            threshold,
            downsample: Vec::new(),
            upsample: Vec::new(),
            composite,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_layout() {
        assert_eq!(std::mem::size_of::<BloomUniforms>(), 32);
    }

    #[test]
    fn test_luminance_weights() {
        assert!((luminance([1.0, 1.0, 1.0]) - 1.0).abs() < 1e-6);
        assert_eq!(luminance([0.0, 0.0, 0.0]), 0.0);
        assert!(luminance([0.0, 1.0, 0.0]) > luminance([1.0, 0.0, 0.0]));
    }

    #[test]
    fn test_hard_threshold() {
        assert_eq!(threshold_weight(0.19, 0.2, 0.0), 0.0);
        assert_eq!(threshold_weight(0.2, 0.2, 0.0), 1.0);
        assert_eq!(threshold_weight(0.9, 0.2, 0.0), 1.0);
    }

    #[test]
    fn test_soft_threshold_ramps() {
        assert!(threshold_weight(0.2, 0.2, 0.1).abs() < 1e-5);
        let mid = threshold_weight(0.25, 0.2, 0.1);
        assert!(mid > 0.0 && mid < 1.0);
        assert!((threshold_weight(0.35, 0.2, 0.1) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_dark_road_does_not_bloom() {
        // Road and background colours sit well under the default threshold
        let config = RoadConfig::default();
        for hex in [config.colors.road_color, config.colors.background] {
            let luma = luminance(crate::hex_to_rgb(hex));
            assert_eq!(threshold_weight(luma, config.bloom_threshold, 0.0), 0.0);
        }
    }

    #[test]
    fn test_composite_without_light_is_identity() {
        let scene = [0.1, 0.2, 0.3, 0.5];
        assert_eq!(composite(scene, [0.0; 3], 1.0), scene);
        assert_eq!(composite(scene, [0.8; 3], 0.0), scene);
    }

    #[test]
    fn test_composite_stays_premultiplied() {
        // Glow over a fully transparent pixel
        let out = composite([0.0; 4], [0.2, 0.6, 0.4], 1.0);
        assert!((out[3] - 0.6).abs() < 1e-6);
        for c in &out[..3] {
            assert!(*c <= out[3] + 1e-6);
        }
        let out = composite([0.5, 0.5, 0.5, 1.0], [2.0; 3], 1.0);
        assert_eq!(out[3], 1.0);
    }

    #[test]
    fn test_mip_chain_sizes() {
        let sizes = mip_sizes(SurfaceSize::new(1280, 720), 1.0);
        assert_eq!(sizes.len(), MAX_BLOOM_MIPS);
        assert_eq!(sizes[0], SurfaceSize::new(640, 360));
        assert_eq!(sizes[4], SurfaceSize::new(40, 22));
    }

    #[test]
    fn test_constrained_chain_starts_at_half() {
        let full = mip_sizes(SurfaceSize::new(720, 1280), 1.0);
        let half = mip_sizes(SurfaceSize::new(720, 1280), 0.5);
        assert_eq!(half[0], SurfaceSize::new(180, 320));
        assert_eq!(half[0].width * 2, full[0].width);
        assert!(half.len() <= full.len());
    }

    #[test]
    fn test_tiny_surface_keeps_one_level() {
        assert_eq!(mip_sizes(SurfaceSize::new(1, 1), 0.5), vec![SurfaceSize::new(1, 1)]);
        assert_eq!(
            mip_sizes(SurfaceSize::new(64, 64), f32::NAN),
            mip_sizes(SurfaceSize::new(64, 64), 1.0)
        );
    }
}

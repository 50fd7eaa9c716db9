//! Star field render pipeline
//!
//! The whole field is evaluated in the fragment shader over a fullscreen
//! triangle; the only per-frame upload is one uniform block.

use bytemuck::{Pod, Zeroable};
use wgpu::util::DeviceExt;

use super::gpu::GpuContext;
use crate::error::EngineError;
use crate::sim::FieldParams;

const FLAG_TRANSPARENT: u32 = 1;
const FLAG_PREMULTIPLY: u32 = 2;

// Must match `Globals` in galaxy.wgsl
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
struct GalaxyGlobals {
    resolution: [f32; 2],   // offset 0
    focal: [f32; 2],        // offset 8
    time: f32,              // offset 16
    travel: f32,            // offset 20
    density: f32,           // offset 24
    size: f32,              // offset 28
    hue_shift: f32,         // offset 32
    speed: f32,             // offset 36
    glow_intensity: f32,    // offset 40
    saturation: f32,        // offset 44
    twinkle_intensity: f32, // offset 48
    rotation_speed: f32,    // offset 52
    layers: u32,            // offset 56
    flags: u32,             // offset 60
}

impl GalaxyGlobals {
    fn new(params: &FieldParams, premultiply: bool) -> Self {
        let cfg = &params.config;
        let mut flags = 0;
        if cfg.transparent {
            flags |= FLAG_TRANSPARENT;
            if premultiply {
                flags |= FLAG_PREMULTIPLY;
            }
        }
        Self {
            resolution: params.resolution.to_array(),
            focal: cfg.focal,
            time: params.time,
            travel: params.travel,
            density: cfg.density,
            size: cfg.size,
            hue_shift: cfg.hue_shift,
            speed: cfg.speed,
            glow_intensity: cfg.glow_intensity,
            saturation: cfg.saturation,
            twinkle_intensity: cfg.twinkle_intensity,
            rotation_speed: cfg.rotation_speed,
            layers: params.layers,
            flags,
        }
    }
}

pub struct GalaxyPipeline {
    pipeline: wgpu::RenderPipeline,
    globals_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

impl GalaxyPipeline {
    pub fn new(ctx: &GpuContext) -> Self {
        let device = &ctx.device;
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("galaxy_shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("galaxy.wgsl").into()),
        });

        let globals_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("galaxy_globals"),
            contents: bytemuck::bytes_of(&GalaxyGlobals::zeroed()),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("galaxy_bind_group_layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("galaxy_bind_group"),
            layout: &bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: globals_buffer.as_entire_binding(),
            }],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("galaxy_pipeline_layout"),
            bind_group_layouts: &[&bind_group_layout],
            immediate_size: 0,
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("galaxy_pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[], // fullscreen triangle
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: ctx.format(),
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: ctx.multisample(),
            multiview_mask: None,
            cache: None,
        });

        Self {
            pipeline,
            globals_buffer,
            bind_group,
        }
    }

    pub fn render(&self, ctx: &GpuContext, params: &FieldParams) -> Result<(), EngineError> {
        let globals = GalaxyGlobals::new(params, ctx.premultiplied());
        ctx.queue
            .write_buffer(&self.globals_buffer, 0, bytemuck::bytes_of(&globals));

        let (output, view) = ctx.acquire()?;
        let mut encoder = ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("galaxy_encoder"),
            });

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("galaxy_pass"),
                color_attachments: &[Some(ctx.color_attachment(&view))],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });
            render_pass.set_pipeline(&self.pipeline);
            render_pass.set_bind_group(0, &self.bind_group, &[]);
            render_pass.draw(0..3, 0..1);
        }

        ctx.queue.submit(std::iter::once(encoder.finish()));
        output.present();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GalaxyConfig;
    use glam::Vec2;

    #[test]
    fn test_globals_layout() {
        assert_eq!(std::mem::size_of::<GalaxyGlobals>(), 64);
        assert_eq!(std::mem::size_of::<GalaxyGlobals>() % 16, 0);
    }

    #[test]
    fn test_flags() {
        let mut params = FieldParams {
            resolution: Vec2::new(100.0, 50.0),
            time: 1.0,
            travel: 0.1,
            layers: 2,
            config: GalaxyConfig::default(),
        };
        assert_eq!(GalaxyGlobals::new(&params, true).flags, 3);
        assert_eq!(GalaxyGlobals::new(&params, false).flags, 1);
        params.config.transparent = false;
        assert_eq!(GalaxyGlobals::new(&params, true).flags, 0);
        assert_eq!(GalaxyGlobals::new(&params, true).layers, 2);
    }
}

//! Road scene render pipeline
//!
//! Static geometry (road planes, unit tube, one instance per light streak) is
//! uploaded once at creation. Each frame writes a single uniform block; the
//! vertex shader moves every streak along the road and applies distortion.
//! With bloom on, the scene goes to an offscreen texture and the bloom chain
//! composites it onto the surface.

use bytemuck::{Pod, Zeroable};
use wgpu::util::DeviceExt;

use super::bloom::BloomPass;
use super::gpu::GpuContext;
use super::shapes::{road_surface, unit_tube};
use super::vertex::{LightInstance, RoadVertex, TubeVertex};
use crate::config::RoadConfig;
use crate::error::EngineError;
use crate::hex_to_rgb;
use crate::sim::{Distortion, RoadFrame, RoadScene};

// Must match `Globals` in road.wgsl
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
struct RoadGlobals {
    view_proj: [[f32; 4]; 4], // offset 0
    freq: [f32; 4],           // offset 64
    amp: [f32; 4],            // offset 80
    fog_color: [f32; 3],      // offset 96
    fog_near: f32,            // offset 108
    time: f32,                // offset 112
    travel_length: f32,       // offset 116
    fog_far: f32,             // offset 120
    recycle_fade: f32,        // offset 124
    eye: [f32; 4],            // offset 128
    forward: [f32; 4],        // offset 144
}

impl RoadGlobals {
    fn new(frame: &RoadFrame, config: &RoadConfig, distortion: &Distortion) -> Self {
        let camera = &frame.camera;
        let forward = (camera.target - camera.eye).normalize_or_zero();
        Self {
            view_proj: camera.view_proj().to_cols_array_2d(),
            freq: distortion.freq.to_array(),
            amp: distortion.amp.to_array(),
            fog_color: hex_to_rgb(config.colors.background),
            fog_near: frame.fog_near,
            time: frame.time,
            travel_length: config.length,
            fog_far: frame.fog_far,
            recycle_fade: config.recycle_fade,
            eye: camera.eye.extend(1.0).to_array(),
            forward: forward.extend(0.0).to_array(),
        }
    }
}

pub struct RoadPipeline {
    road_pipeline: wgpu::RenderPipeline,
    light_pipeline: wgpu::RenderPipeline,
    globals_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,

    road_vertices: wgpu::Buffer,
    road_indices: wgpu::Buffer,
    road_index_count: u32,
    tube_vertices: wgpu::Buffer,
    tube_indices: wgpu::Buffer,
    tube_index_count: u32,
    instances: wgpu::Buffer,
    instance_count: u32,

    config: RoadConfig,
    distortion: Distortion,
    bloom: Option<BloomPass>,
}

struct PipelineDesc<'a> {
    label: &'a str,
    vs: &'a str,
    fs: &'a str,
    buffers: &'a [wgpu::VertexBufferLayout<'a>],
    blend: Option<wgpu::BlendState>,
}

fn create_pipeline(
    ctx: &GpuContext,
    layout: &wgpu::PipelineLayout,
    shader: &wgpu::ShaderModule,
    desc: PipelineDesc<'_>,
) -> wgpu::RenderPipeline {
    ctx.device
        .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(desc.label),
            layout: Some(layout),
            vertex: wgpu::VertexState {
                module: shader,
                entry_point: Some(desc.vs),
                buffers: desc.buffers,
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: shader,
                entry_point: Some(desc.fs),
                targets: &[Some(wgpu::ColorTargetState {
                    format: ctx.format(),
                    blend: desc.blend,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                cull_mode: None,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: ctx.multisample(),
            multiview_mask: None,
            cache: None,
        })
}

impl RoadPipeline {
    /// `bloom_scale` enables bloom at that fraction of the surface resolution
    pub fn new(ctx: &GpuContext, scene: &RoadScene, bloom_scale: Option<f32>) -> Self {
        let device = &ctx.device;
        let config = scene.config().clone();

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("road_shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("road.wgsl").into()),
        });

        let globals_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("road_globals"),
            contents: bytemuck::bytes_of(&RoadGlobals::zeroed()),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("road_bind_group_layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("road_bind_group"),
            layout: &bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: globals_buffer.as_entire_binding(),
            }],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("road_pipeline_layout"),
            bind_group_layouts: &[&bind_group_layout],
            immediate_size: 0,
        });

        let road_pipeline = create_pipeline(
            ctx,
            &pipeline_layout,
            &shader,
            PipelineDesc {
                label: "road_surface_pipeline",
                vs: "vs_road",
                fs: "fs_road",
                buffers: &[RoadVertex::desc()],
                blend: None,
            },
        );
        let light_pipeline = create_pipeline(
            ctx,
            &pipeline_layout,
            &shader,
            PipelineDesc {
                label: "road_light_pipeline",
                vs: "vs_light",
                fs: "fs_light",
                buffers: &[TubeVertex::desc(), LightInstance::desc()],
                blend: Some(wgpu::BlendState::PREMULTIPLIED_ALPHA_BLENDING),
            },
        );

        let surface = road_surface(&config);
        let road_vertices = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("road_vertices"),
            contents: bytemuck::cast_slice(&surface.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let road_indices = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("road_indices"),
            contents: bytemuck::cast_slice(&surface.indices),
            usage: wgpu::BufferUsages::INDEX,
        });

        let tube = unit_tube();
        let tube_vertices = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("tube_vertices"),
            contents: bytemuck::cast_slice(&tube.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let tube_indices = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("tube_indices"),
            contents: bytemuck::cast_slice(&tube.indices),
            usage: wgpu::BufferUsages::INDEX,
        });

        let instance_data: Vec<LightInstance> = scene
            .streaks()
            .iter()
            .map(|s| LightInstance::new(s, config.car_lights_fade))
            .collect();
        // Zero-length buffers aren't valid vertex buffers
        let instance_bytes: &[u8] = if instance_data.is_empty() {
            bytemuck::bytes_of(&LIGHT_PLACEHOLDER)
        } else {
            bytemuck::cast_slice(&instance_data)
        };
        let instances = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("light_instances"),
            contents: instance_bytes,
            usage: wgpu::BufferUsages::VERTEX,
        });

        let bloom = bloom_scale.map(|scale| BloomPass::new(ctx, &config, scale));

        log::info!(
            "Road pipeline: {} surface vertices, {} light instances, {}x MSAA, bloom {:?}",
            surface.vertices.len(),
            instance_data.len(),
            ctx.sample_count,
            bloom_scale
        );

        Self {
            road_pipeline,
            light_pipeline,
            globals_buffer,
            bind_group,
            road_vertices,
            road_indices,
            road_index_count: surface.index_count(),
            tube_vertices,
            tube_indices,
            tube_index_count: tube.index_count(),
            instances,
            instance_count: instance_data.len() as u32,
            distortion: *scene.distortion(),
            config,
            bloom,
        }
    }

    /// Follow a surface resize; the context must already be reconfigured
    pub fn resize(&mut self, ctx: &GpuContext) {
        if let Some(bloom) = &mut self.bloom {
            bloom.resize(ctx);
        }
    }

    pub fn render(&self, ctx: &GpuContext, frame: &RoadFrame) -> Result<(), EngineError> {
        let globals = RoadGlobals::new(frame, &self.config, &self.distortion);
        ctx.queue
            .write_buffer(&self.globals_buffer, 0, bytemuck::bytes_of(&globals));

        let (output, view) = ctx.acquire()?;
        let mut encoder = ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("road_encoder"),
            });

        let scene_view = self.bloom.as_ref().map_or(&view, |b| b.scene_view());
        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("road_pass"),
                color_attachments: &[Some(ctx.color_attachment(scene_view))],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });
            render_pass.set_bind_group(0, &self.bind_group, &[]);

            render_pass.set_pipeline(&self.road_pipeline);
            render_pass.set_vertex_buffer(0, self.road_vertices.slice(..));
            render_pass.set_index_buffer(self.road_indices.slice(..), wgpu::IndexFormat::Uint16);
            render_pass.draw_indexed(0..self.road_index_count, 0, 0..1);

            if self.instance_count > 0 {
                render_pass.set_pipeline(&self.light_pipeline);
                render_pass.set_vertex_buffer(0, self.tube_vertices.slice(..));
                render_pass.set_vertex_buffer(1, self.instances.slice(..));
                render_pass
                    .set_index_buffer(self.tube_indices.slice(..), wgpu::IndexFormat::Uint16);
                render_pass.draw_indexed(0..self.tube_index_count, 0, 0..self.instance_count);
            }
        }
        if let Some(bloom) = &self.bloom {
            bloom.apply(&mut encoder, &view);
        }

        ctx.queue.submit(std::iter::once(encoder.finish()));
        output.present();
        Ok(())
    }
}

const LIGHT_PLACEHOLDER: LightInstance = LightInstance {
    offset: [0.0; 3],
    metrics: [0.0; 3],
    color: [0.0; 3],
    fade: [0.0; 2],
};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::ClockSample;

    #[test]
    fn test_globals_layout() {
        assert_eq!(std::mem::size_of::<RoadGlobals>(), 160);
        assert_eq!(std::mem::size_of::<RoadGlobals>() % 16, 0);
    }

    #[test]
    fn test_globals_from_frame() {
        let mut scene = RoadScene::new(RoadConfig::default());
        let frame = scene.update(&ClockSample::default(), 16.0 / 9.0);
        let globals = RoadGlobals::new(&frame, scene.config(), scene.distortion());
        assert_eq!(globals.travel_length, 400.0);
        assert_eq!(globals.fog_near, 80.0);
        assert_eq!(globals.fog_far, 200_000.0);
        assert_eq!(globals.freq, [4.0, 8.0, 8.0, 1.0]);
        let forward = glam::Vec3::from_slice(&globals.forward[..3]);
        assert!((forward.length() - 1.0).abs() < 1e-5);
        // Looking down the road
        assert!(forward.z < 0.0);
    }
}

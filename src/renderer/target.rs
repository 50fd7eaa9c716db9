//! GPU render target: one device and surface plus the pipeline for its scene

use super::galaxy_pipeline::GalaxyPipeline;
use super::gpu::GpuContext;
use super::road_pipeline::RoadPipeline;
use crate::config::SceneConfig;
use crate::engine::Frame;
use crate::error::EngineError;
use crate::sim::RoadScene;
use crate::surface::{RenderTarget, SurfaceRequest, SurfaceSize};

enum ScenePipeline {
    Galaxy(GalaxyPipeline),
    Road(Box<RoadPipeline>),
}

pub struct GpuTarget {
    ctx: GpuContext,
    pipeline: ScenePipeline,
}

impl GpuTarget {
    /// Open a device on `surface` and build the pipeline `config` needs.
    ///
    /// Anti-aliasing and bloom are only used for the road scene; the star
    /// field is shaded per pixel and gains nothing from either. Bloom also
    /// needs a surface format that can be sampled, and is skipped otherwise.
    pub async fn new(
        instance: &wgpu::Instance,
        surface: wgpu::Surface<'static>,
        request: &SurfaceRequest,
        config: &SceneConfig,
    ) -> Result<Self, EngineError> {
        let antialias = matches!(config, SceneConfig::Road(_));
        let ctx = GpuContext::new(instance, surface, request, antialias).await?;
        let pipeline = match config {
            SceneConfig::Galaxy(_) => ScenePipeline::Galaxy(GalaxyPipeline::new(&ctx)),
            SceneConfig::Road(road) => {
                // Same seed, same placement as the engine's own scene
                let scene = RoadScene::new(road.clone());
                let bloom = (road.bloom && ctx.sampleable).then_some(request.bloom_scale);
                if road.bloom && bloom.is_none() {
                    log::info!("{:?} can't be sampled, rendering without bloom", ctx.format());
                }
                ScenePipeline::Road(Box::new(RoadPipeline::new(&ctx, &scene, bloom)))
            }
        };
        Ok(Self { ctx, pipeline })
    }

    pub fn size(&self) -> SurfaceSize {
        self.ctx.size()
    }
}

impl RenderTarget for GpuTarget {
    fn resize(&mut self, size: SurfaceSize) {
        self.ctx.resize(size);
        if let ScenePipeline::Road(pipeline) = &mut self.pipeline {
            pipeline.resize(&self.ctx);
        }
    }

    fn draws_streaks(&self) -> bool {
        false
    }

    fn render(&mut self, frame: &Frame<'_>) -> Result<(), EngineError> {
        match (frame, &self.pipeline) {
            (Frame::Galaxy(params), ScenePipeline::Galaxy(pipeline)) => {
                pipeline.render(&self.ctx, params)
            }
            (Frame::Road { frame, .. }, ScenePipeline::Road(pipeline)) => {
                pipeline.render(&self.ctx, frame)
            }
            _ => Err(EngineError::Render("frame does not match scene pipeline".into())),
        }
    }

    fn release(&mut self) {
        log::debug!("Destroying GPU device");
        self.ctx.device.destroy();
    }
}

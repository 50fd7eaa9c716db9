//! Vertex and instance types for the road scene

use bytemuck::{Pod, Zeroable};

use crate::sim::LightStreak;

/// Road or island vertex, already in world space
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct RoadVertex {
    pub position: [f32; 3],
    pub color: [f32; 3],
}

impl RoadVertex {
    pub const fn new(x: f32, y: f32, z: f32, color: [f32; 3]) -> Self {
        Self {
            position: [x, y, z],
            color,
        }
    }

    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<RoadVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: std::mem::size_of::<[f32; 3]>() as wgpu::BufferAddress,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x3,
                },
            ],
        }
    }
}

/// Unit tube vertex: xy on the unit circle, z in [-1, 0]; `u` runs along the tube
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct TubeVertex {
    pub position: [f32; 3],
    pub uv: [f32; 2],
}

impl TubeVertex {
    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<TubeVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: std::mem::size_of::<[f32; 3]>() as wgpu::BufferAddress,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x2,
                },
            ],
        }
    }
}

/// Per-streak instance data; position along the road is computed in the shader
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct LightInstance {
    /// x, y, start position along the travel axis
    pub offset: [f32; 3],
    /// radius, length, speed
    pub metrics: [f32; 3],
    pub color: [f32; 3],
    /// Tail fade edges along the tube
    pub fade: [f32; 2],
}

impl LightInstance {
    pub fn new(streak: &LightStreak, car_lights_fade: f32) -> Self {
        Self {
            offset: [streak.x, streak.y, streak.start],
            metrics: [streak.radius, streak.length, streak.speed],
            color: streak.color,
            fade: streak.roadway.fade_edges(car_lights_fade).to_array(),
        }
    }

    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        const F3: wgpu::BufferAddress = std::mem::size_of::<[f32; 3]>() as wgpu::BufferAddress;
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<LightInstance>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 2,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: F3,
                    shader_location: 3,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: F3 * 2,
                    shader_location: 4,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: F3 * 3,
                    shader_location: 5,
                    format: wgpu::VertexFormat::Float32x2,
                },
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RoadConfig;
    use crate::sim::{RoadScene, Roadway};

    #[test]
    fn test_instance_stride() {
        assert_eq!(std::mem::size_of::<LightInstance>(), 44);
        let desc = LightInstance::desc();
        let last = desc.attributes.last().unwrap();
        assert_eq!(last.offset + 8, desc.array_stride);
    }

    #[test]
    fn test_instances_follow_streaks() {
        let scene = RoadScene::new(RoadConfig::default());
        for streak in scene.streaks() {
            let instance = LightInstance::new(streak, 0.4);
            assert_eq!(instance.offset[2], streak.start);
            assert_eq!(instance.metrics[2], streak.speed);
            let expected = match streak.roadway {
                Roadway::Left => [0.0, 1.0 - 0.4],
                Roadway::Right => [1.0, 0.4],
            };
            assert_eq!(instance.fade, expected);
        }
    }
}

//! Mesh generation for the road scene

use std::f32::consts::TAU;

use super::vertex::{RoadVertex, TubeVertex};
use crate::config::RoadConfig;
use crate::hex_to_rgb;

/// Road plane subdivisions across and along the travel axis
pub const PLANE_SEGMENTS_X: u32 = 20;
pub const PLANE_SEGMENTS_Z: u32 = 100;
/// Light tube subdivisions along and around the tube
pub const TUBE_SEGMENTS: u32 = 40;
pub const TUBE_RADIAL: u32 = 8;

/// Indexed triangle mesh
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mesh<V> {
    pub vertices: Vec<V>,
    pub indices: Vec<u16>,
}

impl<V> Mesh<V> {
    pub fn index_count(&self) -> u32 {
        self.indices.len() as u32
    }

    /// Append `other`, rebasing its indices
    pub fn extend(&mut self, other: Mesh<V>) {
        let base = self.vertices.len() as u16;
        self.vertices.extend(other.vertices);
        self.indices.extend(other.indices.into_iter().map(|i| i + base));
    }
}

/// Two triangles per grid cell of a `cols` x `rows` vertex grid
fn grid_indices(cols: u32, rows: u32, indices: &mut Vec<u16>) {
    for r in 0..rows - 1 {
        for c in 0..cols - 1 {
            let a = (r * cols + c) as u16;
            let b = a + 1;
            let d = a + cols as u16;
            let e = d + 1;
            indices.extend_from_slice(&[a, d, b, b, d, e]);
        }
    }
}

/// Flat plane on y = 0 centred on `center_x`, running from z = 0 to z = -length
pub fn road_plane(center_x: f32, width: f32, length: f32, color: [f32; 3]) -> Mesh<RoadVertex> {
    let cols = PLANE_SEGMENTS_X + 1;
    let rows = PLANE_SEGMENTS_Z + 1;
    let mut mesh = Mesh {
        vertices: Vec::with_capacity((cols * rows) as usize),
        indices: Vec::with_capacity((PLANE_SEGMENTS_X * PLANE_SEGMENTS_Z * 6) as usize),
    };

    for r in 0..rows {
        let z = -(r as f32 / PLANE_SEGMENTS_Z as f32) * length;
        for c in 0..cols {
            let x = center_x - width / 2.0 + (c as f32 / PLANE_SEGMENTS_X as f32) * width;
            mesh.vertices.push(RoadVertex::new(x, 0.0, z, color));
        }
    }
    grid_indices(cols, rows, &mut mesh.indices);
    mesh
}

/// Both roadways and the island between them
pub fn road_surface(config: &RoadConfig) -> Mesh<RoadVertex> {
    let road = hex_to_rgb(config.colors.road_color);
    let island = hex_to_rgb(config.colors.island_color);
    let side = config.road_width / 2.0 + config.island_width / 2.0;

    let mut mesh = road_plane(-side, config.road_width, config.length, road);
    mesh.extend(road_plane(side, config.road_width, config.length, road));
    mesh.extend(road_plane(0.0, config.island_width, config.length, island));
    mesh
}

/// Open unit tube from z = 0 (u = 0) to z = -1 (u = 1)
pub fn unit_tube() -> Mesh<TubeVertex> {
    let cols = TUBE_RADIAL + 1;
    let rows = TUBE_SEGMENTS + 1;
    let mut mesh = Mesh {
        vertices: Vec::with_capacity((cols * rows) as usize),
        indices: Vec::with_capacity((TUBE_RADIAL * TUBE_SEGMENTS * 6) as usize),
    };

    for r in 0..rows {
        let u = r as f32 / TUBE_SEGMENTS as f32;
        for c in 0..cols {
            let v = c as f32 / TUBE_RADIAL as f32;
            let (sin, cos) = (v * TAU).sin_cos();
            mesh.vertices.push(TubeVertex {
                position: [cos, sin, -u],
                uv: [u, v],
            });
        }
    }
    grid_indices(cols, rows, &mut mesh.indices);
    mesh
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plane_spans_road() {
        let mesh = road_plane(6.0, 10.0, 400.0, [1.0; 3]);
        assert_eq!(mesh.vertices.len(), 21 * 101);
        assert_eq!(mesh.index_count(), 20 * 100 * 6);
        let xs = mesh.vertices.iter().map(|v| v.position[0]);
        let zs = mesh.vertices.iter().map(|v| v.position[2]);
        assert_eq!(xs.clone().fold(f32::MAX, f32::min), 1.0);
        assert_eq!(xs.fold(f32::MIN, f32::max), 11.0);
        assert_eq!(zs.clone().fold(f32::MIN, f32::max), 0.0);
        assert_eq!(zs.fold(f32::MAX, f32::min), -400.0);
    }

    #[test]
    fn test_surface_indices_in_range() {
        let mesh = road_surface(&RoadConfig::default());
        assert_eq!(mesh.vertices.len(), 3 * 21 * 101);
        let max = *mesh.indices.iter().max().unwrap() as usize;
        assert_eq!(max, mesh.vertices.len() - 1);
    }

    #[test]
    fn test_island_colour_between_roads() {
        let config = RoadConfig::default();
        let mesh = road_surface(&config);
        let island = hex_to_rgb(config.colors.island_color);
        for v in mesh.vertices.iter().filter(|v| v.color == island) {
            assert!(v.position[0].abs() <= config.island_width / 2.0 + 1e-5);
        }
    }

    #[test]
    fn test_unit_tube() {
        let mesh = unit_tube();
        assert_eq!(mesh.vertices.len(), 41 * 9);
        for v in &mesh.vertices {
            let r = (v.position[0].powi(2) + v.position[1].powi(2)).sqrt();
            assert!((r - 1.0).abs() < 1e-5);
            assert!((-v.position[2] - v.uv[0]).abs() < 1e-6);
        }
    }
}

//! Software render target
//!
//! Evaluates the star field on the CPU with `sim::field::shade`, the same
//! maths the GPU shader runs, into an RGBA8 buffer. Road frames are drawn as
//! projected streak heads over the background. Used by the native preview
//! binary and by tests that need real pixels without a GPU.

use std::io::{self, Write};

use glam::Vec2;

use crate::consts::BACKGROUND;
use crate::engine::Frame;
use crate::error::EngineError;
use crate::sim::{RoadFrame, StreakSample, shade};
use crate::surface::{RenderTarget, SurfaceRequest, SurfaceSize};

pub struct CpuRaster {
    size: SurfaceSize,
    transparent: bool,
    pixels: Vec<u8>,
    frames: u64,
}

#[inline]
fn to_byte(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

impl CpuRaster {
    pub fn new(request: &SurfaceRequest) -> Self {
        let mut raster = Self {
            size: SurfaceSize::default(),
            transparent: request.transparent,
            pixels: Vec::new(),
            frames: 0,
        };
        raster.resize(request.size);
        raster
    }

    pub fn size(&self) -> SurfaceSize {
        self.size
    }

    /// RGBA8, rows top to bottom, straight alpha
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Pixel at column `x`, row `y` (row 0 is the top)
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.size.width || y >= self.size.height {
            return None;
        }
        let i = ((y * self.size.width + x) * 4) as usize;
        let mut px = [0; 4];
        px.copy_from_slice(&self.pixels[i..i + 4]);
        Some(px)
    }

    /// Mean of the RGB channels over every pixel, in [0, 1]
    pub fn mean_brightness(&self) -> f32 {
        if self.pixels.is_empty() {
            return 0.0;
        }
        let sum: u64 = self
            .pixels
            .chunks_exact(4)
            .map(|px| px[0] as u64 + px[1] as u64 + px[2] as u64)
            .sum();
        sum as f32 / (self.pixels.len() / 4 * 3 * 255) as f32
    }

    /// Binary PPM of the buffer composited over the page background
    pub fn write_ppm<W: Write>(&self, mut out: W) -> io::Result<()> {
        write!(out, "P6\n{} {}\n255\n", self.size.width, self.size.height)?;
        let bg = BACKGROUND.map(to_byte);
        let mut row = Vec::with_capacity(self.size.width as usize * 3);
        for line in self.pixels.chunks_exact(self.size.width as usize * 4) {
            row.clear();
            for px in line.chunks_exact(4) {
                let a = px[3] as u32;
                for c in 0..3 {
                    let v = (px[c] as u32 * a + bg[c] as u32 * (255 - a) + 127) / 255;
                    row.push(v as u8);
                }
            }
            out.write_all(&row)?;
        }
        Ok(())
    }

    fn put(&mut self, x: u32, y: u32, rgba: [f32; 4]) {
        let i = ((y * self.size.width + x) * 4) as usize;
        self.pixels[i..i + 4].copy_from_slice(&rgba.map(to_byte));
    }

    fn clear(&mut self) {
        let fill = if self.transparent {
            [0, 0, 0, 0]
        } else {
            [to_byte(BACKGROUND[0]), to_byte(BACKGROUND[1]), to_byte(BACKGROUND[2]), 255]
        };
        for px in self.pixels.chunks_exact_mut(4) {
            px.copy_from_slice(&fill);
        }
    }

    fn blend(&mut self, x: u32, y: u32, color: [f32; 3], alpha: f32) {
        let i = ((y * self.size.width + x) * 4) as usize;
        let dst = &mut self.pixels[i..i + 4];
        let a = alpha.clamp(0.0, 1.0);
        for c in 0..3 {
            let d = dst[c] as f32 / 255.0;
            dst[c] = to_byte(color[c] * a + d * (1.0 - a));
        }
        let da = dst[3] as f32 / 255.0;
        dst[3] = to_byte(a + da * (1.0 - a));
    }

    fn draw_road(&mut self, frame: &RoadFrame, streaks: &[StreakSample]) {
        self.clear();
        let (w, h) = (self.size.width as f32, self.size.height as f32);
        for sample in streaks {
            if sample.alpha <= 0.0 {
                continue;
            }
            let Some(ndc) = frame.camera.project(sample.head) else {
                continue;
            };
            if ndc.x.abs() > 1.0 || ndc.y.abs() > 1.0 {
                continue;
            }
            let x = (((ndc.x + 1.0) * 0.5 * w) as u32).min(self.size.width - 1);
            let y = (((1.0 - ndc.y) * 0.5 * h) as u32).min(self.size.height - 1);
            self.blend(x, y, sample.color, sample.alpha);
        }
    }
}

impl RenderTarget for CpuRaster {
    fn resize(&mut self, size: SurfaceSize) {
        self.size = SurfaceSize::new(size.width.max(1), size.height.max(1));
        self.pixels = vec![0; (self.size.width * self.size.height * 4) as usize];
    }

    fn render(&mut self, frame: &Frame<'_>) -> Result<(), EngineError> {
        match frame {
            Frame::Galaxy(params) => {
                let height = self.size.height;
                for y in 0..height {
                    for x in 0..self.size.width {
                        // Pixel centres, y up
                        let frag = Vec2::new(x as f32 + 0.5, (height - y) as f32 - 0.5);
                        let rgba = shade(frag, params);
                        self.put(x, y, rgba);
                    }
                }
            }
            Frame::Road { frame, streaks } => self.draw_road(frame, streaks),
        }
        self.frames += 1;
        Ok(())
    }

    fn release(&mut self) {
        log::debug!("Releasing CPU raster after {} frames", self.frames);
        self.pixels = Vec::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{GalaxyConfig, RoadConfig};
    use crate::sim::{ClockSample, FieldParams, RoadScene};

    fn request(width: u32, height: u32, transparent: bool) -> SurfaceRequest {
        SurfaceRequest {
            size: SurfaceSize::new(width, height),
            pixel_ratio: 1.0,
            transparent,
            antialias: false,
            bloom_scale: 1.0,
        }
    }

    fn galaxy(config: GalaxyConfig, width: u32, height: u32) -> FieldParams {
        FieldParams {
            resolution: Vec2::new(width as f32, height as f32),
            time: 3.0,
            travel: 0.15,
            layers: 3,
            config,
        }
    }

    #[test]
    fn test_matches_shade_at_pixel_centres() {
        let mut raster = CpuRaster::new(&request(16, 8, false));
        let config = GalaxyConfig {
            transparent: false,
            ..Default::default()
        };
        let params = galaxy(config, 16, 8);
        raster.render(&Frame::Galaxy(params)).unwrap();

        // Top-left pixel is the highest y in field space
        let expected = shade(Vec2::new(0.5, 7.5), &params).map(to_byte);
        assert_eq!(raster.pixel(0, 0), Some(expected));
        let expected = shade(Vec2::new(15.5, 0.5), &params).map(to_byte);
        assert_eq!(raster.pixel(15, 7), Some(expected));
        assert_eq!(raster.pixel(16, 0), None);
    }

    #[test]
    fn test_opaque_never_darker_than_background() {
        let mut raster = CpuRaster::new(&request(24, 16, false));
        let config = GalaxyConfig {
            transparent: false,
            ..Default::default()
        };
        raster.render(&Frame::Galaxy(galaxy(config, 24, 16))).unwrap();
        let bg = BACKGROUND.map(to_byte);
        for px in raster.pixels().chunks_exact(4) {
            assert_eq!(px[3], 255);
            assert!(px[0] >= bg[0] && px[1] >= bg[1] && px[2] >= bg[2]);
        }
    }

    #[test]
    fn test_ppm_header_and_length() {
        let mut raster = CpuRaster::new(&request(5, 3, true));
        raster
            .render(&Frame::Galaxy(galaxy(GalaxyConfig::default(), 5, 3)))
            .unwrap();
        let mut out = Vec::new();
        raster.write_ppm(&mut out).unwrap();
        let header = b"P6\n5 3\n255\n";
        assert_eq!(&out[..header.len()], header);
        assert_eq!(out.len(), header.len() + 5 * 3 * 3);
    }

    #[test]
    fn test_road_frame_plots_streaks() {
        let mut raster = CpuRaster::new(&request(160, 90, true));
        let mut scene = RoadScene::new(RoadConfig::default());
        let sample = ClockSample {
            elapsed: 2.0,
            delta: 0.016,
            ..Default::default()
        };
        let frame = scene.update(&sample, 16.0 / 9.0);
        let streaks = scene.sample_streaks(frame.time).to_vec();
        raster
            .render(&Frame::Road {
                frame,
                streaks: &streaks,
            })
            .unwrap();
        let lit = raster.pixels().chunks_exact(4).filter(|px| px[3] > 0).count();
        assert!(lit > 0);
        assert!(raster.mean_brightness() > 0.0);
    }

    #[test]
    fn test_release_frees_buffer() {
        let mut raster = CpuRaster::new(&request(8, 8, true));
        raster.release();
        assert!(raster.pixels().is_empty());
        assert_eq!(raster.mean_brightness(), 0.0);
    }
}

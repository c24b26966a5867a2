//! Synthetic road camera (`stub://`).
//!
//! Produces an asphalt-grey frame with lane markings that scroll a little every
//! capture. Every 50th capture a dark elliptical patch is painted into the
//! lower half, standing in for a pothole.

use anyhow::Result;

use super::SourceConfig;
use crate::frame::{Frame, FrameSource};

const POTHOLE_EVERY: u64 = 50;

pub struct SyntheticCamera {
    config: SourceConfig,
    frame_count: u64,
}

impl SyntheticCamera {
    pub fn new(config: SourceConfig) -> Self {
        log::info!("SyntheticCamera: connected to {} (synthetic)", config.url);
        Self {
            config,
            frame_count: 0,
        }
    }

    pub fn frames_captured(&self) -> u64 {
        self.frame_count
    }

    /// True when the most recent capture contained the painted pothole.
    pub fn last_had_pothole(&self) -> bool {
        self.frame_count > 0 && self.frame_count % POTHOLE_EVERY == 0
    }

    fn generate_pixels(&self) -> Vec<u8> {
        let width = self.config.width.max(1) as usize;
        let height = self.config.height.max(1) as usize;
        let scroll = (self.frame_count % 40) as usize;
        let with_pothole = self.last_had_pothole();
        let (cx, cy) = (width as f32 / 2.0, height as f32 * 0.75);
        let (rx, ry) = (width as f32 / 8.0, height as f32 / 16.0);

        let mut pixels = Vec::with_capacity(width * height * 4);
        for y in 0..height {
            for x in 0..width {
                let lane = x.abs_diff(width / 2) < width / 80 + 1 && (y + scroll) % 40 < 20;
                let mut shade = if lane {
                    230
                } else {
                    96 + ((x * 7 + y * 13 + self.frame_count as usize) % 9) as u8
                };
                if with_pothole {
                    let dx = (x as f32 - cx) / rx;
                    let dy = (y as f32 - cy) / ry;
                    if dx * dx + dy * dy <= 1.0 {
                        shade = 28;
                    }
                }
                pixels.extend_from_slice(&[shade, shade, shade, u8::MAX]);
            }
        }
        pixels
    }
}

impl FrameSource for SyntheticCamera {
    fn name(&self) -> &str {
        &self.config.url
    }

    fn current_frame(&mut self) -> Result<Frame> {
        self.frame_count += 1;
        let pixels = self.generate_pixels();
        Frame::from_rgba(pixels, self.config.width.max(1), self.config.height.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stub_config() -> SourceConfig {
        SourceConfig {
            url: "stub://test".to_string(),
            target_fps: 10,
            width: 160,
            height: 120,
        }
    }

    #[test]
    fn synthetic_camera_produces_configured_size() -> Result<()> {
        let mut camera = SyntheticCamera::new(stub_config());
        let frame = camera.current_frame()?;
        assert_eq!(frame.width, 160);
        assert_eq!(frame.height, 120);
        assert_eq!(frame.pixels().len(), 160 * 120 * 4);
        assert_eq!(camera.frames_captured(), 1);
        Ok(())
    }

    #[test]
    fn pothole_patch_appears_periodically() -> Result<()> {
        let mut camera = SyntheticCamera::new(stub_config());
        let mut frame = camera.current_frame()?;
        assert!(!camera.last_had_pothole());
        for _ in 1..POTHOLE_EVERY {
            frame = camera.current_frame()?;
        }
        assert!(camera.last_had_pothole());
        assert_eq!(frame.pixel(80, 90), Some([28, 28, 28, 255]));
        Ok(())
    }
}

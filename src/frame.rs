//! Camera frames and the live frame source boundary.
//!
//! - `Frame`: RGBA8 pixel buffer, row-major, top-left origin.
//! - `FrameSource`: anything that can hand over the live camera image on demand.
//!
//! Frames are owned by the capture side and handed to the detector by value for
//! a single tick. They are never written to disk or logged.

use anyhow::{anyhow, Result};

/// Bytes per pixel (red, green, blue, alpha).
pub const RGBA_CHANNELS: usize = 4;

/// A single captured frame.
///
/// The pixel buffer always holds exactly `width * height * 4` bytes.
#[derive(Clone)]
pub struct Frame {
    data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl Frame {
    /// Wrap an RGBA8 buffer. Fails when the length does not match the dimensions.
    pub fn from_rgba(data: Vec<u8>, width: u32, height: u32) -> Result<Self> {
        let expected = rgba_len(width, height)?;
        if data.len() != expected {
            return Err(anyhow!(
                "RGBA frame length mismatch: expected {}, got {}",
                expected,
                data.len()
            ));
        }
        Ok(Self {
            data,
            width,
            height,
        })
    }

    /// Expand a packed RGB24 buffer into RGBA8 with an opaque alpha channel.
    pub fn from_rgb(rgb: &[u8], width: u32, height: u32) -> Result<Self> {
        let pixels = (width as usize)
            .checked_mul(height as usize)
            .ok_or_else(|| anyhow!("frame dimensions overflow"))?;
        if rgb.len() != pixels * 3 {
            return Err(anyhow!(
                "RGB frame length mismatch: expected {}, got {}",
                pixels * 3,
                rgb.len()
            ));
        }
        let mut data = Vec::with_capacity(pixels * RGBA_CHANNELS);
        for px in rgb.chunks_exact(3) {
            data.extend_from_slice(&[px[0], px[1], px[2], u8::MAX]);
        }
        Self::from_rgba(data, width, height)
    }

    /// Solid-colour frame, mostly useful for tests and the synthetic camera.
    pub fn filled(width: u32, height: u32, rgba: [u8; 4]) -> Result<Self> {
        let len = rgba_len(width, height)?;
        let data = rgba.iter().copied().cycle().take(len).collect();
        Self::from_rgba(data, width, height)
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Read-only view of the RGBA bytes.
    pub fn pixels(&self) -> &[u8] {
        &self.data
    }

    pub fn into_pixels(self) -> Vec<u8> {
        self.data
    }

    /// RGBA value at column `x`, row `y`.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = ((y as usize) * (self.width as usize) + x as usize) * RGBA_CHANNELS;
        let px = self.data.get(offset..offset + RGBA_CHANNELS)?;
        Some([px[0], px[1], px[2], px[3]])
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Pixel content stays out of logs.
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish_non_exhaustive()
    }
}

fn rgba_len(width: u32, height: u32) -> Result<usize> {
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|v| v.checked_mul(RGBA_CHANNELS))
        .ok_or_else(|| anyhow!("frame dimensions overflow"))
}

/// Live video feed boundary.
///
/// `current_frame` must reflect the camera image at call time, at whatever
/// resolution the device grants. Permission handling and device selection
/// happen before a source is constructed.
pub trait FrameSource: Send {
    /// Source identifier used in logs.
    fn name(&self) -> &str;

    /// Capture the current frame.
    fn current_frame(&mut self) -> Result<Frame>;

    /// Returns false once the source has stopped producing frames.
    fn is_healthy(&self) -> bool {
        true
    }
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn current_frame(&mut self) -> Result<Frame> {
        (**self).current_frame()
    }

    fn is_healthy(&self) -> bool {
        (**self).is_healthy()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rgba_length_is_validated() {
        assert!(Frame::from_rgba(vec![0u8; 16], 2, 2).is_ok());
        assert!(Frame::from_rgba(vec![0u8; 15], 2, 2).is_err());
    }

    #[test]
    fn rgb_expands_with_opaque_alpha() -> Result<()> {
        let frame = Frame::from_rgb(&[10, 20, 30, 40, 50, 60], 2, 1)?;
        assert_eq!(frame.pixels(), &[10, 20, 30, 255, 40, 50, 60, 255]);
        assert_eq!(frame.pixel(1, 0), Some([40, 50, 60, 255]));
        assert_eq!(frame.pixel(2, 0), None);
        Ok(())
    }

    #[test]
    fn debug_output_omits_pixels() -> Result<()> {
        let frame = Frame::filled(3, 2, [1, 2, 3, 4])?;
        let rendered = format!("{:?}", frame);
        assert!(rendered.contains("width: 3"));
        assert!(!rendered.contains("data"));
        Ok(())
    }
}

//! Frame → model input tensor.
//!
//! The model consumes a fixed `[1, 3, 640, 640]` tensor: RGB only, each sample
//! scaled to `[0, 1]`, laid out channel-planar (`c * 640 * 640 + h * 640 + w`).

use anyhow::{anyhow, Result};
use image::imageops::{self, FilterType};
use image::{ImageBuffer, Rgba};
use serde::Deserialize;

use crate::frame::Frame;
use crate::tensor::Tensor;

/// Model input edge length in pixels.
pub const MODEL_INPUT_SIZE: u32 = 640;

/// Model input channel count (RGB).
pub const MODEL_INPUT_CHANNELS: usize = 3;

/// Full model input shape (batch, channel, height, width).
pub const MODEL_INPUT_SHAPE: [usize; 4] = [
    1,
    MODEL_INPUT_CHANNELS,
    MODEL_INPUT_SIZE as usize,
    MODEL_INPUT_SIZE as usize,
];

/// Number of elements in one model input tensor.
pub const MODEL_INPUT_LEN: usize =
    MODEL_INPUT_CHANNELS * MODEL_INPUT_SIZE as usize * MODEL_INPUT_SIZE as usize;

/// Resampling filter used when the frame is not already 640x640.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResizeFilter {
    #[default]
    Nearest,
    Triangle,
    CatmullRom,
    Lanczos3,
}

impl ResizeFilter {
    pub fn parse(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "nearest" => Ok(Self::Nearest),
            "triangle" => Ok(Self::Triangle),
            "catmull_rom" => Ok(Self::CatmullRom),
            "lanczos3" => Ok(Self::Lanczos3),
            other => Err(anyhow!(
                "unknown resize filter '{}'; expected nearest, triangle, catmull_rom or lanczos3",
                other
            )),
        }
    }

    fn filter_type(self) -> FilterType {
        match self {
            Self::Nearest => FilterType::Nearest,
            Self::Triangle => FilterType::Triangle,
            Self::CatmullRom => FilterType::CatmullRom,
            Self::Lanczos3 => FilterType::Lanczos3,
        }
    }
}

/// Converts captured frames into model input tensors.
#[derive(Clone, Copy, Debug, Default)]
pub struct Preprocessor {
    filter: ResizeFilter,
}

impl Preprocessor {
    pub fn new(filter: ResizeFilter) -> Self {
        Self { filter }
    }

    pub fn filter(&self) -> ResizeFilter {
        self.filter
    }

    /// Resize, drop alpha, normalize and transpose HWC → CHW.
    ///
    /// A zero-sized frame is a caller bug and fails fast.
    pub fn preprocess(&self, frame: &Frame) -> Result<Tensor> {
        if frame.is_empty() {
            return Err(anyhow!(
                "cannot preprocess empty frame ({}x{})",
                frame.width,
                frame.height
            ));
        }

        let source: ImageBuffer<Rgba<u8>, &[u8]> =
            ImageBuffer::from_raw(frame.width, frame.height, frame.pixels())
                .ok_or_else(|| anyhow!("frame buffer smaller than its dimensions"))?;

        let plane = (MODEL_INPUT_SIZE * MODEL_INPUT_SIZE) as usize;
        let mut data = vec![0.0f32; MODEL_INPUT_LEN];

        if frame.width == MODEL_INPUT_SIZE && frame.height == MODEL_INPUT_SIZE {
            write_planar(source.pixels(), plane, &mut data);
        } else {
            let resized = imageops::resize(
                &source,
                MODEL_INPUT_SIZE,
                MODEL_INPUT_SIZE,
                self.filter.filter_type(),
            );
            write_planar(resized.pixels(), plane, &mut data);
        }

        Tensor::new(MODEL_INPUT_SHAPE.to_vec(), data)
    }
}

/// Free-function form using the default nearest-neighbour filter.
pub fn preprocess(frame: &Frame) -> Result<Tensor> {
    Preprocessor::default().preprocess(frame)
}

fn write_planar<'a>(pixels: impl Iterator<Item = &'a Rgba<u8>>, plane: usize, out: &mut [f32]) {
    for (i, px) in pixels.enumerate().take(plane) {
        let [r, g, b, _alpha] = px.0;
        out[i] = r as f32 / 255.0;
        out[plane + i] = g as f32 / 255.0;
        out[2 * plane + i] = b as f32 / 255.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PLANE: usize = (MODEL_INPUT_SIZE * MODEL_INPUT_SIZE) as usize;

    #[test]
    fn all_red_frame_fills_only_the_red_plane() -> Result<()> {
        let frame = Frame::filled(640, 640, [255, 0, 0, 255])?;
        let tensor = preprocess(&frame)?;

        assert_eq!(tensor.shape(), &[1, 3, 640, 640]);
        assert_eq!(tensor.len(), MODEL_INPUT_LEN);
        let data = tensor.data();
        assert!(data[..PLANE].iter().all(|v| *v == 1.0));
        assert!(data[PLANE..].iter().all(|v| *v == 0.0));
        Ok(())
    }

    #[test]
    fn arbitrary_sizes_produce_fixed_shape_in_unit_range() -> Result<()> {
        for (w, h) in [(1, 1), (3, 7), (1280, 720), (640, 480)] {
            let pixels: Vec<u8> = (0..(w * h * 4) as usize).map(|i| (i * 37 % 256) as u8).collect();
            let frame = Frame::from_rgba(pixels, w, h)?;
            for filter in [ResizeFilter::Nearest, ResizeFilter::Triangle] {
                let tensor = Preprocessor::new(filter).preprocess(&frame)?;
                assert_eq!(tensor.shape(), &MODEL_INPUT_SHAPE);
                assert_eq!(tensor.len(), 3 * 640 * 640);
                assert!(tensor.data().iter().all(|v| (0.0..=1.0).contains(v)));
            }
        }
        Ok(())
    }

    #[test]
    fn layout_is_channel_planar() -> Result<()> {
        // Left half green, right half blue; alpha is ignored.
        let mut pixels = Vec::with_capacity(640 * 640 * 4);
        for _row in 0..640 {
            for col in 0..640 {
                if col < 320 {
                    pixels.extend_from_slice(&[0, 255, 0, 7]);
                } else {
                    pixels.extend_from_slice(&[0, 0, 255, 200]);
                }
            }
        }
        let tensor = preprocess(&Frame::from_rgba(pixels, 640, 640)?)?;
        let data = tensor.data();

        let at = |c: usize, h: usize, w: usize| data[c * PLANE + h * 640 + w];
        assert_eq!(at(0, 10, 10), 0.0);
        assert_eq!(at(1, 10, 10), 1.0);
        assert_eq!(at(2, 10, 10), 0.0);
        assert_eq!(at(1, 639, 400), 0.0);
        assert_eq!(at(2, 639, 400), 1.0);
        Ok(())
    }

    #[test]
    fn single_pixel_is_upscaled_uniformly() -> Result<()> {
        let frame = Frame::filled(1, 1, [51, 102, 255, 0])?;
        let tensor = preprocess(&frame)?;
        let data = tensor.data();
        assert!(data[..PLANE].iter().all(|v| (*v - 0.2).abs() < 1e-6));
        assert!(data[PLANE..2 * PLANE].iter().all(|v| (*v - 0.4).abs() < 1e-6));
        assert!(data[2 * PLANE..].iter().all(|v| *v == 1.0));
        Ok(())
    }

    #[test]
    fn empty_frame_fails_fast() -> Result<()> {
        let frame = Frame::from_rgba(Vec::new(), 0, 480)?;
        assert!(preprocess(&frame).is_err());
        Ok(())
    }

    #[test]
    fn filter_names_parse() {
        assert_eq!(ResizeFilter::parse("Triangle").ok(), Some(ResizeFilter::Triangle));
        assert!(ResizeFilter::parse("bicubic").is_err());
    }
}

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::frame::{Frame, FrameSource};

/// A fixed image file served as the "live" frame.
///
/// Decoded once on open; every capture returns the same frame.
pub struct StillImageSource {
    path: PathBuf,
    name: String,
    frame: Frame,
}

impl StillImageSource {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let frame = load_frame(&path)?;
        log::info!(
            "StillImageSource: loaded {} ({}x{})",
            path.display(),
            frame.width,
            frame.height
        );
        Ok(Self {
            name: path.display().to_string(),
            path,
            frame,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl FrameSource for StillImageSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn current_frame(&mut self) -> Result<Frame> {
        Ok(self.frame.clone())
    }
}

/// Decode an image file into an RGBA frame.
pub fn load_frame(path: &Path) -> Result<Frame> {
    let image = image::open(path)
        .with_context(|| format!("failed to decode image {}", path.display()))?
        .into_rgba8();
    let (width, height) = image.dimensions();
    Frame::from_rgba(image.into_raw(), width, height)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn still_image_round_trips_pixels() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("road.png");
        let image = image::RgbaImage::from_pixel(4, 3, image::Rgba([12, 34, 56, 255]));
        image.save(&path)?;

        let mut source = StillImageSource::open(&path)?;
        let frame = source.current_frame()?;
        assert_eq!((frame.width, frame.height), (4, 3));
        assert_eq!(frame.pixel(3, 2), Some([12, 34, 56, 255]));
        Ok(())
    }

    #[test]
    fn missing_file_is_an_open_error() {
        assert!(StillImageSource::open("/nonexistent/road.png").is_err());
    }
}

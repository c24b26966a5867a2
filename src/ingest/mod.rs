//! Live frame sources.
//!
//! This module provides the camera side of the detector:
//! - Synthetic road camera (`stub://...`, testing and demos)
//! - Still image file (any local path the `image` crate can decode)
//! - HTTP JPEG snapshot / MJPEG cameras (feature: ingest-http)
//! - USB/V4L2 devices (feature: ingest-v4l2)
//!
//! Every source implements [`FrameSource`](crate::frame::FrameSource) and hands
//! out RGBA frames at the device's native resolution. Sources MUST NOT store
//! frames to disk or log pixel content.

#[cfg(feature = "ingest-http")]
pub mod http;
#[cfg(feature = "ingest-v4l2")]
mod normalize;
pub mod still;
pub mod synthetic;
#[cfg(feature = "ingest-v4l2")]
pub mod v4l2;

use anyhow::{anyhow, Result};

use crate::frame::FrameSource;

#[cfg(feature = "ingest-http")]
pub use http::HttpCamera;
pub use still::StillImageSource;
pub use synthetic::SyntheticCamera;
#[cfg(feature = "ingest-v4l2")]
pub use v4l2::V4l2Camera;

/// Camera selection and preferred capture parameters.
///
/// `width`/`height`/`target_fps` are preferences; devices may grant something
/// else, and frames always carry their real dimensions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceConfig {
    pub url: String,
    pub target_fps: u32,
    pub width: u32,
    pub height: u32,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            url: "stub://rear_camera".to_string(),
            target_fps: 10,
            width: 640,
            height: 480,
        }
    }
}

/// Source kind selected from the configured URL.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceKind {
    Synthetic,
    Http,
    V4l2,
    StillImage,
}

impl SourceKind {
    pub fn for_url(url: &str) -> Result<Self> {
        let url = url.trim();
        if url.is_empty() {
            return Err(anyhow!("source url must not be empty"));
        }
        if url.starts_with("stub://") {
            return Ok(Self::Synthetic);
        }
        if url.starts_with("http://") || url.starts_with("https://") {
            return Ok(Self::Http);
        }
        if url.starts_with("v4l2://") || url.starts_with("/dev/video") {
            return Ok(Self::V4l2);
        }
        if url.contains("://") {
            return Err(anyhow!("unsupported source scheme in '{}'", url));
        }
        Ok(Self::StillImage)
    }
}

/// Open and connect the configured camera.
///
/// Failures here are device/permission errors: fatal for detection, but the
/// caller decides whether the process keeps running.
pub fn open_source(config: &SourceConfig) -> Result<Box<dyn FrameSource>> {
    match SourceKind::for_url(&config.url)? {
        SourceKind::Synthetic => Ok(Box::new(SyntheticCamera::new(config.clone()))),
        SourceKind::StillImage => Ok(Box::new(StillImageSource::open(&config.url)?)),
        SourceKind::Http => {
            #[cfg(feature = "ingest-http")]
            {
                let mut camera = HttpCamera::new(config.clone())?;
                camera.connect()?;
                Ok(Box::new(camera))
            }
            #[cfg(not(feature = "ingest-http"))]
            {
                Err(anyhow!("http cameras require the ingest-http feature"))
            }
        }
        SourceKind::V4l2 => {
            #[cfg(feature = "ingest-v4l2")]
            {
                let mut camera = V4l2Camera::new(config.clone())?;
                camera.connect()?;
                Ok(Box::new(camera))
            }
            #[cfg(not(feature = "ingest-v4l2"))]
            {
                Err(anyhow!("v4l2 cameras require the ingest-v4l2 feature"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_select_source_kind() {
        assert_eq!(SourceKind::for_url("stub://rear").unwrap(), SourceKind::Synthetic);
        assert_eq!(SourceKind::for_url("http://10.0.0.2:81/stream").unwrap(), SourceKind::Http);
        assert_eq!(SourceKind::for_url("/dev/video0").unwrap(), SourceKind::V4l2);
        assert_eq!(SourceKind::for_url("road.png").unwrap(), SourceKind::StillImage);
        assert!(SourceKind::for_url("rtsp://cam").is_err());
        assert!(SourceKind::for_url("  ").is_err());
    }

    #[test]
    fn stub_source_opens() -> Result<()> {
        let mut source = open_source(&SourceConfig::default())?;
        let frame = source.current_frame()?;
        assert_eq!((frame.width, frame.height), (640, 480));
        Ok(())
    }
}

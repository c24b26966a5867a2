//! V4L2 camera source.
//!
//! Opens a local capture device (e.g. `/dev/video0` or `v4l2:///dev/video0`),
//! asks for RGB24 at the preferred size and falls back to whatever format the
//! driver grants, as long as it is RGB24, NV12 or YUYV.

use anyhow::{Context, Result};
use ouroboros::self_referencing;
use std::time::{Duration, Instant};

use super::normalize::{normalize_to_frame, PixelFormat};
use super::SourceConfig;
use crate::frame::{Frame, FrameSource};

/// V4L2 capture device.
pub struct V4l2Camera {
    config: SourceConfig,
    device_path: String,
    state: Option<DeviceState>,
    format: PixelFormat,
    frame_count: u64,
    last_frame_at: Option<Instant>,
    last_error: Option<String>,
    active_width: u32,
    active_height: u32,
}

#[self_referencing]
struct DeviceState {
    device: v4l::Device,
    #[borrows(mut device)]
    #[covariant]
    stream: v4l::prelude::MmapStream<'this, v4l::Device>,
}

impl V4l2Camera {
    pub fn new(config: SourceConfig) -> Result<Self> {
        let device_path = config
            .url
            .strip_prefix("v4l2://")
            .unwrap_or(&config.url)
            .to_string();
        Ok(Self {
            active_width: config.width,
            active_height: config.height,
            device_path,
            config,
            state: None,
            format: PixelFormat::Rgb24,
            frame_count: 0,
            last_frame_at: None,
            last_error: None,
        })
    }

    /// Open the device and start streaming.
    pub fn connect(&mut self) -> Result<()> {
        use v4l::buffer::Type;
        use v4l::video::Capture;

        let mut device = v4l::Device::with_path(&self.device_path)
            .with_context(|| format!("open v4l2 device {}", self.device_path))?;
        let mut format = device.format().context("read v4l2 format")?;
        format.width = self.config.width;
        format.height = self.config.height;
        format.fourcc = v4l::FourCC::new(b"RGB3");

        let format = match device.set_format(&format) {
            Ok(format) => format,
            Err(err) => {
                log::warn!(
                    "V4l2Camera: failed to set format on {}: {}",
                    self.device_path,
                    err
                );
                device
                    .format()
                    .context("read v4l2 format after set failure")?
            }
        };
        self.format = PixelFormat::from_fourcc(&format.fourcc.repr)?;

        if self.config.target_fps > 0 {
            let params = v4l::video::capture::Parameters::with_fps(self.config.target_fps);
            if let Err(err) = device.set_params(&params) {
                log::warn!(
                    "V4l2Camera: failed to set fps on {}: {}",
                    self.device_path,
                    err
                );
            }
        }

        self.active_width = format.width;
        self.active_height = format.height;
        self.last_error = None;

        let state = DeviceStateBuilder {
            device,
            stream_builder: |device| {
                v4l::prelude::MmapStream::with_buffers(device, Type::VideoCapture, 4)
                    .map_err(|err| anyhow::Error::new(err).context("create v4l2 buffer stream"))
            },
        }
        .try_build()
        .map_err(|err| {
            self.last_error = Some(err.to_string());
            err
        })?;
        self.state = Some(state);

        log::info!(
            "V4l2Camera: connected to {} ({}x{}, {:?})",
            self.device_path,
            self.active_width,
            self.active_height,
            self.format
        );
        Ok(())
    }

    fn health_grace(&self) -> Duration {
        let base_ms = if self.config.target_fps == 0 {
            2_000
        } else {
            (1000 / self.config.target_fps).saturating_mul(6)
        };
        Duration::from_millis(base_ms.max(2_000) as u64)
    }
}

impl FrameSource for V4l2Camera {
    fn name(&self) -> &str {
        &self.device_path
    }

    fn current_frame(&mut self) -> Result<Frame> {
        use v4l::io::traits::CaptureStream;

        let state = self.state.as_mut().context("v4l2 device not connected")?;
        let buf = state
            .with_mut(|fields| fields.stream.next().map(|(buf, _meta)| buf.to_vec()))
            .map_err(|err| {
                self.last_error = Some(err.to_string());
                anyhow::Error::new(err).context("capture v4l2 frame")
            })?;

        let frame = normalize_to_frame(&buf, self.active_width, self.active_height, self.format)?;
        self.frame_count += 1;
        self.last_frame_at = Some(Instant::now());
        Ok(frame)
    }

    fn is_healthy(&self) -> bool {
        if self.last_error.is_some() {
            return false;
        }
        let Some(last_frame_at) = self.last_frame_at else {
            return self.state.is_some();
        };
        last_frame_at.elapsed() <= self.health_grace()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_path_strips_scheme() -> Result<()> {
        let camera = V4l2Camera::new(SourceConfig {
            url: "v4l2:///dev/video2".to_string(),
            ..SourceConfig::default()
        })?;
        assert_eq!(camera.name(), "/dev/video2");
        assert!(!camera.is_healthy());
        Ok(())
    }
}

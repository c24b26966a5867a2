//! HTTP camera source.
//!
//! Supports phone/ESP32-style cameras that expose either a single JPEG
//! snapshot per request or a `multipart/x-mixed-replace` MJPEG stream.
//!
//! For MJPEG a reader thread keeps only the most recent complete JPEG, so
//! `current_frame` always decodes the live image instead of a queued one.

use anyhow::{anyhow, Context, Result};
use std::io::Read;
use std::sync::{Arc, Mutex, Weak};
use std::time::{Duration, Instant};

use url::Url;

use super::SourceConfig;
use crate::frame::{Frame, FrameSource};

const MAX_JPEG_BYTES: usize = 5 * 1024 * 1024;

/// HTTP JPEG/MJPEG camera.
pub struct HttpCamera {
    config: SourceConfig,
    mode: Option<HttpMode>,
    frame_count: u64,
    last_frame_at: Option<Instant>,
    last_error: Option<String>,
}

enum HttpMode {
    Snapshot,
    Mjpeg(Arc<LatestJpeg>),
}

#[derive(Default)]
struct LatestJpeg {
    jpeg: Mutex<Option<Vec<u8>>>,
    ended: Mutex<Option<String>>,
}

impl HttpCamera {
    pub fn new(config: SourceConfig) -> Result<Self> {
        let url = Url::parse(&config.url).context("parse camera url")?;
        match url.scheme() {
            "http" | "https" => {}
            other => {
                return Err(anyhow!(
                    "unsupported camera scheme '{}'; expected http(s)",
                    other
                ))
            }
        }
        Ok(Self {
            config,
            mode: None,
            frame_count: 0,
            last_frame_at: None,
            last_error: None,
        })
    }

    /// Probe the endpoint and pick snapshot or MJPEG mode.
    pub fn connect(&mut self) -> Result<()> {
        let response = ureq::get(&self.config.url)
            .call()
            .context("connect to http camera")?;
        let content_type = response.header("Content-Type").unwrap_or("");
        if content_type.to_lowercase().contains("multipart") {
            let latest = Arc::new(LatestJpeg::default());
            let reader = response.into_reader();
            let sink = Arc::downgrade(&latest);
            std::thread::Builder::new()
                .name("mjpeg-reader".to_string())
                .spawn(move || read_mjpeg(reader, sink))
                .context("spawn mjpeg reader thread")?;
            self.mode = Some(HttpMode::Mjpeg(latest));
            log::info!("HttpCamera: connected to {} (mjpeg)", self.config.url);
        } else {
            self.mode = Some(HttpMode::Snapshot);
            log::info!("HttpCamera: connected to {} (snapshot)", self.config.url);
        }
        Ok(())
    }

    fn latest_jpeg(&self) -> Result<Vec<u8>> {
        let mode = self
            .mode
            .as_ref()
            .ok_or_else(|| anyhow!("http camera not connected; call connect() first"))?;
        match mode {
            HttpMode::Snapshot => fetch_single_jpeg(&self.config.url),
            HttpMode::Mjpeg(latest) => {
                if let Some(reason) = latest
                    .ended
                    .lock()
                    .map_err(|_| anyhow!("mjpeg state lock poisoned"))?
                    .clone()
                {
                    return Err(anyhow!("mjpeg stream ended: {}", reason));
                }
                latest
                    .jpeg
                    .lock()
                    .map_err(|_| anyhow!("mjpeg state lock poisoned"))?
                    .clone()
                    .ok_or_else(|| anyhow!("no mjpeg frame received yet"))
            }
        }
    }
}

impl FrameSource for HttpCamera {
    fn name(&self) -> &str {
        &self.config.url
    }

    fn current_frame(&mut self) -> Result<Frame> {
        let frame = self.latest_jpeg().and_then(|jpeg| decode_jpeg(&jpeg));
        match frame {
            Ok(frame) => {
                self.frame_count += 1;
                self.last_frame_at = Some(Instant::now());
                self.last_error = None;
                Ok(frame)
            }
            Err(err) => {
                self.last_error = Some(err.to_string());
                Err(err)
            }
        }
    }

    fn is_healthy(&self) -> bool {
        if self.last_error.is_some() {
            return false;
        }
        match self.last_frame_at {
            Some(at) => at.elapsed() <= health_grace(self.config.target_fps),
            None => self.mode.is_some(),
        }
    }
}

/// Runs until the stream fails or the owning camera is dropped.
fn read_mjpeg(reader: Box<dyn Read + Send + Sync>, latest: Weak<LatestJpeg>) {
    let mut stream = MjpegStream::new(reader);
    loop {
        let next = stream.read_next_jpeg();
        let Some(latest) = latest.upgrade() else {
            log::debug!("HttpCamera: camera dropped, mjpeg reader exiting");
            return;
        };
        match next {
            Ok(jpeg) => {
                if let Ok(mut slot) = latest.jpeg.lock() {
                    *slot = Some(jpeg);
                }
            }
            Err(err) => {
                log::warn!("HttpCamera: mjpeg reader stopped: {:#}", err);
                if let Ok(mut ended) = latest.ended.lock() {
                    *ended = Some(err.to_string());
                }
                return;
            }
        }
    }
}

struct MjpegStream {
    reader: Box<dyn Read + Send + Sync>,
    buffer: Vec<u8>,
}

impl MjpegStream {
    fn new(reader: Box<dyn Read + Send + Sync>) -> Self {
        Self {
            reader,
            buffer: Vec::with_capacity(64 * 1024),
        }
    }

    fn read_next_jpeg(&mut self) -> Result<Vec<u8>> {
        let mut chunk = vec![0u8; 8192];
        loop {
            if let Some((start, end)) = find_jpeg_bounds(&self.buffer) {
                let frame = self.buffer[start..end].to_vec();
                self.buffer.drain(..end);
                return Ok(frame);
            }

            let read = self.reader.read(&mut chunk).context("read mjpeg chunk")?;
            if read == 0 {
                return Err(anyhow!("mjpeg stream ended"));
            }
            self.buffer.extend_from_slice(&chunk[..read]);

            if self.buffer.len() > MAX_JPEG_BYTES * 2 {
                let keep = 2.min(self.buffer.len());
                let drain_len = self.buffer.len() - keep;
                self.buffer.drain(..drain_len);
            }
        }
    }
}

fn fetch_single_jpeg(url: &str) -> Result<Vec<u8>> {
    let response = ureq::get(url)
        .call()
        .with_context(|| format!("fetch jpeg snapshot from {}", url))?;
    let mut bytes = Vec::new();
    response
        .into_reader()
        .take(MAX_JPEG_BYTES as u64)
        .read_to_end(&mut bytes)
        .context("read jpeg snapshot")?;
    if bytes.is_empty() {
        return Err(anyhow!("empty jpeg snapshot"));
    }
    Ok(bytes)
}

fn decode_jpeg(bytes: &[u8]) -> Result<Frame> {
    let image = image::load_from_memory(bytes)
        .context("decode jpeg")?
        .into_rgba8();
    let (width, height) = image.dimensions();
    Frame::from_rgba(image.into_raw(), width, height)
}

fn find_jpeg_bounds(buffer: &[u8]) -> Option<(usize, usize)> {
    let start = buffer.windows(2).position(|w| w == [0xFF, 0xD8])?;
    let end = buffer[start + 2..]
        .windows(2)
        .position(|w| w == [0xFF, 0xD9])?;
    Some((start, start + 2 + end + 2))
}

fn health_grace(target_fps: u32) -> Duration {
    let base_ms = if target_fps == 0 {
        2_000
    } else {
        (1000 / target_fps).saturating_mul(6)
    };
    Duration::from_millis(base_ms.max(2_000) as u64)
}

//! Video file clip reader using FFmpeg.
//!
//! Frames are decoded in-memory and converted to RGBA; nothing is written to
//! disk.

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use ffmpeg_next as ffmpeg;

use super::ClipReader;
use crate::frame::Frame;

pub struct FfmpegClipReader {
    input: ffmpeg::format::context::Input,
    stream_index: usize,
    decoder: ffmpeg::codec::decoder::Video,
    scaler: ffmpeg::software::scaling::Context,
    eof_sent: bool,
    frames_decoded: u64,
}

impl FfmpegClipReader {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        ffmpeg::init().context("initialize ffmpeg")?;
        let input = ffmpeg::format::input(&path)
            .with_context(|| format!("could not open video {}", path.display()))?;
        let input_stream = input
            .streams()
            .best(ffmpeg::media::Type::Video)
            .ok_or_else(|| anyhow!("{} has no video track", path.display()))?;
        let stream_index = input_stream.index();
        let context = ffmpeg::codec::context::Context::from_parameters(input_stream.parameters())
            .context("load video decoder parameters")?;
        let decoder = context
            .decoder()
            .video()
            .context("open ffmpeg video decoder")?;

        let scaler = ffmpeg::software::scaling::context::Context::get(
            decoder.format(),
            decoder.width(),
            decoder.height(),
            ffmpeg::util::format::pixel::Pixel::RGBA,
            decoder.width(),
            decoder.height(),
            ffmpeg::software::scaling::flag::Flags::BILINEAR,
        )
        .context("create ffmpeg scaler")?;

        log::info!(
            "FfmpegClipReader: opened {} ({}x{})",
            path.display(),
            decoder.width(),
            decoder.height()
        );

        Ok(Self {
            input,
            stream_index,
            decoder,
            scaler,
            eof_sent: false,
            frames_decoded: 0,
        })
    }

    fn receive(&mut self) -> Result<Option<Frame>> {
        let mut decoded = ffmpeg::frame::Video::empty();
        if self.decoder.receive_frame(&mut decoded).is_err() {
            return Ok(None);
        }
        let mut rgba = ffmpeg::frame::Video::empty();
        self.scaler
            .run(&decoded, &mut rgba)
            .context("scale frame to RGBA")?;
        self.frames_decoded += 1;
        frame_from_video(&rgba).map(Some)
    }
}

impl ClipReader for FfmpegClipReader {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        loop {
            if let Some(frame) = self.receive()? {
                return Ok(Some(frame));
            }
            if self.eof_sent {
                return Ok(None);
            }

            let mut sent = false;
            for (stream, packet) in self.input.packets() {
                if stream.index() != self.stream_index {
                    continue;
                }
                self.decoder
                    .send_packet(&packet)
                    .context("send packet to ffmpeg decoder")?;
                sent = true;
                break;
            }
            if !sent {
                // Flush frames still buffered in the decoder.
                self.decoder.send_eof().context("flush ffmpeg decoder")?;
                self.eof_sent = true;
            }
        }
    }
}

fn frame_from_video(frame: &ffmpeg::frame::Video) -> Result<Frame> {
    let width = frame.width();
    let height = frame.height();
    let row_bytes = (width as usize) * 4;
    let stride = frame.stride(0);
    let data = frame.data(0);

    if stride == row_bytes {
        let len = row_bytes * height as usize;
        let pixels = data
            .get(..len)
            .context("ffmpeg frame is shorter than its dimensions")?;
        return Frame::from_rgba(pixels.to_vec(), width, height);
    }

    let mut pixels = Vec::with_capacity(row_bytes * height as usize);
    for row in 0..height as usize {
        let start = row * stride;
        let end = start + row_bytes;
        pixels.extend_from_slice(
            data.get(start..end)
                .context("ffmpeg frame row is out of bounds")?,
        );
    }

    Frame::from_rgba(pixels, width, height)
}

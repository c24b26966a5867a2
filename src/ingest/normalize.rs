use anyhow::{anyhow, Result};

use crate::frame::Frame;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum PixelFormat {
    Rgb24,
    Nv12,
    Yuyv,
}

impl PixelFormat {
    pub(crate) fn from_fourcc(fourcc: &[u8; 4]) -> Result<Self> {
        match fourcc {
            b"RGB3" => Ok(Self::Rgb24),
            b"NV12" => Ok(Self::Nv12),
            b"YUYV" => Ok(Self::Yuyv),
            other => Err(anyhow!(
                "unsupported capture format {}",
                String::from_utf8_lossy(other)
            )),
        }
    }
}

/// Convert a captured buffer into an RGBA frame.
pub(crate) fn normalize_to_frame(
    pixels: &[u8],
    width: u32,
    height: u32,
    format: PixelFormat,
) -> Result<Frame> {
    let rgb = match format {
        PixelFormat::Rgb24 => {
            let expected = width
                .checked_mul(height)
                .and_then(|v| v.checked_mul(3))
                .ok_or_else(|| anyhow!("RGB frame dimensions overflow"))? as usize;
            // Drivers may pad the final buffer.
            if pixels.len() < expected {
                return Err(anyhow!(
                    "RGB frame length mismatch: expected {}, got {}",
                    expected,
                    pixels.len()
                ));
            }
            pixels[..expected].to_vec()
        }
        PixelFormat::Nv12 => nv12_to_rgb(pixels, width, height)?,
        PixelFormat::Yuyv => yuyv_to_rgb(pixels, width, height)?,
    };
    Frame::from_rgb(&rgb, width, height)
}

fn nv12_to_rgb(pixels: &[u8], width: u32, height: u32) -> Result<Vec<u8>> {
    let w = width as usize;
    let h = height as usize;
    let y_plane = w
        .checked_mul(h)
        .ok_or_else(|| anyhow!("NV12 frame dimensions overflow"))?;
    let expected = y_plane
        .checked_add(y_plane / 2)
        .ok_or_else(|| anyhow!("NV12 frame dimensions overflow"))?;
    if pixels.len() < expected {
        return Err(anyhow!(
            "NV12 frame length mismatch: expected {}, got {}",
            expected,
            pixels.len()
        ));
    }

    let mut rgb = vec![0u8; y_plane * 3];
    for j in 0..h {
        for i in 0..w {
            let y = pixels[j * w + i] as f32;
            let uv_index = y_plane + (j / 2) * w + (i / 2) * 2;
            let u = pixels[uv_index] as f32 - 128.0;
            let v = pixels[uv_index + 1] as f32 - 128.0;
            write_rgb(&mut rgb[(j * w + i) * 3..], y, u, v);
        }
    }

    Ok(rgb)
}

fn yuyv_to_rgb(pixels: &[u8], width: u32, height: u32) -> Result<Vec<u8>> {
    let w = width as usize;
    let h = height as usize;
    let expected = w
        .checked_mul(h)
        .and_then(|v| v.checked_mul(2))
        .ok_or_else(|| anyhow!("YUYV frame dimensions overflow"))?;
    if pixels.len() < expected || w % 2 != 0 {
        return Err(anyhow!(
            "YUYV frame length mismatch: expected {} bytes with even width, got {}",
            expected,
            pixels.len()
        ));
    }

    let mut rgb = vec![0u8; w * h * 3];
    for (pair, chunk) in pixels[..expected].chunks_exact(4).enumerate() {
        let u = chunk[1] as f32 - 128.0;
        let v = chunk[3] as f32 - 128.0;
        let out = pair * 6;
        write_rgb(&mut rgb[out..], chunk[0] as f32, u, v);
        write_rgb(&mut rgb[out + 3..], chunk[2] as f32, u, v);
    }
    Ok(rgb)
}

fn write_rgb(out: &mut [u8], y: f32, u: f32, v: f32) {
    out[0] = clamp_to_u8(y + 1.402_f32 * v);
    out[1] = clamp_to_u8(y - 0.344_136_f32 * u - 0.714_136_f32 * v);
    out[2] = clamp_to_u8(y + 1.772_f32 * u);
}

fn clamp_to_u8(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};

use super::ClipReader;
use crate::frame::Frame;
use crate::ingest::still::load_frame;

const FRAME_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "bmp"];

/// Clip stored as a directory of numbered still images.
///
/// Files are read in lexicographic order; anything without an image extension
/// is skipped.
pub struct FrameDirReader {
    files: std::vec::IntoIter<PathBuf>,
}

impl FrameDirReader {
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        let mut files = Vec::new();
        for entry in std::fs::read_dir(dir)
            .with_context(|| format!("failed to open clip directory {}", dir.display()))?
        {
            let path = entry?.path();
            if path.is_file() && has_frame_extension(&path) {
                files.push(path);
            }
        }
        if files.is_empty() {
            return Err(anyhow!("clip directory {} holds no frames", dir.display()));
        }
        files.sort();
        Ok(Self {
            files: files.into_iter(),
        })
    }

    pub fn remaining(&self) -> usize {
        self.files.len()
    }
}

impl ClipReader for FrameDirReader {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        self.files.next().map(|path| load_frame(&path)).transpose()
    }
}

fn has_frame_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            FRAME_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_frames_in_name_order() -> Result<()> {
        let dir = tempfile::tempdir()?;
        for (name, shade) in [("frame_002.png", 2u8), ("frame_001.png", 1), ("frame_010.png", 10)] {
            image::RgbaImage::from_pixel(2, 2, image::Rgba([shade, 0, 0, 255]))
                .save(dir.path().join(name))?;
        }
        std::fs::write(dir.path().join("notes.txt"), "not a frame")?;

        let mut reader = FrameDirReader::open(dir.path())?;
        assert_eq!(reader.remaining(), 3);
        let shades: Vec<u8> = std::iter::from_fn(|| reader.next_frame().transpose())
            .map(|frame| frame.map(|f| f.pixels()[0]))
            .collect::<Result<_>>()?;
        assert_eq!(shades, vec![1, 2, 10]);
        Ok(())
    }

    #[test]
    fn empty_directory_is_rejected() -> Result<()> {
        let dir = tempfile::tempdir()?;
        assert!(FrameDirReader::open(dir.path()).is_err());
        Ok(())
    }
}

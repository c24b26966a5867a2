//! Offline scoring of a finished clip.
//!
//! A clip is read frame by frame; every fifth frame is scored with the
//! objectness decoder and the best score decides the verdict. Unlike the live
//! loop, scores here are sigmoid-calibrated and compared against
//! [`CLIP_THRESHOLD`] directly.

mod frames_dir;
#[cfg(feature = "clip-ffmpeg")]
mod ffmpeg;

use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::detect::{decode_objectness, InferenceEngine};
use crate::frame::Frame;
use crate::preprocess::Preprocessor;

#[cfg(feature = "clip-ffmpeg")]
pub use ffmpeg::FfmpegClipReader;
pub use frames_dir::FrameDirReader;

/// Score one frame out of every `CLIP_SAMPLE_EVERY`.
pub const CLIP_SAMPLE_EVERY: u64 = 5;

/// Best score above which a clip is reported as containing potholes.
pub const CLIP_THRESHOLD: f32 = 0.6;

/// Finite sequence of frames.
pub trait ClipReader {
    /// Next frame, or `None` at the end of the clip.
    fn next_frame(&mut self) -> Result<Option<Frame>>;
}

/// Verdict for one clip.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ClipReport {
    pub message: String,
    /// Best sampled score, rounded to four decimals.
    pub max_confidence: f64,
    /// Index of the best frame, `-1` when nothing scored above zero.
    pub frame_index: i64,
    pub detected: bool,
    pub frames_read: u64,
    pub frames_sampled: u64,
}

pub struct ClipScanner {
    preprocessor: Preprocessor,
    engine: Arc<dyn InferenceEngine>,
}

impl ClipScanner {
    pub fn new(preprocessor: Preprocessor, engine: Arc<dyn InferenceEngine>) -> Self {
        Self {
            preprocessor,
            engine,
        }
    }

    pub fn scan<R: ClipReader + ?Sized>(&self, reader: &mut R) -> Result<ClipReport> {
        let mut max_confidence = 0.0f32;
        let mut frame_index: i64 = -1;
        let mut frames_read = 0u64;
        let mut frames_sampled = 0u64;

        while let Some(frame) = reader.next_frame()? {
            let index = frames_read;
            frames_read += 1;
            if index % CLIP_SAMPLE_EVERY != 0 {
                continue;
            }
            frames_sampled += 1;

            let score = match self.score(&frame) {
                Ok(score) => score,
                Err(err) => {
                    log::warn!("clip frame {} scored 0: {:#}", index, err);
                    0.0
                }
            };
            if score > max_confidence {
                max_confidence = score;
                frame_index = index as i64;
            }
        }

        log::info!(
            "clip scan finished: {} frames read, {} sampled, max confidence {:.4}",
            frames_read,
            frames_sampled,
            max_confidence
        );

        let detected = max_confidence > CLIP_THRESHOLD;
        let message = if detected {
            format!("Potholes detected (frame {})", frame_index)
        } else {
            "No potholes detected".to_string()
        };
        Ok(ClipReport {
            message,
            max_confidence: round4(max_confidence),
            frame_index,
            detected,
            frames_read,
            frames_sampled,
        })
    }

    fn score(&self, frame: &Frame) -> Result<f32> {
        let input = self.preprocessor.preprocess(frame)?;
        let output = self.engine.run_single(input)?;
        let score = decode_objectness(&output).context("unexpected model output shape")?;
        Ok(score)
    }
}

fn round4(value: f32) -> f64 {
    (value as f64 * 10_000.0).round() / 10_000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{ScriptedEngine, ScriptedOutput};
    use crate::tensor::Tensor;

    struct VecReader(std::vec::IntoIter<Frame>);

    impl ClipReader for VecReader {
        fn next_frame(&mut self) -> Result<Option<Frame>> {
            Ok(self.0.next())
        }
    }

    fn clip(len: usize) -> VecReader {
        let frame = Frame::filled(8, 8, [100, 100, 100, 255]).unwrap();
        VecReader(vec![frame; len].into_iter())
    }

    /// `[7, 6]` output (rows ≥ columns, read as boxes) with one scoring box.
    fn scored(logit: f32) -> ScriptedOutput {
        let mut data = vec![-20.0f32; 7 * 6];
        data[4] = logit;
        data[5] = 20.0;
        ScriptedOutput::Tensor(Tensor::new(vec![7, 6], data).unwrap())
    }

    #[test]
    fn samples_every_fifth_frame() -> Result<()> {
        let engine = Arc::new(ScriptedEngine::new([scored(-20.0)]));
        let scanner = ClipScanner::new(Preprocessor::default(), engine.clone());
        let report = scanner.scan(&mut clip(12))?;

        assert_eq!(report.frames_read, 12);
        assert_eq!(report.frames_sampled, 3);
        assert_eq!(engine.calls(), 3);
        // Near-zero but positive: the first sampled frame keeps the index.
        assert_eq!(report.frame_index, 0);
        assert_eq!(report.max_confidence, 0.0);
        assert!(!report.detected);
        assert_eq!(report.message, "No potholes detected");
        Ok(())
    }

    #[test]
    fn nothing_scored_reports_no_frame() -> Result<()> {
        let engine = Arc::new(ScriptedEngine::new([ScriptedOutput::Fail("no session".into())]));
        let scanner = ClipScanner::new(Preprocessor::default(), engine);
        let report = scanner.scan(&mut clip(7))?;
        assert_eq!(report.frame_index, -1);
        assert_eq!(report.frames_sampled, 2);
        Ok(())
    }

    #[test]
    fn reports_best_sampled_frame() -> Result<()> {
        // Sampled frames 0, 5, 10 score low, high, medium.
        let engine = Arc::new(ScriptedEngine::new([scored(-3.0), scored(3.0), scored(1.0)]));
        let scanner = ClipScanner::new(Preprocessor::default(), engine);
        let report = scanner.scan(&mut clip(11))?;

        assert_eq!(report.frame_index, 5);
        assert!(report.detected);
        assert_eq!(report.message, "Potholes detected (frame 5)");
        let expected = crate::detect::sigmoid(3.0) * crate::detect::sigmoid(20.0);
        assert!((report.max_confidence - expected as f64).abs() < 1e-4);
        Ok(())
    }

    #[test]
    fn failed_frames_score_zero() -> Result<()> {
        let engine = Arc::new(ScriptedEngine::new([
            ScriptedOutput::Fail("session closed".into()),
            scored(0.0),
        ]));
        let scanner = ClipScanner::new(Preprocessor::default(), engine);
        let report = scanner.scan(&mut clip(6))?;
        assert_eq!(report.frame_index, 5);
        assert!(!report.detected);
        Ok(())
    }

    #[test]
    fn report_serializes_like_the_upload_response() -> Result<()> {
        let report = ClipReport {
            message: "No potholes detected".to_string(),
            max_confidence: 0.1234,
            frame_index: -1,
            detected: false,
            frames_read: 3,
            frames_sampled: 1,
        };
        let json = serde_json::to_value(&report)?;
        assert_eq!(json["max_confidence"], 0.1234);
        assert_eq!(json["frame_index"], -1);
        Ok(())
    }
}

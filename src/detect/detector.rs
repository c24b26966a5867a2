use anyhow::{Context, Result};

use super::decode::decode;
use super::session::ModelSession;
use crate::frame::Frame;
use crate::preprocess::Preprocessor;

/// Frame → raw confidence.
///
/// Runs Preprocessor → engine → decoder. While the model session is not
/// ready (still loading, or failed to load) every frame scores `0.0`.
#[derive(Clone)]
pub struct Detector {
    preprocessor: Preprocessor,
    session: ModelSession,
}

impl Detector {
    pub fn new(preprocessor: Preprocessor, session: ModelSession) -> Self {
        Self {
            preprocessor,
            session,
        }
    }

    pub fn session(&self) -> &ModelSession {
        &self.session
    }

    /// Raw confidence for one frame, on the decoder's scale.
    ///
    /// Shape mismatches surface as errors; the caller decides how to degrade.
    pub fn detect(&self, frame: &Frame) -> Result<f32> {
        let Some(engine) = self.session.engine() else {
            return Ok(0.0);
        };
        let input = self.preprocessor.preprocess(frame)?;
        let output = engine
            .run_single(input)
            .with_context(|| format!("{} inference failed", engine.name()))?;
        let confidence = decode(&output).context("unexpected model output shape")?;
        Ok(confidence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::backends::{ScriptedEngine, ScriptedOutput};
    use crate::detect::decode::DecodeError;
    use crate::tensor::Tensor;
    use std::sync::Arc;

    fn frame() -> Frame {
        Frame::filled(32, 24, [90, 90, 90, 255]).unwrap()
    }

    #[test]
    fn loading_session_scores_zero() {
        let detector = Detector::new(Preprocessor::default(), ModelSession::loading());
        assert_eq!(detector.detect(&frame()).unwrap(), 0.0);
    }

    #[test]
    fn ready_session_returns_decoded_confidence() {
        let engine = ScriptedEngine::constant(80.0).unwrap();
        let detector = Detector::new(
            Preprocessor::default(),
            ModelSession::ready(Arc::new(engine)),
        );
        assert_eq!(detector.detect(&frame()).unwrap(), 80.0);
    }

    #[test]
    fn shape_mismatch_is_reported() {
        let bad = Tensor::new(vec![6], vec![0.0; 6]).unwrap();
        let engine = ScriptedEngine::new([ScriptedOutput::Tensor(bad)]);
        let detector = Detector::new(
            Preprocessor::default(),
            ModelSession::ready(Arc::new(engine)),
        );
        let err = detector.detect(&frame()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DecodeError>(),
            Some(DecodeError::UnsupportedRank { rank: 1, .. })
        ));
    }
}

use std::sync::{Arc, RwLock};

use anyhow::Result;

use super::backend::InferenceEngine;

/// Readiness of the shared model session.
#[derive(Clone)]
enum SessionState {
    Loading,
    Ready(Arc<dyn InferenceEngine>),
    Failed(String),
}

/// Snapshot of session readiness for status reporting.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionStatus {
    Loading,
    Ready { engine: &'static str },
    Failed { reason: String },
}

/// Shared handle to the model session.
///
/// The session is installed once. A failed load is terminal: detection keeps
/// running and reads a zero confidence for every frame.
#[derive(Clone)]
pub struct ModelSession {
    state: Arc<RwLock<SessionState>>,
}

impl ModelSession {
    /// A session that is still loading.
    pub fn loading() -> Self {
        Self {
            state: Arc::new(RwLock::new(SessionState::Loading)),
        }
    }

    /// A session that is ready immediately.
    pub fn ready(engine: Arc<dyn InferenceEngine>) -> Self {
        Self {
            state: Arc::new(RwLock::new(SessionState::Ready(engine))),
        }
    }

    /// The loaded engine, if any.
    pub fn engine(&self) -> Option<Arc<dyn InferenceEngine>> {
        match &*self.state.read().ok()? {
            SessionState::Ready(engine) => Some(engine.clone()),
            _ => None,
        }
    }

    pub fn status(&self) -> SessionStatus {
        match self.state.read() {
            Ok(state) => match &*state {
                SessionState::Loading => SessionStatus::Loading,
                SessionState::Ready(engine) => SessionStatus::Ready {
                    engine: engine.name(),
                },
                SessionState::Failed(reason) => SessionStatus::Failed {
                    reason: reason.clone(),
                },
            },
            Err(_) => SessionStatus::Failed {
                reason: "session lock poisoned".to_string(),
            },
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.status(), SessionStatus::Ready { .. })
    }

    /// Record the outcome of a load. Only the first outcome is kept.
    pub fn install(&self, outcome: Result<Arc<dyn InferenceEngine>>) {
        let Ok(mut state) = self.state.write() else {
            log::error!("model session lock poisoned; load outcome dropped");
            return;
        };
        if !matches!(*state, SessionState::Loading) {
            log::warn!("model session already settled; ignoring second load");
            return;
        }
        *state = match outcome {
            Ok(engine) => {
                log::info!(
                    "model session ready (engine={}, inputs={:?}, outputs={:?})",
                    engine.name(),
                    engine.input_names(),
                    engine.output_names()
                );
                SessionState::Ready(engine)
            }
            Err(err) => {
                log::error!("model load failed, confidence will read 0: {:#}", err);
                SessionState::Failed(format!("{:#}", err))
            }
        };
    }

    /// Run `loader` on the blocking pool and install its outcome.
    ///
    /// Must be called from within a tokio runtime.
    pub fn load_in_background<F>(&self, loader: F) -> tokio::task::JoinHandle<()>
    where
        F: FnOnce() -> Result<Arc<dyn InferenceEngine>> + Send + 'static,
    {
        let session = self.clone();
        tokio::task::spawn_blocking(move || session.install(loader()))
    }

    /// Load an ONNX model file in the background with the tract engine.
    #[cfg(feature = "backend-tract")]
    pub fn load_onnx_in_background(
        &self,
        model_path: std::path::PathBuf,
    ) -> tokio::task::JoinHandle<()> {
        self.load_in_background(move || {
            let engine = super::backends::TractEngine::load(&model_path)?;
            Ok(Arc::new(engine) as Arc<dyn InferenceEngine>)
        })
    }
}

impl Default for ModelSession {
    fn default() -> Self {
        Self::loading()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::backends::ScriptedEngine;
    use anyhow::anyhow;

    #[test]
    fn first_outcome_wins() {
        let session = ModelSession::loading();
        assert_eq!(session.status(), SessionStatus::Loading);
        assert!(session.engine().is_none());

        session.install(Err(anyhow!("missing best.onnx")));
        assert!(matches!(session.status(), SessionStatus::Failed { .. }));

        let engine = ScriptedEngine::constant(0.5).unwrap();
        session.install(Ok(Arc::new(engine)));
        assert!(!session.is_ready());
    }

    #[test]
    fn clones_share_state() {
        let session = ModelSession::loading();
        let other = session.clone();
        session.install(Ok(Arc::new(ScriptedEngine::constant(0.5).unwrap())));
        assert_eq!(other.status(), SessionStatus::Ready { engine: "scripted" });
    }

    #[tokio::test]
    async fn background_load_installs_engine() {
        let session = ModelSession::loading();
        session
            .load_in_background(|| Ok(Arc::new(ScriptedEngine::constant(0.5)?) as Arc<dyn InferenceEngine>))
            .await
            .unwrap();
        assert!(session.is_ready());
    }
}

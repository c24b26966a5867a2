//! Fixed-cadence detection loop.
//!
//! `DetectionLoop` owns the only mutable loop state: the `Idle`/`Running`
//! phase, the session counter and the handle of the repeating task. A tick
//! captures the current frame, scores it on the blocking pool and publishes an
//! alert or clear event.
//!
//! Overlap policy: a tick that comes due while the previous tick's inference is
//! still outstanding is dropped (`MissedTickBehavior::Skip`). At most one
//! inference per loop is in flight.
//!
//! `stop` is synchronous. It aborts the repeating task immediately; an
//! inference already running on the blocking pool completes in the
//! background and its result is discarded.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::alert::AlertSink;
use crate::detect::Detector;
use crate::frame::FrameSource;

/// Time between samples.
pub const SAMPLE_PERIOD: Duration = Duration::from_millis(200);

/// Rescaled confidence above which an alert is raised.
pub const ALERT_THRESHOLD: f32 = 0.72;

/// Raw decoder output is divided by this before thresholding.
pub const CONFIDENCE_RESCALE: f32 = 100.0;

/// Default haptic pulse length for an alert.
pub const DEFAULT_VIBRATE_DURATION: Duration = Duration::from_millis(200);

const EVENT_CAPACITY: usize = 64;

/// Outcome of one tick.
#[derive(Clone, Debug, PartialEq)]
pub enum DetectionEvent {
    /// Rescaled confidence exceeded [`ALERT_THRESHOLD`].
    Alert { confidence: f32, formatted: String },
    Clear { confidence: f32 },
}

impl DetectionEvent {
    /// Classify a raw decoder value.
    pub fn from_raw(raw: f32) -> Self {
        let raw = if raw.is_finite() { raw } else { 0.0 };
        let confidence = raw / CONFIDENCE_RESCALE;
        if confidence > ALERT_THRESHOLD {
            Self::Alert {
                confidence,
                formatted: format_confidence(confidence),
            }
        } else {
            Self::Clear { confidence }
        }
    }

    pub fn confidence(&self) -> f32 {
        match self {
            Self::Alert { confidence, .. } | Self::Clear { confidence } => *confidence,
        }
    }

    pub fn is_alert(&self) -> bool {
        matches!(self, Self::Alert { .. })
    }
}

/// `0.8` → `"80.00%"`.
pub fn format_confidence(confidence: f32) -> String {
    format!("{:.2}%", confidence * 100.0)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopPhase {
    Idle,
    Running,
}

struct LoopState {
    phase: LoopPhase,
    session: u64,
    task: Option<JoinHandle<()>>,
}

type SharedSource = Arc<Mutex<Box<dyn FrameSource>>>;

/// Periodic sampler driving detector and alert sink.
///
/// Share it behind an `Arc` with whatever needs to start or stop it. Dropping
/// the loop stops it.
pub struct DetectionLoop {
    state: Arc<Mutex<LoopState>>,
    source: SharedSource,
    detector: Detector,
    sink: Arc<dyn AlertSink>,
    events: broadcast::Sender<DetectionEvent>,
    vibrate: Duration,
}

impl DetectionLoop {
    pub fn new(source: Box<dyn FrameSource>, detector: Detector, sink: Arc<dyn AlertSink>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            state: Arc::new(Mutex::new(LoopState {
                phase: LoopPhase::Idle,
                session: 0,
                task: None,
            })),
            source: Arc::new(Mutex::new(source)),
            detector,
            sink,
            events,
            vibrate: DEFAULT_VIBRATE_DURATION,
        }
    }

    /// Override the haptic pulse length.
    pub fn with_vibrate_duration(mut self, vibrate: Duration) -> Self {
        self.vibrate = vibrate;
        self
    }

    /// Receive alert/clear events published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<DetectionEvent> {
        self.events.subscribe()
    }

    pub fn detector(&self) -> &Detector {
        &self.detector
    }

    pub fn phase(&self) -> LoopPhase {
        self.lock_state()
            .map(|state| state.phase)
            .unwrap_or(LoopPhase::Idle)
    }

    pub fn is_running(&self) -> bool {
        self.phase() == LoopPhase::Running
    }

    /// Number of `Idle → Running` transitions so far.
    pub fn sessions_started(&self) -> u64 {
        self.lock_state().map(|state| state.session).unwrap_or(0)
    }

    /// Begin sampling. Returns `false` if the loop was already running.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self) -> Result<bool> {
        let runtime = tokio::runtime::Handle::try_current()
            .context("detection loop must be started inside a tokio runtime")?;
        let mut state = self.lock_state()?;
        if state.phase == LoopPhase::Running {
            return Ok(false);
        }

        state.session += 1;
        state.phase = LoopPhase::Running;
        let ticker = Ticker {
            state: self.state.clone(),
            session: state.session,
            source: self.source.clone(),
            detector: self.detector.clone(),
            sink: self.sink.clone(),
            events: self.events.clone(),
            vibrate: self.vibrate,
        };
        state.task = Some(runtime.spawn(ticker.run()));

        log::info!(
            "detection loop started (session {}, period {}ms)",
            state.session,
            SAMPLE_PERIOD.as_millis()
        );
        Ok(true)
    }

    /// Stop sampling. Returns `false` if the loop was already idle.
    pub fn stop(&self) -> bool {
        let Ok(mut state) = self.lock_state() else {
            return false;
        };
        if state.phase == LoopPhase::Idle {
            return false;
        }
        state.phase = LoopPhase::Idle;
        if let Some(task) = state.task.take() {
            task.abort();
        }
        log::info!("detection loop stopped (session {})", state.session);
        true
    }

    fn lock_state(&self) -> Result<MutexGuard<'_, LoopState>> {
        self.state
            .lock()
            .map_err(|_| anyhow!("detection loop state lock poisoned"))
    }
}

impl Drop for DetectionLoop {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Everything one running session needs, moved into its task.
struct Ticker {
    state: Arc<Mutex<LoopState>>,
    session: u64,
    source: SharedSource,
    detector: Detector,
    sink: Arc<dyn AlertSink>,
    events: broadcast::Sender<DetectionEvent>,
    vibrate: Duration,
}

impl Ticker {
    async fn run(self) {
        let mut interval = tokio::time::interval(SAMPLE_PERIOD);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            interval.tick().await;
            if !self.is_current() {
                break;
            }
            let raw = self.sample().await;
            self.publish(raw);
        }
    }

    fn is_current(&self) -> bool {
        self.state
            .lock()
            .map(|state| state.phase == LoopPhase::Running && state.session == self.session)
            .unwrap_or(false)
    }

    /// Capture and score one frame. Any failure scores `0.0`.
    async fn sample(&self) -> f32 {
        let source = self.source.clone();
        let detector = self.detector.clone();
        let scored = tokio::task::spawn_blocking(move || -> Result<f32> {
            let frame = {
                let mut source = source
                    .lock()
                    .map_err(|_| anyhow!("frame source lock poisoned"))?;
                source
                    .current_frame()
                    .with_context(|| format!("capture from {} failed", source.name()))?
            };
            detector.detect(&frame)
        })
        .await;

        match scored {
            Ok(Ok(raw)) => raw,
            Ok(Err(err)) => {
                log::warn!("tick scored 0: {:#}", err);
                0.0
            }
            Err(err) => {
                log::warn!("tick scored 0: inference task failed: {}", err);
                0.0
            }
        }
    }

    fn publish(&self, raw: f32) {
        // Holding the state lock orders this against `stop`.
        let Ok(state) = self.state.lock() else {
            return;
        };
        if state.phase != LoopPhase::Running || state.session != self.session {
            log::debug!("discarding result from stopped session {}", self.session);
            return;
        }

        let event = DetectionEvent::from_raw(raw);
        if let DetectionEvent::Alert { formatted, .. } = &event {
            log::info!("pothole alert: confidence {}", formatted);
            self.sink.flash();
            self.sink.vibrate(self.vibrate);
            self.sink
                .set_status_text(&format!("Pothole detected! Confidence: {}", formatted));
        }
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_scale_is_divided_before_thresholding() {
        assert_eq!(
            DetectionEvent::from_raw(80.0),
            DetectionEvent::Alert {
                confidence: 0.8,
                formatted: "80.00%".to_string()
            }
        );
        assert_eq!(
            DetectionEvent::from_raw(50.0),
            DetectionEvent::Clear { confidence: 0.5 }
        );
    }

    #[test]
    fn threshold_is_strict() {
        assert!(!DetectionEvent::from_raw(72.0).is_alert());
        assert!(DetectionEvent::from_raw(72.5).is_alert());
    }

    #[test]
    fn non_finite_scores_clear() {
        assert_eq!(
            DetectionEvent::from_raw(f32::NAN),
            DetectionEvent::Clear { confidence: 0.0 }
        );
    }

    #[test]
    fn formats_two_decimals() {
        assert_eq!(format_confidence(0.8), "80.00%");
        assert_eq!(format_confidence(0.91234), "91.23%");
    }
}

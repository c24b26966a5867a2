//! Pothole Watch
//!
//! Samples a rear-facing camera five times a second, runs a YOLO-style ONNX
//! pothole model on each frame and raises a visual + haptic alert when the
//! model's confidence crosses a fixed threshold.
//!
//! # Module Structure
//!
//! - `frame`: RGBA frames and the `FrameSource` camera trait
//! - `ingest`: Frame sources (synthetic, still image, HTTP/MJPEG, V4L2)
//! - `preprocess`: Frame → `[1, 3, 640, 640]` planar float tensor
//! - `detect`: Inference engines, model session and output decoding
//! - `watch`: The periodic detection loop and its events
//! - `alert`: Flash / vibrate / status text sinks
//! - `controls`: Start/stop control state
//! - `clip`: Offline scoring of a recorded clip
//! - `config`: Daemon configuration (JSON file + env)

pub mod alert;
pub mod clip;
pub mod config;
pub mod controls;
pub mod detect;
pub mod frame;
pub mod ingest;
pub mod preprocess;
pub mod tensor;
pub mod watch;

pub use alert::{AlertSink, NullAlertSink, TerminalAlertSink, UiMode};
pub use clip::{ClipReader, ClipReport, ClipScanner};
pub use config::WatchConfig;
pub use controls::{Command, Controls};
pub use detect::{Detector, InferenceEngine, ModelSession, SessionStatus};
pub use frame::{Frame, FrameSource};
pub use preprocess::{preprocess, Preprocessor, ResizeFilter};
pub use tensor::{NamedTensors, Tensor};
pub use watch::{DetectionEvent, DetectionLoop, LoopPhase};

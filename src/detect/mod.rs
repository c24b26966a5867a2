mod backend;
pub mod backends;
mod decode;
mod detector;
mod session;

pub use backend::InferenceEngine;
pub use backends::{ScriptedEngine, ScriptedOutput};
#[cfg(feature = "backend-tract")]
pub use backends::TractEngine;
pub use decode::{
    decode, decode_objectness, sigmoid, DecodeError, OutputLayout, CONFIDENCE_FIELD,
    FIRST_CLASS_FIELD,
};
pub use detector::Detector;
pub use session::{ModelSession, SessionStatus};

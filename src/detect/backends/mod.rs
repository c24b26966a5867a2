pub mod scripted;

#[cfg(feature = "backend-tract")]
pub mod tract;

pub use scripted::{boxes_tensor, ScriptedEngine, ScriptedOutput};

#[cfg(feature = "backend-tract")]
pub use tract::TractEngine;

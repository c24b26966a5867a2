use anyhow::{anyhow, Result};

use crate::tensor::{NamedTensors, Tensor};

/// Inference engine trait.
///
/// The model itself is opaque: an engine is a loaded session that maps a
/// named-input map to a named-output map. Input and output names are
/// discovered from the loaded session, never hardcoded by callers.
///
/// `run` takes `&self`. A session is immutable once loaded and may be queried
/// from several blocking threads at once.
pub trait InferenceEngine: Send + Sync {
    /// Engine identifier.
    fn name(&self) -> &'static str;

    /// Input names in model order.
    fn input_names(&self) -> &[String];

    /// Output names in model order.
    fn output_names(&self) -> &[String];

    /// Run one inference.
    fn run(&self, inputs: NamedTensors) -> Result<NamedTensors>;

    /// Run with a single tensor bound to the first input, returning the first output.
    fn run_single(&self, input: Tensor) -> Result<Tensor> {
        let input_name = self
            .input_names()
            .first()
            .ok_or_else(|| anyhow!("{} session declares no inputs", self.name()))?
            .clone();
        let output_name = self
            .output_names()
            .first()
            .ok_or_else(|| anyhow!("{} session declares no outputs", self.name()))?
            .clone();

        let mut inputs = NamedTensors::new();
        inputs.insert(input_name, input);
        let mut outputs = self.run(inputs)?;
        outputs
            .remove(&output_name)
            .ok_or_else(|| anyhow!("output '{}' missing from inference result", output_name))
    }
}

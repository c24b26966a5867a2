#![cfg(feature = "backend-tract")]

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use tract_onnx::prelude::*;

use crate::detect::backend::InferenceEngine;
use crate::preprocess::MODEL_INPUT_SHAPE;
use crate::tensor::{NamedTensors, Tensor as WatchTensor};

type Plan = TypedRunnableModel<TypedModel>;

/// Tract-based engine for ONNX inference.
///
/// Loads a local model file once, pinned to the `[1, 3, 640, 640]` input. The
/// optimized plan is read-only after load.
pub struct TractEngine {
    plan: Plan,
    input_names: Vec<String>,
    output_names: Vec<String>,
}

impl TractEngine {
    /// Load an ONNX model from disk and prepare it for inference.
    pub fn load<P: AsRef<Path>>(model_path: P) -> Result<Self> {
        let model_path = model_path.as_ref();
        let [batch, channels, height, width] = MODEL_INPUT_SHAPE;
        let plan = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(
                    f32::datum_type(),
                    tvec!(batch, channels, height, width),
                ),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        let model = plan.model();
        let input_names = model
            .input_outlets()
            .context("model has no input outlets")?
            .iter()
            .map(|outlet| model.node(outlet.node).name.clone())
            .collect();
        let output_names = model
            .output_outlets()
            .context("model has no output outlets")?
            .iter()
            .map(|outlet| model.node(outlet.node).name.clone())
            .collect();

        Ok(Self {
            plan,
            input_names,
            output_names,
        })
    }

    fn build_input(&self, inputs: &mut NamedTensors) -> Result<TVec<TValue>> {
        let mut values = TVec::new();
        for name in &self.input_names {
            let tensor = inputs
                .remove(name)
                .ok_or_else(|| anyhow!("missing input tensor '{}'", name))?;
            let value = Tensor::from_shape(tensor.shape(), tensor.data())
                .with_context(|| format!("input '{}' has an invalid shape", name))?;
            values.push(value.into());
        }
        Ok(values)
    }
}

impl InferenceEngine for TractEngine {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn input_names(&self) -> &[String] {
        &self.input_names
    }

    fn output_names(&self) -> &[String] {
        &self.output_names
    }

    fn run(&self, mut inputs: NamedTensors) -> Result<NamedTensors> {
        let values = self.build_input(&mut inputs)?;
        let outputs = self.plan.run(values).context("ONNX inference failed")?;

        let mut named = NamedTensors::new();
        for (name, output) in self.output_names.iter().zip(outputs.iter()) {
            let data = output
                .as_slice::<f32>()
                .with_context(|| format!("output '{}' tensor was not f32", name))?;
            named.insert(
                name.clone(),
                WatchTensor::new(output.shape().to_vec(), data.to_vec())?,
            );
        }
        Ok(named)
    }
}

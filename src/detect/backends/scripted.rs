use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{Receiver, Sender};
use std::sync::Mutex;

use anyhow::{anyhow, Result};

use crate::detect::backend::InferenceEngine;
use crate::preprocess::MODEL_INPUT_LEN;
use crate::tensor::{NamedTensors, Tensor};

const INPUT_NAME: &str = "images";
const OUTPUT_NAME: &str = "output0";

/// One scripted inference outcome.
#[derive(Clone, Debug)]
pub enum ScriptedOutput {
    Tensor(Tensor),
    Fail(String),
}

/// Scripted engine for tests and dry runs.
///
/// Replays outputs in order and repeats the last one once the script runs
/// out. With a gate installed, each `run` announces itself and then blocks
/// until the gate is released, which lets callers hold a call in flight.
pub struct ScriptedEngine {
    script: Mutex<VecDeque<ScriptedOutput>>,
    last: Mutex<Option<ScriptedOutput>>,
    calls: AtomicUsize,
    gate: Option<Gate>,
    input_names: Vec<String>,
    output_names: Vec<String>,
}

struct Gate {
    entered: Mutex<Sender<usize>>,
    release: Mutex<Receiver<()>>,
}

impl ScriptedEngine {
    pub fn new(outputs: impl IntoIterator<Item = ScriptedOutput>) -> Self {
        Self {
            script: Mutex::new(outputs.into_iter().collect()),
            last: Mutex::new(None),
            calls: AtomicUsize::new(0),
            gate: None,
            input_names: vec![INPUT_NAME.to_string()],
            output_names: vec![OUTPUT_NAME.to_string()],
        }
    }

    /// Engine whose every box record carries `confidence` at field 4.
    pub fn constant(confidence: f32) -> Result<Self> {
        Ok(Self::new([ScriptedOutput::Tensor(boxes_tensor(&[confidence])?)]))
    }

    /// Block each call until a message arrives on `release`; the call number
    /// is sent on `entered` first.
    pub fn with_gate(mut self, entered: Sender<usize>, release: Receiver<()>) -> Self {
        self.gate = Some(Gate {
            entered: Mutex::new(entered),
            release: Mutex::new(release),
        });
        self
    }

    /// Number of `run` calls started so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn next_output(&self) -> Result<ScriptedOutput> {
        let mut script = self
            .script
            .lock()
            .map_err(|_| anyhow!("script lock poisoned"))?;
        let mut last = self.last.lock().map_err(|_| anyhow!("script lock poisoned"))?;
        if let Some(next) = script.pop_front() {
            *last = Some(next.clone());
            return Ok(next);
        }
        last.clone()
            .ok_or_else(|| anyhow!("scripted engine has no outputs"))
    }
}

impl InferenceEngine for ScriptedEngine {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn input_names(&self) -> &[String] {
        &self.input_names
    }

    fn output_names(&self) -> &[String] {
        &self.output_names
    }

    fn run(&self, inputs: NamedTensors) -> Result<NamedTensors> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        let input = inputs
            .get(INPUT_NAME)
            .ok_or_else(|| anyhow!("missing input tensor '{}'", INPUT_NAME))?;
        if input.len() != MODEL_INPUT_LEN {
            return Err(anyhow!(
                "input tensor has {} elements, expected {}",
                input.len(),
                MODEL_INPUT_LEN
            ));
        }

        if let Some(gate) = &self.gate {
            let entered = gate
                .entered
                .lock()
                .map_err(|_| anyhow!("gate lock poisoned"))?;
            let _ = entered.send(call);
            drop(entered);
            let release = gate
                .release
                .lock()
                .map_err(|_| anyhow!("gate lock poisoned"))?;
            release
                .recv()
                .map_err(|_| anyhow!("gate closed while call {} was in flight", call))?;
        }

        match self.next_output()? {
            ScriptedOutput::Tensor(tensor) => {
                let mut outputs = NamedTensors::new();
                outputs.insert(OUTPUT_NAME.to_string(), tensor);
                Ok(outputs)
            }
            ScriptedOutput::Fail(reason) => Err(anyhow!(reason)),
        }
    }
}

/// `[1, n, 6]` output tensor with the given confidences at field 4.
pub fn boxes_tensor(confidences: &[f32]) -> Result<Tensor> {
    let mut data = Vec::with_capacity(confidences.len() * 6);
    for conf in confidences {
        data.extend_from_slice(&[0.0, 0.0, 1.0, 1.0, *conf, 0.0]);
    }
    Tensor::new(vec![1, confidences.len(), 6], data)
}

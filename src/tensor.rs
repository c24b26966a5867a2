use std::collections::BTreeMap;

use anyhow::{anyhow, Result};

/// Dense `f32` tensor with a shape descriptor.
///
/// Tensors are immutable once built; the element count always equals the
/// product of the shape.
#[derive(Clone, Debug, PartialEq)]
pub struct Tensor {
    shape: Vec<usize>,
    data: Vec<f32>,
}

/// Named-input / named-output map exchanged with an inference engine.
pub type NamedTensors = BTreeMap<String, Tensor>;

impl Tensor {
    pub fn new(shape: Vec<usize>, data: Vec<f32>) -> Result<Self> {
        let expected = shape
            .iter()
            .try_fold(1usize, |acc, dim| acc.checked_mul(*dim))
            .ok_or_else(|| anyhow!("tensor shape {:?} overflows", shape))?;
        if data.len() != expected {
            return Err(anyhow!(
                "tensor shape {:?} expects {} elements, received {}",
                shape,
                expected,
                data.len()
            ));
        }
        Ok(Self { shape, data })
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn element_count_must_match_shape() {
        assert!(Tensor::new(vec![1, 2, 3], vec![0.0; 6]).is_ok());
        assert!(Tensor::new(vec![1, 2, 3], vec![0.0; 5]).is_err());
        assert!(Tensor::new(vec![1, 0, 6], Vec::new()).is_ok());
    }
}

//! Model output interpretation.
//!
//! The output shape is only known once inference has run. Each call resolves
//! the declared rank into an [`OutputLayout`] and reduces the box records to a
//! single whole-frame score. There is no box extraction, class filtering or
//! non-max suppression here.

use thiserror::Error;

use crate::tensor::Tensor;

/// Offset of the confidence field inside one box record.
pub const CONFIDENCE_FIELD: usize = 4;

/// Offset of the first class score inside one box record.
pub const FIRST_CLASS_FIELD: usize = 5;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("unsupported output rank {rank} (shape {shape:?}); expected 2 or 3")]
    UnsupportedRank { rank: usize, shape: Vec<usize> },
    #[error("box record width {stride} has no field at offset {field}")]
    RecordTooNarrow { stride: usize, field: usize },
    #[error("output holds {actual} values but layout needs {expected}")]
    Truncated { expected: usize, actual: usize },
}

/// Output layout resolved from the declared shape.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputLayout {
    /// `[batch, num_boxes, stride]`; the batch dimension is assumed to be 1.
    Rank3 { num_boxes: usize, stride: usize },
    /// `[num_boxes, stride]`.
    Rank2 { num_boxes: usize, stride: usize },
    Unsupported { rank: usize },
}

impl OutputLayout {
    pub fn from_shape(shape: &[usize]) -> Self {
        match *shape {
            [_batch, num_boxes, stride] => Self::Rank3 { num_boxes, stride },
            [num_boxes, stride] => Self::Rank2 { num_boxes, stride },
            _ => Self::Unsupported { rank: shape.len() },
        }
    }

    /// Box count and record width, or the shape-mismatch error.
    pub fn boxes(self, shape: &[usize]) -> Result<(usize, usize), DecodeError> {
        match self {
            Self::Rank3 { num_boxes, stride } | Self::Rank2 { num_boxes, stride } => {
                Ok((num_boxes, stride))
            }
            Self::Unsupported { rank } => Err(DecodeError::UnsupportedRank {
                rank,
                shape: shape.to_vec(),
            }),
        }
    }
}

/// Maximum raw confidence (field 4) across all boxes; `0.0` when there are none.
///
/// The value is used as emitted by the model, with no sigmoid or softmax.
pub fn decode(output: &Tensor) -> Result<f32, DecodeError> {
    let (num_boxes, stride) = OutputLayout::from_shape(output.shape()).boxes(output.shape())?;
    if num_boxes == 0 {
        return Ok(0.0);
    }
    check_records(output.data(), num_boxes, stride, CONFIDENCE_FIELD)?;

    let best = output
        .data()
        .chunks_exact(stride)
        .take(num_boxes)
        .map(|record| record[CONFIDENCE_FIELD])
        .fold(f32::NEG_INFINITY, f32::max);
    Ok(if best.is_finite() { best } else { 0.0 })
}

/// Objectness-times-class score used for offline clip scoring.
///
/// A leading batch dimension of 1 is squeezed. When the matrix has fewer rows
/// than columns it is read transposed, so rows are always boxes. Per box the
/// score is `sigmoid(field 4) * sigmoid(class)`, where class is field 5 for a
/// single-class model and the best class otherwise.
pub fn decode_objectness(output: &Tensor) -> Result<f32, DecodeError> {
    let shape = output.shape();
    let (rows, cols) = match OutputLayout::from_shape(shape) {
        OutputLayout::Rank3 { num_boxes, stride } | OutputLayout::Rank2 { num_boxes, stride } => {
            (num_boxes, stride)
        }
        OutputLayout::Unsupported { rank } => {
            return Err(DecodeError::UnsupportedRank {
                rank,
                shape: shape.to_vec(),
            })
        }
    };
    if rows == 0 || cols == 0 {
        return Ok(0.0);
    }
    let data = output.data();
    let expected = rows * cols;
    if data.len() < expected {
        return Err(DecodeError::Truncated {
            expected,
            actual: data.len(),
        });
    }

    let transposed = rows < cols;
    let (num_boxes, stride) = if transposed { (cols, rows) } else { (rows, cols) };
    if stride <= FIRST_CLASS_FIELD {
        return Err(DecodeError::RecordTooNarrow {
            stride,
            field: FIRST_CLASS_FIELD,
        });
    }

    let field = |b: usize, f: usize| {
        if transposed {
            data[f * cols + b]
        } else {
            data[b * cols + f]
        }
    };

    let best = (0..num_boxes)
        .map(|b| {
            let objectness = sigmoid(field(b, CONFIDENCE_FIELD));
            let class = (FIRST_CLASS_FIELD..stride)
                .map(|f| sigmoid(field(b, f)))
                .fold(f32::NEG_INFINITY, f32::max);
            objectness * class
        })
        .fold(f32::NEG_INFINITY, f32::max);
    Ok(if best.is_finite() { best } else { 0.0 })
}

pub fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

fn check_records(
    data: &[f32],
    num_boxes: usize,
    stride: usize,
    field: usize,
) -> Result<(), DecodeError> {
    if stride <= field {
        return Err(DecodeError::RecordTooNarrow { stride, field });
    }
    let expected = num_boxes * stride;
    if data.len() < expected {
        return Err(DecodeError::Truncated {
            expected,
            actual: data.len(),
        });
    }
    Ok(())
}

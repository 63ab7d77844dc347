//! Validation helpers shared by the metric and loss routines.
//!
//! They pull small label tensors to the host and normalise axis arguments so
//! that shape problems surface as `InvalidArgument` instead of backend errors.

use candle_core::{DType, Tensor};

use crate::{Result, TrainingError};

/// Copies a 1-D integer label tensor to the host, checking every label lies
/// in `[0, num_classes)`.
pub(crate) fn class_indices(labels: &Tensor, num_classes: usize) -> Result<Vec<usize>> {
    if labels.rank() != 1 {
        return Err(TrainingError::invalid_argument(format!(
            "expected 1-D class labels, got shape {:?}",
            labels.dims()
        )));
    }
    let host = match labels.dtype() {
        DType::U8 | DType::U32 | DType::I64 => labels.to_dtype(DType::I64)?.to_vec1::<i64>()?,
        dtype => {
            return Err(TrainingError::invalid_argument(format!(
                "unsupported label dtype {:?}",
                dtype
            )))
        }
    };
    host.into_iter()
        .map(|label| {
            if label < 0 || label as usize >= num_classes {
                Err(TrainingError::invalid_argument(format!(
                    "label {} outside [0, {})",
                    label, num_classes
                )))
            } else {
                Ok(label as usize)
            }
        })
        .collect()
}

/// Resolves a possibly negative axis (counted from the end) against `rank`.
pub(crate) fn resolve_axis(axis: isize, rank: usize) -> Result<usize> {
    let resolved = if axis < 0 {
        rank as isize + axis
    } else {
        axis
    };
    if resolved < 0 || resolved as usize >= rank {
        return Err(TrainingError::invalid_argument(format!(
            "axis {} out of range for tensor of rank {}",
            axis, rank
        )));
    }
    Ok(resolved as usize)
}

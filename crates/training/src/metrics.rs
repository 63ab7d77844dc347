use std::fmt;

use candle_core::{DType, Tensor};
use serde::{Deserialize, Serialize};

use crate::{checks::class_indices, Result, TrainingError};

/// Tracks the latest value and the weighted running average of a scalar stream.
///
/// While the accumulated weight is zero the average is left untouched, so a
/// freshly reset meter reports `0.0` until the first positive-weight update.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AverageMeter {
    value: f64,
    sum: f64,
    count: u64,
    average: f64,
}

impl AverageMeter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn update(&mut self, value: f64) {
        self.update_weighted(value, 1);
    }

    /// Records `value` as if it had been observed `weight` times, e.g. a batch
    /// mean over `weight` examples.
    pub fn update_weighted(&mut self, value: f64, weight: u64) {
        self.value = value;
        self.sum += value * weight as f64;
        self.count += weight;
        if self.count > 0 {
            self.average = self.sum / self.count as f64;
        }
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn sum(&self) -> f64 {
        self.sum
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn average(&self) -> f64 {
        self.average
    }
}

impl fmt::Display for AverageMeter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.4} ({:.4})", self.value, self.average)
    }
}

/// Percentage of rows in `output` (N x C scores) whose label in `target` (N)
/// is among the `k` best-scoring classes, for every `k` in `topk`.
///
/// Equal scores are ranked by class index, lowest first. Scores are compared
/// in `f64` and must be finite. The computation is detached from the autograd
/// graph.
pub fn top_k_accuracy(output: &Tensor, target: &Tensor, topk: &[usize]) -> Result<Vec<f64>> {
    let (batch, classes) = match output.dims() {
        [batch, classes] => (*batch, *classes),
        dims => {
            return Err(TrainingError::invalid_argument(format!(
                "accuracy expects (batch, classes) scores, got shape {:?}",
                dims
            )))
        }
    };
    if batch == 0 {
        return Err(TrainingError::invalid_argument(
            "accuracy requires at least one example",
        ));
    }
    if target.dims() != [batch] {
        return Err(TrainingError::invalid_argument(format!(
            "target shape {:?} does not match batch size {}",
            target.dims(),
            batch
        )));
    }
    if topk.is_empty() {
        return Err(TrainingError::invalid_argument("topk must not be empty"));
    }
    if let Some(k) = topk.iter().find(|&&k| k == 0 || k > classes) {
        return Err(TrainingError::invalid_argument(format!(
            "top-{} requested but scores have {} classes",
            k, classes
        )));
    }

    let labels = class_indices(target, classes)?;
    let scores = output.detach().to_dtype(DType::F64)?.to_vec2::<f64>()?;
    if let Some(row) = scores
        .iter()
        .position(|row| row.iter().any(|score| !score.is_finite()))
    {
        return Err(TrainingError::invalid_argument(format!(
            "scores for example {} contain a non-finite value",
            row
        )));
    }
    let ranks: Vec<usize> = scores
        .iter()
        .zip(&labels)
        .map(|(row, &label)| rank_of(row, label))
        .collect();

    Ok(topk
        .iter()
        .map(|&k| {
            let correct = ranks.iter().filter(|&&rank| rank < k).count();
            correct as f64 * 100.0 / batch as f64
        })
        .collect())
}

/// Number of classes ranked strictly ahead of `label` in `row`.
fn rank_of(row: &[f64], label: usize) -> usize {
    let score = row[label];
    row.iter()
        .enumerate()
        .filter(|&(class, &other)| other > score || (other == score && class < label))
        .count()
}

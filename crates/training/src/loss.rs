use std::str::FromStr;

use candle_core::{DType, Tensor};
use candle_nn::{encoding::one_hot, ops};

use crate::{
    checks::{class_indices, resolve_axis},
    Result, TrainingError,
};

/// How per-example losses are folded into the returned tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Reduction {
    #[default]
    Mean,
    /// Per-example losses. Recognised but not implemented yet.
    None,
}

impl FromStr for Reduction {
    type Err = TrainingError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "mean" => Ok(Reduction::Mean),
            "none" => Ok(Reduction::None),
            other => Err(TrainingError::unsupported(format!(
                "reduction '{}' (expected 'mean')",
                other
            ))),
        }
    }
}

/// Target accepted by [`label_smoothing`] and [`SoftCrossEntropyLoss::compute`].
#[derive(Debug, Clone, Copy)]
pub enum SmoothingTarget<'a> {
    /// 1-D integer class indices, one-hot encoded to `num_classes` columns.
    Hard {
        labels: &'a Tensor,
        num_classes: usize,
    },
    /// A probability distribution along the last axis.
    Soft(&'a Tensor),
}

impl SmoothingTarget<'_> {
    fn num_classes(&self) -> Result<usize> {
        match self {
            SmoothingTarget::Hard { num_classes, .. } => Ok(*num_classes),
            SmoothingTarget::Soft(target) => target.dims().last().copied().ok_or_else(|| {
                TrainingError::invalid_argument("soft target must have a class axis")
            }),
        }
    }

    /// Materialises the target as an `f32` distribution tensor.
    pub fn to_distribution(&self) -> Result<Tensor> {
        match *self {
            SmoothingTarget::Hard {
                labels,
                num_classes,
            } => {
                class_indices(labels, num_classes)?;
                let indices = labels.to_dtype(DType::I64)?;
                Ok(one_hot(indices, num_classes, 1f32, 0f32)?)
            }
            SmoothingTarget::Soft(target) => {
                if target.rank() == 0 {
                    return Err(TrainingError::invalid_argument(
                        "soft target must have a class axis",
                    ));
                }
                Ok(target.to_dtype(DType::F32)?)
            }
        }
    }
}

/// Mixes `target` with a uniform distribution over the other classes.
///
/// With `C` classes every slot receives `epsilon / (C - 1)` and the original
/// distribution is scaled by `1 - epsilon - epsilon / (C - 1)`, so each row
/// still sums to one.
pub fn label_smoothing(target: SmoothingTarget<'_>, epsilon: f64) -> Result<Tensor> {
    if !epsilon.is_finite() || !(0.0..1.0).contains(&epsilon) {
        return Err(TrainingError::invalid_argument(format!(
            "label smoothing epsilon must be in [0, 1) (got {})",
            epsilon
        )));
    }
    let classes = target.num_classes()?;
    if classes < 2 {
        return Err(TrainingError::invalid_argument(format!(
            "label smoothing needs at least two classes (got {})",
            classes
        )));
    }

    let distribution = target.to_distribution()?;
    let uniform_weight = epsilon / (classes - 1) as f64;
    let target_scaling = 1.0 - epsilon - uniform_weight;
    Ok(distribution.affine(target_scaling, uniform_weight)?)
}

/// Cross entropy between `logits` and a probability distribution `probs` of
/// the same shape, normalised along `axis` (negative values count from the end).
pub fn soft_cross_entropy(
    logits: &Tensor,
    probs: &Tensor,
    axis: isize,
    reduction: Reduction,
) -> Result<Tensor> {
    if logits.dims() != probs.dims() {
        return Err(TrainingError::invalid_argument(format!(
            "target shape {:?} does not match logits shape {:?}",
            probs.dims(),
            logits.dims()
        )));
    }
    let dim = resolve_axis(axis, logits.rank())?;
    if logits.elem_count() == 0 {
        return Err(TrainingError::invalid_argument(
            "no examples available for loss computation",
        ));
    }
    if reduction != Reduction::Mean {
        return Err(TrainingError::unsupported(format!(
            "reduction {:?} for soft cross entropy",
            reduction
        )));
    }

    let log_probs = ops::log_softmax(logits, dim)?;
    let probs = probs
        .to_device(logits.device())?
        .to_dtype(logits.dtype())?;
    let per_example = (&probs * &log_probs)?.sum(dim)?.neg()?;
    Ok(per_example.mean_all()?)
}

/// Soft-target cross entropy with optional label smoothing.
#[derive(Debug, Clone)]
pub struct SoftCrossEntropyLoss {
    axis: isize,
    reduction: Reduction,
    label_smoothing: f64,
}

impl SoftCrossEntropyLoss {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_axis(mut self, axis: isize) -> Self {
        self.axis = axis;
        self
    }

    pub fn with_reduction(mut self, reduction: Reduction) -> Self {
        self.reduction = reduction;
        self
    }

    pub fn with_label_smoothing(mut self, smoothing: f64) -> Result<Self> {
        if !(0.0..1.0).contains(&smoothing) {
            return Err(TrainingError::invalid_argument(
                "label smoothing must be in [0, 1) for cross entropy",
            ));
        }
        self.label_smoothing = smoothing;
        Ok(self)
    }

    /// Smoothing is applied along the last axis of the target before the loss.
    pub fn compute(&self, logits: &Tensor, target: SmoothingTarget<'_>) -> Result<Tensor> {
        let probs = if self.label_smoothing > 0.0 {
            label_smoothing(target, self.label_smoothing)?
        } else {
            target.to_distribution()?
        };
        soft_cross_entropy(logits, &probs, self.axis, self.reduction)
    }
}

impl Default for SoftCrossEntropyLoss {
    fn default() -> Self {
        Self {
            axis: -1,
            reduction: Reduction::Mean,
            label_smoothing: 0.0,
        }
    }
}

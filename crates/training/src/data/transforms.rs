//! Per-image transforms applied by vision datasets.
//!
//! Images are `(channels, height, width)` tensors with values already scaled
//! to `[0, 1]`.

use std::fmt;

use candle_core::{DType, Tensor};
use rand::{rngs::StdRng, Rng};

use crate::{Result, TrainingError};

pub trait Transform: fmt::Debug + Send + Sync {
    fn apply(&self, image: &Tensor, rng: &mut StdRng) -> Result<Tensor>;
}

fn chw(image: &Tensor) -> Result<(usize, usize, usize)> {
    image.dims3().map_err(|_| {
        TrainingError::invalid_argument(format!(
            "expected (channels, height, width) image, got shape {:?}",
            image.dims()
        ))
    })
}

/// Zero-pads both spatial axes by `padding` and crops a random `size` x `size`
/// window.
#[derive(Debug, Clone)]
pub struct RandomCrop {
    size: usize,
    padding: usize,
}

impl RandomCrop {
    pub fn new(size: usize, padding: usize) -> Result<Self> {
        if size == 0 {
            return Err(TrainingError::invalid_argument(
                "crop size must be greater than zero",
            ));
        }
        Ok(Self { size, padding })
    }
}

impl Transform for RandomCrop {
    fn apply(&self, image: &Tensor, rng: &mut StdRng) -> Result<Tensor> {
        let (_, height, width) = chw(image)?;
        let padded_height = height + 2 * self.padding;
        let padded_width = width + 2 * self.padding;
        if self.size > padded_height || self.size > padded_width {
            return Err(TrainingError::invalid_argument(format!(
                "crop size {} exceeds padded image {}x{}",
                self.size, padded_height, padded_width
            )));
        }

        let padded = if self.padding > 0 {
            image
                .pad_with_zeros(1, self.padding, self.padding)?
                .pad_with_zeros(2, self.padding, self.padding)?
        } else {
            image.clone()
        };
        let top = rng.gen_range(0..=padded_height - self.size);
        let left = rng.gen_range(0..=padded_width - self.size);
        Ok(padded
            .narrow(1, top, self.size)?
            .narrow(2, left, self.size)?)
    }
}

/// Mirrors the width axis with probability `p`.
#[derive(Debug, Clone)]
pub struct RandomHorizontalFlip {
    p: f64,
}

impl RandomHorizontalFlip {
    pub fn new(p: f64) -> Result<Self> {
        if !(0.0..=1.0).contains(&p) {
            return Err(TrainingError::invalid_argument(format!(
                "flip probability must be in [0, 1] (got {})",
                p
            )));
        }
        Ok(Self { p })
    }
}

impl Default for RandomHorizontalFlip {
    fn default() -> Self {
        Self { p: 0.5 }
    }
}

impl Transform for RandomHorizontalFlip {
    fn apply(&self, image: &Tensor, rng: &mut StdRng) -> Result<Tensor> {
        let (_, _, width) = chw(image)?;
        if !rng.gen_bool(self.p) {
            return Ok(image.clone());
        }
        let reversed: Vec<u32> = (0..width as u32).rev().collect();
        let indices = Tensor::from_vec(reversed, width, image.device())?;
        Ok(image.contiguous()?.index_select(&indices, 2)?)
    }
}

/// Per-channel `(x - mean) / std`.
#[derive(Debug, Clone)]
pub struct Normalize {
    mean: Vec<f32>,
    std: Vec<f32>,
}

impl Normalize {
    pub fn new(mean: &[f32], std: &[f32]) -> Result<Self> {
        if mean.is_empty() || mean.len() != std.len() {
            return Err(TrainingError::invalid_argument(format!(
                "normalize needs one mean and std per channel (got {} and {})",
                mean.len(),
                std.len()
            )));
        }
        if std.iter().any(|&s| !(s > 0.0)) {
            return Err(TrainingError::invalid_argument(
                "normalize std values must be positive",
            ));
        }
        Ok(Self {
            mean: mean.to_vec(),
            std: std.to_vec(),
        })
    }

    pub fn mean(&self) -> &[f32] {
        &self.mean
    }

    pub fn std(&self) -> &[f32] {
        &self.std
    }
}

impl Transform for Normalize {
    fn apply(&self, image: &Tensor, _rng: &mut StdRng) -> Result<Tensor> {
        let (channels, _, _) = chw(image)?;
        if channels != self.mean.len() {
            return Err(TrainingError::invalid_argument(format!(
                "normalize configured for {} channels, image has {}",
                self.mean.len(),
                channels
            )));
        }
        let device = image.device();
        let mean = Tensor::from_slice(&self.mean, (channels, 1, 1), device)?;
        let std = Tensor::from_slice(&self.std, (channels, 1, 1), device)?;
        Ok(image
            .to_dtype(DType::F32)?
            .broadcast_sub(&mean)?
            .broadcast_div(&std)?)
    }
}

/// Applies its steps in order.
#[derive(Debug, Default)]
pub struct Compose {
    steps: Vec<Box<dyn Transform>>,
}

impl Compose {
    pub fn new(steps: Vec<Box<dyn Transform>>) -> Self {
        Self { steps }
    }

    pub fn push(&mut self, step: impl Transform + 'static) {
        self.steps.push(Box::new(step));
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn steps(&self) -> &[Box<dyn Transform>] {
        &self.steps
    }
}

impl Transform for Compose {
    fn apply(&self, image: &Tensor, rng: &mut StdRng) -> Result<Tensor> {
        let mut current = image.clone();
        for step in &self.steps {
            current = step.apply(&current, rng)?;
        }
        Ok(current)
    }
}

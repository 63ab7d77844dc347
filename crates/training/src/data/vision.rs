//! Standard image-classification datasets with their preset pipelines.
//!
//! Raw files are read with `candle_datasets` from a per-dataset directory
//! under the data root:
//!
//! - CIFAR-10: `<root>/cifar-10-batches-bin/{data_batch_1..5,test_batch}.bin`
//! - MNIST: `<root>/MNIST/raw/{train,t10k}-{images-idx3,labels-idx1}-ubyte`
//!
//! Nothing is downloaded here. Fetch the files from the URLs in
//! [`DatasetName::source`] (CIFAR-10 binary version, uncompressed MNIST idx
//! files), or pull the hub copies with `candle_datasets::vision::{cifar,
//! mnist}::load()`. The CIFAR-10 reader expects full 10000-record batches.
//!
//! Pixel values arrive scaled to `[0, 1]`; normalization always runs last.

use std::{
    fmt,
    path::{Path, PathBuf},
    str::FromStr,
    sync::Mutex,
};

use candle_core::{DType, Tensor};
use candle_datasets::vision;
use rand::{rngs::StdRng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::{
    transforms::{Compose, Normalize, RandomCrop, RandomHorizontalFlip, Transform},
    Dataset,
};
use crate::{config::DataConfig, logging::ScopedTimer, Result, TrainingError};

pub const CIFAR10_MEAN: [f32; 3] = [0.4914, 0.4822, 0.4465];
pub const CIFAR10_STD: [f32; 3] = [0.2023, 0.1994, 0.2010];
pub const MNIST_MEAN: [f32; 1] = [0.1307];
pub const MNIST_STD: [f32; 1] = [0.3081];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatasetName {
    #[default]
    Cifar10,
    Mnist,
}

impl DatasetName {
    /// `(channels, height, width)` of a single image.
    pub fn image_shape(&self) -> (usize, usize, usize) {
        match self {
            DatasetName::Cifar10 => (3, 32, 32),
            DatasetName::Mnist => (1, 28, 28),
        }
    }

    pub fn directory(&self, root: &Path) -> PathBuf {
        match self {
            DatasetName::Cifar10 => root.join("cifar-10-batches-bin"),
            DatasetName::Mnist => root.join("MNIST").join("raw"),
        }
    }

    /// Where the raw files can be downloaded.
    pub fn source(&self) -> &'static str {
        match self {
            DatasetName::Cifar10 => "https://www.cs.toronto.edu/~kriz/cifar.html",
            DatasetName::Mnist => "http://yann.lecun.com/exdb/mnist/",
        }
    }

    fn normalization(&self) -> Result<Normalize> {
        match self {
            DatasetName::Cifar10 => Normalize::new(&CIFAR10_MEAN, &CIFAR10_STD),
            DatasetName::Mnist => Normalize::new(&MNIST_MEAN, &MNIST_STD),
        }
    }
}

impl fmt::Display for DatasetName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatasetName::Cifar10 => write!(f, "cifar10"),
            DatasetName::Mnist => write!(f, "mnist"),
        }
    }
}

impl FromStr for DatasetName {
    type Err = TrainingError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "cifar10" | "cifar-10" => Ok(DatasetName::Cifar10),
            "mnist" => Ok(DatasetName::Mnist),
            other => Err(TrainingError::unsupported(format!("dataset '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Split {
    #[default]
    Train,
    Test,
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Split::Train => write!(f, "train"),
            Split::Test => write!(f, "test"),
        }
    }
}

/// Augmentation applied before normalization.
#[derive(Debug, Default)]
pub enum Augmentation {
    #[default]
    None,
    /// Random 32px crop with 4px padding, then a random horizontal flip.
    Standard,
    Custom(Vec<Box<dyn Transform>>),
}

impl FromStr for Augmentation {
    type Err = TrainingError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "none" | "" => Ok(Augmentation::None),
            "standard" => Ok(Augmentation::Standard),
            other => Err(TrainingError::unsupported(format!(
                "augmentation '{}' (expected 'none' or 'standard')",
                other
            ))),
        }
    }
}

/// Builds the transform pipeline for `name`, rejecting augmentation the
/// dataset does not support.
pub fn pipeline(name: DatasetName, augmentation: Augmentation) -> Result<Compose> {
    let mut steps: Vec<Box<dyn Transform>> = match (name, augmentation) {
        (_, Augmentation::None) => Vec::new(),
        (DatasetName::Cifar10, Augmentation::Standard) => vec![
            Box::new(RandomCrop::new(32, 4)?),
            Box::new(RandomHorizontalFlip::default()),
        ],
        (DatasetName::Cifar10, Augmentation::Custom(steps)) => steps,
        (DatasetName::Mnist, _) => {
            return Err(TrainingError::unsupported(
                "mnist does not support augmentation",
            ))
        }
    };
    steps.push(Box::new(name.normalization()?));
    Ok(Compose::new(steps))
}

/// In-memory image dataset yielding `(image, label)` with `image` shaped
/// `(channels, height, width)`.
#[derive(Debug)]
pub struct VisionDataset {
    name: DatasetName,
    split: Split,
    images: Tensor,
    labels: Vec<u32>,
    transform: Compose,
    rng: Mutex<StdRng>,
}

impl VisionDataset {
    /// `images` holds one example per row, either flattened or already
    /// `(N, C, H, W)`; `labels` is a 1-D integer tensor.
    pub fn from_tensors(
        name: DatasetName,
        split: Split,
        images: Tensor,
        labels: &Tensor,
        transform: Compose,
        seed: u64,
    ) -> Result<Self> {
        let (channels, height, width) = name.image_shape();
        let count = images.dims().first().copied().unwrap_or(0);
        let per_image = if count == 0 {
            0
        } else {
            images.elem_count() / count
        };
        if count > 0 && per_image != channels * height * width {
            return Err(TrainingError::invalid_argument(format!(
                "{} images must have {}x{}x{} values, got shape {:?}",
                name,
                channels,
                height,
                width,
                images.dims()
            )));
        }
        if labels.rank() != 1 {
            return Err(TrainingError::invalid_argument(format!(
                "labels must be 1-D, got shape {:?}",
                labels.dims()
            )));
        }
        let labels = labels.to_dtype(DType::U32)?.to_vec1::<u32>()?;
        if labels.len() != count {
            return Err(TrainingError::invalid_argument(format!(
                "{} images but {} labels",
                count,
                labels.len()
            )));
        }

        log::debug!(
            "{} {} dataset: {} examples, {} transform steps",
            name,
            split,
            count,
            transform.len()
        );

        Ok(Self {
            name,
            split,
            images: images.to_dtype(DType::F32)?,
            labels,
            transform,
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        })
    }

    pub fn name(&self) -> DatasetName {
        self.name
    }

    pub fn split(&self) -> Split {
        self.split
    }

    pub fn labels(&self) -> &[u32] {
        &self.labels
    }

    pub fn transform(&self) -> &Compose {
        &self.transform
    }
}

impl Dataset for VisionDataset {
    type Item = (Tensor, u32);

    fn len(&self) -> usize {
        self.labels.len()
    }

    fn get(&self, index: usize) -> Result<Self::Item> {
        let label = *self
            .labels
            .get(index)
            .ok_or_else(|| TrainingError::out_of_bounds(index as i64, self.labels.len()))?;
        let image = self.images.get(index)?.reshape(self.name.image_shape())?;
        let mut rng = self
            .rng
            .lock()
            .map_err(|_| TrainingError::runtime("augmentation rng lock poisoned"))?;
        let image = self.transform.apply(&image, &mut rng)?;
        Ok((image, label))
    }
}

/// Loads `name` from `root`, building the pipeline before touching the disk so
/// unsupported combinations fail fast.
pub fn load_dataset(
    name: DatasetName,
    root: &Path,
    split: Split,
    augmentation: Augmentation,
    seed: u64,
) -> Result<VisionDataset> {
    let transform = pipeline(name, augmentation)?;
    let directory = name.directory(root);
    let raw = {
        let _timer = ScopedTimer::new(format!("load {} ({})", name, split));
        let loaded = match name {
            DatasetName::Cifar10 => vision::cifar::load_dir(&directory),
            DatasetName::Mnist => vision::mnist::load_dir(&directory),
        };
        loaded.map_err(|err| {
            TrainingError::runtime(format!(
                "failed to load {} from {}: {err} (download the files from {} into that \
                 directory)",
                name,
                directory.display(),
                name.source()
            ))
        })?
    };

    let (images, labels) = match split {
        Split::Train => (raw.train_images, raw.train_labels),
        Split::Test => (raw.test_images, raw.test_labels),
    };
    VisionDataset::from_tensors(name, split, images, &labels, transform, seed)
}

pub fn cifar10_data(
    root: &Path,
    split: Split,
    augmentation: Augmentation,
    seed: u64,
) -> Result<VisionDataset> {
    load_dataset(DatasetName::Cifar10, root, split, augmentation, seed)
}

/// MNIST has no augmentation presets; anything but [`Augmentation::None`] is rejected.
pub fn mnist_data(
    root: &Path,
    split: Split,
    augmentation: Augmentation,
    seed: u64,
) -> Result<VisionDataset> {
    load_dataset(DatasetName::Mnist, root, split, augmentation, seed)
}

pub fn load_from_config(config: &DataConfig, seed: u64) -> Result<VisionDataset> {
    load_dataset(
        config.dataset,
        &config.root,
        config.split,
        config.augmentation_policy()?,
        seed,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use candle_core::Device;

    fn constant_images(count: usize, shape: (usize, usize, usize), value: f32) -> Tensor {
        let (c, h, w) = shape;
        Tensor::full(value, (count, c * h * w), &Device::Cpu).unwrap()
    }

    #[test]
    fn mnist_rejects_augmentation() {
        let err = pipeline(DatasetName::Mnist, Augmentation::Standard).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedOption);
        let err = mnist_data(Path::new("/nonexistent"), Split::Train, Augmentation::Standard, 0)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedOption);
    }

    #[test]
    fn standard_cifar_pipeline_normalizes_last() {
        let pipeline = pipeline(DatasetName::Cifar10, Augmentation::Standard).unwrap();
        assert_eq!(pipeline.len(), 3);
        assert!(format!("{:?}", pipeline.steps()[0]).contains("RandomCrop"));
        assert!(format!("{:?}", pipeline.steps()[2]).contains("Normalize"));
    }

    #[test]
    fn custom_steps_precede_normalization() {
        let custom: Vec<Box<dyn Transform>> = vec![Box::new(RandomHorizontalFlip::new(1.0).unwrap())];
        let pipeline = pipeline(DatasetName::Cifar10, Augmentation::Custom(custom)).unwrap();
        assert_eq!(pipeline.len(), 2);
        assert!(format!("{:?}", pipeline.steps()[1]).contains("Normalize"));
    }

    #[test]
    fn parses_augmentation_names() {
        assert!(matches!("standard".parse::<Augmentation>(), Ok(Augmentation::Standard)));
        assert!(matches!("none".parse::<Augmentation>(), Ok(Augmentation::None)));
        let err = "autoaugment".parse::<Augmentation>().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedOption);
        assert_eq!("CIFAR10".parse::<DatasetName>().unwrap(), DatasetName::Cifar10);
        assert!("imagenet".parse::<DatasetName>().is_err());
    }

    #[test]
    fn cifar_items_are_normalized_images() {
        let shape = DatasetName::Cifar10.image_shape();
        let labels = Tensor::new(&[3u8, 7], &Device::Cpu).unwrap();
        let dataset = VisionDataset::from_tensors(
            DatasetName::Cifar10,
            Split::Test,
            constant_images(2, shape, 0.5),
            &labels,
            pipeline(DatasetName::Cifar10, Augmentation::None).unwrap(),
            0,
        )
        .unwrap();

        assert_eq!(dataset.len(), 2);
        let (image, label) = dataset.get(1).unwrap();
        assert_eq!(label, 7);
        assert_eq!(image.dims(), &[3, 32, 32]);
        let red = image.get(0).unwrap().get(0).unwrap().get(0).unwrap();
        let expected = (0.5 - CIFAR10_MEAN[0]) / CIFAR10_STD[0];
        assert!((red.to_scalar::<f32>().unwrap() - expected).abs() < 1e-5);
        assert!(dataset.get(2).is_err());
    }

    #[test]
    fn augmented_cifar_keeps_shape_and_is_seeded() {
        let shape = DatasetName::Cifar10.image_shape();
        let labels = Tensor::new(&[0u8], &Device::Cpu).unwrap();
        let images = Tensor::arange(0u32, 3 * 32 * 32, &Device::Cpu)
            .unwrap()
            .to_dtype(DType::F32)
            .unwrap()
            .affine(1.0 / 3072.0, 0.0)
            .unwrap()
            .reshape((1, 3, 32, 32))
            .unwrap();
        let build = || {
            VisionDataset::from_tensors(
                DatasetName::Cifar10,
                Split::Train,
                images.clone(),
                &labels,
                pipeline(DatasetName::Cifar10, Augmentation::Standard).unwrap(),
                9,
            )
            .unwrap()
        };
        let (first, second) = (build(), build());
        for _ in 0..3 {
            let (a, _) = first.get(0).unwrap();
            let (b, _) = second.get(0).unwrap();
            assert_eq!(a.dims(), &[shape.0, shape.1, shape.2]);
            assert_eq!(
                a.flatten_all().unwrap().to_vec1::<f32>().unwrap(),
                b.flatten_all().unwrap().to_vec1::<f32>().unwrap()
            );
        }
    }

    #[test]
    fn rejects_mismatched_tensors() {
        let labels = Tensor::new(&[0u8, 1, 2], &Device::Cpu).unwrap();
        let err = VisionDataset::from_tensors(
            DatasetName::Mnist,
            Split::Train,
            constant_images(2, DatasetName::Mnist.image_shape(), 0.0),
            &labels,
            Compose::default(),
            0,
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);

        let wrong_size = Tensor::zeros((2, 10), DType::F32, &Device::Cpu).unwrap();
        assert!(VisionDataset::from_tensors(
            DatasetName::Mnist,
            Split::Train,
            wrong_size,
            &labels,
            Compose::default(),
            0,
        )
        .is_err());
    }
}

pub mod checkpoint;
mod checks;
pub mod config;
pub mod data;
pub mod error;
pub mod logging;
pub mod loss;
pub mod metrics;
pub mod optimizer;
pub mod seed;

pub use checkpoint::{load_model, save_model, FileRecord, SavedModel, Trial};
pub use config::{DataConfig, ExperimentConfig, RuntimeConfig};
pub use data::{
    transforms::{Compose, Normalize, RandomCrop, RandomHorizontalFlip, Transform},
    vision::{
        cifar10_data, load_dataset, load_from_config, mnist_data, Augmentation, DatasetName,
        Split, VisionDataset,
    },
    random_split, AugmentedDataset, ConcatDataset, Dataset, Subset, TensorDataset,
};
pub use error::{ErrorKind, Result, TrainingError};
pub use logging::ScopedTimer;
pub use loss::{
    label_smoothing, soft_cross_entropy, Reduction, SmoothingTarget, SoftCrossEntropyLoss,
};
pub use metrics::{top_k_accuracy, AverageMeter};
pub use optimizer::adjust_learning_rate;
pub use seed::{seed_all, SeededRngs};

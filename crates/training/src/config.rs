use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use crate::{
    checkpoint::Trial,
    data::vision::{Augmentation, DatasetName, Split},
    Result, TrainingError,
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExperimentConfig {
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default)]
    pub runtime: RuntimeConfig,
}

impl ExperimentConfig {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)?;
        let mut config: ExperimentConfig = match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => serde_json::from_str(&contents)?,
            Some("toml") | Some("tml") | None => toml::from_str(&contents)?,
            Some(other) => {
                return Err(TrainingError::ConfigFormat(format!(
                    "unsupported configuration extension '{}'",
                    other
                )));
            }
        };

        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        config.apply_base_path(base_dir);
        config.validate()?;

        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_path(path)
    }

    pub fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();

        if self.data.root.as_os_str().is_empty() {
            errors.push("data.root must not be empty".to_string());
        }

        match self.data.augmentation_policy() {
            Ok(Augmentation::None) => {}
            Ok(_) if self.data.dataset == DatasetName::Mnist => {
                errors.push("data.augmentation must be 'none' for mnist".to_string());
            }
            Ok(_) => {}
            Err(err) => errors.push(format!("data.augmentation: {}", err)),
        }

        if self.runtime.trial_name.trim().is_empty() {
            errors.push("runtime.trial_name must not be empty".to_string());
        }

        if self.runtime.checkpoint_dir.as_os_str().is_empty() {
            errors.push("runtime.checkpoint_dir must not be empty".to_string());
        }

        if !errors.is_empty() {
            return Err(TrainingError::validation(errors));
        }

        Ok(())
    }

    fn apply_base_path(&mut self, base: &Path) {
        self.data.apply_base_path(base);
        self.runtime.apply_base_path(base);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(default = "default_data_root")]
    pub root: PathBuf,
    #[serde(default)]
    pub dataset: DatasetName,
    #[serde(default = "default_augmentation")]
    pub augmentation: String,
    #[serde(default)]
    pub split: Split,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            root: default_data_root(),
            dataset: DatasetName::default(),
            augmentation: default_augmentation(),
            split: Split::default(),
        }
    }
}

impl DataConfig {
    /// Parses the named augmentation policy (`none` or `standard`).
    pub fn augmentation_policy(&self) -> Result<Augmentation> {
        Augmentation::from_str(&self.augmentation)
    }

    fn apply_base_path(&mut self, base: &Path) {
        expand_home_in_place(&mut self.root);
        absolutize_in_place(&mut self.root, base);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default = "default_seed")]
    pub seed: u64,
    #[serde(default = "default_trial_name")]
    pub trial_name: String,
    #[serde(default = "default_checkpoint_dir")]
    pub checkpoint_dir: PathBuf,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            seed: default_seed(),
            trial_name: default_trial_name(),
            checkpoint_dir: default_checkpoint_dir(),
        }
    }
}

impl RuntimeConfig {
    /// Trial rooted at `checkpoint_dir/trial_name`.
    pub fn trial(&self, iteration: u64) -> Trial {
        Trial::new(
            self.trial_name.clone(),
            iteration,
            self.checkpoint_dir.join(&self.trial_name),
        )
    }

    fn apply_base_path(&mut self, base: &Path) {
        expand_home_in_place(&mut self.checkpoint_dir);
        absolutize_in_place(&mut self.checkpoint_dir, base);
    }
}

fn absolutize_in_place(path: &mut PathBuf, base: &Path) {
    if path.is_relative() {
        *path = base.join(&*path);
    }
}

fn expand_home_in_place(path: &mut PathBuf) {
    let Ok(rest) = path.strip_prefix("~") else {
        return;
    };
    if let Some(home) = std::env::var_os("HOME") {
        *path = PathBuf::from(home).join(rest);
    }
}

fn default_data_root() -> PathBuf {
    PathBuf::from("~/data")
}

fn default_augmentation() -> String {
    "none".to_string()
}

fn default_seed() -> u64 {
    42
}

fn default_trial_name() -> String {
    "default".to_string()
}

fn default_checkpoint_dir() -> PathBuf {
    PathBuf::from("checkpoints")
}

use std::{
    fs::{self, File},
    io::{Read, Write},
    path::{Path, PathBuf},
};

use candle_nn::VarMap;
use hex::encode as hex_encode;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{logging::ScopedTimer, Result, TrainingError};

const WEIGHTS_EXTENSION: &str = "safetensors";
const RECORD_EXTENSION: &str = "json";

/// A named run at a given iteration; owns the directory its artifacts live in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trial {
    name: String,
    iteration: u64,
    directory: PathBuf,
}

impl Trial {
    pub fn new(name: impl Into<String>, iteration: u64, directory: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            iteration,
            directory: directory.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn iteration(&self) -> u64 {
        self.iteration
    }

    pub fn set_iteration(&mut self, iteration: u64) {
        self.iteration = iteration;
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn file_path(&self, filename: &str) -> PathBuf {
        self.directory.join(filename)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub filename: String,
    pub sha256: String,
    pub bytes: u64,
    pub trial: String,
    pub iteration: u64,
}

#[derive(Debug, Clone)]
pub struct SavedModel {
    pub weights_path: PathBuf,
    pub record: FileRecord,
}

/// Serializes every variable in `model` to `model_{name}.safetensors` inside
/// the trial directory, next to a JSON record holding its checksum.
pub fn save_model(trial: &Trial, name: &str, model: &VarMap) -> Result<SavedModel> {
    let (weights_path, record_path) = model_paths(trial, name)?;
    let _timer = ScopedTimer::new(format!(
        "save model ({}) for {}:{}",
        name, trial.name, trial.iteration
    ));

    if model.all_vars().is_empty() {
        return Err(TrainingError::invalid_argument(
            "model contains no parameters to save",
        ));
    }

    fs::create_dir_all(&trial.directory).map_err(|err| {
        TrainingError::runtime(format!(
            "failed to create trial directory {}: {err}",
            trial.directory.display()
        ))
    })?;

    model.save(&weights_path).map_err(|err| {
        TrainingError::runtime(format!(
            "failed to serialize model weights to {}: {err}",
            weights_path.display()
        ))
    })?;

    let record = file_record(&weights_path, trial)?;
    write_json(&record_path, &record)?;

    Ok(SavedModel {
        weights_path,
        record,
    })
}

/// Loads weights written by [`save_model`] into the variables already
/// registered in `model`, after checking the stored checksum.
pub fn load_model(trial: &Trial, name: &str, model: &mut VarMap) -> Result<FileRecord> {
    let (weights_path, record_path) = model_paths(trial, name)?;
    let _timer = ScopedTimer::new(format!(
        "load model ({}) for {}:{}",
        name, trial.name, trial.iteration
    ));

    let record: FileRecord = read_json(&record_path)?;
    let actual = sha256_file(&weights_path)?;
    if actual != record.sha256 {
        return Err(TrainingError::runtime(format!(
            "model file {} failed checksum validation",
            weights_path.display()
        )));
    }

    model.load(&weights_path).map_err(|err| {
        TrainingError::runtime(format!(
            "failed to load model weights from {}: {err}",
            weights_path.display()
        ))
    })?;
    Ok(record)
}

fn model_paths(trial: &Trial, name: &str) -> Result<(PathBuf, PathBuf)> {
    if name.trim().is_empty() {
        return Err(TrainingError::invalid_argument("model name must not be empty"));
    }
    let stem = format!("model_{}", name);
    Ok((
        trial.file_path(&format!("{stem}.{WEIGHTS_EXTENSION}")),
        trial.file_path(&format!("{stem}.{RECORD_EXTENSION}")),
    ))
}

fn file_record(path: &Path, trial: &Trial) -> Result<FileRecord> {
    let sha = sha256_file(path)?;
    let bytes = path
        .metadata()
        .map_err(|err| {
            TrainingError::runtime(format!(
                "failed to stat model file {}: {err}",
                path.display()
            ))
        })?
        .len();
    let filename = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| {
            TrainingError::runtime(format!(
                "model file name is not valid UTF-8: {}",
                path.display()
            ))
        })?
        .to_string();
    Ok(FileRecord {
        filename,
        sha256: sha,
        bytes,
        trial: trial.name.clone(),
        iteration: trial.iteration,
    })
}

fn sha256_file(path: &Path) -> Result<String> {
    let mut file = File::open(path).map_err(|err| {
        TrainingError::runtime(format!("failed to open {}: {err}", path.display()))
    })?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 64 * 1024];
    loop {
        let read = file.read(&mut buffer).map_err(|err| {
            TrainingError::runtime(format!("failed to read {}: {err}", path.display()))
        })?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(hex_encode(hasher.finalize()))
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut file = File::create(path).map_err(|err| {
        TrainingError::runtime(format!("failed to create {}: {err}", path.display()))
    })?;
    let data = serde_json::to_vec_pretty(value)
        .map_err(|err| TrainingError::runtime(format!("failed to serialize JSON: {err}")))?;
    file.write_all(&data)
        .and_then(|_| file.write_all(b"\n"))
        .map_err(|err| TrainingError::runtime(format!("failed to write {}: {err}", path.display())))
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T> {
    let file = File::open(path).map_err(|err| {
        TrainingError::runtime(format!("failed to open {}: {err}", path.display()))
    })?;
    serde_json::from_reader(file).map_err(|err| {
        TrainingError::runtime(format!("failed to parse JSON {}: {err}", path.display()))
    })
}

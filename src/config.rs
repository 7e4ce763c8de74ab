//! Configuration structures for the attrswap training driver
//!
//! A [`Config`] is assembled from an optional JSON/YAML file and then
//! overridden by command line flags. Every section has defaults so that a
//! partial file is enough.

use std::path::{Path, PathBuf};

use candle_core::Device;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::models::ModelComponent;
use crate::training::checkpoints::RetentionPolicy;
use crate::training::phase::TrainingPhase;

/// Main training configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Data sources and loader settings
    pub data: DataConfig,
    /// Model architecture settings
    pub model: ModelConfig,
    /// Optimizer settings
    pub optimizer: OptimizerConfig,
    /// Epoch loop and loss weighting
    pub training: TrainingParams,
    /// Checkpoint, resume and output directory settings
    pub checkpointing: CheckpointingConfig,
    /// Runtime configuration
    pub runtime: RuntimeConfig,
}

/// Data configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// JSON file listing image pairs
    pub pair_file: PathBuf,
    /// CelebA-style attribute annotation file
    pub annotation_file: PathBuf,
    /// Directory holding the images named in the annotation file
    pub image_dir: PathBuf,
    /// Number of attributes per image
    pub attribute_count: usize,
    /// Explicit attribute names; the first `attribute_count` columns are used when absent
    pub attributes: Option<Vec<String>>,
    /// Square side length images are resized to
    pub image_size: usize,
    /// Fraction of pairs used for training, the rest is validation
    pub train_fraction: f64,
    /// Worker threads used to decode a batch
    pub num_workers: usize,
    /// Shuffle batches each epoch
    pub shuffle: bool,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            pair_file: PathBuf::from("pairs.json"),
            annotation_file: PathBuf::from("list_attr_celeba.txt"),
            image_dir: PathBuf::from("img_align_celeba"),
            attribute_count: 5,
            attributes: None,
            image_size: 128,
            train_fraction: 0.8,
            num_workers: num_cpus::get().min(8),
            shuffle: true,
        }
    }
}

/// Model configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Channel count of the first convolution; the latent has twice as many
    pub base_channels: usize,
    /// Classifier dropout probability, only applied in training mode
    pub dropout: f32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            base_channels: 32,
            dropout: 0.1,
        }
    }
}

/// Optimizer configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    /// Base learning rate
    pub learning_rate: f64,
    /// Weight decay coefficient
    pub weight_decay: f64,
    /// Adam beta1
    pub beta1: f64,
    /// Adam beta2
    pub beta2: f64,
    /// Adam epsilon
    pub eps: f64,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            learning_rate: 1e-4,
            weight_decay: 0.0,
            beta1: 0.9,
            beta2: 0.999,
            eps: 1e-8,
        }
    }
}

/// Training parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingParams {
    /// Total number of epochs; the loop runs `[start_epoch, epochs)`
    pub epochs: usize,
    /// Batch size for both phases
    pub batch_size: usize,
    /// Reconstruction loss weight
    pub alpha: f64,
    /// Classification loss weight
    pub beta: f64,
    /// Which components the optimizer updates
    pub phase: TrainingPhase,
    /// Seed for the pair split and batch shuffling
    pub seed: u64,
}

impl Default for TrainingParams {
    fn default() -> Self {
        Self {
            epochs: 20,
            batch_size: 32,
            alpha: 1.0,
            beta: 0.1,
            phase: TrainingPhase::default(),
            seed: 42,
        }
    }
}

/// Checkpointing configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckpointingConfig {
    /// Output directory for logs and checkpoints
    pub save_dir: PathBuf,
    /// Checkpoint every N epochs, epoch 0 included
    pub save_every: usize,
    /// How many checkpoint files to keep
    #[serde(with = "serde_yaml::with::singleton_map")]
    pub retention: RetentionPolicy,
    /// Checkpoint to resume from
    pub resume_from: Option<PathBuf>,
    /// Components whose parameters are restored on resume
    pub restore: Vec<ModelComponent>,
    /// Remove previous logs and checkpoints before starting
    pub clean: bool,
}

impl Default for CheckpointingConfig {
    fn default() -> Self {
        Self {
            save_dir: PathBuf::from("save"),
            save_every: 5,
            retention: RetentionPolicy::KeepAll,
            resume_from: None,
            restore: vec![ModelComponent::Classifier],
            clean: false,
        }
    }
}

/// Runtime configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Compute device
    #[serde(with = "serde_yaml::with::singleton_map")]
    pub device: DeviceType,
}

/// Compute device selection
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceType {
    /// CUDA device 0 when compiled in and present, CPU otherwise
    #[default]
    Auto,
    /// Always CPU
    Cpu,
    /// A specific CUDA ordinal
    Cuda(usize),
    /// Apple Metal device 0
    Metal,
}

impl DeviceType {
    /// Resolve to a candle device
    pub fn to_device(&self) -> Result<Device> {
        let device = match self {
            Self::Auto => Device::cuda_if_available(0)?,
            Self::Cpu => Device::Cpu,
            Self::Cuda(ordinal) => Device::new_cuda(*ordinal)?,
            Self::Metal => Device::new_metal(0)?,
        };
        Ok(device)
    }
}

impl std::str::FromStr for DeviceType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "cpu" => Ok(Self::Cpu),
            "metal" => Ok(Self::Metal),
            "cuda" => Ok(Self::Cuda(0)),
            other => match other.strip_prefix("cuda:") {
                Some(ordinal) => ordinal
                    .parse()
                    .map(Self::Cuda)
                    .map_err(|_| Error::config(format!("invalid CUDA ordinal in '{s}'"))),
                None => Err(Error::config(format!("unknown device '{s}'"))),
            },
        }
    }
}

fn is_json(path: &Path) -> bool {
    path.extension().and_then(|s| s.to_str()) == Some("json")
}

impl Config {
    /// Load configuration from a JSON or YAML file (chosen by extension)
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;

        let config: Self = if is_json(path) {
            serde_json::from_str(&content)?
        } else {
            serde_yaml::from_str(&content)?
        };

        debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Save configuration to a JSON or YAML file (chosen by extension)
    pub fn to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = if is_json(path) {
            serde_json::to_string_pretty(self)?
        } else {
            serde_yaml::to_string(self)?
        };

        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.training.epochs == 0 {
            return Err(Error::config("Number of epochs must be greater than 0"));
        }

        if self.training.batch_size == 0 {
            return Err(Error::config("Batch size must be greater than 0"));
        }

        if self.optimizer.learning_rate <= 0.0 {
            return Err(Error::config("Learning rate must be positive"));
        }

        if self.optimizer.weight_decay < 0.0 {
            return Err(Error::config("Weight decay must be non-negative"));
        }

        if self.checkpointing.save_every == 0 {
            return Err(Error::config("save_every must be greater than 0"));
        }

        if let RetentionPolicy::KeepLast(0) = self.checkpointing.retention {
            return Err(Error::config("Retention must keep at least one checkpoint"));
        }

        if self.data.attribute_count == 0 {
            return Err(Error::config("Attribute count must be greater than 0"));
        }

        if let Some(names) = &self.data.attributes {
            if names.len() != self.data.attribute_count {
                return Err(Error::config(format!(
                    "{} attribute names given but attribute_count is {}",
                    names.len(),
                    self.data.attribute_count
                )));
            }
        }

        if self.data.image_size == 0 || self.data.image_size % 4 != 0 {
            return Err(Error::config("Image size must be a positive multiple of 4"));
        }

        if !(self.data.train_fraction > 0.0 && self.data.train_fraction < 1.0) {
            return Err(Error::config("Train fraction must be in (0.0, 1.0)"));
        }

        if self.model.base_channels == 0 {
            return Err(Error::config("Base channel count must be greater than 0"));
        }

        if !(0.0..1.0).contains(&self.model.dropout) {
            return Err(Error::config("Dropout must be in [0.0, 1.0)"));
        }

        Ok(())
    }

    /// Path of the append-only training log
    pub fn train_log_path(&self) -> PathBuf {
        self.checkpointing.save_dir.join("train.log")
    }

    /// Path of the append-only validation log
    pub fn val_log_path(&self) -> PathBuf {
        self.checkpointing.save_dir.join("val.log")
    }

    /// Auxiliary log directory, holds the configuration snapshot
    pub fn log_dir(&self) -> PathBuf {
        self.checkpointing.save_dir.join("log")
    }
}

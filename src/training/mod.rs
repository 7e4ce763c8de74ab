//! Training infrastructure for the attribute-swap model
//!
//! # Main Components
//!
//! - **Data**: annotation parsing, pair lists, image decoding and batching
//! - **Loss**: latent, reconstruction and classification terms and their composite
//! - **Metrics**: running averages, PSNR and the append-only epoch logs
//! - **Checkpoints**: safetensors snapshots with retention and partial restore
//! - **Trainer**: the epoch driver tying everything together
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use attrswap::training::{DataLoader, DataLoaderConfig, Trainer};
//! use attrswap::Config;
//!
//! let config = Config::from_file("train.yaml")?;
//! let device = config.runtime.device.to_device()?;
//! let mut trainer = Trainer::new(config, device)?;
//! let result = trainer.train(&train_loader, &val_loader)?;
//! ```

pub mod checkpoints;
pub mod data;
pub mod loss;
pub mod metrics;
pub mod phase;
pub mod progress;
pub mod trainer;

#[cfg(test)]
mod tests;

pub use checkpoints::{CheckpointInfo, CheckpointManager, RetentionPolicy};
pub use data::{
    AttributeSelection, AttributeTable, CelebAPairs, DataLoader, DataLoaderConfig, ImageRef,
    PairBatch, PairDataset, PairList, PairSample,
};
pub use loss::{BatchLosses, LossValues, LossWeights};
pub use metrics::{psnr, AverageMeter, LossMeters, RunLog, TrainRecord, ValidationRecord};
pub use phase::TrainingPhase;
pub use progress::ProgressBar;
pub use trainer::{clean_outputs, DriverState, Trainer, TrainingResult};

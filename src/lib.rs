//! attrswap - training driver for attribute-swapping autoencoders
//!
//! An encoder maps a face image to a latent; a decoder rebuilds an image from
//! a latent plus a binary attribute vector; a classifier predicts the
//! attributes of an image. Training on image pairs pushes the latent to keep
//! identity while the attribute vector controls the swappable features.

#![warn(missing_docs)]
#![warn(rustdoc::broken_intra_doc_links)]

pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod training;

// Re-exports
pub use config::{Config, DeviceType};
pub use error::{Error, Result};
pub use models::{AttributeSwapModel, ModelComponent};
pub use training::{CheckpointManager, DataLoader, Trainer, TrainingPhase};

use std::path::Path;
use std::sync::Arc;

use tracing::info;

use training::data::{AttributeSelection, AttributeTable, CelebAPairs, DataLoaderConfig, PairList};

/// Training and validation loaders built from a configuration
pub struct Loaders {
    /// Training pairs
    pub train: DataLoader<CelebAPairs>,
    /// Validation pairs
    pub val: DataLoader<CelebAPairs>,
}

impl Loaders {
    /// Read the annotation and pair files, split the pairs and wrap both halves
    /// in loaders sharing the worker count.
    pub fn from_config(config: &Config) -> Result<Self> {
        let data = &config.data;
        let selection = AttributeSelection::from_config(data.attribute_count, data.attributes.as_deref());
        let table = Arc::new(AttributeTable::from_file(&data.annotation_file, &selection)?);
        let (train_pairs, val_pairs) =
            PairList::from_file(&data.pair_file)?.split(data.train_fraction, config.training.seed);

        let loader_config = DataLoaderConfig {
            batch_size: config.training.batch_size,
            shuffle: data.shuffle,
            num_workers: data.num_workers,
            seed: config.training.seed,
        };
        let train = DataLoader::new(
            Arc::new(CelebAPairs::new(train_pairs, table.clone(), &data.image_dir, data.image_size)?),
            loader_config.clone(),
        )?;
        let val = DataLoader::new(
            Arc::new(CelebAPairs::new(val_pairs, table, &data.image_dir, data.image_size)?),
            loader_config,
        )?;

        info!(
            "Split {} pairs into {} training / {} validation",
            train.dataset_size() + val.dataset_size(),
            train.dataset_size(),
            val.dataset_size()
        );
        Ok(Self { train, val })
    }
}

/// Load a configuration file, then validate it
pub fn load_config(path: impl AsRef<Path>) -> Result<Config> {
    let config = Config::from_file(path)?;
    config.validate()?;
    Ok(config)
}

//! Test fixtures for setting up common test scenarios

use std::sync::Arc;

use anyhow::Result;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tempfile::TempDir;

use crate::config::Config;
use crate::training::data::{DataLoader, DataLoaderConfig, PairDataset, PairSample};
use crate::training::progress::ProgressBar;
use crate::training::trainer::Trainer;
use crate::Error;

use super::test_utils::{create_test_config, create_test_device};

/// In-memory pairs of random images with alternating attribute patterns
pub struct SyntheticPairs {
    samples: Vec<PairSample>,
    image_size: usize,
    attribute_count: usize,
}

impl SyntheticPairs {
    /// `len` pairs of `image_size` squared RGB images
    pub fn new(len: usize, image_size: usize, attribute_count: usize, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let image_len = 3 * image_size * image_size;
        let samples = (0..len)
            .map(|i| {
                let mut image = || -> Vec<f32> { (0..image_len).map(|_| rng.random::<f32>()).collect() };
                let attrs = |offset: usize| -> Vec<f32> {
                    (0..attribute_count)
                        .map(|a| ((i + a + offset) % 2) as f32)
                        .collect()
                };
                PairSample {
                    image_a: image(),
                    image_b: image(),
                    attrs_a: attrs(0),
                    attrs_b: attrs(1),
                }
            })
            .collect();
        Self {
            samples,
            image_size,
            attribute_count,
        }
    }
}

impl PairDataset for SyntheticPairs {
    fn len(&self) -> usize {
        self.samples.len()
    }

    fn get(&self, index: usize) -> crate::Result<PairSample> {
        self.samples
            .get(index)
            .cloned()
            .ok_or_else(|| Error::data(format!("synthetic index {index} out of range")))
    }

    fn image_shape(&self) -> (usize, usize, usize) {
        (3, self.image_size, self.image_size)
    }

    fn attribute_count(&self) -> usize {
        self.attribute_count
    }
}

/// Configuration, temp directory and loaders for a small training run
pub struct TrainingTestFixture {
    pub config: Config,
    pub temp_dir: TempDir,
    pub train_loader: DataLoader<SyntheticPairs>,
    pub val_loader: DataLoader<SyntheticPairs>,
}

impl TrainingTestFixture {
    /// Four training pairs and two validation pairs, batch size 2
    pub fn new() -> Result<Self> {
        Self::with_sizes(4, 2)
    }

    /// Custom dataset sizes
    pub fn with_sizes(train_len: usize, val_len: usize) -> Result<Self> {
        let temp_dir = tempfile::tempdir()?;
        let config = create_test_config(&temp_dir.path().join("save"));
        let size = config.data.image_size;
        let attrs = config.data.attribute_count;

        let loader_config = DataLoaderConfig {
            batch_size: config.training.batch_size,
            shuffle: true,
            num_workers: 1,
            seed: config.training.seed,
        };
        let train_loader = DataLoader::new(
            Arc::new(SyntheticPairs::new(train_len, size, attrs, 1)),
            loader_config.clone(),
        )?;
        let val_loader = DataLoader::new(
            Arc::new(SyntheticPairs::new(val_len, size, attrs, 2)),
            DataLoaderConfig {
                shuffle: false,
                ..loader_config
            },
        )?;

        Ok(Self {
            config,
            temp_dir,
            train_loader,
            val_loader,
        })
    }

    /// Trainer over the fixture configuration with a silent progress bar
    pub fn trainer(&self) -> Result<Trainer> {
        Ok(Trainer::new(self.config.clone(), create_test_device())?.with_progress(ProgressBar::hidden()))
    }
}

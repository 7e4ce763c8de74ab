//! Batch loader: per-epoch shuffled index plans and parallel decoding

use std::sync::Arc;

use candle_core::{Device, Tensor};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{PairBatch, PairDataset, PairSample};
use crate::error::{Error, Result};

/// Configuration for [`DataLoader`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataLoaderConfig {
    /// Batch size
    pub batch_size: usize,
    /// Whether to shuffle data every epoch
    pub shuffle: bool,
    /// Number of threads decoding samples of one batch
    pub num_workers: usize,
    /// Base seed; epoch `e` shuffles with `seed + e`
    pub seed: u64,
}

impl Default for DataLoaderConfig {
    fn default() -> Self {
        Self {
            batch_size: 32,
            shuffle: true,
            num_workers: 4,
            seed: 0,
        }
    }
}

/// Groups pairs of a [`PairDataset`] into device batches
pub struct DataLoader<D: PairDataset> {
    dataset: Arc<D>,
    config: DataLoaderConfig,
    pool: ThreadPool,
}

impl<D: PairDataset> DataLoader<D> {
    /// Create a loader with its own worker pool
    pub fn new(dataset: Arc<D>, config: DataLoaderConfig) -> Result<Self> {
        if config.batch_size == 0 {
            return Err(Error::data("batch size must be greater than 0"));
        }
        let pool = ThreadPoolBuilder::new()
            .num_threads(config.num_workers.max(1))
            .thread_name(|i| format!("attrswap-loader-{i}"))
            .build()
            .map_err(|e| Error::data(format!("cannot start loader threads: {e}")))?;

        info!(
            "Creating DataLoader with batch_size={}, num_workers={}, shuffle={}",
            config.batch_size, config.num_workers, config.shuffle
        );

        Ok(Self {
            dataset,
            config,
            pool,
        })
    }

    /// Number of batches per epoch, the last one may be short
    pub fn num_batches(&self) -> usize {
        self.dataset.len().div_ceil(self.config.batch_size)
    }

    /// Number of pairs
    pub fn dataset_size(&self) -> usize {
        self.dataset.len()
    }

    /// Loader configuration
    pub fn config(&self) -> &DataLoaderConfig {
        &self.config
    }

    /// Index lists of every batch of `epoch`, reproducible from the seed
    pub fn epoch_plan(&self, epoch: usize) -> Vec<Vec<usize>> {
        let mut indices: Vec<usize> = (0..self.dataset.len()).collect();
        if self.config.shuffle {
            let mut rng = StdRng::seed_from_u64(self.config.seed.wrapping_add(epoch as u64));
            indices.shuffle(&mut rng);
            debug!("Shuffled {} indices for epoch {}", indices.len(), epoch);
        }
        indices
            .chunks(self.config.batch_size)
            .map(|chunk| chunk.to_vec())
            .collect()
    }

    /// Decode the given pairs in parallel and collate them on `device`
    pub fn load_batch(&self, indices: &[usize], device: &Device) -> Result<PairBatch> {
        if indices.is_empty() {
            return Err(Error::data("cannot load an empty batch"));
        }
        let dataset = &self.dataset;
        let samples: Vec<PairSample> = self
            .pool
            .install(|| indices.par_iter().map(|&i| dataset.get(i)).collect::<Result<_>>())?;

        collate(
            &samples,
            self.dataset.image_shape(),
            self.dataset.attribute_count(),
            device,
        )
    }
}

/// Stack host samples into `[B, C, H, W]` images and `[B, A]` attributes
pub fn collate(
    samples: &[PairSample],
    (c, h, w): (usize, usize, usize),
    attribute_count: usize,
    device: &Device,
) -> Result<PairBatch> {
    let b = samples.len();
    let image_len = c * h * w;

    let mut image_a = Vec::with_capacity(b * image_len);
    let mut image_b = Vec::with_capacity(b * image_len);
    let mut attrs_a = Vec::with_capacity(b * attribute_count);
    let mut attrs_b = Vec::with_capacity(b * attribute_count);

    for sample in samples {
        if sample.image_a.len() != image_len || sample.image_b.len() != image_len {
            return Err(Error::data(format!(
                "sample image has {} values, expected {image_len}",
                sample.image_a.len().max(sample.image_b.len())
            )));
        }
        if sample.attrs_a.len() != attribute_count || sample.attrs_b.len() != attribute_count {
            return Err(Error::data(format!(
                "sample has {} attributes, expected {attribute_count}",
                sample.attrs_a.len()
            )));
        }
        image_a.extend_from_slice(&sample.image_a);
        image_b.extend_from_slice(&sample.image_b);
        attrs_a.extend_from_slice(&sample.attrs_a);
        attrs_b.extend_from_slice(&sample.attrs_b);
    }

    Ok(PairBatch {
        image_a: Tensor::from_vec(image_a, (b, c, h, w), device)?,
        image_b: Tensor::from_vec(image_b, (b, c, h, w), device)?,
        attrs_a: Tensor::from_vec(attrs_a, (b, attribute_count), device)?,
        attrs_b: Tensor::from_vec(attrs_b, (b, attribute_count), device)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Counting(usize);

    impl PairDataset for Counting {
        fn len(&self) -> usize {
            self.0
        }

        fn get(&self, index: usize) -> Result<PairSample> {
            let v = index as f32;
            Ok(PairSample {
                image_a: vec![v; 3 * 2 * 2],
                image_b: vec![-v; 3 * 2 * 2],
                attrs_a: vec![v, 0.0],
                attrs_b: vec![0.0, v],
            })
        }

        fn image_shape(&self) -> (usize, usize, usize) {
            (3, 2, 2)
        }

        fn attribute_count(&self) -> usize {
            2
        }
    }

    fn loader(len: usize, shuffle: bool) -> DataLoader<Counting> {
        let config = DataLoaderConfig {
            batch_size: 4,
            shuffle,
            num_workers: 2,
            seed: 3,
        };
        DataLoader::new(Arc::new(Counting(len)), config).unwrap()
    }

    #[test]
    fn test_plan_covers_every_index_once() {
        let loader = loader(10, true);
        assert_eq!(loader.num_batches(), 3);

        let plan = loader.epoch_plan(0);
        assert_eq!(plan.iter().map(Vec::len).collect::<Vec<_>>(), vec![4, 4, 2]);

        let mut seen: Vec<usize> = plan.into_iter().flatten().collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn test_plan_is_reproducible_per_epoch() {
        let loader = loader(32, true);
        assert_eq!(loader.epoch_plan(1), loader.epoch_plan(1));
        assert_ne!(loader.epoch_plan(1), loader.epoch_plan(2));
    }

    #[test]
    fn test_unshuffled_plan_is_sequential() {
        let loader = loader(5, false);
        assert_eq!(loader.epoch_plan(7), vec![vec![0, 1, 2, 3], vec![4]]);
    }

    #[test]
    fn test_load_batch_keeps_index_order() -> Result<()> {
        let loader = loader(10, false);
        let batch = loader.load_batch(&[5, 2], &Device::Cpu)?;

        assert_eq!(batch.len(), 2);
        assert_eq!(batch.image_a.dims(), &[2, 3, 2, 2]);
        assert_eq!(
            batch.attrs_a.to_vec2::<f32>()?,
            vec![vec![5.0, 0.0], vec![2.0, 0.0]]
        );
        assert_eq!(
            batch.attrs_b.to_vec2::<f32>()?,
            vec![vec![0.0, 5.0], vec![0.0, 2.0]]
        );
        Ok(())
    }

    #[test]
    fn test_collate_rejects_wrong_sizes() {
        let sample = PairSample {
            image_a: vec![0.0; 4],
            image_b: vec![0.0; 4],
            attrs_a: vec![1.0],
            attrs_b: vec![1.0],
        };
        assert!(collate(&[sample], (3, 2, 2), 1, &Device::Cpu).is_err());
    }

    #[test]
    fn test_zero_batch_size_is_rejected() {
        let config = DataLoaderConfig {
            batch_size: 0,
            ..DataLoaderConfig::default()
        };
        assert!(DataLoader::new(Arc::new(Counting(3)), config).is_err());
    }
}

//! Data loading for paired attribute-swap training
//!
//! A [`PairDataset`] yields [`PairSample`]s (two CHW images and their
//! attribute vectors); a [`DataLoader`] groups them into [`PairBatch`]
//! tensors on the compute device.

pub mod annotations;
pub mod datasets;
pub mod loaders;

pub use annotations::{AttributeSelection, AttributeTable};
pub use datasets::{CelebAPairs, ImageRef, PairList};
pub use loaders::{DataLoader, DataLoaderConfig};

use candle_core::Tensor;

use crate::error::Result;

/// One pair of images with their attribute vectors, host side
#[derive(Debug, Clone, PartialEq)]
pub struct PairSample {
    /// First image, CHW, values in `[0, 1]`
    pub image_a: Vec<f32>,
    /// Second image, CHW, values in `[0, 1]`
    pub image_b: Vec<f32>,
    /// Attributes of the first image
    pub attrs_a: Vec<f32>,
    /// Attributes of the second image
    pub attrs_b: Vec<f32>,
}

/// A collated batch on the compute device
#[derive(Debug, Clone)]
pub struct PairBatch {
    /// `[B, C, H, W]`
    pub image_a: Tensor,
    /// `[B, C, H, W]`
    pub image_b: Tensor,
    /// `[B, A]`
    pub attrs_a: Tensor,
    /// `[B, A]`
    pub attrs_b: Tensor,
}

impl PairBatch {
    /// Number of pairs in the batch
    pub fn len(&self) -> usize {
        self.image_a.dims().first().copied().unwrap_or(0)
    }

    /// Whether the batch holds no pairs
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Random-access source of image pairs
pub trait PairDataset: Send + Sync {
    /// Number of pairs
    fn len(&self) -> usize;

    /// Whether the dataset holds no pairs
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Load pair `index`
    fn get(&self, index: usize) -> Result<PairSample>;

    /// `(channels, height, width)` of every image
    fn image_shape(&self) -> (usize, usize, usize);

    /// Length of every attribute vector
    fn attribute_count(&self) -> usize;
}

//! Pair lists and the image-backed pair dataset

use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::imageops::FilterType;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::annotations::AttributeTable;
use super::{PairDataset, PairSample};
use crate::error::{Error, Result};

/// Reference to one image: its filename or its row in the attribute table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ImageRef {
    /// Row index into the annotation file
    Row(usize),
    /// Filename as written in the annotation file
    Name(String),
}

/// Ordered list of image pairs
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PairList {
    pairs: Vec<(ImageRef, ImageRef)>,
}

impl PairList {
    /// Wrap existing pairs
    pub fn new(pairs: Vec<(ImageRef, ImageRef)>) -> Self {
        Self { pairs }
    }

    /// Load a JSON array of two-element arrays
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::data(format!("cannot read pair file '{}': {e}", path.display()))
        })?;
        let list: Self = serde_json::from_str(&content)?;
        info!("Loaded {} pairs from {}", list.len(), path.display());
        Ok(list)
    }

    /// Number of pairs
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Whether the list is empty
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// All pairs
    pub fn pairs(&self) -> &[(ImageRef, ImageRef)] {
        &self.pairs
    }

    /// Shuffle with `seed`, then split into `(train, validation)` at
    /// `floor(train_fraction * len)`.
    pub fn split(mut self, train_fraction: f64, seed: u64) -> (PairList, PairList) {
        let mut rng = StdRng::seed_from_u64(seed);
        self.pairs.shuffle(&mut rng);

        let cut = ((train_fraction * self.pairs.len() as f64) as usize).min(self.pairs.len());
        let val = self.pairs.split_off(cut);
        (self, PairList { pairs: val })
    }
}

/// Pairs of annotated images read from disk
pub struct CelebAPairs {
    pairs: Vec<(ImageRef, ImageRef)>,
    annotations: Arc<AttributeTable>,
    image_dir: PathBuf,
    image_size: usize,
}

impl CelebAPairs {
    /// Dataset over `pairs`, resizing every image to `image_size` squared.
    ///
    /// Every pair reference is resolved up front so a bad pair file fails at
    /// startup rather than mid-epoch.
    pub fn new(
        pairs: PairList,
        annotations: Arc<AttributeTable>,
        image_dir: impl Into<PathBuf>,
        image_size: usize,
    ) -> Result<Self> {
        for (a, b) in pairs.pairs() {
            resolve(&annotations, a)?;
            resolve(&annotations, b)?;
        }
        Ok(Self {
            pairs: pairs.pairs,
            annotations,
            image_dir: image_dir.into(),
            image_size,
        })
    }

    fn load_image(&self, filename: &str) -> Result<Vec<f32>> {
        let path = self.image_dir.join(filename);
        let img = image::open(&path).map_err(|e| {
            Error::data(format!("cannot load image '{}': {e}", path.display()))
        })?;
        let side = self.image_size as u32;
        let rgb = img.resize_exact(side, side, FilterType::Triangle).to_rgb8();

        // HWC bytes to CHW floats in [0, 1]
        let plane = self.image_size * self.image_size;
        let mut chw = vec![0f32; 3 * plane];
        for (i, pixel) in rgb.pixels().enumerate() {
            for (c, value) in pixel.0.iter().enumerate() {
                chw[c * plane + i] = *value as f32 / 255.0;
            }
        }
        Ok(chw)
    }
}

fn resolve<'a>(table: &'a AttributeTable, image: &'a ImageRef) -> Result<(&'a str, &'a [f32])> {
    match image {
        ImageRef::Row(row) => table
            .by_row(*row)
            .ok_or_else(|| Error::data(format!("pair references missing annotation row {row}"))),
        ImageRef::Name(name) => table
            .by_name(name)
            .map(|attrs| (name.as_str(), attrs))
            .ok_or_else(|| Error::data(format!("image '{name}' has no annotation"))),
    }
}

impl PairDataset for CelebAPairs {
    fn len(&self) -> usize {
        self.pairs.len()
    }

    fn get(&self, index: usize) -> Result<PairSample> {
        let (a, b) = self
            .pairs
            .get(index)
            .ok_or_else(|| Error::data(format!("pair index {index} out of range")))?;
        let (name_a, attrs_a) = resolve(&self.annotations, a)?;
        let (name_b, attrs_b) = resolve(&self.annotations, b)?;

        Ok(PairSample {
            image_a: self.load_image(name_a)?,
            image_b: self.load_image(name_b)?,
            attrs_a: attrs_a.to_vec(),
            attrs_b: attrs_b.to_vec(),
        })
    }

    fn image_shape(&self) -> (usize, usize, usize) {
        (3, self.image_size, self.image_size)
    }

    fn attribute_count(&self) -> usize {
        self.annotations.attribute_count()
    }
}

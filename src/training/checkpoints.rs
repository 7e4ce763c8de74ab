//! Checkpoint files: one safetensors container per saved epoch
//!
//! Tensors are stored as `{component}.{var name}` (e.g. `encoder.conv1.weight`)
//! in little-endian f32. The header metadata records the epoch, the phase that
//! produced the file, the attribute count and a creation timestamp.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use candle_core::{DType, Tensor};
use chrono::Utc;
use safetensors::tensor::{Dtype, TensorView};
use safetensors::SafeTensors;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::models::{AttributeSwapModel, ModelComponent};
use crate::training::phase::TrainingPhase;

/// Version written into every checkpoint header
pub const FORMAT_VERSION: &str = "1";

const FILE_PREFIX: &str = "checkpoint_";
const FILE_SUFFIX: &str = ".safetensors";

/// How many checkpoint files survive a save
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetentionPolicy {
    /// Never delete checkpoints
    #[default]
    KeepAll,
    /// Keep the newest `n` checkpoints by epoch
    KeepLast(usize),
}

/// Header-level description of a checkpoint file
#[derive(Debug, Clone, PartialEq)]
pub struct CheckpointInfo {
    /// File location
    pub path: PathBuf,
    /// Epoch the checkpoint was taken at
    pub epoch: usize,
    /// Phase that produced it, if recorded
    pub phase: Option<TrainingPhase>,
    /// Attribute count of the model, if recorded
    pub attribute_count: Option<usize>,
    /// RFC 3339 creation time, if recorded
    pub created_at: Option<String>,
    /// Tensor names and shapes
    pub tensors: BTreeMap<String, Vec<usize>>,
}

impl CheckpointInfo {
    /// Scalar parameter count stored for `component`
    pub fn parameter_count(&self, component: ModelComponent) -> usize {
        let prefix = format!("{}.", component.prefix());
        self.tensors
            .iter()
            .filter(|(name, _)| name.starts_with(&prefix))
            .map(|(_, shape)| shape.iter().product::<usize>())
            .sum()
    }
}

/// Saves, lists, restores and prunes checkpoints in one directory
#[derive(Debug, Clone)]
pub struct CheckpointManager {
    dir: PathBuf,
    retention: RetentionPolicy,
}

impl CheckpointManager {
    /// Manager for `dir`, created if missing
    pub fn new(dir: impl Into<PathBuf>, retention: RetentionPolicy) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir, retention })
    }

    /// Directory checkpoints are written to
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File name for a checkpoint taken at `epoch`
    pub fn path_for(&self, epoch: usize) -> PathBuf {
        self.dir.join(format!("{FILE_PREFIX}{epoch}{FILE_SUFFIX}"))
    }

    /// Write every component of `model` for `epoch`, then apply retention
    pub fn save(
        &self,
        epoch: usize,
        model: &AttributeSwapModel,
        phase: TrainingPhase,
    ) -> Result<PathBuf> {
        let mut named: Vec<(String, Vec<usize>, Vec<u8>)> = Vec::new();
        for component in ModelComponent::ALL {
            let vars = model
                .vars(component)
                .data()
                .lock()
                .map_err(|_| Error::checkpoint("variable map lock poisoned"))?;
            for (name, var) in vars.iter() {
                let tensor = var.as_tensor();
                named.push((
                    format!("{}.{name}", component.prefix()),
                    tensor.dims().to_vec(),
                    tensor_bytes(tensor)?,
                ));
            }
        }

        let views = named
            .iter()
            .map(|(name, shape, bytes)| {
                Ok((name.as_str(), TensorView::new(Dtype::F32, shape.clone(), bytes)?))
            })
            .collect::<Result<Vec<_>>>()?;

        let metadata = HashMap::from([
            ("epoch".to_string(), epoch.to_string()),
            ("phase".to_string(), phase.to_string()),
            ("attribute_count".to_string(), model.attribute_count().to_string()),
            ("created_at".to_string(), Utc::now().to_rfc3339()),
            ("format_version".to_string(), FORMAT_VERSION.to_string()),
        ]);

        let path = self.path_for(epoch);
        let tmp = path.with_extension("safetensors.tmp");
        safetensors::serialize_to_file(views, &Some(metadata), &tmp)?;
        std::fs::rename(&tmp, &path)?;
        info!("Saved checkpoint for epoch {} to {}", epoch, path.display());

        self.apply_retention()?;
        Ok(path)
    }

    /// Overwrite the parameters of `components` from the file at `path`.
    ///
    /// Every parameter of a selected component must be present with the same
    /// shape; components not selected keep their current values. Returns the
    /// stored epoch.
    pub fn load(
        &self,
        path: impl AsRef<Path>,
        model: &AttributeSwapModel,
        components: &[ModelComponent],
    ) -> Result<usize> {
        let path = path.as_ref();
        let buffer = std::fs::read(path).map_err(|e| {
            Error::checkpoint(format!("cannot read checkpoint '{}': {e}", path.display()))
        })?;
        let epoch = read_info(path, &buffer)?.epoch;
        let tensors = SafeTensors::deserialize(&buffer)?;

        for &component in components {
            let vars = model
                .vars(component)
                .data()
                .lock()
                .map_err(|_| Error::checkpoint("variable map lock poisoned"))?;
            for (name, var) in vars.iter() {
                let key = format!("{}.{name}", component.prefix());
                let view = tensors
                    .tensor(&key)
                    .map_err(|_| Error::checkpoint(format!("missing tensor '{key}'")))?;
                if view.dtype() != Dtype::F32 {
                    return Err(Error::checkpoint(format!(
                        "tensor '{key}' has dtype {:?}, expected F32",
                        view.dtype()
                    )));
                }
                if view.shape() != var.dims() {
                    return Err(Error::checkpoint(format!(
                        "tensor '{key}' has shape {:?}, model expects {:?}",
                        view.shape(),
                        var.dims()
                    )));
                }
                let values = f32_values(view.data());
                let value = Tensor::from_vec(values, view.shape(), var.device())?
                    .to_dtype(var.dtype())?;
                var.set(&value)?;
            }
            debug!("Restored {} from {}", component, path.display());
        }

        info!(
            "Restored {:?} from checkpoint {} (epoch {})",
            components,
            path.display(),
            epoch
        );
        Ok(epoch)
    }

    /// Read the header of a checkpoint without loading the model
    pub fn inspect(path: impl AsRef<Path>) -> Result<CheckpointInfo> {
        let path = path.as_ref();
        let buffer = std::fs::read(path).map_err(|e| {
            Error::checkpoint(format!("cannot read checkpoint '{}': {e}", path.display()))
        })?;
        read_info(path, &buffer)
    }

    /// Checkpoint files in the directory, oldest epoch first
    pub fn list(&self) -> Result<Vec<(usize, PathBuf)>> {
        let mut found = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if let Some(epoch) = parse_epoch(&path) {
                found.push((epoch, path));
            }
        }
        found.sort_by_key(|(epoch, _)| *epoch);
        Ok(found)
    }

    /// Newest checkpoint, if any
    pub fn latest(&self) -> Result<Option<PathBuf>> {
        Ok(self.list()?.pop().map(|(_, path)| path))
    }

    /// Delete every checkpoint file in the directory
    pub fn remove_all(&self) -> Result<usize> {
        self.remove_all_except(None)
    }

    /// Delete every checkpoint file except `keep`, which may live anywhere.
    /// Returns the number of files removed.
    pub fn remove_all_except(&self, keep: Option<&Path>) -> Result<usize> {
        let keep = keep.and_then(|p| p.canonicalize().ok());
        let mut removed = 0;
        for (epoch, path) in self.list()? {
            if keep.is_some() && path.canonicalize().ok() == keep {
                debug!("Keeping checkpoint for epoch {}", epoch);
                continue;
            }
            std::fs::remove_file(&path)?;
            removed += 1;
        }
        Ok(removed)
    }

    fn apply_retention(&self) -> Result<()> {
        let RetentionPolicy::KeepLast(keep) = self.retention else {
            return Ok(());
        };
        let files = self.list()?;
        let excess = files.len().saturating_sub(keep);
        for (epoch, path) in files.into_iter().take(excess) {
            match std::fs::remove_file(&path) {
                Ok(()) => debug!("Pruned checkpoint for epoch {}", epoch),
                Err(e) => warn!("Failed to prune {}: {}", path.display(), e),
            }
        }
        Ok(())
    }
}

fn parse_epoch(path: &Path) -> Option<usize> {
    path.file_name()?
        .to_str()?
        .strip_prefix(FILE_PREFIX)?
        .strip_suffix(FILE_SUFFIX)?
        .parse()
        .ok()
}

fn tensor_bytes(tensor: &Tensor) -> Result<Vec<u8>> {
    let values = tensor.to_dtype(DType::F32)?.flatten_all()?.to_vec1::<f32>()?;
    Ok(values.iter().flat_map(|v| v.to_le_bytes()).collect())
}

fn f32_values(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}

fn read_info(path: &Path, buffer: &[u8]) -> Result<CheckpointInfo> {
    let (_, header) = SafeTensors::read_metadata(buffer)?;
    let empty = HashMap::new();
    let metadata = header.metadata().as_ref().unwrap_or(&empty);

    let epoch = metadata
        .get("epoch")
        .ok_or_else(|| Error::checkpoint(format!("'{}' has no epoch entry", path.display())))?
        .parse()
        .map_err(|_| Error::checkpoint(format!("'{}' has a malformed epoch", path.display())))?;

    let tensors = SafeTensors::deserialize(buffer)?
        .tensors()
        .into_iter()
        .map(|(name, view)| (name, view.shape().to_vec()))
        .collect();

    Ok(CheckpointInfo {
        path: path.to_path_buf(),
        epoch,
        phase: metadata.get("phase").and_then(|p| p.parse().ok()),
        attribute_count: metadata.get("attribute_count").and_then(|n| n.parse().ok()),
        created_at: metadata.get("created_at").cloned(),
        tensors,
    })
}

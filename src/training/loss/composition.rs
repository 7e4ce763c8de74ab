//! Weighted composition of the three loss terms

use candle_core::Tensor;
use serde::{Deserialize, Serialize};

use super::{classification_loss, latent_loss, reconstruction_loss};
use crate::error::Result;
use crate::models::PairOutputs;
use crate::training::data::PairBatch;

/// Fixed weights of the composite loss
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LossWeights {
    /// Reconstruction weight
    pub alpha: f64,
    /// Classification weight
    pub beta: f64,
}

impl LossWeights {
    /// Create weights
    pub fn new(alpha: f64, beta: f64) -> Self {
        Self { alpha, beta }
    }

    /// `latent + alpha * recon + beta * classify`
    pub fn compose(&self, latent: f64, recon: f64, classify: f64) -> f64 {
        latent + self.alpha * recon + self.beta * classify
    }

    /// Same as [`compose`](Self::compose) on scalar tensors, keeping the graph
    pub fn compose_tensors(&self, latent: &Tensor, recon: &Tensor, classify: &Tensor) -> Result<Tensor> {
        let weighted_recon = recon.affine(self.alpha, 0.0)?;
        let weighted_classify = classify.affine(self.beta, 0.0)?;
        Ok(((latent + weighted_recon)? + weighted_classify)?)
    }

    /// Compute every term for one forward pass
    pub fn batch_losses(&self, outputs: &PairOutputs, batch: &PairBatch) -> Result<BatchLosses> {
        let latent = latent_loss(&outputs.latent_a, &outputs.latent_b)?;
        let recon = (reconstruction_loss(&outputs.recon_a, &batch.image_a)?
            + reconstruction_loss(&outputs.recon_b, &batch.image_b)?)?;
        let classify = (classification_loss(&outputs.logits_a, &batch.attrs_a)?
            + classification_loss(&outputs.logits_b, &batch.attrs_b)?)?;
        let total = self.compose_tensors(&latent, &recon, &classify)?;

        Ok(BatchLosses {
            latent,
            recon,
            classify,
            total,
        })
    }
}

/// Loss tensors of one batch; `total` is the one to backpropagate
#[derive(Debug)]
pub struct BatchLosses {
    /// Latent consistency term
    pub latent: Tensor,
    /// Summed reconstruction terms of both images
    pub recon: Tensor,
    /// Summed classification terms of both images
    pub classify: Tensor,
    /// Weighted composite
    pub total: Tensor,
}

impl BatchLosses {
    /// Pull the four scalars to the host
    pub fn values(&self) -> Result<LossValues> {
        Ok(LossValues {
            latent: self.latent.to_scalar::<f32>()? as f64,
            recon: self.recon.to_scalar::<f32>()? as f64,
            classify: self.classify.to_scalar::<f32>()? as f64,
            total: self.total.to_scalar::<f32>()? as f64,
        })
    }
}

/// Host-side scalar losses of one batch
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LossValues {
    /// Latent consistency term
    pub latent: f64,
    /// Reconstruction term
    pub recon: f64,
    /// Classification term
    pub classify: f64,
    /// Weighted composite
    pub total: f64,
}

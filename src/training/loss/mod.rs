//! Loss functions for attribute-swap training
//!
//! Three terms drive the model:
//!
//! - **latent**: the two images' latents should agree, since content is
//!   meant to be independent of the swappable attributes
//! - **reconstruction**: decoding a latent with its own attributes should
//!   give back the input
//! - **classification**: the classifier should recover the requested
//!   attributes from a transplant result
//!
//! [`LossWeights`] combines them as `latent + alpha * recon + beta * classify`.

pub mod composition;

pub use composition::{BatchLosses, LossValues, LossWeights};

use candle_core::Tensor;

use crate::error::Result;

/// Mean squared difference between two latents
pub fn latent_loss(latent_a: &Tensor, latent_b: &Tensor) -> Result<Tensor> {
    Ok((latent_a - latent_b)?.sqr()?.mean_all()?)
}

/// Mean absolute error between a reconstruction and its source image
pub fn reconstruction_loss(predicted: &Tensor, target: &Tensor) -> Result<Tensor> {
    Ok((predicted - target)?.abs()?.mean_all()?)
}

/// Binary cross-entropy on raw logits against multi-hot targets, averaged.
///
/// Uses `max(x, 0) - x * t + log(1 + exp(-|x|))` so large logits stay finite.
pub fn classification_loss(logits: &Tensor, targets: &Tensor) -> Result<Tensor> {
    let targets = targets.to_dtype(logits.dtype())?;
    let softplus = logits.abs()?.neg()?.exp()?.affine(1.0, 1.0)?.log()?;
    let loss = ((logits.relu()? - (logits * &targets)?)? + softplus)?;
    Ok(loss.mean_all()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use candle_core::Device;

    fn scalar(t: &Tensor) -> f64 {
        t.to_scalar::<f32>().unwrap() as f64
    }

    #[test]
    fn test_latent_loss_is_mse() -> Result<()> {
        let device = Device::Cpu;
        let a = Tensor::new(&[[1f32, 2.], [3., 4.]], &device)?;
        let b = Tensor::new(&[[1f32, 0.], [3., 0.]], &device)?;
        // (0 + 4 + 0 + 16) / 4
        assert_relative_eq!(scalar(&latent_loss(&a, &b)?), 5.0, epsilon = 1e-6);
        Ok(())
    }

    #[test]
    fn test_reconstruction_loss_is_mae() -> Result<()> {
        let device = Device::Cpu;
        let a = Tensor::new(&[0.5f32, 0.25, 1.0, 0.0], &device)?;
        let b = Tensor::new(&[0.0f32, 0.25, 0.5, 1.0], &device)?;
        assert_relative_eq!(scalar(&reconstruction_loss(&a, &b)?), 0.5, epsilon = 1e-6);
        Ok(())
    }

    #[test]
    fn test_classification_loss_matches_closed_form() -> Result<()> {
        let device = Device::Cpu;
        let logits = Tensor::new(&[[0f32, 2.0], [-1.0, 0.5]], &device)?;
        let targets = Tensor::new(&[[1f32, 0.0], [0.0, 1.0]], &device)?;

        let bce = |x: f64, t: f64| {
            let p = 1.0 / (1.0 + (-x).exp());
            -(t * p.ln() + (1.0 - t) * (1.0 - p).ln())
        };
        let expected = (bce(0.0, 1.0) + bce(2.0, 0.0) + bce(-1.0, 0.0) + bce(0.5, 1.0)) / 4.0;

        assert_relative_eq!(
            scalar(&classification_loss(&logits, &targets)?),
            expected,
            epsilon = 1e-5
        );
        Ok(())
    }

    #[test]
    fn test_classification_loss_stable_for_large_logits() -> Result<()> {
        let device = Device::Cpu;
        let logits = Tensor::new(&[[100f32, -100.0]], &device)?;
        let targets = Tensor::new(&[[1f32, 0.0]], &device)?;

        let value = scalar(&classification_loss(&logits, &targets)?);
        assert!(value.is_finite());
        assert!(value < 1e-6);
        Ok(())
    }
}

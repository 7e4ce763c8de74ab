//! Image quality metrics

use candle_core::{DType, Tensor};

use crate::error::Result;

/// Peak signal-to-noise ratio of `outputs` against `targets`, both `[B, C, H, W]`.
///
/// Per sample: `20 * log10(max(output)) - 10 * log10(mse)`, then averaged over
/// the batch. Identical images or a non-positive peak give a non-finite value;
/// that is reported, not treated as an error.
pub fn psnr(outputs: &Tensor, targets: &Tensor) -> Result<f64> {
    let (batch, _, _, _) = outputs.dims4()?;
    let outputs = outputs.to_dtype(DType::F32)?;
    let targets = targets.to_dtype(DType::F32)?;

    let mut total = 0.0f64;
    for i in 0..batch {
        let output = outputs.get(i)?;
        let target = targets.get(i)?;

        let mse = (&output - &target)?.sqr()?.mean_all()?.to_scalar::<f32>()? as f64;
        let peak = output.flatten_all()?.max(0)?.to_scalar::<f32>()? as f64;

        total += 20.0 * peak.log10() - 10.0 * mse.log10();
    }

    Ok(total / batch as f64)
}

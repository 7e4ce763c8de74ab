//! Attribute-conditioned decoder

use candle_core::{Result, Tensor, D};
use candle_nn::{conv_transpose2d, ConvTranspose2d, ConvTranspose2dConfig, Module, VarBuilder};

/// Decodes a latent, conditioned on an attribute vector, back to an image
///
/// The attribute vector is tiled over the latent's spatial grid and
/// concatenated on the channel axis before upsampling.
#[derive(Debug, Clone)]
pub struct Decoder {
    deconv1: ConvTranspose2d,
    deconv2: ConvTranspose2d,
    attribute_count: usize,
}

impl Decoder {
    /// Create a decoder for latents with `latent_channels` channels
    pub fn new(
        latent_channels: usize,
        base_channels: usize,
        attribute_count: usize,
        vb: VarBuilder,
    ) -> Result<Self> {
        let cfg = ConvTranspose2dConfig {
            padding: 1,
            stride: 2,
            ..Default::default()
        };
        let deconv1 = conv_transpose2d(
            latent_channels + attribute_count,
            base_channels,
            4,
            cfg,
            vb.pp("deconv1"),
        )?;
        let deconv2 = conv_transpose2d(base_channels, 3, 4, cfg, vb.pp("deconv2"))?;

        Ok(Self {
            deconv1,
            deconv2,
            attribute_count,
        })
    }

    /// Decode `latent` `[B, C, h, w]` with `attributes` `[B, A]` into `[B, 3, 4h, 4w]`
    pub fn decode(&self, latent: &Tensor, attributes: &Tensor, _train: bool) -> Result<Tensor> {
        let (batch, _, h, w) = latent.dims4()?;
        if attributes.dim(D::Minus1)? != self.attribute_count {
            candle_core::bail!(
                "decoder expects {} attributes, got {:?}",
                self.attribute_count,
                attributes.dims()
            );
        }

        let tiled = attributes
            .reshape((batch, self.attribute_count, 1, 1))?
            .broadcast_as((batch, self.attribute_count, h, w))?
            .contiguous()?;
        let xs = Tensor::cat(&[latent, &tiled], 1)?;

        let xs = self.deconv1.forward(&xs)?.relu()?;
        candle_nn::ops::sigmoid(&self.deconv2.forward(&xs)?)
    }
}

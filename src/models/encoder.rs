//! Image encoder

use candle_core::{Result, Tensor};
use candle_nn::{conv2d, Conv2d, Conv2dConfig, Module, ModuleT, VarBuilder};

const LEAKY_SLOPE: f64 = 0.2;

/// Two stride-2 convolutions mapping `[B, 3, H, W]` to `[B, 2c, H/4, W/4]`
#[derive(Debug, Clone)]
pub struct Encoder {
    conv1: Conv2d,
    conv2: Conv2d,
    latent_channels: usize,
}

impl Encoder {
    /// Create an encoder whose first layer has `base_channels` filters
    pub fn new(base_channels: usize, vb: VarBuilder) -> Result<Self> {
        let cfg = Conv2dConfig {
            padding: 1,
            stride: 2,
            ..Default::default()
        };
        let latent_channels = base_channels * 2;
        let conv1 = conv2d(3, base_channels, 4, cfg, vb.pp("conv1"))?;
        let conv2 = conv2d(base_channels, latent_channels, 4, cfg, vb.pp("conv2"))?;

        Ok(Self {
            conv1,
            conv2,
            latent_channels,
        })
    }

    /// Channel count of the latent representation
    pub fn latent_channels(&self) -> usize {
        self.latent_channels
    }
}

impl ModuleT for Encoder {
    fn forward_t(&self, xs: &Tensor, _train: bool) -> Result<Tensor> {
        let xs = candle_nn::ops::leaky_relu(&self.conv1.forward(xs)?, LEAKY_SLOPE)?;
        candle_nn::ops::leaky_relu(&self.conv2.forward(&xs)?, LEAKY_SLOPE)
    }
}

//! Attribute classifier

use candle_core::{Result, Tensor};
use candle_nn::{conv2d, linear, Conv2d, Conv2dConfig, Dropout, Linear, Module, ModuleT, VarBuilder};

const LEAKY_SLOPE: f64 = 0.2;

/// Predicts attribute logits `[B, A]` from an image `[B, 3, H, W]`
#[derive(Debug, Clone)]
pub struct Classifier {
    conv1: Conv2d,
    conv2: Conv2d,
    dropout: Dropout,
    head: Linear,
}

impl Classifier {
    /// Create a classifier for `attribute_count` outputs
    pub fn new(
        base_channels: usize,
        attribute_count: usize,
        dropout: f32,
        vb: VarBuilder,
    ) -> Result<Self> {
        let cfg = Conv2dConfig {
            padding: 1,
            stride: 2,
            ..Default::default()
        };
        let conv1 = conv2d(3, base_channels, 4, cfg, vb.pp("conv1"))?;
        let conv2 = conv2d(base_channels, base_channels * 2, 4, cfg, vb.pp("conv2"))?;
        let head = linear(base_channels * 2, attribute_count, vb.pp("head"))?;

        Ok(Self {
            conv1,
            conv2,
            dropout: Dropout::new(dropout),
            head,
        })
    }
}

impl ModuleT for Classifier {
    fn forward_t(&self, xs: &Tensor, train: bool) -> Result<Tensor> {
        let xs = candle_nn::ops::leaky_relu(&self.conv1.forward(xs)?, LEAKY_SLOPE)?;
        let xs = candle_nn::ops::leaky_relu(&self.conv2.forward(&xs)?, LEAKY_SLOPE)?;
        // global average pool over the spatial axes
        let pooled = xs.mean((2, 3))?;
        let pooled = self.dropout.forward_t(&pooled, train)?;
        self.head.forward(&pooled)
    }
}

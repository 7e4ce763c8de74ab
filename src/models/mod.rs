//! Encoder / decoder / classifier triad
//!
//! Each component keeps its parameters in its own [`VarMap`] so the optimizer
//! and the checkpoint restore logic can select components independently.

pub mod classifier;
pub mod decoder;
pub mod encoder;

pub use classifier::Classifier;
pub use decoder::Decoder;
pub use encoder::Encoder;

use std::fmt;

use candle_core::{DType, Device, Tensor, Var};
use candle_nn::{ModuleT, VarBuilder, VarMap};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{DataConfig, ModelConfig};
use crate::error::Result;
use crate::training::data::PairBatch;

/// Named model component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelComponent {
    /// Image to latent
    Encoder,
    /// Latent plus attributes to image
    Decoder,
    /// Image to attribute logits
    Classifier,
}

impl ModelComponent {
    /// All components in checkpoint order
    pub const ALL: [ModelComponent; 3] = [Self::Encoder, Self::Decoder, Self::Classifier];

    /// Tensor name prefix used in checkpoints
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Encoder => "encoder",
            Self::Decoder => "decoder",
            Self::Classifier => "classifier",
        }
    }
}

impl fmt::Display for ModelComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

impl std::str::FromStr for ModelComponent {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "encoder" => Ok(Self::Encoder),
            "decoder" => Ok(Self::Decoder),
            "classifier" => Ok(Self::Classifier),
            other => Err(crate::Error::config(format!("unknown model component '{other}'"))),
        }
    }
}

/// Which images the classifier scores
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassifySource {
    /// The transplant results (attribute-swap objective)
    Transplants,
    /// The real input images (classifier pre-training)
    Originals,
}

/// Every tensor produced by one forward pass over a batch
#[derive(Debug)]
pub struct PairOutputs {
    /// Latent of image A
    pub latent_a: Tensor,
    /// Latent of image B
    pub latent_b: Tensor,
    /// A's content decoded with A's attributes
    pub recon_a: Tensor,
    /// B's content decoded with B's attributes
    pub recon_b: Tensor,
    /// B's content decoded with A's attributes
    pub trans_a: Tensor,
    /// A's content decoded with B's attributes
    pub trans_b: Tensor,
    /// Attribute logits scored against A's attributes
    pub logits_a: Tensor,
    /// Attribute logits scored against B's attributes
    pub logits_b: Tensor,
}

/// The full attribute-swap model
pub struct AttributeSwapModel {
    encoder: Encoder,
    decoder: Decoder,
    classifier: Classifier,
    encoder_vars: VarMap,
    decoder_vars: VarMap,
    classifier_vars: VarMap,
    attribute_count: usize,
}

impl AttributeSwapModel {
    /// Build freshly initialised components on `device`
    pub fn new(model: &ModelConfig, data: &DataConfig, device: &Device) -> Result<Self> {
        let encoder_vars = VarMap::new();
        let decoder_vars = VarMap::new();
        let classifier_vars = VarMap::new();

        let encoder = Encoder::new(
            model.base_channels,
            VarBuilder::from_varmap(&encoder_vars, DType::F32, device),
        )?;
        let decoder = Decoder::new(
            encoder.latent_channels(),
            model.base_channels,
            data.attribute_count,
            VarBuilder::from_varmap(&decoder_vars, DType::F32, device),
        )?;
        let classifier = Classifier::new(
            model.base_channels,
            data.attribute_count,
            model.dropout,
            VarBuilder::from_varmap(&classifier_vars, DType::F32, device),
        )?;

        let this = Self {
            encoder,
            decoder,
            classifier,
            encoder_vars,
            decoder_vars,
            classifier_vars,
            attribute_count: data.attribute_count,
        };
        debug!(
            "Model built: encoder={} decoder={} classifier={} parameters",
            this.parameter_count(ModelComponent::Encoder),
            this.parameter_count(ModelComponent::Decoder),
            this.parameter_count(ModelComponent::Classifier),
        );
        Ok(this)
    }

    /// Number of attributes the decoder and classifier were built for
    pub fn attribute_count(&self) -> usize {
        self.attribute_count
    }

    /// Variable map of one component
    pub fn vars(&self, component: ModelComponent) -> &VarMap {
        match component {
            ModelComponent::Encoder => &self.encoder_vars,
            ModelComponent::Decoder => &self.decoder_vars,
            ModelComponent::Classifier => &self.classifier_vars,
        }
    }

    /// Trainable variables of the given components
    pub fn trainable_vars(&self, components: &[ModelComponent]) -> Vec<Var> {
        components
            .iter()
            .flat_map(|c| self.vars(*c).all_vars())
            .collect()
    }

    /// Scalar parameter count of one component
    pub fn parameter_count(&self, component: ModelComponent) -> usize {
        self.vars(component)
            .all_vars()
            .iter()
            .map(|v| v.as_tensor().elem_count())
            .sum()
    }

    /// Encode both images, decode each latent with its own and the other
    /// image's attributes, then score attributes with the classifier.
    pub fn forward_pair(
        &self,
        batch: &PairBatch,
        train: bool,
        source: ClassifySource,
    ) -> Result<PairOutputs> {
        let latent_a = self.encoder.forward_t(&batch.image_a, train)?;
        let latent_b = self.encoder.forward_t(&batch.image_b, train)?;

        let trans_b = self.decoder.decode(&latent_a, &batch.attrs_b, train)?;
        let trans_a = self.decoder.decode(&latent_b, &batch.attrs_a, train)?;
        let recon_a = self.decoder.decode(&latent_a, &batch.attrs_a, train)?;
        let recon_b = self.decoder.decode(&latent_b, &batch.attrs_b, train)?;

        let (logits_a, logits_b) = match source {
            ClassifySource::Transplants => (
                self.classifier.forward_t(&trans_a, train)?,
                self.classifier.forward_t(&trans_b, train)?,
            ),
            ClassifySource::Originals => (
                self.classifier.forward_t(&batch.image_a, train)?,
                self.classifier.forward_t(&batch.image_b, train)?,
            ),
        };

        Ok(PairOutputs {
            latent_a,
            latent_b,
            recon_a,
            recon_b,
            trans_a,
            trans_b,
            logits_a,
            logits_b,
        })
    }
}

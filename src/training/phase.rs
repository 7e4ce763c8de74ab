//! Training phases and their parameter update sets

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::models::{ClassifySource, ModelComponent};

/// Which components the optimizer updates during a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrainingPhase {
    /// Encoder, decoder and classifier are all updated
    JointTraining,
    /// Encoder and decoder are updated, the classifier is frozen
    #[default]
    EncoderDecoderOnly,
    /// Only the classifier is updated, scored on the real images
    ClassifierOnly,
}

impl TrainingPhase {
    /// Components whose parameters the optimizer owns in this phase
    pub fn trainable(&self) -> &'static [ModelComponent] {
        match self {
            Self::JointTraining => &ModelComponent::ALL,
            Self::EncoderDecoderOnly => &[ModelComponent::Encoder, ModelComponent::Decoder],
            Self::ClassifierOnly => &[ModelComponent::Classifier],
        }
    }

    /// Images the classification term is computed on
    pub fn classify_source(&self) -> ClassifySource {
        match self {
            Self::ClassifierOnly => ClassifySource::Originals,
            _ => ClassifySource::Transplants,
        }
    }

    /// Whether `component` is updated in this phase
    pub fn updates(&self, component: ModelComponent) -> bool {
        self.trainable().contains(&component)
    }
}

impl fmt::Display for TrainingPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::JointTraining => "joint_training",
            Self::EncoderDecoderOnly => "encoder_decoder_only",
            Self::ClassifierOnly => "classifier_only",
        };
        f.write_str(name)
    }
}

impl std::str::FromStr for TrainingPhase {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "joint" | "joint_training" => Ok(Self::JointTraining),
            "encoder_decoder" | "encoder_decoder_only" => Ok(Self::EncoderDecoderOnly),
            "classifier" | "classifier_only" => Ok(Self::ClassifierOnly),
            _ => Err(Error::config(format!("unknown training phase '{s}'"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_phase_freezes_classifier() {
        let phase = TrainingPhase::default();
        assert!(phase.updates(ModelComponent::Encoder));
        assert!(phase.updates(ModelComponent::Decoder));
        assert!(!phase.updates(ModelComponent::Classifier));
        assert_eq!(phase.classify_source(), ClassifySource::Transplants);
    }

    #[test]
    fn test_classifier_only_scores_originals() {
        let phase = TrainingPhase::ClassifierOnly;
        assert_eq!(phase.trainable(), &[ModelComponent::Classifier]);
        assert_eq!(phase.classify_source(), ClassifySource::Originals);
    }

    #[test]
    fn test_phase_parse_display_agree() {
        for phase in [
            TrainingPhase::JointTraining,
            TrainingPhase::EncoderDecoderOnly,
            TrainingPhase::ClassifierOnly,
        ] {
            assert_eq!(phase.to_string().parse::<TrainingPhase>().unwrap(), phase);
        }
        assert_eq!("encoder-decoder".parse::<TrainingPhase>().unwrap(), TrainingPhase::EncoderDecoderOnly);
    }
}

//! Running metrics for one epoch phase
//!
//! [`AverageMeter`] tracks a single scalar stream; [`LossMeters`] groups the
//! four loss streams every batch updates. Both are created fresh for each
//! training or validation pass and dropped at its end.

pub mod quality;
pub mod run_log;

pub use quality::psnr;
pub use run_log::{RunLog, TrainRecord, ValidationRecord};

use serde::{Deserialize, Serialize};

use crate::training::loss::LossValues;

/// Computes and stores the average and current value of a scalar stream
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AverageMeter {
    /// Most recent value
    pub val: f64,
    /// Weighted sum of all values
    pub sum: f64,
    /// Total weight
    pub count: usize,
    /// `sum / count`; meaningless while `count == 0`
    pub avg: f64,
}

impl AverageMeter {
    /// Create a zeroed meter
    pub fn new() -> Self {
        Self::default()
    }

    /// Zero every field
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Record `value` with weight `n`
    pub fn update(&mut self, value: f64, n: usize) {
        self.val = value;
        self.sum += value * n as f64;
        self.count += n;
        self.avg = self.sum / self.count as f64;
    }
}

/// The four loss streams of one epoch phase
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LossMeters {
    /// Weighted composite
    pub total: AverageMeter,
    /// Latent consistency term
    pub latent: AverageMeter,
    /// Reconstruction term
    pub recon: AverageMeter,
    /// Classification term
    pub classify: AverageMeter,
}

impl LossMeters {
    /// Create zeroed meters
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one batch worth of losses
    pub fn update(&mut self, values: &LossValues) {
        self.latent.update(values.latent, 1);
        self.recon.update(values.recon, 1);
        self.classify.update(values.classify, 1);
        self.total.update(values.total, 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    #[test]
    fn test_update_tracks_last_value_and_average() {
        let mut meter = AverageMeter::new();
        meter.update(2.0, 1);
        meter.update(4.0, 3);

        assert_eq!(meter.val, 4.0);
        assert_eq!(meter.count, 4);
        assert_relative_eq!(meter.sum, 14.0);
        assert_relative_eq!(meter.avg, 3.5);
    }

    #[test]
    fn test_reset_zeroes_everything() {
        let mut meter = AverageMeter::new();
        meter.update(7.0, 2);
        meter.reset();
        assert_eq!(meter, AverageMeter::default());
    }

    #[test]
    fn test_non_finite_values_propagate() {
        let mut meter = AverageMeter::new();
        meter.update(f64::INFINITY, 1);
        meter.update(1.0, 1);
        assert!(meter.avg.is_infinite());
    }

    #[test]
    fn test_loss_meters_update_all_streams() {
        let mut meters = LossMeters::new();
        meters.update(&LossValues {
            latent: 1.0,
            recon: 2.0,
            classify: 3.0,
            total: 4.0,
        });
        meters.update(&LossValues {
            latent: 3.0,
            recon: 4.0,
            classify: 5.0,
            total: 6.0,
        });

        assert_relative_eq!(meters.latent.avg, 2.0);
        assert_relative_eq!(meters.recon.avg, 3.0);
        assert_relative_eq!(meters.classify.avg, 4.0);
        assert_relative_eq!(meters.total.avg, 5.0);
        assert_eq!(meters.total.val, 6.0);
    }

    proptest! {
        #[test]
        fn prop_average_is_weighted_mean(
            updates in prop::collection::vec((-1.0e3f64..1.0e3, 1usize..10), 1..50)
        ) {
            let mut meter = AverageMeter::new();
            meter.reset();
            for (v, w) in &updates {
                meter.update(*v, *w);
            }

            let weighted: f64 = updates.iter().map(|(v, w)| v * *w as f64).sum();
            let weight: usize = updates.iter().map(|(_, w)| *w).sum();
            let expected = weighted / weight as f64;

            prop_assert_eq!(meter.count, weight);
            prop_assert!((meter.avg - expected).abs() <= 1e-9 * (1.0 + expected.abs()));
        }
    }
}

//! Append-only per-epoch text logs
//!
//! `train.log` receives one record per training pass and `val.log` one per
//! validation pass. Each record is written with a single `write_all` on a
//! freshly opened append handle so a crash never leaves a half-open writer.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::Result;
use crate::training::metrics::LossMeters;

/// Summary of one training pass
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainRecord {
    /// Epoch index
    pub epoch: usize,
    /// Seconds since the epoch started
    pub elapsed_secs: f64,
    /// Composite loss average
    pub loss: f64,
    /// Latent loss average
    pub loss_z: f64,
    /// Reconstruction loss average
    pub loss_recon: f64,
    /// Classification loss average
    pub loss_classify: f64,
}

impl TrainRecord {
    /// Build from the epoch's running averages
    pub fn from_meters(epoch: usize, elapsed_secs: f64, meters: &LossMeters) -> Self {
        Self {
            epoch,
            elapsed_secs,
            loss: meters.total.avg,
            loss_z: meters.latent.avg,
            loss_recon: meters.recon.avg,
            loss_classify: meters.classify.avg,
        }
    }

    /// Text appended to `train.log`
    pub fn format(&self) -> String {
        format!(
            "epoch {}:\n | time {:.3} | loss {:.5} | loss_z {:.5} | loss_recon {:.5} | loss_classify {:.5}  \n",
            self.epoch, self.elapsed_secs, self.loss, self.loss_z, self.loss_recon, self.loss_classify,
        )
    }
}

/// Summary of one validation pass
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValidationRecord {
    /// Epoch index
    pub epoch: usize,
    /// Seconds since the epoch started (training pass included)
    pub elapsed_secs: f64,
    /// Composite loss average
    pub loss: f64,
    /// Reconstruction loss average
    pub loss_recon: f64,
    /// Classification loss average
    pub loss_classify: f64,
    /// Mean PSNR
    pub psnr: f64,
}

impl ValidationRecord {
    /// Text appended to `val.log` and echoed to stdout
    pub fn format(&self) -> String {
        format!(
            "\n| end of epoch {:3} | time: {:5.5}s | valid loss {:.5} | valid recon loss {:.5} | valid classify loss {:.5} | valid psnr {:5.2}",
            self.epoch, self.elapsed_secs, self.loss, self.loss_recon, self.loss_classify, self.psnr,
        )
    }
}

/// Writer for the two epoch logs
#[derive(Debug, Clone)]
pub struct RunLog {
    train_path: PathBuf,
    val_path: PathBuf,
}

impl RunLog {
    /// Log into `train_path` and `val_path`, creating parent directories
    pub fn new(train_path: impl Into<PathBuf>, val_path: impl Into<PathBuf>) -> Result<Self> {
        let train_path = train_path.into();
        let val_path = val_path.into();
        for path in [&train_path, &val_path] {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
        }
        Ok(Self {
            train_path,
            val_path,
        })
    }

    /// Append a training record
    pub fn append_train(&self, record: &TrainRecord) -> Result<()> {
        append(&self.train_path, &record.format())?;
        debug!("Appended epoch {} to {}", record.epoch, self.train_path.display());
        Ok(())
    }

    /// Append a validation record
    pub fn append_validation(&self, record: &ValidationRecord) -> Result<()> {
        append(&self.val_path, &record.format())?;
        debug!("Appended epoch {} to {}", record.epoch, self.val_path.display());
        Ok(())
    }

    /// Path of the training log
    pub fn train_path(&self) -> &Path {
        &self.train_path
    }

    /// Path of the validation log
    pub fn val_path(&self) -> &Path {
        &self.val_path
    }
}

fn append(path: &Path, text: &str) -> Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(text.as_bytes())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_train_record_format() {
        let record = TrainRecord {
            epoch: 3,
            elapsed_secs: 12.34567,
            loss: 1.0,
            loss_z: 0.25,
            loss_recon: 0.5,
            loss_classify: 0.125,
        };
        assert_eq!(
            record.format(),
            "epoch 3:\n | time 12.346 | loss 1.00000 | loss_z 0.25000 | loss_recon 0.50000 | loss_classify 0.12500  \n"
        );
    }

    #[test]
    fn test_validation_record_format() {
        let record = ValidationRecord {
            epoch: 7,
            elapsed_secs: 1.5,
            loss: 2.0,
            loss_recon: 0.5,
            loss_classify: 0.25,
            psnr: 31.257,
        };
        assert_eq!(
            record.format(),
            "\n| end of epoch   7 | time: 1.50000s | valid loss 2.00000 | valid recon loss 0.50000 | valid classify loss 0.25000 | valid psnr 31.26"
        );
    }

    #[test]
    fn test_appends_never_truncate() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let log = RunLog::new(dir.path().join("train.log"), dir.path().join("val.log"))?;

        let mut record = TrainRecord {
            epoch: 0,
            elapsed_secs: 0.0,
            loss: 0.0,
            loss_z: 0.0,
            loss_recon: 0.0,
            loss_classify: 0.0,
        };
        log.append_train(&record)?;
        record.epoch = 1;
        log.append_train(&record)?;

        let text = fs::read_to_string(log.train_path())?;
        assert_eq!(text.matches("epoch ").count(), 2);
        assert!(text.starts_with("epoch 0:\n"));
        assert!(!log.val_path().exists());
        Ok(())
    }
}

//! Epoch driver for attribute-swap training
//!
//! One cycle per epoch in `[start_epoch, epochs)`: a training pass with an
//! optimizer step per batch, a validation pass in evaluation mode that also
//! measures PSNR, the two log records, and a checkpoint every `save_every`
//! epochs. Errors are never caught here; they propagate to the caller.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use candle_core::Device;
use candle_nn::{AdamW, Optimizer, ParamsAdamW};
use tracing::{debug, info, instrument};

use crate::config::Config;
use crate::error::Result;
use crate::models::{AttributeSwapModel, ModelComponent};
use crate::training::checkpoints::CheckpointManager;
use crate::training::data::{DataLoader, PairDataset};
use crate::training::loss::LossWeights;
use crate::training::metrics::{psnr, AverageMeter, LossMeters, RunLog, TrainRecord, ValidationRecord};
use crate::training::phase::TrainingPhase;
use crate::training::progress::ProgressBar;

/// Where the driver currently is in its epoch cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    /// Meters reset, model switched to training mode
    Initializing {
        /// Epoch about to start
        epoch: usize,
    },
    /// Processing a training batch
    TrainingBatch {
        /// Current epoch
        epoch: usize,
        /// 0-based batch index
        batch: usize,
    },
    /// Training pass finished, record being written
    TrainingEpochEnd {
        /// Current epoch
        epoch: usize,
    },
    /// Processing a validation batch
    ValidatingBatch {
        /// Current epoch
        epoch: usize,
        /// 0-based batch index
        batch: usize,
    },
    /// Validation pass finished, record being written
    ValidationEpochEnd {
        /// Current epoch
        epoch: usize,
    },
    /// Writing a checkpoint
    Checkpointing {
        /// Current epoch
        epoch: usize,
    },
    /// Epoch range exhausted
    Done,
}

/// Outcome of [`Trainer::train`]
#[derive(Debug, Clone)]
pub struct TrainingResult {
    /// Epochs actually run
    pub epochs_run: usize,
    /// Record of the last training pass
    pub last_train: Option<TrainRecord>,
    /// Record of the last validation pass
    pub last_validation: Option<ValidationRecord>,
    /// Checkpoint files written during this run
    pub checkpoints: Vec<PathBuf>,
    /// Wall time of the whole run
    pub duration: Duration,
}

/// Owns the model, the optimizer and every output of a run
pub struct Trainer {
    config: Config,
    device: Device,
    model: AttributeSwapModel,
    optimizer: AdamW,
    weights: LossWeights,
    checkpoints: CheckpointManager,
    run_log: RunLog,
    progress: ProgressBar,
    state: DriverState,
    start_epoch: usize,
}

impl Trainer {
    /// Prepare the output directory, build the model and the optimizer, and
    /// resume from `checkpointing.resume_from` when set.
    pub fn new(config: Config, device: Device) -> Result<Self> {
        config.validate()?;

        let save_dir = config.checkpointing.save_dir.clone();
        if config.checkpointing.clean {
            clean_outputs(&config)?;
        }
        std::fs::create_dir_all(config.log_dir())?;
        config.to_file(config.log_dir().join("config.yaml"))?;

        let model = AttributeSwapModel::new(&config.model, &config.data, &device)?;
        let phase = config.training.phase;
        let optimizer = build_optimizer(&config, &model, phase)?;

        let checkpoints = CheckpointManager::new(&save_dir, config.checkpointing.retention)?;
        let run_log = RunLog::new(config.train_log_path(), config.val_log_path())?;
        let weights = LossWeights::new(config.training.alpha, config.training.beta);

        info!("Training phase: {} (updating {:?})", phase, phase.trainable());
        info!("Device: {:?}", device);
        for component in ModelComponent::ALL {
            info!("{} parameters: {}", component, model.parameter_count(component));
        }

        let resume_from = config.checkpointing.resume_from.clone();
        let mut trainer = Self {
            config,
            device,
            model,
            optimizer,
            weights,
            checkpoints,
            run_log,
            progress: ProgressBar::stdout(),
            state: DriverState::Initializing { epoch: 0 },
            start_epoch: 0,
        };

        if let Some(path) = resume_from {
            trainer.resume(&path)?;
        }
        Ok(trainer)
    }

    /// Replace the stdout progress bar
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    /// Restore the configured components and the starting epoch from a checkpoint
    pub fn resume(&mut self, path: &Path) -> Result<()> {
        info!("loading checkpoint {}", path.display());
        let restore = self.config.checkpointing.restore.clone();
        self.start_epoch = self.checkpoints.load(path, &self.model, &restore)?;
        Ok(())
    }

    /// First epoch [`train`](Self::train) will run
    pub fn start_epoch(&self) -> usize {
        self.start_epoch
    }

    /// Current driver state
    pub fn state(&self) -> DriverState {
        self.state
    }

    /// The model being trained
    pub fn model(&self) -> &AttributeSwapModel {
        &self.model
    }

    /// Effective configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Checkpoint manager of this run
    pub fn checkpoints(&self) -> &CheckpointManager {
        &self.checkpoints
    }

    /// Run every remaining epoch
    pub fn train<T, V>(
        &mut self,
        train_loader: &DataLoader<T>,
        val_loader: &DataLoader<V>,
    ) -> Result<TrainingResult>
    where
        T: PairDataset,
        V: PairDataset,
    {
        let run_start = Instant::now();
        let epochs = self.config.training.epochs;
        info!("Starting training for epochs {}..{}", self.start_epoch, epochs);

        let mut result = TrainingResult {
            epochs_run: 0,
            last_train: None,
            last_validation: None,
            checkpoints: Vec::new(),
            duration: Duration::ZERO,
        };

        for epoch in self.start_epoch..epochs {
            let epoch_start = Instant::now();

            let train_meters = self.train_epoch(epoch, train_loader)?;
            self.state = DriverState::TrainingEpochEnd { epoch };
            let train_record = TrainRecord::from_meters(
                epoch,
                epoch_start.elapsed().as_secs_f64(),
                &train_meters,
            );
            self.run_log.append_train(&train_record)?;

            let (val_meters, psnr_meter) = self.validate_epoch(epoch, val_loader)?;
            self.state = DriverState::ValidationEpochEnd { epoch };
            let val_record = ValidationRecord {
                epoch,
                elapsed_secs: epoch_start.elapsed().as_secs_f64(),
                loss: val_meters.total.avg,
                loss_recon: val_meters.recon.avg,
                loss_classify: val_meters.classify.avg,
                psnr: psnr_meter.avg,
            };
            self.progress.println(&val_record.format())?;
            self.run_log.append_validation(&val_record)?;

            if epoch % self.config.checkpointing.save_every == 0 {
                self.state = DriverState::Checkpointing { epoch };
                let path = self.checkpoints.save(epoch, &self.model, self.config.training.phase)?;
                result.checkpoints.push(path);
            }

            info!(
                "Epoch {} done in {:.1}s: train loss {:.5}, valid loss {:.5}, psnr {:.2}",
                epoch,
                epoch_start.elapsed().as_secs_f64(),
                train_record.loss,
                val_record.loss,
                val_record.psnr
            );
            result.epochs_run += 1;
            result.last_train = Some(train_record);
            result.last_validation = Some(val_record);
        }

        self.state = DriverState::Done;
        result.duration = run_start.elapsed();
        info!("Training completed in {:?}", result.duration);
        Ok(result)
    }

    #[instrument(skip(self, loader))]
    fn train_epoch<D: PairDataset>(
        &mut self,
        epoch: usize,
        loader: &DataLoader<D>,
    ) -> Result<LossMeters> {
        self.state = DriverState::Initializing { epoch };
        let mut meters = LossMeters::new();
        let source = self.config.training.phase.classify_source();
        let plan = loader.epoch_plan(epoch);
        let total = plan.len();
        let prefix = format!("Epoch: {epoch:3} | ");

        for (batch_idx, indices) in plan.iter().enumerate() {
            self.state = DriverState::TrainingBatch {
                epoch,
                batch: batch_idx,
            };
            let batch_start = Instant::now();

            let batch = loader.load_batch(indices, &self.device)?;
            let outputs = self.model.forward_pair(&batch, true, source)?;
            let losses = self.weights.batch_losses(&outputs, &batch)?;
            self.optimizer.backward_step(&losses.total)?;

            let values = losses.values()?;
            meters.update(&values);
            debug!(batch = batch_idx, loss = values.total, "train step");

            let suffix = format!(
                " | time {:.3} | loss {:.5} | loss_z {:.5} | loss_recon {:.5} | loss_classify {:.5}  |",
                batch_start.elapsed().as_secs_f64(),
                meters.total.val,
                meters.latent.val,
                meters.recon.val,
                meters.classify.val,
            );
            self.progress.update(batch_idx, total, &prefix, &suffix, Some(""))?;
        }

        Ok(meters)
    }

    #[instrument(skip(self, loader))]
    fn validate_epoch<D: PairDataset>(
        &mut self,
        epoch: usize,
        loader: &DataLoader<D>,
    ) -> Result<(LossMeters, AverageMeter)> {
        let mut meters = LossMeters::new();
        let mut psnr_meter = AverageMeter::new();
        let source = self.config.training.phase.classify_source();
        let plan = loader.epoch_plan(epoch);
        let total = plan.len();
        let prefix = format!("Epoch: {epoch:3} | ");

        for (batch_idx, indices) in plan.iter().enumerate() {
            self.state = DriverState::ValidatingBatch {
                epoch,
                batch: batch_idx,
            };
            let batch_start = Instant::now();

            let batch = loader.load_batch(indices, &self.device)?;
            let outputs = self.model.forward_pair(&batch, false, source)?;
            let values = self.weights.batch_losses(&outputs, &batch)?.values()?;
            let quality =
                psnr(&outputs.recon_a, &batch.image_a)? + psnr(&outputs.recon_b, &batch.image_b)?;

            meters.update(&values);
            psnr_meter.update(quality, 1);
            debug!(batch = batch_idx, loss = values.total, psnr = quality, "validation step");

            let suffix = format!(
                " | time {:.3} | loss_val {:.5} | loss_z_val {:.5} | loss_recon_val {:.5} | loss_classify_val {:.5}  |",
                batch_start.elapsed().as_secs_f64(),
                meters.total.val,
                meters.latent.val,
                meters.recon.val,
                meters.classify.val,
            );
            self.progress.update(batch_idx, total, &prefix, &suffix, Some(""))?;
        }

        Ok((meters, psnr_meter))
    }
}

fn build_optimizer(
    config: &Config,
    model: &AttributeSwapModel,
    phase: TrainingPhase,
) -> Result<AdamW> {
    let opt = &config.optimizer;
    let params = ParamsAdamW {
        lr: opt.learning_rate,
        beta1: opt.beta1,
        beta2: opt.beta2,
        eps: opt.eps,
        weight_decay: opt.weight_decay,
    };
    let vars = model.trainable_vars(phase.trainable());
    debug!("Optimizer owns {} variables", vars.len());
    Ok(AdamW::new(vars, params)?)
}

/// Remove the logs, the auxiliary log directory and every checkpoint of a
/// previous run in `save_dir`.
pub fn clean_outputs(config: &Config) -> Result<()> {
    let save_dir = &config.checkpointing.save_dir;
    if !save_dir.exists() {
        return Ok(());
    }

    for path in [config.train_log_path(), config.val_log_path()] {
        if path.exists() {
            std::fs::remove_file(&path)?;
        }
    }
    let log_dir = config.log_dir();
    if log_dir.exists() {
        std::fs::remove_dir_all(&log_dir)?;
    }
    let removed = CheckpointManager::new(save_dir, config.checkpointing.retention)?
        .remove_all_except(config.checkpointing.resume_from.as_deref())?;
    info!("Cleaned {} (removed {} checkpoints)", save_dir.display(), removed);
    Ok(())
}

//! End-to-end integration tests for the training pipeline

use anyhow::Result;

use crate::training::checkpoints::CheckpointManager;
use crate::training::trainer::DriverState;

use super::fixtures::TrainingTestFixture;

#[test]
fn test_full_training_loop() -> Result<()> {
    let fixture = TrainingTestFixture::new()?;
    assert_eq!(fixture.train_loader.num_batches(), 2);
    assert_eq!(fixture.val_loader.num_batches(), 1);

    let mut trainer = fixture.trainer()?;
    let result = trainer.train(&fixture.train_loader, &fixture.val_loader)?;

    assert_eq!(result.epochs_run, 1);
    assert_eq!(trainer.state(), DriverState::Done);

    // Exactly one checkpoint, for epoch 0
    let files = trainer.checkpoints().list()?;
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].0, 0);
    assert_eq!(
        files[0].1.file_name().and_then(|n| n.to_str()),
        Some("checkpoint_0.safetensors")
    );
    assert_eq!(CheckpointManager::inspect(&files[0].1)?.epoch, 0);

    // One record in each log
    let train_log = std::fs::read_to_string(fixture.config.train_log_path())?;
    assert_eq!(train_log.matches("epoch 0:\n | time ").count(), 1);
    assert!(train_log.ends_with("  \n"));

    let val_log = std::fs::read_to_string(fixture.config.val_log_path())?;
    assert_eq!(val_log.matches("\n| end of epoch   0 |").count(), 1);
    assert!(val_log.contains(" | valid psnr "));

    let train = result.last_train.expect("train record");
    let val = result.last_validation.expect("validation record");
    assert!(train.loss.is_finite() && train.loss > 0.0);
    assert!(val.loss.is_finite() && val.loss > 0.0);
    // Summed over both reconstructions, random weights still give a finite value
    assert!(val.psnr.is_finite());
    Ok(())
}

#[test]
fn test_composite_matches_weighted_terms() -> Result<()> {
    let mut fixture = TrainingTestFixture::new()?;
    fixture.config.training.alpha = 0.5;
    fixture.config.training.beta = 0.1;
    let mut trainer = fixture.trainer()?;

    let result = trainer.train(&fixture.train_loader, &fixture.val_loader)?;
    let train = result.last_train.expect("train record");

    // Averages are linear, so the composite average equals the composite of averages
    let expected = train.loss_z + 0.5 * train.loss_recon + 0.1 * train.loss_classify;
    approx::assert_relative_eq!(train.loss, expected, max_relative = 1e-4);
    Ok(())
}

#[test]
fn test_repeated_runs_append_to_logs() -> Result<()> {
    let mut fixture = TrainingTestFixture::new()?;
    fixture.config.training.epochs = 2;
    fixture.config.checkpointing.save_every = 5;

    let mut trainer = fixture.trainer()?;
    let result = trainer.train(&fixture.train_loader, &fixture.val_loader)?;

    // save_every counts from epoch 0
    assert_eq!(result.checkpoints, vec![trainer.checkpoints().path_for(0)]);

    let val_log = std::fs::read_to_string(fixture.config.val_log_path())?;
    assert_eq!(val_log.matches("| end of epoch").count(), 2);
    assert!(val_log.find("epoch   0").unwrap() < val_log.find("epoch   1").unwrap());
    Ok(())
}

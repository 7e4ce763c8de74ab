//! Test suite for the attrswap training pipeline
//!
//! Covers data loading from disk, checkpoint save/restore semantics, the
//! epoch driver, and a small end-to-end run on synthetic pairs.

pub mod integration_tests;

pub mod fixtures;
pub mod test_utils;

pub use fixtures::{SyntheticPairs, TrainingTestFixture};
pub use test_utils::{create_test_config, create_test_device, snapshot, SharedBuf};

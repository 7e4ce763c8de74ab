//! Common utilities for testing the training pipeline

use std::collections::BTreeMap;
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

use candle_core::Device;

use crate::config::{Config, DeviceType};
use crate::models::{AttributeSwapModel, ModelComponent};

/// Create a test device (CPU for CI compatibility)
pub fn create_test_device() -> Device {
    Device::Cpu
}

/// Minimal configuration writing into `save_dir`: 8x8 images, 3 attributes,
/// one epoch of batch size 2, a checkpoint every epoch.
pub fn create_test_config(save_dir: &Path) -> Config {
    let mut config = Config::default();
    config.data.attribute_count = 3;
    config.data.image_size = 8;
    config.data.num_workers = 1;
    config.model.base_channels = 4;
    config.model.dropout = 0.0;
    config.optimizer.learning_rate = 1e-3;
    config.training.epochs = 1;
    config.training.batch_size = 2;
    config.checkpointing.save_dir = save_dir.to_path_buf();
    config.checkpointing.save_every = 1;
    config.runtime.device = DeviceType::Cpu;
    config
}

/// Flattened values of every variable of one component, by name
pub fn snapshot(model: &AttributeSwapModel, component: ModelComponent) -> BTreeMap<String, Vec<f32>> {
    let vars = model.vars(component).data().lock().unwrap();
    vars.iter()
        .map(|(name, var)| {
            let values = var.as_tensor().flatten_all().unwrap().to_vec1::<f32>().unwrap();
            (name.clone(), values)
        })
        .collect()
}

/// Clonable in-memory sink for progress output
#[derive(Clone, Default)]
pub struct SharedBuf(Arc<Mutex<Vec<u8>>>);

impl SharedBuf {
    /// Everything written so far
    pub fn text(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }
}

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

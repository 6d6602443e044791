//! Training module: supervised training loop and test-split evaluation
//!
//! Training follows a fixed recipe:
//! 1. Load one dataset root, or aggregate several into a `crop:disease` label space
//! 2. Split every class 70/15/15 with a fixed seed
//! 3. Weight the cross-entropy loss by inverse class frequency
//! 4. Train with Adam, augmenting the train split only
//! 5. Keep the weights with the best validation accuracy, together with the
//!    label sidecar that binds the head to its labels

pub mod evaluate;
pub mod supervised;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::dataset::split::SplitConfig;
use crate::IMAGE_SIZE;

// Re-export main types for convenience
pub use evaluate::{run_evaluation, EvaluationConfig, EvaluationOutcome};
pub use supervised::{class_weights, run_training, TrainingOutcome};

/// Default number of training epochs
pub const DEFAULT_EPOCHS: usize = 10;

/// Default batch size
pub const DEFAULT_BATCH_SIZE: usize = 32;

/// Default learning rate
pub const DEFAULT_LEARNING_RATE: f64 = 0.001;

/// File name of the best checkpoint inside the output directory
pub const BEST_MODEL_FILE: &str = "best_model.mpk";

/// Configuration of one training run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    /// Single dataset root
    pub data_dir: Option<PathBuf>,
    /// Several dataset roots, one per crop; wins over `data_dir`
    pub data_dirs: Vec<PathBuf>,
    /// Class folders to train on, in head order (single root only)
    pub class_names: Option<Vec<String>>,
    pub epochs: usize,
    pub batch_size: usize,
    pub learning_rate: f64,
    /// Directory receiving `best_model.mpk` and its label sidecar
    pub output_dir: PathBuf,
    pub split: SplitConfig,
    /// Augment the train split
    pub augmentation: bool,
    pub image_size: usize,
    pub base_filters: usize,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            data_dirs: Vec::new(),
            class_names: None,
            epochs: DEFAULT_EPOCHS,
            batch_size: DEFAULT_BATCH_SIZE,
            learning_rate: DEFAULT_LEARNING_RATE,
            output_dir: PathBuf::from("."),
            split: SplitConfig::default(),
            augmentation: true,
            image_size: IMAGE_SIZE,
            base_filters: 32,
        }
    }
}

impl TrainingConfig {
    /// Path of the best checkpoint
    pub fn best_model_path(&self) -> PathBuf {
        self.output_dir.join(BEST_MODEL_FILE)
    }
}

//! Split materialization
//!
//! Copies a dataset root into `train/`, `val/` and `test/` folders with one
//! subfolder per canonical class label, so the split can be inspected or
//! shipped without re-running the splitter.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::discovery::{discover, list_images};
use crate::utils::error::{LeafError, Result};

/// Split names in output order
pub const SPLIT_NAMES: [&str; 3] = ["train", "val", "test"];

/// Configuration for split materialization
#[derive(Debug, Clone)]
pub struct MaterializeConfig {
    pub train_ratio: f64,
    pub val_ratio: f64,
    pub seed: u64,
    /// Delete the output directory before writing
    pub overwrite: bool,
}

impl Default for MaterializeConfig {
    fn default() -> Self {
        Self {
            train_ratio: 0.7,
            val_ratio: 0.15,
            seed: 42,
            overwrite: false,
        }
    }
}

impl MaterializeConfig {
    /// Both ratios must be positive and leave room for a test split
    pub fn validate(&self) -> Result<()> {
        if !(self.train_ratio > 0.0 && self.val_ratio > 0.0)
            || self.train_ratio + self.val_ratio >= 1.0
        {
            return Err(LeafError::Configuration(
                "Invalid split ratios. Use train>0, val>0 and train+val<1.".to_string(),
            ));
        }
        Ok(())
    }
}

/// Per-split, per-class copied file counts
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitCounts {
    pub train: BTreeMap<String, usize>,
    pub val: BTreeMap<String, usize>,
    pub test: BTreeMap<String, usize>,
}

impl SplitCounts {
    pub fn get(&self, split: &str) -> Option<&BTreeMap<String, usize>> {
        match split {
            "train" => Some(&self.train),
            "val" => Some(&self.val),
            "test" => Some(&self.test),
            _ => None,
        }
    }

    pub fn total(&self, split: &str) -> usize {
        self.get(split).map(|c| c.values().sum()).unwrap_or(0)
    }
}

/// Copy `data_dir` into a train/val/test folder layout under `output_dir`
///
/// Each class is shuffled independently (one generator, classes in
/// discovered order) and sliced by floor counts; the remainder goes to test.
pub fn materialize_split(
    data_dir: &Path,
    output_dir: &Path,
    class_names: Option<&[String]>,
    config: &MaterializeConfig,
) -> Result<SplitCounts> {
    config.validate()?;
    let (entries, labels) = discover(data_dir, class_names)?;

    if config.overwrite && output_dir.exists() {
        info!("Removing existing output directory {:?}", output_dir);
        fs::remove_dir_all(output_dir)?;
    }

    for split in SPLIT_NAMES {
        for label in &labels {
            fs::create_dir_all(output_dir.join(split).join(label.as_str()))?;
        }
    }

    let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
    let mut counts = SplitCounts::default();

    for entry in &entries {
        let mut images = list_images(&entry.folder_path);
        images.shuffle(&mut rng);

        let n = images.len();
        let n_train = (n as f64 * config.train_ratio).floor() as usize;
        let n_val = (n as f64 * config.val_ratio).floor() as usize;

        let parts: [&[PathBuf]; 3] = [
            &images[..n_train],
            &images[n_train..n_train + n_val],
            &images[n_train + n_val..],
        ];

        let label = entry.label.as_str();
        for (split, part) in SPLIT_NAMES.iter().zip(parts) {
            let target = output_dir.join(split).join(label);
            for src in part {
                if let Some(file_name) = src.file_name() {
                    fs::copy(src, target.join(file_name))?;
                }
            }
            debug!("{}/{}: {} files", split, label, part.len());
        }

        counts.train.insert(label.to_string(), n_train);
        counts.val.insert(label.to_string(), n_val);
        counts.test.insert(label.to_string(), n - n_train - n_val);
    }

    info!(
        "Split written to {:?}: train={} val={} test={}",
        output_dir,
        counts.total("train"),
        counts.total("val"),
        counts.total("test")
    );

    Ok(counts)
}

//! Model persistence formats
//!
//! Two on-disk formats are supported:
//! - **weights-only**: a `.mpk` record written by `CompactRecorder`, with the
//!   architecture config in `{stem}.model.json` beside it. Checkpoints without
//!   that file are rebuilt with default architecture sized by the label count.
//! - **scripted**: a self-describing bundle, a `.bin` record written by
//!   `BinFileRecorder` plus `{stem}.model.json` holding the architecture config.

use std::fmt;
use std::path::{Path, PathBuf};

use burn::config::Config;
use burn::module::Module;
use burn::record::{BinFileRecorder, CompactRecorder, FullPrecisionSettings};
use burn::tensor::backend::Backend;
use tracing::{info, warn};

use super::cnn::{LeafClassifier, LeafClassifierConfig};
use crate::utils::error::{LeafError, Result};
use crate::IMAGE_SIZE;

/// On-disk model format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelFormat {
    Scripted,
    WeightsOnly,
}

impl ModelFormat {
    /// Parse a configured format name; blank means "detect from the extension"
    pub fn parse(raw: &str) -> Result<Option<Self>> {
        match raw.trim().to_lowercase().replace('-', "_").as_str() {
            "" => Ok(None),
            "scripted" | "bundle" => Ok(Some(ModelFormat::Scripted)),
            "weights_only" | "weights" => Ok(Some(ModelFormat::WeightsOnly)),
            other => Err(LeafError::Configuration(format!(
                "Unknown model format '{}' (expected scripted or weights_only)",
                other
            ))),
        }
    }

    /// Explicit format if given, else `.bin` means scripted and anything else weights-only
    pub fn detect(explicit: Option<Self>, model_path: &Path) -> Self {
        explicit.unwrap_or_else(|| {
            let is_bin = model_path
                .extension()
                .map(|ext| ext.to_string_lossy().eq_ignore_ascii_case("bin"))
                .unwrap_or(false);
            if is_bin {
                ModelFormat::Scripted
            } else {
                ModelFormat::WeightsOnly
            }
        })
    }

    /// Model version reported when none is configured or persisted
    pub fn default_version(&self) -> &'static str {
        match self {
            ModelFormat::Scripted => "burn-scripted-v1",
            ModelFormat::WeightsOnly => "burn-weights-v1",
        }
    }
}

impl fmt::Display for ModelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelFormat::Scripted => f.write_str("scripted"),
            ModelFormat::WeightsOnly => f.write_str("weights_only"),
        }
    }
}

/// Architecture config path of a model file (`{stem}.model.json`)
pub fn bundle_config_path(model_path: &Path) -> PathBuf {
    model_path.with_extension("model.json")
}

/// Save parameters (`.mpk`) and the architecture config beside them
pub fn save_weights<B: Backend>(
    model: &LeafClassifier<B>,
    config: &LeafClassifierConfig,
    path: &Path,
) -> Result<()> {
    config.save(bundle_config_path(path))?;
    model
        .clone()
        .save_file(path.to_path_buf(), &CompactRecorder::new())
        .map_err(|e| LeafError::Model(format!("Failed to save weights to {}: {:?}", path.display(), e)))
}

/// Save a self-describing bundle (`.bin` + `.model.json`)
pub fn save_bundle<B: Backend>(
    model: &LeafClassifier<B>,
    config: &LeafClassifierConfig,
    path: &Path,
) -> Result<()> {
    let path = path.with_extension("bin");
    config.save(bundle_config_path(&path))?;
    model
        .clone()
        .save_file(path.clone(), &BinFileRecorder::<FullPrecisionSettings>::new())
        .map_err(|e| LeafError::Model(format!("Failed to save bundle to {}: {:?}", path.display(), e)))
}

/// Load a classifier in the given format
///
/// Both formats use the persisted `.model.json` config when present, which
/// the caller checks against the vocabulary. A weights-only checkpoint
/// without one is rebuilt with the default architecture and `num_classes`
/// outputs.
pub fn load_classifier<B: Backend>(
    path: &Path,
    format: ModelFormat,
    num_classes: usize,
    device: &B::Device,
) -> Result<(LeafClassifier<B>, LeafClassifierConfig)> {
    if !path.is_file() {
        return Err(LeafError::NotFound(path.to_path_buf()));
    }

    let (model, config) = match format {
        ModelFormat::WeightsOnly => {
            let config_path = bundle_config_path(path);
            let config = if config_path.is_file() {
                load_config(&config_path)?
            } else {
                warn!(
                    "No architecture config at {:?}; assuming {}x{} input",
                    config_path, IMAGE_SIZE, IMAGE_SIZE
                );
                LeafClassifierConfig::new(num_classes)
            };
            let model = config
                .init::<B>(device)
                .load_file(path.to_path_buf(), &CompactRecorder::new(), device)
                .map_err(|e| LeafError::Model(format!("Failed to load weights {}: {:?}", path.display(), e)))?;
            (model, config)
        }
        ModelFormat::Scripted => {
            let config_path = bundle_config_path(path);
            if !config_path.is_file() {
                return Err(LeafError::NotFound(config_path));
            }
            let config = load_config(&config_path)?;
            let model = config
                .init::<B>(device)
                .load_file(
                    path.to_path_buf(),
                    &BinFileRecorder::<FullPrecisionSettings>::new(),
                    device,
                )
                .map_err(|e| LeafError::Model(format!("Failed to load bundle {}: {:?}", path.display(), e)))?;
            (model, config)
        }
    };

    info!(
        "Loaded {} model from {:?} ({} classes, {}px input)",
        format,
        path,
        model.num_classes(),
        config.input_size
    );
    Ok((model, config))
}

fn load_config(config_path: &Path) -> Result<LeafClassifierConfig> {
    LeafClassifierConfig::load(config_path)
        .map_err(|e| LeafError::Model(format!("Invalid model config {}: {:?}", config_path.display(), e)))
}

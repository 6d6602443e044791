//! Prediction service
//!
//! Decodes uploaded bytes, runs the quality gate and the configured
//! [`DiseaseModel`], and shapes the per-image response.

use std::path::PathBuf;
use std::time::Instant;

use clap::{ArgAction, Args};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::backend::{default_device, DefaultBackend};
use crate::dataset::crop::{CropHint, CropType};
use crate::inference::quality::{QualityGate, DEFAULT_BLUR_THRESHOLD, DEFAULT_BRIGHTNESS_THRESHOLD};
use crate::inference::scorer::{BurnDiseaseModel, DiseaseModel, MockDiseaseModel};
use crate::model::checkpoint::ModelFormat;
use crate::utils::error::{LeafError, Result};
use crate::utils::{parse_bool_flag, split_csv_arg};

fn bool_flag(raw: &str) -> std::result::Result<bool, String> {
    Ok(parse_bool_flag(raw))
}

/// Model selection, from flags or the environment
#[derive(Debug, Clone, Args)]
pub struct ServiceConfig {
    /// Serve the deterministic mock model instead of trained weights
    #[arg(
        long,
        env = "MOCK_MODEL",
        action = ArgAction::Set,
        num_args = 0..=1,
        default_value = "false",
        default_missing_value = "true",
        value_parser = bool_flag
    )]
    pub mock_model: bool,

    /// Trained model file (.mpk weights or .bin bundle)
    #[arg(long = "model", env = "MODEL_PATH")]
    pub model_path: Option<PathBuf>,

    /// Comma-separated crop:disease labels, overriding the sidecar
    #[arg(long, env = "MODEL_LABELS", default_value = "")]
    pub model_labels: String,

    /// scripted or weights_only (detected from the extension when empty)
    #[arg(long, env = "MODEL_FORMAT", default_value = "")]
    pub model_format: String,

    #[arg(long, env = "MODEL_VERSION")]
    pub model_version: Option<String>,

    /// Mean luma (0-255) below which a photo is flagged as too dark
    #[arg(long, env = "QUALITY_MIN_BRIGHTNESS", default_value_t = DEFAULT_BRIGHTNESS_THRESHOLD)]
    pub min_brightness: f32,

    /// Gradient variance below which a photo is flagged as blurry
    #[arg(long, env = "QUALITY_MIN_SHARPNESS", default_value_t = DEFAULT_BLUR_THRESHOLD)]
    pub min_sharpness: f32,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            mock_model: false,
            model_path: None,
            model_labels: String::new(),
            model_format: String::new(),
            model_version: None,
            min_brightness: DEFAULT_BRIGHTNESS_THRESHOLD,
            min_sharpness: DEFAULT_BLUR_THRESHOLD,
        }
    }
}

impl ServiceConfig {
    pub fn mock() -> Self {
        Self {
            mock_model: true,
            ..Default::default()
        }
    }

    pub fn for_model(model_path: impl Into<PathBuf>) -> Self {
        Self {
            model_path: Some(model_path.into()),
            ..Default::default()
        }
    }

    pub fn labels(&self) -> Vec<String> {
        split_csv_arg(&self.model_labels)
    }

    pub fn quality_gate(&self) -> QualityGate {
        QualityGate::new(self.min_brightness, self.min_sharpness)
    }
}

/// Response for one uploaded image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionResult {
    pub image_id: String,
    pub crop_type: CropType,
    pub disease: String,
    pub confidence: f32,
    pub model_version: String,
    pub latency_ms: f64,
    pub warnings: Vec<String>,
    pub file_name: String,
}

/// Loaded model plus the quality gate, shared by all requests
pub struct InferenceService {
    model: Box<dyn DiseaseModel>,
    quality: QualityGate,
}

impl InferenceService {
    /// Build and load the model selected by `config`
    pub fn from_config(config: &ServiceConfig) -> Result<Self> {
        if config.mock_model {
            info!("Using mock disease model");
            return Ok(Self::with_model(Box::new(MockDiseaseModel::new()))?
                .with_quality_gate(config.quality_gate()));
        }

        let model_path = config.model_path.clone().ok_or_else(|| {
            LeafError::Configuration("MODEL_PATH is required when MOCK_MODEL=false".to_string())
        })?;
        let format = ModelFormat::parse(&config.model_format)?;
        let model = BurnDiseaseModel::<DefaultBackend>::new(
            model_path,
            config.labels(),
            format,
            config.model_version.clone(),
            default_device(),
        );
        Ok(Self::with_model(Box::new(model))?.with_quality_gate(config.quality_gate()))
    }

    /// Wrap a model, loading it first
    pub fn with_model(mut model: Box<dyn DiseaseModel>) -> Result<Self> {
        model.load_model()?;
        Ok(Self {
            model,
            quality: QualityGate::default(),
        })
    }

    pub fn with_quality_gate(mut self, quality: QualityGate) -> Self {
        self.quality = quality;
        self
    }

    pub fn model_version(&self) -> &str {
        self.model.model_version()
    }

    pub fn labels(&self) -> Vec<String> {
        self.model.labels()
    }

    /// Predict a single uploaded image
    pub fn predict_bytes(&self, raw_bytes: &[u8], file_name: &str, hint: CropHint) -> Result<PredictionResult> {
        let started = Instant::now();
        if raw_bytes.is_empty() {
            return Err(LeafError::Image(format!("Empty upload: {}", file_name)));
        }

        let image = image::load_from_memory(raw_bytes)
            .map_err(|e| LeafError::Image(format!("Could not decode {}: {}", file_name, e)))?;
        let quality = self.quality.assess(&image);
        let input = self.model.preprocess(&image)?;
        let prediction = self.model.predict(&input, hint, Some(raw_bytes))?;

        let latency_ms = (started.elapsed().as_secs_f64() * 1000.0 * 100.0).round() / 100.0;
        debug!(
            "{} -> {}:{} ({:.3}) in {:.2} ms",
            file_name, prediction.crop_type, prediction.disease, prediction.confidence, latency_ms
        );

        Ok(PredictionResult {
            image_id: Uuid::new_v4().to_string(),
            crop_type: prediction.crop_type,
            disease: prediction.disease,
            confidence: prediction.confidence,
            model_version: self.model.model_version().to_string(),
            latency_ms,
            warnings: quality.warnings,
            file_name: file_name.to_string(),
        })
    }

    /// Predict a batch of `(file name, bytes)` in input order
    ///
    /// The raw hint is normalized once; any failure fails the whole batch.
    pub fn predict_many<I, S, D>(&self, files: I, crop_hint: Option<&str>) -> Result<Vec<PredictionResult>>
    where
        I: IntoIterator<Item = (S, D)>,
        S: AsRef<str>,
        D: AsRef<[u8]>,
    {
        let hint = CropHint::parse(crop_hint);
        files
            .into_iter()
            .map(|(name, bytes)| self.predict_bytes(bytes.as_ref(), name.as_ref(), hint))
            .collect()
    }
}

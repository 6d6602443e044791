//! Disease model scorers
//!
//! [`DiseaseModel`] is the seam between the prediction service and whatever
//! produces a label for an image. Two implementations exist:
//!
//! - [`MockDiseaseModel`]: deterministic, seeded from the SHA-256 of the
//!   uploaded bytes. Used for demos and API tests without weights.
//! - [`BurnDiseaseModel`]: the trained [`LeafClassifier`] plus the label
//!   vocabulary it was trained with.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use burn::prelude::*;
use image::DynamicImage;
use sha2::{Digest, Sha256};
use tracing::info;

use crate::backend::DefaultBackend;
use crate::dataset::augmentation::Augmenter;
use crate::dataset::burn_dataset::normalized_image_tensor;
use crate::dataset::crop::{CropHint, CropType};
use crate::inference::filter::select_label;
use crate::model::checkpoint::{load_classifier, ModelFormat};
use crate::model::cnn::LeafClassifier;
use crate::model::vocabulary::LabelVocabulary;
use crate::utils::error::{LeafError, Result};
use crate::IMAGE_SIZE;

/// Maize diseases known to the mock model, in output order
pub const MOCK_MAIZE_DISEASES: [&str; 4] = ["healthy", "common_rust", "gray_leaf_spot", "northern_leaf_blight"];
/// Bean diseases known to the mock model, in output order
pub const MOCK_BEAN_DISEASES: [&str; 4] = ["healthy", "bean_rust", "angular_leaf_spot", "anthracnose"];

/// Preprocessed image: CHW data in [0, 1] at `size`×`size`
#[derive(Debug, Clone)]
pub struct ModelInput {
    pub data: Vec<f32>,
    pub size: usize,
}

impl ModelInput {
    fn from_image(image: &DynamicImage, size: usize) -> Self {
        let data = Augmenter::no_augmentation(size as u32).preprocess(image.clone(), None);
        Self { data, size }
    }

    fn plane(&self, channel: usize) -> &[f32] {
        let plane = self.size * self.size;
        &self.data[channel * plane..(channel + 1) * plane]
    }
}

/// Label chosen for one image
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub crop_type: CropType,
    pub disease: String,
    pub confidence: f32,
}

/// A model that maps a preprocessed image to a crop and disease
pub trait DiseaseModel: Send + Sync {
    /// Load weights and labels; called once before the first prediction
    fn load_model(&mut self) -> Result<()>;

    fn preprocess(&self, image: &DynamicImage) -> Result<ModelInput>;

    /// Predict a label, restricted to `hint` when it names a crop
    ///
    /// `raw_bytes` are the uploaded file contents when available.
    fn predict(&self, input: &ModelInput, hint: CropHint, raw_bytes: Option<&[u8]>) -> Result<Prediction>;

    fn model_version(&self) -> &str;

    /// Labels the model can return, as `crop:disease`
    fn labels(&self) -> Vec<String>;
}

/// Deterministic stand-in model
#[derive(Debug, Clone, Default)]
pub struct MockDiseaseModel;

impl MockDiseaseModel {
    pub const VERSION: &'static str = "mock-v1";

    pub fn new() -> Self {
        Self
    }

    /// First 8 bytes of the SHA-256 digest, big-endian
    fn seed(input: &ModelInput, raw_bytes: Option<&[u8]>) -> u64 {
        let digest = match raw_bytes {
            Some(bytes) => Sha256::digest(bytes),
            None => {
                let mut hasher = Sha256::new();
                for value in &input.data {
                    hasher.update(value.to_le_bytes());
                }
                hasher.finalize()
            }
        };
        let mut prefix = [0u8; 8];
        prefix.copy_from_slice(&digest[..8]);
        u64::from_be_bytes(prefix)
    }
}

impl DiseaseModel for MockDiseaseModel {
    fn load_model(&mut self) -> Result<()> {
        Ok(())
    }

    fn preprocess(&self, image: &DynamicImage) -> Result<ModelInput> {
        Ok(ModelInput::from_image(image, IMAGE_SIZE))
    }

    fn predict(&self, input: &ModelInput, hint: CropHint, raw_bytes: Option<&[u8]>) -> Result<Prediction> {
        if input.data.is_empty() {
            return Err(LeafError::Inference("Empty model input".to_string()));
        }
        let seed = Self::seed(input, raw_bytes);

        let mean_green = mean(input.plane(1));
        let contrast = std_dev(&input.data);

        let crop_type = match hint.crop() {
            Some(crop) => crop,
            None if seed % 2 == 0 => CropType::Maize,
            None => CropType::Bean,
        };
        let options: &[&str] = if crop_type == CropType::Maize {
            &MOCK_MAIZE_DISEASES
        } else {
            &MOCK_BEAN_DISEASES
        };

        let disease = if mean_green > 0.45 && contrast < 0.22 {
            "healthy"
        } else {
            options[(seed % options.len() as u64) as usize]
        };

        let base = 0.55 + (seed % 30) as f32 / 100.0;
        let adjustment = (contrast - 0.18).clamp(-0.1, 0.12);
        let confidence = (base + adjustment).clamp(0.51, 0.94);

        Ok(Prediction {
            crop_type,
            disease: disease.to_string(),
            confidence,
        })
    }

    fn model_version(&self) -> &str {
        Self::VERSION
    }

    fn labels(&self) -> Vec<String> {
        MOCK_MAIZE_DISEASES
            .iter()
            .map(|d| format!("maize:{}", d))
            .chain(MOCK_BEAN_DISEASES.iter().map(|d| format!("bean:{}", d)))
            .collect()
    }
}

/// Trained CNN behind the scorer seam
///
/// The classifier sits behind a `Mutex` so one loaded model can be shared
/// by concurrent request handlers.
pub struct BurnDiseaseModel<B: Backend = DefaultBackend> {
    model_path: PathBuf,
    explicit_labels: Vec<String>,
    format: ModelFormat,
    configured_version: Option<String>,
    model_version: String,
    vocabulary: Option<LabelVocabulary>,
    input_size: usize,
    model: Option<Mutex<LeafClassifier<B>>>,
    device: B::Device,
}

impl<B: Backend> BurnDiseaseModel<B> {
    /// Model at `model_path`; `format` is detected from the extension when `None`
    pub fn new(
        model_path: impl AsRef<Path>,
        explicit_labels: Vec<String>,
        format: Option<ModelFormat>,
        model_version: Option<String>,
        device: B::Device,
    ) -> Self {
        let model_path = model_path.as_ref().to_path_buf();
        let format = ModelFormat::detect(format, &model_path);
        let configured_version = model_version
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());
        Self {
            model_version: configured_version
                .clone()
                .unwrap_or_else(|| format.default_version().to_string()),
            model_path,
            explicit_labels,
            format,
            configured_version,
            vocabulary: None,
            input_size: IMAGE_SIZE,
            model: None,
            device,
        }
    }

    pub fn format(&self) -> ModelFormat {
        self.format
    }

    fn logits(&self, input: &ModelInput) -> Result<Vec<f32>> {
        let model = self
            .model
            .as_ref()
            .ok_or_else(|| LeafError::Model("Model is not loaded".to_string()))?;
        let model = model
            .lock()
            .map_err(|_| LeafError::Inference("Model lock poisoned".to_string()))?;

        let images = normalized_image_tensor::<B>(input.data.clone(), 1, input.size, &self.device);
        let output = model.forward(images);
        output
            .into_data()
            .convert::<f32>()
            .to_vec::<f32>()
            .map_err(|e| LeafError::Inference(format!("Failed to read logits: {:?}", e)))
    }
}

impl<B: Backend> DiseaseModel for BurnDiseaseModel<B> {
    fn load_model(&mut self) -> Result<()> {
        let (vocabulary, metadata) = LabelVocabulary::resolve(&self.explicit_labels, &self.model_path)?;

        if self.configured_version.is_none() {
            if let Some(version) = metadata
                .as_ref()
                .and_then(|m| m.model_version.as_deref())
                .map(str::trim)
                .filter(|v| !v.is_empty())
            {
                self.model_version = version.to_string();
            }
        }

        let (model, config) =
            load_classifier::<B>(&self.model_path, self.format, vocabulary.len(), &self.device)?;
        vocabulary.check_head_size(model.num_classes())?;

        info!(
            "Model {} ready: {} labels over {:?}",
            self.model_version,
            vocabulary.len(),
            vocabulary.crops()
        );

        self.input_size = config.input_size;
        self.vocabulary = Some(vocabulary);
        self.model = Some(Mutex::new(model));
        Ok(())
    }

    fn preprocess(&self, image: &DynamicImage) -> Result<ModelInput> {
        if self.model.is_none() {
            return Err(LeafError::Model("Model is not loaded".to_string()));
        }
        Ok(ModelInput::from_image(image, self.input_size))
    }

    fn predict(&self, input: &ModelInput, hint: CropHint, _raw_bytes: Option<&[u8]>) -> Result<Prediction> {
        let vocabulary = self
            .vocabulary
            .as_ref()
            .ok_or_else(|| LeafError::Model("Model is not loaded".to_string()))?;
        let logits = self.logits(input)?;
        let choice = select_label(&logits, vocabulary, hint)?;

        Ok(Prediction {
            crop_type: choice.crop,
            disease: choice.disease,
            confidence: choice.confidence,
        })
    }

    fn model_version(&self) -> &str {
        &self.model_version
    }

    fn labels(&self) -> Vec<String> {
        self.vocabulary
            .as_ref()
            .map(LabelVocabulary::label_strings)
            .unwrap_or_default()
    }
}

fn mean(values: &[f32]) -> f32 {
    mean_f64(values) as f32
}

fn mean_f64(values: &[f32]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().map(|&v| v as f64).sum::<f64>() / values.len() as f64
}

fn std_dev(values: &[f32]) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean_f64(values);
    let var = values
        .iter()
        .map(|&v| (v as f64 - m) * (v as f64 - m))
        .sum::<f64>()
        / values.len() as f64;
    var.sqrt() as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::checkpoint::save_weights;
    use crate::model::cnn::LeafClassifierConfig;
    use crate::model::vocabulary::{sidecar_path, LabelMetadata};
    use burn_ndarray::NdArray;
    use image::{ImageBuffer, Rgb, RgbImage};

    type TestBackend = NdArray<f32>;

    fn flat_image(rgb: [u8; 3]) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(32, 32, Rgb(rgb)))
    }

    fn noisy_image() -> DynamicImage {
        DynamicImage::ImageRgb8(ImageBuffer::from_fn(32, 32, |x, y| {
            let v = ((x * 37 + y * 91) % 256) as u8;
            Rgb([v, 255 - v, v / 2])
        }))
    }

    #[test]
    fn test_mock_is_deterministic() {
        let model = MockDiseaseModel::new();
        let input = model.preprocess(&noisy_image()).unwrap();
        let a = model.predict(&input, CropHint::Auto, Some(b"leaf-bytes")).unwrap();
        let b = model.predict(&input, CropHint::Auto, Some(b"leaf-bytes")).unwrap();
        assert_eq!(a, b);
        assert!((0.51..=0.94).contains(&a.confidence));
    }

    #[test]
    fn test_mock_respects_hint() {
        let model = MockDiseaseModel::new();
        let input = model.preprocess(&noisy_image()).unwrap();
        for seed_text in ["one", "two", "three", "four"] {
            let bytes = seed_text.as_bytes();
            let bean = model.predict(&input, CropHint::Bean, Some(bytes)).unwrap();
            assert_eq!(bean.crop_type, CropType::Bean);
            assert!(MOCK_BEAN_DISEASES.contains(&bean.disease.as_str()));

            let maize = model.predict(&input, CropHint::Maize, Some(bytes)).unwrap();
            assert_eq!(maize.crop_type, CropType::Maize);
            assert!(MOCK_MAIZE_DISEASES.contains(&maize.disease.as_str()));
        }
    }

    #[test]
    fn test_mock_green_flat_leaf_is_healthy() {
        let model = MockDiseaseModel::new();
        let input = model.preprocess(&flat_image([120, 150, 120])).unwrap();
        let prediction = model.predict(&input, CropHint::Auto, Some(b"green")).unwrap();
        assert_eq!(prediction.disease, "healthy");
    }

    #[test]
    fn test_mock_seed_uses_digest_prefix() {
        let input = ModelInput { data: vec![0.0; 3], size: 1 };
        // sha256("abc") = ba7816bf8f01cfea...
        assert_eq!(MockDiseaseModel::seed(&input, Some(b"abc")), 0xba78_16bf_8f01_cfea);
    }

    #[test]
    fn test_burn_model_uses_sidecar_labels_and_version() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("best_model.mpk");
        let device = Default::default();

        let config = LeafClassifierConfig::new(3);
        let classifier: LeafClassifier<TestBackend> = config.init(&device);
        save_weights(&classifier, &config, &path).unwrap();

        let metadata = LabelMetadata {
            class_names: vec!["healthy".into(), "bean_rust".into(), "angular_leaf_spot".into()],
            crop_type: "bean".into(),
            model_version: Some("beans-2024-06".into()),
            ..Default::default()
        };
        metadata.save(&sidecar_path(&path)).unwrap();

        let mut model = BurnDiseaseModel::<TestBackend>::new(&path, Vec::new(), None, None, device);
        model.load_model().unwrap();
        assert_eq!(model.model_version(), "beans-2024-06");
        assert_eq!(
            model.labels(),
            vec!["bean:healthy", "bean:bean_rust", "bean:angular_leaf_spot"]
        );

        let input = model.preprocess(&noisy_image()).unwrap();
        assert_eq!(input.size, IMAGE_SIZE);
        let prediction = model.predict(&input, CropHint::Maize, None).unwrap();
        assert_eq!(prediction.crop_type, CropType::Bean);
        assert!((0.0..=1.0).contains(&prediction.confidence));
    }

    #[test]
    fn test_burn_model_rejects_head_size_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("leaf.bin");
        let device = Default::default();

        let config = LeafClassifierConfig::new(2).with_base_filters(2);
        let classifier: LeafClassifier<TestBackend> = config.init(&device);
        crate::model::checkpoint::save_bundle(&classifier, &config, &path).unwrap();

        let labels = vec!["maize:healthy".to_string(), "maize:common_rust".into(), "maize:gray_leaf_spot".into()];
        let mut model = BurnDiseaseModel::<TestBackend>::new(&path, labels, None, Some("v9".into()), device);
        assert_eq!(model.format(), ModelFormat::Scripted);
        let err = model.load_model().unwrap_err();
        assert!(matches!(err, LeafError::VocabularyMismatch(_)));
    }

    #[test]
    fn test_burn_model_requires_labels() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("orphan.mpk");
        std::fs::write(&path, b"").unwrap();
        let mut model = BurnDiseaseModel::<TestBackend>::new(&path, Vec::new(), None, None, Default::default());
        assert!(matches!(model.load_model().unwrap_err(), LeafError::VocabularyMismatch(_)));
    }
}

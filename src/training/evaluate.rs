//! Test-split evaluation
//!
//! Rebuilds the deterministic split of a dataset, runs the saved model over
//! the test portion and reports per-class precision/recall/F1 plus the
//! confusion matrix.

use std::path::PathBuf;

use burn::{data::dataloader::batcher::Batcher, data::dataset::Dataset, prelude::*};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use super::supervised::tensor_to_indices;
use crate::dataset::burn_dataset::{LeafBatch, LeafBatcher, LeafBurnDataset, LeafItem};
use crate::dataset::loader::LeafDataset;
use crate::dataset::split::{stratified_split, SplitConfig};
use crate::model::checkpoint::{load_classifier, ModelFormat};
use crate::model::cnn::LeafClassifier;
use crate::model::vocabulary::{class_list_mismatch, LabelMetadata};
use crate::utils::error::{LeafError, Result};
use crate::utils::metrics::ClassificationReport;

#[derive(Debug, Clone)]
pub struct EvaluationConfig {
    pub model_path: PathBuf,
    pub data_dir: Option<PathBuf>,
    pub data_dirs: Vec<PathBuf>,
    pub class_names: Option<Vec<String>>,
    pub batch_size: usize,
    /// Must match the split used for training
    pub split: SplitConfig,
    /// Detected from the model extension when `None`
    pub format: Option<ModelFormat>,
    /// Write the confusion matrix here as CSV
    pub confusion_csv: Option<PathBuf>,
}

impl EvaluationConfig {
    pub fn new(model_path: impl Into<PathBuf>, data_dir: impl Into<PathBuf>) -> Self {
        Self {
            model_path: model_path.into(),
            data_dir: Some(data_dir.into()),
            data_dirs: Vec::new(),
            class_names: None,
            batch_size: super::DEFAULT_BATCH_SIZE,
            split: SplitConfig::default(),
            format: None,
            confusion_csv: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EvaluationOutcome {
    pub class_names: Vec<String>,
    pub report: ClassificationReport,
    /// Set when the dataset classes differ from the model's sidecar
    pub class_mismatch: Option<String>,
}

/// Evaluate a saved model on the test split of a dataset
pub fn run_evaluation<B: Backend>(config: &EvaluationConfig, device: &B::Device) -> Result<EvaluationOutcome> {
    if config.batch_size == 0 {
        return Err(LeafError::Configuration("batch size must be greater than 0".to_string()));
    }

    let dataset = LeafDataset::load(
        config.data_dir.as_deref(),
        &config.data_dirs,
        config.class_names.as_deref(),
    )?;
    info!("Detected test classes: {:?}", dataset.class_names);

    let class_mismatch = match LabelMetadata::find_for_model(&config.model_path) {
        Some((metadata, path)) => {
            info!("Loaded model label metadata: {:?}", path);
            let mismatch = class_list_mismatch(&dataset.class_names, &metadata);
            if let Some(message) = &mismatch {
                warn!("{}", message);
            }
            mismatch
        }
        None => None,
    };

    let splits = stratified_split(&dataset.samples, &config.split)?;
    if splits.test.is_empty() {
        return Err(LeafError::EmptyDataset("The test split is empty".to_string()));
    }
    let test_dataset = LeafBurnDataset::from_indices(&dataset.samples, &splits.test);

    let format = ModelFormat::detect(config.format, &config.model_path);
    let (model, model_config) =
        load_classifier::<B>(&config.model_path, format, dataset.num_classes(), device)?;
    if model.num_classes() != dataset.num_classes() {
        return Err(LeafError::VocabularyMismatch(format!(
            "Model has {} outputs but the dataset has {} classes",
            model.num_classes(),
            dataset.num_classes()
        )));
    }

    info!("Evaluating on test set ({} images)...", test_dataset.len());
    let batcher = LeafBatcher::new(model_config.input_size);
    let predictions = predict_all(&model, &test_dataset, &batcher, config.batch_size, device)?;
    let report = ClassificationReport::from_predictions(&predictions, &test_dataset.labels(), &dataset.class_names);

    if let Some(csv_path) = &config.confusion_csv {
        report
            .confusion_matrix
            .save_csv(csv_path, &dataset.class_names)?;
        info!("Confusion matrix saved to {:?}", csv_path);
    }

    Ok(EvaluationOutcome {
        class_names: dataset.class_names,
        report,
        class_mismatch,
    })
}

/// Arg-max class of every item, in dataset order
pub fn predict_all<B: Backend>(
    model: &LeafClassifier<B>,
    dataset: &LeafBurnDataset,
    batcher: &LeafBatcher,
    batch_size: usize,
    device: &B::Device,
) -> Result<Vec<usize>> {
    let mut predictions = Vec::with_capacity(dataset.len());

    let progress = ProgressBar::new(dataset.len() as u64);
    progress.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} images ({eta})")
            .map(|style| style.progress_chars("=>-"))
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );

    for start in (0..dataset.len()).step_by(batch_size.max(1)) {
        let end = (start + batch_size).min(dataset.len());
        let items: Vec<LeafItem> = (start..end).filter_map(|i| dataset.get(i)).collect();
        if items.is_empty() {
            continue;
        }
        let n = items.len();
        let batch: LeafBatch<B> = batcher.batch(items, device);
        let output = model.forward(batch.images);
        predictions.extend(tensor_to_indices(output.argmax(1).reshape([n]))?);
        progress.inc(n as u64);
    }

    progress.finish_and_clear();
    Ok(predictions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::checkpoint::save_weights;
    use crate::model::cnn::LeafClassifierConfig;
    use crate::model::vocabulary::sidecar_path;
    use burn_ndarray::NdArray;
    use image::{ImageBuffer, Rgb};
    use std::path::Path;

    type TestBackend = NdArray<f32>;

    fn write_class(root: &Path, name: &str, count: usize) {
        let dir = root.join(name);
        std::fs::create_dir_all(&dir).unwrap();
        for i in 0..count {
            ImageBuffer::from_pixel(8, 8, Rgb([i as u8 * 20, 90, 30]))
                .save(dir.join(format!("{i}.png")))
                .unwrap();
        }
    }

    #[test]
    fn test_evaluation_reports_every_test_image() {
        let data = tempfile::tempdir().unwrap();
        write_class(data.path(), "healthy", 5);
        write_class(data.path(), "common_rust", 5);
        write_class(data.path(), "gray_leaf_spot", 5);

        let models = tempfile::tempdir().unwrap();
        let model_path = models.path().join("best_model.mpk");
        let device = Default::default();
        let model_config = LeafClassifierConfig::new(3);
        let model: LeafClassifier<TestBackend> = model_config.init(&device);
        save_weights(&model, &model_config, &model_path).unwrap();

        // Sidecar lists a different class order: warned, not fatal
        let metadata = LabelMetadata {
            class_names: vec!["common_rust".into(), "healthy".into(), "gray_leaf_spot".into()],
            crop_type: "maize".into(),
            ..Default::default()
        };
        metadata.save(&sidecar_path(&model_path)).unwrap();

        let csv = models.path().join("confusion.csv");
        let mut config = EvaluationConfig::new(&model_path, data.path());
        config.confusion_csv = Some(csv.clone());

        let outcome = run_evaluation::<TestBackend>(&config, &device).unwrap();
        assert_eq!(outcome.class_names, vec!["healthy", "common_rust", "gray_leaf_spot"]);
        assert!(outcome.class_mismatch.is_some());
        // 5 per class split 2/1/2
        assert_eq!(outcome.report.total_samples, 6);
        assert!(csv.is_file());
    }

    #[test]
    fn test_missing_model_is_not_found() {
        let data = tempfile::tempdir().unwrap();
        write_class(data.path(), "healthy", 4);
        write_class(data.path(), "bean_rust", 4);

        let config = EvaluationConfig::new(data.path().join("none.mpk"), data.path());
        let err = run_evaluation::<TestBackend>(&config, &Default::default()).unwrap_err();
        assert!(matches!(err, LeafError::NotFound(_)));
    }
}

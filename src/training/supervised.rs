//! Supervised Training Implementation
//!
//! A custom training loop over Burn's optimizer API rather than the
//! high-level `LearnerBuilder`, so that checkpointing can write the label
//! sidecar alongside every new best model.

use std::collections::BTreeMap;
use std::path::PathBuf;

use burn::{
    data::dataloader::batcher::Batcher,
    data::dataset::Dataset,
    module::AutodiffModule,
    nn::loss::{CrossEntropyLoss, CrossEntropyLossConfig},
    optim::{AdamConfig, GradientsParams, Optimizer},
    prelude::*,
    tensor::{backend::AutodiffBackend, ElementConversion},
};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{info, warn};

use super::TrainingConfig;
use crate::dataset::augmentation::AugmentationConfig;
use crate::dataset::burn_dataset::{LeafBatch, LeafBatcher, LeafBurnDataset, LeafItem};
use crate::dataset::loader::LeafDataset;
use crate::dataset::split::{stratified_split, DatasetSplits};
use crate::model::checkpoint::save_weights;
use crate::model::cnn::{LeafClassifier, LeafClassifierConfig};
use crate::model::vocabulary::{sidecar_path, LabelMetadata};
use crate::utils::error::{LeafError, Result};
use crate::utils::logging::TrainingLogger;
use crate::utils::metrics::{AccuracyTracker, RunningAverage};

/// Result of a finished training run
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    pub best_val_accuracy: f64,
    /// Best checkpoint; the first epoch always writes one
    pub model_path: Option<PathBuf>,
    pub metadata_path: Option<PathBuf>,
    pub class_names: Vec<String>,
    pub splits: DatasetSplits,
}

/// Inverse-frequency class weights: `total / (num_classes * count)`, 1.0 for absent classes
pub fn class_weights(train_labels: &[usize], num_classes: usize) -> Vec<f32> {
    let mut counts = vec![0usize; num_classes];
    for &label in train_labels {
        if let Some(count) = counts.get_mut(label) {
            *count += 1;
        }
    }
    let total = train_labels.len() as f32;
    counts
        .iter()
        .map(|&count| {
            if count > 0 {
                total / (num_classes as f32 * count as f32)
            } else {
                1.0
            }
        })
        .collect()
}

/// Run training with the given configuration
///
/// # Type Parameters
/// * `B` - The autodiff backend to use (e.g., `Autodiff<NdArray>` or `Autodiff<Cuda>`)
pub fn run_training<B>(config: &TrainingConfig, device: &B::Device) -> Result<TrainingOutcome>
where
    B: AutodiffBackend,
{
    if config.epochs == 0 || config.batch_size == 0 {
        return Err(LeafError::Configuration(
            "epochs and batch size must be greater than 0".to_string(),
        ));
    }
    config.split.validate()?;
    std::fs::create_dir_all(&config.output_dir)?;

    let dataset = LeafDataset::load(
        config.data_dir.as_deref(),
        &config.data_dirs,
        config.class_names.as_deref(),
    )?;
    let num_classes = dataset.num_classes();

    info!("Detected crop type: {}", dataset.crop_type);
    info!("Detected classes ({}): {:?}", num_classes, dataset.class_names);
    if !dataset.source_dirs.is_empty() {
        info!("Source directories: {:?}", dataset.source_dirs);
    }

    let splits = stratified_split(&dataset.samples, &config.split)?;
    info!("Stratified split: {}", splits);
    if splits.train.is_empty() {
        return Err(LeafError::EmptyDataset(
            "The train split is empty; add more images per class".to_string(),
        ));
    }

    let train_dataset = LeafBurnDataset::from_indices(&dataset.samples, &splits.train);
    let val_dataset = LeafBurnDataset::from_indices(&dataset.samples, &splits.val);
    let train_labels = train_dataset.labels();

    let distribution: BTreeMap<&str, usize> = dataset
        .class_names
        .iter()
        .map(String::as_str)
        .zip(DatasetSplits::class_counts(&splits.train, &dataset.samples, num_classes))
        .collect();
    info!("Training distribution: {:?}", distribution);

    let weights = class_weights(&train_labels, num_classes);
    info!("Class weights: {:?}", weights);

    let model_config = LeafClassifierConfig::new(num_classes)
        .with_input_size(config.image_size)
        .with_base_filters(config.base_filters);
    let mut model: LeafClassifier<B> = model_config.init(device);
    let loss_fn = CrossEntropyLossConfig::new()
        .with_weights(Some(weights.clone()))
        .init(device);
    let val_loss_fn = CrossEntropyLossConfig::new()
        .with_weights(Some(weights))
        .init(device);
    let mut optimizer = AdamConfig::new().init();

    let train_batcher = if config.augmentation {
        LeafBatcher::augmenting(config.image_size, AugmentationConfig::default())
    } else {
        LeafBatcher::new(config.image_size)
    };
    let val_batcher = LeafBatcher::new(config.image_size);

    if val_dataset.is_empty() {
        warn!("Validation split is empty; selecting the best model on train accuracy");
    }

    let model_path = config.best_model_path();
    let mut best_val_acc: Option<f64> = None;
    let mut saved_model: Option<PathBuf> = None;
    let mut saved_metadata: Option<PathBuf> = None;
    let mut epoch_rng = ChaCha8Rng::seed_from_u64(config.split.seed);
    let mut logger = TrainingLogger::new(config.epochs);

    for epoch in 0..config.epochs {
        logger.start_epoch(epoch);

        // Training phase
        let mut train_loss = RunningAverage::new();
        let mut train_acc = AccuracyTracker::new();

        let mut indices: Vec<usize> = (0..train_dataset.len()).collect();
        indices.shuffle(&mut epoch_rng);

        for chunk in indices.chunks(config.batch_size) {
            let items: Vec<LeafItem> = chunk.iter().filter_map(|&i| train_dataset.get(i)).collect();
            if items.is_empty() {
                continue;
            }
            let batch_size = items.len();
            let batch: LeafBatch<B> = train_batcher.batch(items, device);

            let output = model.forward(batch.images);
            let loss = loss_fn.forward(output.clone(), batch.targets.clone());

            let loss_value: f64 = loss.clone().into_scalar().elem();
            train_loss.add_weighted(loss_value, batch_size);
            train_acc.add_batch(
                &tensor_to_indices(output.argmax(1).reshape([batch_size]))?,
                &tensor_to_indices(batch.targets)?,
            );

            let grads = loss.backward();
            let grads = GradientsParams::from_grads(grads, &model);
            model = optimizer.step(config.learning_rate, model, grads);
        }

        logger.end_phase("train", train_loss.average(), train_acc.accuracy());

        // Validation phase
        let selection_acc = if val_dataset.is_empty() {
            train_acc.accuracy()
        } else {
            let (val_loss, val_acc) = evaluate_split(
                &model.valid(),
                &val_dataset,
                &val_batcher,
                &val_loss_fn,
                config.batch_size,
                device,
            )?;
            logger.end_phase("val", val_loss, val_acc);
            val_acc
        };

        if best_val_acc.map_or(true, |best| selection_acc > best) {
            best_val_acc = Some(selection_acc);
            save_weights(&model, &model_config, &model_path)?;

            let metadata = LabelMetadata::for_training(
                &dataset.class_names,
                dataset.crop_type,
                &dataset.source_dirs,
                &dataset.roots,
                selection_acc,
            );
            let metadata_path = sidecar_path(&model_path);
            metadata.save(&metadata_path)?;

            logger.log_new_best(selection_acc);
            info!("Saved label metadata: {:?}", metadata_path);
            saved_model = Some(model_path.clone());
            saved_metadata = Some(metadata_path);
        }

        logger.end_epoch();
    }

    let best_val_acc = best_val_acc.unwrap_or(0.0);
    logger.log_complete(best_val_acc);

    Ok(TrainingOutcome {
        best_val_accuracy: best_val_acc,
        model_path: saved_model,
        metadata_path: saved_metadata,
        class_names: dataset.class_names,
        splits,
    })
}

/// Average weighted loss and accuracy of a model over a dataset
fn evaluate_split<B: Backend>(
    model: &LeafClassifier<B>,
    dataset: &LeafBurnDataset,
    batcher: &LeafBatcher,
    loss_fn: &CrossEntropyLoss<B>,
    batch_size: usize,
    device: &B::Device,
) -> Result<(f64, f64)> {
    let mut loss_avg = RunningAverage::new();
    let mut accuracy = AccuracyTracker::new();

    for start in (0..dataset.len()).step_by(batch_size) {
        let end = (start + batch_size).min(dataset.len());
        let items: Vec<LeafItem> = (start..end).filter_map(|i| dataset.get(i)).collect();
        if items.is_empty() {
            continue;
        }
        let n = items.len();
        let batch: LeafBatch<B> = batcher.batch(items, device);

        let output = model.forward(batch.images);
        let loss: f64 = loss_fn
            .forward(output.clone(), batch.targets.clone())
            .into_scalar()
            .elem();
        loss_avg.add_weighted(loss, n);
        accuracy.add_batch(
            &tensor_to_indices(output.argmax(1).reshape([n]))?,
            &tensor_to_indices(batch.targets)?,
        );
    }

    Ok((loss_avg.average(), accuracy.accuracy()))
}

/// Read an integer tensor back as class indices
pub(crate) fn tensor_to_indices<B: Backend>(tensor: Tensor<B, 1, Int>) -> Result<Vec<usize>> {
    let values = tensor
        .into_data()
        .convert::<i64>()
        .to_vec::<i64>()
        .map_err(|e| LeafError::Model(format!("Failed to read tensor data: {:?}", e)))?;
    Ok(values.into_iter().map(|v| v.max(0) as usize).collect())
}

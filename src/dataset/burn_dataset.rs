//! Burn Dataset Integration
//!
//! Implements Burn's `Dataset` trait over a split of the sample list and a
//! `Batcher` that decodes, optionally augments and normalizes images.
//!
//! Images are decoded in the batcher on the rayon pool, one image per
//! sample. An image that fails to decode is logged and replaced by a black
//! placeholder so a single corrupt file never aborts an epoch.

use std::path::{Path, PathBuf};

use burn::data::dataloader::batcher::Batcher;
use burn::data::dataset::Dataset;
use burn::prelude::*;
use image::{DynamicImage, ImageReader, RgbImage};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::dataset::augmentation::{AugmentationConfig, Augmenter};
use crate::dataset::loader::Sample;
use crate::IMAGE_SIZE;

/// ImageNet channel means
pub const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
/// ImageNet channel standard deviations
pub const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// A single sample reference ready for batching
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeafItem {
    pub path: PathBuf,
    pub label: usize,
}

/// Burn dataset over a subset of samples
#[derive(Debug, Clone)]
pub struct LeafBurnDataset {
    items: Vec<LeafItem>,
}

impl LeafBurnDataset {
    /// Dataset over `indices` of `samples`, in index order
    pub fn from_indices(samples: &[Sample], indices: &[usize]) -> Self {
        let items = indices
            .iter()
            .filter_map(|&idx| samples.get(idx))
            .map(|s| LeafItem {
                path: s.path.clone(),
                label: s.label,
            })
            .collect();
        Self { items }
    }

    /// Labels of all items, in order
    pub fn labels(&self) -> Vec<usize> {
        self.items.iter().map(|item| item.label).collect()
    }
}

impl Dataset<LeafItem> for LeafBurnDataset {
    fn get(&self, index: usize) -> Option<LeafItem> {
        self.items.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.items.len()
    }
}

/// Decode an image, or a black placeholder of `size`×`size` if it cannot be read
pub fn load_or_placeholder(path: &Path, size: u32) -> DynamicImage {
    let decoded = ImageReader::open(path)
        .map_err(image::ImageError::IoError)
        .and_then(|reader| reader.with_guessed_format().map_err(image::ImageError::IoError))
        .and_then(|reader| reader.decode());

    match decoded {
        Ok(img) => img,
        Err(e) => {
            warn!("Error loading image {:?}: {}", path, e);
            DynamicImage::ImageRgb8(RgbImage::new(size, size))
        }
    }
}

/// Build a `[batch, 3, size, size]` tensor from CHW data and apply ImageNet normalization
pub fn normalized_image_tensor<B: Backend>(
    data: Vec<f32>,
    batch_size: usize,
    image_size: usize,
    device: &B::Device,
) -> Tensor<B, 4> {
    let images = Tensor::<B, 4>::from_floats(
        TensorData::new(data, [batch_size, 3, image_size, image_size]),
        device,
    );
    let mean = Tensor::<B, 4>::from_floats(TensorData::new(IMAGENET_MEAN.to_vec(), [1, 3, 1, 1]), device);
    let std = Tensor::<B, 4>::from_floats(TensorData::new(IMAGENET_STD.to_vec(), [1, 3, 1, 1]), device);

    (images - mean) / std
}

/// A batch of leaf images for training
#[derive(Clone, Debug)]
pub struct LeafBatch<B: Backend> {
    /// Images with shape [batch_size, 3, height, width]
    pub images: Tensor<B, 4>,
    /// Labels with shape [batch_size]
    pub targets: Tensor<B, 1, Int>,
}

/// Batcher that decodes, optionally augments and normalizes images
#[derive(Clone, Debug)]
pub struct LeafBatcher {
    augmenter: Augmenter,
    augment: bool,
}

impl LeafBatcher {
    /// Batcher for validation, test and inference (resize only)
    pub fn new(image_size: usize) -> Self {
        Self {
            augmenter: Augmenter::no_augmentation(image_size as u32),
            augment: false,
        }
    }

    /// Batcher for the train split
    pub fn augmenting(image_size: usize, config: AugmentationConfig) -> Self {
        Self {
            augmenter: Augmenter::new(config, image_size as u32),
            augment: true,
        }
    }

    pub fn image_size(&self) -> usize {
        self.augmenter.image_size() as usize
    }
}

impl Default for LeafBatcher {
    fn default() -> Self {
        Self::new(IMAGE_SIZE)
    }
}

impl<B: Backend> Batcher<B, LeafItem, LeafBatch<B>> for LeafBatcher {
    fn batch(&self, items: Vec<LeafItem>, device: &B::Device) -> LeafBatch<B> {
        let batch_size = items.len();
        let image_size = self.image_size();

        // One seed per item so parallel decoding stays independent
        let seeds: Vec<Option<u64>> = items
            .iter()
            .map(|_| self.augment.then(rand::random::<u64>))
            .collect();

        let images_data: Vec<f32> = items
            .par_iter()
            .zip(seeds.par_iter())
            .flat_map_iter(|(item, seed)| {
                let img = load_or_placeholder(&item.path, image_size as u32);
                let mut rng = seed.map(ChaCha8Rng::seed_from_u64);
                self.augmenter.preprocess(img, rng.as_mut())
            })
            .collect();

        let images = normalized_image_tensor::<B>(images_data, batch_size, image_size, device);

        let targets_data: Vec<i64> = items.iter().map(|item| item.label as i64).collect();
        let targets = Tensor::<B, 1, Int>::from_data(TensorData::new(targets_data, [batch_size]), device);

        LeafBatch { images, targets }
    }
}

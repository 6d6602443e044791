//! Dataset module for bean and maize leaf images
//!
//! This module provides functionality for:
//! - Normalizing class folder names into canonical disease labels
//! - Inferring the crop of a dataset from its labels
//! - Discovering one dataset root and aggregating several into a
//!   crop-namespaced label space
//! - Deterministic stratified train/val/test splitting
//! - Materializing a split on disk
//! - Burn dataset/batcher plumbing and training augmentation

pub mod augmentation;
pub mod burn_dataset;
pub mod crop;
pub mod discovery;
pub mod labels;
pub mod loader;
pub mod prepare;
pub mod split;

// Re-export main types for convenience
pub use burn_dataset::{LeafBatch, LeafBatcher, LeafBurnDataset, LeafItem};
pub use crop::{infer_crop, CropHint, CropType};
pub use discovery::{discover, DatasetEntry};
pub use labels::{normalize, CanonicalLabel, PrefixedLabel};
pub use loader::{DatasetStats, LeafDataset, Sample};
pub use split::{stratified_split, DatasetSplits, SplitConfig};

/// Bean vocabulary in its fixed class order
pub const BEAN_CLASS_NAMES: [&str; 3] = ["healthy", "bean_rust", "angular_leaf_spot"];

/// Maize vocabulary in its fixed class order
pub const MAIZE_CLASS_NAMES: [&str; 4] = [
    "healthy",
    "common_rust",
    "gray_leaf_spot",
    "northern_leaf_blight",
];

/// Accepted image extensions (compared case-insensitively)
pub const IMAGE_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "webp"];

/// Check if a label names a healthy leaf, with or without a crop prefix
pub fn is_healthy_label(label: &str) -> bool {
    label.rsplit(':').next().map(|d| d == "healthy").unwrap_or(false)
}

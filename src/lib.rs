//! # leafscan
//!
//! Bean and maize leaf disease classification built on the Burn framework.
//!
//! The heart of the crate is the data contract shared by training and
//! inference: folder names are normalized into canonical disease labels,
//! datasets from several crops are merged into one `crop:disease` label
//! space, samples are split per class with a fixed seed, and the resulting
//! label vocabulary is persisted next to the weights so the inference
//! service can restrict predictions to a crop hint.
//!
//! ## Modules
//!
//! - `dataset`: label normalization, crop inference, discovery, aggregation,
//!   stratified splitting and Burn batching
//! - `model`: CNN architecture, checkpoint formats and the persisted label
//!   vocabulary
//! - `training`: supervised training loop and evaluation
//! - `inference`: crop-hint label filter, image quality gate, model scorers
//!   and the prediction service
//! - `utils`: logging, metrics and error types
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use leafscan::dataset::LeafDataset;
//! use leafscan::dataset::split::{stratified_split, SplitConfig};
//!
//! let dataset = LeafDataset::from_roots(&["data/beans", "data/maize"])?;
//! let splits = stratified_split(&dataset.samples, &SplitConfig::default())?;
//! ```

pub mod backend;
pub mod dataset;
pub mod inference;
pub mod model;
pub mod training;
pub mod utils;

// Re-export commonly used items for convenience
pub use dataset::crop::{CropHint, CropType};
pub use dataset::labels::{normalize, CanonicalLabel};
pub use dataset::loader::LeafDataset;
pub use dataset::split::{stratified_split, DatasetSplits, SplitConfig};
pub use inference::service::{InferenceService, PredictionResult, ServiceConfig};
pub use model::cnn::{LeafClassifier, LeafClassifierConfig};
pub use model::vocabulary::{LabelMetadata, LabelVocabulary};
pub use utils::error::{LeafError, Result};

/// Default input size (height and width) of the classifier
pub const IMAGE_SIZE: usize = 224;

/// Maximum number of images accepted by one prediction request
pub const MAX_IMAGES_PER_REQUEST: usize = 5;

/// Version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

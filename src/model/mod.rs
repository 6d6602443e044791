//! Model module: CNN architecture, persistence formats and the label vocabulary

pub mod checkpoint;
pub mod cnn;
pub mod vocabulary;

pub use checkpoint::{load_classifier, save_bundle, save_weights, ModelFormat};
pub use cnn::{LeafClassifier, LeafClassifierConfig};
pub use vocabulary::{LabelMetadata, LabelVocabulary};

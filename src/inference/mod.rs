//! Inference module: label filtering, quality checks and model scoring
//!
//! This module provides:
//! - Crop-hint label selection over the persisted vocabulary
//! - Brightness and blur warnings for uploaded photos
//! - The `DiseaseModel` seam with mock and Burn implementations
//! - The prediction service shared by the CLI and the HTTP server

pub mod filter;
pub mod quality;
pub mod scorer;
pub mod service;

// Re-export main types for convenience
pub use filter::{select_label, softmax, LabelChoice};
pub use quality::{QualityGate, QualityReport};
pub use scorer::{BurnDiseaseModel, DiseaseModel, MockDiseaseModel, ModelInput, Prediction};
pub use service::{InferenceService, PredictionResult, ServiceConfig};

//! Label vocabulary and its sidecar metadata
//!
//! Training writes `{stem}.labels.json` next to the weights; inference reads
//! it back so that output index `i` of the classifier head always maps to
//! the label it was trained on.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::dataset::crop::CropType;
use crate::dataset::labels::PrefixedLabel;
use crate::utils::error::{LeafError, Result};

/// Sidecar metadata persisted next to a trained model
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LabelMetadata {
    /// Class names in head order (canonical, or prefixed for multi-crop runs)
    #[serde(default)]
    pub class_names: Vec<String>,
    /// `bean`, `maize`, `mixed` or `unknown`
    #[serde(default)]
    pub crop_type: String,
    /// `crop:disease` labels in head order
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub source_dirs: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub best_val_accuracy: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved_at_epoch_time: Option<i64>,
    /// Absolute dataset root of a single-root run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<String>,
    /// Absolute dataset roots of a multi-root run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dirs: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_version: Option<String>,
}

impl LabelMetadata {
    /// Metadata for a finished training run
    ///
    /// `labels` is derived from the class names: kept as is when they are
    /// already prefixed, prefixed with the crop for a bean or maize run.
    pub fn for_training(
        class_names: &[String],
        crop_type: CropType,
        source_dirs: &[String],
        roots: &[PathBuf],
        best_val_accuracy: f64,
    ) -> Self {
        let absolute: Vec<String> = roots
            .iter()
            .map(|root| {
                std::fs::canonicalize(root)
                    .unwrap_or_else(|_| root.clone())
                    .to_string_lossy()
                    .into_owned()
            })
            .collect();
        let (data_dir, data_dirs) = if crop_type == CropType::Mixed {
            (None, Some(absolute))
        } else {
            (absolute.into_iter().next(), None)
        };

        Self {
            class_names: class_names.to_vec(),
            crop_type: crop_type.to_string(),
            labels: prefixed_labels(class_names, crop_type),
            source_dirs: source_dirs.to_vec(),
            best_val_accuracy: Some(best_val_accuracy),
            saved_at_epoch_time: Some(chrono::Utc::now().timestamp()),
            data_dir,
            data_dirs,
            model_version: None,
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }

    /// Load the first readable sidecar of `model_path`
    ///
    /// Candidates that are missing or fail to parse are skipped.
    pub fn find_for_model(model_path: &Path) -> Option<(Self, PathBuf)> {
        for candidate in sidecar_candidates(model_path) {
            if !candidate.is_file() {
                continue;
            }
            match Self::load(&candidate) {
                Ok(metadata) => {
                    debug!("Loaded label metadata from {:?}", candidate);
                    return Some((metadata, candidate));
                }
                Err(e) => warn!("Ignoring unreadable label metadata {:?}: {}", candidate, e),
            }
        }
        None
    }
}

/// Sidecar locations for a model file: `{stem}.labels.json`, then `{path}.labels.json`
pub fn sidecar_candidates(model_path: &Path) -> [PathBuf; 2] {
    let mut appended = model_path.as_os_str().to_owned();
    appended.push(".labels.json");
    [model_path.with_extension("labels.json"), PathBuf::from(appended)]
}

/// Sidecar path written for a model file
pub fn sidecar_path(model_path: &Path) -> PathBuf {
    model_path.with_extension("labels.json")
}

/// Prefix class names with the crop when they are not prefixed already
pub fn prefixed_labels(class_names: &[String], crop_type: CropType) -> Vec<String> {
    if !class_names.is_empty() && class_names.iter().all(|name| name.contains(':')) {
        return class_names.to_vec();
    }
    match crop_type {
        CropType::Bean | CropType::Maize => class_names
            .iter()
            .map(|name| format!("{}:{}", crop_type, name))
            .collect(),
        _ => class_names.to_vec(),
    }
}

/// Ordered binding of classifier output indices to `crop:disease` labels
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelVocabulary {
    labels: Vec<PrefixedLabel>,
}

impl LabelVocabulary {
    /// Parse labels given explicitly (e.g. from configuration)
    ///
    /// Every entry must be `crop:disease` with crop bean, beans or maize.
    pub fn from_labels<S: AsRef<str>>(raw: &[S]) -> Result<Self> {
        let mut labels = Vec::with_capacity(raw.len());
        for entry in raw {
            let entry = entry.as_ref().trim();
            if entry.is_empty() {
                continue;
            }
            if !entry.contains(':') {
                return Err(LeafError::Configuration(format!(
                    "Each label must be in the format crop:disease (e.g. maize:common_rust), got '{}'",
                    entry
                )));
            }
            let label = PrefixedLabel::parse(entry).ok_or_else(|| {
                LeafError::Configuration(format!(
                    "Only bean/beans and maize crops are supported in labels, got '{}'",
                    entry
                ))
            })?;
            if labels.contains(&label) {
                return Err(LeafError::Configuration(format!(
                    "Duplicate label '{}' (from '{}')",
                    label, entry
                )));
            }
            labels.push(label);
        }

        if labels.is_empty() {
            return Err(LeafError::Configuration(
                "At least one crop:disease label is required".to_string(),
            ));
        }
        Ok(Self { labels })
    }

    /// Labels from sidecar metadata: `labels`, else `class_names` + a bean/maize `crop_type`
    pub fn from_metadata(metadata: &LabelMetadata) -> Result<Self> {
        let raw: Vec<String> = if !metadata.labels.is_empty() {
            metadata.labels.clone()
        } else {
            match CropType::from_label_prefix(&metadata.crop_type) {
                Some(crop) if !metadata.class_names.is_empty() => metadata
                    .class_names
                    .iter()
                    .map(|name| name.trim())
                    .filter(|name| !name.is_empty())
                    .map(|name| format!("{}:{}", crop, name))
                    .collect(),
                _ => {
                    return Err(LeafError::VocabularyMismatch(
                        "Label metadata has neither labels nor class names with a bean/maize crop type"
                            .to_string(),
                    ))
                }
            }
        };

        Self::from_labels(&raw).map_err(|e| LeafError::VocabularyMismatch(e.to_string()))
    }

    /// Resolve the vocabulary of a model: explicit labels win, otherwise the sidecar
    ///
    /// Returns the metadata too when a sidecar was read.
    pub fn resolve(explicit: &[String], model_path: &Path) -> Result<(Self, Option<LabelMetadata>)> {
        if !explicit.is_empty() {
            return Ok((Self::from_labels(explicit)?, None));
        }

        match LabelMetadata::find_for_model(model_path) {
            Some((metadata, _)) => Ok((Self::from_metadata(&metadata)?, Some(metadata))),
            None => Err(LeafError::VocabularyMismatch(format!(
                "No labels configured and no readable label metadata found for {} (tried {:?})",
                model_path.display(),
                sidecar_candidates(model_path)
            ))),
        }
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&PrefixedLabel> {
        self.labels.get(index)
    }

    pub fn labels(&self) -> &[PrefixedLabel] {
        &self.labels
    }

    /// Labels rendered as `crop:disease`
    pub fn label_strings(&self) -> Vec<String> {
        self.labels.iter().map(ToString::to_string).collect()
    }

    /// Indices whose crop is `crop`, in vocabulary order
    pub fn indices_for_crop(&self, crop: CropType) -> Vec<usize> {
        self.labels
            .iter()
            .enumerate()
            .filter(|(_, label)| label.crop == crop)
            .map(|(idx, _)| idx)
            .collect()
    }

    /// Crops present in the vocabulary
    pub fn crops(&self) -> Vec<CropType> {
        let mut crops: Vec<CropType> = Vec::new();
        for label in &self.labels {
            if !crops.contains(&label.crop) {
                crops.push(label.crop);
            }
        }
        crops
    }

    /// Fail unless the head has exactly one output per label
    pub fn check_head_size(&self, num_outputs: usize) -> Result<()> {
        if num_outputs != self.labels.len() {
            return Err(LeafError::VocabularyMismatch(format!(
                "Model head has {} outputs but the vocabulary has {} labels",
                num_outputs,
                self.labels.len()
            )));
        }
        Ok(())
    }
}

/// Describe a mismatch between a dataset's class list and the persisted one
pub fn class_list_mismatch(dataset_classes: &[String], metadata: &LabelMetadata) -> Option<String> {
    if metadata.class_names.is_empty() || metadata.class_names == dataset_classes {
        return None;
    }
    Some(format!(
        "dataset classes do not match the saved model metadata.\n  Dataset: {:?}\n  Metadata: {:?}",
        dataset_classes, metadata.class_names
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_sidecar_candidates() {
        let [stem, appended] = sidecar_candidates(Path::new("/models/best_model.mpk"));
        assert_eq!(stem, PathBuf::from("/models/best_model.labels.json"));
        assert_eq!(appended, PathBuf::from("/models/best_model.mpk.labels.json"));
    }

    #[test]
    fn test_prefixed_labels() {
        let names = strings(&["healthy", "bean_rust"]);
        assert_eq!(
            prefixed_labels(&names, CropType::Bean),
            strings(&["bean:healthy", "bean:bean_rust"])
        );
        assert_eq!(prefixed_labels(&names, CropType::Unknown), names);

        let already = strings(&["bean:healthy", "maize:healthy"]);
        assert_eq!(prefixed_labels(&already, CropType::Mixed), already);
    }

    #[test]
    fn test_from_labels_validation() {
        let vocab = LabelVocabulary::from_labels(&["beans:healthy", " maize:common_rust "]).unwrap();
        assert_eq!(vocab.label_strings(), strings(&["bean:healthy", "maize:common_rust"]));
        assert_eq!(vocab.indices_for_crop(CropType::Maize), vec![1]);
        assert_eq!(vocab.crops(), vec![CropType::Bean, CropType::Maize]);

        assert!(matches!(
            LabelVocabulary::from_labels(&["healthy"]),
            Err(LeafError::Configuration(_))
        ));
        assert!(matches!(
            LabelVocabulary::from_labels(&["wheat:rust"]),
            Err(LeafError::Configuration(_))
        ));
        let empty: [&str; 0] = [];
        assert!(LabelVocabulary::from_labels(&empty).is_err());
    }

    #[test]
    fn test_from_labels_rejects_duplicates() {
        let err = LabelVocabulary::from_labels(&["bean:healthy", "beans:healthy"]).unwrap_err();
        assert!(matches!(err, LeafError::Configuration(_)));
        assert!(err.to_string().contains("bean:healthy"));

        // Same disease under different crops is fine
        let vocab = LabelVocabulary::from_labels(&["bean:healthy", "maize:healthy"]).unwrap();
        assert_eq!(vocab.label_strings().len(), 2);
    }

    #[test]
    fn test_from_metadata_falls_back_to_class_names() {
        let metadata = LabelMetadata {
            class_names: strings(&["healthy", "common_rust"]),
            crop_type: "maize".to_string(),
            ..Default::default()
        };
        let vocab = LabelVocabulary::from_metadata(&metadata).unwrap();
        assert_eq!(vocab.label_strings(), strings(&["maize:healthy", "maize:common_rust"]));

        let unknown = LabelMetadata {
            class_names: strings(&["healthy"]),
            crop_type: "unknown".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            LabelVocabulary::from_metadata(&unknown),
            Err(LeafError::VocabularyMismatch(_))
        ));
    }

    #[test]
    fn test_resolve_reads_sidecar() {
        let dir = tempfile::tempdir().unwrap();
        let model_path = dir.path().join("best_model.mpk");
        let metadata = LabelMetadata::for_training(
            &strings(&["healthy", "bean_rust", "angular_leaf_spot"]),
            CropType::Bean,
            &strings(&["healthy", "bean_rust", "angular_leaf_spot"]),
            &[dir.path().to_path_buf()],
            0.91,
        );
        metadata.save(&sidecar_path(&model_path)).unwrap();

        let (vocab, loaded) = LabelVocabulary::resolve(&[], &model_path).unwrap();
        assert_eq!(vocab.len(), 3);
        assert_eq!(vocab.get(1).unwrap().to_string(), "bean:bean_rust");
        let loaded = loaded.unwrap();
        assert_eq!(loaded.labels, strings(&["bean:healthy", "bean:bean_rust", "bean:angular_leaf_spot"]));
        assert!(loaded.data_dir.is_some());
        assert!(loaded.data_dirs.is_none());

        let explicit = strings(&["maize:healthy"]);
        let (vocab, loaded) = LabelVocabulary::resolve(&explicit, &model_path).unwrap();
        assert_eq!(vocab.len(), 1);
        assert!(loaded.is_none());
    }

    #[test]
    fn test_resolve_without_labels_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let model_path = dir.path().join("model.bin");
        std::fs::write(dir.path().join("model.labels.json"), b"{not json").unwrap();

        let err = LabelVocabulary::resolve(&[], &model_path).unwrap_err();
        assert!(matches!(err, LeafError::VocabularyMismatch(_)));
    }

    #[test]
    fn test_check_head_size() {
        let vocab = LabelVocabulary::from_labels(&["bean:healthy", "bean:bean_rust"]).unwrap();
        assert!(vocab.check_head_size(2).is_ok());
        assert!(matches!(
            vocab.check_head_size(3),
            Err(LeafError::VocabularyMismatch(_))
        ));
    }

    #[test]
    fn test_class_list_mismatch() {
        let metadata = LabelMetadata {
            class_names: strings(&["healthy", "bean_rust"]),
            ..Default::default()
        };
        assert!(class_list_mismatch(&strings(&["healthy", "bean_rust"]), &metadata).is_none());
        assert!(class_list_mismatch(&strings(&["bean_rust", "healthy"]), &metadata).is_some());
        assert!(class_list_mismatch(&strings(&["x"]), &LabelMetadata::default()).is_none());
    }
}

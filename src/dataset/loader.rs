//! Leaf Dataset Loader
//!
//! Builds the sample list the classifier is trained on, either from one
//! dataset root or by aggregating several crop roots into one
//! `crop:disease` label space.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use colored::Colorize;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::crop::{infer_crop, CropType};
use super::discovery::{discover, list_images};
use super::labels::PrefixedLabel;
use crate::utils::error::{LeafError, Result};
use crate::IMAGE_SIZE;

/// A single image sample with its class index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sample {
    /// Path to the image file
    pub path: PathBuf,
    /// Index into the dataset's class names
    pub label: usize,
}

/// Leaf image dataset with lazy image loading
#[derive(Debug, Clone)]
pub struct LeafDataset {
    /// Dataset roots, in the order they were given
    pub roots: Vec<PathBuf>,
    /// Class names in label-index order (canonical for one root, prefixed when aggregated)
    pub class_names: Vec<String>,
    /// Crop of the dataset, `Mixed` when aggregated
    pub crop_type: CropType,
    /// Folders the classes were read from (`crop:folder` when aggregated)
    pub source_dirs: Vec<String>,
    /// All samples in the dataset
    pub samples: Vec<Sample>,
    /// Target image size (width, height)
    pub image_size: (u32, u32),
}

impl LeafDataset {
    /// Load a single dataset root
    ///
    /// The directory should be structured as:
    /// ```text
    /// root_dir/
    /// ├── healthy/
    /// │   ├── image1.jpg
    /// │   └── image2.jpg
    /// ├── bean_rust/
    /// │   └── ...
    /// └── ...
    /// ```
    pub fn from_root<P: AsRef<Path>>(root_dir: P, class_names: Option<&[String]>) -> Result<Self> {
        let root_dir = root_dir.as_ref().to_path_buf();
        info!("Loading leaf dataset from: {:?}", root_dir);

        let (entries, labels) = discover(&root_dir, class_names)?;
        let crop_type = infer_crop(&labels);

        let mut samples = Vec::new();
        for (label, entry) in entries.iter().enumerate() {
            let images = list_images(&entry.folder_path);
            debug!("Class '{}' (label {}): {} images", entry.label, label, images.len());
            samples.extend(images.into_iter().map(|path| Sample { path, label }));
        }

        if samples.is_empty() {
            return Err(LeafError::EmptyDataset(format!(
                "No images found in dataset directory: {}",
                root_dir.display()
            )));
        }

        info!("Loaded {} samples across {} classes", samples.len(), labels.len());

        Ok(Self {
            roots: vec![root_dir],
            class_names: labels.into_iter().map(|l| l.into_string()).collect(),
            crop_type,
            source_dirs: entries.into_iter().map(|e| e.folder_name).collect(),
            samples,
            image_size: (IMAGE_SIZE as u32, IMAGE_SIZE as u32),
        })
    }

    /// Aggregate several crop roots into one prefixed label space
    ///
    /// Each root must be recognizably bean or maize. Labels are appended in
    /// first-seen order, so the vocabulary follows the root order.
    pub fn from_roots<P: AsRef<Path>>(root_dirs: &[P]) -> Result<Self> {
        let roots: Vec<PathBuf> = root_dirs
            .iter()
            .map(|p| p.as_ref())
            .filter(|p| !p.as_os_str().to_string_lossy().trim().is_empty())
            .map(Path::to_path_buf)
            .collect();
        if roots.is_empty() {
            return Err(LeafError::Configuration(
                "At least one dataset directory is required for multi-crop training".to_string(),
            ));
        }

        let mut class_names: Vec<String> = Vec::new();
        let mut class_to_idx: HashMap<String, usize> = HashMap::new();
        let mut source_dirs = Vec::new();
        let mut samples = Vec::new();

        for root in &roots {
            info!("Loading crop dataset from: {:?}", root);
            let (entries, labels) = discover(root, None)?;
            let crop = infer_crop(&labels);
            if !matches!(crop, CropType::Bean | CropType::Maize) {
                return Err(LeafError::Configuration(format!(
                    "Could not infer crop type for dataset '{}'. Expected bean or maize class names/folders.",
                    root.display()
                )));
            }

            for entry in entries {
                let prefixed = PrefixedLabel::new(crop, &entry.label).to_string();
                let label = match class_to_idx.get(&prefixed) {
                    Some(&idx) => idx,
                    None => {
                        let idx = class_names.len();
                        class_names.push(prefixed.clone());
                        class_to_idx.insert(prefixed, idx);
                        idx
                    }
                };

                source_dirs.push(format!("{}:{}", crop, entry.folder_name));
                samples.extend(
                    list_images(&entry.folder_path)
                        .into_iter()
                        .map(|path| Sample { path, label }),
                );
            }
        }

        if samples.is_empty() {
            return Err(LeafError::EmptyDataset(format!(
                "No images found in dataset directories: {:?}",
                roots
            )));
        }

        info!("Aggregated {} samples across {} classes", samples.len(), class_names.len());

        Ok(Self {
            roots,
            class_names,
            crop_type: CropType::Mixed,
            source_dirs,
            samples,
            image_size: (IMAGE_SIZE as u32, IMAGE_SIZE as u32),
        })
    }

    /// Load from either one root or several
    ///
    /// Several roots take precedence; explicit class names only apply to a
    /// single root.
    pub fn load(
        data_dir: Option<&Path>,
        data_dirs: &[PathBuf],
        class_names: Option<&[String]>,
    ) -> Result<Self> {
        if !data_dirs.is_empty() {
            if class_names.is_some_and(|names| !names.is_empty()) {
                return Err(LeafError::Configuration(
                    "Explicit class names are not supported with multi-crop training; \
                     class folders are discovered per dataset root"
                        .to_string(),
                ));
            }
            return Self::from_roots(data_dirs);
        }

        match data_dir {
            Some(dir) => Self::from_root(dir, class_names),
            None => Err(LeafError::Configuration(
                "A dataset directory is required when no dataset list is given".to_string(),
            )),
        }
    }

    /// Get the number of samples in the dataset
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Check if the dataset is empty
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Get the number of classes
    pub fn num_classes(&self) -> usize {
        self.class_names.len()
    }

    /// Get statistics about the dataset
    pub fn stats(&self) -> DatasetStats {
        let mut class_counts = vec![0usize; self.num_classes()];
        for sample in &self.samples {
            if let Some(count) = class_counts.get_mut(sample.label) {
                *count += 1;
            }
        }

        DatasetStats {
            total_samples: self.samples.len(),
            crop_type: self.crop_type,
            class_names: self.class_names.clone(),
            class_counts,
            source_dirs: self.source_dirs.clone(),
        }
    }
}

/// Statistics about the dataset
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetStats {
    pub total_samples: usize,
    pub crop_type: CropType,
    pub class_names: Vec<String>,
    pub class_counts: Vec<usize>,
    pub source_dirs: Vec<String>,
}

impl DatasetStats {
    /// Print statistics to console
    pub fn print(&self) {
        println!("\n{}", "Dataset Statistics:".bold());
        println!("  Crop type: {}", self.crop_type.to_string().cyan());
        println!("  Total samples: {}", self.total_samples);
        println!("  Number of classes: {}", self.class_names.len());
        if !self.source_dirs.is_empty() {
            println!("  Source directories: {}", self.source_dirs.join(", "));
        }
        println!("\n  Samples per class:");

        for (idx, (name, count)) in self.class_names.iter().zip(&self.class_counts).enumerate() {
            let bar_len = if self.total_samples > 0 {
                (*count as f32 / self.total_samples as f32 * 40.0) as usize
            } else {
                0
            };
            let name = if super::is_healthy_label(name) {
                name.green()
            } else {
                name.yellow()
            };
            println!("    {:3}. {:32} {:6} {}", idx, name, count, "█".repeat(bar_len));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn make_root(dir: &Path, classes: &[(&str, usize)]) {
        for (folder, count) in classes {
            let class_dir = dir.join(folder);
            fs::create_dir_all(&class_dir).unwrap();
            for i in 0..*count {
                fs::write(class_dir.join(format!("img_{i:03}.jpg")), b"x").unwrap();
            }
        }
    }

    #[test]
    fn test_single_root() {
        let dir = tempfile::tempdir().unwrap();
        make_root(dir.path(), &[("bean_rust", 2), ("healthy", 3)]);

        let dataset = LeafDataset::from_root(dir.path(), None).unwrap();
        assert_eq!(dataset.class_names, vec!["healthy", "bean_rust"]);
        assert_eq!(dataset.crop_type, CropType::Bean);
        assert_eq!(dataset.len(), 5);
        assert_eq!(dataset.stats().class_counts, vec![3, 2]);
        assert_eq!(dataset.source_dirs, vec!["healthy", "bean_rust"]);
    }

    #[test]
    fn test_no_images_is_empty_dataset() {
        let dir = tempfile::tempdir().unwrap();
        make_root(dir.path(), &[("healthy", 0), ("bean_rust", 0)]);

        let err = LeafDataset::from_root(dir.path(), None).unwrap_err();
        assert!(matches!(err, LeafError::EmptyDataset(_)));
    }

    #[test]
    fn test_aggregation_prefixes_labels() {
        let beans = tempfile::tempdir().unwrap();
        let maize = tempfile::tempdir().unwrap();
        make_root(beans.path(), &[("healthy", 1), ("bean_rust", 1)]);
        make_root(
            maize.path(),
            &[("Corn_(maize)___healthy", 1), ("Corn_(maize)___Common_rust_", 2)],
        );

        let dataset = LeafDataset::from_roots(&[beans.path(), maize.path()]).unwrap();
        assert_eq!(
            dataset.class_names,
            vec!["bean:healthy", "bean:bean_rust", "maize:healthy", "maize:common_rust"]
        );
        assert_eq!(dataset.crop_type, CropType::Mixed);
        assert_eq!(dataset.source_dirs[3], "maize:Corn_(maize)___Common_rust_");
        assert_eq!(dataset.stats().class_counts, vec![1, 1, 1, 2]);
    }

    #[test]
    fn test_aggregation_rejects_unknown_crop() {
        let tomato = tempfile::tempdir().unwrap();
        make_root(tomato.path(), &[("Tomato___Late_blight", 1)]);

        let err = LeafDataset::from_roots(&[tomato.path()]).unwrap_err();
        assert!(matches!(err, LeafError::Configuration(_)));
    }

    #[test]
    fn test_aggregation_requires_roots() {
        let empty: [&Path; 0] = [];
        assert!(matches!(
            LeafDataset::from_roots(&empty),
            Err(LeafError::Configuration(_))
        ));
        assert!(matches!(
            LeafDataset::from_roots(&[Path::new("  ")]),
            Err(LeafError::Configuration(_))
        ));
    }

    #[test]
    fn test_load_rejects_class_names_with_many_roots() {
        let names = vec!["healthy".to_string()];
        let err = LeafDataset::load(None, &[PathBuf::from("/a")], Some(&names)).unwrap_err();
        assert!(matches!(err, LeafError::Configuration(_)));

        let err = LeafDataset::load(None, &[], None).unwrap_err();
        assert!(matches!(err, LeafError::Configuration(_)));
    }
}

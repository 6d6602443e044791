//! Dataset discovery
//!
//! Scans one dataset root of class subfolders, normalizes every folder name
//! and resolves the ordered class list the classifier will be trained on.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

use super::crop::preferred_class_order;
use super::labels::{normalize, CanonicalLabel};
use super::IMAGE_EXTENSIONS;
use crate::utils::error::{LeafError, Result};

/// One class folder of a dataset root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetEntry {
    /// Folder name as found on disk
    pub folder_name: String,
    pub folder_path: PathBuf,
    pub label: CanonicalLabel,
}

/// Discover the class folders of `root_dir`
///
/// Returns the selected entries and their labels in training order: the
/// requested order when `class_names` is given, otherwise the bean/maize
/// vocabulary order or lexicographic order.
pub fn discover<P: AsRef<Path>>(
    root_dir: P,
    class_names: Option<&[String]>,
) -> Result<(Vec<DatasetEntry>, Vec<CanonicalLabel>)> {
    let root_dir = root_dir.as_ref();
    if !root_dir.is_dir() {
        return Err(LeafError::NotFound(root_dir.to_path_buf()));
    }

    let mut entries = Vec::new();
    for dir_entry in std::fs::read_dir(root_dir)? {
        let dir_entry = dir_entry?;
        let path = dir_entry.path();
        if !path.is_dir() {
            continue;
        }
        let folder_name = dir_entry.file_name().to_string_lossy().into_owned();
        entries.push(DatasetEntry {
            label: normalize(&folder_name),
            folder_name,
            folder_path: path,
        });
    }
    entries.sort_by(|a, b| a.folder_name.cmp(&b.folder_name));

    if entries.is_empty() {
        return Err(LeafError::EmptyDataset(format!(
            "No class directories were found in {}",
            root_dir.display()
        )));
    }

    let mut by_label: BTreeMap<&CanonicalLabel, Vec<&DatasetEntry>> = BTreeMap::new();
    for entry in &entries {
        by_label.entry(&entry.label).or_default().push(entry);
    }

    let duplicates: Vec<String> = by_label
        .iter()
        .filter(|(_, folders)| folders.len() > 1)
        .map(|(label, folders)| {
            let names: Vec<String> = folders.iter().map(|e| format!("'{}'", e.folder_name)).collect();
            format!("'{}' <- {}", label, names.join(", "))
        })
        .collect();
    if !duplicates.is_empty() {
        return Err(LeafError::Configuration(format!(
            "Multiple folders normalize to the same label in {}: {}. Rename or merge duplicated class folders.",
            root_dir.display(),
            duplicates.join("; ")
        )));
    }

    let ordered_labels = match class_names {
        Some(requested) if !requested.is_empty() => {
            let requested: Vec<CanonicalLabel> = requested.iter().map(|n| normalize(n)).collect();
            let missing: Vec<&str> = requested
                .iter()
                .filter(|label| !by_label.contains_key(label))
                .map(CanonicalLabel::as_str)
                .collect();
            if !missing.is_empty() {
                return Err(LeafError::Configuration(format!(
                    "Requested classes not found in {}: {:?}",
                    root_dir.display(),
                    missing
                )));
            }
            requested
        }
        _ => {
            let labels: Vec<CanonicalLabel> = entries.iter().map(|e| e.label.clone()).collect();
            preferred_class_order(&labels)
        }
    };

    let selected: Vec<DatasetEntry> = ordered_labels
        .iter()
        .filter_map(|label| by_label.get(label).and_then(|folders| folders.first()))
        .map(|entry| (*entry).clone())
        .collect();

    debug!(
        "Discovered {} classes in {:?}: {:?}",
        selected.len(),
        root_dir,
        ordered_labels.iter().map(CanonicalLabel::as_str).collect::<Vec<_>>()
    );

    Ok((selected, ordered_labels))
}

/// Image files directly inside `dir`, sorted and without case-folded duplicates
pub fn list_images<P: AsRef<Path>>(dir: P) -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = WalkDir::new(dir.as_ref())
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .map(|e| e.into_path())
        .filter(|path| path.is_file() && is_image_file(path))
        .collect();
    paths.sort();

    let mut seen = HashSet::new();
    paths.retain(|path| seen.insert(path.to_string_lossy().to_lowercase()));
    paths
}

/// Whether the path has one of the accepted image extensions (any case)
pub fn is_image_file(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn touch(dir: &Path, name: &str) {
        fs::create_dir_all(dir).unwrap();
        fs::write(dir.join(name), b"x").unwrap();
    }

    #[test]
    fn test_missing_root_is_not_found() {
        let err = discover("/definitely/not/here", None).unwrap_err();
        assert!(matches!(err, LeafError::NotFound(_)));
    }

    #[test]
    fn test_no_class_folders_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "stray.jpg");
        let err = discover(dir.path(), None).unwrap_err();
        assert!(matches!(err, LeafError::EmptyDataset(_)));
    }

    #[test]
    fn test_bean_order_and_normalization() {
        let dir = tempfile::tempdir().unwrap();
        for folder in ["Angular Leaf Spot", "bean_rust", "healthy"] {
            fs::create_dir(dir.path().join(folder)).unwrap();
        }

        let (entries, labels) = discover(dir.path(), None).unwrap();
        let names: Vec<&str> = labels.iter().map(|l| l.as_str()).collect();
        assert_eq!(names, vec!["healthy", "bean_rust", "angular_leaf_spot"]);
        assert_eq!(entries[2].folder_name, "Angular Leaf Spot");
    }

    #[test]
    fn test_duplicate_labels_name_both_folders() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("Corn_(maize)___Common_rust_")).unwrap();
        fs::create_dir(dir.path().join("common_rust")).unwrap();

        let err = discover(dir.path(), None).unwrap_err();
        let message = err.to_string();
        assert!(matches!(err, LeafError::Configuration(_)));
        assert!(message.contains("common_rust"));
        assert!(message.contains("'Corn_(maize)___Common_rust_'"));
        assert!(message.contains("'common_rust'"));
    }

    #[test]
    fn test_explicit_class_names() {
        let dir = tempfile::tempdir().unwrap();
        for folder in ["healthy", "bean_rust", "angular_leaf_spot"] {
            fs::create_dir(dir.path().join(folder)).unwrap();
        }

        let requested = vec!["Bean Rust".to_string(), "healthy".to_string()];
        let (entries, labels) = discover(dir.path(), Some(&requested)).unwrap();
        let names: Vec<&str> = labels.iter().map(|l| l.as_str()).collect();
        assert_eq!(names, vec!["bean_rust", "healthy"]);
        assert_eq!(entries.len(), 2);

        let missing = vec!["anthracnose".to_string()];
        let err = discover(dir.path(), Some(&missing)).unwrap_err();
        assert!(err.to_string().contains("anthracnose"));
    }

    #[test]
    fn test_list_images_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.PNG", "a.jpg", "c.webp", "notes.txt", "d.JpEg"] {
            touch(dir.path(), name);
        }
        fs::create_dir(dir.path().join("nested.jpg")).unwrap();

        let names: Vec<String> = list_images(dir.path())
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.jpg", "b.PNG", "c.webp", "d.JpEg"]);
    }

    #[test]
    fn test_list_images_case_folded_duplicates() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "leaf.jpg");
        touch(dir.path(), "LEAF.JPG");

        assert_eq!(list_images(dir.path()).len(), 1);
    }
}

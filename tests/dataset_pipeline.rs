//! End-to-end checks over on-disk datasets: discovery, multi-crop
//! aggregation, splitting, split materialization and label filtering.

use std::path::Path;

use image::{ImageBuffer, Rgb};
use leafscan::dataset::discovery::discover;
use leafscan::dataset::prepare::{materialize_split, MaterializeConfig};
use leafscan::inference::filter::select_label;
use leafscan::{stratified_split, CropHint, CropType, LabelVocabulary, LeafDataset, LeafError, SplitConfig};

fn write_class(root: &Path, folder: &str, count: usize) {
    let dir = root.join(folder);
    std::fs::create_dir_all(&dir).unwrap();
    for i in 0..count {
        ImageBuffer::from_pixel(4, 4, Rgb([i as u8, 120, 40]))
            .save(dir.join(format!("img_{i}.png")))
            .unwrap();
    }
}

fn maize_root(root: &Path) {
    write_class(root, "Corn_(maize)___healthy", 4);
    write_class(root, "Corn_(maize)___Common_rust_", 4);
    write_class(root, "Corn_(maize)___Cercospora_leaf_spot Gray_leaf_spot", 3);
}

fn bean_root(root: &Path) {
    write_class(root, "healthy", 3);
    write_class(root, "bean_rust", 5);
    write_class(root, "angular_leaf_spot", 4);
}

#[test]
fn test_plantvillage_folders_resolve_to_maize_order() {
    let dir = tempfile::tempdir().unwrap();
    maize_root(dir.path());

    let dataset = LeafDataset::from_root(dir.path(), None).unwrap();
    assert_eq!(dataset.crop_type, CropType::Maize);
    assert_eq!(dataset.class_names, vec!["healthy", "common_rust", "gray_leaf_spot"]);
    assert_eq!(dataset.len(), 11);
}

#[test]
fn test_duplicate_folders_name_both() {
    let dir = tempfile::tempdir().unwrap();
    write_class(dir.path(), "Bean Rust", 2);
    write_class(dir.path(), "bean_rust", 2);
    write_class(dir.path(), "healthy", 2);

    let err = discover(dir.path(), None).unwrap_err();
    let message = err.to_string();
    assert!(matches!(err, LeafError::Configuration(_)));
    assert!(message.contains("'Bean Rust'"), "{message}");
    assert!(message.contains("'bean_rust'"), "{message}");
}

#[test]
fn test_aggregated_vocabulary_follows_root_order() {
    let maize = tempfile::tempdir().unwrap();
    let bean = tempfile::tempdir().unwrap();
    maize_root(maize.path());
    bean_root(bean.path());

    let maize_first = LeafDataset::from_roots(&[maize.path(), bean.path()]).unwrap();
    assert_eq!(maize_first.crop_type, CropType::Mixed);
    assert_eq!(
        maize_first.class_names,
        vec![
            "maize:healthy",
            "maize:common_rust",
            "maize:gray_leaf_spot",
            "bean:healthy",
            "bean:bean_rust",
            "bean:angular_leaf_spot",
        ]
    );
    assert_eq!(maize_first.len(), 23);

    let bean_first = LeafDataset::from_roots(&[bean.path(), maize.path()]).unwrap();
    assert_eq!(bean_first.class_names[0], "bean:healthy");
    assert_eq!(bean_first.class_names[3], "maize:healthy");
}

#[test]
fn test_unknown_crop_root_is_rejected() {
    let bean = tempfile::tempdir().unwrap();
    let other = tempfile::tempdir().unwrap();
    bean_root(bean.path());
    write_class(other.path(), "tomato_blight", 2);

    let err = LeafDataset::from_roots(&[bean.path(), other.path()]).unwrap_err();
    assert!(matches!(err, LeafError::Configuration(_)));
}

#[test]
fn test_split_of_real_dataset_is_stable_and_disjoint() {
    let dir = tempfile::tempdir().unwrap();
    bean_root(dir.path());
    let dataset = LeafDataset::from_root(dir.path(), None).unwrap();

    let config = SplitConfig::default();
    let first = stratified_split(&dataset.samples, &config).unwrap();
    let second = stratified_split(&dataset.samples, &config).unwrap();
    assert_eq!(first, second);
    assert_eq!(first.total(), dataset.len());

    let mut all: Vec<usize> = first
        .train
        .iter()
        .chain(&first.val)
        .chain(&first.test)
        .copied()
        .collect();
    all.sort_unstable();
    all.dedup();
    assert_eq!(all.len(), dataset.len());

    // The 3-image healthy class still reaches val and test
    let healthy = dataset.class_names.iter().position(|c| c == "healthy").unwrap();
    let in_split = |indices: &[usize]| indices.iter().any(|&i| dataset.samples[i].label == healthy);
    assert!(in_split(&first.val));
    assert!(in_split(&first.test));
}

#[test]
fn test_materialized_split_copies_every_image() {
    let data = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    bean_root(data.path());
    let output_dir = out.path().join("splits");

    let config = MaterializeConfig {
        overwrite: true,
        ..Default::default()
    };
    let counts = materialize_split(data.path(), &output_dir, None, &config).unwrap();

    let copied: usize = ["train", "val", "test"].iter().map(|s| counts.total(s)).sum();
    assert_eq!(copied, 12);
    for split in ["train", "val", "test"] {
        for class in ["healthy", "bean_rust", "angular_leaf_spot"] {
            assert!(output_dir.join(split).join(class).is_dir());
        }
    }

    // Overwriting produces the same layout again
    let again = materialize_split(data.path(), &output_dir, None, &config).unwrap();
    assert_eq!(counts, again);
}

#[test]
fn test_maize_hint_never_returns_bean_label() {
    let maize = tempfile::tempdir().unwrap();
    let bean = tempfile::tempdir().unwrap();
    maize_root(maize.path());
    bean_root(bean.path());
    let dataset = LeafDataset::from_roots(&[maize.path(), bean.path()]).unwrap();
    let vocabulary = LabelVocabulary::from_labels(&dataset.class_names).unwrap();

    // Bean labels dominate the raw logits
    let logits = [0.5, 1.0, 0.2, 6.0, 8.0, 7.0];
    let auto = select_label(&logits, &vocabulary, CropHint::Auto).unwrap();
    assert_eq!(auto.crop, CropType::Bean);

    let hinted = select_label(&logits, &vocabulary, CropHint::Maize).unwrap();
    assert_eq!(hinted.crop, CropType::Maize);
    assert_eq!(hinted.disease, "common_rust");
    assert_eq!(hinted.index, 1);

    let subset_total: f32 = [0.5f32, 1.0, 0.2].iter().map(|v| v.exp()).sum();
    let expected = 1.0f32.exp() / subset_total;
    assert!((hinted.confidence - expected).abs() < 1e-5);
}

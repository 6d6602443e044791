//! Stratified train/val/test splitting
//!
//! Every class is split on its own so that each split keeps the class
//! proportions of the full dataset. The split is deterministic in the sample
//! order, the ratios and the seed: one `ChaCha8Rng` seeded from the config is
//! created per call and consumed in a fixed order.
//!
//! ## Small classes
//!
//! Floor rounding would leave val or test empty for small classes. A class
//! with at least 3 samples therefore borrows one sample from train for each
//! empty val/test split, so a 3-sample class always yields 1/1/1.

use std::collections::HashMap;

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use super::loader::Sample;
use crate::utils::error::{LeafError, Result};

/// Configuration for dataset splitting
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitConfig {
    /// Fraction of each class assigned to train
    pub train_ratio: f64,
    /// Fraction of each class assigned to validation
    pub val_ratio: f64,
    /// Random seed for reproducibility
    pub seed: u64,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            train_ratio: 0.7,
            val_ratio: 0.15,
            seed: 42,
        }
    }
}

impl SplitConfig {
    /// Create a validated split configuration; test receives the remainder
    pub fn new(train_ratio: f64, val_ratio: f64, seed: u64) -> Result<Self> {
        let config = Self {
            train_ratio,
            val_ratio,
            seed,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.train_ratio >= 0.0 && self.val_ratio >= 0.0) {
            return Err(LeafError::Configuration(format!(
                "Split ratios must be non-negative (train={}, val={})",
                self.train_ratio, self.val_ratio
            )));
        }
        if self.train_ratio + self.val_ratio > 1.0 {
            return Err(LeafError::Configuration(format!(
                "train_ratio + val_ratio must not exceed 1.0 (got {})",
                self.train_ratio + self.val_ratio
            )));
        }
        Ok(())
    }

    /// Fraction left for the test split
    pub fn test_ratio(&self) -> f64 {
        (1.0 - self.train_ratio - self.val_ratio).max(0.0)
    }
}

/// Sample indices assigned to each split
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetSplits {
    pub train: Vec<usize>,
    pub val: Vec<usize>,
    pub test: Vec<usize>,
}

impl DatasetSplits {
    pub fn total(&self) -> usize {
        self.train.len() + self.val.len() + self.test.len()
    }

    /// Per-class sample counts of one split
    pub fn class_counts(indices: &[usize], samples: &[Sample], num_classes: usize) -> Vec<usize> {
        let mut counts = vec![0usize; num_classes];
        for &idx in indices {
            if let Some(count) = samples.get(idx).and_then(|s| counts.get_mut(s.label)) {
                *count += 1;
            }
        }
        counts
    }
}

impl std::fmt::Display for DatasetSplits {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "train={} val={} test={}",
            self.train.len(),
            self.val.len(),
            self.test.len()
        )
    }
}

/// Per-class split sizes `(train, val, test)` for a class of `n` samples
///
/// The sizes may sum to more than `n` for degenerate ratios; callers slice
/// with clamped bounds.
pub fn class_split_sizes(n: usize, train_ratio: f64, val_ratio: f64) -> (usize, usize, usize) {
    let mut n_train = (n as f64 * train_ratio).floor() as usize;
    let mut n_val = (n as f64 * val_ratio).floor() as usize;
    let mut n_test = n.saturating_sub(n_train + n_val);

    if n >= 3 {
        if n_val == 0 {
            n_val = 1;
            n_train = n_train.saturating_sub(1).max(1);
        }
        if n_test == 0 {
            n_test = 1;
            n_train = n_train.saturating_sub(1).max(1);
        }
    }

    (n_train, n_val, n_test)
}

/// Split sample indices per class into train/val/test
pub fn stratified_split(samples: &[Sample], config: &SplitConfig) -> Result<DatasetSplits> {
    config.validate()?;

    // Classes in order of first appearance
    let mut order: Vec<usize> = Vec::new();
    let mut by_label: HashMap<usize, Vec<usize>> = HashMap::new();
    for (idx, sample) in samples.iter().enumerate() {
        by_label
            .entry(sample.label)
            .or_insert_with(|| {
                order.push(sample.label);
                Vec::new()
            })
            .push(idx);
    }

    let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
    let mut splits = DatasetSplits::default();

    for label in order {
        let Some(mut indices) = by_label.remove(&label) else {
            continue;
        };
        indices.shuffle(&mut rng);

        let n = indices.len();
        let (n_train, n_val, n_test) = class_split_sizes(n, config.train_ratio, config.val_ratio);

        let train_end = n_train.min(n);
        let val_end = (n_train + n_val).min(n);
        let test_end = (n_train + n_val + n_test).min(n);

        splits.train.extend_from_slice(&indices[..train_end]);
        splits.val.extend_from_slice(&indices[train_end..val_end]);
        splits.test.extend_from_slice(&indices[val_end..test_end]);
    }

    splits.train.shuffle(&mut rng);
    splits.val.shuffle(&mut rng);
    splits.test.shuffle(&mut rng);

    Ok(splits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::path::PathBuf;

    fn samples_with_sizes(sizes: &[usize]) -> Vec<Sample> {
        let mut samples = Vec::new();
        for (label, &size) in sizes.iter().enumerate() {
            for i in 0..size {
                samples.push(Sample {
                    path: PathBuf::from(format!("/data/class_{label}/img_{i}.jpg")),
                    label,
                });
            }
        }
        samples
    }

    #[test]
    fn test_default_split_sizes() {
        let samples = samples_with_sizes(&[100, 20]);
        let splits = stratified_split(&samples, &SplitConfig::default()).unwrap();

        let train = DatasetSplits::class_counts(&splits.train, &samples, 2);
        let val = DatasetSplits::class_counts(&splits.val, &samples, 2);
        let test = DatasetSplits::class_counts(&splits.test, &samples, 2);
        assert_eq!(train, vec![70, 14]);
        assert_eq!(val, vec![15, 3]);
        assert_eq!(test, vec![15, 3]);
    }

    #[test]
    fn test_reproducibility() {
        let samples = samples_with_sizes(&[17, 9, 4]);
        let config = SplitConfig::default();
        let a = stratified_split(&samples, &config).unwrap();
        let b = stratified_split(&samples, &config).unwrap();
        assert_eq!(a, b);

        let other = SplitConfig::new(0.7, 0.15, 7).unwrap();
        let c = stratified_split(&samples, &other).unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn test_coverage_and_disjointness() {
        for n in 0..=12 {
            let samples = samples_with_sizes(&[n, 5]);
            let splits = stratified_split(&samples, &SplitConfig::default()).unwrap();

            let mut seen = HashSet::new();
            for idx in splits.train.iter().chain(&splits.val).chain(&splits.test) {
                assert!(seen.insert(*idx), "index {idx} assigned twice for n={n}");
            }
            assert_eq!(seen.len(), samples.len(), "not every sample assigned for n={n}");
        }
    }

    #[test]
    fn test_small_class_policy() {
        assert_eq!(class_split_sizes(3, 0.7, 0.15), (1, 1, 1));
        assert_eq!(class_split_sizes(4, 0.7, 0.15), (1, 1, 2));
        assert_eq!(class_split_sizes(10, 0.7, 0.15), (7, 1, 2));
        assert_eq!(class_split_sizes(2, 0.7, 0.15), (1, 0, 1));
        assert_eq!(class_split_sizes(1, 0.7, 0.15), (0, 0, 1));
        assert_eq!(class_split_sizes(0, 0.7, 0.15), (0, 0, 0));

        let samples = samples_with_sizes(&[3]);
        let splits = stratified_split(&samples, &SplitConfig::default()).unwrap();
        assert_eq!(splits.train.len(), 1);
        assert_eq!(splits.val.len(), 1);
        assert_eq!(splits.test.len(), 1);
    }

    #[test]
    fn test_degenerate_ratios_stay_in_bounds() {
        let samples = samples_with_sizes(&[3, 6]);
        let config = SplitConfig::new(0.0, 0.0, 42).unwrap();
        let splits = stratified_split(&samples, &config).unwrap();
        assert_eq!(splits.total(), samples.len());
    }

    #[test]
    fn test_invalid_ratios() {
        assert!(matches!(
            SplitConfig::new(0.8, 0.3, 42),
            Err(LeafError::Configuration(_))
        ));
        assert!(SplitConfig::new(-0.1, 0.5, 42).is_err());
        assert!(SplitConfig::new(f64::NAN, 0.1, 42).is_err());
        assert!(SplitConfig::new(0.7, 0.3, 42).is_ok());
    }
}

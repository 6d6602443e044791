//! Class-name normalization
//!
//! Dataset folders arrive under several naming conventions (bare names such
//! as `bean_rust`, PlantVillage folders such as `Corn_(maize)___Common_rust_`).
//! [`normalize`] maps all of them onto one canonical, crop-agnostic label.

use std::collections::HashMap;
use std::fmt;
use std::sync::OnceLock;

use serde::Serialize;

use super::crop::CropType;

/// Known folder spellings and their canonical labels
const ALIASES: [(&str, &str); 10] = [
    ("healthy", "healthy"),
    ("bean_rust", "bean_rust"),
    ("angular_leaf_spot", "angular_leaf_spot"),
    ("Corn_(maize)___healthy", "healthy"),
    ("Corn_(maize)___Common_rust_", "common_rust"),
    ("Corn_(maize)___Cercospora_leaf_spot Gray_leaf_spot", "gray_leaf_spot"),
    ("Corn_(maize)___Northern_Leaf_Blight", "northern_leaf_blight"),
    ("corn_maize_common_rust", "common_rust"),
    ("corn_maize_cercospora_leaf_spot_gray_leaf_spot", "gray_leaf_spot"),
    ("corn_maize_northern_leaf_blight", "northern_leaf_blight"),
];

static ALIAS_TABLE: OnceLock<HashMap<&'static str, &'static str>> = OnceLock::new();

fn alias_table() -> &'static HashMap<&'static str, &'static str> {
    ALIAS_TABLE.get_or_init(|| ALIASES.iter().copied().collect())
}

/// A normalized, crop-agnostic disease label (`healthy`, `common_rust`, ...)
///
/// Only [`normalize`] can construct one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct CanonicalLabel(String);

impl CanonicalLabel {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for CanonicalLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CanonicalLabel {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Normalize a raw folder or class name into its canonical label
///
/// Never fails. Names that are not in the alias table pass through in
/// normalized form (lowercase, `&` spelled `and`, non-alphanumeric runs
/// collapsed to `_`).
pub fn normalize(raw_name: &str) -> CanonicalLabel {
    let aliases = alias_table();
    if let Some(canonical) = aliases.get(raw_name) {
        return CanonicalLabel((*canonical).to_string());
    }

    let lowered = raw_name.trim().to_lowercase().replace('&', "and");
    let mut collapsed = String::with_capacity(lowered.len());
    let mut in_gap = false;
    for c in lowered.chars() {
        if c.is_ascii_alphanumeric() {
            collapsed.push(c);
            in_gap = false;
        } else if !in_gap {
            collapsed.push('_');
            in_gap = true;
        }
    }
    let normalized = collapsed.trim_matches('_');

    if let Some(canonical) = aliases.get(normalized) {
        return CanonicalLabel((*canonical).to_string());
    }

    let label = normalized
        .replace("corn_maize", "")
        .trim_matches('_')
        .replace("common_rust_", "common_rust")
        .replace("northern_leaf_blight_", "northern_leaf_blight");

    CanonicalLabel(label)
}

/// A crop-namespaced label (`bean:healthy`, `maize:common_rust`)
///
/// These form the index space of a multi-crop classifier head.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PrefixedLabel {
    pub crop: CropType,
    pub disease: String,
}

impl PrefixedLabel {
    pub fn new(crop: CropType, disease: &CanonicalLabel) -> Self {
        Self {
            crop,
            disease: disease.as_str().to_string(),
        }
    }

    /// Parse `crop:disease`; the crop must be bean (or `beans`) or maize
    pub fn parse(raw: &str) -> Option<Self> {
        let (crop, disease) = raw.trim().split_once(':')?;
        let crop = CropType::from_label_prefix(crop)?;
        let disease = disease.trim();
        if disease.is_empty() {
            return None;
        }
        Some(Self {
            crop,
            disease: disease.to_string(),
        })
    }
}

impl fmt::Display for PrefixedLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.crop, self.disease)
    }
}

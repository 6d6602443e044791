//! Crop types, crop inference and crop hints

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::labels::CanonicalLabel;
use super::{BEAN_CLASS_NAMES, MAIZE_CLASS_NAMES};

/// Crop a dataset or label belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CropType {
    Bean,
    Maize,
    Unknown,
    /// Several crops merged into one label space
    Mixed,
}

impl CropType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CropType::Bean => "bean",
            CropType::Maize => "maize",
            CropType::Unknown => "unknown",
            CropType::Mixed => "mixed",
        }
    }

    /// Crop named by the prefix of a `crop:disease` label
    ///
    /// `beans` is accepted as a spelling of bean.
    pub fn from_label_prefix(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "bean" | "beans" => Some(CropType::Bean),
            "maize" => Some(CropType::Maize),
            _ => None,
        }
    }

    /// Fixed class order of this crop's vocabulary, if it has one
    pub fn class_order(&self) -> Option<&'static [&'static str]> {
        match self {
            CropType::Bean => Some(&BEAN_CLASS_NAMES),
            CropType::Maize => Some(&MAIZE_CLASS_NAMES),
            _ => None,
        }
    }
}

impl fmt::Display for CropType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn is_subset_of(labels: &HashSet<&str>, vocabulary: &[&str]) -> bool {
    labels.iter().all(|label| vocabulary.contains(label))
}

/// Infer the crop of a set of canonical labels
///
/// Bean is checked before maize. `healthy` belongs to both vocabularies, so
/// an empty set or a set holding only `healthy` stays [`CropType::Unknown`].
pub fn infer_crop<'a, I>(labels: I) -> CropType
where
    I: IntoIterator<Item = &'a CanonicalLabel>,
{
    let set: HashSet<&str> = labels.into_iter().map(CanonicalLabel::as_str).collect();
    if set.iter().all(|label| *label == "healthy") {
        return CropType::Unknown;
    }
    if is_subset_of(&set, &BEAN_CLASS_NAMES) {
        CropType::Bean
    } else if is_subset_of(&set, &MAIZE_CLASS_NAMES) {
        CropType::Maize
    } else {
        CropType::Unknown
    }
}

/// Order a label set by the bean or maize vocabulary when it fits one,
/// otherwise lexicographically
///
/// Unlike [`infer_crop`], a `healthy`-only set fits the bean order; the
/// resulting single-element order is the same either way.
pub fn preferred_class_order(labels: &[CanonicalLabel]) -> Vec<CanonicalLabel> {
    let set: HashSet<&str> = labels.iter().map(CanonicalLabel::as_str).collect();
    for order in [CropType::Bean, CropType::Maize]
        .iter()
        .filter_map(CropType::class_order)
    {
        if is_subset_of(&set, order) {
            return order
                .iter()
                .filter_map(|name| labels.iter().find(|l| l.as_str() == *name))
                .cloned()
                .collect();
        }
    }

    let mut sorted: Vec<CanonicalLabel> = labels.to_vec();
    sorted.sort();
    sorted.dedup();
    sorted
}

/// Caller-supplied narrowing of eligible labels at inference time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CropHint {
    #[default]
    Auto,
    Bean,
    Maize,
}

impl CropHint {
    /// Parse a hint; anything unrecognized (or missing) is `Auto`
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(|s| s.trim().to_lowercase()).as_deref() {
            Some("bean") | Some("beans") => CropHint::Bean,
            Some("maize") => CropHint::Maize,
            _ => CropHint::Auto,
        }
    }

    /// Crop selected by the hint, `None` for `Auto`
    pub fn crop(&self) -> Option<CropType> {
        match self {
            CropHint::Auto => None,
            CropHint::Bean => Some(CropType::Bean),
            CropHint::Maize => Some(CropType::Maize),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::labels::normalize;

    fn labels(names: &[&str]) -> Vec<CanonicalLabel> {
        names.iter().map(|n| normalize(n)).collect()
    }

    #[test]
    fn test_infer_bean_and_maize() {
        assert_eq!(infer_crop(&labels(&["healthy", "bean_rust"])), CropType::Bean);
        assert_eq!(infer_crop(&labels(&["angular_leaf_spot"])), CropType::Bean);
        assert_eq!(
            infer_crop(&labels(&["healthy", "common_rust", "gray_leaf_spot"])),
            CropType::Maize
        );
        assert_eq!(infer_crop(&labels(&["northern_leaf_blight"])), CropType::Maize);
    }

    #[test]
    fn test_infer_ambiguous_or_foreign_is_unknown() {
        assert_eq!(infer_crop(&labels(&[])), CropType::Unknown);
        assert_eq!(infer_crop(&labels(&["healthy"])), CropType::Unknown);
        assert_eq!(infer_crop(&labels(&["bean_rust", "common_rust"])), CropType::Unknown);
        assert_eq!(infer_crop(&labels(&["tomato_mosaic"])), CropType::Unknown);
    }

    #[test]
    fn test_preferred_class_order() {
        let ordered = preferred_class_order(&labels(&["bean_rust", "angular_leaf_spot", "healthy"]));
        let names: Vec<&str> = ordered.iter().map(|l| l.as_str()).collect();
        assert_eq!(names, vec!["healthy", "bean_rust", "angular_leaf_spot"]);

        let ordered = preferred_class_order(&labels(&["northern_leaf_blight", "common_rust"]));
        let names: Vec<&str> = ordered.iter().map(|l| l.as_str()).collect();
        assert_eq!(names, vec!["common_rust", "northern_leaf_blight"]);

        let ordered = preferred_class_order(&labels(&["zeta", "alpha", "healthy"]));
        let names: Vec<&str> = ordered.iter().map(|l| l.as_str()).collect();
        assert_eq!(names, vec!["alpha", "healthy", "zeta"]);
    }

    #[test]
    fn test_crop_hint_parse() {
        assert_eq!(CropHint::parse(Some(" Beans ")), CropHint::Bean);
        assert_eq!(CropHint::parse(Some("MAIZE")), CropHint::Maize);
        assert_eq!(CropHint::parse(Some("auto")), CropHint::Auto);
        assert_eq!(CropHint::parse(Some("wheat")), CropHint::Auto);
        assert_eq!(CropHint::parse(None), CropHint::Auto);
        assert_eq!(CropHint::Bean.crop(), Some(CropType::Bean));
        assert_eq!(CropHint::Auto.crop(), None);
    }

    #[test]
    fn test_class_order_only_for_single_crops() {
        assert_eq!(CropType::Bean.class_order(), Some(&BEAN_CLASS_NAMES[..]));
        assert_eq!(CropType::Maize.class_order().map(|o| o[1]), Some("common_rust"));
        assert_eq!(CropType::Mixed.class_order(), None);
        assert_eq!(CropType::Unknown.class_order(), None);
    }

    #[test]
    fn test_label_prefix() {
        assert_eq!(CropType::from_label_prefix("beans"), Some(CropType::Bean));
        assert_eq!(CropType::from_label_prefix("Maize"), Some(CropType::Maize));
        assert_eq!(CropType::from_label_prefix("mixed"), None);
    }
}

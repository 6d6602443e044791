//! Crop-hint label filter
//!
//! With a bean or maize hint, only that crop's labels compete: the softmax is
//! taken over their logits alone and the arg-max is mapped back to the
//! global index. A hint matching no label falls back to the whole vocabulary.

use crate::dataset::crop::{CropHint, CropType};
use crate::model::vocabulary::LabelVocabulary;
use crate::utils::error::{LeafError, Result};

/// The label picked for one image
#[derive(Debug, Clone, PartialEq)]
pub struct LabelChoice {
    pub crop: CropType,
    pub disease: String,
    /// Probability of the label within the candidate set, in [0, 1]
    pub confidence: f32,
    /// Global vocabulary index
    pub index: usize,
}

/// Numerically stable softmax
pub fn softmax(logits: &[f32]) -> Vec<f32> {
    if logits.is_empty() {
        return Vec::new();
    }
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|&x| (x - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

/// Position of the largest value; ties keep the first
fn argmax(values: &[f32]) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (idx, &value) in values.iter().enumerate() {
        match best {
            Some((_, best_value)) if value <= best_value => {}
            _ => best = Some((idx, value)),
        }
    }
    best.map(|(idx, _)| idx)
}

/// Pick the most probable label among those eligible for `hint`
pub fn select_label(logits: &[f32], vocabulary: &LabelVocabulary, hint: CropHint) -> Result<LabelChoice> {
    if logits.len() != vocabulary.len() {
        return Err(LeafError::Inference(format!(
            "Model returned {} logits for a vocabulary of {} labels",
            logits.len(),
            vocabulary.len()
        )));
    }
    if logits.is_empty() {
        return Err(LeafError::Inference("Empty label vocabulary".to_string()));
    }

    let candidates: Vec<usize> = match hint.crop() {
        Some(crop) => {
            let subset = vocabulary.indices_for_crop(crop);
            if subset.is_empty() {
                (0..logits.len()).collect()
            } else {
                subset
            }
        }
        None => (0..logits.len()).collect(),
    };

    let subset_logits: Vec<f32> = candidates.iter().map(|&idx| logits[idx]).collect();
    let probabilities = softmax(&subset_logits);
    let local = argmax(&probabilities)
        .ok_or_else(|| LeafError::Inference("No candidate labels".to_string()))?;
    let index = candidates[local];

    let label = vocabulary
        .get(index)
        .ok_or_else(|| LeafError::Inference(format!("Label index {} out of range", index)))?;

    Ok(LabelChoice {
        crop: label.crop,
        disease: label.disease.clone(),
        confidence: probabilities[local].clamp(0.0, 1.0),
        index,
    })
}

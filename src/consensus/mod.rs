use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;
use crate::labels::labeled_enum;
use crate::modality::{Modality, ModalityAdjustment, ModalityVector};
use crate::profile::WeightingProfile;
use crate::util::clamp_percent;


/// Calibration constant for the disagreement penalty. Reproduce exactly.
pub const COHERENCE_DECAY: f64 = 4.0;
/// Calibration constant for urban thermal/spectral false positives.
pub const URBAN_SUPPRESSION_FACTOR: f64 = 0.6;
pub const MEDIUM_TIER_THRESHOLD: f64 = 50.0;
pub const HIGH_TIER_THRESHOLD: f64 = 80.0;

labeled_enum! {
    pub enum ConfidenceTier {
        Low => "LOW",
        Medium => "MEDIUM",
        High => "HIGH",
    }
}

impl ConfidenceTier {
    pub fn for_score(score: f64) -> Self {
        if score >= HIGH_TIER_THRESHOLD {
            Self::High
        } else if score >= MEDIUM_TIER_THRESHOLD {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsensusResult {
    pub commodity: String,
    pub score: f64,
    /// Scorer output before any ground-truth uplift.
    pub base_score: f64,
    pub tier: ConfidenceTier,
    /// `w_i * v_i` per modality with normalized weights.
    pub contributions: BTreeMap<Modality, f64>,
    pub coherence: f64,
    pub weighted_mean: f64,
    pub weighted_variance: f64,
    pub bias_suppressed: bool,
    pub score_clamped: bool,
    pub modality_adjustments: Vec<ModalityAdjustment>,
    #[serde(default)]
    pub ground_truth_multiplier: Option<f64>,
}

impl ConsensusResult {
    /// Applies the vault-derived consensus multiplier and returns a new result.
    /// The multiplier replaces, rather than stacks on, any earlier uplift.
    pub fn with_ground_truth_uplift(&self, multiplier: f64) -> ConsensusResult {
        let raw = self.base_score * multiplier;
        let score = clamp_percent(raw);

        ConsensusResult {
            score,
            tier: ConfidenceTier::for_score(score),
            score_clamped: self.score_clamped || raw != score,
            ground_truth_multiplier: Some(multiplier),
            ..self.clone()
        }
    }

    pub fn had_input_adjustments(&self) -> bool {
        !self.modality_adjustments.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ConsensusScorer;

impl ConsensusScorer {
    pub fn new() -> Self {
        Self
    }

    pub fn score(
        &self,
        vector: &ModalityVector,
        profile: &WeightingProfile,
        is_urban_area: bool,
    ) -> Result<ConsensusResult> {
        let weights = profile.normalized()?;
        let values = vector.values();

        // Accumulate around a reference reading so identical inputs give an
        // exact mean and an exact zero variance.
        let reference = values[0];
        let mean = reference
            + weights
                .iter()
                .zip(values)
                .map(|(weight, value)| weight * (value - reference))
                .sum::<f64>();
        let variance: f64 = weights
            .iter()
            .zip(values)
            .map(|(weight, value)| weight * (value - mean).powi(2))
            .sum();

        let coherence = (-variance * COHERENCE_DECAY).exp();
        let mut raw = mean * coherence * 100.0;
        if is_urban_area {
            raw *= URBAN_SUPPRESSION_FACTOR;
        }
        let score = clamp_percent(raw);

        let contributions = Modality::ALL
            .iter()
            .map(|&modality| {
                let index = modality.index();
                (modality, weights[index] * values[index])
            })
            .collect();

        debug!(
            commodity = %profile.commodity,
            mean,
            variance,
            coherence,
            score,
            urban = is_urban_area,
            "scored modality vector"
        );

        Ok(ConsensusResult {
            commodity: profile.commodity.clone(),
            score,
            base_score: score,
            tier: ConfidenceTier::for_score(score),
            contributions,
            coherence,
            weighted_mean: mean,
            weighted_variance: variance,
            bias_suppressed: is_urban_area,
            score_clamped: raw != score,
            modality_adjustments: vector.adjustments().to_vec(),
            ground_truth_multiplier: None,
        })
    }
}

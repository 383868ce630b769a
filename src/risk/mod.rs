//! Dry-hole risk from fused confidence, caller-supplied structural and grade
//! sub-scores, and the vault evidence around a target.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::conflict::{Conflict, consensus_multiplier, unresolved_count};
use crate::error::{CoreError, Result};
use crate::geo::GeoPoint;
use crate::labels::labeled_enum;
use crate::util::{clamp_percent, clamp_unit};
use crate::vault::NearbyRecord;

#[cfg(test)]
mod tests;

/// Records within this distance count as evidence for a target.
pub const EVIDENCE_RADIUS_KM: f64 = 1.0;
pub const PROCEED_BELOW_RISK: f64 = 30.0;
pub const SURVEY_AT_RISK: f64 = 60.0;
pub const CONFIDENCE_LEVEL: f64 = 0.90;
pub const SPARSE_HALF_WIDTH: f64 = 15.0;
pub const DENSE_HALF_WIDTH: f64 = 5.0;
pub const SPARSE_DENSITY: usize = 5;
pub const DENSE_DENSITY: usize = 20;

labeled_enum! {
    pub enum CriticalFailureMode {
        Structure => "structure",
        Grade => "grade",
        MineralAbsence => "mineral_absence",
    }
}

labeled_enum! {
    pub enum RecommendedAction {
        Proceed => "Proceed",
        AcquireAdditionalData => "Acquire additional data",
        Acquire3dSurvey => "Acquire 3D survey",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskRequest {
    pub location: GeoPoint,
    pub commodity: String,
    /// Fused consensus score in [0, 100], before any ground-truth uplift.
    pub fused_confidence: f64,
    /// Supplied by the structural model, [0, 1].
    pub structural_integrity_score: f64,
    /// Supplied by the grade model, [0, 1].
    pub grade_probability_vs_cutoff: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceInterval {
    pub level: f64,
    pub lower: f64,
    pub upper: f64,
    pub half_width: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub location: GeoPoint,
    pub commodity: String,
    pub data_density: usize,
    pub fused_confidence: f64,
    pub structural_integrity_score: f64,
    pub grade_probability_vs_cutoff: f64,
    pub consensus_multiplier: f64,
    pub unresolved_conflicts: usize,
    pub dry_hole_risk_percent: f64,
    pub critical_failure_mode: CriticalFailureMode,
    pub recommended_action: RecommendedAction,
    pub confidence_interval: ConfidenceInterval,
    pub anchor_record_ids: Vec<Uuid>,
    /// An unresolved critical conflict decided the action.
    pub critical_conflict_override: bool,
    /// No vault records near the target; the estimate rests on remote data alone.
    pub insufficient_data: bool,
    pub inputs_clamped: bool,
    pub assessed_at: DateTime<Utc>,
}

fn finite(name: &str, value: f64) -> Result<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(CoreError::validation(format!("{name} must be finite, got {value}")))
    }
}

/// Half-width of the interval around the point estimate: 15 points below
/// five records, 5 points from twenty, linear in between.
pub fn interval_half_width(data_density: usize) -> f64 {
    if data_density < SPARSE_DENSITY {
        SPARSE_HALF_WIDTH
    } else if data_density >= DENSE_DENSITY {
        DENSE_HALF_WIDTH
    } else {
        let progress =
            (data_density - SPARSE_DENSITY) as f64 / (DENSE_DENSITY - SPARSE_DENSITY) as f64;
        SPARSE_HALF_WIDTH - progress * (SPARSE_HALF_WIDTH - DENSE_HALF_WIDTH)
    }
}

/// Lowest sub-score wins; ties go to structure, then grade.
pub fn critical_failure_mode(
    structural_integrity: f64,
    grade_probability: f64,
    mineral_presence: f64,
) -> CriticalFailureMode {
    let mut mode = CriticalFailureMode::Structure;
    let mut lowest = structural_integrity;
    if grade_probability < lowest {
        mode = CriticalFailureMode::Grade;
        lowest = grade_probability;
    }
    if mineral_presence < lowest {
        mode = CriticalFailureMode::MineralAbsence;
    }
    mode
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RiskAssessor;

impl RiskAssessor {
    pub fn new() -> Self {
        Self
    }

    /// `evidence` is a vault query around the target; only records within
    /// [`EVIDENCE_RADIUS_KM`] count, and superseded records are left out
    /// because the record that beat them already counts. `conflicts` are
    /// those touching the target's neighbourhood.
    pub fn assess(
        &self,
        request: &RiskRequest,
        evidence: &[NearbyRecord],
        conflicts: &[Conflict],
    ) -> Result<RiskAssessment> {
        request.location.validate()?;
        let raw_confidence = finite("fused confidence", request.fused_confidence)?;
        let raw_structural = finite("structural integrity score", request.structural_integrity_score)?;
        let raw_grade = finite("grade probability", request.grade_probability_vs_cutoff)?;

        let fused_confidence = clamp_percent(raw_confidence);
        let structural = clamp_unit(raw_structural);
        let grade = clamp_unit(raw_grade);
        let inputs_clamped = fused_confidence != raw_confidence
            || structural != raw_structural
            || grade != raw_grade;
        if inputs_clamped {
            warn!(
                fused_confidence = raw_confidence,
                structural_integrity = raw_structural,
                grade_probability = raw_grade,
                "risk inputs clamped to range"
            );
        }

        let anchor_record_ids: Vec<Uuid> = evidence
            .iter()
            .filter(|hit| {
                hit.distance_km <= EVIDENCE_RADIUS_KM && !hit.record.is_superseded()
            })
            .map(|hit| hit.record.record_id)
            .collect();
        let data_density = anchor_record_ids.len();

        let unresolved = unresolved_count(conflicts);
        let multiplier = consensus_multiplier(unresolved);
        let success = fused_confidence / 100.0 * structural * grade * multiplier;
        let dry_hole_risk_percent = clamp_percent(100.0 * (1.0 - success));

        let failure_mode = critical_failure_mode(structural, grade, fused_confidence / 100.0);
        let critical_conflict_override = conflicts.iter().any(Conflict::is_unresolved_critical);
        let recommended_action = if critical_conflict_override {
            RecommendedAction::AcquireAdditionalData
        } else if dry_hole_risk_percent < PROCEED_BELOW_RISK {
            RecommendedAction::Proceed
        } else if dry_hole_risk_percent >= SURVEY_AT_RISK
            && failure_mode == CriticalFailureMode::Structure
        {
            RecommendedAction::Acquire3dSurvey
        } else {
            RecommendedAction::AcquireAdditionalData
        };

        let half_width = interval_half_width(data_density);
        let confidence_interval = ConfidenceInterval {
            level: CONFIDENCE_LEVEL,
            lower: clamp_percent(dry_hole_risk_percent - half_width),
            upper: clamp_percent(dry_hole_risk_percent + half_width),
            half_width,
        };

        let insufficient_data = data_density == 0;
        if insufficient_data {
            warn!(
                lat = request.location.lat,
                lon = request.location.lon,
                "no ground truth within evidence radius"
            );
        }

        info!(
            commodity = %request.commodity,
            dry_hole_risk = dry_hole_risk_percent,
            action = %recommended_action,
            failure_mode = %failure_mode,
            data_density,
            unresolved_conflicts = unresolved,
            "risk assessed"
        );

        Ok(RiskAssessment {
            location: request.location,
            commodity: request.commodity.trim().to_lowercase(),
            data_density,
            fused_confidence,
            structural_integrity_score: structural,
            grade_probability_vs_cutoff: grade,
            consensus_multiplier: multiplier,
            unresolved_conflicts: unresolved,
            dry_hole_risk_percent,
            critical_failure_mode: failure_mode,
            recommended_action,
            confidence_interval,
            anchor_record_ids,
            critical_conflict_override,
            insufficient_data,
            inputs_clamped,
            assessed_at: Utc::now(),
        })
    }
}

//! End-to-end evaluation of one target: score the modality vector, vote
//! across epochs, gather vault evidence and conflicts, and assess risk.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::conflict::{Conflict, consensus_multiplier, unresolved_count};
use crate::consensus::{ConsensusResult, ConsensusScorer};
use crate::error::Result;
use crate::geo::GeoPoint;
use crate::modality::{ModalityReadings, ModalityVector};
use crate::profile::ProfileSet;
use crate::risk::{EVIDENCE_RADIUS_KM, RiskAssessment, RiskAssessor, RiskRequest};
use crate::temporal::{EpochObservation, PersistenceVerdict, TemporalCoherenceVoter};
use crate::vault::GroundTruthVault;

fn default_radius() -> f64 {
    EVIDENCE_RADIUS_KM
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetRequest {
    pub location: GeoPoint,
    pub commodity: String,
    pub readings: ModalityReadings,
    #[serde(default)]
    pub is_urban_area: bool,
    /// When the current readings were observed; defaults to now.
    #[serde(default)]
    pub observed_at: Option<DateTime<Utc>>,
    /// Earlier epochs for the same target. Empty skips temporal voting.
    #[serde(default)]
    pub history: Vec<EpochObservation>,
    pub structural_integrity_score: f64,
    pub grade_probability_vs_cutoff: f64,
    #[serde(default = "default_radius")]
    pub search_radius_km: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetEvaluation {
    pub consensus: ConsensusResult,
    /// `consensus` with the vault's ground-truth multiplier applied.
    pub uplifted: ConsensusResult,
    pub persistence: Option<PersistenceVerdict>,
    pub assessment: RiskAssessment,
    pub conflicts: Vec<Conflict>,
}

pub fn evaluate_target(
    vault: &GroundTruthVault,
    profiles: &ProfileSet,
    request: &TargetRequest,
) -> Result<TargetEvaluation> {
    request.location.validate()?;
    let profile = profiles.get(&request.commodity)?;
    let vector = ModalityVector::from_readings(&request.readings);
    let consensus = ConsensusScorer::new().score(&vector, profile, request.is_urban_area)?;

    let persistence = if request.history.is_empty() {
        None
    } else {
        let mut epochs = request.history.clone();
        epochs.push(EpochObservation {
            observed_at: request.observed_at.unwrap_or_else(Utc::now),
            result: consensus.clone(),
        });
        Some(TemporalCoherenceVoter::new().vote(&epochs)?)
    };

    // Density is defined over the evidence radius, whatever the conflict
    // search radius is.
    let evidence_radius_km = request.search_radius_km.max(EVIDENCE_RADIUS_KM);
    let evidence = vault.query(request.location, evidence_radius_km, None)?;
    let conflicts = vault.conflicts_near(request.location, request.search_radius_km)?;
    let multiplier = consensus_multiplier(unresolved_count(&conflicts));
    let uplifted = consensus.with_ground_truth_uplift(multiplier);

    // The assessor applies the multiplier itself, so it gets the
    // pre-uplift score.
    let fused_confidence = persistence
        .as_ref()
        .map_or(consensus.score, |verdict| verdict.adjusted_score);
    let assessment = RiskAssessor::new().assess(
        &RiskRequest {
            location: request.location,
            commodity: profile.commodity.clone(),
            fused_confidence,
            structural_integrity_score: request.structural_integrity_score,
            grade_probability_vs_cutoff: request.grade_probability_vs_cutoff,
        },
        &evidence,
        &conflicts,
    )?;

    info!(
        commodity = %profile.commodity,
        score = consensus.score,
        uplifted_score = uplifted.score,
        persistent = persistence.as_ref().map(|verdict| verdict.persistent),
        dry_hole_risk = assessment.dry_hole_risk_percent,
        "target evaluated"
    );

    Ok(TargetEvaluation {
        consensus,
        uplifted,
        persistence,
        assessment,
        conflicts,
    })
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::consensus::ConfidenceTier;
    use crate::risk::RecommendedAction;
    use crate::vault::{MeasurementType, ProvenanceInput, RecordCandidate, SourceTier};

    fn readings(value: f64) -> ModalityReadings {
        ModalityReadings {
            clay_alteration: Some(value),
            iron_oxide: Some(value),
            structural_density: Some(value),
            thermal_flux: Some(value),
            vegetation_stress: Some(value),
            terrain_complexity: Some(value),
        }
    }

    fn request(location: GeoPoint) -> TargetRequest {
        TargetRequest {
            location,
            commodity: "gold".to_string(),
            readings: readings(0.8),
            is_urban_area: false,
            observed_at: None,
            history: Vec::new(),
            structural_integrity_score: 0.9,
            grade_probability_vs_cutoff: 0.9,
            search_radius_km: 1.0,
        }
    }

    fn assay(location: GeoPoint, value: f64) -> RecordCandidate {
        let mut candidate = RecordCandidate::new(location, MeasurementType::AssayGrade);
        candidate.measurement_value = Some(value);
        candidate
    }

    #[test]
    fn clean_neighbourhood_uplifts_the_score() {
        let vault = GroundTruthVault::open_in_memory().expect("vault");
        let location = GeoPoint::new(-30.5, 121.2).expect("point");
        vault
            .ingest_with_conflicts(
                &assay(location, 4.0),
                &ProvenanceInput::new(SourceTier::PublicAuthoritative, "Survey"),
                1.0,
            )
            .expect("ingest");

        let evaluation =
            evaluate_target(&vault, &ProfileSet::builtin(), &request(location)).expect("evaluate");

        assert_eq!(evaluation.consensus.score, 80.0);
        assert!((evaluation.uplifted.score - 88.0).abs() < 1e-9);
        assert_eq!(evaluation.uplifted.tier, ConfidenceTier::High);
        assert!(evaluation.persistence.is_none());
        assert!(evaluation.conflicts.is_empty());
        assert_eq!(evaluation.assessment.data_density, 1);
        assert_eq!(evaluation.assessment.fused_confidence, 80.0);
    }

    #[test]
    fn critical_conflict_nearby_overrides_the_action() {
        let vault = GroundTruthVault::open_in_memory().expect("vault");
        let location = GeoPoint::new(12.0, -1.5).expect("point");
        vault
            .ingest_with_conflicts(
                &assay(location, 10.0),
                &ProvenanceInput::new(SourceTier::Commercial, "Lab A"),
                1.0,
            )
            .expect("first");
        vault
            .ingest_with_conflicts(
                &assay(location, 25.0),
                &ProvenanceInput::new(SourceTier::Client, "Lab B"),
                1.0,
            )
            .expect("second");

        let mut strong = request(location);
        strong.readings = readings(1.0);
        strong.structural_integrity_score = 1.0;
        strong.grade_probability_vs_cutoff = 1.0;
        let evaluation = evaluate_target(&vault, &ProfileSet::builtin(), &strong).expect("evaluate");

        assert_eq!(evaluation.conflicts.len(), 1);
        assert!((evaluation.uplifted.ground_truth_multiplier.expect("set") - 1.05).abs() < 1e-12);
        assert_eq!(
            evaluation.assessment.recommended_action,
            RecommendedAction::AcquireAdditionalData
        );
    }

    #[test]
    fn history_feeds_the_temporal_vote() {
        let vault = GroundTruthVault::open_in_memory().expect("vault");
        let location = GeoPoint::new(40.0, -105.0).expect("point");
        let profiles = ProfileSet::builtin();
        let earlier = ConsensusScorer::new()
            .score(
                &ModalityVector::uniform(0.8),
                profiles.get("gold").expect("gold"),
                false,
            )
            .expect("score");
        let now = Utc::now();

        let mut with_history = request(location);
        with_history.observed_at = Some(now);
        with_history.history = vec![
            EpochObservation {
                observed_at: now - Duration::days(120),
                result: earlier.clone(),
            },
            EpochObservation {
                observed_at: now - Duration::days(60),
                result: earlier,
            },
        ];

        let evaluation = evaluate_target(&vault, &profiles, &with_history).expect("evaluate");
        let verdict = evaluation.persistence.expect("voted");
        assert!(verdict.persistent);
        assert_eq!(verdict.epoch_count, 3);
        assert_eq!(evaluation.assessment.fused_confidence, verdict.adjusted_score);
        assert!(evaluation.assessment.insufficient_data);
    }

    #[test]
    fn narrow_conflict_radius_still_counts_evidence_within_a_kilometre() {
        let vault = GroundTruthVault::open_in_memory().expect("vault");
        let target = GeoPoint::new(-22.0, 118.0).expect("point");
        // 0.8 km due north.
        let nearby = GeoPoint::new(-22.0 + 0.8 / 111.195, 118.0).expect("point");
        let record_id = vault
            .ingest(
                &assay(nearby, 3.0),
                &ProvenanceInput::new(SourceTier::Commercial, "Core Lab"),
            )
            .expect("ingest");

        let mut narrow = request(target);
        narrow.search_radius_km = 0.5;
        let evaluation = evaluate_target(&vault, &ProfileSet::builtin(), &narrow).expect("evaluate");

        assert_eq!(evaluation.assessment.data_density, 1);
        assert_eq!(evaluation.assessment.anchor_record_ids, vec![record_id]);
        assert!(!evaluation.assessment.insufficient_data);
    }

    #[test]
    fn unknown_commodity_is_a_config_error() {
        let vault = GroundTruthVault::open_in_memory().expect("vault");
        let mut bad = request(GeoPoint::new(0.0, 0.0).expect("point"));
        bad.commodity = "unobtainium".to_string();
        assert!(matches!(
            evaluate_target(&vault, &ProfileSet::builtin(), &bad),
            Err(crate::error::CoreError::Config(_))
        ));
    }
}

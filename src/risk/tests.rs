use pretty_assertions::assert_eq;

use super::*;
use crate::conflict::{
    ConflictFinding, ConflictResolver, ConflictState, ConflictType, ResolutionMethod, Severity,
};
use crate::vault::{GroundTruthVault, MeasurementType, ProvenanceInput, RecordCandidate, SourceTier};

fn target() -> GeoPoint {
    GeoPoint {
        lat: -23.7,
        lon: 133.9,
    }
}

fn request(fused: f64, structural: f64, grade: f64) -> RiskRequest {
    RiskRequest {
        location: target(),
        commodity: "Gold".to_string(),
        fused_confidence: fused,
        structural_integrity_score: structural,
        grade_probability_vs_cutoff: grade,
    }
}

fn evidence(count: usize) -> Vec<NearbyRecord> {
    let vault = GroundTruthVault::open_in_memory().expect("vault");
    for step in 0..count {
        let mut candidate = RecordCandidate::new(
            GeoPoint {
                lat: target().lat + step as f64 * 0.0001,
                lon: target().lon,
            },
            MeasurementType::Density,
        );
        candidate.measurement_value = Some(2.65);
        vault
            .ingest(
                &candidate,
                &ProvenanceInput::new(SourceTier::Commercial, "Core Shed"),
            )
            .expect("ingest");
    }
    vault.query(target(), EVIDENCE_RADIUS_KM, None).expect("query")
}

fn conflict(severity: Severity, state: ConflictState) -> Conflict {
    let mut conflict = Conflict::new(
        Uuid::new_v4(),
        Uuid::new_v4(),
        ConflictFinding {
            conflict_type: ConflictType::GradeContradiction,
            severity,
            percent_delta: Some(150.0),
            distance_km: 0.2,
            detail: "assay_ppm values 10 vs 25".to_string(),
        },
    )
    .expect("distinct records");
    conflict.state = state;
    conflict
}

#[test]
fn dry_hole_risk_follows_the_product_formula() {
    let assessment = RiskAssessor::new()
        .assess(&request(90.0, 0.95, 0.9), &evidence(3), &[])
        .expect("assess");

    let expected = 100.0 * (1.0 - 0.9 * 0.95 * 0.9 * 1.1);
    assert!((assessment.dry_hole_risk_percent - expected).abs() < 1e-9);
    assert_eq!(assessment.consensus_multiplier, 1.1);
    assert_eq!(assessment.data_density, 3);
    assert_eq!(assessment.anchor_record_ids.len(), 3);
    assert_eq!(assessment.commodity, "gold");
    assert_eq!(assessment.recommended_action, RecommendedAction::Proceed);
    assert!(!assessment.insufficient_data);
}

#[test]
fn risk_is_non_increasing_in_each_input() {
    let assessor = RiskAssessor::new();
    let evidence = evidence(2);
    let steps: Vec<f64> = (0..=10).map(|step| f64::from(step) / 10.0).collect();

    for &base in &steps {
        let mut previous = [f64::INFINITY; 3];
        for &value in &steps {
            let requests = [
                request(value * 100.0, base, base),
                request(base * 100.0, value, base),
                request(base * 100.0, base, value),
            ];
            for (slot, req) in requests.iter().enumerate() {
                let risk = assessor
                    .assess(req, &evidence, &[])
                    .expect("assess")
                    .dry_hole_risk_percent;
                assert!(risk <= previous[slot], "input {slot} base {base} value {value}");
                assert!((0.0..=100.0).contains(&risk));
                previous[slot] = risk;
            }
        }
    }
}

#[test]
fn unresolved_critical_conflict_forces_more_data() {
    let assessor = RiskAssessor::new();
    let strong = request(100.0, 1.0, 1.0);

    let clean = assessor.assess(&strong, &evidence(10), &[]).expect("clean");
    assert_eq!(clean.dry_hole_risk_percent, 0.0);
    assert_eq!(clean.recommended_action, RecommendedAction::Proceed);

    let conflicts = [conflict(Severity::Critical, ConflictState::Open)];
    let overridden = assessor
        .assess(&strong, &evidence(10), &conflicts)
        .expect("overridden");
    assert_eq!(
        overridden.recommended_action,
        RecommendedAction::AcquireAdditionalData
    );
    assert!(overridden.critical_conflict_override);

    let pending = [conflict(Severity::Critical, ConflictState::PendingReview)];
    assert_eq!(
        assessor
            .assess(&request(20.0, 0.2, 0.9), &evidence(1), &pending)
            .expect("pending")
            .recommended_action,
        RecommendedAction::AcquireAdditionalData
    );

    let resolved = [conflict(Severity::Critical, ConflictState::Resolved)];
    let after = assessor.assess(&strong, &evidence(10), &resolved).expect("resolved");
    assert_eq!(after.recommended_action, RecommendedAction::Proceed);
    assert!(!after.critical_conflict_override);
}

#[test]
fn unresolved_conflicts_erode_the_multiplier() {
    let conflicts = [
        conflict(Severity::Low, ConflictState::Open),
        conflict(Severity::Medium, ConflictState::Open),
        conflict(Severity::High, ConflictState::Resolved),
    ];
    let assessment = RiskAssessor::new()
        .assess(&request(70.0, 0.9, 0.9), &evidence(1), &conflicts)
        .expect("assess");
    assert_eq!(assessment.unresolved_conflicts, 2);
    assert!((assessment.consensus_multiplier - 1.0).abs() < 1e-12);
}

#[test]
fn weak_structure_at_high_risk_calls_for_a_survey() {
    let assessor = RiskAssessor::new();

    let structural = assessor
        .assess(&request(90.0, 0.2, 0.9), &evidence(1), &[])
        .expect("assess");
    assert_eq!(structural.critical_failure_mode, CriticalFailureMode::Structure);
    assert_eq!(structural.recommended_action, RecommendedAction::Acquire3dSurvey);

    let grade_limited = assessor
        .assess(&request(90.0, 0.9, 0.2), &evidence(1), &[])
        .expect("assess");
    assert_eq!(grade_limited.critical_failure_mode, CriticalFailureMode::Grade);
    assert_eq!(
        grade_limited.recommended_action,
        RecommendedAction::AcquireAdditionalData
    );
}

#[test]
fn moderate_risk_asks_for_more_data() {
    // 1 - 0.7 * 0.9 * 0.9 * 1.1 = 37.63%
    let assessment = RiskAssessor::new()
        .assess(&request(70.0, 0.9, 0.9), &evidence(1), &[])
        .expect("assess");
    assert!((30.0..60.0).contains(&assessment.dry_hole_risk_percent));
    assert_eq!(
        assessment.recommended_action,
        RecommendedAction::AcquireAdditionalData
    );
}

#[test]
fn failure_mode_ties_break_structure_then_grade() {
    assert_eq!(critical_failure_mode(0.5, 0.5, 0.5), CriticalFailureMode::Structure);
    assert_eq!(critical_failure_mode(0.6, 0.5, 0.5), CriticalFailureMode::Grade);
    assert_eq!(
        critical_failure_mode(0.6, 0.6, 0.5),
        CriticalFailureMode::MineralAbsence
    );
}

#[test]
fn sparse_evidence_widens_the_interval() {
    assert_eq!(interval_half_width(0), 15.0);
    assert_eq!(interval_half_width(4), 15.0);
    assert_eq!(interval_half_width(5), 15.0);
    assert!((interval_half_width(11) - 11.0).abs() < 1e-12);
    assert_eq!(interval_half_width(20), 5.0);
    assert_eq!(interval_half_width(250), 5.0);

    let empty = RiskAssessor::new()
        .assess(&request(50.0, 0.5, 0.5), &[], &[])
        .expect("assess");
    assert!(empty.insufficient_data);
    assert_eq!(empty.confidence_interval.half_width, 15.0);
    assert!(empty.confidence_interval.upper - empty.confidence_interval.lower <= 30.0);
}

#[test]
fn evidence_beyond_one_kilometre_is_ignored() {
    let vault = GroundTruthVault::open_in_memory().expect("vault");
    let mut candidate = RecordCandidate::new(
        GeoPoint {
            lat: target().lat + 0.05,
            lon: target().lon,
        },
        MeasurementType::Magnetic,
    );
    candidate.measurement_value = Some(54_000.0);
    vault
        .ingest(&candidate, &ProvenanceInput::new(SourceTier::RealTime, "UAV"))
        .expect("ingest");

    let hits = vault.query(target(), 10.0, None).expect("query");
    assert_eq!(hits.len(), 1);
    let assessment = RiskAssessor::new()
        .assess(&request(60.0, 0.6, 0.6), &hits, &[])
        .expect("assess");
    assert_eq!(assessment.data_density, 0);
}

#[test]
fn superseded_records_are_not_anchor_evidence() {
    let vault = GroundTruthVault::open_in_memory().expect("vault");
    let candidates = [10.0, 25.0].map(|value| {
        let mut candidate = RecordCandidate::new(target(), MeasurementType::AssayGrade);
        candidate.measurement_value = Some(value);
        candidate
    });
    let winner = vault
        .ingest(
            &candidates[0],
            &ProvenanceInput::new(SourceTier::PublicAuthoritative, "Survey"),
        )
        .expect("ingest");
    let report = vault
        .ingest_with_conflicts(
            &candidates[1],
            &ProvenanceInput::new(SourceTier::Client, "Client"),
            EVIDENCE_RADIUS_KM,
        )
        .expect("ingest");
    let conflict = report.conflicts.first().expect("grade conflict");
    ConflictResolver::new()
        .resolve(&vault, conflict.conflict_id, ResolutionMethod::AuthorityRanking)
        .expect("resolve");

    let hits = vault.query(target(), EVIDENCE_RADIUS_KM, None).expect("query");
    assert_eq!(hits.len(), 2);
    let assessment = RiskAssessor::new()
        .assess(&request(60.0, 0.6, 0.6), &hits, &[])
        .expect("assess");
    assert_eq!(assessment.data_density, 1);
    assert_eq!(assessment.anchor_record_ids, vec![winner]);
}

#[test]
fn out_of_range_inputs_are_clamped_and_flagged() {
    let assessment = RiskAssessor::new()
        .assess(&request(140.0, 1.3, -0.2), &evidence(1), &[])
        .expect("assess");
    assert!(assessment.inputs_clamped);
    assert_eq!(assessment.fused_confidence, 100.0);
    assert_eq!(assessment.grade_probability_vs_cutoff, 0.0);
    assert_eq!(assessment.dry_hole_risk_percent, 100.0);

    assert!(matches!(
        RiskAssessor::new().assess(&request(f64::NAN, 0.5, 0.5), &[], &[]),
        Err(CoreError::Validation(_))
    ));
}

#[test]
fn action_labels_serialize_verbatim() {
    assert_eq!(
        serde_json::to_string(&RecommendedAction::Acquire3dSurvey).expect("json"),
        "\"Acquire 3D survey\""
    );
    assert_eq!(
        serde_json::to_string(&CriticalFailureMode::MineralAbsence).expect("json"),
        "\"mineral_absence\""
    );
}

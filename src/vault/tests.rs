use pretty_assertions::assert_eq;

use super::*;
use crate::conflict::{ConflictType, Severity};

fn site() -> GeoPoint {
    GeoPoint {
        lat: -31.95,
        lon: 121.45,
    }
}

fn assay(location: GeoPoint, value: f64) -> RecordCandidate {
    let mut candidate = RecordCandidate::new(location, MeasurementType::AssayGrade);
    candidate.measurement_value = Some(value);
    candidate.unit = Some("ppm".to_string());
    candidate
}

fn survey(tier: SourceTier) -> ProvenanceInput {
    ProvenanceInput::new(tier, "Geological Survey").with_stage("lab")
}

#[test]
fn reingesting_same_id_and_content_is_idempotent() {
    let vault = GroundTruthVault::open_in_memory().expect("vault");
    let mut candidate = assay(site(), 4.2);
    candidate.record_id = Some(Uuid::new_v4());

    let first = vault
        .ingest(&candidate, &survey(SourceTier::PublicAuthoritative))
        .expect("first ingest");
    let second = vault
        .ingest_with_conflicts(&candidate, &survey(SourceTier::PublicAuthoritative), 1.0)
        .expect("second ingest");

    assert_eq!(Some(first), candidate.record_id);
    assert_eq!(second.record_id, first);
    assert_eq!(second.status, IngestStatus::AlreadyPresent);
    assert_eq!(vault.stats().expect("stats").record_count, 1);
    assert_eq!(vault.stats().expect("stats").provenance_count, 1);
}

#[test]
fn same_content_under_new_id_is_stored_and_flagged() {
    let vault = GroundTruthVault::open_in_memory().expect("vault");
    let candidate = assay(site(), 4.2);

    let first = vault
        .ingest_with_conflicts(&candidate, &survey(SourceTier::Commercial), 1.0)
        .expect("first");
    let second = vault
        .ingest_with_conflicts(&candidate, &survey(SourceTier::Client), 1.0)
        .expect("second");

    assert_eq!(first.status, IngestStatus::Inserted);
    assert_eq!(second.status, IngestStatus::FlaggedForDedup);
    assert_eq!(second.duplicate_of, Some(first.record_id));
    assert!(second.conflicts.is_empty());

    let queue = vault.dedup_review_queue().expect("queue");
    assert_eq!(queue.len(), 1);
    assert_eq!(queue[0].record_id, second.record_id);
    assert_eq!(vault.stats().expect("stats").record_count, 2);
}

#[test]
fn reusing_an_id_for_different_content_is_rejected() {
    let vault = GroundTruthVault::open_in_memory().expect("vault");
    let id = Uuid::new_v4();
    let mut original = assay(site(), 4.2);
    original.record_id = Some(id);
    vault
        .ingest(&original, &survey(SourceTier::Commercial))
        .expect("ingest");

    let mut altered = assay(site(), 9.9);
    altered.record_id = Some(id);
    let err = vault
        .ingest(&altered, &survey(SourceTier::Commercial))
        .expect_err("id collision");
    assert!(matches!(err, CoreError::Validation(_)));
}

#[test]
fn malformed_records_are_rejected_and_not_stored() {
    let vault = GroundTruthVault::open_in_memory().expect("vault");

    let off_planet = assay(GeoPoint { lat: 91.0, lon: 0.0 }, 1.0);
    assert!(matches!(
        vault.ingest(&off_planet, &survey(SourceTier::Commercial)),
        Err(CoreError::Validation(_))
    ));

    let mut non_detect = assay(site(), 1.0);
    non_detect.is_non_detect = true;
    assert!(matches!(
        vault.ingest(&non_detect, &survey(SourceTier::Commercial)),
        Err(CoreError::Validation(_))
    ));

    let blank_org = ProvenanceInput::new(SourceTier::Commercial, "  ");
    assert!(matches!(
        vault.ingest(&assay(site(), 1.0), &blank_org),
        Err(CoreError::Validation(_))
    ));

    assert_eq!(vault.stats().expect("stats").record_count, 0);
}

#[test]
fn new_records_start_raw_at_neutral_gtc() {
    let vault = GroundTruthVault::open_in_memory().expect("vault");
    let id = vault
        .ingest(&assay(site(), 3.0), &survey(SourceTier::PublicAuthoritative))
        .expect("ingest");

    let record = vault.record(id).expect("record");
    assert_eq!(record.validation_status, ValidationStatus::Raw);
    assert_eq!(record.gtc_score, RAW_GTC);
    assert_eq!(record.conflict_status, ConflictStatus::Clean);
    assert_eq!(record.provenance.chain_of_custody, vec!["lab".to_string()]);
    assert_eq!(record.provenance.content_hash, record.data_hash);
}

#[test]
fn query_is_a_hard_radius_filter_sorted_by_distance_then_authority() {
    let vault = GroundTruthVault::open_in_memory().expect("vault");
    let center = site();
    let near = GeoPoint {
        lat: center.lat + 0.001,
        lon: center.lon,
    };
    let far = GeoPoint {
        lat: center.lat + 0.5,
        lon: center.lon,
    };

    let client = vault
        .ingest(&assay(center, 5.0), &survey(SourceTier::Client))
        .expect("client");
    let public = vault
        .ingest(&assay(center, 5.01), &survey(SourceTier::PublicAuthoritative))
        .expect("public");
    let nearby = vault
        .ingest(&assay(near, 5.0), &survey(SourceTier::PublicAuthoritative))
        .expect("nearby");
    vault
        .ingest(&assay(far, 5.0), &survey(SourceTier::PublicAuthoritative))
        .expect("far");

    let mut lithology = RecordCandidate::new(center, MeasurementType::Lithology);
    lithology.tags.lithology = LithologyTag::Granite;
    vault
        .ingest(&lithology, &survey(SourceTier::PublicAuthoritative))
        .expect("lithology");

    let hits = vault
        .query(center, 1.0, Some(MeasurementType::AssayGrade))
        .expect("query");
    let ids: Vec<Uuid> = hits.iter().map(|hit| hit.record.record_id).collect();
    assert_eq!(ids, vec![public, client, nearby]);
    assert!(hits.iter().all(|hit| hit.distance_km <= 1.0));

    let everything = vault.query(center, 1.0, None).expect("query");
    assert_eq!(everything.len(), 4);
}

#[test]
fn validation_status_breaks_ties_at_equal_distance_and_tier() {
    let vault = GroundTruthVault::open_in_memory().expect("vault");
    let raw = vault
        .ingest(&assay(site(), 5.0), &survey(SourceTier::Commercial))
        .expect("raw");
    let reviewed = vault
        .ingest(&assay(site(), 5.02), &survey(SourceTier::Commercial))
        .expect("reviewed");
    vault
        .advance_validation(reviewed, ValidationStatus::QcPassed)
        .expect("qc");

    let hits = vault.query(site(), 0.5, None).expect("query");
    let ids: Vec<Uuid> = hits.iter().map(|hit| hit.record.record_id).collect();
    assert_eq!(ids, vec![reviewed, raw]);
}

#[test]
fn query_radius_is_validated_and_capped() {
    let vault = GroundTruthVault::open_in_memory().expect("vault");
    let far = GeoPoint {
        lat: site().lat + 1.5,
        lon: site().lon,
    };
    vault
        .ingest(&assay(far, 1.0), &survey(SourceTier::Commercial))
        .expect("ingest");

    assert!(matches!(
        vault.query(site(), -1.0, None),
        Err(CoreError::Validation(_))
    ));
    assert!(matches!(
        vault.query(site(), f64::NAN, None),
        Err(CoreError::Validation(_))
    ));
    // ~167 km away: outside the 100 km cap even though 500 km was requested.
    assert!(vault.query(site(), 500.0, None).expect("query").is_empty());
}

#[test]
fn qc_advances_one_step_and_never_regresses() {
    let vault = GroundTruthVault::open_in_memory().expect("vault");
    let id = vault
        .ingest(&assay(site(), 2.0), &survey(SourceTier::PublicAuthoritative))
        .expect("ingest");

    assert!(matches!(
        vault.advance_validation(id, ValidationStatus::PeerReviewed),
        Err(CoreError::Validation(_))
    ));

    let passed = vault
        .advance_validation(id, ValidationStatus::QcPassed)
        .expect("qc");
    assert_eq!(passed.validation_status, ValidationStatus::QcPassed);
    assert_eq!(passed.gtc_score, 0.85);

    let reviewed = vault
        .advance_validation(id, ValidationStatus::PeerReviewed)
        .expect("review");
    assert_eq!(reviewed.gtc_score, 0.98);

    assert!(matches!(
        vault.advance_validation(id, ValidationStatus::QcPassed),
        Err(CoreError::Validation(_))
    ));
    assert!(matches!(
        vault.advance_validation(Uuid::new_v4(), ValidationStatus::QcPassed),
        Err(CoreError::NotFound { .. })
    ));
}

#[test]
fn ingest_with_conflicts_persists_conflicts_and_flags_both_records() {
    let vault = GroundTruthVault::open_in_memory().expect("vault");
    let authoritative = vault
        .ingest_with_conflicts(
            &assay(site(), 10.0),
            &survey(SourceTier::PublicAuthoritative),
            1.0,
        )
        .expect("first");
    let client = vault
        .ingest_with_conflicts(&assay(site(), 25.0), &survey(SourceTier::Client), 1.0)
        .expect("second");

    assert_eq!(client.conflicts.len(), 1);
    let conflict = &client.conflicts[0];
    assert_eq!(conflict.conflict_type, ConflictType::GradeContradiction);
    assert_eq!(conflict.severity, Severity::Critical);
    assert_eq!(conflict.record_a_id, client.record_id);
    assert_eq!(conflict.record_b_id, authoritative.record_id);

    assert_eq!(vault.conflict(conflict.conflict_id).expect("stored"), *conflict);
    assert_eq!(
        vault.record(client.record_id).expect("client").conflict_status,
        ConflictStatus::FlaggedVsTier
    );
    assert_eq!(
        vault
            .record(authoritative.record_id)
            .expect("authoritative")
            .conflict_status,
        ConflictStatus::FlaggedVsNeighbor
    );

    let near = vault.conflicts_near(site(), 1.0).expect("near");
    assert_eq!(near.len(), 1);
    assert_eq!(vault.open_conflicts().expect("open").len(), 1);
    assert_eq!(vault.stats().expect("stats").open_conflict_count, 1);
}

#[test]
fn plain_ingest_skips_conflict_detection() {
    let vault = GroundTruthVault::open_in_memory().expect("vault");
    vault
        .ingest(&assay(site(), 10.0), &survey(SourceTier::Commercial))
        .expect("first");
    let second = vault
        .ingest(&assay(site(), 30.0), &survey(SourceTier::Commercial))
        .expect("second");

    assert!(vault.conflicts_for_record(second).expect("conflicts").is_empty());
}

#[test]
fn file_backed_vault_survives_reopen() {
    let temp = tempfile::tempdir().expect("tempdir");
    let path = temp.path().join("vault.sqlite");

    let id = {
        let vault = GroundTruthVault::open(&path).expect("open");
        vault
            .ingest(&assay(site(), 7.5), &survey(SourceTier::Commercial))
            .expect("ingest")
    };

    let reopened = GroundTruthVault::open(&path).expect("reopen");
    let record = reopened.record(id).expect("record");
    assert_eq!(record.measurement_value, Some(7.5));
    assert_eq!(record.unit.as_deref(), Some("ppm"));
    assert_eq!(
        reopened.stats().expect("stats").db_schema_version.as_deref(),
        Some(DB_SCHEMA_VERSION)
    );
}

#[test]
fn extensions_and_tags_round_trip_through_storage() {
    let vault = GroundTruthVault::open_in_memory().expect("vault");
    let mut candidate = RecordCandidate::new(site(), MeasurementType::CoreDescription);
    candidate.depth = Some(DepthInterval {
        top_m: 12.0,
        bottom_m: Some(14.5),
    });
    candidate.tags.lithology = LithologyTag::Skarn;
    candidate.tags.alteration = AlterationTag::Propylitic;
    candidate.tags.mineralization = MineralizationTag::Disseminated;
    candidate
        .extensions
        .insert("hole_id".to_string(), serde_json::json!("DDH-042"));

    let id = vault
        .ingest(&candidate, &survey(SourceTier::Client))
        .expect("ingest");
    let record = vault.record(id).expect("record");

    assert_eq!(record.depth, candidate.depth);
    assert_eq!(record.tags, candidate.tags);
    assert_eq!(record.extensions, candidate.extensions);
    assert_eq!(record.measurement_value, None);
}

#[test]
fn concurrent_ingests_at_one_site_always_see_each_other() {
    use std::sync::Arc;
    use std::thread;

    let temp = tempfile::tempdir().expect("tempdir");
    let vault = Arc::new(GroundTruthVault::open(&temp.path().join("vault.sqlite")).expect("open"));
    let rounds = 20;

    for round in 0..rounds {
        let location = GeoPoint {
            lat: -40.0 + f64::from(round) * 0.5,
            lon: 140.0,
        };
        let workers: Vec<_> = [(10.0, SourceTier::Commercial), (25.0, SourceTier::Client)]
            .into_iter()
            .map(|(value, tier)| {
                let vault = Arc::clone(&vault);
                thread::spawn(move || {
                    vault
                        .ingest_with_conflicts(&assay(location, value), &survey(tier), 1.0)
                        .expect("ingest")
                })
            })
            .collect();

        let reports: Vec<IngestReport> = workers
            .into_iter()
            .map(|worker| worker.join().expect("worker thread"))
            .collect();
        let detected: usize = reports.iter().map(|report| report.conflicts.len()).sum();
        assert_eq!(detected, 1, "round {round}");
        assert_eq!(
            vault
                .conflicts_for_record(reports[0].record_id)
                .expect("conflicts")
                .len(),
            1,
            "round {round}"
        );
    }

    assert_eq!(vault.stats().expect("stats").conflict_count, i64::from(rounds));
}

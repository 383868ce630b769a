use chrono::TimeZone;

use super::*;
use crate::consensus::ConsensusScorer;
use crate::modality::ModalityVector;
use crate::profile::WeightingProfile;

fn observation(day: u32, value: f64) -> EpochObservation {
    let result = ConsensusScorer::new()
        .score(
            &ModalityVector::uniform(value),
            &WeightingProfile::uniform("gold"),
            false,
        )
        .expect("valid profile");
    EpochObservation {
        observed_at: Utc
            .with_ymd_and_hms(2026, 1, 1, 0, 0, 0)
            .single()
            .expect("valid date")
            + Duration::days(i64::from(day)),
        result,
    }
}

#[test]
fn single_epoch_is_unconfirmed_not_an_error() {
    let verdict = TemporalCoherenceVoter::new()
        .vote(&[observation(0, 0.7)])
        .expect("single epoch is valid");

    assert!(!verdict.persistent);
    assert_eq!(verdict.persistence_score, 0.0);
    assert!((verdict.adjusted_score - 70.0).abs() < 1e-9);
    assert!(verdict.insufficient_epochs);
}

#[test]
fn repeated_timestamp_counts_as_one_epoch() {
    let verdict = TemporalCoherenceVoter::new()
        .vote(&[observation(3, 0.6), observation(3, 0.6)])
        .expect("valid");
    assert!(verdict.insufficient_epochs);
    assert!(!verdict.persistent);
}

#[test]
fn empty_history_is_insufficient_data() {
    let error = TemporalCoherenceVoter::new()
        .vote(&[])
        .expect_err("empty history");
    assert!(error.is_recoverable());
}

#[test]
fn stable_signal_is_persistent_and_boosted() {
    let history = [
        observation(0, 0.8),
        observation(60, 0.8),
        observation(120, 0.8),
    ];
    let verdict = TemporalCoherenceVoter::new().vote(&history).expect("valid");

    assert!(verdict.persistent);
    assert_eq!(verdict.persistence_score, 1.0);
    assert!((verdict.adjusted_score - 80.0).abs() < 1e-9);
    assert!(verdict.meets_recommended_baseline);
    assert_eq!(verdict.baseline_days, 120);
}

#[test]
fn volatile_signal_is_discounted() {
    let history = [observation(0, 0.9), observation(45, 0.1)];
    let verdict = TemporalCoherenceVoter::new().vote(&history).expect("valid");

    // Scores 90 and 10: stddev 40, persistence 0.2.
    assert!((verdict.score_stddev - 40.0).abs() < 1e-9);
    assert!((verdict.persistence_score - 0.2).abs() < 1e-9);
    assert!(!verdict.persistent);
    assert!((verdict.adjusted_score - 50.0 * 0.84).abs() < 1e-9);
    assert!(!verdict.meets_recommended_baseline);
}

#[test]
fn persistence_score_tracks_epoch_spread() {
    // Scores 65 and 35: stddev 15, persistence exactly 0.7.
    let history = [observation(0, 0.65), observation(30, 0.35)];
    let verdict = TemporalCoherenceVoter::new().vote(&history).expect("valid");
    assert!((verdict.persistence_score - 0.7).abs() < 1e-9);
}

#[test]
fn input_order_does_not_matter() {
    let forward = [observation(0, 0.5), observation(30, 0.6), observation(95, 0.55)];
    let reversed = [forward[2].clone(), forward[1].clone(), forward[0].clone()];
    let voter = TemporalCoherenceVoter::new();
    assert_eq!(
        voter.vote(&forward).expect("valid"),
        voter.vote(&reversed).expect("valid")
    );
}

use std::cmp::Ordering;

use chrono::Utc;
use rusqlite::Connection;
use tracing::{info, warn};
use uuid::Uuid;

use super::detect::detect_against;
use super::model::{Conflict, ConflictState, ConflictType, ResolutionMethod, Severity};
use crate::error::{CoreError, Result};
use crate::vault::{
    GroundTruthRecord, GroundTruthVault, load_conflict_in, load_record_in, store_resolution_in,
};

pub const CONSENSUS_MULTIPLIER_MAX: f64 = 1.1;
pub const CONSENSUS_MULTIPLIER_STEP: f64 = 0.05;

/// Ground-truth uplift fed back into the fused score: 1.1 with no unresolved
/// conflicts nearby, falling by 0.05 per unresolved conflict to a floor of 1.0.
pub fn consensus_multiplier(unresolved: usize) -> f64 {
    (CONSENSUS_MULTIPLIER_MAX - CONSENSUS_MULTIPLIER_STEP * unresolved as f64).max(1.0)
}

pub fn unresolved_count(conflicts: &[Conflict]) -> usize {
    conflicts
        .iter()
        .filter(|conflict| conflict.is_unresolved())
        .count()
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ConflictResolver;

impl ConflictResolver {
    pub fn new() -> Self {
        Self
    }

    /// Conflicts `candidate` would raise against the vault's current
    /// contents. Nothing is persisted; use
    /// [`GroundTruthVault::ingest_with_conflicts`] to store and detect
    /// atomically.
    pub fn detect_conflicts(
        &self,
        candidate: &GroundTruthRecord,
        vault: &GroundTruthVault,
        radius_km: f64,
    ) -> Result<Vec<Conflict>> {
        let neighbors = vault.query(candidate.location, radius_km, None)?;
        detect_against(candidate, &neighbors)
    }

    pub fn resolve(
        &self,
        vault: &GroundTruthVault,
        conflict_id: Uuid,
        method: ResolutionMethod,
    ) -> Result<Conflict> {
        vault.transact(|tx| {
            let conflict = load_conflict_in(tx, conflict_id)?;
            match conflict.state {
                ConflictState::Resolved => {
                    return Err(CoreError::validation(format!(
                        "conflict {conflict_id} is already resolved"
                    )));
                }
                ConflictState::PendingReview if method != ResolutionMethod::ManualReview => {
                    return Err(CoreError::validation(format!(
                        "conflict {conflict_id} is awaiting manual review and cannot be auto-resolved"
                    )));
                }
                _ => {}
            }

            match method {
                ResolutionMethod::AuthorityRanking => resolve_by_authority(tx, conflict, None),
                ResolutionMethod::ConsensusWeighted => resolve_by_consensus(tx, conflict),
                ResolutionMethod::ManualReview => flag_in(tx, conflict, None),
            }
        })
    }

    /// Parks a conflict in the pending-review queue. A human closes it later
    /// through [`ConflictResolver::complete_review`].
    pub fn flag_for_review(
        &self,
        vault: &GroundTruthVault,
        conflict_id: Uuid,
        reason: Option<&str>,
    ) -> Result<Conflict> {
        vault.transact(|tx| {
            let conflict = load_conflict_in(tx, conflict_id)?;
            if conflict.state == ConflictState::Resolved {
                return Err(CoreError::validation(format!(
                    "conflict {conflict_id} is already resolved"
                )));
            }
            flag_in(tx, conflict, reason.map(str::to_string))
        })
    }

    /// Records a reviewer's verdict on a pending conflict. `winner`, when
    /// given, must be one of the two records and supersedes the other.
    pub fn complete_review(
        &self,
        vault: &GroundTruthVault,
        conflict_id: Uuid,
        reviewer: &str,
        winner: Option<Uuid>,
        notes: Option<&str>,
    ) -> Result<Conflict> {
        let reviewer = reviewer.trim();
        if reviewer.is_empty() {
            return Err(CoreError::validation(
                "a reviewer identity is required to close a manual review",
            ));
        }

        vault.transact(|tx| {
            let mut conflict = load_conflict_in(tx, conflict_id)?;
            if conflict.state != ConflictState::PendingReview {
                return Err(CoreError::validation(format!(
                    "conflict {conflict_id} is {} and not awaiting review",
                    conflict.state
                )));
            }

            let superseded = match winner {
                Some(winner_id) => {
                    let loser = conflict.counterpart(winner_id).ok_or_else(|| {
                        CoreError::validation(format!(
                            "record {winner_id} is not part of conflict {conflict_id}"
                        ))
                    })?;
                    Some((loser, winner_id))
                }
                None => None,
            };

            conflict.state = ConflictState::Resolved;
            conflict.resolution_method = Some(ResolutionMethod::ManualReview);
            conflict.winning_record_id = winner;
            conflict.reviewer = Some(reviewer.to_string());
            conflict.resolution_notes = notes
                .map(str::trim)
                .filter(|text| !text.is_empty())
                .map(str::to_string)
                .or(conflict.resolution_notes.take());
            conflict.resolved_at = Some(Utc::now());

            store_resolution_in(tx, &conflict, superseded)?;
            info!(
                conflict_id = %conflict_id,
                reviewer,
                winner = ?winner,
                "manual review completed"
            );
            Ok(conflict)
        })
    }

    pub fn pending_reviews(&self, vault: &GroundTruthVault) -> Result<Vec<Conflict>> {
        vault.pending_reviews()
    }
}

fn flag_in(connection: &Connection, mut conflict: Conflict, reason: Option<String>) -> Result<Conflict> {
    conflict.state = ConflictState::PendingReview;
    conflict.resolution_method = Some(ResolutionMethod::ManualReview);
    conflict.winning_record_id = None;
    if reason.is_some() {
        conflict.resolution_notes = reason;
    }

    store_resolution_in(connection, &conflict, None)?;
    info!(
        conflict_id = %conflict.conflict_id,
        severity = %conflict.severity,
        "conflict flagged for manual review"
    );
    Ok(conflict)
}

fn describe(record: &GroundTruthRecord) -> String {
    format!(
        "{} {} ingested {}",
        record.source_tier(),
        record.validation_status,
        record.ingested_at.to_rfc3339()
    )
}

fn resolve_by_authority(
    connection: &Connection,
    mut conflict: Conflict,
    preamble: Option<String>,
) -> Result<Conflict> {
    let a = load_record_in(connection, conflict.record_a_id)?;
    let b = load_record_in(connection, conflict.record_b_id)?;

    let ordering = a
        .authority_rank()
        .cmp(&b.authority_rank())
        .then(a.ingested_at.cmp(&b.ingested_at));
    let (winner, loser) = match ordering {
        Ordering::Greater => (&a, &b),
        Ordering::Less => (&b, &a),
        Ordering::Equal => {
            warn!(
                conflict_id = %conflict.conflict_id,
                "authority ranking tied exactly; escalating to manual review"
            );
            let reason = format!(
                "{}authority ranking tied exactly ({})",
                preamble.unwrap_or_default(),
                describe(&a)
            );
            return flag_in(connection, conflict, Some(reason));
        }
    };

    conflict.state = ConflictState::Resolved;
    conflict.resolution_method = Some(ResolutionMethod::AuthorityRanking);
    conflict.winning_record_id = Some(winner.record_id);
    conflict.consensus_value = None;
    conflict.resolution_notes = Some(format!(
        "{}{} outranks {}",
        preamble.unwrap_or_default(),
        describe(winner),
        describe(loser)
    ));
    conflict.resolved_at = Some(Utc::now());

    store_resolution_in(
        connection,
        &conflict,
        Some((loser.record_id, winner.record_id)),
    )?;
    info!(
        conflict_id = %conflict.conflict_id,
        winner = %winner.record_id,
        superseded = %loser.record_id,
        "conflict resolved by authority ranking"
    );
    Ok(conflict)
}

fn resolve_by_consensus(connection: &Connection, mut conflict: Conflict) -> Result<Conflict> {
    let a = load_record_in(connection, conflict.record_a_id)?;
    let b = load_record_in(connection, conflict.record_b_id)?;

    let values = match (a.numeric_value(), b.numeric_value()) {
        (Some(left), Some(right))
            if conflict.conflict_type == ConflictType::GradeContradiction
                && conflict.severity <= Severity::Medium =>
        {
            Some((left, right))
        }
        _ => None,
    };

    let Some((left, right)) = values else {
        let preamble = format!(
            "consensus weighting needs two numeric values in a low or medium grade conflict \
             ({} {}); fell back to authority ranking: ",
            conflict.severity, conflict.conflict_type
        );
        return resolve_by_authority(connection, conflict, Some(preamble));
    };

    let total_weight = a.gtc_score + b.gtc_score;
    let value = if total_weight > 0.0 {
        (left * a.gtc_score + right * b.gtc_score) / total_weight
    } else {
        (left + right) / 2.0
    };

    conflict.state = ConflictState::Resolved;
    conflict.resolution_method = Some(ResolutionMethod::ConsensusWeighted);
    conflict.winning_record_id = None;
    conflict.consensus_value = Some(value);
    conflict.resolution_notes = Some(format!(
        "GTC-weighted consensus value {value:.4} ({left} @ {:.2}, {right} @ {:.2})",
        a.gtc_score, b.gtc_score
    ));
    conflict.resolved_at = Some(Utc::now());

    store_resolution_in(connection, &conflict, None)?;
    info!(
        conflict_id = %conflict.conflict_id,
        consensus_value = value,
        "conflict resolved by consensus weighting"
    );
    Ok(conflict)
}

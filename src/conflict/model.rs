use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CoreError, Result};
use crate::labels::labeled_enum;

labeled_enum! {
    pub enum ConflictType {
        DepthMismatch => "depth_mismatch",
        GradeContradiction => "grade_contradiction",
        LithologyDisagreement => "lithology_disagreement",
        Other => "other",
    }
}

labeled_enum! {
    pub enum Severity {
        Low => "low",
        Medium => "medium",
        High => "high",
        Critical => "critical",
    }
}

impl Severity {
    /// Relative-delta bands: 10%, 25%, 50%, 100%.
    pub fn for_percent_delta(percent: f64) -> Option<Self> {
        if percent >= 100.0 {
            Some(Self::Critical)
        } else if percent >= 50.0 {
            Some(Self::High)
        } else if percent >= 25.0 {
            Some(Self::Medium)
        } else if percent >= 10.0 {
            Some(Self::Low)
        } else {
            None
        }
    }
}

labeled_enum! {
    pub enum ResolutionMethod {
        AuthorityRanking => "authority_ranking" | "authority",
        ConsensusWeighted => "consensus_weighted" | "consensus",
        ManualReview => "manual_review" | "manual",
    }
}

labeled_enum! {
    pub enum ConflictState {
        Open => "open",
        PendingReview => "pending_review",
        Resolved => "resolved",
    }
}

/// Pairwise disagreement between two stored observations. `record_a_id` is
/// the record whose arrival triggered detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conflict {
    pub conflict_id: Uuid,
    pub record_a_id: Uuid,
    pub record_b_id: Uuid,
    pub conflict_type: ConflictType,
    pub severity: Severity,
    pub percent_delta: Option<f64>,
    pub distance_km: f64,
    pub detail: String,
    pub state: ConflictState,
    pub resolution_method: Option<ResolutionMethod>,
    pub winning_record_id: Option<Uuid>,
    pub consensus_value: Option<f64>,
    pub resolution_notes: Option<String>,
    pub reviewer: Option<String>,
    pub detected_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl Conflict {
    pub fn new(record_a_id: Uuid, record_b_id: Uuid, finding: ConflictFinding) -> Result<Self> {
        if record_a_id == record_b_id {
            return Err(CoreError::validation(format!(
                "record {record_a_id} cannot conflict with itself"
            )));
        }

        Ok(Self {
            conflict_id: Uuid::new_v4(),
            record_a_id,
            record_b_id,
            conflict_type: finding.conflict_type,
            severity: finding.severity,
            percent_delta: finding.percent_delta,
            distance_km: finding.distance_km,
            detail: finding.detail,
            state: ConflictState::Open,
            resolution_method: None,
            winning_record_id: None,
            consensus_value: None,
            resolution_notes: None,
            reviewer: None,
            detected_at: Utc::now(),
            resolved_at: None,
        })
    }

    pub fn is_unresolved(&self) -> bool {
        self.state != ConflictState::Resolved
    }

    pub fn is_unresolved_critical(&self) -> bool {
        self.is_unresolved() && self.severity == Severity::Critical
    }

    pub fn involves(&self, record_id: Uuid) -> bool {
        self.record_a_id == record_id || self.record_b_id == record_id
    }

    pub fn counterpart(&self, record_id: Uuid) -> Option<Uuid> {
        if self.record_a_id == record_id {
            Some(self.record_b_id)
        } else if self.record_b_id == record_id {
            Some(self.record_a_id)
        } else {
            None
        }
    }
}

/// A detected disagreement before it is bound to record ids.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConflictFinding {
    pub conflict_type: ConflictType,
    pub severity: Severity,
    pub percent_delta: Option<f64>,
    pub distance_km: f64,
    pub detail: String,
}

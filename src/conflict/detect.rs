use super::compatibility::{
    alterations_compatible, lithologies_compatible, lithology_family, types_comparable,
};
use super::model::{Conflict, ConflictFinding, ConflictType, Severity};
use crate::error::Result;
use crate::vault::{DepthInterval, GroundTruthRecord, NearbyRecord};

pub const DEPTH_TOLERANCE_FRACTION: f64 = 0.10;
pub const DEPTH_TOLERANCE_FLOOR_M: f64 = 5.0;
const RELATIVE_DELTA_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq)]
struct DepthComparison {
    disagreement_m: f64,
    tolerance_m: f64,
}

impl DepthComparison {
    fn exceeds_tolerance(&self) -> bool {
        self.disagreement_m > self.tolerance_m
    }
}

fn compare_depths(a: &DepthInterval, b: &DepthInterval) -> DepthComparison {
    let top_delta = (a.top_m - b.top_m).abs();
    let bottom_delta = match (a.bottom_m, b.bottom_m) {
        (Some(left), Some(right)) => (left - right).abs(),
        _ => 0.0,
    };
    let width = a.width().max(b.width());

    DepthComparison {
        disagreement_m: top_delta.max(bottom_delta),
        tolerance_m: (width * DEPTH_TOLERANCE_FRACTION).max(DEPTH_TOLERANCE_FLOOR_M),
    }
}

fn depth_severity(ratio: f64) -> Severity {
    if ratio > 10.0 {
        Severity::Critical
    } else if ratio > 4.0 {
        Severity::High
    } else if ratio > 2.0 {
        Severity::Medium
    } else {
        Severity::Low
    }
}

fn units_differ(a: &GroundTruthRecord, b: &GroundTruthRecord) -> bool {
    match (a.unit.as_deref(), b.unit.as_deref()) {
        (Some(left), Some(right)) => !left.trim().eq_ignore_ascii_case(right.trim()),
        _ => false,
    }
}

fn compare_values(a: &GroundTruthRecord, b: &GroundTruthRecord, distance_km: f64) -> Option<ConflictFinding> {
    match (a.is_non_detect, b.is_non_detect) {
        (true, true) => None,
        (false, false) => {
            let left = a.measurement_value?;
            let right = b.measurement_value?;
            let reference = left.abs().min(right.abs()).max(RELATIVE_DELTA_EPSILON);
            let percent = (left - right).abs() / reference * 100.0;
            let severity = Severity::for_percent_delta(percent)?;
            let (low, high) = if left <= right { (left, right) } else { (right, left) };
            Some(ConflictFinding {
                conflict_type: ConflictType::GradeContradiction,
                severity,
                percent_delta: Some(percent),
                distance_km,
                detail: format!("{} values {low} vs {high}", a.measurement_type),
            })
        }
        (non_detect_a, _) => {
            let (non_detect, detected) = if non_detect_a { (a, b) } else { (b, a) };
            let value = detected.measurement_value?;
            let percent = match non_detect.detection_limit {
                Some(limit) if value.abs() <= limit => return None,
                Some(limit) if limit > 0.0 => Some((value.abs() - limit) / limit * 100.0),
                _ => None,
            };
            let severity = percent
                .and_then(Severity::for_percent_delta)
                .map_or(Severity::High, |banded| banded.max(Severity::High));
            Some(ConflictFinding {
                conflict_type: ConflictType::GradeContradiction,
                severity,
                percent_delta: percent,
                distance_km,
                detail: format!(
                    "{} detected at {value} where a non-detect was reported",
                    a.measurement_type
                ),
            })
        }
    }
}

fn compare_tags(a: &GroundTruthRecord, b: &GroundTruthRecord, distance_km: f64) -> Vec<ConflictFinding> {
    let mut findings = Vec::new();

    let (lith_a, lith_b) = (a.tags.lithology, b.tags.lithology);
    if !lithologies_compatible(lith_a, lith_b) {
        let severity = if lithology_family(lith_a) == lithology_family(lith_b) {
            Severity::Medium
        } else {
            Severity::High
        };
        // Order the labels so the detail reads the same from either side.
        let (first, second) = if lith_a <= lith_b { (lith_a, lith_b) } else { (lith_b, lith_a) };
        findings.push(ConflictFinding {
            conflict_type: ConflictType::LithologyDisagreement,
            severity,
            percent_delta: None,
            distance_km,
            detail: format!("lithology {first} vs {second}"),
        });
    }

    let (alt_a, alt_b) = (a.tags.alteration, b.tags.alteration);
    if !alterations_compatible(alt_a, alt_b) {
        let (first, second) = if alt_a <= alt_b { (alt_a, alt_b) } else { (alt_b, alt_a) };
        findings.push(ConflictFinding {
            conflict_type: ConflictType::LithologyDisagreement,
            severity: Severity::Medium,
            percent_delta: None,
            distance_km,
            detail: format!("alteration {first} vs {second}"),
        });
    }

    findings
}

/// Every disagreement between two observations. Symmetric in its arguments.
pub fn compare_pair(a: &GroundTruthRecord, b: &GroundTruthRecord, distance_km: f64) -> Vec<ConflictFinding> {
    if a.record_id == b.record_id || !types_comparable(a.measurement_type, b.measurement_type) {
        return Vec::new();
    }

    if let (Some(depth_a), Some(depth_b)) = (&a.depth, &b.depth) {
        let comparison = compare_depths(depth_a, depth_b);
        if comparison.exceeds_tolerance() {
            // Intervals this far apart sample different rock; their values
            // are not compared.
            let ratio = comparison.disagreement_m / comparison.tolerance_m;
            return vec![ConflictFinding {
                conflict_type: ConflictType::DepthMismatch,
                severity: depth_severity(ratio),
                percent_delta: Some(ratio * 100.0),
                distance_km,
                detail: format!(
                    "depth intervals differ by {:.2} m (tolerance {:.2} m)",
                    comparison.disagreement_m, comparison.tolerance_m
                ),
            }];
        }
    }

    let mut findings = Vec::new();

    if a.measurement_type == b.measurement_type && !a.measurement_type.is_categorical() {
        if units_differ(a, b) {
            let (first, second) = {
                let left = a.unit.as_deref().unwrap_or_default().trim();
                let right = b.unit.as_deref().unwrap_or_default().trim();
                if left <= right { (left, right) } else { (right, left) }
            };
            findings.push(ConflictFinding {
                conflict_type: ConflictType::Other,
                severity: Severity::Medium,
                percent_delta: None,
                distance_km,
                detail: format!("unit mismatch {first} vs {second}"),
            });
        } else if let Some(finding) = compare_values(a, b, distance_km) {
            findings.push(finding);
        }
    }

    findings.extend(compare_tags(a, b, distance_km));
    findings
}

/// Conflicts between `candidate` and a snapshot of its neighbours.
/// Superseded neighbours have already lost a resolution and are skipped.
pub fn detect_against(candidate: &GroundTruthRecord, neighbors: &[NearbyRecord]) -> Result<Vec<Conflict>> {
    let mut conflicts = Vec::new();

    for neighbor in neighbors {
        let existing = &neighbor.record;
        if existing.record_id == candidate.record_id || existing.is_superseded() {
            continue;
        }
        for finding in compare_pair(candidate, existing, neighbor.distance_km) {
            conflicts.push(Conflict::new(candidate.record_id, existing.record_id, finding)?);
        }
    }

    Ok(conflicts)
}

//! Tiered, provenance-tracked ground-truth store on SQLite.
//!
//! Records are append-only. All access goes through one connection behind a
//! mutex and every write runs in an IMMEDIATE transaction, so conflict
//! detection during ingest always sees a consistent snapshot that includes
//! every earlier ingest.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use rusqlite::{Connection, Transaction, TransactionBehavior};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::conflict::{Conflict, ConflictState, detect_against};
use crate::error::{CoreError, Result};
use crate::geo::{BoundingBox, GeoPoint};
use crate::labels::labeled_enum;

mod gtc;
mod provenance;
mod record;
mod schema;
mod store;
#[cfg(test)]
mod tests;

pub use gtc::{RAW_GTC, gtc_score};
pub use provenance::{InvalidSourceTier, Provenance, ProvenanceInput, SourceTier};
pub use record::{
    AlterationTag, ConflictStatus, DepthInterval, GeologicalTags, GroundTruthRecord, LithologyTag,
    MeasurementType, MineralizationTag, RecordCandidate, StructuralTag, ValidationStatus,
};
pub use schema::DB_SCHEMA_VERSION;

/// Upper bound on any radius query; larger requests are capped.
pub const MAX_QUERY_RADIUS_KM: f64 = 100.0;

labeled_enum! {
    pub enum IngestStatus {
        Inserted => "inserted",
        AlreadyPresent => "already_present",
        FlaggedForDedup => "flagged_for_dedup",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestReport {
    pub record_id: Uuid,
    pub status: IngestStatus,
    /// Present when the same content is already stored under another id.
    pub duplicate_of: Option<Uuid>,
    pub conflicts: Vec<Conflict>,
}

/// A query hit with its haversine distance from the query point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NearbyRecord {
    pub distance_km: f64,
    #[serde(flatten)]
    pub record: GroundTruthRecord,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VaultStats {
    pub db_schema_version: Option<String>,
    pub record_count: i64,
    pub provenance_count: i64,
    pub superseded_count: i64,
    pub dedup_review_count: i64,
    pub conflict_count: i64,
    pub open_conflict_count: i64,
    pub pending_review_count: i64,
}

pub struct GroundTruthVault {
    connection: Mutex<Connection>,
}

impl GroundTruthVault {
    pub fn open(path: &Path) -> Result<Self> {
        let connection = Connection::open(path)?;
        schema::configure_connection(&connection, true)?;
        schema::ensure_schema(&connection)?;
        info!(path = %path.display(), "opened ground-truth vault");
        Ok(Self {
            connection: Mutex::new(connection),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let connection = Connection::open_in_memory()?;
        schema::configure_connection(&connection, false)?;
        schema::ensure_schema(&connection)?;
        Ok(Self {
            connection: Mutex::new(connection),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.connection.lock().map_err(|_| CoreError::LockPoisoned)
    }

    /// Runs `work` inside one IMMEDIATE transaction, committing on success.
    pub(crate) fn transact<T>(&self, work: impl FnOnce(&Transaction<'_>) -> Result<T>) -> Result<T> {
        let mut connection = self.lock()?;
        let tx = connection.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let value = work(&tx)?;
        tx.commit()?;
        Ok(value)
    }

    /// Stores a candidate without conflict detection and returns its id.
    pub fn ingest(&self, candidate: &RecordCandidate, provenance: &ProvenanceInput) -> Result<Uuid> {
        let report = self.transact(|tx| ingest_in(tx, candidate, provenance, None))?;
        Ok(report.record_id)
    }

    /// Stores a candidate and records its conflicts against every neighbour
    /// within `radius_km`, atomically.
    pub fn ingest_with_conflicts(
        &self,
        candidate: &RecordCandidate,
        provenance: &ProvenanceInput,
        radius_km: f64,
    ) -> Result<IngestReport> {
        self.transact(|tx| ingest_in(tx, candidate, provenance, Some(radius_km)))
    }

    /// Records within `radius_km`, nearest first, then by tier (most
    /// authoritative first), then by validation status (most validated first).
    pub fn query(
        &self,
        center: GeoPoint,
        radius_km: f64,
        measurement_type: Option<MeasurementType>,
    ) -> Result<Vec<NearbyRecord>> {
        let connection = self.lock()?;
        nearby_in(&connection, center, radius_km, measurement_type)
    }

    pub fn record(&self, record_id: Uuid) -> Result<GroundTruthRecord> {
        let connection = self.lock()?;
        store::load_record(&connection, record_id)
    }

    /// Explicit QC step. Status moves forward one step at a time and the GTC
    /// score is re-derived from the (tier, status) table.
    pub fn advance_validation(
        &self,
        record_id: Uuid,
        target: ValidationStatus,
    ) -> Result<GroundTruthRecord> {
        self.transact(|tx| {
            let record = store::load_record(tx, record_id)?;
            let current = record.validation_status;
            if target <= current {
                return Err(CoreError::validation(format!(
                    "record {record_id} is {current}; validation status never regresses to {target}"
                )));
            }
            if current.next() != Some(target) {
                return Err(CoreError::validation(format!(
                    "record {record_id} must pass through each QC step; {current} cannot jump to {target}"
                )));
            }

            let score = gtc_score(record.source_tier(), target);
            store::update_validation(tx, record_id, target, score)?;
            info!(
                record_id = %record_id,
                from = %current,
                to = %target,
                gtc_score = score,
                "advanced validation status"
            );
            store::load_record(tx, record_id)
        })
    }

    pub fn conflict(&self, conflict_id: Uuid) -> Result<Conflict> {
        let connection = self.lock()?;
        store::load_conflict(&connection, conflict_id)
    }

    pub fn conflicts_for_record(&self, record_id: Uuid) -> Result<Vec<Conflict>> {
        let connection = self.lock()?;
        store::conflicts_for_record(&connection, record_id)
    }

    /// Conflicts touching any record within `radius_km` of `center`.
    pub fn conflicts_near(&self, center: GeoPoint, radius_km: f64) -> Result<Vec<Conflict>> {
        let connection = self.lock()?;
        let nearby = nearby_in(&connection, center, radius_km, None)?;

        let mut out: Vec<Conflict> = Vec::new();
        for hit in &nearby {
            for conflict in store::conflicts_for_record(&connection, hit.record.record_id)? {
                if out
                    .iter()
                    .all(|existing| existing.conflict_id != conflict.conflict_id)
                {
                    out.push(conflict);
                }
            }
        }
        Ok(out)
    }

    pub fn pending_reviews(&self) -> Result<Vec<Conflict>> {
        let connection = self.lock()?;
        store::conflicts_in_state(&connection, ConflictState::PendingReview)
    }

    pub fn open_conflicts(&self) -> Result<Vec<Conflict>> {
        let connection = self.lock()?;
        store::conflicts_in_state(&connection, ConflictState::Open)
    }

    pub fn dedup_review_queue(&self) -> Result<Vec<GroundTruthRecord>> {
        let connection = self.lock()?;
        store::load_dedup_queue(&connection)
    }

    pub fn stats(&self) -> Result<VaultStats> {
        let connection = self.lock()?;
        Ok(VaultStats {
            db_schema_version: store::metadata_value(&connection, "db_schema_version")?,
            record_count: store::count_rows(&connection, "SELECT COUNT(*) FROM records")?,
            provenance_count: store::count_rows(&connection, "SELECT COUNT(*) FROM provenance")?,
            superseded_count: store::count_rows(
                &connection,
                "SELECT COUNT(*) FROM records WHERE superseded_by IS NOT NULL",
            )?,
            dedup_review_count: store::count_rows(
                &connection,
                "SELECT COUNT(*) FROM records WHERE dedup_review = 1",
            )?,
            conflict_count: store::count_rows(&connection, "SELECT COUNT(*) FROM conflicts")?,
            open_conflict_count: store::count_rows(
                &connection,
                "SELECT COUNT(*) FROM conflicts WHERE state <> 'resolved'",
            )?,
            pending_review_count: store::count_rows(
                &connection,
                "SELECT COUNT(*) FROM conflicts WHERE state = 'pending_review'",
            )?,
        })
    }
}

/// Used by the conflict resolver inside its own transaction.
pub(crate) fn load_record_in(connection: &Connection, record_id: Uuid) -> Result<GroundTruthRecord> {
    store::load_record(connection, record_id)
}

pub(crate) fn load_conflict_in(connection: &Connection, conflict_id: Uuid) -> Result<Conflict> {
    store::load_conflict(connection, conflict_id)
}

/// Persists a conflict's new resolution state, marks the losing record as
/// superseded when there is one, and refreshes both records' conflict status.
pub(crate) fn store_resolution_in(
    connection: &Connection,
    conflict: &Conflict,
    superseded: Option<(Uuid, Uuid)>,
) -> Result<()> {
    store::update_conflict(connection, conflict)?;
    if let Some((loser, winner)) = superseded {
        store::set_superseded(connection, loser, winner)?;
    }
    store::refresh_conflict_status(connection, conflict.record_a_id)?;
    store::refresh_conflict_status(connection, conflict.record_b_id)?;
    Ok(())
}

fn validate_radius(radius_km: f64) -> Result<f64> {
    if !radius_km.is_finite() || radius_km < 0.0 {
        return Err(CoreError::validation(format!(
            "query radius {radius_km} must be a finite non-negative distance"
        )));
    }
    if radius_km > MAX_QUERY_RADIUS_KM {
        warn!(
            requested_km = radius_km,
            cap_km = MAX_QUERY_RADIUS_KM,
            "query radius capped"
        );
        return Ok(MAX_QUERY_RADIUS_KM);
    }
    Ok(radius_km)
}

fn nearby_in(
    connection: &Connection,
    center: GeoPoint,
    radius_km: f64,
    measurement_type: Option<MeasurementType>,
) -> Result<Vec<NearbyRecord>> {
    center.validate()?;
    let radius_km = validate_radius(radius_km)?;
    let bbox = BoundingBox::around(center, radius_km);

    let mut hits: Vec<NearbyRecord> = store::load_records_in_box(connection, &bbox, measurement_type)?
        .into_iter()
        .filter_map(|record| {
            let distance_km = center.distance_km(&record.location);
            (distance_km <= radius_km).then_some(NearbyRecord {
                distance_km,
                record,
            })
        })
        .collect();

    hits.sort_by(|left, right| {
        left.distance_km
            .total_cmp(&right.distance_km)
            .then(left.record.source_tier().cmp(&right.record.source_tier()))
            .then(
                right
                    .record
                    .validation_status
                    .cmp(&left.record.validation_status),
            )
            .then(left.record.record_id.cmp(&right.record.record_id))
    });

    debug!(
        lat = center.lat,
        lon = center.lon,
        radius_km,
        hits = hits.len(),
        "vault radius query"
    );
    Ok(hits)
}

fn ingest_in(
    connection: &Connection,
    candidate: &RecordCandidate,
    provenance: &ProvenanceInput,
    detection_radius_km: Option<f64>,
) -> Result<IngestReport> {
    candidate.validate()?;
    provenance.validate()?;

    let data_hash = candidate.content_hash()?;
    let record_id = candidate.record_id.unwrap_or_else(Uuid::new_v4);

    if let Some(existing) = store::find_record(connection, record_id)? {
        if existing.data_hash != data_hash {
            return Err(CoreError::validation(format!(
                "record id {record_id} is already bound to different content"
            )));
        }
        info!(record_id = %record_id, "record already present; ingest is a no-op");
        return Ok(IngestReport {
            record_id,
            status: IngestStatus::AlreadyPresent,
            duplicate_of: None,
            conflicts: store::conflicts_for_record(connection, record_id)?,
        });
    }

    let duplicate_of = store::find_id_by_hash(connection, &data_hash)?;
    if let Some(original) = duplicate_of {
        warn!(
            record_id = %record_id,
            duplicate_of = %original,
            "identical content under a new id; flagged for dedup review"
        );
    }

    let ingested_at = Utc::now();
    let provenance = Provenance::from_input(provenance, &data_hash, ingested_at);
    let record = GroundTruthRecord {
        record_id,
        data_hash,
        location: candidate.location,
        depth: candidate.depth,
        measurement_type: candidate.measurement_type,
        measurement_value: candidate.measurement_value,
        unit: candidate.unit.as_deref().map(|unit| unit.trim().to_string()),
        is_non_detect: candidate.is_non_detect,
        detection_limit: candidate.detection_limit,
        tags: candidate.tags,
        validation_status: ValidationStatus::Raw,
        gtc_score: gtc_score(provenance.source_tier, ValidationStatus::Raw),
        conflict_status: ConflictStatus::Clean,
        provenance,
        superseded_by: None,
        dedup_review: duplicate_of.is_some(),
        extensions: candidate.extensions.clone(),
        ingested_at,
    };

    let conflicts = match detection_radius_km {
        Some(radius_km) => {
            let neighbors = nearby_in(connection, record.location, radius_km, None)?;
            detect_against(&record, &neighbors)?
        }
        None => Vec::new(),
    };

    store::insert_provenance(connection, &record.provenance)?;
    store::insert_record(connection, &record)?;
    for conflict in &conflicts {
        store::insert_conflict(connection, conflict)?;
    }
    if !conflicts.is_empty() {
        store::refresh_conflict_status(connection, record_id)?;
        for conflict in &conflicts {
            store::refresh_conflict_status(connection, conflict.record_b_id)?;
        }
    }

    info!(
        record_id = %record_id,
        measurement_type = %record.measurement_type,
        source_tier = record.provenance.source_tier.number(),
        conflicts = conflicts.len(),
        dedup_review = record.dedup_review,
        "ingested ground-truth record"
    );

    Ok(IngestReport {
        record_id,
        status: if duplicate_of.is_some() {
            IngestStatus::FlaggedForDedup
        } else {
            IngestStatus::Inserted
        },
        duplicate_of,
        conflicts,
    })
}

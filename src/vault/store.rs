//! Row-level SQL. Every function takes a plain `&Connection` so callers can
//! run several of them inside one transaction.

use std::str::FromStr;

use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde::de::DeserializeOwned;
use uuid::Uuid;

use super::provenance::{Provenance, SourceTier};
use super::record::{
    ConflictStatus, DepthInterval, GeologicalTags, GroundTruthRecord, MeasurementType,
    ValidationStatus,
};
use crate::conflict::{Conflict, ConflictState};
use crate::error::{CoreError, Result};
use crate::geo::{BoundingBox, GeoPoint};

const RECORD_SELECT: &str = "
    SELECT
      r.record_id,
      r.data_hash,
      r.lat,
      r.lon,
      r.depth_top_m,
      r.depth_bottom_m,
      r.measurement_type,
      r.measurement_value,
      r.unit,
      r.is_non_detect,
      r.detection_limit,
      r.lithology,
      r.mineralization,
      r.alteration,
      r.structural_context,
      r.validation_status,
      r.gtc_score,
      r.conflict_status,
      r.superseded_by,
      r.dedup_review,
      r.extensions_json,
      r.ingested_at,
      p.provenance_id,
      p.source_tier,
      p.source_organization,
      p.chain_of_custody_json,
      p.content_hash,
      p.ingested_at
    FROM records r
    JOIN provenance p ON p.provenance_id = r.provenance_id
";

const CONFLICT_SELECT: &str = "
    SELECT
      conflict_id,
      record_a_id,
      record_b_id,
      conflict_type,
      severity,
      percent_delta,
      distance_km,
      detail,
      state,
      resolution_method,
      winning_record_id,
      consensus_value,
      resolution_notes,
      reviewer,
      detected_at,
      resolved_at
    FROM conflicts
";

fn conversion_error<E>(idx: usize, column_type: Type, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, column_type, Box::new(err))
}

fn parse_text<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    raw.parse().map_err(|err| conversion_error(idx, Type::Text, err))
}

fn parse_optional_text<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: Option<String> = row.get(idx)?;
    raw.map(|value| value.parse().map_err(|err| conversion_error(idx, Type::Text, err)))
        .transpose()
}

fn parse_json<T: DeserializeOwned>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw).map_err(|err| conversion_error(idx, Type::Text, err))
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<GroundTruthRecord> {
    let depth = row
        .get::<_, Option<f64>>(4)?
        .map(|top_m| -> rusqlite::Result<DepthInterval> {
            Ok(DepthInterval {
                top_m,
                bottom_m: row.get(5)?,
            })
        })
        .transpose()?;

    let tier_number: i64 = row.get(23)?;
    let source_tier =
        SourceTier::try_from(tier_number).map_err(|err| conversion_error(23, Type::Integer, err))?;

    Ok(GroundTruthRecord {
        record_id: parse_text(row, 0)?,
        data_hash: row.get(1)?,
        location: GeoPoint {
            lat: row.get(2)?,
            lon: row.get(3)?,
        },
        depth,
        measurement_type: parse_text(row, 6)?,
        measurement_value: row.get(7)?,
        unit: row.get(8)?,
        is_non_detect: row.get(9)?,
        detection_limit: row.get(10)?,
        tags: GeologicalTags {
            lithology: parse_text(row, 11)?,
            mineralization: parse_text(row, 12)?,
            alteration: parse_text(row, 13)?,
            structural_context: parse_text(row, 14)?,
        },
        validation_status: parse_text(row, 15)?,
        gtc_score: row.get(16)?,
        conflict_status: parse_text(row, 17)?,
        superseded_by: parse_optional_text(row, 18)?,
        dedup_review: row.get(19)?,
        extensions: parse_json(row, 20)?,
        ingested_at: row.get(21)?,
        provenance: Provenance {
            provenance_id: parse_text(row, 22)?,
            source_tier,
            source_organization: row.get(24)?,
            chain_of_custody: parse_json(row, 25)?,
            content_hash: row.get(26)?,
            ingested_at: row.get(27)?,
        },
    })
}

fn conflict_from_row(row: &Row<'_>) -> rusqlite::Result<Conflict> {
    Ok(Conflict {
        conflict_id: parse_text(row, 0)?,
        record_a_id: parse_text(row, 1)?,
        record_b_id: parse_text(row, 2)?,
        conflict_type: parse_text(row, 3)?,
        severity: parse_text(row, 4)?,
        percent_delta: row.get(5)?,
        distance_km: row.get(6)?,
        detail: row.get(7)?,
        state: parse_text(row, 8)?,
        resolution_method: parse_optional_text(row, 9)?,
        winning_record_id: parse_optional_text(row, 10)?,
        consensus_value: row.get(11)?,
        resolution_notes: row.get(12)?,
        reviewer: row.get(13)?,
        detected_at: row.get(14)?,
        resolved_at: row.get(15)?,
    })
}

pub(super) fn insert_provenance(connection: &Connection, provenance: &Provenance) -> Result<()> {
    let chain_json = serde_json::to_string(&provenance.chain_of_custody)?;
    connection.execute(
        "
        INSERT INTO provenance(
          provenance_id, source_tier, source_organization, chain_of_custody_json,
          content_hash, ingested_at
        )
        VALUES(?1, ?2, ?3, ?4, ?5, ?6)
        ",
        params![
            provenance.provenance_id.to_string(),
            provenance.source_tier.number(),
            provenance.source_organization,
            chain_json,
            provenance.content_hash,
            provenance.ingested_at,
        ],
    )?;
    Ok(())
}

pub(super) fn insert_record(connection: &Connection, record: &GroundTruthRecord) -> Result<()> {
    let extensions_json = serde_json::to_string(&record.extensions)?;
    connection.execute(
        "
        INSERT INTO records(
          record_id, data_hash, lat, lon, depth_top_m, depth_bottom_m,
          measurement_type, measurement_value, unit, is_non_detect, detection_limit,
          lithology, mineralization, alteration, structural_context,
          validation_status, gtc_score, conflict_status, provenance_id,
          superseded_by, dedup_review, extensions_json, ingested_at
        )
        VALUES(?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15,
               ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23)
        ",
        params![
            record.record_id.to_string(),
            record.data_hash,
            record.location.lat,
            record.location.lon,
            record.depth.map(|depth| depth.top_m),
            record.depth.and_then(|depth| depth.bottom_m),
            record.measurement_type.as_str(),
            record.measurement_value,
            record.unit,
            record.is_non_detect,
            record.detection_limit,
            record.tags.lithology.as_str(),
            record.tags.mineralization.as_str(),
            record.tags.alteration.as_str(),
            record.tags.structural_context.as_str(),
            record.validation_status.as_str(),
            record.gtc_score,
            record.conflict_status.as_str(),
            record.provenance.provenance_id.to_string(),
            record.superseded_by.map(|id| id.to_string()),
            record.dedup_review,
            extensions_json,
            record.ingested_at,
        ],
    )?;
    Ok(())
}

pub(super) fn find_record(connection: &Connection, record_id: Uuid) -> Result<Option<GroundTruthRecord>> {
    let sql = format!("{RECORD_SELECT} WHERE r.record_id = ?1");
    let record = connection
        .query_row(&sql, [record_id.to_string()], record_from_row)
        .optional()?;
    Ok(record)
}

pub(super) fn load_record(connection: &Connection, record_id: Uuid) -> Result<GroundTruthRecord> {
    find_record(connection, record_id)?.ok_or_else(|| CoreError::not_found("record", record_id))
}

pub(super) fn find_id_by_hash(connection: &Connection, data_hash: &str) -> Result<Option<Uuid>> {
    let raw: Option<String> = connection
        .query_row(
            "SELECT record_id FROM records WHERE data_hash = ?1 ORDER BY ingested_at ASC LIMIT 1",
            [data_hash],
            |row| row.get(0),
        )
        .optional()?;

    raw.map(|value| {
        Uuid::parse_str(&value)
            .map_err(|err| CoreError::Storage(conversion_error(0, Type::Text, err)))
    })
    .transpose()
}

pub(super) fn load_records_in_box(
    connection: &Connection,
    bbox: &BoundingBox,
    measurement_type: Option<MeasurementType>,
) -> Result<Vec<GroundTruthRecord>> {
    let sql = format!(
        "{RECORD_SELECT}
        WHERE r.lat BETWEEN ?1 AND ?2
          AND r.lon BETWEEN ?3 AND ?4
          AND (?5 IS NULL OR r.measurement_type = ?5)"
    );
    let mut statement = connection.prepare(&sql)?;
    let rows = statement.query_map(
        params![
            bbox.min_lat,
            bbox.max_lat,
            bbox.min_lon,
            bbox.max_lon,
            measurement_type.map(MeasurementType::as_str),
        ],
        record_from_row,
    )?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

pub(super) fn load_dedup_queue(connection: &Connection) -> Result<Vec<GroundTruthRecord>> {
    let sql = format!("{RECORD_SELECT} WHERE r.dedup_review = 1 ORDER BY r.ingested_at ASC");
    let mut statement = connection.prepare(&sql)?;
    let rows = statement.query_map([], record_from_row)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

pub(super) fn update_validation(
    connection: &Connection,
    record_id: Uuid,
    status: ValidationStatus,
    gtc_score: f64,
) -> Result<()> {
    connection.execute(
        "UPDATE records SET validation_status = ?2, gtc_score = ?3 WHERE record_id = ?1",
        params![record_id.to_string(), status.as_str(), gtc_score],
    )?;
    Ok(())
}

pub(super) fn set_superseded(connection: &Connection, loser: Uuid, winner: Uuid) -> Result<()> {
    connection.execute(
        "UPDATE records SET superseded_by = ?2 WHERE record_id = ?1",
        params![loser.to_string(), winner.to_string()],
    )?;
    Ok(())
}

/// Recomputes a record's conflict status from its open conflicts: flagged
/// against tier when any counterpart comes from a more authoritative tier.
pub(super) fn refresh_conflict_status(connection: &Connection, record_id: Uuid) -> Result<ConflictStatus> {
    let id = record_id.to_string();
    let own_tier: i64 = connection.query_row(
        "
        SELECT p.source_tier
        FROM records r
        JOIN provenance p ON p.provenance_id = r.provenance_id
        WHERE r.record_id = ?1
        ",
        [&id],
        |row| row.get(0),
    )?;

    let mut statement = connection.prepare(
        "
        SELECT p.source_tier
        FROM conflicts c
        JOIN records o
          ON o.record_id = CASE WHEN c.record_a_id = ?1 THEN c.record_b_id ELSE c.record_a_id END
        JOIN provenance p ON p.provenance_id = o.provenance_id
        WHERE (c.record_a_id = ?1 OR c.record_b_id = ?1)
          AND c.state <> ?2
        ",
    )?;
    let tiers = statement.query_map(params![id, ConflictState::Resolved.as_str()], |row| {
        row.get::<_, i64>(0)
    })?;

    let mut status = ConflictStatus::Clean;
    for tier in tiers {
        let flagged = if tier? < own_tier {
            ConflictStatus::FlaggedVsTier
        } else {
            ConflictStatus::FlaggedVsNeighbor
        };
        status = status.max(flagged);
    }

    connection.execute(
        "UPDATE records SET conflict_status = ?2 WHERE record_id = ?1",
        params![id, status.as_str()],
    )?;
    Ok(status)
}

pub(super) fn insert_conflict(connection: &Connection, conflict: &Conflict) -> Result<()> {
    connection.execute(
        "
        INSERT INTO conflicts(
          conflict_id, record_a_id, record_b_id, conflict_type, severity, percent_delta,
          distance_km, detail, state, resolution_method, winning_record_id,
          consensus_value, resolution_notes, reviewer, detected_at, resolved_at
        )
        VALUES(?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)
        ",
        params![
            conflict.conflict_id.to_string(),
            conflict.record_a_id.to_string(),
            conflict.record_b_id.to_string(),
            conflict.conflict_type.as_str(),
            conflict.severity.as_str(),
            conflict.percent_delta,
            conflict.distance_km,
            conflict.detail,
            conflict.state.as_str(),
            conflict.resolution_method.map(|method| method.as_str()),
            conflict.winning_record_id.map(|id| id.to_string()),
            conflict.consensus_value,
            conflict.resolution_notes,
            conflict.reviewer,
            conflict.detected_at,
            conflict.resolved_at,
        ],
    )?;
    Ok(())
}

pub(super) fn update_conflict(connection: &Connection, conflict: &Conflict) -> Result<()> {
    let changed = connection.execute(
        "
        UPDATE conflicts SET
          state = ?2,
          resolution_method = ?3,
          winning_record_id = ?4,
          consensus_value = ?5,
          resolution_notes = ?6,
          reviewer = ?7,
          resolved_at = ?8
        WHERE conflict_id = ?1
        ",
        params![
            conflict.conflict_id.to_string(),
            conflict.state.as_str(),
            conflict.resolution_method.map(|method| method.as_str()),
            conflict.winning_record_id.map(|id| id.to_string()),
            conflict.consensus_value,
            conflict.resolution_notes,
            conflict.reviewer,
            conflict.resolved_at,
        ],
    )?;
    if changed == 0 {
        return Err(CoreError::not_found("conflict", conflict.conflict_id));
    }
    Ok(())
}

pub(super) fn load_conflict(connection: &Connection, conflict_id: Uuid) -> Result<Conflict> {
    let sql = format!("{CONFLICT_SELECT} WHERE conflict_id = ?1");
    connection
        .query_row(&sql, [conflict_id.to_string()], conflict_from_row)
        .optional()?
        .ok_or_else(|| CoreError::not_found("conflict", conflict_id))
}

pub(super) fn conflicts_for_record(connection: &Connection, record_id: Uuid) -> Result<Vec<Conflict>> {
    let sql = format!(
        "{CONFLICT_SELECT} WHERE record_a_id = ?1 OR record_b_id = ?1 ORDER BY detected_at ASC, conflict_id ASC"
    );
    let mut statement = connection.prepare(&sql)?;
    let rows = statement.query_map([record_id.to_string()], conflict_from_row)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

pub(super) fn conflicts_in_state(connection: &Connection, state: ConflictState) -> Result<Vec<Conflict>> {
    let sql = format!("{CONFLICT_SELECT} WHERE state = ?1 ORDER BY detected_at ASC, conflict_id ASC");
    let mut statement = connection.prepare(&sql)?;
    let rows = statement.query_map([state.as_str()], conflict_from_row)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

pub(super) fn count_rows(connection: &Connection, sql: &str) -> Result<i64> {
    let count = connection.query_row(sql, [], |row| row.get(0))?;
    Ok(count)
}

pub(super) fn metadata_value(connection: &Connection, key: &str) -> Result<Option<String>> {
    let value = connection
        .query_row("SELECT value FROM metadata WHERE key = ?1", [key], |row| row.get(0))
        .optional()?;
    Ok(value)
}

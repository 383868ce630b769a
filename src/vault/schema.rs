use rusqlite::Connection;

use super::record::{MeasurementType, ValidationStatus};
use crate::error::Result;
use crate::util::now_utc_string;

pub const DB_SCHEMA_VERSION: &str = "0.1.0";

pub(super) fn configure_connection(connection: &Connection, file_backed: bool) -> Result<()> {
    if file_backed {
        connection.pragma_update(None, "journal_mode", "WAL")?;
        connection.pragma_update(None, "synchronous", "NORMAL")?;
    }
    connection.pragma_update(None, "foreign_keys", "ON")?;
    Ok(())
}

fn quoted_list<'a>(labels: impl Iterator<Item = &'a str>) -> String {
    labels
        .map(|label| format!("'{label}'"))
        .collect::<Vec<_>>()
        .join(", ")
}

pub(super) fn ensure_schema(connection: &Connection) -> Result<()> {
    let measurement_types = quoted_list(MeasurementType::ALL.iter().map(|value| value.as_str()));
    let validation_statuses =
        quoted_list(ValidationStatus::ALL.iter().map(|value| value.as_str()));

    connection.execute_batch(&format!(
        "
        CREATE TABLE IF NOT EXISTS metadata (
          key TEXT PRIMARY KEY,
          value TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS provenance (
          provenance_id TEXT PRIMARY KEY,
          source_tier INTEGER NOT NULL CHECK (source_tier BETWEEN 1 AND 5),
          source_organization TEXT NOT NULL,
          chain_of_custody_json TEXT NOT NULL,
          content_hash TEXT NOT NULL,
          ingested_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS records (
          record_id TEXT PRIMARY KEY,
          data_hash TEXT NOT NULL,
          lat REAL NOT NULL CHECK (lat BETWEEN -90.0 AND 90.0),
          lon REAL NOT NULL CHECK (lon BETWEEN -180.0 AND 180.0),
          depth_top_m REAL,
          depth_bottom_m REAL,
          measurement_type TEXT NOT NULL CHECK (measurement_type IN ({measurement_types})),
          measurement_value REAL,
          unit TEXT,
          is_non_detect INTEGER NOT NULL DEFAULT 0,
          detection_limit REAL,
          lithology TEXT NOT NULL DEFAULT 'none',
          mineralization TEXT NOT NULL DEFAULT 'none',
          alteration TEXT NOT NULL DEFAULT 'none',
          structural_context TEXT NOT NULL DEFAULT 'none',
          validation_status TEXT NOT NULL CHECK (validation_status IN ({validation_statuses})),
          gtc_score REAL NOT NULL CHECK (gtc_score BETWEEN 0.0 AND 1.0),
          conflict_status TEXT NOT NULL DEFAULT 'clean',
          provenance_id TEXT NOT NULL,
          superseded_by TEXT,
          dedup_review INTEGER NOT NULL DEFAULT 0,
          extensions_json TEXT NOT NULL DEFAULT '{{}}',
          ingested_at TEXT NOT NULL,
          UNIQUE (record_id, data_hash),
          CHECK (NOT (is_non_detect = 1 AND measurement_value IS NOT NULL)),
          FOREIGN KEY(provenance_id) REFERENCES provenance(provenance_id),
          FOREIGN KEY(superseded_by) REFERENCES records(record_id)
        );

        CREATE TABLE IF NOT EXISTS conflicts (
          conflict_id TEXT PRIMARY KEY,
          record_a_id TEXT NOT NULL,
          record_b_id TEXT NOT NULL,
          conflict_type TEXT NOT NULL,
          severity TEXT NOT NULL,
          percent_delta REAL,
          distance_km REAL NOT NULL,
          detail TEXT NOT NULL,
          state TEXT NOT NULL,
          resolution_method TEXT,
          winning_record_id TEXT,
          consensus_value REAL,
          resolution_notes TEXT,
          reviewer TEXT,
          detected_at TEXT NOT NULL,
          resolved_at TEXT,
          CHECK (record_a_id <> record_b_id),
          FOREIGN KEY(record_a_id) REFERENCES records(record_id),
          FOREIGN KEY(record_b_id) REFERENCES records(record_id)
        );

        CREATE INDEX IF NOT EXISTS idx_records_lat_lon ON records(lat, lon);
        CREATE INDEX IF NOT EXISTS idx_records_type ON records(measurement_type);
        CREATE INDEX IF NOT EXISTS idx_records_hash ON records(data_hash);
        CREATE INDEX IF NOT EXISTS idx_records_dedup ON records(dedup_review);
        CREATE INDEX IF NOT EXISTS idx_conflicts_record_a ON conflicts(record_a_id);
        CREATE INDEX IF NOT EXISTS idx_conflicts_record_b ON conflicts(record_b_id);
        CREATE INDEX IF NOT EXISTS idx_conflicts_state ON conflicts(state);
        "
    ))?;

    let now = now_utc_string();
    connection.execute(
        "INSERT INTO metadata(key, value) VALUES('db_schema_version', ?1)
         ON CONFLICT(key) DO UPDATE SET value=excluded.value",
        [DB_SCHEMA_VERSION],
    )?;
    connection.execute(
        "INSERT INTO metadata(key, value) VALUES('db_updated_at', ?1)
         ON CONFLICT(key) DO UPDATE SET value=excluded.value",
        [now],
    )?;

    Ok(())
}

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use geofusion::util::{now_utc_string, print_json_pretty, read_json, write_json_pretty};
use geofusion::vault::{IngestReport, IngestStatus, ProvenanceInput, RecordCandidate, SourceTier};

use crate::cli::IngestArgs;
use crate::commands::{ingest_manifest_path, open_vault, resolve_db_path};

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CandidateBatch {
    Many(Vec<RecordCandidate>),
    One(Box<RecordCandidate>),
}

impl CandidateBatch {
    fn into_vec(self) -> Vec<RecordCandidate> {
        match self {
            Self::Many(candidates) => candidates,
            Self::One(candidate) => vec![*candidate],
        }
    }
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct IngestCounts {
    pub candidates: usize,
    pub inserted: usize,
    pub already_present: usize,
    pub flagged_for_dedup: usize,
    pub conflicts_detected: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestRunManifest {
    pub started_at: String,
    pub finished_at: String,
    pub db_path: String,
    pub record_path: String,
    pub source_tier: SourceTier,
    pub source_organization: String,
    pub conflict_radius_km: f64,
    pub counts: IngestCounts,
}

pub fn run(args: IngestArgs) -> Result<()> {
    let started_at = now_utc_string();
    let source_tier = SourceTier::try_from(args.source_tier)?;
    let provenance = args
        .custody_stages
        .iter()
        .fold(
            ProvenanceInput::new(source_tier, &args.source_organization),
            |input, stage| input.with_stage(stage),
        );

    let candidates = read_json::<CandidateBatch>(&args.record_path)?.into_vec();
    let vault = open_vault(&args.vault)?;

    let mut counts = IngestCounts {
        candidates: candidates.len(),
        ..IngestCounts::default()
    };
    let mut reports: Vec<IngestReport> = Vec::with_capacity(candidates.len());
    for (index, candidate) in candidates.iter().enumerate() {
        let report = vault
            .ingest_with_conflicts(candidate, &provenance, args.conflict_radius_km)
            .with_context(|| {
                format!(
                    "failed to ingest candidate {index} from {}",
                    args.record_path.display()
                )
            })?;

        match report.status {
            IngestStatus::Inserted => counts.inserted += 1,
            IngestStatus::AlreadyPresent => counts.already_present += 1,
            IngestStatus::FlaggedForDedup => counts.flagged_for_dedup += 1,
        }
        if report.status != IngestStatus::AlreadyPresent {
            counts.conflicts_detected += report.conflicts.len();
        }
        reports.push(report);
    }

    let manifest = IngestRunManifest {
        started_at,
        finished_at: now_utc_string(),
        db_path: resolve_db_path(&args.vault).display().to_string(),
        record_path: args.record_path.display().to_string(),
        source_tier,
        source_organization: args.source_organization.clone(),
        conflict_radius_km: args.conflict_radius_km,
        counts: counts.clone(),
    };
    let manifest_path = ingest_manifest_path(&args.vault.cache_root);
    write_json_pretty(&manifest_path, &manifest)?;

    info!(
        candidates = counts.candidates,
        inserted = counts.inserted,
        already_present = counts.already_present,
        flagged_for_dedup = counts.flagged_for_dedup,
        conflicts = counts.conflicts_detected,
        manifest = %manifest_path.display(),
        "ingest complete"
    );
    print_json_pretty(&reports)
}

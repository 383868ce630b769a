use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{info, warn};

use geofusion::util::{print_json_pretty, read_json};
use geofusion::vault::VaultStats;

use crate::cli::StatusArgs;
use crate::commands::ingest::IngestRunManifest;
use crate::commands::{ingest_manifest_path, open_vault, resolve_db_path};

#[derive(Debug, Serialize)]
struct StatusReport {
    db_path: String,
    vault: Option<VaultStats>,
    last_ingest: Option<IngestRunManifest>,
}

pub fn run(args: StatusArgs) -> Result<()> {
    let db_path = resolve_db_path(&args.vault);
    let manifest_path = ingest_manifest_path(&args.vault.cache_root);

    info!(cache_root = %args.vault.cache_root.display(), "status requested");

    let last_ingest = if manifest_path.exists() {
        let manifest: IngestRunManifest = read_json(&manifest_path)?;
        info!(
            finished_at = %manifest.finished_at,
            candidates = manifest.counts.candidates,
            inserted = manifest.counts.inserted,
            "loaded last ingest manifest"
        );
        Some(manifest)
    } else {
        warn!(path = %manifest_path.display(), "ingest manifest missing");
        None
    };

    let vault = if db_path.exists() {
        let stats = open_vault(&args.vault)?
            .stats()
            .with_context(|| format!("failed to read stats from {}", db_path.display()))?;
        info!(
            path = %db_path.display(),
            records = stats.record_count,
            conflicts = stats.conflict_count,
            open_conflicts = stats.open_conflict_count,
            pending_reviews = stats.pending_review_count,
            dedup_review = stats.dedup_review_count,
            "vault status"
        );
        Some(stats)
    } else {
        warn!(path = %db_path.display(), "vault file missing");
        None
    };

    print_json_pretty(&StatusReport {
        db_path: db_path.display().to_string(),
        vault,
        last_ingest,
    })
}

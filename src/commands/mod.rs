use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;

use geofusion::util::ensure_directory;
use geofusion::vault::GroundTruthVault;

use crate::cli::VaultArgs;

pub mod assess;
pub mod conflicts;
pub mod ingest;
pub mod qc;
pub mod query;
pub mod resolve;
pub mod review;
pub mod score;
pub mod status;
pub mod vote;

pub(crate) const VAULT_FILE_NAME: &str = "ground_truth_vault.sqlite";

pub(crate) fn resolve_db_path(args: &VaultArgs) -> PathBuf {
    args.db_path
        .clone()
        .unwrap_or_else(|| args.cache_root.join(VAULT_FILE_NAME))
}

pub(crate) fn ingest_manifest_path(cache_root: &Path) -> PathBuf {
    cache_root.join("manifests").join("last_ingest.json")
}

pub(crate) fn open_vault(args: &VaultArgs) -> Result<GroundTruthVault> {
    let db_path = resolve_db_path(args);
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            ensure_directory(parent)?;
        }
    }

    debug!(path = %db_path.display(), "opening vault");
    GroundTruthVault::open(&db_path)
        .with_context(|| format!("failed to open vault {}", db_path.display()))
}

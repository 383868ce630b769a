use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use uuid::Uuid;

use geofusion::conflict::ResolutionMethod;
use geofusion::vault::{MeasurementType, ValidationStatus};

const DEFAULT_CACHE_ROOT: &str = ".cache/geofusion";

#[derive(Parser, Debug)]
#[command(
    name = "geofusion",
    version,
    about = "Multi-modal consensus scoring and ground-truth vault tooling"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fuse six modality readings into a consensus score.
    Score(ScoreArgs),
    /// Vote on persistence across observation epochs.
    Vote(VoteArgs),
    /// Ingest ground-truth records with conflict detection.
    Ingest(IngestArgs),
    Query(QueryArgs),
    /// Advance a record through QC.
    Qc(QcArgs),
    Conflicts(ConflictsArgs),
    Resolve(ResolveArgs),
    /// Close a conflict that is pending manual review.
    Review(ReviewArgs),
    /// Evaluate a target end to end, including dry-hole risk.
    Assess(AssessArgs),
    Status(StatusArgs),
}

#[derive(Args, Debug, Clone)]
pub struct VaultArgs {
    #[arg(long, default_value = DEFAULT_CACHE_ROOT)]
    pub cache_root: PathBuf,

    #[arg(long)]
    pub db_path: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct ScoreArgs {
    #[arg(long)]
    pub commodity: String,

    #[arg(long)]
    pub profiles_path: Option<PathBuf>,

    /// JSON object of modality readings; flags below override its fields.
    #[arg(long)]
    pub readings_path: Option<PathBuf>,

    #[arg(long)]
    pub clay_alteration: Option<f64>,

    #[arg(long)]
    pub iron_oxide: Option<f64>,

    #[arg(long)]
    pub structural_density: Option<f64>,

    #[arg(long)]
    pub thermal_flux: Option<f64>,

    #[arg(long)]
    pub vegetation_stress: Option<f64>,

    #[arg(long)]
    pub terrain_complexity: Option<f64>,

    #[arg(long, default_value_t = false)]
    pub urban: bool,

    /// Apply a ground-truth multiplier to the result.
    #[arg(long)]
    pub uplift: Option<f64>,
}

#[derive(Args, Debug, Clone)]
pub struct VoteArgs {
    /// JSON array of `{observed_at, result}` epochs.
    #[arg(long)]
    pub history_path: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct IngestArgs {
    #[command(flatten)]
    pub vault: VaultArgs,

    /// JSON record candidate, or an array of them.
    #[arg(long)]
    pub record_path: PathBuf,

    #[arg(long)]
    pub source_tier: i64,

    #[arg(long)]
    pub source_organization: String,

    #[arg(long = "custody-stage")]
    pub custody_stages: Vec<String>,

    #[arg(long, default_value_t = 1.0)]
    pub conflict_radius_km: f64,
}

#[derive(Args, Debug, Clone)]
pub struct QueryArgs {
    #[command(flatten)]
    pub vault: VaultArgs,

    #[arg(long, allow_hyphen_values = true)]
    pub lat: f64,

    #[arg(long, allow_hyphen_values = true)]
    pub lon: f64,

    #[arg(long, default_value_t = 1.0)]
    pub radius_km: f64,

    #[arg(long = "type")]
    pub measurement_type: Option<MeasurementType>,

    #[arg(long)]
    pub limit: Option<usize>,
}

#[derive(Args, Debug, Clone)]
pub struct QcArgs {
    #[command(flatten)]
    pub vault: VaultArgs,

    #[arg(long)]
    pub record_id: Uuid,

    /// Target status: QC_PASSED or PEER_REVIEWED.
    #[arg(long)]
    pub status: ValidationStatus,
}

#[derive(Args, Debug, Clone)]
pub struct ConflictsArgs {
    #[command(flatten)]
    pub vault: VaultArgs,

    #[arg(long, conflicts_with_all = ["lat", "pending_review", "dedup_queue"])]
    pub record_id: Option<Uuid>,

    #[arg(long, requires = "lon", allow_hyphen_values = true)]
    pub lat: Option<f64>,

    #[arg(long, requires = "lat", allow_hyphen_values = true)]
    pub lon: Option<f64>,

    #[arg(long, default_value_t = 1.0)]
    pub radius_km: f64,

    #[arg(long, default_value_t = false)]
    pub pending_review: bool,

    /// List records flagged as possible duplicates instead of conflicts.
    #[arg(long, default_value_t = false)]
    pub dedup_queue: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ResolveArgs {
    #[command(flatten)]
    pub vault: VaultArgs,

    #[arg(long)]
    pub conflict_id: Uuid,

    /// authority_ranking, consensus_weighted or manual_review.
    #[arg(long)]
    pub method: ResolutionMethod,

    /// Note stored when the conflict is flagged for manual review.
    #[arg(long)]
    pub reason: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct ReviewArgs {
    #[command(flatten)]
    pub vault: VaultArgs,

    #[arg(long)]
    pub conflict_id: Uuid,

    #[arg(long)]
    pub reviewer: String,

    #[arg(long)]
    pub winner: Option<Uuid>,

    #[arg(long)]
    pub notes: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct AssessArgs {
    #[command(flatten)]
    pub vault: VaultArgs,

    #[arg(long)]
    pub profiles_path: Option<PathBuf>,

    /// JSON target request: location, commodity, readings, sub-scores.
    #[arg(long)]
    pub target_path: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct StatusArgs {
    #[command(flatten)]
    pub vault: VaultArgs,
}

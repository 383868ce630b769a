use anyhow::{Context, Result};

use geofusion::conflict::ConflictResolver;
use geofusion::util::print_json_pretty;

use crate::cli::ReviewArgs;
use crate::commands::open_vault;

pub fn run(args: ReviewArgs) -> Result<()> {
    let vault = open_vault(&args.vault)?;
    let conflict = ConflictResolver::new()
        .complete_review(
            &vault,
            args.conflict_id,
            &args.reviewer,
            args.winner,
            args.notes.as_deref(),
        )
        .with_context(|| format!("failed to complete review of conflict {}", args.conflict_id))?;
    print_json_pretty(&conflict)
}

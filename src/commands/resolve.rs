use anyhow::{Context, Result};

use geofusion::conflict::{ConflictResolver, ResolutionMethod};
use geofusion::util::print_json_pretty;

use crate::cli::ResolveArgs;
use crate::commands::open_vault;

pub fn run(args: ResolveArgs) -> Result<()> {
    let vault = open_vault(&args.vault)?;
    let resolver = ConflictResolver::new();

    let conflict = match args.method {
        ResolutionMethod::ManualReview => {
            resolver.flag_for_review(&vault, args.conflict_id, args.reason.as_deref())
        }
        method => resolver.resolve(&vault, args.conflict_id, method),
    }
    .with_context(|| format!("failed to resolve conflict {} by {}", args.conflict_id, args.method))?;

    print_json_pretty(&conflict)
}

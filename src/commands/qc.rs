use anyhow::{Context, Result};

use geofusion::util::print_json_pretty;

use crate::cli::QcArgs;
use crate::commands::open_vault;

pub fn run(args: QcArgs) -> Result<()> {
    let vault = open_vault(&args.vault)?;
    let record = vault
        .advance_validation(args.record_id, args.status)
        .with_context(|| format!("failed to advance record {} to {}", args.record_id, args.status))?;
    print_json_pretty(&record)
}

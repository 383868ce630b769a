use anyhow::{Context, Result};

use geofusion::pipeline::{TargetRequest, evaluate_target};
use geofusion::profile::ProfileSet;
use geofusion::util::{print_json_pretty, read_json};

use crate::cli::AssessArgs;
use crate::commands::open_vault;

pub fn run(args: AssessArgs) -> Result<()> {
    let profiles = ProfileSet::load(args.profiles_path.as_deref())
        .context("failed to load weighting profiles")?;
    let request: TargetRequest = read_json(&args.target_path)?;
    let vault = open_vault(&args.vault)?;

    let evaluation = evaluate_target(&vault, &profiles, &request).with_context(|| {
        format!(
            "failed to evaluate {} target at {}, {}",
            request.commodity, request.location.lat, request.location.lon
        )
    })?;
    print_json_pretty(&evaluation)
}

use anyhow::{Context, Result};
use tracing::{info, warn};

use geofusion::temporal::{EpochObservation, TemporalCoherenceVoter};
use geofusion::util::{print_json_pretty, read_json};

use crate::cli::VoteArgs;

pub fn run(args: VoteArgs) -> Result<()> {
    let history: Vec<EpochObservation> = read_json(&args.history_path)?;
    let verdict = TemporalCoherenceVoter::new()
        .vote(&history)
        .with_context(|| format!("failed to vote on {}", args.history_path.display()))?;

    if verdict.insufficient_epochs {
        warn!(
            epochs = verdict.epoch_count,
            "fewer than two distinct epochs; persistence unconfirmed"
        );
    }
    info!(
        persistent = verdict.persistent,
        persistence_score = verdict.persistence_score,
        adjusted_score = verdict.adjusted_score,
        baseline_days = verdict.baseline_days,
        "temporal vote complete"
    );
    print_json_pretty(&verdict)
}

use anyhow::{Context, Result};
use tracing::info;

use geofusion::conflict::unresolved_count;
use geofusion::geo::GeoPoint;
use geofusion::util::print_json_pretty;

use crate::cli::ConflictsArgs;
use crate::commands::open_vault;

pub fn run(args: ConflictsArgs) -> Result<()> {
    let vault = open_vault(&args.vault)?;

    if args.dedup_queue {
        let queue = vault
            .dedup_review_queue()
            .context("failed to load dedup review queue")?;
        info!(records = queue.len(), "dedup review queue");
        return print_json_pretty(&queue);
    }

    let conflicts = if let Some(record_id) = args.record_id {
        vault
            .conflicts_for_record(record_id)
            .with_context(|| format!("failed to load conflicts for record {record_id}"))?
    } else if let (Some(lat), Some(lon)) = (args.lat, args.lon) {
        let center = GeoPoint::new(lat, lon)?;
        vault
            .conflicts_near(center, args.radius_km)
            .with_context(|| format!("failed to load conflicts around {lat}, {lon}"))?
    } else if args.pending_review {
        vault
            .pending_reviews()
            .context("failed to load pending reviews")?
    } else {
        vault.open_conflicts().context("failed to load open conflicts")?
    };

    info!(
        conflicts = conflicts.len(),
        unresolved = unresolved_count(&conflicts),
        "conflicts listed"
    );
    print_json_pretty(&conflicts)
}

use anyhow::{Context, Result};
use tracing::info;

use geofusion::geo::GeoPoint;
use geofusion::util::print_json_pretty;

use crate::cli::QueryArgs;
use crate::commands::open_vault;

pub fn run(args: QueryArgs) -> Result<()> {
    let vault = open_vault(&args.vault)?;
    let center = GeoPoint::new(args.lat, args.lon)?;

    let mut hits = vault
        .query(center, args.radius_km, args.measurement_type)
        .with_context(|| format!("failed to query vault around {}, {}", args.lat, args.lon))?;
    let total = hits.len();
    if let Some(limit) = args.limit {
        hits.truncate(limit);
    }

    info!(
        lat = args.lat,
        lon = args.lon,
        radius_km = args.radius_km,
        total,
        returned = hits.len(),
        "vault query complete"
    );
    print_json_pretty(&hits)
}

use anyhow::{Context, Result};
use tracing::info;

use geofusion::consensus::ConsensusScorer;
use geofusion::modality::{ModalityReadings, ModalityVector};
use geofusion::profile::ProfileSet;
use geofusion::util::{print_json_pretty, read_json};

use crate::cli::ScoreArgs;

fn collect_readings(args: &ScoreArgs) -> Result<ModalityReadings> {
    let mut readings: ModalityReadings = match &args.readings_path {
        Some(path) => read_json(path)?,
        None => ModalityReadings::default(),
    };

    let overrides = [
        (&mut readings.clay_alteration, args.clay_alteration),
        (&mut readings.iron_oxide, args.iron_oxide),
        (&mut readings.structural_density, args.structural_density),
        (&mut readings.thermal_flux, args.thermal_flux),
        (&mut readings.vegetation_stress, args.vegetation_stress),
        (&mut readings.terrain_complexity, args.terrain_complexity),
    ];
    for (slot, value) in overrides {
        if value.is_some() {
            *slot = value;
        }
    }
    Ok(readings)
}

pub fn run(args: ScoreArgs) -> Result<()> {
    let profiles = ProfileSet::load(args.profiles_path.as_deref())
        .context("failed to load weighting profiles")?;
    let profile = profiles.get(&args.commodity)?;
    let readings = collect_readings(&args)?;
    let vector = ModalityVector::from_readings(&readings);

    let mut result = ConsensusScorer::new()
        .score(&vector, profile, args.urban)
        .with_context(|| format!("failed to score {} target", profile.commodity))?;
    if let Some(multiplier) = args.uplift {
        result = result.with_ground_truth_uplift(multiplier);
    }

    info!(
        commodity = %result.commodity,
        score = result.score,
        tier = %result.tier,
        coherence = result.coherence,
        adjusted_inputs = result.modality_adjustments.len(),
        "consensus scored"
    );
    print_json_pretty(&result)
}

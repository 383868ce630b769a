use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::consensus::ConsensusResult;
use crate::error::{CoreError, Result};
use crate::util::clamp_percent;

#[cfg(test)]
mod tests;

pub const MIN_EPOCHS: usize = 2;
pub const RECOMMENDED_EPOCHS: usize = 3;
pub const RECOMMENDED_BASELINE_DAYS: i64 = 90;
pub const PERSISTENCE_THRESHOLD: f64 = 0.7;
/// Score spread (in points) at which persistence reaches zero.
pub const SPREAD_SCALE: f64 = 50.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochObservation {
    pub observed_at: DateTime<Utc>,
    pub result: ConsensusResult,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistenceVerdict {
    pub persistent: bool,
    pub persistence_score: f64,
    pub adjusted_score: f64,
    pub epoch_count: usize,
    pub baseline_days: i64,
    pub score_stddev: f64,
    /// Fewer than two distinct epochs: the verdict is a pass-through.
    pub insufficient_epochs: bool,
    pub meets_recommended_baseline: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TemporalCoherenceVoter;

impl TemporalCoherenceVoter {
    pub fn new() -> Self {
        Self
    }

    /// An empty history is an error; a single epoch is a valid but
    /// unconfirmed signal and returns a flagged pass-through verdict.
    pub fn vote(&self, history: &[EpochObservation]) -> Result<PersistenceVerdict> {
        if history.is_empty() {
            return Err(CoreError::insufficient_data(
                "temporal voting needs at least one observation",
            ));
        }

        let mut ordered: Vec<&EpochObservation> = history.iter().collect();
        ordered.sort_by_key(|observation| observation.observed_at);

        let first = ordered[0].observed_at;
        let last = ordered[ordered.len() - 1].observed_at;
        let baseline = last - first;
        let distinct_epochs = 1 + ordered
            .windows(2)
            .filter(|pair| pair[0].observed_at != pair[1].observed_at)
            .count();

        let scores: Vec<f64> = ordered
            .iter()
            .map(|observation| observation.result.score)
            .collect();
        let mean = scores.iter().sum::<f64>() / scores.len() as f64;

        if distinct_epochs < MIN_EPOCHS {
            let latest = scores[scores.len() - 1];
            debug!(epochs = history.len(), "single-epoch history, persistence unconfirmed");
            return Ok(PersistenceVerdict {
                persistent: false,
                persistence_score: 0.0,
                adjusted_score: latest,
                epoch_count: history.len(),
                baseline_days: 0,
                score_stddev: 0.0,
                insufficient_epochs: true,
                meets_recommended_baseline: false,
            });
        }

        let variance = scores
            .iter()
            .map(|score| (score - mean).powi(2))
            .sum::<f64>()
            / scores.len() as f64;
        let stddev = variance.sqrt();

        let persistence_score = 1.0 - (stddev / SPREAD_SCALE).min(1.0);
        let persistent = persistence_score >= PERSISTENCE_THRESHOLD;
        let adjusted_score = clamp_percent(mean * (0.8 + 0.2 * persistence_score));

        debug!(
            epochs = history.len(),
            stddev,
            persistence_score,
            persistent,
            adjusted_score,
            "temporal vote"
        );

        Ok(PersistenceVerdict {
            persistent,
            persistence_score,
            adjusted_score,
            epoch_count: history.len(),
            baseline_days: baseline.num_days(),
            score_stddev: stddev,
            insufficient_epochs: false,
            meets_recommended_baseline: distinct_epochs >= RECOMMENDED_EPOCHS
                && baseline >= Duration::days(RECOMMENDED_BASELINE_DAYS),
        })
    }
}

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{CoreError, Result};
use crate::modality::{MODALITY_COUNT, Modality};

/// Per-commodity modality weights as loaded. Weights need not sum to one and
/// names are checked at evaluation time, so a profile file can be loaded and
/// inspected before it is known to be usable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightingProfile {
    pub commodity: String,
    pub weights: BTreeMap<String, f64>,
}

impl WeightingProfile {
    pub fn new<I, K>(commodity: &str, weights: I) -> Self
    where
        I: IntoIterator<Item = (K, f64)>,
        K: Into<String>,
    {
        Self {
            commodity: commodity.trim().to_ascii_lowercase(),
            weights: weights
                .into_iter()
                .map(|(name, weight)| (name.into(), weight))
                .collect(),
        }
    }

    pub fn uniform(commodity: &str) -> Self {
        Self::new(
            commodity,
            Modality::ALL.iter().map(|modality| (modality.as_str(), 1.0)),
        )
    }

    /// Resolves names and divides by the total. Modalities the profile does
    /// not mention get weight zero.
    pub fn normalized(&self) -> Result<[f64; MODALITY_COUNT]> {
        let mut weights = [0.0; MODALITY_COUNT];

        for (name, &weight) in &self.weights {
            let modality: Modality = name.parse().map_err(|_| {
                CoreError::config(format!(
                    "profile {:?} references unknown modality {:?}",
                    self.commodity, name
                ))
            })?;
            if !weight.is_finite() || weight < 0.0 {
                return Err(CoreError::config(format!(
                    "profile {:?} has invalid weight {} for {}",
                    self.commodity, weight, modality
                )));
            }
            weights[modality.index()] += weight;
        }

        let total: f64 = weights.iter().sum();
        if total <= 0.0 {
            return Err(CoreError::config(format!(
                "profile {:?} has no positive weights",
                self.commodity
            )));
        }

        for weight in &mut weights {
            *weight /= total;
        }
        Ok(weights)
    }
}

pub fn builtin_profiles() -> Vec<WeightingProfile> {
    use Modality::*;

    let profile = |commodity: &str, weights: [(Modality, f64); MODALITY_COUNT]| {
        WeightingProfile::new(
            commodity,
            weights
                .into_iter()
                .map(|(modality, weight)| (modality.as_str(), weight)),
        )
    };

    vec![
        profile(
            "gold",
            [
                (ClayAlteration, 0.25),
                (IronOxide, 0.25),
                (StructuralDensity, 0.20),
                (ThermalFlux, 0.10),
                (VegetationStress, 0.10),
                (TerrainComplexity, 0.10),
            ],
        ),
        profile(
            "copper",
            [
                (ClayAlteration, 0.25),
                (IronOxide, 0.30),
                (StructuralDensity, 0.20),
                (ThermalFlux, 0.10),
                (VegetationStress, 0.05),
                (TerrainComplexity, 0.10),
            ],
        ),
        profile(
            "lithium",
            [
                (ClayAlteration, 0.30),
                (IronOxide, 0.10),
                (StructuralDensity, 0.15),
                (ThermalFlux, 0.10),
                (VegetationStress, 0.15),
                (TerrainComplexity, 0.20),
            ],
        ),
        profile(
            "hydrocarbon",
            [
                (ClayAlteration, 0.10),
                (IronOxide, 0.05),
                (StructuralDensity, 0.30),
                (ThermalFlux, 0.25),
                (VegetationStress, 0.20),
                (TerrainComplexity, 0.10),
            ],
        ),
    ]
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileFile {
    pub profiles: Vec<WeightingProfile>,
}

/// Immutable set of profiles keyed by commodity.
#[derive(Debug, Clone)]
pub struct ProfileSet {
    profiles: BTreeMap<String, WeightingProfile>,
}

impl ProfileSet {
    pub fn builtin() -> Self {
        Self::from_profiles(builtin_profiles())
    }

    pub fn from_profiles(profiles: impl IntoIterator<Item = WeightingProfile>) -> Self {
        let profiles = profiles
            .into_iter()
            .map(|profile| (profile.commodity.clone(), profile))
            .collect();
        Self { profiles }
    }

    /// Built-ins overlaid with the profiles in `path`. Every profile is
    /// validated up front so a bad file fails at load, not mid-run.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut profiles: BTreeMap<String, WeightingProfile> = builtin_profiles()
            .into_iter()
            .map(|profile| (profile.commodity.clone(), profile))
            .collect();

        if let Some(path) = path {
            let raw = std::fs::read(path).map_err(|err| {
                CoreError::config(format!("failed to read {}: {err}", path.display()))
            })?;
            let file: ProfileFile = serde_json::from_slice(&raw).map_err(|err| {
                CoreError::config(format!("failed to parse {}: {err}", path.display()))
            })?;

            for profile in file.profiles {
                let profile = WeightingProfile::new(&profile.commodity, profile.weights);
                profile.normalized()?;
                info!(commodity = %profile.commodity, path = %path.display(), "loaded weighting profile");
                profiles.insert(profile.commodity.clone(), profile);
            }
        }

        Ok(Self { profiles })
    }

    pub fn get(&self, commodity: &str) -> Result<&WeightingProfile> {
        let key = commodity.trim().to_ascii_lowercase();
        self.profiles
            .get(&key)
            .ok_or_else(|| CoreError::config(format!("no weighting profile for commodity {key:?}")))
    }

    pub fn commodities(&self) -> impl Iterator<Item = &str> {
        self.profiles.keys().map(String::as_str)
    }
}

use serde::{Deserialize, Serialize};

use crate::labels::labeled_enum;

/// Imputed value for a modality the observation pipeline did not supply.
pub const NEUTRAL_MODALITY_VALUE: f64 = 0.5;
pub const MODALITY_COUNT: usize = 6;

labeled_enum! {
    /// One independently measured remote-sensing or geophysical indicator.
    pub enum Modality {
        ClayAlteration => "clay_alteration" | "clay",
        IronOxide => "iron_oxide" | "iron",
        StructuralDensity => "structural_density" | "structural",
        ThermalFlux => "thermal_flux" | "thermal",
        VegetationStress => "vegetation_stress" | "vegetation",
        TerrainComplexity => "terrain_complexity" | "terrain",
    }
}

impl Modality {
    pub fn index(self) -> usize {
        match self {
            Self::ClayAlteration => 0,
            Self::IronOxide => 1,
            Self::StructuralDensity => 2,
            Self::ThermalFlux => 3,
            Self::VegetationStress => 4,
            Self::TerrainComplexity => 5,
        }
    }
}

labeled_enum! {
    pub enum AdjustmentKind {
        Clamped => "clamped",
        Imputed => "imputed",
    }
}

/// Record of a reading that was not taken at face value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModalityAdjustment {
    pub modality: Modality,
    pub kind: AdjustmentKind,
    /// Raw value as supplied; `None` when the modality was missing.
    pub raw: Option<f64>,
    pub applied: f64,
}

/// Raw readings as delivered by the observation pipeline. Any field may be
/// absent or out of range.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModalityReadings {
    #[serde(alias = "clay")]
    pub clay_alteration: Option<f64>,
    #[serde(alias = "iron")]
    pub iron_oxide: Option<f64>,
    #[serde(alias = "structural")]
    pub structural_density: Option<f64>,
    #[serde(alias = "thermal")]
    pub thermal_flux: Option<f64>,
    #[serde(alias = "vegetation")]
    pub vegetation_stress: Option<f64>,
    #[serde(alias = "terrain")]
    pub terrain_complexity: Option<f64>,
}

impl ModalityReadings {
    pub fn get(&self, modality: Modality) -> Option<f64> {
        match modality {
            Modality::ClayAlteration => self.clay_alteration,
            Modality::IronOxide => self.iron_oxide,
            Modality::StructuralDensity => self.structural_density,
            Modality::ThermalFlux => self.thermal_flux,
            Modality::VegetationStress => self.vegetation_stress,
            Modality::TerrainComplexity => self.terrain_complexity,
        }
    }
}

/// Six normalized indicators for one location. Every value is in [0, 1];
/// construction is the only place where clamping and imputation happen.
#[derive(Debug, Clone, PartialEq)]
pub struct ModalityVector {
    values: [f64; MODALITY_COUNT],
    adjustments: Vec<ModalityAdjustment>,
}

impl ModalityVector {
    pub fn from_readings(readings: &ModalityReadings) -> Self {
        let mut values = [NEUTRAL_MODALITY_VALUE; MODALITY_COUNT];
        let mut adjustments = Vec::new();

        for &modality in Modality::ALL {
            let raw = readings.get(modality);
            let applied = match raw {
                Some(value) if value.is_finite() => {
                    let clamped = value.clamp(0.0, 1.0);
                    if clamped != value {
                        adjustments.push(ModalityAdjustment {
                            modality,
                            kind: AdjustmentKind::Clamped,
                            raw,
                            applied: clamped,
                        });
                    }
                    clamped
                }
                _ => {
                    adjustments.push(ModalityAdjustment {
                        modality,
                        kind: AdjustmentKind::Imputed,
                        raw,
                        applied: NEUTRAL_MODALITY_VALUE,
                    });
                    NEUTRAL_MODALITY_VALUE
                }
            };
            values[modality.index()] = applied;
        }

        Self {
            values,
            adjustments,
        }
    }

    /// Values in `Modality::ALL` order.
    pub fn new(values: [f64; MODALITY_COUNT]) -> Self {
        Self::from_readings(&ModalityReadings {
            clay_alteration: Some(values[0]),
            iron_oxide: Some(values[1]),
            structural_density: Some(values[2]),
            thermal_flux: Some(values[3]),
            vegetation_stress: Some(values[4]),
            terrain_complexity: Some(values[5]),
        })
    }

    pub fn uniform(value: f64) -> Self {
        Self::new([value; MODALITY_COUNT])
    }

    pub fn get(&self, modality: Modality) -> f64 {
        self.values[modality.index()]
    }

    pub fn values(&self) -> &[f64; MODALITY_COUNT] {
        &self.values
    }

    pub fn adjustments(&self) -> &[ModalityAdjustment] {
        &self.adjustments
    }

    /// Copy with one modality replaced; adjustments for the others carry over.
    pub fn with(&self, modality: Modality, value: f64) -> Self {
        let mut readings = self.to_readings();
        match modality {
            Modality::ClayAlteration => readings.clay_alteration = Some(value),
            Modality::IronOxide => readings.iron_oxide = Some(value),
            Modality::StructuralDensity => readings.structural_density = Some(value),
            Modality::ThermalFlux => readings.thermal_flux = Some(value),
            Modality::VegetationStress => readings.vegetation_stress = Some(value),
            Modality::TerrainComplexity => readings.terrain_complexity = Some(value),
        }

        let mut rebuilt = Self::from_readings(&readings);
        let mut adjustments: Vec<ModalityAdjustment> = self
            .adjustments
            .iter()
            .filter(|adjustment| adjustment.modality != modality)
            .copied()
            .collect();
        adjustments.extend(
            rebuilt
                .adjustments
                .iter()
                .filter(|adjustment| adjustment.modality == modality)
                .copied(),
        );
        adjustments.sort_by_key(|adjustment| adjustment.modality.index());
        rebuilt.adjustments = adjustments;
        rebuilt
    }

    fn to_readings(&self) -> ModalityReadings {
        ModalityReadings {
            clay_alteration: Some(self.values[0]),
            iron_oxide: Some(self.values[1]),
            structural_density: Some(self.values[2]),
            thermal_flux: Some(self.values[3]),
            vegetation_stress: Some(self.values[4]),
            terrain_complexity: Some(self.values[5]),
        }
    }
}

impl From<ModalityReadings> for ModalityVector {
    fn from(readings: ModalityReadings) -> Self {
        Self::from_readings(&readings)
    }
}

impl Serialize for ModalityVector {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.to_readings().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ModalityVector {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let readings = ModalityReadings::deserialize(deserializer)?;
        Ok(Self::from_readings(&readings))
    }
}

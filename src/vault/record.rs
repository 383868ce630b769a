use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::provenance::{Provenance, SourceTier};
use crate::error::{CoreError, Result};
use crate::geo::GeoPoint;
use crate::labels::labeled_enum;
use crate::util::sha256_json;

labeled_enum! {
    pub enum MeasurementType {
        SeismicVelocity => "seismic_velocity",
        Density => "density",
        AssayGrade => "assay_ppm" | "assay_grade",
        Lithology => "lithology",
        Porosity => "porosity",
        Permeability => "permeability",
        SonicTransitTime => "sonic_transit_time",
        Gravity => "gravity",
        Magnetic => "magnetic",
        SpectralReflectance => "spectral_reflectance",
        Temperature => "temperature",
        Pressure => "pressure",
        Breakout => "breakout",
        CoreDescription => "core_description",
    }
}

impl MeasurementType {
    /// Categorical types carry their observation in the tags, not the value.
    pub fn is_categorical(self) -> bool {
        matches!(self, Self::Lithology | Self::CoreDescription)
    }
}

labeled_enum! {
    pub enum LithologyTag {
        None => "none",
        Granite => "granite",
        Granodiorite => "granodiorite",
        Diorite => "diorite",
        Gabbro => "gabbro",
        Pegmatite => "pegmatite",
        Basalt => "basalt",
        Andesite => "andesite",
        Rhyolite => "rhyolite",
        Tuff => "tuff",
        Conglomerate => "conglomerate",
        Sandstone => "sandstone",
        Siltstone => "siltstone",
        Shale => "shale",
        Mudstone => "mudstone",
        Limestone => "limestone",
        Dolomite => "dolomite",
        Evaporite => "evaporite",
        Schist => "schist",
        Gneiss => "gneiss",
        Quartzite => "quartzite",
        Marble => "marble",
        Skarn => "skarn",
    }
}

labeled_enum! {
    pub enum MineralizationTag {
        None => "none",
        Disseminated => "disseminated",
        Vein => "vein",
        Stockwork => "stockwork",
        Massive => "massive",
        Replacement => "replacement",
        Placer => "placer",
        Brine => "brine",
    }
}

labeled_enum! {
    pub enum AlterationTag {
        None => "none",
        Potassic => "potassic",
        Phyllic => "phyllic",
        Argillic => "argillic",
        AdvancedArgillic => "advanced_argillic",
        Propylitic => "propylitic",
        Silicic => "silicic",
        Carbonate => "carbonate",
        Hematitic => "hematitic",
    }
}

labeled_enum! {
    pub enum StructuralTag {
        None => "none",
        Fault => "fault",
        Fold => "fold",
        Shear => "shear",
        Fracture => "fracture",
        Breccia => "breccia",
        Contact => "contact",
    }
}

macro_rules! default_none {
    ($($name:ident),+) => {
        $(
            impl Default for $name {
                fn default() -> Self {
                    Self::None
                }
            }
        )+
    };
}

default_none!(LithologyTag, MineralizationTag, AlterationTag, StructuralTag);

labeled_enum! {
    /// Ordered: a record's status only ever moves forward.
    pub enum ValidationStatus {
        Raw => "RAW",
        QcPassed => "QC_PASSED",
        PeerReviewed => "PEER_REVIEWED",
    }
}

impl ValidationStatus {
    pub fn rank(self) -> u8 {
        match self {
            Self::Raw => 1,
            Self::QcPassed => 2,
            Self::PeerReviewed => 3,
        }
    }

    pub fn next(self) -> Option<Self> {
        match self {
            Self::Raw => Some(Self::QcPassed),
            Self::QcPassed => Some(Self::PeerReviewed),
            Self::PeerReviewed => None,
        }
    }
}

labeled_enum! {
    /// Ordered by severity so the worst open conflict wins.
    pub enum ConflictStatus {
        Clean => "clean",
        FlaggedVsNeighbor => "flagged_vs_neighbor",
        FlaggedVsTier => "flagged_vs_tier",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DepthInterval {
    pub top_m: f64,
    #[serde(default)]
    pub bottom_m: Option<f64>,
}

impl DepthInterval {
    pub fn width(&self) -> f64 {
        self.bottom_m.map(|bottom| bottom - self.top_m).unwrap_or(0.0)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.top_m.is_finite() || self.top_m < 0.0 {
            return Err(CoreError::validation(format!(
                "depth top {} must be a finite non-negative depth",
                self.top_m
            )));
        }
        if let Some(bottom) = self.bottom_m {
            if !bottom.is_finite() || bottom < self.top_m {
                return Err(CoreError::validation(format!(
                    "depth bottom {bottom} must be finite and not above top {}",
                    self.top_m
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeologicalTags {
    pub lithology: LithologyTag,
    pub mineralization: MineralizationTag,
    pub alteration: AlterationTag,
    pub structural_context: StructuralTag,
}

/// Typed fields that extension metadata may not shadow.
const RESERVED_EXTENSION_KEYS: &[&str] = &[
    "record_id",
    "data_hash",
    "location",
    "depth",
    "measurement_type",
    "measurement_value",
    "unit",
    "is_non_detect",
    "detection_limit",
    "lithology",
    "mineralization",
    "alteration",
    "structural_context",
    "validation_status",
    "gtc_score",
    "conflict_status",
    "provenance",
];

/// An observation as delivered by the ingestion pipeline, before the vault
/// assigns status, GTC and provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordCandidate {
    #[serde(default)]
    pub record_id: Option<Uuid>,
    pub location: GeoPoint,
    #[serde(default)]
    pub depth: Option<DepthInterval>,
    pub measurement_type: MeasurementType,
    #[serde(default)]
    pub measurement_value: Option<f64>,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub is_non_detect: bool,
    #[serde(default)]
    pub detection_limit: Option<f64>,
    #[serde(flatten)]
    pub tags: GeologicalTags,
    #[serde(default)]
    pub extensions: BTreeMap<String, serde_json::Value>,
}

#[derive(Serialize)]
struct HashedContent<'a> {
    location: &'a GeoPoint,
    depth: &'a Option<DepthInterval>,
    measurement_type: MeasurementType,
    measurement_value: Option<f64>,
    unit: Option<&'a str>,
    is_non_detect: bool,
    detection_limit: Option<f64>,
    tags: &'a GeologicalTags,
    extensions: &'a BTreeMap<String, serde_json::Value>,
}

impl RecordCandidate {
    pub fn new(location: GeoPoint, measurement_type: MeasurementType) -> Self {
        Self {
            record_id: None,
            location,
            depth: None,
            measurement_type,
            measurement_value: None,
            unit: None,
            is_non_detect: false,
            detection_limit: None,
            tags: GeologicalTags::default(),
            extensions: BTreeMap::new(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.location.validate()?;
        if let Some(depth) = &self.depth {
            depth.validate()?;
        }

        if let Some(value) = self.measurement_value {
            if !value.is_finite() {
                return Err(CoreError::validation("measurement value must be finite"));
            }
        }
        if let Some(limit) = self.detection_limit {
            if !limit.is_finite() || limit < 0.0 {
                return Err(CoreError::validation(
                    "detection limit must be finite and non-negative",
                ));
            }
        }

        if self.is_non_detect {
            if self.measurement_value.is_some() {
                return Err(CoreError::validation(
                    "non-detect records must not carry a measurement value",
                ));
            }
            if self.measurement_type.is_categorical() {
                return Err(CoreError::validation(format!(
                    "{} is categorical and cannot be a non-detect",
                    self.measurement_type
                )));
            }
        } else if !self.measurement_type.is_categorical() && self.measurement_value.is_none() {
            return Err(CoreError::validation(format!(
                "{} requires a measurement value unless flagged non-detect",
                self.measurement_type
            )));
        }

        if self.measurement_type == MeasurementType::Lithology
            && self.tags.lithology == LithologyTag::None
        {
            return Err(CoreError::validation(
                "lithology records must carry a lithology tag",
            ));
        }

        if let Some(unit) = &self.unit {
            if unit.trim().is_empty() {
                return Err(CoreError::validation("unit must not be blank when present"));
            }
        }

        for key in self.extensions.keys() {
            if key.trim().is_empty() {
                return Err(CoreError::validation("extension keys must not be blank"));
            }
            if RESERVED_EXTENSION_KEYS.contains(&key.as_str()) {
                return Err(CoreError::validation(format!(
                    "extension key {key:?} shadows a typed field"
                )));
            }
        }

        Ok(())
    }

    /// Digest of the observational content. The record id is excluded so the
    /// same observation arriving under two identities hashes identically.
    pub fn content_hash(&self) -> Result<String> {
        let content = HashedContent {
            location: &self.location,
            depth: &self.depth,
            measurement_type: self.measurement_type,
            measurement_value: self.measurement_value,
            unit: self.unit.as_deref().map(str::trim),
            is_non_detect: self.is_non_detect,
            detection_limit: self.detection_limit,
            tags: &self.tags,
            extensions: &self.extensions,
        };
        Ok(sha256_json(&content)?)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroundTruthRecord {
    pub record_id: Uuid,
    pub data_hash: String,
    pub location: GeoPoint,
    pub depth: Option<DepthInterval>,
    pub measurement_type: MeasurementType,
    pub measurement_value: Option<f64>,
    pub unit: Option<String>,
    pub is_non_detect: bool,
    pub detection_limit: Option<f64>,
    #[serde(flatten)]
    pub tags: GeologicalTags,
    pub validation_status: ValidationStatus,
    pub gtc_score: f64,
    pub conflict_status: ConflictStatus,
    pub provenance: Provenance,
    pub superseded_by: Option<Uuid>,
    /// Same content already stored under another id.
    pub dedup_review: bool,
    pub extensions: BTreeMap<String, serde_json::Value>,
    pub ingested_at: DateTime<Utc>,
}

impl GroundTruthRecord {
    pub fn source_tier(&self) -> SourceTier {
        self.provenance.source_tier
    }

    /// Higher is more authoritative: tier first, validation status second.
    pub fn authority_rank(&self) -> (u8, u8) {
        (
            self.source_tier().authority_rank(),
            self.validation_status.rank(),
        )
    }

    pub fn numeric_value(&self) -> Option<f64> {
        if self.is_non_detect || self.measurement_type.is_categorical() {
            None
        } else {
            self.measurement_value
        }
    }

    pub fn is_superseded(&self) -> bool {
        self.superseded_by.is_some()
    }
}

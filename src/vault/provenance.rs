use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::error::{CoreError, Result};

#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("source tier {0} outside 1..=5")]
pub struct InvalidSourceTier(pub i64);

/// Authority tier of a data source, 1 (public authoritative) to 5
/// (security-restricted). Serialized as its number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum SourceTier {
    PublicAuthoritative = 1,
    Commercial = 2,
    Client = 3,
    RealTime = 4,
    SecurityRestricted = 5,
}

impl SourceTier {
    pub const ALL: &'static [SourceTier] = &[
        Self::PublicAuthoritative,
        Self::Commercial,
        Self::Client,
        Self::RealTime,
        Self::SecurityRestricted,
    ];

    pub fn number(self) -> i64 {
        self as i64
    }

    /// 5 for tier 1 down to 1 for tier 5.
    pub fn authority_rank(self) -> u8 {
        (6 - self.number()) as u8
    }
}

impl TryFrom<i64> for SourceTier {
    type Error = InvalidSourceTier;

    fn try_from(value: i64) -> std::result::Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::PublicAuthoritative),
            2 => Ok(Self::Commercial),
            3 => Ok(Self::Client),
            4 => Ok(Self::RealTime),
            5 => Ok(Self::SecurityRestricted),
            other => Err(InvalidSourceTier(other)),
        }
    }
}

impl From<SourceTier> for i64 {
    fn from(tier: SourceTier) -> Self {
        tier.number()
    }
}

impl std::fmt::Display for SourceTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "tier-{}", self.number())
    }
}

/// What the ingestion pipeline knows about where a record came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvenanceInput {
    pub source_tier: SourceTier,
    pub source_organization: String,
    #[serde(default)]
    pub chain_of_custody: Vec<String>,
}

impl ProvenanceInput {
    pub fn new(source_tier: SourceTier, source_organization: &str) -> Self {
        Self {
            source_tier,
            source_organization: source_organization.to_string(),
            chain_of_custody: Vec::new(),
        }
    }

    pub fn with_stage(mut self, stage: &str) -> Self {
        self.chain_of_custody.push(stage.to_string());
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.source_organization.trim().is_empty() {
            return Err(CoreError::validation("source organization is required"));
        }
        if self
            .chain_of_custody
            .iter()
            .any(|stage| stage.trim().is_empty())
        {
            return Err(CoreError::validation(
                "chain-of-custody stages must not be blank",
            ));
        }
        Ok(())
    }
}

/// One ingestion event. Written once, never updated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Provenance {
    pub provenance_id: Uuid,
    pub source_tier: SourceTier,
    pub source_organization: String,
    pub chain_of_custody: Vec<String>,
    pub content_hash: String,
    pub ingested_at: DateTime<Utc>,
}

impl Provenance {
    pub(crate) fn from_input(
        input: &ProvenanceInput,
        content_hash: &str,
        ingested_at: DateTime<Utc>,
    ) -> Self {
        Self {
            provenance_id: Uuid::new_v4(),
            source_tier: input.source_tier,
            source_organization: input.source_organization.trim().to_string(),
            chain_of_custody: input
                .chain_of_custody
                .iter()
                .map(|stage| stage.trim().to_string())
                .collect(),
            content_hash: content_hash.to_string(),
            ingested_at,
        }
    }
}

//! Ground-truth confidence by (source tier, validation status).
//!
//! Authority is a policy decision, so this is a lookup table rather than a
//! formula. Unvalidated data sits at the neutral prior regardless of tier.

use super::provenance::SourceTier;
use super::record::ValidationStatus;

pub const RAW_GTC: f64 = 0.5;

pub fn gtc_score(tier: SourceTier, status: ValidationStatus) -> f64 {
    use SourceTier::*;
    use ValidationStatus::*;

    match (tier, status) {
        (_, Raw) => RAW_GTC,
        (PublicAuthoritative, QcPassed) => 0.85,
        (PublicAuthoritative, PeerReviewed) => 0.98,
        (Commercial, QcPassed) => 0.75,
        (Commercial, PeerReviewed) => 0.90,
        (Client, QcPassed) => 0.58,
        (Client, PeerReviewed) => 0.72,
        (RealTime, QcPassed) => 0.55,
        (RealTime, PeerReviewed) => 0.68,
        (SecurityRestricted, QcPassed) => 0.60,
        (SecurityRestricted, PeerReviewed) => 0.78,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_records_use_the_neutral_prior() {
        for &tier in SourceTier::ALL {
            assert_eq!(gtc_score(tier, ValidationStatus::Raw), RAW_GTC);
        }
    }

    #[test]
    fn validation_never_lowers_confidence() {
        for &tier in SourceTier::ALL {
            let raw = gtc_score(tier, ValidationStatus::Raw);
            let qc = gtc_score(tier, ValidationStatus::QcPassed);
            let reviewed = gtc_score(tier, ValidationStatus::PeerReviewed);
            assert!(raw <= qc && qc <= reviewed, "{tier}");
            assert!(reviewed <= 1.0);
        }
    }

    #[test]
    fn public_peer_reviewed_outranks_client_data() {
        assert!(gtc_score(SourceTier::PublicAuthoritative, ValidationStatus::PeerReviewed) > 0.95);
        let client_qc = gtc_score(SourceTier::Client, ValidationStatus::QcPassed);
        assert!((0.5..=0.6).contains(&client_qc));
    }
}

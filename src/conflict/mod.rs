//! Pairwise conflict detection between ground-truth observations and the
//! three resolution paths: authority ranking, GTC-weighted consensus, and
//! manual review.

mod compatibility;
mod detect;
mod model;
mod resolve;

pub use compatibility::{
    LithologyFamily, alterations_compatible, lithologies_compatible, lithology_family,
    types_comparable,
};
pub use detect::{DEPTH_TOLERANCE_FLOOR_M, DEPTH_TOLERANCE_FRACTION, compare_pair, detect_against};
pub use model::{
    Conflict, ConflictFinding, ConflictState, ConflictType, ResolutionMethod, Severity,
};
pub use resolve::{
    CONSENSUS_MULTIPLIER_MAX, CONSENSUS_MULTIPLIER_STEP, ConflictResolver, consensus_multiplier,
    unresolved_count,
};

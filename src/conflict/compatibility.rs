use crate::vault::{AlterationTag, LithologyTag, MeasurementType};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LithologyFamily {
    FelsicIntrusive,
    MaficIntrusive,
    Volcanic,
    Clastic,
    Chemical,
    Metamorphic,
}

pub fn lithology_family(tag: LithologyTag) -> Option<LithologyFamily> {
    use LithologyFamily::*;

    let family = match tag {
        LithologyTag::None => return None,
        LithologyTag::Granite | LithologyTag::Granodiorite | LithologyTag::Pegmatite => {
            FelsicIntrusive
        }
        LithologyTag::Diorite | LithologyTag::Gabbro => MaficIntrusive,
        LithologyTag::Basalt | LithologyTag::Andesite | LithologyTag::Rhyolite | LithologyTag::Tuff => {
            Volcanic
        }
        LithologyTag::Conglomerate
        | LithologyTag::Sandstone
        | LithologyTag::Siltstone
        | LithologyTag::Shale
        | LithologyTag::Mudstone => Clastic,
        LithologyTag::Limestone | LithologyTag::Dolomite | LithologyTag::Evaporite => Chemical,
        LithologyTag::Schist
        | LithologyTag::Gneiss
        | LithologyTag::Quartzite
        | LithologyTag::Marble
        | LithologyTag::Skarn => Metamorphic,
    };
    Some(family)
}

/// Pairs that are logged as each other across gradational contacts or
/// metamorphic equivalence. Symmetric; order within a pair is irrelevant.
const GRADATIONAL_CONTACTS: &[(LithologyTag, LithologyTag)] = &[
    (LithologyTag::Granite, LithologyTag::Granodiorite),
    (LithologyTag::Granite, LithologyTag::Pegmatite),
    (LithologyTag::Granodiorite, LithologyTag::Diorite),
    (LithologyTag::Diorite, LithologyTag::Gabbro),
    (LithologyTag::Basalt, LithologyTag::Andesite),
    (LithologyTag::Andesite, LithologyTag::Rhyolite),
    (LithologyTag::Andesite, LithologyTag::Tuff),
    (LithologyTag::Rhyolite, LithologyTag::Tuff),
    (LithologyTag::Conglomerate, LithologyTag::Sandstone),
    (LithologyTag::Sandstone, LithologyTag::Siltstone),
    (LithologyTag::Siltstone, LithologyTag::Shale),
    (LithologyTag::Siltstone, LithologyTag::Mudstone),
    (LithologyTag::Shale, LithologyTag::Mudstone),
    (LithologyTag::Limestone, LithologyTag::Dolomite),
    (LithologyTag::Dolomite, LithologyTag::Evaporite),
    (LithologyTag::Limestone, LithologyTag::Marble),
    (LithologyTag::Dolomite, LithologyTag::Marble),
    (LithologyTag::Limestone, LithologyTag::Skarn),
    (LithologyTag::Marble, LithologyTag::Skarn),
    (LithologyTag::Sandstone, LithologyTag::Quartzite),
    (LithologyTag::Shale, LithologyTag::Schist),
    (LithologyTag::Schist, LithologyTag::Gneiss),
    (LithologyTag::Granite, LithologyTag::Gneiss),
];

/// Alteration assemblages that commonly overprint or zone into each other.
const ALTERATION_OVERPRINTS: &[(AlterationTag, AlterationTag)] = &[
    (AlterationTag::Potassic, AlterationTag::Phyllic),
    (AlterationTag::Phyllic, AlterationTag::Argillic),
    (AlterationTag::Phyllic, AlterationTag::Silicic),
    (AlterationTag::Phyllic, AlterationTag::Propylitic),
    (AlterationTag::Argillic, AlterationTag::AdvancedArgillic),
    (AlterationTag::AdvancedArgillic, AlterationTag::Silicic),
    (AlterationTag::Argillic, AlterationTag::Hematitic),
    (AlterationTag::Silicic, AlterationTag::Hematitic),
    (AlterationTag::Propylitic, AlterationTag::Carbonate),
];

/// Measurement types that are cross-checked even though they differ.
const COMPARABLE_TYPES: &[(MeasurementType, MeasurementType)] = &[
    (MeasurementType::AssayGrade, MeasurementType::Lithology),
    (MeasurementType::AssayGrade, MeasurementType::CoreDescription),
    (MeasurementType::Lithology, MeasurementType::CoreDescription),
    (MeasurementType::SeismicVelocity, MeasurementType::SonicTransitTime),
    (MeasurementType::Density, MeasurementType::Gravity),
];

fn listed<T: PartialEq + Copy>(table: &[(T, T)], a: T, b: T) -> bool {
    table
        .iter()
        .any(|&(left, right)| (left == a && right == b) || (left == b && right == a))
}

pub fn types_comparable(a: MeasurementType, b: MeasurementType) -> bool {
    a == b || listed(COMPARABLE_TYPES, a, b)
}

pub fn lithologies_compatible(a: LithologyTag, b: LithologyTag) -> bool {
    a == b || a == LithologyTag::None || b == LithologyTag::None || listed(GRADATIONAL_CONTACTS, a, b)
}

pub fn alterations_compatible(a: AlterationTag, b: AlterationTag) -> bool {
    a == b
        || a == AlterationTag::None
        || b == AlterationTag::None
        || listed(ALTERATION_OVERPRINTS, a, b)
}

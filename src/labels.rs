//! Closed string-labelled enums.
//!
//! Every categorical field that crosses the JSON or SQLite boundary is one of
//! these: the label is the stable wire value, parsing rejects anything else.

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown {kind} value: {value:?}")]
pub struct UnknownLabel {
    pub kind: &'static str,
    pub value: String,
}

macro_rules! labeled_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $(
                $(#[$variant_meta:meta])*
                $variant:ident => $label:literal $(| $alias:literal)*
            ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            Hash,
            PartialOrd,
            Ord,
            serde::Serialize,
            serde::Deserialize,
        )]
        $vis enum $name {
            $(
                $(#[$variant_meta])*
                #[serde(rename = $label $(, alias = $alias)*)]
                $variant,
            )+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $label,)+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = $crate::labels::UnknownLabel;

            fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
                let trimmed = value.trim();
                $(
                    if trimmed == $label $(|| trimmed == $alias)* {
                        return Ok($name::$variant);
                    }
                )+
                Err($crate::labels::UnknownLabel {
                    kind: stringify!($name),
                    value: trimmed.to_string(),
                })
            }
        }
    };
}

pub(crate) use labeled_enum;

#[cfg(test)]
mod tests {
    use super::*;

    labeled_enum! {
        enum Probe {
            First => "first" | "one",
            Second => "second",
        }
    }

    #[test]
    fn parses_labels_and_aliases() {
        assert_eq!("first".parse::<Probe>(), Ok(Probe::First));
        assert_eq!(" one ".parse::<Probe>(), Ok(Probe::First));
        assert_eq!("second".parse::<Probe>(), Ok(Probe::Second));
        assert_eq!(Probe::Second.to_string(), "second");
        assert_eq!(Probe::ALL.len(), 2);
    }

    #[test]
    fn rejects_values_outside_the_closed_set() {
        let error = "third".parse::<Probe>().expect_err("unknown label must fail");
        assert_eq!(error.kind, "Probe");
        assert_eq!(error.value, "third");
    }

    #[test]
    fn serde_uses_labels() {
        let json = serde_json::to_string(&Probe::First).expect("serialize");
        assert_eq!(json, "\"first\"");
        let parsed: Probe = serde_json::from_str("\"one\"").expect("alias deserializes");
        assert_eq!(parsed, Probe::First);
    }
}

//! Kubernetes resource quantities, parsed far enough to compare them
//! semantically: `1Ti` and `1024Gi` are the same storage request.
use std::{fmt::Display, num::ParseFloatError, str::FromStr};

use k8s_openapi::apimachinery::pkg::api::resource::Quantity as K8sQuantity;
use snafu::{ResultExt as _, Snafu, ensure};

#[derive(Debug, PartialEq, Snafu)]
pub enum ParseQuantityError {
    #[snafu(display("input is either empty or contains non-ascii characters"))]
    InvalidFormat,

    #[snafu(display("failed to parse floating point number"))]
    InvalidFloat { source: ParseFloatError },

    #[snafu(display("failed to parse {input:?} as quantity suffix"))]
    InvalidSuffix { input: String },
}

/// A quantity in the `<number><suffix>` serialization format.
///
/// The number is kept as a float. Storage requests are far below the range
/// where this loses precision.
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd)]
pub struct Quantity {
    value: f64,
    suffix: Option<Suffix>,
}

impl FromStr for Quantity {
    type Err = ParseQuantityError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        ensure!(!input.is_empty() && input.is_ascii(), InvalidFormatSnafu);

        let unsigned = input.trim_start_matches(['+', '-']);
        let sign_length = input.len() - unsigned.len();

        match unsigned.find(|c: char| c != '.' && !c.is_ascii_digit()) {
            Some(suffix_index) => {
                let (value, suffix) = input.split_at(sign_length + suffix_index);
                let value = f64::from_str(value).context(InvalidFloatSnafu)?;
                let suffix = Suffix::from_str(suffix)?;

                Ok(Self {
                    value,
                    suffix: Some(suffix),
                })
            }
            None => Ok(Self {
                value: f64::from_str(input).context(InvalidFloatSnafu)?,
                suffix: None,
            }),
        }
    }
}

impl Display for Quantity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.suffix {
            Some(suffix) => write!(f, "{value}{suffix}", value = self.value),
            None => write!(f, "{value}", value = self.value),
        }
    }
}

impl TryFrom<&K8sQuantity> for Quantity {
    type Error = ParseQuantityError;

    fn try_from(value: &K8sQuantity) -> Result<Self, Self::Error> {
        Self::from_str(&value.0)
    }
}

impl Quantity {
    /// The value without suffix, e.g. `1Ki` is `1024`.
    pub fn as_base_units(&self) -> f64 {
        match &self.suffix {
            Some(suffix) => self.value * suffix.factor(),
            None => self.value,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, PartialOrd)]
pub enum Suffix {
    DecimalByteMultiple(DecimalByteMultiple),
    BinaryByteMultiple(BinaryByteMultiple),
    DecimalExponent(f64),
}

impl FromStr for Suffix {
    type Err = ParseQuantityError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        if let Ok(binary) = BinaryByteMultiple::from_str(input) {
            return Ok(Self::BinaryByteMultiple(binary));
        }

        if let Ok(decimal) = DecimalByteMultiple::from_str(input) {
            return Ok(Self::DecimalByteMultiple(decimal));
        }

        if let Some(Ok(exponent)) = input.strip_prefix(['e', 'E']).map(f64::from_str) {
            return Ok(Self::DecimalExponent(exponent));
        }

        InvalidSuffixSnafu { input }.fail()
    }
}

impl Display for Suffix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DecimalByteMultiple(decimal) => write!(f, "{decimal}"),
            Self::BinaryByteMultiple(binary) => write!(f, "{binary}"),
            Self::DecimalExponent(exponent) => write!(f, "e{exponent}"),
        }
    }
}

impl Suffix {
    pub fn factor(&self) -> f64 {
        match self {
            Self::DecimalByteMultiple(decimal) => 10_f64.powi(decimal.exponent()),
            Self::BinaryByteMultiple(binary) => 2_f64.powi(binary.exponent()),
            Self::DecimalExponent(exponent) => 10_f64.powf(*exponent),
        }
    }
}

/// Byte multiples based on powers of 2, e.g. `Gi` for 1024^3.
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd, strum::Display, strum::EnumString)]
pub enum BinaryByteMultiple {
    #[strum(serialize = "Ki")]
    Kibi,

    #[strum(serialize = "Mi")]
    Mebi,

    #[strum(serialize = "Gi")]
    Gibi,

    #[strum(serialize = "Ti")]
    Tebi,

    #[strum(serialize = "Pi")]
    Pebi,

    #[strum(serialize = "Ei")]
    Exbi,
}

impl BinaryByteMultiple {
    fn exponent(self) -> i32 {
        match self {
            Self::Kibi => 10,
            Self::Mebi => 20,
            Self::Gibi => 30,
            Self::Tebi => 40,
            Self::Pebi => 50,
            Self::Exbi => 60,
        }
    }
}

/// Byte multiples based on powers of 10. Kubernetes spells kilo with a
/// lowercase `k`.
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd, strum::Display, strum::EnumString)]
pub enum DecimalByteMultiple {
    #[strum(serialize = "m")]
    Milli,

    #[strum(serialize = "k")]
    Kilo,

    #[strum(serialize = "M")]
    Mega,

    #[strum(serialize = "G")]
    Giga,

    #[strum(serialize = "T")]
    Tera,

    #[strum(serialize = "P")]
    Peta,

    #[strum(serialize = "E")]
    Exa,
}

impl DecimalByteMultiple {
    fn exponent(self) -> i32 {
        match self {
            Self::Milli => -3,
            Self::Kilo => 3,
            Self::Mega => 6,
            Self::Giga => 9,
            Self::Tera => 12,
            Self::Peta => 15,
            Self::Exa => 18,
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("Ki", Suffix::BinaryByteMultiple(BinaryByteMultiple::Kibi))]
    #[case("Gi", Suffix::BinaryByteMultiple(BinaryByteMultiple::Gibi))]
    #[case("k", Suffix::DecimalByteMultiple(DecimalByteMultiple::Kilo))]
    #[case("m", Suffix::DecimalByteMultiple(DecimalByteMultiple::Milli))]
    #[case("E", Suffix::DecimalByteMultiple(DecimalByteMultiple::Exa))]
    #[case("e3", Suffix::DecimalExponent(3.0))]
    #[case("E-2", Suffix::DecimalExponent(-2.0))]
    fn suffix_from_str(#[case] input: &str, #[case] expected: Suffix) {
        assert_eq!(Suffix::from_str(input), Ok(expected));
    }

    #[rstest]
    #[case("1Ki", 1024.0)]
    #[case("1.5Gi", 1.5 * 1024.0 * 1024.0 * 1024.0)]
    #[case("500M", 500_000_000.0)]
    #[case("100m", 0.1)]
    #[case("1e3", 1000.0)]
    #[case("42", 42.0)]
    #[case("0", 0.0)]
    #[case("-2k", -2000.0)]
    fn as_base_units(#[case] input: &str, #[case] expected: f64) {
        let quantity = Quantity::from_str(input).expect("valid quantity");
        assert!((quantity.as_base_units() - expected).abs() < 1e-9);
    }

    #[rstest]
    #[case("")]
    #[case("1Zi")]
    #[case("Gi")]
    #[case("1.2.3Gi")]
    #[case("1\u{00e9}")]
    fn from_str_fail(#[case] input: &str) {
        assert!(Quantity::from_str(input).is_err());
    }

    #[test]
    fn display() {
        assert_eq!(Quantity::from_str("1.5Gi").expect("valid").to_string(), "1.5Gi");
        assert_eq!(Quantity::from_str("1e3").expect("valid").to_string(), "1e3");
    }
}

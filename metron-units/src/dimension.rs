//! Dimensional analysis types
//!
//! A physical dimension is a sparse vector of rational exponents over the
//! ten base dimensions. The order of [`BaseDimension::ALL`] is the canonical
//! dimension order used for vector indexing and for validating unit systems.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use num_rational::Rational64;
use num_traits::{CheckedAdd, CheckedMul, CheckedSub, One, Zero};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::parse::format_exponent;

/// Exponent of a base dimension (or of a unit term). Usually an integer,
/// occasionally a half-integer.
pub type Exponent = Rational64;

/// Largest numerator or denominator an exponent may carry
pub const MAX_EXPONENT: u64 = i32::MAX as u64;

/// Errors raised by dimension algebra
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DimensionError {
    #[error("`{0}` is not a base dimension")]
    UnknownBaseDimension(String),

    #[error("dimension mismatch: {left} and {right} cannot be combined")]
    Mismatch { left: Dimensions, right: Dimensions },

    #[error("incomparable dimensions: {left} and {right}")]
    Incomparable { left: Dimensions, right: Dimensions },

    #[error("absolute temperatures cannot be added together")]
    AbsoluteTemperatureSum,

    #[error("exponent out of range (numerator and denominator are limited to {})", MAX_EXPONENT)]
    ExponentOverflow,
}

/// Keep an arithmetic result only if it stays within [`MAX_EXPONENT`]
pub(crate) fn bounded(exp: Option<Exponent>) -> Result<Exponent, DimensionError> {
    let in_range = |e: &Exponent| {
        e.numer().unsigned_abs() <= MAX_EXPONENT && e.denom().unsigned_abs() <= MAX_EXPONENT
    };
    exp.filter(in_range).ok_or(DimensionError::ExponentOverflow)
}

pub(crate) fn add_exponents(a: Exponent, b: Exponent) -> Result<Exponent, DimensionError> {
    bounded(a.checked_add(&b))
}

pub(crate) fn mul_exponents(a: Exponent, b: Exponent) -> Result<Exponent, DimensionError> {
    bounded(a.checked_mul(&b))
}

/// The fundamental physical dimensions, in canonical order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BaseDimension {
    Mass,
    Length,
    Time,
    Temperature,
    TemperatureDifference,
    Angle,
    ChemicalAmount,
    Light,
    Current,
    SolidAngle,
}

impl BaseDimension {
    /// Number of base dimensions
    pub const COUNT: usize = 10;

    /// All base dimensions in canonical order
    pub const ALL: [BaseDimension; Self::COUNT] = [
        BaseDimension::Mass,
        BaseDimension::Length,
        BaseDimension::Time,
        BaseDimension::Temperature,
        BaseDimension::TemperatureDifference,
        BaseDimension::Angle,
        BaseDimension::ChemicalAmount,
        BaseDimension::Light,
        BaseDimension::Current,
        BaseDimension::SolidAngle,
    ];

    /// Position of this dimension in the canonical order
    pub fn index(self) -> usize {
        self as usize
    }

    /// Configuration name, e.g. `TEMPERATURE_DIFFERENCE`
    pub fn name(self) -> &'static str {
        match self {
            BaseDimension::Mass => "MASS",
            BaseDimension::Length => "LENGTH",
            BaseDimension::Time => "TIME",
            BaseDimension::Temperature => "TEMPERATURE",
            BaseDimension::TemperatureDifference => "TEMPERATURE_DIFFERENCE",
            BaseDimension::Angle => "ANGLE",
            BaseDimension::ChemicalAmount => "CHEMICAL_AMOUNT",
            BaseDimension::Light => "LIGHT",
            BaseDimension::Current => "CURRENT",
            BaseDimension::SolidAngle => "SOLID_ANGLE",
        }
    }
}

impl FromStr for BaseDimension {
    type Err = DimensionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BaseDimension::ALL
            .iter()
            .copied()
            .find(|dim| dim.name() == s)
            .ok_or_else(|| DimensionError::UnknownBaseDimension(s.to_string()))
    }
}

impl fmt::Display for BaseDimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Composite dimension: base dimension -> exponent.
///
/// Entries with a zero exponent are never stored, so two values describing
/// the same physical dimension always have the same representation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dimensions {
    exponents: BTreeMap<BaseDimension, Exponent>,
}

impl Dimensions {
    /// Dimensionless (empty) vector
    pub fn dimensionless() -> Self {
        Self::default()
    }

    /// Single base dimension with exponent 1
    pub fn single(dim: BaseDimension) -> Self {
        Self::from_pairs([(dim, Exponent::one())])
    }

    /// Build from (dimension, exponent) pairs. A repeated dimension keeps
    /// the last exponent given for it, like a literal mapping would.
    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (BaseDimension, Exponent)>,
    {
        let mut exponents = BTreeMap::new();
        for (dim, exp) in pairs {
            exponents.insert(dim, exp);
        }
        exponents.retain(|_, exp| !exp.is_zero());
        Dimensions { exponents }
    }

    /// Build from integer exponents, the common case
    pub fn from_integers<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (BaseDimension, i64)>,
    {
        Self::from_pairs(pairs.into_iter().map(|(dim, exp)| (dim, Exponent::from_integer(exp))))
    }

    /// Build from dimension names such as `"LENGTH"`
    pub fn from_names<I, S>(pairs: I) -> Result<Self, DimensionError>
    where
        I: IntoIterator<Item = (S, Exponent)>,
        S: AsRef<str>,
    {
        let pairs = pairs
            .into_iter()
            .map(|(name, exp)| -> Result<_, DimensionError> {
                Ok((name.as_ref().parse::<BaseDimension>()?, exp))
            })
            .collect::<Result<Vec<_>, DimensionError>>()?;
        Ok(Self::from_pairs(pairs))
    }

    /// Exponent of `dim` (zero when absent)
    pub fn get(&self, dim: BaseDimension) -> Exponent {
        self.exponents.get(&dim).copied().unwrap_or_else(Exponent::zero)
    }

    /// Non-zero entries in canonical dimension order
    pub fn iter(&self) -> impl Iterator<Item = (BaseDimension, Exponent)> + '_ {
        self.exponents.iter().map(|(dim, exp)| (*dim, *exp))
    }

    pub fn len(&self) -> usize {
        self.exponents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exponents.is_empty()
    }

    pub fn is_dimensionless(&self) -> bool {
        self.exponents.is_empty()
    }

    /// The base dimension if this is exactly one dimension to the first power
    pub fn single_dimension(&self) -> Option<BaseDimension> {
        match self.exponents.iter().next() {
            Some((dim, exp)) if self.exponents.len() == 1 && exp.is_one() => Some(*dim),
            _ => None,
        }
    }

    /// Multiply dimensions (add exponents)
    pub fn combine_multiply(&self, other: &Dimensions) -> Result<Dimensions, DimensionError> {
        self.merge(other, add_exponents)
    }

    /// Divide dimensions (subtract exponents)
    pub fn combine_divide(&self, other: &Dimensions) -> Result<Dimensions, DimensionError> {
        self.merge(other, |a, b| bounded(a.checked_sub(&b)))
    }

    /// Raise to a power (scale every exponent)
    pub fn raise_power(&self, power: Exponent) -> Result<Dimensions, DimensionError> {
        let pairs = self
            .iter()
            .map(|(dim, exp)| Ok((dim, mul_exponents(exp, power)?)))
            .collect::<Result<Vec<_>, DimensionError>>()?;
        Ok(Self::from_pairs(pairs))
    }

    /// Invert dimensions (negate exponents)
    pub fn invert(&self) -> Result<Dimensions, DimensionError> {
        self.raise_power(-Exponent::one())
    }

    /// True when every exponent cancels to exactly zero after subtracting
    /// `other` term by term.
    pub fn dimensionally_equal(&self, other: &Dimensions) -> bool {
        let mut leftover = other.exponents.clone();
        for (dim, exp) in self.iter() {
            let entry = leftover.entry(dim).or_insert_with(Exponent::zero);
            match entry.checked_sub(&exp) {
                Some(diff) => *entry = diff,
                // a difference that large is not zero
                None => return false,
            }
        }
        leftover.values().all(|exp| exp.is_zero())
    }

    /// Dimensions of `self + other`.
    ///
    /// Equal dimensions add to themselves, except two absolute temperatures.
    /// Temperature plus temperature difference (either order) is a
    /// temperature. Anything else is a mismatch.
    pub fn combine_add(&self, other: &Dimensions) -> Result<Dimensions, DimensionError> {
        use BaseDimension::{Temperature, TemperatureDifference};

        match (self.single_dimension(), other.single_dimension()) {
            (Some(Temperature), Some(Temperature)) => Err(DimensionError::AbsoluteTemperatureSum),
            (Some(Temperature), Some(TemperatureDifference))
            | (Some(TemperatureDifference), Some(Temperature)) => {
                Ok(Dimensions::single(Temperature))
            }
            _ => self.same_or_mismatch(other),
        }
    }

    /// Dimensions of `self - other`.
    ///
    /// Temperature minus temperature is a temperature difference; mixing a
    /// temperature with a temperature difference yields a temperature.
    pub fn combine_subtract(&self, other: &Dimensions) -> Result<Dimensions, DimensionError> {
        use BaseDimension::{Temperature, TemperatureDifference};

        match (self.single_dimension(), other.single_dimension()) {
            (Some(Temperature), Some(Temperature)) => Ok(Dimensions::single(TemperatureDifference)),
            (Some(Temperature), Some(TemperatureDifference))
            | (Some(TemperatureDifference), Some(Temperature)) => {
                Ok(Dimensions::single(Temperature))
            }
            _ => self.same_or_mismatch(other),
        }
    }

    /// Ordering check. Dimensions have no real order: equal vectors compare
    /// as `Equal`, anything else is incomparable.
    pub fn try_compare(&self, other: &Dimensions) -> Result<Ordering, DimensionError> {
        if self.dimensionally_equal(other) {
            Ok(Ordering::Equal)
        } else {
            Err(DimensionError::Incomparable {
                left: self.clone(),
                right: other.clone(),
            })
        }
    }

    pub fn less_than(&self, other: &Dimensions) -> Result<bool, DimensionError> {
        self.try_compare(other).map(Ordering::is_lt)
    }

    pub fn less_equal(&self, other: &Dimensions) -> Result<bool, DimensionError> {
        self.try_compare(other).map(Ordering::is_le)
    }

    pub fn greater_than(&self, other: &Dimensions) -> Result<bool, DimensionError> {
        self.try_compare(other).map(Ordering::is_gt)
    }

    pub fn greater_equal(&self, other: &Dimensions) -> Result<bool, DimensionError> {
        self.try_compare(other).map(Ordering::is_ge)
    }

    fn same_or_mismatch(&self, other: &Dimensions) -> Result<Dimensions, DimensionError> {
        if self.dimensionally_equal(other) {
            Ok(self.clone())
        } else {
            Err(DimensionError::Mismatch {
                left: self.clone(),
                right: other.clone(),
            })
        }
    }

    fn merge<F>(&self, other: &Dimensions, op: F) -> Result<Dimensions, DimensionError>
    where
        F: Fn(Exponent, Exponent) -> Result<Exponent, DimensionError>,
    {
        let mut exponents = self.exponents.clone();
        for (dim, exp) in other.iter() {
            let entry = exponents.entry(dim).or_insert_with(Exponent::zero);
            *entry = op(*entry, exp)?;
        }
        exponents.retain(|_, exp| !exp.is_zero());
        Ok(Dimensions { exponents })
    }
}

impl PartialOrd for Dimensions {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.try_compare(other).ok()
    }
}

impl From<BaseDimension> for Dimensions {
    fn from(dim: BaseDimension) -> Self {
        Dimensions::single(dim)
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_dimensionless() {
            return Ok(());
        }
        let parts: Vec<String> = self
            .iter()
            .map(|(dim, exp)| format!("{}: {}", dim, format_exponent(exp)))
            .collect();
        write!(f, "{{{}}}", parts.join(", "))
    }
}

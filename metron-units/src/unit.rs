//! Unit representation with SI conversion data

use std::fmt;

use num_traits::One;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::ConfigError;
use crate::dimension::{mul_exponents, BaseDimension, DimensionError, Dimensions, Exponent};
use crate::parse::{self, UnitTerm};
use crate::registry::UnitTable;

/// Nesting limit for derived unit definitions
const MAX_DEPTH: usize = 64;

/// Errors raised while resolving, composing or converting units
#[derive(Debug, Error)]
pub enum UnitError {
    #[error("`{0}` is an unknown or unconfigured unit")]
    UnknownUnit(String),

    #[error("invalid exponent `{exponent}` in `{term}`")]
    InvalidExponent { term: String, exponent: String },

    #[error("cyclic unit definition: {}", .0.join(" -> "))]
    CyclicDefinition(Vec<String>),

    #[error("`{0}` has an additive offset and cannot be composed with other units")]
    OffsetInComposition(String),

    #[error("cannot convert `{from}` {from_dims} to `{to}` {to_dims}: incompatible dimensions")]
    IncompatibleDimensions {
        from: String,
        to: String,
        from_dims: Dimensions,
        to_dims: Dimensions,
    },

    #[error("unable to override `{0}`: it has already been registered")]
    AlreadyRegistered(String),

    #[error("`{0}` is not a known quantity type")]
    UnknownQuantityType(String),

    #[error("no fundamental unit with factor 1 and no offset is configured for {0}")]
    MissingSiUnit(BaseDimension),

    #[error(transparent)]
    Dimension(#[from] DimensionError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// A resolved unit: dimensions plus SI conversion data.
///
/// `value_si = (value + si_offset) * si_factor`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Unit {
    /// Expression the unit was built from, e.g. `"kg m^2 s^-2"` or `"N"`
    name: String,
    /// Parsed terms of `name`
    terms: Vec<UnitTerm>,
    /// Referenced units for derived units; empty for fundamental units
    composition: Vec<UnitTerm>,
    dimensions: Dimensions,
    /// SI equivalent, one term per base dimension
    si_terms: Vec<UnitTerm>,
    si_factor: f64,
    si_offset: f64,
}

impl Unit {
    /// The empty unit (pure numbers)
    pub fn dimensionless() -> Self {
        Unit {
            name: String::new(),
            terms: Vec::new(),
            composition: Vec::new(),
            dimensions: Dimensions::dimensionless(),
            si_terms: Vec::new(),
            si_factor: 1.0,
            si_offset: 0.0,
        }
    }

    /// Resolve a unit expression against a unit table.
    ///
    /// Derived units are expanded recursively. Only a lone, unprefixed
    /// fundamental unit to the first power keeps its additive offset; an
    /// offset unit anywhere else is rejected.
    pub fn from_expression(expr: &str, table: &UnitTable) -> Result<Unit, UnitError> {
        let terms = parse::parse_terms(expr)?;

        let mut resolver = Resolver {
            table,
            stack: Vec::new(),
        };
        let mut acc = Accumulator::new();
        for term in &terms {
            resolver.term(&term.symbol, term.exponent, &mut acc)?;
        }

        let lone = match terms.as_slice() {
            [only] if only.exponent.is_one() => Some(only.symbol.as_str()),
            _ => None,
        };

        let si_offset = lone
            .and_then(|symbol| table.base_unit(symbol))
            .map_or(0.0, |base| base.offset);
        if si_offset == 0.0 {
            if let Some(symbol) = acc.offset_symbols.first() {
                return Err(UnitError::OffsetInComposition(symbol.clone()));
            }
        }

        let composition = match lone {
            Some(symbol) if table.is_fundamental(symbol) => Vec::new(),
            Some(symbol) => match table.derived_unit(symbol) {
                Some(derived) => parse::parse_terms(&derived.composition)?,
                None => terms.clone(),
            },
            None => terms.clone(),
        };

        let si_terms = acc
            .dimensions
            .iter()
            .map(|(dim, exp)| {
                let symbol = table.si_symbol(dim).ok_or(UnitError::MissingSiUnit(dim))?;
                Ok(UnitTerm::new(symbol, exp))
            })
            .collect::<Result<Vec<_>, UnitError>>()?;

        Ok(Unit {
            name: parse::render_terms(&terms),
            terms,
            composition,
            dimensions: acc.dimensions,
            si_terms,
            si_factor: acc.factor,
            si_offset,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn terms(&self) -> &[UnitTerm] {
        &self.terms
    }

    pub fn composition(&self) -> &[UnitTerm] {
        &self.composition
    }

    pub fn dimensions(&self) -> &Dimensions {
        &self.dimensions
    }

    /// SI unit string, e.g. `"kg m^2 s^-2"`
    pub fn si_units(&self) -> String {
        parse::render_terms(&self.si_terms)
    }

    pub fn si_factor(&self) -> f64 {
        self.si_factor
    }

    pub fn si_offset(&self) -> f64 {
        self.si_offset
    }

    /// Check if this unit has an offset (non-proportional conversion)
    pub fn has_offset(&self) -> bool {
        self.si_offset != 0.0
    }

    pub fn is_dimensionless(&self) -> bool {
        self.dimensions.is_dimensionless()
    }

    /// Check if two units are dimensionally compatible (can be converted)
    pub fn is_compatible(&self, other: &Unit) -> bool {
        self.dimensions.dimensionally_equal(&other.dimensions)
    }

    /// Convert a value from this unit to SI
    pub fn to_si(&self, value: f64) -> f64 {
        (value + self.si_offset) * self.si_factor
    }

    /// Convert a value from SI to this unit
    pub fn from_si(&self, value_si: f64) -> f64 {
        value_si / self.si_factor - self.si_offset
    }

    /// Convert a value from this unit to another unit
    pub fn convert_to(&self, value: f64, target: &Unit) -> Result<f64, UnitError> {
        if !self.is_compatible(target) {
            return Err(UnitError::IncompatibleDimensions {
                from: self.name.clone(),
                to: target.name.clone(),
                from_dims: self.dimensions.clone(),
                to_dims: target.dimensions.clone(),
            });
        }
        Ok(target.from_si(self.to_si(value)))
    }

    /// Raise unit to a power (e.g. m -> m^2)
    pub fn power(&self, exponent: Exponent) -> Result<Unit, UnitError> {
        if exponent.is_one() {
            return Ok(self.clone());
        }
        self.reject_offset()?;

        let raise = |terms: &[UnitTerm]| -> Result<Vec<UnitTerm>, DimensionError> {
            terms
                .iter()
                .map(|t| Ok(UnitTerm::new(t.symbol.clone(), mul_exponents(t.exponent, exponent)?)))
                .collect()
        };

        Unit::composite(
            raise(&self.terms)?,
            self.dimensions.raise_power(exponent)?,
            raise(&self.si_terms)?,
            scale(self.si_factor, exponent),
        )
    }

    /// Multiply two units (e.g. N * m -> N m)
    pub fn multiply(&self, other: &Unit) -> Result<Unit, UnitError> {
        self.reject_offset()?;
        other.reject_offset()?;

        Unit::composite(
            self.terms.iter().chain(&other.terms).cloned().collect(),
            self.dimensions.combine_multiply(&other.dimensions)?,
            self.si_terms.iter().chain(&other.si_terms).cloned().collect(),
            self.si_factor * other.si_factor,
        )
    }

    /// Divide two units (e.g. m / s -> m s^-1)
    pub fn divide(&self, other: &Unit) -> Result<Unit, UnitError> {
        self.multiply(&other.power(-Exponent::one())?)
    }

    fn composite(
        terms: Vec<UnitTerm>,
        dimensions: Dimensions,
        si_terms: Vec<UnitTerm>,
        si_factor: f64,
    ) -> Result<Unit, UnitError> {
        let terms = parse::condense(terms)?;
        Ok(Unit {
            name: parse::render_terms(&terms),
            composition: terms.clone(),
            terms,
            dimensions,
            si_terms: parse::condense(si_terms)?,
            si_factor,
            si_offset: 0.0,
        })
    }

    fn reject_offset(&self) -> Result<(), UnitError> {
        if self.has_offset() {
            return Err(UnitError::OffsetInComposition(self.name.clone()));
        }
        Ok(())
    }
}

impl Default for Unit {
    fn default() -> Self {
        Self::dimensionless()
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Raise a scaling factor to a rational exponent
pub(crate) fn scale(factor: f64, exponent: Exponent) -> f64 {
    if exponent.is_integer() {
        if let Ok(n) = i32::try_from(exponent.to_integer()) {
            return factor.powi(n);
        }
    }
    factor.powf(*exponent.numer() as f64 / *exponent.denom() as f64)
}

struct Accumulator {
    dimensions: Dimensions,
    factor: f64,
    /// Terms that referenced an offset-bearing fundamental unit
    offset_symbols: Vec<String>,
}

impl Accumulator {
    fn new() -> Self {
        Accumulator {
            dimensions: Dimensions::dimensionless(),
            factor: 1.0,
            offset_symbols: Vec::new(),
        }
    }
}

/// Walks derived unit definitions, keeping the chain of units being
/// expanded so a cycle is reported instead of recursing forever.
struct Resolver<'t> {
    table: &'t UnitTable,
    stack: Vec<String>,
}

impl<'t> Resolver<'t> {
    fn expression(
        &mut self,
        expr: &str,
        power: Exponent,
        acc: &mut Accumulator,
    ) -> Result<(), UnitError> {
        for term in parse::parse_terms(expr)? {
            self.term(&term.symbol, mul_exponents(term.exponent, power)?, acc)?;
        }
        Ok(())
    }

    fn term(
        &mut self,
        symbol: &str,
        exponent: Exponent,
        acc: &mut Accumulator,
    ) -> Result<(), UnitError> {
        let table = self.table;
        let (prefix_factor, name) = table
            .split_prefix(symbol)
            .ok_or_else(|| UnitError::UnknownUnit(symbol.to_string()))?;

        acc.factor *= scale(prefix_factor, exponent);

        if let Some(base) = table.base_unit(name) {
            let dims = Dimensions::single(base.dimension).raise_power(exponent)?;
            acc.dimensions = acc.dimensions.combine_multiply(&dims)?;
            acc.factor *= scale(base.factor, exponent);
            if base.offset != 0.0 {
                acc.offset_symbols.push(symbol.to_string());
            }
            return Ok(());
        }

        let derived = table
            .derived_unit(name)
            .ok_or_else(|| UnitError::UnknownUnit(symbol.to_string()))?;

        if self.stack.len() >= MAX_DEPTH || self.stack.iter().any(|s| s == name) {
            let mut chain = self.stack.clone();
            chain.push(name.to_string());
            return Err(UnitError::CyclicDefinition(chain));
        }

        self.stack.push(name.to_string());
        acc.factor *= scale(derived.factor, exponent);
        let result = self.expression(&derived.composition, exponent, acc);
        self.stack.pop();
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BaseUnit, DerivedUnit, UnitConfig};
    use crate::dimension::BaseDimension;

    fn table() -> UnitTable {
        UnitTable::from_config(&UnitConfig::bundled().unwrap()).unwrap()
    }

    fn unit(expr: &str) -> Unit {
        Unit::from_expression(expr, &table()).unwrap()
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= 1e-9 * expected.abs().max(1.0),
            "expected {}, got {}",
            expected,
            actual
        );
    }

    #[test]
    fn test_fundamental_unit() {
        let ft = unit("ft");
        assert_eq!(ft.name(), "ft");
        assert_eq!(ft.dimensions(), &Dimensions::single(BaseDimension::Length));
        assert_close(ft.si_factor(), 0.3048);
        assert_eq!(ft.si_units(), "m");
        assert!(ft.composition().is_empty());
    }

    #[test]
    fn test_derived_unit() {
        let joule = unit("J");
        let expected = Dimensions::from_integers([
            (BaseDimension::Mass, 1),
            (BaseDimension::Length, 2),
            (BaseDimension::Time, -2),
        ]);
        assert_eq!(joule.dimensions(), &expected);
        assert_close(joule.si_factor(), 1.0);
        assert_eq!(joule.si_units(), "kg m^2 s^-2");
        assert_eq!(parse::render_terms(joule.composition()), "N m");
    }

    #[test]
    fn test_derived_factor_chain() {
        // gal -> L -> m^3
        assert_close(unit("gal").si_factor(), 0.003785411784);
        // psi -> lbf in^-2 -> slug ft s^-2 in^-2
        assert_close(unit("psi").si_factor(), 6894.757293168361);
    }

    #[test]
    fn test_prefixed_units() {
        assert_close(unit("km").si_factor(), 1000.0);
        assert_close(unit("mm^2").si_factor(), 1e-6);
        assert_close(unit("kPa").si_factor(), 1000.0);
        assert_close(unit("dam").si_factor(), 10.0);
        // direct names win over prefix splitting
        assert_close(unit("min").si_factor(), 60.0);
    }

    #[test]
    fn test_unknown_unit() {
        let err = Unit::from_expression("m furlong", &table()).unwrap_err();
        assert!(matches!(err, UnitError::UnknownUnit(ref u) if u == "furlong"));
    }

    #[test]
    fn test_temperature_offsets() {
        let celsius = unit("C");
        assert_close(celsius.si_offset(), 273.15);
        assert_close(celsius.to_si(100.0), 373.15);

        let fahrenheit = unit("F");
        assert_close(celsius.convert_to(100.0, &fahrenheit).unwrap(), 212.0);
        assert_close(fahrenheit.convert_to(32.0, &celsius).unwrap(), 0.0);
    }

    #[test]
    fn test_offset_rejected_in_composition() {
        for expr in ["C m", "C^2", "kC", "F s^-1"] {
            let err = Unit::from_expression(expr, &table()).unwrap_err();
            assert!(matches!(err, UnitError::OffsetInComposition(_)), "{}", expr);
        }
        // absolute scales without offset compose fine
        assert!(Unit::from_expression("K m", &table()).is_ok());
    }

    #[test]
    fn test_incompatible_conversion() {
        let err = unit("m").convert_to(1.0, &unit("s")).unwrap_err();
        assert!(matches!(err, UnitError::IncompatibleDimensions { .. }));

        let err = unit("K").convert_to(1.0, &unit("delta_K")).unwrap_err();
        assert!(matches!(err, UnitError::IncompatibleDimensions { .. }));
    }

    #[test]
    fn test_cyclic_definition() {
        let mut config = UnitConfig::default();
        config
            .base_units
            .try_insert(
                "m",
                BaseUnit { dimension: BaseDimension::Length, factor: 1.0, offset: 0.0 },
            )
            .unwrap();
        config.derived_units.try_insert("a", DerivedUnit::new("m b", 1.0)).unwrap();
        config.derived_units.try_insert("b", DerivedUnit::new("a", 2.0)).unwrap();
        let table = UnitTable::from_config(&config).unwrap();

        let err = Unit::from_expression("a", &table).unwrap_err();
        match err {
            UnitError::CyclicDefinition(chain) => assert_eq!(chain, vec!["a", "b", "a"]),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_fractional_exponent() {
        let root = unit("m^0.5");
        assert_eq!(root.dimensions().get(BaseDimension::Length), Exponent::new(1, 2));
        let root_ft = unit("ft^1/2");
        assert_close(root_ft.si_factor(), 0.3048f64.sqrt());
    }

    #[test]
    fn test_unit_power() {
        let m2 = unit("m").power(Exponent::from_integer(2)).unwrap();
        assert_eq!(m2.name(), "m^2");
        assert_eq!(m2.dimensions(), &Dimensions::from_integers([(BaseDimension::Length, 2)]));
    }

    #[test]
    fn test_unit_multiply_divide() {
        let ft = unit("ft");
        let s = unit("s");
        let velocity = ft.divide(&s).unwrap();
        assert_eq!(velocity.name(), "ft s^-1");
        assert_close(velocity.si_factor(), 0.3048);
        assert_eq!(velocity.si_units(), "m s^-1");

        let back = velocity.multiply(&s).unwrap();
        assert_eq!(back.name(), "ft");
        assert!(back.is_compatible(&ft));
    }

    #[test]
    fn test_offset_unit_algebra_rejected() {
        let celsius = unit("C");
        assert!(celsius.multiply(&unit("m")).is_err());
        assert!(celsius.power(Exponent::from_integer(2)).is_err());
        assert_eq!(celsius.power(Exponent::one()).unwrap(), celsius);
    }

    #[test]
    fn test_dimensionless_expression() {
        let ratio = unit("m m^-1");
        assert!(ratio.is_dimensionless());
        assert_close(unit("percent").si_factor(), 0.01);
        assert!(Unit::from_expression("", &table()).unwrap().is_dimensionless());
    }

    #[test]
    fn test_round_trip_conversion() {
        let pairs = [("ft", "m"), ("psi", "kPa"), ("F", "C"), ("BTU", "kWh"), ("mph", "km hr^-1")];
        for (a, b) in pairs {
            let (ua, ub) = (unit(a), unit(b));
            let there = ua.convert_to(42.5, &ub).unwrap();
            let back = ub.convert_to(there, &ua).unwrap();
            assert_close(back, 42.5);
        }
    }
}

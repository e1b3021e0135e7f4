//! Quantity type - a value with an associated unit

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::dimension::Dimensions;
use crate::registry::UnitRegistry;
use crate::system::UnitSystem;
use crate::unit::{Unit, UnitError};

/// A physical quantity: a numeric value with an associated unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quantity {
    value: f64,
    unit: Unit,
}

impl Quantity {
    pub fn new(value: f64, unit: Unit) -> Self {
        Quantity { value, unit }
    }

    /// Create a quantity from a unit expression such as `"kg m s^-2"`
    pub fn with_units(value: f64, units: &str, registry: &UnitRegistry) -> Result<Self, UnitError> {
        Ok(Quantity::new(value, registry.parse(units)?))
    }

    /// Create a quantity in the canonical units of a quantity type,
    /// e.g. `"Pressure"` gives pascals
    pub fn of_type(
        value: f64,
        quantity_type: &str,
        registry: &UnitRegistry,
    ) -> Result<Self, UnitError> {
        let units = registry.quantity_units(quantity_type)?;
        Self::with_units(value, units, registry)
    }

    /// Create a dimensionless quantity (pure number)
    pub fn dimensionless(value: f64) -> Self {
        Quantity::new(value, Unit::dimensionless())
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn unit(&self) -> &Unit {
        &self.unit
    }

    pub fn units(&self) -> &str {
        self.unit.name()
    }

    pub fn dimensions(&self) -> &Dimensions {
        self.unit.dimensions()
    }

    /// The value expressed in SI units
    pub fn si_value(&self) -> f64 {
        self.unit.to_si(self.value)
    }

    pub fn si_units(&self) -> String {
        self.unit.si_units()
    }

    pub fn is_dimensionless(&self) -> bool {
        self.unit.is_dimensionless()
    }

    pub fn is_compatible(&self, other: &Quantity) -> bool {
        self.unit.is_compatible(&other.unit)
    }

    /// Convert to the units named by an expression
    pub fn to(&self, target_units: &str, registry: &UnitRegistry) -> Result<Quantity, UnitError> {
        self.to_unit(&registry.parse(target_units)?)
    }

    /// Convert to another unit
    pub fn to_unit(&self, target: &Unit) -> Result<Quantity, UnitError> {
        let value = self.unit.convert_to(self.value, target)?;
        Ok(Quantity::new(value, target.clone()))
    }

    /// Re-express in a unit system's base units
    pub fn to_system(&self, system: &UnitSystem) -> Result<Quantity, UnitError> {
        system.convert(self)
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, \"{}\")", self.value, self.unit)
    }
}

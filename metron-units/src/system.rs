//! Unit systems
//!
//! A [`UnitSystem`] picks one fundamental unit per base dimension, in
//! canonical dimension order, and converts quantities into composites of
//! those units.

use std::sync::Arc;

use num_traits::One;
use thiserror::Error;
use tracing::debug;

use crate::dimension::{BaseDimension, Dimensions};
use crate::quantity::Quantity;
use crate::registry::UnitRegistry;
use crate::unit::{Unit, UnitError};

const DEFAULT_SYSTEM: &str = "SI";

/// Errors raised while building a unit system
#[derive(Debug, Error)]
pub enum UnitSystemError {
    #[error("a unit system takes a predefined system name or a name with base units, not both")]
    ExcessiveParameters,

    #[error("base units list must have {expected} entries, received {received}")]
    BaseUnitsLength { expected: usize, received: usize },

    #[error("`{0}` is not a fundamental unit")]
    NotFundamental(String),

    #[error("`{unit}` assigns {dimension} a second time")]
    DuplicateDimension { dimension: BaseDimension, unit: String },

    #[error("position {position} expects a {expected} unit, received `{unit}` ({received})")]
    WrongPosition {
        position: usize,
        expected: BaseDimension,
        received: BaseDimension,
        unit: String,
    },

    #[error("`{0}` is not a predefined unit system")]
    UnknownUnitSystem(String),

    #[error(transparent)]
    Unit(#[from] UnitError),
}

/// One fundamental unit per base dimension
#[derive(Debug, Clone)]
pub struct UnitSystem {
    name: Option<String>,
    /// Indexed by `BaseDimension::index`
    base_units: Vec<Arc<Unit>>,
}

impl UnitSystem {
    /// The SI system from the registry's predefined systems
    pub fn si(registry: &UnitRegistry) -> Result<Self, UnitSystemError> {
        Self::predefined(DEFAULT_SYSTEM, registry)
    }

    /// A predefined system such as `"SI"`, `"CGS"` or `"BT"`
    pub fn predefined(unit_sys: &str, registry: &UnitRegistry) -> Result<Self, UnitSystemError> {
        Self::builder().unit_sys(unit_sys).build(registry)
    }

    /// A custom system from base unit names in canonical dimension order
    pub fn custom<S: AsRef<str>>(
        name: Option<&str>,
        base_units: &[S],
        registry: &UnitRegistry,
    ) -> Result<Self, UnitSystemError> {
        let names = base_units.iter().map(|u| u.as_ref().to_string());
        let mut builder = Self::builder().base_units(names);
        if let Some(name) = name {
            builder = builder.name(name);
        }
        builder.build(registry)
    }

    pub fn builder() -> UnitSystemBuilder {
        UnitSystemBuilder::default()
    }

    /// System name; `None` for an unnamed custom system
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Base unit names in canonical dimension order
    pub fn base_units(&self) -> Vec<&str> {
        self.base_units.iter().map(|u| u.name()).collect()
    }

    /// The unit this system uses for a base dimension
    pub fn unit(&self, dim: BaseDimension) -> &Arc<Unit> {
        &self.base_units[dim.index()]
    }

    /// Express a dimension vector in this system's base units,
    /// e.g. `{MASS: 1, LENGTH: 2, TIME: -2}` in BT is `slug ft^2 s^-2`
    pub fn composite_unit(&self, dimensions: &Dimensions) -> Result<Unit, UnitError> {
        if let Some(dim) = dimensions.single_dimension() {
            return Ok(Unit::clone(self.unit(dim)));
        }
        dimensions
            .iter()
            .try_fold(Unit::dimensionless(), |acc, (dim, exp)| {
                let base = self.unit(dim);
                if exp.is_one() {
                    acc.multiply(base)
                } else {
                    acc.multiply(&base.power(exp)?)
                }
            })
    }

    /// Re-express a quantity in this system's units
    pub fn convert(&self, quantity: &Quantity) -> Result<Quantity, UnitError> {
        let target = self.composite_unit(quantity.dimensions())?;
        let value = target.from_si(quantity.si_value());
        debug!(
            system = self.name().unwrap_or("custom"),
            from = quantity.units(),
            to = target.name(),
            "converted quantity"
        );
        Ok(Quantity::new(value, target))
    }
}

/// Builder for [`UnitSystem`].
///
/// Supply either `unit_sys` (a predefined system) or `base_units`,
/// optionally with a `name`. With neither, the SI system is built.
#[derive(Debug, Clone, Default)]
pub struct UnitSystemBuilder {
    name: Option<String>,
    base_units: Option<Vec<String>>,
    unit_sys: Option<String>,
}

impl UnitSystemBuilder {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn base_units<I, S>(mut self, units: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.base_units = Some(units.into_iter().map(Into::into).collect());
        self
    }

    pub fn unit_sys(mut self, unit_sys: impl Into<String>) -> Self {
        self.unit_sys = Some(unit_sys.into());
        self
    }

    pub fn build(self, registry: &UnitRegistry) -> Result<UnitSystem, UnitSystemError> {
        let (name, names) = match (self.name, self.base_units, self.unit_sys) {
            (Some(_), _, Some(_)) | (_, Some(_), Some(_)) => {
                return Err(UnitSystemError::ExcessiveParameters)
            }
            (name, Some(units), None) => (name, units),
            // a name without base units names nothing; fall back to SI
            (_, None, unit_sys) => {
                let unit_sys = unit_sys.unwrap_or_else(|| DEFAULT_SYSTEM.to_string());
                let units = registry
                    .unit_system(&unit_sys)
                    .ok_or_else(|| UnitSystemError::UnknownUnitSystem(unit_sys.clone()))?
                    .to_vec();
                (Some(unit_sys), units)
            }
        };

        let base_units = validate(&names, registry)?;
        debug!(system = name.as_deref().unwrap_or("custom"), units = ?names, "built unit system");
        Ok(UnitSystem { name, base_units })
    }
}

/// Check a base unit list against the canonical dimension order
fn validate(names: &[String], registry: &UnitRegistry) -> Result<Vec<Arc<Unit>>, UnitSystemError> {
    if names.len() != BaseDimension::COUNT {
        return Err(UnitSystemError::BaseUnitsLength {
            expected: BaseDimension::COUNT,
            received: names.len(),
        });
    }

    let mut seen = [false; BaseDimension::COUNT];
    let mut units = Vec::with_capacity(names.len());
    for (position, (name, expected)) in names.iter().zip(BaseDimension::ALL).enumerate() {
        let base = registry
            .table()
            .base_unit(name)
            .ok_or_else(|| UnitSystemError::NotFundamental(name.clone()))?;

        let received = base.dimension;
        if seen[received.index()] {
            return Err(UnitSystemError::DuplicateDimension {
                dimension: received,
                unit: name.clone(),
            });
        }
        seen[received.index()] = true;

        if received != expected {
            return Err(UnitSystemError::WrongPosition {
                position,
                expected,
                received,
                unit: name.clone(),
            });
        }

        units.push(registry.unit(name)?);
    }
    Ok(units)
}

//! Metron Units - Dimensional Analysis and Unit Conversion
//!
//! Represents physical units as dimension vectors plus SI conversion data,
//! checks that operations between them are dimensionally consistent, and
//! converts values between units and unit systems.
//!
//! Pieces:
//! - [`Dimensions`]: sparse exponent vector over the ten [`BaseDimension`]s
//! - [`Unit`]: a resolved unit expression (`"kg m^2 s^-2"`, `"psi"`, `"km"`)
//! - [`UnitRegistry`]: the namespace of named units, loaded from a [`UnitConfig`]
//! - [`UnitSystem`]: one fundamental unit per base dimension (SI, CGS, BT or custom)
//! - [`Quantity`]: a value paired with a unit
//!
//! ```ignore
//! let registry = UnitRegistry::new()?;
//! let q = Quantity::with_units(1.0, "ft", &registry)?;
//! let si = UnitSystem::si(&registry)?;
//! assert_eq!(si.convert(&q)?.units(), "m");
//! ```

mod config;
mod dimension;
mod parse;
mod quantity;
mod registry;
mod system;
mod unit;

pub use config::{BaseUnit, ConfigError, DerivedUnit, Table, UnitConfig};
pub use dimension::{BaseDimension, DimensionError, Dimensions, Exponent, MAX_EXPONENT};
pub use parse::{format_exponent, parse_exponent, parse_terms, UnitTerm};
pub use quantity::Quantity;
pub use registry::{UnitRegistry, UnitTable};
pub use system::{UnitSystem, UnitSystemBuilder, UnitSystemError};
pub use unit::{Unit, UnitError};

//! Unit namespace
//!
//! [`UnitTable`] holds the raw definitions (fundamental units, derived
//! units, prefixes) that unit expressions are resolved against.
//! [`UnitRegistry`] owns one resolved [`Unit`] per defined name and hands
//! out shared references to them.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, trace};

use crate::config::{BaseUnit, DerivedUnit, Table, UnitConfig};
use crate::dimension::BaseDimension;
use crate::unit::{Unit, UnitError};

/// Unit definitions that expressions are resolved against
#[derive(Debug, Clone, Default)]
pub struct UnitTable {
    base_units: Table<BaseUnit>,
    derived_units: Table<DerivedUnit>,
    /// Prefixes, longest first
    multipliers: Vec<(String, f64)>,
}

impl UnitTable {
    /// Copy the unit sections out of a configuration.
    ///
    /// Fails if a name is defined both as a fundamental and a derived unit,
    /// or if a dimension used by a fundamental unit has no SI unit (factor 1,
    /// no offset) to express it.
    pub fn from_config(config: &UnitConfig) -> Result<Self, UnitError> {
        if let Some(name) = config
            .derived_units
            .keys()
            .find(|name| config.base_units.contains_key(name))
        {
            return Err(UnitError::AlreadyRegistered(name.to_string()));
        }

        let mut multipliers: Vec<(String, f64)> = config
            .multipliers
            .iter()
            .map(|(prefix, factor)| (prefix.to_string(), *factor))
            .collect();
        multipliers.sort_by(|a, b| b.0.len().cmp(&a.0.len()));

        let table = UnitTable {
            base_units: config.base_units.clone(),
            derived_units: config.derived_units.clone(),
            multipliers,
        };
        if let Some(dim) = table
            .base_units
            .iter()
            .map(|(_, unit)| unit.dimension)
            .find(|&dim| table.si_symbol(dim).is_none())
        {
            return Err(UnitError::MissingSiUnit(dim));
        }
        Ok(table)
    }

    pub fn base_unit(&self, name: &str) -> Option<&BaseUnit> {
        self.base_units.get(name)
    }

    pub fn derived_unit(&self, name: &str) -> Option<&DerivedUnit> {
        self.derived_units.get(name)
    }

    /// Whether `name` may represent a base dimension in a unit system
    pub fn is_fundamental(&self, name: &str) -> bool {
        self.base_units.contains_key(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.base_units.contains_key(name) || self.derived_units.contains_key(name)
    }

    pub fn base_units(&self) -> &Table<BaseUnit> {
        &self.base_units
    }

    pub fn derived_units(&self) -> &Table<DerivedUnit> {
        &self.derived_units
    }

    pub fn multiplier(&self, prefix: &str) -> Option<f64> {
        self.multipliers
            .iter()
            .find(|(p, _)| p == prefix)
            .map(|(_, factor)| *factor)
    }

    /// Register a custom derived unit.
    ///
    /// Fails if the name is already a fundamental or derived unit, or if
    /// the composition does not resolve; the table is left untouched
    /// either way.
    pub fn register(
        &mut self,
        name: &str,
        composition: &str,
        factor: f64,
    ) -> Result<(), UnitError> {
        if self.base_units.contains_key(name) {
            return Err(UnitError::AlreadyRegistered(name.to_string()));
        }
        self.derived_units
            .try_insert(name, DerivedUnit::new(composition, factor))
            .map_err(|_| UnitError::AlreadyRegistered(name.to_string()))?;

        if let Err(e) = Unit::from_expression(name, self) {
            self.derived_units.pop();
            return Err(e);
        }

        debug!(unit = name, composition, factor, "registered custom unit");
        Ok(())
    }

    /// Split a symbol into (prefix factor, known unit name).
    ///
    /// A symbol that is itself a known unit is never split. Otherwise the
    /// longest prefix leaving a known unit wins.
    pub fn split_prefix<'s>(&self, symbol: &'s str) -> Option<(f64, &'s str)> {
        if self.contains(symbol) {
            return Some((1.0, symbol));
        }
        self.multipliers.iter().find_map(|(prefix, factor)| {
            symbol
                .strip_prefix(prefix.as_str())
                .filter(|rest| self.contains(rest))
                .map(|rest| (*factor, rest))
        })
    }

    /// The SI unit for a base dimension: the first fundamental unit of that
    /// dimension with factor 1 and no offset
    pub fn si_symbol(&self, dim: BaseDimension) -> Option<&str> {
        self.base_units
            .iter()
            .find(|(_, unit)| unit.dimension == dim && unit.factor == 1.0 && unit.offset == 0.0)
            .map(|(name, _)| name)
    }
}

/// Registry of named units.
///
/// Names are unique and the registry is append-only. Iteration follows
/// registration order.
#[derive(Debug, Clone)]
pub struct UnitRegistry {
    table: UnitTable,
    unit_systems: Table<Vec<String>>,
    quantity_map: Table<String>,
    units: Vec<Arc<Unit>>,
    index: HashMap<String, usize>,
}

impl UnitRegistry {
    /// Registry over the built-in configuration
    pub fn new() -> Result<Self, UnitError> {
        Self::from_config(UnitConfig::bundled()?)
    }

    pub fn from_config(config: UnitConfig) -> Result<Self, UnitError> {
        Self::with_units(config, Table::new())
    }

    /// Build a registry from a configuration plus extra derived units.
    ///
    /// Extra units are bound first, then the configuration's fundamental
    /// units, then its derived units. A name defined twice fails.
    pub fn with_units(config: UnitConfig, other: Table<DerivedUnit>) -> Result<Self, UnitError> {
        let mut table = UnitTable::from_config(&config)?;
        let mut custom = Vec::with_capacity(other.len());
        for (name, unit) in other.iter() {
            if table.is_fundamental(name) {
                return Err(UnitError::AlreadyRegistered(name.to_string()));
            }
            table
                .derived_units
                .try_insert(name, unit.clone())
                .map_err(|_| UnitError::AlreadyRegistered(name.to_string()))?;
            custom.push(name.to_string());
        }

        let mut registry = UnitRegistry {
            table,
            unit_systems: config.unit_systems,
            quantity_map: config.api_quantity_map,
            units: Vec::new(),
            index: HashMap::new(),
        };

        let names: Vec<String> = custom
            .into_iter()
            .chain(config.base_units.keys().map(str::to_string))
            .chain(config.derived_units.keys().map(str::to_string))
            .collect();
        for name in names {
            let unit = Unit::from_expression(&name, &registry.table)?;
            registry.bind(name, unit)?;
        }

        debug!(
            units = registry.units.len(),
            systems = registry.unit_systems.len(),
            "unit registry loaded"
        );
        Ok(registry)
    }

    /// Build a registry straight from a unit table, binding every
    /// fundamental and derived unit it defines
    pub fn from_table(table: UnitTable) -> Result<Self, UnitError> {
        let mut registry = UnitRegistry {
            table,
            unit_systems: Table::new(),
            quantity_map: Table::new(),
            units: Vec::new(),
            index: HashMap::new(),
        };
        let names: Vec<String> = registry
            .table
            .base_units
            .keys()
            .chain(registry.table.derived_units.keys())
            .map(str::to_string)
            .collect();
        for name in names {
            let unit = Unit::from_expression(&name, &registry.table)?;
            registry.bind(name, unit)?;
        }
        Ok(registry)
    }

    /// Look up a registered unit by name
    pub fn get(&self, name: &str) -> Option<&Arc<Unit>> {
        self.index.get(name).map(|&i| &self.units[i])
    }

    /// Look up a registered unit, failing for unknown names
    pub fn unit(&self, name: &str) -> Result<Arc<Unit>, UnitError> {
        self.get(name)
            .cloned()
            .ok_or_else(|| UnitError::UnknownUnit(name.to_string()))
    }

    /// Resolve an ad hoc unit expression such as `"ft s^-1"`
    pub fn parse(&self, expr: &str) -> Result<Unit, UnitError> {
        Unit::from_expression(expr, &self.table)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Register a custom derived unit and bind it under its name
    pub fn register(
        &mut self,
        name: &str,
        composition: &str,
        factor: f64,
    ) -> Result<Arc<Unit>, UnitError> {
        if self.contains(name) {
            return Err(UnitError::AlreadyRegistered(name.to_string()));
        }
        self.table.register(name, composition, factor)?;
        let unit = Unit::from_expression(name, &self.table)?;
        self.bind(name.to_string(), unit)
    }

    /// Bind an already-built unit under a new name (e.g. an alias for a
    /// composite like `ft s^-1`)
    pub fn insert(&mut self, name: &str, unit: Unit) -> Result<Arc<Unit>, UnitError> {
        self.bind(name.to_string(), unit)
    }

    fn bind(&mut self, name: String, unit: Unit) -> Result<Arc<Unit>, UnitError> {
        if self.index.contains_key(&name) {
            return Err(UnitError::AlreadyRegistered(name));
        }
        trace!(unit = %name, dimensions = %unit.dimensions(), "binding unit");
        let unit = Arc::new(unit);
        self.index.insert(name, self.units.len());
        self.units.push(Arc::clone(&unit));
        Ok(unit)
    }

    /// All registered units in registration order. Each call starts a
    /// fresh traversal.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Unit>> {
        self.units.iter()
    }

    /// Registered names in registration order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        let mut names: Vec<(&str, usize)> =
            self.index.iter().map(|(name, &i)| (name.as_str(), i)).collect();
        names.sort_by_key(|&(_, i)| i);
        names.into_iter().map(|(name, _)| name)
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn table(&self) -> &UnitTable {
        &self.table
    }

    /// Base unit names of a predefined unit system
    pub fn unit_system(&self, name: &str) -> Option<&[String]> {
        self.unit_systems.get(name).map(Vec::as_slice)
    }

    pub fn unit_system_names(&self) -> impl Iterator<Item = &str> {
        self.unit_systems.keys()
    }

    /// Canonical unit string for a quantity type, e.g. `"Pressure"` -> `"Pa"`
    pub fn quantity_units(&self, quantity_type: &str) -> Result<&str, UnitError> {
        self.quantity_map
            .get(quantity_type)
            .map(String::as_str)
            .ok_or_else(|| UnitError::UnknownQuantityType(quantity_type.to_string()))
    }
}

impl<'a> IntoIterator for &'a UnitRegistry {
    type Item = &'a Arc<Unit>;
    type IntoIter = std::slice::Iter<'a, Arc<Unit>>;

    fn into_iter(self) -> Self::IntoIter {
        self.units.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dimension::Dimensions;

    fn registry() -> UnitRegistry {
        UnitRegistry::new().unwrap()
    }

    #[test]
    fn test_loads_every_configured_unit() {
        let config = UnitConfig::bundled().unwrap();
        let reg = registry();
        assert_eq!(reg.len(), config.base_units.len() + config.derived_units.len());
        assert!(reg.contains("kg"));
        assert!(reg.contains("BTU"));
    }

    #[test]
    fn test_lookup() {
        let reg = registry();
        let kg = reg.unit("kg").unwrap();
        assert_eq!(kg.name(), "kg");
        assert_eq!(*kg, reg.parse("kg").unwrap());
        assert!(matches!(reg.unit("furlong"), Err(UnitError::UnknownUnit(_))));
    }

    #[test]
    fn test_register_custom_unit() {
        let mut reg = registry();
        let q = reg.register("Q", "N m", 1.0).unwrap();
        assert_eq!(
            q.dimensions(),
            &Dimensions::from_integers([
                (BaseDimension::Mass, 1),
                (BaseDimension::Length, 2),
                (BaseDimension::Time, -2),
            ])
        );
        let joule = reg.unit("J").unwrap();
        assert!((q.convert_to(1.0, &joule).unwrap() - 1.0).abs() < 1e-12);
        assert!(reg.table().derived_unit("Q").is_some());
    }

    #[test]
    fn test_register_collision_leaves_existing() {
        let mut reg = registry();
        let before = reg.unit("N").unwrap();

        assert!(matches!(reg.register("N", "kg", 5.0), Err(UnitError::AlreadyRegistered(_))));
        assert!(matches!(reg.register("kg", "g", 1000.0), Err(UnitError::AlreadyRegistered(_))));

        assert_eq!(reg.unit("N").unwrap(), before);
        assert_eq!(reg.table().derived_unit("N").unwrap().composition, "kg m s^-2");
    }

    #[test]
    fn test_register_unresolvable_rolls_back() {
        let mut table = UnitTable::from_config(&UnitConfig::bundled().unwrap()).unwrap();
        let count = table.derived_units().len();
        assert!(table.register("bogus", "furlong fortnight^-1", 1.0).is_err());
        assert_eq!(table.derived_units().len(), count);
        assert!(!table.contains("bogus"));
    }

    #[test]
    fn test_table_registration_before_registry() {
        let mut table = UnitTable::from_config(&UnitConfig::bundled().unwrap()).unwrap();
        table.register("fps", "ft s^-1", 1.0).unwrap();
        let reg = UnitRegistry::from_table(table).unwrap();
        assert!((reg.unit("fps").unwrap().si_factor() - 0.3048).abs() < 1e-12);
    }

    #[test]
    fn test_insert_alias() {
        let mut reg = registry();
        let fps = reg.parse("ft s^-1").unwrap();
        reg.insert("foot_per_sec", fps.clone()).unwrap();
        assert_eq!(*reg.unit("foot_per_sec").unwrap(), fps);

        assert!(matches!(
            reg.insert("foot_per_sec", fps),
            Err(UnitError::AlreadyRegistered(_))
        ));
    }

    #[test]
    fn test_extra_units_bound_first() {
        let mut other = Table::new();
        other.try_insert("knot", DerivedUnit::new("m s^-1", 0.514444)).unwrap();
        let reg = UnitRegistry::with_units(UnitConfig::bundled().unwrap(), other).unwrap();
        assert_eq!(reg.iter().next().unwrap().name(), "knot");
        assert_eq!(reg.names().next(), Some("knot"));
    }

    #[test]
    fn test_extra_unit_collision() {
        let mut other = Table::new();
        other.try_insert("J", DerivedUnit::new("N m", 1.0)).unwrap();
        let err = UnitRegistry::with_units(UnitConfig::bundled().unwrap(), other).unwrap_err();
        assert!(matches!(err, UnitError::AlreadyRegistered(ref name) if name == "J"));
    }

    #[test]
    fn test_missing_si_unit_rejected() {
        let config = UnitConfig::from_json_str(
            r#"{"base_units": {"ft": {"type": "LENGTH", "factor": 0.3048}}}"#,
        )
        .unwrap();
        assert!(matches!(
            UnitTable::from_config(&config),
            Err(UnitError::MissingSiUnit(BaseDimension::Length))
        ));
    }

    #[test]
    fn test_iteration_is_restartable() {
        let reg = registry();
        let first: Vec<String> = reg.iter().map(|u| u.name().to_string()).collect();
        let second: Vec<String> = (&reg).into_iter().map(|u| u.name().to_string()).collect();
        assert_eq!(first, second);
        assert_eq!(first.len(), reg.len());
    }

    #[test]
    fn test_prefix_resolution() {
        let reg = registry();
        let table = reg.table();
        assert_eq!(table.split_prefix("km"), Some((1e3, "m")));
        assert_eq!(table.split_prefix("dam"), Some((1e1, "m")));
        assert_eq!(table.split_prefix("min"), Some((1.0, "min")));
        assert_eq!(table.split_prefix("xyz"), None);
    }

    #[test]
    fn test_si_symbols() {
        let reg = registry();
        assert_eq!(reg.table().si_symbol(BaseDimension::Mass), Some("kg"));
        assert_eq!(reg.table().si_symbol(BaseDimension::TemperatureDifference), Some("delta_K"));
    }

    #[test]
    fn test_quantity_units() {
        let reg = registry();
        assert_eq!(reg.quantity_units("Pressure").unwrap(), "Pa");
        assert!(matches!(
            reg.quantity_units("Happiness"),
            Err(UnitError::UnknownQuantityType(_))
        ));
    }
}

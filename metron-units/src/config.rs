//! Configuration tables
//!
//! The registry is populated from already-parsed tables. Loading them from
//! disk is the host's job; the built-in table is compiled in from
//! `cfg.json`.

use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;

use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

use crate::dimension::BaseDimension;

const BUNDLED_CONFIG: &str = include_str!("cfg.json");

/// Errors raised while reading a configuration document
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid unit configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Fundamental unit: one base dimension plus SI factor and offset.
///
/// `value_si = (value + offset) * factor`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BaseUnit {
    #[serde(rename = "type")]
    pub dimension: BaseDimension,
    pub factor: f64,
    #[serde(default)]
    pub offset: f64,
}

/// Derived unit: a composition of other units and a scaling factor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedUnit {
    pub composition: String,
    #[serde(default = "unit_factor")]
    pub factor: f64,
}

impl DerivedUnit {
    pub fn new(composition: impl Into<String>, factor: f64) -> Self {
        DerivedUnit {
            composition: composition.into(),
            factor,
        }
    }
}

fn unit_factor() -> f64 {
    1.0
}

/// Name-keyed table that keeps insertion order and refuses duplicate keys
#[derive(Debug, Clone, PartialEq)]
pub struct Table<T> {
    entries: Vec<(String, T)>,
    index: HashMap<String, usize>,
}

impl<T> Table<T> {
    pub fn new() -> Self {
        Table {
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&T> {
        self.index.get(key).map(|&i| &self.entries[i].1)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    /// Insert a new entry. Gives the value back if the key is already taken.
    pub fn try_insert(&mut self, key: impl Into<String>, value: T) -> Result<(), T> {
        let key = key.into();
        if self.index.contains_key(&key) {
            return Err(value);
        }
        self.index.insert(key.clone(), self.entries.len());
        self.entries.push((key, value));
        Ok(())
    }

    /// Remove the most recently inserted entry
    pub fn pop(&mut self) -> Option<(String, T)> {
        let (key, value) = self.entries.pop()?;
        self.index.remove(&key);
        Some((key, value))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &T)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T> Default for Table<T> {
    fn default() -> Self {
        Self::new()
    }
}

struct TableVisitor<T>(PhantomData<T>);

impl<'de, T: Deserialize<'de>> Visitor<'de> for TableVisitor<T> {
    type Value = Table<T>;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a map of unique names")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
        let mut table = Table::new();
        while let Some((key, value)) = map.next_entry::<String, T>()? {
            if table.try_insert(key.as_str(), value).is_err() {
                return Err(serde::de::Error::custom(format!("duplicate key `{}`", key)));
            }
        }
        Ok(table)
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Table<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(TableVisitor(PhantomData))
    }
}

/// All sections of a unit configuration document
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UnitConfig {
    /// Prefix symbol -> scaling factor
    #[serde(default)]
    pub multipliers: Table<f64>,
    /// System name -> base unit names in canonical dimension order
    #[serde(default)]
    pub unit_systems: Table<Vec<String>>,
    /// Quantity type -> canonical unit string
    #[serde(default)]
    pub api_quantity_map: Table<String>,
    #[serde(default)]
    pub base_units: Table<BaseUnit>,
    #[serde(default)]
    pub derived_units: Table<DerivedUnit>,
}

impl UnitConfig {
    /// Parse a JSON configuration document
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(s)?)
    }

    /// The built-in unit table
    pub fn bundled() -> Result<Self, ConfigError> {
        Self::from_json_str(BUNDLED_CONFIG)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bundled_sections() {
        let config = UnitConfig::bundled().unwrap();
        assert!(!config.multipliers.is_empty());
        assert!(config.unit_systems.contains_key("SI"));
        assert!(config.api_quantity_map.contains_key("Pressure"));
        assert_eq!(config.base_units.get("ft").map(|u| u.factor), Some(0.3048));
        assert_eq!(config.derived_units.get("J").map(|u| u.composition.as_str()), Some("N m"));
    }

    #[test]
    fn test_systems_cover_every_dimension() {
        let config = UnitConfig::bundled().unwrap();
        for (_, units) in config.unit_systems.iter() {
            assert_eq!(units.len(), BaseDimension::COUNT);
        }
    }

    #[test]
    fn test_table_preserves_order() {
        let config = UnitConfig::from_json_str(
            r#"{"base_units": {
                "s": {"type": "TIME", "factor": 1.0},
                "kg": {"type": "MASS", "factor": 1.0},
                "m": {"type": "LENGTH", "factor": 1.0}
            }}"#,
        )
        .unwrap();
        let names: Vec<&str> = config.base_units.keys().collect();
        assert_eq!(names, vec!["s", "kg", "m"]);
    }

    #[test]
    fn test_duplicate_key_rejected() {
        let result = UnitConfig::from_json_str(
            r#"{"derived_units": {
                "N": {"composition": "kg m s^-2", "factor": 1},
                "N": {"composition": "kg m s^-2", "factor": 2}
            }}"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_dimension_rejected() {
        let result = UnitConfig::from_json_str(
            r#"{"base_units": {"furlong": {"type": "DISTANCE", "factor": 201.168}}}"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_offset_defaults_to_zero() {
        let config = UnitConfig::from_json_str(
            r#"{"base_units": {"K": {"type": "TEMPERATURE", "factor": 1}}}"#,
        )
        .unwrap();
        assert_eq!(config.base_units.get("K").unwrap().offset, 0.0);
    }

    #[test]
    fn test_table_try_insert_and_pop() {
        let mut table: Table<f64> = Table::new();
        assert!(table.try_insert("k", 1e3).is_ok());
        assert_eq!(table.try_insert("k", 2e3), Err(2e3));
        assert_eq!(table.get("k"), Some(&1e3));
        assert_eq!(table.pop(), Some(("k".to_string(), 1e3)));
        assert!(!table.contains_key("k"));
    }
}

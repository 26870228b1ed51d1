//! Configuration document and device-scoped bound configuration.
//!
//! The document is a hierarchical TOML mapping with two well-known sections:
//! `experiment.info` and `device.<name>.<…>`. Binding a device name to the
//! document never fails: an absent section yields an empty [`BoundConfig`].
//!
//! ## Flat key search order
//!
//! [`BoundConfig::find`] walks the bound mapping **pre-order, depth-first, in
//! source insertion order**. At each table the entries are visited in the
//! order they were written; an entry whose key matches wins before the search
//! descends into that entry's value. Arrays are searched element by element.
//! When the same key name appears in more than one nested section, the first
//! one in this order is returned; [`BoundConfig::occurrences`] lets callers
//! detect the ambiguity and [`BoundConfig::require_path`] addresses a value
//! unambiguously.

use serde::de::DeserializeOwned;
use toml::{Table, Value};

use crate::error::{ConfigError, LabError, MissingConfigKey};
use crate::experiment::ExperimentInfo;

/// Name of the top-level table holding per-device sections.
pub const DEVICE_SECTION: &str = "device";

/// A parsed configuration document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigDocument {
    root: Table,
}

impl ConfigDocument {
    /// Wrap an already parsed mapping.
    #[must_use]
    pub fn from_table(root: Table) -> Self {
        Self { root }
    }

    /// Parse a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] if the text is not valid TOML.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let root: Table = toml::from_str(text)?;
        Ok(Self { root })
    }

    /// Borrow the whole mapping.
    #[must_use]
    pub fn as_table(&self) -> &Table {
        &self.root
    }

    /// Extract the `device.<device_name>` section.
    ///
    /// Returns an empty binding when the section (or the whole `device`
    /// table) is absent, or when it is not a table.
    #[must_use]
    pub fn bind(&self, device_name: &str) -> BoundConfig {
        let table = self
            .root
            .get(DEVICE_SECTION)
            .and_then(Value::as_table)
            .and_then(|devices| devices.get(device_name))
            .and_then(Value::as_table)
            .cloned()
            .unwrap_or_default();
        BoundConfig::new(device_name, table)
    }

    /// Names of all `device.<name>` sections, in document order.
    #[must_use]
    pub fn device_names(&self) -> Vec<&str> {
        self.root
            .get(DEVICE_SECTION)
            .and_then(Value::as_table)
            .map(|devices| devices.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Read the `experiment.info` section.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] if the section exists but does
    /// not have the expected shape.
    pub fn experiment_info(&self) -> Result<Option<ExperimentInfo>, ConfigError> {
        let Some(info) = self
            .root
            .get("experiment")
            .and_then(Value::as_table)
            .and_then(|experiment| experiment.get("info"))
        else {
            return Ok(None);
        };
        info.clone()
            .try_into()
            .map(Some)
            .map_err(|err: toml::de::Error| ConfigError::InvalidValue {
                key: "experiment.info".to_string(),
                reason: err.message().to_string(),
            })
    }
}

/// The configuration sub-mapping bound to a single device.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoundConfig {
    device: String,
    table: Table,
}

impl BoundConfig {
    /// Bind `table` to `device`.
    #[must_use]
    pub fn new(device: impl Into<String>, table: Table) -> Self {
        Self {
            device: device.into(),
            table,
        }
    }

    /// Name of the device this configuration belongs to.
    #[must_use]
    pub fn device_name(&self) -> &str {
        &self.device
    }

    /// Whether the document had no section for this device.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Borrow the bound mapping.
    #[must_use]
    pub fn as_table(&self) -> &Table {
        &self.table
    }

    /// Shallow copy of the bound mapping, used for payloads and run logs.
    #[must_use]
    pub fn snapshot(&self) -> Table {
        self.table.clone()
    }

    /// First value stored under `key` at any depth (see the module docs for
    /// the traversal order).
    #[must_use]
    pub fn find(&self, key: &str) -> Option<&Value> {
        find_in_table(&self.table, key)
    }

    /// How many times `key` occurs at any depth.
    #[must_use]
    pub fn occurrences(&self, key: &str) -> usize {
        count_in_table(&self.table, key)
    }

    /// First value stored under `key` at any depth.
    ///
    /// # Errors
    ///
    /// Returns [`MissingConfigKey`] if the key occurs nowhere.
    pub fn require(&self, key: &str) -> Result<&Value, MissingConfigKey> {
        self.find(key).ok_or_else(|| self.missing(key))
    }

    /// Value at a dotted path relative to the device section
    /// (e.g. `"matrix.CH1"`).
    ///
    /// # Errors
    ///
    /// Returns [`MissingConfigKey`] if any segment is absent.
    pub fn require_path(&self, path: &str) -> Result<&Value, MissingConfigKey> {
        let mut segments = path.split('.');
        let first = segments.next().unwrap_or_default();
        let mut current = self.table.get(first);
        for segment in segments {
            current = current
                .and_then(Value::as_table)
                .and_then(|table| table.get(segment));
        }
        current.ok_or_else(|| self.missing(path))
    }

    /// Required key, deserialized into `T`.
    ///
    /// # Errors
    ///
    /// Returns [`LabError::MissingConfigKey`] if absent, or
    /// [`LabError::Config`] if the value has the wrong type.
    pub fn require_as<T: DeserializeOwned>(&self, key: &str) -> Result<T, LabError> {
        let value = self.require(key)?;
        Ok(convert(key, value)?)
    }

    /// Optional key, deserialized into `T`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] if the key exists but has the
    /// wrong type.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, ConfigError> {
        self.find(key).map(|value| convert(key, value)).transpose()
    }

    fn missing(&self, key: &str) -> MissingConfigKey {
        MissingConfigKey {
            device: self.device.clone(),
            key: key.to_string(),
        }
    }
}

fn convert<T: DeserializeOwned>(key: &str, value: &Value) -> Result<T, ConfigError> {
    value
        .clone()
        .try_into()
        .map_err(|err: toml::de::Error| ConfigError::InvalidValue {
            key: key.to_string(),
            reason: err.message().to_string(),
        })
}

fn find_in_table<'a>(table: &'a Table, key: &str) -> Option<&'a Value> {
    table.iter().find_map(|(name, value)| {
        if name == key {
            Some(value)
        } else {
            find_in_value(value, key)
        }
    })
}

fn find_in_value<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    match value {
        Value::Table(table) => find_in_table(table, key),
        Value::Array(items) => items.iter().find_map(|item| find_in_value(item, key)),
        _ => None,
    }
}

fn count_in_table(table: &Table, key: &str) -> usize {
    table
        .iter()
        .map(|(name, value)| usize::from(name == key) + count_in_value(value, key))
        .sum()
}

fn count_in_value(value: &Value, key: &str) -> usize {
    match value {
        Value::Table(table) => count_in_table(table, key),
        Value::Array(items) => items.iter().map(|item| count_in_value(item, key)).sum(),
        _ => 0,
    }
}

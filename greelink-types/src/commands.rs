//! The command table collaborator contract
//!
//! The driver does not know what "power" or "mode" mean; it only moves
//! wire codes and raw values. The embedding application supplies a table
//! mapping its logical property names to wire codes, optionally with named
//! constants for the values. The driver consumes the flattened code list
//! as its poll columns and never interprets the constants itself.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::error::{Error, Result};

/// One property the appliance exposes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertySpec {
    /// Wire-level command code
    pub code: String,

    /// Named value constants, e.g. `"on" -> 1`
    pub values: BTreeMap<String, i64>,
}

/// Mapping from logical property names to wire codes and named constants
///
/// # Examples
///
/// ```
/// use greelink_types::CommandTable;
///
/// let table = CommandTable::new()
///     .define("power", "Pow")
///     .define_with_values("mode", "Mod", [("auto", 0), ("cool", 1)]);
///
/// assert_eq!(table.code("power").unwrap(), "Pow");
/// assert_eq!(table.value("mode", "cool").unwrap(), 1);
/// assert_eq!(table.codes(), vec!["Mod".to_string(), "Pow".to_string()]);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandTable {
    entries: BTreeMap<String, PropertySpec>,
}

impl CommandTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a property with no named constants
    pub fn define(mut self, name: impl Into<String>, code: impl Into<String>) -> Self {
        self.entries.insert(
            name.into(),
            PropertySpec {
                code: code.into(),
                values: BTreeMap::new(),
            },
        );
        self
    }

    /// Register a property together with its named value constants
    pub fn define_with_values<N, K>(
        mut self,
        name: N,
        code: impl Into<String>,
        values: impl IntoIterator<Item = (K, i64)>,
    ) -> Self
    where
        N: Into<String>,
        K: Into<String>,
    {
        self.entries.insert(
            name.into(),
            PropertySpec {
                code: code.into(),
                values: values.into_iter().map(|(k, v)| (k.into(), v)).collect(),
            },
        );
        self
    }

    /// The flattened list of all wire codes, sorted by code; this is what
    /// a status poll asks for
    pub fn codes(&self) -> Vec<String> {
        let mut codes: Vec<String> = self.entries.values().map(|s| s.code.clone()).collect();
        codes.sort();
        codes.dedup();
        codes
    }

    /// Wire code for one logical property
    pub fn code(&self, name: &str) -> Result<&str> {
        self.entries
            .get(name)
            .map(|s| s.code.as_str())
            .ok_or_else(|| Error::UnknownProperty(name.to_owned()))
    }

    /// Resolve a named constant for one logical property
    pub fn value(&self, name: &str, constant: &str) -> Result<i64> {
        let spec = self
            .entries
            .get(name)
            .ok_or_else(|| Error::UnknownProperty(name.to_owned()))?;
        spec.values
            .get(constant)
            .copied()
            .ok_or_else(|| Error::UnknownValue(name.to_owned(), constant.to_owned()))
    }

    /// Resolve a named constant into the raw wire value
    pub fn wire_value(&self, name: &str, constant: &str) -> Result<Value> {
        Ok(Value::from(self.value(name, constant)?))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn table() -> CommandTable {
        CommandTable::new()
            .define_with_values("power", "Pow", [("off", 0), ("on", 1)])
            .define_with_values("mode", "Mod", [("auto", 0), ("cool", 1), ("heat", 4)])
            .define("temperature", "SetTem")
    }

    #[test]
    fn test_codes_are_flattened_and_sorted() {
        assert_eq!(
            table().codes(),
            vec!["Mod".to_string(), "Pow".to_string(), "SetTem".to_string()]
        );
    }

    #[test]
    fn test_code_lookup() {
        let table = table();
        assert_eq!(table.code("power").unwrap(), "Pow");
        assert!(matches!(
            table.code("swing"),
            Err(Error::UnknownProperty(name)) if name == "swing"
        ));
    }

    #[test]
    fn test_value_lookup() {
        let table = table();
        assert_eq!(table.value("mode", "heat").unwrap(), 4);
        assert!(matches!(
            table.value("mode", "dry"),
            Err(Error::UnknownValue(..))
        ));
        assert!(matches!(
            table.value("temperature", "hot"),
            Err(Error::UnknownValue(..))
        ));
    }

    #[test]
    fn test_duplicate_codes_deduplicated() {
        let table = CommandTable::new()
            .define("power", "Pow")
            .define("power_alias", "Pow");
        assert_eq!(table.codes(), vec!["Pow".to_string()]);
    }
}

//! Parameter catalog for the SDE-3000
//!
//! The declaration order of the catalog is the positional layout of a slot
//! dump on the wire, so `ordered()` must never be re-sorted.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::{EditorError, TableError};
use crate::sysex::SLOT_COMMAND;

/// One addressable device parameter
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ParameterDefinition {
    /// Device-side parameter address (command byte of a write frame)
    pub id: u8,
    /// Stable host-side lookup key
    pub key: String,
    /// Display label
    pub name: String,
    /// Inclusive lower bound
    pub min: u8,
    /// Inclusive upper bound
    pub max: u8,
}

impl ParameterDefinition {
    pub fn new(id: u8, key: &str, name: &str, min: u8, max: u8) -> Self {
        Self {
            id,
            key: key.to_string(),
            name: name.to_string(),
            min,
            max,
        }
    }
}

/// Ordered, validated parameter catalog
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterTable {
    definitions: Vec<ParameterDefinition>,
}

impl ParameterTable {
    /// Build a catalog, checking id/key uniqueness and value ranges
    pub fn new(definitions: Vec<ParameterDefinition>) -> Result<Self, TableError> {
        if definitions.is_empty() {
            return Err(TableError::Empty);
        }

        let mut ids = HashSet::new();
        let mut keys = HashSet::new();
        for def in &definitions {
            if def.id > 0x7F || def.id == SLOT_COMMAND {
                return Err(TableError::ReservedId {
                    key: def.key.clone(),
                    id: def.id,
                });
            }
            if def.min > def.max || def.max > 0x7F {
                return Err(TableError::InvalidRange {
                    key: def.key.clone(),
                    min: def.min,
                    max: def.max,
                });
            }
            if !ids.insert(def.id) {
                return Err(TableError::DuplicateId(def.id));
            }
            if !keys.insert(def.key.as_str()) {
                return Err(TableError::DuplicateKey(def.key.clone()));
            }
        }

        Ok(Self { definitions })
    }

    /// The SDE-3000 EVH catalog
    pub fn sde3000() -> Self {
        Self {
            definitions: vec![
                ParameterDefinition::new(0x01, "delayTime", "Delay Time", 0, 127),
                ParameterDefinition::new(0x02, "feedback", "Feedback", 0, 127),
                ParameterDefinition::new(0x03, "delayLevel", "Delay Level", 0, 127),
                ParameterDefinition::new(0x04, "tone", "Tone", 0, 127),
            ],
        }
    }

    /// Find a definition by its host-side key
    pub fn lookup(&self, key: &str) -> Result<&ParameterDefinition, EditorError> {
        self.index_of(key).map(|index| &self.definitions[index])
    }

    /// Catalog position of a key, which is also its offset in a dump
    pub fn index_of(&self, key: &str) -> Result<usize, EditorError> {
        self.definitions
            .iter()
            .position(|def| def.key == key)
            .ok_or_else(|| EditorError::UnknownParameter(key.to_string()))
    }

    /// Find a definition by its device-side id
    pub fn by_id(&self, id: u8) -> Option<&ParameterDefinition> {
        self.definitions.iter().find(|def| def.id == id)
    }

    /// Definitions in catalog (wire) order
    pub fn ordered(&self) -> &[ParameterDefinition] {
        &self.definitions
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Saturate a requested value into the definition's range
    ///
    /// Total even for hand-built definitions with `min > max`; `max` wins.
    pub fn clamp(definition: &ParameterDefinition, value: i32) -> u8 {
        value.max(definition.min as i32).min(definition.max as i32) as u8
    }
}

impl Default for ParameterTable {
    fn default() -> Self {
        Self::sde3000()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_catalog_order() {
        let table = ParameterTable::default();
        let keys: Vec<&str> = table.ordered().iter().map(|d| d.key.as_str()).collect();
        assert_eq!(keys, vec!["delayTime", "feedback", "delayLevel", "tone"]);
        assert_eq!(table.len(), 4);
    }

    #[test]
    fn test_lookup() {
        let table = ParameterTable::default();
        assert_eq!(table.lookup("tone").unwrap().id, 0x04);
        assert_eq!(
            table.lookup("reverb"),
            Err(EditorError::UnknownParameter("reverb".to_string()))
        );
        assert_eq!(table.by_id(0x02).unwrap().key, "feedback");
        assert!(table.by_id(0x7E).is_none());
    }

    #[test]
    fn test_clamp_saturates() {
        let def = ParameterDefinition::new(0x10, "mix", "Mix", 10, 100);
        assert_eq!(ParameterTable::clamp(&def, -5), 10);
        assert_eq!(ParameterTable::clamp(&def, 50), 50);
        assert_eq!(ParameterTable::clamp(&def, 1000), 100);
    }

    #[test]
    fn test_clamp_inverted_range_does_not_panic() {
        let def = ParameterDefinition::new(0x10, "odd", "Odd", 90, 20);
        assert_eq!(ParameterTable::clamp(&def, 0), 20);
        assert_eq!(ParameterTable::clamp(&def, 127), 20);
    }

    #[test]
    fn test_index_of() {
        let table = ParameterTable::default();
        assert_eq!(table.index_of("delayLevel"), Ok(2));
        assert_eq!(
            table.index_of("reverb"),
            Err(EditorError::UnknownParameter("reverb".to_string()))
        );
    }

    #[test]
    fn test_rejects_duplicate_id() {
        let result = ParameterTable::new(vec![
            ParameterDefinition::new(0x01, "a", "A", 0, 127),
            ParameterDefinition::new(0x01, "b", "B", 0, 127),
        ]);
        assert_eq!(result, Err(TableError::DuplicateId(0x01)));
    }

    #[test]
    fn test_rejects_duplicate_key() {
        let result = ParameterTable::new(vec![
            ParameterDefinition::new(0x01, "a", "A", 0, 127),
            ParameterDefinition::new(0x02, "a", "A again", 0, 127),
        ]);
        assert_eq!(result, Err(TableError::DuplicateKey("a".to_string())));
    }

    #[test]
    fn test_rejects_slot_sentinel_and_bad_ranges() {
        assert!(matches!(
            ParameterTable::new(vec![ParameterDefinition::new(0x7E, "x", "X", 0, 1)]),
            Err(TableError::ReservedId { .. })
        ));
        assert!(matches!(
            ParameterTable::new(vec![ParameterDefinition::new(0x05, "x", "X", 9, 3)]),
            Err(TableError::InvalidRange { .. })
        ));
        assert!(matches!(
            ParameterTable::new(vec![ParameterDefinition::new(0x05, "x", "X", 0, 200)]),
            Err(TableError::InvalidRange { .. })
        ));
        assert_eq!(ParameterTable::new(vec![]), Err(TableError::Empty));
    }
}

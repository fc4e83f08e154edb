//! Enum definitions.

use rustc_hash::FxHashMap;

use crate::schema::field::is_dotted_ident;
use crate::schema::SchemaError;

/// Describes a single enum type as a set of name/number pairs.
///
/// Multiple names may alias one number. The reverse (number to name) lookup
/// returns the first name added for that number.
#[derive(Clone, Debug, Default)]
pub struct EnumDef {
    full_name: Option<String>,
    ntoi: FxHashMap<String, i32>,
    iton: FxHashMap<i32, String>,
    default: i32,
}

impl EnumDef {
    pub fn new() -> EnumDef {
        EnumDef::default()
    }

    pub fn full_name(&self) -> Option<&str> {
        self.full_name.as_deref()
    }

    pub fn set_full_name(&mut self, name: &str) -> Result<(), SchemaError> {
        if !is_dotted_ident(name) {
            return Err(SchemaError::BadName(name.to_string()));
        }
        self.full_name = Some(name.to_string());
        Ok(())
    }

    /// The value used as the default when a field does not specify one.
    pub fn default_value(&self) -> i32 {
        self.default
    }

    pub fn set_default_value(&mut self, value: i32) {
        self.default = value;
    }

    /// Number of name/number pairs. Aliased numbers count once per name.
    pub fn value_count(&self) -> usize {
        self.ntoi.len()
    }

    /// Add a name/number pair. Fails if the name is already used by another
    /// value.
    pub fn add_value(&mut self, name: &str, number: i32) -> Result<(), SchemaError> {
        if self.ntoi.contains_key(name) {
            return Err(SchemaError::DuplicateEnumValue(name.to_string()));
        }
        self.ntoi.insert(name.to_string(), number);
        // First name added for a number wins the reverse mapping.
        self.iton.entry(number).or_insert_with(|| name.to_string());
        Ok(())
    }

    pub fn find_by_name(&self, name: &str) -> Option<i32> {
        self.ntoi.get(name).copied()
    }

    pub fn find_by_number(&self, number: i32) -> Option<&str> {
        self.iton.get(&number).map(|s| s.as_str())
    }

    /// Iterate over name/number pairs. The order is unspecified.
    pub fn values(&self) -> impl Iterator<Item = (&str, i32)> + '_ {
        self.ntoi.iter().map(|(name, num)| (name.as_str(), *num))
    }

    pub(crate) fn describe(&self) -> String {
        self.full_name
            .clone()
            .unwrap_or_else(|| "(anonymous enum)".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::EnumDef;
    use crate::schema::SchemaError;

    #[test]
    fn test_add_and_find_values() {
        let mut e = EnumDef::new();
        e.add_value("RED", 1).unwrap();
        e.add_value("GREEN", 2).unwrap();

        assert_eq!(e.value_count(), 2);
        assert_eq!(e.find_by_name("RED"), Some(1));
        assert_eq!(e.find_by_name("BLUE"), None);
        assert_eq!(e.find_by_number(2), Some("GREEN"));
        assert_eq!(e.find_by_number(3), None);

        let err = e.add_value("RED", 5).err().unwrap();
        assert!(matches!(err, SchemaError::DuplicateEnumValue(name) if name == "RED"));
    }

    #[test]
    fn test_aliased_number_keeps_first_name() {
        let mut e = EnumDef::new();
        e.add_value("FIRST", 1).unwrap();
        e.add_value("ALIAS", 1).unwrap();

        assert_eq!(e.value_count(), 2);
        assert_eq!(e.find_by_number(1), Some("FIRST"));
        assert_eq!(e.find_by_name("ALIAS"), Some(1));
    }
}

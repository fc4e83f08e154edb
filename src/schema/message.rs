//! Message definitions.

use rustc_hash::FxHashMap;

use crate::schema::field::is_dotted_ident;
use crate::schema::{DefId, SchemaError};

/// Describes a single message type.
///
/// A message owns a set of fields, indexed both by field number (used by
/// the wire decoder) and by name. Fields are added through
/// [`SchemaBuilder::add_field`](crate::schema::SchemaBuilder::add_field).
#[derive(Clone, Debug, Default)]
pub struct MessageDef {
    full_name: Option<String>,
    fields: Vec<DefId>,
    by_number: FxHashMap<u32, DefId>,
    by_name: FxHashMap<String, DefId>,
    selector_count: u32,
}

impl MessageDef {
    pub fn new() -> MessageDef {
        MessageDef::default()
    }

    /// The fully-qualified dotted name, eg. `foo.bar.Message`. Messages are
    /// not required to have a name; an unnamed message frozen as-is stays
    /// anonymous.
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

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    /// Look up a field by number.
    pub fn find_by_number(&self, number: u32) -> Option<DefId> {
        self.by_number.get(&number).copied()
    }

    /// Look up a field by name.
    pub fn find_by_name(&self, name: &str) -> Option<DefId> {
        self.by_name.get(name).copied()
    }

    /// Iterate over the message's fields. The order is unspecified.
    pub fn fields(&self) -> impl Iterator<Item = DefId> + '_ {
        self.fields.iter().copied()
    }

    /// Total number of handler selector slots the message's fields require.
    /// Assigned when the schema is frozen; zero before.
    pub fn selector_count(&self) -> u32 {
        self.selector_count
    }

    /// Insert an already-validated field into both indices.
    pub(crate) fn insert_field(
        &mut self,
        name: &str,
        number: u32,
        id: DefId,
    ) -> Result<(), SchemaError> {
        if self.by_number.contains_key(&number) {
            return Err(SchemaError::DuplicateFieldNumber(number));
        }
        if self.by_name.contains_key(name) {
            return Err(SchemaError::DuplicateFieldName(name.to_string()));
        }
        self.fields.push(id);
        self.by_number.insert(number, id);
        self.by_name.insert(name.to_string(), id);
        Ok(())
    }

    pub(crate) fn set_selector_count(&mut self, count: u32) {
        self.selector_count = count;
    }

    /// Name used to identify this message in errors.
    pub(crate) fn describe(&self) -> String {
        self.full_name
            .clone()
            .unwrap_or_else(|| "(anonymous message)".to_string())
    }
}

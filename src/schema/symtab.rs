//! Symbol table: named def registration and symbolic reference resolution.

use rustc_hash::FxHashMap;

use crate::schema::field::is_dotted_ident;
use crate::schema::{Def, DefId, DefaultValue, FieldType, SchemaBuilder, SchemaError, SubDef};

/// Registry of defs by full name.
///
/// A symbol table records the full names of message and enum defs so that
/// symbolic subdef references (created by
/// [`FieldDef::set_subdef_name`](crate::schema::FieldDef::set_subdef_name)
/// or [`SchemaBuilder::dup_message`]) can be rewritten into direct handles
/// before the schema is frozen.
#[derive(Clone, Debug, Default)]
pub struct SymbolTable {
    by_name: FxHashMap<String, DefId>,
}

impl SymbolTable {
    pub fn new() -> SymbolTable {
        SymbolTable::default()
    }

    /// Register a def under a full name. Errors if the name is already
    /// taken.
    pub fn add(&mut self, name: &str, id: DefId) -> Result<(), SchemaError> {
        if !is_dotted_ident(name) {
            return Err(SchemaError::BadName(name.to_string()));
        }
        if self.by_name.contains_key(name) {
            return Err(SchemaError::DuplicateSymbol(name.to_string()));
        }
        self.by_name.insert(name.to_string(), id);
        Ok(())
    }

    /// Register every named message and enum def in the builder.
    pub fn add_all(&mut self, schema: &SchemaBuilder) -> Result<(), SchemaError> {
        for (id, def) in schema.defs.iter().enumerate() {
            match def {
                Def::Message(_) | Def::Enum(_) => {
                    if let Some(name) = def.full_name() {
                        self.add(name, id)?;
                    }
                }
                Def::Field(_) => {}
            }
        }
        Ok(())
    }

    pub fn find(&self, name: &str) -> Option<DefId> {
        self.by_name.get(name).copied()
    }

    pub fn find_message(&self, name: &str, schema: &SchemaBuilder) -> Option<DefId> {
        self.find(name).filter(|&id| schema.message(id).is_some())
    }

    pub fn find_enum(&self, name: &str, schema: &SchemaBuilder) -> Option<DefId> {
        self.find(name).filter(|&id| schema.enum_def(id).is_some())
    }

    /// Resolve all symbolic references in the builder.
    ///
    /// Rewrites every symbolic subdef into a direct handle (checking that
    /// the named def's kind matches the field's type) and resolves symbolic
    /// enum defaults against the now-resolved enum defs. Errors name the
    /// offending symbol; some references may already have been rewritten
    /// when an error is returned.
    pub fn resolve(&self, schema: &mut SchemaBuilder) -> Result<(), SchemaError> {
        // Symbolic subdefs.
        let mut subdef_updates: Vec<(DefId, DefId)> = Vec::new();
        for (id, def) in schema.defs.iter().enumerate() {
            let Def::Field(field) = def else {
                continue;
            };
            let Some(SubDef::Name(name)) = field.subdef_ref() else {
                continue;
            };
            let target = self
                .find(name)
                .ok_or_else(|| SchemaError::UnknownSymbol(name.clone()))?;
            let variant_ok = match field.field_type() {
                Some(FieldType::Message) => schema.message(target).is_some(),
                Some(FieldType::Enum) => schema.enum_def(target).is_some(),
                _ => false,
            };
            if !variant_ok {
                return Err(SchemaError::SubDefVariantMismatch(field.describe()));
            }
            subdef_updates.push((id, target));
        }
        for (id, target) in subdef_updates {
            schema
                .field_mut(id)
                .unwrap()
                .set_subdef_unchecked(SubDef::Def(target));
        }

        // Symbolic enum defaults.
        let mut default_updates: Vec<(DefId, i32)> = Vec::new();
        for (id, def) in schema.defs.iter().enumerate() {
            let Def::Field(field) = def else {
                continue;
            };
            let Some(DefaultValue::EnumName(name)) = field.default_value() else {
                continue;
            };
            let enum_def = field
                .subdef()
                .and_then(|sub| schema.enum_def(sub))
                .ok_or_else(|| SchemaError::UnresolvedSubDef(field.describe()))?;
            let number = enum_def
                .find_by_name(name)
                .ok_or_else(|| SchemaError::UnknownEnumValue(name.clone()))?;
            default_updates.push((id, number));
        }
        for (id, number) in default_updates {
            schema
                .field_mut(id)
                .unwrap()
                .set_default(DefaultValue::Int32(number))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::SymbolTable;
    use crate::schema::{
        EnumDef, FieldDef, FieldType, MessageDef, SchemaBuilder, SchemaError,
    };

    fn named_message(b: &mut SchemaBuilder, name: &str) -> usize {
        let mut m = MessageDef::new();
        m.set_full_name(name).unwrap();
        b.add_message(m)
    }

    #[test]
    fn test_duplicate_registration() {
        let mut b = SchemaBuilder::new();
        let m1 = named_message(&mut b, "test.M");
        let m2 = b.add_message(MessageDef::new());

        let mut symtab = SymbolTable::new();
        symtab.add("test.M", m1).unwrap();
        let err = symtab.add("test.M", m2).err().unwrap();
        assert!(matches!(err, SchemaError::DuplicateSymbol(name) if name == "test.M"));
    }

    #[test]
    fn test_resolve_symbolic_subdef() {
        let mut b = SchemaBuilder::new();
        let inner = named_message(&mut b, "test.Inner");
        let outer = named_message(&mut b, "test.Outer");

        let mut f = FieldDef::new();
        f.set_name("inner").unwrap();
        f.set_number(1).unwrap();
        f.set_type(FieldType::Message);
        f.set_subdef_name("test.Inner").unwrap();
        let f = b.add_field(outer, f).unwrap();

        let mut symtab = SymbolTable::new();
        symtab.add_all(&b).unwrap();
        symtab.resolve(&mut b).unwrap();
        assert_eq!(b.field(f).unwrap().subdef(), Some(inner));
    }

    #[test]
    fn test_resolve_unknown_symbol() {
        let mut b = SchemaBuilder::new();
        let outer = named_message(&mut b, "test.Outer");

        let mut f = FieldDef::new();
        f.set_name("inner").unwrap();
        f.set_number(1).unwrap();
        f.set_type(FieldType::Message);
        f.set_subdef_name("test.Gone").unwrap();
        b.add_field(outer, f).unwrap();

        let mut symtab = SymbolTable::new();
        symtab.add_all(&b).unwrap();
        let err = symtab.resolve(&mut b).err().unwrap();
        assert!(matches!(err, SchemaError::UnknownSymbol(name) if name == "test.Gone"));
    }

    #[test]
    fn test_resolve_variant_mismatch() {
        let mut b = SchemaBuilder::new();
        let mut colors = EnumDef::new();
        colors.set_full_name("test.Color").unwrap();
        let _e = b.add_enum(colors);
        let outer = named_message(&mut b, "test.Outer");

        // Message-typed field whose symbolic subdef names an enum.
        let mut f = FieldDef::new();
        f.set_name("inner").unwrap();
        f.set_number(1).unwrap();
        f.set_type(FieldType::Message);
        f.set_subdef_name("test.Color").unwrap();
        b.add_field(outer, f).unwrap();

        let mut symtab = SymbolTable::new();
        symtab.add_all(&b).unwrap();
        let err = symtab.resolve(&mut b).err().unwrap();
        assert!(matches!(err, SchemaError::SubDefVariantMismatch(_)));
    }
}

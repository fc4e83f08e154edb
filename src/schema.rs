//! Schema definitions ("defs") and the mutable-to-frozen transition.
//!
//! Defs describe the constructs that can appear in a Protocol Buffers
//! schema: messages, their fields, and enums. Defs are assembled in a
//! [`SchemaBuilder`], an arena addressed by [`DefId`] handles so that
//! message graphs may contain cycles (a message whose field refers back to
//! the message itself, or mutual references between messages).
//!
//! Once assembled, [`SchemaBuilder::freeze`] validates the defs reachable
//! from a set of roots and produces an immutable [`Schema`]. A frozen
//! schema is typically wrapped in an `Arc` and shared: it has no interior
//! mutability, so concurrent reads are safe, and one schema can back many
//! decoders. Freezing never modifies the builder — on validation failure
//! nothing is frozen and the builder can be fixed up and frozen again.

use std::error::Error;
use std::fmt;
use std::fmt::Display;

use rustc_hash::{FxHashMap, FxHashSet};

pub mod enums;
pub mod field;
pub mod message;
pub mod symtab;

pub use enums::EnumDef;
pub use field::{DefaultValue, DescriptorType, FieldDef, FieldType, IntegerFormat, Label, SubDef};
pub use message::MessageDef;
pub use symtab::SymbolTable;

/// Handle to a def within a [`SchemaBuilder`] or [`Schema`].
///
/// Handles are only meaningful for the builder that created them, or for
/// the schema a freeze of that builder produced.
pub type DefId = usize;

/// A schema definition: a message, a field or an enum.
///
/// A `Service` variant is reserved by `descriptor.proto` but not
/// implemented here.
#[derive(Clone, Debug)]
pub enum Def {
    Message(MessageDef),
    Field(FieldDef),
    Enum(EnumDef),
}

impl Def {
    /// Dynamic cast: the message def if this is one, else `None`.
    pub fn as_message(&self) -> Option<&MessageDef> {
        match self {
            Def::Message(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_field(&self) -> Option<&FieldDef> {
        match self {
            Def::Field(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_enum(&self) -> Option<&EnumDef> {
        match self {
            Def::Enum(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_message_mut(&mut self) -> Option<&mut MessageDef> {
        match self {
            Def::Message(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_field_mut(&mut self) -> Option<&mut FieldDef> {
        match self {
            Def::Field(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_enum_mut(&mut self) -> Option<&mut EnumDef> {
        match self {
            Def::Enum(e) => Some(e),
            _ => None,
        }
    }

    /// The def's fully-qualified name, if it has one. For fields this is
    /// the field's simple name.
    pub fn full_name(&self) -> Option<&str> {
        match self {
            Def::Message(m) => m.full_name(),
            Def::Field(f) => f.name(),
            Def::Enum(e) => e.full_name(),
        }
    }
}

/// Errors constructing or freezing a schema.
#[derive(Clone, Debug, PartialEq)]
pub enum SchemaError {
    /// A def handle does not refer to a def of the expected kind.
    BadDefId,
    /// A name is not a valid (dotted) identifier.
    BadName(String),
    /// A field number is zero, too large, or in the reserved range.
    BadFieldNumber(u32),
    /// Attempted to rename or renumber a field already part of a message.
    FieldInMessage,
    /// An operation requires the field's type to be set first.
    TypeNotSet,
    /// A default value does not match the field's type.
    InvalidDefault,
    /// Group framing was requested for a non-message field.
    NotTagDelimitable,
    /// A subdef was supplied for a field whose type takes none.
    NoSubDef,
    /// A subdef's variant does not match the field's type.
    SubDefVariantMismatch(String),
    /// A message/enum field has no resolved subdef.
    UnresolvedSubDef(String),
    /// A symbolic enum default names no value of the enum.
    UnknownEnumValue(String),
    /// A symbolic enum default was not resolved before freezing.
    SymbolicDefault(String),
    /// Two fields of one message share a number.
    DuplicateFieldNumber(u32),
    /// Two fields of one message share a name.
    DuplicateFieldName(String),
    /// Two values of one enum share a name.
    DuplicateEnumValue(String),
    /// Two defs were registered under one full name.
    DuplicateSymbol(String),
    /// A symbolic reference names no registered def.
    UnknownSymbol(String),
    /// A field added to a message has no name yet.
    MissingFieldName,
    /// A field added to a message has no number yet.
    MissingFieldNumber,
    /// A field has no type at freeze time.
    MissingType(String),
    /// The field is already part of a message.
    FieldAlreadyAdded,
    /// Zig-zag encoding on an unsigned integer field.
    ZigZagOnUnsigned(String),
    /// A root passed to freeze was a bare field def.
    FieldAsRoot,
}

impl Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaError::BadDefId => write!(f, "def handle is invalid for this schema"),
            SchemaError::BadName(name) => write!(f, "\"{}\" is not a valid identifier", name),
            SchemaError::BadFieldNumber(n) => write!(f, "field number {} is out of range", n),
            SchemaError::FieldInMessage => {
                write!(f, "field name and number are fixed once added to a message")
            }
            SchemaError::TypeNotSet => write!(f, "field type must be set first"),
            SchemaError::InvalidDefault => write!(f, "default value does not match field type"),
            SchemaError::NotTagDelimitable => {
                write!(f, "only message fields may be tag-delimited")
            }
            SchemaError::NoSubDef => write!(f, "field type does not take a subdef"),
            SchemaError::SubDefVariantMismatch(name) => {
                write!(f, "subdef of field \"{}\" has the wrong def kind", name)
            }
            SchemaError::UnresolvedSubDef(name) => {
                write!(f, "field \"{}\" has no resolved subdef", name)
            }
            SchemaError::UnknownEnumValue(name) => {
                write!(f, "enum has no value named \"{}\"", name)
            }
            SchemaError::SymbolicDefault(name) => {
                write!(f, "field \"{}\" has an unresolved symbolic default", name)
            }
            SchemaError::DuplicateFieldNumber(n) => write!(f, "duplicate field number {}", n),
            SchemaError::DuplicateFieldName(name) => {
                write!(f, "duplicate field name \"{}\"", name)
            }
            SchemaError::DuplicateEnumValue(name) => {
                write!(f, "duplicate enum value name \"{}\"", name)
            }
            SchemaError::DuplicateSymbol(name) => {
                write!(f, "a def named \"{}\" is already registered", name)
            }
            SchemaError::UnknownSymbol(name) => write!(f, "no def named \"{}\"", name),
            SchemaError::MissingFieldName => write!(f, "field has no name"),
            SchemaError::MissingFieldNumber => write!(f, "field has no number"),
            SchemaError::MissingType(name) => write!(f, "field \"{}\" has no type", name),
            SchemaError::FieldAlreadyAdded => write!(f, "field already belongs to a message"),
            SchemaError::ZigZagOnUnsigned(name) => {
                write!(f, "field \"{}\" uses zig-zag encoding on an unsigned type", name)
            }
            SchemaError::FieldAsRoot => write!(f, "freeze roots may not be bare field defs"),
        }
    }
}

impl Error for SchemaError {}

/// Arena of mutable defs under construction.
#[derive(Clone, Debug, Default)]
pub struct SchemaBuilder {
    defs: Vec<Def>,
}

impl SchemaBuilder {
    pub fn new() -> SchemaBuilder {
        SchemaBuilder::default()
    }

    /// Add a message def, returning its handle.
    pub fn add_message(&mut self, message: MessageDef) -> DefId {
        self.defs.push(Def::Message(message));
        self.defs.len() - 1
    }

    /// Add an enum def, returning its handle.
    pub fn add_enum(&mut self, enum_def: EnumDef) -> DefId {
        self.defs.push(Def::Enum(enum_def));
        self.defs.len() - 1
    }

    /// Add a field to a message.
    ///
    /// The field must have a name and number set, must not already belong
    /// to a message, and neither its name nor its number may collide with
    /// an existing field of the message. On failure the message is
    /// unchanged.
    pub fn add_field(&mut self, message: DefId, field: FieldDef) -> Result<DefId, SchemaError> {
        let name = field.name().ok_or(SchemaError::MissingFieldName)?.to_string();
        if field.number() == 0 {
            return Err(SchemaError::MissingFieldNumber);
        }
        if field.parent().is_some() {
            return Err(SchemaError::FieldAlreadyAdded);
        }
        let number = field.number();
        let field_id = self.defs.len();

        let msg = self
            .defs
            .get_mut(message)
            .and_then(|def| def.as_message_mut())
            .ok_or(SchemaError::BadDefId)?;
        msg.insert_field(&name, number, field_id)?;

        let mut field = field;
        field.set_parent(message);
        self.defs.push(Def::Field(field));
        Ok(field_id)
    }

    pub fn get(&self, id: DefId) -> Option<&Def> {
        self.defs.get(id)
    }

    pub fn get_mut(&mut self, id: DefId) -> Option<&mut Def> {
        self.defs.get_mut(id)
    }

    pub fn message(&self, id: DefId) -> Option<&MessageDef> {
        self.get(id).and_then(|def| def.as_message())
    }

    pub fn message_mut(&mut self, id: DefId) -> Option<&mut MessageDef> {
        self.get_mut(id).and_then(|def| def.as_message_mut())
    }

    pub fn field(&self, id: DefId) -> Option<&FieldDef> {
        self.get(id).and_then(|def| def.as_field())
    }

    pub fn field_mut(&mut self, id: DefId) -> Option<&mut FieldDef> {
        self.get_mut(id).and_then(|def| def.as_field_mut())
    }

    pub fn enum_def(&self, id: DefId) -> Option<&EnumDef> {
        self.get(id).and_then(|def| def.as_enum())
    }

    pub fn enum_def_mut(&mut self, id: DefId) -> Option<&mut EnumDef> {
        self.get_mut(id).and_then(|def| def.as_enum_mut())
    }

    /// Deep-copy a message and its fields, breaking references to subdefs.
    ///
    /// The copy's fields refer to their subdefs symbolically, by the
    /// subdef's full name. A reference to an anonymous subdef is dropped.
    /// Resolving the copy through a [`SymbolTable`] that maps the same
    /// names reproduces the original relations.
    pub fn dup_message(&mut self, message: DefId) -> Result<DefId, SchemaError> {
        let msg = self.message(message).ok_or(SchemaError::BadDefId)?.clone();
        let field_ids: Vec<DefId> = msg.fields().collect();

        let mut copy = MessageDef::new();
        if let Some(name) = msg.full_name() {
            copy.set_full_name(name)?;
        }
        let copy_id = self.add_message(copy);

        for field_id in field_ids {
            let field = self.field(field_id).ok_or(SchemaError::BadDefId)?;
            let mut field_copy = field.clone();
            match field.subdef_ref() {
                Some(SubDef::Def(sub)) => {
                    let sub_name = self
                        .get(*sub)
                        .ok_or(SchemaError::BadDefId)?
                        .full_name()
                        .map(|n| n.to_string());
                    match sub_name {
                        Some(name) => field_copy.set_subdef_unchecked(SubDef::Name(name)),
                        None => field_copy.clear_subdef(),
                    }
                }
                Some(SubDef::Name(_)) | None => {}
            }
            let copy_field_id = self.defs.len();
            let name = field_copy.name().unwrap().to_string();
            field_copy.set_parent(copy_id);
            let number = field_copy.number();
            self.defs.push(Def::Field(field_copy));
            self.message_mut(copy_id)
                .unwrap()
                .insert_field(&name, number, copy_field_id)?;
        }
        Ok(copy_id)
    }

    /// Validate the defs reachable from `roots` and produce a frozen
    /// [`Schema`] containing them.
    ///
    /// `roots` must be message or enum defs; every def reachable from them
    /// is included. On failure nothing is frozen, the builder is untouched
    /// and the error identifies the first violation. Freezing assigns each
    /// field its block of handler selectors (fields in name-sorted order,
    /// eight slots per field after the two message-level slots).
    pub fn freeze(&self, roots: &[DefId]) -> Result<Schema, SchemaError> {
        for &root in roots {
            match self.get(root) {
                None => return Err(SchemaError::BadDefId),
                Some(Def::Field(_)) => return Err(SchemaError::FieldAsRoot),
                Some(_) => {}
            }
        }

        // Transitive closure, in deterministic discovery order.
        let mut order: Vec<DefId> = Vec::new();
        let mut seen: FxHashSet<DefId> = FxHashSet::default();
        let mut work: Vec<DefId> = roots.to_vec();
        while let Some(id) = work.pop() {
            if !seen.insert(id) {
                continue;
            }
            order.push(id);
            match self.get(id).ok_or(SchemaError::BadDefId)? {
                Def::Message(msg) => {
                    for field_id in msg.fields() {
                        work.push(field_id);
                        let field = self.field(field_id).ok_or(SchemaError::BadDefId)?;
                        if let Some(sub) = field.subdef() {
                            work.push(sub);
                        }
                    }
                }
                Def::Field(_) | Def::Enum(_) => {}
            }
        }

        // Validate every reachable field.
        for &id in &order {
            let Some(field) = self.field(id) else {
                continue;
            };
            let Some(ty) = field.field_type() else {
                return Err(SchemaError::MissingType(field.describe()));
            };
            if field.integer_format() == IntegerFormat::ZigZag && !ty.is_signed_integer() {
                return Err(SchemaError::ZigZagOnUnsigned(field.describe()));
            }
            if field.descriptor_type().is_none() {
                return Err(SchemaError::NotTagDelimitable);
            }
            if field.has_subdef() {
                match field.subdef_ref() {
                    Some(SubDef::Def(sub)) => {
                        let variant_ok = match ty {
                            FieldType::Message => self.message(*sub).is_some(),
                            FieldType::Enum => self.enum_def(*sub).is_some(),
                            _ => false,
                        };
                        if !variant_ok {
                            return Err(SchemaError::SubDefVariantMismatch(field.describe()));
                        }
                    }
                    Some(SubDef::Name(_)) | None => {
                        return Err(SchemaError::UnresolvedSubDef(field.describe()));
                    }
                }
            }
            if field.default_is_symbolic() {
                return Err(SchemaError::SymbolicDefault(field.describe()));
            }
        }

        // Copy into the frozen arena, remapping handles.
        let remap: FxHashMap<DefId, DefId> =
            order.iter().enumerate().map(|(new, &old)| (old, new)).collect();
        let mut defs: Vec<Def> = Vec::with_capacity(order.len());
        let mut by_name: FxHashMap<String, DefId> = FxHashMap::default();
        for &old_id in &order {
            let def = match self.get(old_id).unwrap() {
                Def::Message(msg) => {
                    let mut frozen = MessageDef::new();
                    if let Some(name) = msg.full_name() {
                        frozen.set_full_name(name)?;
                    }
                    // Name-sorted field order determines selector layout.
                    let mut field_ids: Vec<DefId> = msg.fields().collect();
                    field_ids.sort_by(|&a, &b| {
                        self.field(a).unwrap().name().cmp(&self.field(b).unwrap().name())
                    });
                    for field_id in &field_ids {
                        let field = self.field(*field_id).unwrap();
                        frozen.insert_field(
                            field.name().unwrap(),
                            field.number(),
                            remap[field_id],
                        )?;
                    }
                    frozen.set_selector_count(2 + 8 * field_ids.len() as u32);
                    Def::Message(frozen)
                }
                Def::Field(field) => {
                    let mut frozen = field.clone();
                    frozen.set_parent(remap[&field.parent().unwrap()]);
                    if let Some(sub) = field.subdef() {
                        frozen.set_subdef_unchecked(SubDef::Def(remap[&sub]));
                    }
                    // Selector base is assigned below, once the owning
                    // message's sorted order is known.
                    Def::Field(frozen)
                }
                Def::Enum(enum_def) => Def::Enum(enum_def.clone()),
            };
            if !matches!(def, Def::Field(_)) {
                if let Some(name) = def.full_name() {
                    if by_name.insert(name.to_string(), defs.len()).is_some() {
                        return Err(SchemaError::DuplicateSymbol(name.to_string()));
                    }
                }
            }
            defs.push(def);
        }

        // Assign selector bases from each message's name-sorted field order.
        let mut bases: Vec<(DefId, u32)> = Vec::new();
        for def in &defs {
            if let Def::Message(msg) = def {
                for (i, field_id) in msg.fields().enumerate() {
                    bases.push((field_id, 2 + 8 * i as u32));
                }
            }
        }
        for (field_id, base) in bases {
            if let Some(Def::Field(field)) = defs.get_mut(field_id) {
                field.set_selector_base(base);
            }
        }

        Ok(Schema {
            defs,
            roots: roots.iter().map(|id| remap[id]).collect(),
            by_name,
        })
    }
}

/// A frozen, validated schema.
///
/// Produced by [`SchemaBuilder::freeze`]. A `Schema` exposes only shared
/// accessors, so it is safe to share across threads (typically via `Arc`)
/// and one schema may back any number of concurrently running decoders.
#[derive(Debug)]
pub struct Schema {
    defs: Vec<Def>,
    roots: Vec<DefId>,
    by_name: FxHashMap<String, DefId>,
}

impl Schema {
    pub fn get(&self, id: DefId) -> Option<&Def> {
        self.defs.get(id)
    }

    pub fn message(&self, id: DefId) -> Option<&MessageDef> {
        self.get(id).and_then(|def| def.as_message())
    }

    pub fn field(&self, id: DefId) -> Option<&FieldDef> {
        self.get(id).and_then(|def| def.as_field())
    }

    pub fn enum_def(&self, id: DefId) -> Option<&EnumDef> {
        self.get(id).and_then(|def| def.as_enum())
    }

    /// Frozen handles corresponding to the roots passed to
    /// [`SchemaBuilder::freeze`], in the same order.
    pub fn roots(&self) -> &[DefId] {
        &self.roots
    }

    /// Look up a frozen message or enum def by full name.
    pub fn find(&self, name: &str) -> Option<DefId> {
        self.by_name.get(name).copied()
    }

    pub fn find_message(&self, name: &str) -> Option<DefId> {
        self.find(name).filter(|&id| self.message(id).is_some())
    }

    pub fn find_enum(&self, name: &str) -> Option<DefId> {
        self.find(name).filter(|&id| self.enum_def(id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::{
        DefaultValue, EnumDef, FieldDef, FieldType, IntegerFormat, MessageDef, SchemaBuilder,
        SchemaError, SymbolTable,
    };

    fn field(name: &str, number: u32, ty: FieldType) -> FieldDef {
        let mut f = FieldDef::new();
        f.set_name(name).unwrap();
        f.set_number(number).unwrap();
        f.set_type(ty);
        f
    }

    #[test]
    fn test_build_and_freeze() {
        let mut b = SchemaBuilder::new();
        let mut msg = MessageDef::new();
        msg.set_full_name("test.M").unwrap();
        let m = b.add_message(msg);
        b.add_field(m, field("a", 1, FieldType::Int32)).unwrap();
        b.add_field(m, field("b", 2, FieldType::String)).unwrap();

        let schema = b.freeze(&[m]).unwrap();
        let root = schema.roots()[0];
        let msg = schema.message(root).unwrap();
        assert_eq!(msg.field_count(), 2);
        assert_eq!(msg.selector_count(), 2 + 8 * 2);
        assert_eq!(schema.find_message("test.M"), Some(root));

        let a = schema.field(msg.find_by_name("a").unwrap()).unwrap();
        let b_field = schema.field(msg.find_by_name("b").unwrap()).unwrap();
        // Selector bases follow name-sorted order.
        assert_eq!(a.selector_base(), 2);
        assert_eq!(b_field.selector_base(), 10);
        assert_eq!(a.parent(), Some(root));
    }

    #[test]
    fn test_freeze_is_repeatable() {
        let mut b = SchemaBuilder::new();
        let m = b.add_message(MessageDef::new());
        b.add_field(m, field("x", 1, FieldType::Bool)).unwrap();

        let first = b.freeze(&[m]).unwrap();
        let second = b.freeze(&[m]).unwrap();
        assert_eq!(
            first.message(first.roots()[0]).unwrap().field_count(),
            second.message(second.roots()[0]).unwrap().field_count(),
        );
    }

    #[test]
    fn test_add_field_collisions() {
        let mut b = SchemaBuilder::new();
        let m = b.add_message(MessageDef::new());
        b.add_field(m, field("a", 1, FieldType::Int32)).unwrap();

        let err = b.add_field(m, field("a", 2, FieldType::Int32)).err().unwrap();
        assert!(matches!(err, SchemaError::DuplicateFieldName(_)));

        let err = b.add_field(m, field("b", 1, FieldType::Int32)).err().unwrap();
        assert!(matches!(err, SchemaError::DuplicateFieldNumber(1)));

        // Failed adds leave the message unchanged.
        assert_eq!(b.message(m).unwrap().field_count(), 1);

        let unnamed = {
            let mut f = FieldDef::new();
            f.set_number(3).unwrap();
            f.set_type(FieldType::Int32);
            f
        };
        let err = b.add_field(m, unnamed).err().unwrap();
        assert!(matches!(err, SchemaError::MissingFieldName));
    }

    #[test]
    fn test_freeze_requires_type() {
        let mut b = SchemaBuilder::new();
        let m = b.add_message(MessageDef::new());
        let mut f = FieldDef::new();
        f.set_name("untyped").unwrap();
        f.set_number(1).unwrap();
        b.add_field(m, f).unwrap();

        let err = b.freeze(&[m]).err().unwrap();
        assert!(matches!(err, SchemaError::MissingType(name) if name == "untyped"));
    }

    #[test]
    fn test_freeze_requires_resolved_subdef() {
        let mut b = SchemaBuilder::new();
        let m = b.add_message(MessageDef::new());
        let mut f = field("child", 1, FieldType::Message);
        f.set_subdef_name("test.Missing").unwrap();
        b.add_field(m, f).unwrap();

        let err = b.freeze(&[m]).err().unwrap();
        assert!(matches!(err, SchemaError::UnresolvedSubDef(_)));
    }

    #[test]
    fn test_freeze_rejects_zigzag_unsigned() {
        let mut b = SchemaBuilder::new();
        let m = b.add_message(MessageDef::new());
        let mut f = field("n", 1, FieldType::Uint32);
        f.set_integer_format(IntegerFormat::ZigZag);
        b.add_field(m, f).unwrap();

        let err = b.freeze(&[m]).err().unwrap();
        assert!(matches!(err, SchemaError::ZigZagOnUnsigned(_)));
    }

    #[test]
    fn test_freeze_rejects_field_root() {
        let mut b = SchemaBuilder::new();
        let m = b.add_message(MessageDef::new());
        let f = b.add_field(m, field("a", 1, FieldType::Int32)).unwrap();
        let err = b.freeze(&[f]).err().unwrap();
        assert!(matches!(err, SchemaError::FieldAsRoot));
    }

    #[test]
    fn test_self_recursive_message() {
        let mut b = SchemaBuilder::new();
        let mut msg = MessageDef::new();
        msg.set_full_name("test.Node").unwrap();
        let m = b.add_message(msg);
        let mut f = field("next", 1, FieldType::Message);
        f.set_subdef(m, &b).unwrap();
        b.add_field(m, f).unwrap();

        let schema = b.freeze(&[m]).unwrap();
        let root = schema.roots()[0];
        let next = schema
            .field(schema.message(root).unwrap().find_by_name("next").unwrap())
            .unwrap();
        assert_eq!(next.subdef(), Some(root));
    }

    #[test]
    fn test_dup_breaks_references_symbolically() {
        let mut b = SchemaBuilder::new();
        let mut inner = MessageDef::new();
        inner.set_full_name("test.Inner").unwrap();
        let inner_id = b.add_message(inner);

        let mut outer = MessageDef::new();
        outer.set_full_name("test.Outer").unwrap();
        let outer_id = b.add_message(outer);
        let mut f = field("inner", 1, FieldType::Message);
        f.set_subdef(inner_id, &b).unwrap();
        b.add_field(outer_id, f).unwrap();
        b.add_field(outer_id, field("n", 2, FieldType::Int32)).unwrap();

        let copy_id = b.dup_message(outer_id).unwrap();
        let copy = b.message(copy_id).unwrap();
        assert_eq!(copy.field_count(), 2);

        let copy_f = b.field(copy.find_by_name("inner").unwrap()).unwrap();
        assert_eq!(copy_f.subdef(), None);
        assert_eq!(copy_f.subdef_name(), Some("test.Inner"));

        // Resolving through a symbol table reproduces the original
        // relation. The copy keeps its name, so it must be renamed before
        // both it and the original can be registered.
        b.message_mut(copy_id)
            .unwrap()
            .set_full_name("test.OuterCopy")
            .unwrap();
        let mut symtab = SymbolTable::new();
        symtab.add_all(&b).unwrap();
        symtab.resolve(&mut b).unwrap();
        let copy = b.message(copy_id).unwrap();
        let copy_f = b.field(copy.find_by_name("inner").unwrap()).unwrap();
        assert_eq!(copy_f.subdef(), Some(inner_id));

        let schema = b.freeze(&[copy_id]).unwrap();
        assert!(schema.find_message("test.Inner").is_some());
    }

    #[test]
    fn test_enum_default_resolution() {
        let mut b = SchemaBuilder::new();
        let mut colors = EnumDef::new();
        colors.set_full_name("test.Color").unwrap();
        colors.add_value("RED", 1).unwrap();
        colors.add_value("GREEN", 2).unwrap();
        let e = b.add_enum(colors);

        let m = b.add_message(MessageDef::new());
        let mut f = field("color", 1, FieldType::Enum);
        f.set_subdef(e, &b).unwrap();
        f.set_default_string(b"GREEN").unwrap();
        b.add_field(m, f).unwrap();

        // Freezing with the default still symbolic fails closed.
        let err = b.freeze(&[m]).err().unwrap();
        assert!(matches!(err, SchemaError::SymbolicDefault(_)));

        let symtab = SymbolTable::new();
        symtab.resolve(&mut b).unwrap();
        let schema = b.freeze(&[m]).unwrap();
        let root = schema.roots()[0];
        let color = schema
            .field(schema.message(root).unwrap().find_by_name("color").unwrap())
            .unwrap();
        assert_eq!(color.default_value(), Some(&DefaultValue::Int32(2)));
    }

    #[test]
    fn test_casts() {
        let mut b = SchemaBuilder::new();
        let m = b.add_message(MessageDef::new());
        let e = b.add_enum(EnumDef::new());

        assert!(b.get(m).unwrap().as_message().is_some());
        assert!(b.get(m).unwrap().as_enum().is_none());
        assert!(b.get(e).unwrap().as_enum().is_some());
        assert!(b.get(e).unwrap().as_field().is_none());
    }
}

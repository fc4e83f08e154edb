//! Field definitions and the enums describing their types and encodings.

use crate::schema::{DefId, SchemaBuilder, SchemaError};
use crate::wire::{WireType, MAX_FIELD_NUMBER, RESERVED_NUMBER_END, RESERVED_NUMBER_START};

/// Semantic type of a field.
///
/// This list is not identical to the types in `descriptor.proto`, which
/// gives eg. `int32` and `sint32` separate types. Here the two differ only
/// in their [`IntegerFormat`]; the pairing is captured by
/// [`DescriptorType`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FieldType {
    Float = 1,
    Double = 2,
    Bool = 3,
    String = 4,
    Bytes = 5,
    Message = 6,
    /// Enum values are int32.
    Enum = 7,
    Int32 = 8,
    Uint32 = 9,
    Int64 = 10,
    Uint64 = 11,
}

impl FieldType {
    pub fn from_i32(value: i32) -> Option<FieldType> {
        match value {
            1 => Some(FieldType::Float),
            2 => Some(FieldType::Double),
            3 => Some(FieldType::Bool),
            4 => Some(FieldType::String),
            5 => Some(FieldType::Bytes),
            6 => Some(FieldType::Message),
            7 => Some(FieldType::Enum),
            8 => Some(FieldType::Int32),
            9 => Some(FieldType::Uint32),
            10 => Some(FieldType::Int64),
            11 => Some(FieldType::Uint64),
            _ => None,
        }
    }

    /// Return true for the integer types that may legally use
    /// [`IntegerFormat::ZigZag`].
    pub fn is_signed_integer(self) -> bool {
        matches!(self, FieldType::Int32 | FieldType::Int64)
    }

    fn is_integer(self) -> bool {
        matches!(
            self,
            FieldType::Int32 | FieldType::Uint32 | FieldType::Int64 | FieldType::Uint64
        )
    }
}

/// The repeated-ness of a field. This matches `descriptor.proto`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Label {
    Optional = 1,
    Required = 2,
    Repeated = 3,
}

impl Label {
    pub fn from_i32(value: i32) -> Option<Label> {
        match value {
            1 => Some(Label::Optional),
            2 => Some(Label::Required),
            3 => Some(Label::Repeated),
            _ => None,
        }
    }
}

/// How integers are encoded on the wire.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum IntegerFormat {
    Variable = 1,
    Fixed = 2,
    /// Only for signed types (Int32/Int64).
    ZigZag = 3,
}

impl IntegerFormat {
    pub fn from_i32(value: i32) -> Option<IntegerFormat> {
        match value {
            1 => Some(IntegerFormat::Variable),
            2 => Some(IntegerFormat::Fixed),
            3 => Some(IntegerFormat::ZigZag),
            _ => None,
        }
    }
}

/// Field types as defined in `descriptor.proto`.
///
/// A descriptor type is equivalent to the triple of a [`FieldType`], an
/// [`IntegerFormat`] and a tag-delimited flag; see
/// [`components`](DescriptorType::components) and
/// [`from_components`](DescriptorType::from_components).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum DescriptorType {
    Double = 1,
    Float = 2,
    Int64 = 3,
    Uint64 = 4,
    Int32 = 5,
    Fixed64 = 6,
    Fixed32 = 7,
    Bool = 8,
    String = 9,
    Group = 10,
    Message = 11,
    Bytes = 12,
    Uint32 = 13,
    Enum = 14,
    Sfixed32 = 15,
    Sfixed64 = 16,
    Sint32 = 17,
    Sint64 = 18,
}

impl DescriptorType {
    pub fn from_i32(value: i32) -> Option<DescriptorType> {
        use DescriptorType::*;
        match value {
            1 => Some(Double),
            2 => Some(Float),
            3 => Some(Int64),
            4 => Some(Uint64),
            5 => Some(Int32),
            6 => Some(Fixed64),
            7 => Some(Fixed32),
            8 => Some(Bool),
            9 => Some(String),
            10 => Some(Group),
            11 => Some(Message),
            12 => Some(Bytes),
            13 => Some(Uint32),
            14 => Some(Enum),
            15 => Some(Sfixed32),
            16 => Some(Sfixed64),
            17 => Some(Sint32),
            18 => Some(Sint64),
            _ => None,
        }
    }

    /// Decompose into semantic type, integer format and tag-delimited flag.
    pub fn components(self) -> (FieldType, IntegerFormat, bool) {
        use DescriptorType::*;
        let (ty, fmt) = match self {
            Double => (FieldType::Double, IntegerFormat::Variable),
            Float => (FieldType::Float, IntegerFormat::Variable),
            Int64 => (FieldType::Int64, IntegerFormat::Variable),
            Uint64 => (FieldType::Uint64, IntegerFormat::Variable),
            Int32 => (FieldType::Int32, IntegerFormat::Variable),
            Fixed64 => (FieldType::Uint64, IntegerFormat::Fixed),
            Fixed32 => (FieldType::Uint32, IntegerFormat::Fixed),
            Bool => (FieldType::Bool, IntegerFormat::Variable),
            String => (FieldType::String, IntegerFormat::Variable),
            Group => (FieldType::Message, IntegerFormat::Variable),
            Message => (FieldType::Message, IntegerFormat::Variable),
            Bytes => (FieldType::Bytes, IntegerFormat::Variable),
            Uint32 => (FieldType::Uint32, IntegerFormat::Variable),
            Enum => (FieldType::Enum, IntegerFormat::Variable),
            Sfixed32 => (FieldType::Int32, IntegerFormat::Fixed),
            Sfixed64 => (FieldType::Int64, IntegerFormat::Fixed),
            Sint32 => (FieldType::Int32, IntegerFormat::ZigZag),
            Sint64 => (FieldType::Int64, IntegerFormat::ZigZag),
        };
        (ty, fmt, self == Group)
    }

    /// Recompose from semantic type, integer format and tag-delimited flag.
    ///
    /// Returns `None` for combinations that have no wire representation,
    /// such as a zig-zag unsigned integer or a tag-delimited string.
    pub fn from_components(
        ty: FieldType,
        fmt: IntegerFormat,
        tag_delimited: bool,
    ) -> Option<DescriptorType> {
        use DescriptorType as D;
        if tag_delimited && ty != FieldType::Message {
            return None;
        }
        if fmt != IntegerFormat::Variable && !ty.is_integer() {
            return None;
        }
        let dt = match (ty, fmt) {
            (FieldType::Double, _) => D::Double,
            (FieldType::Float, _) => D::Float,
            (FieldType::Bool, _) => D::Bool,
            (FieldType::String, _) => D::String,
            (FieldType::Bytes, _) => D::Bytes,
            (FieldType::Enum, _) => D::Enum,
            (FieldType::Message, _) => {
                if tag_delimited {
                    D::Group
                } else {
                    D::Message
                }
            }
            (FieldType::Int32, IntegerFormat::Variable) => D::Int32,
            (FieldType::Int32, IntegerFormat::Fixed) => D::Sfixed32,
            (FieldType::Int32, IntegerFormat::ZigZag) => D::Sint32,
            (FieldType::Uint32, IntegerFormat::Variable) => D::Uint32,
            (FieldType::Uint32, IntegerFormat::Fixed) => D::Fixed32,
            (FieldType::Int64, IntegerFormat::Variable) => D::Int64,
            (FieldType::Int64, IntegerFormat::Fixed) => D::Sfixed64,
            (FieldType::Int64, IntegerFormat::ZigZag) => D::Sint64,
            (FieldType::Uint64, IntegerFormat::Variable) => D::Uint64,
            (FieldType::Uint64, IntegerFormat::Fixed) => D::Fixed64,
            (FieldType::Uint32 | FieldType::Uint64, IntegerFormat::ZigZag) => return None,
        };
        Some(dt)
    }

    /// The wire type a singular field of this type is encoded with.
    pub fn native_wire_type(self) -> WireType {
        use DescriptorType::*;
        match self {
            Double | Fixed64 | Sfixed64 => WireType::I64,
            Float | Fixed32 | Sfixed32 => WireType::I32,
            Int64 | Uint64 | Int32 | Uint32 | Bool | Enum | Sint32 | Sint64 => WireType::Varint,
            String | Bytes | Message => WireType::Len,
            Group => WireType::Sgroup,
        }
    }

    /// Return true for types whose repeated form may use the packed
    /// encoding (all numeric/bool/enum types).
    pub fn is_numeric(self) -> bool {
        !matches!(
            self,
            DescriptorType::String
                | DescriptorType::Bytes
                | DescriptorType::Message
                | DescriptorType::Group
        )
    }
}

/// Default value of a singular field.
///
/// An enum default may be set symbolically while the schema is mutable; it
/// must be resolved to an `Int32` before the schema can be frozen.
#[derive(Clone, Debug, PartialEq)]
pub enum DefaultValue {
    Float(f32),
    Double(f64),
    Bool(bool),
    Int32(i32),
    Int64(i64),
    Uint32(u32),
    Uint64(u64),
    Bytes(Vec<u8>),
    /// Symbolic enum default, pending resolution against the field's
    /// enum def.
    EnumName(String),
}

impl DefaultValue {
    /// The "default default" for a field of the given type: zero for
    /// numbers, false for bools, empty for strings. Message fields have no
    /// default.
    fn zero_for(ty: FieldType) -> Option<DefaultValue> {
        match ty {
            FieldType::Float => Some(DefaultValue::Float(0.0)),
            FieldType::Double => Some(DefaultValue::Double(0.0)),
            FieldType::Bool => Some(DefaultValue::Bool(false)),
            FieldType::String | FieldType::Bytes => Some(DefaultValue::Bytes(Vec::new())),
            FieldType::Enum | FieldType::Int32 => Some(DefaultValue::Int32(0)),
            FieldType::Uint32 => Some(DefaultValue::Uint32(0)),
            FieldType::Int64 => Some(DefaultValue::Int64(0)),
            FieldType::Uint64 => Some(DefaultValue::Uint64(0)),
            FieldType::Message => None,
        }
    }

    fn matches_type(&self, ty: FieldType) -> bool {
        matches!(
            (self, ty),
            (DefaultValue::Float(_), FieldType::Float)
                | (DefaultValue::Double(_), FieldType::Double)
                | (DefaultValue::Bool(_), FieldType::Bool)
                | (DefaultValue::Int32(_), FieldType::Int32)
                | (DefaultValue::Int32(_), FieldType::Enum)
                | (DefaultValue::Int64(_), FieldType::Int64)
                | (DefaultValue::Uint32(_), FieldType::Uint32)
                | (DefaultValue::Uint64(_), FieldType::Uint64)
                | (DefaultValue::Bytes(_), FieldType::String)
                | (DefaultValue::Bytes(_), FieldType::Bytes)
        )
    }
}

/// Reference from a message/enum-typed field to the def describing its type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SubDef {
    /// Resolved reference to a def in the same builder.
    Def(DefId),

    /// Symbolic reference by full name, pending resolution.
    Name(String),
}

/// Describes a single field of a message.
///
/// A field def is configured while standalone and then moved into its
/// message with [`SchemaBuilder::add_field`](crate::schema::SchemaBuilder).
#[derive(Clone, Debug)]
pub struct FieldDef {
    name: Option<String>,
    ty: Option<FieldType>,
    label: Label,
    number: u32,
    intfmt: IntegerFormat,
    tag_delimited: bool,
    default: Option<DefaultValue>,
    subdef: Option<SubDef>,
    parent: Option<DefId>,
    selector_base: u32,
}

impl FieldDef {
    pub fn new() -> FieldDef {
        FieldDef {
            name: None,
            ty: None,
            label: Label::Optional,
            number: 0,
            intfmt: IntegerFormat::Variable,
            tag_delimited: false,
            default: None,
            subdef: None,
            parent: None,
            selector_base: 0,
        }
    }

    /// The field's simple name, unique within its message. `None` if not
    /// yet set.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// The field number. Zero if not yet set.
    pub fn number(&self) -> u32 {
        self.number
    }

    /// Whether `set_type` or `set_descriptor_type` has been called. A field
    /// without a type cannot be frozen.
    pub fn type_is_set(&self) -> bool {
        self.ty.is_some()
    }

    /// The field's semantic type. Requires [`type_is_set`](Self::type_is_set).
    pub fn field_type(&self) -> Option<FieldType> {
        self.ty
    }

    pub fn label(&self) -> Label {
        self.label
    }

    pub fn integer_format(&self) -> IntegerFormat {
        self.intfmt
    }

    /// Whether a submessage field uses start/end group tags rather than a
    /// length prefix.
    pub fn is_tag_delimited(&self) -> bool {
        self.tag_delimited
    }

    /// The field's type as the enum in `descriptor.proto` expresses it: a
    /// function of the semantic type, integer format and tag-delimited flag.
    pub fn descriptor_type(&self) -> Option<DescriptorType> {
        let ty = self.ty?;
        DescriptorType::from_components(ty, self.intfmt, self.tag_delimited)
    }

    /// The containing message, or `None` for a standalone field.
    pub fn parent(&self) -> Option<DefId> {
        self.parent
    }

    /// Base index of this field's block of handler selectors. Assigned when
    /// the schema is frozen.
    pub fn selector_base(&self) -> u32 {
        self.selector_base
    }

    pub fn default_value(&self) -> Option<&DefaultValue> {
        self.default.as_ref()
    }

    /// Whether the default is a symbolic enum name that still needs
    /// resolution.
    pub fn default_is_symbolic(&self) -> bool {
        matches!(self.default, Some(DefaultValue::EnumName(_)))
    }

    pub fn is_submessage(&self) -> bool {
        self.ty == Some(FieldType::Message)
    }

    pub fn is_string(&self) -> bool {
        matches!(self.ty, Some(FieldType::String | FieldType::Bytes))
    }

    pub fn is_sequence(&self) -> bool {
        self.label == Label::Repeated
    }

    pub fn is_primitive(&self) -> bool {
        !self.is_submessage() && !self.is_string()
    }

    /// Whether this field's type requires a subdef (message and enum
    /// fields). This is true even while the subdef is not set yet.
    pub fn has_subdef(&self) -> bool {
        matches!(self.ty, Some(FieldType::Message | FieldType::Enum))
    }

    /// The resolved subdef, if the subdef is currently set directly.
    pub fn subdef(&self) -> Option<DefId> {
        match &self.subdef {
            Some(SubDef::Def(id)) => Some(*id),
            _ => None,
        }
    }

    /// The symbolic subdef name, if the subdef is currently set symbolically.
    pub fn subdef_name(&self) -> Option<&str> {
        match &self.subdef {
            Some(SubDef::Name(name)) => Some(name),
            _ => None,
        }
    }

    /// Set the semantic type.
    ///
    /// Setting the type resets the integer format, tag-delimited flag,
    /// default value and subdef to their defaults for the new type.
    pub fn set_type(&mut self, ty: FieldType) {
        self.ty = Some(ty);
        self.intfmt = IntegerFormat::Variable;
        self.tag_delimited = false;
        self.default = DefaultValue::zero_for(ty);
        self.subdef = None;
    }

    /// Set the type from its `descriptor.proto` representation. Sets the
    /// semantic type, integer format and tag-delimited flag together.
    pub fn set_descriptor_type(&mut self, dt: DescriptorType) {
        let (ty, fmt, tag_delimited) = dt.components();
        self.set_type(ty);
        self.intfmt = fmt;
        self.tag_delimited = tag_delimited;
    }

    pub fn set_label(&mut self, label: Label) {
        self.label = label;
    }

    /// Set the field number. Must be in `[1, 2^29 - 1]` and outside the
    /// reserved range. May not be changed once the field is part of a
    /// message.
    pub fn set_number(&mut self, number: u32) -> Result<(), SchemaError> {
        if self.parent.is_some() {
            return Err(SchemaError::FieldInMessage);
        }
        if number == 0
            || number > MAX_FIELD_NUMBER
            || (RESERVED_NUMBER_START..=RESERVED_NUMBER_END).contains(&number)
        {
            return Err(SchemaError::BadFieldNumber(number));
        }
        self.number = number;
        Ok(())
    }

    /// Set the field name. Must be a simple (undotted) identifier. May not
    /// be changed once the field is part of a message.
    pub fn set_name(&mut self, name: &str) -> Result<(), SchemaError> {
        if self.parent.is_some() {
            return Err(SchemaError::FieldInMessage);
        }
        if !is_ident(name) {
            return Err(SchemaError::BadName(name.to_string()));
        }
        self.name = Some(name.to_string());
        Ok(())
    }

    /// Set the integer encoding. Only meaningful for integer types; the
    /// zig-zag/signedness pairing is checked when the schema is frozen.
    pub fn set_integer_format(&mut self, fmt: IntegerFormat) {
        self.intfmt = fmt;
    }

    /// Choose group framing for a submessage field. Errors unless the
    /// field's type is `Message`.
    pub fn set_tag_delimited(&mut self, tag_delimited: bool) -> Result<(), SchemaError> {
        if self.ty != Some(FieldType::Message) {
            return Err(SchemaError::NotTagDelimitable);
        }
        self.tag_delimited = tag_delimited;
        Ok(())
    }

    /// Set a numeric (or bool) default value. The value's variant must
    /// match the field's type; enum fields take `Int32`.
    pub fn set_default(&mut self, value: DefaultValue) -> Result<(), SchemaError> {
        let Some(ty) = self.ty else {
            return Err(SchemaError::TypeNotSet);
        };
        if !value.matches_type(ty) {
            return Err(SchemaError::InvalidDefault);
        }
        self.default = Some(value);
        Ok(())
    }

    /// Set a string default.
    ///
    /// For string/bytes fields this stores the bytes. For enum fields the
    /// bytes are interpreted as a symbolic value name, to be resolved
    /// before freezing.
    pub fn set_default_string(&mut self, value: &[u8]) -> Result<(), SchemaError> {
        match self.ty {
            Some(FieldType::String | FieldType::Bytes) => {
                self.default = Some(DefaultValue::Bytes(value.to_vec()));
                Ok(())
            }
            Some(FieldType::Enum) => {
                let name = std::str::from_utf8(value)
                    .map_err(|_| SchemaError::InvalidDefault)?
                    .to_string();
                self.default = Some(DefaultValue::EnumName(name));
                Ok(())
            }
            Some(_) => Err(SchemaError::InvalidDefault),
            None => Err(SchemaError::TypeNotSet),
        }
    }

    /// Resolve a symbolic enum default against the field's resolved enum
    /// def.
    ///
    /// A no-op if the default is not symbolic. Errors if the subdef is not
    /// a resolved enum or the name is not a value of the enum.
    pub fn resolve_enum_default(&mut self, schema: &SchemaBuilder) -> Result<(), SchemaError> {
        let Some(DefaultValue::EnumName(name)) = &self.default else {
            return Ok(());
        };
        let Some(SubDef::Def(id)) = &self.subdef else {
            return Err(SchemaError::UnresolvedSubDef(self.describe()));
        };
        let enum_def = schema
            .get(*id)
            .and_then(|def| def.as_enum())
            .ok_or_else(|| SchemaError::UnresolvedSubDef(self.describe()))?;
        let number = enum_def
            .find_by_name(name)
            .ok_or_else(|| SchemaError::UnknownEnumValue(name.clone()))?;
        self.default = Some(DefaultValue::Int32(number));
        Ok(())
    }

    /// Set the subdef directly. Requires a message/enum-typed field and a
    /// def of the matching variant. Clears any symbolic name.
    pub fn set_subdef(&mut self, subdef: DefId, schema: &SchemaBuilder) -> Result<(), SchemaError> {
        let def = schema.get(subdef).ok_or(SchemaError::BadDefId)?;
        let matches = match self.ty {
            Some(FieldType::Message) => def.as_message().is_some(),
            Some(FieldType::Enum) => def.as_enum().is_some(),
            _ => return Err(SchemaError::NoSubDef),
        };
        if !matches {
            return Err(SchemaError::SubDefVariantMismatch(self.describe()));
        }
        self.subdef = Some(SubDef::Def(subdef));
        Ok(())
    }

    /// Set the subdef symbolically by full name. Clears any direct
    /// reference. The name is resolved through a
    /// [`SymbolTable`](crate::schema::SymbolTable) before freezing.
    pub fn set_subdef_name(&mut self, name: &str) -> Result<(), SchemaError> {
        if !self.has_subdef() {
            return Err(SchemaError::NoSubDef);
        }
        self.subdef = Some(SubDef::Name(name.to_string()));
        Ok(())
    }

    pub(crate) fn subdef_ref(&self) -> Option<&SubDef> {
        self.subdef.as_ref()
    }

    pub(crate) fn set_subdef_unchecked(&mut self, subdef: SubDef) {
        self.subdef = Some(subdef);
    }

    pub(crate) fn clear_subdef(&mut self) {
        self.subdef = None;
    }

    pub(crate) fn set_parent(&mut self, parent: DefId) {
        self.parent = Some(parent);
    }

    pub(crate) fn set_selector_base(&mut self, base: u32) {
        self.selector_base = base;
    }

    /// Name used to identify this field in errors.
    pub(crate) fn describe(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => format!("#{}", self.number),
        }
    }
}

impl Default for FieldDef {
    fn default() -> FieldDef {
        FieldDef::new()
    }
}

/// Return true if `name` is a valid identifier: letters, digits and
/// underscores, not starting with a digit.
pub(crate) fn is_ident(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with(|c: char| c.is_ascii_digit())
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Return true if `name` is a valid dotted sequence of identifiers, eg.
/// `foo.bar.Message`.
pub(crate) fn is_dotted_ident(name: &str) -> bool {
    !name.is_empty() && name.split('.').all(is_ident)
}

//! Handler tables: typed callbacks dispatched by the decoder.
//!
//! A [`Handlers`] is a table of callbacks bound to one frozen message def.
//! Callbacks are registered per field and stored in a flat slot table
//! addressed by *selectors* — dense integers computed from the field's
//! selector base plus a per-kind offset — so the decoder dispatches with a
//! single index. Message-typed fields additionally link to the handlers of
//! their submessage type.
//!
//! Handler tables are generic over a closure type `C`: the consumer's
//! per-frame state. Start handlers for strings, submessages and sequences
//! return a fresh `C` for the inner scope, forming a stack of closures that
//! mirrors the nesting of the input. Returning `None` from a start handler
//! or `false` from any other aborts decoding.
//!
//! Like schema defs, handler tables are mutable while being assembled and
//! immutable afterwards: [`Handlers::freeze`] consumes a set of tables and
//! produces a shared [`HandlerPlan`] with all submessage links resolved.
//! A frozen plan may be shared freely across threads; each decoder only
//! needs a reference to it.

use std::error::Error;
use std::fmt;
use std::fmt::Display;
use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::pipeline::Status;
use crate::schema::{DefId, FieldDef, FieldType, Schema};

/// Selector of a message's StartMessage handler.
pub const SELECTOR_START_MESSAGE: u32 = 0;

/// Selector of a message's EndMessage handler.
pub const SELECTOR_END_MESSAGE: u32 = 1;

/// Per-field selector offsets. Each field reserves a block of eight slots
/// starting at its selector base.
pub const SELECTOR_VALUE: u32 = 0;
pub const SELECTOR_START_STRING: u32 = 1;
pub const SELECTOR_STRING_BUF: u32 = 2;
pub const SELECTOR_END_STRING: u32 = 3;
pub const SELECTOR_START_SUBMSG: u32 = 4;
pub const SELECTOR_END_SUBMSG: u32 = 5;
pub const SELECTOR_START_SEQUENCE: u32 = 6;
pub const SELECTOR_END_SEQUENCE: u32 = 7;

pub type StartMessageFn<C> = Box<dyn Fn(&mut C) -> bool + Send + Sync>;
pub type EndMessageFn<C> = Box<dyn Fn(&mut C, &mut Status) -> bool + Send + Sync>;
pub type ValueFn<C, T> = Box<dyn Fn(&mut C, T) -> bool + Send + Sync>;
pub type StartStringFn<C> = Box<dyn Fn(&mut C, u64) -> Option<C> + Send + Sync>;
pub type StringBufFn<C> = Box<dyn Fn(&mut C, &[u8]) -> usize + Send + Sync>;
pub type EndStringFn<C> = Box<dyn Fn(&mut C, &mut Status) -> bool + Send + Sync>;
pub type StartFn<C> = Box<dyn Fn(&mut C) -> Option<C> + Send + Sync>;
pub type EndFn<C> = Box<dyn Fn(&mut C) -> bool + Send + Sync>;

/// A registered handler occupying one selector slot.
pub(crate) enum Slot<C> {
    StartMessage(StartMessageFn<C>),
    EndMessage(EndMessageFn<C>),
    Int32(ValueFn<C, i32>),
    Int64(ValueFn<C, i64>),
    Uint32(ValueFn<C, u32>),
    Uint64(ValueFn<C, u64>),
    Float(ValueFn<C, f32>),
    Double(ValueFn<C, f64>),
    Bool(ValueFn<C, bool>),
    StartString(StartStringFn<C>),
    StringBuf(StringBufFn<C>),
    EndString(EndStringFn<C>),
    StartSubMessage(StartFn<C>),
    EndSubMessage(EndFn<C>),
    StartSequence(StartFn<C>),
    EndSequence(EndFn<C>),
}

/// Errors registering handlers or freezing a handler plan.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandlerError {
    /// The def handle is not a message (or field) of the bound schema.
    BadDefId,
    /// The field belongs to a different message than the handlers.
    WrongMessage,
    /// The handler kind is not valid for the field's type or label.
    BadKind,
    /// Sub-handlers were built against a different schema.
    SchemaMismatch,
    /// Sub-handlers are bound to a message other than the field's subdef.
    SubDefMismatch,
    /// A plan freeze found no handlers for a linked submessage type.
    MissingSubHandlers(String),
    /// Two handler tables in one freeze set bind the same message.
    DuplicateMessage(String),
    /// Freeze was called with an empty set.
    EmptyPlan,
}

impl Display for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandlerError::BadDefId => write!(f, "def handle is invalid for this schema"),
            HandlerError::WrongMessage => {
                write!(f, "field belongs to a different message")
            }
            HandlerError::BadKind => {
                write!(f, "handler kind is not valid for this field")
            }
            HandlerError::SchemaMismatch => {
                write!(f, "sub-handlers were built against a different schema")
            }
            HandlerError::SubDefMismatch => {
                write!(f, "sub-handlers are bound to the wrong message")
            }
            HandlerError::MissingSubHandlers(name) => {
                write!(f, "no handlers in the plan for message \"{}\"", name)
            }
            HandlerError::DuplicateMessage(name) => {
                write!(f, "multiple handler tables for message \"{}\"", name)
            }
            HandlerError::EmptyPlan => write!(f, "a handler plan needs at least one table"),
        }
    }
}

impl Error for HandlerError {}

/// Class of value a field's value handler receives.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum ValueClass {
    I32,
    I64,
    U32,
    U64,
    F32,
    F64,
    Bool,
}

fn value_class(ty: FieldType) -> Option<ValueClass> {
    match ty {
        FieldType::Int32 | FieldType::Enum => Some(ValueClass::I32),
        FieldType::Int64 => Some(ValueClass::I64),
        FieldType::Uint32 => Some(ValueClass::U32),
        FieldType::Uint64 => Some(ValueClass::U64),
        FieldType::Float => Some(ValueClass::F32),
        FieldType::Double => Some(ValueClass::F64),
        FieldType::Bool => Some(ValueClass::Bool),
        FieldType::String | FieldType::Bytes | FieldType::Message => None,
    }
}

/// Mutable handler table bound to one message of a frozen schema.
pub struct Handlers<C> {
    schema: Arc<Schema>,
    msg: DefId,
    slots: Vec<Option<Slot<C>>>,
    subs: FxHashMap<DefId, DefId>,
}

impl<C> Handlers<C> {
    /// Create an empty handler table for a message of `schema`.
    pub fn new(schema: &Arc<Schema>, msg: DefId) -> Result<Handlers<C>, HandlerError> {
        let msg_def = schema.message(msg).ok_or(HandlerError::BadDefId)?;
        let mut slots = Vec::new();
        slots.resize_with(msg_def.selector_count() as usize, || None);
        Ok(Handlers {
            schema: Arc::clone(schema),
            msg,
            slots,
            subs: FxHashMap::default(),
        })
    }

    /// The message def this table is bound to.
    pub fn message(&self) -> DefId {
        self.msg
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn set_start_message(&mut self, f: impl Fn(&mut C) -> bool + Send + Sync + 'static) {
        self.slots[SELECTOR_START_MESSAGE as usize] = Some(Slot::StartMessage(Box::new(f)));
    }

    pub fn set_end_message(
        &mut self,
        f: impl Fn(&mut C, &mut Status) -> bool + Send + Sync + 'static,
    ) {
        self.slots[SELECTOR_END_MESSAGE as usize] = Some(Slot::EndMessage(Box::new(f)));
    }

    pub fn set_int32(
        &mut self,
        field: DefId,
        f: impl Fn(&mut C, i32) -> bool + Send + Sync + 'static,
    ) -> Result<(), HandlerError> {
        self.set_value_slot(field, ValueClass::I32, Slot::Int32(Box::new(f)))
    }

    pub fn set_int64(
        &mut self,
        field: DefId,
        f: impl Fn(&mut C, i64) -> bool + Send + Sync + 'static,
    ) -> Result<(), HandlerError> {
        self.set_value_slot(field, ValueClass::I64, Slot::Int64(Box::new(f)))
    }

    pub fn set_uint32(
        &mut self,
        field: DefId,
        f: impl Fn(&mut C, u32) -> bool + Send + Sync + 'static,
    ) -> Result<(), HandlerError> {
        self.set_value_slot(field, ValueClass::U32, Slot::Uint32(Box::new(f)))
    }

    pub fn set_uint64(
        &mut self,
        field: DefId,
        f: impl Fn(&mut C, u64) -> bool + Send + Sync + 'static,
    ) -> Result<(), HandlerError> {
        self.set_value_slot(field, ValueClass::U64, Slot::Uint64(Box::new(f)))
    }

    pub fn set_float(
        &mut self,
        field: DefId,
        f: impl Fn(&mut C, f32) -> bool + Send + Sync + 'static,
    ) -> Result<(), HandlerError> {
        self.set_value_slot(field, ValueClass::F32, Slot::Float(Box::new(f)))
    }

    pub fn set_double(
        &mut self,
        field: DefId,
        f: impl Fn(&mut C, f64) -> bool + Send + Sync + 'static,
    ) -> Result<(), HandlerError> {
        self.set_value_slot(field, ValueClass::F64, Slot::Double(Box::new(f)))
    }

    pub fn set_bool(
        &mut self,
        field: DefId,
        f: impl Fn(&mut C, bool) -> bool + Send + Sync + 'static,
    ) -> Result<(), HandlerError> {
        self.set_value_slot(field, ValueClass::Bool, Slot::Bool(Box::new(f)))
    }

    /// Register the handler called at the start of a string/bytes value.
    ///
    /// Receives the value's byte length as a size hint and returns the
    /// closure that [`StringBufFn`] chunks are delivered to.
    pub fn set_start_string(
        &mut self,
        field: DefId,
        f: impl Fn(&mut C, u64) -> Option<C> + Send + Sync + 'static,
    ) -> Result<(), HandlerError> {
        let field_def = self.check_string_field(field)?;
        let sel = field_def.selector_base() + SELECTOR_START_STRING;
        self.slots[sel as usize] = Some(Slot::StartString(Box::new(f)));
        Ok(())
    }

    /// Register the handler receiving chunks of a string/bytes value.
    ///
    /// The handler returns how many of the offered bytes it consumed; a
    /// short count suspends the decoder until the remainder is offered
    /// again.
    pub fn set_string_buf(
        &mut self,
        field: DefId,
        f: impl Fn(&mut C, &[u8]) -> usize + Send + Sync + 'static,
    ) -> Result<(), HandlerError> {
        let field_def = self.check_string_field(field)?;
        let sel = field_def.selector_base() + SELECTOR_STRING_BUF;
        self.slots[sel as usize] = Some(Slot::StringBuf(Box::new(f)));
        Ok(())
    }

    pub fn set_end_string(
        &mut self,
        field: DefId,
        f: impl Fn(&mut C, &mut Status) -> bool + Send + Sync + 'static,
    ) -> Result<(), HandlerError> {
        let field_def = self.check_string_field(field)?;
        let sel = field_def.selector_base() + SELECTOR_END_STRING;
        self.slots[sel as usize] = Some(Slot::EndString(Box::new(f)));
        Ok(())
    }

    /// Register the handler called when a submessage value begins. Returns
    /// the closure for the submessage's own handlers.
    pub fn set_start_submessage(
        &mut self,
        field: DefId,
        f: impl Fn(&mut C) -> Option<C> + Send + Sync + 'static,
    ) -> Result<(), HandlerError> {
        let field_def = self.check_submessage_field(field)?;
        let sel = field_def.selector_base() + SELECTOR_START_SUBMSG;
        self.slots[sel as usize] = Some(Slot::StartSubMessage(Box::new(f)));
        Ok(())
    }

    pub fn set_end_submessage(
        &mut self,
        field: DefId,
        f: impl Fn(&mut C) -> bool + Send + Sync + 'static,
    ) -> Result<(), HandlerError> {
        let field_def = self.check_submessage_field(field)?;
        let sel = field_def.selector_base() + SELECTOR_END_SUBMSG;
        self.slots[sel as usize] = Some(Slot::EndSubMessage(Box::new(f)));
        Ok(())
    }

    /// Register the handler called when a run of a repeated field begins.
    /// Returns the closure that the run's element handlers receive.
    pub fn set_start_sequence(
        &mut self,
        field: DefId,
        f: impl Fn(&mut C) -> Option<C> + Send + Sync + 'static,
    ) -> Result<(), HandlerError> {
        let field_def = self.check_sequence_field(field)?;
        let sel = field_def.selector_base() + SELECTOR_START_SEQUENCE;
        self.slots[sel as usize] = Some(Slot::StartSequence(Box::new(f)));
        Ok(())
    }

    pub fn set_end_sequence(
        &mut self,
        field: DefId,
        f: impl Fn(&mut C) -> bool + Send + Sync + 'static,
    ) -> Result<(), HandlerError> {
        let field_def = self.check_sequence_field(field)?;
        let sel = field_def.selector_base() + SELECTOR_END_SEQUENCE;
        self.slots[sel as usize] = Some(Slot::EndSequence(Box::new(f)));
        Ok(())
    }

    /// Link a submessage field to the handlers for its message type.
    ///
    /// `other` may be this table itself (a message whose field refers back
    /// to the message's own type links to itself by being bound to the same
    /// message def). The link is by bound message; it is resolved to a
    /// table when the plan is frozen, so `other` must be part of the same
    /// freeze set.
    pub fn set_sub_handlers(
        &mut self,
        field: DefId,
        other: &Handlers<C>,
    ) -> Result<(), HandlerError> {
        if !Arc::ptr_eq(&self.schema, &other.schema) {
            return Err(HandlerError::SchemaMismatch);
        }
        let field_def = self.check_submessage_field(field)?;
        if field_def.subdef() != Some(other.msg) {
            return Err(HandlerError::SubDefMismatch);
        }
        self.subs.insert(field, other.msg);
        Ok(())
    }

    /// Link a submessage field to this table itself.
    ///
    /// For self-recursive message types (a message with a field of its own
    /// type) the field's handlers are this very table.
    pub fn set_sub_handlers_self(&mut self, field: DefId) -> Result<(), HandlerError> {
        let field_def = self.check_submessage_field(field)?;
        if field_def.subdef() != Some(self.msg) {
            return Err(HandlerError::SubDefMismatch);
        }
        self.subs.insert(field, self.msg);
        Ok(())
    }

    /// Freeze a set of handler tables into an immutable, shareable plan.
    ///
    /// The set must contain exactly one table per linked message; the
    /// first table is the plan's root. On failure nothing is frozen.
    pub fn freeze(set: Vec<Handlers<C>>) -> Result<Arc<HandlerPlan<C>>, HandlerError> {
        let Some(first) = set.first() else {
            return Err(HandlerError::EmptyPlan);
        };
        let schema = Arc::clone(&first.schema);

        let mut by_msg: FxHashMap<DefId, usize> = FxHashMap::default();
        for (i, handlers) in set.iter().enumerate() {
            if !Arc::ptr_eq(&schema, &handlers.schema) {
                return Err(HandlerError::SchemaMismatch);
            }
            if by_msg.insert(handlers.msg, i).is_some() {
                let name = schema
                    .message(handlers.msg)
                    .and_then(|m| m.full_name())
                    .unwrap_or("(anonymous)");
                return Err(HandlerError::DuplicateMessage(name.to_string()));
            }
        }
        for handlers in &set {
            for sub_msg in handlers.subs.values() {
                if !by_msg.contains_key(sub_msg) {
                    let name = schema
                        .message(*sub_msg)
                        .and_then(|m| m.full_name())
                        .unwrap_or("(anonymous)");
                    return Err(HandlerError::MissingSubHandlers(name.to_string()));
                }
            }
        }

        let tables = set
            .into_iter()
            .map(|handlers| HandlerTable {
                msg: handlers.msg,
                slots: handlers.slots,
                subs: handlers
                    .subs
                    .into_iter()
                    .map(|(field, sub_msg)| (field, by_msg[&sub_msg]))
                    .collect(),
            })
            .collect();

        Ok(Arc::new(HandlerPlan { schema, tables }))
    }

    fn check_field(&self, field: DefId) -> Result<&FieldDef, HandlerError> {
        let field_def = self.schema.field(field).ok_or(HandlerError::BadDefId)?;
        if field_def.parent() != Some(self.msg) {
            return Err(HandlerError::WrongMessage);
        }
        Ok(field_def)
    }

    fn check_string_field(&self, field: DefId) -> Result<&FieldDef, HandlerError> {
        let field_def = self.check_field(field)?;
        if !field_def.is_string() {
            return Err(HandlerError::BadKind);
        }
        Ok(field_def)
    }

    fn check_submessage_field(&self, field: DefId) -> Result<&FieldDef, HandlerError> {
        let field_def = self.check_field(field)?;
        if !field_def.is_submessage() {
            return Err(HandlerError::BadKind);
        }
        Ok(field_def)
    }

    fn check_sequence_field(&self, field: DefId) -> Result<&FieldDef, HandlerError> {
        let field_def = self.check_field(field)?;
        if !field_def.is_sequence() {
            return Err(HandlerError::BadKind);
        }
        Ok(field_def)
    }

    fn set_value_slot(
        &mut self,
        field: DefId,
        class: ValueClass,
        slot: Slot<C>,
    ) -> Result<(), HandlerError> {
        let field_def = self.check_field(field)?;
        let ty = field_def.field_type().ok_or(HandlerError::BadKind)?;
        if value_class(ty) != Some(class) {
            return Err(HandlerError::BadKind);
        }
        let sel = field_def.selector_base() + SELECTOR_VALUE;
        self.slots[sel as usize] = Some(slot);
        Ok(())
    }
}

/// A frozen set of handler tables ready for decoding.
///
/// Immutable and shareable: one plan may back many decoders on many
/// threads.
pub struct HandlerPlan<C> {
    schema: Arc<Schema>,
    tables: Vec<HandlerTable<C>>,
}

impl<C> HandlerPlan<C> {
    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Index of the root table (the first table of the freeze set).
    pub(crate) fn root(&self) -> usize {
        0
    }

    pub(crate) fn table(&self, index: usize) -> &HandlerTable<C> {
        &self.tables[index]
    }
}

/// One message's frozen slot table within a plan.
pub(crate) struct HandlerTable<C> {
    msg: DefId,
    slots: Vec<Option<Slot<C>>>,
    subs: FxHashMap<DefId, usize>,
}

impl<C> HandlerTable<C> {
    pub(crate) fn msg(&self) -> DefId {
        self.msg
    }

    pub(crate) fn slot(&self, selector: u32) -> Option<&Slot<C>> {
        self.slots.get(selector as usize).and_then(|s| s.as_ref())
    }

    /// The plan-internal table index for a submessage field, if its
    /// sub-handlers were linked.
    pub(crate) fn sub_table(&self, field: DefId) -> Option<usize> {
        self.subs.get(&field).copied()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::{HandlerError, HandlerPlan, Handlers};
    use crate::schema::{
        DefId, FieldDef, FieldType, Label, MessageDef, Schema, SchemaBuilder,
    };

    fn field(name: &str, number: u32, ty: FieldType) -> FieldDef {
        let mut f = FieldDef::new();
        f.set_name(name).unwrap();
        f.set_number(number).unwrap();
        f.set_type(ty);
        f
    }

    /// Schema with two messages: `test.A` (int32 `n` = 1, repeated string
    /// `tags` = 2, message `child` = 3 of type `test.B`) and empty `test.B`.
    fn test_schema() -> Arc<Schema> {
        let mut b = SchemaBuilder::new();
        let mut msg_b = MessageDef::new();
        msg_b.set_full_name("test.B").unwrap();
        let b_id = b.add_message(msg_b);

        let mut msg_a = MessageDef::new();
        msg_a.set_full_name("test.A").unwrap();
        let a_id = b.add_message(msg_a);
        b.add_field(a_id, field("n", 1, FieldType::Int32)).unwrap();
        let mut tags = field("tags", 2, FieldType::String);
        tags.set_label(Label::Repeated);
        b.add_field(a_id, tags).unwrap();
        let mut child = field("child", 3, FieldType::Message);
        child.set_subdef(b_id, &b).unwrap();
        b.add_field(a_id, child).unwrap();

        Arc::new(b.freeze(&[a_id, b_id]).unwrap())
    }

    fn field_id(schema: &Schema, msg: DefId, name: &str) -> DefId {
        schema.message(msg).unwrap().find_by_name(name).unwrap()
    }

    #[test]
    fn test_register_and_freeze() {
        let schema = test_schema();
        let a = schema.find_message("test.A").unwrap();
        let b = schema.find_message("test.B").unwrap();

        let mut h: Handlers<u32> = Handlers::new(&schema, a).unwrap();
        h.set_start_message(|_| true);
        h.set_end_message(|_, _| true);
        h.set_int32(field_id(&schema, a, "n"), |_, _| true).unwrap();
        h.set_start_string(field_id(&schema, a, "tags"), |_, _| Some(0))
            .unwrap();
        h.set_start_sequence(field_id(&schema, a, "tags"), |_| Some(0))
            .unwrap();

        let sub: Handlers<u32> = Handlers::new(&schema, b).unwrap();
        h.set_sub_handlers(field_id(&schema, a, "child"), &sub).unwrap();

        let plan = Handlers::freeze(vec![h, sub]).unwrap();
        let root = plan.table(plan.root());
        assert_eq!(root.msg(), a);
        assert!(root.sub_table(field_id(&schema, a, "child")).is_some());
    }

    #[test]
    fn test_register_rejects_bad_kind() {
        let schema = test_schema();
        let a = schema.find_message("test.A").unwrap();
        let n = field_id(&schema, a, "n");
        let tags = field_id(&schema, a, "tags");

        let mut h: Handlers<u32> = Handlers::new(&schema, a).unwrap();

        // Value handler of the wrong class.
        assert_eq!(h.set_uint64(n, |_, _| true).err(), Some(HandlerError::BadKind));
        // String handler on a numeric field.
        assert_eq!(
            h.set_start_string(n, |_, _| Some(0)).err(),
            Some(HandlerError::BadKind)
        );
        // Sequence handler on a non-repeated field.
        assert_eq!(
            h.set_start_sequence(n, |_| Some(0)).err(),
            Some(HandlerError::BadKind)
        );
        // Submessage handler on a string field.
        assert_eq!(
            h.set_start_submessage(tags, |_| Some(0)).err(),
            Some(HandlerError::BadKind)
        );
    }

    #[test]
    fn test_register_rejects_foreign_field() {
        let schema = test_schema();
        let a = schema.find_message("test.A").unwrap();
        let b = schema.find_message("test.B").unwrap();

        let mut h: Handlers<u32> = Handlers::new(&schema, b).unwrap();
        let err = h.set_int32(field_id(&schema, a, "n"), |_, _| true).err();
        assert_eq!(err, Some(HandlerError::WrongMessage));
    }

    #[test]
    fn test_sub_handlers_must_match_subdef() {
        let schema = test_schema();
        let a = schema.find_message("test.A").unwrap();
        let child = field_id(&schema, a, "child");

        let mut h: Handlers<u32> = Handlers::new(&schema, a).unwrap();
        // Handlers for `test.A` where the field's type is `test.B`.
        let wrong: Handlers<u32> = Handlers::new(&schema, a).unwrap();
        assert_eq!(
            h.set_sub_handlers(child, &wrong).err(),
            Some(HandlerError::SubDefMismatch)
        );
    }

    #[test]
    fn test_freeze_requires_linked_tables() {
        let schema = test_schema();
        let a = schema.find_message("test.A").unwrap();
        let b = schema.find_message("test.B").unwrap();

        let mut h: Handlers<u32> = Handlers::new(&schema, a).unwrap();
        let sub: Handlers<u32> = Handlers::new(&schema, b).unwrap();
        h.set_sub_handlers(field_id(&schema, a, "child"), &sub).unwrap();

        // Freezing without the sub-table fails; nothing is frozen.
        let err = Handlers::freeze(vec![h]).err().unwrap();
        assert!(matches!(err, HandlerError::MissingSubHandlers(name) if name == "test.B"));
    }

    #[test]
    fn test_freeze_rejects_duplicate_message() {
        let schema = test_schema();
        let a = schema.find_message("test.A").unwrap();

        let h1: Handlers<u32> = Handlers::new(&schema, a).unwrap();
        let h2: Handlers<u32> = Handlers::new(&schema, a).unwrap();
        let err = Handlers::freeze(vec![h1, h2]).err().unwrap();
        assert!(matches!(err, HandlerError::DuplicateMessage(name) if name == "test.A"));
    }

    #[test]
    fn test_plan_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Arc<HandlerPlan<u32>>>();
    }
}

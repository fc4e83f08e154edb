//! Utilities shared by decoder tests: builders for arbitrary wire-format
//! buffers and an event-tracing consumer.
//!
//! The tracing consumer appends one line per handler event, indented by
//! the closure depth, in a format similar to protobuf text format but with
//! fields referred to by number and sequences explicitly delimited. Two
//! parses are equivalent iff their traces are equal, which is what the
//! buffer-split tests rely on.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use crate::handlers::{HandlerPlan, Handlers};
use crate::schema::{
    DefId, DescriptorType, EnumDef, FieldDef, Label, MessageDef, Schema, SchemaBuilder,
};
use crate::varint::{encode_varint, zigzag_encode32, zigzag_encode64};
use crate::wire::{WireType, MAX_FIELD_NUMBER};

/// Field with no handlers registered; used to pad protos without changing
/// the expected trace.
pub const NOP_FIELD: u32 = 40;

/// Field number deliberately absent from the test schema.
pub const UNKNOWN_FIELD: u32 = 666;

/// The repeated field number corresponding to a descriptor type's singular
/// field number.
pub fn rep_field(dt: DescriptorType) -> u32 {
    (MAX_FIELD_NUMBER - 1000) + dt as u32
}

pub fn varint(value: u64) -> Vec<u8> {
    encode_varint(value)
}

pub fn tag(field: u32, wire_type: WireType) -> Vec<u8> {
    encode_varint(((field as u64) << 3) | wire_type.tag_bits() as u64)
}

pub fn delim(body: &[u8]) -> Vec<u8> {
    let mut out = encode_varint(body.len() as u64);
    out.extend_from_slice(body);
    out
}

pub fn submsg(field: u32, body: &[u8]) -> Vec<u8> {
    cat(&[&tag(field, WireType::Len), &delim(body)])
}

pub fn fixed32(value: u32) -> Vec<u8> {
    value.to_le_bytes().to_vec()
}

pub fn fixed64(value: u64) -> Vec<u8> {
    value.to_le_bytes().to_vec()
}

pub fn flt(value: f32) -> Vec<u8> {
    value.to_le_bytes().to_vec()
}

pub fn dbl(value: f64) -> Vec<u8> {
    value.to_le_bytes().to_vec()
}

pub fn zz32(value: i32) -> Vec<u8> {
    encode_varint(zigzag_encode32(value))
}

pub fn zz64(value: i64) -> Vec<u8> {
    encode_varint(zigzag_encode64(value))
}

pub fn cat(parts: &[&[u8]]) -> Vec<u8> {
    let mut out = Vec::new();
    for part in parts {
        out.extend_from_slice(part);
    }
    out
}

/// Event-tracing consumer closure.
///
/// All clones share one output buffer; `depth` is per-scope and drives the
/// indentation, so the trace visually mirrors the nesting of events.
#[derive(Clone)]
pub struct Trace {
    out: Rc<RefCell<String>>,
    depth: usize,
}

impl Trace {
    pub fn new() -> Trace {
        Trace {
            out: Rc::new(RefCell::new(String::new())),
            depth: 0,
        }
    }

    /// The trace accumulated so far.
    pub fn take(&self) -> String {
        self.out.borrow().clone()
    }

    /// A scope one level deeper sharing the same output.
    pub fn child(&self) -> Trace {
        Trace {
            out: Rc::clone(&self.out),
            depth: self.depth + 1,
        }
    }

    /// Append an indented line.
    pub fn line(&self, text: &str) {
        let mut out = self.out.borrow_mut();
        for _ in 0..self.depth {
            out.push_str("  ");
        }
        out.push_str(text);
        out.push('\n');
    }

    /// Append indented text without a trailing newline (string values are
    /// completed by later events).
    pub fn open(&self, text: &str) {
        let mut out = self.out.borrow_mut();
        for _ in 0..self.depth {
            out.push_str("  ");
        }
        out.push_str(text);
    }

    /// Append raw bytes with no indentation.
    pub fn raw(&self, bytes: &[u8]) {
        self.out
            .borrow_mut()
            .push_str(&String::from_utf8_lossy(bytes));
    }
}

const ALL_TYPES: [DescriptorType; 18] = [
    DescriptorType::Double,
    DescriptorType::Float,
    DescriptorType::Int64,
    DescriptorType::Uint64,
    DescriptorType::Int32,
    DescriptorType::Fixed64,
    DescriptorType::Fixed32,
    DescriptorType::Bool,
    DescriptorType::String,
    DescriptorType::Group,
    DescriptorType::Message,
    DescriptorType::Bytes,
    DescriptorType::Uint32,
    DescriptorType::Enum,
    DescriptorType::Sfixed32,
    DescriptorType::Sfixed64,
    DescriptorType::Sint32,
    DescriptorType::Sint64,
];

/// Schema covering every descriptor type, with the singular field number
/// equal to the type's integer and a repeated twin at [`rep_field`].
/// Message and group fields are self-recursive. [`NOP_FIELD`] is a bytes
/// field that gets no handlers.
fn trace_schema() -> Arc<Schema> {
    let mut b = SchemaBuilder::new();
    let mut msg = MessageDef::new();
    msg.set_full_name("test.DecoderTest").unwrap();
    let m = b.add_message(msg);

    let mut enum_def = EnumDef::new();
    enum_def.set_full_name("test.DecoderTestEnum").unwrap();
    enum_def.add_value("ZERO", 0).unwrap();
    let e = b.add_enum(enum_def);

    fn add(b: &mut SchemaBuilder, m: DefId, e: DefId, number: u32, dt: DescriptorType, repeated: bool) {
        let name = if repeated {
            format!("r{}", dt as u32)
        } else {
            format!("f{}", dt as u32)
        };
        let mut f = FieldDef::new();
        f.set_name(&name).unwrap();
        f.set_number(number).unwrap();
        f.set_descriptor_type(dt);
        if repeated {
            f.set_label(Label::Repeated);
        }
        if matches!(dt, DescriptorType::Message | DescriptorType::Group) {
            f.set_subdef(m, b).unwrap();
        }
        if matches!(dt, DescriptorType::Enum) {
            f.set_subdef(e, b).unwrap();
        }
        b.add_field(m, f).unwrap();
    }

    for dt in ALL_TYPES {
        add(&mut b, m, e, dt as u32, dt, false);
        add(&mut b, m, e, rep_field(dt), dt, true);
    }
    let mut nop = FieldDef::new();
    nop.set_name("nop").unwrap();
    nop.set_number(NOP_FIELD).unwrap();
    nop.set_descriptor_type(DescriptorType::Bytes);
    b.add_field(m, nop).unwrap();

    Arc::new(b.freeze(&[m]).unwrap())
}

/// Frozen handler plan whose handlers record every event into a [`Trace`].
pub fn trace_plan() -> Arc<HandlerPlan<Trace>> {
    let schema = trace_schema();
    let msg_id = schema.roots()[0];

    let mut h: Handlers<Trace> = Handlers::new(&schema, msg_id).unwrap();
    h.set_start_message(|t| {
        t.line("<");
        true
    });
    h.set_end_message(|t, _status| {
        t.line(">");
        true
    });

    let fields: Vec<DefId> = schema.message(msg_id).unwrap().fields().collect();
    for id in fields {
        let field = schema.field(id).unwrap();
        let num = field.number();
        if num == NOP_FIELD {
            continue;
        }
        let dt = field.descriptor_type().unwrap();

        if field.is_sequence() {
            h.set_start_sequence(id, move |t| {
                t.line(&format!("{}:[", num));
                Some(t.child())
            })
            .unwrap();
            h.set_end_sequence(id, move |t| {
                t.line("]");
                true
            })
            .unwrap();
        }

        use DescriptorType::*;
        match dt {
            String | Bytes => {
                h.set_start_string(id, move |t, hint| {
                    t.open(&format!("{}:({})\"", num, hint));
                    Some(t.child())
                })
                .unwrap();
                h.set_string_buf(id, move |t, chunk| {
                    t.raw(chunk);
                    chunk.len()
                })
                .unwrap();
                h.set_end_string(id, move |t, _status| {
                    t.raw(b"\"\n");
                    true
                })
                .unwrap();
            }
            Message | Group => {
                h.set_start_submessage(id, move |t| {
                    t.line(&format!("{}:{{", num));
                    Some(t.child())
                })
                .unwrap();
                h.set_end_submessage(id, move |t| {
                    t.line("}");
                    true
                })
                .unwrap();
                h.set_sub_handlers_self(id).unwrap();
            }
            Int32 | Enum | Sfixed32 | Sint32 => {
                h.set_int32(id, move |t, v| {
                    t.line(&format!("{}:{}", num, v));
                    true
                })
                .unwrap();
            }
            Int64 | Sfixed64 | Sint64 => {
                h.set_int64(id, move |t, v| {
                    t.line(&format!("{}:{}", num, v));
                    true
                })
                .unwrap();
            }
            Uint32 | Fixed32 => {
                h.set_uint32(id, move |t, v| {
                    t.line(&format!("{}:{}", num, v));
                    true
                })
                .unwrap();
            }
            Uint64 | Fixed64 => {
                h.set_uint64(id, move |t, v| {
                    t.line(&format!("{}:{}", num, v));
                    true
                })
                .unwrap();
            }
            Float => {
                h.set_float(id, move |t, v| {
                    t.line(&format!("{}:{}", num, v));
                    true
                })
                .unwrap();
            }
            Double => {
                h.set_double(id, move |t, v| {
                    t.line(&format!("{}:{}", num, v));
                    true
                })
                .unwrap();
            }
            Bool => {
                h.set_bool(id, move |t, v| {
                    t.line(&format!("{}:{}", num, v));
                    true
                })
                .unwrap();
            }
        }
    }

    Handlers::freeze(vec![h]).unwrap()
}

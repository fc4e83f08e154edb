//! Schema-driven streaming Protocol Buffers decoder.
//!
//! pbstream decodes the [Protocol Buffers wire
//! format](https://protobuf.dev/programming-guides/encoding/) by pushing
//! typed events to a consumer, driven by a schema: there is no generated
//! code and no materialized message objects. The three moving parts are:
//!
//! - [`schema`]: definitions of messages, fields and enums, assembled
//!   mutably and then *frozen* into an immutable, shareable [`Schema`].
//! - [`handlers`]: a per-message table of typed callbacks
//!   ([`Handlers`]), frozen into a [`HandlerPlan`] that resolves
//!   submessage links.
//! - [`decoder`]: a resumable push parser ([`Decoder`], usually driven
//!   through a [`Pipeline`]) that accepts arbitrarily chunked buffers and
//!   dispatches value, string, submessage and sequence events in wire
//!   order.
//!
//! Frozen schemas and plans have no interior mutability, so one plan can
//! back many concurrent parses; each parse owns only its pipeline.
//!
//! # Example
//!
//! ```
//! use std::cell::Cell;
//! use std::rc::Rc;
//! use std::sync::Arc;
//!
//! use pbstream::schema::{FieldDef, FieldType, MessageDef, SchemaBuilder};
//! use pbstream::handlers::Handlers;
//! use pbstream::pipeline::{BytesSink, Pipeline};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // message Test { int32 count = 1; }
//! let mut builder = SchemaBuilder::new();
//! let mut msg = MessageDef::new();
//! msg.set_full_name("Test")?;
//! let msg = builder.add_message(msg);
//! let mut count = FieldDef::new();
//! count.set_name("count")?;
//! count.set_number(1)?;
//! count.set_type(FieldType::Int32);
//! let count = builder.add_field(msg, count)?;
//!
//! let schema = Arc::new(builder.freeze(&[msg])?);
//! let msg = schema.roots()[0];
//!
//! // Sum every `count` value through a shared consumer closure.
//! let mut handlers: Handlers<Rc<Cell<i64>>> = Handlers::new(&schema, msg)?;
//! handlers.set_int32(count, |sum, value| {
//!     sum.set(sum.get() + value as i64);
//!     true
//! })?;
//! let plan = Handlers::freeze(vec![handlers])?;
//!
//! let total = Rc::new(Cell::new(0i64));
//! let mut pipeline = Pipeline::new(plan, Rc::clone(&total));
//! pipeline.put(&[0x08, 0x96, 0x01, 0x08, 0x2a])?; // count=150, count=42
//! pipeline.end_of_stream()?;
//! assert_eq!(total.get(), 192);
//! # Ok(())
//! # }
//! ```

pub mod decoder;
pub mod handlers;
pub mod pipeline;
pub mod schema;
pub mod varint;
pub mod wire;

pub use decoder::{Decoder, MAX_NESTING};
pub use handlers::{HandlerError, HandlerPlan, Handlers};
pub use pipeline::{BytesSink, DecodeError, DecodeErrorKind, Pipeline, Status};
pub use schema::{Schema, SchemaBuilder, SchemaError, SymbolTable};
pub use wire::{WireType, MAX_FIELD_NUMBER};

#[cfg(test)]
mod test_util;

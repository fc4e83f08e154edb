//! Streaming wire-format decoder.
//!
//! The decoder is a resumable push parser: a byte source feeds it buffers
//! through [`put`](Decoder::put) and the decoder synchronously drives the
//! typed callbacks of a frozen [`HandlerPlan`]. Buffers may be split at any
//! byte offset — partial tags, varints, fixed-width values and length
//! prefixes are accumulated across calls, so the event stream a consumer
//! observes is identical however the input is chunked.
//!
//! Nested submessages and groups are tracked on a bounded frame stack.
//! Each frame records the handler table and consumer closure for one
//! message scope, where the scope ends (a byte offset for length-delimited
//! messages, a field number for groups), and whether a run of a repeated
//! field is currently open. Runs of repeated fields are framed with
//! implicit start/end-sequence events as runs begin and end.
//!
//! The decoder performs no I/O and owns no handler state; a single frozen
//! plan may back any number of decoders.

use std::sync::Arc;

use smallvec::SmallVec;

use crate::handlers::{
    HandlerPlan, Slot, SELECTOR_END_MESSAGE, SELECTOR_END_SEQUENCE, SELECTOR_END_STRING,
    SELECTOR_END_SUBMSG, SELECTOR_START_MESSAGE, SELECTOR_START_SEQUENCE,
    SELECTOR_START_STRING, SELECTOR_START_SUBMSG, SELECTOR_STRING_BUF, SELECTOR_VALUE,
};
use crate::pipeline::{BytesSink, DecodeError, DecodeErrorKind, Status};
use crate::schema::{DefId, DescriptorType};
use crate::varint::{zigzag_decode32, zigzag_decode64, Varint};
use crate::wire::{Tag, TagError, WireType};

/// Maximum submessage/group nesting depth, counting the top-level message.
pub const MAX_NESTING: usize = 64;

/// Schema facts about the field a value belongs to, captured when its tag
/// is read.
#[derive(Copy, Clone, Debug)]
struct FieldInfo {
    id: DefId,
    number: u32,
    desc: DescriptorType,
    repeated: bool,
    sel_base: u32,
}

/// What the body of a length-delimited value is.
enum LenPurpose {
    /// String/bytes field.
    String(FieldInfo),
    /// Length-delimited submessage with linked sub-handlers.
    Submessage(FieldInfo),
    /// Packed run of a repeated numeric field.
    Packed(FieldInfo),
    /// Unknown or handler-less field; body is discarded.
    Skip,
}

/// Partial state of a packed element split across buffers.
enum PackedPartial {
    None,
    Varint(Varint),
    Fixed { have: u8, buf: [u8; 8] },
}

/// Decoder state between bytes. Any in-progress construct lives here so
/// that a buffer boundary can fall at any byte.
enum State<C> {
    /// At a field boundary.
    ExpectTag,
    /// Mid-tag varint.
    TagVarint(Varint),
    /// Mid-varint value. `None` field means the value is unknown and is
    /// discarded once complete.
    VarintValue {
        field: Option<FieldInfo>,
        accum: Varint,
    },
    /// Mid fixed-width value.
    FixedValue {
        field: Option<FieldInfo>,
        need: u8,
        have: u8,
        bytes: [u8; 8],
    },
    /// Mid varint length prefix of a delimited value.
    LenHeader { purpose: LenPurpose, accum: Varint },
    /// Inside a string/bytes body. `closure` is the string scope returned
    /// by the start-string handler, if one ran.
    StringBody {
        field: FieldInfo,
        remaining: u64,
        closure: Option<C>,
    },
    /// Inside a value that is being discarded.
    SkipBody { remaining: u64 },
    /// Inside a packed run, delivering one element per decoded value.
    PackedBody {
        field: FieldInfo,
        end: u64,
        partial: PackedPartial,
    },
}

/// Where a frame's scope ends.
#[derive(Copy, Clone)]
enum FrameEnd {
    /// The top-level message: ends with the byte stream.
    Stream,
    /// Length-delimited: ends at this stream offset.
    Offset(u64),
    /// Group: ends at the matching end-group tag.
    Group(u32),
}

/// An open run of a repeated field.
struct Seq<C> {
    number: u32,
    sel_base: u32,
    /// Scope returned by the start-sequence handler; element events
    /// dispatch into it. `None` if no start-sequence handler ran.
    closure: Option<C>,
}

/// One level of message nesting.
struct Frame<C> {
    /// Plan table for this message scope. `None` while skipping an
    /// unknown group.
    table: Option<usize>,
    closure: Option<C>,
    end: FrameEnd,
    seq: Option<Seq<C>>,
    /// The field in the parent scope that opened this frame; drives the
    /// end-submessage event when the frame pops.
    parent_field: Option<FieldInfo>,
}

/// The closure that field-level events of a frame currently dispatch into:
/// the open sequence's scope if there is one, else the message scope.
fn dispatch_mut<C>(frame: &mut Frame<C>) -> &mut C {
    match &mut frame.seq {
        Some(Seq {
            closure: Some(c), ..
        }) => c,
        _ => frame.closure.as_mut().expect("dispatch in unknown frame"),
    }
}

/// Resumable streaming decoder for one parse.
///
/// Create one with a frozen plan and a root closure, push buffers with
/// [`put`](Decoder::put) and finish with
/// [`end_of_stream`](Decoder::end_of_stream). After a parse (successful or
/// not), [`reset`](Decoder::reset) re-arms the decoder for a new stream.
/// The first fatal error latches: it is recorded in the
/// [`status`](Decoder::status) and returned from every subsequent call
/// until the decoder is reset.
pub struct Decoder<C> {
    plan: Arc<HandlerPlan<C>>,
    frames: SmallVec<[Frame<C>; 16]>,
    state: State<C>,
    offset: u64,
    started: bool,
    ended: bool,
    status: Status,
}

impl<C: Clone> Decoder<C> {
    pub fn new(plan: Arc<HandlerPlan<C>>, closure: C) -> Decoder<C> {
        let mut decoder = Decoder {
            plan,
            frames: SmallVec::new(),
            state: State::ExpectTag,
            offset: 0,
            started: false,
            ended: false,
            status: Status::new(),
        };
        decoder.reset(closure);
        decoder
    }

    /// Discard all parse state and start a fresh parse into `closure`.
    pub fn reset(&mut self, closure: C) {
        self.frames.clear();
        self.frames.push(Frame {
            table: Some(self.plan.root()),
            closure: Some(closure),
            end: FrameEnd::Stream,
            seq: None,
            parent_field: None,
        });
        self.state = State::ExpectTag;
        self.offset = 0;
        self.started = false;
        self.ended = false;
        self.status.clear();
    }

    /// The status of the current parse.
    pub fn status(&self) -> &Status {
        &self.status
    }

    /// Push a buffer of input, returning how many bytes were consumed.
    ///
    /// A short count means a string handler refused bytes; offer the
    /// remainder again later. Errors are fatal for the parse.
    pub fn put(&mut self, buf: &[u8]) -> Result<usize, DecodeError> {
        if let Some(err) = self.status.error() {
            return Err(err.clone());
        }
        debug_assert!(!self.ended, "put after end_of_stream");
        match self.run(buf) {
            Ok(consumed) => Ok(consumed),
            Err(err) => {
                self.status.set_error(err.clone());
                Err(err)
            }
        }
    }

    /// Signal the end of the stream.
    ///
    /// Succeeds only at a field boundary of the top-level message, with no
    /// open submessage or group; then closes any open sequence and fires
    /// the root end-message event.
    pub fn end_of_stream(&mut self) -> Result<(), DecodeError> {
        if let Some(err) = self.status.error() {
            return Err(err.clone());
        }
        if self.ended {
            return Ok(());
        }
        match self.finish() {
            Ok(()) => Ok(()),
            Err(err) => {
                self.status.set_error(err.clone());
                Err(err)
            }
        }
    }

    fn run(&mut self, buf: &[u8]) -> Result<usize, DecodeError> {
        self.ensure_started()?;
        let mut pos = 0;
        loop {
            self.pop_finished_frames()?;
            if pos == buf.len() {
                return Ok(pos);
            }
            if !self.step(buf, &mut pos)? {
                // A string handler refused bytes; suspend.
                return Ok(pos);
            }
        }
    }

    fn finish(&mut self) -> Result<(), DecodeError> {
        self.ensure_started()?;
        if self.frames.len() > 1 {
            return Err(self
                .error(DecodeErrorKind::TruncatedSubmessage)
                .at_depth(self.frames.len() - 1));
        }
        match &self.state {
            State::ExpectTag => {}
            State::TagVarint(_) => return Err(self.error(DecodeErrorKind::EofInTag)),
            _ => return Err(self.error(DecodeErrorKind::EofInValue)),
        }
        self.close_seq()?;

        let plan = self.plan.clone();
        let frame = self.frames.last_mut().expect("frame stack empty");
        let table = plan.table(frame.table.expect("top frame has a table"));
        if let Some(Slot::EndMessage(f)) = table.slot(SELECTOR_END_MESSAGE) {
            let ok = f(frame.closure.as_mut().expect("top frame closure"), &mut self.status);
            if let Some(err) = self.status.error() {
                return Err(err.clone());
            }
            if !ok {
                return Err(self.error(DecodeErrorKind::HandlerAbort));
            }
        }
        self.ended = true;
        Ok(())
    }

    /// Fire the root start-message event on the first byte (or an empty
    /// stream's end).
    fn ensure_started(&mut self) -> Result<(), DecodeError> {
        if self.started {
            return Ok(());
        }
        self.started = true;
        let plan = self.plan.clone();
        let frame = self.frames.last_mut().expect("frame stack empty");
        let table = plan.table(frame.table.expect("top frame has a table"));
        if let Some(Slot::StartMessage(f)) = table.slot(SELECTOR_START_MESSAGE) {
            if !f(frame.closure.as_mut().expect("top frame closure")) {
                return Err(self.error(DecodeErrorKind::HandlerAbort));
            }
        }
        Ok(())
    }

    /// Pop length-delimited frames whose scope ends at the current offset.
    /// Only meaningful at a field boundary.
    fn pop_finished_frames(&mut self) -> Result<(), DecodeError> {
        if !matches!(self.state, State::ExpectTag) {
            return Ok(());
        }
        while let Some(frame) = self.frames.last() {
            match frame.end {
                FrameEnd::Offset(end) if end == self.offset => self.pop_frame()?,
                _ => break,
            }
        }
        Ok(())
    }

    /// Process input in the current state. Returns false if a string
    /// handler refused bytes.
    fn step(&mut self, buf: &[u8], pos: &mut usize) -> Result<bool, DecodeError> {
        // A construct continuing at the end of an enclosing message means
        // the message was truncated. Finished frames were already popped,
        // so hitting the boundary here is always an error (including an
        // unterminated group pinned against its enclosing message's end).
        if self.nearest_offset_end() == Some(self.offset) {
            return Err(self.error(DecodeErrorKind::TruncatedSubmessage));
        }

        match std::mem::replace(&mut self.state, State::ExpectTag) {
            State::ExpectTag => self.read_tag(Varint::new(), buf, pos),
            State::TagVarint(accum) => self.read_tag(accum, buf, pos),
            State::VarintValue { field, accum } => {
                self.read_varint_value(field, accum, buf, pos)
            }
            State::FixedValue {
                field,
                need,
                have,
                bytes,
            } => self.read_fixed_value(field, need, have, bytes, buf, pos),
            State::LenHeader { purpose, accum } => {
                self.read_len_header(purpose, accum, buf, pos)
            }
            State::StringBody {
                field,
                remaining,
                closure,
            } => self.read_string_body(field, remaining, closure, buf, pos),
            State::SkipBody { remaining } => {
                let avail = (buf.len() - *pos) as u64;
                let chunk = avail.min(remaining);
                *pos += chunk as usize;
                self.offset += chunk;
                if chunk < remaining {
                    self.state = State::SkipBody {
                        remaining: remaining - chunk,
                    };
                }
                Ok(true)
            }
            State::PackedBody {
                field,
                end,
                partial,
            } => self.read_packed_body(field, end, partial, buf, pos),
        }
    }

    fn read_tag(
        &mut self,
        mut accum: Varint,
        buf: &[u8],
        pos: &mut usize,
    ) -> Result<bool, DecodeError> {
        while *pos < buf.len() {
            let byte = buf[*pos];
            *pos += 1;
            self.offset += 1;
            match accum.push(byte) {
                Err(_) => return Err(self.error(DecodeErrorKind::BadVarint)),
                Ok(Some(value)) => {
                    self.handle_tag(value)?;
                    return Ok(true);
                }
                Ok(None) => {
                    if self.nearest_offset_end() == Some(self.offset) {
                        return Err(self.error(DecodeErrorKind::TruncatedSubmessage));
                    }
                }
            }
        }
        self.state = State::TagVarint(accum);
        Ok(true)
    }

    fn read_varint_value(
        &mut self,
        field: Option<FieldInfo>,
        mut accum: Varint,
        buf: &[u8],
        pos: &mut usize,
    ) -> Result<bool, DecodeError> {
        while *pos < buf.len() {
            let byte = buf[*pos];
            *pos += 1;
            self.offset += 1;
            match accum.push(byte) {
                Err(_) => return Err(self.error(DecodeErrorKind::BadVarint)),
                Ok(Some(value)) => {
                    if let Some(field) = &field {
                        self.emit_varint(field, value)?;
                    }
                    return Ok(true);
                }
                Ok(None) => {
                    if self.nearest_offset_end() == Some(self.offset) {
                        return Err(self.error(DecodeErrorKind::TruncatedSubmessage));
                    }
                }
            }
        }
        self.state = State::VarintValue { field, accum };
        Ok(true)
    }

    fn read_fixed_value(
        &mut self,
        field: Option<FieldInfo>,
        need: u8,
        mut have: u8,
        mut bytes: [u8; 8],
        buf: &[u8],
        pos: &mut usize,
    ) -> Result<bool, DecodeError> {
        let mut avail = buf.len() - *pos;
        if let Some(end) = self.nearest_offset_end() {
            avail = avail.min((end - self.offset) as usize);
        }
        let chunk = avail.min((need - have) as usize);
        bytes[have as usize..have as usize + chunk].copy_from_slice(&buf[*pos..*pos + chunk]);
        *pos += chunk;
        self.offset += chunk as u64;
        have += chunk as u8;
        if have == need {
            if let Some(field) = &field {
                self.emit_fixed(field, &bytes)?;
            }
        } else {
            self.state = State::FixedValue {
                field,
                need,
                have,
                bytes,
            };
        }
        Ok(true)
    }

    fn read_len_header(
        &mut self,
        purpose: LenPurpose,
        mut accum: Varint,
        buf: &[u8],
        pos: &mut usize,
    ) -> Result<bool, DecodeError> {
        while *pos < buf.len() {
            let byte = buf[*pos];
            *pos += 1;
            self.offset += 1;
            match accum.push(byte) {
                Err(_) => return Err(self.error(DecodeErrorKind::BadVarint)),
                Ok(Some(len)) => {
                    self.begin_delimited(purpose, len)?;
                    return Ok(true);
                }
                Ok(None) => {
                    if self.nearest_offset_end() == Some(self.offset) {
                        return Err(self.error(DecodeErrorKind::TruncatedSubmessage));
                    }
                }
            }
        }
        self.state = State::LenHeader { purpose, accum };
        Ok(true)
    }

    fn read_string_body(
        &mut self,
        field: FieldInfo,
        remaining: u64,
        mut closure: Option<C>,
        buf: &[u8],
        pos: &mut usize,
    ) -> Result<bool, DecodeError> {
        let plan = self.plan.clone();
        let avail = (buf.len() - *pos) as u64;
        let chunk = &buf[*pos..*pos + avail.min(remaining) as usize];

        let frame = self.frames.last_mut().expect("frame stack empty");
        let table = plan.table(frame.table.expect("string field in known frame"));
        let consumed = match table.slot(field.sel_base + SELECTOR_STRING_BUF) {
            Some(Slot::StringBuf(f)) => {
                let target = match &mut closure {
                    Some(c) => c,
                    None => dispatch_mut(frame),
                };
                f(target, chunk).min(chunk.len())
            }
            _ => chunk.len(),
        };
        *pos += consumed;
        self.offset += consumed as u64;
        let remaining = remaining - consumed as u64;

        if remaining == 0 {
            self.end_string(&field)?;
            Ok(true)
        } else {
            let blocked = consumed < chunk.len();
            self.state = State::StringBody {
                field,
                remaining,
                closure,
            };
            Ok(!blocked)
        }
    }

    fn read_packed_body(
        &mut self,
        field: FieldInfo,
        end: u64,
        mut partial: PackedPartial,
        buf: &[u8],
        pos: &mut usize,
    ) -> Result<bool, DecodeError> {
        loop {
            if self.offset == end {
                match partial {
                    PackedPartial::None => {
                        self.close_seq()?;
                        return Ok(true);
                    }
                    // The run's byte count fell in the middle of an element.
                    _ => {
                        return Err(self
                            .error(DecodeErrorKind::TruncatedSubmessage)
                            .with_field(field.number))
                    }
                }
            }
            if *pos == buf.len() {
                self.state = State::PackedBody {
                    field,
                    end,
                    partial,
                };
                return Ok(true);
            }

            match field.desc.native_wire_type() {
                WireType::Varint => {
                    let mut accum = match partial {
                        PackedPartial::Varint(accum) => accum,
                        _ => Varint::new(),
                    };
                    let byte = buf[*pos];
                    *pos += 1;
                    self.offset += 1;
                    match accum.push(byte) {
                        Err(_) => return Err(self.error(DecodeErrorKind::BadVarint)),
                        Ok(Some(value)) => {
                            self.emit_varint(&field, value)?;
                            partial = PackedPartial::None;
                        }
                        Ok(None) => partial = PackedPartial::Varint(accum),
                    }
                }
                wt => {
                    let need: u8 = if wt == WireType::I64 { 8 } else { 4 };
                    let (mut have, mut bytes) = match partial {
                        PackedPartial::Fixed { have, buf } => (have, buf),
                        _ => (0, [0; 8]),
                    };
                    let avail = (buf.len() - *pos).min((end - self.offset) as usize);
                    let chunk = avail.min((need - have) as usize);
                    bytes[have as usize..have as usize + chunk]
                        .copy_from_slice(&buf[*pos..*pos + chunk]);
                    *pos += chunk;
                    self.offset += chunk as u64;
                    have += chunk as u8;
                    if have == need {
                        self.emit_fixed(&field, &bytes)?;
                        partial = PackedPartial::None;
                    } else {
                        partial = PackedPartial::Fixed { have, buf: bytes };
                    }
                }
            }
        }
    }

    /// Act on a complete tag: validate it, manage sequence framing and
    /// move to the state that parses the value.
    fn handle_tag(&mut self, value: u64) -> Result<(), DecodeError> {
        let tag = Tag::from_u64(value).map_err(|err| match err {
            TagError::FieldNumber(_) => self.error(DecodeErrorKind::BadFieldNumber),
            TagError::WireType(_) => self
                .error(DecodeErrorKind::TypeMismatch)
                .with_message("invalid wire type"),
        })?;

        if tag.wire_type == WireType::Egroup {
            return self.end_group(tag.number);
        }

        let field = self.lookup_field(tag.number);

        // A run of a repeated field ends when a tag for any other field
        // arrives. A packed run is self-contained, so an open run of the
        // same field also ends here.
        let packed = matches!(
            (&field, tag.wire_type),
            (Some(f), WireType::Len) if f.desc.native_wire_type() != WireType::Len
        );
        let close = match &self.frames.last().expect("frame stack empty").seq {
            Some(seq) => seq.number != tag.number || packed,
            None => false,
        };
        if close {
            self.close_seq()?;
        }

        let Some(field) = field else {
            return self.begin_unknown(tag);
        };

        let expected = field.desc.native_wire_type();
        if packed {
            if !field.repeated || !field.desc.is_numeric() {
                return Err(self
                    .error(DecodeErrorKind::TypeMismatch)
                    .with_field(field.number));
            }
        } else if tag.wire_type != expected {
            return Err(self
                .error(DecodeErrorKind::TypeMismatch)
                .with_field(field.number));
        }

        // Open a run when a non-packed repeated value begins.
        if !packed && field.repeated && self.frames.last().unwrap().seq.is_none() {
            self.open_seq(&field)?;
        }

        match tag.wire_type {
            WireType::Varint => {
                self.state = State::VarintValue {
                    field: Some(field),
                    accum: Varint::new(),
                };
            }
            WireType::I64 | WireType::I32 => {
                self.state = State::FixedValue {
                    field: Some(field),
                    need: if tag.wire_type == WireType::I64 { 8 } else { 4 },
                    have: 0,
                    bytes: [0; 8],
                };
            }
            WireType::Len => {
                let purpose = if packed {
                    LenPurpose::Packed(field)
                } else if field.desc == DescriptorType::Message {
                    LenPurpose::Submessage(field)
                } else {
                    LenPurpose::String(field)
                };
                self.state = State::LenHeader {
                    purpose,
                    accum: Varint::new(),
                };
            }
            WireType::Sgroup => self.begin_group(field)?,
            WireType::Egroup => unreachable!("handled above"),
        }
        Ok(())
    }

    /// Move to the state that skips an unknown field's value.
    fn begin_unknown(&mut self, tag: Tag) -> Result<(), DecodeError> {
        match tag.wire_type {
            WireType::Varint => {
                self.state = State::VarintValue {
                    field: None,
                    accum: Varint::new(),
                };
            }
            WireType::I64 | WireType::I32 => {
                self.state = State::FixedValue {
                    field: None,
                    need: if tag.wire_type == WireType::I64 { 8 } else { 4 },
                    have: 0,
                    bytes: [0; 8],
                };
            }
            WireType::Len => {
                self.state = State::LenHeader {
                    purpose: LenPurpose::Skip,
                    accum: Varint::new(),
                };
            }
            WireType::Sgroup => {
                // Unknown groups still nest and must balance their end
                // tags, so they get a frame with no handlers.
                self.push_frame(Frame {
                    table: None,
                    closure: None,
                    end: FrameEnd::Group(tag.number),
                    seq: None,
                    parent_field: None,
                })?;
            }
            WireType::Egroup => unreachable!("handled by caller"),
        }
        Ok(())
    }

    /// Act on a complete length prefix.
    fn begin_delimited(&mut self, purpose: LenPurpose, len: u64) -> Result<(), DecodeError> {
        // A delimited value may not extend beyond its enclosing message.
        if let Some(end) = self.nearest_offset_end() {
            if self.offset + len > end {
                return Err(self.error(DecodeErrorKind::TruncatedSubmessage));
            }
        }

        match purpose {
            LenPurpose::Skip => {
                if len > 0 {
                    self.state = State::SkipBody { remaining: len };
                }
            }
            LenPurpose::String(field) => {
                let plan = self.plan.clone();
                let frame = self.frames.last_mut().expect("frame stack empty");
                let table = plan.table(frame.table.expect("string field in known frame"));
                let closure = match table.slot(field.sel_base + SELECTOR_START_STRING) {
                    Some(Slot::StartString(f)) => match f(dispatch_mut(frame), len) {
                        Some(c) => Some(c),
                        None => {
                            return Err(self
                                .error(DecodeErrorKind::HandlerAbort)
                                .with_field(field.number))
                        }
                    },
                    _ => None,
                };
                if len == 0 {
                    self.end_string(&field)?;
                } else {
                    self.state = State::StringBody {
                        field,
                        remaining: len,
                        closure,
                    };
                }
            }
            LenPurpose::Submessage(field) => {
                let frame = self.frames.last().expect("frame stack empty");
                let table_idx = frame.table.expect("submessage field in known frame");
                match self.plan.table(table_idx).sub_table(field.id) {
                    Some(sub) => {
                        self.enter_submessage(field, sub, FrameEnd::Offset(self.offset + len))?;
                    }
                    // No sub-handlers linked: the body is opaque.
                    None => {
                        if len > 0 {
                            self.state = State::SkipBody { remaining: len };
                        }
                    }
                }
            }
            LenPurpose::Packed(field) => {
                self.open_seq(&field)?;
                if len == 0 {
                    self.close_seq()?;
                } else {
                    self.state = State::PackedBody {
                        field,
                        end: self.offset + len,
                        partial: PackedPartial::None,
                    };
                }
            }
        }
        Ok(())
    }

    /// Begin a group value of a known field.
    fn begin_group(&mut self, field: FieldInfo) -> Result<(), DecodeError> {
        let frame = self.frames.last().expect("frame stack empty");
        let table_idx = frame.table.expect("group field in known frame");
        match self.plan.table(table_idx).sub_table(field.id) {
            Some(sub) => self.enter_submessage(field, sub, FrameEnd::Group(field.number)),
            // No sub-handlers: skip the group, tracking nesting only.
            None => self.push_frame(Frame {
                table: None,
                closure: None,
                end: FrameEnd::Group(field.number),
                seq: None,
                parent_field: None,
            }),
        }
    }

    /// Fire start-submessage/start-message and push the child frame.
    fn enter_submessage(
        &mut self,
        field: FieldInfo,
        sub_table: usize,
        end: FrameEnd,
    ) -> Result<(), DecodeError> {
        if self.frames.len() >= MAX_NESTING {
            return Err(self
                .error(DecodeErrorKind::MaxDepthExceeded)
                .at_depth(self.frames.len())
                .with_field(field.number));
        }
        let plan = self.plan.clone();
        let parent = self.frames.last_mut().expect("frame stack empty");
        let parent_table = plan.table(parent.table.expect("submessage in known frame"));

        let child_closure = match parent_table.slot(field.sel_base + SELECTOR_START_SUBMSG) {
            Some(Slot::StartSubMessage(f)) => match f(dispatch_mut(parent)) {
                Some(c) => c,
                None => {
                    return Err(self
                        .error(DecodeErrorKind::HandlerAbort)
                        .with_field(field.number))
                }
            },
            // Without a start-submessage handler the child scope shares
            // the parent's dispatch scope.
            _ => dispatch_mut(parent).clone(),
        };

        self.push_frame(Frame {
            table: Some(sub_table),
            closure: Some(child_closure),
            end,
            seq: None,
            parent_field: Some(field),
        })?;

        let frame = self.frames.last_mut().expect("frame stack empty");
        if let Some(Slot::StartMessage(f)) = plan.table(sub_table).slot(SELECTOR_START_MESSAGE) {
            if !f(frame.closure.as_mut().expect("child frame closure")) {
                return Err(self
                    .error(DecodeErrorKind::HandlerAbort)
                    .with_field(field.number));
            }
        }
        Ok(())
    }

    fn push_frame(&mut self, frame: Frame<C>) -> Result<(), DecodeError> {
        if self.frames.len() >= MAX_NESTING {
            return Err(self
                .error(DecodeErrorKind::MaxDepthExceeded)
                .at_depth(self.frames.len()));
        }
        self.frames.push(frame);
        Ok(())
    }

    /// Act on an end-group tag.
    fn end_group(&mut self, number: u32) -> Result<(), DecodeError> {
        let end = self.frames.last().expect("frame stack empty").end;
        match end {
            FrameEnd::Group(n) if n == number => self.pop_frame(),
            _ => Err(self
                .error(DecodeErrorKind::BadGroupNesting)
                .with_field(number)),
        }
    }

    /// Close the innermost frame: end its open sequence, fire its
    /// end-message event, then the end-submessage event in the parent.
    fn pop_frame(&mut self) -> Result<(), DecodeError> {
        self.close_seq()?;
        let plan = self.plan.clone();

        let frame = self.frames.last_mut().expect("frame stack empty");
        if let Some(table_idx) = frame.table {
            if let Some(Slot::EndMessage(f)) = plan.table(table_idx).slot(SELECTOR_END_MESSAGE) {
                let ok = f(
                    frame.closure.as_mut().expect("known frame closure"),
                    &mut self.status,
                );
                if let Some(err) = self.status.error() {
                    return Err(err.clone());
                }
                if !ok {
                    return Err(self.error(DecodeErrorKind::HandlerAbort));
                }
            }
        }

        let frame = self.frames.pop().expect("frame stack empty");
        if let Some(field) = frame.parent_field {
            let parent = self.frames.last_mut().expect("popped past top frame");
            if let Some(table_idx) = parent.table {
                if let Some(Slot::EndSubMessage(f)) =
                    plan.table(table_idx).slot(field.sel_base + SELECTOR_END_SUBMSG)
                {
                    if !f(dispatch_mut(parent)) {
                        return Err(self
                            .error(DecodeErrorKind::HandlerAbort)
                            .with_field(field.number));
                    }
                }
            }
        }
        Ok(())
    }

    /// Begin a run of a repeated field: fire the start-sequence handler
    /// and record the run in the current frame.
    fn open_seq(&mut self, field: &FieldInfo) -> Result<(), DecodeError> {
        let plan = self.plan.clone();
        let frame = self.frames.last_mut().expect("frame stack empty");
        let table = plan.table(frame.table.expect("sequence in known frame"));
        let closure = match table.slot(field.sel_base + SELECTOR_START_SEQUENCE) {
            Some(Slot::StartSequence(f)) => {
                match f(frame.closure.as_mut().expect("known frame closure")) {
                    Some(c) => Some(c),
                    None => {
                        return Err(self
                            .error(DecodeErrorKind::HandlerAbort)
                            .with_field(field.number))
                    }
                }
            }
            _ => None,
        };
        frame.seq = Some(Seq {
            number: field.number,
            sel_base: field.sel_base,
            closure,
        });
        Ok(())
    }

    /// End the current frame's open run, if any.
    fn close_seq(&mut self) -> Result<(), DecodeError> {
        let plan = self.plan.clone();
        let frame = self.frames.last_mut().expect("frame stack empty");
        let Some(seq) = frame.seq.take() else {
            return Ok(());
        };
        let Some(table_idx) = frame.table else {
            return Ok(());
        };
        if let Some(Slot::EndSequence(f)) =
            plan.table(table_idx).slot(seq.sel_base + SELECTOR_END_SEQUENCE)
        {
            if !f(frame.closure.as_mut().expect("known frame closure")) {
                return Err(self
                    .error(DecodeErrorKind::HandlerAbort)
                    .with_field(seq.number));
            }
        }
        Ok(())
    }

    /// Fire the end-string event for a completed string value.
    fn end_string(&mut self, field: &FieldInfo) -> Result<(), DecodeError> {
        let plan = self.plan.clone();
        let frame = self.frames.last_mut().expect("frame stack empty");
        let table = plan.table(frame.table.expect("string field in known frame"));
        if let Some(Slot::EndString(f)) = table.slot(field.sel_base + SELECTOR_END_STRING) {
            let ok = f(dispatch_mut(frame), &mut self.status);
            if let Some(err) = self.status.error() {
                return Err(err.clone());
            }
            if !ok {
                return Err(self
                    .error(DecodeErrorKind::HandlerAbort)
                    .with_field(field.number));
            }
        }
        Ok(())
    }

    /// Deliver a decoded varint to the field's value handler, converting
    /// to the handler's parameter type.
    fn emit_varint(&mut self, field: &FieldInfo, value: u64) -> Result<(), DecodeError> {
        let plan = self.plan.clone();
        let frame = self.frames.last_mut().expect("frame stack empty");
        let table = plan.table(frame.table.expect("value in known frame"));
        let slot = table.slot(field.sel_base + SELECTOR_VALUE);
        let target = dispatch_mut(frame);

        use DescriptorType::*;
        let ok = match (field.desc, slot) {
            (Int32, Some(Slot::Int32(f))) => f(target, value as i32),
            (Int64, Some(Slot::Int64(f))) => f(target, value as i64),
            (Uint32, Some(Slot::Uint32(f))) => f(target, value as u32),
            (Uint64, Some(Slot::Uint64(f))) => f(target, value),
            (Bool, Some(Slot::Bool(f))) => f(target, value != 0),
            (Enum, Some(Slot::Int32(f))) => f(target, value as i32),
            (Sint32, Some(Slot::Int32(f))) => f(target, zigzag_decode32(value)),
            (Sint64, Some(Slot::Int64(f))) => f(target, zigzag_decode64(value)),
            _ => true,
        };
        if !ok {
            return Err(self
                .error(DecodeErrorKind::HandlerAbort)
                .with_field(field.number));
        }
        Ok(())
    }

    /// Deliver a decoded fixed-width value to the field's value handler.
    fn emit_fixed(&mut self, field: &FieldInfo, bytes: &[u8; 8]) -> Result<(), DecodeError> {
        let plan = self.plan.clone();
        let frame = self.frames.last_mut().expect("frame stack empty");
        let table = plan.table(frame.table.expect("value in known frame"));
        let slot = table.slot(field.sel_base + SELECTOR_VALUE);
        let target = dispatch_mut(frame);

        let b4: [u8; 4] = bytes[..4].try_into().expect("4-byte slice");

        use DescriptorType::*;
        let ok = match (field.desc, slot) {
            (Double, Some(Slot::Double(f))) => f(target, f64::from_le_bytes(*bytes)),
            (Fixed64, Some(Slot::Uint64(f))) => f(target, u64::from_le_bytes(*bytes)),
            (Sfixed64, Some(Slot::Int64(f))) => f(target, i64::from_le_bytes(*bytes)),
            (Float, Some(Slot::Float(f))) => f(target, f32::from_le_bytes(b4)),
            (Fixed32, Some(Slot::Uint32(f))) => f(target, u32::from_le_bytes(b4)),
            (Sfixed32, Some(Slot::Int32(f))) => f(target, i32::from_le_bytes(b4)),
            _ => true,
        };
        if !ok {
            return Err(self
                .error(DecodeErrorKind::HandlerAbort)
                .with_field(field.number));
        }
        Ok(())
    }

    /// Look up the tag's field in the current message scope.
    fn lookup_field(&self, number: u32) -> Option<FieldInfo> {
        let frame = self.frames.last().expect("frame stack empty");
        let table_idx = frame.table?;
        let schema = self.plan.schema();
        let msg = schema.message(self.plan.table(table_idx).msg())?;
        let id = msg.find_by_number(number)?;
        let field = schema.field(id)?;
        Some(FieldInfo {
            id,
            number,
            desc: field.descriptor_type()?,
            repeated: field.is_sequence(),
            sel_base: field.selector_base(),
        })
    }

    /// End offset of the nearest enclosing length-delimited frame, if any.
    /// Group frames are unbounded and do not count.
    fn nearest_offset_end(&self) -> Option<u64> {
        self.frames.iter().rev().find_map(|frame| match frame.end {
            FrameEnd::Offset(end) => Some(end),
            FrameEnd::Group(_) | FrameEnd::Stream => None,
        })
    }

    fn error(&self, kind: DecodeErrorKind) -> DecodeError {
        DecodeError::new(kind).at_offset(self.offset)
    }
}

impl<C: Clone> BytesSink for Decoder<C> {
    fn put(&mut self, buf: &[u8]) -> Result<usize, DecodeError> {
        Decoder::put(self, buf)
    }

    fn end_of_stream(&mut self) -> Result<(), DecodeError> {
        Decoder::end_of_stream(self)
    }
}

//! C3: the in-memory attribute and its grouping.
//!
//! Generalizes the teacher's typed `Attribute<V>` (`examples/jmagnuson-bo-tie/src/att.rs`) into
//! the byte-value-or-handler model the specification requires: a server attribute is either a
//! static value (immutable once set) or dispatches reads/writes to an async handler.

use bytes::Bytes;
use tokio::sync::oneshot;

use crate::error::ErrorCode;
use crate::security::{self, AccessRequirements, LinkSecurity, Operation};
use crate::{Handle, MAX_ATTRIBUTE_VALUE_LENGTH, Uuid};

/// Opaque identifier for the peer making a read/write request, passed through to handlers so a
/// database shared by multiple bearers can tell connections apart. This crate does not interpret
/// the value.
pub type PeerId = u64;

/// Completes a dynamic read with either the value or an ATT error code. Must be invoked exactly
/// once (the spec's "result sink invoked exactly once" rule); a handler that is dropped without
/// sending completes the read with `UnlikelyError` on the receiving end (a dropped oneshot channel
/// is treated as a broken handler, not success).
pub type ReadSink = oneshot::Sender<Result<Bytes, ErrorCode>>;

/// Completes a dynamic write with either success or an ATT error code.
pub type WriteSink = oneshot::Sender<Result<(), ErrorCode>>;

/// A read handler may finish synchronously (resolving the sink before returning) or hand the sink
/// off to run later; either is valid, matching §4.3's "completion may be synchronous or posted
/// later".
pub type ReadHandler = Box<dyn FnMut(PeerId, u16, ReadSink)>;
pub type WriteHandler = Box<dyn FnMut(PeerId, u16, Bytes, WriteSink)>;

enum Value {
    /// A static, read-only (from the protocol's perspective) value. Immutable once assigned.
    Static(Bytes),
    /// Dispatches to handlers; either side may be absent, in which case that operation is
    /// unconditionally refused (`ReadAsync`/`WriteAsync` return `false`).
    Dynamic { read: Option<ReadHandler>, write: Option<WriteHandler> },
}

/// One ATT attribute: a type, a handle, per-operation access requirements, and a value that is
/// either static or dispatched to a handler.
pub struct Attribute {
    handle: Handle,
    ty: Uuid,
    read_reqs: AccessRequirements,
    write_reqs: AccessRequirements,
    value: Value,
    /// The start handle of the owning grouping. A non-owning back-reference (an index into the
    /// database's grouping list, not a pointer), per the arena-plus-parent-index design note.
    group_start: Handle,
}

impl Attribute {
    pub fn handle(&self) -> Handle {
        self.handle
    }

    pub fn attribute_type(&self) -> Uuid {
        self.ty
    }

    pub fn read_requirements(&self) -> &AccessRequirements {
        &self.read_reqs
    }

    pub fn write_requirements(&self) -> &AccessRequirements {
        &self.write_reqs
    }

    pub fn group_start(&self) -> Handle {
        self.group_start
    }

    /// The static value, if this attribute has one.
    pub fn static_value(&self) -> Option<&Bytes> {
        match &self.value {
            Value::Static(bytes) => Some(bytes),
            Value::Dynamic { .. } => None,
        }
    }

    /// Install a static value.
    ///
    /// Preconditions (violations are programming errors, not protocol errors, so they panic —
    /// mirroring the teacher's handle-reservation invariants, which are likewise enforced at
    /// construction time rather than reported to the peer): writes must already be denied, no
    /// value may already be set, and `bytes` must be non-empty and at most
    /// [`MAX_ATTRIBUTE_VALUE_LENGTH`].
    pub fn set_value(&mut self, bytes: Bytes) {
        assert!(!self.write_reqs.allowed, "a statically-valued attribute cannot accept writes");
        assert!(self.static_value().is_none(), "attribute value is already set");
        assert!(!bytes.is_empty(), "attribute value must be non-empty");
        assert!(bytes.len() <= MAX_ATTRIBUTE_VALUE_LENGTH, "attribute value exceeds the maximum length");
        self.value = Value::Static(bytes);
    }

    /// Dispatch a read. Returns `false` without touching `sink` if no dynamic read handler is
    /// configured, or if the read is denied by `link_security` (the error is still reported
    /// through `sink` in the denied case — only a missing handler skips the sink entirely,
    /// matching the `ReadAsync -> bool` contract: `bool` reports whether a dispatch happened).
    pub fn read_async(&mut self, peer: PeerId, offset: u16, link_security: LinkSecurity, sink: ReadSink) -> bool {
        if let Some(code) = security::check(&self.read_reqs, link_security, Operation::Read) {
            let _ = sink.send(Err(code));
            return true;
        }
        match &mut self.value {
            Value::Dynamic { read: Some(handler), .. } => {
                handler(peer, offset, sink);
                true
            }
            _ => false,
        }
    }

    /// Dispatch a write. Same shape as [`Attribute::read_async`].
    pub fn write_async(
        &mut self,
        peer: PeerId,
        offset: u16,
        bytes: Bytes,
        link_security: LinkSecurity,
        sink: WriteSink,
    ) -> bool {
        if let Some(code) = security::check(&self.write_reqs, link_security, Operation::Write) {
            let _ = sink.send(Err(code));
            return true;
        }
        match &mut self.value {
            Value::Dynamic { write: Some(handler), .. } => {
                handler(peer, offset, bytes, sink);
                true
            }
            _ => false,
        }
    }

    fn declaration(handle: Handle, ty: Uuid, value: Bytes, group_start: Handle) -> Self {
        Attribute {
            handle,
            ty,
            read_reqs: AccessRequirements::open(),
            write_reqs: AccessRequirements::denied(),
            value: Value::Static(value),
            group_start,
        }
    }

    fn new_dynamic(
        handle: Handle,
        ty: Uuid,
        read_reqs: AccessRequirements,
        write_reqs: AccessRequirements,
        group_start: Handle,
    ) -> Self {
        Attribute { handle, ty, read_reqs, write_reqs, value: Value::Dynamic { read: None, write: None }, group_start }
    }

    /// Attach a read handler to a dynamic attribute. No-op (returns `false`) on a static
    /// attribute or if one is already attached.
    pub fn set_read_handler(&mut self, handler: ReadHandler) -> bool {
        match &mut self.value {
            Value::Dynamic { read, .. } if read.is_none() => {
                *read = Some(handler);
                true
            }
            _ => false,
        }
    }

    /// Attach a write handler to a dynamic attribute. No-op (returns `false`) on a static
    /// attribute or if one is already attached.
    pub fn set_write_handler(&mut self, handler: WriteHandler) -> bool {
        match &mut self.value {
            Value::Dynamic { write, .. } if write.is_none() => {
                *write = Some(handler);
                true
            }
            _ => false,
        }
    }
}

/// A contiguous `[start_handle, end_handle]` range of attributes under one declaration attribute.
///
/// The grouping owns its attributes; handles are assigned `start_handle + index`. It becomes
/// *complete* once `attr_count` attributes (including the declaration) have been added, and must
/// then be explicitly [`AttributeGrouping::activate`]d before the database will serve it.
pub struct AttributeGrouping {
    start_handle: Handle,
    attr_count: usize,
    attributes: Vec<Attribute>,
    active: bool,
}

impl AttributeGrouping {
    /// Reserve `[start_handle, start_handle + attr_count]` inclusive (`attr_count + 1` handles:
    /// the declaration plus `attr_count` member attributes) and install the declaration attribute.
    pub fn new(ty: Uuid, start_handle: Handle, attr_count: usize, decl_value: Bytes) -> Self {
        let declaration = Attribute::declaration(start_handle, ty, decl_value, start_handle);
        AttributeGrouping { start_handle, attr_count: attr_count + 1, attributes: vec![declaration], active: false }
    }

    pub fn start_handle(&self) -> Handle {
        self.start_handle
    }

    pub fn end_handle(&self) -> Handle {
        self.start_handle + self.attr_count as u16 - 1
    }

    pub fn is_complete(&self) -> bool {
        self.attributes.len() == self.attr_count
    }

    pub fn is_active(&self) -> bool {
        self.active && self.is_complete()
    }

    pub fn activate(&mut self) -> bool {
        if self.is_complete() {
            self.active = true;
        }
        self.active
    }

    /// The group's type, i.e. the declaration attribute's type.
    pub fn group_type(&self) -> Uuid {
        self.attributes[0].ty
    }

    pub fn declaration(&self) -> &Attribute {
        &self.attributes[0]
    }

    /// Append a new member attribute at the next free handle. Fails if the grouping is already
    /// complete.
    pub fn add_attribute(
        &mut self,
        ty: Uuid,
        read_reqs: AccessRequirements,
        write_reqs: AccessRequirements,
    ) -> Option<&mut Attribute> {
        if self.is_complete() {
            return None;
        }
        let handle = self.start_handle + self.attributes.len() as u16;
        self.attributes.push(Attribute::new_dynamic(handle, ty, read_reqs, write_reqs, self.start_handle));
        self.attributes.last_mut()
    }

    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    pub fn attributes_mut(&mut self) -> &mut [Attribute] {
        &mut self.attributes
    }

    /// Look up a member attribute by its absolute handle.
    pub fn attribute_mut(&mut self, handle: Handle) -> Option<&mut Attribute> {
        if handle < self.start_handle || handle > self.end_handle() {
            return None;
        }
        self.attributes.get_mut((handle - self.start_handle) as usize)
    }
}

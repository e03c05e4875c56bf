//! C1: the ATT PDU codec.
//!
//! PDUs are byte-packed with little-endian multi-byte fields. [`read`] classifies a frame and
//! hands back a zero-copy [`PduView`] borrowing from the original bytes; the `write_*` functions
//! serialise a PDU into a caller-supplied [`BytesMut`].

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::ParseError;
use crate::opcode::OpCode;
use crate::uuid::Uuid;
use crate::{Handle, MAX_ATTRIBUTE_VALUE_LENGTH, SIGNATURE_LENGTH};

/// The `flag` field of an Execute Write Request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExecuteWriteFlag {
    CancelAll,
    WritePending,
}

impl ExecuteWriteFlag {
    fn from_raw(raw: u8) -> Result<Self, ParseError> {
        match raw {
            0x00 => Ok(ExecuteWriteFlag::CancelAll),
            0x01 => Ok(ExecuteWriteFlag::WritePending),
            _ => Err(ParseError::TooShort { needed: 0, got: 0 }),
        }
    }

    fn into_raw(self) -> u8 {
        match self {
            ExecuteWriteFlag::CancelAll => 0x00,
            ExecuteWriteFlag::WritePending => 0x01,
        }
    }
}

/// A parsed Find Information Response / Find By Type Value Response / Read By Type Response /
/// Read By Group Type Response entry list, still in its wire-packed form. Each of these exposes
/// its own iterator so the caller never has to copy the list out of the original buffer.
#[derive(Clone, Copy, Debug)]
pub struct HandleUuidList<'a> {
    format: u8,
    data: &'a [u8],
}

impl<'a> Iterator for HandleUuidList<'a> {
    type Item = (Handle, Uuid);

    fn next(&mut self) -> Option<Self::Item> {
        let entry_len = if self.format == Uuid::FORMAT_16_BIT { 4 } else { 18 };
        if self.data.len() < entry_len {
            return None;
        }
        let handle = u16::from_le_bytes([self.data[0], self.data[1]]);
        let uuid = if self.format == Uuid::FORMAT_16_BIT {
            Uuid::Uuid16(u16::from_le_bytes([self.data[2], self.data[3]]))
        } else {
            let mut raw = [0u8; 16];
            raw.copy_from_slice(&self.data[2..18]);
            Uuid::Uuid128(u128::from_le_bytes(raw))
        };
        self.data = &self.data[entry_len..];
        Some((handle, uuid))
    }
}

/// One entry of a Find By Type Value Response: a matching handle plus the end of its group.
#[derive(Clone, Copy, Debug)]
pub struct HandleRangeList<'a>(&'a [u8]);

impl<'a> Iterator for HandleRangeList<'a> {
    type Item = (Handle, Handle);

    fn next(&mut self) -> Option<Self::Item> {
        if self.0.len() < 4 {
            return None;
        }
        let found = u16::from_le_bytes([self.0[0], self.0[1]]);
        let group_end = u16::from_le_bytes([self.0[2], self.0[3]]);
        self.0 = &self.0[4..];
        Some((found, group_end))
    }
}

/// One handle/value entry of a Read By Type Response or Read By Group Type Response.
#[derive(Clone, Copy, Debug)]
pub struct TypeValueList<'a> {
    entry_len: u8,
    data: &'a [u8],
    /// Read By Group Type entries carry an extra group-end handle the caller needs; `grouped`
    /// selects between the two wire shapes.
    grouped: bool,
}

impl<'a> Iterator for TypeValueList<'a> {
    type Item = TypeValueEntry<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let entry_len = self.entry_len as usize;
        if self.data.len() < entry_len || entry_len < 2 {
            return None;
        }
        let (entry, rest) = self.data.split_at(entry_len);
        self.data = rest;
        let handle = u16::from_le_bytes([entry[0], entry[1]]);
        if self.grouped {
            let group_end = u16::from_le_bytes([entry[2], entry[3]]);
            Some(TypeValueEntry { handle, group_end: Some(group_end), value: &entry[4..] })
        } else {
            Some(TypeValueEntry { handle, group_end: None, value: &entry[2..] })
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct TypeValueEntry<'a> {
    pub handle: Handle,
    pub group_end: Option<Handle>,
    pub value: &'a [u8],
}

/// An iterator over the u16 handles in a Read Multiple Request.
#[derive(Clone, Copy, Debug)]
pub struct HandleList<'a>(&'a [u8]);

impl<'a> Iterator for HandleList<'a> {
    type Item = Handle;

    fn next(&mut self) -> Option<Self::Item> {
        if self.0.len() < 2 {
            return None;
        }
        let handle = u16::from_le_bytes([self.0[0], self.0[1]]);
        self.0 = &self.0[2..];
        Some(handle)
    }
}

fn read_uuid(data: &[u8]) -> Result<Uuid, ParseError> {
    match data.len() {
        2 => Ok(Uuid::Uuid16(u16::from_le_bytes([data[0], data[1]]))),
        16 => {
            let mut raw = [0u8; 16];
            raw.copy_from_slice(data);
            Ok(Uuid::Uuid128(u128::from_le_bytes(raw)))
        }
        other => Err(ParseError::TooShort { needed: 2, got: other }),
    }
}

/// The zero-copy, typed view over one PDU's payload, keyed by opcode.
#[derive(Clone, Copy, Debug)]
pub enum PduView<'a> {
    ErrorResponse { request_opcode: OpCode, handle: Handle, error_code: crate::error::ErrorCode },
    ExchangeMtuRequest { client_mtu: u16 },
    ExchangeMtuResponse { server_mtu: u16 },
    FindInformationRequest { start: Handle, end: Handle },
    FindInformationResponse { entries: HandleUuidList<'a> },
    FindByTypeValueRequest { start: Handle, end: Handle, attr_type: u16, value: &'a [u8] },
    FindByTypeValueResponse { entries: HandleRangeList<'a> },
    ReadByTypeRequest { start: Handle, end: Handle, attr_type: Uuid },
    ReadByTypeResponse { entries: TypeValueList<'a> },
    ReadRequest { handle: Handle },
    ReadResponse { value: &'a [u8] },
    ReadBlobRequest { handle: Handle, offset: u16 },
    ReadBlobResponse { value: &'a [u8] },
    ReadMultipleRequest { handles: HandleList<'a> },
    ReadMultipleResponse { values: &'a [u8] },
    ReadByGroupTypeRequest { start: Handle, end: Handle, group_type: Uuid },
    ReadByGroupTypeResponse { entries: TypeValueList<'a> },
    WriteRequest { handle: Handle, value: &'a [u8] },
    WriteResponse,
    WriteCommand { handle: Handle, value: &'a [u8] },
    SignedWriteCommand { handle: Handle, value: &'a [u8], signature: &'a [u8] },
    PrepareWriteRequest { handle: Handle, offset: u16, value: &'a [u8] },
    PrepareWriteResponse { handle: Handle, offset: u16, value: &'a [u8] },
    ExecuteWriteRequest { flag: ExecuteWriteFlag },
    ExecuteWriteResponse,
    HandleValueNotification { handle: Handle, value: &'a [u8] },
    HandleValueIndication { handle: Handle, value: &'a [u8] },
    HandleValueConfirmation,
}

/// A parsed frame: its opcode plus a typed, zero-copy view of the payload that follows it.
#[derive(Clone, Copy, Debug)]
pub struct Reader<'a> {
    opcode: OpCode,
    payload: &'a [u8],
}

impl<'a> Reader<'a> {
    pub fn opcode(&self) -> OpCode {
        self.opcode
    }

    /// The raw payload bytes following the opcode (including any trailing signature).
    pub fn raw_payload(&self) -> &'a [u8] {
        self.payload
    }
}

/// Parse a frame's opcode and produce its typed payload view. Malformed payloads return a
/// [`ParseError`] and never panic; the caller drops the frame (see `bearer`'s sequencing rules
/// for when a parse failure also triggers a shutdown).
pub fn read(frame: &[u8]) -> Result<(Reader<'_>, PduView<'_>), ParseError> {
    if frame.is_empty() {
        return Err(ParseError::EmptyPdu);
    }
    let opcode = OpCode::from_raw(frame[0]);
    let signature_len = if opcode.has_signature() { SIGNATURE_LENGTH } else { 0 };
    if frame.len() < 1 + signature_len {
        return Err(ParseError::TooShort { needed: 1 + signature_len, got: frame.len() });
    }
    let body_end = frame.len() - signature_len;
    let payload = &frame[1..body_end];
    let reader = Reader { opcode, payload };

    let view = match opcode {
        OpCode::ERROR_RESPONSE => {
            if payload.len() != 4 {
                return Err(ParseError::TooShort { needed: 4, got: payload.len() });
            }
            PduView::ErrorResponse {
                request_opcode: OpCode::from_raw(payload[0]),
                handle: u16::from_le_bytes([payload[1], payload[2]]),
                error_code: crate::error::ErrorCode::from_raw(payload[3]),
            }
        }
        OpCode::EXCHANGE_MTU_REQUEST => {
            PduView::ExchangeMtuRequest { client_mtu: read_u16(payload, 0)? }
        }
        OpCode::EXCHANGE_MTU_RESPONSE => {
            PduView::ExchangeMtuResponse { server_mtu: read_u16(payload, 0)? }
        }
        OpCode::FIND_INFORMATION_REQUEST => PduView::FindInformationRequest {
            start: read_u16(payload, 0)?,
            end: read_u16(payload, 2)?,
        },
        OpCode::FIND_INFORMATION_RESPONSE => {
            if payload.is_empty() {
                return Err(ParseError::TooShort { needed: 1, got: 0 });
            }
            let format = payload[0];
            if format != Uuid::FORMAT_16_BIT && format != Uuid::FORMAT_128_BIT {
                return Err(ParseError::BadUuidFormat(format));
            }
            let entry_len = if format == Uuid::FORMAT_16_BIT { 4 } else { 18 };
            let data = &payload[1..];
            if data.len() % entry_len != 0 {
                return Err(ParseError::TrailingBytes);
            }
            PduView::FindInformationResponse { entries: HandleUuidList { format, data } }
        }
        OpCode::FIND_BY_TYPE_VALUE_REQUEST => {
            if payload.len() < 6 {
                return Err(ParseError::TooShort { needed: 6, got: payload.len() });
            }
            PduView::FindByTypeValueRequest {
                start: read_u16(payload, 0)?,
                end: read_u16(payload, 2)?,
                attr_type: read_u16(payload, 4)?,
                value: &payload[6..],
            }
        }
        OpCode::FIND_BY_TYPE_VALUE_RESPONSE => {
            if payload.len() % 4 != 0 {
                return Err(ParseError::TrailingBytes);
            }
            PduView::FindByTypeValueResponse { entries: HandleRangeList(payload) }
        }
        OpCode::READ_BY_TYPE_REQUEST | OpCode::READ_BY_GROUP_TYPE_REQUEST => {
            if payload.len() < 4 {
                return Err(ParseError::TooShort { needed: 4, got: payload.len() });
            }
            let start = read_u16(payload, 0)?;
            let end = read_u16(payload, 2)?;
            let ty = read_uuid(&payload[4..])?;
            if opcode == OpCode::READ_BY_TYPE_REQUEST {
                PduView::ReadByTypeRequest { start, end, attr_type: ty }
            } else {
                PduView::ReadByGroupTypeRequest { start, end, group_type: ty }
            }
        }
        OpCode::READ_BY_TYPE_RESPONSE | OpCode::READ_BY_GROUP_TYPE_RESPONSE => {
            if payload.is_empty() {
                return Err(ParseError::TooShort { needed: 1, got: 0 });
            }
            let entry_len = payload[0];
            let data = &payload[1..];
            if entry_len < 2 || data.len() % entry_len as usize != 0 {
                return Err(ParseError::TrailingBytes);
            }
            let grouped = opcode == OpCode::READ_BY_GROUP_TYPE_RESPONSE;
            let entries = TypeValueList { entry_len, data, grouped };
            if grouped {
                PduView::ReadByGroupTypeResponse { entries }
            } else {
                PduView::ReadByTypeResponse { entries }
            }
        }
        OpCode::READ_REQUEST => PduView::ReadRequest { handle: read_u16(payload, 0)? },
        OpCode::READ_RESPONSE => PduView::ReadResponse { value: payload },
        OpCode::READ_BLOB_REQUEST => PduView::ReadBlobRequest {
            handle: read_u16(payload, 0)?,
            offset: read_u16(payload, 2)?,
        },
        OpCode::READ_BLOB_RESPONSE => PduView::ReadBlobResponse { value: payload },
        OpCode::READ_MULTIPLE_REQUEST => {
            if payload.len() < 4 || payload.len() % 2 != 0 {
                return Err(ParseError::TooShort { needed: 4, got: payload.len() });
            }
            PduView::ReadMultipleRequest { handles: HandleList(payload) }
        }
        OpCode::READ_MULTIPLE_RESPONSE => PduView::ReadMultipleResponse { values: payload },
        OpCode::WRITE_REQUEST => {
            if payload.len() < 2 {
                return Err(ParseError::TooShort { needed: 2, got: payload.len() });
            }
            PduView::WriteRequest { handle: read_u16(payload, 0)?, value: &payload[2..] }
        }
        OpCode::WRITE_RESPONSE => {
            if !payload.is_empty() {
                return Err(ParseError::TooShort { needed: 0, got: payload.len() });
            }
            PduView::WriteResponse
        }
        OpCode::WRITE_COMMAND => {
            if payload.len() < 2 {
                return Err(ParseError::TooShort { needed: 2, got: payload.len() });
            }
            PduView::WriteCommand { handle: read_u16(payload, 0)?, value: &payload[2..] }
        }
        OpCode::SIGNED_WRITE_COMMAND => {
            if payload.len() < 2 || frame.len() < 1 + SIGNATURE_LENGTH {
                return Err(ParseError::TooShort { needed: 2, got: payload.len() });
            }
            PduView::SignedWriteCommand {
                handle: read_u16(payload, 0)?,
                value: &payload[2..],
                signature: &frame[frame.len() - SIGNATURE_LENGTH..],
            }
        }
        OpCode::PREPARE_WRITE_REQUEST | OpCode::PREPARE_WRITE_RESPONSE => {
            if payload.len() < 4 {
                return Err(ParseError::TooShort { needed: 4, got: payload.len() });
            }
            let handle = read_u16(payload, 0)?;
            let offset = read_u16(payload, 2)?;
            let value = &payload[4..];
            if opcode == OpCode::PREPARE_WRITE_REQUEST {
                PduView::PrepareWriteRequest { handle, offset, value }
            } else {
                PduView::PrepareWriteResponse { handle, offset, value }
            }
        }
        OpCode::EXECUTE_WRITE_REQUEST => {
            if payload.len() != 1 {
                return Err(ParseError::TooShort { needed: 1, got: payload.len() });
            }
            PduView::ExecuteWriteRequest { flag: ExecuteWriteFlag::from_raw(payload[0])? }
        }
        OpCode::EXECUTE_WRITE_RESPONSE => {
            if !payload.is_empty() {
                return Err(ParseError::TooShort { needed: 0, got: payload.len() });
            }
            PduView::ExecuteWriteResponse
        }
        OpCode::HANDLE_VALUE_NOTIFICATION | OpCode::HANDLE_VALUE_INDICATION => {
            if payload.len() < 2 {
                return Err(ParseError::TooShort { needed: 2, got: payload.len() });
            }
            let handle = read_u16(payload, 0)?;
            let value = &payload[2..];
            if opcode == OpCode::HANDLE_VALUE_NOTIFICATION {
                PduView::HandleValueNotification { handle, value }
            } else {
                PduView::HandleValueIndication { handle, value }
            }
        }
        OpCode::HANDLE_VALUE_CONFIRMATION => PduView::HandleValueConfirmation,
        _ => return Err(ParseError::TooShort { needed: 0, got: 0 }),
    };

    Ok((reader, view))
}

fn read_u16(payload: &[u8], at: usize) -> Result<u16, ParseError> {
    payload
        .get(at..at + 2)
        .map(|s| u16::from_le_bytes([s[0], s[1]]))
        .ok_or(ParseError::TooShort { needed: at + 2, got: payload.len() })
}

/// Check a value is within the attribute-value size bound before it is embedded in a PDU.
fn check_value_len(value: &[u8]) -> Result<(), ParseError> {
    if value.len() > MAX_ATTRIBUTE_VALUE_LENGTH {
        Err(ParseError::ValueTooLong(value.len()))
    } else {
        Ok(())
    }
}

fn put_uuid(buf: &mut BytesMut, uuid: Uuid) {
    match uuid {
        Uuid::Uuid16(v) => buf.put_u16_le(v),
        Uuid::Uuid128(v) => buf.put_u128_le(v),
    }
}

pub fn write_error_response(
    buf: &mut BytesMut,
    request_opcode: OpCode,
    handle: Handle,
    error_code: crate::error::ErrorCode,
) {
    buf.put_u8(OpCode::ERROR_RESPONSE.into_raw());
    buf.put_u8(request_opcode.into_raw());
    buf.put_u16_le(handle);
    buf.put_u8(error_code.into_raw());
}

pub fn write_exchange_mtu_request(buf: &mut BytesMut, client_mtu: u16) {
    buf.put_u8(OpCode::EXCHANGE_MTU_REQUEST.into_raw());
    buf.put_u16_le(client_mtu);
}

pub fn write_exchange_mtu_response(buf: &mut BytesMut, server_mtu: u16) {
    buf.put_u8(OpCode::EXCHANGE_MTU_RESPONSE.into_raw());
    buf.put_u16_le(server_mtu);
}

pub fn write_find_information_request(buf: &mut BytesMut, start: Handle, end: Handle) {
    buf.put_u8(OpCode::FIND_INFORMATION_REQUEST.into_raw());
    buf.put_u16_le(start);
    buf.put_u16_le(end);
}

pub fn write_find_information_response(buf: &mut BytesMut, entries: &[(Handle, Uuid)]) {
    buf.put_u8(OpCode::FIND_INFORMATION_RESPONSE.into_raw());
    let format = entries.first().map(|(_, u)| u.format()).unwrap_or(Uuid::FORMAT_16_BIT);
    buf.put_u8(format);
    for (handle, uuid) in entries {
        buf.put_u16_le(*handle);
        put_uuid(buf, *uuid);
    }
}

pub fn write_find_by_type_value_request(
    buf: &mut BytesMut,
    start: Handle,
    end: Handle,
    attr_type: u16,
    value: &[u8],
) {
    buf.put_u8(OpCode::FIND_BY_TYPE_VALUE_REQUEST.into_raw());
    buf.put_u16_le(start);
    buf.put_u16_le(end);
    buf.put_u16_le(attr_type);
    buf.put_slice(value);
}

pub fn write_find_by_type_value_response(buf: &mut BytesMut, entries: &[(Handle, Handle)]) {
    buf.put_u8(OpCode::FIND_BY_TYPE_VALUE_RESPONSE.into_raw());
    for (found, group_end) in entries {
        buf.put_u16_le(*found);
        buf.put_u16_le(*group_end);
    }
}

pub fn write_read_by_type_request(buf: &mut BytesMut, start: Handle, end: Handle, attr_type: Uuid) {
    buf.put_u8(OpCode::READ_BY_TYPE_REQUEST.into_raw());
    buf.put_u16_le(start);
    buf.put_u16_le(end);
    put_uuid(buf, attr_type);
}

pub fn write_read_by_group_type_request(
    buf: &mut BytesMut,
    start: Handle,
    end: Handle,
    group_type: Uuid,
) {
    buf.put_u8(OpCode::READ_BY_GROUP_TYPE_REQUEST.into_raw());
    buf.put_u16_le(start);
    buf.put_u16_le(end);
    put_uuid(buf, group_type);
}

/// Shared by Read By Type Response and Read By Group Type Response: every entry must be the same
/// length, so the first entry decides `entry_len` and later, longer entries are simply not
/// appended (the caller stops once MTU/length limits are hit, per §4.1's per-type max lengths).
pub fn write_read_by_type_response(buf: &mut BytesMut, entries: &[(Handle, &[u8])]) -> Result<(), ParseError> {
    buf.put_u8(OpCode::READ_BY_TYPE_RESPONSE.into_raw());
    write_grouped_entries(buf, entries.iter().map(|(h, v)| (*h, None, *v)))
}

pub fn write_read_by_group_type_response(
    buf: &mut BytesMut,
    entries: &[(Handle, Handle, &[u8])],
) -> Result<(), ParseError> {
    buf.put_u8(OpCode::READ_BY_GROUP_TYPE_RESPONSE.into_raw());
    write_grouped_entries(buf, entries.iter().map(|(h, g, v)| (*h, Some(*g), *v)))
}

fn write_grouped_entries<'a>(
    buf: &mut BytesMut,
    entries: impl Iterator<Item = (Handle, Option<Handle>, &'a [u8])>,
) -> Result<(), ParseError> {
    let mut entries = entries.peekable();
    let value_len = match entries.peek() {
        Some((_, _, v)) => v.len(),
        None => {
            buf.put_u8(0);
            return Ok(());
        }
    };
    let prefix_len = if entries.peek().map(|(_, g, _)| g.is_some()).unwrap_or(false) { 4 } else { 2 };
    let entry_len = prefix_len + value_len;
    buf.put_u8(entry_len as u8);
    for (handle, group_end, value) in entries {
        if value.len() != value_len {
            return Err(ParseError::TrailingBytes);
        }
        buf.put_u16_le(handle);
        if let Some(group_end) = group_end {
            buf.put_u16_le(group_end);
        }
        buf.put_slice(value);
    }
    Ok(())
}

pub fn write_read_request(buf: &mut BytesMut, handle: Handle) {
    buf.put_u8(OpCode::READ_REQUEST.into_raw());
    buf.put_u16_le(handle);
}

pub fn write_read_response(buf: &mut BytesMut, value: &[u8]) -> Result<(), ParseError> {
    check_value_len(value)?;
    buf.put_u8(OpCode::READ_RESPONSE.into_raw());
    buf.put_slice(value);
    Ok(())
}

pub fn write_read_blob_request(buf: &mut BytesMut, handle: Handle, offset: u16) {
    buf.put_u8(OpCode::READ_BLOB_REQUEST.into_raw());
    buf.put_u16_le(handle);
    buf.put_u16_le(offset);
}

pub fn write_read_blob_response(buf: &mut BytesMut, value: &[u8]) {
    buf.put_u8(OpCode::READ_BLOB_RESPONSE.into_raw());
    buf.put_slice(value);
}

pub fn write_read_multiple_request(buf: &mut BytesMut, handles: &[Handle]) {
    buf.put_u8(OpCode::READ_MULTIPLE_REQUEST.into_raw());
    for handle in handles {
        buf.put_u16_le(*handle);
    }
}

pub fn write_read_multiple_response(buf: &mut BytesMut, values: &[u8]) {
    buf.put_u8(OpCode::READ_MULTIPLE_RESPONSE.into_raw());
    buf.put_slice(values);
}

pub fn write_write_request(buf: &mut BytesMut, handle: Handle, value: &[u8]) -> Result<(), ParseError> {
    check_value_len(value)?;
    buf.put_u8(OpCode::WRITE_REQUEST.into_raw());
    buf.put_u16_le(handle);
    buf.put_slice(value);
    Ok(())
}

pub fn write_write_response(buf: &mut BytesMut) {
    buf.put_u8(OpCode::WRITE_RESPONSE.into_raw());
}

pub fn write_write_command(buf: &mut BytesMut, handle: Handle, value: &[u8]) -> Result<(), ParseError> {
    check_value_len(value)?;
    buf.put_u8(OpCode::WRITE_COMMAND.into_raw());
    buf.put_u16_le(handle);
    buf.put_slice(value);
    Ok(())
}

pub fn write_prepare_write(
    buf: &mut BytesMut,
    opcode: OpCode,
    handle: Handle,
    offset: u16,
    value: &[u8],
) {
    buf.put_u8(opcode.into_raw());
    buf.put_u16_le(handle);
    buf.put_u16_le(offset);
    buf.put_slice(value);
}

pub fn write_execute_write_request(buf: &mut BytesMut, flag: ExecuteWriteFlag) {
    buf.put_u8(OpCode::EXECUTE_WRITE_REQUEST.into_raw());
    buf.put_u8(flag.into_raw());
}

pub fn write_execute_write_response(buf: &mut BytesMut) {
    buf.put_u8(OpCode::EXECUTE_WRITE_RESPONSE.into_raw());
}

pub fn write_handle_value(buf: &mut BytesMut, opcode: OpCode, handle: Handle, value: &[u8]) {
    buf.put_u8(opcode.into_raw());
    buf.put_u16_le(handle);
    buf.put_slice(value);
}

pub fn write_handle_value_confirmation(buf: &mut BytesMut) {
    buf.put_u8(OpCode::HANDLE_VALUE_CONFIRMATION.into_raw());
}

/// Convenience: build a standalone `Bytes` frame for one PDU using a closure that writes into a
/// fresh `BytesMut`. Used by call sites that don't otherwise hold a reusable scratch buffer.
pub fn build(f: impl FnOnce(&mut BytesMut)) -> Bytes {
    let mut buf = BytesMut::new();
    f(&mut buf);
    buf.freeze()
}

//! Host server packet layout and accessors.
//!
//! ```text
//! offset  size  field
//!      0     4  total length (header included)
//!      4     1  client attributes
//!      6     2  service id
//!     12     4  correlation id
//!     16     2  template length
//!     18     2  request/response id
//!     20     T  template (T = template length)
//!   20+T     -  fields: [declared length u32][id u16][value]
//! ```
//!
//! A field's declared length includes its 6-byte header. All integers are
//! big-endian.

use crate::error::{ProtocolError, Result};
use bytes::{Bytes, BytesMut};
use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};
use std::collections::HashMap;
use std::fmt;
use std::ops::Range;

/// Size of the common header
pub const HEADER_LEN: usize = 20;

/// Size of a field's length + id prefix
pub const FIELD_HEADER_LEN: usize = 6;

/// Declared length written for date fields
///
/// The header plus a 7-byte value is 13 bytes; the host expects 14 and the
/// extra byte stays zero.
pub const DATE_FIELD_LEN: u32 = 14;

/// Size of an encoded date value
pub const DATE_VALUE_LEN: usize = 7;

const OFFSET_LENGTH: usize = 0;
const OFFSET_CLIENT_ATTRIBUTES: usize = 4;
const OFFSET_SERVICE_ID: usize = 6;
const OFFSET_CORRELATION_ID: usize = 12;
const OFFSET_TEMPLATE_LENGTH: usize = 16;
const OFFSET_REQUEST_RESPONSE_ID: usize = 18;

/// A single host server packet backed by a contiguous buffer.
#[derive(Clone, PartialEq, Eq)]
pub struct Packet {
    data: BytesMut,
}

impl Packet {
    /// Zero-filled packet of `size` bytes with the length field set.
    pub fn with_size(size: usize) -> Result<Self> {
        if size < HEADER_LEN || size > u32::MAX as usize {
            return Err(ProtocolError::InvalidSize(size));
        }
        let mut packet = Packet {
            data: BytesMut::zeroed(size),
        };
        packet.set_u32(size as u32, OFFSET_LENGTH);
        Ok(packet)
    }

    /// Packet of `size` bytes with the header filled in.
    pub fn request(size: usize, template_len: u16, service_id: u16, request_id: u16) -> Result<Self> {
        if HEADER_LEN + template_len as usize > size {
            return Err(ProtocolError::InvalidSize(size));
        }
        let mut packet = Self::with_size(size)?;
        packet.set_u16(template_len, OFFSET_TEMPLATE_LENGTH);
        packet.set_service_id(service_id);
        packet.set_request_response_id(request_id);
        Ok(packet)
    }

    /// Wrap an existing byte sequence, such as a frame read off the wire.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Self::from_frame(BytesMut::from(bytes))
    }

    /// Take ownership of a decoded frame.
    pub fn from_frame(data: BytesMut) -> Result<Self> {
        if data.len() < HEADER_LEN {
            return Err(ProtocolError::InvalidSize(data.len()));
        }
        Ok(Packet { data })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Bytes {
        self.data.freeze()
    }

    /// Buffer length (which may differ from the declared length of a peer packet)
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Read a big-endian `u16`.
    ///
    /// # Panics
    /// If `offset + 2` exceeds the buffer.
    pub fn get_u16(&self, offset: usize) -> u16 {
        u16::from_be_bytes([self.data[offset], self.data[offset + 1]])
    }

    /// Write a big-endian `u16`.
    ///
    /// # Panics
    /// If `offset + 2` exceeds the buffer.
    pub fn set_u16(&mut self, value: u16, offset: usize) {
        self.data[offset..offset + 2].copy_from_slice(&value.to_be_bytes());
    }

    /// Read a big-endian `u32`.
    ///
    /// # Panics
    /// If `offset + 4` exceeds the buffer.
    pub fn get_u32(&self, offset: usize) -> u32 {
        read_u32(&self.data, offset)
    }

    /// Write a big-endian `u32`.
    ///
    /// # Panics
    /// If `offset + 4` exceeds the buffer.
    pub fn set_u32(&mut self, value: u32, offset: usize) {
        self.data[offset..offset + 4].copy_from_slice(&value.to_be_bytes());
    }

    pub fn get_u8(&self, offset: usize) -> u8 {
        self.data[offset]
    }

    pub fn set_u8(&mut self, value: u8, offset: usize) {
        self.data[offset] = value;
    }

    /// Copy `bytes` into the buffer at `offset`.
    pub fn write_bytes(&mut self, bytes: &[u8], offset: usize) {
        self.data[offset..offset + bytes.len()].copy_from_slice(bytes);
    }

    /// Declared total length
    pub fn length(&self) -> u32 {
        self.get_u32(OFFSET_LENGTH)
    }

    pub fn client_attributes(&self) -> u8 {
        self.get_u8(OFFSET_CLIENT_ATTRIBUTES)
    }

    pub fn set_client_attributes(&mut self, value: u8) {
        self.set_u8(value, OFFSET_CLIENT_ATTRIBUTES);
    }

    pub fn service_id(&self) -> u16 {
        self.get_u16(OFFSET_SERVICE_ID)
    }

    pub fn set_service_id(&mut self, value: u16) {
        self.set_u16(value, OFFSET_SERVICE_ID);
    }

    pub fn correlation_id(&self) -> u32 {
        self.get_u32(OFFSET_CORRELATION_ID)
    }

    pub fn set_correlation_id(&mut self, value: u32) {
        self.set_u32(value, OFFSET_CORRELATION_ID);
    }

    /// Length of the template region. Fixed once the packet is built.
    pub fn template_length(&self) -> u16 {
        self.get_u16(OFFSET_TEMPLATE_LENGTH)
    }

    pub fn request_response_id(&self) -> u16 {
        self.get_u16(OFFSET_REQUEST_RESPONSE_ID)
    }

    pub fn set_request_response_id(&mut self, value: u16) {
        self.set_u16(value, OFFSET_REQUEST_RESPONSE_ID);
    }

    /// Offset of the first field record
    pub fn fields_start(&self) -> usize {
        HEADER_LEN + self.template_length() as usize
    }

    /// Iterate field records in wire order.
    pub fn fields(&self) -> Fields<'_> {
        Fields::new(&self.data, self.fields_start())
    }

    /// Value of the first field with `id`, or `None` if absent.
    pub fn get_field(&self, id: u16) -> Option<&[u8]> {
        self.fields()
            .find(|(field_id, _)| *field_id == id)
            .map(|(_, range)| &self.data[range])
    }

    /// Decode every field once for repeated lookups.
    pub fn field_index(&self) -> FieldIndex {
        FieldIndex::from_fields(self.fields())
    }

    /// Write a field header at `offset` and copy `value` after it.
    ///
    /// With no value the region after the header keeps its zero fill.
    pub fn set_field(&mut self, value: Option<&[u8]>, id: u16, offset: usize, declared_len: u32) {
        self.set_u32(declared_len, offset);
        self.set_u16(id, offset + 4);
        if let Some(value) = value {
            self.write_bytes(value, offset + FIELD_HEADER_LEN);
        }
    }

    /// Date stored in field `id`.
    ///
    /// `None` when the field is missing, too short, or holds an impossible date
    /// (an all-zero value included).
    pub fn get_date(&self, id: u16) -> Option<NaiveDateTime> {
        self.get_field(id).and_then(decode_date)
    }

    /// Write a date field at `offset`. With `None` only the header is written.
    pub fn set_date(&mut self, date: Option<&NaiveDateTime>, id: u16, offset: usize) {
        self.set_u32(DATE_FIELD_LEN, offset);
        self.set_u16(id, offset + 4);
        if let Some(date) = date {
            let at = offset + FIELD_HEADER_LEN;
            // Years outside u16 cannot be represented on the wire.
            self.set_u16(date.year().clamp(0, u16::MAX as i32) as u16, at);
            self.set_u8(date.month() as u8, at + 2);
            self.set_u8(date.day() as u8, at + 3);
            self.set_u8(date.hour() as u8, at + 4);
            self.set_u8(date.minute() as u8, at + 5);
            self.set_u8(date.second() as u8, at + 6);
        }
    }
}

impl fmt::Debug for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Packet")
            .field("length", &self.data.len())
            .field("service_id", &format_args!("{:#06x}", self.service_id()))
            .field("request_response_id", &format_args!("{:#06x}", self.request_response_id()))
            .field("correlation_id", &self.correlation_id())
            .finish()
    }
}

impl AsRef<[u8]> for Packet {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}

/// Decode a 7-byte date value.
pub fn decode_date(value: &[u8]) -> Option<NaiveDateTime> {
    if value.len() < DATE_VALUE_LEN {
        return None;
    }
    let year = u16::from_be_bytes([value[0], value[1]]) as i32;
    NaiveDate::from_ymd_opt(year, value[2] as u32, value[3] as u32)?.and_hms_opt(
        value[4] as u32,
        value[5] as u32,
        value[6] as u32,
    )
}

fn read_u32(data: &[u8], offset: usize) -> u32 {
    u32::from_be_bytes([
        data[offset],
        data[offset + 1],
        data[offset + 2],
        data[offset + 3],
    ])
}

/// Iterator over `(id, value range)` field records.
///
/// Stops at the end of the buffer, at a zero declared length, or at a record
/// that would run past the end or is shorter than its own header.
#[derive(Debug, Clone)]
pub struct Fields<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> Fields<'a> {
    fn new(data: &'a [u8], start: usize) -> Self {
        Fields {
            data,
            offset: start,
        }
    }
}

impl Iterator for Fields<'_> {
    type Item = (u16, Range<usize>);

    fn next(&mut self) -> Option<Self::Item> {
        let offset = self.offset;
        if offset.checked_add(FIELD_HEADER_LEN)? > self.data.len() {
            return None;
        }
        let declared = read_u32(self.data, offset) as usize;
        let id = u16::from_be_bytes([self.data[offset + 4], self.data[offset + 5]]);
        let end = offset.checked_add(declared)?;
        if declared < FIELD_HEADER_LEN || end > self.data.len() {
            self.offset = self.data.len();
            return None;
        }
        self.offset = end;
        Some((id, offset + FIELD_HEADER_LEN..end))
    }
}

/// Field records decoded once, in wire order, with first-occurrence lookup.
#[derive(Debug, Clone, Default)]
pub struct FieldIndex {
    entries: Vec<(u16, Range<usize>)>,
    first: HashMap<u16, usize>,
}

impl FieldIndex {
    fn from_fields(fields: Fields<'_>) -> Self {
        let mut index = FieldIndex::default();
        for (id, range) in fields {
            index.first.entry(id).or_insert(index.entries.len());
            index.entries.push((id, range));
        }
        index
    }

    /// Range of the first value with `id`.
    pub fn range(&self, id: u16) -> Option<Range<usize>> {
        self.first.get(&id).map(|&i| self.entries[i].1.clone())
    }

    /// Value of the first field with `id` inside `packet`.
    pub fn get<'p>(&self, packet: &'p Packet, id: u16) -> Option<&'p [u8]> {
        self.range(id).map(|range| &packet.as_bytes()[range])
    }

    pub fn contains(&self, id: u16) -> bool {
        self.first.contains_key(&id)
    }

    /// Field ids in wire order, duplicates included.
    pub fn ids(&self) -> impl Iterator<Item = u16> + '_ {
        self.entries.iter().map(|(id, _)| *id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

//! Fixed offsets and sizes of the three on-disk regions, and bit-exact,
//! little-endian encode/decode of the header and descriptor fields.
//!
//! Fields are read and written through explicit byte offsets rather than a
//! `repr(C)` pointer cast over the mapping: a raw struct cast would need the
//! descriptor array's base offset to be 8-byte aligned for every choice of the
//! caller's header-blob type `H`, which this crate does not want to require of
//! callers. Explicit offsets make the wire format exactly what §6.1 specifies,
//! independent of the host compiler's struct layout rules.

use bytemuck::{Pod, Zeroable};

/// Sentinel for "no such index" — descriptor indices, the move pair, and the
/// data-list pointers all use this value. All-ones in 64 bits.
pub const INVALID_INDEX: u64 = u64::MAX;

/// On-disk format version understood by this crate.
pub const VERSION: u32 = 1;

const VERSION_OFFSET: usize = 0;
const HEADER_SIZE_OFFSET: usize = 8;
const RECORD_DESCRIPTOR_SIZE_OFFSET: usize = 16;
const DATA_AREA_OFFSET_OFFSET: usize = 24;
const DATA_AREA_SIZE_OFFSET: usize = 32;
const NEXT_DATA_OFFSET_OFFSET: usize = 40;
const NEXT_FREE_RECORD_INDEX_OFFSET: usize = 48;
const MAX_RECORDS_OFFSET: usize = 56;
const COMPACTED_SRC_INDEX_OFFSET: usize = 64;
const COMPACTED_DST_INDEX_OFFSET: usize = 72;

/// Size of the fixed portion of the header, before the opaque user-header blob.
/// Already 8-byte aligned, so the blob starts at an aligned offset for any `H`.
pub const HEADER_FIXED_SIZE: usize = 80;

/// Byte offset of a descriptor's `data_offset` field within its 48-byte slot.
const DESC_DATA_OFFSET_OFFSET: usize = 0;
const DESC_DATA_SIZE_OFFSET: usize = 8;
const DESC_CRC32_OFFSET: usize = 16;
const DESC_PREV_DATA_INDEX_OFFSET: usize = 24;
const DESC_NEXT_DATA_INDEX_OFFSET: usize = 32;
const DESC_STATE_OFFSET: usize = 40;

/// Size of one record descriptor slot, including reserved padding.
pub const RECORD_DESCRIPTOR_SIZE: usize = 48;

/// Returns the fixed header size for a given user-header payload size, rounded
/// up so the payload region itself stays a multiple of 8 bytes (keeps
/// `bytemuck::from_bytes`'s alignment check happy regardless of what follows).
#[must_use]
pub const fn header_size_for(user_header_len: usize) -> usize {
    let total = HEADER_FIXED_SIZE + user_header_len;
    (total + 7) & !7
}

/// Lifecycle state of a record descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum RecordState {
    /// Slot is unused; indices at or above the high-water mark are always Free.
    Free = 0,
    /// Slot has been allocated but not yet committed; discarded on next open.
    Allocated = 1,
    /// Slot holds a fully committed, readable record.
    Stored = 2,
}

impl RecordState {
    fn from_u32(value: u32) -> Self {
        match value {
            0 => RecordState::Free,
            1 => RecordState::Allocated,
            2 => RecordState::Stored,
            other => panic!("corrupt record state byte: {other}"),
        }
    }
}

/// A decoded, in-memory copy of one record descriptor.
///
/// Table code reads a `Descriptor` out of the mapping, mutates the copy, and
/// writes it back; the mapping itself is never aliased by a live reference
/// longer than a single read/write call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Descriptor {
    pub data_offset: u64,
    pub data_size: u64,
    pub crc32: u32,
    pub prev_data_index: u64,
    pub next_data_index: u64,
    pub state: RecordState,
}

impl Default for Descriptor {
    fn default() -> Self {
        Descriptor {
            data_offset: 0,
            data_size: 0,
            crc32: 0,
            prev_data_index: INVALID_INDEX,
            next_data_index: INVALID_INDEX,
            state: RecordState::Free,
        }
    }
}

impl Descriptor {
    /// Decodes a descriptor from its 48-byte on-disk slot.
    pub fn read(bytes: &[u8]) -> Self {
        debug_assert!(bytes.len() >= RECORD_DESCRIPTOR_SIZE);
        Descriptor {
            data_offset: read_u64(bytes, DESC_DATA_OFFSET_OFFSET),
            data_size: read_u64(bytes, DESC_DATA_SIZE_OFFSET),
            crc32: read_u32(bytes, DESC_CRC32_OFFSET),
            prev_data_index: read_u64(bytes, DESC_PREV_DATA_INDEX_OFFSET),
            next_data_index: read_u64(bytes, DESC_NEXT_DATA_INDEX_OFFSET),
            state: RecordState::from_u32(read_u32(bytes, DESC_STATE_OFFSET)),
        }
    }

    /// Encodes this descriptor into its 48-byte on-disk slot.
    pub fn write(&self, bytes: &mut [u8]) {
        debug_assert!(bytes.len() >= RECORD_DESCRIPTOR_SIZE);
        write_u64(bytes, DESC_DATA_OFFSET_OFFSET, self.data_offset);
        write_u64(bytes, DESC_DATA_SIZE_OFFSET, self.data_size);
        write_u32(bytes, DESC_CRC32_OFFSET, self.crc32);
        write_u64(bytes, DESC_PREV_DATA_INDEX_OFFSET, self.prev_data_index);
        write_u64(bytes, DESC_NEXT_DATA_INDEX_OFFSET, self.next_data_index);
        write_u32(bytes, DESC_STATE_OFFSET, self.state as u32);
    }
}

/// A decoded, in-memory copy of the fixed portion of the header (everything
/// except the opaque user-header blob, which callers access separately via
/// [`crate::table::Table::header_data`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderFields {
    pub version: u32,
    pub header_size: u64,
    pub record_descriptor_size: u64,
    pub data_area_offset: u64,
    pub data_area_size: u64,
    pub next_data_offset: u64,
    pub next_free_record_index: u64,
    pub max_records: u64,
    pub compacted_src_index: u64,
    pub compacted_dst_index: u64,
}

impl HeaderFields {
    /// Decodes the fixed header fields from the start of the mapping.
    pub fn read(bytes: &[u8]) -> Self {
        debug_assert!(bytes.len() >= HEADER_FIXED_SIZE);
        HeaderFields {
            version: read_u32(bytes, VERSION_OFFSET),
            header_size: read_u64(bytes, HEADER_SIZE_OFFSET),
            record_descriptor_size: read_u64(bytes, RECORD_DESCRIPTOR_SIZE_OFFSET),
            data_area_offset: read_u64(bytes, DATA_AREA_OFFSET_OFFSET),
            data_area_size: read_u64(bytes, DATA_AREA_SIZE_OFFSET),
            next_data_offset: read_u64(bytes, NEXT_DATA_OFFSET_OFFSET),
            next_free_record_index: read_u64(bytes, NEXT_FREE_RECORD_INDEX_OFFSET),
            max_records: read_u64(bytes, MAX_RECORDS_OFFSET),
            compacted_src_index: read_u64(bytes, COMPACTED_SRC_INDEX_OFFSET),
            compacted_dst_index: read_u64(bytes, COMPACTED_DST_INDEX_OFFSET),
        }
    }

    /// Encodes the fixed header fields into the start of the mapping.
    pub fn write(&self, bytes: &mut [u8]) {
        debug_assert!(bytes.len() >= HEADER_FIXED_SIZE);
        write_u32(bytes, VERSION_OFFSET, self.version);
        write_u64(bytes, HEADER_SIZE_OFFSET, self.header_size);
        write_u64(
            bytes,
            RECORD_DESCRIPTOR_SIZE_OFFSET,
            self.record_descriptor_size,
        );
        write_u64(bytes, DATA_AREA_OFFSET_OFFSET, self.data_area_offset);
        write_u64(bytes, DATA_AREA_SIZE_OFFSET, self.data_area_size);
        write_u64(bytes, NEXT_DATA_OFFSET_OFFSET, self.next_data_offset);
        write_u64(
            bytes,
            NEXT_FREE_RECORD_INDEX_OFFSET,
            self.next_free_record_index,
        );
        write_u64(bytes, MAX_RECORDS_OFFSET, self.max_records);
        write_u64(bytes, COMPACTED_SRC_INDEX_OFFSET, self.compacted_src_index);
        write_u64(bytes, COMPACTED_DST_INDEX_OFFSET, self.compacted_dst_index);
    }
}

/// Marker bound for the opaque user-header blob type: plain-old-data, safely
/// zero-initializable, so it can be read/written directly as a byte window of
/// the mapping with `bytemuck`.
pub trait HeaderBlob: Pod + Zeroable {}
impl<T: Pod + Zeroable> HeaderBlob for T {}

fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes(bytes[offset..offset + 4].try_into().unwrap())
}

fn read_u64(bytes: &[u8], offset: usize) -> u64 {
    u64::from_le_bytes(bytes[offset..offset + 8].try_into().unwrap())
}

fn write_u32(bytes: &mut [u8], offset: usize, value: u32) {
    bytes[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

fn write_u64(bytes: &mut [u8], offset: usize, value: u64) {
    bytes[offset..offset + 8].copy_from_slice(&value.to_le_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_round_trips() {
        let d = Descriptor {
            data_offset: 128,
            data_size: 64,
            crc32: 0xDEAD_BEEF,
            prev_data_index: 3,
            next_data_index: INVALID_INDEX,
            state: RecordState::Stored,
        };
        let mut buf = [0u8; RECORD_DESCRIPTOR_SIZE];
        d.write(&mut buf);
        assert_eq!(Descriptor::read(&buf), d);
    }

    #[test]
    fn header_fields_round_trip() {
        let h = HeaderFields {
            version: VERSION,
            header_size: 200,
            record_descriptor_size: RECORD_DESCRIPTOR_SIZE as u64,
            data_area_offset: 1000,
            data_area_size: 4096,
            next_data_offset: 12,
            next_free_record_index: 5,
            max_records: 16,
            compacted_src_index: INVALID_INDEX,
            compacted_dst_index: INVALID_INDEX,
        };
        let mut buf = [0u8; HEADER_FIXED_SIZE];
        h.write(&mut buf);
        assert_eq!(HeaderFields::read(&buf), h);
    }

    #[test]
    fn header_size_for_rounds_up_to_multiple_of_eight() {
        assert_eq!(header_size_for(0) % 8, 0);
        assert_eq!(header_size_for(3) % 8, 0);
        assert_eq!(header_size_for(13) % 8, 0);
    }
}

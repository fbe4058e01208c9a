//! The raw table: allocate / write / commit / delete / get / iterate / clear,
//! plus the opaque user-header accessor. Composes the slot manager, data heap,
//! integrity checks, compaction, and recovery into the on-disk layout described
//! in `layout`.

use std::collections::VecDeque;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use tracing::{info, instrument};

use crate::error::{Result, StoreError};
use crate::layout::{
    header_size_for, Descriptor, HeaderBlob, HeaderFields, RecordState, HEADER_FIXED_SIZE,
    INVALID_INDEX, RECORD_DESCRIPTOR_SIZE, VERSION,
};
use crate::mapping::FileMapping;

/// `u64::MAX`. No descriptor, slot, or data-list pointer ever legitimately
/// takes this value.
pub const INVALID: u64 = INVALID_INDEX;

/// Default data-area size used when a caller doesn't have a better estimate.
pub const DEFAULT_INITIAL_DATA_AREA_SIZE: u64 = 1024 * 1024;

/// Default percentage of `initial_data_area_size` worth of garbage that must
/// accumulate before a data-area compaction is considered.
pub const DEFAULT_GAP_THRESHOLD_PCT: u8 = 30;

/// The raw persistent dynamic record store.
///
/// See the crate-level docs and SPEC_FULL.md §3–§4 for the full contract.
pub struct Table<H: HeaderBlob> {
    pub(crate) mapping: FileMapping,
    pub(crate) path: PathBuf,

    pub(crate) max_records: u64,
    pub(crate) header_size: u64,
    pub(crate) data_area_offset: u64,
    pub(crate) data_area_size: u64,
    pub(crate) next_data_offset: u64,
    pub(crate) next_free_record_index: u64,

    pub(crate) initial_data_area_size: u64,
    pub(crate) gap_threshold_pct: u8,
    pub(crate) gap_space_size: u64,

    pub(crate) head_data_index: u64,
    pub(crate) tail_data_index: u64,
    pub(crate) free_indices: VecDeque<u64>,

    /// In-flight slot-compaction move pair, durable across crashes so
    /// `recover` can finish an interrupted move on reopen (§4.5).
    pub(crate) move_src_index: u64,
    pub(crate) move_dst_index: u64,

    _header_ty: PhantomData<H>,
}

impl<H: HeaderBlob> Table<H> {
    /// Opens or creates a store at `path`.
    ///
    /// `max_records`, `initial_data_area_size`, and `gap_compaction_threshold_pct`
    /// only take effect on first creation; a pre-existing file's stored values
    /// win (§4.1).
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(
        path: impl AsRef<Path>,
        max_records: u64,
        initial_data_area_size: u64,
        gap_compaction_threshold_pct: u8,
    ) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let user_header_len = std::mem::size_of::<H>();
        let header_size = header_size_for(user_header_len) as u64;

        let mut mapping = FileMapping::open(&path, header_size)?;

        let mut fields = HeaderFields::read(&mapping.as_bytes()[..HEADER_FIXED_SIZE]);
        let fresh = fields.max_records == 0;
        if fresh {
            info!(max_records, initial_data_area_size, "stamping fresh header");
            fields = HeaderFields {
                version: VERSION,
                header_size,
                record_descriptor_size: RECORD_DESCRIPTOR_SIZE as u64,
                data_area_offset: header_size + max_records * RECORD_DESCRIPTOR_SIZE as u64,
                data_area_size: initial_data_area_size,
                next_data_offset: 0,
                next_free_record_index: 0,
                max_records,
                compacted_src_index: INVALID_INDEX,
                compacted_dst_index: INVALID_INDEX,
            };
            fields.write(&mut mapping.as_bytes_mut()[..HEADER_FIXED_SIZE]);
        }

        // A version or descriptor-size stamp mismatch means this file was written by an
        // incompatible build; the store cannot reason about anything past the header, so
        // this is fatal per §4.8. A header-size mismatch, by contrast, is the ordinary case
        // of reopening the same file with a different user-header type `H`, so it is
        // reported as a typed error instead (§4.10).
        assert!(
            fields.version == VERSION,
            "invalid store header version {} (expected {VERSION})",
            fields.version
        );
        assert!(
            fields.record_descriptor_size == RECORD_DESCRIPTOR_SIZE as u64,
            "invalid record descriptor size {} (expected {RECORD_DESCRIPTOR_SIZE})",
            fields.record_descriptor_size
        );
        if fields.header_size as usize != header_size as usize {
            return Err(StoreError::UserHeaderSizeMismatch {
                on_disk: fields.header_size as usize,
                expected: header_size as usize,
            });
        }

        let file_len = fields.data_area_offset + fields.data_area_size;
        mapping.resize_to(file_len)?;

        let mut table = Table {
            mapping,
            path,
            max_records: fields.max_records,
            header_size,
            data_area_offset: fields.data_area_offset,
            data_area_size: fields.data_area_size,
            next_data_offset: fields.next_data_offset,
            next_free_record_index: fields.next_free_record_index,
            initial_data_area_size,
            gap_threshold_pct: gap_compaction_threshold_pct,
            gap_space_size: 0,
            head_data_index: INVALID_INDEX,
            tail_data_index: INVALID_INDEX,
            free_indices: VecDeque::new(),
            move_src_index: fields.compacted_src_index,
            move_dst_index: fields.compacted_dst_index,
            _header_ty: PhantomData,
        };

        // head_data_index/tail_data_index are in-memory-only (§3.2) and must be
        // rebuilt from the descriptors themselves before recovery runs, since
        // recovery's Allocated-discard and compaction steps rely on them.
        table.reconstruct_data_list_endpoints();
        table.recover();
        Ok(table)
    }

    /// Scans every non-Free descriptor below the high-water mark and derives
    /// `head_data_index`/`tail_data_index` from whichever carries an `Invalid`
    /// `prev_data_index`/`next_data_index`. Run once at open, before recovery.
    fn reconstruct_data_list_endpoints(&mut self) {
        let mut head = INVALID_INDEX;
        let mut tail = INVALID_INDEX;
        for index in 0..self.next_free_record_index {
            let descriptor = self.read_descriptor(index);
            if descriptor.state == RecordState::Free {
                continue;
            }
            if descriptor.prev_data_index == INVALID_INDEX {
                head = index;
            }
            if descriptor.next_data_index == INVALID_INDEX {
                tail = index;
            }
        }
        self.head_data_index = head;
        self.tail_data_index = tail;
    }

    // -- descriptor / header byte-window accessors --------------------------

    pub(crate) fn descriptor_slot(&self, index: u64) -> &[u8] {
        let start = (self.header_size + index * RECORD_DESCRIPTOR_SIZE as u64) as usize;
        &self.mapping.as_bytes()[start..start + RECORD_DESCRIPTOR_SIZE]
    }

    pub(crate) fn descriptor_slot_mut(&mut self, index: u64) -> &mut [u8] {
        let start = (self.header_size + index * RECORD_DESCRIPTOR_SIZE as u64) as usize;
        &mut self.mapping.as_bytes_mut()[start..start + RECORD_DESCRIPTOR_SIZE]
    }

    pub(crate) fn read_descriptor(&self, index: u64) -> Descriptor {
        Descriptor::read(self.descriptor_slot(index))
    }

    pub(crate) fn write_descriptor(&mut self, index: u64, descriptor: &Descriptor) {
        descriptor.write(self.descriptor_slot_mut(index));
    }

    pub(crate) fn data_bytes(&self, offset: u64, size: u64) -> &[u8] {
        let start = (self.data_area_offset + offset) as usize;
        &self.mapping.as_bytes()[start..start + size as usize]
    }

    pub(crate) fn data_bytes_mut(&mut self, offset: u64, size: u64) -> &mut [u8] {
        let start = (self.data_area_offset + offset) as usize;
        &mut self.mapping.as_bytes_mut()[start..start + size as usize]
    }

    /// Persists the mutable header fields (everything but the user-header
    /// blob, which callers own directly via [`Self::header_data`]).
    pub(crate) fn persist_header(&mut self) {
        let fields = HeaderFields {
            version: VERSION,
            header_size: self.header_size,
            record_descriptor_size: RECORD_DESCRIPTOR_SIZE as u64,
            data_area_offset: self.data_area_offset,
            data_area_size: self.data_area_size,
            next_data_offset: self.next_data_offset,
            next_free_record_index: self.next_free_record_index,
            max_records: self.max_records,
            compacted_src_index: self.move_src_index,
            compacted_dst_index: self.move_dst_index,
        };
        fields.write(&mut self.mapping.as_bytes_mut()[..HEADER_FIXED_SIZE]);
    }

    // -- public API -----------------------------------------------------

    /// Path of the backing file this store was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Forces dirty pages out to the backing file. The store never calls this
    /// on its own (§5) — after an operation returns, its effect is only as
    /// durable as the OS has chosen to flush. This is the escape hatch for
    /// callers that want a synchronous durability point.
    pub fn flush(&self) -> Result<()> {
        self.mapping.flush()
    }

    /// Allocates a new descriptor of `size` bytes. Returns [`INVALID`] if
    /// `size == 0` or the descriptor table is full.
    pub fn alloc_record(&mut self, size: u64) -> u64 {
        if size == 0 {
            return INVALID;
        }

        let index = self.allocate_slot();
        if index == INVALID {
            return INVALID;
        }

        let offset = self.allocate_data(size);

        let mut descriptor = Descriptor {
            data_offset: offset,
            data_size: size,
            crc32: 0,
            ..Descriptor::default()
        };
        descriptor.state = RecordState::Allocated;
        self.write_descriptor(index, &descriptor);
        self.add_to_data_list(index);

        self.persist_header();
        index
    }

    /// Copies `bytes` into the allocated range for `index`. If `bytes` is
    /// shorter than the descriptor's current size, the tail is released to
    /// `gap_space_size` (not reclaimed until the next data-area compaction)
    /// and `data_size` shrinks. Returns `false` on any precondition violation.
    pub fn write_record_data(&mut self, index: u64, bytes: &[u8]) -> bool {
        if index >= self.max_records || bytes.is_empty() {
            return false;
        }
        let mut descriptor = self.read_descriptor(index);
        if descriptor.state == RecordState::Free || bytes.len() as u64 > descriptor.data_size {
            return false;
        }

        let offset = descriptor.data_offset;
        self.data_bytes_mut(offset, descriptor.data_size)[..bytes.len()].copy_from_slice(bytes);

        if (bytes.len() as u64) < descriptor.data_size {
            self.gap_space_size += descriptor.data_size - bytes.len() as u64;
            descriptor.data_size = bytes.len() as u64;
        }

        descriptor.crc32 = crate::integrity::checksum(self.data_bytes(offset, descriptor.data_size));
        self.write_descriptor(index, &descriptor);
        true
    }

    /// Transitions `index` from Allocated to Stored. Returns `false` if the
    /// slot isn't Allocated.
    pub fn commit_record(&mut self, index: u64) -> bool {
        if index >= self.max_records {
            return false;
        }
        let mut descriptor = self.read_descriptor(index);
        if descriptor.state != RecordState::Allocated {
            return false;
        }
        descriptor.state = RecordState::Stored;
        self.write_descriptor(index, &descriptor);
        true
    }

    /// Transitions `index` from Stored to Free, reclaiming its slot and
    /// marking its data range as garbage. Returns `false` if the slot isn't
    /// Stored (including if it's already Free — delete is not idempotent,
    /// the second call observes `false`).
    pub fn delete_record(&mut self, index: u64) -> bool {
        if index >= self.max_records {
            return false;
        }
        let mut descriptor = self.read_descriptor(index);
        if descriptor.state != RecordState::Stored {
            return false;
        }

        self.remove_from_data_list(index);
        self.gap_space_size += descriptor.data_size;
        descriptor.state = RecordState::Free;
        self.write_descriptor(index, &descriptor);

        self.release_slot(index);
        self.persist_header();
        true
    }

    /// Returns the byte range for `index` with no CRC check. Empty if the
    /// slot isn't Stored.
    pub fn get_record(&self, index: u64) -> &[u8] {
        self.get_record_impl(index, false)
    }

    /// Returns the byte range for `index`, verifying CRC-32C. Empty if the
    /// slot isn't Stored or the checksum doesn't match.
    pub fn get_record_with_validation(&self, index: u64) -> &[u8] {
        self.get_record_impl(index, true)
    }

    fn get_record_impl(&self, index: u64, validate: bool) -> &[u8] {
        if index >= self.max_records {
            return &[];
        }
        let descriptor = self.read_descriptor(index);
        if descriptor.state != RecordState::Stored {
            return &[];
        }
        let bytes = self.data_bytes(descriptor.data_offset, descriptor.data_size);
        if validate && crate::integrity::checksum(bytes) != descriptor.crc32 {
            return &[];
        }
        bytes
    }

    /// Number of currently Stored+Allocated-then-committed records, i.e. live
    /// slots: `next_free_record_index - |free_indices|`.
    pub fn count_records(&self) -> u64 {
        self.next_free_record_index - self.free_indices.len() as u64
    }

    /// Returns a mutable view of the opaque user-header blob. Writes are
    /// durable as soon as the OS flushes the mapping; the store makes no
    /// atomicity guarantee about them.
    pub fn header_data(&mut self) -> &mut H {
        let offset = HEADER_FIXED_SIZE;
        let len = std::mem::size_of::<H>();
        let bytes = &mut self.mapping.as_bytes_mut()[offset..offset + len];
        bytemuck::from_bytes_mut(bytes)
    }

    /// Truncates the file and reinitializes to the empty state.
    pub fn clear(&mut self) {
        self.next_free_record_index = 0;
        self.next_data_offset = 0;
        self.gap_space_size = 0;
        self.head_data_index = INVALID_INDEX;
        self.tail_data_index = INVALID_INDEX;
        self.free_indices.clear();
        self.move_src_index = INVALID_INDEX;
        self.move_dst_index = INVALID_INDEX;

        self.data_area_size = self.initial_data_area_size;
        self.data_area_offset = self.header_size + self.max_records * RECORD_DESCRIPTOR_SIZE as u64;

        let file_len = self.data_area_offset + self.data_area_size;
        self.mapping
            .resize_to(file_len)
            .expect("failed to resize store file during clear");

        // Zero the descriptor array and header move-pair so a stale crash
        // recovery never finds leftover state from before the clear.
        for index in 0..self.max_records {
            Descriptor::default().write(self.descriptor_slot_mut(index));
        }
        self.persist_header();
    }

    /// Returns a restartable iterator over `(index, bytes)` for every Stored
    /// descriptor, in ascending index order, using the validated getter.
    pub fn iterate(&self) -> Iter<'_, H> {
        Iter {
            table: self,
            next_index: 0,
        }
    }
}

/// Iterator produced by [`Table::iterate`].
pub struct Iter<'a, H: HeaderBlob> {
    table: &'a Table<H>,
    next_index: u64,
}

impl<'a, H: HeaderBlob> Iterator for Iter<'a, H> {
    type Item = (u64, &'a [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        while self.next_index < self.table.max_records {
            let index = self.next_index;
            self.next_index += 1;
            if self.table.read_descriptor(index).state == RecordState::Stored {
                return Some((index, self.table.get_record_with_validation(index)));
            }
        }
        None
    }
}

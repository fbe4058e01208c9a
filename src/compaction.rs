//! Data-area and record-slot compaction.
//!
//! The two are independent: data-area compaction reclaims garbage bytes left
//! behind by shrinking writes and deletes by sliding live ranges to the front
//! of the data area; record-slot compaction reclaims descriptor indices by
//! packing Stored slots down to the low end of the descriptor array. Slot
//! compaction is never run implicitly — only [`crate::recovery`] calls it, at
//! open.

use tracing::warn;

use crate::layout::{Descriptor, HeaderBlob, RecordState, INVALID_INDEX};
use crate::table::Table;

/// Whether a data-area compaction should re-verify each record's checksum as
/// it slides it, dropping any record that fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompactionMode {
    /// Trust descriptors as-is; used for compactions triggered during normal
    /// operation, where every live record was already validated on write.
    NoValidation,
    /// Recompute and compare each record's CRC-32C before keeping it. Only
    /// used at open, where the data on disk might have been damaged since the
    /// last checksum was recorded.
    WithValidation,
}

impl<H: HeaderBlob> Table<H> {
    /// Slides every record reachable from the data-order list down to a
    /// contiguous run starting at offset 0, in list order, eliminating all
    /// garbage gaps between them.
    pub(crate) fn compact_data(&mut self, mode: CompactionMode) {
        let mut indices = Vec::new();
        let mut cursor = self.head_data_index;
        while cursor != INVALID_INDEX {
            indices.push(cursor);
            cursor = self.read_descriptor(cursor).next_data_index;
        }

        let mut write_offset = 0u64;
        for index in indices {
            let mut descriptor = self.read_descriptor(index);
            let old_offset = descriptor.data_offset;
            let size = descriptor.data_size;

            if mode == CompactionMode::WithValidation {
                let bytes = self.data_bytes(old_offset, size);
                if crate::integrity::checksum(bytes) != descriptor.crc32 {
                    warn!(index, "dropping record with invalid checksum during compaction");
                    self.remove_from_data_list(index);
                    self.write_descriptor(index, &Descriptor::default());
                    self.release_slot(index);
                    continue;
                }
            }

            if old_offset != write_offset {
                let moved = self.data_bytes(old_offset, size).to_vec();
                self.data_bytes_mut(write_offset, size).copy_from_slice(&moved);
                descriptor.data_offset = write_offset;
                self.write_descriptor(index, &descriptor);
            }
            write_offset += size;
        }

        self.next_data_offset = write_offset;
        self.gap_space_size = 0;
        self.persist_header();
    }

    /// Packs every non-Free descriptor down to the lowest indices available,
    /// in ascending order, reclaiming the free list and lowering the
    /// high-water mark to the number of live records.
    pub(crate) fn compact_records(&mut self) {
        self.finish_move();

        let mut write_cursor = 0u64;
        for read_cursor in 0..self.next_free_record_index {
            if self.read_descriptor(read_cursor).state == RecordState::Free {
                continue;
            }
            if read_cursor != write_cursor {
                self.prepare_move(read_cursor, write_cursor);
            }
            write_cursor += 1;
        }

        self.next_free_record_index = write_cursor;
        self.free_indices.clear();
        self.persist_header();
    }

    /// Records a pending slot move in the header and immediately attempts to
    /// carry it out. Recorded first so a crash between recording and carrying
    /// it out still leaves enough information for [`Self::finish_move`] to
    /// complete it on the next open.
    pub(crate) fn prepare_move(&mut self, src: u64, dst: u64) {
        self.move_src_index = src;
        self.move_dst_index = dst;
        self.persist_header();
        self.finish_move();
    }

    /// Completes whatever slot move is recorded in the header, if any.
    /// Idempotent: calling it with no move pending is a no-op, and calling it
    /// twice for the same pair after the first call already completed it is
    /// also a no-op (the pair is cleared once the move lands).
    pub(crate) fn finish_move(&mut self) -> bool {
        if self.move_src_index == INVALID_INDEX {
            return false;
        }
        let src = self.move_src_index;
        let dst = self.move_dst_index;

        if src != dst {
            let mut descriptor = self.read_descriptor(src);
            descriptor.state = RecordState::Stored;
            let prev = descriptor.prev_data_index;
            let next = descriptor.next_data_index;

            if prev == INVALID_INDEX {
                self.head_data_index = dst;
            } else {
                let mut prev_descriptor = self.read_descriptor(prev);
                prev_descriptor.next_data_index = dst;
                self.write_descriptor(prev, &prev_descriptor);
            }
            if next == INVALID_INDEX {
                self.tail_data_index = dst;
            } else {
                let mut next_descriptor = self.read_descriptor(next);
                next_descriptor.prev_data_index = dst;
                self.write_descriptor(next, &next_descriptor);
            }

            self.write_descriptor(dst, &descriptor);
            self.write_descriptor(src, &Descriptor::default());
        }

        self.move_src_index = INVALID_INDEX;
        self.move_dst_index = INVALID_INDEX;
        self.persist_header();
        true
    }
}

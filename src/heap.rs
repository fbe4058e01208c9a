//! The data area: a bump-pointer heap plus a doubly linked "data order" list
//! threaded through descriptor indices, so compaction can walk live ranges in
//! the order they occupy the file without a separate index structure.

use tracing::debug;

use crate::compaction::CompactionMode;
use crate::layout::{HeaderBlob, INVALID_INDEX};
use crate::table::Table;

impl<H: HeaderBlob> Table<H> {
    /// Appends `index` to the tail of the data-order list.
    pub(crate) fn add_to_data_list(&mut self, index: u64) {
        let mut descriptor = self.read_descriptor(index);
        descriptor.prev_data_index = self.tail_data_index;
        descriptor.next_data_index = INVALID_INDEX;
        self.write_descriptor(index, &descriptor);

        if self.tail_data_index == INVALID_INDEX {
            self.head_data_index = index;
        } else {
            let mut tail = self.read_descriptor(self.tail_data_index);
            tail.next_data_index = index;
            self.write_descriptor(self.tail_data_index, &tail);
        }
        self.tail_data_index = index;
    }

    /// Unlinks `index` from the data-order list. Does not touch its
    /// descriptor's own prev/next fields — the caller is about to overwrite
    /// the whole descriptor.
    pub(crate) fn remove_from_data_list(&mut self, index: u64) {
        let descriptor = self.read_descriptor(index);
        let prev = descriptor.prev_data_index;
        let next = descriptor.next_data_index;

        if prev == INVALID_INDEX {
            self.head_data_index = next;
        } else {
            let mut prev_descriptor = self.read_descriptor(prev);
            prev_descriptor.next_data_index = next;
            self.write_descriptor(prev, &prev_descriptor);
        }

        if next == INVALID_INDEX {
            self.tail_data_index = prev;
        } else {
            let mut next_descriptor = self.read_descriptor(next);
            next_descriptor.prev_data_index = prev;
            self.write_descriptor(next, &next_descriptor);
        }
    }

    /// Bump-allocates `size` bytes at the end of the live data. Only reaches
    /// for compaction or growth when the bump pointer doesn't already fit —
    /// a store with no garbage and no growth never pays for either.
    pub(crate) fn allocate_data(&mut self, size: u64) -> u64 {
        if self.next_data_offset + size > self.data_area_size {
            self.try_compact_data(size);
            if self.next_data_offset + size > self.data_area_size {
                self.expand_data_area(size);
            }
        }

        let offset = self.next_data_offset;
        self.next_data_offset += size;
        offset
    }

    /// Compacts the data area if there's both enough accumulated garbage to
    /// cross the configured threshold and enough of it to actually satisfy
    /// `need` once reclaimed — compacting for a threshold breach that still
    /// wouldn't make room would just be paying the cost twice.
    ///
    /// The threshold is measured against `initial_data_area_size`, the
    /// capacity captured once at creation — not the live, possibly-grown
    /// `data_area_size` — so a store that has grown well past its original
    /// footprint keeps compacting at the original cadence instead of
    /// tolerating a proportionally larger backlog of garbage.
    pub(crate) fn try_compact_data(&mut self, need: u64) {
        if self.gap_threshold_pct == 0 || self.initial_data_area_size == 0 {
            return;
        }
        let pct = u64::from(self.gap_threshold_pct);
        let threshold = (self.initial_data_area_size / 100) * pct
            + ((self.initial_data_area_size % 100) * pct) / 100;
        if self.gap_space_size > threshold && self.gap_space_size >= need {
            debug!(
                gap_space_size = self.gap_space_size,
                threshold, need, "compacting data area"
            );
            self.compact_data(CompactionMode::NoValidation);
        }
    }

    /// Grows the data area to fit at least `min_extra` more bytes past the
    /// current bump pointer, doubling when that isn't enough on its own.
    pub(crate) fn expand_data_area(&mut self, min_extra: u64) {
        let required = self.next_data_offset + min_extra;
        let mut new_size = self.data_area_size;
        while new_size < required {
            new_size = new_size.saturating_mul(2);
        }

        debug!(
            old_size = self.data_area_size,
            new_size, "expanding data area"
        );

        self.data_area_size = new_size;
        let file_len = self.data_area_offset + self.data_area_size;
        self.mapping
            .resize_to(file_len)
            .expect("failed to grow store file");
        self.persist_header();
    }
}

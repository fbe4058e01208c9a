//! Crash recovery, run once at the end of [`crate::table::Table::open`].
//!
//! A store can be reopened after a crash at any point between two committed
//! writes, so recovery has to reconstruct in-memory bookkeeping the header
//! alone doesn't carry (the free list), discard work that never reached a
//! durable state (allocated-but-uncommitted records), complete an
//! interrupted slot move, and re-validate data that might have been only
//! partially written.

use tracing::{info, instrument};

use crate::compaction::CompactionMode;
use crate::layout::{Descriptor, HeaderBlob, RecordState, INVALID_INDEX};
use crate::table::Table;

impl<H: HeaderBlob> Table<H> {
    #[instrument(skip_all)]
    pub(crate) fn recover(&mut self) {
        self.finish_move();

        for index in 0..self.next_free_record_index {
            if self.read_descriptor(index).state == RecordState::Allocated {
                info!(index, "discarding uncommitted record found at open");
                self.remove_from_data_list(index);
                self.write_descriptor(index, &Descriptor::default());
            }
        }

        for index in 0..self.next_free_record_index {
            if self.read_descriptor(index).state == RecordState::Free {
                self.free_indices.push_back(index);
            }
        }

        self.gap_space_size = self.next_data_offset.saturating_sub(self.live_data_bytes());

        self.compact_records();
        self.compact_data(CompactionMode::WithValidation);
        self.persist_header();
    }

    fn live_data_bytes(&self) -> u64 {
        let mut total = 0u64;
        let mut cursor = self.head_data_index;
        while cursor != INVALID_INDEX {
            let descriptor = self.read_descriptor(cursor);
            total += descriptor.data_size;
            cursor = descriptor.next_data_index;
        }
        total
    }
}

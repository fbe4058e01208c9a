//! A typed facade over [`Table`] that composes allocate/write/commit into
//! single calls, so callers never see a record in the Allocated state.

use crate::layout::{HeaderBlob, RecordState};
use crate::table::{Table, INVALID};

/// Composed record operations over a [`Table`].
pub struct Storage<H: HeaderBlob> {
    table: Table<H>,
}

impl<H: HeaderBlob> Storage<H> {
    /// Wraps an already-open table.
    pub fn new(table: Table<H>) -> Self {
        Storage { table }
    }

    /// Borrows the underlying table, for callers that need primitives this
    /// facade doesn't expose (e.g. `header_data`).
    pub fn table(&mut self) -> &mut Table<H> {
        &mut self.table
    }

    /// Allocates, writes, and commits `bytes` as one new record. Returns
    /// [`INVALID`] if allocation fails; no partially-written record is ever
    /// left visible, since it never reaches the Stored state.
    pub fn create_record(&mut self, bytes: &[u8]) -> u64 {
        let index = self.table.alloc_record(bytes.len() as u64);
        if index == INVALID {
            return INVALID;
        }
        if !self.table.write_record_data(index, bytes) {
            return INVALID;
        }
        self.table.commit_record(index);
        index
    }

    /// Deletes `index`. Returns `false` if it isn't Stored.
    pub fn delete_record(&mut self, index: u64) -> bool {
        self.table.delete_record(index)
    }

    /// Returns the validated byte range for `index`, or empty if it isn't
    /// Stored or fails its checksum.
    pub fn get_record(&self, index: u64) -> &[u8] {
        self.table.get_record_with_validation(index)
    }

    /// Replaces the contents of `index`. If `bytes` fits in the record's
    /// already-allocated size, it's overwritten in place and `index` is
    /// unchanged. Otherwise the record is deleted and a new one created,
    /// which may return a different index. Returns [`INVALID`] if `index`
    /// isn't currently Stored or `bytes` is empty (a zero-size record is
    /// never a valid state, same as [`Self::create_record`]).
    pub fn update_record(&mut self, index: u64, bytes: &[u8]) -> u64 {
        if index >= self.table.max_records || bytes.is_empty() {
            return INVALID;
        }
        let descriptor = self.table.read_descriptor(index);
        if descriptor.state != RecordState::Stored {
            return INVALID;
        }

        if bytes.len() as u64 <= descriptor.data_size {
            self.table.write_record_data(index, bytes);
            return index;
        }

        self.table.delete_record(index);
        self.create_record(bytes)
    }

    /// Iterates every Stored record as `(index, bytes)`, validated.
    pub fn iterate(&self) -> crate::table::Iter<'_, H> {
        self.table.iterate()
    }

    /// Number of live records.
    pub fn count_records(&self) -> u64 {
        self.table.count_records()
    }
}

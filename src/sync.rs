//! A `Mutex`-guarded facade over [`Storage`] for hosts that share one store
//! across threads. The store itself has no internal concurrency story (§5);
//! this is the single external lock callers are expected to wrap it in,
//! provided here so they don't have to write it themselves.

use parking_lot::Mutex;

use crate::layout::HeaderBlob;
use crate::storage::Storage;
use crate::table::Table;

/// Thread-safe wrapper over [`Storage`]. Every method takes the lock for the
/// duration of the call; record bytes are returned as owned `Vec<u8>` since a
/// borrow into the mapping can't outlive the guard.
pub struct SyncStorage<H: HeaderBlob> {
    inner: Mutex<Storage<H>>,
}

impl<H: HeaderBlob> SyncStorage<H> {
    /// Wraps an already-open table.
    pub fn new(table: Table<H>) -> Self {
        SyncStorage {
            inner: Mutex::new(Storage::new(table)),
        }
    }

    /// See [`Storage::create_record`].
    pub fn create_record(&self, bytes: &[u8]) -> u64 {
        self.inner.lock().create_record(bytes)
    }

    /// See [`Storage::delete_record`].
    pub fn delete_record(&self, index: u64) -> bool {
        self.inner.lock().delete_record(index)
    }

    /// See [`Storage::get_record`]. Returns `None` if the index isn't Stored
    /// or fails validation, rather than an empty slice, since an empty slice
    /// is a perfectly valid record length that was never possible to store in
    /// the first place (zero-size allocations are rejected).
    pub fn get_record(&self, index: u64) -> Option<Vec<u8>> {
        let guard = self.inner.lock();
        let bytes = guard.get_record(index);
        if bytes.is_empty() {
            None
        } else {
            Some(bytes.to_vec())
        }
    }

    /// See [`Storage::update_record`]. Returns `u64::MAX` under the same
    /// conditions.
    pub fn update_record(&self, index: u64, bytes: &[u8]) -> u64 {
        self.inner.lock().update_record(index, bytes)
    }

    /// Collects every live record into an owned `(index, bytes)` vector.
    pub fn collect_records(&self) -> Vec<(u64, Vec<u8>)> {
        let guard = self.inner.lock();
        guard
            .iterate()
            .map(|(index, bytes)| (index, bytes.to_vec()))
            .collect()
    }

    /// Number of live records.
    pub fn count_records(&self) -> u64 {
        self.inner.lock().count_records()
    }

    /// Forces dirty pages out to the backing file. See [`Table::flush`].
    pub fn flush(&self) -> crate::error::Result<()> {
        self.inner.lock().table().flush()
    }
}

impl<H: HeaderBlob> std::fmt::Debug for SyncStorage<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncStorage").finish_non_exhaustive()
    }
}


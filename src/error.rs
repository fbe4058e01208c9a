//! Error types for the recoverable, I/O-adjacent surface of the store.
//!
//! Precondition violations on individual operations (zero-size allocation, wrong
//! descriptor state, slot table full, ...) are reported inline as `false`/`Invalid`
//! per the Table/Storage API contract; they never appear here. Corruption that the
//! store cannot safely reason about mid-operation (move-indices out of range,
//! data-list pointers out of range during compaction, a version/descriptor-size
//! stamp from an incompatible build) is fatal per §4.8 and aborts via `assert!`
//! rather than flowing through this type. A header-size mismatch detected at
//! `open` is treated differently: it's the ordinary, I/O-adjacent case of opening
//! the same file with a different user-header type, so it's reported here instead.

use thiserror::Error;

/// Errors surfaced by [`crate::table::Table::open`] and the handful of operations
/// that touch the filesystem directly.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Opening, resizing, or flushing the backing file failed.
    #[error("I/O error on store file: {0}")]
    Io(#[from] std::io::Error),

    /// The on-disk header's user-header blob size does not match `size_of::<H>()`
    /// for the type the caller is opening with.
    #[error("user header size mismatch: file has {on_disk} bytes, type is {expected} bytes")]
    UserHeaderSizeMismatch {
        /// Size recorded in the file at first creation.
        on_disk: usize,
        /// `size_of::<H>()` for the type passed to `open`.
        expected: usize,
    },
}

/// Result type alias for the store's I/O boundary.
pub type Result<T> = std::result::Result<T, StoreError>;

//! A persistent, memory-mapped dynamic record store.
//!
//! A single file holds a fixed-size opaque user header, an array of record
//! descriptors, and a data area, mapped once with `mmap` and grown in place
//! as records are written. Records are addressed by a stable `u64` index that
//! survives deletes and compaction of other records. Every record carries a
//! CRC-32C checksum, checked on validated reads and revalidated at open.
//!
//! The lowest layer, [`Table`], is the raw allocate/write/commit/delete
//! primitive set. [`Storage`] composes those into single-call record
//! operations. [`SyncStorage`] adds a mutex for hosts sharing one store
//! across threads.
//!
//! ```no_run
//! use dynatable::{HeaderBlob, Storage, Table};
//!
//! #[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
//! #[repr(C)]
//! struct Meta {
//!     schema_version: u32,
//!     _padding: u32,
//! }
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let table: Table<Meta> = Table::open("store.db", 1024, 1 << 20, 30)?;
//! let mut storage = Storage::new(table);
//! let index = storage.create_record(b"hello");
//! assert_eq!(storage.get_record(index), b"hello");
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

mod compaction;
mod error;
mod heap;
mod integrity;
mod layout;
mod mapping;
mod recovery;
mod slot;
mod storage;
mod sync;
mod table;

pub use error::{Result, StoreError};
pub use layout::HeaderBlob;
pub use storage::Storage;
pub use sync::SyncStorage;
pub use table::{Iter, Table, DEFAULT_GAP_THRESHOLD_PCT, DEFAULT_INITIAL_DATA_AREA_SIZE, INVALID};

//! File-backed memory mapping: acquires a file by path, grows it in place, and
//! exposes a contiguous writable byte region. Never interprets the bytes it
//! holds — that is [`crate::layout`]'s job.

use std::fs::{File, OpenOptions};
use std::path::Path;

use memmap2::MmapMut;
use tracing::debug;

use crate::error::Result;

/// A growable memory-mapped file.
pub struct FileMapping {
    file: File,
    mmap: MmapMut,
}

impl FileMapping {
    /// Opens `path` for read-write, creating it if absent. If the file is
    /// empty, it is resized to `initial_len` bytes before mapping.
    pub fn open(path: &Path, initial_len: u64) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        if file.metadata()?.len() == 0 {
            file.set_len(initial_len)?;
        }

        // SAFETY: `file` was just opened read-write and has a non-zero length
        // (either pre-existing or just set above), so the mapping covers a
        // fully allocated byte range.
        let mmap = unsafe { MmapMut::map_mut(&file)? };

        Ok(FileMapping { file, mmap })
    }

    /// Current length of the mapping, in bytes.
    pub fn len(&self) -> u64 {
        self.mmap.len() as u64
    }

    /// Resizes the backing file to exactly `new_len` bytes and remaps.
    ///
    /// Used both to grow the data area (§4.1) and to shrink the file back to
    /// zero on [`crate::table::Table::clear`].
    ///
    /// `new_len` must be non-zero; a memory mapping cannot cover an empty
    /// file. [`crate::table::Table::clear`] resets content by re-stamping a
    /// fresh header over a mapping shrunk back to header size, not by
    /// mapping zero bytes.
    pub fn resize_to(&mut self, new_len: u64) -> Result<()> {
        debug_assert!(new_len > 0, "a mapping cannot cover an empty file");
        debug!(new_len, "resizing and remapping store file");
        self.mmap.flush()?;
        self.file.set_len(new_len)?;
        // SAFETY: `set_len` above guarantees the file covers `new_len` bytes.
        self.mmap = unsafe { MmapMut::map_mut(&self.file)? };
        Ok(())
    }

    /// Read-only view of the whole mapping.
    pub fn as_bytes(&self) -> &[u8] {
        &self.mmap[..]
    }

    /// Mutable view of the whole mapping.
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.mmap[..]
    }

    /// Flushes dirty pages to the backing file. The store never calls this
    /// automatically (§5); it is an escape hatch for callers that want a
    /// synchronous durability point.
    pub fn flush(&self) -> Result<()> {
        self.mmap.flush()?;
        Ok(())
    }
}

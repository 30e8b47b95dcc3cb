// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! File-backed shared-memory segments.
//!
//! A [`SharedMemorySegment`] maps a fixed-size byte region backed by a
//! filesystem path (on a tmpfs domain this is plain RAM). Segments are the
//! only state shared between processes; everything visible across the
//! mapping is addressed by offsets, never by pointers.
//!
//! This layer provides no locking. Consistency is the responsibility of the
//! ring layers above, which confine cross-process mutation to atomic header
//! fields with acquire/release ordering.

use std::fs::{File, OpenOptions};
use std::marker::PhantomData;
use std::path::Path;

use memmap2::{Mmap, MmapRaw};

use crate::{Error, Result};

/// How a shared-memory segment (or a whole flow) is accessed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    /// Create the backing file; fails if it already exists. Writers use
    /// this through flow creation only.
    CreateReadWrite,
    /// Map an existing file for reading and writing.
    OpenReadWrite,
    /// Map an existing file read-only.
    OpenReadOnly,
}

enum Mapping {
    ReadWrite(MmapRaw),
    ReadOnly(Mmap),
}

/// A mapped, file-backed byte region.
///
/// Dropping the segment releases the mapping; the backing file is *not*
/// removed (file removal is the flow manager's concern). Mappings stay
/// valid after the backing file is unlinked, per host mmap semantics.
pub struct SharedMemorySegment {
    mapping: Mapping,
    len: usize,
}

impl SharedMemorySegment {
    /// Creates the backing file sized to `size` (zero-filled via truncate)
    /// and maps it read-write.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidArg`] for a zero size
    /// - [`Error::Io`] if the path already exists or the file cannot be
    ///   created, sized, or mapped
    pub fn create(path: &Path, size: usize) -> Result<Self> {
        if size == 0 {
            return Err(Error::InvalidArg);
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)?;
        file.set_len(size as u64)?;
        let mapping = MmapRaw::map_raw(&file)?;
        Ok(Self {
            mapping: Mapping::ReadWrite(mapping),
            len: size,
        })
    }

    /// Maps an existing file, taking its size from the filesystem.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidArg`] for [`AccessMode::CreateReadWrite`] (reserved
    ///   for [`Self::create`])
    /// - [`Error::Io`] if the file is absent or cannot be mapped
    /// - [`Error::Other`] if the file is empty or smaller than `min_size`
    pub fn open(path: &Path, mode: AccessMode, min_size: usize) -> Result<Self> {
        let writable = match mode {
            AccessMode::CreateReadWrite => return Err(Error::InvalidArg),
            AccessMode::OpenReadWrite => true,
            AccessMode::OpenReadOnly => false,
        };

        let file = OpenOptions::new().read(true).write(writable).open(path)?;
        let len = file.metadata()?.len() as usize;
        if len == 0 || len < min_size {
            return Err(Error::Other(format!(
                "Shared memory segment \"{}\" is {} byte(s), expected at least {}.",
                path.display(),
                len,
                min_size.max(1)
            )));
        }

        let mapping = if writable {
            Mapping::ReadWrite(MmapRaw::map_raw(&file)?)
        } else {
            Mapping::ReadOnly(map_read_only(&file)?)
        };
        Ok(Self { mapping, len })
    }

    /// Length of the mapped region in bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the region has zero length (never the case for a
    /// successfully constructed segment).
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns `true` if the mapping allows stores.
    pub fn is_writable(&self) -> bool {
        matches!(self.mapping, Mapping::ReadWrite(_))
    }

    /// Base address of the region.
    pub fn as_ptr(&self) -> *const u8 {
        match &self.mapping {
            Mapping::ReadWrite(raw) => raw.as_ptr(),
            Mapping::ReadOnly(map) => map.as_ptr(),
        }
    }

    /// Mutable base address of the region.
    ///
    /// # Panics
    ///
    /// Panics if the segment was opened read-only; callers gate on
    /// [`Self::is_writable`].
    pub fn as_mut_ptr(&self) -> *mut u8 {
        match &self.mapping {
            Mapping::ReadWrite(raw) => raw.as_mut_ptr(),
            Mapping::ReadOnly(_) => panic!("attempted mutable access to a read-only segment"),
        }
    }
}

fn map_read_only(file: &File) -> Result<Mmap> {
    // Safety: the mapping is only ever read through shared references, and
    // concurrent writer processes confine mutation to atomic fields.
    let map = unsafe { Mmap::map(file)? };
    Ok(map)
}

/// A typed view of a header `T` at offset 0 of a shared-memory segment.
///
/// The view validates that the region is large enough for `T` and hands out
/// a reference whose lifetime is tied to the mapping. `T` must be `repr(C)`
/// with all cross-process-mutable fields atomic.
pub struct SharedMemoryInstance<T> {
    segment: SharedMemorySegment,
    _marker: PhantomData<T>,
}

impl<T> SharedMemoryInstance<T> {
    /// Creates a new segment sized for a `T` header followed by `extra`
    /// payload bytes. The header starts zero-filled; the caller initializes
    /// it through [`Self::initialize`] before publication.
    pub fn create(path: &Path, extra: usize) -> Result<Self> {
        let segment = SharedMemorySegment::create(path, size_of::<T>() + extra)?;
        Ok(Self {
            segment,
            _marker: PhantomData,
        })
    }

    /// Opens an existing segment, validating it holds at least a `T`.
    pub fn open(path: &Path, mode: AccessMode) -> Result<Self> {
        let segment = SharedMemorySegment::open(path, mode, size_of::<T>())?;
        Ok(Self {
            segment,
            _marker: PhantomData,
        })
    }

    /// Wraps an already mapped segment, validating it holds at least a `T`.
    pub fn from_segment(segment: SharedMemorySegment) -> Result<Self> {
        if segment.len() < size_of::<T>() {
            return Err(Error::Other(format!(
                "Shared memory segment is {} byte(s), smaller than its {}-byte header.",
                segment.len(),
                size_of::<T>()
            )));
        }
        Ok(Self {
            segment,
            _marker: PhantomData,
        })
    }

    /// Returns the typed header view.
    pub fn get(&self) -> &T {
        // Safety: construction validated the region size, the region lives
        // as long as `self`, and mutable shared fields within `T` are
        // atomics.
        unsafe { &*(self.segment.as_ptr() as *const T) }
    }

    /// Overwrites the header with `value`. Used once during flow creation,
    /// before the directory rename makes the region visible to any other
    /// process.
    pub(crate) fn initialize(&self, value: T) {
        // Safety: exclusive access is guaranteed pre-publication; the
        // region is writable because creation maps read-write.
        unsafe { std::ptr::write(self.segment.as_mut_ptr() as *mut T, value) }
    }

    /// The underlying untyped segment.
    pub fn segment(&self) -> &SharedMemorySegment {
        &self.segment
    }
}

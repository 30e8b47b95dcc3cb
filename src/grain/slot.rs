// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! On-disk grain layout and ring-slot storage.
//!
//! Each ring slot is its own mapped file: a [`GrainInfo`] header followed by
//! `grain_size` payload bytes. Slot `s` of an `N`-slot ring holds the most
//! recent grain whose index `i` satisfies `i % N == s`.

use std::path::Path;
use std::sync::atomic::AtomicU64;

use crate::shmem::{AccessMode, SharedMemorySegment};
use crate::time::UNDEFINED_INDEX;
use crate::{Error, FLOW_FORMAT_VERSION, Result};

/// Per-slot grain header, at offset 0 of each grain file.
///
/// `committed_size` and `index` are the slot's concurrency protocol: the
/// writer release-stores `committed_size` after the payload bytes are in
/// place, and readers acquire-load `(index, committed_size)` to decide
/// whether the slot currently holds the revision they asked for.
#[repr(C)]
pub struct GrainInfo {
    /// Layout version, [`FLOW_FORMAT_VERSION`].
    pub version: u32,
    /// Size in bytes of this header.
    pub size: u32,
    /// Allocated payload bytes; equal across all slots of a flow.
    pub grain_size: u64,
    /// Payload bytes valid in the current revision: `0` means not yet
    /// committed, `grain_size` means complete, anything between is a
    /// partial grain.
    pub committed_size: AtomicU64,
    /// Absolute grain index occupying this slot, or
    /// [`UNDEFINED_INDEX`] for an empty slot.
    pub index: AtomicU64,
    /// `-1` for host memory; reserved for GPU-resident payloads.
    pub device_index: i32,
    _reserved: [u8; 12],
}

/// Byte offset of the payload within a grain file.
pub(crate) const GRAIN_PAYLOAD_OFFSET: usize = size_of::<GrainInfo>();

/// One mapped ring slot.
pub(crate) struct GrainSlot {
    segment: SharedMemorySegment,
}

impl GrainSlot {
    /// Creates a slot file sized for `payload_size` bytes and initializes
    /// its header to the empty state.
    pub(crate) fn create(path: &Path, payload_size: usize) -> Result<Self> {
        if payload_size == 0 {
            return Err(Error::InvalidArg);
        }
        let segment = SharedMemorySegment::create(path, GRAIN_PAYLOAD_OFFSET + payload_size)?;
        let info = GrainInfo {
            version: FLOW_FORMAT_VERSION,
            size: size_of::<GrainInfo>() as u32,
            grain_size: payload_size as u64,
            committed_size: AtomicU64::new(0),
            index: AtomicU64::new(UNDEFINED_INDEX),
            device_index: -1,
            _reserved: [0; 12],
        };
        // Safety: the file was just created; nothing else has it mapped
        // before the flow directory is published.
        unsafe { std::ptr::write(segment.as_mut_ptr() as *mut GrainInfo, info) };
        Ok(Self { segment })
    }

    /// Maps an existing slot file and validates its header against the
    /// mapped length.
    pub(crate) fn open(path: &Path, mode: AccessMode) -> Result<Self> {
        let segment = SharedMemorySegment::open(path, mode, GRAIN_PAYLOAD_OFFSET)?;
        let slot = Self { segment };
        let info = slot.info();
        if info.grain_size == 0
            || slot.segment.len() < GRAIN_PAYLOAD_OFFSET + info.grain_size as usize
        {
            return Err(Error::Other(format!(
                "Grain file \"{}\" declares {} payload byte(s) but maps {} in total.",
                path.display(),
                info.grain_size,
                slot.segment.len()
            )));
        }
        Ok(slot)
    }

    /// The slot's shared header.
    pub(crate) fn info(&self) -> &GrainInfo {
        // Safety: construction validated the region size; mutable shared
        // fields are atomics.
        unsafe { &*(self.segment.as_ptr() as *const GrainInfo) }
    }

    /// Allocated payload size in bytes.
    pub(crate) fn payload_size(&self) -> usize {
        self.info().grain_size as usize
    }

    /// Base address of the payload.
    pub(crate) fn payload_ptr(&self) -> *const u8 {
        // Safety: offset is within the validated mapping.
        unsafe { self.segment.as_ptr().add(GRAIN_PAYLOAD_OFFSET) }
    }

    /// Mutable base address of the payload. Requires a writable mapping.
    pub(crate) fn payload_mut_ptr(&self) -> *mut u8 {
        // Safety: offset is within the validated mapping.
        unsafe { self.segment.as_mut_ptr().add(GRAIN_PAYLOAD_OFFSET) }
    }
}

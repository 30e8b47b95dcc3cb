// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! RAII grain write access for safe zero-copy writing.

use std::sync::atomic::Ordering;

use tracing::trace;

use crate::flow::data::DiscreteFlowData;
use crate::grain::slot::GrainSlot;
use crate::time::UNDEFINED_INDEX;
use crate::{Error, Result};

/// RAII-protected grain writing session.
///
/// Provides mutable access to a grain's payload buffer for zero-copy
/// writing. A session that never published anything is automatically
/// canceled on drop, so an abandoned session (early return, panic) never
/// leaves a half-claimed slot behind. Once any prefix has been committed,
/// readers may already have observed it; dropping the session then leaves
/// the published bytes in place.
///
/// The lifetime `'a` is tied to the [`crate::GrainWriter`] that created
/// this session.
///
/// A grain can be published incrementally: [`Self::commit_partial`] makes a
/// growing prefix of the payload visible while the session stays open, and
/// [`Self::commit`] publishes the final size and ends the session. Readers
/// that accept partial grains may consume the prefix as it grows.
///
/// # Examples
///
/// ```no_run
/// # use mxl::GrainWriter;
/// # fn example(writer: GrainWriter) -> Result<(), mxl::Error> {
/// let mut access = writer.open_grain(100)?;
/// access.payload_mut().fill(42);
/// let size = access.max_size();
/// access.commit(size)?;
/// # Ok(())
/// # }
/// ```
pub struct GrainWriteAccess<'a> {
    flow: &'a DiscreteFlowData,
    slot: &'a GrainSlot,
    index: u64,
    /// Prevents auto-cancel on drop once any bytes have been published or
    /// the session has been canceled.
    committed_or_canceled: bool,
}

impl<'a> GrainWriteAccess<'a> {
    pub(crate) fn new(flow: &'a DiscreteFlowData, slot: &'a GrainSlot, index: u64) -> Self {
        Self {
            flow,
            slot,
            index,
            committed_or_canceled: false,
        }
    }

    /// The grain index this session writes.
    pub fn index(&self) -> u64 {
        self.index
    }

    /// Maximum size of the grain payload in bytes.
    pub fn max_size(&self) -> usize {
        self.slot.payload_size()
    }

    /// Returns mutable access to the grain's payload buffer.
    ///
    /// This is zero-copy write access into the shared-memory ring.
    /// Modifications become visible to readers only up to the committed
    /// size.
    pub fn payload_mut(&mut self) -> &mut [u8] {
        // Safety: the writer's flow was opened read-write, the slot mapping
        // outlives `'a`, and the single-writer discipline means no other
        // mutable view of this payload exists.
        unsafe {
            std::slice::from_raw_parts_mut(self.slot.payload_mut_ptr(), self.slot.payload_size())
        }
    }

    /// Publishes a growing prefix of the payload without ending the
    /// session.
    ///
    /// Readers that accept partial grains can consume `valid_bytes` of the
    /// payload after this returns. The committed size can only grow.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArg`] if `valid_bytes` is zero, exceeds the
    /// payload size, or shrinks a previously committed prefix.
    pub fn commit_partial(&mut self, valid_bytes: usize) -> Result<()> {
        self.publish(valid_bytes)
    }

    /// Commits the grain, making it visible to readers, and ends the
    /// session.
    ///
    /// Passing [`Self::max_size`] publishes a complete grain; a smaller
    /// value leaves the grain's final revision partial, which consumers may
    /// accept or skip by policy.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArg`] under the same conditions as
    /// [`Self::commit_partial`].
    pub fn commit(mut self, valid_bytes: usize) -> Result<()> {
        self.publish(valid_bytes)
    }

    fn publish(&mut self, valid_bytes: usize) -> Result<()> {
        let info = self.slot.info();
        if valid_bytes == 0
            || valid_bytes > self.slot.payload_size()
            || (valid_bytes as u64) < info.committed_size.load(Ordering::Relaxed)
        {
            return Err(Error::InvalidArg);
        }

        // Payload bytes first, then the committed size, then the sync
        // counter: a reader that acquires the counter or the size sees the
        // bytes it covers.
        info.committed_size
            .store(valid_bytes as u64, Ordering::Release);
        self.flow.record_commit();
        // The slot now holds reader-visible bytes; drop must not retract
        // them.
        self.committed_or_canceled = true;
        Ok(())
    }

    /// Cancels the write session, returning the slot to the empty state.
    ///
    /// Any prefix published through [`Self::commit_partial`] is withdrawn;
    /// readers polling for this index will run into their timeout. The
    /// same index can be opened again afterwards.
    pub fn cancel(mut self) {
        self.cancel_inner();
        self.committed_or_canceled = true;
    }

    fn cancel_inner(&mut self) {
        let info = self.slot.info();
        info.committed_size.store(0, Ordering::Release);
        info.index.store(UNDEFINED_INDEX, Ordering::Release);
    }
}

impl Drop for GrainWriteAccess<'_> {
    /// Automatically cancels sessions that never published anything.
    fn drop(&mut self) {
        if !self.committed_or_canceled {
            trace!("Canceling unpublished grain write at index {}", self.index);
            self.cancel_inner();
        }
    }
}

// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! RAII sample write access for safe zero-copy audio writing.

use crate::Error;
use crate::flow::data::{ChannelRangeSpec, ContinuousFlowData};

/// RAII-protected audio sample writing session.
///
/// Provides mutable access to one sample range on every channel of a
/// continuous flow. Data may be split into two fragments per channel if the
/// range wraps the ring boundary.
///
/// Nothing becomes visible to readers until [`Self::commit`] runs: the
/// write heads stay put, so an abandoned session (drop without commit)
/// discards the batch. The sample bytes themselves may linger in shared
/// memory, but no head covers them.
///
/// The lifetime `'a` is tied to the [`crate::SamplesWriter`] that created
/// this session.
///
/// # Examples
///
/// ```no_run
/// # use mxl::SamplesWriter;
/// # fn example(writer: SamplesWriter) -> Result<(), mxl::Error> {
/// let mut access = writer.open_samples(1000, 480)?;
/// for ch in 0..access.channels() {
///     let (frag1, frag2) = access.channel_data_mut(ch)?;
///     frag1.fill(0x42);
///     frag2.fill(0x42);
/// }
/// access.commit()?;
/// # Ok(())
/// # }
/// ```
pub struct SamplesWriteAccess<'a> {
    flow: &'a ContinuousFlowData,
    spec: ChannelRangeSpec,
    start_index: u64,
    count: usize,
}

impl<'a> SamplesWriteAccess<'a> {
    pub(crate) fn new(
        flow: &'a ContinuousFlowData,
        spec: ChannelRangeSpec,
        start_index: u64,
        count: usize,
    ) -> Self {
        Self {
            flow,
            spec,
            start_index,
            count,
        }
    }

    /// Returns the number of audio channels.
    pub fn channels(&self) -> usize {
        self.flow.channel_count()
    }

    /// Number of samples in this batch (per channel).
    pub fn sample_count(&self) -> usize {
        self.count
    }

    /// The absolute index of the first sample in this batch.
    pub fn start_index(&self) -> u64 {
        self.start_index
    }

    /// Returns mutable access to a specific channel's sample buffer.
    ///
    /// Each channel's range is returned as two mutable byte slices
    /// (fragments). If the range does not wrap the ring boundary, the
    /// second fragment is empty.
    ///
    /// The slices are raw bytes; for float32 audio view them as
    /// `&mut [f32]` with `bytemuck::cast_slice_mut`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArg`] if `channel >= channels()`.
    pub fn channel_data_mut(&mut self, channel: usize) -> crate::Result<(&mut [u8], &mut [u8])> {
        if channel >= self.flow.channel_count() {
            return Err(Error::InvalidArg);
        }
        // Safety: the spec stays within the writable channel plane, the
        // mapping outlives `'a`, and `&mut self` keeps the two returned
        // slices unique within this session.
        unsafe {
            let plane = self.flow.planes_mut_ptr().add(self.spec.stride * channel);
            Ok((
                std::slice::from_raw_parts_mut(
                    plane.add(self.spec.first_offset),
                    self.spec.first_len,
                ),
                std::slice::from_raw_parts_mut(plane, self.spec.second_len),
            ))
        }
    }

    /// Commits the batch, making it visible to readers.
    ///
    /// Advances every channel's write head past the batch with release
    /// ordering (the sample bytes are published first), then wakes blocking
    /// readers.
    pub fn commit(self) -> crate::Result<()> {
        let end = self.start_index + self.count as u64;
        for channel in 0..self.flow.channel_count() {
            self.flow.advance_head(channel, end);
        }
        self.flow.record_commit();
        Ok(())
    }

    /// Abandons the batch without committing.
    ///
    /// The write heads are not advanced and readers are not notified;
    /// equivalent to dropping the session.
    pub fn cancel(self) {}
}

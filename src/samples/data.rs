// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! Sample data structures for zero-copy audio access.

use std::marker::PhantomData;

use crate::Error;
use crate::flow::data::ChannelRangeSpec;

/// Zero-copy view of multi-channel audio sample data.
///
/// Provides read-only access to a sample range stored in a flow's channel
/// buffers. Each channel is returned separately; a range that wraps the
/// ring boundary splits into two fragments.
///
/// The lifetime `'a` is tied to the [`crate::SamplesReader`] that produced
/// it.
///
/// # Examples
///
/// ```no_run
/// # use mxl::SamplesData;
/// # fn example(samples: SamplesData) -> Result<(), mxl::Error> {
/// for ch in 0..samples.num_of_channels() {
///     let (frag1, frag2) = samples.channel_data(ch)?;
///     println!("Channel {}: {} + {} bytes", ch, frag1.len(), frag2.len());
/// }
/// # Ok(())
/// # }
/// ```
pub struct SamplesData<'a> {
    base: *const u8,
    spec: ChannelRangeSpec,
    channel_count: usize,
    start_index: u64,
    phantom: PhantomData<&'a ()>,
}

impl<'a> SamplesData<'a> {
    pub(crate) fn new(
        base: *const u8,
        spec: ChannelRangeSpec,
        channel_count: usize,
        start_index: u64,
    ) -> Self {
        Self {
            base,
            spec,
            channel_count,
            start_index,
            phantom: PhantomData,
        }
    }

    /// Returns the number of audio channels.
    pub fn num_of_channels(&self) -> usize {
        self.channel_count
    }

    /// The absolute index of the first sample in this view.
    pub fn start_index(&self) -> u64 {
        self.start_index
    }

    /// Returns zero-copy access to a specific channel's sample data.
    ///
    /// Each channel's data is returned as two byte slices (fragments). If
    /// the range does not wrap the ring boundary, the second fragment is
    /// empty.
    ///
    /// The returned slices are raw bytes; for float32 audio view them as
    /// `&[f32]` with `bytemuck::cast_slice`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArg`] if `channel >= num_of_channels()`.
    pub fn channel_data(&self, channel: usize) -> crate::Result<(&[u8], &[u8])> {
        if channel >= self.channel_count {
            return Err(Error::InvalidArg);
        }
        // Safety: the spec was computed against the mapped channel planes,
        // which outlive `'a`.
        unsafe {
            let plane = self.base.add(self.spec.stride * channel);
            Ok((
                std::slice::from_raw_parts(plane.add(self.spec.first_offset), self.spec.first_len),
                std::slice::from_raw_parts(plane, self.spec.second_len),
            ))
        }
    }

    /// Creates an owned copy of this sample data.
    ///
    /// Allocates vectors and copies all channel data. Use this when you
    /// need to keep the samples beyond the reader's lifetime.
    pub fn to_owned(&self) -> OwnedSamplesData {
        self.into()
    }
}

impl<'a> AsRef<SamplesData<'a>> for SamplesData<'a> {
    fn as_ref(&self) -> &SamplesData<'a> {
        self
    }
}

/// Owned copy of multi-channel sample data.
///
/// Unlike [`SamplesData`], this owns its data and can outlive the reader.
/// Each channel is stored as a contiguous `Vec<u8>` with both fragments
/// joined.
pub struct OwnedSamplesData {
    /// Per-channel sample data (raw bytes).
    pub payload: Vec<Vec<u8>>,
}

impl<'a> From<&SamplesData<'a>> for OwnedSamplesData {
    fn from(value: &SamplesData<'a>) -> Self {
        let mut payload = Vec::with_capacity(value.channel_count);
        for channel in 0..value.channel_count {
            // The channel index is in range by construction.
            let (frag1, frag2) = value
                .channel_data(channel)
                .unwrap_or((&[] as &[u8], &[] as &[u8]));
            let mut channel_payload = Vec::with_capacity(frag1.len() + frag2.len());
            channel_payload.extend_from_slice(frag1);
            channel_payload.extend_from_slice(frag2);
            payload.push(channel_payload);
        }
        Self { payload }
    }
}

impl<'a> From<SamplesData<'a>> for OwnedSamplesData {
    fn from(value: SamplesData<'a>) -> Self {
        value.as_ref().into()
    }
}

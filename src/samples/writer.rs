// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! Sample writer implementation for continuous media flows.

use std::cell::Cell;
use std::marker::PhantomData;

use crate::flow::data::ContinuousFlowData;
use crate::time::{self, Rational, is_valid_value};
use crate::{Error, FlowConfigInfo, FlowRuntimeInfo, Result};

use super::write_access::SamplesWriteAccess;

/// Writer for continuous audio sample streams.
///
/// Writes multi-channel sample ranges into the flow's channel buffers.
/// Ranges are addressed by absolute sample index `[start_index,
/// start_index + count)`; commits advance the per-channel write heads and
/// wake blocking readers.
///
/// Single-writer discipline is by convention: the format does not stop a
/// second writer, but flows assume at most one.
///
/// # Thread Safety
///
/// `SamplesWriter` is `Send` but not `Sync`. Each writer should be used by
/// only one thread at a time, but can be transferred between threads.
///
/// # Examples
///
/// ```no_run
/// # use mxl::{MxlInstance, SamplesWriter};
/// # fn example(instance: MxlInstance, writer: SamplesWriter) -> Result<(), mxl::Error> {
/// let rate = writer.sample_rate();
/// let start = instance.get_current_index(&rate);
///
/// let mut access = writer.open_samples(start, 480)?; // 10 ms at 48 kHz
/// for ch in 0..access.channels() {
///     let (frag1, frag2) = access.channel_data_mut(ch)?;
///     frag1.fill(0);
///     frag2.fill(0);
/// }
/// access.commit()?;
/// # Ok(())
/// # }
/// ```
pub struct SamplesWriter {
    flow: ContinuousFlowData,
    // Writers hand out mutable buffer views; keep them off shared use.
    _not_sync: PhantomData<Cell<()>>,
}

impl SamplesWriter {
    pub(crate) fn new(flow: ContinuousFlowData) -> Self {
        Self {
            flow,
            _not_sync: PhantomData,
        }
    }

    /// The rate at which this flow's sample indices advance.
    pub fn sample_rate(&self) -> Rational {
        self.flow.sample_rate()
    }

    /// Maps a TAI timestamp to a sample index on this flow's clock.
    ///
    /// Returns [`crate::UNDEFINED_INDEX`] for out-of-range timestamps.
    pub fn index_at_time(&self, timestamp: u64) -> u64 {
        time::timestamp_to_index(&self.flow.sample_rate(), timestamp)
    }

    /// Retrieves flow configuration (format, rate, channel dimensions).
    pub fn get_config_info(&self) -> FlowConfigInfo {
        self.flow.config_info()
    }

    /// Retrieves flow runtime state (head index, last access times).
    pub fn get_runtime_info(&self) -> FlowRuntimeInfo {
        self.flow.runtime_info()
    }

    /// Opens the range `[start_index, start_index + count)` on every
    /// channel for writing.
    ///
    /// Returns a [`SamplesWriteAccess`] session exposing the per-channel
    /// buffers (two fragments when the range wraps). Committing the session
    /// advances every channel's write head past the range; dropping it
    /// uncommitted leaves the heads untouched.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArg`] if the index is out of range or
    /// `count` is zero or exceeds the ring capacity.
    pub fn open_samples(&self, start_index: u64, count: usize) -> Result<SamplesWriteAccess<'_>> {
        self.validate_range(start_index, count)?;
        let spec = self.flow.range_spec(start_index, count);
        Ok(SamplesWriteAccess::new(&self.flow, spec, start_index, count))
    }

    /// Copies `data` into one channel at `[start_index, start_index + n)`
    /// and commits it, advancing only that channel's write head.
    ///
    /// `data.len()` must be a whole number of sample words; the sample
    /// count `n` is `data.len() / sample_word_size`. The copy wraps the
    /// ring boundary with at most two passes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArg`] for an unknown channel, a byte length
    /// that is not a multiple of the word size, or a range that is empty or
    /// exceeds the ring capacity.
    pub fn write_channel(&self, channel: usize, start_index: u64, data: &[u8]) -> Result<()> {
        let word = self.flow.sample_word_size();
        if channel >= self.flow.channel_count() || data.len() % word != 0 {
            return Err(Error::InvalidArg);
        }
        let count = data.len() / word;
        self.validate_range(start_index, count)?;

        let spec = self.flow.range_spec(start_index, count);
        // Safety: the range spec stays within the channel plane, the
        // mapping is writable, and the single-writer discipline means no
        // concurrent writer aliases these bytes.
        unsafe {
            let plane = self.flow.planes_mut_ptr().add(spec.stride * channel);
            std::ptr::copy_nonoverlapping(
                data.as_ptr(),
                plane.add(spec.first_offset),
                spec.first_len,
            );
            std::ptr::copy_nonoverlapping(
                data.as_ptr().add(spec.first_len),
                plane,
                spec.second_len,
            );
        }

        self.flow.advance_head(channel, start_index + count as u64);
        self.flow.record_commit();
        Ok(())
    }

    fn validate_range(&self, start_index: u64, count: usize) -> Result<()> {
        if !is_valid_value(start_index)
            || count == 0
            || count > self.flow.channel_buffer_length()
            || start_index
                .checked_add(count as u64)
                .is_none_or(|end| !is_valid_value(end))
        {
            return Err(Error::InvalidArg);
        }
        Ok(())
    }
}

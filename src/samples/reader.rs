// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! Sample reader implementation for continuous media flows.

use std::cell::Cell;
use std::marker::PhantomData;
use std::time::Duration;

use crate::flow::data::ContinuousFlowData;
use crate::time::{self, Rational, is_valid_value};
use crate::wait::wait_until;
use crate::{Error, FlowConfigInfo, FlowInfo, FlowRuntimeInfo, Result, SamplesData};

/// Reader for continuous audio sample streams.
///
/// Provides zero-copy access to multi-channel sample ranges addressed by
/// absolute sample index. Reads can block with a timeout until the writer's
/// heads cover the requested range. A reader that falls behind receives
/// [`Error::OutOfRangeTooLate`] and should resynchronize to the head.
///
/// # Thread Safety
///
/// `SamplesReader` is `Send` but not `Sync`. Each reader should be used by
/// only one thread at a time, but can be transferred between threads.
///
/// # Examples
///
/// ```no_run
/// # use mxl::SamplesReader;
/// # use std::time::Duration;
/// # fn example(reader: SamplesReader) -> Result<(), mxl::Error> {
/// let head = reader.get_runtime_info().head_index;
/// let samples = reader.get_samples(head - 479, 480, Duration::from_secs(1))?;
/// println!("Read {} channels", samples.num_of_channels());
/// # Ok(())
/// # }
/// ```
pub struct SamplesReader {
    flow: ContinuousFlowData,
    _not_sync: PhantomData<Cell<()>>,
}

impl SamplesReader {
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

    /// Retrieves complete flow information (config + runtime).
    pub fn get_info(&self) -> FlowInfo {
        FlowInfo {
            config: self.flow.config_info(),
            runtime: self.flow.runtime_info(),
        }
    }

    /// Retrieves flow configuration (format, rate, channel dimensions).
    pub fn get_config_info(&self) -> FlowConfigInfo {
        self.flow.config_info()
    }

    /// Retrieves flow runtime state (head index, last access times).
    ///
    /// Useful for tracking how much data is available before reading.
    pub fn get_runtime_info(&self) -> FlowRuntimeInfo {
        self.flow.runtime_info()
    }

    /// The exclusive write head of one channel: every sample strictly below
    /// it has been committed on that channel (acquire).
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArg`] for an unknown channel.
    pub fn head_index(&self, channel: usize) -> Result<u64> {
        if channel >= self.flow.channel_count() {
            return Err(Error::InvalidArg);
        }
        Ok(self.flow.channel_head(channel))
    }

    /// Reads the range `[start_index, start_index + count)` across all
    /// channels, blocking until every channel's head covers it or the
    /// timeout expires.
    ///
    /// A zero timeout performs a single non-blocking poll.
    ///
    /// # Errors
    ///
    /// - [`Error::OutOfRangeTooLate`] if the range has been overwritten in
    ///   at least one channel's ring
    /// - [`Error::Timeout`] if the range is not fully committed within
    ///   `timeout`
    /// - [`Error::InvalidArg`] for an out-of-range index or a count of zero
    ///   or beyond the ring capacity
    pub fn get_samples(
        &self,
        start_index: u64,
        count: usize,
        timeout: Duration,
    ) -> Result<SamplesData<'_>> {
        self.validate_range(start_index, count)?;
        let sync_counter = &self.flow.info().continuous.sync_counter;
        let mut last_sync = None;
        wait_until(timeout, || {
            let observed = sync_counter.load(std::sync::atomic::Ordering::Acquire);
            if last_sync.replace(observed) == Some(observed) {
                return Ok(None);
            }
            self.poll_samples(start_index, count)
        })
    }

    /// Reads a sample range without blocking.
    ///
    /// # Errors
    ///
    /// - [`Error::OutOfRangeTooLate`] if the range has been overwritten
    /// - [`Error::OutOfRangeTooEarly`] if the range is not fully committed
    ///   yet
    pub fn get_samples_non_blocking(
        &self,
        start_index: u64,
        count: usize,
    ) -> Result<SamplesData<'_>> {
        match self.get_samples(start_index, count, Duration::ZERO) {
            Err(Error::Timeout) => Err(Error::OutOfRangeTooEarly),
            other => other,
        }
    }

    /// Single acquire-ordered availability check of the requested range.
    fn poll_samples(&self, start_index: u64, count: usize) -> Result<Option<SamplesData<'_>>> {
        let end = start_index + count as u64;
        let buffer_length = self.flow.channel_buffer_length() as u64;

        let max_head = self.flow.max_head();
        if max_head > buffer_length && start_index < max_head - buffer_length {
            // The oldest still-resident sample has moved past the range in
            // at least one channel.
            return Err(Error::OutOfRangeTooLate);
        }
        if self.flow.min_head() < end {
            return Ok(None);
        }

        self.flow.touch_read_time();
        Ok(Some(SamplesData::new(
            self.flow.planes_ptr(),
            self.flow.range_spec(start_index, count),
            self.flow.channel_count(),
            start_index,
        )))
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

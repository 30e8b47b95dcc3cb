// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! Grain reader implementation for discrete media flows.

use std::cell::Cell;
use std::marker::PhantomData;
use std::sync::atomic::Ordering;
use std::time::Duration;

use crate::flow::data::DiscreteFlowData;
use crate::time::{self, Rational, UNDEFINED_INDEX, is_valid_value};
use crate::wait::wait_until;
use crate::{Error, FlowConfigInfo, FlowInfo, FlowRuntimeInfo, GrainData, Result};

/// Reader for discrete media grains (video frames, data packets).
///
/// Provides zero-copy access to grains stored in the flow's ring. Grains
/// are addressed by absolute index; reads can be blocking (with timeout) or
/// non-blocking. A reader that falls behind the writer receives
/// [`Error::OutOfRangeTooLate`] and should resynchronize to the current
/// index.
///
/// # Thread Safety
///
/// `GrainReader` is `Send` but not `Sync`. Each reader should be used by
/// only one thread at a time, but can be transferred between threads.
///
/// # Examples
///
/// ```no_run
/// # use mxl::{MxlInstance, GrainReader};
/// # use std::time::Duration;
/// # fn example(instance: MxlInstance, reader: GrainReader) -> Result<(), mxl::Error> {
/// let rate = reader.get_config_info().grain_rate()?;
/// let index = instance.get_current_index(&rate);
///
/// let grain = reader.get_complete_grain(index, Duration::from_secs(5))?;
/// println!("Read {} bytes", grain.payload.len());
/// # Ok(())
/// # }
/// ```
pub struct GrainReader {
    flow: DiscreteFlowData,
    _not_sync: PhantomData<Cell<()>>,
}

impl GrainReader {
    pub(crate) fn new(flow: DiscreteFlowData) -> Self {
        Self {
            flow,
            _not_sync: PhantomData,
        }
    }

    /// The rate at which this flow's grain indices advance.
    pub fn grain_rate(&self) -> Rational {
        self.flow.grain_rate()
    }

    /// Retrieves complete flow information (config + runtime).
    pub fn get_info(&self) -> FlowInfo {
        FlowInfo {
            config: self.flow.config_info(),
            runtime: self.flow.runtime_info(),
        }
    }

    /// Retrieves flow configuration (format, rate, ring dimensions).
    pub fn get_config_info(&self) -> FlowConfigInfo {
        self.flow.config_info()
    }

    /// Retrieves flow runtime state (head index, last access times).
    ///
    /// Useful for checking how much data is available before reading.
    pub fn get_runtime_info(&self) -> FlowRuntimeInfo {
        self.flow.runtime_info()
    }

    /// Reads the grain at `index`, blocking until data is available or the
    /// timeout expires. Partial grains are returned as soon as any prefix
    /// is committed; whether to accept them is the consumer's policy.
    ///
    /// A zero timeout performs a single non-blocking poll.
    ///
    /// # Errors
    ///
    /// - [`Error::OutOfRangeTooLate`] if the grain has been overwritten by
    ///   a newer revision of its slot
    /// - [`Error::Timeout`] if nothing was committed within `timeout`
    /// - [`Error::InvalidArg`] for an out-of-range index
    pub fn get_grain(&self, index: u64, timeout: Duration) -> Result<GrainData<'_>> {
        self.get_grain_inner(index, timeout, false)
    }

    /// Reads a complete grain, blocking until every payload byte is
    /// committed or the timeout expires.
    ///
    /// # Errors
    ///
    /// As [`Self::get_grain`], with [`Error::Timeout`] also covering grains
    /// that stay partial past the deadline.
    pub fn get_complete_grain(&self, index: u64, timeout: Duration) -> Result<GrainData<'_>> {
        self.get_grain_inner(index, timeout, true)
    }

    /// Reads the grain at `index` without blocking (may return partial
    /// data).
    ///
    /// # Errors
    ///
    /// - [`Error::OutOfRangeTooLate`] if the grain has been overwritten
    /// - [`Error::OutOfRangeTooEarly`] if nothing has been committed at
    ///   this index yet
    pub fn get_grain_non_blocking(&self, index: u64) -> Result<GrainData<'_>> {
        match self.get_grain(index, Duration::ZERO) {
            Err(Error::Timeout) => Err(Error::OutOfRangeTooEarly),
            other => other,
        }
    }

    /// Waits for the grain whose index is current on the flow's edit-rate
    /// clock right now.
    ///
    /// Reads `current_index(grain_rate)` as the target and then behaves
    /// like [`Self::get_grain`]. The returned view carries the target
    /// index.
    ///
    /// # Errors
    ///
    /// As [`Self::get_grain`], plus [`Error::Other`] if the flow's stored
    /// rate is invalid or the clock failed.
    pub fn wait_for_new_grain(&self, timeout: Duration) -> Result<GrainData<'_>> {
        let rate = self.flow.grain_rate();
        let target = time::current_index(&rate);
        if target == UNDEFINED_INDEX {
            return Err(Error::Other(format!(
                "Cannot compute the current index, invalid rate {rate}."
            )));
        }
        self.get_grain(target, timeout)
    }

    /// Bounded wait keyed on the flow's sync counter: the slot is
    /// re-examined on the first pass and whenever a commit has happened
    /// since the last one.
    fn get_grain_inner(
        &self,
        index: u64,
        timeout: Duration,
        require_complete: bool,
    ) -> Result<GrainData<'_>> {
        if !is_valid_value(index) {
            return Err(Error::InvalidArg);
        }
        let sync_counter = &self.flow.info().discrete.sync_counter;
        let mut last_sync = None;
        wait_until(timeout, || {
            let observed = sync_counter.load(Ordering::Acquire);
            if last_sync.replace(observed) == Some(observed) {
                return Ok(None);
            }
            self.poll_grain(index, require_complete)
        })
    }

    /// Single acquire-ordered snapshot of the slot for `index`.
    fn poll_grain(&self, index: u64, require_complete: bool) -> Result<Option<GrainData<'_>>> {
        let slot = self.flow.slot_for(index);
        let info = slot.info();

        let resident = info.index.load(Ordering::Acquire);
        let committed = info.committed_size.load(Ordering::Acquire);

        if resident != UNDEFINED_INDEX && resident > index {
            // The requested grain has been overwritten and is
            // unrecoverable.
            return Err(Error::OutOfRangeTooLate);
        }
        if resident != index || committed == 0 {
            return Ok(None);
        }
        if require_complete && committed < info.grain_size {
            return Ok(None);
        }

        // Safety: the payload pointer stays valid for the reader's
        // lifetime, and the acquire load of `committed_size` ordered the
        // covered bytes before this view. A later reclamation may rewrite
        // them, which the format accepts for readers that fell behind.
        let payload =
            unsafe { std::slice::from_raw_parts(slot.payload_ptr(), committed as usize) };

        self.flow.touch_read_time();
        Ok(Some(GrainData {
            payload,
            total_size: info.grain_size as usize,
            index,
        }))
    }
}

// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! Grain writer implementation for discrete media flows.

use std::cell::Cell;
use std::marker::PhantomData;
use std::sync::atomic::Ordering;

use crate::flow::data::DiscreteFlowData;
use crate::time::{Rational, UNDEFINED_INDEX, is_valid_value};
use crate::{Error, FlowConfigInfo, FlowRuntimeInfo, Result};

use super::write_access::GrainWriteAccess;

/// Writer for discrete media grains (video frames, data packets).
///
/// Provides zero-copy write access to grains in the flow's ring. Each grain
/// is opened at a specific index, written via [`GrainWriteAccess`], and
/// committed to make it visible to readers.
///
/// Single-writer discipline is by convention: the format does not stop a
/// second writer, but flows assume at most one.
///
/// # Thread Safety
///
/// `GrainWriter` is `Send` but not `Sync`. Each writer should be used by
/// only one thread at a time, but can be transferred between threads.
///
/// # Examples
///
/// ```no_run
/// # use mxl::{MxlInstance, GrainWriter};
/// # fn example(instance: MxlInstance, writer: GrainWriter) -> Result<(), mxl::Error> {
/// let rate = writer.grain_rate();
/// let index = instance.get_current_index(&rate);
///
/// let mut access = writer.open_grain(index)?;
/// access.payload_mut().fill(0xFF);
/// let size = access.max_size();
/// access.commit(size)?;
/// # Ok(())
/// # }
/// ```
pub struct GrainWriter {
    flow: DiscreteFlowData,
    // Writers hand out mutable payload views; keep them off shared use.
    _not_sync: PhantomData<Cell<()>>,
}

impl GrainWriter {
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

    /// Retrieves flow configuration (format, rate, ring dimensions).
    pub fn get_config_info(&self) -> FlowConfigInfo {
        self.flow.config_info()
    }

    /// Retrieves flow runtime state (head index, last access times).
    pub fn get_runtime_info(&self) -> FlowRuntimeInfo {
        self.flow.runtime_info()
    }

    /// Opens a grain for writing at the specified index.
    ///
    /// The slot `index % grain_count` is claimed for the new grain. If the
    /// slot holds an older committed grain, that revision is reclaimed
    /// (readers still asking for the old index will observe the index
    /// mismatch and report out-of-range).
    ///
    /// Returns a [`GrainWriteAccess`] session providing mutable access to
    /// the payload buffer. The session must be committed to become visible;
    /// dropping it uncommitted cancels the grain.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidArg`] if `index` is the undefined sentinel or out
    ///   of the convertible range
    /// - [`Error::Conflict`] if the slot already holds this exact index
    /// - [`Error::OutOfRangeTooLate`] if the slot holds a newer index (the
    ///   writer tried to regress)
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use mxl::GrainWriter;
    /// # fn example(writer: GrainWriter) -> Result<(), mxl::Error> {
    /// let mut access = writer.open_grain(100)?;
    /// for (i, byte) in access.payload_mut().iter_mut().enumerate() {
    ///     *byte = (i % 256) as u8;
    /// }
    /// let size = access.max_size();
    /// access.commit(size)?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn open_grain(&self, index: u64) -> Result<GrainWriteAccess<'_>> {
        if !is_valid_value(index) {
            return Err(Error::InvalidArg);
        }

        let slot = self.flow.slot_for(index);
        let info = slot.info();

        let resident = info.index.load(Ordering::Acquire);
        if resident != UNDEFINED_INDEX {
            if resident == index {
                return Err(Error::Conflict);
            }
            if resident > index {
                return Err(Error::OutOfRangeTooLate);
            }
        }

        // Retire the old revision before renumbering the slot, so no reader
        // can pair the new index with the old committed size.
        info.committed_size.store(0, Ordering::Release);
        info.index.store(index, Ordering::Release);

        Ok(GrainWriteAccess::new(&self.flow, slot, index))
    }
}

// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! Opened flow state: the mapped header plus the kind-specific storage.
//!
//! [`FlowData`] is the closed set of flow kinds. Discrete flows carry their
//! ring of mapped grain slots; continuous flows carry the channel-major
//! sample planes. Callers dispatch on the variant; there is no open set of
//! kinds.

use std::sync::atomic::Ordering;

use uuid::Uuid;

use crate::flow::{
    ContinuousFlow, DataFormat, DiscreteFlow, FlowConfigDetail, FlowConfigInfo, FlowRuntimeInfo,
};
use crate::grain::slot::GrainSlot;
use crate::shmem::{SharedMemoryInstance, SharedMemorySegment};
use crate::time::{self, Rational, UNDEFINED_INDEX};
use crate::{Error, Result};

/// An opened flow of either kind.
pub enum FlowData {
    /// Grain-based flow (video, generic data).
    Discrete(DiscreteFlowData),
    /// Sample-based flow (audio).
    Continuous(ContinuousFlowData),
}

impl FlowData {
    /// The flow's unique identifier.
    pub fn id(&self) -> Uuid {
        match self {
            FlowData::Discrete(data) => data.info().header.common.id(),
            FlowData::Continuous(data) => data.info().header.common.id(),
        }
    }

    /// The flow's media data format.
    pub fn data_format(&self) -> DataFormat {
        match self {
            FlowData::Discrete(data) => data.info().header.common.data_format(),
            FlowData::Continuous(data) => data.info().header.common.data_format(),
        }
    }

    /// Static configuration snapshot.
    pub fn config_info(&self) -> FlowConfigInfo {
        match self {
            FlowData::Discrete(data) => data.config_info(),
            FlowData::Continuous(data) => data.config_info(),
        }
    }

    /// Runtime state snapshot.
    pub fn runtime_info(&self) -> FlowRuntimeInfo {
        match self {
            FlowData::Discrete(data) => data.runtime_info(),
            FlowData::Continuous(data) => data.runtime_info(),
        }
    }

    /// Returns `true` if the mapped state is internally consistent.
    pub fn is_valid(&self) -> bool {
        match self {
            FlowData::Discrete(data) => data.is_valid(),
            FlowData::Continuous(data) => data.is_valid(),
        }
    }
}

/// An opened discrete flow: header mapping plus one mapped slot per ring
/// position.
pub struct DiscreteFlowData {
    flow: SharedMemoryInstance<DiscreteFlow>,
    grains: Vec<GrainSlot>,
}

impl DiscreteFlowData {
    /// Assembles a discrete flow from its mapped parts, validating the ring
    /// invariants: the slot count matches the header and every slot
    /// declares the same payload size.
    pub(crate) fn new(
        flow: SharedMemoryInstance<DiscreteFlow>,
        grains: Vec<GrainSlot>,
    ) -> Result<Self> {
        let data = Self { flow, grains };
        let info = data.info();
        if info.discrete.grain_count == 0 || data.grains.len() != info.discrete.grain_count as usize
        {
            return Err(Error::Other(format!(
                "Flow declares {} grain slot(s) but {} were mapped.",
                info.discrete.grain_count,
                data.grains.len()
            )));
        }
        let payload_size = data.grains[0].payload_size();
        if data
            .grains
            .iter()
            .any(|slot| slot.payload_size() != payload_size)
        {
            return Err(Error::Other(
                "Grain slots disagree on the payload size.".to_string(),
            ));
        }
        Ok(data)
    }

    /// The mapped flow header.
    pub fn info(&self) -> &DiscreteFlow {
        self.flow.get()
    }

    /// Number of slots in the grain ring.
    pub fn grain_count(&self) -> usize {
        self.grains.len()
    }

    /// Payload bytes per grain.
    pub fn grain_payload_size(&self) -> usize {
        self.grains[0].payload_size()
    }

    /// The rate at which grain indices advance.
    pub fn grain_rate(&self) -> Rational {
        self.info().discrete.grain_rate
    }

    /// Returns `true` if the mapped state is internally consistent.
    pub fn is_valid(&self) -> bool {
        !self.grains.is_empty() && self.grains.len() == self.info().discrete.grain_count as usize
    }

    /// The slot that holds (or will hold) grain `index`.
    pub(crate) fn slot_for(&self, index: u64) -> &GrainSlot {
        &self.grains[(index % self.grains.len() as u64) as usize]
    }

    /// Static configuration snapshot.
    pub fn config_info(&self) -> FlowConfigInfo {
        let info = self.info();
        FlowConfigInfo::new(
            info.header.common.id(),
            info.header.common.data_format(),
            info.discrete.grain_rate,
            FlowConfigDetail::Discrete {
                grain_count: info.discrete.grain_count,
                grain_payload_size: self.grain_payload_size() as u64,
            },
        )
    }

    /// Runtime state snapshot. The head is the highest grain index with a
    /// nonzero committed size, scanned across the ring with acquire loads.
    pub fn runtime_info(&self) -> FlowRuntimeInfo {
        let mut head = UNDEFINED_INDEX;
        for slot in &self.grains {
            let info = slot.info();
            let index = info.index.load(Ordering::Acquire);
            let committed = info.committed_size.load(Ordering::Acquire);
            if index != UNDEFINED_INDEX && committed > 0 && (head == UNDEFINED_INDEX || index > head)
            {
                head = index;
            }
        }
        let common = &self.info().header.common;
        FlowRuntimeInfo {
            head_index: head,
            last_write_time: common.last_write_time.load(Ordering::Relaxed),
            last_read_time: common.last_read_time.load(Ordering::Relaxed),
        }
    }

    /// Records a successful read in the shared header, when the mapping
    /// allows stores.
    pub(crate) fn touch_read_time(&self) {
        if self.flow.segment().is_writable() {
            self.info()
                .header
                .common
                .last_read_time
                .store(time::get_time(), Ordering::Relaxed);
        }
    }

    /// Records a commit in the shared header and wakes polling readers.
    /// Must run after the committed payload bytes are published.
    pub(crate) fn record_commit(&self) {
        let info = self.info();
        info.discrete.sync_counter.fetch_add(1, Ordering::Release);
        info.header
            .common
            .last_write_time
            .store(time::get_time(), Ordering::Relaxed);
    }
}

/// Byte layout of a sample range within each channel plane: one fragment,
/// or two when the range wraps the ring boundary.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ChannelRangeSpec {
    /// Byte offset of the first fragment within a channel plane.
    pub first_offset: usize,
    /// Bytes in the first fragment.
    pub first_len: usize,
    /// Bytes in the second fragment, starting at plane offset 0. Zero when
    /// the range does not wrap.
    pub second_len: usize,
    /// Bytes between consecutive channel planes.
    pub stride: usize,
}

/// An opened continuous flow: header mapping plus the channel-plane
/// segment.
pub struct ContinuousFlowData {
    flow: SharedMemoryInstance<ContinuousFlow>,
    channels: SharedMemorySegment,
}

impl ContinuousFlowData {
    /// Assembles a continuous flow from its mapped parts, validating that
    /// the channel segment covers every declared plane.
    pub(crate) fn new(
        flow: SharedMemoryInstance<ContinuousFlow>,
        channels: SharedMemorySegment,
    ) -> Result<Self> {
        let data = Self { flow, channels };
        let info = &data.info().continuous;
        if info.channel_count == 0
            || info.channel_count as usize > crate::MAX_CHANNEL_COUNT
            || info.sample_word_size == 0
            || info.buffer_length == 0
        {
            return Err(Error::Other(format!(
                "Continuous flow declares invalid dimensions: {} channel(s), {}-byte words, {} sample ring.",
                info.channel_count, info.sample_word_size, info.buffer_length
            )));
        }
        // Checked so a corrupted header cannot sneak an undersized segment
        // past this check through a wrapped product.
        let expected = crate::flow::checked_channel_data_size(
            info.channel_count as usize,
            info.buffer_length as usize,
            info.sample_word_size as usize,
        )
        .ok_or_else(|| {
            Error::Other(format!(
                "Continuous flow declares oversized channel planes: {} channel(s), {} sample ring, {}-byte words.",
                info.channel_count, info.buffer_length, info.sample_word_size
            ))
        })?;
        if data.channels.len() < expected {
            return Err(Error::Other(format!(
                "Channel data segment is {} byte(s), expected {}.",
                data.channels.len(),
                expected
            )));
        }
        Ok(data)
    }

    /// The mapped flow header.
    pub fn info(&self) -> &ContinuousFlow {
        self.flow.get()
    }

    /// Number of channels.
    pub fn channel_count(&self) -> usize {
        self.info().continuous.channel_count as usize
    }

    /// Bytes per sample word.
    pub fn sample_word_size(&self) -> usize {
        self.info().continuous.sample_word_size as usize
    }

    /// Ring capacity in samples per channel.
    pub fn channel_buffer_length(&self) -> usize {
        self.info().continuous.buffer_length as usize
    }

    /// Total samples across all channels.
    pub fn channel_data_length(&self) -> usize {
        self.channel_count() * self.channel_buffer_length()
    }

    /// Total bytes of the channel-plane segment.
    pub fn channel_data_size(&self) -> usize {
        self.channel_data_length() * self.sample_word_size()
    }

    /// The rate at which sample indices advance.
    pub fn sample_rate(&self) -> Rational {
        self.info().continuous.sample_rate
    }

    /// Returns `true` if the mapped state is internally consistent.
    pub fn is_valid(&self) -> bool {
        self.channels.len() >= self.channel_data_size()
    }

    /// Exclusive write head of one channel (acquire).
    pub(crate) fn channel_head(&self, channel: usize) -> u64 {
        self.info().continuous.channel_heads[channel].load(Ordering::Acquire)
    }

    /// Smallest exclusive write head across all channels: every sample
    /// strictly below it is committed on every channel.
    pub(crate) fn min_head(&self) -> u64 {
        (0..self.channel_count())
            .map(|channel| self.channel_head(channel))
            .min()
            .unwrap_or(0)
    }

    /// Largest exclusive write head across all channels; used to detect
    /// ranges that have been overwritten in at least one channel.
    pub(crate) fn max_head(&self) -> u64 {
        (0..self.channel_count())
            .map(|channel| self.channel_head(channel))
            .max()
            .unwrap_or(0)
    }

    /// Computes the fragment layout of `count` samples starting at
    /// `start_index`. The caller has validated `count` against the ring
    /// capacity.
    pub(crate) fn range_spec(&self, start_index: u64, count: usize) -> ChannelRangeSpec {
        let word = self.sample_word_size();
        let length = self.channel_buffer_length();
        let offset = (start_index % length as u64) as usize;
        let first = count.min(length - offset);
        ChannelRangeSpec {
            first_offset: offset * word,
            first_len: first * word,
            second_len: (count - first) * word,
            stride: length * word,
        }
    }

    /// Base address of channel plane 0.
    pub(crate) fn planes_ptr(&self) -> *const u8 {
        self.channels.as_ptr()
    }

    /// Mutable base address of channel plane 0. Requires a writable
    /// mapping.
    pub(crate) fn planes_mut_ptr(&self) -> *mut u8 {
        self.channels.as_mut_ptr()
    }

    /// Records a successful read in the shared header, when the mapping
    /// allows stores.
    pub(crate) fn touch_read_time(&self) {
        if self.flow.segment().is_writable() {
            self.info()
                .header
                .common
                .last_read_time
                .store(time::get_time(), Ordering::Relaxed);
        }
    }

    /// Advances one channel's head to cover `end_index` (exclusive) with
    /// release ordering, after the sample bytes are in place. Heads only
    /// grow.
    pub(crate) fn advance_head(&self, channel: usize, end_index: u64) {
        let head = &self.info().continuous.channel_heads[channel];
        if head.load(Ordering::Relaxed) < end_index {
            head.store(end_index, Ordering::Release);
        }
    }

    /// Records a commit in the shared header and wakes polling readers.
    pub(crate) fn record_commit(&self) {
        let info = self.info();
        info.continuous.sync_counter.fetch_add(1, Ordering::Release);
        info.header
            .common
            .last_write_time
            .store(time::get_time(), Ordering::Relaxed);
    }

    /// Static configuration snapshot.
    pub fn config_info(&self) -> FlowConfigInfo {
        let info = self.info();
        FlowConfigInfo::new(
            info.header.common.id(),
            info.header.common.data_format(),
            info.continuous.sample_rate,
            FlowConfigDetail::Continuous {
                channel_count: info.continuous.channel_count,
                sample_word_size: info.continuous.sample_word_size,
                buffer_length: info.continuous.buffer_length,
            },
        )
    }

    /// Runtime state snapshot. The head is the last sample index committed
    /// across every channel.
    pub fn runtime_info(&self) -> FlowRuntimeInfo {
        let min_head = self.min_head();
        let common = &self.info().header.common;
        FlowRuntimeInfo {
            head_index: if min_head == 0 {
                UNDEFINED_INDEX
            } else {
                min_head - 1
            },
            last_write_time: common.last_write_time.load(Ordering::Relaxed),
            last_read_time: common.last_read_time.load(Ordering::Relaxed),
        }
    }
}

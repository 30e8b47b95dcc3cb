// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! Flow types and metadata structures.
//!
//! This module defines the shared-memory header layouts for flows, the
//! media format classification ([`DataFormat`]), and the owned metadata
//! snapshots handed out to callers ([`FlowConfigInfo`], [`FlowRuntimeInfo`]).
//!
//! # Shared-memory layout
//!
//! Every flow's `data` file starts with a [`FlowHeader`]. Discrete (grain
//! based) flows store a [`DiscreteFlow`]; continuous (sample based) flows
//! store a [`ContinuousFlow`]. Both layouts share the header prefix so that
//! an opener can inspect [`CommonFlowInfo::format`] before committing to a
//! typed view. All layouts are `repr(C)` in host byte order, fixed at
//! creation; the only fields mutated after publication are atomics.

pub mod data;
pub mod flowdef;
pub mod manager;
pub mod paths;
pub mod reader;
pub mod writer;

use std::sync::atomic::AtomicU64;

use uuid::Uuid;

use crate::time::Rational;
use crate::{Error, Result};

/// Current version of the flow and grain header layouts.
pub const FLOW_FORMAT_VERSION: u32 = 1;

/// Upper bound on channels in a continuous flow, fixed by the size of the
/// per-channel head array in [`ContinuousFlowInfo`].
pub const MAX_CHANNEL_COUNT: usize = 64;

/// Upper bound on the total size of a continuous flow's channel-plane
/// segment (1 TiB). Dimensions whose product exceeds this, or overflows,
/// are rejected at creation and on open.
pub const MAX_CHANNEL_DATA_SIZE: usize = 1 << 40;

/// Checked size of a channel-plane segment; `None` when the product
/// overflows or exceeds [`MAX_CHANNEL_DATA_SIZE`].
pub(crate) fn checked_channel_data_size(
    channel_count: usize,
    buffer_length: usize,
    sample_word_size: usize,
) -> Option<usize> {
    channel_count
        .checked_mul(buffer_length)?
        .checked_mul(sample_word_size)
        .filter(|size| *size <= MAX_CHANNEL_DATA_SIZE)
}

/// Media data format classification for MXL flows.
///
/// Flows are classified as either discrete (grain-based) or continuous
/// (sample-based) depending on the data format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum DataFormat {
    /// Format not specified or unknown.
    Unspecified = 0,
    /// Video data (discrete, grain-based).
    Video = 1,
    /// Audio data (continuous, sample-based).
    Audio = 2,
    /// Generic data packets (discrete, grain-based).
    Data = 3,
}

impl DataFormat {
    /// Converts the raw header value to a `DataFormat`, mapping anything
    /// unrecognized to [`DataFormat::Unspecified`].
    pub fn from_raw(value: u32) -> Self {
        match value {
            1 => DataFormat::Video,
            2 => DataFormat::Audio,
            3 => DataFormat::Data,
            _ => DataFormat::Unspecified,
        }
    }

    /// Returns `true` for formats delivered as complete grains (video and
    /// generic data).
    pub fn is_discrete(self) -> bool {
        matches!(self, DataFormat::Video | DataFormat::Data)
    }

    /// Returns `true` for formats delivered as continuous samples (audio).
    pub fn is_continuous(self) -> bool {
        matches!(self, DataFormat::Audio)
    }

    /// Returns `true` for formats a flow can be created with.
    pub fn is_supported(self) -> bool {
        self.is_discrete() || self.is_continuous()
    }
}

/// Header prefix shared by both flow kinds.
///
/// `last_write_time` and `last_read_time` are TAI nanosecond timestamps,
/// updated on every commit and successful read respectively; the opt-in
/// garbage collector uses them to detect abandoned flows.
#[repr(C)]
pub struct CommonFlowInfo {
    /// Flow UUID, big-endian byte order as produced by [`Uuid::as_bytes`].
    pub id: [u8; 16],
    /// TAI nanoseconds of the most recent commit.
    pub last_write_time: AtomicU64,
    /// TAI nanoseconds of the most recent successful read.
    pub last_read_time: AtomicU64,
    /// Raw [`DataFormat`] discriminant. Never `Unspecified` for a
    /// successfully created flow.
    pub format: u32,
    _reserved: u32,
}

impl CommonFlowInfo {
    pub(crate) fn new(id: Uuid, format: DataFormat, now: u64) -> Self {
        Self {
            id: *id.as_bytes(),
            last_write_time: AtomicU64::new(now),
            last_read_time: AtomicU64::new(now),
            format: format as u32,
            _reserved: 0,
        }
    }

    /// The flow's unique identifier.
    pub fn id(&self) -> Uuid {
        Uuid::from_bytes(self.id)
    }

    /// The flow's media data format.
    pub fn data_format(&self) -> DataFormat {
        DataFormat::from_raw(self.format)
    }
}

/// Fixed prefix of every flow `data` file: schema version, header size, and
/// the common info. Openers map this first to dispatch on the format.
#[repr(C)]
pub struct FlowHeader {
    /// Layout version, [`FLOW_FORMAT_VERSION`].
    pub version: u32,
    /// Size in bytes of the full typed header that follows.
    pub size: u32,
    /// Kind-independent flow info.
    pub common: CommonFlowInfo,
}

/// Discrete-flow-specific header fields.
#[repr(C)]
pub struct DiscreteFlowInfo {
    /// Rate at which grain indices advance.
    pub grain_rate: Rational,
    /// Number of slots in the grain ring.
    pub grain_count: u64,
    /// Incremented with release ordering on every commit; blocking readers
    /// poll it to detect new work without cross-process condition
    /// variables.
    pub sync_counter: AtomicU64,
}

/// Complete header of a discrete flow's `data` file.
#[repr(C)]
pub struct DiscreteFlow {
    /// Shared header prefix.
    pub header: FlowHeader,
    /// Grain-ring parameters.
    pub discrete: DiscreteFlowInfo,
}

/// Continuous-flow-specific header fields.
///
/// Each channel has its own write head: the index one past the last
/// committed sample (exclusive end). Heads only grow. The heads live here
/// rather than in `channels.data` because the channel file holds exactly
/// `channel_count * buffer_length * sample_word_size` payload bytes.
#[repr(C)]
pub struct ContinuousFlowInfo {
    /// Rate at which sample indices advance.
    pub sample_rate: Rational,
    /// Number of channels, at most [`MAX_CHANNEL_COUNT`].
    pub channel_count: u32,
    /// Bytes per sample word (4 for float32 audio).
    pub sample_word_size: u32,
    /// Ring capacity in samples per channel.
    pub buffer_length: u64,
    /// Incremented with release ordering on every commit.
    pub sync_counter: AtomicU64,
    /// Per-channel exclusive write heads; entries past `channel_count` are
    /// unused and stay zero.
    pub channel_heads: [AtomicU64; MAX_CHANNEL_COUNT],
}

/// Complete header of a continuous flow's `data` file.
#[repr(C)]
pub struct ContinuousFlow {
    /// Shared header prefix.
    pub header: FlowHeader,
    /// Channel-buffer parameters and write heads.
    pub continuous: ContinuousFlowInfo,
}

/// Static flow configuration captured at open or creation time.
///
/// This is an owned snapshot: it remains valid after the flow handle that
/// produced it is dropped, and it never reflects later mutation (the
/// configuration is fixed at creation anyway).
#[derive(Debug, Clone, Copy)]
pub struct FlowConfigInfo {
    id: Uuid,
    format: DataFormat,
    rate: Rational,
    detail: FlowConfigDetail,
}

/// Kind-specific part of [`FlowConfigInfo`].
#[derive(Debug, Clone, Copy)]
pub enum FlowConfigDetail {
    /// Grain-ring dimensions of a discrete flow.
    Discrete {
        /// Slots in the ring.
        grain_count: u64,
        /// Payload bytes per grain.
        grain_payload_size: u64,
    },
    /// Channel-buffer dimensions of a continuous flow.
    Continuous {
        /// Number of channels.
        channel_count: u32,
        /// Bytes per sample word.
        sample_word_size: u32,
        /// Ring capacity in samples per channel.
        buffer_length: u64,
    },
}

impl FlowConfigInfo {
    pub(crate) fn new(
        id: Uuid,
        format: DataFormat,
        rate: Rational,
        detail: FlowConfigDetail,
    ) -> Self {
        Self {
            id,
            format,
            rate,
            detail,
        }
    }

    /// The flow's unique identifier.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// The flow's media data format.
    pub fn data_format(&self) -> DataFormat {
        self.format
    }

    /// Returns `true` if this is a discrete (grain-based) flow.
    pub fn is_discrete_flow(&self) -> bool {
        self.format.is_discrete()
    }

    /// The rate as a rational number, whichever kind the flow is.
    ///
    /// Use [`Self::grain_rate`] or [`Self::sample_rate`] for kind-checked
    /// access.
    pub fn grain_or_sample_rate(&self) -> Rational {
        self.rate
    }

    /// The grain rate of a discrete flow.
    ///
    /// # Errors
    ///
    /// Returns an error if this flow is continuous (audio).
    pub fn grain_rate(&self) -> Result<Rational> {
        if !self.format.is_discrete() {
            return Err(Error::Other(format!(
                "Flow format is {:?}, grain rate is only relevant for discrete flows.",
                self.format
            )));
        }
        Ok(self.rate)
    }

    /// The sample rate of a continuous flow.
    ///
    /// # Errors
    ///
    /// Returns an error if this flow is discrete (video/data).
    pub fn sample_rate(&self) -> Result<Rational> {
        if !self.format.is_continuous() {
            return Err(Error::Other(format!(
                "Flow format is {:?}, sample rate is only relevant for continuous flows.",
                self.format
            )));
        }
        Ok(self.rate)
    }

    /// Kind-specific configuration.
    pub fn detail(&self) -> &FlowConfigDetail {
        &self.detail
    }

    /// Grain-ring dimensions of a discrete flow.
    ///
    /// # Errors
    ///
    /// Returns an error if this flow is continuous.
    pub fn discrete(&self) -> Result<(u64, u64)> {
        match self.detail {
            FlowConfigDetail::Discrete {
                grain_count,
                grain_payload_size,
            } => Ok((grain_count, grain_payload_size)),
            FlowConfigDetail::Continuous { .. } => Err(Error::Other(format!(
                "Flow format is {:?}, video or data required.",
                self.format
            ))),
        }
    }

    /// Channel-buffer dimensions of a continuous flow.
    ///
    /// # Errors
    ///
    /// Returns an error if this flow is discrete.
    pub fn continuous(&self) -> Result<(u32, u32, u64)> {
        match self.detail {
            FlowConfigDetail::Continuous {
                channel_count,
                sample_word_size,
                buffer_length,
            } => Ok((channel_count, sample_word_size, buffer_length)),
            FlowConfigDetail::Discrete { .. } => Err(Error::Other(format!(
                "Flow format is {:?}, audio required.",
                self.format
            ))),
        }
    }
}

/// Dynamic flow state sampled at a point in time.
#[derive(Debug, Clone, Copy)]
pub struct FlowRuntimeInfo {
    /// Index of the last fully committed grain (discrete) or sample
    /// (continuous, complete across all channels).
    /// [`crate::UNDEFINED_INDEX`] when nothing has been committed yet.
    pub head_index: u64,
    /// TAI nanoseconds of the most recent commit.
    pub last_write_time: u64,
    /// TAI nanoseconds of the most recent successful read.
    pub last_read_time: u64,
}

/// Complete flow information: static configuration plus a runtime snapshot.
pub struct FlowInfo {
    /// Static flow configuration.
    pub config: FlowConfigInfo,
    /// Dynamic runtime state.
    pub runtime: FlowRuntimeInfo,
}

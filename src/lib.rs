// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! # MXL - Media eXchange Layer
//!
//! Host-local, zero-copy shared-memory media exchange for video, audio, and
//! data streams.
//!
//! ## Overview
//!
//! MXL moves timed media between independent producer and consumer
//! processes on the same machine using memory-mapped ring buffers on tmpfs,
//! with microsecond-scale latency and no coordinating daemon.
//!
//! ### Key Concepts
//!
//! - **Domain**: A tmpfs directory containing shared memory for media flows
//! - **Instance**: A connection to an MXL domain ([`MxlInstance`])
//! - **Flow**: A unidirectional ring buffer for media data, either discrete
//!   or continuous, addressed by UUID
//! - **Grain**: A discrete unit of media (video frame, data packet)
//!   accessed via [`GrainReader`]/[`GrainWriter`]
//! - **Samples**: Continuous media data (audio) accessed via
//!   [`SamplesReader`]/[`SamplesWriter`]
//!
//! ### Flow Types
//!
//! MXL supports two media flow patterns:
//!
//! - **Discrete (grain-based)**: Video frames and data packets delivered as
//!   complete units through a fixed ring of shared-memory slots
//! - **Continuous (sample-based)**: Audio streams delivered as per-channel
//!   sample ranges through circular channel buffers
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐
//! │ MxlInstance │  (bound to a domain)
//! └──────┬──────┘
//!        │
//!        ├─► FlowWriter ──► GrainWriter   (video/data)
//!        │              └─► SamplesWriter  (audio)
//!        │
//!        └─► FlowReader ──► GrainReader   (video/data)
//!                       └─► SamplesReader  (audio)
//! ```
//!
//! A flow lives in a directory under the domain, published atomically by a
//! rename: `flow.json` (the NMOS flow definition, stored verbatim), a
//! mapped `data` header, and either per-slot grain files or a channel-major
//! sample buffer. Writers and readers in unrelated processes map the same
//! files; the only cross-process synchronization is the publishing rename
//! and per-slot atomic fields.
//!
//! ## Examples
//!
//! ### Creating an MXL instance and writing video grains
//!
//! ```no_run
//! use mxl::MxlInstance;
//!
//! # fn main() -> Result<(), mxl::Error> {
//! // Bind an instance to a tmpfs domain
//! let instance = MxlInstance::new("/dev/shm/my_domain")?;
//!
//! // Create a flow writer from a JSON flow definition
//! let flow_def = r#"{"id": "...", "format": "urn:x-nmos:format:video", "...": "..."}"#;
//! let (writer, info, _) = instance.create_flow_writer(flow_def, None)?;
//!
//! // Convert to grain writer for discrete video data
//! let grain_writer = writer.to_grain_writer()?;
//!
//! // Write a grain at the current index
//! let rate = info.grain_rate()?;
//! let index = instance.get_current_index(&rate);
//! let mut access = grain_writer.open_grain(index)?;
//! access.payload_mut().fill(42);
//! let size = access.max_size();
//! access.commit(size)?;
//! # Ok(())
//! # }
//! ```
//!
//! ### Reading audio samples
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use mxl::MxlInstance;
//!
//! # fn main() -> Result<(), mxl::Error> {
//! let instance = MxlInstance::new("/dev/shm/my_domain")?;
//!
//! // Connect to an existing audio flow
//! let reader = instance.create_flow_reader("b3bb5be7-9fe9-4324-a5bb-4c70e1084449")?;
//! let samples_reader = reader.to_samples_reader()?;
//!
//! // Read 480 samples (10ms at 48kHz) with 5-second timeout
//! let head = samples_reader.get_runtime_info().head_index;
//! let samples = samples_reader.get_samples(head - 479, 480, Duration::from_secs(5))?;
//!
//! // Access per-channel data (may wrap at the ring boundary)
//! for ch in 0..samples.num_of_channels() {
//!     let (fragment1, fragment2) = samples.channel_data(ch)?;
//!     println!("Channel {}: {} + {} bytes", ch, fragment1.len(), fragment2.len());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Timing and Synchronization
//!
//! MXL uses TAI timestamps (nanoseconds since the SMPTE ST 2059 epoch,
//! 1970-01-01 00:00:00 TAI). Indices stay monotonic through leap seconds.
//!
//! - [`MxlInstance::get_time`] returns current TAI time
//! - [`MxlInstance::index_to_timestamp`] / [`MxlInstance::timestamp_to_index`]
//!   convert between indices and timestamps
//! - [`MxlInstance::sleep_for`] sleeps for media pacing
//!
//! ## Thread Safety
//!
//! - [`MxlInstance`] is `Send + Sync` and can be shared across threads
//! - Readers and writers are `Send` but not `Sync`
//! - Each thread should have its own reader/writer instances
//! - Each flow assumes a single writer; the on-disk format does not enforce
//!   this, it is part of the protocol

mod error;
mod instance;
mod shmem;
mod wait;

pub mod flow;
pub mod grain;
pub mod samples;
pub mod time;

pub use error::{Error, Result};
pub use flow::data::{ContinuousFlowData, DiscreteFlowData, FlowData};
pub use flow::manager::FlowManager;
pub use flow::paths::FLOW_DIRECTORY_SUFFIX;
pub use flow::{
    CommonFlowInfo, ContinuousFlow, ContinuousFlowInfo, DataFormat, DiscreteFlow,
    DiscreteFlowInfo, FLOW_FORMAT_VERSION, FlowConfigDetail, FlowConfigInfo, FlowHeader, FlowInfo,
    FlowRuntimeInfo, MAX_CHANNEL_COUNT, MAX_CHANNEL_DATA_SIZE, flowdef, reader::FlowReader,
    writer::FlowWriter,
};
pub use grain::{
    data::{GrainData, OwnedGrainData},
    reader::GrainReader,
    slot::GrainInfo,
    write_access::GrainWriteAccess,
    writer::GrainWriter,
};
pub use instance::{CreateFlowOptions, InstanceOptions, MxlInstance};
pub use samples::{
    data::{OwnedSamplesData, SamplesData},
    reader::SamplesReader,
    write_access::SamplesWriteAccess,
    writer::SamplesWriter,
};
pub use shmem::{AccessMode, SharedMemoryInstance, SharedMemorySegment};
pub use time::{Rational, UNDEFINED_INDEX};

// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! MXL instance management and core domain operations.
//!
//! This module provides [`MxlInstance`], the main entry point for
//! interacting with an MXL domain. An instance binds a shared-memory domain
//! directory and provides methods to create readers/writers and manage
//! timing.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use crate::flow::flowdef::{FlowDef, FlowDefAudio, FlowDefDetails, FlowDefVideo};
use crate::flow::manager::FlowManager;
use crate::flow::paths;
use crate::shmem::AccessMode;
use crate::time::{self, Rational, UNDEFINED_INDEX};
use crate::{DataFormat, Error, FlowConfigInfo, FlowReader, FlowWriter, Result};

/// Instance-wide configuration.
#[derive(Debug, Clone, Copy)]
pub struct InstanceOptions {
    /// How much media history a newly created flow retains: the grain ring
    /// and sample buffers are sized to cover this window at the flow's
    /// rate.
    pub history_duration: Duration,
}

impl Default for InstanceOptions {
    fn default() -> Self {
        Self {
            history_duration: Duration::from_millis(100),
        }
    }
}

/// Explicit sizing overrides for [`MxlInstance::create_flow_writer`].
///
/// Anything left `None` is derived from the flow definition and the
/// instance's history duration. Media types with packed layouts the
/// component-plane derivation cannot express (e.g. v210 row padding) should
/// pass an explicit `grain_payload_size`.
#[derive(Debug, Clone, Copy, Default)]
pub struct CreateFlowOptions {
    /// Number of slots in a discrete flow's grain ring.
    pub grain_count: Option<usize>,
    /// Payload bytes per grain of a discrete flow.
    pub grain_payload_size: Option<usize>,
    /// Ring capacity in samples per channel of a continuous flow.
    pub buffer_length: Option<usize>,
}

/// Internal shared context for an MXL instance.
///
/// Separated from [`MxlInstance`] so the instance stays cheaply cloneable
/// across threads.
pub(crate) struct InstanceContext {
    pub(crate) manager: FlowManager,
    pub(crate) options: InstanceOptions,
}

/// Main entry point for interacting with an MXL domain.
///
/// An `MxlInstance` represents a connection to a shared memory domain
/// (typically a tmpfs directory like `/dev/shm/my_domain`). It provides
/// methods to:
///
/// - Create flow readers and writers
/// - Query and manipulate timing (TAI timestamps and indices)
/// - Sleep for media pacing
///
/// The instance is cheaply cloneable and thread-safe (`Send + Sync`), but
/// readers and writers created from it are not thread-safe and should not
/// be shared.
///
/// # Examples
///
/// ```no_run
/// use mxl::MxlInstance;
///
/// # fn main() -> Result<(), mxl::Error> {
/// let instance = MxlInstance::new("/dev/shm/my_domain")?;
///
/// let reader = instance.create_flow_reader("5fbec3b1-1b0f-417d-9059-8b94a47197ed")?;
/// let tai_ns = instance.get_time();
/// println!("Current TAI: {}", tai_ns);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct MxlInstance {
    context: Arc<InstanceContext>,
}

impl MxlInstance {
    /// Creates a new MXL instance bound to the specified domain with
    /// default options.
    ///
    /// # Errors
    ///
    /// Returns an error if the domain path does not exist or is not a
    /// directory.
    pub fn new(domain: impl AsRef<Path>) -> Result<Self> {
        Self::with_options(domain, InstanceOptions::default())
    }

    /// Creates a new MXL instance with explicit options.
    ///
    /// # Errors
    ///
    /// Returns an error if the domain path does not exist or is not a
    /// directory.
    pub fn with_options(domain: impl AsRef<Path>, options: InstanceOptions) -> Result<Self> {
        let manager = FlowManager::new(domain)?;
        Ok(Self {
            context: Arc::new(InstanceContext { manager, options }),
        })
    }

    /// The flow manager this instance operates through.
    pub fn manager(&self) -> &FlowManager {
        &self.context.manager
    }

    /// Creates a flow reader for an existing flow in the domain.
    ///
    /// This connects to a flow that was previously created by a writer. The
    /// returned [`FlowReader`] is a generic reader that must be converted
    /// to either a [`crate::GrainReader`] (discrete flows) or
    /// [`crate::SamplesReader`] (continuous flows).
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidArg`] if `flow_id` is not a valid UUID
    /// - [`Error::FlowNotFound`] if no flow with the given ID exists
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use mxl::MxlInstance;
    /// # fn example(instance: MxlInstance) -> Result<(), mxl::Error> {
    /// let reader = instance.create_flow_reader("5fbec3b1-1b0f-417d-9059-8b94a47197ed")?;
    /// let grain_reader = reader.to_grain_reader()?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn create_flow_reader(&self, flow_id: &str) -> Result<FlowReader> {
        let id = Uuid::parse_str(flow_id).map_err(|_| Error::InvalidArg)?;
        let data = self
            .context
            .manager
            .open_flow(id, AccessMode::OpenReadWrite)?;
        Ok(FlowReader::new(data))
    }

    /// Creates a flow writer from a JSON flow definition.
    ///
    /// The definition follows the NMOS IS-04 flow schema and is stored
    /// byte-for-byte alongside the flow. If a flow with the same ID already
    /// exists it is reused instead of created.
    ///
    /// Ring dimensions are derived from the definition and the instance's
    /// history duration unless `options` overrides them.
    ///
    /// # Returns
    ///
    /// A tuple containing:
    /// - `FlowWriter`: generic writer handle
    /// - `FlowConfigInfo`: flow configuration metadata
    /// - `bool`: `true` if a new flow was created, `false` if an existing
    ///   flow was reused
    ///
    /// # Errors
    ///
    /// - [`Error::FlowDef`] if the definition JSON is invalid
    /// - [`Error::InvalidArg`] if derived dimensions are unusable (e.g. a
    ///   video definition without components and no explicit payload size)
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use mxl::MxlInstance;
    /// # fn example(instance: MxlInstance, flow_def: &str) -> Result<(), mxl::Error> {
    /// let (writer, info, was_created) = instance.create_flow_writer(flow_def, None)?;
    /// if was_created {
    ///     println!("Created new flow {}", info.id());
    /// }
    /// let grain_writer = writer.to_grain_writer()?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn create_flow_writer(
        &self,
        flow_def: &str,
        options: Option<CreateFlowOptions>,
    ) -> Result<(FlowWriter, FlowConfigInfo, bool)> {
        let def: FlowDef = serde_json::from_str(flow_def)?;
        let options = options.unwrap_or_default();

        match self
            .context
            .manager
            .open_flow(def.id, AccessMode::OpenReadWrite)
        {
            Ok(data) => {
                let config = data.config_info();
                Ok((FlowWriter::new(data), config, false))
            }
            Err(Error::FlowNotFound) => {
                let data = self.create_flow(&def, flow_def, &options)?;
                let config = data.config_info();
                Ok((FlowWriter::new(data), config, true))
            }
            Err(err) => Err(err),
        }
    }

    fn create_flow(
        &self,
        def: &FlowDef,
        flow_def: &str,
        options: &CreateFlowOptions,
    ) -> Result<crate::FlowData> {
        let history = self.context.options.history_duration;
        match &def.details {
            FlowDefDetails::Video(video) => {
                let grain_count = options
                    .grain_count
                    .unwrap_or_else(|| indices_in_window(history, &video.grain_rate));
                let payload_size = match options.grain_payload_size {
                    Some(size) => size,
                    None => video_payload_size(video)?,
                };
                let data = self.context.manager.create_discrete_flow(
                    def.id,
                    flow_def,
                    DataFormat::Video,
                    grain_count,
                    video.grain_rate,
                    payload_size,
                )?;
                Ok(crate::FlowData::Discrete(data))
            }
            FlowDefDetails::Audio(audio) => {
                let buffer_length = options
                    .buffer_length
                    .unwrap_or_else(|| indices_in_window(history, &audio.sample_rate));
                let data = self.context.manager.create_continuous_flow(
                    def.id,
                    flow_def,
                    DataFormat::Audio,
                    audio.sample_rate,
                    audio.channel_count as usize,
                    audio_word_size(audio),
                    buffer_length,
                )?;
                Ok(crate::FlowData::Continuous(data))
            }
        }
    }

    /// Opens an existing flow for writing, without a flow definition.
    ///
    /// Useful when the flow was created elsewhere (another process, or the
    /// [`FlowManager`] API) and this process takes over as its single
    /// writer.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidArg`] if `flow_id` is not a valid UUID
    /// - [`Error::FlowNotFound`] if no flow with the given ID exists
    pub fn open_flow_writer(&self, flow_id: &str) -> Result<FlowWriter> {
        let id = Uuid::parse_str(flow_id).map_err(|_| Error::InvalidArg)?;
        let data = self
            .context
            .manager
            .open_flow(id, AccessMode::OpenReadWrite)?;
        Ok(FlowWriter::new(data))
    }

    /// Retrieves the JSON flow definition for an existing flow.
    ///
    /// Returns the exact bytes that were passed at creation.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidArg`] if `flow_id` is not a valid UUID
    /// - [`Error::FlowNotFound`] if the flow (or its descriptor) does not
    ///   exist
    pub fn get_flow_def(&self, flow_id: &str) -> Result<String> {
        let id = Uuid::parse_str(flow_id).map_err(|_| Error::InvalidArg)?;
        let flow_dir = paths::flow_directory_name(self.context.manager.domain(), &id);
        match std::fs::read_to_string(paths::flow_descriptor_file_path(&flow_dir)) {
            Ok(contents) => Ok(contents),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Err(Error::FlowNotFound),
            Err(err) => Err(err.into()),
        }
    }

    /// Enumerates the flows published in the domain.
    pub fn list_flows(&self) -> Result<Vec<Uuid>> {
        self.context.manager.list_flows()
    }

    /// Removes a flow directory recursively. Returns `false` if nothing
    /// was removed.
    pub fn delete_flow(&self, flow_id: Uuid) -> bool {
        self.context.manager.delete_flow(flow_id)
    }

    /// Sweeps flows whose last write and read are older than `max_age`.
    /// Opt-in; see [`FlowManager::garbage_collect`].
    pub fn garbage_collect(&self, max_age: Duration) -> Result<usize> {
        self.context.manager.garbage_collect(max_age)
    }

    /// Returns the current media index for a given rate.
    ///
    /// Computes the index current at this instant on the TAI clock, or
    /// [`UNDEFINED_INDEX`] for an invalid rate.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use mxl::{MxlInstance, Rational};
    /// # fn example(instance: MxlInstance) {
    /// let rate = Rational { numerator: 30000, denominator: 1001 }; // 29.97 fps
    /// let index = instance.get_current_index(&rate);
    /// println!("Current frame index: {}", index);
    /// # }
    /// ```
    pub fn get_current_index(&self, rate: &Rational) -> u64 {
        time::current_index(rate)
    }

    /// Calculates the duration until a future index becomes current.
    ///
    /// Returns [`Duration::ZERO`] for indices that are already current or
    /// past. Useful for pacing writers.
    ///
    /// # Errors
    ///
    /// Returns an error if the rate or index is invalid.
    pub fn get_duration_until_index(&self, index: u64, rate: &Rational) -> Result<Duration> {
        let duration_ns = time::ns_until_index(index, rate);
        if duration_ns == UNDEFINED_INDEX {
            Err(Error::Other(format!(
                "Failed to get duration until index, invalid rate {rate}."
            )))
        } else {
            Ok(Duration::from_nanos(duration_ns))
        }
    }

    /// Converts a TAI timestamp to a media index.
    ///
    /// The inverse of [`Self::index_to_timestamp`] for every in-range
    /// index.
    ///
    /// # Errors
    ///
    /// Returns an error if the rate or timestamp is invalid.
    pub fn timestamp_to_index(&self, timestamp: u64, rate: &Rational) -> Result<u64> {
        let index = time::timestamp_to_index(rate, timestamp);
        if index == UNDEFINED_INDEX {
            Err(Error::Other(format!(
                "Failed to convert timestamp to index, invalid rate {rate}."
            )))
        } else {
            Ok(index)
        }
    }

    /// Converts a media index to the TAI timestamp at which it becomes
    /// current.
    ///
    /// # Errors
    ///
    /// Returns an error if the rate or index is invalid.
    pub fn index_to_timestamp(&self, index: u64, rate: &Rational) -> Result<u64> {
        let timestamp = time::index_to_timestamp(rate, index);
        if timestamp == UNDEFINED_INDEX {
            Err(Error::Other(format!(
                "Failed to convert index to timestamp, invalid rate {rate}."
            )))
        } else {
            Ok(timestamp)
        }
    }

    /// Sleeps for the specified duration. Best effort.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use mxl::MxlInstance;
    /// # use std::time::Duration;
    /// # fn example(instance: MxlInstance) {
    /// // Sleep one frame at ~60 fps
    /// instance.sleep_for(Duration::from_micros(16667));
    /// # }
    /// ```
    pub fn sleep_for(&self, duration: Duration) {
        time::sleep_for(duration);
    }

    /// Returns the current TAI time in nanoseconds since the SMPTE ST 2059
    /// epoch (1970-01-01 00:00:00 TAI, no leap seconds). Returns `0` if the
    /// clock cannot be read.
    pub fn get_time(&self) -> u64 {
        time::get_time()
    }
}

/// Number of indices the history window covers at `rate`, rounded up, at
/// least 1.
fn indices_in_window(window: Duration, rate: &Rational) -> usize {
    if !rate.is_valid_edit_rate() {
        return 1;
    }
    let window_ns = window.as_nanos().min(u64::MAX as u128) as u128;
    let per_index_ns = 1_000_000_000u128 * rate.denominator as u128;
    let count = (window_ns * rate.numerator as u128).div_ceil(per_index_ns);
    count.clamp(1, u32::MAX as u128) as usize
}

/// Payload bytes of one grain, summed over the definition's component
/// planes.
fn video_payload_size(video: &FlowDefVideo) -> Result<usize> {
    let bits: u64 = video
        .components
        .iter()
        .map(|c| c.width as u64 * c.height as u64 * c.bit_depth as u64)
        .sum();
    if bits == 0 {
        return Err(Error::InvalidArg);
    }
    Ok(bits.div_ceil(8) as usize)
}

/// Bytes per sample word: float32 for common bit depths, float64 above.
fn audio_word_size(audio: &FlowDefAudio) -> usize {
    if audio.bit_depth <= 32 { 4 } else { 8 }
}

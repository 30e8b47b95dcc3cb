// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! Flow lifecycle: atomic creation, discovery, opening, and deletion.
//!
//! A [`FlowManager`] is bound to a *domain* directory (typically
//! `/dev/shm/<name>` on Linux) under which every flow lives. Creation
//! stages the complete flow in a hidden temporary directory and publishes
//! it with a single rename, the only cross-process synchronization event in
//! the system. A flow directory is therefore visible under its UUID name
//! iff creation fully succeeded.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use std::time::Duration;

use tracing::{debug, error, trace, warn};
use uuid::Uuid;

use crate::flow::data::{ContinuousFlowData, DiscreteFlowData, FlowData};
use crate::flow::paths;
use crate::flow::{
    CommonFlowInfo, ContinuousFlow, ContinuousFlowInfo, DataFormat, DiscreteFlow,
    DiscreteFlowInfo, FLOW_FORMAT_VERSION, FlowHeader, MAX_CHANNEL_COUNT,
    checked_channel_data_size,
};
use crate::grain::slot::GrainSlot;
use crate::shmem::{AccessMode, SharedMemoryInstance, SharedMemorySegment};
use crate::time::{self, Rational};
use crate::{Error, Result};

/// Manages the flows of one domain directory.
pub struct FlowManager {
    domain: PathBuf,
}

impl FlowManager {
    /// Binds a manager to an existing domain directory.
    ///
    /// The path is canonicalized; a missing path or a non-directory is an
    /// error.
    pub fn new(domain: impl AsRef<Path>) -> Result<Self> {
        let domain = domain.as_ref();
        let canonical = fs::canonicalize(domain).map_err(|err| {
            error!(
                "FlowManager: Domain path '{}' does not exist or is not accessible: {}",
                domain.display(),
                err
            );
            Error::Io(err)
        })?;
        if !canonical.is_dir() {
            error!(
                "FlowManager: Domain path '{}' is not a directory",
                canonical.display()
            );
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::NotADirectory,
                format!("domain path '{}' is not a directory", canonical.display()),
            )));
        }
        Ok(Self { domain: canonical })
    }

    /// The canonical domain directory.
    pub fn domain(&self) -> &Path {
        &self.domain
    }

    /// Creates and publishes a discrete (grain-based) flow.
    ///
    /// The flow descriptor is stored byte-for-byte as `flow.json`; the core
    /// does not interpret it. All `grain_count` slot files are created and
    /// zero-initialized before the directory becomes visible.
    ///
    /// # Errors
    ///
    /// - [`Error::UnsupportedFormat`] if `format` is not a discrete format
    /// - [`Error::InvalidArg`] for a zero grain count or payload size, or
    ///   an invalid grain rate
    /// - [`Error::Conflict`] if a flow with this ID already exists
    /// - [`Error::Io`] on filesystem or mapping failures (the temporary
    ///   directory is removed before returning)
    pub fn create_discrete_flow(
        &self,
        flow_id: Uuid,
        flow_def: &str,
        format: DataFormat,
        grain_count: usize,
        grain_rate: Rational,
        grain_payload_size: usize,
    ) -> Result<DiscreteFlowData> {
        debug!(
            "Create discrete flow. id: {}, grainCount: {}, grain payload size: {}",
            flow_id, grain_count, grain_payload_size
        );

        if !format.is_discrete() {
            error!(
                "FlowManager: Attempt to create discrete flow '{}' with unsupported format {:?}",
                flow_id, format
            );
            return Err(Error::UnsupportedFormat);
        }
        if grain_count == 0 || grain_payload_size == 0 || !grain_rate.is_valid_edit_rate() {
            return Err(Error::InvalidArg);
        }
        let final_dir = paths::flow_directory_name(&self.domain, &flow_id);
        if final_dir.exists() {
            return Err(Error::Conflict);
        }

        let temp_dir = paths::create_temporary_flow_directory(&self.domain)?;
        let result = self.populate_discrete_flow(
            &temp_dir,
            &final_dir,
            flow_id,
            flow_def,
            format,
            grain_count,
            grain_rate,
            grain_payload_size,
        );
        if result.is_err() {
            let _ = fs::remove_dir_all(&temp_dir);
        }
        result
    }

    #[allow(clippy::too_many_arguments)]
    fn populate_discrete_flow(
        &self,
        temp_dir: &Path,
        final_dir: &Path,
        flow_id: Uuid,
        flow_def: &str,
        format: DataFormat,
        grain_count: usize,
        grain_rate: Rational,
        grain_payload_size: usize,
    ) -> Result<DiscreteFlowData> {
        write_flow_descriptor(temp_dir, flow_def)?;
        create_flow_access_file(temp_dir)?;

        let flow =
            SharedMemoryInstance::<DiscreteFlow>::create(&paths::flow_data_file_path(temp_dir), 0)?;
        flow.initialize(DiscreteFlow {
            header: FlowHeader {
                version: FLOW_FORMAT_VERSION,
                size: size_of::<DiscreteFlow>() as u32,
                common: CommonFlowInfo::new(flow_id, format, time::get_time()),
            },
            discrete: DiscreteFlowInfo {
                grain_rate,
                grain_count: grain_count as u64,
                sync_counter: 0.into(),
            },
        });

        let grain_dir = paths::grain_directory_name(temp_dir);
        fs::create_dir(&grain_dir).map_err(|err| {
            error!(
                "FlowManager: Could not create grain directory '{}': {}",
                grain_dir.display(),
                err
            );
            Error::Io(err)
        })?;

        let mut grains = Vec::with_capacity(grain_count);
        for slot in 0..grain_count {
            let grain_path = paths::grain_data_file_path(&grain_dir, slot);
            trace!("Creating grain: {}", grain_path.display());
            grains.push(GrainSlot::create(&grain_path, grain_payload_size)?);
        }

        publish_flow_directory(temp_dir, final_dir)?;
        DiscreteFlowData::new(flow, grains)
    }

    /// Creates and publishes a continuous (sample-based) flow.
    ///
    /// # Errors
    ///
    /// - [`Error::UnsupportedFormat`] if `format` is not a continuous format
    /// - [`Error::InvalidArg`] for a zero channel count, word size, or
    ///   buffer length, a channel count above [`MAX_CHANNEL_COUNT`], an
    ///   invalid sample rate, or channel-plane dimensions whose total size
    ///   overflows or exceeds [`crate::MAX_CHANNEL_DATA_SIZE`]
    /// - [`Error::Conflict`] if a flow with this ID already exists
    /// - [`Error::Io`] on filesystem or mapping failures (the temporary
    ///   directory is removed before returning)
    pub fn create_continuous_flow(
        &self,
        flow_id: Uuid,
        flow_def: &str,
        format: DataFormat,
        sample_rate: Rational,
        channel_count: usize,
        sample_word_size: usize,
        buffer_length: usize,
    ) -> Result<ContinuousFlowData> {
        debug!(
            "Create continuous flow. id: {}, channel count: {}, word size: {}, buffer length: {}",
            flow_id, channel_count, sample_word_size, buffer_length
        );

        if !format.is_continuous() {
            error!(
                "FlowManager: Attempt to create continuous flow '{}' with unsupported format {:?}",
                flow_id, format
            );
            return Err(Error::UnsupportedFormat);
        }
        if channel_count == 0
            || channel_count > MAX_CHANNEL_COUNT
            || sample_word_size == 0
            || buffer_length == 0
            || !sample_rate.is_valid_edit_rate()
        {
            return Err(Error::InvalidArg);
        }
        let Some(channel_data_size) =
            checked_channel_data_size(channel_count, buffer_length, sample_word_size)
        else {
            error!(
                "FlowManager: Channel plane dimensions for flow '{}' are too large: {} channel(s), {} sample ring, {}-byte words",
                flow_id, channel_count, buffer_length, sample_word_size
            );
            return Err(Error::InvalidArg);
        };
        let final_dir = paths::flow_directory_name(&self.domain, &flow_id);
        if final_dir.exists() {
            return Err(Error::Conflict);
        }

        let temp_dir = paths::create_temporary_flow_directory(&self.domain)?;
        let result = self.populate_continuous_flow(
            &temp_dir,
            &final_dir,
            flow_id,
            flow_def,
            format,
            sample_rate,
            channel_count,
            sample_word_size,
            buffer_length,
            channel_data_size,
        );
        if result.is_err() {
            let _ = fs::remove_dir_all(&temp_dir);
        }
        result
    }

    #[allow(clippy::too_many_arguments)]
    fn populate_continuous_flow(
        &self,
        temp_dir: &Path,
        final_dir: &Path,
        flow_id: Uuid,
        flow_def: &str,
        format: DataFormat,
        sample_rate: Rational,
        channel_count: usize,
        sample_word_size: usize,
        buffer_length: usize,
        channel_data_size: usize,
    ) -> Result<ContinuousFlowData> {
        write_flow_descriptor(temp_dir, flow_def)?;
        create_flow_access_file(temp_dir)?;

        let flow = SharedMemoryInstance::<ContinuousFlow>::create(
            &paths::flow_data_file_path(temp_dir),
            0,
        )?;
        flow.initialize(ContinuousFlow {
            header: FlowHeader {
                version: FLOW_FORMAT_VERSION,
                size: size_of::<ContinuousFlow>() as u32,
                common: CommonFlowInfo::new(flow_id, format, time::get_time()),
            },
            continuous: ContinuousFlowInfo {
                sample_rate,
                channel_count: channel_count as u32,
                sample_word_size: sample_word_size as u32,
                buffer_length: buffer_length as u64,
                sync_counter: 0.into(),
                channel_heads: std::array::from_fn(|_| 0.into()),
            },
        });

        let channels = SharedMemorySegment::create(
            &paths::channel_data_file_path(temp_dir),
            channel_data_size,
        )?;

        publish_flow_directory(temp_dir, final_dir)?;
        ContinuousFlowData::new(flow, channels)
    }

    /// Opens an existing flow, dispatching on its stored format.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidArg`] for [`AccessMode::CreateReadWrite`]
    ///   (reserved for the create operations)
    /// - [`Error::FlowNotFound`] if the flow does not exist
    /// - [`Error::Io`] / [`Error::Other`] if any part of the flow fails to
    ///   open; the flow is never partially usable
    pub fn open_flow(&self, flow_id: Uuid, mode: AccessMode) -> Result<FlowData> {
        if mode == AccessMode::CreateReadWrite {
            error!(
                "FlowManager: Attempt to open flow '{}' with invalid access mode CREATE_READ_WRITE",
                flow_id
            );
            return Err(Error::InvalidArg);
        }

        let flow_dir = paths::flow_directory_name(&self.domain, &flow_id);
        let flow_file = paths::flow_data_file_path(&flow_dir);
        if !flow_file.exists() {
            return Err(Error::FlowNotFound);
        }

        // Reading the marker bumps its atime, leaving a trace of the most
        // recent open for external tooling.
        let _ = fs::read(paths::flow_access_file_path(&flow_dir));

        let segment = SharedMemorySegment::open(&flow_file, mode, size_of::<FlowHeader>())
            .map_err(|err| {
                error!(
                    "FlowManager: Failed to open flow data segment '{}': {}",
                    flow_file.display(),
                    err
                );
                err
            })?;
        // Safety: the open validated the region against the header size;
        // the prefix layout is shared by both flow kinds.
        let format = unsafe { &*(segment.as_ptr() as *const FlowHeader) }
            .common
            .data_format();

        if format.is_discrete() {
            self.open_discrete_flow(&flow_dir, segment, mode)
                .map(FlowData::Discrete)
        } else if format.is_continuous() {
            self.open_continuous_flow(&flow_dir, segment, mode)
                .map(FlowData::Continuous)
        } else {
            // Never the case for a successfully created flow.
            error!(
                "FlowManager: Attempt to open flow '{}' with unsupported data format {:?}",
                flow_id, format
            );
            Err(Error::UnsupportedFormat)
        }
    }

    fn open_discrete_flow(
        &self,
        flow_dir: &Path,
        segment: SharedMemorySegment,
        mode: AccessMode,
    ) -> Result<DiscreteFlowData> {
        let flow = SharedMemoryInstance::<DiscreteFlow>::from_segment(segment)?;
        let grain_count = flow.get().discrete.grain_count as usize;

        let grain_dir = paths::grain_directory_name(flow_dir);
        if !grain_dir.is_dir() {
            error!(
                "FlowManager: Grain directory not found for flow at '{}'",
                flow_dir.display()
            );
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("grain directory '{}' not found", grain_dir.display()),
            )));
        }

        let mut grains = Vec::with_capacity(grain_count);
        for slot in 0..grain_count {
            let grain_path = paths::grain_data_file_path(&grain_dir, slot);
            trace!("Opening grain: {}", grain_path.display());
            grains.push(GrainSlot::open(&grain_path, mode).map_err(|err| {
                error!(
                    "FlowManager: Failed to open grain [{}] for flow '{}': {}",
                    slot,
                    flow_dir.display(),
                    err
                );
                err
            })?);
        }

        DiscreteFlowData::new(flow, grains)
    }

    fn open_continuous_flow(
        &self,
        flow_dir: &Path,
        segment: SharedMemorySegment,
        mode: AccessMode,
    ) -> Result<ContinuousFlowData> {
        let flow = SharedMemoryInstance::<ContinuousFlow>::from_segment(segment)?;

        let channel_path = paths::channel_data_file_path(flow_dir);
        if !channel_path.exists() {
            error!(
                "FlowManager: Channel buffer file not found for flow at '{}'",
                flow_dir.display()
            );
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("channel buffer file '{}' not found", channel_path.display()),
            )));
        }

        let channels = SharedMemorySegment::open(&channel_path, mode, 1).map_err(|err| {
            error!(
                "FlowManager: Failed to open continuous channel buffers at '{}': {}",
                channel_path.display(),
                err
            );
            err
        })?;

        ContinuousFlowData::new(flow, channels)
    }

    /// Removes a flow directory recursively.
    ///
    /// Returns `false` if nothing was removed; filesystem errors are logged
    /// and reported as `false` rather than propagated. Mappings held by
    /// other processes stay valid until they unmap.
    pub fn delete_flow(&self, flow_id: Uuid) -> bool {
        trace!("Delete flow: {}", flow_id);

        let flow_dir = paths::flow_directory_name(&self.domain, &flow_id);
        match fs::remove_dir_all(&flow_dir) {
            Ok(()) => true,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                warn!("Flow not found or already deleted: {}", flow_id);
                false
            }
            Err(err) => {
                error!(
                    "FlowManager: Error deleting flow {} at {}: {}",
                    flow_id,
                    flow_dir.display(),
                    err
                );
                false
            }
        }
    }

    /// Enumerates the flows published in the domain.
    ///
    /// Directory entries that carry the flow suffix but whose stem is not a
    /// valid UUID are skipped; iteration errors and a missing domain
    /// propagate as errors.
    pub fn list_flows(&self) -> Result<Vec<Uuid>> {
        let entries = fs::read_dir(&self.domain).map_err(|err| {
            error!(
                "FlowManager: Base directory not found: '{}'",
                self.domain.display()
            );
            Error::Io(err)
        })?;

        let mut flow_ids = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|err| {
                error!("FlowManager: Failed to iterate flow directory: {}", err);
                Error::Io(err)
            })?;
            if !entry.path().is_dir() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str()
                && let Some(id) = paths::parse_flow_directory_name(name)
            {
                flow_ids.push(id);
            }
        }
        Ok(flow_ids)
    }

    /// Sweeps flows whose last write *and* read are older than `max_age`.
    ///
    /// This is the opt-in stale-flow policy: nothing in the library calls
    /// it implicitly. Returns the number of flows removed. Flows whose
    /// header cannot be opened are skipped rather than treated as stale.
    pub fn garbage_collect(&self, max_age: Duration) -> Result<usize> {
        let now = time::get_time();
        let cutoff = now.saturating_sub(max_age.as_nanos().min(u64::MAX as u128) as u64);

        let mut removed = 0;
        for flow_id in self.list_flows()? {
            let flow_dir = paths::flow_directory_name(&self.domain, &flow_id);
            let flow_file = paths::flow_data_file_path(&flow_dir);
            let Ok(header) =
                SharedMemoryInstance::<FlowHeader>::open(&flow_file, AccessMode::OpenReadOnly)
            else {
                continue;
            };
            let common = &header.get().common;
            let last_write = common.last_write_time.load(Ordering::Relaxed);
            let last_read = common.last_read_time.load(Ordering::Relaxed);
            drop(header);

            if last_write < cutoff && last_read < cutoff {
                debug!("Garbage collecting stale flow: {}", flow_id);
                if self.delete_flow(flow_id) {
                    removed += 1;
                }
            }
        }
        Ok(removed)
    }
}

fn write_flow_descriptor(flow_dir: &Path, flow_def: &str) -> Result<()> {
    let descriptor_path = paths::flow_descriptor_file_path(flow_dir);
    fs::write(&descriptor_path, flow_def).map_err(|err| {
        error!(
            "FlowManager: Failed to create flow resource definition file '{}': {}",
            descriptor_path.display(),
            err
        );
        Error::Io(err)
    })
}

fn create_flow_access_file(flow_dir: &Path) -> Result<()> {
    let access_path = paths::flow_access_file_path(flow_dir);
    fs::File::create(&access_path).map_err(|err| {
        error!(
            "FlowManager: Failed to create flow access file '{}': {}",
            access_path.display(),
            err
        );
        Error::Io(err)
    })?;
    Ok(())
}

/// Relaxes directory permissions for cross-user readers and renames the
/// staged directory into place. The rename is the commit point.
fn publish_flow_directory(source: &Path, dest: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut permissions = fs::metadata(source)?.permissions();
        permissions.set_mode(permissions.mode() | 0o055);
        fs::set_permissions(source, permissions)?;
    }
    fs::rename(source, dest).map_err(|err| {
        error!(
            "FlowManager: Failed to publish flow directory from '{}' to '{}': {}",
            source.display(),
            dest.display(),
            err
        );
        // A rename refused because the destination exists means another
        // process published the same flow first.
        match err.kind() {
            std::io::ErrorKind::AlreadyExists | std::io::ErrorKind::DirectoryNotEmpty => {
                Error::Conflict
            }
            _ => Error::Io(err),
        }
    })
}

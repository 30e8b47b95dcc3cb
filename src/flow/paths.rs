// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! Path construction for the on-disk flow layout.
//!
//! ```text
//! <domain>/<uuid>.mxl-flow/
//!     flow.json           literal flow descriptor
//!     .mxl-flow-access    empty marker, read on open to touch its atime
//!     data                mapped flow header
//!     grains/             discrete flows: one mapped file per ring slot
//!         000000000000.grain
//!         ...
//!     channels.data       continuous flows: channel-major sample planes
//! ```
//!
//! The `.mxl-flow` suffix is load-bearing: flow discovery filters on it.

use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::Result;

/// Suffix of published flow directories.
pub const FLOW_DIRECTORY_SUFFIX: &str = ".mxl-flow";

/// Prefix of in-flight (unpublished) flow directories. The leading dot and
/// the prefix keep temporaries from ever matching the flow suffix filter.
const TEMP_DIRECTORY_PREFIX: &str = ".mxl-tmp-";

pub(crate) fn flow_directory_name(domain: &Path, id: &Uuid) -> PathBuf {
    domain.join(format!("{id}{FLOW_DIRECTORY_SUFFIX}"))
}

pub(crate) fn flow_data_file_path(flow_dir: &Path) -> PathBuf {
    flow_dir.join("data")
}

pub(crate) fn flow_descriptor_file_path(flow_dir: &Path) -> PathBuf {
    flow_dir.join("flow.json")
}

pub(crate) fn flow_access_file_path(flow_dir: &Path) -> PathBuf {
    flow_dir.join(".mxl-flow-access")
}

pub(crate) fn grain_directory_name(flow_dir: &Path) -> PathBuf {
    flow_dir.join("grains")
}

/// Grain file for ring slot `slot` (the filename carries the slot number,
/// not the grain index occupying it).
pub(crate) fn grain_data_file_path(grain_dir: &Path, slot: usize) -> PathBuf {
    grain_dir.join(format!("{slot:012}.grain"))
}

pub(crate) fn channel_data_file_path(flow_dir: &Path) -> PathBuf {
    flow_dir.join("channels.data")
}

/// Creates a uniquely named temporary directory below `domain` for staging
/// a new flow. The name never clashes with published flow directories.
pub(crate) fn create_temporary_flow_directory(domain: &Path) -> Result<PathBuf> {
    loop {
        let suffix = Uuid::new_v4().simple().to_string();
        let path = domain.join(format!("{TEMP_DIRECTORY_PREFIX}{}", &suffix[..16]));
        match std::fs::create_dir(&path) {
            Ok(()) => return Ok(path),
            Err(error) if error.kind() == std::io::ErrorKind::AlreadyExists => continue,
            Err(error) => return Err(error.into()),
        }
    }
}

/// Parses a directory name of the form `<uuid>.mxl-flow`, returning `None`
/// for anything else (including names whose stem is not a valid UUID).
pub(crate) fn parse_flow_directory_name(name: &str) -> Option<Uuid> {
    let stem = name.strip_suffix(FLOW_DIRECTORY_SUFFIX)?;
    Uuid::parse_str(stem).ok()
}

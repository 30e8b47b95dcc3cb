// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! Generic flow writer implementation.
//!
//! Provides [`FlowWriter`], a kind-erased writer that can be converted to
//! either [`crate::GrainWriter`] or [`crate::SamplesWriter`] based on the
//! flow format.

use uuid::Uuid;

use crate::flow::data::FlowData;
use crate::flow::{FlowConfigInfo, FlowRuntimeInfo};
use crate::{Error, GrainWriter, Result, SamplesWriter};

/// Generic flow writer handle.
///
/// This is the initial writer type returned by
/// [`crate::MxlInstance::create_flow_writer`]. It must be converted to a
/// typed writer ([`GrainWriter`] or [`SamplesWriter`]) using the
/// appropriate conversion method based on the flow's data format.
///
/// The writer owns the opened flow state and is responsible for writing
/// media data into the shared-memory ring.
///
/// # Examples
///
/// ```no_run
/// # use mxl::MxlInstance;
/// # fn example(instance: MxlInstance) -> Result<(), mxl::Error> {
/// let flow_def = r#"{"id": "...", "format": "urn:x-nmos:format:video"}"#;
/// let (writer, info, was_created) = instance.create_flow_writer(flow_def, None)?;
///
/// if info.is_discrete_flow() {
///     let grain_writer = writer.to_grain_writer()?;
///     // Use grain_writer for video/data
/// } else {
///     let samples_writer = writer.to_samples_writer()?;
///     // Use samples_writer for audio
/// }
/// # Ok(())
/// # }
/// ```
pub struct FlowWriter {
    data: FlowData,
    id: Uuid,
}

impl FlowWriter {
    pub(crate) fn new(data: FlowData) -> Self {
        let id = data.id();
        Self { data, id }
    }

    /// The flow's unique identifier.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Retrieves flow configuration (format, rate, dimensions).
    pub fn get_config_info(&self) -> FlowConfigInfo {
        self.data.config_info()
    }

    /// Retrieves flow runtime state (head index, last access times).
    pub fn get_runtime_info(&self) -> FlowRuntimeInfo {
        self.data.runtime_info()
    }

    /// Converts this generic writer into a [`GrainWriter`] for discrete
    /// flows.
    ///
    /// # Errors
    ///
    /// Returns an error if the flow is continuous (audio).
    pub fn to_grain_writer(self) -> Result<GrainWriter> {
        match self.data {
            FlowData::Discrete(data) => Ok(GrainWriter::new(data)),
            FlowData::Continuous(data) => Err(Error::Other(format!(
                "Cannot convert FlowWriter to GrainWriter for continuous flow of type \"{:?}\".",
                data.info().header.common.data_format()
            ))),
        }
    }

    /// Converts this generic writer into a [`SamplesWriter`] for continuous
    /// flows.
    ///
    /// # Errors
    ///
    /// Returns an error if the flow is discrete (video/data).
    pub fn to_samples_writer(self) -> Result<SamplesWriter> {
        match self.data {
            FlowData::Continuous(data) => Ok(SamplesWriter::new(data)),
            FlowData::Discrete(data) => Err(Error::Other(format!(
                "Cannot convert FlowWriter to SamplesWriter for discrete flow of type \"{:?}\".",
                data.info().header.common.data_format()
            ))),
        }
    }
}

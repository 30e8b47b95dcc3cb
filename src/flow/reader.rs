// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! Generic flow reader implementation.
//!
//! Provides [`FlowReader`], a kind-erased reader that can be converted to
//! either [`crate::GrainReader`] or [`crate::SamplesReader`] based on the
//! flow format.

use crate::flow::data::FlowData;
use crate::flow::{FlowConfigInfo, FlowInfo, FlowRuntimeInfo};
use crate::{Error, GrainReader, Result, SamplesReader};

/// Generic flow reader handle.
///
/// This is the initial reader type returned by
/// [`crate::MxlInstance::create_flow_reader`]. It must be converted to a
/// typed reader ([`GrainReader`] or [`SamplesReader`]) using the
/// appropriate conversion method based on the flow's data format.
///
/// # Examples
///
/// ```no_run
/// # use mxl::MxlInstance;
/// # fn example(instance: MxlInstance) -> Result<(), mxl::Error> {
/// let reader = instance.create_flow_reader("flow-uuid")?;
///
/// if reader.get_config_info().is_discrete_flow() {
///     let grain_reader = reader.to_grain_reader()?;
///     // Use grain_reader for video/data
/// } else {
///     let samples_reader = reader.to_samples_reader()?;
///     // Use samples_reader for audio
/// }
/// # Ok(())
/// # }
/// ```
pub struct FlowReader {
    data: FlowData,
}

impl FlowReader {
    /// Wraps an opened flow for reading.
    ///
    /// Useful with flows opened directly through
    /// [`crate::FlowManager::open_flow`], including read-only opens.
    pub fn new(data: FlowData) -> Self {
        Self { data }
    }

    /// Retrieves complete flow information (config + runtime).
    pub fn get_info(&self) -> FlowInfo {
        FlowInfo {
            config: self.data.config_info(),
            runtime: self.data.runtime_info(),
        }
    }

    /// Retrieves flow configuration (format, rate, dimensions).
    pub fn get_config_info(&self) -> FlowConfigInfo {
        self.data.config_info()
    }

    /// Retrieves flow runtime state (head index, last access times).
    pub fn get_runtime_info(&self) -> FlowRuntimeInfo {
        self.data.runtime_info()
    }

    /// Converts this generic reader into a [`GrainReader`] for discrete
    /// flows.
    ///
    /// # Errors
    ///
    /// Returns an error if the flow is continuous (audio).
    pub fn to_grain_reader(self) -> Result<GrainReader> {
        match self.data {
            FlowData::Discrete(data) => Ok(GrainReader::new(data)),
            FlowData::Continuous(data) => Err(Error::Other(format!(
                "Cannot convert FlowReader to GrainReader for continuous flow of type \"{:?}\".",
                data.info().header.common.data_format()
            ))),
        }
    }

    /// Converts this generic reader into a [`SamplesReader`] for continuous
    /// flows.
    ///
    /// # Errors
    ///
    /// Returns an error if the flow is discrete (video/data).
    pub fn to_samples_reader(self) -> Result<SamplesReader> {
        match self.data {
            FlowData::Continuous(data) => Ok(SamplesReader::new(data)),
            FlowData::Discrete(data) => Err(Error::Other(format!(
                "Cannot convert FlowReader to SamplesReader for discrete flow of type \"{:?}\".",
                data.info().header.common.data_format()
            ))),
        }
    }
}

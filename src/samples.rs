// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! Continuous media sample handling (audio streams).
//!
//! This module provides types for reading and writing continuous media
//! samples, primarily for audio data. Each channel is a ring of
//! `buffer_length` samples addressed by absolute sample index; ranges that
//! cross the ring boundary are exposed as two fragments.
//!
//! # Key Types
//!
//! - [`SamplesReader`]: Reads audio samples from a flow
//! - [`SamplesWriter`]: Writes audio samples to a flow
//! - [`SamplesWriteAccess`]: RAII write session for a sample batch
//! - [`SamplesData`]: Zero-copy view of multi-channel sample data
//!
//! [`SamplesReader`]: reader::SamplesReader
//! [`SamplesWriter`]: writer::SamplesWriter
//! [`SamplesWriteAccess`]: write_access::SamplesWriteAccess
//! [`SamplesData`]: data::SamplesData

pub mod data;
pub mod reader;
pub mod write_access;
pub mod writer;

// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! Error types for MXL operations.
//!
//! Every published operation reports failures through the [`Error`] enum;
//! internal code propagates with `?` and converts I/O and JSON failures via
//! `From`.

/// Convenience result type using [`Error`] as the error variant.
pub type Result<T> = core::result::Result<T, Error>;

/// Errors that can occur when using the MXL API.
///
/// The variants form a flat status set: lookup failures, range failures,
/// timing failures, input failures, and I/O failures. Range errors
/// distinguish "too late" (the data has been overwritten by newer revisions)
/// from "too early" (the data has not been written yet); readers that fall
/// behind should resynchronize to the current index and continue.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The requested flow ID does not exist in the domain.
    #[error("Flow not found")]
    FlowNotFound,

    /// Attempted to read/write data that is no longer available in the ring
    /// buffer (has been overwritten by newer data).
    #[error("Out of range - too late")]
    OutOfRangeTooLate,

    /// Attempted to read/write data that is not yet available in the ring
    /// buffer (index is ahead of the current head).
    #[error("Out of range - too early")]
    OutOfRangeTooEarly,

    /// A blocking operation timed out before completing.
    #[error("Timeout")]
    Timeout,

    /// An argument passed to an MXL function was invalid.
    #[error("Invalid argument")]
    InvalidArg,

    /// The data format is unsupported or does not match the flow kind
    /// (e.g. creating a discrete flow with an audio format).
    #[error("Unsupported data format")]
    UnsupportedFormat,

    /// A resource conflict occurred (e.g., attempting to create a flow that
    /// already exists, or to reopen a grain index that is already resident).
    #[error("Conflict")]
    Conflict,

    /// A filesystem or memory-mapping operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A flow definition document could not be parsed.
    #[error("Flow definition error: {0}")]
    FlowDef(#[from] serde_json::Error),

    /// A generic error for failures not covered by the other variants,
    /// including internal invariant violations found in shared state.
    #[error("Other error: {0}")]
    Other(String),
}

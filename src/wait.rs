// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! Bounded polling for blocking reads.
//!
//! Flows are shared across processes, so condition variables are not an
//! option (their shared-memory semantics differ between Linux and macOS).
//! Blocking readers instead poll the flow's shared state (keyed on its sync
//! counter) with short sleeps, backing off up to a cap. A grain that stays
//! committed for at least one polling interval is never missed.

use std::time::{Duration, Instant};

use crate::{Error, Result};

const INITIAL_BACKOFF: Duration = Duration::from_micros(100);
const MAX_BACKOFF: Duration = Duration::from_millis(2);

/// Polls `check` until it produces a value or `timeout` elapses.
///
/// `check` returns `Ok(Some(v))` on success, `Ok(None)` to keep waiting,
/// or `Err` to abort the wait (e.g. the requested data was overwritten).
/// A zero timeout performs exactly one check.
pub(crate) fn wait_until<T>(
    timeout: Duration,
    mut check: impl FnMut() -> Result<Option<T>>,
) -> Result<T> {
    let start = Instant::now();
    let mut backoff = INITIAL_BACKOFF;
    loop {
        if let Some(value) = check()? {
            return Ok(value);
        }
        let elapsed = start.elapsed();
        if elapsed >= timeout {
            return Err(Error::Timeout);
        }
        std::thread::sleep(backoff.min(timeout - elapsed));
        backoff = (backoff * 2).min(MAX_BACKOFF);
    }
}

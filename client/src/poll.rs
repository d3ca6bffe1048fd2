// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Fixed-interval polling bounded by an overall deadline.
//!
//! Convergence waits all reduce to the same shape: check a condition,
//! sleep, check again, give up at the deadline. The condition distinguishes
//! "not yet, keep polling" from "this can never succeed"; the latter stops
//! the wait immediately. Time comes from `tokio::time`, so tests running
//! under a paused clock drive these waits through virtual time.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

/// Outcome of one failed poll attempt.
#[derive(Debug)]
pub enum CondCheckError<E> {
    /// The condition hasn't been reached yet; keep polling.
    NotYet,
    /// The condition can never be reached; stop immediately.
    Failed(E),
}

impl<E> From<E> for CondCheckError<E> {
    fn from(e: E) -> CondCheckError<E> {
        CondCheckError::Failed(e)
    }
}

/// Outcome of a wait that did not produce a value.
#[derive(Debug, thiserror::Error)]
pub enum Error<E: std::error::Error> {
    #[error("poll timed out after {0:?}")]
    TimedOut(Duration),
    #[error(transparent)]
    PermanentError(E),
}

/// Invokes `cond` every `poll_interval` until it produces a value, fails
/// permanently, or more than `poll_max` has elapsed.
pub async fn wait_for_condition<T, E, Func, Fut>(
    mut cond: Func,
    poll_interval: &Duration,
    poll_max: &Duration,
) -> Result<T, Error<E>>
where
    E: std::error::Error,
    Func: FnMut() -> Fut,
    Fut: Future<Output = Result<T, CondCheckError<E>>>,
{
    let poll_start = Instant::now();
    loop {
        let elapsed = poll_start.elapsed();
        if elapsed > *poll_max {
            return Err(Error::TimedOut(elapsed));
        }
        match cond().await {
            Ok(value) => return Ok(value),
            Err(CondCheckError::NotYet) => (),
            Err(CondCheckError::Failed(e)) => {
                return Err(Error::PermanentError(e));
            }
        }
        tokio::time::sleep(*poll_interval).await;
    }
}

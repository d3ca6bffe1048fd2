// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Errors surfaced by control-plane operations and convergence waits.

use std::time::Duration;

use reqwest::StatusCode;

/// An error from a control-plane operation or a convergence wait.
///
/// None of these are retried automatically. Reads are idempotent and a
/// caller may retry them freely; create/update/delete submissions must not
/// be blindly resubmitted, since a duplicated create provisions a second
/// resource.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The desired-state tree failed validation. Raised before any network
    /// traffic.
    #[error(transparent)]
    Configuration(#[from] searchctl_types::ConfigError),

    /// The request could not be sent, or the response could not be read.
    #[error("transport failure during {action}")]
    Transport {
        action: &'static str,
        #[source]
        err: reqwest::Error,
    },

    /// The control plane answered with a status no code path expects. The
    /// raw body is preserved for diagnosis.
    #[error("{action} rejected with status {status}: {body}")]
    Operation { action: &'static str, status: StatusCode, body: String },

    /// The response had the right status but the body did not parse as the
    /// expected shape. Kept distinct from [`Error::Operation`] so a
    /// rejection can be told apart from a misunderstanding.
    #[error("failed to decode {action} response")]
    Decoding {
        action: &'static str,
        #[source]
        err: serde_json::Error,
    },

    /// Polling ran past the configured timeout without the resource
    /// reaching the target status. The remote state is indeterminate; the
    /// caller must re-read before acting again.
    #[error(
        "{resource} did not reach status \"{target}\" within {elapsed:?}"
    )]
    ConvergenceTimeout {
        resource: String,
        target: &'static str,
        elapsed: Duration,
    },

    /// The control plane reported the plan attempt unhealthy. The messages
    /// are the diagnostics of every non-success step, in step order.
    #[error("plan execution for {resource} failed: {}", .messages.join("; "))]
    PlanFailure { resource: String, messages: Vec<String> },
}

impl Error {
    pub(crate) fn transport(action: &'static str, err: reqwest::Error) -> Self {
        Error::Transport { action, err }
    }

    pub(crate) fn decoding(action: &'static str, err: serde_json::Error) -> Self {
        Error::Decoding { action, err }
    }
}

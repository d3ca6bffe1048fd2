// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Client and convergence engine for a plan-based cluster-orchestration
//! control plane.
//!
//! The control plane provisions search clusters (and optional dashboard
//! companions) asynchronously: callers submit a plan, then poll the
//! resource until it converges. This crate provides the pieces of that
//! conversation, leaf-most first:
//!
//! - [`client::Client`]: one method per control-plane verb, plus the
//!   [`client::ControlPlaneApi`] trait the engine is written against;
//! - [`poll`]: the fixed-interval, deadline-bounded wait primitive;
//! - [`convergence::ConvergenceEngine`]: create/update/delete driven as an
//!   explicit state machine with plan-health validation;
//! - [`deploy::Deployments`]: the lifecycle orchestrator that sequences a
//!   primary cluster and its dashboard companion.

pub mod client;
pub mod config;
pub mod convergence;
pub mod deploy;
pub mod error;
pub mod poll;

pub use client::Client;
pub use client::ControlPlaneApi;
pub use config::Config;
pub use config::ControlPlaneConfig;
pub use convergence::ConvergenceEngine;
pub use convergence::ConvergenceParams;
pub use deploy::Deployments;
pub use error::Error;

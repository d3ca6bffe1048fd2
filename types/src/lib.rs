// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Data model for managed search-cluster deployments.
//!
//! This crate defines the two tree shapes the system moves between: the
//! declarative desired-state tree supplied by the configuration front-end
//! ([`desired`]) and the wire-level payloads exchanged with the
//! cluster-orchestration control plane ([`wire`]). The [`expand`] module
//! projects desired state onto the wire model and [`flatten`] projects
//! control-plane state back, so the front-end can diff what it asked for
//! against what is actually running.

pub mod desired;
pub mod expand;
pub mod flatten;
pub mod wire;

pub use expand::ConfigError;

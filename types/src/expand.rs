// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Expansion of desired state into wire-level plans.
//!
//! Expansion is pure: it touches no network and no persisted state, so a
//! bad tree fails here before anything is submitted. Every unset field
//! takes its documented default, and a topology list with no elements gets
//! one synthesized default element.

use thiserror::Error;

use crate::desired::{
    ClusterPlanSpec, DashboardPlanSpec, DashboardTopologySpec, RoleSpec,
    TopologySpec,
};
use crate::wire::{
    ClusterPlan, DashboardPlan, DashboardTopologyElement, EngineConfig,
    NodeRoleSet, TopologyElement, DEFAULT_MEMORY_PER_NODE_MB,
    DEFAULT_NODE_COUNT_PER_ZONE, DEFAULT_ZONE_COUNT,
};

/// A desired-state tree that cannot be expanded into a plan.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("search cluster plan requires an engine version")]
    MissingClusterVersion,

    #[error("dashboard plan requires an engine version")]
    MissingDashboardVersion,

    #[error("{field} must be greater than zero")]
    NonPositive { field: &'static str },
}

/// Expands a desired cluster plan into its wire form.
pub fn cluster_plan(spec: &ClusterPlanSpec) -> Result<ClusterPlan, ConfigError> {
    let version =
        spec.version.clone().ok_or(ConfigError::MissingClusterVersion)?;
    let mut topology = Vec::with_capacity(spec.topology.len().max(1));
    for element in &spec.topology {
        topology.push(topology_element(element)?);
    }
    if topology.is_empty() {
        topology.push(TopologyElement::default());
    }
    Ok(ClusterPlan {
        engine: EngineConfig { version },
        topology,
        zone_count: 0,
    })
}

/// Expands a desired dashboard plan into its wire form.
pub fn dashboard_plan(
    spec: &DashboardPlanSpec,
) -> Result<DashboardPlan, ConfigError> {
    let version =
        spec.version.clone().ok_or(ConfigError::MissingDashboardVersion)?;
    let mut topology = Vec::with_capacity(spec.topology.len().max(1));
    for element in &spec.topology {
        topology.push(dashboard_topology_element(element)?);
    }
    if topology.is_empty() {
        topology.push(DashboardTopologyElement::default());
    }
    Ok(DashboardPlan {
        engine: EngineConfig { version },
        topology,
        zone_count: 0,
    })
}

fn topology_element(
    spec: &TopologySpec,
) -> Result<TopologyElement, ConfigError> {
    Ok(TopologyElement {
        memory_per_node: positive(
            spec.memory_per_node,
            DEFAULT_MEMORY_PER_NODE_MB,
            "memory_per_node",
        )?,
        node_count_per_zone: positive(
            spec.node_count_per_zone,
            DEFAULT_NODE_COUNT_PER_ZONE,
            "node_count_per_zone",
        )?,
        roles: roles(spec.roles.as_ref()),
        zone_count: positive(
            spec.zone_count,
            DEFAULT_ZONE_COUNT,
            "zone_count",
        )?,
    })
}

fn dashboard_topology_element(
    spec: &DashboardTopologySpec,
) -> Result<DashboardTopologyElement, ConfigError> {
    Ok(DashboardTopologyElement {
        memory_per_node: positive(
            spec.memory_per_node,
            DEFAULT_MEMORY_PER_NODE_MB,
            "memory_per_node",
        )?,
        node_count_per_zone: positive(
            spec.node_count_per_zone,
            DEFAULT_NODE_COUNT_PER_ZONE,
            "node_count_per_zone",
        )?,
        zone_count: positive(
            spec.zone_count,
            DEFAULT_ZONE_COUNT,
            "zone_count",
        )?,
    })
}

/// Sparse-override merge: defaults first, then only the flags the spec
/// actually set.
fn roles(spec: Option<&RoleSpec>) -> NodeRoleSet {
    let mut roles = NodeRoleSet::default();
    if let Some(spec) = spec {
        if let Some(data) = spec.data {
            roles.data = data;
        }
        if let Some(ingest) = spec.ingest {
            roles.ingest = ingest;
        }
        if let Some(master) = spec.master {
            roles.master = master;
        }
        if let Some(ml) = spec.ml {
            roles.ml = ml;
        }
    }
    roles
}

fn positive(
    value: Option<u32>,
    default: u32,
    field: &'static str,
) -> Result<u32, ConfigError> {
    match value {
        None => Ok(default),
        Some(0) => Err(ConfigError::NonPositive { field }),
        Some(value) => Ok(value),
    }
}

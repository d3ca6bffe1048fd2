// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The declarative desired-state tree.
//!
//! This is the boundary shape shared with the configuration front-end: the
//! front-end validates user input into these types once, and receives the
//! same shapes back from the flattener when diffing against live state.
//! Fields are optional wherever the expander supplies a documented default,
//! so "unset" stays distinguishable from an explicit value.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Desired state for one deployment: a search cluster and, optionally, an
/// attached dashboard instance.
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct DeploymentSpec {
    pub name: String,
    pub cluster: ClusterPlanSpec,
    #[serde(default)]
    pub dashboard: Option<DashboardPlanSpec>,
}

/// Desired plan for a search cluster.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct ClusterPlanSpec {
    /// Engine version to run. Required; expansion fails without it.
    pub version: Option<String>,
    /// Node groups. An empty list expands to one default element.
    #[serde(default)]
    pub topology: Vec<TopologySpec>,
}

/// Desired shape of one cluster node group.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct TopologySpec {
    pub memory_per_node: Option<u32>,
    pub node_count_per_zone: Option<u32>,
    pub roles: Option<RoleSpec>,
    pub zone_count: Option<u32>,
}

/// Sparse role overrides. A flag left unset keeps its default; a present
/// flag replaces only itself.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct RoleSpec {
    pub data: Option<bool>,
    pub ingest: Option<bool>,
    pub master: Option<bool>,
    pub ml: Option<bool>,
}

/// Desired plan for a dashboard instance.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct DashboardPlanSpec {
    /// Engine version to run. Required; expansion fails without it.
    pub version: Option<String>,
    #[serde(default)]
    pub topology: Vec<DashboardTopologySpec>,
}

/// Desired shape of one dashboard node group.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct DashboardTopologySpec {
    pub memory_per_node: Option<u32>,
    pub node_count_per_zone: Option<u32>,
    pub zone_count: Option<u32>,
}

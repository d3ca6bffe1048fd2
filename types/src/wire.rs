// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Wire-format payloads exchanged with the control plane.
//!
//! Everything here round-trips through JSON exactly once, at the transport
//! boundary. The shapes cover a representative subset of the control plane's
//! parameters, not the full surface.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Memory per node, in MB, when the desired state doesn't say.
pub const DEFAULT_MEMORY_PER_NODE_MB: u32 = 1024;
/// Nodes per zone when the desired state doesn't say.
pub const DEFAULT_NODE_COUNT_PER_ZONE: u32 = 1;
/// Zones when the desired state doesn't say.
pub const DEFAULT_ZONE_COUNT: u32 = 1;

/// Engine software selection for a plan.
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct EngineConfig {
    pub version: String,
}

/// Role flags for the nodes of one topology element.
///
/// The flags are independent; combinations the engine can't support are
/// rejected by the control plane, not validated here.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct NodeRoleSet {
    pub data: bool,
    pub ingest: bool,
    pub master: bool,
    pub ml: bool,
}

impl Default for NodeRoleSet {
    fn default() -> Self {
        NodeRoleSet { data: true, ingest: true, master: true, ml: false }
    }
}

impl NodeRoleSet {
    /// The role set with every flag cleared, used when the control plane
    /// reports no service roles for an instance.
    pub fn none() -> Self {
        NodeRoleSet { data: false, ingest: false, master: false, ml: false }
    }
}

/// One homogeneous node group within a zone-distributed deployment.
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct TopologyElement {
    pub memory_per_node: u32,
    pub node_count_per_zone: u32,
    pub roles: NodeRoleSet,
    // Zone count has moved between here and the plan level across control
    // plane versions. Reads may report zero here with the real value on the
    // plan; see `flatten`.
    #[serde(default)]
    pub zone_count: u32,
}

impl Default for TopologyElement {
    fn default() -> Self {
        TopologyElement {
            memory_per_node: DEFAULT_MEMORY_PER_NODE_MB,
            node_count_per_zone: DEFAULT_NODE_COUNT_PER_ZONE,
            roles: NodeRoleSet::default(),
            zone_count: DEFAULT_ZONE_COUNT,
        }
    }
}

/// A versioned topology the control plane should drive a search cluster
/// toward.
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct ClusterPlan {
    pub engine: EngineConfig,
    pub topology: Vec<TopologyElement>,
    #[serde(default)]
    pub zone_count: u32,
}

/// One node group of a dashboard instance. Dashboards have no role flags.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct DashboardTopologyElement {
    pub memory_per_node: u32,
    pub node_count_per_zone: u32,
    #[serde(default)]
    pub zone_count: u32,
}

impl Default for DashboardTopologyElement {
    fn default() -> Self {
        DashboardTopologyElement {
            memory_per_node: DEFAULT_MEMORY_PER_NODE_MB,
            node_count_per_zone: DEFAULT_NODE_COUNT_PER_ZONE,
            zone_count: DEFAULT_ZONE_COUNT,
        }
    }
}

/// A versioned topology the control plane should drive a dashboard
/// instance toward.
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct DashboardPlan {
    pub engine: EngineConfig,
    pub topology: Vec<DashboardTopologyElement>,
    #[serde(default)]
    pub zone_count: u32,
}

/// Body of a cluster create submission.
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct CreateClusterRequest {
    pub name: String,
    pub plan: ClusterPlan,
}

/// Body of a dashboard create submission. `cluster_id` is the identity of
/// the search cluster the dashboard attaches to.
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct CreateDashboardRequest {
    pub name: String,
    pub cluster_id: String,
    pub plan: DashboardPlan,
}

/// Body of a metadata update (rename).
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct UpdateMetadataRequest {
    pub name: String,
}

/// Credentials issued by the control plane. These appear exactly once, in
/// the create response; there is no way to fetch them again.
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// Response to a create submission. Dashboard creates carry no credentials.
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct CreatedResponse {
    pub cluster_id: String,
    #[serde(default)]
    pub credentials: Option<Credentials>,
}

/// Response to a login call on token-authenticated targets.
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct TokenResponse {
    pub token: String,
}

/// One diagnostic message nested under a provisioning step.
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct StepLogMessage {
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub stage: Option<String>,
    pub message: String,
}

/// One provisioning step of a plan attempt, with its diagnostic log.
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct PlanStepInfo {
    pub step_id: String,
    pub status: String,
    #[serde(default)]
    pub stage: Option<String>,
    #[serde(default)]
    pub started: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed: Option<DateTime<Utc>>,
    #[serde(default)]
    pub info_log: Vec<StepLogMessage>,
}

impl PlanStepInfo {
    pub fn succeeded(&self) -> bool {
        self.status == "success"
    }
}

/// One tracked plan submission: the plan itself plus its execution record.
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct PlanAttempt<P> {
    #[serde(default)]
    pub healthy: bool,
    #[serde(default)]
    pub plan: Option<P>,
    #[serde(default)]
    pub step_log: Vec<PlanStepInfo>,
}

/// Plan bookkeeping for a resource: current, pending, and historical
/// attempts. Returned inline by the read endpoint and, always fetched
/// fresh, by the plan-activity endpoint.
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct PlanActivityRecord<P> {
    #[serde(default)]
    pub healthy: bool,
    #[serde(default)]
    pub current: Option<PlanAttempt<P>>,
    #[serde(default)]
    pub pending: Option<PlanAttempt<P>>,
    #[serde(default)]
    pub history: Vec<PlanAttempt<P>>,
}

/// One running instance of a resource, as reported by the read endpoint.
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct InstanceInfo {
    pub instance_name: String,
    /// Capability labels actually serving on this instance. The control
    /// plane reports these instead of echoing the submitted role flags.
    #[serde(default)]
    pub service_roles: Vec<String>,
}

/// Live instances of a resource.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct LiveTopology {
    #[serde(default)]
    pub instances: Vec<InstanceInfo>,
}

/// Full state of a resource as reported by the read endpoint.
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct ResourceInfo<P> {
    pub cluster_id: String,
    pub name: String,
    pub status: String,
    #[serde(default)]
    pub healthy: bool,
    pub plan_info: PlanActivityRecord<P>,
    #[serde(default)]
    pub topology: LiveTopology,
}

impl<P> ResourceInfo<P> {
    /// The plan of the current attempt, if the control plane reported one.
    pub fn current_plan(&self) -> Option<&P> {
        self.plan_info.current.as_ref().and_then(|attempt| attempt.plan.as_ref())
    }
}

pub type ClusterInfo = ResourceInfo<ClusterPlan>;
pub type DashboardInfo = ResourceInfo<DashboardPlan>;

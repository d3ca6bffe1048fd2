// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Projection of control-plane state back into the declarative tree shape.
//!
//! The inverse of [`crate::expand`], used for drift detection: the
//! front-end compares the flattened tree against what the operator wrote.
//! Role flags can't be copied from the submitted plan because the control
//! plane doesn't echo them; they are reconstructed from each live
//! instance's reported service roles instead, index-aligned with the
//! topology elements.

use crate::desired::{
    ClusterPlanSpec, DashboardPlanSpec, DashboardTopologySpec, RoleSpec,
    TopologySpec,
};
use crate::wire::{ClusterPlan, DashboardPlan, InstanceInfo, NodeRoleSet};

/// Flattens a cluster plan and its live instances into the desired-state
/// tree shape.
pub fn cluster_plan(
    plan: &ClusterPlan,
    instances: &[InstanceInfo],
) -> ClusterPlanSpec {
    let topology = plan
        .topology
        .iter()
        .enumerate()
        .map(|(index, element)| TopologySpec {
            memory_per_node: Some(element.memory_per_node),
            node_count_per_zone: Some(element.node_count_per_zone),
            roles: Some(roles(instances.get(index))),
            zone_count: Some(zone_count(element.zone_count, plan.zone_count)),
        })
        .collect();
    ClusterPlanSpec {
        version: Some(plan.engine.version.clone()),
        topology,
    }
}

/// Flattens a dashboard plan into the desired-state tree shape.
pub fn dashboard_plan(plan: &DashboardPlan) -> DashboardPlanSpec {
    let topology = plan
        .topology
        .iter()
        .map(|element| DashboardTopologySpec {
            memory_per_node: Some(element.memory_per_node),
            node_count_per_zone: Some(element.node_count_per_zone),
            zone_count: Some(zone_count(element.zone_count, plan.zone_count)),
        })
        .collect();
    DashboardPlanSpec {
        version: Some(plan.engine.version.clone()),
        topology,
    }
}

// Older control planes report zone count only at the plan level; newer ones
// report it on the element. Prefer the element's value when it's set.
fn zone_count(element: u32, plan_level: u32) -> u32 {
    if element > 0 {
        element
    } else {
        plan_level
    }
}

/// Reconstructs role flags from an instance's reported service roles. An
/// index with no live instance flattens to all-false rather than failing;
/// labels outside the modeled set are ignored.
fn roles(instance: Option<&InstanceInfo>) -> RoleSpec {
    let mut roles = NodeRoleSet::none();
    if let Some(instance) = instance {
        for role in &instance.service_roles {
            match role.as_str() {
                "data" => roles.data = true,
                "ingest" => roles.ingest = true,
                "master" => roles.master = true,
                "ml" => roles.ml = true,
                _ => (),
            }
        }
    }
    RoleSpec {
        data: Some(roles.data),
        ingest: Some(roles.ingest),
        master: Some(roles.master),
        ml: Some(roles.ml),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expand;
    use crate::wire::{EngineConfig, TopologyElement};

    fn instance(name: &str, service_roles: &[&str]) -> InstanceInfo {
        InstanceInfo {
            instance_name: name.to_string(),
            service_roles: service_roles.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn labels(roles: &NodeRoleSet) -> Vec<&'static str> {
        let mut labels = Vec::new();
        if roles.data {
            labels.push("data");
        }
        if roles.ingest {
            labels.push("ingest");
        }
        if roles.master {
            labels.push("master");
        }
        if roles.ml {
            labels.push("ml");
        }
        labels
    }

    #[test]
    fn zone_count_falls_back_to_plan_level() {
        let plan = ClusterPlan {
            engine: EngineConfig { version: "7.8.1".to_string() },
            topology: vec![TopologyElement {
                zone_count: 0,
                ..TopologyElement::default()
            }],
            zone_count: 3,
        };
        let flattened = cluster_plan(&plan, &[instance("i-0", &["data"])]);
        assert_eq!(flattened.topology[0].zone_count, Some(3));
    }

    #[test]
    fn element_zone_count_wins_when_present() {
        let plan = ClusterPlan {
            engine: EngineConfig { version: "7.8.1".to_string() },
            topology: vec![TopologyElement {
                zone_count: 2,
                ..TopologyElement::default()
            }],
            zone_count: 3,
        };
        let flattened = cluster_plan(&plan, &[instance("i-0", &["data"])]);
        assert_eq!(flattened.topology[0].zone_count, Some(2));
    }

    #[test]
    fn missing_instance_flattens_to_all_false_roles() {
        let plan = ClusterPlan {
            engine: EngineConfig { version: "7.8.1".to_string() },
            topology: vec![
                TopologyElement::default(),
                TopologyElement::default(),
            ],
            zone_count: 0,
        };
        // One live instance for two topology elements.
        let flattened =
            cluster_plan(&plan, &[instance("i-0", &["data", "master"])]);
        assert_eq!(
            flattened.topology[0].roles,
            Some(RoleSpec {
                data: Some(true),
                ingest: Some(false),
                master: Some(true),
                ml: Some(false),
            })
        );
        assert_eq!(
            flattened.topology[1].roles,
            Some(RoleSpec {
                data: Some(false),
                ingest: Some(false),
                master: Some(false),
                ml: Some(false),
            })
        );
    }

    #[test]
    fn unknown_service_roles_are_ignored() {
        let plan = ClusterPlan {
            engine: EngineConfig { version: "7.8.1".to_string() },
            topology: vec![TopologyElement::default()],
            zone_count: 0,
        };
        let flattened =
            cluster_plan(&plan, &[instance("i-0", &["data", "coordinator"])]);
        let roles = flattened.topology[0].roles.unwrap();
        assert_eq!(roles.data, Some(true));
        assert_eq!(roles.ingest, Some(false));
    }

    #[test]
    fn expand_then_flatten_round_trips() {
        let spec = ClusterPlanSpec {
            version: Some("7.8.1".to_string()),
            topology: vec![
                TopologySpec {
                    memory_per_node: Some(2048),
                    node_count_per_zone: Some(2),
                    roles: Some(RoleSpec {
                        data: Some(true),
                        ingest: Some(true),
                        master: Some(false),
                        ml: Some(false),
                    }),
                    zone_count: Some(2),
                },
                TopologySpec {
                    memory_per_node: Some(1024),
                    node_count_per_zone: Some(1),
                    roles: Some(RoleSpec {
                        data: Some(false),
                        ingest: Some(false),
                        master: Some(true),
                        ml: Some(false),
                    }),
                    zone_count: Some(1),
                },
            ],
        };
        let plan = expand::cluster_plan(&spec).unwrap();

        // A response whose instances serve exactly the submitted roles.
        let instances: Vec<_> = plan
            .topology
            .iter()
            .enumerate()
            .map(|(i, element)| {
                let mut info =
                    instance(&format!("instance-{i}"), &[]);
                info.service_roles =
                    labels(&element.roles).iter().map(|s| s.to_string()).collect();
                info
            })
            .collect();

        assert_eq!(cluster_plan(&plan, &instances), spec);
    }

    #[test]
    fn dashboard_flatten_round_trips() {
        let spec = crate::desired::DashboardPlanSpec {
            version: Some("7.8.1".to_string()),
            topology: vec![crate::desired::DashboardTopologySpec {
                memory_per_node: Some(1024),
                node_count_per_zone: Some(1),
                zone_count: Some(1),
            }],
        };
        let plan = expand::dashboard_plan(&spec).unwrap();
        assert_eq!(dashboard_plan(&plan), spec);
    }
}

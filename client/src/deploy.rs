// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Deployment-level orchestration across the primary and companion
//! resources.
//!
//! A deployment is one search cluster plus, optionally, a dashboard bound
//! to it. The workflows here sequence the per-resource convergence flows
//! so the pair stays consistent: the dashboard is created only after the
//! cluster exists (its create body references the cluster's id) and torn
//! down before the cluster on destroy. [`DeploymentRecord`] is the
//! caller's durable handle on the pair; workflows keep it current as
//! identities come and go, so a persisted record lets an interrupted
//! workflow resume instead of orphaning resources.

use serde::Deserialize;
use serde::Serialize;
use slog::{info, o, warn, Logger};

use searchctl_types::desired::ClusterPlanSpec;
use searchctl_types::desired::DashboardPlanSpec;
use searchctl_types::desired::DeploymentSpec;
use searchctl_types::expand;
use searchctl_types::flatten;
use searchctl_types::wire::CreateClusterRequest;
use searchctl_types::wire::CreateDashboardRequest;
use searchctl_types::wire::Credentials;
use searchctl_types::wire::UpdateMetadataRequest;

use crate::client::ControlPlaneApi;
use crate::convergence::ConvergenceEngine;
use crate::convergence::ResourceProgress;
use crate::convergence::ResourceState;
use crate::error::Error;

/// Durable identity of a managed deployment.
///
/// Only identifiers are recorded. Credentials are reported once by the
/// create workflow and never stored here.
#[derive(
    Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq,
)]
pub struct DeploymentRecord {
    #[serde(default)]
    pub cluster_id: Option<String>,
    #[serde(default)]
    pub dashboard_id: Option<String>,
}

/// What a successful create produced.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CreateOutcome {
    pub cluster_id: String,
    pub dashboard_id: Option<String>,
    /// Initial credentials for the cluster. The control plane reports
    /// these exactly once; the caller must hand them to the operator now
    /// or lose them.
    pub credentials: Option<Credentials>,
    /// Live state read back after convergence. `None` only if the
    /// cluster vanished between convergence and the read-back.
    pub view: Option<DeploymentView>,
}

/// Result of an update pass.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The recorded cluster no longer exists; its identity was cleared
    /// from the record, and the caller should recreate rather than
    /// update.
    Absent,
    /// The deployment converged on the desired state; the view reports
    /// what is now live.
    Converged(DeploymentView),
}

/// Live deployment state projected back into the desired-state shape,
/// ready for drift comparison against what the operator wrote.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeploymentView {
    pub name: String,
    pub cluster: Option<ClusterPlanSpec>,
    pub dashboard: Option<DashboardPlanSpec>,
}

/// Lifecycle workflows for whole deployments.
pub struct Deployments<C> {
    engine: ConvergenceEngine<C>,
    log: Logger,
}

impl<C: ControlPlaneApi> Deployments<C> {
    pub fn new(engine: ConvergenceEngine<C>, log: &Logger) -> Deployments<C> {
        Deployments {
            engine,
            log: log.new(o!("component" => "deployments")),
        }
    }

    /// Provision a new deployment: the cluster first, then the dashboard
    /// if the spec asks for one.
    ///
    /// The whole desired tree is expanded before anything is submitted,
    /// so an invalid dashboard spec fails the workflow before it can
    /// leave a half-created deployment behind. On success the live state
    /// is read back so the caller records what actually converged, not
    /// what it asked for.
    pub async fn create(
        &self,
        spec: &DeploymentSpec,
        record: &mut DeploymentRecord,
    ) -> Result<CreateOutcome, Error> {
        let cluster_plan = expand::cluster_plan(&spec.cluster)?;
        let dashboard_plan = match &spec.dashboard {
            Some(dashboard) => Some(expand::dashboard_plan(dashboard)?),
            None => None,
        };

        let mut progress = ResourceProgress::new(ResourceState::Absent);
        let provisioned = self
            .engine
            .create_cluster(
                &mut progress,
                &CreateClusterRequest {
                    name: spec.name.clone(),
                    plan: cluster_plan,
                },
            )
            .await?;
        record.cluster_id = Some(provisioned.id.clone());

        let mut dashboard_id = None;
        if let Some(plan) = dashboard_plan {
            let mut progress = ResourceProgress::new(ResourceState::Absent);
            let dashboard = self
                .engine
                .create_dashboard(
                    &mut progress,
                    &CreateDashboardRequest {
                        name: spec.name.clone(),
                        cluster_id: provisioned.id.clone(),
                        plan,
                    },
                )
                .await?;
            record.dashboard_id = Some(dashboard.id.clone());
            dashboard_id = Some(dashboard.id);
        }

        let view = self.refresh(record).await?;
        info!(
            self.log, "deployment created";
            "name" => &spec.name,
            "cluster_id" => &provisioned.id,
        );
        Ok(CreateOutcome {
            cluster_id: provisioned.id,
            dashboard_id,
            credentials: provisioned.credentials,
            view,
        })
    }

    /// Converge an existing deployment on the desired state.
    ///
    /// Renames happen before the plan submission so progress logs carry
    /// the new name throughout. The dashboard is reconciled in whichever
    /// direction the spec moved: created if newly desired, updated if
    /// still desired, torn down if dropped.
    pub async fn update(
        &self,
        spec: &DeploymentSpec,
        record: &mut DeploymentRecord,
    ) -> Result<UpdateOutcome, Error> {
        let Some(cluster_id) = record.cluster_id.clone() else {
            return Ok(UpdateOutcome::Absent);
        };
        let Some(info) =
            self.engine.client().get_cluster(&cluster_id).await?
        else {
            warn!(
                self.log, "recorded cluster no longer exists";
                "cluster_id" => &cluster_id,
            );
            record.cluster_id = None;
            record.dashboard_id = None;
            return Ok(UpdateOutcome::Absent);
        };

        if info.name != spec.name {
            self.engine
                .client()
                .update_cluster_metadata(
                    &cluster_id,
                    &UpdateMetadataRequest { name: spec.name.clone() },
                )
                .await?;
        }

        let plan = expand::cluster_plan(&spec.cluster)?;
        let mut progress = ResourceProgress::new(ResourceState::Ready);
        self.engine.update_cluster(&mut progress, &cluster_id, &plan).await?;

        self.reconcile_dashboard(spec, record, &cluster_id).await?;

        match self.refresh(record).await? {
            Some(view) => Ok(UpdateOutcome::Converged(view)),
            None => Ok(UpdateOutcome::Absent),
        }
    }

    /// Tear the deployment down: the dashboard first, since its create
    /// references the cluster, then the cluster itself. Identities are
    /// cleared from the record as each resource goes away, so an
    /// interrupted destroy resumes where it stopped.
    pub async fn destroy(
        &self,
        record: &mut DeploymentRecord,
    ) -> Result<(), Error> {
        if let Some(dashboard_id) = record.dashboard_id.clone() {
            let mut progress = ResourceProgress::new(ResourceState::Ready);
            self.engine
                .delete_dashboard(&mut progress, &dashboard_id)
                .await?;
            record.dashboard_id = None;
        }
        if let Some(cluster_id) = record.cluster_id.clone() {
            let mut progress = ResourceProgress::new(ResourceState::Ready);
            self.engine.delete_cluster(&mut progress, &cluster_id).await?;
            record.cluster_id = None;
        }
        info!(self.log, "deployment destroyed");
        Ok(())
    }

    /// Read the live deployment back as a desired-state tree.
    ///
    /// Returns `None`, clearing the record, when the recorded cluster no
    /// longer exists. A missing dashboard only clears its own identity;
    /// the cluster's view is still reported.
    pub async fn refresh(
        &self,
        record: &mut DeploymentRecord,
    ) -> Result<Option<DeploymentView>, Error> {
        let Some(cluster_id) = record.cluster_id.clone() else {
            return Ok(None);
        };
        let Some(info) =
            self.engine.client().get_cluster(&cluster_id).await?
        else {
            warn!(
                self.log, "recorded cluster no longer exists";
                "cluster_id" => &cluster_id,
            );
            record.cluster_id = None;
            record.dashboard_id = None;
            return Ok(None);
        };
        let cluster = info
            .current_plan()
            .map(|plan| flatten::cluster_plan(plan, &info.topology.instances));

        let mut dashboard = None;
        if let Some(dashboard_id) = record.dashboard_id.clone() {
            match self.engine.client().get_dashboard(&dashboard_id).await? {
                Some(dashboard_info) => {
                    dashboard = dashboard_info
                        .current_plan()
                        .map(flatten::dashboard_plan);
                }
                None => {
                    warn!(
                        self.log, "recorded dashboard no longer exists";
                        "dashboard_id" => &dashboard_id,
                    );
                    record.dashboard_id = None;
                }
            }
        }

        Ok(Some(DeploymentView { name: info.name, cluster, dashboard }))
    }

    async fn reconcile_dashboard(
        &self,
        spec: &DeploymentSpec,
        record: &mut DeploymentRecord,
        cluster_id: &str,
    ) -> Result<(), Error> {
        match (&spec.dashboard, record.dashboard_id.clone()) {
            (Some(desired), None) => {
                self.create_dashboard_for(spec, desired, record, cluster_id)
                    .await
            }
            (Some(desired), Some(dashboard_id)) => {
                let Some(info) =
                    self.engine.client().get_dashboard(&dashboard_id).await?
                else {
                    warn!(
                        self.log, "recorded dashboard no longer exists";
                        "dashboard_id" => &dashboard_id,
                    );
                    record.dashboard_id = None;
                    return self
                        .create_dashboard_for(
                            spec, desired, record, cluster_id,
                        )
                        .await;
                };
                if info.name != spec.name {
                    self.engine
                        .client()
                        .update_dashboard_metadata(
                            &dashboard_id,
                            &UpdateMetadataRequest {
                                name: spec.name.clone(),
                            },
                        )
                        .await?;
                }
                let plan = expand::dashboard_plan(desired)?;
                let mut progress =
                    ResourceProgress::new(ResourceState::Ready);
                self.engine
                    .update_dashboard(&mut progress, &dashboard_id, &plan)
                    .await
            }
            (None, Some(dashboard_id)) => {
                let mut progress =
                    ResourceProgress::new(ResourceState::Ready);
                self.engine
                    .delete_dashboard(&mut progress, &dashboard_id)
                    .await?;
                record.dashboard_id = None;
                Ok(())
            }
            (None, None) => Ok(()),
        }
    }

    async fn create_dashboard_for(
        &self,
        spec: &DeploymentSpec,
        desired: &DashboardPlanSpec,
        record: &mut DeploymentRecord,
        cluster_id: &str,
    ) -> Result<(), Error> {
        let plan = expand::dashboard_plan(desired)?;
        let mut progress = ResourceProgress::new(ResourceState::Absent);
        let provisioned = self
            .engine
            .create_dashboard(
                &mut progress,
                &CreateDashboardRequest {
                    name: spec.name.clone(),
                    cluster_id: cluster_id.to_string(),
                    plan,
                },
            )
            .await?;
        record.dashboard_id = Some(provisioned.id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convergence::ConvergenceParams;
    use async_trait::async_trait;
    use searchctl_test_utils::test_setup_log;
    use searchctl_types::desired::RoleSpec;
    use searchctl_types::wire::ClusterInfo;
    use searchctl_types::wire::ClusterPlan;
    use searchctl_types::wire::CreatedResponse;
    use searchctl_types::wire::DashboardInfo;
    use searchctl_types::wire::DashboardPlan;
    use searchctl_types::wire::InstanceInfo;
    use searchctl_types::wire::LiveTopology;
    use searchctl_types::wire::NodeRoleSet;
    use searchctl_types::wire::PlanActivityRecord;
    use searchctl_types::wire::PlanAttempt;
    use std::sync::Mutex;

    /// A control plane that actually tracks one cluster and one dashboard,
    /// so whole workflows run against consistent state. Every call is
    /// appended to `ops` for ordering assertions.
    #[derive(Default)]
    struct FakeControlPlane {
        state: Mutex<FakeState>,
    }

    #[derive(Default)]
    struct FakeState {
        cluster: Option<LiveCluster>,
        dashboard: Option<LiveDashboard>,
        ops: Vec<&'static str>,
        dashboard_create: Option<CreateDashboardRequest>,
        renames: Vec<(String, String)>,
    }

    struct LiveCluster {
        id: String,
        name: String,
        status: String,
        plan: ClusterPlan,
        instances: Vec<InstanceInfo>,
    }

    struct LiveDashboard {
        id: String,
        name: String,
        status: String,
        plan: DashboardPlan,
    }

    fn labels(roles: &NodeRoleSet) -> Vec<String> {
        let mut labels = Vec::new();
        if roles.data {
            labels.push("data".to_string());
        }
        if roles.ingest {
            labels.push("ingest".to_string());
        }
        if roles.master {
            labels.push("master".to_string());
        }
        if roles.ml {
            labels.push("ml".to_string());
        }
        labels
    }

    fn instances_for(plan: &ClusterPlan) -> Vec<InstanceInfo> {
        plan.topology
            .iter()
            .enumerate()
            .map(|(index, element)| InstanceInfo {
                instance_name: format!("instance-{index}"),
                service_roles: labels(&element.roles),
            })
            .collect()
    }

    fn activity<P: Clone>(plan: &P) -> PlanActivityRecord<P> {
        PlanActivityRecord {
            healthy: true,
            current: Some(PlanAttempt {
                healthy: true,
                plan: Some(plan.clone()),
                step_log: Vec::new(),
            }),
            pending: None,
            history: Vec::new(),
        }
    }

    #[async_trait]
    impl ControlPlaneApi for FakeControlPlane {
        async fn create_cluster(
            &self,
            request: &CreateClusterRequest,
        ) -> Result<CreatedResponse, Error> {
            let mut state = self.state.lock().unwrap();
            state.ops.push("create_cluster");
            state.cluster = Some(LiveCluster {
                id: "c-1".to_string(),
                name: request.name.clone(),
                status: "started".to_string(),
                instances: instances_for(&request.plan),
                plan: request.plan.clone(),
            });
            Ok(CreatedResponse {
                cluster_id: "c-1".to_string(),
                credentials: Some(Credentials {
                    username: "search".to_string(),
                    password: "initial-password".to_string(),
                }),
            })
        }

        async fn get_cluster(
            &self,
            id: &str,
        ) -> Result<Option<ClusterInfo>, Error> {
            let mut state = self.state.lock().unwrap();
            state.ops.push("get_cluster");
            Ok(state.cluster.as_ref().filter(|c| c.id == id).map(|c| {
                ClusterInfo {
                    cluster_id: c.id.clone(),
                    name: c.name.clone(),
                    status: c.status.clone(),
                    healthy: true,
                    plan_info: activity(&c.plan),
                    topology: LiveTopology {
                        instances: c.instances.clone(),
                    },
                }
            }))
        }

        async fn update_cluster_plan(
            &self,
            id: &str,
            plan: &ClusterPlan,
        ) -> Result<(), Error> {
            let mut state = self.state.lock().unwrap();
            state.ops.push("update_cluster_plan");
            if let Some(c) =
                state.cluster.as_mut().filter(|c| c.id == id)
            {
                c.plan = plan.clone();
                c.instances = instances_for(plan);
            }
            Ok(())
        }

        async fn update_cluster_metadata(
            &self,
            id: &str,
            request: &UpdateMetadataRequest,
        ) -> Result<(), Error> {
            let mut state = self.state.lock().unwrap();
            state.ops.push("rename_cluster");
            state.renames.push((id.to_string(), request.name.clone()));
            if let Some(c) =
                state.cluster.as_mut().filter(|c| c.id == id)
            {
                c.name = request.name.clone();
            }
            Ok(())
        }

        async fn cluster_plan_activity(
            &self,
            _id: &str,
        ) -> Result<PlanActivityRecord<ClusterPlan>, Error> {
            let mut state = self.state.lock().unwrap();
            state.ops.push("cluster_plan_activity");
            let plan = state.cluster.as_ref().unwrap().plan.clone();
            Ok(activity(&plan))
        }

        async fn shutdown_cluster(&self, id: &str) -> Result<(), Error> {
            let mut state = self.state.lock().unwrap();
            state.ops.push("shutdown_cluster");
            if let Some(c) =
                state.cluster.as_mut().filter(|c| c.id == id)
            {
                c.status = "stopped".to_string();
            }
            Ok(())
        }

        async fn delete_cluster(&self, _id: &str) -> Result<(), Error> {
            let mut state = self.state.lock().unwrap();
            state.ops.push("delete_cluster");
            state.cluster = None;
            Ok(())
        }

        async fn create_dashboard(
            &self,
            request: &CreateDashboardRequest,
        ) -> Result<CreatedResponse, Error> {
            let mut state = self.state.lock().unwrap();
            state.ops.push("create_dashboard");
            state.dashboard_create = Some(request.clone());
            state.dashboard = Some(LiveDashboard {
                id: "d-1".to_string(),
                name: request.name.clone(),
                status: "started".to_string(),
                plan: request.plan.clone(),
            });
            Ok(CreatedResponse {
                cluster_id: "d-1".to_string(),
                credentials: None,
            })
        }

        async fn get_dashboard(
            &self,
            id: &str,
        ) -> Result<Option<DashboardInfo>, Error> {
            let mut state = self.state.lock().unwrap();
            state.ops.push("get_dashboard");
            Ok(state.dashboard.as_ref().filter(|d| d.id == id).map(|d| {
                DashboardInfo {
                    cluster_id: d.id.clone(),
                    name: d.name.clone(),
                    status: d.status.clone(),
                    healthy: true,
                    plan_info: activity(&d.plan),
                    topology: LiveTopology::default(),
                }
            }))
        }

        async fn update_dashboard_plan(
            &self,
            id: &str,
            plan: &DashboardPlan,
        ) -> Result<(), Error> {
            let mut state = self.state.lock().unwrap();
            state.ops.push("update_dashboard_plan");
            if let Some(d) =
                state.dashboard.as_mut().filter(|d| d.id == id)
            {
                d.plan = plan.clone();
            }
            Ok(())
        }

        async fn update_dashboard_metadata(
            &self,
            id: &str,
            request: &UpdateMetadataRequest,
        ) -> Result<(), Error> {
            let mut state = self.state.lock().unwrap();
            state.ops.push("rename_dashboard");
            state.renames.push((id.to_string(), request.name.clone()));
            if let Some(d) =
                state.dashboard.as_mut().filter(|d| d.id == id)
            {
                d.name = request.name.clone();
            }
            Ok(())
        }

        async fn dashboard_plan_activity(
            &self,
            _id: &str,
        ) -> Result<PlanActivityRecord<DashboardPlan>, Error> {
            let mut state = self.state.lock().unwrap();
            state.ops.push("dashboard_plan_activity");
            let plan = state.dashboard.as_ref().unwrap().plan.clone();
            Ok(activity(&plan))
        }

        async fn shutdown_dashboard(&self, id: &str) -> Result<(), Error> {
            let mut state = self.state.lock().unwrap();
            state.ops.push("shutdown_dashboard");
            if let Some(d) =
                state.dashboard.as_mut().filter(|d| d.id == id)
            {
                d.status = "stopped".to_string();
            }
            Ok(())
        }

        async fn delete_dashboard(&self, _id: &str) -> Result<(), Error> {
            let mut state = self.state.lock().unwrap();
            state.ops.push("delete_dashboard");
            state.dashboard = None;
            Ok(())
        }
    }

    fn cluster_spec() -> ClusterPlanSpec {
        ClusterPlanSpec {
            version: Some("8.9.0".to_string()),
            topology: Vec::new(),
        }
    }

    fn dashboard_spec() -> DashboardPlanSpec {
        DashboardPlanSpec {
            version: Some("8.9.0".to_string()),
            topology: Vec::new(),
        }
    }

    fn spec(name: &str, with_dashboard: bool) -> DeploymentSpec {
        DeploymentSpec {
            name: name.to_string(),
            cluster: cluster_spec(),
            dashboard: with_dashboard.then(dashboard_spec),
        }
    }

    /// A fake already serving a converged deployment, plus the record a
    /// caller who created it would hold.
    fn seeded(
        name: &str,
        with_dashboard: bool,
    ) -> (FakeControlPlane, DeploymentRecord) {
        let fake = FakeControlPlane::default();
        {
            let mut state = fake.state.lock().unwrap();
            let plan = expand::cluster_plan(&cluster_spec()).unwrap();
            state.cluster = Some(LiveCluster {
                id: "c-1".to_string(),
                name: name.to_string(),
                status: "started".to_string(),
                instances: instances_for(&plan),
                plan,
            });
            if with_dashboard {
                state.dashboard = Some(LiveDashboard {
                    id: "d-1".to_string(),
                    name: name.to_string(),
                    status: "started".to_string(),
                    plan: expand::dashboard_plan(&dashboard_spec())
                        .unwrap(),
                });
            }
        }
        let record = DeploymentRecord {
            cluster_id: Some("c-1".to_string()),
            dashboard_id: with_dashboard.then(|| "d-1".to_string()),
        };
        (fake, record)
    }

    fn deployments(
        fake: FakeControlPlane,
        log: &Logger,
    ) -> Deployments<FakeControlPlane> {
        Deployments::new(
            ConvergenceEngine::new(fake, ConvergenceParams::default(), log),
            log,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn create_provisions_cluster_then_dashboard() {
        let logctx =
            test_setup_log("create_provisions_cluster_then_dashboard");
        let deployments =
            deployments(FakeControlPlane::default(), &logctx.log);
        let mut record = DeploymentRecord::default();

        let outcome = deployments
            .create(&spec("search-prod", true), &mut record)
            .await
            .expect("create should converge");

        assert_eq!(outcome.cluster_id, "c-1");
        assert_eq!(outcome.dashboard_id.as_deref(), Some("d-1"));
        assert!(outcome.credentials.is_some());
        let view = outcome.view.expect("live state should be read back");
        assert_eq!(view.name, "search-prod");
        assert!(view.cluster.is_some());
        assert!(view.dashboard.is_some());
        assert_eq!(record.cluster_id.as_deref(), Some("c-1"));
        assert_eq!(record.dashboard_id.as_deref(), Some("d-1"));
        let state = deployments.engine.client().state.lock().unwrap();
        let request = state.dashboard_create.as_ref().unwrap();
        assert_eq!(request.cluster_id, "c-1");
        assert_eq!(request.name, "search-prod");
        drop(state);
        logctx.cleanup_successful();
    }

    #[tokio::test(start_paused = true)]
    async fn create_validates_whole_spec_before_submitting() {
        let logctx =
            test_setup_log("create_validates_whole_spec_before_submitting");
        let deployments =
            deployments(FakeControlPlane::default(), &logctx.log);
        let mut record = DeploymentRecord::default();
        // Dashboard desired but without a version: expansion must reject
        // the spec before the cluster create goes out.
        let bad_spec = DeploymentSpec {
            name: "search-prod".to_string(),
            cluster: cluster_spec(),
            dashboard: Some(DashboardPlanSpec::default()),
        };

        let err = deployments
            .create(&bad_spec, &mut record)
            .await
            .expect_err("create should fail validation");

        assert!(matches!(err, Error::Configuration(_)));
        assert!(
            deployments.engine.client().state.lock().unwrap().ops.is_empty()
        );
        assert_eq!(record, DeploymentRecord::default());
        logctx.cleanup_successful();
    }

    #[tokio::test(start_paused = true)]
    async fn update_reports_absent_for_deleted_cluster() {
        let logctx =
            test_setup_log("update_reports_absent_for_deleted_cluster");
        let deployments =
            deployments(FakeControlPlane::default(), &logctx.log);
        let mut record = DeploymentRecord {
            cluster_id: Some("c-1".to_string()),
            dashboard_id: None,
        };

        let outcome = deployments
            .update(&spec("search-prod", false), &mut record)
            .await
            .expect("update should succeed");

        assert_eq!(outcome, UpdateOutcome::Absent);
        assert_eq!(record, DeploymentRecord::default());
        logctx.cleanup_successful();
    }

    #[tokio::test(start_paused = true)]
    async fn update_renames_before_plan_submission() {
        let logctx =
            test_setup_log("update_renames_before_plan_submission");
        let (fake, mut record) = seeded("search-old", false);
        let deployments = deployments(fake, &logctx.log);

        let outcome = deployments
            .update(&spec("search-new", false), &mut record)
            .await
            .expect("update should converge");

        let UpdateOutcome::Converged(view) = outcome else {
            panic!("expected converged outcome");
        };
        assert_eq!(view.name, "search-new");
        let state = deployments.engine.client().state.lock().unwrap();
        assert_eq!(
            state.renames,
            vec![("c-1".to_string(), "search-new".to_string())]
        );
        let rename = state
            .ops
            .iter()
            .position(|op| *op == "rename_cluster")
            .unwrap();
        let plan_update = state
            .ops
            .iter()
            .position(|op| *op == "update_cluster_plan")
            .unwrap();
        assert!(rename < plan_update);
        drop(state);
        logctx.cleanup_successful();
    }

    #[tokio::test(start_paused = true)]
    async fn update_creates_newly_desired_dashboard() {
        let logctx =
            test_setup_log("update_creates_newly_desired_dashboard");
        let (fake, mut record) = seeded("search-prod", false);
        let deployments = deployments(fake, &logctx.log);

        let outcome = deployments
            .update(&spec("search-prod", true), &mut record)
            .await
            .expect("update should converge");

        let UpdateOutcome::Converged(view) = outcome else {
            panic!("expected converged outcome");
        };
        assert!(view.dashboard.is_some());
        assert_eq!(record.dashboard_id.as_deref(), Some("d-1"));
        let state = deployments.engine.client().state.lock().unwrap();
        assert_eq!(
            state.dashboard_create.as_ref().unwrap().cluster_id,
            "c-1"
        );
        drop(state);
        logctx.cleanup_successful();
    }

    #[tokio::test(start_paused = true)]
    async fn update_tears_down_undesired_dashboard() {
        let logctx =
            test_setup_log("update_tears_down_undesired_dashboard");
        let (fake, mut record) = seeded("search-prod", true);
        let deployments = deployments(fake, &logctx.log);

        let outcome = deployments
            .update(&spec("search-prod", false), &mut record)
            .await
            .expect("update should converge");

        let UpdateOutcome::Converged(view) = outcome else {
            panic!("expected converged outcome");
        };
        assert!(view.dashboard.is_none());
        assert!(record.dashboard_id.is_none());
        let state = deployments.engine.client().state.lock().unwrap();
        assert!(state.dashboard.is_none());
        assert!(state.ops.contains(&"shutdown_dashboard"));
        assert!(state.ops.contains(&"delete_dashboard"));
        drop(state);
        logctx.cleanup_successful();
    }

    #[tokio::test(start_paused = true)]
    async fn destroy_removes_dashboard_before_cluster() {
        let logctx =
            test_setup_log("destroy_removes_dashboard_before_cluster");
        let (fake, mut record) = seeded("search-prod", true);
        let deployments = deployments(fake, &logctx.log);

        deployments
            .destroy(&mut record)
            .await
            .expect("destroy should succeed");

        assert_eq!(record, DeploymentRecord::default());
        let state = deployments.engine.client().state.lock().unwrap();
        assert!(state.cluster.is_none());
        assert!(state.dashboard.is_none());
        let dashboard_delete = state
            .ops
            .iter()
            .position(|op| *op == "delete_dashboard")
            .unwrap();
        let cluster_shutdown = state
            .ops
            .iter()
            .position(|op| *op == "shutdown_cluster")
            .unwrap();
        assert!(dashboard_delete < cluster_shutdown);
        drop(state);
        logctx.cleanup_successful();
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_flattens_live_state() {
        let logctx = test_setup_log("refresh_flattens_live_state");
        let (fake, mut record) = seeded("search-prod", false);
        let deployments = deployments(fake, &logctx.log);

        let view = deployments
            .refresh(&mut record)
            .await
            .expect("refresh should succeed")
            .expect("deployment should exist");

        assert_eq!(view.name, "search-prod");
        let cluster = view.cluster.expect("cluster plan should be reported");
        assert_eq!(cluster.version.as_deref(), Some("8.9.0"));
        assert_eq!(cluster.topology.len(), 1);
        let element = cluster.topology[0];
        assert_eq!(element.memory_per_node, Some(1024));
        assert_eq!(element.node_count_per_zone, Some(1));
        assert_eq!(element.zone_count, Some(1));
        assert_eq!(
            element.roles,
            Some(RoleSpec {
                data: Some(true),
                ingest: Some(true),
                master: Some(true),
                ml: Some(false),
            })
        );
        logctx.cleanup_successful();
    }
}

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Drives control-plane submissions to completion.
//!
//! The control plane acknowledges create, plan-update, and shutdown
//! submissions before acting on them. Each workflow here is the
//! synchronous wrapper around one of those asynchronous operations:
//! submit, then poll the resource's reported status until it reaches the
//! target, honoring an overall timeout. Updates additionally inspect the
//! plan-activity record afterwards, because a cluster can come back up
//! "started" even when some provisioning steps failed.

use slog::{debug, info, o, warn, Logger};
use slog_error_chain::InlineErrorChain;
use std::future::Future;
use std::time::Duration;

use searchctl_types::wire::ClusterPlan;
use searchctl_types::wire::CreateClusterRequest;
use searchctl_types::wire::CreateDashboardRequest;
use searchctl_types::wire::Credentials;
use searchctl_types::wire::DashboardPlan;
use searchctl_types::wire::PlanActivityRecord;

use crate::client::ControlPlaneApi;
use crate::config::ControlPlaneConfig;
use crate::error::Error;
use crate::poll;
use crate::poll::CondCheckError;

/// Status reported by the control plane once a resource is serving.
const STATUS_STARTED: &str = "started";
/// Status reported by the control plane once a resource has fully stopped.
const STATUS_STOPPED: &str = "stopped";

/// Lifecycle states a managed resource moves through.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResourceState {
    /// Not present on the control plane.
    Absent,
    /// A create or plan submission is in flight.
    Submitting,
    /// The control plane acknowledged the submission and is executing it.
    Converging,
    /// The resource reached the started status.
    Ready,
    /// A shutdown was accepted and the resource is draining.
    ShuttingDown,
    /// The resource is gone from the control plane.
    Deleted,
    /// An operation failed. The remote state is indeterminate until the
    /// next read.
    Failed,
}

/// Tracks one resource's lifecycle state across a workflow, logging every
/// transition.
#[derive(Debug)]
pub struct ResourceProgress {
    current: ResourceState,
}

impl ResourceProgress {
    pub fn new(initial: ResourceState) -> ResourceProgress {
        ResourceProgress { current: initial }
    }

    pub fn current(&self) -> ResourceState {
        self.current
    }

    fn transition(&mut self, log: &Logger, next: ResourceState) {
        info!(
            log, "resource state transition";
            "from" => ?self.current,
            "to" => ?next,
        );
        self.current = next;
    }
}

/// Tunables for convergence waits.
#[derive(Clone, Copy, Debug)]
pub struct ConvergenceParams {
    /// Upper bound on each wait for a resource to reach its target status.
    pub timeout: Duration,
    /// Interval between status polls.
    pub poll_interval: Duration,
    /// Pause between a plan update being accepted and the first status
    /// poll, giving the control plane time to take the submission out of
    /// "pending".
    pub settle_delay: Duration,
}

impl Default for ConvergenceParams {
    fn default() -> ConvergenceParams {
        ConvergenceParams {
            timeout: Duration::from_secs(3600),
            poll_interval: Duration::from_secs(5),
            settle_delay: Duration::from_secs(5),
        }
    }
}

impl ConvergenceParams {
    pub fn from_config(config: &ControlPlaneConfig) -> ConvergenceParams {
        ConvergenceParams { timeout: config.timeout(), ..Default::default() }
    }
}

/// Identity handed back by a successful create workflow.
///
/// `credentials` is populated for clusters and absent for dashboards; the
/// control plane reports it exactly once, so the caller must not drop it
/// on the floor.
#[derive(Clone, Debug)]
pub struct ProvisionedResource {
    pub id: String,
    pub credentials: Option<Credentials>,
}

/// How a successful status wait ended.
enum StatusWait {
    /// The resource reported the target status.
    Reached,
    /// The resource disappeared, and the wait allowed that.
    Absent,
}

/// Executes submission-then-wait workflows against one control plane.
pub struct ConvergenceEngine<C> {
    client: C,
    params: ConvergenceParams,
    log: Logger,
}

impl<C: ControlPlaneApi> ConvergenceEngine<C> {
    pub fn new(
        client: C,
        params: ConvergenceParams,
        log: &Logger,
    ) -> ConvergenceEngine<C> {
        ConvergenceEngine {
            client,
            params,
            log: log.new(o!("component" => "convergence-engine")),
        }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Submit a cluster create and wait for the new cluster to start.
    pub async fn create_cluster(
        &self,
        progress: &mut ResourceProgress,
        request: &CreateClusterRequest,
    ) -> Result<ProvisionedResource, Error> {
        progress.transition(&self.log, ResourceState::Submitting);
        let created = match self.client.create_cluster(request).await {
            Ok(created) => created,
            Err(err) => return self.fail(progress, err),
        };
        info!(
            self.log, "cluster create accepted";
            "cluster_id" => &created.cluster_id,
        );
        progress.transition(&self.log, ResourceState::Converging);
        let wait = self
            .wait_for_status(
                &format!("cluster {}", created.cluster_id),
                STATUS_STARTED,
                false,
                || async {
                    Ok(self
                        .client
                        .get_cluster(&created.cluster_id)
                        .await?
                        .map(|info| info.status))
                },
            )
            .await;
        if let Err(err) = wait {
            return self.fail(progress, err);
        }
        progress.transition(&self.log, ResourceState::Ready);
        Ok(ProvisionedResource {
            id: created.cluster_id,
            credentials: created.credentials,
        })
    }

    /// Submit a replacement cluster plan, wait for the cluster to come
    /// back up, and verify the plan actually executed cleanly.
    pub async fn update_cluster(
        &self,
        progress: &mut ResourceProgress,
        id: &str,
        plan: &ClusterPlan,
    ) -> Result<(), Error> {
        progress.transition(&self.log, ResourceState::Submitting);
        if let Err(err) = self.client.update_cluster_plan(id, plan).await {
            return self.fail(progress, err);
        }
        progress.transition(&self.log, ResourceState::Converging);
        // A cluster still reports "started" in the window between
        // acceptance and execution; polling immediately would see the old
        // steady state and declare success.
        tokio::time::sleep(self.params.settle_delay).await;
        let wait = self
            .wait_for_status(
                &format!("cluster {id}"),
                STATUS_STARTED,
                false,
                || async {
                    Ok(self
                        .client
                        .get_cluster(id)
                        .await?
                        .map(|info| info.status))
                },
            )
            .await;
        if let Err(err) = wait {
            return self.fail(progress, err);
        }
        let activity = match self.client.cluster_plan_activity(id).await {
            Ok(activity) => activity,
            Err(err) => return self.fail(progress, err),
        };
        if let Err(err) =
            self.check_plan_health(&format!("cluster {id}"), &activity)
        {
            return self.fail(progress, err);
        }
        progress.transition(&self.log, ResourceState::Ready);
        Ok(())
    }

    /// Shut a cluster down, wait for it to stop, and delete it.
    ///
    /// The wait tolerates the cluster vanishing (a previous delete may
    /// have gotten that far before being interrupted), and a wait timeout
    /// is only a warning: the delete below is the authoritative check,
    /// failing if the control plane still considers the cluster live.
    pub async fn delete_cluster(
        &self,
        progress: &mut ResourceProgress,
        id: &str,
    ) -> Result<(), Error> {
        progress.transition(&self.log, ResourceState::ShuttingDown);
        if let Err(err) = self.client.shutdown_cluster(id).await {
            return self.fail(progress, err);
        }
        match self
            .wait_for_status(
                &format!("cluster {id}"),
                STATUS_STOPPED,
                true,
                || async {
                    Ok(self
                        .client
                        .get_cluster(id)
                        .await?
                        .map(|info| info.status))
                },
            )
            .await
        {
            Ok(_) => (),
            Err(err @ Error::ConvergenceTimeout { .. }) => {
                warn!(
                    self.log, "shutdown wait timed out; attempting delete";
                    "cluster_id" => id,
                    "err" => InlineErrorChain::new(&err),
                );
            }
            Err(err) => return self.fail(progress, err),
        }
        if let Err(err) = self.client.delete_cluster(id).await {
            return self.fail(progress, err);
        }
        progress.transition(&self.log, ResourceState::Deleted);
        info!(self.log, "cluster deleted"; "cluster_id" => id);
        Ok(())
    }

    /// Submit a dashboard create and wait for it to start.
    pub async fn create_dashboard(
        &self,
        progress: &mut ResourceProgress,
        request: &CreateDashboardRequest,
    ) -> Result<ProvisionedResource, Error> {
        progress.transition(&self.log, ResourceState::Submitting);
        let created = match self.client.create_dashboard(request).await {
            Ok(created) => created,
            Err(err) => return self.fail(progress, err),
        };
        info!(
            self.log, "dashboard create accepted";
            "dashboard_id" => &created.cluster_id,
        );
        progress.transition(&self.log, ResourceState::Converging);
        let wait = self
            .wait_for_status(
                &format!("dashboard {}", created.cluster_id),
                STATUS_STARTED,
                false,
                || async {
                    Ok(self
                        .client
                        .get_dashboard(&created.cluster_id)
                        .await?
                        .map(|info| info.status))
                },
            )
            .await;
        if let Err(err) = wait {
            return self.fail(progress, err);
        }
        progress.transition(&self.log, ResourceState::Ready);
        Ok(ProvisionedResource {
            id: created.cluster_id,
            credentials: created.credentials,
        })
    }

    /// Submit a replacement dashboard plan and verify its execution, as
    /// [`ConvergenceEngine::update_cluster`] does for clusters.
    pub async fn update_dashboard(
        &self,
        progress: &mut ResourceProgress,
        id: &str,
        plan: &DashboardPlan,
    ) -> Result<(), Error> {
        progress.transition(&self.log, ResourceState::Submitting);
        if let Err(err) = self.client.update_dashboard_plan(id, plan).await {
            return self.fail(progress, err);
        }
        progress.transition(&self.log, ResourceState::Converging);
        tokio::time::sleep(self.params.settle_delay).await;
        let wait = self
            .wait_for_status(
                &format!("dashboard {id}"),
                STATUS_STARTED,
                false,
                || async {
                    Ok(self
                        .client
                        .get_dashboard(id)
                        .await?
                        .map(|info| info.status))
                },
            )
            .await;
        if let Err(err) = wait {
            return self.fail(progress, err);
        }
        let activity = match self.client.dashboard_plan_activity(id).await {
            Ok(activity) => activity,
            Err(err) => return self.fail(progress, err),
        };
        if let Err(err) =
            self.check_plan_health(&format!("dashboard {id}"), &activity)
        {
            return self.fail(progress, err);
        }
        progress.transition(&self.log, ResourceState::Ready);
        Ok(())
    }

    /// Shut a dashboard down, wait for it to stop, and delete it.
    pub async fn delete_dashboard(
        &self,
        progress: &mut ResourceProgress,
        id: &str,
    ) -> Result<(), Error> {
        progress.transition(&self.log, ResourceState::ShuttingDown);
        if let Err(err) = self.client.shutdown_dashboard(id).await {
            return self.fail(progress, err);
        }
        match self
            .wait_for_status(
                &format!("dashboard {id}"),
                STATUS_STOPPED,
                true,
                || async {
                    Ok(self
                        .client
                        .get_dashboard(id)
                        .await?
                        .map(|info| info.status))
                },
            )
            .await
        {
            Ok(_) => (),
            Err(err @ Error::ConvergenceTimeout { .. }) => {
                warn!(
                    self.log, "shutdown wait timed out; attempting delete";
                    "dashboard_id" => id,
                    "err" => InlineErrorChain::new(&err),
                );
            }
            Err(err) => return self.fail(progress, err),
        }
        if let Err(err) = self.client.delete_dashboard(id).await {
            return self.fail(progress, err);
        }
        progress.transition(&self.log, ResourceState::Deleted);
        info!(self.log, "dashboard deleted"; "dashboard_id" => id);
        Ok(())
    }

    /// Poll `read_status` until it reports `target`.
    ///
    /// A read error is fatal and ends the wait immediately. A missing
    /// resource ends the wait only when `allow_missing` is set; otherwise
    /// polling continues, covering control planes that briefly 404 a
    /// just-created resource.
    async fn wait_for_status<F, Fut>(
        &self,
        resource: &str,
        target: &'static str,
        allow_missing: bool,
        read_status: F,
    ) -> Result<StatusWait, Error>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<Option<String>, Error>>,
    {
        let result = poll::wait_for_condition(
            || async {
                match read_status().await {
                    Err(err) => Err(CondCheckError::Failed(err)),
                    Ok(None) if allow_missing => Ok(StatusWait::Absent),
                    Ok(None) => Err(CondCheckError::NotYet),
                    Ok(Some(status)) if status == target => {
                        Ok(StatusWait::Reached)
                    }
                    Ok(Some(status)) => {
                        debug!(
                            self.log, "still waiting for status";
                            "resource" => resource,
                            "status" => status,
                            "target" => target,
                        );
                        Err(CondCheckError::NotYet)
                    }
                }
            },
            &self.params.poll_interval,
            &self.params.timeout,
        )
        .await;
        match result {
            Ok(outcome) => Ok(outcome),
            Err(poll::Error::TimedOut(elapsed)) => {
                Err(Error::ConvergenceTimeout {
                    resource: resource.to_string(),
                    target,
                    elapsed,
                })
            }
            Err(poll::Error::PermanentError(err)) => Err(err),
        }
    }

    /// Distill an unhealthy plan attempt into its step diagnostics.
    ///
    /// The interesting messages live in the `info_log` of steps that
    /// didn't succeed; successful steps are noise. An activity record with
    /// no current attempt after an update counts as a failure too, since
    /// there is nothing to show the submission executed.
    fn check_plan_health<P>(
        &self,
        resource: &str,
        activity: &PlanActivityRecord<P>,
    ) -> Result<(), Error> {
        let Some(current) = &activity.current else {
            return Err(Error::PlanFailure {
                resource: resource.to_string(),
                messages: vec![
                    "control plane reported no current plan attempt"
                        .to_string(),
                ],
            });
        };
        if current.healthy {
            return Ok(());
        }
        let messages = current
            .step_log
            .iter()
            .filter(|step| !step.succeeded())
            .flat_map(|step| {
                step.info_log.iter().map(move |entry| {
                    format!("[{}] {}", step.step_id, entry.message)
                })
            })
            .collect();
        Err(Error::PlanFailure { resource: resource.to_string(), messages })
    }

    fn fail<T>(
        &self,
        progress: &mut ResourceProgress,
        err: Error,
    ) -> Result<T, Error> {
        progress.transition(&self.log, ResourceState::Failed);
        Err(err)
    }
}

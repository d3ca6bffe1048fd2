// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! HTTP client for the cluster control plane.
//!
//! Every operation here is a single request/response exchange; waiting for
//! the control plane to act on a submission is the convergence engine's
//! job. Responses are screened against the one status code each endpoint
//! is documented to return, with 404 on reads mapped to `None` rather than
//! an error.

use async_trait::async_trait;
use reqwest::header;
use reqwest::Method;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;
use slog::debug;
use slog::info;
use slog::o;
use slog::Logger;
use std::sync::Mutex;

use searchctl_types::wire::ClusterInfo;
use searchctl_types::wire::ClusterPlan;
use searchctl_types::wire::CreateClusterRequest;
use searchctl_types::wire::CreateDashboardRequest;
use searchctl_types::wire::CreatedResponse;
use searchctl_types::wire::Credentials;
use searchctl_types::wire::DashboardInfo;
use searchctl_types::wire::DashboardPlan;
use searchctl_types::wire::PlanActivityRecord;
use searchctl_types::wire::TokenResponse;
use searchctl_types::wire::UpdateMetadataRequest;

use crate::config::ControlPlaneConfig;
use crate::config::DeploymentKind;
use crate::error::Error;

/// Collection endpoint for search clusters.
pub const CLUSTER_COLLECTION: &str = "/api/v1/clusters/search";
/// Collection endpoint for dashboard instances.
pub const DASHBOARD_COLLECTION: &str = "/api/v1/clusters/dashboard";
/// Session login endpoint, used only against hosted control planes.
pub const LOGIN_PATH: &str = "/api/v1/users/_login";

/// Operations of the cluster control plane needed by the deployment
/// workflows.
///
/// [`Client`] is the wire implementation; tests substitute in-memory
/// fakes. Companion (dashboard) endpoints mirror the primary's shape, but
/// the two resource kinds carry different plan types, so each gets its own
/// set of methods.
#[async_trait]
pub trait ControlPlaneApi: Send + Sync {
    /// Submit a new cluster for provisioning.
    async fn create_cluster(
        &self,
        request: &CreateClusterRequest,
    ) -> Result<CreatedResponse, Error>;

    /// Fetch a cluster's full info, or `None` if the control plane does
    /// not know the id.
    async fn get_cluster(&self, id: &str)
        -> Result<Option<ClusterInfo>, Error>;

    /// Submit a replacement plan. Acceptance is asynchronous; the control
    /// plane acknowledges and executes in the background.
    async fn update_cluster_plan(
        &self,
        id: &str,
        plan: &ClusterPlan,
    ) -> Result<(), Error>;

    /// Rename a cluster without touching its plan.
    async fn update_cluster_metadata(
        &self,
        id: &str,
        request: &UpdateMetadataRequest,
    ) -> Result<(), Error>;

    /// Fetch the cluster's plan-attempt activity record.
    async fn cluster_plan_activity(
        &self,
        id: &str,
    ) -> Result<PlanActivityRecord<ClusterPlan>, Error>;

    /// Ask the control plane to stop a cluster. Acceptance is
    /// asynchronous.
    async fn shutdown_cluster(&self, id: &str) -> Result<(), Error>;

    /// Delete a stopped cluster.
    async fn delete_cluster(&self, id: &str) -> Result<(), Error>;

    /// Submit a new dashboard for provisioning.
    async fn create_dashboard(
        &self,
        request: &CreateDashboardRequest,
    ) -> Result<CreatedResponse, Error>;

    /// Fetch a dashboard's full info, or `None` if the control plane does
    /// not know the id.
    async fn get_dashboard(
        &self,
        id: &str,
    ) -> Result<Option<DashboardInfo>, Error>;

    /// Submit a replacement dashboard plan.
    async fn update_dashboard_plan(
        &self,
        id: &str,
        plan: &DashboardPlan,
    ) -> Result<(), Error>;

    /// Rename a dashboard without touching its plan.
    async fn update_dashboard_metadata(
        &self,
        id: &str,
        request: &UpdateMetadataRequest,
    ) -> Result<(), Error>;

    /// Fetch the dashboard's plan-attempt activity record.
    async fn dashboard_plan_activity(
        &self,
        id: &str,
    ) -> Result<PlanActivityRecord<DashboardPlan>, Error>;

    /// Ask the control plane to stop a dashboard.
    async fn shutdown_dashboard(&self, id: &str) -> Result<(), Error>;

    /// Delete a stopped dashboard.
    async fn delete_dashboard(&self, id: &str) -> Result<(), Error>;
}

/// Wire client for a single control plane.
///
/// Cheap to share by reference across concurrent workflows; the underlying
/// `reqwest::Client` pools connections internally.
pub struct Client {
    log: Logger,
    client: reqwest::Client,
    base_url: String,
    username: String,
    password: String,
    kind: DeploymentKind,
    // Session token for hosted control planes, populated by the first
    // authorized call.
    token: Mutex<Option<String>>,
}

impl Client {
    pub fn new(
        config: &ControlPlaneConfig,
        log: &Logger,
    ) -> Result<Client, Error> {
        let mut builder = reqwest::Client::builder();
        if config.insecure {
            builder = builder.danger_accept_invalid_certs(true);
        }
        let client = builder
            .build()
            .map_err(|err| Error::transport("initializing http client", err))?;
        Ok(Client {
            log: log.new(o!("component" => "control-plane-client")),
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            username: config.username.clone(),
            password: config.password.clone(),
            kind: config.kind,
            token: Mutex::new(None),
        })
    }

    /// Exchange the configured credentials for a session token.
    ///
    /// Calling this directly is only needed to validate credentials
    /// eagerly; authorized requests against a hosted control plane log in
    /// on their own the first time.
    pub async fn login(&self) -> Result<String, Error> {
        let credentials = Credentials {
            username: self.username.clone(),
            password: self.password.clone(),
        };
        let response = self
            .client
            .post(self.url(LOGIN_PATH))
            .json(&credentials)
            .send()
            .await
            .map_err(|err| Error::transport("login", err))?;
        let response = self.screen("login", response, StatusCode::OK).await?;
        let body: TokenResponse = self.read_json("login", response).await?;
        *self.token.lock().unwrap() = Some(body.token.clone());
        info!(self.log, "logged in to control plane");
        Ok(body.token)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn session_token(&self) -> Result<String, Error> {
        let cached = self.token.lock().unwrap().clone();
        match cached {
            Some(token) => Ok(token),
            None => self.login().await,
        }
    }

    async fn authorize(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::RequestBuilder, Error> {
        match self.kind {
            DeploymentKind::OnPrem => {
                Ok(request.basic_auth(&self.username, Some(&self.password)))
            }
            DeploymentKind::Hosted => {
                let token = self.session_token().await?;
                Ok(request.bearer_auth(token))
            }
        }
    }

    /// Send one authorized request and screen the response against the
    /// single status code this endpoint returns on success.
    async fn send<B: Serialize + ?Sized>(
        &self,
        action: &'static str,
        method: Method,
        path: &str,
        body: Option<&B>,
        expect: StatusCode,
    ) -> Result<reqwest::Response, Error> {
        // The control plane wants the content type announced even on
        // bodyless calls.
        let mut request = self
            .client
            .request(method, self.url(path))
            .header(header::CONTENT_TYPE, "application/json");
        request = self.authorize(request).await?;
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request
            .send()
            .await
            .map_err(|err| Error::transport(action, err))?;
        self.screen(action, response, expect).await
    }

    async fn screen(
        &self,
        action: &'static str,
        response: reqwest::Response,
        expect: StatusCode,
    ) -> Result<reqwest::Response, Error> {
        let status = response.status();
        if status == expect {
            return Ok(response);
        }
        // Read the rejection body best-effort; it often names the actual
        // problem (quota, bad version, malformed plan).
        let body = response.text().await.unwrap_or_default();
        Err(Error::Operation { action, status, body })
    }

    async fn read_json<T: DeserializeOwned>(
        &self,
        action: &'static str,
        response: reqwest::Response,
    ) -> Result<T, Error> {
        let body = response
            .text()
            .await
            .map_err(|err| Error::transport(action, err))?;
        serde_json::from_str(&body).map_err(|err| Error::decoding(action, err))
    }

    /// GET a resource, treating 404 as "absent" rather than an error.
    async fn fetch<T: DeserializeOwned>(
        &self,
        action: &'static str,
        path: &str,
    ) -> Result<Option<T>, Error> {
        let request = self
            .client
            .request(Method::GET, self.url(path))
            .header(header::CONTENT_TYPE, "application/json");
        let request = self.authorize(request).await?;
        let response = request
            .send()
            .await
            .map_err(|err| Error::transport(action, err))?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = self.screen(action, response, StatusCode::OK).await?;
        Ok(Some(self.read_json(action, response).await?))
    }
}

#[async_trait]
impl ControlPlaneApi for Client {
    async fn create_cluster(
        &self,
        request: &CreateClusterRequest,
    ) -> Result<CreatedResponse, Error> {
        debug!(self.log, "creating cluster"; "name" => &request.name);
        let response = self
            .send(
                "cluster create",
                Method::POST,
                CLUSTER_COLLECTION,
                Some(request),
                StatusCode::CREATED,
            )
            .await?;
        self.read_json("cluster create", response).await
    }

    async fn get_cluster(
        &self,
        id: &str,
    ) -> Result<Option<ClusterInfo>, Error> {
        debug!(self.log, "reading cluster"; "cluster_id" => id);
        self.fetch("cluster read", &format!("{CLUSTER_COLLECTION}/{id}")).await
    }

    async fn update_cluster_plan(
        &self,
        id: &str,
        plan: &ClusterPlan,
    ) -> Result<(), Error> {
        debug!(self.log, "submitting cluster plan"; "cluster_id" => id);
        self.send(
            "cluster plan update",
            Method::POST,
            &format!("{CLUSTER_COLLECTION}/{id}/plan"),
            Some(plan),
            StatusCode::ACCEPTED,
        )
        .await?;
        Ok(())
    }

    async fn update_cluster_metadata(
        &self,
        id: &str,
        request: &UpdateMetadataRequest,
    ) -> Result<(), Error> {
        debug!(
            self.log, "renaming cluster";
            "cluster_id" => id,
            "name" => &request.name,
        );
        self.send(
            "cluster metadata update",
            Method::POST,
            &format!("{CLUSTER_COLLECTION}/{id}/metadata"),
            Some(request),
            StatusCode::OK,
        )
        .await?;
        Ok(())
    }

    async fn cluster_plan_activity(
        &self,
        id: &str,
    ) -> Result<PlanActivityRecord<ClusterPlan>, Error> {
        debug!(self.log, "fetching cluster plan activity"; "cluster_id" => id);
        let response = self
            .send::<()>(
                "cluster plan activity",
                Method::GET,
                &format!("{CLUSTER_COLLECTION}/{id}/plan/activity"),
                None,
                StatusCode::OK,
            )
            .await?;
        self.read_json("cluster plan activity", response).await
    }

    async fn shutdown_cluster(&self, id: &str) -> Result<(), Error> {
        debug!(self.log, "shutting down cluster"; "cluster_id" => id);
        self.send::<()>(
            "cluster shutdown",
            Method::POST,
            &format!("{CLUSTER_COLLECTION}/{id}/_shutdown"),
            None,
            StatusCode::ACCEPTED,
        )
        .await?;
        Ok(())
    }

    async fn delete_cluster(&self, id: &str) -> Result<(), Error> {
        debug!(self.log, "deleting cluster"; "cluster_id" => id);
        self.send::<()>(
            "cluster delete",
            Method::DELETE,
            &format!("{CLUSTER_COLLECTION}/{id}"),
            None,
            StatusCode::OK,
        )
        .await?;
        Ok(())
    }

    async fn create_dashboard(
        &self,
        request: &CreateDashboardRequest,
    ) -> Result<CreatedResponse, Error> {
        debug!(
            self.log, "creating dashboard";
            "name" => &request.name,
            "cluster_id" => &request.cluster_id,
        );
        let response = self
            .send(
                "dashboard create",
                Method::POST,
                DASHBOARD_COLLECTION,
                Some(request),
                StatusCode::CREATED,
            )
            .await?;
        self.read_json("dashboard create", response).await
    }

    async fn get_dashboard(
        &self,
        id: &str,
    ) -> Result<Option<DashboardInfo>, Error> {
        debug!(self.log, "reading dashboard"; "dashboard_id" => id);
        self.fetch("dashboard read", &format!("{DASHBOARD_COLLECTION}/{id}"))
            .await
    }

    async fn update_dashboard_plan(
        &self,
        id: &str,
        plan: &DashboardPlan,
    ) -> Result<(), Error> {
        debug!(self.log, "submitting dashboard plan"; "dashboard_id" => id);
        self.send(
            "dashboard plan update",
            Method::POST,
            &format!("{DASHBOARD_COLLECTION}/{id}/plan"),
            Some(plan),
            StatusCode::ACCEPTED,
        )
        .await?;
        Ok(())
    }

    async fn update_dashboard_metadata(
        &self,
        id: &str,
        request: &UpdateMetadataRequest,
    ) -> Result<(), Error> {
        debug!(
            self.log, "renaming dashboard";
            "dashboard_id" => id,
            "name" => &request.name,
        );
        self.send(
            "dashboard metadata update",
            Method::POST,
            &format!("{DASHBOARD_COLLECTION}/{id}/metadata"),
            Some(request),
            StatusCode::OK,
        )
        .await?;
        Ok(())
    }

    async fn dashboard_plan_activity(
        &self,
        id: &str,
    ) -> Result<PlanActivityRecord<DashboardPlan>, Error> {
        debug!(
            self.log, "fetching dashboard plan activity";
            "dashboard_id" => id,
        );
        let response = self
            .send::<()>(
                "dashboard plan activity",
                Method::GET,
                &format!("{DASHBOARD_COLLECTION}/{id}/plan/activity"),
                None,
                StatusCode::OK,
            )
            .await?;
        self.read_json("dashboard plan activity", response).await
    }

    async fn shutdown_dashboard(&self, id: &str) -> Result<(), Error> {
        debug!(self.log, "shutting down dashboard"; "dashboard_id" => id);
        self.send::<()>(
            "dashboard shutdown",
            Method::POST,
            &format!("{DASHBOARD_COLLECTION}/{id}/_shutdown"),
            None,
            StatusCode::ACCEPTED,
        )
        .await?;
        Ok(())
    }

    async fn delete_dashboard(&self, id: &str) -> Result<(), Error> {
        debug!(self.log, "deleting dashboard"; "dashboard_id" => id);
        self.send::<()>(
            "dashboard delete",
            Method::DELETE,
            &format!("{DASHBOARD_COLLECTION}/{id}"),
            None,
            StatusCode::OK,
        )
        .await?;
        Ok(())
    }
}

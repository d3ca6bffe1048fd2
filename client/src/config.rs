// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Interfaces for parsing configuration files and working with a deployment
//! tool configuration.

use camino::Utf8Path;
use camino::Utf8PathBuf;
use dropshot::ConfigLogging;
use serde::Deserialize;
use serde::Serialize;
use slog_error_chain::SlogInlineError;
use std::time::Duration;
use thiserror::Error;

/// Configuration for a deployment tool run.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Config {
    /// Control plane endpoint and credentials.
    pub control_plane: ControlPlaneConfig,
    /// Server-wide logging configuration.
    pub log: ConfigLogging,
}

impl Config {
    /// Load a `Config` from the given TOML file.
    pub fn from_file<P: AsRef<Utf8Path>>(path: P) -> Result<Self, LoadError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|err| LoadError::Io { path: path.into(), err })?;
        let config = toml::from_str(&contents)
            .map_err(|err| LoadError::Parse { path: path.into(), err })?;
        Ok(config)
    }
}

/// How to reach and authenticate to the cluster control plane.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct ControlPlaneConfig {
    /// Base URL of the control plane API.
    pub url: String,
    /// Username presented to the control plane.
    pub username: String,
    /// Password presented to the control plane.
    pub password: String,
    /// Which flavor of control plane this is; determines the
    /// authentication scheme.
    #[serde(default)]
    pub kind: DeploymentKind,
    /// Skip TLS certificate verification. Self-managed control planes
    /// commonly run with self-signed certificates.
    #[serde(default)]
    pub insecure: bool,
    /// Upper bound, in seconds, on each wait for a resource to converge.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl ControlPlaneConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Flavor of control plane deployment.
///
/// A self-managed control plane accepts HTTP basic auth on every request; the
/// hosted service requires exchanging the credentials for a session token
/// first and presenting that token as a bearer credential.
#[derive(
    Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq, Serialize,
)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentKind {
    #[default]
    OnPrem,
    Hosted,
}

fn default_timeout_secs() -> u64 {
    3600
}

#[derive(Debug, Error, SlogInlineError)]
pub enum LoadError {
    #[error("failed to read config file {path}")]
    Io {
        path: Utf8PathBuf,
        #[source]
        err: std::io::Error,
    },
    #[error("failed to parse config file {path}")]
    Parse {
        path: Utf8PathBuf,
        #[source]
        err: toml::de::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_full_config() {
        let config: Config = toml::from_str(
            r#"
            [control_plane]
            url = "https://control-plane.example.com:12443"
            username = "admin"
            password = "hunter2"
            kind = "hosted"
            insecure = true
            timeout_secs = 900

            [log]
            mode = "stderr-terminal"
            level = "info"
            "#,
        )
        .unwrap();
        assert_eq!(
            config.control_plane,
            ControlPlaneConfig {
                url: "https://control-plane.example.com:12443".to_string(),
                username: "admin".to_string(),
                password: "hunter2".to_string(),
                kind: DeploymentKind::Hosted,
                insecure: true,
                timeout_secs: 900,
            }
        );
        assert_eq!(config.control_plane.timeout(), Duration::from_secs(900));
    }

    #[test]
    fn optional_fields_have_defaults() {
        let config: Config = toml::from_str(
            r#"
            [control_plane]
            url = "https://localhost:12443"
            username = "admin"
            password = "hunter2"

            [log]
            mode = "stderr-terminal"
            level = "debug"
            "#,
        )
        .unwrap();
        assert_eq!(config.control_plane.kind, DeploymentKind::OnPrem);
        assert!(!config.control_plane.insecure);
        assert_eq!(config.control_plane.timeout_secs, 3600);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = Config::from_file(Utf8Path::new("/nonexistent/searchctl.toml"))
            .unwrap_err();
        assert!(matches!(err, LoadError::Io { .. }));
    }
}

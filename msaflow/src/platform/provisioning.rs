//! Shared-volume provisioning contract and its HTTP client.

use crate::config::ProvisioningConfig;
use crate::errors::{ConfigurationError, MsaflowError, ProvisioningError};
use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Credential identifying the current platform run.
#[derive(Clone, PartialEq, Eq)]
pub struct ExecutionToken(String);

impl ExecutionToken {
    /// Wraps a raw token.
    ///
    /// # Errors
    ///
    /// Returns an error if the token is missing, empty or only whitespace.
    /// A usable token is kept exactly as given.
    pub fn new(raw: Option<&str>) -> Result<Self, ConfigurationError> {
        match raw {
            Some(token) if !token.trim().is_empty() => Ok(Self(token.to_string())),
            _ => Err(ConfigurationError::missing_token()),
        }
    }

    /// The raw token.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ExecutionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ExecutionToken(***)")
    }
}

/// Opaque name of a provisioned shared volume.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VolumeHandle(String);

impl VolumeHandle {
    /// Wraps a volume name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The volume name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VolumeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Body of the provisioning request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisionRequest {
    /// Requested size in GiB.
    pub storage_gib: u32,
}

/// Allocates shared volumes.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProvisioningClient: Send + Sync {
    /// Requests one fresh volume.
    async fn provision(
        &self,
        token: &ExecutionToken,
        request: &ProvisionRequest,
    ) -> Result<VolumeHandle, ProvisioningError>;
}

/// Provisioning over HTTP: `POST <endpoint>` with a JSON body, volume name in `"name"`.
#[derive(Debug, Clone)]
pub struct HttpProvisioningClient {
    client: reqwest::Client,
    endpoint: String,
    auth_scheme: String,
}

impl HttpProvisioningClient {
    /// Creates a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an unusable timeout, or a transport
    /// error if the HTTP client cannot be built.
    pub fn new(config: &ProvisioningConfig) -> Result<Self, MsaflowError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout()?)
            .build()
            .map_err(|err| ProvisioningError::Transport(err.to_string()))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            auth_scheme: config.auth_scheme.clone(),
        })
    }

    /// The endpoint requests are sent to.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl ProvisioningClient for HttpProvisioningClient {
    async fn provision(
        &self,
        token: &ExecutionToken,
        request: &ProvisionRequest,
    ) -> Result<VolumeHandle, ProvisioningError> {
        let response = self
            .client
            .post(&self.endpoint)
            .header(AUTHORIZATION, format!("{} {}", self.auth_scheme, token.as_str()))
            .json(request)
            .send()
            .await
            .map_err(|err| ProvisioningError::Transport(err.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|err| ProvisioningError::Transport(err.to_string()))?;

        if !status.is_success() {
            return Err(ProvisioningError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let value: serde_json::Value = serde_json::from_str(&body)
            .map_err(|err| ProvisioningError::MalformedResponse(err.to_string()))?;

        value
            .get("name")
            .and_then(serde_json::Value::as_str)
            .map(VolumeHandle::new)
            .ok_or_else(|| {
                ProvisioningError::MalformedResponse(format!("no string \"name\" field in {body}"))
            })
    }
}

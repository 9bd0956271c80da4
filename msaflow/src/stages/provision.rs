//! Storage provisioner stage.

use crate::config::ProvisioningConfig;
use crate::errors::MsaflowError;
use crate::platform::{
    ExecutionToken, HttpProvisioningClient, ProvisionRequest, ProvisioningClient, VolumeHandle,
};
use std::sync::Arc;
use tracing::info;

/// Requests a fresh shared volume for the run.
#[derive(Clone)]
pub struct StorageProvisioner {
    client: Arc<dyn ProvisioningClient>,
    storage_gib: u32,
}

impl StorageProvisioner {
    /// Creates a provisioner over any client.
    #[must_use]
    pub fn new(client: Arc<dyn ProvisioningClient>, storage_gib: u32) -> Self {
        Self {
            client,
            storage_gib,
        }
    }

    /// Creates a provisioner talking HTTP to the configured endpoint.
    pub fn from_config(config: &ProvisioningConfig) -> Result<Self, MsaflowError> {
        let client = HttpProvisioningClient::new(config)?;
        Ok(Self::new(Arc::new(client), config.storage_gib))
    }

    /// Provisions one volume.
    ///
    /// The token is checked before anything else: a missing or blank token
    /// fails with a configuration error and no request is made.
    pub async fn provision(&self, token: Option<&str>) -> Result<VolumeHandle, MsaflowError> {
        let token = ExecutionToken::new(token)?;

        info!(storage_gib = self.storage_gib, "Provisioning shared storage volume");
        let volume = self
            .client
            .provision(
                &token,
                &ProvisionRequest {
                    storage_gib: self.storage_gib,
                },
            )
            .await?;
        info!(volume = %volume, "Provisioned shared storage volume");

        Ok(volume)
    }
}

impl std::fmt::Debug for StorageProvisioner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageProvisioner")
            .field("storage_gib", &self.storage_gib)
            .finish_non_exhaustive()
    }
}

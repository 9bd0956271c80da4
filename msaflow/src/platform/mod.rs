//! Contracts with the managed execution platform.
//!
//! Each external collaborator sits behind a trait with a default implementation:
//! - [`ProvisioningClient`]: shared-volume allocation over HTTP
//! - [`ExecutionNameResolver`]: the human-readable run name
//! - [`RemoteStore`]: log upload

mod execution;
mod provisioning;
mod remote;

pub use execution::{EnvExecutionName, ExecutionNameResolver, FixedExecutionName};
pub use provisioning::{
    ExecutionToken, HttpProvisioningClient, ProvisionRequest, ProvisioningClient, VolumeHandle,
};
pub use remote::{
    remote_store_from_config, HttpRemoteStore, LocalMirrorStore, RemotePath, RemoteStore,
};

#[cfg(test)]
pub use execution::MockExecutionNameResolver;
#[cfg(test)]
pub use provisioning::MockProvisioningClient;
#[cfg(test)]
pub use remote::MockRemoteStore;

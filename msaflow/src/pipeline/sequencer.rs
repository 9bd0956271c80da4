//! Linear provision -> stage -> launch sequencer.

use crate::config::RuntimeConfig;
use crate::core::StageResult;
use crate::errors::MsaflowError;
use crate::events::{EventSink, NoOpEventSink, STAGE_COMPLETED, STAGE_FAILED, STAGE_STARTED};
use crate::observability::SpanTimer;
use crate::params::{FlagRule, NextflowFlagRule, ParameterSet};
use crate::platform::{
    remote_store_from_config, EnvExecutionName, ExecutionNameResolver, HttpProvisioningClient,
    ProvisioningClient, RemoteStore, VolumeHandle,
};
use crate::stages::{
    CommandInvocation, DirectoryStager, LaunchReport, PipelineLauncher, StagingReport,
    StorageProvisioner,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

/// Name of the provisioning stage.
pub const PROVISION_STAGE: &str = "provision";
/// Name of the staging stage.
pub const STAGE_STAGE: &str = "stage";
/// Name of the launch stage.
pub const LAUNCH_STAGE: &str = "launch";

/// Everything a successful run produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// Identifier of this run, for correlating logs.
    pub run_id: Uuid,
    /// Per-stage records, in execution order.
    pub stages: Vec<StageResult>,
    /// The provisioned volume.
    pub volume: VolumeHandle,
    /// Staging counters.
    pub staging: StagingReport,
    /// Launch summary.
    pub launch: LaunchReport,
}

/// Runs the three stages in order, stopping at the first failure.
///
/// Collaborators default to the ones named by the configuration and can be
/// replaced with the `with_*` builders.
pub struct WorkflowSequencer {
    config: Arc<RuntimeConfig>,
    provisioning_client: Arc<dyn ProvisioningClient>,
    remote_store: Arc<dyn RemoteStore>,
    resolver: Arc<dyn ExecutionNameResolver>,
    flag_rule: Arc<dyn FlagRule>,
    events: Arc<dyn EventSink>,
}

impl WorkflowSequencer {
    /// Creates a sequencer with the default collaborators for `config`.
    pub fn from_config(config: RuntimeConfig) -> Result<Self, MsaflowError> {
        let provisioning_client = Arc::new(HttpProvisioningClient::new(&config.provisioning)?);
        let remote_store = remote_store_from_config(&config.logs.store)?;
        let resolver = Arc::new(EnvExecutionName::new(config.logs.execution_name_var.clone()));

        Ok(Self {
            config: Arc::new(config),
            provisioning_client,
            remote_store,
            resolver,
            flag_rule: Arc::new(NextflowFlagRule),
            events: Arc::new(NoOpEventSink),
        })
    }

    /// Replaces the provisioning client.
    #[must_use]
    pub fn with_provisioning_client(mut self, client: Arc<dyn ProvisioningClient>) -> Self {
        self.provisioning_client = client;
        self
    }

    /// Replaces the log upload store.
    #[must_use]
    pub fn with_remote_store(mut self, store: Arc<dyn RemoteStore>) -> Self {
        self.remote_store = store;
        self
    }

    /// Replaces the execution-name resolver.
    #[must_use]
    pub fn with_execution_name_resolver(mut self, resolver: Arc<dyn ExecutionNameResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    /// Replaces the flag rule.
    #[must_use]
    pub fn with_flag_rule(mut self, rule: Arc<dyn FlagRule>) -> Self {
        self.flag_rule = rule;
        self
    }

    /// Sets the event sink.
    #[must_use]
    pub fn with_event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    /// The configuration in use.
    #[must_use]
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Provisions the shared volume.
    pub async fn provision(&self) -> Result<VolumeHandle, MsaflowError> {
        StorageProvisioner::new(
            self.provisioning_client.clone(),
            self.config.provisioning.storage_gib,
        )
        .provision(self.config.execution_token.as_deref())
        .await
    }

    /// Stages the working tree into the shared mount.
    pub async fn stage(&self) -> Result<StagingReport, MsaflowError> {
        Ok(DirectoryStager::from_config(&self.config.staging).stage().await?)
    }

    /// Launches the pipeline on an already provisioned and staged volume.
    pub async fn launch(
        &self,
        volume: &VolumeHandle,
        params: &ParameterSet,
    ) -> Result<LaunchReport, MsaflowError> {
        params.validate()?;
        self.launcher()?.launch(volume, params).await
    }

    /// The engine invocation a launch would run, without running it.
    pub fn command(
        &self,
        volume: &VolumeHandle,
        params: &ParameterSet,
    ) -> Result<CommandInvocation, MsaflowError> {
        params.validate()?;
        Ok(self.launcher()?.invocation(volume, params))
    }

    /// Runs provision, stage and launch.
    ///
    /// Parameters are validated and the launcher is built before any side
    /// effect. The first failing stage ends the run.
    pub async fn run(&self, params: &ParameterSet) -> Result<RunReport, MsaflowError> {
        params.validate()?;
        let launcher = self.launcher()?;

        let run_id = Uuid::new_v4();
        info!(run_id = %run_id, "Starting workflow run");
        let mut stages = Vec::with_capacity(3);

        let volume = self
            .record(PROVISION_STAGE, &mut stages, self.provision(), |volume| {
                json!({ "volume": volume })
            })
            .await?;

        let staging = self
            .record(STAGE_STAGE, &mut stages, self.stage(), |report| json!(report))
            .await?;

        let launch = self
            .record(LAUNCH_STAGE, &mut stages, launcher.launch(&volume, params), |report| {
                json!({
                    "state": report.state,
                    "exit_code": report.exit_code,
                    "epilogue": report.epilogue,
                })
            })
            .await?;

        info!(run_id = %run_id, "Workflow run finished");
        Ok(RunReport {
            run_id,
            stages,
            volume,
            staging,
            launch,
        })
    }

    fn launcher(&self) -> Result<PipelineLauncher, MsaflowError> {
        Ok(PipelineLauncher::from_config(
            &self.config,
            self.resolver.clone(),
            self.remote_store.clone(),
        )?
        .with_flag_rule(self.flag_rule.clone())
        .with_event_sink(self.events.clone()))
    }

    /// Runs one stage, emitting its events. Successful stages are appended
    /// to `stages`; a failed one is reported only through its event.
    async fn record<T, Fut, D>(
        &self,
        name: &str,
        stages: &mut Vec<StageResult>,
        work: Fut,
        describe: D,
    ) -> Result<T, MsaflowError>
    where
        Fut: Future<Output = Result<T, MsaflowError>>,
        D: FnOnce(&T) -> serde_json::Value,
    {
        let started_at = Utc::now();
        let timer = SpanTimer::start(name);
        self.events
            .emit(STAGE_STARTED, Some(json!({ "stage": name })))
            .await;

        match work.await {
            Ok(value) => {
                let duration_ms = timer.finish();
                let data: HashMap<String, serde_json::Value> = match describe(&value) {
                    serde_json::Value::Object(map) => map.into_iter().collect(),
                    other => HashMap::from([("value".to_string(), other)]),
                };
                self.events
                    .emit(
                        STAGE_COMPLETED,
                        Some(json!({ "stage": name, "duration_ms": duration_ms })),
                    )
                    .await;
                stages.push(StageResult::completed(name, started_at, data));
                Ok(value)
            }
            Err(err) => {
                let duration_ms = timer.finish();
                error!(stage = name, error = %err, "Stage failed");
                let result = StageResult::failed(name, started_at, err.to_string());
                self.events
                    .emit(
                        STAGE_FAILED,
                        Some(json!({
                            "stage": name,
                            "duration_ms": duration_ms,
                            "error": err.to_dict(),
                            "result": result,
                        })),
                    )
                    .await;
                Err(err)
            }
        }
    }
}

impl std::fmt::Debug for WorkflowSequencer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowSequencer")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

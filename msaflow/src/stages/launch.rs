//! Pipeline launcher stage.
//!
//! Builds the engine command line from the launch configuration and the
//! parameter set, runs it in the shared mount, and always runs the log-upload
//! epilogue afterwards, whether the subprocess succeeded, failed or never
//! started.

use super::epilogue::{run_with_epilogue, EpilogueOutcome, LogUploadEpilogue};
use crate::config::{LaunchConfig, RuntimeConfig};
use crate::core::LaunchState;
use crate::errors::{LaunchError, MsaflowError, UploadError};
use crate::events::{EventSink, NoOpEventSink, EPILOGUE_FINISHED};
use crate::observability::SpanTimer;
use crate::params::{FlagRule, NextflowFlagRule, ParameterSet};
use crate::platform::{ExecutionNameResolver, RemoteStore, VolumeHandle};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// A fully resolved engine invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandInvocation {
    program: PathBuf,
    args: Vec<String>,
    env: BTreeMap<String, String>,
    inherit_env: bool,
    working_dir: PathBuf,
}

impl CommandInvocation {
    /// Builds the invocation for one pipeline run.
    ///
    /// Arguments are `run <shared>/<entry> -work-dir <shared> -profile <p>
    /// -c <config>` followed by the parameter flags in schema order.
    #[must_use]
    pub fn for_pipeline(
        config: &LaunchConfig,
        shared_dir: &Path,
        volume: &VolumeHandle,
        params: &ParameterSet,
        rule: &dyn FlagRule,
    ) -> Self {
        let mut args = vec![
            "run".to_string(),
            shared_dir.join(&config.entry_file).display().to_string(),
            "-work-dir".to_string(),
            shared_dir.display().to_string(),
            "-profile".to_string(),
            config.profile.clone(),
            "-c".to_string(),
            config.config_file.clone(),
        ];
        args.extend(params.to_flags(rule));

        let mut env = BTreeMap::new();
        env.insert("NXF_HOME".to_string(), config.nxf_home.clone());
        env.insert("NXF_OPTS".to_string(), config.nxf_opts.clone());
        env.insert("K8S_STORAGE_CLAIM_NAME".to_string(), volume.as_str().to_string());
        if config.disable_check_latest {
            env.insert("NXF_DISABLE_CHECK_LATEST".to_string(), "true".to_string());
        }

        Self {
            program: config.nextflow_binary.clone(),
            args,
            env,
            inherit_env: config.inherit_env,
            working_dir: shared_dir.to_path_buf(),
        }
    }

    /// Executable path.
    #[must_use]
    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Arguments after the program.
    #[must_use]
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Variables set on top of (or instead of) the inherited environment.
    #[must_use]
    pub fn env(&self) -> &BTreeMap<String, String> {
        &self.env
    }

    /// Directory the subprocess runs in.
    #[must_use]
    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    /// Space-joined command line, for logs.
    #[must_use]
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.display().to_string())
            .chain(self.args.iter().cloned())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// A ready-to-spawn command. Output streams pass through to ours.
    #[must_use]
    pub fn to_command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .current_dir(&self.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());
        if !self.inherit_env {
            command.env_clear();
        }
        command.envs(&self.env);
        command
    }
}

/// Summary of a successful launch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LaunchReport {
    /// Final state, always `Succeeded` in a returned report.
    pub state: LaunchState,
    /// Exit code of the engine.
    pub exit_code: Option<i32>,
    /// The command line that ran.
    pub command_line: String,
    /// What happened to the log.
    pub epilogue: EpilogueOutcome,
    /// Wall time of subprocess plus epilogue.
    pub duration_ms: f64,
}

/// Runs the engine in the shared mount, then uploads its log.
pub struct PipelineLauncher {
    config: LaunchConfig,
    shared_dir: PathBuf,
    flag_rule: Arc<dyn FlagRule>,
    epilogue: LogUploadEpilogue,
    events: Arc<dyn EventSink>,
}

impl PipelineLauncher {
    /// Creates a launcher.
    #[must_use]
    pub fn new(
        config: LaunchConfig,
        shared_dir: impl Into<PathBuf>,
        flag_rule: Arc<dyn FlagRule>,
        epilogue: LogUploadEpilogue,
    ) -> Self {
        Self {
            config,
            shared_dir: shared_dir.into(),
            flag_rule,
            epilogue,
            events: Arc::new(NoOpEventSink),
        }
    }

    /// Creates a launcher from the runtime configuration with the default
    /// flag rule. The engine log is looked for inside the shared dir.
    pub fn from_config(
        config: &RuntimeConfig,
        resolver: Arc<dyn ExecutionNameResolver>,
        store: Arc<dyn RemoteStore>,
    ) -> Result<Self, UploadError> {
        let shared_dir = config.staging.shared_dir.clone();
        let epilogue = LogUploadEpilogue::from_config(
            &config.logs,
            shared_dir.join(&config.launch.log_file_name),
            resolver,
            store,
        )?;
        Ok(Self::new(
            config.launch.clone(),
            shared_dir,
            Arc::new(NextflowFlagRule),
            epilogue,
        ))
    }

    /// Replaces the flag rule.
    #[must_use]
    pub fn with_flag_rule(mut self, rule: Arc<dyn FlagRule>) -> Self {
        self.flag_rule = rule;
        self
    }

    /// Sets the sink that receives the epilogue event.
    #[must_use]
    pub fn with_event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    /// The invocation `launch` would run.
    #[must_use]
    pub fn invocation(&self, volume: &VolumeHandle, params: &ParameterSet) -> CommandInvocation {
        CommandInvocation::for_pipeline(
            &self.config,
            &self.shared_dir,
            volume,
            params,
            self.flag_rule.as_ref(),
        )
    }

    /// Runs the pipeline to completion.
    ///
    /// Blocks until the engine exits. The epilogue runs exactly once on every
    /// path; see [`run_with_epilogue`] for how the two outcomes combine.
    pub async fn launch(
        &self,
        volume: &VolumeHandle,
        params: &ParameterSet,
    ) -> Result<LaunchReport, MsaflowError> {
        let invocation = self.invocation(volume, params);
        let command_line = invocation.command_line();
        info!(command = %command_line, "Launching Nextflow Runtime");

        let timer = SpanTimer::start("launch");
        let ((state, exit_code), epilogue) =
            run_with_epilogue(execute(&invocation), || self.close()).await?;

        Ok(LaunchReport {
            state,
            exit_code,
            command_line,
            epilogue,
            duration_ms: timer.finish(),
        })
    }

    async fn close(&self) -> Result<EpilogueOutcome, UploadError> {
        let result = self.epilogue.run().await;
        let data = match &result {
            Ok(outcome) => serde_json::to_value(outcome).ok(),
            Err(err) => {
                warn!(error = %err, "Log upload failed");
                Some(serde_json::json!({ "outcome": "failed", "error": err.to_string() }))
            }
        };
        self.events.emit(EPILOGUE_FINISHED, data).await;
        result
    }
}

impl std::fmt::Debug for PipelineLauncher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineLauncher")
            .field("config", &self.config)
            .field("shared_dir", &self.shared_dir)
            .field("epilogue", &self.epilogue)
            .finish_non_exhaustive()
    }
}

async fn execute(invocation: &CommandInvocation) -> Result<(LaunchState, Option<i32>), LaunchError> {
    let mut state = LaunchState::NotStarted;

    let mut child = match invocation.to_command().spawn() {
        Ok(child) => child,
        Err(source) => {
            advance(&mut state, LaunchState::Failed);
            return Err(LaunchError::Spawn {
                program: invocation.program().to_path_buf(),
                source,
            });
        }
    };
    advance(&mut state, LaunchState::Running);

    let status = match child.wait().await {
        Ok(status) => status,
        Err(source) => {
            advance(&mut state, LaunchState::Failed);
            return Err(LaunchError::Wait { source });
        }
    };

    if status.success() {
        advance(&mut state, LaunchState::Succeeded);
        Ok((state, status.code()))
    } else {
        advance(&mut state, LaunchState::Failed);
        Err(LaunchError::NonZeroExit {
            code: status.code(),
        })
    }
}

fn advance(state: &mut LaunchState, next: LaunchState) {
    debug_assert!(
        state.can_transition_to(next),
        "illegal launch transition {state} -> {next}"
    );
    debug!(from = %state, to = %next, "Launch state");
    *state = next;
}

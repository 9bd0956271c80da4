//! Runtime configuration.
//!
//! A [`RuntimeConfig`] is built once at process start, from defaults, an
//! optional JSON file and the execution environment, and is then shared
//! read-only by every stage.

use crate::errors::{ConfigurationError, MsaflowError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable carrying the platform execution token.
pub const EXECUTION_TOKEN_VAR: &str = "FLYTE_INTERNAL_EXECUTION_ID";
/// Environment variable naming an optional JSON configuration file.
pub const CONFIG_FILE_VAR: &str = "MSAFLOW_CONFIG";

/// Complete runtime configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Execution token. Never read from the config file.
    #[serde(skip)]
    pub execution_token: Option<String>,
    /// Storage provisioning settings.
    #[serde(default)]
    pub provisioning: ProvisioningConfig,
    /// Working-tree staging settings.
    #[serde(default)]
    pub staging: StagingConfig,
    /// Pipeline subprocess settings.
    #[serde(default)]
    pub launch: LaunchConfig,
    /// Log upload settings.
    #[serde(default)]
    pub logs: LogUploadConfig,
}

impl RuntimeConfig {
    /// Creates a configuration with defaults and no token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from the process environment.
    ///
    /// Defaults are overlaid by the JSON file named in `MSAFLOW_CONFIG`, if set;
    /// the token is read from `FLYTE_INTERNAL_EXECUTION_ID`.
    pub fn from_env() -> Result<Self, MsaflowError> {
        let config = match std::env::var_os(CONFIG_FILE_VAR) {
            Some(path) => Self::from_json_file(Path::new(&path))?,
            None => Self::default(),
        };
        Ok(config.with_execution_token(std::env::var(EXECUTION_TOKEN_VAR).ok()))
    }

    /// Loads configuration from a JSON file. Missing sections take defaults.
    pub fn from_json_file(path: &Path) -> Result<Self, MsaflowError> {
        let raw = std::fs::read_to_string(path).map_err(|err| {
            ConfigurationError::new(format!("cannot read config {}: {err}", path.display()))
        })?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks values serde cannot reject on its own.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        self.provisioning.timeout()?;
        self.logs.store.timeout()?;
        Ok(())
    }

    /// Sets the execution token.
    #[must_use]
    pub fn with_execution_token(mut self, token: Option<String>) -> Self {
        self.execution_token = token;
        self
    }

    /// Sets the source and destination of the staging copy.
    #[must_use]
    pub fn with_staging_paths(mut self, source_root: impl Into<PathBuf>, shared_dir: impl Into<PathBuf>) -> Self {
        self.staging.source_root = source_root.into();
        self.staging.shared_dir = shared_dir.into();
        self
    }
}

/// Configuration for the provisioning request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvisioningConfig {
    /// Full URL of the provisioning endpoint.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Scheme placed before the token in the `Authorization` header.
    #[serde(default = "default_auth_scheme")]
    pub auth_scheme: String,
    /// Requested volume size.
    #[serde(default = "default_storage_gib")]
    pub storage_gib: u32,
    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: f64,
}

fn default_endpoint() -> String {
    "http://nf-dispatcher-service.flyte.svc.cluster.local/provision-storage".to_string()
}

fn default_auth_scheme() -> String {
    "Latch-Execution-Token".to_string()
}

fn default_storage_gib() -> u32 {
    100
}

fn default_timeout() -> f64 {
    60.0
}

impl Default for ProvisioningConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            auth_scheme: default_auth_scheme(),
            storage_gib: default_storage_gib(),
            timeout_seconds: default_timeout(),
        }
    }
}

impl ProvisioningConfig {
    /// Sets the endpoint.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Gets timeout as Duration.
    pub fn timeout(&self) -> Result<Duration, ConfigurationError> {
        timeout_from_secs("provisioning.timeout_seconds", self.timeout_seconds)
    }
}

/// Converts a timeout in seconds, rejecting zero, negative, NaN and
/// overflowing values.
pub fn timeout_from_secs(field: &str, seconds: f64) -> Result<Duration, ConfigurationError> {
    Duration::try_from_secs_f64(seconds)
        .ok()
        .filter(|timeout| !timeout.is_zero())
        .ok_or_else(|| {
            ConfigurationError::new(format!(
                "{field} must be a positive number of seconds, got {seconds}"
            ))
        })
}

/// Configuration for copying the working tree into the shared mount.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StagingConfig {
    /// Tree to copy.
    #[serde(default = "default_source_root")]
    pub source_root: PathBuf,
    /// Shared mount the pipeline runs in.
    #[serde(default = "default_shared_dir")]
    pub shared_dir: PathBuf,
    /// Entry names skipped at every depth.
    #[serde(default = "default_denylist")]
    pub denylist: Vec<String>,
}

fn default_source_root() -> PathBuf {
    PathBuf::from("/root")
}

fn default_shared_dir() -> PathBuf {
    PathBuf::from("/nf-workdir")
}

fn default_denylist() -> Vec<String> {
    [
        "latch",
        ".latch",
        "nextflow",
        ".nextflow",
        "work",
        "results",
        "miniconda",
        "anaconda3",
        "mambaforge",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

impl Default for StagingConfig {
    fn default() -> Self {
        Self {
            source_root: default_source_root(),
            shared_dir: default_shared_dir(),
            denylist: default_denylist(),
        }
    }
}

/// Configuration for the Nextflow subprocess.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LaunchConfig {
    /// Path of the pipeline engine executable.
    #[serde(default = "default_nextflow_binary")]
    pub nextflow_binary: PathBuf,
    /// Pipeline entry file, relative to the shared dir.
    #[serde(default = "default_entry_file")]
    pub entry_file: String,
    /// Value of `-profile`.
    #[serde(default = "default_profile")]
    pub profile: String,
    /// Value of `-c`.
    #[serde(default = "default_config_file")]
    pub config_file: String,
    /// `NXF_HOME` for the engine.
    #[serde(default = "default_nxf_home")]
    pub nxf_home: String,
    /// `NXF_OPTS` JVM sizing flags.
    #[serde(default = "default_nxf_opts")]
    pub nxf_opts: String,
    /// Sets `NXF_DISABLE_CHECK_LATEST`.
    #[serde(default = "default_true")]
    pub disable_check_latest: bool,
    /// Whether the subprocess inherits this process's environment.
    #[serde(default = "default_true")]
    pub inherit_env: bool,
    /// Name of the engine log inside the shared dir.
    #[serde(default = "default_log_file_name")]
    pub log_file_name: String,
}

fn default_nextflow_binary() -> PathBuf {
    PathBuf::from("/root/nextflow")
}

fn default_entry_file() -> String {
    "main.nf".to_string()
}

fn default_profile() -> String {
    "docker".to_string()
}

fn default_config_file() -> String {
    "latch.config".to_string()
}

fn default_nxf_home() -> String {
    "/root/.nextflow".to_string()
}

fn default_nxf_opts() -> String {
    "-Xms2048M -Xmx8G -XX:ActiveProcessorCount=4".to_string()
}

fn default_true() -> bool {
    true
}

fn default_log_file_name() -> String {
    ".nextflow.log".to_string()
}

impl Default for LaunchConfig {
    fn default() -> Self {
        Self {
            nextflow_binary: default_nextflow_binary(),
            entry_file: default_entry_file(),
            profile: default_profile(),
            config_file: default_config_file(),
            nxf_home: default_nxf_home(),
            nxf_opts: default_nxf_opts(),
            disable_check_latest: true,
            inherit_env: true,
            log_file_name: default_log_file_name(),
        }
    }
}

impl LaunchConfig {
    /// Sets the engine executable.
    #[must_use]
    pub fn with_nextflow_binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.nextflow_binary = binary.into();
        self
    }
}

/// Where uploaded logs go.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RemoteStoreConfig {
    /// Mirror remote paths under a local directory.
    LocalMirror {
        /// Directory standing in for the remote root.
        root: PathBuf,
    },
    /// `PUT` objects to an HTTP object store.
    Http {
        /// Base URL; the remote path is appended to it.
        base_url: String,
        /// Per-request timeout in seconds.
        #[serde(default = "default_timeout")]
        timeout_seconds: f64,
    },
}

impl RemoteStoreConfig {
    /// Request timeout of the HTTP store; `None` for the local mirror.
    pub fn timeout(&self) -> Result<Option<Duration>, ConfigurationError> {
        match self {
            Self::LocalMirror { .. } => Ok(None),
            Self::Http { timeout_seconds, .. } => {
                timeout_from_secs("logs.store.timeout_seconds", *timeout_seconds).map(Some)
            }
        }
    }
}

impl Default for RemoteStoreConfig {
    fn default() -> Self {
        Self::LocalMirror {
            root: PathBuf::from("/root/.msaflow/remote"),
        }
    }
}

/// Configuration for the log-upload epilogue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogUploadConfig {
    /// Remote directory logs are uploaded under.
    #[serde(default = "default_remote_root")]
    pub remote_root: String,
    /// File name of the uploaded log.
    #[serde(default = "default_remote_file_name")]
    pub remote_file_name: String,
    /// Environment variable holding the execution name.
    #[serde(default = "default_execution_name_var")]
    pub execution_name_var: String,
    /// Upload backend.
    #[serde(default)]
    pub store: RemoteStoreConfig,
}

fn default_remote_root() -> String {
    "latch:///your_log_dir/nf_nf_core_multiplesequencealign".to_string()
}

fn default_remote_file_name() -> String {
    "nextflow.log".to_string()
}

fn default_execution_name_var() -> String {
    "FLYTE_INTERNAL_EXECUTION_NAME".to_string()
}

impl Default for LogUploadConfig {
    fn default() -> Self {
        Self {
            remote_root: default_remote_root(),
            remote_file_name: default_remote_file_name(),
            execution_name_var: default_execution_name_var(),
            store: RemoteStoreConfig::default(),
        }
    }
}

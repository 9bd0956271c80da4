//! Error types for msaflow.
//!
//! Every fatal condition of a run maps onto one variant of [`MsaflowError`].
//! Skipped log uploads are not errors; they are reported as [`UploadWarning`].

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error;

/// The main error type for msaflow operations.
#[derive(Debug, Error)]
pub enum MsaflowError {
    /// Configuration was missing or invalid. Raised before any side effect.
    #[error("{0}")]
    Configuration(#[from] ConfigurationError),

    /// The shared volume could not be provisioned.
    #[error("{0}")]
    Provisioning(#[from] ProvisioningError),

    /// Copying the working tree into the shared mount failed.
    #[error("{0}")]
    Staging(#[from] StagingError),

    /// The pipeline subprocess failed to start or exited unsuccessfully.
    #[error("{0}")]
    Launch(#[from] LaunchError),

    /// The log upload failed after a successful launch.
    #[error("{0}")]
    Upload(#[from] UploadError),

    /// The launch failed and the log upload that followed failed as well.
    #[error("{launch} (log upload also failed: {upload})")]
    EpilogueAfterFailure {
        /// The original launch failure.
        launch: LaunchError,
        /// The upload failure raised by the epilogue.
        upload: UploadError,
    },

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl MsaflowError {
    /// Returns the launch failure carried by this error, if any.
    #[must_use]
    pub fn launch_error(&self) -> Option<&LaunchError> {
        match self {
            Self::Launch(err) | Self::EpilogueAfterFailure { launch: err, .. } => Some(err),
            _ => None,
        }
    }

    /// Short machine-readable kind, used in events and reports.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "configuration",
            Self::Provisioning(_) => "provisioning",
            Self::Staging(_) => "staging",
            Self::Launch(_) => "launch",
            Self::Upload(_) => "upload",
            Self::EpilogueAfterFailure { .. } => "launch_and_upload",
            Self::Serialization(_) => "serialization",
        }
    }

    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("kind".to_string(), serde_json::json!(self.kind()));
        map.insert("message".to_string(), serde_json::json!(self.to_string()));
        if let Self::EpilogueAfterFailure { upload, .. } = self {
            map.insert("upload_error".to_string(), serde_json::json!(upload.to_string()));
        }
        map
    }
}

impl From<serde_json::Error> for MsaflowError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Error raised when configuration or workflow inputs are unusable.
#[derive(Debug, Clone, Error)]
#[error("Configuration error: {message}")]
pub struct ConfigurationError {
    /// The error message.
    pub message: String,
}

impl ConfigurationError {
    /// Creates a new configuration error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// The execution token was absent or empty.
    #[must_use]
    pub fn missing_token() -> Self {
        Self::new("failed to get execution token")
    }

    /// A required workflow parameter has no value.
    #[must_use]
    pub fn missing_parameter(name: &str) -> Self {
        Self::new(format!("required parameter '{name}' has no value"))
    }

    /// A parameter name is not declared by the schema.
    #[must_use]
    pub fn unknown_parameter(name: &str) -> Self {
        Self::new(format!("unknown parameter '{name}'"))
    }
}

/// Errors raised by the storage provisioning call.
#[derive(Debug, Clone, Error)]
pub enum ProvisioningError {
    /// The provisioning service answered with a non-success status.
    #[error("Provisioning request failed with HTTP {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, as text.
        body: String,
    },

    /// The request never produced a response.
    #[error("Provisioning request failed: {0}")]
    Transport(String),

    /// The response did not carry a volume name.
    #[error("Malformed provisioning response: {0}")]
    MalformedResponse(String),
}

/// Error raised when the working tree cannot be staged.
#[derive(Debug, Error)]
#[error("Staging failed at {}: {source}", path.display())]
pub struct StagingError {
    /// The path being read or written when the failure occurred.
    pub path: PathBuf,
    /// The underlying filesystem error.
    #[source]
    pub source: std::io::Error,
}

impl StagingError {
    /// Creates a new staging error.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self {
            path: path.into(),
            source,
        }
    }
}

/// Errors raised by the pipeline subprocess.
#[derive(Debug, Error)]
pub enum LaunchError {
    /// The subprocess could not be started.
    #[error("Failed to start {}: {source}", program.display())]
    Spawn {
        /// The program that failed to start.
        program: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Waiting on the running subprocess failed.
    #[error("Failed waiting on the pipeline process: {source}")]
    Wait {
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The subprocess exited with a nonzero code, or was killed by a signal.
    #[error("Pipeline exited unsuccessfully ({})", describe_exit(*code))]
    NonZeroExit {
        /// Exit code, `None` when terminated by a signal.
        code: Option<i32>,
    },
}

fn describe_exit(code: Option<i32>) -> String {
    code.map_or_else(|| "terminated by signal".to_string(), |c| format!("exit code {c}"))
}

/// Errors raised while uploading the pipeline log.
#[derive(Debug, Error)]
pub enum UploadError {
    /// A remote path could not be parsed.
    #[error("Invalid remote path '{0}'")]
    InvalidPath(String),

    /// Reading the local file or writing the mirror failed.
    #[error("Upload IO error at {}: {source}", path.display())]
    Io {
        /// The file involved.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The object store answered with a non-success status.
    #[error("Upload to {remote} failed with HTTP {status}")]
    Status {
        /// The remote path being written.
        remote: String,
        /// HTTP status code.
        status: u16,
    },

    /// The request never produced a response.
    #[error("Upload request failed: {0}")]
    Transport(String),
}

/// Reasons a log upload was skipped. Never fatal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum UploadWarning {
    /// The subprocess did not leave a log file behind.
    #[error("no log file at {path}")]
    LogFileMissing {
        /// Where the log was expected.
        path: String,
    },

    /// Whether the log exists could not be determined.
    #[error("cannot check log file at {path}: {error}")]
    LogFileUnreadable {
        /// Where the log was expected.
        path: String,
        /// The underlying I/O failure.
        error: String,
    },

    /// The platform could not tell us the execution name.
    #[error("Skipping logs upload, failed to get execution name")]
    ExecutionNameUnavailable,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_token_message() {
        let err = MsaflowError::from(ConfigurationError::missing_token());
        assert_eq!(err.kind(), "configuration");
        assert!(err.to_string().contains("execution token"));
    }

    #[test]
    fn test_provisioning_status_display() {
        let err = ProvisioningError::Status {
            status: 500,
            body: "boom".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Provisioning request failed with HTTP 500: boom"
        );
    }

    #[test]
    fn test_nonzero_exit_display() {
        let err = LaunchError::NonZeroExit { code: Some(1) };
        assert!(err.to_string().contains("exit code 1"));

        let err = LaunchError::NonZeroExit { code: None };
        assert!(err.to_string().contains("signal"));
    }

    #[test]
    fn test_epilogue_after_failure_keeps_both() {
        let err = MsaflowError::EpilogueAfterFailure {
            launch: LaunchError::NonZeroExit { code: Some(1) },
            upload: UploadError::Transport("connection refused".to_string()),
        };

        let message = err.to_string();
        assert!(message.contains("exit code 1"));
        assert!(message.contains("connection refused"));
        assert!(err.launch_error().is_some());

        let dict = err.to_dict();
        assert_eq!(dict.get("kind").unwrap(), "launch_and_upload");
        assert!(dict.contains_key("upload_error"));
    }

    #[test]
    fn test_upload_warning_serialization() {
        let json = serde_json::to_value(UploadWarning::ExecutionNameUnavailable).unwrap();
        assert_eq!(json, serde_json::json!({"reason": "execution_name_unavailable"}));
    }
}

//! Log-upload epilogue run after the pipeline subprocess.

use crate::config::LogUploadConfig;
use crate::errors::{LaunchError, MsaflowError, UploadError, UploadWarning};
use crate::platform::{ExecutionNameResolver, RemotePath, RemoteStore};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What the epilogue did with the log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum EpilogueOutcome {
    /// The log was uploaded.
    Uploaded {
        /// Remote path written.
        remote: String,
        /// Bytes uploaded.
        bytes: u64,
    },
    /// The upload was skipped.
    Skipped {
        /// Why.
        warning: UploadWarning,
    },
}

/// Uploads the engine log to `<remote_root>/<execution name>/<file name>`.
#[derive(Clone)]
pub struct LogUploadEpilogue {
    log_file: PathBuf,
    remote_root: RemotePath,
    remote_file_name: String,
    resolver: Arc<dyn ExecutionNameResolver>,
    store: Arc<dyn RemoteStore>,
}

impl LogUploadEpilogue {
    /// Creates an epilogue.
    #[must_use]
    pub fn new(
        log_file: impl Into<PathBuf>,
        remote_root: RemotePath,
        remote_file_name: impl Into<String>,
        resolver: Arc<dyn ExecutionNameResolver>,
        store: Arc<dyn RemoteStore>,
    ) -> Self {
        Self {
            log_file: log_file.into(),
            remote_root,
            remote_file_name: remote_file_name.into(),
            resolver,
            store,
        }
    }

    /// Creates an epilogue from configuration.
    pub fn from_config(
        config: &LogUploadConfig,
        log_file: impl Into<PathBuf>,
        resolver: Arc<dyn ExecutionNameResolver>,
        store: Arc<dyn RemoteStore>,
    ) -> Result<Self, UploadError> {
        let remote_root = config.remote_root.parse()?;
        Ok(Self::new(
            log_file,
            remote_root,
            config.remote_file_name.clone(),
            resolver,
            store,
        ))
    }

    /// The local log file looked for.
    #[must_use]
    pub fn log_file(&self) -> &Path {
        &self.log_file
    }

    /// Remote destination for a given execution name.
    #[must_use]
    pub fn remote_path_for(&self, execution_name: &str) -> RemotePath {
        self.remote_root.join(execution_name).join(&self.remote_file_name)
    }

    /// Uploads the log if it exists and the execution name resolves.
    ///
    /// A missing or uncheckable log, or an unknown execution name, is a
    /// skip, not an error. Upload failures are returned as-is.
    pub async fn run(&self) -> Result<EpilogueOutcome, UploadError> {
        let path = self.log_file.display().to_string();
        match tokio::fs::try_exists(&self.log_file).await {
            Ok(true) => {}
            Ok(false) => {
                debug!(path = %path, "No engine log to upload");
                return Ok(EpilogueOutcome::Skipped {
                    warning: UploadWarning::LogFileMissing { path },
                });
            }
            Err(err) => {
                let warning = UploadWarning::LogFileUnreadable {
                    path,
                    error: err.to_string(),
                };
                warn!(error = %err, "{warning}");
                return Ok(EpilogueOutcome::Skipped { warning });
            }
        }

        let Some(name) = self.resolver.execution_name().await else {
            let warning = UploadWarning::ExecutionNameUnavailable;
            warn!("{warning}");
            return Ok(EpilogueOutcome::Skipped { warning });
        };

        let remote = self.remote_path_for(&name);
        info!(remote = %remote, "Uploading .nextflow.log to {}", remote.path());
        let bytes = self.store.upload(&self.log_file, &remote).await?;

        Ok(EpilogueOutcome::Uploaded {
            remote: remote.to_string(),
            bytes,
        })
    }
}

impl std::fmt::Debug for LogUploadEpilogue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogUploadEpilogue")
            .field("log_file", &self.log_file)
            .field("remote_root", &self.remote_root)
            .field("remote_file_name", &self.remote_file_name)
            .finish_non_exhaustive()
    }
}

/// Awaits `operation`, then always awaits `epilogue`, and merges the outcomes.
///
/// | operation | epilogue | result                                   |
/// |-----------|----------|------------------------------------------|
/// | ok        | ok       | `Ok((value, outcome))`                   |
/// | ok        | err      | `MsaflowError::Upload`                   |
/// | err       | ok       | `MsaflowError::Launch`                   |
/// | err       | err      | `MsaflowError::EpilogueAfterFailure`     |
pub async fn run_with_epilogue<T, F, E, EFut>(
    operation: F,
    epilogue: E,
) -> Result<(T, EpilogueOutcome), MsaflowError>
where
    F: Future<Output = Result<T, LaunchError>>,
    E: FnOnce() -> EFut,
    EFut: Future<Output = Result<EpilogueOutcome, UploadError>>,
{
    let result = operation.await;

    // Always run the epilogue
    let closing = epilogue().await;

    match (result, closing) {
        (Ok(value), Ok(outcome)) => Ok((value, outcome)),
        (Ok(_), Err(upload)) => Err(MsaflowError::Upload(upload)),
        (Err(launch), Ok(_)) => Err(MsaflowError::Launch(launch)),
        (Err(launch), Err(upload)) => Err(MsaflowError::EpilogueAfterFailure { launch, upload }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::{FixedExecutionName, MockRemoteStore};
    use std::sync::atomic::{AtomicBool, Ordering};

    fn epilogue_with(dir: &Path, name: FixedExecutionName, store: MockRemoteStore) -> LogUploadEpilogue {
        LogUploadEpilogue::from_config(
            &LogUploadConfig::default(),
            dir.join(".nextflow.log"),
            Arc::new(name),
            Arc::new(store),
        )
        .unwrap()
    }

    #[test]
    fn test_remote_path_layout() {
        let dir = tempfile::tempdir().unwrap();
        let epilogue = epilogue_with(dir.path(), FixedExecutionName::unavailable(), MockRemoteStore::new());

        assert_eq!(
            epilogue.remote_path_for("run-42").to_string(),
            "latch:///your_log_dir/nf_nf_core_multiplesequencealign/run-42/nextflow.log"
        );
    }

    #[tokio::test]
    async fn test_missing_log_skips_quietly() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = MockRemoteStore::new();
        store.expect_upload().times(0);

        let outcome = epilogue_with(dir.path(), FixedExecutionName::new("run-42"), store)
            .run()
            .await
            .unwrap();

        assert!(matches!(
            outcome,
            EpilogueOutcome::Skipped {
                warning: UploadWarning::LogFileMissing { .. }
            }
        ));
    }

    #[tokio::test]
    async fn test_uncheckable_log_skips_with_warning() {
        let dir = tempfile::tempdir().unwrap();
        // A log path below a regular file cannot be stat'ed.
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, "x").unwrap();
        let mut store = MockRemoteStore::new();
        store.expect_upload().times(0);

        let outcome = epilogue_with(&blocker, FixedExecutionName::new("run-42"), store)
            .run()
            .await
            .unwrap();

        let warning = match outcome {
            EpilogueOutcome::Skipped { warning } => warning,
            other => panic!("expected a skipped upload, got {other:?}"),
        };
        assert!(matches!(warning, UploadWarning::LogFileUnreadable { .. }));
        assert!(warning.to_string().contains("not-a-dir"));
    }

    #[tokio::test]
    async fn test_unresolved_name_skips_upload() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(".nextflow.log"), "log").unwrap();
        let mut store = MockRemoteStore::new();
        store.expect_upload().times(0);

        let outcome = epilogue_with(dir.path(), FixedExecutionName::unavailable(), store)
            .run()
            .await
            .unwrap();

        assert_eq!(
            outcome,
            EpilogueOutcome::Skipped {
                warning: UploadWarning::ExecutionNameUnavailable
            }
        );
    }

    #[tokio::test]
    async fn test_uploads_to_named_path() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(".nextflow.log"), "log").unwrap();
        let mut store = MockRemoteStore::new();
        store
            .expect_upload()
            .withf(|local, remote| {
                local.ends_with(".nextflow.log") && remote.to_string().ends_with("/run-42/nextflow.log")
            })
            .times(1)
            .returning(|_, _| Ok(3));

        let outcome = epilogue_with(dir.path(), FixedExecutionName::new("run-42"), store)
            .run()
            .await
            .unwrap();

        assert_eq!(
            outcome,
            EpilogueOutcome::Uploaded {
                remote: "latch:///your_log_dir/nf_nf_core_multiplesequencealign/run-42/nextflow.log"
                    .to_string(),
                bytes: 3,
            }
        );
    }

    #[tokio::test]
    async fn test_epilogue_runs_after_failure() {
        let ran = AtomicBool::new(false);

        let result = run_with_epilogue(
            async { Err::<(), _>(LaunchError::NonZeroExit { code: Some(1) }) },
            || async {
                ran.store(true, Ordering::SeqCst);
                Ok(EpilogueOutcome::Skipped {
                    warning: UploadWarning::ExecutionNameUnavailable,
                })
            },
        )
        .await;

        assert!(ran.load(Ordering::SeqCst));
        assert!(matches!(result, Err(MsaflowError::Launch(_))));
    }

    #[tokio::test]
    async fn test_both_failures_are_reported() {
        let result = run_with_epilogue(
            async { Err::<(), _>(LaunchError::NonZeroExit { code: Some(2) }) },
            || async { Err(UploadError::Transport("refused".to_string())) },
        )
        .await;

        match result {
            Err(MsaflowError::EpilogueAfterFailure { launch, upload }) => {
                assert!(matches!(launch, LaunchError::NonZeroExit { code: Some(2) }));
                assert!(matches!(upload, UploadError::Transport(_)));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_upload_failure_after_success_is_fatal() {
        let result = run_with_epilogue(
            async { Ok::<_, LaunchError>(0) },
            || async { Err(UploadError::Transport("refused".to_string())) },
        )
        .await;

        assert!(matches!(result, Err(MsaflowError::Upload(_))));
    }
}

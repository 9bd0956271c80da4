//! Remote paths and the upload contract.

use crate::config::{timeout_from_secs, RemoteStoreConfig};
use crate::errors::{MsaflowError, UploadError};
use async_trait::async_trait;
use regex::Regex;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Arc, LazyLock};
use std::time::Duration;
use tracing::debug;

static REMOTE_PATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z][A-Za-z0-9+.\-]*)://(/[^?#]*)?$").expect("valid remote path pattern")
});

/// A `scheme:///a/b/c` address in remote storage.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RemotePath {
    scheme: String,
    segments: Vec<String>,
}

impl RemotePath {
    /// Appends one or more `/`-separated segments.
    ///
    /// Surrounding and repeated slashes are dropped, so
    /// `latch:///logs/` joined with `/run-42/` and `nextflow.log` is
    /// `latch:///logs/run-42/nextflow.log`.
    #[must_use]
    pub fn join(&self, segment: &str) -> Self {
        let mut joined = self.clone();
        joined.segments.extend(split_segments(segment));
        joined
    }

    /// The URI scheme.
    #[must_use]
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// The absolute path part, always starting with `/`.
    #[must_use]
    pub fn path(&self) -> String {
        format!("/{}", self.segments.join("/"))
    }

    /// Path segments, in order.
    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.segments
    }
}

fn split_segments(raw: &str) -> impl Iterator<Item = String> + '_ {
    raw.split('/').filter(|s| !s.is_empty()).map(String::from)
}

impl FromStr for RemotePath {
    type Err = UploadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let captures = REMOTE_PATH
            .captures(s)
            .ok_or_else(|| UploadError::InvalidPath(s.to_string()))?;

        let scheme = captures[1].to_string();
        let segments = captures
            .get(2)
            .map(|m| split_segments(m.as_str()).collect())
            .unwrap_or_default();

        Ok(Self { scheme, segments })
    }
}

impl fmt::Display for RemotePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.scheme, self.path())
    }
}

/// Object storage reachable from the run.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Uploads `local` to `remote`, returning the bytes written.
    async fn upload(&self, local: &Path, remote: &RemotePath) -> Result<u64, UploadError>;
}

/// Builds the store named by configuration.
///
/// # Errors
///
/// Returns a configuration error for an unusable timeout, or a transport
/// error if the HTTP client cannot be built.
pub fn remote_store_from_config(config: &RemoteStoreConfig) -> Result<Arc<dyn RemoteStore>, MsaflowError> {
    let store: Arc<dyn RemoteStore> = match config {
        RemoteStoreConfig::LocalMirror { root } => Arc::new(LocalMirrorStore::new(root.clone())),
        RemoteStoreConfig::Http {
            base_url,
            timeout_seconds,
        } => {
            let timeout = timeout_from_secs("logs.store.timeout_seconds", *timeout_seconds)?;
            Arc::new(HttpRemoteStore::new(base_url.clone(), timeout)?)
        }
    };
    Ok(store)
}

/// Mirrors remote paths under a local directory: `s:///a/b` lands at `<root>/a/b`.
#[derive(Debug, Clone)]
pub struct LocalMirrorStore {
    root: PathBuf,
}

impl LocalMirrorStore {
    /// Creates a store rooted at `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Local file a remote path maps to.
    #[must_use]
    pub fn local_path(&self, remote: &RemotePath) -> PathBuf {
        remote
            .segments()
            .iter()
            .fold(self.root.clone(), |path, segment| path.join(segment))
    }
}

#[async_trait]
impl RemoteStore for LocalMirrorStore {
    async fn upload(&self, local: &Path, remote: &RemotePath) -> Result<u64, UploadError> {
        let target = self.local_path(remote);
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| UploadError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }

        let bytes = tokio::fs::copy(local, &target)
            .await
            .map_err(|source| UploadError::Io {
                path: local.to_path_buf(),
                source,
            })?;

        debug!(remote = %remote, target = %target.display(), bytes, "Mirrored upload");
        Ok(bytes)
    }
}

/// Uploads with `PUT <base_url><remote path>`.
#[derive(Debug, Clone)]
pub struct HttpRemoteStore {
    client: reqwest::Client,
    base_url: String,
}

impl HttpRemoteStore {
    /// Creates a store writing under `base_url`; each request is bounded by
    /// `timeout`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, UploadError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| UploadError::Transport(err.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// URL an upload to `remote` is sent to.
    #[must_use]
    pub fn url_for(&self, remote: &RemotePath) -> String {
        format!("{}{}", self.base_url, remote.path())
    }
}

#[async_trait]
impl RemoteStore for HttpRemoteStore {
    async fn upload(&self, local: &Path, remote: &RemotePath) -> Result<u64, UploadError> {
        let body = tokio::fs::read(local)
            .await
            .map_err(|source| UploadError::Io {
                path: local.to_path_buf(),
                source,
            })?;
        let bytes = body.len() as u64;

        let response = self
            .client
            .put(self.url_for(remote))
            .body(body)
            .send()
            .await
            .map_err(|err| UploadError::Transport(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(UploadError::Status {
                remote: remote.to_string(),
                status: status.as_u16(),
            });
        }

        Ok(bytes)
    }
}

//! Temporary workspaces for stage tests.

use crate::config::{RemoteStoreConfig, RuntimeConfig};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Shell script standing in for the pipeline engine.
///
/// Launched as `/bin/sh run <entry> -work-dir ...`, so the shell reads the
/// script from the file `run` in the working directory. It records its
/// arguments and the volume claim, optionally writes `.nextflow.log`, and
/// exits with `exit_code`.
#[must_use]
pub fn engine_script(exit_code: i32, write_log: bool) -> String {
    let log = if write_log {
        "echo \"nextflow run for claim $K8S_STORAGE_CLAIM_NAME\" > .nextflow.log\n"
    } else {
        ""
    };
    format!(
        "printf '%s\\n' \"$@\" > invocation.txt\n\
         echo \"$K8S_STORAGE_CLAIM_NAME\" > claim.txt\n\
         echo \"$NXF_OPTS\" > nxf_opts.txt\n\
         {log}exit {exit_code}\n"
    )
}

/// A source tree, a shared dir and a local upload mirror under one temp dir.
#[derive(Debug)]
pub struct WorkspaceFixture {
    root: TempDir,
}

impl WorkspaceFixture {
    /// Creates the layout with a minimal pipeline checkout in the source tree.
    ///
    /// # Panics
    ///
    /// Panics if the temporary directories cannot be created.
    #[must_use]
    pub fn new() -> Self {
        let root = tempfile::tempdir().expect("create temp dir");
        let fixture = Self { root };
        std::fs::create_dir_all(fixture.source()).expect("create source");
        std::fs::create_dir_all(fixture.mirror()).expect("create mirror");
        fixture.write_source("main.nf", "workflow {}\n");
        fixture.write_source("latch.config", "docker.enabled = true\n");
        fixture
    }

    /// Tree copied by the stager.
    #[must_use]
    pub fn source(&self) -> PathBuf {
        self.root.path().join("source")
    }

    /// Shared mount the engine runs in.
    #[must_use]
    pub fn shared(&self) -> PathBuf {
        self.root.path().join("shared")
    }

    /// Local stand-in for remote storage.
    #[must_use]
    pub fn mirror(&self) -> PathBuf {
        self.root.path().join("mirror")
    }

    /// Writes a file (creating parents) relative to the source tree.
    ///
    /// # Panics
    ///
    /// Panics on filesystem errors.
    pub fn write_source(&self, relative: &str, contents: &str) {
        write_file(&self.source().join(relative), contents);
    }

    /// Writes a file (creating parents) relative to the shared dir.
    ///
    /// # Panics
    ///
    /// Panics on filesystem errors.
    pub fn write_shared(&self, relative: &str, contents: &str) {
        write_file(&self.shared().join(relative), contents);
    }

    /// Reads a file relative to the shared dir, `None` if absent.
    #[must_use]
    pub fn read_shared(&self, relative: &str) -> Option<String> {
        std::fs::read_to_string(self.shared().join(relative)).ok()
    }

    /// Configuration pointing every stage at this fixture.
    ///
    /// The engine is `/bin/sh`, the upload store is the local mirror and the
    /// token is `abc123`.
    #[must_use]
    pub fn config(&self) -> RuntimeConfig {
        let mut config = RuntimeConfig::new()
            .with_execution_token(Some("abc123".to_string()))
            .with_staging_paths(self.source(), self.shared());
        config.launch = config.launch.with_nextflow_binary("/bin/sh");
        config.logs.store = RemoteStoreConfig::LocalMirror { root: self.mirror() };
        config
    }
}

impl Default for WorkspaceFixture {
    fn default() -> Self {
        Self::new()
    }
}

fn write_file(path: &Path, contents: &str) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("create parent dir");
    }
    std::fs::write(path, contents).expect("write fixture file");
}

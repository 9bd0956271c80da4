//! The three stages of a run.
//!
//! - [`StorageProvisioner`]: allocates the shared volume
//! - [`DirectoryStager`]: copies the working tree into the shared mount
//! - [`PipelineLauncher`]: runs the engine and uploads its log

mod epilogue;
mod launch;
mod provision;
mod staging;

pub use epilogue::{run_with_epilogue, EpilogueOutcome, LogUploadEpilogue};
pub use launch::{CommandInvocation, LaunchReport, PipelineLauncher};
pub use provision::StorageProvisioner;
pub use staging::{DirectoryStager, StagingReport};

//! # msaflow
//!
//! Launcher for the nf-core/multiplesequencealign Nextflow pipeline on a
//! managed execution platform.
//!
//! A run is three strictly ordered stages:
//!
//! - **Provision**: request a shared storage volume for the run
//! - **Stage**: copy the working tree into the shared mount, minus a denylist
//! - **Launch**: run Nextflow against the shared mount, then upload its log
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use msaflow::prelude::*;
//!
//! let sequencer = WorkflowSequencer::from_config(RuntimeConfig::from_env()?)?
//!     .with_event_sink(Arc::new(LoggingEventSink::default()));
//!
//! let params = ParameterSet::from_json(Arc::new(ParamSchema::multiple_sequence_align()), &json)?;
//! let report = sequencer.run(&params).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod config;
pub mod core;
pub mod errors;
pub mod events;
pub mod metadata;
pub mod observability;
pub mod params;
pub mod pipeline;
pub mod platform;
pub mod stages;

#[cfg(test)]
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{
        LaunchConfig, LogUploadConfig, ProvisioningConfig, RemoteStoreConfig, RuntimeConfig,
        StagingConfig,
    };
    pub use crate::core::{LaunchState, StageResult, StageStatus};
    pub use crate::errors::{
        ConfigurationError, LaunchError, MsaflowError, ProvisioningError, StagingError,
        UploadError, UploadWarning,
    };
    pub use crate::events::{EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::metadata::WorkflowMetadata;
    pub use crate::params::{
        FlagRule, NextflowFlagRule, ParamKind, ParamSchema, ParamSpec, ParamValue, ParameterSet,
    };
    pub use crate::pipeline::{RunReport, WorkflowSequencer};
    pub use crate::platform::{
        ExecutionNameResolver, ProvisioningClient, RemotePath, RemoteStore, VolumeHandle,
    };
    pub use crate::stages::{
        CommandInvocation, DirectoryStager, EpilogueOutcome, LaunchReport, PipelineLauncher,
        StagingReport, StorageProvisioner,
    };
}

//! Testing utilities for msaflow.
//!
//! This module provides:
//! - A canned HTTP server for the provisioning and upload contracts
//! - Temporary workspace fixtures with a scripted stand-in for the engine

mod fixtures;
mod http;

pub use fixtures::{engine_script, WorkspaceFixture};
pub use http::{CannedHttpServer, CannedResponse, RecordedRequest};

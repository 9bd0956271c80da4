//! Core domain model types for msaflow.
//!
//! This module contains the small types shared by every stage:
//! - Launch state machine
//! - Stage status and per-stage results

mod result;
mod status;

pub use result::StageResult;
pub use status::{LaunchState, StageStatus};

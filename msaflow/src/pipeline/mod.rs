//! Run sequencing.

mod sequencer;

#[cfg(test)]
mod integration_tests;

pub use sequencer::{RunReport, WorkflowSequencer, LAUNCH_STAGE, PROVISION_STAGE, STAGE_STAGE};

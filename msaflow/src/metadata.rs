//! Workflow metadata published to the workflow registry.

use crate::params::ParamSchema;
use serde::{Deserialize, Serialize};

/// Registry id of the workflow.
pub const WORKFLOW_ID: &str = "nf_nf_core_multiplesequencealign";
/// Human-readable workflow name.
pub const DISPLAY_NAME: &str = "nf-core/multiplesequencealign";

/// Identity and parameter schema of the wrapped workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowMetadata {
    /// Registry id.
    pub id: String,
    /// Display name.
    pub display_name: String,
    /// One-line description.
    pub description: String,
    /// Parameters, in command-line order.
    pub schema: ParamSchema,
}

impl WorkflowMetadata {
    /// Metadata of nf-core/multiplesequencealign.
    #[must_use]
    pub fn multiple_sequence_align() -> Self {
        Self {
            id: WORKFLOW_ID.to_string(),
            display_name: DISPLAY_NAME.to_string(),
            description: "Systematically evaluate multiple sequence alignment tools and guide trees"
                .to_string(),
            schema: ParamSchema::multiple_sequence_align(),
        }
    }

    /// Pretty JSON rendering.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

impl Default for WorkflowMetadata {
    fn default() -> Self {
        Self::multiple_sequence_align()
    }
}

//! Workflow parameters and their translation into command-line flags.
//!
//! This module provides:
//! - Parameter kinds and tagged values
//! - The ordered parameter schema and bound parameter sets
//! - The pluggable flag translation rule

mod flags;
mod schema;
mod value;

pub use flags::{FlagRule, NextflowFlagRule};
pub use schema::{ParamSchema, ParamSpec, ParameterSet};
pub use value::{ParamKind, ParamValue};

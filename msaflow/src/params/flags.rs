//! Flag translation rules.

use super::ParamValue;

/// Maps one named parameter value to zero or more command-line tokens.
pub trait FlagRule: Send + Sync {
    /// Tokens contributed by `name = value`.
    fn tokens(&self, name: &str, value: &ParamValue) -> Vec<String>;
}

/// Nextflow-style `--name [value]` flags.
///
/// | value          | tokens           |
/// |----------------|------------------|
/// | absent         | none             |
/// | `true`         | `--name`         |
/// | `false`        | none             |
/// | string/file/dir| `--name <value>` |
#[derive(Debug, Clone, Copy, Default)]
pub struct NextflowFlagRule;

impl FlagRule for NextflowFlagRule {
    fn tokens(&self, name: &str, value: &ParamValue) -> Vec<String> {
        let flag = format!("--{name}");
        match value {
            ParamValue::Absent | ParamValue::Boolean(false) => Vec::new(),
            ParamValue::Boolean(true) => vec![flag],
            ParamValue::String(v) | ParamValue::File(v) | ParamValue::Directory(v) => {
                vec![flag, v.clone()]
            }
        }
    }
}

//! Parameter schema and bound parameter sets.

use super::{FlagRule, ParamKind, ParamValue};
use crate::errors::ConfigurationError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Declaration of one workflow parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamSpec {
    /// Parameter name, also the flag name.
    pub name: String,
    /// Declared kind.
    pub kind: ParamKind,
    /// Whether a value must be supplied.
    #[serde(default)]
    pub required: bool,
    /// Short description.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
}

impl ParamSpec {
    /// Creates an optional parameter.
    #[must_use]
    pub fn optional(name: impl Into<String>, kind: ParamKind) -> Self {
        Self {
            name: name.into(),
            kind,
            required: false,
            description: String::new(),
        }
    }

    /// Creates a required parameter.
    #[must_use]
    pub fn required(name: impl Into<String>, kind: ParamKind) -> Self {
        Self {
            required: true,
            ..Self::optional(name, kind)
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// Ordered parameter declarations. Declaration order is command-line order.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ParamSchema {
    params: Vec<ParamSpec>,
}

impl ParamSchema {
    /// Creates a schema from declarations.
    ///
    /// # Errors
    ///
    /// Returns an error if a name is declared twice.
    pub fn new(params: Vec<ParamSpec>) -> Result<Self, ConfigurationError> {
        for (i, spec) in params.iter().enumerate() {
            if params[..i].iter().any(|p| p.name == spec.name) {
                return Err(ConfigurationError::new(format!(
                    "parameter '{}' declared twice",
                    spec.name
                )));
            }
        }
        Ok(Self { params })
    }

    /// The nf-core/multiplesequencealign parameter schema.
    #[must_use]
    pub fn multiple_sequence_align() -> Self {
        use ParamKind::{Boolean, Directory, File, String};

        let params = vec![
            ParamSpec::required("input", File)
                .with_description("Samplesheet listing the sequence files to align"),
            ParamSpec::optional("tools", File)
                .with_description("Samplesheet of guide tree and alignment tool combinations"),
            ParamSpec::required("outdir", Directory)
                .with_description("Where results are written"),
            ParamSpec::optional("email", String)
                .with_description("Address notified on completion"),
            ParamSpec::optional("multiqc_title", String).with_description("MultiQC report title"),
            ParamSpec::optional("skip_stats", Boolean)
                .with_description("Skip input sequence statistics"),
            ParamSpec::optional("calc_sim", Boolean)
                .with_description("Compute pairwise sequence similarity"),
            ParamSpec::optional("calc_seq_stats", Boolean)
                .with_description("Compute general sequence statistics"),
            ParamSpec::optional("extract_plddt", Boolean)
                .with_description("Extract pLDDT scores from structures"),
            ParamSpec::optional("calc_gaps", Boolean)
                .with_description("Compute gap statistics of the alignment"),
            ParamSpec::optional("skip_eval", Boolean).with_description("Skip alignment evaluation"),
            ParamSpec::optional("calc_sp", Boolean).with_description("Compute the sum-of-pairs score"),
            ParamSpec::optional("calc_tc", Boolean).with_description("Compute the total column score"),
            ParamSpec::optional("calc_irmsd", Boolean).with_description("Compute iRMSD"),
            ParamSpec::optional("calc_tcs", Boolean).with_description("Compute the TCS score"),
            ParamSpec::optional("skip_multiqc", Boolean).with_description("Skip the MultiQC report"),
            ParamSpec::optional("skip_shiny", Boolean).with_description("Skip the shiny app"),
            ParamSpec::optional("shiny_app", Directory)
                .with_description("Shiny app sources to bundle with the results"),
            ParamSpec::optional("shiny_trace_mode", String)
                .with_description("Trace mode of the shiny app"),
            ParamSpec::optional("no_compression", Boolean)
                .with_description("Do not compress alignment outputs"),
            ParamSpec::optional("multiqc_methods_description", String)
                .with_description("Custom methods description for MultiQC"),
        ];

        Self { params }
    }

    /// Declarations in order.
    #[must_use]
    pub fn params(&self) -> &[ParamSpec] {
        &self.params
    }

    /// Looks up a declaration by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ParamSpec> {
        self.params.iter().find(|p| p.name == name)
    }

    /// Number of declared parameters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.params.len()
    }

    /// Returns true if nothing is declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }
}

/// Values bound to a schema, iterated in declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterSet {
    schema: Arc<ParamSchema>,
    values: Vec<ParamValue>,
}

impl ParameterSet {
    /// Creates a set with every parameter absent.
    #[must_use]
    pub fn new(schema: Arc<ParamSchema>) -> Self {
        let values = vec![ParamValue::Absent; schema.len()];
        Self { schema, values }
    }

    /// Binds a plain JSON object (`{"input": "latch:///x.csv", "skip_stats": true}`).
    ///
    /// # Errors
    ///
    /// Returns an error for a non-object, an undeclared name, or a value of the wrong kind.
    pub fn from_json(schema: Arc<ParamSchema>, value: &serde_json::Value) -> Result<Self, ConfigurationError> {
        let object = value
            .as_object()
            .ok_or_else(|| ConfigurationError::new("parameters must be a JSON object"))?;

        let mut set = Self::new(schema);
        for (name, raw) in object {
            let spec = set
                .schema
                .get(name)
                .ok_or_else(|| ConfigurationError::unknown_parameter(name))?;
            let value = ParamValue::from_json(spec.kind, raw).ok_or_else(|| {
                ConfigurationError::new(format!("parameter '{name}' expects a {} value, got {raw}", spec.kind))
            })?;
            set.set(name, value)?;
        }
        Ok(set)
    }

    /// Sets one parameter.
    ///
    /// # Errors
    ///
    /// Returns an error for an undeclared name or a value of the wrong kind.
    pub fn set(&mut self, name: &str, value: ParamValue) -> Result<(), ConfigurationError> {
        let index = self
            .schema
            .params()
            .iter()
            .position(|p| p.name == name)
            .ok_or_else(|| ConfigurationError::unknown_parameter(name))?;

        let kind = self.schema.params()[index].kind;
        if !value.matches_kind(kind) {
            return Err(ConfigurationError::new(format!(
                "parameter '{name}' expects a {kind} value"
            )));
        }

        self.values[index] = value;
        Ok(())
    }

    /// Builder-style [`set`](Self::set).
    ///
    /// # Errors
    ///
    /// Same as [`set`](Self::set).
    pub fn with(mut self, name: &str, value: ParamValue) -> Result<Self, ConfigurationError> {
        self.set(name, value)?;
        Ok(self)
    }

    /// Value bound to `name`; `None` for undeclared names.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.schema
            .params()
            .iter()
            .position(|p| p.name == name)
            .map(|i| &self.values[i])
    }

    /// `(name, value)` pairs in declaration order, absent ones included.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.schema
            .params()
            .iter()
            .map(|p| p.name.as_str())
            .zip(self.values.iter())
    }

    /// Checks every required parameter has a value.
    ///
    /// # Errors
    ///
    /// Returns the first missing required parameter.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        for (spec, value) in self.schema.params().iter().zip(&self.values) {
            if spec.required && value.is_absent() {
                return Err(ConfigurationError::missing_parameter(&spec.name));
            }
        }
        Ok(())
    }

    /// Translates every parameter, in order, into command-line tokens.
    #[must_use]
    pub fn to_flags(&self, rule: &dyn FlagRule) -> Vec<String> {
        self.iter()
            .flat_map(|(name, value)| rule.tokens(name, value))
            .collect()
    }

    /// The schema this set is bound to.
    #[must_use]
    pub fn schema(&self) -> &ParamSchema {
        &self.schema
    }
}

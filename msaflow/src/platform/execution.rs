//! Execution-name lookup.

use async_trait::async_trait;

/// Resolves the human-readable name of the current run.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ExecutionNameResolver: Send + Sync {
    /// The execution name, or `None` when the platform cannot tell.
    async fn execution_name(&self) -> Option<String>;
}

/// Reads the execution name from an environment variable. Empty counts as unset.
#[derive(Debug, Clone)]
pub struct EnvExecutionName {
    var: String,
}

impl EnvExecutionName {
    /// Creates a resolver for `var`.
    #[must_use]
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

#[async_trait]
impl ExecutionNameResolver for EnvExecutionName {
    async fn execution_name(&self) -> Option<String> {
        std::env::var(&self.var)
            .ok()
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
    }
}

/// A resolver returning a fixed answer.
#[derive(Debug, Clone, Default)]
pub struct FixedExecutionName(Option<String>);

impl FixedExecutionName {
    /// Always resolves to `name`.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(Some(name.into()))
    }

    /// Never resolves.
    #[must_use]
    pub fn unavailable() -> Self {
        Self(None)
    }
}

#[async_trait]
impl ExecutionNameResolver for FixedExecutionName {
    async fn execution_name(&self) -> Option<String> {
        self.0.clone()
    }
}

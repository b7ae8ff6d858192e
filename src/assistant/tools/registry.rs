use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

/// Error type for tool resolution and invocation.
///
/// The `Display` text of every variant starts with "Error:" because these are
/// surfaced to the remote model as the tool's output string, not raised — the
/// model is expected to react to them.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("Error: no tool named '{0}' is registered")]
    UnknownTool(String),
    #[error("Error: invalid arguments for tool '{name}': {reason}")]
    InvalidArguments { name: String, reason: String },
    #[error("Error: tool '{name}' failed: {reason}")]
    Failed { name: String, reason: String },
}

/// A locally-executable function the remote model may request by name.
///
/// Implementations receive the already-parsed argument object and return their
/// output as a plain string. Business semantics are entirely the tool's own.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    async fn invoke(&self, args: Value) -> Result<String, ToolError>;
}

/// Name-keyed set of locally-executable tools.
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool under its own name. A later registration with the same
    /// name replaces the earlier one.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        debug!(tool = tool.name(), "registering tool");
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn resolve(&self, name: &str) -> Result<&Arc<dyn Tool>, ToolError> {
        self.tools
            .get(name)
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))
    }

    /// Parse the serialized argument payload and dispatch to the named tool.
    ///
    /// An empty payload is treated as `{}`, matching what the remote service
    /// sends for zero-argument functions.
    pub async fn invoke(&self, name: &str, raw_args: &str) -> Result<String, ToolError> {
        let tool = self.resolve(name)?;
        let args: Value = if raw_args.trim().is_empty() {
            Value::Object(Default::default())
        } else {
            serde_json::from_str(raw_args).map_err(|err| ToolError::InvalidArguments {
                name: name.to_string(),
                reason: err.to_string(),
            })?
        };
        tool.invoke(args).await
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(String::as_str).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

//! Tool trait and the registry the agent dispatches through

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tinycode_ai::{ToolDefinition, ToolExecutor};

/// Trait for executable tools
///
/// Business failures (bad path, rejected command) are reported as text in
/// the returned string, never as errors.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Tool name (used in API calls)
    fn name(&self) -> &str;

    /// Tool description for the LLM
    fn description(&self) -> &str;

    /// JSON Schema for parameters
    fn parameters_schema(&self) -> Value;

    /// Backend-native tool type, if the content-block backend knows this tool
    fn native_type(&self) -> Option<&str> {
        None
    }

    /// Execute the tool with the given input, relative to the workspace root
    async fn execute(&self, input: Value, workspace_root: &Path) -> String;
}

/// Type alias for a boxed tool
pub type BoxedTool = Arc<dyn Tool>;

/// Convert a Tool to the definition sent to the backend
pub fn to_definition(tool: &dyn Tool) -> ToolDefinition {
    let definition = ToolDefinition::new(tool.name(), tool.description(), tool.parameters_schema());
    match tool.native_type() {
        Some(native) => definition.with_native_type(native),
        None => definition,
    }
}

/// Registered tools plus their compiled parameter validators
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<BoxedTool>,
    /// Cached compiled JSON schema validators keyed by tool name
    schema_cache: HashMap<String, Arc<jsonschema::Validator>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a tool, replacing any tool with the same name
    pub fn register(&mut self, tool: BoxedTool) {
        self.tools.retain(|t| t.name() != tool.name());
        self.cache_tool_schema(&tool);
        self.tools.push(tool);
    }

    /// Builder-style [`register`](Self::register)
    pub fn with(mut self, tool: BoxedTool) -> Self {
        self.register(tool);
        self
    }

    /// Compile and cache the JSON schema validator for a tool.
    fn cache_tool_schema(&mut self, tool: &BoxedTool) {
        let schema = tool.parameters_schema();
        match jsonschema::validator_for(&schema) {
            Ok(validator) => {
                self.schema_cache
                    .insert(tool.name().to_string(), Arc::new(validator));
            }
            Err(e) => {
                self.schema_cache.remove(tool.name());
                tracing::warn!(
                    "Invalid tool parameter schema for '{}', skipping validation: {}",
                    tool.name(),
                    e
                );
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&BoxedTool> {
        self.tools.iter().find(|t| t.name() == name)
    }

    /// Get tool names in registration order
    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    /// Definitions to advertise to the backend
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|t| to_definition(t.as_ref())).collect()
    }
}

#[async_trait]
impl ToolExecutor for ToolRegistry {
    async fn execute(&self, name: &str, input: Value, workspace_root: &Path) -> Option<String> {
        let tool = self.get(name)?;

        if let Some(err) = self
            .schema_cache
            .get(name)
            .and_then(|validator| validate_with_validator(&input, validator))
        {
            tracing::debug!(tool = name, "rejected tool input: {}", err);
            return Some(err);
        }

        Some(tool.execute(input, workspace_root).await)
    }
}

/// Validate tool arguments using a pre-compiled validator.
/// Returns `Some(error_message)` if validation fails, `None` if valid.
fn validate_with_validator(args: &Value, validator: &jsonschema::Validator) -> Option<String> {
    let errors: Vec<String> = validator
        .iter_errors(args)
        .map(|e| {
            let path = e.instance_path.to_string();
            if path.is_empty() {
                e.to_string()
            } else {
                format!("{}: {}", path, e)
            }
        })
        .collect();

    if errors.is_empty() {
        None
    } else {
        Some(format!(
            "Error: Tool argument validation failed:\n{}",
            errors.join("\n")
        ))
    }
}

//! Tool System
//!
//! Capability interface plus an explicit registry of named
//! implementations, populated once at agent construction. The registry
//! resolves invocation requests from the response parser and briefs the
//! model on the available catalogue.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{AgentError, Result};

/// Tool invocation request, produced transiently by the response parser
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolInvocation {
    /// Tool identifier
    pub name: String,

    /// Arguments as key-value pairs
    pub arguments: HashMap<String, serde_json::Value>,

    /// Call ID for matching results to requests
    pub id: String,
}

impl ToolInvocation {
    pub fn new(name: impl Into<String>, arguments: HashMap<String, serde_json::Value>) -> Self {
        Self {
            name: name.into(),
            arguments,
            id: uuid::Uuid::new_v4().to_string(),
        }
    }

    /// Fetch a required string argument
    pub fn str_arg(&self, key: &str) -> Result<&str> {
        self.arguments
            .get(key)
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                AgentError::ToolArgument(format!("missing or non-string argument '{}'", key))
            })
    }

    /// Fetch an optional string argument
    pub fn opt_str_arg(&self, key: &str) -> Option<&str> {
        self.arguments.get(key).and_then(|v| v.as_str())
    }
}

/// Result from tool execution, appended to the conversation as a
/// tool-role message before the next model call
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolResult {
    /// Tool that was called
    pub name: String,

    /// Invocation ID this result answers
    pub id: Option<String>,

    /// Whether execution succeeded
    pub success: bool,

    /// Text payload (result body or error explanation)
    pub output: String,

    /// Structured payload, when the tool has one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl ToolResult {
    pub fn success(name: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: None,
            success: true,
            output: output.into(),
            data: None,
        }
    }

    pub fn failure(name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: None,
            success: false,
            output: error.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}

/// Parameter definition advertised to the model
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ParameterSpec {
    /// Parameter name
    pub name: String,

    /// Value type (string, number, boolean, object, array)
    #[serde(rename = "type")]
    pub value_type: String,

    /// Human-readable description
    pub description: String,

    /// Whether this parameter is required
    #[serde(default)]
    pub required: bool,
}

impl ParameterSpec {
    pub fn required(name: &str, value_type: &str, description: &str) -> Self {
        Self {
            name: name.into(),
            value_type: value_type.into(),
            description: description.into(),
            required: true,
        }
    }

    pub fn optional(name: &str, value_type: &str, description: &str) -> Self {
        Self {
            name: name.into(),
            value_type: value_type.into(),
            description: description.into(),
            required: false,
        }
    }

    fn accepts(&self, value: &serde_json::Value) -> bool {
        match self.value_type.as_str() {
            "string" => value.is_string(),
            "number" => value.is_number(),
            "boolean" => value.is_boolean(),
            "object" => value.is_object(),
            "array" => value.is_array(),
            _ => true,
        }
    }
}

/// Catalogue entry: name + description the model is briefed with
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolSpec {
    /// Unique tool identifier
    pub name: String,

    /// Model-facing capability advertisement
    pub description: String,

    /// Parameter definitions
    pub parameters: Vec<ParameterSpec>,
}

/// Tool trait - implement to add new capabilities.
///
/// Tools may retry or fall back internally; the orchestration loop only
/// sees success/failure plus payload or error.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The tool's catalogue entry
    fn spec(&self) -> ToolSpec;

    /// Execute the tool with the given invocation
    async fn execute(&self, call: &ToolInvocation) -> Result<ToolResult>;

    /// Validate arguments before execution
    fn validate(&self, call: &ToolInvocation) -> Result<()> {
        let spec = self.spec();

        for param in &spec.parameters {
            match call.arguments.get(&param.name) {
                Some(value) => {
                    if !param.accepts(value) {
                        return Err(AgentError::ToolArgument(format!(
                            "parameter '{}' expects {}, got {}",
                            param.name,
                            param.value_type,
                            json_type_name(value)
                        )));
                    }
                }
                None if param.required => {
                    return Err(AgentError::ToolArgument(format!(
                        "missing required parameter: {}",
                        param.name
                    )));
                }
                None => {}
            }
        }

        Ok(())
    }
}

fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

/// Registry for available tools, keyed by name.
///
/// Populated at agent construction and immutable during a session.
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new tool. Duplicate names are a configuration error,
    /// never a silent overwrite.
    pub fn register<T: Tool + 'static>(&mut self, tool: T) -> Result<()> {
        self.register_boxed(Arc::new(tool))
    }

    /// Register a boxed tool
    pub fn register_boxed(&mut self, tool: Arc<dyn Tool>) -> Result<()> {
        let name = tool.spec().name;
        if self.tools.contains_key(&name) {
            return Err(AgentError::ToolAlreadyRegistered(name));
        }
        self.tools.insert(name, tool);
        Ok(())
    }

    /// Resolve a tool by name. Pure lookup.
    pub fn resolve(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Dispatch an invocation: resolve, validate, execute.
    ///
    /// Every failure class comes back as `Err`; the orchestration loop
    /// maps it to a failed [`ToolResult`] rather than crashing.
    pub async fn dispatch(&self, call: &ToolInvocation) -> Result<ToolResult> {
        let tool = self
            .resolve(&call.name)
            .ok_or_else(|| AgentError::ToolNotFound(call.name.clone()))?;

        tool.validate(call)?;
        tool.execute(call).await
    }

    /// Full capability catalogue (name + description per tool)
    pub fn describe_all(&self) -> Vec<ToolSpec> {
        let mut specs: Vec<_> = self.tools.values().map(|t| t.spec()).collect();
        specs.sort_by(|a, b| a.name.cmp(&b.name));
        specs
    }

    /// Number of registered tools
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Render the catalogue and tool-block syntax for the system prompt
    pub fn prompt_section(&self) -> String {
        let mut prompt = String::from("## Available Tools\n\n");
        prompt.push_str("To use a tool, respond with one fenced block per request:\n\n");
        prompt.push_str("```tool\n{\"tool\": \"tool_name\", \"arguments\": {\"arg\": \"value\"}}\n```\n\n");
        prompt.push_str(
            "You may request several tools in one response; they run in the order given.\n\n",
        );

        for spec in self.describe_all() {
            prompt.push_str(&format!("### {}\n{}\n", spec.name, spec.description));

            if !spec.parameters.is_empty() {
                prompt.push_str("**Parameters:**\n");
                for param in &spec.parameters {
                    let required = if param.required { " (required)" } else { "" };
                    prompt.push_str(&format!(
                        "- `{}` ({}){}: {}\n",
                        param.name, param.value_type, required, param.description
                    ));
                }
            }
            prompt.push('\n');
        }

        prompt
    }
}

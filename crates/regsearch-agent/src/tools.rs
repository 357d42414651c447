//! Tools the model may call during an agentic answer, and the registry that
//! dispatches its requests.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::{debug, warn};

use regsearch_core::error::Error;
use regsearch_hybrid::{RetrievalEngine, DEFINITION_DIVIDER, REG_DIVIDER};

use crate::messages::ToolCall;

pub const LOOKUP_DEFINITION: &str = "lookup_definition";
pub const REGULATION_SEARCH: &str = "regulation_search";

/// JSON schema of a tool's arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputSchema {
    #[serde(rename = "type")]
    pub schema_type: String,
    pub properties: Map<String, Value>,
    pub required: Vec<String>,
}

impl InputSchema {
    pub fn object() -> Self {
        Self { schema_type: "object".to_string(), properties: Map::new(), required: Vec::new() }
    }

    pub fn string_param(mut self, name: &str, description: &str, required: bool) -> Self {
        self.properties.insert(name.to_string(), json!({ "type": "string", "description": description }));
        if required { self.required.push(name.to_string()); }
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub parameters: InputSchema,
}

impl ToolSchema {
    /// Schema of a tool taking a single required `query` string.
    pub fn query_tool(name: &str, description: &str, query_description: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            parameters: InputSchema::object().string_param("query", query_description, true),
        }
    }

    /// `{"type": "function", "function": {...}}` as chat-completions expects.
    pub fn to_function_spec(&self) -> Value {
        json!({ "type": "function", "function": self })
    }

    /// Every required parameter must be present and a string.
    pub fn validate(&self, arguments: &Value) -> Result<(), Error> {
        let object = arguments.as_object().ok_or_else(|| Error::Tool(format!("{} expects an object of arguments", self.name)))?;
        for field in &self.parameters.required {
            match object.get(field) {
                Some(Value::String(_)) => {}
                Some(_) => return Err(Error::Tool(format!("Field '{}' must be a string", field))),
                None => return Err(Error::Tool(format!("Missing required field: {}", field))),
            }
        }
        Ok(())
    }
}

pub trait Tool: Send + Sync {
    fn schema(&self) -> &ToolSchema;

    fn name(&self) -> &str { &self.schema().name }

    /// Arguments have already passed `schema().validate`.
    fn execute(&self, arguments: &Value) -> anyhow::Result<String>;
}

type QueryFn = dyn Fn(&str) -> anyhow::Result<Vec<String>> + Send + Sync;

/// A single-query tool whose hits are joined with a fixed separator.
pub struct QueryTool {
    schema: ToolSchema,
    separator: &'static str,
    search: Box<QueryFn>,
}

impl QueryTool {
    pub fn new(schema: ToolSchema, separator: &'static str, search: impl Fn(&str) -> anyhow::Result<Vec<String>> + Send + Sync + 'static) -> Self {
        Self { schema, separator, search: Box::new(search) }
    }

    pub fn lookup_definition(search: impl Fn(&str) -> anyhow::Result<Vec<String>> + Send + Sync + 'static) -> Self {
        let schema = ToolSchema::query_tool(
            LOOKUP_DEFINITION,
            "Lookup a word or phrase in the glossary to get its definition.",
            "A word or phrase for which you want the definition.",
        );
        Self::new(schema, DEFINITION_DIVIDER, search)
    }

    pub fn regulation_search(search: impl Fn(&str) -> anyhow::Result<Vec<String>> + Send + Sync + 'static) -> Self {
        let schema = ToolSchema::query_tool(REGULATION_SEARCH, "Search regulations using semantic search.", "Search query in the form of a question.");
        Self::new(schema, REG_DIVIDER, search)
    }
}

impl Tool for QueryTool {
    fn schema(&self) -> &ToolSchema { &self.schema }

    fn execute(&self, arguments: &Value) -> anyhow::Result<String> {
        let query = arguments.get("query").and_then(Value::as_str).ok_or_else(|| Error::Tool("Missing required field: query".into()))?;
        let hits = (self.search)(query)?;
        debug!(tool = %self.schema.name, hits = hits.len(), "tool executed");
        Ok(hits.join(self.separator))
    }
}

#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self { Self::default() }

    /// A later tool with the same name replaces the earlier one.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        self.tools.retain(|t| t.name() != tool.name());
        self.tools.push(tool);
    }

    pub fn with(mut self, tool: impl Tool + 'static) -> Self {
        self.register(Box::new(tool));
        self
    }

    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.iter().find(|t| t.name() == name).map(|t| t.as_ref())
    }

    pub fn schemas(&self) -> Vec<ToolSchema> { self.tools.iter().map(|t| t.schema().clone()).collect() }

    pub fn len(&self) -> usize { self.tools.len() }

    pub fn is_empty(&self) -> bool { self.tools.is_empty() }

    pub fn try_execute(&self, call: &ToolCall) -> anyhow::Result<String> {
        let tool = self.get(&call.name).ok_or_else(|| Error::Tool(format!("Unknown tool: {}", call.name)))?;
        tool.schema().validate(&call.arguments)?;
        tool.execute(&call.arguments)
    }

    /// Run one call. Failures come back as text for the model to read.
    pub fn execute(&self, call: &ToolCall) -> String {
        match self.try_execute(call) {
            Ok(output) => output,
            Err(e) => {
                warn!(tool = %call.name, error = %e, "tool call failed");
                format!("There was a problem calling a tool: {}", e)
            }
        }
    }
}

/// `lookup_definition` and `regulation_search` over one engine.
pub fn retrieval_tools(engine: Arc<RetrievalEngine>) -> ToolRegistry {
    let definitions = engine.clone();
    ToolRegistry::new()
        .with(QueryTool::lookup_definition(move |q| definitions.search_definitions(q)))
        .with(QueryTool::regulation_search(move |q| engine.search_regulations(q)))
}

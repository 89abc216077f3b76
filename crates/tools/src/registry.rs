use operator_core::{ComputerConfig, Error, Result};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::browser::{Page, ViewportSize};
use crate::computer::tool::computer_schema;
use crate::computer::ComputerTool;
use crate::navigate::{current_url_schema, navigate_schema, CurrentUrlTool, NavigateTool};
use crate::{Tool, ToolContext, ToolOutput, ToolSchema};

/// Function-calling wrapper around a tool schema.
pub fn function_schema(schema: ToolSchema) -> Value {
    json!({
        "type": "function",
        "function": {
            "name": schema.name,
            "description": schema.description,
            "parameters": schema.parameters
        }
    })
}

/// Schemas of the tools [`ToolRegistry::for_page`] registers, without
/// needing a live page.
pub fn browser_tool_schemas(display: ViewportSize) -> Vec<Value> {
    vec![
        function_schema(computer_schema(display)),
        function_schema(current_url_schema()),
        function_schema(navigate_schema()),
    ]
}

#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// `computer`, `navigate` and `current_url`, all bound to `page`.
    pub async fn for_page(page: Arc<dyn Page>, config: &ComputerConfig) -> Result<Self> {
        let mut registry = Self::new();
        registry.register(Arc::new(ComputerTool::new(page.clone(), config).await?));
        registry.register(Arc::new(NavigateTool::new(page.clone())));
        registry.register(Arc::new(CurrentUrlTool::new(page)));
        Ok(registry)
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let schema = tool.schema();
        debug!(name = schema.name, "Registering tool");
        self.tools.insert(schema.name.to_string(), tool);
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.get(name)
    }

    pub fn get_tool_schemas(&self) -> Vec<Value> {
        self.tool_names()
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|tool| function_schema(tool.schema()))
            .collect()
    }

    /// Sorted.
    pub fn tool_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }

    pub async fn execute(&self, name: &str, ctx: ToolContext, params: Value) -> Result<ToolOutput> {
        let tool = self
            .get(name)
            .ok_or_else(|| Error::Tool(format!("Unknown tool: {}", name)))?;

        tool.validate(&params)?;

        debug!(tool = name, session = %ctx.session_key, "Executing tool");
        tool.execute(ctx, params).await
    }

    /// Agent-loop entry point. Never fails: any error becomes a text output
    /// the model can read and react to.
    pub async fn invoke(&self, name: &str, ctx: ToolContext, params: Value) -> ToolOutput {
        let session = ctx.session_key.clone();
        match self.execute(name, ctx, params).await {
            Ok(output) => output,
            Err(e) => {
                if e.is_rejection() {
                    info!(tool = name, session = %session, error = %e, "Tool call rejected");
                } else {
                    warn!(tool = name, session = %session, error = %e, "Tool call failed");
                }
                ToolOutput::text(e.to_string())
            }
        }
    }
}

use async_trait::async_trait;
use operator_core::{Error, Result};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;

use crate::browser::Page;
use crate::{Tool, ToolContext, ToolOutput, ToolSchema};

fn parse_url(params: &Value) -> Result<url::Url> {
    let raw = params
        .get("url")
        .and_then(|v| v.as_str())
        .ok_or_else(|| Error::Validation("Missing required parameter: url".to_string()))?;
    url::Url::parse(raw).map_err(|e| Error::Validation(format!("Invalid URL '{}': {}", raw, e)))
}

pub fn navigate_schema() -> ToolSchema {
    ToolSchema {
        name: "navigate",
        description: "Open a URL in the browser.",
        parameters: json!({
            "type": "object",
            "properties": {
                "url": {
                    "type": "string",
                    "description": "Absolute URL including scheme, e.g. https://example.com"
                }
            },
            "required": ["url"]
        }),
    }
}

pub fn current_url_schema() -> ToolSchema {
    ToolSchema {
        name: "current_url",
        description: "Get the URL of the page currently open in the browser.",
        parameters: json!({
            "type": "object",
            "properties": {}
        }),
    }
}

pub struct NavigateTool {
    page: Arc<dyn Page>,
}

impl NavigateTool {
    pub fn new(page: Arc<dyn Page>) -> Self {
        Self { page }
    }
}

#[async_trait]
impl Tool for NavigateTool {
    fn schema(&self) -> ToolSchema {
        navigate_schema()
    }

    fn validate(&self, params: &Value) -> Result<()> {
        parse_url(params).map(|_| ())
    }

    async fn execute(&self, _ctx: ToolContext, params: Value) -> Result<ToolOutput> {
        let url = params["url"].as_str().unwrap_or_default();
        self.page.goto(url).await?;
        info!(url, "Navigated");
        Ok(ToolOutput::text(format!("Successfully navigated to {}.", url)))
    }
}

pub struct CurrentUrlTool {
    page: Arc<dyn Page>,
}

impl CurrentUrlTool {
    pub fn new(page: Arc<dyn Page>) -> Self {
        Self { page }
    }
}

#[async_trait]
impl Tool for CurrentUrlTool {
    fn schema(&self) -> ToolSchema {
        current_url_schema()
    }

    fn validate(&self, _params: &Value) -> Result<()> {
        Ok(())
    }

    async fn execute(&self, _ctx: ToolContext, _params: Value) -> Result<ToolOutput> {
        Ok(ToolOutput::text(self.page.url().await?))
    }
}

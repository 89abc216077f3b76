pub mod browser;
pub mod computer;
pub mod navigate;
pub mod prompts;
pub mod registry;

use async_trait::async_trait;
use operator_core::Result;
use serde::Serialize;
use serde_json::Value;

pub use computer::{Action, ActionKind, ActionResult, BrowserComputer, ComputerTool};
pub use registry::ToolRegistry;

/// Per-invocation context handed to every tool.
#[derive(Debug, Clone)]
pub struct ToolContext {
    pub session_key: String,
}

impl ToolContext {
    pub fn new(session_key: impl Into<String>) -> Self {
        Self {
            session_key: session_key.into(),
        }
    }
}

pub struct ToolSchema {
    pub name: &'static str,
    pub description: &'static str,
    pub parameters: Value,
}

/// What a tool hands back to the agent loop: plain text, or an image the
/// model can look at. Serializes to the content block shape tool-calling
/// model APIs expect.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ToolOutput {
    Text {
        text: String,
    },
    Image {
        data: String,
        #[serde(rename = "mimeType")]
        mime_type: String,
    },
}

impl ToolOutput {
    pub fn text(text: impl Into<String>) -> Self {
        ToolOutput::Text { text: text.into() }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ToolOutput::Text { text } => Some(text),
            ToolOutput::Image { .. } => None,
        }
    }
}

impl From<ActionResult> for ToolOutput {
    fn from(result: ActionResult) -> Self {
        match result {
            ActionResult::Text(text) => ToolOutput::Text { text },
            ActionResult::Image { data, media_type } => ToolOutput::Image {
                data,
                mime_type: media_type,
            },
        }
    }
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn schema(&self) -> ToolSchema;
    fn validate(&self, params: &Value) -> Result<()>;
    async fn execute(&self, ctx: ToolContext, params: Value) -> Result<ToolOutput>;
}

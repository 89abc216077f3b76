use async_trait::async_trait;
use operator_core::{ComputerConfig, Error, Result};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::Mutex;

use super::action::{Action, ActionKind};
use super::BrowserComputer;
use crate::browser::{Page, ViewportSize};
use crate::{Tool, ToolContext, ToolOutput, ToolSchema};

/// Exposes a [`BrowserComputer`] to the model as the `computer` tool.
pub struct ComputerTool {
    computer: Arc<Mutex<BrowserComputer>>,
    display: ViewportSize,
}

impl ComputerTool {
    /// Reads the viewport once to advertise the display size.
    pub async fn new(page: Arc<dyn Page>, config: &ComputerConfig) -> Result<Self> {
        let display = page
            .viewport_size()
            .await?
            .ok_or_else(|| Error::Validation("Viewport size is not defined.".to_string()))?;
        Ok(Self {
            computer: Arc::new(Mutex::new(BrowserComputer::with_config(page, config))),
            display,
        })
    }

    pub fn display(&self) -> ViewportSize {
        self.display
    }

    pub fn computer(&self) -> Arc<Mutex<BrowserComputer>> {
        self.computer.clone()
    }
}

/// Schema of the `computer` tool for a display of the given size.
pub fn computer_schema(display: ViewportSize) -> ToolSchema {
    let actions: Vec<&str> = ActionKind::ALL.iter().map(|k| k.as_str()).collect();
    ToolSchema {
        name: "computer",
        description: "Use a mouse and keyboard to interact with the browser, and take screenshots. Every action except cursor_position returns a screenshot of the page once it has settled.",
        parameters: json!({
            "type": "object",
            "properties": {
                "action": {
                    "type": "string",
                    "description": "The action to perform.",
                    "enum": actions
                },
                "coordinate": {
                    "type": "array",
                    "items": { "type": "number" },
                    "minItems": 2,
                    "maxItems": 2,
                    "description": format!(
                        "(x, y) in pixels from the top-left corner. Required for pointer actions. Display is {}x{}.",
                        display.width, display.height
                    )
                },
                "text": {
                    "type": "string",
                    "description": "Required for key (e.g. 'Return', 'ctrl+a') and type."
                }
            },
            "required": ["action"],
            "display_width_px": display.width,
            "display_height_px": display.height
        }),
    }
}

#[async_trait]
impl Tool for ComputerTool {
    fn schema(&self) -> ToolSchema {
        computer_schema(self.display)
    }

    fn validate(&self, params: &Value) -> Result<()> {
        Action::from_params(params).map(|_| ())
    }

    async fn execute(&self, _ctx: ToolContext, params: Value) -> Result<ToolOutput> {
        let action = Action::from_params(&params)?;
        let mut computer = self.computer.lock().await;
        let result = computer.execute(action).await?;
        Ok(result.into())
    }
}

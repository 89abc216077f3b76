//! The "computer": semantic pointer/keyboard actions against a page.

pub mod action;
pub mod dispatch;
pub mod observe;
pub mod tool;
pub mod validate;

use operator_core::{ComputerConfig, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

pub use action::{Action, ActionKind, ActionResult, Coordinate};
pub use tool::ComputerTool;

use crate::browser::Page;
use dispatch::ActionContext;

/// Executes one action at a time and keeps every action that succeeded.
pub struct BrowserComputer {
    page: Arc<dyn Page>,
    settle_timeout: Option<Duration>,
    history: Vec<Action>,
}

impl BrowserComputer {
    pub fn new(page: Arc<dyn Page>) -> Self {
        Self::with_config(page, &ComputerConfig::default())
    }

    pub fn with_config(page: Arc<dyn Page>, config: &ComputerConfig) -> Self {
        Self {
            page,
            settle_timeout: config.settle_timeout_ms.map(Duration::from_millis),
            history: Vec::new(),
        }
    }

    pub fn page(&self) -> &Arc<dyn Page> {
        &self.page
    }

    pub fn history(&self) -> &[Action] {
        &self.history
    }

    /// Validate, dispatch once, and record `action`. Rejected or failed
    /// actions leave the history untouched.
    pub async fn execute(&mut self, action: Action) -> Result<ActionResult> {
        let viewport = if action.action.requires_coordinate() {
            self.page.viewport_size().await?
        } else {
            None
        };
        let params = validate::validate(&action, viewport)?;

        let ctx = ActionContext {
            page: self.page.as_ref(),
            params,
            settle_timeout: self.settle_timeout,
        };
        let result = dispatch::execute(action.action, &ctx).await?;

        debug!(action = %action.action, history = self.history.len() + 1, "Action executed");
        self.history.push(action);
        Ok(result)
    }
}

//! Waiting for the page to settle and capturing what it looks like.

use base64::Engine;
use operator_core::{Error, Result};
use std::time::Duration;
use tracing::debug;

use super::action::ActionResult;
use crate::browser::{LoadState, Page};

pub const SCREENSHOT_MEDIA_TYPE: &str = "image/png";

/// Block until the network is idle and the DOM is loaded. With a limit, an
/// expired wait becomes [`Error::Timeout`].
pub async fn settle(page: &dyn Page, limit: Option<Duration>) -> Result<()> {
    let wait = async {
        page.wait_for_load_state(LoadState::NetworkIdle.as_str())
            .await?;
        page.wait_for_load_state(LoadState::DomContentLoaded.as_str())
            .await
    };

    match limit {
        Some(limit) => tokio::time::timeout(limit, wait).await.map_err(|_| {
            Error::Timeout(format!("Page did not settle within {}ms", limit.as_millis()))
        })?,
        None => wait.await,
    }
}

pub async fn capture(page: &dyn Page) -> Result<ActionResult> {
    let png = page.screenshot().await?;
    debug!(bytes = png.len(), "Captured screenshot");
    Ok(ActionResult::Image {
        data: base64::engine::general_purpose::STANDARD.encode(png),
        media_type: SCREENSHOT_MEDIA_TYPE.to_string(),
    })
}

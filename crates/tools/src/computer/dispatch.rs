//! Action dispatch table.
//!
//! One arm per [`ActionKind`]. Effectful arms are followed by a settle wait
//! and a screenshot; `screenshot` only captures and `cursor_position`
//! answers with text.

use operator_core::{Error, Result};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use super::action::{ActionKind, ActionResult};
use super::observe::{capture, settle};
use super::validate::ActionParams;
use crate::browser::{ClickOptions, MouseButton, Page};

/// Installs a single pointer listener per document and reports the last
/// position it saw.
const CURSOR_PROBE: &str = r#"(() => {
  if (!window.__browserOperatorCursor) {
    window.__browserOperatorCursor = { x: 0, y: 0 };
    document.addEventListener("mousemove", (e) => {
      window.__browserOperatorCursor = { x: e.clientX, y: e.clientY };
    });
  }
  return window.__browserOperatorCursor;
})()"#;

/// Names the model uses that the browser spells differently, after case
/// folding.
const KEY_FIXES: &[(&str, &str)] = &[
    ("Ctrl", "Control"),
    ("Return", "Enter"),
    ("Esc", "Escape"),
    ("Cmd", "Meta"),
    ("Super", "Meta"),
    ("Up", "ArrowUp"),
    ("Down", "ArrowDown"),
    ("Left", "ArrowLeft"),
    ("Right", "ArrowRight"),
    ("Arrowup", "ArrowUp"),
    ("Arrowdown", "ArrowDown"),
    ("Arrowleft", "ArrowLeft"),
    ("Arrowright", "ArrowRight"),
    ("Page_up", "PageUp"),
    ("Page_down", "PageDown"),
    ("Pageup", "PageUp"),
    ("Pagedown", "PageDown"),
    ("Back_space", "Backspace"),
];

/// `ctrl+a` -> `Control+A`, `return` -> `Enter`.
pub fn format_key(text: &str) -> String {
    text.split('+')
        .map(|segment| {
            let mut chars = segment.chars();
            let folded = match chars.next() {
                Some(first) => {
                    first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
                }
                None => String::new(),
            };
            KEY_FIXES
                .iter()
                .find(|(from, _)| *from == folded)
                .map(|(_, to)| to.to_string())
                .unwrap_or(folded)
        })
        .collect::<Vec<_>>()
        .join("+")
}

pub struct ActionContext<'a> {
    pub page: &'a dyn Page,
    pub params: ActionParams,
    pub settle_timeout: Option<Duration>,
}

impl ActionContext<'_> {
    fn point(&self) -> Result<(f64, f64)> {
        match self.params {
            ActionParams::Point { x, y } => Ok((x, y)),
            _ => Err(Error::Validation("Coordinate was not validated.".to_string())),
        }
    }

    fn text(&self) -> Result<&str> {
        match &self.params {
            ActionParams::Text(text) => Ok(text),
            _ => Err(Error::Validation("Text was not validated.".to_string())),
        }
    }
}

/// Run the handler for `kind`. Parameters must already be validated.
///
/// Each arm produces the action's effect. Text answers return from the arm;
/// everything else is observed afterwards, with a settle wait first when
/// [`ActionKind::settles`] says the page may have changed.
pub async fn execute(kind: ActionKind, ctx: &ActionContext<'_>) -> Result<ActionResult> {
    debug!(action = %kind, params = ?ctx.params, "Dispatching action");
    let page = ctx.page;

    match kind {
        ActionKind::Screenshot => {}
        ActionKind::CursorPosition => return cursor_position(page).await,
        ActionKind::Key => page.keyboard().press(&format_key(ctx.text()?)).await?,
        ActionKind::Type => page.keyboard().type_text(ctx.text()?).await?,
        ActionKind::MouseMove => {
            let (x, y) = ctx.point()?;
            page.mouse().move_to(x, y).await?;
        }
        ActionKind::LeftClick => {
            let (x, y) = ctx.point()?;
            page.mouse().click(x, y, ClickOptions::default()).await?;
        }
        ActionKind::LeftClickDrag => {
            let (x, y) = ctx.point()?;
            page.mouse().down().await?;
            page.mouse().move_to(x, y).await?;
            page.mouse().up().await?;
        }
        ActionKind::RightClick => {
            let (x, y) = ctx.point()?;
            page.mouse()
                .click(x, y, ClickOptions::button(MouseButton::Right))
                .await?;
        }
        ActionKind::MiddleClick => {
            let (x, y) = ctx.point()?;
            page.mouse()
                .click(x, y, ClickOptions::button(MouseButton::Middle))
                .await?;
        }
        ActionKind::DoubleClick => {
            let (x, y) = ctx.point()?;
            page.mouse().dblclick(x, y).await?;
        }
    }

    if kind.settles() {
        settle(page, ctx.settle_timeout).await?;
    }
    capture(page).await
}

async fn cursor_position(page: &dyn Page) -> Result<ActionResult> {
    let position = page.evaluate(CURSOR_PROBE).await?;
    let x = format_axis(position.get("x"));
    let y = format_axis(position.get("y"));
    Ok(ActionResult::Text(format!(
        "Current cursor position: ({}, {})",
        x, y
    )))
}

fn format_axis(value: Option<&Value>) -> String {
    let n = value.and_then(Value::as_f64).unwrap_or(0.0);
    if n.fract() == 0.0 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::testing::FakePage;

    fn ctx(page: &FakePage, params: ActionParams) -> ActionContext<'_> {
        ActionContext {
            page,
            params,
            settle_timeout: None,
        }
    }

    const SETTLE_AND_SHOT: [&str; 3] = ["wait networkidle", "wait domcontentloaded", "screenshot"];

    #[test]
    fn test_format_key_modifier_combo() {
        assert_eq!(format_key("ctrl+a"), "Control+A");
        assert_eq!(format_key("CTRL+SHIFT+t"), "Control+Shift+T");
    }

    #[test]
    fn test_format_key_renames() {
        assert_eq!(format_key("return"), "Enter");
        assert_eq!(format_key("Return"), "Enter");
        assert_eq!(format_key("esc"), "Escape");
        assert_eq!(format_key("Page_Down"), "PageDown");
        assert_eq!(format_key("ArrowLeft"), "ArrowLeft");
        assert_eq!(format_key("tab"), "Tab");
    }

    #[tokio::test]
    async fn test_key_presses_formatted_key_then_observes() {
        let page = FakePage::new();
        let result = execute(ActionKind::Key, &ctx(&page, ActionParams::Text("ctrl+a".into())))
            .await
            .unwrap();

        assert!(matches!(result, ActionResult::Image { .. }));
        let mut expected = vec!["press Control+A"];
        expected.extend(SETTLE_AND_SHOT);
        assert_eq!(page.effects(), expected);
    }

    #[tokio::test]
    async fn test_drag_is_down_move_up() {
        let page = FakePage::new();
        execute(
            ActionKind::LeftClickDrag,
            &ctx(&page, ActionParams::Point { x: 30.0, y: 40.0 }),
        )
        .await
        .unwrap();

        assert_eq!(&page.effects()[..3], ["down", "move 30 40", "up"]);
    }

    #[tokio::test]
    async fn test_click_variants_use_their_button() {
        for (kind, effect) in [
            (ActionKind::LeftClick, "click 5 6 left"),
            (ActionKind::RightClick, "click 5 6 right"),
            (ActionKind::MiddleClick, "click 5 6 middle"),
            (ActionKind::DoubleClick, "dblclick 5 6"),
        ] {
            let page = FakePage::new();
            execute(kind, &ctx(&page, ActionParams::Point { x: 5.0, y: 6.0 }))
                .await
                .unwrap();
            assert_eq!(page.effects()[0], effect);
        }
    }

    #[tokio::test]
    async fn test_effectful_actions_settle_then_capture() {
        for kind in ActionKind::ALL.into_iter().filter(ActionKind::settles) {
            let page = FakePage::new();
            let params = if kind.requires_text() {
                ActionParams::Text("a".into())
            } else {
                ActionParams::Point { x: 2.0, y: 3.0 }
            };
            execute(kind, &ctx(&page, params)).await.unwrap();

            let effects = page.effects();
            assert_eq!(&effects[effects.len() - 3..], SETTLE_AND_SHOT, "{}", kind);
        }
    }

    #[tokio::test]
    async fn test_screenshot_does_not_settle() {
        let page = FakePage::new();
        execute(ActionKind::Screenshot, &ctx(&page, ActionParams::None))
            .await
            .unwrap();
        assert_eq!(page.effects(), vec!["screenshot"]);
    }

    #[tokio::test]
    async fn test_cursor_position_defaults_to_origin() {
        let page = FakePage::new();
        let result = execute(ActionKind::CursorPosition, &ctx(&page, ActionParams::None))
            .await
            .unwrap();
        assert_eq!(result.as_text(), Some("Current cursor position: (0, 0)"));
        assert_eq!(page.effects(), vec!["evaluate"]);
    }

    #[tokio::test]
    async fn test_cursor_position_after_move() {
        let page = FakePage::new();
        execute(
            ActionKind::MouseMove,
            &ctx(&page, ActionParams::Point { x: 12.0, y: 7.5 }),
        )
        .await
        .unwrap();
        let result = execute(ActionKind::CursorPosition, &ctx(&page, ActionParams::None))
            .await
            .unwrap();
        assert_eq!(result.as_text(), Some("Current cursor position: (12, 7.5)"));
    }

    #[tokio::test]
    async fn test_browser_error_propagates_unchanged() {
        let page = FakePage::new();
        page.fail_clicks("Node is detached from document");
        let err = execute(
            ActionKind::LeftClick,
            &ctx(&page, ActionParams::Point { x: 1.0, y: 1.0 }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.to_string(), "Node is detached from document");
        assert!(page.effects().is_empty());
    }
}

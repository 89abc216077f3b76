//! Parameter checks that run before anything touches the page.

use operator_core::{Error, Result};

use super::action::Action;
use crate::browser::ViewportSize;

/// Inputs a handler may rely on once validation passed.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionParams {
    None,
    Point { x: f64, y: f64 },
    Text(String),
}

/// Check `action` against the live viewport. `viewport` is only consulted
/// for pointer actions.
pub fn validate(action: &Action, viewport: Option<ViewportSize>) -> Result<ActionParams> {
    let kind = action.action;

    if kind.requires_coordinate() {
        let (x, y) = validate_coordinate(action, viewport)?;
        return Ok(ActionParams::Point { x, y });
    }

    if kind.requires_text() {
        return match action.text.as_deref() {
            Some(text) if !text.is_empty() => Ok(ActionParams::Text(text.to_string())),
            _ => Err(Error::Validation(format!(
                "Text is required for {} action.",
                kind
            ))),
        };
    }

    Ok(ActionParams::None)
}

fn validate_coordinate(action: &Action, viewport: Option<ViewportSize>) -> Result<(f64, f64)> {
    let viewport =
        viewport.ok_or_else(|| Error::Validation("Viewport size is not defined.".to_string()))?;

    let coordinate = action.coordinate.ok_or_else(|| {
        Error::Validation(format!("Coordinate is required for {} action.", action.action))
    })?;
    let (x, y) = (coordinate.0, coordinate.1);

    if !(0.0..=viewport.width as f64).contains(&x) {
        return Err(Error::Validation("X coordinate is out of bounds.".to_string()));
    }
    if !(0.0..=viewport.height as f64).contains(&y) {
        return Err(Error::Validation("Y coordinate is out of bounds.".to_string()));
    }
    Ok((x, y))
}

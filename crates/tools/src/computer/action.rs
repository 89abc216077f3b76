use operator_core::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// The closed set of things the model can ask the computer to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Key,
    Type,
    MouseMove,
    LeftClick,
    LeftClickDrag,
    RightClick,
    MiddleClick,
    DoubleClick,
    Screenshot,
    CursorPosition,
}

impl ActionKind {
    pub const ALL: [ActionKind; 10] = [
        ActionKind::Key,
        ActionKind::Type,
        ActionKind::MouseMove,
        ActionKind::LeftClick,
        ActionKind::LeftClickDrag,
        ActionKind::RightClick,
        ActionKind::MiddleClick,
        ActionKind::DoubleClick,
        ActionKind::Screenshot,
        ActionKind::CursorPosition,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Key => "key",
            ActionKind::Type => "type",
            ActionKind::MouseMove => "mouse_move",
            ActionKind::LeftClick => "left_click",
            ActionKind::LeftClickDrag => "left_click_drag",
            ActionKind::RightClick => "right_click",
            ActionKind::MiddleClick => "middle_click",
            ActionKind::DoubleClick => "double_click",
            ActionKind::Screenshot => "screenshot",
            ActionKind::CursorPosition => "cursor_position",
        }
    }

    pub fn requires_coordinate(&self) -> bool {
        matches!(
            self,
            ActionKind::MouseMove
                | ActionKind::LeftClick
                | ActionKind::LeftClickDrag
                | ActionKind::RightClick
                | ActionKind::MiddleClick
                | ActionKind::DoubleClick
        )
    }

    pub fn requires_text(&self) -> bool {
        matches!(self, ActionKind::Key | ActionKind::Type)
    }

    /// Whether the action changes page state and must be followed by a
    /// settle wait before observing.
    pub fn settles(&self) -> bool {
        !matches!(self, ActionKind::Screenshot | ActionKind::CursorPosition)
    }
}

impl FromStr for ActionKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        ActionKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| Error::UnsupportedAction(s.to_string()))
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `[x, y]` in CSS pixels of the viewport.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate(pub f64, pub f64);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub action: ActionKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coordinate: Option<Coordinate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl Action {
    pub fn new(action: ActionKind) -> Self {
        Self {
            action,
            coordinate: None,
            text: None,
        }
    }

    pub fn at(action: ActionKind, x: f64, y: f64) -> Self {
        Self {
            coordinate: Some(Coordinate(x, y)),
            ..Self::new(action)
        }
    }

    pub fn with_text(action: ActionKind, text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::new(action)
        }
    }

    /// Parse tool-call parameters. An unknown `action` name is reported as
    /// unsupported rather than malformed.
    pub fn from_params(params: &Value) -> Result<Self> {
        let name = params
            .get("action")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::Validation("Missing required parameter: action".to_string()))?;
        let action: ActionKind = name.parse()?;

        let coordinate = match params.get("coordinate") {
            None | Some(Value::Null) => None,
            Some(value) => Some(serde_json::from_value::<Coordinate>(value.clone()).map_err(
                |_| Error::Validation("Coordinate must be a pair of numbers [x, y].".to_string()),
            )?),
        };

        let text = match params.get("text") {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(_) => return Err(Error::Validation("Text must be a string.".to_string())),
        };

        Ok(Self {
            action,
            coordinate,
            text,
        })
    }
}

/// What an executed action hands back: a status line or a screenshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ActionResult {
    Text(String),
    Image {
        data: String,
        #[serde(rename = "type")]
        media_type: String,
    },
}

impl ActionResult {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ActionResult::Text(text) => Some(text),
            ActionResult::Image { .. } => None,
        }
    }
}
